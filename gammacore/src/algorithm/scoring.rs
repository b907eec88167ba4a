use serde::{Deserialize, Serialize};

use crate::data::peak::Spectrum;
use crate::data::reference::NuclearData;
use crate::error::ScoringError;
use crate::nuclear::nuclide::{KnownLine, NuclideId};

/// How a known line that overlaps several observed peaks is counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineCounting {
    /// once per overlapping peak
    #[default]
    PerPeak,
    /// at most once
    Distinct,
}

/// A candidate nuclide together with its match score and reference attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub nuclide: NuclideId,
    pub name: String,
    pub match_count: usize,
    pub known_line_count: usize,
    /// in [0, 1]
    pub match_fraction: f64,
    pub natural_abundance: f64,
    pub atomic_mass: f64,
}

impl ScoredCandidate {
    pub fn is_metastable(&self) -> bool {
        self.nuclide.is_metastable()
    }

    /// abundance strictly between 0 and 1
    pub fn is_naturally_occurring(&self) -> bool {
        self.natural_abundance > 0.0 && self.natural_abundance < 1.0
    }

    pub fn is_light(&self, mass_limit: f64) -> bool {
        self.atomic_mass <= mass_limit
    }

    /// number used by the lower-wins priority rule, the trailing number of the name
    pub fn priority_number(&self) -> u32 {
        self.nuclide.mass_number()
    }
}

/// check whether two closed intervals overlap
///
/// Arguments:
///
/// * `a` - first interval `(lower, upper)`
/// * `b` - second interval `(lower, upper)`
///
/// Returns:
///
/// * `bool` - true if the intervals share at least one point
///
/// # Examples
///
/// ```
/// use gammacore::algorithm::scoring::intervals_overlap;
///
/// assert!(intervals_overlap((1.0, 2.0), (2.0, 3.0)));
/// assert!(!intervals_overlap((1.0, 2.0), (2.5, 3.0)));
/// ```
pub fn intervals_overlap(a: (f64, f64), b: (f64, f64)) -> bool {
    a.0 <= b.1 && a.1 >= b.0
}

/// count the known lines consistent with the observed intensities
///
/// Arguments:
///
/// * `lines` - known lines of one nuclide; `NaN` fields are read as 0 and only positive intensities are compared
/// * `spectrum` - observed peaks, typically after efficiency correction
/// * `counting` - whether a line overlapping several peaks counts once per peak or once
///
/// Returns:
///
/// * `usize` - number of matches
///
/// # Examples
///
/// ```
/// use gammacore::algorithm::scoring::{count_matching_lines, LineCounting};
/// use gammacore::data::peak::Spectrum;
/// use gammacore::nuclear::nuclide::KnownLine;
///
/// let spectrum = Spectrum::from_columns(&[100.0, 200.0], &[1.0, 1.0], &[10.0, 11.0], &[1.0, 1.0]).unwrap();
/// let lines = vec![KnownLine::new(10.5, 0.1), KnownLine::new(50.0, 1.0)];
///
/// assert_eq!(count_matching_lines(&lines, &spectrum, LineCounting::PerPeak), 2);
/// assert_eq!(count_matching_lines(&lines, &spectrum, LineCounting::Distinct), 1);
/// ```
pub fn count_matching_lines(lines: &[KnownLine], spectrum: &Spectrum, counting: LineCounting) -> usize {
    lines
        .iter()
        .map(KnownLine::sanitized)
        .filter(|line| line.intensity > 0.0)
        .map(|line| {
            let overlapping = spectrum
                .peaks()
                .iter()
                .filter(|peak| intervals_overlap(peak.intensity_window(), line.bounds()))
                .count();
            match counting {
                LineCounting::PerPeak => overlapping,
                LineCounting::Distinct => overlapping.min(1),
            }
        })
        .sum()
}

/// match count over known line count, capped at 1
///
/// Returns:
///
/// * `Option<f64>` - `None` for a nuclide without known lines
///
pub fn match_fraction(match_count: usize, known_line_count: usize) -> Option<f64> {
    if known_line_count == 0 {
        return None;
    }
    Some(match_count.min(known_line_count) as f64 / known_line_count as f64)
}

/// score one candidate against a spectrum
///
/// Arguments:
///
/// * `source` - nuclear-data source for lines, abundance, mass and name
/// * `nuclide` - candidate to score
/// * `spectrum` - observed peaks
/// * `counting` - line counting policy
///
/// Returns:
///
/// * `Result<ScoredCandidate, ScoringError>` - the score, or the reason the candidate has to be skipped
///
pub fn score_candidate<S: NuclearData + ?Sized>(
    source: &S,
    nuclide: NuclideId,
    spectrum: &Spectrum,
    counting: LineCounting,
) -> Result<ScoredCandidate, ScoringError> {
    let lines = source.known_lines(nuclide)?;
    let match_count = count_matching_lines(&lines, spectrum, counting);
    let match_fraction = match_fraction(match_count, lines.len()).ok_or(ScoringError::NoKnownLines(nuclide))?;

    Ok(ScoredCandidate {
        nuclide,
        name: source.display_name(nuclide)?,
        match_count,
        known_line_count: lines.len(),
        match_fraction,
        natural_abundance: source.natural_abundance(nuclide)?,
        atomic_mass: source.atomic_mass(nuclide)?,
    })
}
