use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::data::peak::Spectrum;
use crate::data::reference::NuclearData;
use crate::error::NuclearDataError;
use crate::nuclear::nuclide::NuclideId;

/// How candidates found by several peaks are merged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateMerge {
    /// first occurrence of each nuclide, in peak order
    #[default]
    Distinct,
    /// one entry per parent hit, as returned by the source
    KeepDuplicates,
}

/// decode a parent id and apply the plausibility filter
///
/// Arguments:
///
/// * `nucid` - raw identifier returned by a nuclear-data source
///
/// Returns:
///
/// * `Option<NuclideId>` - `None` for non-positive or undecodable ids and for ids whose `zzaaam` value is odd
///
/// # Examples
///
/// ```
/// use gammacore::algorithm::discovery::plausible_parent;
///
/// assert!(plausible_parent(551370000).is_some()); // Cs137
/// assert!(plausible_parent(561370001).is_none()); // Ba137M, zzaaam 561371
/// assert!(plausible_parent(0).is_none());
/// ```
pub fn plausible_parent(nucid: i64) -> Option<NuclideId> {
    let nuclide = NuclideId::from_nucid(nucid)?;
    match nuclide.zzaaam() {
        Some(zzaaam) if zzaaam % 2 == 0 => Some(nuclide),
        _ => None,
    }
}

/// find candidate parent nuclides for every peak of a spectrum
///
/// Arguments:
///
/// * `source` - nuclear-data source answering parent lookups
/// * `spectrum` - observed peaks, queried in order
/// * `merge` - whether repeated parents are kept
///
/// Returns:
///
/// * `Result<Vec<NuclideId>, NuclearDataError>` - candidates in discovery order, or the first backend failure
///
pub fn find_candidates<S: NuclearData + ?Sized>(
    source: &S,
    spectrum: &Spectrum,
    merge: CandidateMerge,
) -> Result<Vec<NuclideId>, NuclearDataError> {
    let mut candidates = Vec::new();

    for peak in spectrum.peaks() {
        let parents = source.find_parents(peak.energy, peak.energy_uncertainty)?;
        let before = candidates.len();
        candidates.extend(parents.into_iter().filter_map(plausible_parent));
        log::debug!(
            "peak at {:.2} ± {:.2} keV: {} plausible parents",
            peak.energy,
            peak.energy_uncertainty,
            candidates.len() - before
        );
    }

    Ok(match merge {
        CandidateMerge::Distinct => candidates.into_iter().unique().collect(),
        CandidateMerge::KeepDuplicates => candidates,
    })
}
