use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::algorithm::discovery::{find_candidates, CandidateMerge};
use crate::algorithm::efficiency::EfficiencyCurve;
use crate::algorithm::ranking::{RankingConfig, RankingState};
use crate::algorithm::scoring::{score_candidate, LineCounting, ScoredCandidate};
use crate::data::peak::Spectrum;
use crate::data::reference::NuclearData;
use crate::error::{AnalysisError, ScoringError};
use crate::nuclear::nuclide::NuclideId;

/// Role of an entry in the final result list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateLabel {
    Natural,
    Secondary,
    OverallBest,
}

impl Display for CandidateLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CandidateLabel::Natural => write!(f, "Natural"),
            CandidateLabel::Secondary => write!(f, "Secondary candidate"),
            CandidateLabel::OverallBest => write!(f, "Overall best match"),
        }
    }
}

/// A labelled entry of the result list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub label: CandidateLabel,
    pub candidate: ScoredCandidate,
}

impl Identification {
    pub fn name(&self) -> &str {
        &self.candidate.name
    }
}

impl Display for Identification {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.candidate.name)
    }
}

/// Options for a complete analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Efficiency correction applied before matching, `None` to use intensities as given.
    pub efficiency: Option<EfficiencyCurve>,
    /// Drop peaks where the efficiency is not positive instead of failing.
    pub drop_uncalibrated: bool,
    pub candidate_merge: CandidateMerge,
    pub line_counting: LineCounting,
    pub ranking: RankingConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            efficiency: Some(EfficiencyCurve::germanium()),
            drop_uncalibrated: false,
            candidate_merge: CandidateMerge::default(),
            line_counting: LineCounting::default(),
            ranking: RankingConfig::default(),
        }
    }
}

/// Everything one analysis produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub identifications: Vec<Identification>,
    pub ranking: RankingState,
    /// spectrum after efficiency correction, the one that was matched
    pub adjusted: Spectrum,
    pub dropped_peaks: usize,
    pub candidates: usize,
    pub skipped_candidates: usize,
}

/// apply the configured efficiency correction
///
/// Returns:
///
/// * `Result<(Spectrum, usize), AnalysisError>` - corrected spectrum and the number of dropped peaks
///
pub fn correct_efficiency(spectrum: &Spectrum, config: &AnalysisConfig) -> Result<(Spectrum, usize), AnalysisError> {
    let Some(curve) = &config.efficiency else {
        return Ok((spectrum.clone(), 0));
    };

    if !config.drop_uncalibrated {
        return Ok((curve.apply(spectrum)?, 0));
    }

    let kept = spectrum.filtered(|peak| {
        let calibrated = curve.is_calibrated(peak.energy);
        if !calibrated {
            log::warn!(
                "dropping peak at {:.2} keV, detector efficiency there is {:.3e}",
                peak.energy,
                curve.efficiency(peak.energy)
            );
        }
        calibrated
    });
    let dropped = spectrum.len() - kept.len();
    Ok((curve.apply(&kept)?, dropped))
}

/// build the labelled result list from a final ranking state
///
/// Arguments:
///
/// * `state` - ranking state after all candidates
///
/// Returns:
///
/// * `Vec<Identification>` - up to three entries: the lowest-numbered natural candidate of the light
///   abundance board, the first slot of that board, and the overall champion unless it repeats
///   one of the first two
///
pub fn present(state: &RankingState) -> Vec<Identification> {
    let board = state.light_best_abundance();
    let natural = board
        .entries()
        .iter()
        .filter(|candidate| candidate.natural_abundance > 0.0)
        .min_by_key(|candidate| candidate.priority_number());
    let secondary = board.entries().first();
    let overall = state.best_overall();

    let mut identifications: Vec<Identification> = Vec::with_capacity(3);
    for (label, candidate) in [
        (CandidateLabel::Natural, natural),
        (CandidateLabel::Secondary, secondary),
        (CandidateLabel::OverallBest, overall),
    ] {
        let Some(candidate) = candidate else { continue };
        if label == CandidateLabel::OverallBest
            && identifications.iter().any(|i| i.candidate.nuclide == candidate.nuclide)
        {
            continue;
        }
        identifications.push(Identification { label, candidate: candidate.clone() });
    }
    identifications
}

/// analyse one spectrum against a nuclear-data source
///
/// Arguments:
///
/// * `source` - nuclear-data source
/// * `spectrum` - validated raw spectrum
/// * `config` - analysis options
///
/// Returns:
///
/// * `Result<AnalysisReport, AnalysisError>` - the report; candidates whose lookups fail are skipped,
///   efficiency and discovery failures abort
///
pub fn analyze<S: NuclearData + ?Sized>(
    source: &S,
    spectrum: &Spectrum,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalysisError> {
    let (adjusted, dropped_peaks) = correct_efficiency(spectrum, config)?;
    let candidates = find_candidates(source, &adjusted, config.candidate_merge).map_err(AnalysisError::Discovery)?;

    // repeated candidates reuse their first score
    let mut scores: HashMap<NuclideId, Option<ScoredCandidate>> = HashMap::new();
    let mut state = RankingState::new(config.ranking.clone());
    let mut skipped_candidates = 0;

    for &nuclide in &candidates {
        let scored = scores.entry(nuclide).or_insert_with(|| {
            match score_candidate(source, nuclide, &adjusted, config.line_counting) {
                Ok(scored) => {
                    log::debug!(
                        "{}: {}/{} lines matched, abundance {}",
                        scored.name,
                        scored.match_count,
                        scored.known_line_count,
                        scored.natural_abundance
                    );
                    Some(scored)
                }
                Err(e @ ScoringError::NoKnownLines(_)) => {
                    log::debug!("skipping candidate: {}", e);
                    None
                }
                Err(e) => {
                    log::warn!("skipping candidate {}: {}", nuclide, e);
                    None
                }
            }
        });
        match scored {
            Some(candidate) => state = state.accumulate(candidate),
            None => skipped_candidates += 1,
        }
    }

    let identifications = present(&state);
    log::info!(
        "{} peaks ({} dropped), {} candidates ({} skipped), {} identifications",
        spectrum.len(),
        dropped_peaks,
        candidates.len(),
        skipped_candidates,
        identifications.len()
    );

    Ok(AnalysisReport {
        identifications,
        ranking: state,
        adjusted,
        dropped_peaks,
        candidates: candidates.len(),
        skipped_candidates,
    })
}

/// identify likely sources from four parallel columns
///
/// Arguments:
///
/// * `source` - nuclear-data source
/// * `energies` - peak energies in keV
/// * `energy_uncertainties` - energy half-widths in keV
/// * `intensities` - raw peak intensities
/// * `intensity_uncertainties` - intensity uncertainties
/// * `config` - analysis options
///
/// Returns:
///
/// * `Result<Vec<Identification>, AnalysisError>` - up to three labelled nuclides, or the validation error
///
/// # Examples
///
/// ```
/// use gammacore::algorithm::identification::{identify, AnalysisConfig};
/// use gammacore::data::reference::{GammaLine, NuclideRecord, ReferenceLibrary};
///
/// let library = ReferenceLibrary::from_records(vec![NuclideRecord::new(
///     "Rb87".parse().unwrap(),
///     0.2783,
///     86.909,
///     vec![GammaLine::new(394.0, 0.5, 3.0, 0.5)],
/// )]);
/// let config = AnalysisConfig { efficiency: None, ..AnalysisConfig::default() };
///
/// let found = identify(&library, &[394.2], &[1.0], &[3.2], &[0.3], &config).unwrap();
/// assert_eq!(found[0].to_string(), "Natural: Rb87");
///
/// assert!(identify(&library, &[394.2, 500.0], &[1.0], &[3.2], &[0.3], &config).is_err());
/// ```
pub fn identify<S: NuclearData + ?Sized>(
    source: &S,
    energies: &[f64],
    energy_uncertainties: &[f64],
    intensities: &[f64],
    intensity_uncertainties: &[f64],
    config: &AnalysisConfig,
) -> Result<Vec<Identification>, AnalysisError> {
    let spectrum = Spectrum::from_columns(energies, energy_uncertainties, intensities, intensity_uncertainties)?;
    Ok(analyze(source, &spectrum, config)?.identifications)
}

/// analyse several spectra in parallel, each with fresh ranking state
///
/// Arguments:
///
/// * `source` - shared nuclear-data source
/// * `spectra` - spectra to analyse
/// * `config` - analysis options
/// * `num_threads` - size of the thread pool
///
/// Returns:
///
/// * `Vec<Result<AnalysisReport, AnalysisError>>` - one result per spectrum, in input order
///
pub fn analyze_batch<S: NuclearData + Sync + ?Sized>(
    source: &S,
    spectra: &[Spectrum],
    config: &AnalysisConfig,
    num_threads: usize,
) -> Vec<Result<AnalysisReport, AnalysisError>> {
    let run = || -> Vec<Result<AnalysisReport, AnalysisError>> {
        spectra.par_iter().map(|spectrum| analyze(source, spectrum, config)).collect()
    };

    match ThreadPoolBuilder::new().num_threads(num_threads).build() {
        Ok(thread_pool) => thread_pool.install(run),
        Err(e) => {
            log::warn!("could not build a pool of {} threads ({}), using the global pool", num_threads, e);
            run()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reference::{GammaLine, NuclideRecord, ReferenceLibrary};
    use crate::error::{InputError, NuclearDataError};
    use crate::nuclear::nuclide::KnownLine;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn id(name: &str) -> NuclideId {
        name.parse().unwrap()
    }

    fn record(name: &str, abundance: f64, mass: f64, lines: Vec<GammaLine>) -> NuclideRecord {
        NuclideRecord::new(id(name), abundance, mass, lines)
    }

    fn without_efficiency() -> AnalysisConfig {
        AnalysisConfig { efficiency: None, ..AnalysisConfig::default() }
    }

    #[test]
    fn test_single_peak_scenario_lands_on_the_natural_board() {
        let library = ReferenceLibrary::from_records(vec![record(
            "K40",
            0.35,
            39.0,
            vec![GammaLine::new(1460.8, 0.5, 75.0, 1.0)],
        )]);
        let spectrum = Spectrum::from_columns(&[1460.0], &[1.0], &[75.6], &[0.3]).unwrap();

        let report = analyze(&library, &spectrum, &without_efficiency()).unwrap();
        let natural = report.ranking.light_best_abundance();
        assert_eq!(natural.names(), vec!["K40"]);
        assert_eq!(natural.entries()[0].match_fraction, 1.0);

        let listed: Vec<String> = report.identifications.iter().map(|i| i.to_string()).collect();
        assert_eq!(listed, vec!["Natural: K40", "Secondary candidate: K40"]);
    }

    #[test]
    fn test_mismatched_lengths_fail_before_any_lookup() {
        let library = ReferenceLibrary::new();
        let err = identify(
            &library,
            &[100.0, 200.0, 300.0, 400.0, 500.0],
            &[1.0; 5],
            &[1.0; 4],
            &[0.1; 5],
            &AnalysisConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Input(InputError::LengthMismatch { .. })));
    }

    #[test]
    fn test_zero_efficiency_is_fatal() {
        let library = ReferenceLibrary::from_records(vec![record(
            "K40",
            0.35,
            39.0,
            vec![GammaLine::new(500.0, 0.5, 1.0, 1.0)],
        )]);
        let config = AnalysisConfig {
            efficiency: Some(EfficiencyCurve::new(vec![-500.0, 1.0])),
            ..AnalysisConfig::default()
        };
        let err = identify(&library, &[500.0], &[1.0], &[1.0], &[0.1], &config).unwrap_err();
        assert_eq!(err, AnalysisError::NonPositiveEfficiency { index: 0, energy: 500.0, efficiency: 0.0 });

        // the germanium fit is negative at 1460 keV
        let err = identify(&library, &[1460.0], &[1.0], &[1.0], &[0.1], &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::NonPositiveEfficiency { .. }));
    }

    #[test]
    fn test_uncalibrated_peaks_can_be_dropped_explicitly() {
        let curve = EfficiencyCurve::germanium();
        let adjusted = 1.0 / curve.efficiency(661.7);
        let library = ReferenceLibrary::from_records(vec![
            record("Cs133", 0.5, 132.9, vec![GammaLine::new(661.7, 0.5, adjusted, adjusted * 0.01)]),
            record("K40", 0.35, 39.96, vec![GammaLine::new(1460.8, 0.5, 75.0, 1.0)]),
        ]);
        let spectrum = Spectrum::from_columns(&[12.57, 661.7, 1460.0], &[1.0; 3], &[38.1, 1.0, 75.6], &[0.2; 3]).unwrap();
        let config = AnalysisConfig { drop_uncalibrated: true, ..AnalysisConfig::default() };

        let report = analyze(&library, &spectrum, &config).unwrap();
        assert_eq!(report.dropped_peaks, 2);
        assert_eq!(report.adjusted.len(), 1);
        assert!((report.adjusted.peaks()[0].intensity - adjusted).abs() < 1e-9);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.identifications[0].name(), "Cs133");
        assert_eq!(report.identifications[0].candidate.match_fraction, 1.0);
    }

    #[test]
    fn test_presentation_uses_distinct_labels() {
        // the legacy output labelled both the second and third entry "Heavy/Lab";
        // each slot now carries its own label
        let library = ReferenceLibrary::from_records(vec![
            record("Rb87", 0.2783, 86.9, vec![GammaLine::new(100.0, 0.5, 5.0, 1.0)]),
            record("V50", 0.0025, 49.9, vec![GammaLine::new(100.0, 0.5, 5.0, 1.0), GammaLine::new(900.0, 0.5, 5.0, 1.0)]),
            record("U238", 0.992742, 238.05, vec![GammaLine::new(100.0, 0.5, 5.0, 1.0)]),
        ]);
        let spectrum = Spectrum::from_columns(&[100.0], &[1.0], &[5.0], &[0.5]).unwrap();

        let report = analyze(&library, &spectrum, &without_efficiency()).unwrap();
        let listed: Vec<String> = report.identifications.iter().map(|i| i.to_string()).collect();
        // V50 is the lowest-numbered natural entry, Rb87 took the first slot,
        // U238 is more abundant than both and wins the champion
        assert_eq!(listed, vec!["Natural: V50", "Secondary candidate: Rb87", "Overall best match: U238"]);
    }

    #[test]
    fn test_secondary_slot_is_kept_and_only_the_champion_is_deduplicated() {
        let library = ReferenceLibrary::from_records(vec![record(
            "Rb87",
            0.2783,
            86.9,
            vec![GammaLine::new(100.0, 0.5, 5.0, 1.0)],
        )]);
        let spectrum = Spectrum::from_columns(&[100.0], &[1.0], &[5.0], &[0.5]).unwrap();

        let report = analyze(&library, &spectrum, &without_efficiency()).unwrap();
        let labels: Vec<CandidateLabel> = report.identifications.iter().map(|i| i.label).collect();
        assert_eq!(labels, vec![CandidateLabel::Natural, CandidateLabel::Secondary]);
        assert!(report.identifications.iter().all(|i| i.name() == "Rb87"));
    }

    #[test]
    fn test_natural_headline_and_first_slot_may_name_the_same_nuclide() {
        let library = ReferenceLibrary::from_records(vec![
            record("K40", 0.3, 39.9, vec![GammaLine::new(100.0, 0.5, 5.0, 1.0)]),
            record("U238", 0.99, 238.0, vec![GammaLine::new(100.0, 0.5, 5.0, 1.0)]),
        ]);
        let spectrum = Spectrum::from_columns(&[100.0], &[1.0], &[5.0], &[0.5]).unwrap();

        let report = analyze(&library, &spectrum, &without_efficiency()).unwrap();
        let listed: Vec<String> = report.identifications.iter().map(|i| i.to_string()).collect();
        assert_eq!(listed, vec!["Natural: K40", "Secondary candidate: K40", "Overall best match: U238"]);
    }

    #[test]
    fn test_metastable_and_synthetic_candidates_are_never_reported() {
        let library = ReferenceLibrary::from_records(vec![
            record("Cs137", 0.0, 136.9, vec![GammaLine::new(661.7, 0.5, 5.0, 1.0)]),
            record("Ir192M2", 0.5, 191.9, vec![GammaLine::new(661.0, 0.5, 5.0, 1.0)]),
        ]);
        let spectrum = Spectrum::from_columns(&[661.5], &[1.0], &[5.0], &[0.5]).unwrap();

        let report = analyze(&library, &spectrum, &without_efficiency()).unwrap();
        assert_eq!(report.candidates, 2);
        assert_eq!(report.ranking.ranked(), 1);
        assert!(report.identifications.is_empty());
        assert!(report.ranking.best_overall().is_none());
    }

    /// Library that fails for one nuclide and has no lines for another.
    struct FlakySource(ReferenceLibrary);

    impl NuclearData for FlakySource {
        fn find_parents(&self, energy: f64, energy_uncertainty: f64) -> Result<Vec<i64>, NuclearDataError> {
            self.0.find_parents(energy, energy_uncertainty)
        }

        fn known_lines(&self, nuclide: NuclideId) -> Result<Vec<KnownLine>, NuclearDataError> {
            match nuclide.to_string().as_str() {
                "Co60" => Err(NuclearDataError::Backend("line table missing".to_string())),
                "La138" => Ok(Vec::new()),
                _ => self.0.known_lines(nuclide),
            }
        }

        fn natural_abundance(&self, nuclide: NuclideId) -> Result<f64, NuclearDataError> {
            self.0.natural_abundance(nuclide)
        }

        fn atomic_mass(&self, nuclide: NuclideId) -> Result<f64, NuclearDataError> {
            self.0.atomic_mass(nuclide)
        }
    }

    #[test]
    fn test_failing_candidates_are_skipped_not_fatal() {
        let line = || vec![GammaLine::new(200.0, 0.5, 5.0, 1.0)];
        let source = FlakySource(ReferenceLibrary::from_records(vec![
            record("Co60", 0.5, 59.9, line()),
            record("La138", 0.0009, 137.9, line()),
            record("K40", 0.000117, 39.96, line()),
        ]));
        let spectrum = Spectrum::from_columns(&[200.0, 200.5], &[1.0, 1.0], &[5.0, 5.0], &[0.5, 0.5]).unwrap();
        let config = AnalysisConfig {
            candidate_merge: CandidateMerge::KeepDuplicates,
            ..without_efficiency()
        };

        let report = analyze(&source, &spectrum, &config).unwrap();
        assert_eq!(report.candidates, 6);
        assert_eq!(report.skipped_candidates, 4);
        assert_eq!(report.ranking.best_match().names(), vec!["K40"]);
        assert_eq!(report.identifications[0].name(), "K40");
    }

    #[test]
    fn test_duplicates_do_not_change_the_ranking() {
        let library = ReferenceLibrary::from_records(vec![
            record("K40", 0.000117, 39.96, vec![GammaLine::new(200.0, 0.5, 5.0, 1.0)]),
            record("Rb87", 0.2783, 86.9, vec![GammaLine::new(200.5, 0.5, 5.0, 1.0), GammaLine::new(400.0, 0.5, 9.0, 1.0)]),
        ]);
        let spectrum = Spectrum::from_columns(&[200.0, 200.4, 400.0], &[1.0; 3], &[5.0, 5.0, 9.0], &[0.5; 3]).unwrap();

        let distinct = analyze(&library, &spectrum, &without_efficiency()).unwrap();
        let legacy = analyze(
            &library,
            &spectrum,
            &AnalysisConfig { candidate_merge: CandidateMerge::KeepDuplicates, ..without_efficiency() },
        )
        .unwrap();

        assert!(legacy.candidates > distinct.candidates);
        assert_eq!(legacy.identifications, distinct.identifications);
        assert_eq!(legacy.ranking.leaderboards(), distinct.ranking.leaderboards());
    }

    fn random_library(rng: &mut StdRng) -> ReferenceLibrary {
        let names = ["K40", "Rb87", "La138", "Lu176", "U238", "U235", "Th232", "Cs137", "Tc99M", "Ir192M2", "V50", "Sm147"];
        let records = names
            .iter()
            .map(|name| {
                let lines = (0..rng.gen_range(0..5))
                    .map(|_| {
                        let intensity = if rng.gen_bool(0.1) { f64::NAN } else { rng.gen_range(0.0..50.0) };
                        GammaLine::new(rng.gen_range(40.0..1000.0), rng.gen_range(0.0..2.0), intensity, rng.gen_range(0.0..5.0))
                    })
                    .collect();
                record(name, rng.gen_range(0.0..=1.0), rng.gen_range(1.0..250.0), lines)
            })
            .collect();
        ReferenceLibrary::from_records(records)
    }

    #[test]
    fn test_random_analyses_respect_output_invariants() {
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..100 {
            let library = random_library(&mut rng);
            let n = rng.gen_range(1..30);
            let energies: Vec<f64> = (0..n).map(|_| rng.gen_range(40.0..1000.0)).collect();
            let energy_uncertainties: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..5.0)).collect();
            let intensities: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..2.0)).collect();
            let intensity_uncertainties: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
            let spectrum = Spectrum::from_columns(&energies, &energy_uncertainties, &intensities, &intensity_uncertainties).unwrap();

            let config = AnalysisConfig { drop_uncalibrated: true, ..AnalysisConfig::default() };
            let report = analyze(&library, &spectrum, &config).unwrap();

            assert!(report.identifications.len() <= 3);
            assert!(report.identifications.iter().all(|i| !i.name().is_empty()));
            for board in report.ranking.leaderboards() {
                let mut names = board.names();
                let len = names.len();
                names.sort();
                names.dedup();
                assert_eq!(names.len(), len);
                assert!(board.entries().iter().all(|c| !c.is_metastable()));
                assert!(board.entries().iter().all(|c| (0.0..=1.0).contains(&c.match_fraction)));
            }
            if let Some(best) = report.ranking.best_overall() {
                assert!(!best.is_metastable());
            }
        }
    }

    #[test]
    fn test_batch_matches_sequential_analysis() {
        let library = ReferenceLibrary::from_records(vec![
            record("K40", 0.000117, 39.96, vec![GammaLine::new(200.0, 0.5, 5.0, 1.0)]),
            record("Rb87", 0.2783, 86.9, vec![GammaLine::new(400.0, 0.5, 9.0, 1.0)]),
        ]);
        let spectra = vec![
            Spectrum::from_columns(&[200.0], &[1.0], &[5.0], &[0.5]).unwrap(),
            Spectrum::from_columns(&[400.0], &[1.0], &[9.0], &[0.5]).unwrap(),
            Spectrum::from_columns(&[1460.0], &[1.0], &[9.0], &[0.5]).unwrap(),
        ];
        let config = without_efficiency();

        let batch = analyze_batch(&library, &spectra, &config, 2);
        assert_eq!(batch.len(), 3);
        for (spectrum, result) in spectra.iter().zip(batch) {
            assert_eq!(result.unwrap(), analyze(&library, spectrum, &config).unwrap());
        }
    }
}
