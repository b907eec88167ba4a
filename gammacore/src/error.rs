use thiserror::Error;

use crate::nuclear::nuclide::NuclideId;

/// Rejections raised while turning raw columns into a [`Spectrum`](crate::data::peak::Spectrum).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error(
        "inputs must have the same number of points: {energies} energies, {energy_uncertainties} energy uncertainties, \
         {intensities} intensities, {intensity_uncertainties} intensity uncertainties"
    )]
    LengthMismatch {
        energies: usize,
        energy_uncertainties: usize,
        intensities: usize,
        intensity_uncertainties: usize,
    },
    #[error("{column}[{index}]: `{token}` is not a number")]
    NotANumber {
        column: &'static str,
        index: usize,
        token: String,
    },
    #[error("{column}[{index}]: value {value} is not finite")]
    NonFinite {
        column: &'static str,
        index: usize,
        value: f64,
    },
    #[error("energy[{index}]: {energy} keV must be positive")]
    NonPositiveEnergy { index: usize, energy: f64 },
    #[error("{column}[{index}]: uncertainty {value} must not be negative")]
    NegativeUncertainty {
        column: &'static str,
        index: usize,
        value: f64,
    },
}

/// Failures reported by a nuclear-data source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NuclearDataError {
    #[error("no reference data for nuclide {0}")]
    UnknownNuclide(NuclideId),
    #[error("invalid nuclide name `{0}`")]
    InvalidNuclideName(String),
    #[error("nuclear data backend error: {0}")]
    Backend(String),
}

/// Reasons a single candidate is dropped from scoring.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Data(#[from] NuclearDataError),
    #[error("nuclide {0} has no known gamma lines")]
    NoKnownLines(NuclideId),
}

/// Errors that abort a whole analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    Input(#[from] InputError),
    #[error("detector efficiency at peak {index} ({energy} keV) is {efficiency}, adjusted intensity is undefined")]
    NonPositiveEfficiency {
        index: usize,
        energy: f64,
        efficiency: f64,
    },
    #[error("efficiency correction needs one intensity per energy, got {energies} energies and {intensities} intensities")]
    LengthMismatch { energies: usize, intensities: usize },
    #[error("candidate discovery failed: {0}")]
    Discovery(NuclearDataError),
}
