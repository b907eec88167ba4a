use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// An observed gamma-ray peak.
///
/// `energy_uncertainty` is a half-width in keV; intensities are peak areas in
/// whatever unit the upstream peak finder reports.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub energy: f64,
    pub energy_uncertainty: f64,
    pub intensity: f64,
    pub intensity_uncertainty: f64,
}

impl Peak {
    pub fn new(energy: f64, energy_uncertainty: f64, intensity: f64, intensity_uncertainty: f64) -> Self {
        Peak { energy, energy_uncertainty, intensity, intensity_uncertainty }
    }

    /// closed energy window `[energy - uncertainty, energy + uncertainty]`
    pub fn energy_window(&self) -> (f64, f64) {
        (self.energy - self.energy_uncertainty, self.energy + self.energy_uncertainty)
    }

    /// closed intensity window `[intensity - uncertainty, intensity + uncertainty]`
    pub fn intensity_window(&self) -> (f64, f64) {
        (self.intensity - self.intensity_uncertainty, self.intensity + self.intensity_uncertainty)
    }
}

/// Represents a measured gamma-ray spectrum as an ordered list of validated peaks.
///
/// Serialised as a plain list of peaks; deserialising runs the same checks as
/// [`Spectrum::from_peaks`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Peak>", into = "Vec<Peak>")]
pub struct Spectrum {
    peaks: Vec<Peak>,
}

impl Spectrum {
    /// Constructs a `Spectrum` from four parallel columns.
    ///
    /// # Arguments
    ///
    /// * `energies` - peak energies in keV, each > 0
    /// * `energy_uncertainties` - energy half-widths in keV, each >= 0
    /// * `intensities` - peak intensities
    /// * `intensity_uncertainties` - intensity uncertainties, each >= 0
    ///
    /// # Errors
    ///
    /// All four columns must have the same length and only finite values. Nothing is
    /// truncated: the first violation is returned as an [`InputError`].
    ///
    /// # Example
    ///
    /// ```rust
    /// # use gammacore::data::peak::Spectrum;
    /// let spectrum = Spectrum::from_columns(&[661.7, 1460.8], &[1.0, 1.3], &[4.2, 75.6], &[0.2, 0.3]).unwrap();
    /// assert_eq!(spectrum.len(), 2);
    ///
    /// let mismatch = Spectrum::from_columns(&[661.7, 1460.8], &[1.0, 1.3], &[4.2], &[0.2, 0.3]);
    /// assert!(mismatch.is_err());
    /// ```
    pub fn from_columns(
        energies: &[f64],
        energy_uncertainties: &[f64],
        intensities: &[f64],
        intensity_uncertainties: &[f64],
    ) -> Result<Self, InputError> {
        let n = energies.len();
        if energy_uncertainties.len() != n || intensities.len() != n || intensity_uncertainties.len() != n {
            return Err(InputError::LengthMismatch {
                energies: n,
                energy_uncertainties: energy_uncertainties.len(),
                intensities: intensities.len(),
                intensity_uncertainties: intensity_uncertainties.len(),
            });
        }

        let mut peaks = Vec::with_capacity(n);
        for (index, (&energy, &energy_uncertainty, &intensity, &intensity_uncertainty)) in
            izip!(energies, energy_uncertainties, intensities, intensity_uncertainties).enumerate()
        {
            check_finite("energy", index, energy)?;
            check_finite("energy_uncertainty", index, energy_uncertainty)?;
            check_finite("intensity", index, intensity)?;
            check_finite("intensity_uncertainty", index, intensity_uncertainty)?;

            if energy <= 0.0 {
                return Err(InputError::NonPositiveEnergy { index, energy });
            }
            check_uncertainty("energy_uncertainty", index, energy_uncertainty)?;
            check_uncertainty("intensity_uncertainty", index, intensity_uncertainty)?;

            peaks.push(Peak::new(energy, energy_uncertainty, intensity, intensity_uncertainty));
        }

        Ok(Spectrum { peaks })
    }

    /// Constructs a `Spectrum` from four comma-separated text columns, e.g. `"0.1, 0.5, 100"`.
    pub fn from_text_columns(
        energies: &str,
        energy_uncertainties: &str,
        intensities: &str,
        intensity_uncertainties: &str,
    ) -> Result<Self, InputError> {
        let energies = parse_value_list("energy", energies)?;
        let energy_uncertainties = parse_value_list("energy_uncertainty", energy_uncertainties)?;
        let intensities = parse_value_list("intensity", intensities)?;
        let intensity_uncertainties = parse_value_list("intensity_uncertainty", intensity_uncertainties)?;
        Spectrum::from_columns(&energies, &energy_uncertainties, &intensities, &intensity_uncertainties)
    }

    /// Constructs a `Spectrum` from peaks, applying the same checks as [`Spectrum::from_columns`].
    pub fn from_peaks(peaks: Vec<Peak>) -> Result<Self, InputError> {
        let energies: Vec<f64> = peaks.iter().map(|p| p.energy).collect();
        let energy_uncertainties: Vec<f64> = peaks.iter().map(|p| p.energy_uncertainty).collect();
        let intensities: Vec<f64> = peaks.iter().map(|p| p.intensity).collect();
        let intensity_uncertainties: Vec<f64> = peaks.iter().map(|p| p.intensity_uncertainty).collect();
        Spectrum::from_columns(&energies, &energy_uncertainties, &intensities, &intensity_uncertainties)
    }

    /// The 32-peak spectrum of a banana measured on a germanium detector.
    ///
    /// Energies in keV with half-FWHM uncertainties, intensities and their
    /// uncertainties as peak areas in K-areas.
    pub fn banana() -> Self {
        let peaks = izip!(
            BANANA_ENERGIES,
            BANANA_ENERGY_UNCERTAINTIES,
            BANANA_INTENSITIES,
            BANANA_INTENSITY_UNCERTAINTIES
        )
        .map(|(e, de, i, di)| Peak::new(e, de, i, di))
        .collect();
        Spectrum { peaks }
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn energies(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.energy).collect()
    }

    pub fn intensities(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.intensity).collect()
    }

    /// Same peaks with intensities replaced, used after efficiency correction.
    pub(crate) fn with_intensities(&self, intensities: &[f64]) -> Self {
        let peaks = self
            .peaks
            .iter()
            .zip(intensities)
            .map(|(p, &intensity)| Peak { intensity, ..*p })
            .collect();
        Spectrum { peaks }
    }

    /// Keeps the peaks for which `keep` returns true.
    pub fn filtered<F: Fn(&Peak) -> bool>(&self, keep: F) -> Self {
        Spectrum {
            peaks: self.peaks.iter().filter(|p| keep(p)).copied().collect(),
        }
    }
}

impl TryFrom<Vec<Peak>> for Spectrum {
    type Error = InputError;

    fn try_from(peaks: Vec<Peak>) -> Result<Self, Self::Error> {
        Spectrum::from_peaks(peaks)
    }
}

impl From<Spectrum> for Vec<Peak> {
    fn from(spectrum: Spectrum) -> Self {
        spectrum.peaks
    }
}

/// parse a comma-separated list of numbers
///
/// Arguments:
///
/// * `column` - column name used in error messages
/// * `text` - values separated by commas, surrounding whitespace is ignored
///
/// Returns:
///
/// * `Result<Vec<f64>, InputError>` - the values, or the first token that is not a number
///
/// # Examples
///
/// ```
/// use gammacore::data::peak::parse_value_list;
///
/// assert_eq!(parse_value_list("energy", "0.1, 0.5, 100").unwrap(), vec![0.1, 0.5, 100.0]);
/// assert!(parse_value_list("energy", "0.1, banana").is_err());
/// assert!(parse_value_list("energy", "   ").unwrap().is_empty());
/// ```
pub fn parse_value_list(column: &'static str, text: &str) -> Result<Vec<f64>, InputError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .enumerate()
        .map(|(index, token)| {
            let token = token.trim();
            token.parse::<f64>().map_err(|_| InputError::NotANumber {
                column,
                index,
                token: token.to_string(),
            })
        })
        .collect()
}

fn check_finite(column: &'static str, index: usize, value: f64) -> Result<(), InputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InputError::NonFinite { column, index, value })
    }
}

fn check_uncertainty(column: &'static str, index: usize, value: f64) -> Result<(), InputError> {
    if value < 0.0 {
        Err(InputError::NegativeUncertainty { column, index, value })
    } else {
        Ok(())
    }
}

const BANANA_ENERGIES: [f64; 32] = [
    12.57, 16.29, 39.43, 75.95, 92.70, 111.95, 185.82, 238.47, 295.20, 338.29, 351.66, 409.87, 438.99, 510.90,
    583.19, 609.13, 727.82, 795.25, 877.49, 903.82, 911.15, 949.53, 968.95, 1120.33, 1172.87, 1459.78, 1507.07,
    1537.02, 1586.44, 1590.96, 1761.70, 1843.97,
];

const BANANA_ENERGY_UNCERTAINTIES: [f64; 32] = [
    1.22, 1.22, 2.395, 1.15, 1.11, 0.675, 1.185, 0.81, 0.595, 0.18, 0.535, 0.175, 0.9, 1.46, 1.05, 1.045, 0.14,
    0.13, 0.25, 1.285, 1.285, 1.295, 0.73, 0.32, 0.43, 1.345, 0.13, 0.305, 1.35, 1.35, 1.475, 0.455,
];

const BANANA_INTENSITIES: [f64; 32] = [
    38.1, 27.3, 16.3, 9.68, 3.98, 0.273, 2.58, 2.07, 0.797, 0.339, 1.54, 0.0692, 0.471, 8.27, 1.29, 1.53, 0.463,
    0.169, 0.166, 0.205, 1.57, 0.79, 0.641, 0.686, 0.0947, 75.6, 0.0771, 0.015, 0.184, 0.316, 1.04, 0.132,
];

const BANANA_INTENSITY_UNCERTAINTIES: [f64; 32] = [
    0.2018, 0.2053, 0.789, 1.857, 0.406, 0.268, 0.367, 0.329, 0.234, 0.2297, 0.227, 0.137, 0.178, 0.241, 0.159,
    0.17, 0.149, 0.0917, 0.0885, 0.0497, 0.0594, 0.146, 0.129, 0.154, 0.105, 0.289, 0.0376, 0.0299, 0.0224,
    0.0248, 0.0577, 0.0339,
];
