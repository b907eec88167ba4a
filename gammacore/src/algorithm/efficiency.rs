use serde::{Deserialize, Serialize};

use crate::data::peak::Spectrum;
use crate::error::AnalysisError;
use crate::nuclear::constants::GE_EFFICIENCY_COEFFICIENTS;

/// Detector efficiency as a polynomial in energy (keV).
///
/// Coefficients are stored in ascending powers. Uncertainty of the efficiency
/// itself is not propagated into adjusted intensities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCurve {
    coefficients: Vec<f64>,
}

impl EfficiencyCurve {
    pub fn new(coefficients: Vec<f64>) -> Self {
        EfficiencyCurve { coefficients }
    }

    /// 6th-degree fit of the reference germanium detector, positive between about 37.5 and 1011.6 keV
    pub fn germanium() -> Self {
        EfficiencyCurve::new(GE_EFFICIENCY_COEFFICIENTS.to_vec())
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// evaluate the efficiency polynomial
    ///
    /// Arguments:
    ///
    /// * `energy` - energy in keV
    ///
    /// Returns:
    ///
    /// * `f64` - efficiency at `energy`
    ///
    /// # Examples
    ///
    /// ```
    /// use gammacore::algorithm::efficiency::EfficiencyCurve;
    ///
    /// let curve = EfficiencyCurve::new(vec![1.0, 2.0, 3.0]);
    /// assert_eq!(curve.efficiency(2.0), 17.0);
    /// ```
    pub fn efficiency(&self, energy: f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * energy + c)
    }

    /// whether the adjusted intensity is defined at `energy`
    pub fn is_calibrated(&self, energy: f64) -> bool {
        let efficiency = self.efficiency(energy);
        efficiency.is_finite() && efficiency > 0.0
    }

    /// adjust a single raw intensity, `raw^2 / efficiency(energy)`
    ///
    /// Arguments:
    ///
    /// * `index` - position of the peak, reported in errors
    /// * `energy` - peak energy in keV
    /// * `raw_intensity` - measured intensity
    ///
    /// Returns:
    ///
    /// * `Result<f64, AnalysisError>` - adjusted intensity, or an error where the efficiency is not positive
    ///
    /// # Examples
    ///
    /// ```
    /// use gammacore::algorithm::efficiency::EfficiencyCurve;
    ///
    /// let curve = EfficiencyCurve::new(vec![0.5]);
    /// assert_eq!(curve.adjust_intensity(0, 100.0, 3.0).unwrap(), 18.0);
    /// assert!(EfficiencyCurve::new(vec![0.0]).adjust_intensity(0, 100.0, 3.0).is_err());
    /// ```
    pub fn adjust_intensity(&self, index: usize, energy: f64, raw_intensity: f64) -> Result<f64, AnalysisError> {
        let efficiency = self.efficiency(energy);
        if !(efficiency.is_finite() && efficiency > 0.0) {
            return Err(AnalysisError::NonPositiveEfficiency { index, energy, efficiency });
        }
        Ok(raw_intensity * raw_intensity / efficiency)
    }

    /// Adjusts `intensities` in place. On error nothing is written.
    pub fn adjust_intensities(&self, energies: &[f64], intensities: &mut [f64]) -> Result<(), AnalysisError> {
        if energies.len() != intensities.len() {
            return Err(AnalysisError::LengthMismatch {
                energies: energies.len(),
                intensities: intensities.len(),
            });
        }
        let adjusted = energies
            .iter()
            .zip(intensities.iter())
            .enumerate()
            .map(|(index, (&energy, &raw))| self.adjust_intensity(index, energy, raw))
            .collect::<Result<Vec<f64>, AnalysisError>>()?;
        intensities.copy_from_slice(&adjusted);
        Ok(())
    }

    /// Returns a copy of `spectrum` with adjusted intensities; uncertainties are kept as measured.
    pub fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum, AnalysisError> {
        let mut intensities = spectrum.intensities();
        self.adjust_intensities(&spectrum.energies(), &mut intensities)?;
        Ok(spectrum.with_intensities(&intensities))
    }
}

impl Default for EfficiencyCurve {
    fn default() -> Self {
        EfficiencyCurve::germanium()
    }
}
