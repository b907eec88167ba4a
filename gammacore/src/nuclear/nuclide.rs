use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::NuclearDataError;
use crate::nuclear::constants::{NUCID_A_FACTOR, NUCID_Z_FACTOR, ZZAAAM_A_FACTOR, ZZAAAM_Z_FACTOR};
use crate::nuclear::elements::{atomic_number, element_symbol};

static NUCLIDE_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{1,2})-?(\d{1,3})(?:([Mm])(\d?))?$"));

/// Identifies a nuclide by atomic number, mass number and isomeric state.
///
/// # Description
///
/// `NuclideId` replaces reading numbers back out of display names: the atomic number,
/// the mass number and the metastable state are typed fields. The canonical text form is
/// the element symbol followed by the mass number and an optional metastable flag,
/// e.g. `K40` or `Tc99M`.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NuclideId {
    z: u32,
    a: u32,
    state: u32,
}

impl NuclideId {
    /// Constructs a new `NuclideId`.
    ///
    /// # Arguments
    ///
    /// * `z` - atomic number
    /// * `a` - mass number
    /// * `state` - isomeric state, 0 for the ground state
    ///
    pub const fn new(z: u32, a: u32, state: u32) -> Self {
        NuclideId { z, a, state }
    }

    /// decode an integer `nucid` (`zzzaaassss`)
    ///
    /// Arguments:
    ///
    /// * `nucid` - encoded identifier as returned by a nuclear-data source
    ///
    /// Returns:
    ///
    /// * `Option<NuclideId>` - `None` for non-positive ids, unknown elements or a mass number below the atomic number
    ///
    /// # Examples
    ///
    /// ```
    /// use gammacore::nuclear::nuclide::NuclideId;
    ///
    /// let k40 = NuclideId::from_nucid(190400000).unwrap();
    /// assert_eq!(k40, NuclideId::new(19, 40, 0));
    /// assert_eq!(NuclideId::from_nucid(-5), None);
    /// ```
    pub fn from_nucid(nucid: i64) -> Option<Self> {
        if nucid <= 0 {
            return None;
        }
        let z = nucid / NUCID_Z_FACTOR;
        let a = (nucid / NUCID_A_FACTOR) % 1000;
        let state = nucid % NUCID_A_FACTOR;

        element_symbol(u32::try_from(z).ok()?)?;
        if a < z {
            return None;
        }
        Some(NuclideId::new(z as u32, a as u32, state as u32))
    }

    /// encode as `nucid` (`zzzaaassss`)
    pub fn nucid(&self) -> i64 {
        self.z as i64 * NUCID_Z_FACTOR + self.a as i64 * NUCID_A_FACTOR + self.state as i64
    }

    /// encode as the compact `zzaaam` identifier
    ///
    /// Returns:
    ///
    /// * `Option<i64>` - `None` when the state does not fit in the single `m` digit
    ///
    /// # Examples
    ///
    /// ```
    /// use gammacore::nuclear::nuclide::NuclideId;
    ///
    /// assert_eq!(NuclideId::new(43, 99, 1).zzaaam(), Some(430991));
    /// assert_eq!(NuclideId::new(43, 99, 12).zzaaam(), None);
    /// ```
    pub fn zzaaam(&self) -> Option<i64> {
        if self.state >= 10 {
            return None;
        }
        Some(self.z as i64 * ZZAAAM_Z_FACTOR + self.a as i64 * ZZAAAM_A_FACTOR + self.state as i64)
    }

    pub fn atomic_number(&self) -> u32 {
        self.z
    }

    pub fn mass_number(&self) -> u32 {
        self.a
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn is_metastable(&self) -> bool {
        self.state > 0
    }

    pub fn symbol(&self) -> Option<&'static str> {
        element_symbol(self.z)
    }
}

impl Display for NuclideId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.symbol() {
            Some(symbol) => write!(f, "{}{}", symbol, self.a)?,
            None => write!(f, "Z{}-{}", self.z, self.a)?,
        }
        match self.state {
            0 => Ok(()),
            1 => write!(f, "M"),
            n => write!(f, "M{}", n),
        }
    }
}

impl FromStr for NuclideId {
    type Err = NuclearDataError;

    /// Parses `K40`, `k-40`, `Tc99m` or `Tc99M2`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let invalid = || NuclearDataError::InvalidNuclideName(name.to_string());
        let pattern = NUCLIDE_NAME.as_ref().map_err(|e| NuclearDataError::Backend(e.to_string()))?;
        let captures = pattern.captures(name.trim()).ok_or_else(invalid)?;

        let z = atomic_number(&captures[1]).ok_or_else(invalid)?;
        let a: u32 = captures[2].parse().map_err(|_| invalid())?;
        if a < z {
            return Err(invalid());
        }
        let state = match (captures.get(3), captures.get(4)) {
            (None, _) => 0,
            (Some(_), Some(digit)) if !digit.as_str().is_empty() => {
                digit.as_str().parse().map_err(|_| invalid())?
            }
            (Some(_), _) => 1,
        };
        Ok(NuclideId::new(z, a, state))
    }
}

impl TryFrom<String> for NuclideId {
    type Error = NuclearDataError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<NuclideId> for String {
    fn from(id: NuclideId) -> Self {
        id.to_string()
    }
}

/// A known gamma emission of a nuclide as used for intensity matching.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnownLine {
    pub intensity: f64,
    pub intensity_uncertainty: f64,
}

impl KnownLine {
    pub fn new(intensity: f64, intensity_uncertainty: f64) -> Self {
        KnownLine { intensity, intensity_uncertainty }
    }

    /// copy of the line with `NaN` fields read as 0
    ///
    /// # Examples
    ///
    /// ```
    /// use gammacore::nuclear::nuclide::KnownLine;
    ///
    /// let line = KnownLine::new(f64::NAN, 0.5).sanitized();
    /// assert_eq!(line, KnownLine::new(0.0, 0.5));
    /// ```
    pub fn sanitized(&self) -> Self {
        let zero_nan = |x: f64| if x.is_nan() { 0.0 } else { x };
        KnownLine::new(zero_nan(self.intensity), zero_nan(self.intensity_uncertainty))
    }

    /// closed intensity range `[intensity - uncertainty, intensity + uncertainty]`
    pub fn bounds(&self) -> (f64, f64) {
        (self.intensity - self.intensity_uncertainty, self.intensity + self.intensity_uncertainty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip_for_ground_and_metastable_states() {
        let tc99m: NuclideId = "Tc99m".parse().unwrap();
        assert_eq!(tc99m, NuclideId::new(43, 99, 1));
        assert!(tc99m.is_metastable());
        assert_eq!(tc99m.to_string(), "Tc99M");

        let k40: NuclideId = "k-40".parse().unwrap();
        assert_eq!(k40.to_string(), "K40");
        assert!(!k40.is_metastable());

        let second_isomer: NuclideId = "Ir192M2".parse().unwrap();
        assert_eq!(second_isomer.state(), 2);
        assert_eq!(second_isomer.to_string(), "Ir192M2");
    }

    #[test]
    fn test_name_pattern_compiles() {
        assert!(NUCLIDE_NAME.is_ok());
    }

    #[test]
    fn test_malformed_names_are_rejected() {
        for name in ["", "40K", "Xx40", "K", "U92x", "Pb10"] {
            assert!(
                matches!(name.parse::<NuclideId>(), Err(NuclearDataError::InvalidNuclideName(_))),
                "{name} should not parse"
            );
        }
    }

    #[test]
    fn test_nucid_decoding() {
        let cs137 = NuclideId::new(55, 137, 0);
        assert_eq!(cs137.nucid(), 551370000);
        assert_eq!(NuclideId::from_nucid(cs137.nucid()), Some(cs137));

        // zzaaam-style ids decode to z = 0 and are rejected
        assert_eq!(NuclideId::from_nucid(190400), None);
        assert_eq!(NuclideId::from_nucid(0), None);
        // mass number below atomic number
        assert_eq!(NuclideId::from_nucid(920100000), None);
    }

    #[test]
    fn test_serde_uses_the_canonical_name() {
        let json = serde_json::to_string(&NuclideId::new(27, 60, 0)).unwrap();
        assert_eq!(json, "\"Co60\"");
        let back: NuclideId = serde_json::from_str("\"Ba137m\"").unwrap();
        assert_eq!(back, NuclideId::new(56, 137, 1));
        assert!(serde_json::from_str::<NuclideId>("\"nonsense\"").is_err());
    }
}
