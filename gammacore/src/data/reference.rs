use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NuclearDataError;
use crate::nuclear::nuclide::{KnownLine, NuclideId};

/// Read-only access to nuclear decay data.
///
/// Parent lookups return raw integer `nucid`s (`zzzaaassss`); decoding and plausibility
/// filtering are left to candidate discovery. Implementations return an empty list for
/// energies they know nothing about and reserve errors for backend failures.
pub trait NuclearData {
    /// nucids of nuclides with a gamma line in `[energy - energy_uncertainty, energy + energy_uncertainty]`
    fn find_parents(&self, energy: f64, energy_uncertainty: f64) -> Result<Vec<i64>, NuclearDataError>;

    /// all known gamma lines of a nuclide, fields may be `NaN`
    fn known_lines(&self, nuclide: NuclideId) -> Result<Vec<KnownLine>, NuclearDataError>;

    /// natural abundance in [0, 1], 0 for synthetic or unknown
    fn natural_abundance(&self, nuclide: NuclideId) -> Result<f64, NuclearDataError>;

    fn atomic_mass(&self, nuclide: NuclideId) -> Result<f64, NuclearDataError>;

    fn display_name(&self, nuclide: NuclideId) -> Result<String, NuclearDataError> {
        Ok(nuclide.to_string())
    }
}

/// A reference gamma line: where it sits in energy and how intense it is.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GammaLine {
    pub energy: f64,
    #[serde(default)]
    pub energy_uncertainty: f64,
    #[serde(default = "not_a_number", deserialize_with = "nullable_f64")]
    pub intensity: f64,
    #[serde(default = "not_a_number", deserialize_with = "nullable_f64")]
    pub intensity_uncertainty: f64,
}

impl GammaLine {
    pub fn new(energy: f64, energy_uncertainty: f64, intensity: f64, intensity_uncertainty: f64) -> Self {
        GammaLine { energy, energy_uncertainty, intensity, intensity_uncertainty }
    }

    pub fn known_line(&self) -> KnownLine {
        KnownLine::new(self.intensity, self.intensity_uncertainty)
    }
}

fn not_a_number() -> f64 {
    f64::NAN
}

fn nullable_f64<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Reference data of a single nuclide.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NuclideRecord {
    pub nuclide: NuclideId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub natural_abundance: f64,
    pub atomic_mass: f64,
    #[serde(default)]
    pub lines: Vec<GammaLine>,
}

impl NuclideRecord {
    pub fn new(nuclide: NuclideId, natural_abundance: f64, atomic_mass: f64, lines: Vec<GammaLine>) -> Self {
        NuclideRecord { nuclide, name: None, natural_abundance, atomic_mass, lines }
    }
}

#[derive(Serialize, Deserialize)]
struct LibraryFile {
    nuclides: Vec<NuclideRecord>,
}

/// In-memory nuclear reference data, loadable from JSON.
///
/// # Example
///
/// ```rust
/// # use gammacore::data::reference::{GammaLine, NuclearData, NuclideRecord, ReferenceLibrary};
/// # use gammacore::nuclear::nuclide::NuclideId;
/// let k40: NuclideId = "K40".parse().unwrap();
/// let mut library = ReferenceLibrary::new();
/// library.insert(NuclideRecord::new(k40, 0.000117, 39.964, vec![GammaLine::new(1460.82, 0.005, 10.66, 0.13)]));
///
/// assert_eq!(library.find_parents(1460.0, 1.0).unwrap(), vec![k40.nucid()]);
/// assert!(library.find_parents(100.0, 1.0).unwrap().is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ReferenceLibrary {
    records: Vec<NuclideRecord>,
    index: HashMap<NuclideId, usize>,
}

impl ReferenceLibrary {
    pub fn new() -> Self {
        ReferenceLibrary::default()
    }

    pub fn from_records(records: Vec<NuclideRecord>) -> Self {
        let mut library = ReferenceLibrary::new();
        for record in records {
            library.insert(record);
        }
        library
    }

    /// Parses the `{"nuclides": [...]}` JSON layout.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let file: LibraryFile = serde_json::from_str(json)?;
        Ok(ReferenceLibrary::from_records(file.nuclides))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, NuclearDataError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| NuclearDataError::Backend(format!("{}: {}", path.display(), e)))?;
        ReferenceLibrary::from_json_str(&text)
            .map_err(|e| NuclearDataError::Backend(format!("{}: {}", path.display(), e)))
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&LibraryFile { nuclides: self.records.clone() })
    }

    /// Inserts a record, replacing an existing record for the same nuclide.
    pub fn insert(&mut self, record: NuclideRecord) {
        match self.index.get(&record.nuclide) {
            Some(&position) => self.records[position] = record,
            None => {
                self.index.insert(record.nuclide, self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, nuclide: NuclideId) -> Option<&NuclideRecord> {
        self.index.get(&nuclide).map(|&position| &self.records[position])
    }

    pub fn records(&self) -> &[NuclideRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record(&self, nuclide: NuclideId) -> Result<&NuclideRecord, NuclearDataError> {
        self.get(nuclide).ok_or(NuclearDataError::UnknownNuclide(nuclide))
    }
}

impl NuclearData for ReferenceLibrary {
    /// One nucid per line inside the window, in library order.
    fn find_parents(&self, energy: f64, energy_uncertainty: f64) -> Result<Vec<i64>, NuclearDataError> {
        let (lower, upper) = (energy - energy_uncertainty, energy + energy_uncertainty);
        Ok(self
            .records
            .iter()
            .flat_map(|record| {
                record
                    .lines
                    .iter()
                    .filter(move |line| lower <= line.energy && line.energy <= upper)
                    .map(move |_| record.nuclide.nucid())
            })
            .collect())
    }

    fn known_lines(&self, nuclide: NuclideId) -> Result<Vec<KnownLine>, NuclearDataError> {
        Ok(self.record(nuclide)?.lines.iter().map(GammaLine::known_line).collect())
    }

    fn natural_abundance(&self, nuclide: NuclideId) -> Result<f64, NuclearDataError> {
        Ok(self.record(nuclide)?.natural_abundance)
    }

    fn atomic_mass(&self, nuclide: NuclideId) -> Result<f64, NuclearDataError> {
        Ok(self.record(nuclide)?.atomic_mass)
    }

    fn display_name(&self, nuclide: NuclideId) -> Result<String, NuclearDataError> {
        let record = self.record(nuclide)?;
        Ok(record.name.clone().unwrap_or_else(|| nuclide.to_string()))
    }
}
