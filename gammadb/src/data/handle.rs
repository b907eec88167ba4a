use std::path::Path;

use gammacore::data::reference::{GammaLine, NuclearData, NuclideRecord, ReferenceLibrary};
use gammacore::error::NuclearDataError;
use gammacore::nuclear::nuclide::{KnownLine, NuclideId};
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS nuclides (
        nucid INTEGER PRIMARY KEY,
        name TEXT,
        natural_abundance REAL NOT NULL DEFAULT 0,
        atomic_mass REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS gamma_lines (
        line_id INTEGER PRIMARY KEY AUTOINCREMENT,
        nucid INTEGER NOT NULL REFERENCES nuclides(nucid),
        energy REAL NOT NULL,
        energy_uncertainty REAL NOT NULL DEFAULT 0,
        intensity REAL,
        intensity_uncertainty REAL
    );
    CREATE INDEX IF NOT EXISTS gamma_lines_by_energy ON gamma_lines(energy);
    CREATE INDEX IF NOT EXISTS gamma_lines_by_nucid ON gamma_lines(nucid);
";

/// Nuclear reference data stored in an SQLite database.
///
/// Two tables are used: `nuclides` (one row per nuclide, keyed by nucid) and
/// `gamma_lines` (one row per line). Missing intensities are stored as `NULL`
/// and read back as `NaN`.
#[derive(Debug)]
pub struct NuclearDataHandle {
    pub connection: Connection,
}

impl NuclearDataHandle {
    pub fn new(path: &Path) -> rusqlite::Result<Self> {
        let connection = Connection::open(path)?;
        Ok(Self { connection })
    }

    pub fn in_memory() -> rusqlite::Result<Self> {
        let connection = Connection::open_in_memory()?;
        Ok(Self { connection })
    }

    /// Creates both tables and their indices if they do not exist yet.
    pub fn create_schema(&self) -> rusqlite::Result<()> {
        self.connection.execute_batch(SCHEMA)
    }

    /// write all records of a library in one transaction
    ///
    /// Arguments:
    ///
    /// * `library` - records to store; a nuclide already present is replaced together with its lines
    ///
    /// Returns:
    ///
    /// * `rusqlite::Result<usize>` - number of gamma lines written
    ///
    pub fn import_library(&mut self, library: &ReferenceLibrary) -> rusqlite::Result<usize> {
        let transaction = self.connection.transaction()?;
        let mut written = 0;
        {
            let mut delete_lines = transaction.prepare("DELETE FROM gamma_lines WHERE nucid = ?1")?;
            let mut insert_nuclide = transaction.prepare(
                "INSERT OR REPLACE INTO nuclides (nucid, name, natural_abundance, atomic_mass) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut insert_line = transaction.prepare(
                "INSERT INTO gamma_lines (nucid, energy, energy_uncertainty, intensity, intensity_uncertainty) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for record in library.records() {
                let nucid = record.nuclide.nucid();
                delete_lines.execute(params![nucid])?;
                insert_nuclide.execute(params![nucid, record.name, record.natural_abundance, record.atomic_mass])?;
                for line in &record.lines {
                    insert_line.execute(params![
                        nucid,
                        line.energy,
                        line.energy_uncertainty,
                        not_nan(line.intensity),
                        not_nan(line.intensity_uncertainty),
                    ])?;
                    written += 1;
                }
            }
        }
        transaction.commit()?;
        log::info!("imported {} nuclides with {} gamma lines", library.len(), written);
        Ok(written)
    }

    /// Reads the whole database into an in-memory library, nuclides ordered by nucid.
    pub fn export_library(&self) -> rusqlite::Result<ReferenceLibrary> {
        let mut stmt = self.connection.prepare(
            "SELECT nucid, name, natural_abundance, atomic_mass FROM nuclides ORDER BY nucid",
        )?;
        let records_iter = stmt.query_map([], |row| {
            let nucid: i64 = row.get(0)?;
            let nuclide = NuclideId::from_nucid(nucid).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Integer,
                    Box::new(NuclearDataError::Backend(format!("invalid nucid {}", nucid))),
                )
            })?;
            Ok(NuclideRecord {
                nuclide,
                name: row.get(1)?,
                natural_abundance: row.get(2)?,
                atomic_mass: row.get(3)?,
                lines: Vec::new(),
            })
        })?;

        let mut records = Vec::new();
        for record in records_iter {
            let mut record = record?;
            record.lines = self.read_lines(record.nuclide)?;
            records.push(record);
        }
        Ok(ReferenceLibrary::from_records(records))
    }

    fn read_lines(&self, nuclide: NuclideId) -> rusqlite::Result<Vec<GammaLine>> {
        let mut stmt = self.connection.prepare(
            "SELECT energy, energy_uncertainty, intensity, intensity_uncertainty \
             FROM gamma_lines WHERE nucid = ?1 ORDER BY line_id",
        )?;
        let lines_iter = stmt.query_map(params![nuclide.nucid()], |row| {
            Ok(GammaLine::new(
                row.get(0)?,
                row.get(1)?,
                nan_if_null(row.get(2)?),
                nan_if_null(row.get(3)?),
            ))
        })?;
        let mut lines = Vec::new();
        for line in lines_iter {
            lines.push(line?);
        }
        Ok(lines)
    }

    fn read_nuclide(&self, nuclide: NuclideId) -> Result<(Option<String>, f64, f64), NuclearDataError> {
        let row: Option<(Option<String>, f64, f64)> = self
            .connection
            .query_row(
                "SELECT name, natural_abundance, atomic_mass FROM nuclides WHERE nucid = ?1",
                params![nuclide.nucid()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(backend)?;
        row.ok_or(NuclearDataError::UnknownNuclide(nuclide))
    }
}

fn backend(e: rusqlite::Error) -> NuclearDataError {
    NuclearDataError::Backend(e.to_string())
}

fn not_nan(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

fn nan_if_null(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NAN)
}

impl NuclearData for NuclearDataHandle {
    fn find_parents(&self, energy: f64, energy_uncertainty: f64) -> Result<Vec<i64>, NuclearDataError> {
        let mut stmt = self
            .connection
            .prepare("SELECT nucid FROM gamma_lines WHERE energy BETWEEN ?1 AND ?2 ORDER BY line_id")
            .map_err(backend)?;
        let parents_iter = stmt
            .query_map(params![energy - energy_uncertainty, energy + energy_uncertainty], |row| row.get::<_, i64>(0))
            .map_err(backend)?;
        let mut parents = Vec::new();
        for parent in parents_iter {
            parents.push(parent.map_err(backend)?);
        }
        Ok(parents)
    }

    fn known_lines(&self, nuclide: NuclideId) -> Result<Vec<KnownLine>, NuclearDataError> {
        self.read_nuclide(nuclide)?;
        let lines = self.read_lines(nuclide).map_err(backend)?;
        Ok(lines.iter().map(GammaLine::known_line).collect())
    }

    fn natural_abundance(&self, nuclide: NuclideId) -> Result<f64, NuclearDataError> {
        Ok(self.read_nuclide(nuclide)?.1)
    }

    fn atomic_mass(&self, nuclide: NuclideId) -> Result<f64, NuclearDataError> {
        Ok(self.read_nuclide(nuclide)?.2)
    }

    fn display_name(&self, nuclide: NuclideId) -> Result<String, NuclearDataError> {
        let (name, _, _) = self.read_nuclide(nuclide)?;
        Ok(name.unwrap_or_else(|| nuclide.to_string()))
    }
}
