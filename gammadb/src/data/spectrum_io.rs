use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use gammacore::algorithm::identification::{AnalysisConfig, AnalysisReport};
use gammacore::data::peak::{Peak, Spectrum};
use serde::{Deserialize, Serialize};

/// Name given to rows of a CSV file without a `spectrum` column.
pub const DEFAULT_SPECTRUM_NAME: &str = "spectrum";

#[derive(Debug, Deserialize)]
struct PeakRow {
    #[serde(default)]
    spectrum: Option<String>,
    energy: f64,
    energy_uncertainty: f64,
    intensity: f64,
    intensity_uncertainty: f64,
}

/// Spectra read from one input, in order of first appearance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpectrumSet {
    pub names: Vec<String>,
    pub spectra: Vec<Spectrum>,
}

impl SpectrumSet {
    pub fn single(name: &str, spectrum: Spectrum) -> Self {
        SpectrumSet {
            names: vec![name.to_string()],
            spectra: vec![spectrum],
        }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

/// Reads spectra from a CSV file, see [`read_spectra`].
pub fn read_spectra_csv(path: &Path) -> Result<SpectrumSet> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_spectra(file).with_context(|| format!("reading {}", path.display()))
}

/// read peak rows and group them into spectra
///
/// Arguments:
///
/// * `reader` - CSV with header `energy,energy_uncertainty,intensity,intensity_uncertainty`
///   and an optional `spectrum` column naming the spectrum each row belongs to
///
/// Returns:
///
/// * `Result<SpectrumSet>` - one validated spectrum per distinct name
///
pub fn read_spectra<R: Read>(reader: R) -> Result<SpectrumSet> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut names: Vec<String> = Vec::new();
    let mut peaks: Vec<Vec<Peak>> = Vec::new();

    for (row_no, result) in csv_reader.deserialize::<PeakRow>().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        let name = row.spectrum.unwrap_or_else(|| DEFAULT_SPECTRUM_NAME.to_string());
        let peak = Peak::new(row.energy, row.energy_uncertainty, row.intensity, row.intensity_uncertainty);

        match names.iter().position(|n| *n == name) {
            Some(position) => peaks[position].push(peak),
            None => {
                names.push(name);
                peaks.push(vec![peak]);
            }
        }
    }

    if names.is_empty() {
        bail!("no peaks found");
    }

    let mut spectra = Vec::with_capacity(peaks.len());
    for (name, peaks) in names.iter().zip(peaks) {
        let spectrum = Spectrum::from_peaks(peaks).with_context(|| format!("spectrum `{name}`"))?;
        spectra.push(spectrum);
    }

    Ok(SpectrumSet { names, spectra })
}

/// Outcome of one spectrum in a written report.
#[derive(Debug, Serialize)]
pub struct SpectrumOutcome<'a> {
    pub spectrum: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<&'a AnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A run's configuration together with every outcome.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub config: &'a AnalysisConfig,
    pub results: Vec<SpectrumOutcome<'a>>,
}

pub fn write_report_json(path: &Path, report: &RunReport<'_>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report).context("writing JSON report")?;
    writer.flush().context("writing JSON report")?;
    Ok(())
}

/// render the identifications of one report as text
///
/// Arguments:
///
/// * `report` - analysis report
///
/// Returns:
///
/// * `String` - one line per identification, or a note that nothing was identified
///
pub fn format_identifications(report: &AnalysisReport) -> String {
    if report.identifications.is_empty() {
        return "no source identified\n".to_string();
    }
    let mut text = String::new();
    for identification in &report.identifications {
        let candidate = &identification.candidate;
        text.push_str(&format!(
            "{} (match {:.2}, {}/{} lines, abundance {})\n",
            identification,
            candidate.match_fraction,
            candidate.match_count,
            candidate.known_line_count,
            candidate.natural_abundance
        ));
    }
    text
}
