use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gammacore::algorithm::discovery::CandidateMerge;
use gammacore::algorithm::efficiency::EfficiencyCurve;
use gammacore::algorithm::identification::{analyze, analyze_batch, AnalysisConfig, AnalysisReport};
use gammacore::algorithm::ranking::RankingConfig;
use gammacore::algorithm::scoring::LineCounting;
use gammacore::data::peak::Spectrum;
use gammacore::data::reference::ReferenceLibrary;
use gammacore::error::AnalysisError;
use gammacore::nuclear::constants::{LEADERBOARD_CAPACITY, LIGHT_NUCLIDE_MASS_LIMIT};
use gammadb::data::handle::NuclearDataHandle;
use gammadb::data::spectrum_io::{
    format_identifications, read_spectra_csv, write_report_json, RunReport, SpectrumOutcome, SpectrumSet,
};

#[derive(Parser)]
#[command(name = "gammadb", version)]
#[command(about = "Identify radioactive sources from gamma-ray peak lists")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank candidate sources for one or more spectra
    Identify(IdentifyArgs),
    /// Load a JSON reference library into an SQLite database
    Import(ImportArgs),
}

#[derive(Args)]
struct IdentifyArgs {
    /// JSON reference library
    #[arg(long, conflicts_with = "database", required_unless_present = "database")]
    library: Option<PathBuf>,

    /// SQLite database created by `gammadb import`
    #[arg(long)]
    database: Option<PathBuf>,

    /// CSV peak list, optionally with a `spectrum` column
    #[arg(long, conflicts_with = "energies")]
    csv: Option<PathBuf>,

    /// Comma-separated peak energies (keV)
    #[arg(long, requires_all = ["energy_uncertainties", "intensities", "intensity_uncertainties"])]
    energies: Option<String>,

    #[arg(long, requires = "energies")]
    energy_uncertainties: Option<String>,

    #[arg(long, requires = "energies")]
    intensities: Option<String>,

    #[arg(long, requires = "energies")]
    intensity_uncertainties: Option<String>,

    /// Use intensities as given, without detector efficiency correction
    #[arg(long)]
    no_efficiency: bool,

    /// Drop peaks outside the calibrated range instead of failing
    #[arg(long)]
    drop_uncalibrated: bool,

    /// Keep one candidate per matching line instead of one per nuclide
    #[arg(long)]
    keep_duplicates: bool,

    /// Count a known line at most once, however many peaks it overlaps
    #[arg(long)]
    distinct_lines: bool,

    /// Slots per leaderboard
    #[arg(long, default_value_t = LEADERBOARD_CAPACITY)]
    capacity: usize,

    /// Atomic mass (u) up to which a nuclide counts as light
    #[arg(long, default_value_t = LIGHT_NUCLIDE_MASS_LIMIT)]
    light_mass_limit: f64,

    /// Champion challengers must also improve on the match fraction
    #[arg(long)]
    require_improving_match: bool,

    /// Threads used when several spectra are analysed
    #[arg(long, default_value_t = 4)]
    num_threads: usize,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

impl IdentifyArgs {
    fn config(&self) -> AnalysisConfig {
        AnalysisConfig {
            efficiency: if self.no_efficiency { None } else { Some(EfficiencyCurve::germanium()) },
            drop_uncalibrated: self.drop_uncalibrated,
            candidate_merge: if self.keep_duplicates { CandidateMerge::KeepDuplicates } else { CandidateMerge::Distinct },
            line_counting: if self.distinct_lines { LineCounting::Distinct } else { LineCounting::PerPeak },
            ranking: RankingConfig {
                capacity: self.capacity,
                light_mass_limit: self.light_mass_limit,
                require_improving_match: self.require_improving_match,
            },
        }
    }

    fn spectra(&self) -> Result<SpectrumSet> {
        if let Some(path) = &self.csv {
            return read_spectra_csv(path);
        }
        match (&self.energies, &self.energy_uncertainties, &self.intensities, &self.intensity_uncertainties) {
            (Some(e), Some(de), Some(i), Some(di)) => {
                let spectrum = Spectrum::from_text_columns(e, de, i, di).context("parsing peak columns")?;
                Ok(SpectrumSet::single("input", spectrum))
            }
            (None, None, None, None) => {
                log::info!("no spectrum given, using the banana reference spectrum");
                Ok(SpectrumSet::single("banana", Spectrum::banana()))
            }
            _ => bail!("--energies, --energy-uncertainties, --intensities and --intensity-uncertainties go together"),
        }
    }
}

#[derive(Args)]
struct ImportArgs {
    /// JSON reference library to import
    #[arg(long)]
    library: PathBuf,

    /// SQLite database, created if missing
    #[arg(long)]
    database: PathBuf,
}

fn run_identify(args: &IdentifyArgs) -> Result<()> {
    let config = args.config();
    let set = args.spectra()?;

    let results: Vec<Result<AnalysisReport, AnalysisError>> = match (&args.library, &args.database) {
        (Some(path), _) => {
            let library = ReferenceLibrary::from_json_file(path)?;
            log::info!("loaded {} nuclides from {}", library.len(), path.display());
            analyze_batch(&library, &set.spectra, &config, args.num_threads)
        }
        (None, Some(path)) => {
            let handle = NuclearDataHandle::new(path).with_context(|| format!("opening {}", path.display()))?;
            if set.len() == 1 {
                vec![analyze(&handle, &set.spectra[0], &config)]
            } else {
                // one connection cannot be shared between threads
                let library = handle.export_library().context("reading nuclear data")?;
                analyze_batch(&library, &set.spectra, &config, args.num_threads)
            }
        }
        (None, None) => bail!("either --library or --database is required"),
    };

    let mut failed = 0;
    let mut outcomes = Vec::with_capacity(results.len());
    for (name, result) in set.names.iter().zip(&results) {
        if set.len() > 1 {
            println!("[{}]", name);
        }
        match result {
            Ok(report) => {
                print!("{}", format_identifications(report));
                outcomes.push(SpectrumOutcome { spectrum: name, report: Some(report), error: None });
            }
            Err(e) => {
                failed += 1;
                log::error!("{}: {}", name, e);
                println!("error: {}", e);
                outcomes.push(SpectrumOutcome { spectrum: name, report: None, error: Some(e.to_string()) });
            }
        }
    }

    if let Some(path) = &args.json {
        write_report_json(path, &RunReport { config: &config, results: outcomes })?;
        log::info!("report written to {}", path.display());
    }

    if failed > 0 {
        bail!("{} of {} spectra could not be analysed", failed, set.len());
    }
    Ok(())
}

fn run_import(args: &ImportArgs) -> Result<()> {
    let library = ReferenceLibrary::from_json_file(&args.library)?;
    let mut handle =
        NuclearDataHandle::new(&args.database).with_context(|| format!("opening {}", args.database.display()))?;
    handle.create_schema().context("creating schema")?;
    let lines = handle.import_library(&library).context("importing library")?;
    println!("imported {} nuclides with {} gamma lines into {}", library.len(), lines, args.database.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Identify(args) => run_identify(args),
        Command::Import(args) => run_import(args),
    }
}
