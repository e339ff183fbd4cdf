//! Patient Records Command-Line Tool
//!
//! Inspect, repair and back up a SQLite-backed patient records store.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use patient_records_core::{
    HealthReport, PatientStore, Snapshot, SqliteStorage, StoreConfig,
};

/// Patient Records Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "patient-records")]
#[command(version, about = "Inspect, repair and back up a patient records store")]
pub struct Args {
    /// SQLite database file
    #[arg(long, default_value = "patients.db")]
    pub db: PathBuf,

    /// JSON store configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Storage capacity in KiB (overrides the configuration)
    #[arg(long)]
    pub capacity_kb: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store if missing and report the record count
    Init,
    /// Check records, manifest and index for inconsistencies
    Health,
    /// Rebuild the manifest and index from the records
    Repair,
    /// List every patient in index order
    List,
    /// Search patients by partial name
    Search {
        term: String,
        /// Show fuzzy suggestions when nothing matches
        #[arg(long, default_value_t = 5)]
        suggest: usize,
    },
    /// Print a patient record as JSON
    Show { id: String },
    /// Delete a patient record
    Delete { id: String },
    /// Write a full backup to a file
    Backup { file: PathBuf },
    /// Replace all records with a backup file
    Restore { file: PathBuf },
    /// Merge records from a backup file into the store
    Import { file: PathBuf },
    /// Write the patient index as CSV
    ExportCsv { file: PathBuf },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("patient_records=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut store = open(&args)?;

    match args.command {
        Command::Init => {
            println!("Store ready with {} record(s)", store.len());
        }
        Command::Health => {
            let report = store.health_check()?;
            print_health(&report);
            if !report.is_healthy() {
                bail!("{} issue(s) found, run `repair`", report.issues.len());
            }
        }
        Command::Repair => {
            let report = store.repair()?;
            print_health(&report.before);
            println!(
                "Repaired: {} record(s) indexed, {} id(s) reconciled",
                report.record_count, report.reconciled_ids
            );
        }
        Command::List => {
            for entry in store.list_patients()? {
                println!("{}\t{}\t{}", entry.id, entry.full_name, entry.place_of_residence);
            }
        }
        Command::Search { term, suggest } => {
            let results = store.search_patients(&term)?;
            for entry in &results {
                println!("{}\t{}\t{}", entry.id, entry.full_name, entry.place_of_residence);
            }
            if results.is_empty() {
                println!("No patients match '{}'", term);
                for suggestion in store.suggest_patients(&term, suggest)? {
                    println!(
                        "  did you mean {} ({:.2})? {}",
                        suggestion.entry.full_name, suggestion.score, suggestion.entry.id
                    );
                }
            }
        }
        Command::Show { id } => {
            let patient = store
                .load(&id)?
                .with_context(|| format!("no patient with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&patient)?);
        }
        Command::Delete { id } => {
            let deleted = store.delete(&id)?;
            println!("Deleted {}", deleted);
        }
        Command::Backup { file } => {
            let snapshot = store.backup()?;
            snapshot
                .write_to_file(&file)
                .with_context(|| format!("writing {}", file.display()))?;
            println!(
                "Wrote {} record(s) to {}",
                snapshot.manifest.record_count,
                file.display()
            );
        }
        Command::Restore { file } => {
            let snapshot = read_snapshot(&file)?;
            let count = store.restore(snapshot)?;
            println!("Restored {} record(s) from {}", count, file.display());
        }
        Command::Import { file } => {
            let snapshot = read_snapshot(&file)?;
            let report = store.merge(snapshot)?;
            println!("Imported {} record(s)", report.imported.len());
            for rejected in &report.rejected {
                let reasons: Vec<String> =
                    rejected.violations.iter().map(|v| v.to_string()).collect();
                println!("  rejected {}: {}", rejected.id, reasons.join("; "));
            }
        }
        Command::ExportCsv { file } => {
            let csv = store.export_index_csv()?;
            std::fs::write(&file, csv).with_context(|| format!("writing {}", file.display()))?;
            println!("Wrote {} row(s) to {}", store.len(), file.display());
        }
    }

    Ok(())
}

/// Open and initialize the store named by the arguments.
fn open(args: &Args) -> Result<PatientStore<SqliteStorage>> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(kb) = args.capacity_kb {
        config = config.with_capacity_bytes(kb * 1024);
    }

    let storage = SqliteStorage::open(&args.db)
        .with_context(|| format!("opening {}", args.db.display()))?
        .with_capacity(config.capacity_bytes);

    let mut store = PatientStore::with_config(storage, config);
    let report = store.initialize()?;
    if report.recovered_from_corruption {
        eprintln!("Warning: records were unreadable and have been quarantined");
    }
    Ok(store)
}

fn read_snapshot(file: &PathBuf) -> Result<Snapshot> {
    Snapshot::read_from_file(file).with_context(|| format!("reading backup {}", file.display()))
}

fn print_health(report: &HealthReport) {
    println!(
        "records: {}  manifest: {}  index: {}",
        report.record_count,
        report
            .manifest_count
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
        report.index_count
    );
    if report.is_healthy() {
        println!("healthy");
    }
    for issue in &report.issues {
        println!("  {:?}", issue);
    }
}
