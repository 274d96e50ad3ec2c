use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use protocol::{DeclarationRecord, Severity, UnitSetDocument};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use unitmerge::{EngineConfig, Pipeline, TranslationUnit, UnitSet};

#[derive(Parser)]
#[command(name = "unitmerge")]
#[command(about = "Deduplicate and merge C++ declaration records into canonical code units", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge translation units, one JSON array of declaration records per file
    Merge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        jobs: Option<usize>,

        #[arg(long)]
        no_branch_notes: bool,

        #[arg(long)]
        pretty: bool,
    },

    /// Cross-unit merge of previously emitted unit-set documents
    Remerge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Merge { inputs, output, jobs, no_branch_notes, pretty } => {
            let mut config = EngineConfig::default();
            if let Some(jobs) = jobs {
                config = config.with_jobs(jobs);
            }
            if no_branch_notes {
                config = config.without_branch_notes();
            }

            let units = inputs.iter().map(|path| load_translation_unit(path)).collect::<Result<Vec<_>>>()?;
            let run = Pipeline::new(config).run_project(&units)?;
            info!(
                "Folded {} duplicate occurrences into {} code units",
                run.stats.duplicates_folded(),
                run.stats.units_emitted
            );
            report(&run.units);
            write_document(run.units, output.as_deref(), pretty)?;
        }

        Commands::Remerge { inputs, output, pretty } => {
            let mut sets = Vec::with_capacity(inputs.len());
            for path in &inputs {
                let document = load_document(path)?;
                let set = UnitSet::from_document(document)
                    .with_context(|| format!("Failed to accept document {}", path.display()))?;
                sets.push(set);
            }

            let merged = Pipeline::default().merge_unit_sets(sets);
            report(&merged);
            write_document(merged, output.as_deref(), pretty)?;
        }
    }

    Ok(())
}

fn load_translation_unit(path: &Path) -> Result<TranslationUnit> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<DeclarationRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse declaration records in {}", path.display()))?;
    Ok(TranslationUnit::new(path.to_string_lossy(), records))
}

fn load_document(path: &Path) -> Result<UnitSetDocument> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse unit-set document {}", path.display()))
}

fn report(set: &UnitSet) {
    for diagnostic in &set.diagnostics {
        match diagnostic.severity {
            Severity::Error | Severity::Warning => warn!("{}", diagnostic),
            Severity::Note => info!("{}", diagnostic),
        }
    }
}

fn write_document(set: UnitSet, output: Option<&Path>, pretty: bool) -> Result<()> {
    let document = set.into_document();
    let json = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} code units to {}", document.units.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
