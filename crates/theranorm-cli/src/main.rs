use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use theranorm_core::{Config, DrugStore, Merge, SourceName, SurrealStore};

#[derive(Parser)]
#[command(name = "theranorm")]
#[command(about = "Drug concept normalization and merging", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild all merged concept records from the loaded identity records
    Normalize,
    /// Check that the store schema exists and tables are populated
    CheckDb,
    /// Show metadata for each loaded source
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = SurrealStore::open(&config.store.store_path()).await?;

    match cli.command {
        Commands::Normalize => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
            spinner.set_message("merging concept groups...");
            spinner.enable_steady_tick(Duration::from_millis(100));

            let mut merge = Merge::new(Arc::new(store));
            let stats = merge.create_merged_concepts(None).await?;

            spinner.finish_and_clear();
            println!("Merged concept generation complete.");
            println!("  Groups:          {}", stats.groups);
            println!("  Merged records:  {}", stats.merged_records);
            println!("  Refs updated:    {}", stats.refs_updated);
            if stats.refs_failed > 0 {
                println!("  Refs failed:     {}", stats.refs_failed);
            }
        }
        Commands::CheckDb => {
            let schema = store.check_schema_initialized().await?;
            let populated = store.check_tables_populated().await?;
            println!("Schema initialized: {}", if schema { "yes" } else { "no" });
            println!("Tables populated:   {}", if populated { "yes" } else { "no" });
            if !schema || !populated {
                return Err("store is not ready; load source data first".into());
            }
        }
        Commands::Status => {
            for src in SourceName::all() {
                match store.get_source_metadata(src).await? {
                    Some(meta) => {
                        println!("{}:", src);
                        println!("  version: {}", meta.version);
                        println!("  license: {}", meta.data_license);
                        if let Some(updated) = meta.last_updated {
                            println!("  updated: {}", updated.format("%Y-%m-%d"));
                        }
                    }
                    None => println!("{}: not loaded", src),
                }
            }
        }
    }
    Ok(())
}
