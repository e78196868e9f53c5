use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};

use scholar_progress::{
    config::Config,
    db::{self, PgStore, Store},
    memory::MemoryStore,
    report, State,
};

#[derive(Parser)]
#[command(name = "scholar-progress")]
#[command(about = "Research scholar progress tracking service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample cohort owned by an admin
    Seed {
        #[arg(long)]
        created_by: String,
    },
    /// Import attendance from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Serve the REST API
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
        /// Keep everything in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
        /// Seed the sample cohort for this admin on startup
        #[arg(long)]
        seed_for: Option<String>,
    },
    /// Generate a markdown report for an admin's scholars
    Report {
        #[arg(long)]
        created_by: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgStore> {
    PgStore::connect(config.database_url()?, config.database_max_connections).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scholar_progress::init_tracing();
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::InitDb => {
            let store = connect(&config).await?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed { created_by } => {
            let store = connect(&config).await?;
            let inserted = db::seed(&store, &created_by).await?;
            println!("Seeded {inserted} scholars.");
        }
        Commands::Import { csv } => {
            let store = connect(&config).await?;
            let saved = db::import_attendance_csv(&store, &csv).await?;
            println!("Saved {saved} attendance records from {}.", csv.display());
        }
        Commands::Serve {
            port,
            in_memory,
            seed_for,
        } => {
            let store: Arc<dyn Store> = if in_memory {
                Arc::new(MemoryStore::default())
            } else {
                let store = connect(&config).await?;
                db::init_db(store.pool()).await?;
                Arc::new(store)
            };

            if let Some(admin) = seed_for {
                db::seed(store.as_ref(), &admin).await?;
            }

            let port = port.unwrap_or(config.port);
            let state = State::new(config, store)?;
            scholar_progress::serve(state, port).await?;
        }
        Commands::Report { created_by, out } => {
            let store = connect(&config).await?;
            let created_by = scholar_progress::models::normalize_email(&created_by);
            let scholars = store.scholars_created_by(&created_by).await?;
            let attendance = store.attendance_created_by(&created_by).await?;

            let report = report::build_report(
                Some(&created_by),
                Utc::now().date_naive(),
                &scholars,
                &attendance,
            );
            std::fs::write(&out, report::render_markdown(&report))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
