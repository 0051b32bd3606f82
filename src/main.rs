//! # Tender Watch CLI (`tw`)
//!
//! The `tw` binary is the primary interface for Tender Watch. It provides
//! commands for database initialization, fetching tenders from the remote
//! registry, running analyses, and starting the background monitoring
//! scheduler.
//!
//! ## Usage
//!
//! ```bash
//! tw --config ./config/tw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tw init` | Create the SQLite database and run schema migrations |
//! | `tw sync <tender_id>` | Fetch one tender from the registry and upsert it |
//! | `tw tenders` | List stored tenders |
//! | `tw analyze <tender_id>` | Run the five-part analysis and persist the result |
//! | `tw execution <tender_id>` | Analyze execution progress over the tender's milestones |
//! | `tw watch` | Run the background monitoring scheduler until Ctrl-C |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tender_watch::analyzer::TenderAnalyzer;
use tender_watch::completion::create_client;
use tender_watch::scheduler::TenderScheduler;
use tender_watch::source::{HttpTenderSource, TenderSource};
use tender_watch::{config, db, execution, migrate, store};

/// Tender Watch — monitoring and AI-assisted analysis of government
/// procurement tenders.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tw.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tw",
    about = "Tender Watch — monitoring and AI-assisted analysis of government procurement tenders",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (tenders,
    /// milestones, analyses, anomalies). Idempotent.
    Init,

    /// Fetch one tender from the remote registry and upsert it.
    Sync {
        /// External registry number of the tender.
        tender_id: String,
    },

    /// List stored tenders.
    Tenders,

    /// Run the five-part analysis for a stored tender and persist the
    /// result with its anomaly findings.
    Analyze {
        /// External registry number of the tender.
        tender_id: String,

        /// Redact PII-shaped substrings from the analysis text,
        /// overriding `[analysis].confidential_mode`.
        #[arg(long)]
        confidential: bool,

        /// Print the result as pretty JSON instead of the text report.
        #[arg(long)]
        json: bool,
    },

    /// Analyze execution progress over the tender's milestones.
    Execution {
        /// External registry number of the tender.
        tender_id: String,

        /// Print the report as pretty JSON instead of the text report.
        #[arg(long)]
        json: bool,
    },

    /// Run the background monitoring scheduler until Ctrl-C.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tender_watch=info,tw=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { tender_id } => {
            let pool = db::connect(&cfg).await?;
            let source = HttpTenderSource::new(&cfg.source)?;
            let item = source.fetch(&tender_id).await?;
            store::upsert_tender(&pool, &item).await?;

            println!("sync {}", tender_id);
            println!("  title: {}", item.title);
            println!("  status: {}", item.status);
            match item.price {
                Some(price) => println!("  price: {:.2}", price),
                None => println!("  price: -"),
            }
            println!("ok");
            pool.close().await;
        }
        Commands::Tenders => {
            let pool = db::connect(&cfg).await?;
            let tenders = store::list_tenders(&pool).await?;

            println!("{:<22} {:<12} {:>14}  DEADLINE", "TENDER", "STATUS", "PRICE");
            for tender in &tenders {
                let price = tender
                    .price
                    .map(|p| format!("{:.2}", p))
                    .unwrap_or_else(|| "-".to_string());
                let deadline = tender
                    .submission_deadline
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<22} {:<12} {:>14}  {}",
                    tender.tender_id, tender.status, price, deadline
                );
            }
            println!("{} tender(s)", tenders.len());
            pool.close().await;
        }
        Commands::Analyze {
            tender_id,
            confidential,
            json,
        } => {
            let pool = db::connect(&cfg).await?;
            let Some(tender) = store::get_tender(&pool, &tender_id).await? else {
                anyhow::bail!("Tender {} not found; run `tw sync {}` first", tender_id, tender_id);
            };

            let client = create_client(&cfg.completion)?;
            let analyzer =
                TenderAnalyzer::new(client, confidential || cfg.analysis.confidential_mode);
            let result = analyzer.analyze(&tender).await;
            store::insert_analysis(&pool, &tender.id, &result).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("analysis for {}", tender_id);
                println!("  risk score: {:.1}", result.risk_score);
                println!("  anomalies: {}", result.anomalies.len());
                for finding in &result.anomalies {
                    println!(
                        "    [{}] {}: {}",
                        finding.severity.as_str(),
                        finding.anomaly_type.as_str(),
                        finding.description
                    );
                }
                println!("\n--- technical ---\n{}", result.technical_analysis);
                println!("\n--- budget ---\n{}", result.budget_analysis);
                println!("\n--- risk ---\n{}", result.risk_analysis);
                println!("\n--- compliance ---\n{}", result.compliance_analysis);
                println!("\n--- recommendations ---\n{}", result.recommendations);
            }
            pool.close().await;
        }
        Commands::Execution { tender_id, json } => {
            let pool = db::connect(&cfg).await?;
            let Some(tender) = store::get_tender(&pool, &tender_id).await? else {
                anyhow::bail!("Tender {} not found; run `tw sync {}` first", tender_id, tender_id);
            };

            let milestones = store::milestones_for_tender(&pool, &tender.id).await?;
            let client = create_client(&cfg.completion)?;
            let report = execution::analyze_execution(&client, &tender, &milestones).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("execution report for {}", tender_id);
                println!("  completion: {:.1}%", report.completion_percentage);
                println!(
                    "  milestones: {} total, {} overdue",
                    report.total_milestones, report.overdue_milestones
                );
                println!("  schedule: {}", report.schedule_status);
                println!("\n{}", report.execution_analysis);
            }
            pool.close().await;
        }
        Commands::Watch => {
            let pool = db::connect(&cfg).await?;
            let source: Arc<dyn TenderSource> = Arc::new(HttpTenderSource::new(&cfg.source)?);
            let completion = create_client(&cfg.completion)?;

            let mut scheduler =
                TenderScheduler::new(pool.clone(), source, completion, cfg.scheduler.clone());
            scheduler.start();
            println!("watching; press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            scheduler.stop().await;
            pool.close().await;
        }
    }

    Ok(())
}
