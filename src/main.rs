use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use feedback_triage::models::{Category, RecordFilter};
use feedback_triage::{
    aggregate, classifier, db, export, heuristic, notify, prefs, report, submit, validate,
};

#[derive(Parser)]
#[command(name = "feedback-triage")]
#[command(about = "Triage free-text feedback and summarize its history", long_about = None)]
struct Cli {
    /// Base URL of the triage backend
    #[arg(long, global = true, env = "TRIAGE_API_URL", default_value = "http://localhost:8000")]
    api_url: String,
    /// Where the dark mode preference is kept
    #[arg(
        long,
        global = true,
        env = "FEEDBACK_TRIAGE_PREFS",
        default_value = ".feedback-triage.json"
    )]
    prefs: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct FilterArgs {
    #[arg(long, default_value_t = 30)]
    since_days: i64,
    #[arg(long, value_parser = parse_category)]
    category: Option<Category>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long, default_value_t = 100)]
    limit: i64,
}

impl FilterArgs {
    fn to_filter(&self) -> RecordFilter {
        RecordFilter {
            window_days: Some(self.since_days),
            category: self.category,
            search_term: self.search.clone().filter(|term| !term.trim().is_empty()),
            limit: self.limit,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample feedback records
    Seed,
    /// Import historical feedback from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the local keyword preview for a piece of feedback
    Preview {
        #[arg(long)]
        text: String,
    },
    /// Send feedback to the triage backend
    Triage {
        #[arg(long)]
        text: String,
        /// Also store the result in the record database
        #[arg(long)]
        store: bool,
    },
    /// Summarize stored feedback
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
        /// Re-fetch and print every N seconds until interrupted
        #[arg(long)]
        refresh_secs: Option<u64>,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export the loaded records as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Show or toggle the dark mode preference
    Theme {
        #[arg(long)]
        toggle: bool,
    },
}

fn parse_category(value: &str) -> Result<Category, String> {
    Category::ALL
        .into_iter()
        .find(|category| {
            category.label().eq_ignore_ascii_case(value)
                || format!("{category:?}").eq_ignore_ascii_case(value)
        })
        .ok_or_else(|| format!("unknown category: {value}"))
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feedback_triage=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    debug!("feedback-triage v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect().await?).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&connect().await?, &csv).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Preview { text } => match validate::validate(&text) {
            Ok(text) => {
                let preview = heuristic::classify_preview(&text);
                println!(
                    "Preview: {} (urgency {}/5, {})",
                    preview.category,
                    preview.urgency,
                    preview.urgency.label()
                );
            }
            Err(err) => println!("{err}"),
        },
        Commands::Triage { text, store } => {
            let classifier = Arc::new(classifier::HttpClassifier::new(&cli.api_url)?);
            let controller =
                submit::SubmissionController::new(classifier, notify::NotificationQueue::new());

            let started = Instant::now();
            let outcome = controller.submit(&text).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            for notification in controller.notifications().snapshot() {
                println!("[{:?}] {}", notification.kind, notification.message);
            }

            match outcome {
                submit::SubmitOutcome::Succeeded(result) => {
                    println!("Category: {}", result.category);
                    println!(
                        "Urgency: {}/5 ({})",
                        result.urgency,
                        result.urgency.label()
                    );
                    if store {
                        let id = db::insert_record(&connect().await?, &result, Some(elapsed_ms))
                            .await?;
                        println!("Stored as record {id}.");
                    }
                }
                submit::SubmitOutcome::Failed(message) => println!("Error: {message}"),
                submit::SubmitOutcome::Ignored | submit::SubmitOutcome::Superseded => {}
            }
            controller.shutdown();
        }
        Commands::Summary {
            filter,
            json,
            refresh_secs,
        } => {
            let pool = connect().await?;
            let Some(secs) = refresh_secs else {
                print_summary(&pool, &filter, json).await?;
                return Ok(());
            };

            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => print_summary(&pool, &filter, json).await?,
                    _ = tokio::signal::ctrl_c() => {
                        info!("stopping summary refresh");
                        break;
                    }
                }
            }
        }
        Commands::Report { filter, out } => {
            let pool = connect().await?;
            let records = db::fetch_records(&pool, &filter.to_filter()).await?;
            let summary = aggregate::summarize(&records, filter.since_days);
            let report = report::build_report(
                filter.category,
                db::cutoff(filter.since_days).date(),
                &summary,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { filter, out_dir } => {
            let pool = connect().await?;
            let records = db::fetch_records(&pool, &filter.to_filter()).await?;
            let path = out_dir.join(export::suggested_filename(
                chrono::Utc::now().date_naive(),
            ));
            std::fs::write(&path, export::to_csv(&records))
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported {} records to {}.", records.len(), path.display());
        }
        Commands::Theme { toggle } => {
            let mut preferences = prefs::Preferences::load(&cli.prefs)?;
            if toggle {
                preferences.toggle_dark_mode();
                preferences.save(&cli.prefs)?;
            }
            let mode = if preferences.dark_mode { "dark" } else { "light" };
            println!("Theme: {mode}");
        }
    }

    Ok(())
}

async fn print_summary(pool: &PgPool, filter: &FilterArgs, json: bool) -> anyhow::Result<()> {
    let records = db::fetch_records(pool, &filter.to_filter()).await?;
    let summary = aggregate::summarize(&records, filter.since_days);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.total_count == 0 {
        println!("No feedback found for this window.");
        return Ok(());
    }

    println!(
        "{} feedback items over {} days ({} urgent, ~{} per day, {:.0} ms avg processing)",
        summary.total_count,
        summary.window_days,
        summary.urgent_count(),
        summary.avg_daily(),
        summary.avg_processing_time_ms
    );
    for share in summary.category_shares() {
        println!("- {}: {} ({:.1}%)", share.category, share.count, share.percentage);
    }
    for point in summary.daily_trend.iter() {
        println!(
            "  {} {:>4}  avg {:.1}",
            point.date, point.count, point.moving_average
        );
    }

    Ok(())
}
