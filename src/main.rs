use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use tools_scraper::config::{JobConfig, JobMode, SaveOptions, ScraperConfig, DEFAULT_BASE_URL};
use tools_scraper::fetcher::Fetcher;
use tools_scraper::job::{self, JobStatus, RunResult};
use tools_scraper::paginator;
use tools_scraper::store::{SqliteCatalog, DEFAULT_DB_PATH};

#[derive(Parser)]
#[command(name = "tools_scraper", about = "AI tool directory scraper and catalog ingester")]
struct Cli {
    /// SQLite catalog path
    #[arg(long, global = true, env = "TOOLS_DB", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog schema and seed default categories
    Init,
    /// Scrape listing pages and print the candidates as JSON (no saving)
    Scrape {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Scrape and save new tools into the catalog
    Run {
        #[command(flatten)]
        source: SourceArgs,
        /// Insert tools that already exist instead of skipping them
        #[arg(long)]
        keep_duplicates: bool,
        /// Request updates of existing tools (reported as not implemented)
        #[arg(long)]
        update_existing: bool,
        /// Print the run result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync the newly-added listing (the daily job)
    Sync {
        #[command(flatten)]
        net: NetArgs,
        /// Print the run result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent job runs
    Jobs {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Listing base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Scrape a single listing page
    #[arg(long, conflicts_with = "all")]
    page: Option<u32>,
    /// Scrape every listing page (default)
    #[arg(long)]
    all: bool,
    #[command(flatten)]
    net: NetArgs,
}

#[derive(Args)]
struct NetArgs {
    /// Pause between page requests, in milliseconds
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,
    /// Fetch attempts per page
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
    /// Per-attempt timeout, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

impl NetArgs {
    fn apply(&self, scraper: &mut ScraperConfig) {
        scraper.delay_between_requests = Duration::from_millis(self.delay_ms);
        scraper.max_retries = self.max_retries;
        scraper.timeout = Duration::from_millis(self.timeout_ms);
        scraper.progress = std::io::stderr().is_terminal();
    }
}

impl SourceArgs {
    fn job_config(&self, save: SaveOptions) -> JobConfig {
        let mut scraper = ScraperConfig {
            base_url: self.base_url.clone(),
            ..ScraperConfig::default()
        };
        self.net.apply(&mut scraper);
        let mode = match self.page {
            Some(page) if !self.all => JobMode::Page(page),
            _ => JobMode::AllPages,
        };
        JobConfig { scraper, save, mode }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let catalog = open_catalog(&cli.db)?;
            let seeded = catalog.seed_categories()?;
            println!(
                "Catalog ready at {} ({} new categories, {} tools)",
                cli.db.display(),
                seeded,
                catalog.tool_count()?
            );
            Ok(())
        }
        Commands::Scrape { source } => {
            let config = source.job_config(SaveOptions::default());
            config.validate()?;
            let fetcher = Fetcher::new(config.scraper.backoff_base)?;
            let json = match config.mode {
                JobMode::Page(page) => {
                    let page = paginator::scrape_page(&fetcher, &config.scraper, page).await;
                    serde_json::to_string_pretty(&page)?
                }
                JobMode::AllPages => {
                    let output = paginator::scrape_all(&fetcher, &config.scraper).await;
                    serde_json::to_string_pretty(&output)?
                }
            };
            println!("{}", json);
            Ok(())
        }
        Commands::Run {
            source,
            keep_duplicates,
            update_existing,
            json,
        } => {
            let save = SaveOptions {
                skip_duplicates: !keep_duplicates,
                update_existing,
            };
            let config = source.job_config(save);
            run_job(&cli.db, &config, json).await
        }
        Commands::Sync { net, json } => {
            let mut config = JobConfig::newly_added();
            net.apply(&mut config.scraper);
            run_job(&cli.db, &config, json).await
        }
        Commands::Jobs { limit } => {
            let catalog = open_catalog(&cli.db)?;
            let rows = catalog.recent_jobs(limit)?;
            if rows.is_empty() {
                println!("No jobs recorded. Run 'run' or 'sync' first.");
                return Ok(());
            }

            println!(
                "{:<20} | {:<16} | {:<15} | {:>5} | {:>5} | {:>7} | {:>6} | {:>8} | {}",
                "Job", "Type", "Status", "Found", "Saved", "Skipped", "Errors", "Duration", "Started"
            );
            println!("{}", "-".repeat(120));
            for r in &rows {
                println!(
                    "{:<20} | {:<16} | {:<15} | {:>5} | {:>5} | {:>7} | {:>6} | {:>8} | {}",
                    truncate(&r.job_id, 20),
                    r.job_type,
                    r.status,
                    r.tools_found,
                    r.tools_saved,
                    r.tools_skipped,
                    r.error_count,
                    format_duration(Duration::from_millis(r.duration_ms.max(0) as u64)),
                    r.started_at
                );
            }
            println!("\n{} jobs", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_catalog(path: &std::path::Path) -> anyhow::Result<SqliteCatalog> {
    let catalog = SqliteCatalog::open(path)?;
    catalog.init_schema().context("Failed to initialize catalog schema")?;
    Ok(catalog)
}

async fn run_job(db: &std::path::Path, config: &JobConfig, json: bool) -> anyhow::Result<()> {
    let catalog = open_catalog(db)?;
    if catalog.seed_categories()? > 0 {
        tracing::info!("Seeded default categories");
    }

    let result = job::run(config, &catalog, Some(&catalog)).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    if result.status == JobStatus::Failed {
        anyhow::bail!("Job {} failed", result.job_id);
    }
    Ok(())
}

fn print_summary(result: &RunResult) {
    println!(
        "Job {} ({}): {}",
        result.job_id,
        result.job_type,
        result.status.as_str()
    );
    println!(
        "Found {} | saved {} | skipped {} | errors {} | {}",
        result.tools_found,
        result.saved,
        result.skipped,
        result.errors.len(),
        format_duration(Duration::from_millis(result.duration_ms))
    );
    for error in result.errors.iter().take(10) {
        println!("  - {}", truncate(error, 100));
    }
    if result.errors.len() > 10 {
        println!("  ... and {} more", result.errors.len() - 10);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
