use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{JobConfig, JobMode};
use crate::error::ConfigError;
use crate::fetcher::Fetcher;
use crate::paginator::{self, ScrapeOutput};
use crate::persist::{self, SaveAborted, SaveReport};
use crate::store::{Catalog, JobHistory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::PartialSuccess => "partial_success",
            JobStatus::Failed => "failed",
        }
    }
}

/// Summary of one job invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub job_id: String,
    pub job_type: &'static str,
    pub status: JobStatus,
    pub tools_found: usize,
    pub saved: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub tool_ids: Vec<i64>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Scrape, then save, then report.
///
/// Only invalid options and a broken HTTP client are errors; every other
/// failure is folded into the returned `RunResult`. The history write is
/// best-effort.
pub async fn run<C: Catalog + ?Sized>(
    config: &JobConfig,
    catalog: &C,
    history: Option<&dyn JobHistory>,
) -> Result<RunResult, JobError> {
    config.validate()?;

    let started_at = Utc::now();
    let clock = Instant::now();
    let job_id = format!("sync-{}", started_at.timestamp_millis());
    info!("Starting {} job {}", config.job_type(), job_id);

    let fetcher = Fetcher::new(config.scraper.backoff_base).map_err(JobError::Client)?;
    let scraped: ScrapeOutput = match config.mode {
        JobMode::Page(page) => paginator::scrape_page(&fetcher, &config.scraper, page).await.into(),
        JobMode::AllPages => paginator::scrape_all(&fetcher, &config.scraper).await,
    };

    let tools_found = scraped.tools.len();
    let mut errors = scraped.errors;
    let scrape_failed = tools_found == 0 && !errors.is_empty();

    let mut save_aborted = false;
    let report = if tools_found == 0 {
        SaveReport::default()
    } else {
        match persist::save_all(catalog, &scraped.tools, &config.save, started_at.timestamp_millis()) {
            Ok(report) => report,
            Err(SaveAborted { mut report, source }) => {
                save_aborted = true;
                errors.append(&mut report.errors);
                errors.push(format!("Save stopped: {}", source));
                report
            }
        }
    };
    errors.extend(report.errors);

    let status = if scrape_failed || save_aborted {
        JobStatus::Failed
    } else if !errors.is_empty() {
        JobStatus::PartialSuccess
    } else {
        JobStatus::Success
    };

    let result = RunResult {
        job_id,
        job_type: config.job_type(),
        status,
        tools_found,
        saved: report.saved,
        skipped: report.skipped,
        errors,
        tool_ids: report.tool_ids,
        duration_ms: clock.elapsed().as_millis() as u64,
        started_at,
        completed_at: Utc::now(),
    };

    info!(
        "Job {} {}: {} found, {} saved, {} skipped, {} errors in {}ms",
        result.job_id,
        result.status.as_str(),
        result.tools_found,
        result.saved,
        result.skipped,
        result.errors.len(),
        result.duration_ms
    );

    if let Some(history) = history {
        if let Err(e) = history.record_job(&result) {
            warn!("Failed to record job {}: {:#}", result.job_id, e);
        }
    }

    Ok(result)
}
