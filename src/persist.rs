use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SaveOptions;
use crate::enrich::{self, PersistableTool};
use crate::error::{CatalogError, SkipReason};
use crate::extract::CandidateRecord;
use crate::store::{Catalog, InsertOutcome};

/// Slug candidates tried per tool: the plain slug, then suffixed variants.
pub const MAX_SLUG_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub saved: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub tool_ids: Vec<i64>,
}

/// The store went away mid-save. `report` covers the candidates handled before that.
#[derive(Debug, Error)]
#[error("save aborted: {source}")]
pub struct SaveAborted {
    pub report: SaveReport,
    #[source]
    pub source: CatalogError,
}

#[derive(Debug, Error)]
pub enum SaveOneError {
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Aborted(#[from] SaveAborted),
}

enum Failure {
    Skip(SkipReason),
    Fatal(CatalogError),
}

/// Persist candidates one by one. Per-candidate failures land in the report;
/// only an unavailable store stops the loop.
///
/// `run_stamp` (epoch millis of the run) disambiguates colliding slugs.
pub fn save_all<C: Catalog + ?Sized>(
    catalog: &C,
    candidates: &[CandidateRecord],
    options: &SaveOptions,
    run_stamp: i64,
) -> Result<SaveReport, SaveAborted> {
    let mut report = SaveReport::default();

    for candidate in candidates {
        match persist_candidate(catalog, candidate, options, run_stamp) {
            Ok(id) => {
                debug!("Saved {} as #{}", candidate.name.trim(), id);
                report.saved += 1;
                report.tool_ids.push(id);
            }
            Err(Failure::Skip(reason)) => {
                report.skipped += 1;
                if reason.is_silent() {
                    debug!("{}", reason);
                } else {
                    warn!("{}", reason);
                    report.errors.push(reason.to_string());
                }
            }
            Err(Failure::Fatal(source)) => {
                warn!(
                    "Catalog unavailable after {} of {} tools: {}",
                    report.saved + report.skipped,
                    candidates.len(),
                    source
                );
                return Err(SaveAborted { report, source });
            }
        }
    }

    info!(
        "Saved {} tools, skipped {} ({} errors)",
        report.saved,
        report.skipped,
        report.errors.len()
    );
    Ok(report)
}

/// Save a single candidate, returning its id or the first error.
pub fn save_one<C: Catalog + ?Sized>(
    catalog: &C,
    candidate: &CandidateRecord,
    options: &SaveOptions,
    run_stamp: i64,
) -> Result<i64, SaveOneError> {
    let report = save_all(catalog, std::slice::from_ref(candidate), options, run_stamp)?;
    match report.tool_ids.first() {
        Some(&id) => Ok(id),
        None => Err(SaveOneError::Rejected(
            report
                .errors
                .into_iter()
                .next()
                .unwrap_or_else(|| "Failed to save tool".to_string()),
        )),
    }
}

fn persist_candidate<C: Catalog + ?Sized>(
    catalog: &C,
    candidate: &CandidateRecord,
    options: &SaveOptions,
    run_stamp: i64,
) -> Result<i64, Failure> {
    let name = candidate.name.trim();
    if name.is_empty() || candidate.website_url.trim().is_empty() {
        let label = if name.is_empty() { "unknown" } else { name };
        return Err(Failure::Skip(SkipReason::MissingFields(label.to_string())));
    }

    let exists = catalog
        .tool_exists(name, &candidate.website_url)
        .map_err(|e| classify(e, |reason| SkipReason::Lookup { name: name.to_string(), reason }))?;
    if exists {
        if options.skip_duplicates {
            return Err(Failure::Skip(SkipReason::Duplicate(name.to_string())));
        }
        if options.update_existing {
            return Err(Failure::Skip(SkipReason::UpdateNotImplemented(name.to_string())));
        }
        debug!("{} already in catalog, inserting another copy", name);
    }

    let category = match enrich::resolve_category(catalog, candidate) {
        Ok(category) => category,
        Err(CatalogError::Query(reason)) => {
            warn!("Category lookup failed for {}: {}", name, reason);
            None
        }
        Err(e) => return Err(Failure::Fatal(e)),
    };

    let mut tool = enrich::build_tool(candidate, category.as_ref());
    insert_with_unique_slug(catalog, &mut tool, run_stamp)
}

/// Attempt 0 uses the plain slug, attempt n the slug suffixed `-{run_stamp}-{n-1}`.
/// A slug found taken, by the pre-check or by the insert itself, moves on to the next.
fn insert_with_unique_slug<C: Catalog + ?Sized>(
    catalog: &C,
    tool: &mut PersistableTool,
    run_stamp: i64,
) -> Result<i64, Failure> {
    let base = tool.slug.clone();
    let name = tool.name.clone();
    let insert_failed = |reason: String| SkipReason::InsertFailed {
        name: name.clone(),
        reason,
    };

    for attempt in 0..MAX_SLUG_ATTEMPTS {
        let slug = if attempt == 0 {
            base.clone()
        } else {
            format!("{}-{}-{}", base, run_stamp, attempt - 1)
        };

        if catalog.slug_exists(&slug).map_err(|e| classify(e, insert_failed))? {
            debug!("Slug {} taken", slug);
            continue;
        }

        tool.slug = slug;
        match catalog.insert_tool(tool).map_err(|e| classify(e, insert_failed))? {
            InsertOutcome::Inserted(id) => return Ok(id),
            InsertOutcome::Conflict => debug!("Slug {} taken at insert", tool.slug),
        }
    }

    Err(Failure::Skip(SkipReason::SlugExhausted {
        name,
        attempts: MAX_SLUG_ATTEMPTS,
    }))
}

fn classify(err: CatalogError, skip: impl FnOnce(String) -> SkipReason) -> Failure {
    match err {
        CatalogError::Query(reason) => Failure::Skip(skip(reason)),
        unavailable => Failure::Fatal(unavailable),
    }
}
