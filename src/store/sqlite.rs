use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, ErrorCode};

use super::{Catalog, Category, CategoryMatch, InsertOutcome, JobHistory};
use crate::enrich::PersistableTool;
use crate::error::CatalogError;
use crate::job::RunResult;

pub const DEFAULT_DB_PATH: &str = "data/tools.sqlite";

/// Categories an empty catalog starts with: (name, slug).
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Text Generation", "text-generation"),
    ("Image Generation", "image-generation"),
    ("Code Assistant", "code-assistant"),
    ("Video Generation", "video-generation"),
    ("Audio Generation", "audio-generation"),
    ("Productivity", "productivity"),
];

pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS categories (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE COLLATE NOCASE,
                slug        TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS tools (
                id            INTEGER PRIMARY KEY,
                name          TEXT NOT NULL,
                name_key      TEXT NOT NULL,
                description   TEXT,
                website_url   TEXT NOT NULL,
                logo_url      TEXT,
                category_id   INTEGER REFERENCES categories(id),
                pricing_model TEXT CHECK(pricing_model IN ('free','freemium','paid','one-time')),
                features      TEXT,
                slug          TEXT NOT NULL UNIQUE,
                status        TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending','active')),
                created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_tools_name_key ON tools(name_key);
            CREATE INDEX IF NOT EXISTS idx_tools_website ON tools(website_url);

            CREATE TABLE IF NOT EXISTS scraping_jobs (
                id            INTEGER PRIMARY KEY,
                job_id        TEXT NOT NULL,
                job_type      TEXT NOT NULL,
                status        TEXT NOT NULL CHECK(status IN ('success','partial_success','failed')),
                tools_found   INTEGER NOT NULL,
                tools_saved   INTEGER NOT NULL,
                tools_skipped INTEGER NOT NULL,
                errors        TEXT,
                duration_ms   INTEGER NOT NULL,
                started_at    TEXT NOT NULL,
                completed_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_started ON scraping_jobs(started_at);
            ",
        )?;
        Ok(())
    }

    /// Insert the default categories; returns how many were new.
    pub fn seed_categories(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO categories (name, slug) VALUES (?1, ?2)")?;
            for (name, slug) in DEFAULT_CATEGORIES {
                count += stmt.execute(params![name, slug])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn tool_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM tools", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        let mut stmt = self.conn.prepare_cached("SELECT id, name FROM categories ORDER BY id")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Category {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent job runs, newest first.
    pub fn recent_jobs(&self, limit: usize) -> Result<Vec<JobRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT job_id, job_type, status, tools_found, tools_saved, tools_skipped,
                    errors, duration_ms, started_at
             FROM scraping_jobs
             ORDER BY started_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let errors: Option<String> = row.get(6)?;
                Ok(JobRow {
                    job_id: row.get(0)?,
                    job_type: row.get(1)?,
                    status: row.get(2)?,
                    tools_found: row.get(3)?,
                    tools_saved: row.get(4)?,
                    tools_skipped: row.get(5)?,
                    error_count: errors
                        .and_then(|e| serde_json::from_str::<Vec<String>>(&e).ok())
                        .map_or(0, |e| e.len()),
                    duration_ms: row.get(7)?,
                    started_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

pub struct JobRow {
    pub job_id: String,
    pub job_type: String,
    pub status: String,
    pub tools_found: i64,
    pub tools_saved: i64,
    pub tools_skipped: i64,
    pub error_count: usize,
    pub duration_ms: i64,
    pub started_at: String,
}

// ── Catalog ──

impl Catalog for SqliteCatalog {
    fn tool_exists(&self, name: &str, website_url: &str) -> Result<bool, CatalogError> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM tools WHERE name_key = ?1 OR website_url = ?2
             )",
            params![name_key(name), website_url],
            |r| r.get(0),
        )?;
        Ok(exists)
    }

    fn find_category(&self, name: &str, how: CategoryMatch) -> Result<Option<Category>, CatalogError> {
        let wanted = name_key(name);
        if wanted.is_empty() {
            return Ok(None);
        }
        // categories is small; folding in Rust handles non-ASCII case
        let found = self.categories()?.into_iter().find(|c| {
            let key = name_key(&c.name);
            match how {
                CategoryMatch::Exact => key == wanted,
                CategoryMatch::Contains => key.contains(&wanted) || wanted.contains(&key),
            }
        });
        Ok(found)
    }

    fn slug_exists(&self, slug: &str) -> Result<bool, CatalogError> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tools WHERE slug = ?1)",
            params![slug],
            |r| r.get(0),
        )?;
        Ok(exists)
    }

    fn insert_tool(&self, tool: &PersistableTool) -> Result<InsertOutcome, CatalogError> {
        let features = tool
            .features
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CatalogError::Query(format!("features not serializable: {}", e)))?;

        let inserted = self.conn.execute(
            "INSERT INTO tools
             (name, name_key, description, website_url, logo_url, category_id, pricing_model, features, slug, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                tool.name,
                name_key(&tool.name),
                tool.description,
                tool.website_url,
                tool.logo_url,
                tool.category_id,
                tool.pricing_model.map(|p| p.as_str()),
                features,
                tool.slug,
                tool.status.as_str(),
            ],
        );

        match inserted {
            Ok(_) => Ok(InsertOutcome::Inserted(self.conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ── Job history ──

impl JobHistory for SqliteCatalog {
    fn record_job(&self, result: &RunResult) -> Result<()> {
        let errors = if result.errors.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&result.errors)?)
        };
        self.conn.execute(
            "INSERT INTO scraping_jobs
             (job_id, job_type, status, tools_found, tools_saved, tools_skipped,
              errors, duration_ms, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                result.job_id,
                result.job_type,
                result.status.as_str(),
                result.tools_found as i64,
                result.saved as i64,
                result.skipped as i64,
                errors,
                result.duration_ms as i64,
                result.started_at.to_rfc3339(),
                result.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    ErrorCode::CannotOpen
                        | ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::SystemIoFailure
                        | ErrorCode::ReadOnly
                        | ErrorCode::NotADatabase
                        | ErrorCode::DatabaseCorrupt
                        | ErrorCode::DiskFull
                ) =>
            {
                CatalogError::Unavailable(err.to_string())
            }
            _ => CatalogError::Query(err.to_string()),
        }
    }
}

/// Case-folded lookup key; `to_lowercase` folds non-ASCII letters too.
fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
