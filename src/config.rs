use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://www.futuretools.io";
pub const NEWLY_ADDED_URL: &str = "https://www.futuretools.io/newly-added";
const NEWLY_ADDED_PATH: &str = "/newly-added";

const DEFAULT_DELAY_MS: u64 = 2000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Source site and network settings for one job.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub delay_between_requests: Duration,
    /// Total fetch attempts per page.
    pub max_retries: u32,
    pub timeout: Duration,
    /// Unit of the exponential retry backoff: attempt `n` waits `base * 2^n`.
    pub backoff_base: Duration,
    pub progress: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            delay_between_requests: Duration::from_millis(DEFAULT_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_MS),
            progress: false,
        }
    }
}

impl ScraperConfig {
    /// The newly-added listing is a single rolling page with no pagination.
    pub fn is_newly_added(&self) -> bool {
        self.base_url.contains(NEWLY_ADDED_PATH)
    }

    /// Listing URL for `page`; page 1 is the bare base URL.
    pub fn page_url(&self, page: u32) -> String {
        if page <= 1 || self.is_newly_added() {
            return self.base_url.clone();
        }
        match Url::parse(&self.base_url) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("page", &page.to_string());
                url.to_string()
            }
            Err(_) => format!("{}?page={}", self.base_url, page),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub skip_duplicates: bool,
    pub update_existing: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            update_existing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    Page(u32),
    AllPages,
}

/// Everything a job run needs, built once and passed down by reference.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub scraper: ScraperConfig,
    pub save: SaveOptions,
    pub mode: JobMode,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            save: SaveOptions::default(),
            mode: JobMode::AllPages,
        }
    }
}

impl JobConfig {
    /// The daily sync of the newly-added listing.
    pub fn newly_added() -> Self {
        Self {
            scraper: ScraperConfig {
                base_url: NEWLY_ADDED_URL.to_string(),
                ..ScraperConfig::default()
            },
            save: SaveOptions::default(),
            mode: JobMode::Page(1),
        }
    }

    pub fn job_type(&self) -> &'static str {
        match self.mode {
            JobMode::AllPages => "full_scrape",
            JobMode::Page(_) if self.scraper.is_newly_added() => "newly_added_sync",
            JobMode::Page(_) => "page_scrape",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let JobMode::Page(0) = self.mode {
            return Err(ConfigError::InvalidPage(0));
        }

        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: self.scraper.base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.scraper.base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        if self.scraper.max_retries == 0 {
            return Err(ConfigError::InvalidRetries);
        }
        if self.scraper.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_site() {
        let config = JobConfig::default();
        assert_eq!(config.scraper.base_url, "https://www.futuretools.io");
        assert_eq!(config.scraper.delay_between_requests, Duration::from_secs(2));
        assert_eq!(config.scraper.max_retries, 3);
        assert_eq!(config.scraper.timeout, Duration::from_secs(30));
        assert!(config.save.skip_duplicates);
        assert!(!config.save.update_existing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn page_urls() {
        let config = ScraperConfig::default();
        assert_eq!(config.page_url(1), "https://www.futuretools.io");
        assert_eq!(config.page_url(3), "https://www.futuretools.io/?page=3");
    }

    #[test]
    fn newly_added_never_paginates() {
        let config = JobConfig::newly_added();
        assert_eq!(config.scraper.page_url(2), NEWLY_ADDED_URL);
        assert_eq!(config.job_type(), "newly_added_sync");
    }

    #[test]
    fn rejects_page_zero() {
        let config = JobConfig {
            mode: JobMode::Page(0),
            ..JobConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidPage(0)));
    }

    #[test]
    fn rejects_bad_base_url() {
        for url in ["not a url", "ftp://example.com", "file:///tmp/x"] {
            let mut config = JobConfig::default();
            config.scraper.base_url = url.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidBaseUrl { .. })),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn rejects_zero_retries_and_timeout() {
        let mut config = JobConfig::default();
        config.scraper.max_retries = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidRetries));

        let mut config = JobConfig::default();
        config.scraper.timeout = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout));
    }
}
