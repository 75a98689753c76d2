use std::time::{Duration, Instant};

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; AI Tools Finder Bot/1.0)";

#[derive(Debug, Error)]
enum AttemptError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

/// HTTP page fetcher with per-attempt timeout and exponential backoff.
pub struct Fetcher {
    client: reqwest::Client,
    backoff_base: Duration,
}

impl Fetcher {
    pub fn new(backoff_base: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            backoff_base,
        })
    }

    /// Fetch `url`, making at most `max_retries` attempts.
    ///
    /// Returns `None` once every attempt has failed. A timeout ends the loop
    /// immediately; other failures back off `base * 2^attempt` and try again.
    pub async fn fetch(&self, url: &str, max_retries: u32, timeout: Duration) -> Option<String> {
        let mut last_error = None;

        for attempt in 0..max_retries {
            let start = Instant::now();
            match self.fetch_once(url, timeout).await {
                Ok(body) => {
                    debug!(
                        "Fetched {} ({} bytes) in {}ms",
                        url,
                        body.len(),
                        start.elapsed().as_millis()
                    );
                    return Some(body);
                }
                Err(e @ AttemptError::Timeout(_)) => {
                    warn!("Fetch of {} timed out, not retrying", url);
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    if attempt + 1 < max_retries {
                        let backoff = self.backoff(attempt);
                        warn!(
                            "Fetch of {} failed: {} (attempt {}/{}), backing off {:.1}s",
                            url,
                            e,
                            attempt + 1,
                            max_retries,
                            backoff.as_secs_f64()
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => warn!("Failed to fetch {} after {} attempts: {}", url, max_retries, e),
            None => warn!("Failed to fetch {}: no attempts allowed", url),
        }
        None
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<String, AttemptError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                AttemptError::Timeout(timeout)
            } else {
                AttemptError::Network(e)
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        response.text().await.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FAST: Duration = Duration::from_millis(5);

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.map(|r| r.len()).unwrap_or(0)
    }

    #[tokio::test]
    async fn returns_body_and_identifies_itself() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(FAST).unwrap();
        let body = fetcher.fetch(&server.uri(), 3, Duration::from_secs(5)).await;
        assert_eq!(body.as_deref(), Some("<html>ok</html>"));
    }

    #[tokio::test]
    async fn retries_transient_failure_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("second time lucky"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(FAST).unwrap();
        let body = fetcher.fetch(&server.uri(), 3, Duration::from_secs(5)).await;
        assert_eq!(body.as_deref(), Some("second time lucky"));
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_return_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(FAST).unwrap();
        let body = fetcher.fetch(&server.uri(), 3, Duration::from_secs(5)).await;
        assert!(body.is_none());
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn timeout_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("too slow")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(FAST).unwrap();
        let body = fetcher.fetch(&server.uri(), 3, Duration::from_millis(50)).await;
        assert!(body.is_none());
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn unreachable_host_returns_none() {
        let fetcher = Fetcher::new(FAST).unwrap();
        // Port 9 (discard) on loopback is closed on test machines.
        let body = fetcher.fetch("http://127.0.0.1:9/", 2, Duration::from_secs(2)).await;
        assert!(body.is_none());
    }

    #[test]
    fn backoff_doubles() {
        let fetcher = Fetcher::new(Duration::from_secs(1)).unwrap();
        assert_eq!(fetcher.backoff(0), Duration::from_secs(1));
        assert_eq!(fetcher.backoff(1), Duration::from_secs(2));
        assert_eq!(fetcher.backoff(3), Duration::from_secs(8));
    }
}
