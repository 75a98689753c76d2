use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use crate::config::ScraperConfig;
use crate::extract::{self, CandidateRecord};
use crate::fetcher::Fetcher;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub tools: Vec<CandidateRecord>,
    /// 0 when the page could not be fetched.
    pub total_pages: u32,
    pub current_page: u32,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeOutput {
    pub tools: Vec<CandidateRecord>,
    pub errors: Vec<String>,
}

impl From<PageResult> for ScrapeOutput {
    fn from(page: PageResult) -> Self {
        Self {
            tools: page.tools,
            errors: page.errors,
        }
    }
}

/// Fetch and extract one listing page. Never fails: a dead page comes back
/// with no tools and one error.
pub async fn scrape_page(fetcher: &Fetcher, config: &ScraperConfig, page: u32) -> PageResult {
    let url = config.page_url(page);
    info!("Scraping page {}: {}", page, url);

    let Some(markup) = fetcher.fetch(&url, config.max_retries, config.timeout).await else {
        return PageResult {
            tools: Vec::new(),
            total_pages: 0,
            current_page: page,
            errors: vec![format!(
                "Failed to fetch page {} after {} retries",
                page, config.max_retries
            )],
        };
    };

    let extraction = extract::extract(&markup, &url);
    PageResult {
        tools: extraction.candidates,
        total_pages: extraction.total_pages,
        current_page: page,
        errors: extraction.errors,
    }
}

/// Page 1, then pages 2..N in order with `delay_between_requests` before each.
pub async fn scrape_all(fetcher: &Fetcher, config: &ScraperConfig) -> ScrapeOutput {
    let first = scrape_page(fetcher, config, 1).await;
    let total = if config.is_newly_added() {
        1
    } else {
        first.total_pages.max(1)
    };
    info!("Found {} tools on page 1, {} pages total", first.tools.len(), total);

    let mut output = ScrapeOutput::from(first);
    if total == 1 {
        return output;
    }

    let pb = if config.progress {
        ProgressBar::new(u64::from(total))
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({msg})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.inc(1);

    for page in 2..=total {
        tokio::time::sleep(config.delay_between_requests).await;
        let result = scrape_page(fetcher, config, page).await;
        output.tools.extend(result.tools);
        output.errors.extend(result.errors);
        pb.set_message(format!("{} tools", output.tools.len()));
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Scraped {} pages: {} tools, {} errors",
        total,
        output.tools.len(),
        output.errors.len()
    );
    output
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing(names: &[&str], page: u32, pages: u32) -> String {
        let tools: String = names
            .iter()
            .map(|n| {
                format!(
                    r#"<div class="tool"><h3>{}</h3><p>{} does things.</p><a href="https://{}.ai">Visit</a></div>"#,
                    n,
                    n,
                    n.to_lowercase()
                )
            })
            .collect();
        format!(
            r#"<html><body>{}<div class="pagination">Page {} of {}</div></body></html>"#,
            tools, page, pages
        )
    }

    fn config(base_url: String) -> ScraperConfig {
        ScraperConfig {
            base_url,
            delay_between_requests: Duration::from_millis(1),
            max_retries: 2,
            timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(1),
            progress: false,
        }
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_millis(1)).unwrap()
    }

    async fn mount_page(server: &MockServer, page: u32, body: String) {
        Mock::given(method("GET"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn walks_every_page_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, 2, listing(&["Beta"], 2, 3)).await;
        mount_page(&server, 3, listing(&["Gamma", "Delta"], 3, 3)).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&["Alpha"], 1, 3)))
            .mount(&server)
            .await;

        let output = scrape_all(&fetcher(), &config(server.uri())).await;
        let names: Vec<&str> = output.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Beta", "Gamma", "Delta"]);
        assert!(output.errors.is_empty(), "{:?}", output.errors);
    }

    #[tokio::test]
    async fn delay_precedes_each_later_page() {
        let server = MockServer::start().await;
        mount_page(&server, 2, listing(&["Beta"], 2, 3)).await;
        mount_page(&server, 3, listing(&["Gamma"], 3, 3)).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&["Alpha"], 1, 3)))
            .mount(&server)
            .await;

        let mut config = config(server.uri());
        config.delay_between_requests = Duration::from_millis(100);
        let start = Instant::now();
        let output = scrape_all(&fetcher(), &config).await;
        assert_eq!(output.tools.len(), 3);
        assert!(start.elapsed() >= Duration::from_millis(200), "{:?}", start.elapsed());
    }

    #[tokio::test]
    async fn first_page_is_not_delayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&["Solo"], 1, 1)))
            .mount(&server)
            .await;

        let mut config = config(server.uri());
        config.delay_between_requests = Duration::from_secs(2);
        let start = Instant::now();
        let output = scrape_all(&fetcher(), &config).await;
        assert_eq!(output.tools.len(), 1);
        assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
    }

    #[tokio::test]
    async fn failed_page_does_not_stop_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        mount_page(&server, 3, listing(&["Gamma"], 3, 3)).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&["Alpha"], 1, 3)))
            .mount(&server)
            .await;

        let output = scrape_all(&fetcher(), &config(server.uri())).await;
        let names: Vec<&str> = output.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Gamma"]);
        assert_eq!(output.errors, ["Failed to fetch page 2 after 2 retries"]);
    }

    #[tokio::test]
    async fn single_page_result() {
        let server = MockServer::start().await;
        mount_page(&server, 2, listing(&["Beta"], 2, 2)).await;

        let page = scrape_page(&fetcher(), &config(server.uri()), 2).await;
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.tools.len(), 1);
        assert_eq!(page.tools[0].website_url, "https://beta.ai");
    }

    #[tokio::test]
    async fn unreachable_first_page() {
        let output = scrape_all(&fetcher(), &config("http://127.0.0.1:9".to_string())).await;
        assert!(output.tools.is_empty());
        assert_eq!(output.errors, ["Failed to fetch page 1 after 2 retries"]);
    }

    #[tokio::test]
    async fn newly_added_listing_is_one_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&["Fresh"], 1, 5)))
            .expect(1)
            .mount(&server)
            .await;

        let output = scrape_all(&fetcher(), &config(format!("{}/newly-added", server.uri()))).await;
        assert_eq!(output.tools.len(), 1);
    }
}
