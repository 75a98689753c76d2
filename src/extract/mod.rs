pub mod fields;
pub mod pagination;
pub mod strategies;

use std::collections::HashSet;

use scraper::Html;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use strategies::Strategy;

/// A raw tool record as found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    pub description: String,
    pub website_url: String,
    pub logo_url: Option<String>,
    pub category: Option<String>,
    pub launch_date: Option<String>,
    /// Detail page on the source site; the same-page dedup key.
    pub source_url: String,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub candidates: Vec<CandidateRecord>,
    pub errors: Vec<String>,
    pub total_pages: u32,
}

/// Parse one listing page into candidates.
///
/// Blocks without a name or outbound link are dropped silently. Blocks that
/// fail to parse are reported by index and do not stop the rest of the page.
pub fn extract(markup: &str, base_url: &str) -> Extraction {
    let base = match Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            return Extraction {
                candidates: Vec::new(),
                errors: vec![format!("Invalid base URL {}: {}", base_url, e)],
                total_pages: 0,
            }
        }
    };

    let document = Html::parse_document(markup);
    let mut candidates = Vec::new();
    let mut errors = Vec::new();

    match strategies::find_tool_elements(&document) {
        Some((strategy, elements)) => {
            match strategy {
                Strategy::DetailLinks => debug!(
                    "No tool selector matched, using {} fallback ({} containers)",
                    strategy.name(),
                    elements.len()
                ),
                Strategy::Selector(_) => info!(
                    "Found {} tools using selector: {}",
                    elements.len(),
                    strategy.name()
                ),
            }

            for (index, element) in elements.into_iter().enumerate() {
                match fields::extract_candidate(element, &base) {
                    Ok(Some(candidate)) => candidates.push(candidate),
                    Ok(None) => debug!("Element {} has no name or website, skipped", index),
                    Err(e) => errors.push(format!("Error extracting tool {}: {}", index, e)),
                }
            }
        }
        None => debug!("No tool elements found on page"),
    }

    Extraction {
        candidates: dedup_candidates(candidates),
        errors,
        total_pages: pagination::total_pages(&document),
    }
}

/// Keep the first candidate per source URL (name when the URL is empty).
fn dedup_candidates(candidates: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            let key = if c.source_url.is_empty() {
                c.name.clone()
            } else {
                c.source_url.clone()
            };
            seen.insert(key)
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.futuretools.io";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn futuretools_listing() {
        let page = extract(&fixture("futuretools_page1"), BASE);
        assert!(page.errors.is_empty(), "{:?}", page.errors);
        assert_eq!(page.total_pages, 3);

        let names: Vec<&str> = page.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Alloy", "Jasper", "CodePilot"]);

        let alloy = &page.candidates[0];
        assert_eq!(alloy.website_url, "https://futuretools.link/alloy");
        assert_eq!(alloy.logo_url.as_deref(), Some("https://cdn.example.com/logos/alloy.png"));
        assert_eq!(alloy.category.as_deref(), Some("Image Gen Tools"));
        assert_eq!(alloy.source_url, "https://www.futuretools.io/tools/alloy");
        assert!(alloy.description.starts_with("Alloy turns rough sketches"));

        let jasper = &page.candidates[1];
        assert_eq!(
            jasper.logo_url.as_deref(),
            Some("https://www.futuretools.io/uploads/jasper-logo.png")
        );
        assert_eq!(jasper.category.as_deref(), Some("Copywriting"));

        let codepilot = &page.candidates[2];
        assert_eq!(codepilot.website_url, "https://codepilot.dev");
        assert_eq!(codepilot.launch_date.as_deref(), Some("2024-03-01"));
        assert!(codepilot.logo_url.is_none());
    }

    #[test]
    fn tool_without_website_never_appears() {
        let page = extract(&fixture("futuretools_page1"), BASE);
        assert!(page.candidates.iter().all(|c| c.name != "Ghost Tool"));
        assert!(page
            .candidates
            .iter()
            .all(|c| !c.name.is_empty() && !c.website_url.is_empty()));
    }

    #[test]
    fn extraction_is_deterministic() {
        let markup = fixture("futuretools_page1");
        assert_eq!(extract(&markup, BASE).candidates, extract(&markup, BASE).candidates);
    }

    #[test]
    fn same_source_url_kept_once() {
        let markup = r#"
            <div class="tool"><a class="tool-item-link---new" href="/tools/echo">Echo</a>
                <a href="https://echo.ai">Visit</a></div>
            <div class="tool"><a class="tool-item-link---new" href="/tools/echo">Echo (featured)</a>
                <a href="https://echo.ai/pro">Visit</a></div>
            <div class="tool"><a class="tool-item-link---new" href="/tools/delta">Delta</a>
                <a href="https://delta.ai">Visit</a></div>"#;
        let page = extract(markup, BASE);
        let names: Vec<&str> = page.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Echo", "Delta"]);
    }

    #[test]
    fn generic_strategy_not_merged() {
        let markup = r#"
            <div class="tool-card"><h3>Card Tool</h3><a href="https://card.ai">Go</a></div>
            <div class="product-card"><h3>Product Tool</h3><a href="https://product.ai">Go</a></div>"#;
        let page = extract(markup, BASE);
        assert_eq!(page.candidates.len(), 1);
        assert_eq!(page.candidates[0].name, "Card Tool");
    }

    #[test]
    fn detail_link_fallback() {
        let markup = r#"
            <section class="grid">
              <article><a href="/tools/orbit">Orbit</a><p>x</p><a href="https://orbit.so">site</a></article>
              <article><a href="/tools/nova">Nova</a><a href="https://nova.app">site</a></article>
            </section>"#;
        let page = extract(markup, BASE);
        let names: Vec<&str> = page.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Orbit", "Nova"]);
        assert_eq!(page.candidates[1].source_url, "https://www.futuretools.io/tools/nova");
    }

    #[test]
    fn bad_element_reported_by_index() {
        let markup = r#"
            <div class="tool"><h3>Broken</h3><a href="http://[::1/tools/broken">More</a><a href="https://broken.ai">Go</a></div>
            <div class="tool"><h3>Fine</h3><a href="https://fine.ai">Go</a></div>"#;
        let page = extract(markup, BASE);
        assert_eq!(page.errors.len(), 1);
        assert!(page.errors[0].starts_with("Error extracting tool 0:"), "{}", page.errors[0]);
        assert_eq!(page.candidates.len(), 1);
        assert_eq!(page.candidates[0].name, "Fine");
    }

    #[test]
    fn empty_page_is_not_an_error() {
        let page = extract("<html><body><p>Maintenance</p></body></html>", BASE);
        assert!(page.candidates.is_empty());
        assert!(page.errors.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn invalid_base_url() {
        let page = extract(&fixture("futuretools_page1"), "not a url");
        assert!(page.candidates.is_empty());
        assert_eq!(page.errors.len(), 1);
    }
}
