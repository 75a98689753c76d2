use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::warn;

static PAGE_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:of\s*(\d+)|total|pages?)").unwrap());

const PAGINATION_SELECTOR: &str = ".pagination, .page-numbers, [data-pages]";
const PAGINATION_LINK_SELECTOR: &str = ".pagination a, .page-numbers a";

/// Upper bound on advertised pages; anything above is treated as garbled markup.
pub const MAX_PAGES: u32 = 500;

/// Total listing pages advertised by the pagination control, or 1.
/// Capped at [`MAX_PAGES`].
pub fn total_pages(document: &Html) -> u32 {
    let pages = from_pagination_text(document)
        .or_else(|| from_last_link(document))
        .filter(|&n| n > 0)
        .unwrap_or(1);
    if pages > MAX_PAGES {
        warn!("Pagination claims {} pages, capping at {}", pages, MAX_PAGES);
        return MAX_PAGES;
    }
    pages
}

fn from_pagination_text(document: &Html) -> Option<u32> {
    let selector = Selector::parse(PAGINATION_SELECTOR).ok()?;
    let containers: Vec<_> = document.select(&selector).collect();

    let from_attr = containers
        .iter()
        .filter_map(|el| el.value().attr("data-pages"))
        .find_map(|v| v.trim().parse::<u32>().ok());
    if from_attr.is_some() {
        return from_attr;
    }

    let text = containers
        .iter()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join(" ");
    let caps = PAGE_COUNT_RE.captures(&text)?;
    // "Page 2 of 7" counts pages after "of"; "7 pages" before the keyword
    caps.get(2)
        .or_else(|| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn from_last_link(document: &Html) -> Option<u32> {
    let selector = Selector::parse(PAGINATION_LINK_SELECTOR).ok()?;
    let last = document.select(&selector).last()?;
    last.text().collect::<String>().trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(markup: &str) -> u32 {
        total_pages(&Html::parse_document(markup))
    }

    #[test]
    fn page_x_of_y() {
        assert_eq!(pages(r#"<div class="pagination">Page 2 of 7</div>"#), 7);
    }

    #[test]
    fn count_then_keyword() {
        assert_eq!(pages(r#"<nav class="page-numbers">12 pages</nav>"#), 12);
        assert_eq!(pages(r#"<nav class="page-numbers">40 total</nav>"#), 40);
    }

    #[test]
    fn data_pages_attribute() {
        assert_eq!(pages(r#"<div data-pages="5"></div>"#), 5);
    }

    #[test]
    fn last_link_number() {
        let markup = r#"<div class="pagination">
            <a href="?page=1">1</a><a href="?page=2">2</a><a href="?page=9">9</a>
        </div>"#;
        assert_eq!(pages(markup), 9);
    }

    #[test]
    fn non_numeric_last_link_defaults_to_one() {
        let markup = r#"<div class="pagination"><a href="?page=2">Next</a></div>"#;
        assert_eq!(pages(markup), 1);
    }

    #[test]
    fn implausible_count_is_capped() {
        assert_eq!(pages(r#"<div class="pagination">Page 1 of 99999</div>"#), MAX_PAGES);
        assert_eq!(pages(r#"<div class="pagination">Page 1 of 500</div>"#), 500);
    }

    #[test]
    fn no_pagination() {
        assert_eq!(pages("<p>single page</p>"), 1);
    }
}
