use scraper::{ElementRef, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::CandidateRecord;
use crate::enrich::slugify;

const NAME_SELECTORS: &[&str] = &["a.tool-item-link---new", "h2, h3, .tool-name", "a[href^='/tools/']"];
const DESCRIPTION_SELECTORS: &[&str] = &[".tool-item-description-box---new", ".description, .tool-description"];
const VISIT_SITE_SELECTOR: &str = "a.tool-item-new-window---new";
const OUTBOUND_SELECTOR: &str = "a[href^='http']";
const LOGO_SELECTORS: &[&str] = &[
    "img.tool-item-image---new",
    "img.tool-item-image---home",
    "img[src]",
    "img[data-src]",
    "img[data-lazy-src]",
];
const LOGO_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src"];
const CATEGORY_SELECTORS: &[&str] = &[
    ".category",
    ".tag",
    ".badge",
    "[data-category]",
    ".tool-category",
    ".product-category",
    "[class*='category']",
];
const DATE_SELECTORS: &[&str] = &[
    "[data-date]",
    "[datetime]",
    ".date",
    "time",
    "[data-launch-date]",
    ".launch-date",
];
const SOURCE_SELECTORS: &[&str] = &[
    "a.tool-item-link---new[href^='/tools/']",
    "a[href^='/tools/']",
    "a[href*='/tools/']",
];

const MAX_CATEGORY_LEN: usize = 100;

/// Extra domains that belong to a source site: (site, alias).
const SITE_ALIASES: &[(&str, &str)] = &[("futuretools.io", "futuretools.link")];
/// Second-level labels under a two-letter TLD that registrations sit below (`example.co.uk`).
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "org", "net", "ac", "gov", "edu"];

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("invalid {field} URL {value:?}: {source}")]
    BadUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Pull one candidate out of a tool block.
///
/// `Ok(None)` means the block is not a usable tool (no name or no outbound
/// link); `Err` means the block looked like a tool but could not be read.
pub fn extract_candidate(
    element: ElementRef<'_>,
    base: &Url,
) -> Result<Option<CandidateRecord>, FieldError> {
    let Some(name) = extract_name(element) else {
        return Ok(None);
    };
    let Some(website_url) = extract_website(element, base) else {
        return Ok(None);
    };

    let description = DESCRIPTION_SELECTORS
        .iter()
        .filter_map(|css| first(element, css))
        .map(text_of)
        .find(|t| !t.is_empty())
        .unwrap_or_default();

    let logo_url = extract_logo(element).and_then(|src| match resolve(base, &src, "logo") {
        Ok(url) => Some(url),
        Err(e) => {
            debug!("Dropping logo of {}: {}", name, e);
            None
        }
    });

    let source_url = match extract_source(element, base)? {
        Some(url) => url,
        None => resolve(base, &format!("/tools/{}", slugify(&name)), "source")?,
    };

    Ok(Some(CandidateRecord {
        name,
        description,
        website_url: normalize_website(&website_url),
        logo_url,
        category: extract_category(element),
        launch_date: extract_launch_date(element),
        source_url,
    }))
}

fn extract_name(element: ElementRef<'_>) -> Option<String> {
    NAME_SELECTORS
        .iter()
        .filter_map(|css| first(element, css))
        .map(text_of)
        .find(|t| !t.is_empty())
}

/// Explicit "visit" anchor first, then the first outbound link off the source site.
fn extract_website(element: ElementRef<'_>, base: &Url) -> Option<String> {
    let visit = first(element, VISIT_SITE_SELECTOR)
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty());
    if let Some(href) = visit {
        return Some(href.to_string());
    }

    find(element, OUTBOUND_SELECTOR)
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !points_at_source(href, base))
        .map(str::to_string)
}

fn extract_logo(element: ElementRef<'_>) -> Option<String> {
    LOGO_SELECTORS
        .iter()
        .filter_map(|css| first(element, css))
        .find_map(|img| {
            LOGO_ATTRS
                .iter()
                .filter_map(|attr| img.value().attr(attr))
                .map(str::trim)
                .find(|src| is_real_image(src))
                .map(str::to_string)
        })
}

fn is_real_image(src: &str) -> bool {
    !src.is_empty() && !src.contains("placeholder") && !src.starts_with("data:")
}

fn extract_category(element: ElementRef<'_>) -> Option<String> {
    CATEGORY_SELECTORS
        .iter()
        .filter_map(|css| first(element, css))
        .map(text_of)
        .find(|t| !t.is_empty() && t.chars().count() < MAX_CATEGORY_LEN)
}

fn extract_launch_date(element: ElementRef<'_>) -> Option<String> {
    DATE_SELECTORS
        .iter()
        .filter_map(|css| first(element, css))
        .find_map(|el| {
            let value = el
                .value()
                .attr("datetime")
                .or_else(|| el.value().attr("data-date"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| text_of(el));
            (!value.is_empty()).then_some(value)
        })
}

fn extract_source(element: ElementRef<'_>, base: &Url) -> Result<Option<String>, FieldError> {
    for css in SOURCE_SELECTORS {
        for anchor in find(element, css) {
            let Some(href) = anchor.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() {
                continue;
            }
            let url = resolve(base, href, "source")?;
            if points_at_source(&url, base) {
                return Ok(Some(url));
            }
        }
    }
    Ok(None)
}

fn normalize_website(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", url)
    }
}

/// Whether `href` leads back to the source site (or its `.link` redirector).
/// Relative links always do.
fn points_at_source(href: &str, base: &Url) -> bool {
    let Ok(url) = Url::parse(href) else {
        return true;
    };
    match (url.host_str(), base.host_str()) {
        (Some(host), Some(base_host)) => same_site(host, base_host),
        _ => false,
    }
}

fn same_site(host: &str, base_host: &str) -> bool {
    let host = registrable_domain(host);
    let base = registrable_domain(base_host);
    host == base
        || SITE_ALIASES
            .iter()
            .any(|&(site, alias)| base == site && host == alias)
}

/// `cdn.tools.example.co.uk` → `example.co.uk`. IP hosts are returned as is.
fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host;
    }
    let labels: Vec<&str> = host.split('.').collect();
    let keep = match labels.as_slice() {
        [.., sld, tld] if tld.len() == 2 && SECOND_LEVEL_LABELS.contains(sld) => 3,
        _ => 2,
    };
    labels[labels.len().saturating_sub(keep)..].join(".")
}

fn resolve(base: &Url, value: &str, field: &'static str) -> Result<String, FieldError> {
    base.join(value)
        .map(|u| u.to_string())
        .map_err(|source| FieldError::BadUrl {
            field,
            value: value.to_string(),
            source,
        })
}

// ── DOM helpers ──

/// Descendants of `scope` matching `css`, excluding `scope` itself.
fn find<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope
            .select(&selector)
            .filter(|el| el.id() != scope.id())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    find(scope, css).into_iter().next()
}

/// Element text with whitespace runs collapsed.
fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
