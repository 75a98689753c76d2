use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::CatalogError;
use crate::extract::CandidateRecord;
use crate::store::{Catalog, Category, CategoryMatch};

static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());
static FREE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfree\b").unwrap());
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\s?\d").unwrap());

const FALLBACK_SLUG: &str = "tool";

const MIN_FEATURE_LEN: usize = 20;
const MAX_FEATURE_LEN: usize = 200;
const MAX_FEATURES: usize = 5;

/// Short descriptions get the tool name prepended.
const MIN_DESCRIPTION_LEN: usize = 40;

const FREEMIUM_SIGNALS: &[&str] = &["freemium", "free trial", "free plan", "free tier", "free version"];
const ONE_TIME_SIGNALS: &[&str] = &["one-time", "one time", "lifetime"];
const FREE_SIGNALS: &[&str] = &["open source", "open-source", "100% free", "completely free", "free to use"];
const PAID_SIGNALS: &[&str] = &["paid", "subscription", "per month", "/mo", "pricing", "premium"];

/// Category guesses: catalog name and the words that suggest it.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Image Generation",
        &["image", "photo", "picture", "art", "illustration", "avatar", "logo", "drawing", "sketch"],
    ),
    (
        "Video Generation",
        &["video", "animation", "film", "clip", "footage", "youtube"],
    ),
    (
        "Audio Generation",
        &["audio", "voice", "music", "speech", "podcast", "sound", "song", "transcri"],
    ),
    (
        "Code Assistant",
        &["code", "coding", "developer", "programming", "debug", "github", "ide", "api"],
    ),
    (
        "Text Generation",
        &["writing", "write", "text", "copywriting", "blog", "essay", "content", "chat", "email"],
    ),
    (
        "Productivity",
        &["productivity", "workflow", "automation", "automate", "meeting", "notes", "task", "schedule", "calendar"],
    ),
];

/// Filler words dropped from a scraped category label before substring lookup.
const LABEL_FILLER: &[&str] = &["ai", "tool", "tools", "app", "apps", "software", "and", "&"];
const MIN_LOOKUP_TERM_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingModel {
    Free,
    Freemium,
    Paid,
    OneTime,
}

impl PricingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingModel::Free => "free",
            PricingModel::Freemium => "freemium",
            PricingModel::Paid => "paid",
            PricingModel::OneTime => "one-time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Active,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Pending => "pending",
            ToolStatus::Active => "active",
        }
    }
}

/// A catalog row ready for insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistableTool {
    pub name: String,
    pub description: Option<String>,
    pub website_url: String,
    pub logo_url: Option<String>,
    pub category_id: Option<i64>,
    pub pricing_model: Option<PricingModel>,
    pub features: Option<Vec<String>>,
    pub slug: String,
    pub status: ToolStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub slug: String,
    pub features: Option<Vec<String>>,
    pub pricing_model: Option<PricingModel>,
    pub needs_review: bool,
}

/// Derived fields for a candidate whose category has already been resolved.
pub fn enrich(candidate: &CandidateRecord, category: Option<&Category>) -> Enrichment {
    Enrichment {
        slug: slugify(&candidate.name),
        features: extract_features(&candidate.description),
        pricing_model: infer_pricing(&candidate.description, &candidate.name),
        needs_review: needs_review(
            &candidate.description,
            candidate.logo_url.is_some(),
            category.is_some(),
        ),
    }
}

pub fn build_tool(candidate: &CandidateRecord, category: Option<&Category>) -> PersistableTool {
    let enrichment = enrich(candidate, category);
    let category_label = category
        .map(|c| c.name.as_str())
        .or(candidate.category.as_deref());

    PersistableTool {
        name: candidate.name.trim().to_string(),
        description: enhance_description(&candidate.description, candidate.name.trim(), category_label),
        website_url: candidate.website_url.clone(),
        logo_url: candidate.logo_url.clone(),
        category_id: category.map(|c| c.id),
        pricing_model: enrichment.pricing_model,
        features: enrichment.features,
        slug: enrichment.slug,
        status: if enrichment.needs_review {
            ToolStatus::Pending
        } else {
            ToolStatus::Active
        },
    }
}

/// Lowercase, non-alphanumeric runs collapsed to `-`, edges trimmed.
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let slug = NON_ALNUM_RE.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Sentences of tag-friendly length, at most five.
pub fn extract_features(description: &str) -> Option<Vec<String>> {
    let features: Vec<String> = SENTENCE_END_RE
        .split(description.trim())
        .map(|s| s.trim().trim_end_matches(['.', '!', '?']).trim())
        .filter(|s| {
            let len = s.chars().count();
            len > MIN_FEATURE_LEN && len < MAX_FEATURE_LEN
        })
        .take(MAX_FEATURES)
        .map(str::to_string)
        .collect();

    if features.is_empty() {
        None
    } else {
        Some(features)
    }
}

pub fn infer_pricing(description: &str, name: &str) -> Option<PricingModel> {
    let text = format!("{} {}", name, description).to_lowercase();
    let has = |signals: &[&str]| signals.iter().any(|s| text.contains(s));

    if has(FREEMIUM_SIGNALS) {
        Some(PricingModel::Freemium)
    } else if has(ONE_TIME_SIGNALS) {
        Some(PricingModel::OneTime)
    } else if has(FREE_SIGNALS) || (FREE_WORD_RE.is_match(&text) && !has(PAID_SIGNALS)) {
        Some(PricingModel::Free)
    } else if has(PAID_SIGNALS) || PRICE_RE.is_match(&text) {
        Some(PricingModel::Paid)
    } else {
        None
    }
}

/// Catalog category names suggested by keywords, best match first.
pub fn suggest_category(description: &str, name: &str) -> Vec<String> {
    let text = format!("{} {}", name, description).to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut scored: Vec<(&str, usize)> = CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| {
            let hits = words
                .iter()
                .filter(|w| keywords.iter().any(|kw| keyword_matches(w, kw)))
                .count();
            (*category, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();
    // stable: ties keep table order
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().map(|(c, _)| c.to_string()).collect()
}

/// Short keywords must match whole words; longer ones also match as a prefix.
fn keyword_matches(word: &str, keyword: &str) -> bool {
    word == keyword || (keyword.len() >= 5 && word.starts_with(keyword))
}

/// Cleaned-up description, templated when the scraped text is thin.
pub fn enhance_description(raw: &str, name: &str, category: Option<&str>) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return category.map(|c| format!("{} is an AI tool in the {} category.", name, c));
    }

    let text = if cleaned.chars().count() < MIN_DESCRIPTION_LEN
        && !cleaned.to_lowercase().starts_with(&name.to_lowercase())
    {
        format!("{}: {}", name, cleaned)
    } else {
        cleaned
    };

    if text.ends_with(['.', '!', '?']) {
        Some(text)
    } else {
        Some(format!("{}.", text))
    }
}

/// Presentable records have a description plus a logo or a category.
pub fn needs_review(description: &str, has_logo: bool, has_category: bool) -> bool {
    let has_description = !description.trim().is_empty();
    let signals = [has_description, has_logo, has_category]
        .iter()
        .filter(|&&present| present)
        .count();
    !has_description || signals < 2
}

/// Match the candidate to an existing category. Never creates one.
///
/// The scraped label is tried first (exact, then substring); failing that,
/// keyword guesses from the description go through the same lookup.
pub fn resolve_category<C: Catalog + ?Sized>(
    catalog: &C,
    candidate: &CandidateRecord,
) -> Result<Option<Category>, CatalogError> {
    if let Some(label) = candidate.category.as_deref() {
        if let Some(found) = lookup_category(catalog, label)? {
            return Ok(Some(found));
        }
    }

    if candidate.description.trim().is_empty() {
        return Ok(None);
    }
    for guess in suggest_category(&candidate.description, &candidate.name) {
        if let Some(found) = lookup_category(catalog, &guess)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn lookup_category<C: Catalog + ?Sized>(
    catalog: &C,
    label: &str,
) -> Result<Option<Category>, CatalogError> {
    let label = label.trim();
    if label.is_empty() {
        return Ok(None);
    }
    if let Some(found) = catalog.find_category(label, CategoryMatch::Exact)? {
        return Ok(Some(found));
    }
    for term in lookup_terms(label) {
        if let Some(found) = catalog.find_category(&term, CategoryMatch::Contains)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// The label itself, then the label without filler words ("Image Gen Tools" → "image gen").
fn lookup_terms(label: &str) -> Vec<String> {
    let mut terms = vec![label.to_string()];
    let core = label
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !LABEL_FILLER.contains(w))
        .collect::<Vec<_>>()
        .join(" ");
    if core.len() >= MIN_LOOKUP_TERM_LEN && !core.eq_ignore_ascii_case(label) {
        terms.push(core);
    }
    terms
}
