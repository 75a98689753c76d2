use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

/// Ways of locating tool blocks on a listing page, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every element matching a CSS selector is one tool.
    Selector(&'static str),
    /// Anchors pointing at a per-tool detail page, widened to their container.
    DetailLinks,
}

pub const STRATEGIES: &[Strategy] = &[
    Strategy::Selector(".tool.tool-home"),
    Strategy::Selector(".tool[role='listitem']"),
    Strategy::Selector(".tool"),
    Strategy::Selector(".tool-card"),
    Strategy::Selector(".product-card"),
    Strategy::Selector("[data-tool]"),
    Strategy::DetailLinks,
];

const DETAIL_LINK_SELECTOR: &str = "a[href*='/tools/']";
const CONTAINER_TAGS: &[&str] = &["div", "li", "article", "section"];

impl Strategy {
    pub fn name(&self) -> &'static str {
        match *self {
            Strategy::Selector(css) => css,
            Strategy::DetailLinks => "detail-link containers",
        }
    }

    /// Elements this strategy finds, in document order.
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match self {
            Strategy::Selector(css) => match Selector::parse(css) {
                Ok(selector) => document.select(&selector).collect(),
                Err(_) => Vec::new(),
            },
            Strategy::DetailLinks => detail_link_containers(document),
        }
    }
}

/// Run the chain and return the first strategy that matches anything.
/// Later strategies are never consulted once one has matched.
pub fn find_tool_elements(document: &Html) -> Option<(Strategy, Vec<ElementRef<'_>>)> {
    STRATEGIES.iter().find_map(|strategy| {
        let elements = strategy.select(document);
        if elements.is_empty() {
            None
        } else {
            Some((*strategy, elements))
        }
    })
}

fn detail_link_containers(document: &Html) -> Vec<ElementRef<'_>> {
    let Ok(selector) = Selector::parse(DETAIL_LINK_SELECTOR) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut containers = Vec::new();
    for anchor in document.select(&selector) {
        let container = anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| CONTAINER_TAGS.contains(&el.value().name()));
        if let Some(container) = container {
            if seen.insert(container.id()) {
                containers.push(container);
            }
        }
    }
    containers
}
