pub mod client;
pub mod extract;
pub mod normalize;
pub mod resolver;

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::FetchResult;

/// A structural region of a page as listed by the parse API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionDescriptor {
    pub index: String,
    #[serde(rename = "line")]
    pub label: String,
}

/// Which path produced an accepted plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlotMethod {
    ApiSection,
    ApiFullHtml,
    HtmlFallback,
}

impl PlotMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotMethod::ApiSection => "api_section",
            PlotMethod::ApiFullHtml => "api_full_html",
            PlotMethod::HtmlFallback => "html_fallback",
        }
    }
}

impl fmt::Display for PlotMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one title. Text is present exactly when a method is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotOutcome {
    Found {
        text: String,
        page: String,
        method: PlotMethod,
    },
    NotFound,
}

impl PlotOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            PlotOutcome::Found { text, .. } => Some(text),
            PlotOutcome::NotFound => None,
        }
    }

    pub fn page(&self) -> Option<&str> {
        match self {
            PlotOutcome::Found { page, .. } => Some(page),
            PlotOutcome::NotFound => None,
        }
    }

    /// Method tag as written to the output table.
    pub fn method_tag(&self) -> &'static str {
        match self {
            PlotOutcome::Found { method, .. } => method.as_str(),
            PlotOutcome::NotFound => "none",
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PlotOutcome::Found { .. })
    }
}

/// The wiki endpoints the resolver consumes.
#[async_trait]
pub trait WikiSource: Send + Sync {
    /// Top-ranked page title for a full-text query.
    async fn search_top(&self, query: &str) -> FetchResult<Option<String>>;
    /// Section list of a page.
    async fn sections(&self, page: &str) -> FetchResult<Vec<SectionDescriptor>>;
    /// Rendered markup of one section.
    async fn section_html(&self, page: &str, index: &str) -> FetchResult<String>;
    /// Rendered markup of the whole page through the parse API.
    async fn page_html(&self, page: &str) -> FetchResult<String>;
    /// Raw page at a URL.
    async fn fetch_url(&self, url: &str) -> FetchResult<String>;
    /// Base that page URLs are built on, e.g. `https://en.wikipedia.org/wiki/`.
    fn page_base(&self) -> &str;
}
