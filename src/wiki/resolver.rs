use std::collections::HashSet;

use tracing::{debug, info};

use super::extract::{heading_scan, plot_sections, section_text};
use super::normalize::{candidate_urls, clean_title, page_from_url, parse_year, query_variants};
use super::{PlotMethod, PlotOutcome, WikiSource};
use crate::error::FetchResult;
use crate::settings::PlotConfig;

/// Finds a film's plot by walking query variants and extraction fallbacks.
///
/// Per variant: search → plot sections → full-page heading scan →
/// constructed page URLs. The first text of at least `min_plot_chars`
/// wins. Upstream failures only ever close the path they happened on.
pub struct PlotResolver<'a, W: WikiSource> {
    wiki: &'a W,
    cfg: PlotConfig,
}

impl<'a, W: WikiSource> PlotResolver<'a, W> {
    pub fn new(wiki: &'a W, cfg: PlotConfig) -> Self {
        Self { wiki, cfg }
    }

    fn acceptable(&self, text: &str) -> bool {
        text.chars().count() >= self.cfg.min_plot_chars
    }

    pub async fn resolve(&self, raw_title: Option<&str>, raw_year: Option<&str>) -> PlotOutcome {
        let title = clean_title(raw_title);
        if title.is_empty() {
            debug!(?raw_title, "empty title, skipping");
            return PlotOutcome::NotFound;
        }
        let year = parse_year(raw_year);

        // Pages already examined for this title, whichever variant led there.
        let mut tried: HashSet<String> = HashSet::new();

        for query in query_variants(&title, year) {
            let found = ok_or_log(self.wiki.search_top(&query).await, "search", &query).flatten();
            tokio::time::sleep(self.cfg.search_delay).await;

            let Some(page) = found else {
                continue;
            };
            if !tried.insert(page.clone()) {
                debug!(%query, %page, "page already tried");
                continue;
            }

            if let Some(outcome) = self.try_page(&title, year, &page).await {
                info!(%title, %page, method = outcome.method_tag(), "plot found");
                return outcome;
            }
        }

        info!(%title, "no plot found");
        PlotOutcome::NotFound
    }

    async fn try_page(&self, title: &str, year: Option<u32>, page: &str) -> Option<PlotOutcome> {
        if let Some(text) = self.from_sections(page).await {
            return Some(found(text, page, PlotMethod::ApiSection));
        }

        if let Some(text) = self.from_full_page(page).await {
            return Some(found(text, page, PlotMethod::ApiFullHtml));
        }

        for url in candidate_urls(self.wiki.page_base(), title, year, page) {
            let html = ok_or_log(self.wiki.fetch_url(&url).await, "fetch", &url);
            tokio::time::sleep(self.cfg.fetch_delay).await;
            let text = html.and_then(|h| heading_scan(&h, self.cfg.min_paragraph_chars));
            match text {
                Some(t) if self.acceptable(&t) => {
                    return Some(found(t, &page_from_url(&url), PlotMethod::HtmlFallback));
                }
                Some(t) => debug!(%url, chars = t.chars().count(), "fallback text too short"),
                None => {}
            }
        }

        None
    }

    async fn from_sections(&self, page: &str) -> Option<String> {
        let sections = ok_or_log(self.wiki.sections(page).await, "sections", page).unwrap_or_default();
        for section in plot_sections(&sections) {
            let html = ok_or_log(
                self.wiki.section_html(page, &section.index).await,
                "section",
                page,
            );
            match html.as_deref().and_then(section_text) {
                Some(t) if self.acceptable(&t) => return Some(t),
                Some(t) => {
                    debug!(%page, label = %section.label, chars = t.chars().count(), "section too short")
                }
                None => {}
            }
        }
        None
    }

    async fn from_full_page(&self, page: &str) -> Option<String> {
        let html = ok_or_log(self.wiki.page_html(page).await, "page", page)?;
        heading_scan(&html, self.cfg.min_paragraph_chars).filter(|t| self.acceptable(t))
    }
}

fn found(text: String, page: &str, method: PlotMethod) -> PlotOutcome {
    PlotOutcome::Found {
        text,
        page: page.to_string(),
        method,
    }
}

/// A failed call yields nothing on this path; note it and move on.
fn ok_or_log<T>(res: FetchResult<T>, what: &str, target: &str) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(what, target, error = %e, "upstream call failed");
            None
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::FetchError;
    use crate::wiki::SectionDescriptor;

    const BASE: &str = "https://en.wikipedia.org/wiki/";

    fn cfg() -> PlotConfig {
        PlotConfig {
            min_plot_chars: 120,
            min_paragraph_chars: 30,
            search_delay: Duration::ZERO,
            fetch_delay: Duration::ZERO,
        }
    }

    /// In-memory wiki. Anything not registered fails like a dead connection.
    #[derive(Default)]
    struct FakeWiki {
        search: HashMap<String, String>,
        sections: HashMap<String, Vec<SectionDescriptor>>,
        section_html: HashMap<(String, String), String>,
        pages: HashMap<String, String>,
        urls: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeWiki {
        fn log(&self, entry: String) {
            self.calls.lock().unwrap().push(entry);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }

        fn with_search(mut self, query: &str, page: &str) -> Self {
            self.search.insert(query.into(), page.into());
            self
        }

        fn with_section(mut self, page: &str, index: &str, label: &str, html: &str) -> Self {
            self.sections
                .entry(page.into())
                .or_default()
                .push(SectionDescriptor {
                    index: index.into(),
                    label: label.into(),
                });
            self.section_html
                .insert((page.into(), index.into()), html.into());
            self
        }

        fn with_page(mut self, page: &str, html: &str) -> Self {
            self.pages.insert(page.into(), html.into());
            self
        }

        fn with_url(mut self, url: &str, html: &str) -> Self {
            self.urls.insert(url.into(), html.into());
            self
        }
    }

    fn down() -> FetchError {
        FetchError::Status(503)
    }

    #[async_trait]
    impl WikiSource for FakeWiki {
        async fn search_top(&self, query: &str) -> FetchResult<Option<String>> {
            self.log(format!("search:{}", query));
            Ok(self.search.get(query).cloned())
        }

        async fn sections(&self, page: &str) -> FetchResult<Vec<SectionDescriptor>> {
            self.log(format!("sections:{}", page));
            self.sections.get(page).cloned().ok_or_else(down)
        }

        async fn section_html(&self, page: &str, index: &str) -> FetchResult<String> {
            self.log(format!("section:{}#{}", page, index));
            self.section_html
                .get(&(page.to_string(), index.to_string()))
                .cloned()
                .ok_or_else(down)
        }

        async fn page_html(&self, page: &str) -> FetchResult<String> {
            self.log(format!("page:{}", page));
            self.pages.get(page).cloned().ok_or_else(down)
        }

        async fn fetch_url(&self, url: &str) -> FetchResult<String> {
            self.log(format!("url:{}", url));
            self.urls.get(url).cloned().ok_or(FetchError::Status(404))
        }

        fn page_base(&self) -> &str {
            BASE
        }
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    const SHORT_SECTION: &str = r#"<div><h2 id="Plot">Plot</h2><p>Too short to count.</p></div>"#;

    #[tokio::test]
    async fn matrix_resolves_from_plot_section() {
        let wiki = FakeWiki::default()
            .with_search("The Matrix 1999 film", "The Matrix")
            .with_section("The Matrix", "1", "Plot", &fixture("matrix_plot_section"));
        let outcome = PlotResolver::new(&wiki, cfg())
            .resolve(Some("The Matrix"), Some("1999"))
            .await;

        assert_eq!(outcome.method_tag(), "api_section");
        assert_eq!(outcome.page(), Some("The Matrix"));
        assert!(outcome.text().unwrap().chars().count() >= 120);
        // first variant was enough
        assert_eq!(wiki.count("search:"), 1);
        assert_eq!(wiki.count("page:"), 0);
    }

    #[tokio::test]
    async fn obscure_film_falls_back_to_full_page() {
        let wiki = FakeWiki::default()
            .with_search("Some Obscure Film (film)", "Some Obscure Film")
            .with_section("Some Obscure Film", "1", "Release", "<p>irrelevant</p>")
            .with_page("Some Obscure Film", &fixture("obscure_film_page"));
        let outcome = PlotResolver::new(&wiki, cfg())
            .resolve(Some("3. Some Obscure Film"), None)
            .await;

        assert_eq!(outcome.method_tag(), "api_full_html");
        assert_eq!(outcome.page(), Some("Some Obscure Film"));
        assert!(outcome.text().unwrap().starts_with("In a small coastal town"));
        assert!(wiki.calls().contains(&"search:Some Obscure Film (film)".to_string()));
        // the non-plot section is never fetched
        assert_eq!(wiki.count("section:"), 0);
    }

    #[tokio::test]
    async fn nothing_resolves() {
        let wiki = FakeWiki::default();
        let outcome = PlotResolver::new(&wiki, cfg())
            .resolve(Some("Unfindable"), Some("2001"))
            .await;

        assert_eq!(outcome, PlotOutcome::NotFound);
        assert_eq!(outcome.text(), None);
        assert_eq!(outcome.page(), None);
        assert_eq!(outcome.method_tag(), "none");
        assert_eq!(wiki.count("search:"), 5);
        assert_eq!(wiki.count("sections:"), 0);
    }

    #[tokio::test]
    async fn empty_title_makes_no_calls() {
        let wiki = FakeWiki::default();
        let outcome = PlotResolver::new(&wiki, cfg()).resolve(None, None).await;
        assert_eq!(outcome, PlotOutcome::NotFound);
        assert!(wiki.calls().is_empty());
    }

    #[tokio::test]
    async fn short_section_falls_through_to_heading_scan() {
        let wiki = FakeWiki::default()
            .with_search("Lighthouse (film)", "The Lighthouse Case")
            .with_section("The Lighthouse Case", "1", "Plot", SHORT_SECTION)
            .with_page("The Lighthouse Case", &fixture("legacy_plot_page"));
        let outcome = PlotResolver::new(&wiki, cfg())
            .resolve(Some("Lighthouse"), None)
            .await;

        assert_eq!(outcome.method_tag(), "api_full_html");
        assert!(outcome.text().unwrap().starts_with("A retired detective"));
        assert_eq!(wiki.count("section:"), 1);
    }

    #[tokio::test]
    async fn tried_page_never_requeried() {
        // every variant resolves to the same page, which has no plot anywhere
        let wiki = FakeWiki::default()
            .with_search("Heat 1995 film", "Heat")
            .with_search("Heat (1995 film)", "Heat")
            .with_search("Heat (film)", "Heat")
            .with_search("Heat film", "Heat")
            .with_search("Heat", "Heat")
            .with_section("Heat", "1", "Cast", "<p>cast list</p>")
            .with_page("Heat", "<h2>Cast</h2><p>Nothing about the story here at all.</p>");
        let outcome = PlotResolver::new(&wiki, cfg())
            .resolve(Some("Heat"), Some("1995"))
            .await;

        assert_eq!(outcome, PlotOutcome::NotFound);
        assert_eq!(wiki.count("search:"), 5);
        assert_eq!(wiki.count("sections:Heat"), 1);
        assert_eq!(wiki.count("page:Heat"), 1);
        // each constructed URL fetched once
        assert_eq!(wiki.count("url:"), 3);
    }

    #[tokio::test]
    async fn constructed_url_fallback() {
        let wiki = FakeWiki::default()
            .with_search("Lighthouse 1987 film", "Lighthouse (disambiguation)")
            .with_url(
                &format!("{}Lighthouse_%281987_film%29", BASE),
                &fixture("legacy_plot_page"),
            );
        let outcome = PlotResolver::new(&wiki, cfg())
            .resolve(Some("Lighthouse"), Some("1987"))
            .await;

        assert_eq!(outcome.method_tag(), "html_fallback");
        assert_eq!(outcome.page(), Some("Lighthouse (1987 film)"));
        assert!(outcome.text().unwrap().contains("lighthouse keeper"));
        // sections and full page were both attempted first and failed
        assert_eq!(wiki.count("sections:"), 1);
        assert_eq!(wiki.count("page:"), 1);
    }

    #[tokio::test]
    async fn failures_do_not_abort_later_variants() {
        let wiki = FakeWiki::default()
            .with_search("Alien 1979 film", "Alien (franchise)")
            .with_search("Alien (1979 film)", "Alien (film)")
            .with_section("Alien (film)", "2", "Plot summary", &fixture("matrix_plot_section"));
        let outcome = PlotResolver::new(&wiki, cfg())
            .resolve(Some("Alien"), Some("1979"))
            .await;

        assert_eq!(outcome.method_tag(), "api_section");
        assert_eq!(outcome.page(), Some("Alien (film)"));
        assert_eq!(wiki.count("search:"), 2);
    }
}
