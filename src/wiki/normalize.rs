use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+\.\s*").unwrap());

/// Strip a leading "12. " ordinal and surrounding whitespace. Missing input is "".
pub fn clean_title(raw: Option<&str>) -> String {
    match raw {
        Some(title) => ORDINAL_RE.replace(title, "").trim().to_string(),
        None => String::new(),
    }
}

/// Accepts "1999" and spreadsheet renderings like "1999.0".
pub fn parse_year(raw: Option<&str>) -> Option<u32> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().ok();
    }
    let (whole, frac) = s.split_once('.')?;
    if !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.chars().all(|c| c == '0')
    {
        return whole.parse().ok();
    }
    None
}

/// Search queries, most specific first. The bare title always comes last.
pub fn query_variants(title: &str, year: Option<u32>) -> Vec<String> {
    let mut queries = Vec::with_capacity(5);
    if let Some(y) = year {
        queries.push(format!("{} {} film", title, y));
        queries.push(format!("{} ({} film)", title, y));
    }
    queries.push(format!("{} (film)", title));
    queries.push(format!("{} film", title));
    queries.push(title.to_string());
    queries
}

fn page_url(base: &str, page: &str) -> String {
    format!("{}{}", base, urlencoding::encode(&page.replace(' ', "_")))
}

/// Direct page URLs to try when the API paths came up empty.
///
/// Year-qualified page first, then the page search resolved to, then the
/// bare and "(film)" pages. At most four, no duplicates.
pub fn candidate_urls(base: &str, title: &str, year: Option<u32>, resolved: &str) -> Vec<String> {
    let mut pages = Vec::with_capacity(3);
    if let Some(y) = year {
        pages.push(format!("{} ({} film)", title, y));
    }
    pages.push(resolved.to_string());
    pages.push(format!("{} (film)", title));

    let mut seen = HashSet::new();
    pages
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .map(|p| page_url(base, &p))
        .collect()
}

/// Page title implied by a `/wiki/` URL.
pub fn page_from_url(url: &str) -> String {
    let tail = url.rsplit("/wiki/").next().unwrap_or(url);
    let decoded = urlencoding::decode(tail)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| tail.to_string());
    decoded.replace('_', " ")
}
