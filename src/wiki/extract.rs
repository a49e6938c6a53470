use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

use super::SectionDescriptor;

static FOOTNOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\s*\d+\s*\]").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Section labels that hold a film's plot.
pub const PLOT_LABELS: &[&str] = &["plot", "synopsis", "summary", "plot summary"];

const SKIPPED_TAGS: &[&str] = &["script", "style"];
const SKIPPED_CLASSES: &[&str] = &["mw-editsection"];

fn is_plot_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    PLOT_LABELS.iter().any(|k| lower.contains(k))
}

/// Keep only sections whose label names a plot, in page order.
pub fn plot_sections(sections: &[SectionDescriptor]) -> Vec<&SectionDescriptor> {
    sections.iter().filter(|s| is_plot_label(&s.label)).collect()
}

/// Drop footnote markers like "[3]" and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let stripped = FOOTNOTE_RE.replace_all(raw, "");
    WS_RE.replace_all(&stripped, " ").trim().to_string()
}

fn skipped(el: ElementRef<'_>) -> bool {
    let v = el.value();
    SKIPPED_TAGS.contains(&v.name()) || v.classes().any(|c| SKIPPED_CLASSES.contains(&c))
}

fn collect_text(el: ElementRef<'_>, out: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => {
                let piece = t.trim();
                if !piece.is_empty() {
                    out.push(piece.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !skipped(child_el) {
                        collect_text(child_el, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Visible text of an element, pieces joined by single spaces.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();
    collect_text(el, &mut pieces);
    pieces.join(" ")
}

/// Clean text of a rendered section fragment, or None if nothing is left.
pub fn section_text(html: &str) -> Option<String> {
    if html.trim().is_empty() {
        return None;
    }
    let fragment = Html::parse_fragment(html);
    let text = clean_text(&visible_text(fragment.root_element()));
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn heading_level(el: ElementRef<'_>) -> Option<u8> {
    match el.value().name() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Headings that can open a plot section. The `h1` is the page title.
fn is_candidate_heading(el: ElementRef<'_>) -> bool {
    matches!(heading_level(el), Some(2 | 3))
}

fn id_has_plot(el: ElementRef<'_>) -> bool {
    el.value()
        .attr("id")
        .map(|id| id.to_lowercase().contains("plot"))
        .unwrap_or(false)
}

/// The heading itself or an anchor inside it carries a "plot" id.
fn has_plot_anchor(heading: ElementRef<'_>) -> bool {
    heading.descendants().filter_map(ElementRef::wrap).any(id_has_plot)
}

/// Paragraphs after `elements[start]` up to the next heading of the same or higher level.
fn paragraphs_after(elements: &[ElementRef<'_>], start: usize, min_chars: usize) -> Vec<String> {
    let Some(level) = heading_level(elements[start]) else {
        return Vec::new();
    };
    let mut paras = Vec::new();
    for el in &elements[start + 1..] {
        if let Some(l) = heading_level(*el) {
            if l <= level {
                break;
            }
        }
        if el.value().name() == "p" {
            let text = clean_text(&visible_text(*el));
            if text.chars().count() > min_chars {
                paras.push(text);
            }
        }
    }
    paras
}

/// Locate the plot heading in a rendered page and join the paragraphs under it.
///
/// Anchor ids containing "plot" are tried first, then heading text matching
/// any plot label. Paragraphs of `min_paragraph_chars` or fewer are noise.
pub fn heading_scan(html: &str, min_paragraph_chars: usize) -> Option<String> {
    let doc = Html::parse_document(html);
    let elements: Vec<ElementRef<'_>> = doc
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();

    let headings: Vec<usize> = elements
        .iter()
        .enumerate()
        .filter(|(_, el)| is_candidate_heading(**el))
        .map(|(i, _)| i)
        .collect();

    // Pass 1: anchor id
    if let Some(&idx) = headings.iter().find(|&&i| has_plot_anchor(elements[i])) {
        let paras = paragraphs_after(&elements, idx, min_paragraph_chars);
        if !paras.is_empty() {
            return Some(paras.join(" "));
        }
    }

    // Pass 2: heading text
    for &idx in &headings {
        if !is_plot_label(&visible_text(elements[idx])) {
            continue;
        }
        let paras = paragraphs_after(&elements, idx, min_paragraph_chars);
        if !paras.is_empty() {
            return Some(paras.join(" "));
        }
    }

    None
}

// ── Tests ──
