use crate::parsers::ExtractedContent;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Subtrees that never contribute text or links
const SKIPPED_ELEMENTS: [&str; 6] = ["script", "style", "noscript", "header", "footer", "nav"];

static TRAILING_SPACE_BEFORE_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\n").expect("valid whitespace pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace pattern"));

/// Extract title, readable body text and anchor hrefs from an HTML document
pub fn extract(html: &str) -> ExtractedContent {
    let doc = Html::parse_document(html);

    let title_selector = Selector::parse("title").unwrap();
    let title = doc
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let body_selector = Selector::parse("body").unwrap();
    let mut raw_text = String::new();
    let mut links = Vec::new();
    for body in doc.select(&body_selector) {
        walk(body, &mut raw_text, &mut links);
    }

    ::log::debug!("HTML extractor found {} links", links.len());

    ExtractedContent::new(title, collapse_whitespace(&raw_text), links)
}

/// Collect text nodes and anchor hrefs, skipping non-content subtrees
fn walk(element: ElementRef<'_>, text: &mut String, links: &mut Vec<String>) {
    for child in element.children() {
        if let Some(node_text) = child.value().as_text() {
            text.push_str(node_text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }
            if name == "a" {
                if let Some(href) = child_element.value().attr("href") {
                    links.push(href.to_string());
                }
            }
            walk(child_element, text, links);
        }
    }
}

/// Collapse whitespace: runs ending in a newline become one newline, any
/// other run of two or more whitespace characters becomes one space.
pub fn collapse_whitespace(text: &str) -> String {
    let newlines = TRAILING_SPACE_BEFORE_NEWLINE.replace_all(text, "\n");
    WHITESPACE_RUN.replace_all(&newlines, " ").trim().to_string()
}
