pub mod html;


use regex::Regex;
use std::sync::LazyLock;

static PDF_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.pdf(\?.*)?$").expect("valid PDF suffix pattern"));

/// How a fetched response is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Saved byte-for-byte, no extraction
    Pdf,
    /// HTML or XML: text and links are extracted
    Html,
    /// Anything else is dropped without being saved or expanded
    Unsupported,
}

impl ContentKind {
    /// Classify by content-type, falling back to the URL suffix for PDFs
    pub fn classify(content_type: &str, url: &str) -> Self {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("pdf") || PDF_SUFFIX.is_match(url) {
            ::log::debug!("Classifying as PDF: {}", url);
            ContentKind::Pdf
        } else if content_type.contains("html") || content_type.contains("xml") {
            ::log::debug!("Classifying as HTML: {}", url);
            ContentKind::Html
        } else {
            ::log::debug!("Unsupported content type {:?}: {}", content_type, url);
            ContentKind::Unsupported
        }
    }
}

/// Readable content pulled out of an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Text of the `<title>` element, trimmed
    pub title: String,
    /// Body text with whitespace runs collapsed
    pub text: String,
    /// Raw `href` values in document order, not yet resolved
    pub links: Vec<String>,
}

impl ExtractedContent {
    pub fn new(title: String, text: String, links: Vec<String>) -> Self {
        Self { title, text, links }
    }
}
