use sha2::{Digest, Sha256};
use url::Url;

/// Maximum length of a generated file slug, hash suffix included
pub const MAX_SLUG_LEN: usize = 120;

/// Number of hex characters of the URL hash appended to every slug
const SLUG_HASH_LEN: usize = 8;

/// Canonicalize a URL for use as a dedup key.
///
/// Strips the fragment and leaves everything else as parsed. Input that does
/// not parse as an absolute URL is returned unchanged.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// Resolve `href` against `base`, returning `href` untouched if either side fails to parse
pub fn join_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|joined| joined.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Host key used for allow-list lookups.
///
/// Includes the port only when it differs from the scheme default.
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Host without port, used for output folders, manifest entries and the per-host save cap
pub fn folder_host(url: &Url) -> String {
    url.host_str().unwrap_or("unknown-host").to_string()
}

/// Hex-encoded SHA-256 digest
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Convert arbitrary text into a filesystem-safe slug of at most `max` characters.
///
/// Lower-cases, drops `http://`/`https://`, collapses every run of characters
/// outside `[a-z0-9]` into a single hyphen and trims hyphens from both ends.
/// Falls back to `item` when nothing survives.
pub fn slugify(input: &str, max: usize) -> String {
    let lowered = input
        .to_lowercase()
        .replace("https://", "")
        .replace("http://", "");

    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    // Slug is pure ASCII at this point, so byte truncation is safe
    slug.truncate(max);
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "item".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Stable file stem for a harvested item: `{host}-{title}-{hash8(url)}`.
///
/// The descriptive part is truncated first so the URL hash always survives,
/// which keeps names distinct for distinct URLs sharing a title.
pub fn file_stem(host: &str, title: &str, url: &str) -> String {
    let hash = sha256_hex(url.as_bytes());
    let prefix = slugify(
        &format!("{}-{}", host, title),
        MAX_SLUG_LEN - SLUG_HASH_LEN - 1,
    );
    format!("{}-{}", prefix, &hash[..SLUG_HASH_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_fragment_only() {
        assert_eq!(
            normalize_url("https://example.com/docs/page?q=1#section"),
            "https://example.com/docs/page?q=1"
        );
        assert_eq!(
            normalize_url("https://example.com/a#x"),
            normalize_url("https://example.com/a#y")
        );
    }

    #[test]
    fn test_normalize_malformed_is_unchanged() {
        assert_eq!(normalize_url("not a url"), "not a url");
        assert_eq!(normalize_url("/relative/path"), "/relative/path");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://example.com/docs/index.html", "intro.html"),
            "https://example.com/docs/intro.html"
        );
        assert_eq!(
            join_url("https://example.com/docs/", "/about"),
            "https://example.com/about"
        );
        assert_eq!(
            join_url("https://example.com/", "https://other.com/x"),
            "https://other.com/x"
        );
        // Base that cannot be parsed falls back to the raw href
        assert_eq!(join_url("garbage", "page.html"), "page.html");
    }

    #[test]
    fn test_host_key_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(host_key(&url).as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(folder_host(&url), "127.0.0.1");

        let url = Url::parse("https://example.com:443/x").unwrap();
        assert_eq!(host_key(&url).as_deref(), Some("example.com"));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("https://Example.com/Docs Page", 120), "example-com-docs-page");
        assert_eq!(slugify("--Hello,   World!--", 120), "hello-world");
        assert_eq!(slugify("!!!", 120), "item");
        assert_eq!(slugify("abcdef-ghij", 7), "abcdef");
    }

    #[test]
    fn test_file_stem_is_deterministic_and_distinct() {
        let a = file_stem("example.com", "Guide", "https://example.com/a");
        let b = file_stem("example.com", "Guide", "https://example.com/b");
        assert_ne!(a, b);
        assert_eq!(a, file_stem("example.com", "Guide", "https://example.com/a"));
        assert!(a.starts_with("example-com-guide-"));
    }

    #[test]
    fn test_file_stem_keeps_hash_for_long_titles() {
        let title = "word ".repeat(100);
        let stem = file_stem("example.com", &title, "https://example.com/long");
        let hash = sha256_hex(b"https://example.com/long");
        assert!(stem.len() <= MAX_SLUG_LEN);
        assert!(stem.ends_with(&hash[..8]));
    }
}
