//! Manifest and catalog records consumed by downstream approval and publishing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CATALOG_FILE: &str = "catalog.json";

/// How a harvested item was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "html->txt")]
    HtmlToText,
    #[serde(rename = "pdf")]
    Pdf,
}

/// Metadata for one saved file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub kind: EntryKind,
    /// Host without port
    pub host: String,
    pub url: String,
    pub title: String,
    /// Path relative to the output root, always `/`-separated
    pub saved_path: String,
    /// Bytes written to disk
    pub bytes: u64,
    #[serde(with = "iso8601")]
    pub fetched_at: DateTime<Utc>,
    pub content_type: String,
}

/// The authoritative record of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(with = "iso8601")]
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ManifestEntry>,
}

/// Presentation projection of a manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub subtitle: String,
    pub url: String,
}

impl From<&ManifestEntry> for CatalogEntry {
    fn from(entry: &ManifestEntry) -> Self {
        let title = if entry.title.is_empty() {
            entry.url.clone()
        } else {
            entry.title.clone()
        };
        Self {
            title,
            subtitle: format!(
                "{} — harvested {}",
                entry.host,
                entry.fetched_at.format("%Y-%m-%d")
            ),
            url: entry.saved_path.clone(),
        }
    }
}

impl Manifest {
    pub fn new(items: Vec<ManifestEntry>) -> Self {
        Self {
            generated_at: Utc::now(),
            items,
        }
    }

    /// One catalog entry per manifest entry, same order
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.items.iter().map(CatalogEntry::from).collect()
    }

    /// Number of entries for `host`
    pub fn count_for_host(&self, host: &str) -> usize {
        self.items.iter().filter(|item| item.host == host).count()
    }

    /// Write `manifest.json` and `catalog.json` under `root`
    pub async fn write_outputs(&self, root: &Path) -> Result<(), crate::HarvestError> {
        let manifest = serde_json::to_vec_pretty(self)?;
        let catalog = serde_json::to_vec_pretty(&self.catalog())?;
        tokio::fs::write(root.join(MANIFEST_FILE), manifest).await?;
        tokio::fs::write(root.join(CATALOG_FILE), catalog).await?;
        ::log::info!(
            "Wrote {} and {} with {} items",
            MANIFEST_FILE,
            CATALOG_FILE,
            self.items.len()
        );
        Ok(())
    }
}

/// Shared append-only collection of entries produced by workers
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    entries: Mutex<Vec<ManifestEntry>>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: ManifestEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the entries in append order into a freshly stamped manifest
    pub fn build(&self) -> Manifest {
        let items = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Manifest::new(items)
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix
mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(url: &str, title: &str) -> ManifestEntry {
        ManifestEntry {
            kind: EntryKind::HtmlToText,
            host: "example.com".to_string(),
            url: url.to_string(),
            title: title.to_string(),
            saved_path: "harvest/example.com/example-com-page-0123abcd.txt".to_string(),
            bytes: 42,
            fetched_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            content_type: "text/html".to_string(),
        }
    }

    #[test]
    fn test_entry_serializes_with_wire_names() {
        let value = serde_json::to_value(entry("https://example.com/", "Home")).unwrap();
        assert_eq!(value["kind"], "html->txt");
        assert_eq!(value["savedPath"], "harvest/example.com/example-com-page-0123abcd.txt");
        assert_eq!(value["fetchedAt"], "2024-05-01T12:30:00.000Z");
        assert_eq!(value["contentType"], "text/html");

        let pdf = ManifestEntry {
            kind: EntryKind::Pdf,
            ..entry("https://example.com/a.pdf", "a.pdf")
        };
        assert_eq!(serde_json::to_value(pdf).unwrap()["kind"], "pdf");
    }

    #[test]
    fn test_manifest_parses_back() {
        let manifest = Manifest::new(vec![entry("https://example.com/", "Home")]);
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.items, manifest.items);
    }

    #[test]
    fn test_catalog_projection() {
        let manifest = Manifest::new(vec![
            entry("https://example.com/", "Home"),
            entry("https://example.com/untitled", ""),
        ]);
        let catalog = manifest.catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].title, "Home");
        assert_eq!(catalog[0].subtitle, "example.com — harvested 2024-05-01");
        assert_eq!(catalog[0].url, manifest.items[0].saved_path);
        assert_eq!(catalog[1].title, "https://example.com/untitled");
    }

    #[test]
    fn test_builder_keeps_append_order() {
        let builder = ManifestBuilder::new();
        assert!(builder.is_empty());
        builder.push(entry("https://example.com/1", "One"));
        builder.push(entry("https://example.com/2", "Two"));

        let manifest = builder.build();
        let urls: Vec<_> = manifest.items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/1", "https://example.com/2"]);
        assert_eq!(manifest.count_for_host("example.com"), 2);
    }

    #[tokio::test]
    async fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::new(vec![entry("https://example.com/", "Home")]);
        manifest.write_outputs(dir.path()).await.unwrap();

        let written: Manifest =
            serde_json::from_slice(&std::fs::read(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(written.items.len(), 1);

        let catalog: Vec<CatalogEntry> =
            serde_json::from_slice(&std::fs::read(dir.path().join(CATALOG_FILE)).unwrap())
                .unwrap();
        assert_eq!(catalog[0].title, "Home");
    }
}
