use crate::manifest::{EntryKind, ManifestEntry};
use crate::utils::{file_stem, sha256_hex};
use chrono::{DateTime, SecondsFormat, Utc};
use std::io;
use std::path::{Path, PathBuf};

/// Directory under the output root that holds saved content
pub const HARVEST_DIR: &str = "harvest";

/// Writes harvested content under `<root>/harvest/<host>/` and describes it
#[derive(Debug, Clone)]
pub struct ProvenanceStore {
    root: PathBuf,
    /// Paths that must survive [`ProvenanceStore::prepare`]
    protected: Vec<PathBuf>,
}

impl ProvenanceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            protected: Vec::new(),
        }
    }

    /// Refuse to wipe a root that contains `path`
    pub fn protect(mut self, path: impl Into<PathBuf>) -> Self {
        self.protected.push(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Recreate a clean output root for a new run.
    ///
    /// Fails without deleting anything when the root is the working
    /// directory, one of its ancestors, or contains a protected path.
    pub async fn prepare(&self) -> io::Result<()> {
        self.ensure_wipe_allowed().await?;
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => ::log::debug!("Removed previous output at {}", self.root.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(self.root.join(HARVEST_DIR)).await
    }

    async fn ensure_wipe_allowed(&self) -> io::Result<()> {
        let root = match tokio::fs::canonicalize(&self.root).await {
            Ok(root) => root,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let keep = std::iter::once(std::env::current_dir()?).chain(self.protected.iter().cloned());
        for path in keep {
            let Ok(path) = tokio::fs::canonicalize(&path).await else {
                continue;
            };
            if path.starts_with(&root) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "refusing to wipe output root {}: it contains {}",
                        root.display(),
                        path.display()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Save extracted HTML text prefixed with its provenance header
    pub async fn save_text(
        &self,
        host: &str,
        url: &str,
        title: &str,
        text: &str,
        content_type: &str,
    ) -> io::Result<ManifestEntry> {
        let fetched_at = Utc::now();
        let stem = file_stem(host, non_empty_or(title, "page"), url);
        let body = format!("{}{}", provenance_header(url, fetched_at, content_type), text);

        let saved_path = self.write(host, &format!("{}.txt", stem), body.as_bytes()).await?;
        ::log::info!("[saved txt] {}", saved_path);

        Ok(ManifestEntry {
            kind: EntryKind::HtmlToText,
            host: host.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            saved_path,
            bytes: body.len() as u64,
            fetched_at,
            content_type: content_type.to_string(),
        })
    }

    /// Save a PDF unmodified. Its title is the last segment of the URL path.
    pub async fn save_pdf(
        &self,
        host: &str,
        url: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> io::Result<ManifestEntry> {
        let fetched_at = Utc::now();
        let title = pdf_title(url);
        let stem = file_stem(host, non_empty_or(&title, "document"), url);

        let saved_path = self.write(host, &format!("{}.pdf", stem), bytes).await?;
        ::log::info!("[saved pdf] {}", saved_path);

        Ok(ManifestEntry {
            kind: EntryKind::Pdf,
            host: host.to_string(),
            url: url.to_string(),
            title,
            saved_path,
            bytes: bytes.len() as u64,
            fetched_at,
            content_type: content_type.to_string(),
        })
    }

    /// Write `contents` to `<root>/harvest/<host>/<file_name>` and return the
    /// `/`-separated path relative to the root
    async fn write(&self, host: &str, file_name: &str, contents: &[u8]) -> io::Result<String> {
        let folder = self.root.join(HARVEST_DIR).join(host);
        tokio::fs::create_dir_all(&folder).await?;
        tokio::fs::write(folder.join(file_name), contents).await?;
        Ok(format!("{}/{}/{}", HARVEST_DIR, host, file_name))
    }
}

/// Fixed metadata block written ahead of extracted text
pub fn provenance_header(url: &str, fetched_at: DateTime<Utc>, content_type: &str) -> String {
    [
        "--- provenance ---".to_string(),
        format!("source-url: {}", url),
        format!(
            "fetched-at: {}",
            fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        format!("content-type: {}", content_type),
        format!("sha256-url: {}", sha256_hex(url.as_bytes())),
        "-------------------".to_string(),
        String::new(),
        String::new(),
    ]
    .join("\n")
}

fn pdf_title(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default()
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}
