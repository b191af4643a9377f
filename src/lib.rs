//! Bounded, policy-constrained web harvester.
//!
//! Crawls outward from seed URLs within an allow-list, honours robots.txt,
//! saves HTML text (with a provenance header) and PDFs, and writes a manifest
//! plus catalog describing everything saved.

pub mod config;
pub mod crawlers;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod glob;
pub mod manifest;
pub mod parsers;
pub mod robots;
pub mod store;
pub mod utils;

pub use config::{AllowListConfig, ConfigError, HarvestConfig, HarvestInputs, SeedsConfig};
pub use crawlers::{CrawlStats, FrontierItem};
pub use error::HarvestError;
pub use filter::{PolicyDecision, PolicyReason};
pub use manifest::{CatalogEntry, EntryKind, Manifest, ManifestEntry};

use crawlers::CrawlSession;
use fetch::Fetcher;
use filter::{AllowList, PolicyGate};
use std::path::PathBuf;
use std::sync::Arc;
use store::ProvenanceStore;
use tokio_util::sync::CancellationToken;

/// Default output root, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Result of a completed or cancelled run
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub manifest: Manifest,
    pub stats: CrawlStats,
    /// True when the run stopped early; the manifest is then partial but valid
    pub cancelled: bool,
}

/// Main builder for a harvest run
pub struct Harvest {
    inputs: HarvestInputs,
    config_dir: Option<PathBuf>,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

impl Harvest {
    /// Create a new Harvest with the given inputs
    pub fn new(inputs: HarvestInputs) -> Self {
        Self {
            inputs,
            config_dir: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cancel: CancellationToken::new(),
        }
    }

    /// Load `config.json`, `allowlist.json` and `seeds.json` from a directory.
    ///
    /// The directory is protected: a run refuses an output root that contains it.
    pub fn from_config_dir(dir: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        Ok(Self {
            config_dir: Some(dir.to_path_buf()),
            ..Self::new(HarvestInputs::load_dir(dir)?)
        })
    }

    /// Set the output root. It is wiped and recreated when the run starts,
    /// unless it is the working directory or holds the config directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Override the worker pool size
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.inputs.config.concurrency = max_concurrency;
        self
    }

    /// Use an external token to stop the crawl early
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops this run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Crawl until the frontier drains (or cancellation), then write
    /// `manifest.json` and `catalog.json` exactly once.
    pub async fn run(self) -> Result<HarvestReport, HarvestError> {
        let Harvest {
            inputs,
            config_dir,
            output_dir,
            cancel,
        } = self;

        inputs.config.validate()?;
        inputs.seeds.validate()?;

        let fetcher = Fetcher::new(&inputs.config)?;
        let gate = PolicyGate::new(AllowList::new(inputs.allow_list), &inputs.config.user_agent);
        let mut store = ProvenanceStore::new(output_dir);
        if let Some(dir) = config_dir {
            store = store.protect(dir);
        }
        store.prepare().await?;

        let seeds = inputs.seeds.frontier_items();
        let session = Arc::new(CrawlSession::new(inputs.config, gate, fetcher, store, cancel));
        let queued = session.seed(seeds);
        ::log::info!("[harvest] seeds in queue: {}", queued);

        let stats = session.run().await;
        let cancelled = session.is_cancelled();
        if cancelled {
            ::log::warn!("[harvest] cancelled, writing partial manifest");
        }

        let manifest = session.manifest().build();
        manifest.write_outputs(session.store().root()).await?;
        ::log::info!(
            "[harvest] done. items: {}, policy rejections: {}, failures: {}",
            manifest.items.len(),
            stats.policy_rejected,
            stats.failed
        );

        Ok(HarvestReport {
            manifest,
            stats,
            cancelled,
        })
    }
}
