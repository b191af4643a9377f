use crate::config::HarvestConfig;
use crate::crawlers::frontier::{Frontier, FrontierItem};
use crate::fetch::{FetchError, FetchResult, Fetcher};
use crate::filter::{PolicyGate, PolicyReason};
use crate::manifest::ManifestBuilder;
use crate::parsers::{ContentKind, ExtractedContent, html};
use crate::store::ProvenanceStore;
use crate::utils::{folder_host, join_url, normalize_url};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-URL failures. They are logged and never stop the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to save: {0}")]
    Store(#[from] std::io::Error),
}

/// What happened to one dequeued item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Written to disk and appended to the manifest
    Saved,
    /// Fetched and processed but nothing written (blank text or saving disabled)
    NotSaved,
    /// Host already holds `maxPerHost` saved items
    HostCapReached,
    /// Refused by the allow-list or robots.txt
    Rejected(PolicyReason),
    /// Non-2xx response
    HttpStatus(u16),
    /// Content type that is neither PDF nor HTML/XML
    Unsupported,
}

/// Counters for a finished (or cancelled) crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStats {
    pub dequeued: usize,
    pub saved: usize,
    pub policy_rejected: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct StatsCounters {
    dequeued: AtomicUsize,
    saved: AtomicUsize,
    policy_rejected: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl StatsCounters {
    fn snapshot(&self) -> CrawlStats {
        CrawlStats {
            dequeued: self.dequeued.load(Ordering::Acquire),
            saved: self.saved.load(Ordering::Acquire),
            policy_rejected: self.policy_rejected.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
        }
    }
}

/// All state for one crawl run, shared by its workers
#[derive(Debug)]
pub struct CrawlSession {
    config: HarvestConfig,
    frontier: Frontier,
    gate: PolicyGate,
    fetcher: Fetcher,
    store: ProvenanceStore,
    manifest: ManifestBuilder,
    cancel: CancellationToken,
    counters: StatsCounters,
}

impl CrawlSession {
    pub fn new(
        config: HarvestConfig,
        gate: PolicyGate,
        fetcher: Fetcher,
        store: ProvenanceStore,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            frontier: Frontier::new(),
            gate,
            fetcher,
            store,
            manifest: ManifestBuilder::new(),
            cancel,
            counters: StatsCounters::default(),
        }
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn manifest(&self) -> &ManifestBuilder {
        &self.manifest
    }

    pub fn store(&self) -> &ProvenanceStore {
        &self.store
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn stats(&self) -> CrawlStats {
        self.counters.snapshot()
    }

    /// Queue seed items, returning how many were accepted
    pub fn seed(&self, items: Vec<FrontierItem>) -> usize {
        self.frontier.extend(items)
    }

    /// Run `concurrency` workers until the frontier drains or the session is cancelled
    pub async fn run(self: &Arc<Self>) -> CrawlStats {
        let num_workers = self.config.concurrency.max(1);
        let workers: Vec<JoinHandle<()>> = (0..num_workers)
            .map(|worker_id| spawn_worker(worker_id, Arc::clone(self)))
            .collect();

        for (worker_id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                ::log::warn!("Worker {} terminated abnormally: {}", worker_id, e);
            }
        }
        ::log::info!("All {} workers have completed", num_workers);

        self.stats()
    }

    /// Admission, fetch, classification and save for one dequeued item
    pub async fn process_item(&self, item: &FrontierItem) -> Result<ItemOutcome, CrawlError> {
        let url = Url::parse(&item.url)
            .map_err(|e| CrawlError::InvalidUrl(format!("{}: {}", item.url, e)))?;
        if url.host_str().is_none() {
            return Err(CrawlError::InvalidUrl(item.url.clone()));
        }
        // Same key as ManifestEntry.host, so the cap holds across ports
        let host = folder_host(&url);

        if self.frontier.saved_for_host(&host) >= self.config.max_per_host {
            return Ok(ItemOutcome::HostCapReached);
        }

        let decision = self.gate.evaluate(&url, &self.fetcher).await;
        if !decision.allowed {
            return Ok(ItemOutcome::Rejected(decision.reason));
        }

        let delay = self.config.rate_limit();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = self.fetcher.get(&item.url).await?;
        if !response.is_success() {
            return Ok(ItemOutcome::HttpStatus(response.status));
        }

        match ContentKind::classify(&response.content_type, &item.url) {
            ContentKind::Pdf if self.config.save_pdf => {
                self.save_pdf(item, &host, &response).await
            }
            ContentKind::Pdf => Ok(ItemOutcome::NotSaved),
            ContentKind::Html => {
                let page = html::extract(&String::from_utf8_lossy(&response.bytes));
                let outcome = if self.config.save_html_as_txt && !page.text.trim().is_empty() {
                    self.save_text(item, &host, &page, &response).await?
                } else {
                    ItemOutcome::NotSaved
                };

                if item.depth < self.config.max_depth {
                    let queued = self.enqueue_links(item, &page.links);
                    ::log::debug!("Queued {} of {} links from {}", queued, page.links.len(), item.url);
                }
                Ok(outcome)
            }
            ContentKind::Unsupported => Ok(ItemOutcome::Unsupported),
        }
    }

    async fn save_pdf(
        &self,
        item: &FrontierItem,
        host: &str,
        response: &FetchResult,
    ) -> Result<ItemOutcome, CrawlError> {
        if !self.frontier.try_reserve_save(host, self.config.max_per_host) {
            return Ok(ItemOutcome::HostCapReached);
        }
        let saved = self
            .store
            .save_pdf(host, &item.url, &response.bytes, &response.content_type)
            .await;
        self.commit_save(host, saved)
    }

    async fn save_text(
        &self,
        item: &FrontierItem,
        host: &str,
        page: &ExtractedContent,
        response: &FetchResult,
    ) -> Result<ItemOutcome, CrawlError> {
        if !self.frontier.try_reserve_save(host, self.config.max_per_host) {
            return Ok(ItemOutcome::HostCapReached);
        }
        let saved = self
            .store
            .save_text(
                host,
                &item.url,
                &page.title,
                &page.text,
                &response.content_type,
            )
            .await;
        self.commit_save(host, saved)
    }

    /// Keep the reserved host slot and record the entry, or hand the slot back
    fn commit_save(
        &self,
        host: &str,
        saved: std::io::Result<crate::manifest::ManifestEntry>,
    ) -> Result<ItemOutcome, CrawlError> {
        match saved {
            Ok(entry) => {
                self.manifest.push(entry);
                Ok(ItemOutcome::Saved)
            }
            Err(e) => {
                self.frontier.release_save(host);
                Err(e.into())
            }
        }
    }

    /// Resolve, normalize and queue links found on `item` at the next depth.
    ///
    /// Links outside the allow-list are dropped here so they never reach the
    /// queue; the full policy gate still runs when they are dequeued.
    fn enqueue_links(&self, item: &FrontierItem, links: &[String]) -> usize {
        let depth = item.depth + 1;
        let mut queued = 0;

        for link in links {
            let absolute = normalize_url(&join_url(&item.url, link));
            let Ok(resolved) = Url::parse(&absolute) else {
                ::log::debug!("Ignoring unresolvable link {:?} on {}", link, item.url);
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            if !self.gate.allow_list().check(&resolved).allowed {
                ::log::debug!("Allow-list rejected link: {}", resolved);
                continue;
            }

            if self.frontier.push(FrontierItem::new(absolute, depth)) {
                ::log::debug!("Queuing link for crawling: {}", resolved);
                queued += 1;
            } else {
                ::log::debug!("Skipping already visited link: {}", resolved);
            }
        }

        queued
    }

    fn record(&self, item: &FrontierItem, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Saved => {
                self.counters.saved.fetch_add(1, Ordering::AcqRel);
            }
            ItemOutcome::Rejected(reason) => {
                self.counters.policy_rejected.fetch_add(1, Ordering::AcqRel);
                ::log::info!("[policy] {} rejected: {}", item.url, reason);
            }
            ItemOutcome::HttpStatus(status) => {
                self.counters.failed.fetch_add(1, Ordering::AcqRel);
                ::log::warn!("[skip] {} {}", status, item.url);
            }
            ItemOutcome::HostCapReached => {
                self.counters.skipped.fetch_add(1, Ordering::AcqRel);
                ::log::debug!("Host cap reached, dropping {}", item.url);
            }
            ItemOutcome::NotSaved | ItemOutcome::Unsupported => {
                self.counters.skipped.fetch_add(1, Ordering::AcqRel);
                ::log::debug!("Nothing saved for {} ({:?})", item.url, outcome);
            }
        }
    }
}

/// Spawns a single worker that drains the shared frontier
fn spawn_worker(worker_id: usize, session: Arc<CrawlSession>) -> JoinHandle<()> {
    ::log::trace!("Spawning worker {}", worker_id);
    tokio::spawn(async move {
        worker_processing_loop(worker_id, &session).await;
    })
}

/// Main processing loop for a worker.
///
/// Runs until the frontier reports it is drained or the session is cancelled.
async fn worker_processing_loop(worker_id: usize, session: &CrawlSession) {
    ::log::debug!("Worker {} starting processing loop", worker_id);

    while let Some(claim) = session.frontier.next(&session.cancel).await {
        let item = claim.item();
        ::log::trace!("Worker {} processing: {} (depth {})", worker_id, item.url, item.depth);
        session.counters.dequeued.fetch_add(1, Ordering::AcqRel);

        match session.process_item(item).await {
            Ok(outcome) => session.record(item, outcome),
            Err(e) => {
                session.counters.failed.fetch_add(1, Ordering::AcqRel);
                ::log::warn!("[error] {} {}", item.url, e);
            }
        }
        // Dropping the claim marks the item finished
    }

    ::log::debug!(
        "Worker {} completed processing loop - no more URLs to process",
        worker_id
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllowListConfig;
    use crate::filter::AllowList;
    use std::collections::BTreeMap;

    fn session(config: HarvestConfig, root: &std::path::Path) -> CrawlSession {
        let mut allow = BTreeMap::new();
        allow.insert("example.com".to_string(), vec!["/docs/*".to_string()]);
        let gate = PolicyGate::new(
            AllowList::new(AllowListConfig::Paths(allow)),
            &config.user_agent,
        );
        let fetcher = Fetcher::new(&config).unwrap();
        CrawlSession::new(
            config,
            gate,
            fetcher,
            ProvenanceStore::new(root),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_enqueue_links_filters_and_deepens() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(HarvestConfig::default(), dir.path());
        let parent = FrontierItem::new("https://example.com/docs/index.html", 1);
        let links = vec![
            "intro.html#part-2".to_string(),
            "/docs/guide.html".to_string(),
            "/blog/post".to_string(),
            "https://other.com/docs/x".to_string(),
            "mailto:someone@example.com".to_string(),
        ];

        let queued = session.enqueue_links(&parent, &links);
        assert_eq!(queued, 2);
        assert_eq!(session.frontier().queued_count(), 2);

        let claim = session
            .frontier()
            .next(&CancellationToken::new())
            .await
            .expect("queued link");
        assert_eq!(claim.item().url, "https://example.com/docs/intro.html");
        assert_eq!(claim.item().depth, 2);
    }

    #[tokio::test]
    async fn test_outside_allow_list_is_rejected_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(HarvestConfig::default(), dir.path());
        let item = FrontierItem::new("https://other.com/docs/x", 0);

        let outcome = session.process_item(&item).await.unwrap();
        assert_eq!(outcome, ItemOutcome::Rejected(PolicyReason::NotInAllowlist));

        let item = FrontierItem::new("https://example.com/blog/x", 0);
        let outcome = session.process_item(&item).await.unwrap();
        assert_eq!(outcome, ItemOutcome::Rejected(PolicyReason::PathNotAllowed));
    }

    #[tokio::test]
    async fn test_host_cap_drops_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarvestConfig {
            max_per_host: 1,
            ..HarvestConfig::default()
        };
        let session = session(config, dir.path());
        assert!(session.frontier().try_reserve_save("example.com", 1));

        let item = FrontierItem::new("https://example.com/docs/a", 0);
        let outcome = session.process_item(&item).await.unwrap();
        assert_eq!(outcome, ItemOutcome::HostCapReached);
    }

    #[tokio::test]
    async fn test_invalid_url_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(HarvestConfig::default(), dir.path());
        let item = FrontierItem::new("not a url", 0);
        assert!(matches!(
            session.process_item(&item).await,
            Err(CrawlError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_session_drains_without_work() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(session(HarvestConfig::default(), dir.path()));
        session.seed(vec![FrontierItem::new("https://example.com/docs/a", 0)]);
        session.cancel.cancel();

        let stats = session.run().await;
        assert_eq!(stats.dequeued, 0);
        assert!(session.manifest().is_empty());
    }
}
