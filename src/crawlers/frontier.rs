//! Shared crawl frontier: FIFO queue, visited set, per-host save counters and
//! in-flight accounting for drain detection.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A URL waiting to be crawled, with the link depth it was discovered at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrontierItem {
    pub url: String,
    pub depth: u32,
}

impl FrontierItem {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<FrontierItem>,
    visited: HashSet<String>,
    saved_per_host: HashMap<String, usize>,
    in_flight: usize,
}

/// Work queue shared by every worker of one crawl session.
///
/// The lock is never held across an await point.
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an item unless its URL has already been dequeued.
    ///
    /// Returns whether the item was queued.
    pub fn push(&self, item: FrontierItem) -> bool {
        {
            let mut state = self.lock();
            if state.visited.contains(&item.url) {
                return false;
            }
            state.queue.push_back(item);
        }
        self.changed.notify_waiters();
        true
    }

    /// Enqueue several items, returning how many were queued
    pub fn extend(&self, items: impl IntoIterator<Item = FrontierItem>) -> usize {
        items
            .into_iter()
            .map(|item| self.push(item))
            .filter(|queued| *queued)
            .count()
    }

    /// Dequeue the next unvisited item and mark it visited in the same step.
    ///
    /// Waits while the queue is empty but other claims are still in flight,
    /// since they may enqueue more work. Returns `None` once the queue is
    /// empty with nothing in flight, or when `cancel` fires.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<FrontierClaim<'_>> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let changed = self.changed.notified();
            {
                let mut state = self.lock();
                while let Some(item) = state.queue.pop_front() {
                    if state.visited.insert(item.url.clone()) {
                        state.in_flight += 1;
                        return Some(FrontierClaim {
                            frontier: self,
                            item,
                        });
                    }
                    ::log::trace!("Skipping already visited: {}", item.url);
                }

                if state.in_flight == 0 {
                    drop(state);
                    // Wake idle workers so they observe the drained queue too
                    self.changed.notify_waiters();
                    return None;
                }
            }

            tokio::select! {
                _ = changed => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    fn release(&self) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Successful saves recorded so far for `host`
    pub fn saved_for_host(&self, host: &str) -> usize {
        self.lock().saved_per_host.get(host).copied().unwrap_or(0)
    }

    /// Reserve one save slot for `host` if it is still under `cap`.
    ///
    /// The check and the increment happen under one lock so concurrent
    /// workers cannot push a host past its cap.
    pub fn try_reserve_save(&self, host: &str, cap: usize) -> bool {
        let mut state = self.lock();
        let count = state.saved_per_host.entry(host.to_string()).or_insert(0);
        if *count >= cap {
            return false;
        }
        *count += 1;
        true
    }

    /// Return a slot reserved by [`Frontier::try_reserve_save`] whose save failed
    pub fn release_save(&self, host: &str) {
        if let Some(count) = self.lock().saved_per_host.get_mut(host) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().visited.contains(url)
    }

    pub fn queued_count(&self) -> usize {
        self.lock().queue.len()
    }
}

/// An item being processed by one worker.
///
/// Dropping the claim marks the item finished; until then the frontier
/// counts it as in flight and will not report itself drained.
#[derive(Debug)]
pub struct FrontierClaim<'a> {
    frontier: &'a Frontier,
    item: FrontierItem,
}

impl FrontierClaim<'_> {
    pub fn item(&self) -> &FrontierItem {
        &self.item
    }
}

impl Drop for FrontierClaim<'_> {
    fn drop(&mut self) {
        self.frontier.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let frontier = Frontier::new();
        let cancel = CancellationToken::new();
        frontier.push(FrontierItem::new("https://a.test/1", 0));
        frontier.push(FrontierItem::new("https://a.test/2", 1));

        let first = frontier.next(&cancel).await.expect("first item");
        assert_eq!(first.item().url, "https://a.test/1");
        drop(first);
        let second = frontier.next(&cancel).await.expect("second item");
        assert_eq!(second.item().depth, 1);
    }

    #[tokio::test]
    async fn test_duplicate_url_is_claimed_once() {
        let frontier = Frontier::new();
        let cancel = CancellationToken::new();
        frontier.push(FrontierItem::new("https://a.test/dup", 1));
        frontier.push(FrontierItem::new("https://a.test/dup", 2));

        let claim = frontier.next(&cancel).await.expect("one claim");
        assert_eq!(claim.item().depth, 1);
        drop(claim);

        assert!(frontier.next(&cancel).await.is_none());
        assert_eq!(frontier.visited_count(), 1);
        assert!(frontier.is_visited("https://a.test/dup"));
        // Already visited URLs are not queued again
        assert!(!frontier.push(FrontierItem::new("https://a.test/dup", 1)));
    }

    #[tokio::test]
    async fn test_empty_frontier_drains_immediately() {
        let frontier = Frontier::new();
        assert!(frontier.next(&CancellationToken::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_waits_for_in_flight_producer() {
        let frontier = Arc::new(Frontier::new());
        let cancel = CancellationToken::new();
        frontier.push(FrontierItem::new("https://a.test/seed", 0));

        let claim = frontier.next(&cancel).await.expect("seed");

        // A second worker finds the queue empty but must not exit yet
        let waiter = {
            let frontier = Arc::clone(&frontier);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                frontier
                    .next(&cancel)
                    .await
                    .map(|claim| claim.item().url.clone())
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        frontier.push(FrontierItem::new("https://a.test/child", 1));
        drop(claim);

        let next = waiter.await.unwrap();
        assert_eq!(next.as_deref(), Some("https://a.test/child"));
    }

    #[tokio::test]
    async fn test_idle_waiters_exit_when_last_claim_finishes() {
        let frontier = Arc::new(Frontier::new());
        let cancel = CancellationToken::new();
        frontier.push(FrontierItem::new("https://a.test/only", 0));
        let claim = frontier.next(&cancel).await.expect("claim");

        let waiter = {
            let frontier = Arc::clone(&frontier);
            let cancel = cancel.clone();
            tokio::spawn(async move { frontier.next(&cancel).await.is_none() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(claim);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancellation_stops_dequeue() {
        let frontier = Frontier::new();
        let cancel = CancellationToken::new();
        frontier.push(FrontierItem::new("https://a.test/1", 0));
        cancel.cancel();

        assert!(frontier.next(&cancel).await.is_none());
        assert_eq!(frontier.queued_count(), 1);
    }

    #[test]
    fn test_host_save_cap() {
        let frontier = Frontier::new();
        assert!(frontier.try_reserve_save("a.test", 2));
        assert!(frontier.try_reserve_save("a.test", 2));
        assert!(!frontier.try_reserve_save("a.test", 2));
        assert_eq!(frontier.saved_for_host("a.test"), 2);

        frontier.release_save("a.test");
        assert_eq!(frontier.saved_for_host("a.test"), 1);
        assert!(frontier.try_reserve_save("a.test", 2));
        assert_eq!(frontier.saved_for_host("b.test"), 0);
    }
}
