//! In-memory history of observed positions.
//!
//! [`HistoryStore`] is an append-only log kept most-recent-first. Samples get
//! identifiers from a counter that survives [`HistoryStore::clear`], so an
//! identifier is never handed out twice by the same store. Consumers can
//! [`subscribe`](HistoryStore::subscribe) to be woken on every change.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use locus_types::{Location, LocationSample, SampleId};

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::headless::PositionProcessor;

/// Shared, cloneable handle to a history log.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    inner: Arc<HistoryInner>,
}

#[derive(Debug)]
struct HistoryInner {
    entries: watch::Sender<VecDeque<LocationSample>>,
    next_id: AtomicU64,
    max_entries: Option<usize>,
}

impl HistoryStore {
    /// Create an unbounded history.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Create a history from configuration.
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::with_capacity(config.max_entries)
    }

    /// Create a history that keeps at most `max_entries` samples.
    pub fn with_capacity(max_entries: Option<usize>) -> Self {
        let (entries, _) = watch::channel(VecDeque::new());
        Self {
            inner: Arc::new(HistoryInner {
                entries,
                next_id: AtomicU64::new(1),
                max_entries,
            }),
        }
    }

    /// Record a provider location, returning the stored sample.
    pub fn append(&self, location: &Location) -> LocationSample {
        let mut sample = LocationSample::from_location(SampleId(0), location);
        let max_entries = self.inner.max_entries;

        // The id is taken under the entries lock so the front of the log
        // always carries the highest id.
        self.inner.entries.send_modify(|entries| {
            sample.id = SampleId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
            entries.push_front(sample.clone());
            if let Some(max) = max_entries {
                entries.truncate(max);
            }
        });

        debug!(id = %sample.id, lat = sample.latitude, lng = sample.longitude, "Recorded sample");
        sample
    }

    /// Remove every sample.
    pub fn clear(&self) {
        self.inner.entries.send_modify(VecDeque::clear);
    }

    /// Snapshot of all samples, most recent first.
    pub fn entries(&self) -> Vec<LocationSample> {
        self.inner.entries.borrow().iter().cloned().collect()
    }

    /// The most recently recorded sample.
    pub fn latest(&self) -> Option<LocationSample> {
        self.inner.entries.borrow().front().cloned()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Subscribe to changes.
    pub fn subscribe(&self) -> watch::Receiver<VecDeque<LocationSample>> {
        self.inner.entries.subscribe()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionProcessor for HistoryStore {
    async fn process_position(&self, location: &Location) -> Result<()> {
        self.append(location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_types::Coords;
    use time::macros::datetime;

    fn location(lat: f64) -> Location {
        Location::new(
            Coords::new(lat, -122.0, Some(5.0)),
            datetime!(2026-03-01 12:00:00 UTC),
        )
    }

    #[test]
    fn test_most_recent_first() {
        let history = HistoryStore::new();
        history.append(&location(1.0));
        history.append(&location(2.0));
        history.append(&location(3.0));

        let lats: Vec<f64> = history.entries().iter().map(|s| s.latitude).collect();
        assert_eq!(lats, vec![3.0, 2.0, 1.0]);
        assert_eq!(history.latest().unwrap().latitude, 3.0);
    }

    #[test]
    fn test_ids_unique_across_clear() {
        let history = HistoryStore::new();
        let first = history.append(&location(1.0));
        history.clear();
        assert!(history.is_empty());

        let second = history.append(&location(1.0));
        assert!(second.id > first.id);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let history = HistoryStore::with_capacity(Some(2));
        history.append(&location(1.0));
        history.append(&location(2.0));
        history.append(&location(3.0));

        let lats: Vec<f64> = history.entries().iter().map(|s| s.latitude).collect();
        assert_eq!(lats, vec![3.0, 2.0]);
    }

    #[test]
    fn test_clones_share_entries() {
        let history = HistoryStore::new();
        let other = history.clone();
        other.append(&location(1.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_concurrent_appends_keep_ids_descending() {
        let history = HistoryStore::new();
        std::thread::scope(|scope| {
            for t in 0..4 {
                let history = &history;
                scope.spawn(move || {
                    for i in 0..200 {
                        history.append(&location(f64::from(t * 200 + i) * 1e-4));
                    }
                });
            }
        });

        let entries = history.entries();
        assert_eq!(entries.len(), 800);
        assert!(entries.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let history = HistoryStore::new();
        let mut rx = history.subscribe();

        history.append(&location(4.0));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        history.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_position_processor_appends() {
        let history = HistoryStore::new();
        history.process_position(&location(9.0)).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
