use chrono::FixedOffset;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::aggregate::YearMonth;
use crate::model::punch::Punch;
use crate::store::change_feed::{self, ChangeFeed, Subscription};
use crate::store::punches::PunchStore;

/// Punches of one month as last fetched from the store.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub month: YearMonth,
    pub punches: Arc<Vec<Punch>>,
    /// False when the fetch failed; `punches` is then empty.
    pub available: bool,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    punches: Option<(Arc<Vec<Punch>>, Instant)>,
}

/// Per-month punch snapshots with last-request-wins installation.
///
/// Every fetch takes a ticket; its result is kept only if no newer fetch or
/// invalidation happened for that month in the meantime. Aggregates are never
/// stored here, only the raw punches they are computed from.
///
/// Writes made by other processes never reach the change feed, so with a TTL
/// set an installed snapshot also expires after that long.
pub struct SnapshotBoard<S> {
    store: S,
    offset: FixedOffset,
    ttl: Option<Duration>,
    slots: Mutex<HashMap<YearMonth, Slot>>,
}

impl<S: PunchStore> SnapshotBoard<S> {
    pub fn new(store: S, offset: FixedOffset) -> Self {
        Self {
            store,
            offset,
            ttl: None,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Installed punches for `month`, if a fetch completed since the last
    /// invalidation and has not outlived the TTL.
    pub fn cached(&self, month: YearMonth) -> Option<Arc<Vec<Punch>>> {
        let slots = self.slots.lock().expect("snapshot board poisoned");
        let (punches, installed_at) = slots.get(&month)?.punches.as_ref()?;
        if self.ttl.is_some_and(|ttl| installed_at.elapsed() >= ttl) {
            debug!(%month, "Snapshot expired");
            return None;
        }
        Some(punches.clone())
    }

    pub async fn snapshot(&self, month: YearMonth) -> Snapshot {
        if let Some(punches) = self.cached(month) {
            return Snapshot {
                month,
                punches,
                available: true,
            };
        }

        let ticket = self.begin(month);
        let (from, until) = month.utc_range(self.offset);

        match self.store.fetch_range(None, from, until).await {
            Ok(punches) => {
                let punches = Arc::new(punches);
                if !self.install(month, ticket, punches.clone()) {
                    debug!(%month, ticket, "Superseded fetch not installed");
                }
                Snapshot {
                    month,
                    punches,
                    available: true,
                }
            }
            Err(e) => {
                warn!(error = %e, %month, "Punch fetch failed");
                Snapshot {
                    month,
                    punches: Arc::new(Vec::new()),
                    available: false,
                }
            }
        }
    }

    /// Forgets every snapshot; in-flight fetches started before this call are discarded.
    pub fn invalidate_all(&self) {
        let mut slots = self.slots.lock().expect("snapshot board poisoned");
        for slot in slots.values_mut() {
            slot.generation += 1;
            slot.punches = None;
        }
    }

    fn begin(&self, month: YearMonth) -> u64 {
        let mut slots = self.slots.lock().expect("snapshot board poisoned");
        let slot = slots.entry(month).or_default();
        slot.generation += 1;
        slot.generation
    }

    fn install(&self, month: YearMonth, ticket: u64, punches: Arc<Vec<Punch>>) -> bool {
        let mut slots = self.slots.lock().expect("snapshot board poisoned");
        let slot = slots.entry(month).or_default();
        if slot.generation != ticket {
            return false;
        }
        slot.punches = Some((punches, Instant::now()));
        true
    }
}

impl<S> SnapshotBoard<S>
where
    S: PunchStore + Send + Sync + 'static,
{
    /// Invalidates all snapshots whenever the punch log changes.
    pub fn follow(self: &Arc<Self>, feed: &ChangeFeed) -> Subscription {
        let board = Arc::downgrade(self);
        feed.on_change(change_feed::PUNCHES, move |event| {
            if let Some(board) = board.upgrade() {
                debug!(op = %event.op, "Punches changed, dropping snapshots");
                board.invalidate_all();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::session::tests::punch;
    use crate::model::punch::PunchKind::{Entrance, Exit};
    use crate::store::change_feed::ChangeOp;
    use crate::store::memory::MemoryPunchStore;

    fn march() -> YearMonth {
        YearMonth::new(2025, 3).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[actix_web::test]
    async fn second_read_uses_installed_snapshot() {
        let store = MemoryPunchStore::with_punches(vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T17:00:00"),
            punch("E1", Entrance, "2025-04-01T08:00:00"),
        ]);
        let board = SnapshotBoard::new(store, utc());

        let first = board.snapshot(march()).await;
        assert!(first.available);
        assert_eq!(first.punches.len(), 2);

        let second = board.snapshot(march()).await;
        assert_eq!(second.punches.len(), 2);
        assert_eq!(board.store().fetch_count(), 1);
    }

    #[actix_web::test]
    async fn expired_snapshot_is_fetched_again() {
        let store = MemoryPunchStore::with_punches(vec![punch("E1", Entrance, "2025-03-03T08:00:00")]);
        let board = SnapshotBoard::new(store, utc()).with_ttl(Duration::ZERO);

        board.snapshot(march()).await;
        // written behind the board's back, e.g. by another instance
        board.store().replace(vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T16:00:00"),
        ]);

        let again = board.snapshot(march()).await;
        assert_eq!(again.punches.len(), 2);
        assert_eq!(board.store().fetch_count(), 2);
    }

    #[actix_web::test]
    async fn stale_fetch_does_not_overwrite_newer_one() {
        let store = MemoryPunchStore::with_punches(vec![punch("E1", Entrance, "2025-03-03T08:00:00")]);
        let release = store.hold_next_fetch();
        let board = SnapshotBoard::new(store, utc());

        let mut stale = Box::pin(board.snapshot(march()));
        assert!(futures::poll!(&mut stale).is_pending());

        board.store().replace(vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T16:00:00"),
        ]);
        let fresh = board.snapshot(march()).await;
        assert_eq!(fresh.punches.len(), 2);

        release.send(()).unwrap();
        let stale = stale.await;
        assert_eq!(stale.punches.len(), 1);

        assert_eq!(board.cached(march()).unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn failed_fetch_is_flagged_and_not_cached() {
        let store = MemoryPunchStore::default();
        store.set_failing(true);
        let board = SnapshotBoard::new(store, utc());

        let snap = board.snapshot(march()).await;
        assert!(!snap.available);
        assert!(snap.punches.is_empty());
        assert!(board.cached(march()).is_none());
    }

    #[actix_web::test]
    async fn change_feed_forces_refetch() {
        let store = MemoryPunchStore::with_punches(vec![punch("E1", Entrance, "2025-03-03T08:00:00")]);
        let board = Arc::new(SnapshotBoard::new(store, utc()));
        let feed = ChangeFeed::new();
        let _sub = board.follow(&feed);

        board.snapshot(march()).await;
        assert!(board.cached(march()).is_some());

        feed.publish(change_feed::PUNCHES, ChangeOp::Insert);
        assert!(board.cached(march()).is_none());

        board.snapshot(march()).await;
        assert_eq!(board.store().fetch_count(), 2);
    }
}
