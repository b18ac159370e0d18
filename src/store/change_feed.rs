//! In-process change notifications.
//!
//! Writers publish after a successful insert/update/delete; readers register
//! a callback per table and react by re-fetching, never by patching state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use strum_macros::{AsRefStr, Display};
use tracing::debug;

pub const PUNCHES: &str = "punches";
pub const EMPLOYEES: &str = "employees";
pub const ANNOUNCEMENTS: &str = "announcements";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
    pub op: ChangeOp,
}

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    by_id: HashMap<u64, (String, Callback)>,
}

#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<RwLock<Subscribers>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for changes on `table`. The registration lives
    /// until the returned [`Subscription`] is unsubscribed or dropped.
    pub fn on_change<F>(&self, table: &str, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut subs = self.inner.write().expect("change feed poisoned");
        let id = subs.next_id;
        subs.next_id += 1;
        subs.by_id.insert(id, (table.to_string(), Arc::new(callback)));

        Subscription {
            id,
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Notifies every subscriber of `table`; returns how many were called.
    pub fn publish(&self, table: &str, op: ChangeOp) -> usize {
        // callbacks run outside the lock so they may subscribe or publish themselves
        let callbacks: Vec<Callback> = self
            .inner
            .read()
            .expect("change feed poisoned")
            .by_id
            .values()
            .filter(|(t, _)| t == table)
            .map(|(_, cb)| cb.clone())
            .collect();

        let event = ChangeEvent {
            table: table.to_string(),
            op,
        };
        for cb in &callbacks {
            cb(&event);
        }

        debug!(table, op = %op, subscribers = callbacks.len(), "Change published");
        callbacks.len()
    }

    pub fn subscriber_count(&self, table: &str) -> usize {
        self.inner
            .read()
            .expect("change feed poisoned")
            .by_id
            .values()
            .filter(|(t, _)| t == table)
            .count()
    }
}

/// Handle returned by [`ChangeFeed::on_change`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    feed: Weak<RwLock<Subscribers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            if let Ok(mut subs) = feed.write() {
                subs.by_id.remove(&self.id);
            }
        }
    }
}
