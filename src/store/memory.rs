//! In-memory stores for tests.

use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::directory::{CardHolder, Directory, RosterEntry};
use super::error::StoreError;
use super::punches::PunchStore;
use crate::model::punch::{NewPunch, Punch};

#[derive(Default)]
pub struct MemoryPunchStore {
    punches: Mutex<Vec<Punch>>,
    failing: AtomicBool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    fetches: AtomicUsize,
}

impl MemoryPunchStore {
    pub fn with_punches(punches: Vec<Punch>) -> Self {
        Self {
            punches: Mutex::new(punches),
            ..Default::default()
        }
    }

    pub fn replace(&self, punches: Vec<Punch>) {
        *self.punches.lock().unwrap() = punches;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The next fetch reads its data, then waits until the returned sender fires.
    pub fn hold_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl PunchStore for MemoryPunchStore {
    async fn fetch_range(
        &self,
        employee_ids: Option<&[String]>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Punch>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let data: Vec<Punch> = self
            .punches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.timestamp >= from && p.timestamp < until)
            .filter(|p| employee_ids.is_none_or(|ids| ids.contains(&p.employee_id)))
            .cloned()
            .collect();

        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(data)
    }

    async fn last_for_employee(&self, employee_id: &str) -> Result<Option<Punch>, StoreError> {
        Ok(self
            .punches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.employee_id == employee_id)
            .max_by_key(|p| p.timestamp)
            .cloned())
    }

    async fn fetch_page(
        &self,
        employee_id: Option<&str>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Punch>, u64), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut matching: Vec<Punch> = self
            .punches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.timestamp >= from && p.timestamp < until)
            .filter(|p| employee_id.is_none_or(|id| id == p.employee_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert(&self, punch: NewPunch) -> Result<Punch, StoreError> {
        let mut punches = self.punches.lock().unwrap();
        let stored = punch.into_punch(format!("mem-{}", punches.len() + 1));
        punches.push(stored.clone());
        Ok(stored)
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    roles_by_id: HashMap<String, String>,
    roles_by_email: HashMap<String, String>,
    names: HashMap<String, String>,
    cards: HashMap<String, CardHolder>,
    roster: Vec<RosterEntry>,
}

impl MemoryDirectory {
    pub fn with_role_by_id(mut self, user_id: &str, role: &str) -> Self {
        self.roles_by_id.insert(user_id.into(), role.into());
        self
    }

    pub fn with_role_by_email(mut self, email: &str, role: &str) -> Self {
        self.roles_by_email.insert(email.into(), role.into());
        self
    }

    pub fn with_employee(self, employee_id: &str, name: &str, card_id: Option<&str>) -> Self {
        self.with_employee_status(employee_id, name, card_id, true)
    }

    pub fn with_employee_status(
        mut self,
        employee_id: &str,
        name: &str,
        card_id: Option<&str>,
        active: bool,
    ) -> Self {
        self.names.insert(employee_id.into(), name.into());
        if let Some(card) = card_id {
            self.cards.insert(
                card.into(),
                CardHolder {
                    employee_id: employee_id.into(),
                    employee_name: name.into(),
                    active,
                },
            );
        }
        self.roster.push(RosterEntry {
            employee_id: employee_id.into(),
            employee_name: name.into(),
            active,
            has_card: card_id.is_some(),
        });
        self
    }
}

impl Directory for MemoryDirectory {
    async fn role_by_user_id(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.roles_by_id.get(user_id).cloned())
    }

    async fn role_by_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        Ok(self.roles_by_email.get(email).cloned())
    }

    async fn display_name(&self, employee_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.names.get(employee_id).cloned())
    }

    async fn find_by_card(&self, card_id: &str) -> Result<Option<CardHolder>, StoreError> {
        Ok(self.cards.get(card_id.trim()).cloned())
    }

    async fn roster(&self) -> Result<Vec<RosterEntry>, StoreError> {
        let mut roster = self.roster.clone();
        roster.sort_by(|a, b| a.employee_name.cmp(&b.employee_name));
        Ok(roster)
    }
}
