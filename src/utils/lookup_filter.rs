use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use tracing::info;

/// Approximate set membership used as a fast negative check before hitting
/// the database (false positives possible, no false negatives).
pub struct LookupFilter {
    name: &'static str,
    normalize: fn(&str) -> String,
    inner: RwLock<CuckooFilter<String>>,
}

/// Usernames already registered; lower-cased.
pub static USERNAME_FILTER: Lazy<LookupFilter> =
    Lazy::new(|| LookupFilter::new("username", 100_000, 0.001, |u| u.trim().to_lowercase()));

/// Badge ids assigned to employees; case preserved, whitespace trimmed.
pub static CARD_FILTER: Lazy<LookupFilter> =
    Lazy::new(|| LookupFilter::new("card", 20_000, 0.001, |c| c.trim().to_string()));

impl LookupFilter {
    pub fn new(
        name: &'static str,
        capacity: usize,
        false_positive_rate: f64,
        normalize: fn(&str) -> String,
    ) -> Self {
        Self {
            name,
            normalize,
            inner: RwLock::new(CuckooFilter::new(capacity, false_positive_rate)),
        }
    }

    pub fn might_contain(&self, key: &str) -> bool {
        let key = (self.normalize)(key);
        self.inner
            .read()
            .expect("lookup filter poisoned")
            .contains(&key)
    }

    pub fn insert(&self, key: &str) {
        let key = (self.normalize)(key);
        self.inner.write().expect("lookup filter poisoned").add(&key);
    }

    pub fn remove(&self, key: &str) {
        let key = (self.normalize)(key);
        self.inner.write().expect("lookup filter poisoned").remove(&key);
    }

    fn insert_batch(&self, keys: &[String]) {
        let mut filter = self.inner.write().expect("lookup filter poisoned");
        for key in keys {
            filter.add(key);
        }
    }

    /// Streams a single-column query into the filter in batches.
    pub async fn warmup(&self, pool: &MySqlPool, sql: &str, batch_size: usize) -> Result<usize> {
        let mut stream = sqlx::query_as::<_, (String,)>(sql).fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (key,) = row.map_err(|e| anyhow!("{} warmup row fetch failed: {}", self.name, e))?;
            batch.push((self.normalize)(&key));
            total += 1;

            if batch.len() == batch_size {
                self.insert_batch(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.insert_batch(&batch);
        }

        info!(filter = self.name, total, "Lookup filter warmup complete");
        Ok(total)
    }
}

pub async fn warmup_all(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    USERNAME_FILTER
        .warmup(pool, "SELECT username FROM users", batch_size)
        .await?;
    CARD_FILTER
        .warmup(
            pool,
            "SELECT card_id FROM employees WHERE card_id IS NOT NULL AND card_id <> ''",
            batch_size,
        )
        .await?;
    Ok(())
}
