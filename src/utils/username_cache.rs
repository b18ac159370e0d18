use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::info;

use super::lookup_filter::USERNAME_FILTER;

/// Usernames known to be taken. Only positives are stored.
static TAKEN: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

pub async fn mark_taken(username: &str) {
    let username = normalize(username);
    USERNAME_FILTER.insert(&username);
    TAKEN.insert(username, ()).await;
}

/// Filter says "never seen" → available; cache says taken → taken; otherwise ask the database.
pub async fn is_available(username: &str, pool: &MySqlPool) -> bool {
    let username = normalize(username);

    if !USERNAME_FILTER.might_contain(&username) {
        return true;
    }
    if TAKEN.contains_key(&username) {
        return false;
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = ? LIMIT 1)",
    )
    .bind(&username)
    .fetch_one(pool)
    .await
    .unwrap_or(true); // fail closed

    if exists {
        TAKEN.insert(username, ()).await;
    }
    !exists
}

/// Preloads usernames of accounts that signed in during the last `days` days.
pub async fn warmup(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT username
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (username,) = row?;
        batch.push(normalize(&username));
        total += 1;

        if batch.len() >= batch_size {
            insert_batch(&mut batch).await;
        }
    }
    insert_batch(&mut batch).await;

    info!(total, days, "Username cache warmup complete");
    Ok(())
}

async fn insert_batch(batch: &mut Vec<String>) {
    let inserts: Vec<_> = batch.drain(..).map(|u| TAKEN.insert(u, ())).collect();
    futures::future::join_all(inserts).await;
}
