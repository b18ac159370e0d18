use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::StoreError;
use crate::model::punch::{NewPunch, Punch, PunchRow};

/// Append-only log of clock punches.
#[allow(async_fn_in_trait)]
pub trait PunchStore {
    /// Punches with `from <= timestamp < until`, oldest first, optionally
    /// restricted to a set of employees.
    async fn fetch_range(
        &self,
        employee_ids: Option<&[String]>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Punch>, StoreError>;

    async fn last_for_employee(&self, employee_id: &str) -> Result<Option<Punch>, StoreError>;

    /// One page of punches with `from <= timestamp < until`, newest first,
    /// plus the number of matching punches.
    async fn fetch_page(
        &self,
        employee_id: Option<&str>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Punch>, u64), StoreError>;

    async fn insert(&self, punch: NewPunch) -> Result<Punch, StoreError>;
}

#[derive(Clone)]
pub struct MySqlPunchStore {
    pool: MySqlPool,
}

impl MySqlPunchStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const PUNCH_COLUMNS: &str = "id, employee_id, employee_name, kind, ts, source, location";

// scanners occasionally write garbage; skip it rather than fail the whole read
fn valid_rows(rows: Vec<PunchRow>) -> Vec<Punch> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match Punch::try_from(row) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(punch_id = %id, error = %e, "Skipping malformed punch row");
                    None
                }
            }
        })
        .collect()
}

impl PunchStore for MySqlPunchStore {
    async fn fetch_range(
        &self,
        employee_ids: Option<&[String]>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Punch>, StoreError> {
        let employee_clause = match employee_ids {
            Some([]) => return Ok(Vec::new()),
            Some(ids) => format!(
                "AND employee_id IN ({})",
                vec!["?"; ids.len()].join(", ")
            ),
            None => String::new(),
        };

        let sql = format!(
            "SELECT {PUNCH_COLUMNS} FROM punches WHERE ts >= ? AND ts < ? {employee_clause} ORDER BY ts ASC, id ASC"
        );
        debug!(sql = %sql, %from, %until, "Fetching punches");

        let mut query = sqlx::query_as::<_, PunchRow>(&sql).bind(from).bind(until);
        for id in employee_ids.unwrap_or_default() {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(valid_rows(rows))
    }

    async fn fetch_page(
        &self,
        employee_id: Option<&str>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Punch>, u64), StoreError> {
        let employee_clause = if employee_id.is_some() { "AND employee_id = ?" } else { "" };

        let count_sql =
            format!("SELECT COUNT(*) FROM punches WHERE ts >= ? AND ts < ? {employee_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(from).bind(until);
        if let Some(id) = employee_id {
            count_query = count_query.bind(id);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT {PUNCH_COLUMNS} FROM punches WHERE ts >= ? AND ts < ? {employee_clause} \
             ORDER BY ts DESC, id DESC LIMIT ? OFFSET ?"
        );
        debug!(sql = %sql, %from, %until, limit, offset, "Fetching punch page");

        let mut query = sqlx::query_as::<_, PunchRow>(&sql).bind(from).bind(until);
        if let Some(id) = employee_id {
            query = query.bind(id);
        }
        let rows = query
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await?;

        Ok((valid_rows(rows), total.max(0) as u64))
    }

    async fn last_for_employee(&self, employee_id: &str) -> Result<Option<Punch>, StoreError> {
        let sql = format!(
            "SELECT {PUNCH_COLUMNS} FROM punches WHERE employee_id = ? ORDER BY ts DESC, id DESC LIMIT 1"
        );

        let row = sqlx::query_as::<_, PunchRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let id = row.id.clone();
            Punch::try_from(row).map_err(|e| StoreError::InvalidRow {
                table: "punches",
                id,
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    async fn insert(&self, punch: NewPunch) -> Result<Punch, StoreError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO punches (id, employee_id, employee_name, kind, ts, source, location)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&punch.employee_id)
        .bind(&punch.employee_name)
        .bind(punch.kind.as_ref())
        .bind(punch.timestamp)
        .bind(punch.source.as_ref())
        .bind(&punch.location)
        .execute(&self.pool)
        .await?;

        Ok(punch.into_punch(id))
    }
}
