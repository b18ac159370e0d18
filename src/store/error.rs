use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row {id} in {table} is malformed: {reason}")]
    InvalidRow {
        table: &'static str,
        id: String,
        reason: String,
    },
}
