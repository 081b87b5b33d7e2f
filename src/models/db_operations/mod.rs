pub mod analytics_db_operations;
pub mod change_requests_db_operations;
pub mod comments_db_operations;
pub mod posts_db_operations;
pub mod site_db_operations;
pub mod users_db_operations;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Password hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Owner accounts cannot be deleted")]
    OwnerAccount,
}

/// Maps a text column onto a `FromStr` enum, surfacing bad values as conversion errors.
pub(crate) fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}
