//! Settings database operations
//!
//! Key/value accessors over the `settings` table.

use citelink_common::{Error, Result};
use sqlx::{Pool, Sqlite};

const CONTACT_EMAIL_KEY: &str = "contact_email";
const CORE_API_KEY_KEY: &str = "core_api_key";

/// Contact email sent to Crossref and required by Unpaywall
pub async fn get_contact_email(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, CONTACT_EMAIL_KEY).await
}

pub async fn set_contact_email(db: &Pool<Sqlite>, email: String) -> Result<()> {
    set_setting(db, CONTACT_EMAIL_KEY, email).await
}

pub async fn get_core_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, CORE_API_KEY_KEY).await
}

pub async fn set_core_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, CORE_API_KEY_KEY, key).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row.and_then(|(value,)| value) {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
