//! Linker configuration resolution
//!
//! Credentials resolve in priority order database → environment → TOML.
//! Missing credentials are not an error: the sources needing them are
//! skipped.

use citelink_common::config::{EngineSettings, TomlConfig};
use citelink_common::Result;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::services::{EngineConfig, ResolverSettings};

/// Environment variable holding the contact email
pub const CONTACT_EMAIL_ENV: &str = "CITELINK_CONTACT_EMAIL";
/// Environment variable holding the CORE API key
pub const CORE_API_KEY_ENV: &str = "CITELINK_CORE_API_KEY";

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Pick the highest-priority valid value, warning when several are set
fn resolve_tiered(
    what: &str,
    db_value: Option<String>,
    env_value: Option<String>,
    toml_value: Option<String>,
) -> Option<String> {
    let tiers = [
        ("database", db_value),
        ("environment", env_value),
        ("TOML", toml_value),
    ];

    let valid: Vec<(&str, String)> = tiers
        .into_iter()
        .filter_map(|(source, value)| value.filter(|v| is_valid_value(v)).map(|v| (source, v)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(source, _)| *source).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            what,
            sources.join(", "),
            sources[0]
        );
    }

    let (source, value) = valid.into_iter().next()?;
    info!("{} loaded from {}", what, source);
    Some(value.trim().to_string())
}

/// Contact email: database → `CITELINK_CONTACT_EMAIL` → TOML
pub async fn resolve_contact_email(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_value = crate::db::settings::get_contact_email(db).await?;
    Ok(resolve_tiered(
        "Contact email",
        db_value,
        std::env::var(CONTACT_EMAIL_ENV).ok(),
        toml_config.contact_email.clone(),
    ))
}

/// CORE API key: database → `CITELINK_CORE_API_KEY` → TOML
pub async fn resolve_core_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_value = crate::db::settings::get_core_api_key(db).await?;
    Ok(resolve_tiered(
        "CORE API key",
        db_value,
        std::env::var(CORE_API_KEY_ENV).ok(),
        toml_config.core_api_key.clone(),
    ))
}

/// Engine tunables from the `[engine]` table
pub fn engine_config(settings: &EngineSettings) -> EngineConfig {
    EngineConfig {
        budget: Duration::from_secs(settings.budget_seconds),
        check_stride: settings.check_stride,
        continuation_delay: Duration::from_secs(settings.continuation_delay_seconds),
        resolution_spacing: Duration::from_millis(settings.resolution_spacing_ms),
    }
}

/// Resolver settings from resolved credentials and the `[engine]` table
pub fn resolver_settings(
    settings: &EngineSettings,
    contact_email: Option<String>,
    core_api_key: Option<String>,
) -> Result<ResolverSettings> {
    Ok(ResolverSettings {
        contact_email,
        core_api_key,
        cache_ttl: settings.cache_ttl()?,
        ..ResolverSettings::default()
    })
}

/// Copy credentials stored in the database back to the TOML file
///
/// Best effort: a failed write is logged and the database stays
/// authoritative.
pub fn sync_credentials_to_toml(
    contact_email: Option<&str>,
    core_api_key: Option<&str>,
    toml_path: &Path,
) -> Result<()> {
    let mut config = citelink_common::config::load_toml_config(toml_path)?;

    if let Some(email) = contact_email {
        config.contact_email = Some(email.to_string());
    }
    if let Some(key) = core_api_key {
        config.core_api_key = Some(key.to_string());
    }

    match citelink_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => info!("Settings synced to TOML: {}", toml_path.display()),
        Err(e) => warn!("TOML write failed (database write succeeded): {}", e),
    }
    Ok(())
}
