use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use log::info;
use serde::{Deserialize, Deserializer};

use crate::core::config::DatabaseConfig;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(config: &DatabaseConfig) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(config.url.clone());
    Pool::builder().max_size(config.pool_size).build(manager)
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(std::io::Error::other(format!("Migration error: {}", e)))
        },
    )?;
    info!("Applied {} pending migrations", applied.len());
    Ok(())
}

/// Runs blocking diesel work on the blocking pool with a pooled connection.
pub async fn run_db<T, E, F>(pool: &DbPool, f: F) -> Result<T, E>
where
    F: FnOnce(&mut PgConnection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<diesel::r2d2::PoolError> + From<tokio::task::JoinError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

/// Serde helper that tells an absent field (`None`) from an explicit
/// `null` (`Some(None)`). Pair with `#[serde(default)]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Formats a sequential ticket number, e.g. `TKT-000042`.
pub fn format_ticket_number(sequence: i64) -> String {
    format!("TKT-{:06}", sequence)
}

/// Cuts `text` to roughly `max_chars` characters around the first
/// case-insensitive occurrence of `needle`, adding ellipses where trimmed.
pub fn snippet_around(text: &str, needle: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let lower_text: Vec<char> = text.to_lowercase().chars().collect();
    let lower_needle: Vec<char> = needle.to_lowercase().chars().collect();

    let hit = if lower_needle.is_empty() || lower_text.len() != chars.len() {
        None
    } else {
        lower_text
            .windows(lower_needle.len())
            .position(|w| w == lower_needle.as_slice())
    };

    let start = match hit {
        Some(pos) => pos.saturating_sub(max_chars / 3),
        None => 0,
    };
    let start = start.min(chars.len().saturating_sub(max_chars));
    let end = (start + max_chars).min(chars.len());

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(chars[start..end].iter());
    if end < chars.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_number_padding() {
        assert_eq!(format_ticket_number(1), "TKT-000001");
        assert_eq!(format_ticket_number(123456), "TKT-123456");
        assert_eq!(format_ticket_number(1234567), "TKT-1234567");
    }

    #[test]
    fn test_snippet_short_text_untouched() {
        assert_eq!(snippet_around("short text", "text", 160), "short text");
    }

    #[test]
    fn test_snippet_centers_on_match() {
        let text = format!("{}needle{}", "a".repeat(300), "b".repeat(300));
        let snippet = snippet_around(&text, "NEEDLE", 60);
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("needle"));
    }

    #[test]
    fn test_snippet_without_match_takes_head() {
        let text = "x".repeat(500);
        let snippet = snippet_around(&text, "zzz", 100);
        assert!(!snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), 103);
    }
}
