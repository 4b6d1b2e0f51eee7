//! SQLite-backed settings store with a read-through cache.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use moka::future::Cache;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::ReportError;
use crate::settings::{SettingsKind, SettingsStore};

fn store_error(e: sqlx::Error) -> ReportError {
    ReportError::Store(e.to_string())
}

fn cache_key(kind: SettingsKind, key: &str) -> String {
    format!("{}:{}", kind, key)
}

#[derive(Clone)]
pub struct SqliteSettingsStore {
    pool: SqlitePool,
    cache: Cache<String, Value>,
}

impl SqliteSettingsStore {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, ReportError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(store_error)?
            .create_if_missing(true);
        // An in-memory database lives and dies with its single connection.
        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(if in_memory { None } else { Some(Duration::from_secs(900)) })
            .max_lifetime(if in_memory { None } else { Some(Duration::from_secs(1800)) })
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(store_error)?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, ReportError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (kind, key)
            )",
        )
        .execute(&pool)
        .await
        .map_err(store_error)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS roads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&pool)
        .await
        .map_err(store_error)?;
        info!("Settings store schema ready");

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(10 * 60))
            .max_capacity(100)
            .build();
        Ok(Self { pool, cache })
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get(&self, kind: SettingsKind, key: &str) -> Result<Option<Value>, ReportError> {
        let cache_key = cache_key(kind, key);
        if let Some(value) = self.cache.get(&cache_key).await {
            debug!("Settings cache hit for {}", cache_key);
            return Ok(Some(value));
        }

        let row: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE kind = ? AND key = ?")
                .bind(kind.as_str())
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        let Some(raw) = row else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| ReportError::Store(format!("corrupt settings {}: {}", cache_key, e)))?;
        self.cache.insert(cache_key, value.clone()).await;
        Ok(Some(value))
    }

    async fn save(&self, kind: SettingsKind, key: &str, value: Value) -> Result<(), ReportError> {
        sqlx::query(
            "INSERT INTO settings (kind, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (kind, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(value.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        self.cache.insert(cache_key(kind, key), value).await;
        Ok(())
    }

    async fn roads(&self) -> Result<Vec<String>, ReportError> {
        sqlx::query_scalar("SELECT name FROM roads ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn add_road(&self, name: &str) -> Result<bool, ReportError> {
        let result = sqlx::query("INSERT INTO roads (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> SqliteSettingsStore {
        SqliteSettingsStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let store = store().await;
        assert!(store.get(SettingsKind::Province, "2024").await.unwrap().is_none());

        store
            .save(SettingsKind::Province, "2024", json!({"year": 2024, "expressway": 90.0}))
            .await
            .unwrap();
        let value = store.get(SettingsKind::Province, "2024").await.unwrap().unwrap();
        assert_eq!(value["expressway"], 90.0);
        assert!(store.get(SettingsKind::National, "2024").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_existing_key() {
        let store = store().await;
        store
            .save(SettingsKind::National, "十四五", json!({"plan": "十四五", "ruralMqi": 1.0}))
            .await
            .unwrap();
        store
            .save(SettingsKind::National, "十四五", json!({"plan": "十四五", "ruralMqi": 2.0}))
            .await
            .unwrap();
        store.cache.invalidate_all();

        let value = store.get(SettingsKind::National, "十四五").await.unwrap().unwrap();
        assert_eq!(value["ruralMqi"], 2.0);
    }

    #[tokio::test]
    async fn test_roads_are_unique_and_ordered() {
        let store = store().await;
        assert!(store.add_road("G6").await.unwrap());
        assert!(store.add_road("S101").await.unwrap());
        assert!(!store.add_road("G6").await.unwrap());
        assert_eq!(store.roads().await.unwrap(), vec!["G6", "S101"]);
    }
}
