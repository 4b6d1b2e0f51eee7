//! Settings and roads: a small key/value store behind the `SettingsStore` trait.

pub mod handlers;
pub mod models;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ReportError;

/// Namespace of a stored setting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKind {
    Province,
    National,
}

impl SettingsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Province => "province",
            Self::National => "national",
        }
    }
}

impl fmt::Display for SettingsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Get/save-by-key persistence for settings documents plus the road name list.
///
/// Saving an existing key replaces the stored document.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, kind: SettingsKind, key: &str) -> Result<Option<Value>, ReportError>;

    async fn save(&self, kind: SettingsKind, key: &str, value: Value) -> Result<(), ReportError>;

    /// Road names in insertion order.
    async fn roads(&self) -> Result<Vec<String>, ReportError>;

    /// Returns `false` when the name was already present.
    async fn add_road(&self, name: &str) -> Result<bool, ReportError>;
}
