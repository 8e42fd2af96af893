use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named snapshot of one chart's settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl VersionRecord {
    /// Timestamp used for recency ordering.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Contents of one chart's `versions.json`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreFile {
    #[serde(default)]
    pub versions: BTreeMap<String, VersionRecord>,
}

impl StoreFile {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text)
    }

    /// Pretty JSON with a trailing newline, ids in lexicographic order.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Records ordered most recently touched first; equal timestamps by id.
    pub fn sorted_by_recency(&self) -> Vec<VersionRecord> {
        let mut records: Vec<VersionRecord> = self.versions.values().cloned().collect();
        records.sort_by(|a, b| b.last_touched().cmp(&a.last_touched()).then_with(|| a.id.cmp(&b.id)));
        records
    }
}
