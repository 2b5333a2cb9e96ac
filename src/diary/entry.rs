use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Substituted when neither the title field nor the content yields one.
pub const UNTITLED: &str = "no title";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiaryCategory {
    Work,
    Relationship,
    Daily,
    Study,
    Miscellaneous,
}

impl Default for DiaryCategory {
    fn default() -> Self {
        DiaryCategory::Daily
    }
}

/// A single diary entry.
///
/// The expiry instant is never stored; it is always derived from `created_at`
/// plus the retention window in force, so a change to the window applies to
/// existing entries on the next read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: DiaryCategory,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub is_completed: bool,
}

impl DiaryEntry {
    pub fn expires_at(&self, retention: Duration) -> OffsetDateTime {
        self.created_at + retention
    }

    /// Inclusive comparison: an entry is gone the instant its expiry arrives.
    pub fn is_expired(&self, retention: Duration, now: OffsetDateTime) -> bool {
        self.expires_at(retention) <= now
    }
}

pub fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trimmed title, falling back to the first non-empty content line, then to
/// the untitled placeholder.
pub fn derive_title(title: &str, content: &str) -> String {
    let trimmed = title.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(UNTITLED)
        .to_string()
}

/// Rebuild an entry from an untrusted persisted record, defaulting each field
/// independently rather than discarding the record.
pub fn sanitize_entry(value: &Value, now: OffsetDateTime) -> DiaryEntry {
    let content = value
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let raw_title = value.get("title").and_then(Value::as_str).unwrap_or_default();
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_entry_id);
    let category = value
        .get("category")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<DiaryCategory>().ok())
        .unwrap_or_default();
    let created_at = value
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
        .unwrap_or(now);
    let is_completed = value
        .get("isCompleted")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    DiaryEntry {
        id,
        title: derive_title(raw_title, &content),
        content,
        category,
        created_at,
        is_completed,
    }
}

/// Sanitize a persisted entry list. Anything that is not an array of objects
/// yields an empty list; array items are recovered individually.
pub fn sanitize_entries(value: &Value, now: OffsetDateTime) -> Vec<DiaryEntry> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| sanitize_entry(item, now))
        .collect()
}
