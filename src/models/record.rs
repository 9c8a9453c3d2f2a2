use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{AppError, AppResult};

/// Fallbacks substituted when a stored document is missing or carries a
/// malformed field; aggregate computation must stay total.
pub const DEFAULT_MOOD: &str = "neutral";
pub const DEFAULT_ACTIVITY_TYPE: &str = "unknown";
pub const DEFAULT_MOOD_INTENSITY: f64 = 5.0;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordCategory {
    SleepSessions,
    JournalEntries,
    MoodEntries,
    ActivitySessions,
}

impl RecordCategory {
    pub const ALL: [RecordCategory; 4] = [
        RecordCategory::SleepSessions,
        RecordCategory::JournalEntries,
        RecordCategory::MoodEntries,
        RecordCategory::ActivitySessions,
    ];

    /// Collection name under `users/{uid}/` in the document store.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordCategory::SleepSessions => "sleep_sessions",
            RecordCategory::JournalEntries => "journal_entries",
            RecordCategory::MoodEntries => "mood_entries",
            RecordCategory::ActivitySessions => "activity_sessions",
        }
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RecordCategory {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "sleep_sessions" => Ok(RecordCategory::SleepSessions),
            "journal_entries" => Ok(RecordCategory::JournalEntries),
            "mood_entries" => Ok(RecordCategory::MoodEntries),
            "activity_sessions" => Ok(RecordCategory::ActivitySessions),
            other => Err(format!("unsupported record category: {other}")),
        }
    }
}

/// A single timestamped user event. Payload fields stay loosely typed on the
/// read path: one corrupt document must never abort a statistics pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub user_id: String,
    pub category: RecordCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: JsonMap<String, JsonValue>,
}

impl Record {
    pub fn number_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(JsonValue::as_f64)
    }

    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(JsonValue::as_str)
    }

    pub fn duration_hours(&self) -> f64 {
        self.number_field("durationHours").unwrap_or(0.0)
    }

    pub fn duration_minutes(&self) -> f64 {
        self.number_field("durationMinutes").unwrap_or(0.0)
    }

    pub fn mood(&self) -> &str {
        self.text_field("mood").unwrap_or(DEFAULT_MOOD)
    }

    pub fn mood_intensity(&self) -> f64 {
        self.number_field("intensity")
            .unwrap_or(DEFAULT_MOOD_INTENSITY)
    }

    pub fn activity_type(&self) -> &str {
        self.text_field("activityType")
            .unwrap_or(DEFAULT_ACTIVITY_TYPE)
    }

    pub fn body(&self) -> &str {
        self.text_field("body").unwrap_or("")
    }

    pub fn word_count(&self) -> usize {
        self.body().split_whitespace().count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSessionInput {
    pub duration_hours: f64,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntryInput {
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntryInput {
    pub mood: String,
    #[serde(default)]
    pub intensity: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySessionInput {
    pub activity_type: String,
    pub duration_minutes: f64,
    #[serde(default)]
    pub intensity: Option<String>,
}

/// Serialize a typed insert payload into the flat field map stored in the
/// per-category collection.
pub fn to_field_map<T: Serialize>(input: &T) -> AppResult<JsonMap<String, JsonValue>> {
    match serde_json::to_value(input)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(AppError::validation_with_details(
            "记录负载必须是对象",
            other,
        )),
    }
}
