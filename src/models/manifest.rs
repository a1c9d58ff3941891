//! The video manifest consumed by the front-end player.
//!
//! Fields this crate does not own (`version`, `publicUrl`, per-entry `size`,
//! `lastModified`, ...) are carried through `extra` so a rewrite never drops
//! what an older generator put there.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// One playable video in the manifest.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Object key in the bucket; unique within a manifest.
    pub key: String,

    /// Public URL the player fetches.
    pub url: String,

    pub content_type: String,

    /// Set on per-entity intro videos only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_intro: Option<bool>,

    /// Entity the intro belongs to (filename stem).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ManifestEntry {
    pub fn is_intro(&self) -> bool {
        self.is_intro == Some(true)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub videos: Vec<ManifestEntry>,

    #[serde(default)]
    pub total_videos: usize,

    #[serde(default, with = "utc_timestamp")]
    pub generated: DateTime<Utc>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    pub fn contains(&self, key: &str) -> bool {
        self.videos.iter().any(|entry| entry.key == key)
    }

    /// Index just past the leading run of intro entries.
    pub fn intro_insert_index(&self) -> usize {
        self.videos
            .iter()
            .take_while(|entry| entry.is_intro())
            .count()
    }

    /// Re-establish `totalVideos == videos.len()` and stamp `generated`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.total_videos = self.videos.len();
        self.generated = now;
    }
}

/// ISO-8601 in UTC with a trailing `Z`. Timestamps written without an offset
/// by older tooling are read as UTC.
mod utc_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
