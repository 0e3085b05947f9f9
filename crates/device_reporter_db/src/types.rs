//! Domain types shared by the pipeline, the store and the query surface.
//!
//! These types are the single source of truth for device rows and file
//! state. TSV decoding (serde `Deserialize`) and JSON output (`Serialize`)
//! are both driven from the same definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ============================================================================
// Device
// ============================================================================

/// One device definition row.
///
/// Columns absent from a file's header decode to their empty value and are
/// then caught by [`Device::validate`] where they matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Sequence number within the source file
    #[serde(deserialize_with = "empty_as_zero")]
    pub n: i64,
    /// Messaging topic
    pub mqtt: String,
    /// Inventory id
    #[serde(rename(deserialize = "invid", serialize = "inv_id"))]
    pub inv_id: String,
    /// Unit identifier, used to group devices into reports
    pub unit_guid: String,
    pub msg_id: String,
    pub text: String,
    pub context: String,
    /// Classification
    pub class: String,
    /// Severity level
    #[serde(deserialize_with = "empty_as_zero")]
    pub level: i64,
    pub area: String,
    pub addr: String,
    pub block: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub bit: String,
    pub invert_bit: String,
}

/// Reasons a decoded device row is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unit_guid is required")]
    MissingUnitGuid,
    #[error("n is required")]
    MissingSequence,
    #[error("n must be positive, got {0}")]
    NegativeSequence(i64),
    #[error("class is required")]
    MissingClass,
}

impl Device {
    /// Check the invariants a row must hold before it can be persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.unit_guid.is_empty() {
            return Err(ValidationError::MissingUnitGuid);
        }
        if self.n == 0 {
            return Err(ValidationError::MissingSequence);
        }
        if self.n < 0 {
            return Err(ValidationError::NegativeSequence(self.n));
        }
        if self.class.is_empty() {
            return Err(ValidationError::MissingClass);
        }
        Ok(())
    }
}

/// TSV exports leave numeric columns blank instead of writing `0`.
fn empty_as_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<i64>()
        .map_err(|e| serde::de::Error::custom(format!("invalid integer {:?}: {}", trimmed, e)))
}

// ============================================================================
// File state
// ============================================================================

/// Processing status of a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Eligible for (re)processing
    Pending,
    /// Claimed by the scanner, not yet written
    Processing,
    /// Devices committed
    Done,
    /// Parsing failed; see `error_message`
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether the scanner may claim a file in this state.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable processing state of one watched file, keyed by base name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub status: FileStatus,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Claim marker written by the scanner.
    pub fn processing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: FileStatus::Processing,
            error_message: None,
            processed_at: None,
        }
    }

    pub fn done(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status: FileStatus::Done,
            error_message: None,
            processed_at: Some(at),
        }
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status: FileStatus::Error,
            error_message: Some(message.into()),
            processed_at: Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device {
            n: 1,
            mqtt: String::new(),
            inv_id: "G-044322".to_string(),
            unit_guid: "01749246-95f6-57db-b7c3-2ae0e8be671f".to_string(),
            msg_id: "cold7_Defrost_status".to_string(),
            text: "Defrost".to_string(),
            context: String::new(),
            class: "waiting".to_string(),
            level: 100,
            area: "LOCAL".to_string(),
            addr: "cold7_status.Defrost_status".to_string(),
            block: String::new(),
            kind: String::new(),
            bit: String::new(),
            invert_bit: String::new(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_record() {
        assert_eq!(device().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_zero_sequence() {
        let d = Device { n: 0, ..device() };
        assert_eq!(d.validate(), Err(ValidationError::MissingSequence));
    }

    #[test]
    fn test_validate_rejects_negative_sequence() {
        let d = Device { n: -3, ..device() };
        assert_eq!(d.validate(), Err(ValidationError::NegativeSequence(-3)));
    }

    #[test]
    fn test_validate_rejects_empty_class() {
        let d = Device {
            class: String::new(),
            ..device()
        };
        assert_eq!(d.validate(), Err(ValidationError::MissingClass));
    }

    #[test]
    fn test_validate_rejects_empty_unit_guid() {
        let d = Device {
            unit_guid: String::new(),
            ..device()
        };
        assert_eq!(d.validate(), Err(ValidationError::MissingUnitGuid));
    }

    #[test]
    fn test_file_status_parse() {
        for status in [
            FileStatus::Pending,
            FileStatus::Processing,
            FileStatus::Done,
            FileStatus::Error,
        ] {
            assert_eq!(FileStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FileStatus::parse("DONE"), Some(FileStatus::Done));
        assert_eq!(FileStatus::parse("queued"), None);
    }

    #[test]
    fn test_only_pending_is_claimable() {
        assert!(FileStatus::Pending.is_claimable());
        assert!(!FileStatus::Processing.is_claimable());
        assert!(!FileStatus::Done.is_claimable());
        assert!(!FileStatus::Error.is_claimable());
    }

    #[test]
    fn test_device_json_uses_storage_names() {
        let json = serde_json::to_value(device()).unwrap();
        assert_eq!(json["inv_id"], "G-044322");
        assert_eq!(json["type"], "");
        assert!(json.get("invid").is_none());
    }
}
