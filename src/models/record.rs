use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Target;

/// A single unit of text content plus routing information.
///
/// Records are write-once, delete-once: a producer creates one, the shared
/// store persists it, and it disappears either when the destination consumes
/// it or when garbage collection reaps it. Fields are declared in
/// alphabetical order so the serialized form has deterministically sorted
/// keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRecord {
    /// Activation URL host, derived from `target_id`.
    pub action_path: String,
    /// Set at creation; consulted only for staleness, never for ordering.
    pub created_at: DateTime<Utc>,
    /// Extension point for producers; not validated here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    pub payload_text: String,
    pub request_id: Uuid,
    /// Best-effort name of the originating process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_identifier: Option<String>,
    pub target_id: Target,
}

impl HandoffRecord {
    /// Build a record with a fresh unique request id.
    pub fn new(
        target: Target,
        payload_text: String,
        source_identifier: Option<String>,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Self {
        Self {
            action_path: target.action_path().to_string(),
            created_at: Utc::now(),
            metadata,
            payload_text,
            request_id: Uuid::new_v4(),
            source_identifier,
            target_id: target,
        }
    }

    /// Storage key for this record.
    pub fn storage_key(&self) -> String {
        record_key(self.target_id, self.request_id)
    }

    /// URL that activates this record's destination.
    pub fn activation_url(&self) -> String {
        self.target_id.activation_url(self.request_id)
    }
}

/// Deterministic storage key for a `(target, request_id)` pair. A consumer
/// can address one record directly, and all records for a target share the
/// same prefix.
pub fn record_key(target: Target, request_id: Uuid) -> String {
    format!("{}_{}.json", target.id(), request_id)
}

/// Split a storage key back into its `(target, request_id)` pair. Returns
/// `None` for names that are not well-formed record keys.
pub fn parse_key(key: &str) -> Option<(Target, Uuid)> {
    let stem = key.strip_suffix(".json")?;
    let (target_id, request_id) = stem.split_once('_')?;
    let target = Target::from_id(target_id)?;
    let request_id = Uuid::parse_str(request_id).ok()?;
    Some((target, request_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_with_all_fields() {
        let metadata = BTreeMap::from([
            ("caseNumber".to_string(), "A-1042".to_string()),
            ("urgency".to_string(), "high".to_string()),
        ]);
        let record = HandoffRecord::new(
            Target::Ticket,
            "call patient back".to_string(),
            Some("share-extension".to_string()),
            Some(metadata),
        );

        let json = serde_json::to_string_pretty(&record).unwrap();
        let parsed: HandoffRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn record_round_trips_with_optional_fields_absent() {
        let record = HandoffRecord::new(Target::Note, "remember this".to_string(), None, None);

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("sourceIdentifier"));
        assert!(!json.contains("metadata"));

        let parsed: HandoffRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn serialized_keys_are_sorted() {
        let record = HandoffRecord::new(
            Target::Task,
            "x".to_string(),
            Some("cli".to_string()),
            Some(BTreeMap::new()),
        );
        let json = serde_json::to_string(&record).unwrap();

        let positions: Vec<usize> = [
            "actionPath",
            "createdAt",
            "metadata",
            "payloadText",
            "requestId",
            "sourceIdentifier",
            "targetId",
        ]
        .iter()
        .map(|field| json.find(&format!("\"{field}\"")).unwrap())
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn storage_key_parses_back() {
        let record = HandoffRecord::new(Target::Journal, "evening notes".to_string(), None, None);
        let key = record.storage_key();
        assert!(key.starts_with("journal_"));
        assert!(key.ends_with(".json"));
        assert_eq!(parse_key(&key), Some((Target::Journal, record.request_id)));
    }

    #[test]
    fn parse_key_rejects_foreign_names() {
        assert_eq!(parse_key(".ticket_x.json.tmp-42"), None);
        assert_eq!(parse_key("ticket_not-a-uuid.json"), None);
        assert_eq!(parse_key("clipboard_6a7e3b1c-0000-4000-8000-000000000000.json"), None);
        assert_eq!(parse_key("README.md"), None);
    }
}
