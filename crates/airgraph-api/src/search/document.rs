//! Flattened slot documents for full-text and term queries.

use std::collections::BTreeSet;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::schedule::Slot;

/// Searchable representation of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    /// Document ID (slot ID).
    #[serde(skip)]
    pub id: String,
    /// Slot title.
    pub title: String,
    /// Description, falling back to the highlight text.
    pub content: Option<String>,
    /// Hashtag.
    pub hashtag: Option<String>,
    /// Distinct cast names across all programs.
    pub casts: Vec<String>,
    /// Distinct crew names across all programs.
    pub crews: Vec<String>,
    /// Channel ID.
    pub channel: String,
    /// Series ID of the first program.
    pub series: Option<String>,
    /// Slot group ID.
    pub group: Option<String>,
    /// Start time (RFC 3339).
    pub start: Option<String>,
    /// End time (RFC 3339).
    pub end: Option<String>,
    /// Active mark and flag names.
    pub flags: Vec<String>,
}

impl SearchDocument {
    /// Flattens a slot into a search document.
    #[must_use]
    pub fn from_slot(slot: &Slot) -> Self {
        let casts: BTreeSet<&String> = slot
            .programs
            .iter()
            .flat_map(|p| p.credit.casts.iter())
            .collect();
        let crews: BTreeSet<&String> = slot
            .programs
            .iter()
            .flat_map(|p| p.credit.crews.iter())
            .collect();

        Self {
            id: slot.id.clone(),
            title: slot.title.clone(),
            content: slot.content.clone().or_else(|| slot.highlight.clone()),
            hashtag: slot.hashtag.clone(),
            casts: casts.into_iter().cloned().collect(),
            crews: crews.into_iter().cloned().collect(),
            channel: slot.channel_id.clone(),
            series: slot
                .programs
                .first()
                .and_then(|p| p.series.as_ref())
                .map(|s| s.id.clone()),
            group: slot.slot_group.as_ref().map(|g| g.id.clone()),
            start: to_rfc3339(slot.start_at),
            end: to_rfc3339(slot.end_at),
            flags: slot.active_flags(),
        }
    }
}

/// Converts epoch seconds to an RFC 3339 string.
fn to_rfc3339(epoch_secs: i64) -> Option<String> {
    DateTime::from_timestamp(epoch_secs, 0).map(|dt| dt.to_rfc3339())
}

/// Outcome of a bulk indexing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Documents accepted by the index.
    pub indexed: usize,
    /// Documents rejected by the index.
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    #[test]
    fn test_from_slot_flattens_programs() {
        // Arrange
        let slot: Slot = serde_json::from_str(
            r#"{
                "id": "s1",
                "channelId": "news",
                "startAt": 0,
                "endAt": 3600,
                "title": "Evening",
                "highlight": "Top stories",
                "hashtag": "evening",
                "slotGroup": {"id": "g1"},
                "mark": {"live": true},
                "programs": [
                    {"id": "p1", "series": {"id": "series-1"}, "credit": {"casts": ["B", "A"], "crews": ["X"]}},
                    {"id": "p2", "credit": {"casts": ["A"]}}
                ]
            }"#,
        )
        .unwrap();

        // Act
        let doc = SearchDocument::from_slot(&slot);

        // Assert
        assert_eq!(doc.id, "s1");
        assert_eq!(doc.content.as_deref(), Some("Top stories"));
        assert_eq!(doc.casts, ["A", "B"]);
        assert_eq!(doc.crews, ["X"]);
        assert_eq!(doc.series.as_deref(), Some("series-1"));
        assert_eq!(doc.group.as_deref(), Some("g1"));
        assert_eq!(doc.start.as_deref(), Some("1970-01-01T00:00:00+00:00"));
        assert_eq!(doc.end.as_deref(), Some("1970-01-01T01:00:00+00:00"));
        assert_eq!(doc.flags, ["live"]);
    }

    #[test]
    fn test_document_id_not_serialized() {
        // Arrange
        let slot: Slot =
            serde_json::from_str(r#"{"id": "s1", "channelId": "news", "startAt": 0, "endAt": 1}"#)
                .unwrap();

        // Act
        let json = serde_json::to_value(SearchDocument::from_slot(&slot)).unwrap();

        // Assert
        assert!(json.get("id").is_none());
        assert_eq!(json["channel"], "news");
    }
}
