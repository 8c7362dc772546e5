//! Schedule API response types.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Display rank used for channels that only appear through reconciliation.
pub const SYNTHESIZED_ORDER: u32 = 255;

/// Display ordering of a channel.
///
/// Serialized as the numeric rank for feed channels and `null` for
/// synthesized ones.
///
/// A feed channel without an `order` key is ranked like a synthesized one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelOrder {
    /// Listed by the authoritative feed at the given rank.
    Known(u32),
    /// Created from a reconciled slot whose channel was not in the feed.
    #[default]
    Synthesized,
}

impl ChannelOrder {
    /// Returns the display rank (`SYNTHESIZED_ORDER` for synthesized channels).
    #[must_use]
    pub const fn rank(self) -> u32 {
        match self {
            Self::Known(order) => order,
            Self::Synthesized => SYNTHESIZED_ORDER,
        }
    }
}

/// A broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display ordering.
    #[serde(default)]
    pub order: ChannelOrder,
}

impl Channel {
    /// Creates a placeholder channel named after its ID.
    #[must_use]
    pub fn synthesized(id: &str) -> Self {
        Self {
            id: String::from(id),
            name: String::from(id),
            order: ChannelOrder::Synthesized,
        }
    }
}

/// Series reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// Series ID.
    pub id: String,
}

/// Episode metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Episode number.
    #[serde(default)]
    pub number: Option<u32>,
    /// Episode title.
    #[serde(default)]
    pub title: Option<String>,
    /// Synopsis.
    #[serde(default)]
    pub content: Option<String>,
}

/// Cast and crew credits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    /// Cast names.
    #[serde(default)]
    pub casts: Vec<String>,
    /// Crew names.
    #[serde(default)]
    pub crews: Vec<String>,
    /// Copyright notices.
    #[serde(default)]
    pub copyrights: Vec<String>,
}

/// Image references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedInfo {
    /// Thumbnail image name.
    #[serde(default)]
    pub thumb_img: Option<String>,
    /// Scene thumbnail image names.
    #[serde(default)]
    pub scene_thumb_imgs: Vec<String>,
}

/// Episode/content metadata attached to a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    /// Program ID.
    pub id: String,
    /// Parent series.
    #[serde(default)]
    pub series: Option<Series>,
    /// Episode metadata.
    #[serde(default)]
    pub episode: Option<Episode>,
    /// Credits.
    #[serde(default)]
    pub credit: Credit,
    /// Images.
    #[serde(default)]
    pub provided_info: ProvidedInfo,
}

/// Slot group reference (binge-watching blocks etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotGroup {
    /// Group ID.
    pub id: String,
}

/// One scheduled broadcast entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Slot ID.
    pub id: String,
    /// Owning channel ID.
    pub channel_id: String,
    /// Start time (epoch seconds).
    pub start_at: i64,
    /// End time (epoch seconds).
    pub end_at: i64,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Description.
    #[serde(default)]
    pub content: Option<String>,
    /// Short highlight text.
    #[serde(default)]
    pub highlight: Option<String>,
    /// Hashtag without the leading `#`.
    #[serde(default)]
    pub hashtag: Option<String>,
    /// Programs aired in this slot.
    #[serde(default)]
    pub programs: Vec<Program>,
    /// Editorial marks (`first`, `last`, `live`, ...).
    #[serde(default)]
    pub mark: BTreeMap<String, bool>,
    /// Availability flags (`timeshift`, `timeshiftFree`, ...).
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    /// Slot group.
    #[serde(default)]
    pub slot_group: Option<SlotGroup>,
    /// Timeshift availability end (epoch seconds).
    #[serde(default)]
    pub timeshift_end_at: Option<i64>,
    /// Free timeshift availability end (epoch seconds).
    #[serde(default)]
    pub timeshift_free_end_at: Option<i64>,
}

impl Slot {
    /// Returns `true` if `now` falls within `[start_at, end_at]`.
    #[must_use]
    pub const fn is_airing(&self, now: i64) -> bool {
        self.start_at <= now && now <= self.end_at
    }

    /// Returns the IDs of the attached programs, in order.
    #[must_use]
    pub fn program_ids(&self) -> Vec<String> {
        self.programs.iter().map(|p| p.id.clone()).collect()
    }

    /// Returns the names of all marks and flags set to `true`, sorted.
    #[must_use]
    pub fn active_flags(&self) -> Vec<String> {
        self.mark
            .iter()
            .chain(self.flags.iter())
            .filter(|&(_, &on)| on)
            .map(|(name, _)| name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Slots of one channel for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSchedule {
    /// Channel ID.
    pub channel_id: String,
    /// Broadcast date (`YYYYMMDD`).
    pub date: String,
    /// Slots in broadcast order.
    #[serde(default)]
    pub slots: Vec<Slot>,
}

/// Full schedule for one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    /// Channels in feed order.
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Per-channel, per-day schedules.
    #[serde(default)]
    pub channel_schedules: Vec<ChannelSchedule>,
}

impl Timetable {
    /// Iterates over every slot in every schedule.
    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.channel_schedules.iter().flat_map(|s| s.slots.iter())
    }

    /// Returns the slots airing at `now` (epoch seconds).
    #[must_use]
    pub fn current_slots(&self, now: i64) -> Vec<&Slot> {
        self.slots().filter(|s| s.is_airing(now)).collect()
    }

    /// Returns `true` if a slot with this ID is present.
    #[must_use]
    pub fn contains_slot(&self, slot_id: &str) -> bool {
        self.slots().any(|s| s.id == slot_id)
    }

    /// Returns `true` if a channel with this ID is present.
    #[must_use]
    pub fn contains_channel(&self, channel_id: &str) -> bool {
        self.channels.iter().any(|c| c.id == channel_id)
    }

    /// Returns every distinct program across all slots, first occurrence wins.
    #[must_use]
    pub fn unique_programs(&self) -> Vec<&Program> {
        let mut seen: HashSet<&str> = HashSet::new();
        self.slots()
            .flat_map(|s| s.programs.iter())
            .filter(|p| seen.insert(p.id.as_str()))
            .collect()
    }
}

/// Point-in-time audience counts for an airing slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceSample {
    /// Slot ID.
    pub slot_id: String,
    /// Channel ID.
    pub channel_id: String,
    /// Cumulative comment count.
    #[serde(default)]
    pub comment_count: Option<u64>,
    /// Cumulative view count.
    #[serde(default)]
    pub view_count: Option<u64>,
}

impl AudienceSample {
    /// Comment count, `0` when absent.
    #[must_use]
    pub fn comments(&self) -> u64 {
        self.comment_count.unwrap_or(0)
    }

    /// View count, `0` when absent.
    #[must_use]
    pub fn views(&self) -> u64 {
        self.view_count.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    const TIMETABLE_JSON: &str = r#"{
        "channels": [
            {"id": "news", "name": "News", "order": 1},
            {"id": "anime", "name": "Anime", "order": 2}
        ],
        "channelSchedules": [
            {
                "channelId": "news",
                "date": "20240101",
                "slots": [
                    {
                        "id": "s1",
                        "channelId": "news",
                        "startAt": 1000,
                        "endAt": 2000,
                        "title": "Morning News",
                        "programs": [{"id": "p1"}, {"id": "p2"}],
                        "mark": {"live": true, "first": false},
                        "flags": {"timeshift": true}
                    }
                ]
            },
            {
                "channelId": "anime",
                "date": "20240101",
                "slots": [
                    {
                        "id": "s2",
                        "channelId": "anime",
                        "startAt": 1500,
                        "endAt": 3000,
                        "title": "Rerun",
                        "programs": [{"id": "p2"}]
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_timetable() {
        // Arrange & Act
        let timetable: Timetable = serde_json::from_str(TIMETABLE_JSON).unwrap();

        // Assert
        assert_eq!(timetable.channels.len(), 2);
        assert_eq!(timetable.channels[0].order, ChannelOrder::Known(1));
        assert_eq!(timetable.slots().count(), 2);
        assert_eq!(timetable.slots().next().unwrap().program_ids(), ["p1", "p2"]);
    }

    #[test]
    fn test_current_slots_is_inclusive() {
        // Arrange
        let timetable: Timetable = serde_json::from_str(TIMETABLE_JSON).unwrap();

        // Act
        let at_start = timetable.current_slots(1000);
        let overlap = timetable.current_slots(2000);
        let after = timetable.current_slots(3001);

        // Assert
        assert_eq!(at_start.len(), 1);
        assert_eq!(overlap.len(), 2);
        assert!(after.is_empty());
    }

    #[test]
    fn test_unique_programs_deduplicates_by_id() {
        // Arrange
        let timetable: Timetable = serde_json::from_str(TIMETABLE_JSON).unwrap();

        // Act
        let programs = timetable.unique_programs();

        // Assert
        let ids: Vec<&str> = programs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p2"]);
    }

    #[test]
    fn test_active_flags_merges_mark_and_flags() {
        // Arrange
        let timetable: Timetable = serde_json::from_str(TIMETABLE_JSON).unwrap();
        let slot = timetable.slots().next().unwrap();

        // Act
        let flags = slot.active_flags();

        // Assert: `first` is false and excluded
        assert_eq!(flags, ["live", "timeshift"]);
    }

    #[test]
    fn test_synthesized_channel_roundtrip() {
        // Arrange
        let channel = Channel::synthesized("pop-up");

        // Act
        let json = serde_json::to_string(&channel).unwrap();
        let parsed: Channel = serde_json::from_str(&json).unwrap();

        // Assert
        assert_eq!(json, r#"{"id":"pop-up","name":"pop-up","order":null}"#);
        assert_eq!(parsed.order, ChannelOrder::Synthesized);
        assert_eq!(parsed.order.rank(), SYNTHESIZED_ORDER);
    }

    #[test]
    fn test_audience_sample_defaults_to_zero() {
        // Arrange
        let sample: AudienceSample =
            serde_json::from_str(r#"{"slotId": "s1", "channelId": "news"}"#).unwrap();

        // Act & Assert
        assert_eq!(sample.comments(), 0);
        assert_eq!(sample.views(), 0);
    }

    #[test]
    fn test_channel_without_order_is_synthesized() {
        // Arrange
        let json = r#"[
            {"id": "news", "name": "News", "order": 1},
            {"id": "pop-up", "name": "Pop-up"},
            {"id": "late", "name": "Late", "order": null}
        ]"#;

        // Act
        let channels: Vec<Channel> = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(channels[0].order, ChannelOrder::Known(1));
        assert_eq!(channels[1].order, ChannelOrder::Synthesized);
        assert_eq!(channels[1].order.rank(), SYNTHESIZED_ORDER);
        assert_eq!(channels[2].order, ChannelOrder::Synthesized);
    }
}
