//! Broadcaster schedule API client module.
//!
//! Handles HTTP requests to the broadcaster's media API and slot sitemap,
//! and retrieves the full timetable, individual slot details, and live
//! audience counts.

mod api;
mod client;
mod rate_limiter;
mod sitemap;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalScheduleSource, ScheduleSource};
#[allow(clippy::module_name_repetitions)]
pub use client::{ScheduleClient, ScheduleClientBuilder};
pub use sitemap::parse_sitemap_slot_ids;
pub use types::{
    AudienceSample, Channel, ChannelOrder, ChannelSchedule, Credit, Episode, Program,
    ProvidedInfo, SYNTHESIZED_ORDER, Series, Slot, SlotGroup, Timetable,
};
