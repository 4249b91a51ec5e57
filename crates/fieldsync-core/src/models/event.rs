//! Calendar event model

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{CachedEntity, EntityFamily};
use crate::error::{Error, Result};

/// Duration assumed for events without an end time.
pub const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;

/// Lifecycle state of a calendar event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Upcoming,
    Active,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown event status '{other}'")),
        }
    }
}

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(Error::InvalidInput(format!(
                "time range end {end} must be after start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Range starting at `start` lasting the default event duration.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: start + Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES),
        }
    }

    /// Half-open overlap test: touching boundaries do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A calendar or timetable entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Server id, or a temporary id while the create is queued
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl CalendarEvent {
    /// Build the local version of an event created from `draft`.
    pub fn from_draft(id: impl Into<String>, draft: &EventDraft, now: i64) -> Self {
        Self {
            id: id.into(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            start: draft.start,
            end: draft.end,
            all_day: draft.all_day,
            status: EventStatus::Upcoming,
            metadata: draft.metadata.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// End time, defaulting to one hour after start.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end
            .unwrap_or_else(|| self.start + Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES))
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.effective_end(),
        }
    }

    /// Merge the provided fields of `patch` over this event.
    pub fn apply_patch(&mut self, patch: &EventPatch, now: i64) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
        if let Some(start) = patch.start {
            self.start = start;
        }
        if let Some(end) = patch.end {
            self.end = Some(end);
        }
        if let Some(all_day) = patch.all_day {
            self.all_day = all_day;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata.extend(metadata.clone());
        }
        self.updated_at = now;
    }
}

impl CachedEntity for CalendarEvent {
    const FAMILY: EntityFamily = EntityFamily::Calendar;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// Fields for creating a calendar event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            title: title.into(),
            description: None,
            location: None,
            start,
            end,
            all_day: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("event title cannot be empty".into()));
        }
        if let Some(end) = self.end {
            TimeRange::new(self.start, end)?;
        }
        Ok(())
    }

    pub fn time_range(&self) -> TimeRange {
        self.end.map_or_else(
            || TimeRange::starting_at(self.start),
            |end| TimeRange {
                start: self.start,
                end,
            },
        )
    }
}

/// Partial update of a calendar event; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl EventPatch {
    /// Whether the patch moves the event in time.
    pub const fn changes_time(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Query filters for listing calendar events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl EventFilters {
    pub fn in_range(range: TimeRange) -> Self {
        Self {
            range: Some(range),
            ..Self::default()
        }
    }

    /// Whether the query covers the whole collection.
    pub const fn is_unscoped(&self) -> bool {
        self.status.is_none() && self.range.is_none() && self.limit.is_none()
    }

    pub fn matches(&self, event: &CalendarEvent) -> bool {
        if self.status.is_some_and(|status| status != event.status) {
            return false;
        }
        if let Some(range) = &self.range {
            if !range.overlaps(&event.time_range()) {
                return false;
            }
        }
        true
    }

    /// Filter, order by start time and truncate to `limit`.
    pub fn apply(&self, events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
        let mut matching = events
            .into_iter()
            .filter(|event| self.matches(event))
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = self.limit {
            matching.truncate(limit);
        }
        matching
    }
}

/// Events of one calendar day (UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub events: Vec<CalendarEvent>,
}

/// Events in a range grouped by day, ordered by date then start time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarData {
    pub range: TimeRange,
    pub days: Vec<CalendarDay>,
}

impl CalendarData {
    pub fn from_events(range: TimeRange, events: Vec<CalendarEvent>) -> Self {
        let mut grouped: BTreeMap<NaiveDate, Vec<CalendarEvent>> = BTreeMap::new();
        for event in EventFilters::in_range(range).apply(events) {
            grouped
                .entry(event.start.date_naive())
                .or_default()
                .push(event);
        }
        Self {
            range,
            days: grouped
                .into_iter()
                .map(|(date, events)| CalendarDay { date, events })
                .collect(),
        }
    }

    pub fn event_count(&self) -> usize {
        self.days.iter().map(|day| day.events.len()).sum()
    }
}

/// Export format produced by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Ical,
    Json,
}

impl ExportFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ical => "ical",
            Self::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, minute, 0).unwrap()
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let morning = TimeRange::new(at(10, 0), at(11, 0)).unwrap();
        let late_morning = TimeRange::new(at(11, 0), at(12, 0)).unwrap();
        assert!(!morning.overlaps(&late_morning));
        assert!(!late_morning.overlaps(&morning));
    }

    #[test]
    fn intersecting_ranges_overlap() {
        let first = TimeRange::new(at(10, 0), at(11, 30)).unwrap();
        let second = TimeRange::new(at(11, 0), at(12, 0)).unwrap();
        assert!(first.overlaps(&second));
        assert!(second.overlaps(&first));
    }

    #[test]
    fn time_range_rejects_empty_interval() {
        assert!(TimeRange::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeRange::new(at(11, 0), at(10, 0)).is_err());
    }

    #[test]
    fn missing_end_defaults_to_one_hour() {
        let event =
            CalendarEvent::from_draft("e1", &EventDraft::new("Debate", at(9, 0), None), 0);
        assert_eq!(event.effective_end(), at(10, 0));
    }

    #[test]
    fn calendar_data_groups_by_day() {
        let next_day = Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap();
        let events = vec![
            CalendarEvent::from_draft("b", &EventDraft::new("B", at(14, 0), None), 0),
            CalendarEvent::from_draft("a", &EventDraft::new("A", at(9, 0), None), 0),
            CalendarEvent::from_draft("c", &EventDraft::new("C", next_day, None), 0),
        ];
        let range = TimeRange::new(at(0, 0), next_day + Duration::days(1)).unwrap();

        let data = CalendarData::from_events(range, events);
        assert_eq!(data.days.len(), 2);
        assert_eq!(data.days[0].events[0].id, "a");
        assert_eq!(data.days[0].events[1].id, "b");
        assert_eq!(data.event_count(), 3);
    }

    #[test]
    fn draft_validation_rejects_blank_title_and_inverted_range() {
        assert!(EventDraft::new("  ", at(9, 0), None).validate().is_err());
        assert!(EventDraft::new("Vote", at(9, 0), Some(at(8, 0)))
            .validate()
            .is_err());
        assert!(EventDraft::new("Vote", at(9, 0), Some(at(10, 0)))
            .validate()
            .is_ok());
    }
}
