//! Advisory time-range conflict detection for calendar events.
//!
//! Conflicts never block a write; they are returned alongside it so callers
//! can warn the user.

use crate::models::{CalendarEvent, EventStatus, TimeRange};

/// Events from `events` whose time range overlaps `candidate`.
///
/// Overlap is half-open (`candidate.start < other.end && other.start <
/// candidate.end`); events without an end time last one hour. Cancelled
/// events and the event identified by `exclude_id` are skipped. Results are
/// ordered by start time.
pub fn find_conflicts<'a, I>(
    candidate: &TimeRange,
    events: I,
    exclude_id: Option<&str>,
) -> Vec<CalendarEvent>
where
    I: IntoIterator<Item = &'a CalendarEvent>,
{
    let mut conflicts = events
        .into_iter()
        .filter(|event| event.status != EventStatus::Cancelled)
        .filter(|event| exclude_id != Some(event.id.as_str()))
        .filter(|event| candidate.overlaps(&event.time_range()))
        .cloned()
        .collect::<Vec<_>>();
    conflicts.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    conflicts
}
