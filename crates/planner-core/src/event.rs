use anyhow::{Context, anyhow};
use chrono::{DateTime, Days, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datetime::{DisplayZone, days_between};
use crate::grid::{DAYS_PER_WEEK, Week, build_year_weeks};

pub const UNTITLED_EVENT: &str = "Untitled event";

const LAST_DAY_IDX: i64 = DAYS_PER_WEEK as i64 - 1;

/// A normalized event. Instants are UTC and `end >= start` holds for every
/// value that comes out of `sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub color: String,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub html_link: Option<String>,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Anything under 24 hours of wall-clock duration is drawn as a timed entry
/// in its start day; 24 hours or more becomes a bar.
pub fn is_short_event(event: &CalendarEvent) -> bool {
    event.duration() < Duration::hours(24)
}

/// A long event's day range inside one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement<'a> {
    pub event: &'a CalendarEvent,
    pub start_idx: usize,
    pub end_idx: usize,
    pub continues_from_previous_week: bool,
    pub continues_to_next_week: bool,
}

impl Placement<'_> {
    pub fn span(&self) -> usize {
        self.end_idx - self.start_idx
    }

    pub fn covers(&self, day_idx: usize) -> bool {
        self.start_idx <= day_idx && day_idx <= self.end_idx
    }
}

/// Intersects a long event with `week` at local-day granularity. Returns
/// `None` when the event lies entirely outside the week.
pub fn place_in_week<'a>(
    event: &'a CalendarEvent,
    week: &Week,
    zone: &DisplayZone,
) -> Option<Placement<'a>> {
    let week_start = week.monday();
    let week_end = week.sunday();
    let event_start_day = zone.date_of(event.start);
    let event_end_day = last_day(event, zone);

    if event_start_day > week_end || event_end_day < week_start {
        return None;
    }

    Some(Placement {
        event,
        start_idx: day_offset(days_between(week_start, event_start_day)),
        end_idx: day_offset(days_between(week_start, event_end_day)),
        continues_from_previous_week: event_start_day < week_start,
        continues_to_next_week: event_end_day > week_end,
    })
}

/// All-day events end at the midnight after their last day; that instant
/// does not occupy a day of its own.
fn last_day(event: &CalendarEvent, zone: &DisplayZone) -> NaiveDate {
    let end_day = zone.date_of(event.end);
    if event.is_all_day
        && event.end > event.start
        && zone.time_of(event.end).num_seconds_from_midnight() == 0
    {
        return end_day
            .pred_opt()
            .unwrap_or(end_day)
            .max(zone.date_of(event.start));
    }
    end_day
}

fn day_offset(offset: i64) -> usize {
    usize::try_from(offset.clamp(0, LAST_DAY_IDX)).unwrap_or_default()
}

/// Optional instant bounds used to narrow a fetched event list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventWindow {
    /// Parses RFC3339 bounds; empty strings mean "unbounded".
    pub fn parse(start: Option<&str>, end: Option<&str>) -> anyhow::Result<Self> {
        let start = parse_bound(start).context("invalid start query value, use RFC3339")?;
        let end = parse_bound(end).context("invalid end query value, use RFC3339")?;

        if let (Some(start), Some(end)) = (start, end)
            && end < start
        {
            return Err(anyhow!("end query value cannot be before start"));
        }

        Ok(Self { start, end })
    }

    /// From local midnight of the grid's first Monday to local midnight
    /// after its last Sunday.
    pub fn for_year(year: i32, zone: &DisplayZone) -> anyhow::Result<Self> {
        let weeks = build_year_weeks(year);
        let (Some(first), Some(last)) = (weeks.first(), weeks.last()) else {
            return Err(anyhow!("no calendar weeks for year {year}"));
        };
        let after_last = last
            .sunday()
            .checked_add_days(Days::new(1))
            .ok_or_else(|| anyhow!("year {year} ends past the calendar range"))?;

        Ok(Self {
            start: Some(zone.local_midnight(first.monday())?),
            end: Some(zone.local_midnight(after_last)?),
        })
    }

    pub fn contains(&self, event: &CalendarEvent) -> bool {
        if let Some(start) = self.start
            && event.end < start
        {
            return false;
        }
        if let Some(end) = self.end
            && event.start > end
        {
            return false;
        }
        true
    }
}

fn parse_bound(raw: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .with_context(|| format!("could not parse {raw:?}")),
    }
}

pub fn filter_events(events: Vec<CalendarEvent>, window: &EventWindow) -> Vec<CalendarEvent> {
    if window.start.is_none() && window.end.is_none() {
        return events;
    }

    let before = events.len();
    let kept: Vec<CalendarEvent> = events
        .into_iter()
        .filter(|event| window.contains(event))
        .collect();
    debug!(before, after = kept.len(), "filtered events to window");
    kept
}
