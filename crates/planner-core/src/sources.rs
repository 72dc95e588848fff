//! Normalization of raw event documents into [`CalendarEvent`]s.
//!
//! Each source shape has its own mapping function. Events that cannot be
//! turned into a valid `start <= end` pair are logged and dropped here, so
//! the layout code never sees them.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Days, NaiveDate, Utc};
use clap::ValueEnum;
use planner_shared::{ApiEvent, ProblemDetails, ProviderEvent, ProviderEventList, ProviderEventTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::color::DEFAULT_EVENT_COLOR;
use crate::datetime::{DisplayZone, parse_instant, parse_timezone};
use crate::event::{CalendarEvent, UNTITLED_EVENT};

/// Provider `colorId` → hex token.
const PROVIDER_PALETTE: [(&str, &str); 11] = [
    ("1", "#7986cb"),
    ("2", "#33b679"),
    ("3", "#8e24aa"),
    ("4", "#e67c73"),
    ("5", "#f6bf26"),
    ("6", "#f4511e"),
    ("7", "#039be5"),
    ("8", "#616161"),
    ("9", "#3f51b5"),
    ("10", "#0b8043"),
    ("11", "#d50000"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Array → backend API, object with `items` → provider.
    #[default]
    Auto,
    Api,
    Provider,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn event_id(raw: Option<String>) -> String {
    non_blank(raw).unwrap_or_else(|| {
        let generated = Uuid::new_v4().to_string();
        debug!(id = %generated, "event had no id; generated one");
        generated
    })
}

fn date_only(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// All-day bounds: `[midnight(start), midnight(end))` in the display zone,
/// at least one day long.
fn all_day_bounds(
    start_date: NaiveDate,
    end_exclusive: NaiveDate,
    zone: &DisplayZone,
) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let end_exclusive = end_exclusive.max(
        start_date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| anyhow!("all-day start {start_date} is out of range"))?,
    );
    let start = zone.local_midnight(start_date)?;
    let end = zone.local_midnight(end_exclusive)?;
    Ok((start, end))
}

fn checked_bounds(
    id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if end < start {
        warn!(id, %start, %end, "event ends before it starts; dropping");
        return None;
    }
    Some((start, end))
}

/// Maps one backend API event. Returns `None` for events without usable
/// bounds.
pub fn map_api_event(raw: ApiEvent, zone: &DisplayZone) -> Option<CalendarEvent> {
    let id = event_id(raw.id);
    let (Some(raw_start), Some(raw_end)) = (non_blank(raw.start), non_blank(raw.end)) else {
        warn!(id = %id, "event is missing start or end; dropping");
        return None;
    };

    let all_day_dates = date_only(&raw_start).zip(date_only(&raw_end));
    let bounds = match all_day_dates {
        Some((start_date, end_date)) => all_day_bounds(start_date, end_date, zone),
        None => parse_instant(&raw_start, zone)
            .and_then(|start| Ok((start, parse_instant(&raw_end, zone)?))),
    };
    let (start, end) = match bounds {
        Ok(bounds) => bounds,
        Err(err) => {
            warn!(id = %id, error = %format!("{err:#}"), "unparseable event bounds; dropping");
            return None;
        }
    };
    let (start, end) = checked_bounds(&id, start, end)?;

    Some(CalendarEvent {
        summary: non_blank(raw.summary).unwrap_or_else(|| UNTITLED_EVENT.to_string()),
        color: non_blank(raw.color).unwrap_or_else(|| DEFAULT_EVENT_COLOR.to_string()),
        description: non_blank(raw.description),
        location: non_blank(raw.location),
        status: None,
        html_link: None,
        is_all_day: all_day_dates.is_some(),
        id,
        start,
        end,
    })
}

fn provider_instant(time: &ProviderEventTime, zone: &DisplayZone) -> anyhow::Result<DateTime<Utc>> {
    if let Some(raw) = time.date_time.as_deref() {
        // An explicit event zone applies to offset-less values only;
        // parse_instant keeps any offset present in the string.
        let event_zone = time
            .time_zone
            .as_deref()
            .and_then(|tz| parse_timezone(tz, "event"))
            .map(DisplayZone::Named)
            .unwrap_or(*zone);
        return parse_instant(raw, &event_zone);
    }
    if let Some(raw) = time.date.as_deref() {
        return parse_instant(raw, zone);
    }
    Err(anyhow!("neither dateTime nor date is set"))
}

pub fn map_provider_event(raw: ProviderEvent, zone: &DisplayZone) -> Option<CalendarEvent> {
    let id = event_id(raw.id);

    if raw
        .status
        .as_deref()
        .is_some_and(|status| status.eq_ignore_ascii_case("cancelled"))
    {
        debug!(id = %id, "skipping cancelled event");
        return None;
    }

    let (Some(start_time), Some(end_time)) = (raw.start, raw.end) else {
        warn!(id = %id, "event is missing start or end; dropping");
        return None;
    };

    let all_day_dates = match (&start_time.date_time, &end_time.date_time) {
        (None, None) => start_time
            .date
            .as_deref()
            .and_then(date_only)
            .zip(end_time.date.as_deref().and_then(date_only)),
        _ => None,
    };

    let bounds = match all_day_dates {
        Some((start_date, end_date)) => all_day_bounds(start_date, end_date, zone),
        None => provider_instant(&start_time, zone)
            .context("start")
            .and_then(|start| Ok((start, provider_instant(&end_time, zone).context("end")?))),
    };
    let (start, end) = match bounds {
        Ok(bounds) => bounds,
        Err(err) => {
            warn!(id = %id, error = %format!("{err:#}"), "unparseable event bounds; dropping");
            return None;
        }
    };
    let (start, end) = checked_bounds(&id, start, end)?;

    let color = raw
        .color_id
        .as_deref()
        .and_then(|color_id| {
            PROVIDER_PALETTE
                .iter()
                .find(|(key, _)| *key == color_id.trim())
                .map(|(_, hex)| *hex)
        })
        .unwrap_or(DEFAULT_EVENT_COLOR);

    Some(CalendarEvent {
        summary: non_blank(raw.summary).unwrap_or_else(|| UNTITLED_EVENT.to_string()),
        color: color.to_string(),
        description: non_blank(raw.description),
        location: non_blank(raw.location),
        status: non_blank(raw.status),
        html_link: non_blank(raw.html_link),
        is_all_day: all_day_dates.is_some(),
        id,
        start,
        end,
    })
}

fn as_problem(value: &Value) -> Option<ProblemDetails> {
    let object = value.as_object()?;
    if !(object.contains_key("title") && object.contains_key("status")) {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn problem_error(problem: &ProblemDetails) -> anyhow::Error {
    anyhow!(
        "event source returned {} {}: {}",
        problem.status,
        problem.title,
        problem.detail
    )
}

/// Parses an events document and normalizes every entry. A problem-details
/// body is turned into an error.
#[tracing::instrument(skip(raw, zone), fields(bytes = raw.len()))]
pub fn load_events(
    raw: &str,
    format: SourceFormat,
    zone: &DisplayZone,
) -> anyhow::Result<Vec<CalendarEvent>> {
    let document: Value = serde_json::from_str(raw).context("events document is not valid JSON")?;
    if let Some(problem) = as_problem(&document) {
        return Err(problem_error(&problem));
    }

    let format = match (format, &document) {
        (SourceFormat::Auto, Value::Array(_)) => SourceFormat::Api,
        (SourceFormat::Auto, Value::Object(map)) if map.contains_key("items") => {
            SourceFormat::Provider
        }
        (SourceFormat::Auto, _) => {
            return Err(anyhow!(
                "unrecognized events document: expected a JSON array or an object with `items`"
            ));
        }
        (explicit, _) => explicit,
    };
    debug!(?format, "resolved event source format");

    let (total, events): (usize, Vec<CalendarEvent>) = match format {
        SourceFormat::Api => {
            let raw_events: Vec<ApiEvent> =
                serde_json::from_value(document).context("failed to decode backend events")?;
            let total = raw_events.len();
            (
                total,
                raw_events
                    .into_iter()
                    .filter_map(|event| map_api_event(event, zone))
                    .collect(),
            )
        }
        SourceFormat::Provider | SourceFormat::Auto => {
            let raw_events = if document.is_array() {
                serde_json::from_value::<Vec<ProviderEvent>>(document)
            } else {
                serde_json::from_value::<ProviderEventList>(document).map(|list| list.items)
            }
            .context("failed to decode provider events")?;
            let total = raw_events.len();
            (
                total,
                raw_events
                    .into_iter()
                    .filter_map(|event| map_provider_event(event, zone))
                    .collect(),
            )
        }
    };

    info!(
        total,
        kept = events.len(),
        dropped = total - events.len(),
        "normalized events"
    );
    Ok(events)
}

/// Reads an events document from `path`, or from stdin when `path` is `-`.
pub fn read_events_document(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read events from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn demo_event(
    id: &str,
    summary: &str,
    description: &str,
    start: &str,
    end: &str,
    location: &str,
    color: &str,
) -> ApiEvent {
    ApiEvent {
        id: Some(id.to_string()),
        summary: Some(summary.to_string()),
        description: Some(description.to_string()),
        start: Some(start.to_string()),
        end: Some(end.to_string()),
        location: Some(location.to_string()),
        color: Some(color.to_string()),
    }
}

/// A fixed set of February 2026 events in backend API shape.
pub fn demo_events() -> Vec<ApiEvent> {
    vec![
        demo_event(
            "evt-1",
            "Sprint Planning",
            "Plan stories for the next sprint",
            "2026-02-16T09:00:00Z",
            "2026-02-16T10:30:00Z",
            "Room A / Zoom",
            "#0859dbff",
        ),
        demo_event(
            "evt-2",
            "1:1",
            "Weekly sync",
            "2026-02-17T11:00:00Z",
            "2026-02-17T12:00:00Z",
            "Room B",
            "#eebb22ff",
        ),
        demo_event(
            "evt-3",
            "Hackathon with a very long title that should be truncated on the UI",
            "Cross-team product hackathon",
            "2026-02-17T10:00:00Z",
            "2026-02-21T13:00:00Z",
            "Innovation Lab",
            "#54ca00ff",
        ),
        demo_event(
            "evt-4",
            "Another longevent",
            "Cross-team product hackathon",
            "2026-02-18T03:00:00Z",
            "2026-02-22T09:00:00Z",
            "Innovation Lab",
            "#f3d00aff",
        ),
        demo_event(
            "evt-5",
            "yet another event with a long title that should be truncated on the UI with multiple lines",
            "Cross-team product hackathon",
            "2026-02-25T08:00:00Z",
            "2026-03-03T10:00:00Z",
            "Innovation Lab",
            "#f3540aff",
        ),
        demo_event(
            "evt-6",
            "should be truncated on the UI with multiple lines",
            "Cross-team product hackathon",
            "2026-02-19T08:00:00Z",
            "2026-02-21T10:00:00Z",
            "Innovation Lab",
            "#05d2e1ff",
        ),
    ]
}

pub fn normalize_api_events(raw: Vec<ApiEvent>, zone: &DisplayZone) -> Vec<CalendarEvent> {
    raw.into_iter()
        .filter_map(|event| map_api_event(event, zone))
        .collect()
}
