use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::datetime::{DateKey, DisplayZone, format_date_key};
use crate::event::{CalendarEvent, is_short_event, place_in_week};
use crate::grid::{MonthStartLabel, Week, build_month_start_labels, build_year_weeks};
use crate::lanes::{WeekBar, assign_lanes};

/// Everything needed to draw one week row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekRenderData<'a> {
    /// Bars in the visible lanes only, ordered by lane, start day, start.
    pub week_bars: Vec<WeekBar<'a>>,
    pub short_events_by_date_key: BTreeMap<DateKey, Vec<&'a CalendarEvent>>,
    pub overflow_bars_by_date_key: BTreeMap<DateKey, usize>,
    pub active_bars_by_date_key: BTreeMap<DateKey, usize>,
}

impl<'a> WeekRenderData<'a> {
    pub fn short_events_on(&self, key: &str) -> &[&'a CalendarEvent] {
        self.short_events_by_date_key
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn overflow_on(&self, key: &str) -> usize {
        self.overflow_bars_by_date_key.get(key).copied().unwrap_or(0)
    }

    pub fn active_on(&self, key: &str) -> usize {
        self.active_bars_by_date_key.get(key).copied().unwrap_or(0)
    }
}

/// Splits `events` into bars and timed entries for one week. Short events
/// land under the key of their local start day when that day is in the
/// week; long events go through placement and lane assignment.
#[tracing::instrument(skip_all, fields(monday = %week.monday(), events = events.len()))]
pub fn build_week_render_data<'a>(
    week: &Week,
    events: &'a [CalendarEvent],
    zone: &DisplayZone,
) -> WeekRenderData<'a> {
    let mut placements = Vec::new();
    let mut short_events_by_date_key: BTreeMap<DateKey, Vec<&'a CalendarEvent>> = BTreeMap::new();

    for event in events {
        if is_short_event(event) {
            let start_day = zone.date_of(event.start);
            if week.contains(start_day) {
                short_events_by_date_key
                    .entry(format_date_key(start_day))
                    .or_default()
                    .push(event);
            }
        } else if let Some(placement) = place_in_week(event, week, zone) {
            placements.push(placement);
        }
    }

    for bucket in short_events_by_date_key.values_mut() {
        bucket.sort_by_key(|event| event.start);
    }

    let lanes = assign_lanes(placements);
    let keys = week.date_keys();
    let active_bars_by_date_key = keys.iter().cloned().zip(lanes.active_by_day).collect();
    let overflow_bars_by_date_key = keys.into_iter().zip(lanes.overflow_by_day).collect();

    debug!(
        bars = lanes.bars.len(),
        lanes = lanes.lane_count,
        short_days = short_events_by_date_key.len(),
        "built week render data"
    );

    WeekRenderData {
        week_bars: lanes.into_visible_bars(),
        short_events_by_date_key,
        overflow_bars_by_date_key,
        active_bars_by_date_key,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekLayout<'a> {
    pub week: Week,
    #[serde(flatten)]
    pub data: WeekRenderData<'a>,
}

/// The whole grid for one year: weeks, month labels and per-week layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearLayout<'a> {
    pub year: i32,
    pub timezone: String,
    pub month_start_labels: BTreeMap<DateKey, MonthStartLabel>,
    pub weeks: Vec<WeekLayout<'a>>,
}

#[tracing::instrument(skip(events, zone), fields(events = events.len()))]
pub fn build_year_render_data<'a>(
    year: i32,
    events: &'a [CalendarEvent],
    zone: &DisplayZone,
) -> YearLayout<'a> {
    let weeks = build_year_weeks(year);
    let month_start_labels = build_month_start_labels(&weeks);
    let weeks = weeks
        .into_iter()
        .map(|week| WeekLayout {
            data: build_week_render_data(&week, events, zone),
            week,
        })
        .collect();

    YearLayout {
        year,
        timezone: zone.label(),
        month_start_labels,
        weeks,
    }
}
