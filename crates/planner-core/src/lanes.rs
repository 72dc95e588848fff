//! First-fit lane assignment for the bar events of a single week.
//!
//! Placements are ordered by start day, then longest span first, then by
//! the event's start instant, and each one takes the lowest lane whose
//! previous occupant ended on an earlier day. Only the first
//! [`MAX_VISIBLE_BARS`] lanes are drawn; bars in higher lanes are still
//! counted so the grid can show "+N more" per day.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::trace;

use crate::event::{CalendarEvent, Placement};
use crate::grid::DAYS_PER_WEEK;

pub const MAX_VISIBLE_BARS: usize = 3;

/// A placement with its assigned lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekBar<'a> {
    pub event: &'a CalendarEvent,
    pub lane: usize,
    pub start_idx: usize,
    pub end_idx: usize,
    pub continues_from_previous_week: bool,
    pub continues_to_next_week: bool,
}

impl<'a> WeekBar<'a> {
    fn assigned(placement: Placement<'a>, lane: usize) -> Self {
        Self {
            event: placement.event,
            lane,
            start_idx: placement.start_idx,
            end_idx: placement.end_idx,
            continues_from_previous_week: placement.continues_from_previous_week,
            continues_to_next_week: placement.continues_to_next_week,
        }
    }

    pub fn covers(&self, day_idx: usize) -> bool {
        self.start_idx <= day_idx && day_idx <= self.end_idx
    }

    pub fn is_visible(&self) -> bool {
        self.lane < MAX_VISIBLE_BARS
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneLayout<'a> {
    /// Every assigned bar, hidden lanes included, in render order.
    pub bars: Vec<WeekBar<'a>>,
    pub active_by_day: [usize; DAYS_PER_WEEK],
    pub overflow_by_day: [usize; DAYS_PER_WEEK],
    pub lane_count: usize,
}

impl<'a> LaneLayout<'a> {
    pub fn visible_bars(&self) -> impl Iterator<Item = &WeekBar<'a>> {
        self.bars.iter().filter(|bar| bar.is_visible())
    }

    pub fn into_visible_bars(self) -> Vec<WeekBar<'a>> {
        self.bars.into_iter().filter(WeekBar::is_visible).collect()
    }
}

fn assignment_order(a: &Placement<'_>, b: &Placement<'_>) -> Ordering {
    a.start_idx
        .cmp(&b.start_idx)
        .then_with(|| b.span().cmp(&a.span()))
        .then_with(|| a.event.start.cmp(&b.event.start))
}

fn render_order(a: &WeekBar<'_>, b: &WeekBar<'_>) -> Ordering {
    a.lane
        .cmp(&b.lane)
        .then_with(|| a.start_idx.cmp(&b.start_idx))
        .then_with(|| a.event.start.cmp(&b.event.start))
}

pub fn assign_lanes(mut placements: Vec<Placement<'_>>) -> LaneLayout<'_> {
    // Stable sort: full ties keep the caller's order.
    placements.sort_by(assignment_order);

    let mut lane_ends: Vec<usize> = Vec::new();
    let mut bars = Vec::with_capacity(placements.len());
    for placement in placements {
        let lane = lane_ends
            .iter()
            .position(|&lane_end| lane_end < placement.start_idx)
            .unwrap_or_else(|| {
                lane_ends.push(placement.end_idx);
                lane_ends.len() - 1
            });
        lane_ends[lane] = placement.end_idx;
        trace!(
            event = %placement.event.id,
            lane,
            start_idx = placement.start_idx,
            end_idx = placement.end_idx,
            "assigned lane"
        );
        bars.push(WeekBar::assigned(placement, lane));
    }

    let mut active_by_day = [0usize; DAYS_PER_WEEK];
    for (day_idx, active) in active_by_day.iter_mut().enumerate() {
        *active = bars.iter().filter(|bar| bar.covers(day_idx)).count();
    }
    let overflow_by_day = active_by_day.map(|active| active.saturating_sub(MAX_VISIBLE_BARS));

    bars.sort_by(render_order);

    LaneLayout {
        bars,
        active_by_day,
        overflow_by_day,
        lane_count: lane_ends.len(),
    }
}
