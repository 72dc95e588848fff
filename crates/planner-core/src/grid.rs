//! Year grid: the Monday-first weeks that cover a calendar year and the
//! month-start labels drawn on top of them.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Serialize;
use tracing::{debug, warn};

use crate::datetime::{DateKey, format_date_key, monday_on_or_before, sunday_on_or_after};

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;
pub const DAYS_PER_WEEK: usize = 7;

const MONTH_NAMES: [(&str, &str); 12] = [
    ("January", "Jan"),
    ("February", "Feb"),
    ("March", "Mar"),
    ("April", "Apr"),
    ("May", "May"),
    ("June", "Jun"),
    ("July", "Jul"),
    ("August", "Aug"),
    ("September", "Sep"),
    ("October", "Oct"),
    ("November", "Nov"),
    ("December", "Dec"),
];

/// Seven consecutive days, Monday through Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Week {
    days: [NaiveDate; DAYS_PER_WEEK],
}

impl Week {
    /// Returns `None` when `monday` is not a Monday or the week runs past
    /// the last representable date.
    pub fn starting(monday: NaiveDate) -> Option<Self> {
        if monday.weekday() != Weekday::Mon {
            return None;
        }
        let mut days = [monday; DAYS_PER_WEEK];
        for (offset, slot) in days.iter_mut().enumerate().skip(1) {
            *slot = monday.checked_add_days(Days::new(offset as u64))?;
        }
        Some(Self { days })
    }

    pub fn containing(date: NaiveDate) -> Option<Self> {
        Self::starting(monday_on_or_before(date))
    }

    pub fn days(&self) -> &[NaiveDate; DAYS_PER_WEEK] {
        &self.days
    }

    pub fn monday(&self) -> NaiveDate {
        self.days[0]
    }

    pub fn sunday(&self) -> NaiveDate {
        self.days[DAYS_PER_WEEK - 1]
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.monday() <= date && date <= self.sunday()
    }

    pub fn date_keys(&self) -> [DateKey; DAYS_PER_WEEK] {
        self.days.map(format_date_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthStartLabel {
    pub full: &'static str,
    pub short: &'static str,
}

impl MonthStartLabel {
    pub fn for_month(month: u32) -> Option<Self> {
        let idx = usize::try_from(month.checked_sub(1)?).ok()?;
        MONTH_NAMES
            .get(idx)
            .map(|&(full, short)| Self { full, short })
    }
}

pub fn is_valid_year(value: i64) -> bool {
    (i64::from(MIN_YEAR)..=i64::from(MAX_YEAR)).contains(&value)
}

pub fn clamp_year(value: i64) -> i32 {
    let clamped = value.clamp(i64::from(MIN_YEAR), i64::from(MAX_YEAR));
    // The clamp above keeps the value inside i32.
    i32::try_from(clamped).unwrap_or(MIN_YEAR)
}

/// Turns a user-supplied year into a valid one: missing or non-numeric
/// input falls back to `fallback`, numbers outside the supported range are
/// clamped.
pub fn resolve_year_param(raw: Option<&str>, fallback: i32) -> i32 {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return fallback;
    };

    match raw.parse::<i64>() {
        Ok(value) if is_valid_year(value) => clamp_year(value),
        Ok(value) => {
            let clamped = clamp_year(value);
            warn!(requested = value, clamped, "year out of range; clamping");
            clamped
        }
        Err(err) => {
            warn!(input = %raw, error = %err, fallback, "year is not a number; using fallback");
            fallback
        }
    }
}

/// Padding days of the first and last week belong to the neighbouring
/// years and render dimmed.
pub fn is_in_year(date: NaiveDate, year: i32) -> bool {
    date.year() == year
}

#[tracing::instrument]
pub fn build_year_weeks(year: i32) -> Vec<Week> {
    let (Some(jan1), Some(dec31)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        warn!(year, "year is not representable; no weeks built");
        return Vec::new();
    };

    let start = monday_on_or_before(jan1);
    let end = sunday_on_or_after(dec31);

    let mut weeks = Vec::with_capacity(54);
    let mut monday = start;
    while monday <= end {
        let Some(week) = Week::starting(monday) else {
            warn!(%monday, "week runs past the calendar range; stopping");
            break;
        };
        weeks.push(week);
        match monday.checked_add_days(Days::new(DAYS_PER_WEEK as u64)) {
            Some(next) => monday = next,
            None => break,
        }
    }

    debug!(year, %start, %end, weeks = weeks.len(), "built year weeks");
    weeks
}

pub fn build_month_start_labels(weeks: &[Week]) -> BTreeMap<DateKey, MonthStartLabel> {
    weeks
        .iter()
        .flat_map(|week| week.days().iter().copied())
        .filter(|date| date.day() == 1)
        .filter_map(|date| {
            MonthStartLabel::for_month(date.month()).map(|label| (format_date_key(date), label))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Days, NaiveDate, Weekday};

    use super::{
        MonthStartLabel, Week, build_month_start_labels, build_year_weeks, clamp_year,
        is_in_year, is_valid_year, resolve_year_param,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn weeks_are_contiguous_and_cover_the_year() {
        for year in [1, 1999, 2012, 2023, 2024, 2026, 9999] {
            let weeks = build_year_weeks(year);
            assert!(
                (53..=54).contains(&weeks.len()),
                "year {year} produced {} weeks",
                weeks.len()
            );

            let first = weeks.first().expect("first week");
            let last = weeks.last().expect("last week");
            assert_eq!(first.monday().weekday(), Weekday::Mon);
            assert_eq!(last.sunday().weekday(), Weekday::Sun);
            assert!(first.contains(date(year, 1, 1)));
            assert!(last.contains(date(year, 12, 31)));
            assert!(first.monday() > date(year, 1, 1) - Days::new(7));
            assert!(last.sunday() < date(year, 12, 31) + Days::new(7));

            for pair in weeks.windows(2) {
                assert_eq!(pair[0].monday() + Days::new(7), pair[1].monday());
            }
            for week in &weeks {
                for window in week.days().windows(2) {
                    assert_eq!(window[0] + Days::new(1), window[1]);
                }
            }
        }
    }

    #[test]
    fn leap_year_starting_on_sunday_needs_54_weeks() {
        let weeks = build_year_weeks(2012);
        assert_eq!(weeks.len(), 54);
        assert_eq!(weeks[0].monday(), date(2011, 12, 26));
        assert_eq!(weeks[53].sunday(), date(2013, 1, 6));
    }

    #[test]
    fn year_2026_is_padded_on_both_ends() {
        let weeks = build_year_weeks(2026);
        assert_eq!(weeks.len(), 53);
        assert_eq!(weeks[0].monday(), date(2025, 12, 29));
        assert_eq!(weeks[52].sunday(), date(2027, 1, 3));
        assert!(!is_in_year(weeks[0].monday(), 2026));
        assert!(is_in_year(weeks[0].days()[3], 2026));
    }

    #[test]
    fn month_labels_include_padding_months() {
        let labels = build_month_start_labels(&build_year_weeks(2026));
        assert_eq!(labels.len(), 13);
        assert_eq!(
            labels.get("2026-02-01"),
            Some(&MonthStartLabel {
                full: "February",
                short: "Feb"
            })
        );
        assert_eq!(labels.get("2027-01-01").map(|l| l.full), Some("January"));
        assert!(labels.get("2025-12-01").is_none());

        // 2023 ends on a Sunday, so the grid never reaches next January.
        let labels = build_month_start_labels(&build_year_weeks(2023));
        assert_eq!(labels.len(), 12);
    }

    #[test]
    fn week_requires_a_monday() {
        assert!(Week::starting(date(2026, 2, 17)).is_none());
        let week = Week::containing(date(2026, 2, 19)).expect("week");
        assert_eq!(week.monday(), date(2026, 2, 16));
        assert_eq!(week.sunday(), date(2026, 2, 22));
        assert_eq!(week.date_keys()[6].as_str(), "2026-02-22");
    }

    #[test]
    fn year_bounds_are_validated_and_clamped() {
        assert!(is_valid_year(1));
        assert!(is_valid_year(9999));
        assert!(!is_valid_year(0));
        assert!(!is_valid_year(10_000));
        assert_eq!(clamp_year(-5), 1);
        assert_eq!(clamp_year(123_456), 9999);
        assert_eq!(clamp_year(2026), 2026);
    }

    #[test]
    fn year_param_falls_back_or_clamps() {
        assert_eq!(resolve_year_param(None, 2026), 2026);
        assert_eq!(resolve_year_param(Some("  "), 2026), 2026);
        assert_eq!(resolve_year_param(Some("abc"), 2026), 2026);
        assert_eq!(resolve_year_param(Some("2031"), 2026), 2031);
        assert_eq!(resolve_year_param(Some("0"), 2026), 1);
        assert_eq!(resolve_year_param(Some("20000"), 2026), 9999);
    }
}
