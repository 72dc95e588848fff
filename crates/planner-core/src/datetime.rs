use std::borrow::Borrow;
use std::fmt;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::Serialize;

const TIMEZONE_ENV_VAR: &str =
  "PLANNER_TIMEZONE";

/// The single zone used to turn
/// instants into local calendar days
/// and wall-clock times.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum DisplayZone {
  /// The observer's zone as reported
  /// by the operating system.
  #[default]
  System,
  Named(Tz)
}

impl DisplayZone {
  #[must_use]
  pub fn date_of(
    &self,
    instant: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | Self::System => {
        instant
          .with_timezone(&Local)
          .date_naive()
      }
      | Self::Named(tz) => {
        instant
          .with_timezone(tz)
          .date_naive()
      }
    }
  }

  #[must_use]
  pub fn time_of(
    &self,
    instant: DateTime<Utc>
  ) -> NaiveTime {
    match self {
      | Self::System => {
        instant
          .with_timezone(&Local)
          .time()
      }
      | Self::Named(tz) => {
        instant
          .with_timezone(tz)
          .time()
      }
    }
  }

  /// Converts a wall-clock datetime in
  /// this zone to UTC. Ambiguous times
  /// resolve to the earliest instant;
  /// times skipped by a DST jump are an
  /// error.
  pub fn to_utc(
    &self,
    local_naive: NaiveDateTime,
    context: &str
  ) -> anyhow::Result<DateTime<Utc>> {
    match self {
      | Self::System => {
        resolve_local_result(
          Local.from_local_datetime(
            &local_naive
          ),
          context
        )
      }
      | Self::Named(tz) => {
        resolve_local_result(
          tz.from_local_datetime(
            &local_naive
          ),
          context
        )
      }
    }
  }

  pub fn local_midnight(
    &self,
    date: NaiveDate
  ) -> anyhow::Result<DateTime<Utc>> {
    let midnight = date
      .and_hms_opt(0, 0, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct \
           midnight for {date}"
        )
      })?;
    self.to_utc(midnight, "midnight")
  }

  #[must_use]
  pub fn label(&self) -> String {
    match self {
      | Self::System => {
        "system".to_string()
      }
      | Self::Named(tz) => {
        tz.name().to_string()
      }
    }
  }
}

fn resolve_local_result<T>(
  result: LocalResult<DateTime<T>>,
  context: &str
) -> anyhow::Result<DateTime<Utc>>
where
  T: TimeZone,
  T::Offset: fmt::Display
{
  match result {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in display timezone: \
         {context}"
      ))
    }
  }
}

/// Picks the display zone: the
/// `PLANNER_TIMEZONE` env var, then the
/// configured id, then the system zone.
pub fn resolve_display_zone(
  configured: Option<&str>
) -> DisplayZone {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return DisplayZone::Named(tz);
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return DisplayZone::Named(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system zone"
  );
  DisplayZone::System
}

pub(crate) fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Canonical `YYYY-MM-DD` key of a
/// local calendar day.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
)]
#[serde(transparent)]
pub struct DateKey(String);

impl DateKey {
  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Borrow<str> for DateKey {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for DateKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<NaiveDate> for DateKey {
  fn from(date: NaiveDate) -> Self {
    format_date_key(date)
  }
}

#[must_use]
pub fn format_date_key(
  date: NaiveDate
) -> DateKey {
  DateKey(
    date.format("%Y-%m-%d").to_string()
  )
}

#[must_use]
pub fn date_key_for_instant(
  instant: DateTime<Utc>,
  zone: &DisplayZone
) -> DateKey {
  format_date_key(zone.date_of(instant))
}

/// `HH:MM`, 24-hour, in the display
/// zone.
#[must_use]
pub fn format_event_time(
  instant: DateTime<Utc>,
  zone: &DisplayZone
) -> String {
  zone
    .time_of(instant)
    .format("%H:%M")
    .to_string()
}

#[must_use]
pub fn today_key(
  now: DateTime<Utc>,
  zone: &DisplayZone
) -> DateKey {
  date_key_for_instant(now, zone)
}

#[must_use]
pub fn current_year(
  now: DateTime<Utc>,
  zone: &DisplayZone
) -> i32 {
  zone.date_of(now).year()
}

#[must_use]
pub fn monday_on_or_before(
  date: NaiveDate
) -> NaiveDate {
  let back = i64::from(
    date.weekday().num_days_from_monday()
  );
  date
    .checked_sub_signed(Duration::days(
      back
    ))
    .unwrap_or(date)
}

#[must_use]
pub fn sunday_on_or_after(
  date: NaiveDate
) -> NaiveDate {
  let forward = 6 - i64::from(
    date.weekday().num_days_from_monday()
  );
  date
    .checked_add_signed(Duration::days(
      forward
    ))
    .unwrap_or(date)
}

/// Signed whole days from `from` to
/// `to`.
#[must_use]
pub fn days_between(
  from: NaiveDate,
  to: NaiveDate
) -> i64 {
  to.signed_duration_since(from)
    .num_days()
}

/// Parses an event instant. Offsets
/// given in the input win; bare local
/// forms are read in the display zone.
#[tracing::instrument(skip_all, fields(input = raw))]
pub fn parse_instant(
  raw: &str,
  zone: &DisplayZone
) -> anyhow::Result<DateTime<Utc>> {
  let token = raw.trim();
  if token.is_empty() {
    return Err(anyhow!(
      "empty datetime value"
    ));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y%m%dT%H%M%SZ"
    )
  {
    return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return zone.to_utc(ndt, fmt);
    }
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return zone
      .local_midnight(date)
      .context("date-only value");
  }

  Err(anyhow!(
    "unrecognized datetime: {raw}"
  ))
  .with_context(|| {
    "supported formats: RFC3339, \
     YYYYMMDDTHHMMSSZ, \
     YYYY-MM-DDTHH:MM[:SS], \
     YYYY-MM-DD HH:MM, YYYY-MM-DD"
  })
}

#[cfg(test)]
mod tests {
  use chrono::{
    Datelike,
    NaiveDate,
    TimeZone,
    Utc,
    Weekday
  };

  use super::{
    DisplayZone,
    date_key_for_instant,
    days_between,
    format_date_key,
    format_event_time,
    monday_on_or_before,
    parse_instant,
    parse_timezone,
    sunday_on_or_after
  };

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn date_key_is_zero_padded() {
    assert_eq!(
      format_date_key(date(2026, 2, 5))
        .as_str(),
      "2026-02-05"
    );
    assert_eq!(
      format_date_key(date(1, 1, 1))
        .as_str(),
      "0001-01-01"
    );
  }

  #[test]
  fn instant_keys_follow_display_zone()
  {
    let instant = Utc
      .with_ymd_and_hms(
        2024, 1, 2, 5, 30, 0
      )
      .single()
      .expect("valid instant");
    let utc = DisplayZone::Named(
      chrono_tz::UTC
    );
    let la = DisplayZone::Named(
      chrono_tz::America::Los_Angeles
    );
    assert_eq!(
      date_key_for_instant(instant, &utc)
        .as_str(),
      "2024-01-02"
    );
    assert_eq!(
      date_key_for_instant(instant, &la)
        .as_str(),
      "2024-01-01"
    );
    assert_eq!(
      format_event_time(instant, &la),
      "21:30"
    );
  }

  #[test]
  fn week_bounds_snap_to_monday_and_sunday()
  {
    // 2026-01-01 is a Thursday.
    let jan1 = date(2026, 1, 1);
    let monday =
      monday_on_or_before(jan1);
    assert_eq!(monday, date(2025, 12, 29));
    assert_eq!(
      monday.weekday(),
      Weekday::Mon
    );
    assert_eq!(
      monday_on_or_before(monday),
      monday
    );

    let dec31 = date(2026, 12, 31);
    let sunday =
      sunday_on_or_after(dec31);
    assert_eq!(sunday, date(2027, 1, 3));
    assert_eq!(
      sunday_on_or_after(sunday),
      sunday
    );
    assert_eq!(
      days_between(monday, jan1),
      3
    );
    assert_eq!(
      days_between(jan1, monday),
      -3
    );
  }

  #[test]
  fn parses_supported_instant_forms() {
    let zone = DisplayZone::Named(
      chrono_tz::Europe::Berlin
    );
    let expected = Utc
      .with_ymd_and_hms(
        2026, 2, 16, 8, 0, 0
      )
      .single()
      .expect("valid instant");

    for raw in [
      "2026-02-16T09:00:00+01:00",
      "2026-02-16T08:00:00Z",
      "20260216T080000Z",
      "2026-02-16T09:00",
      "2026-02-16 09:00"
    ] {
      assert_eq!(
        parse_instant(raw, &zone)
          .expect("parse instant"),
        expected,
        "input {raw}"
      );
    }

    let midnight =
      parse_instant("2026-02-16", &zone)
        .expect("parse date");
    assert_eq!(
      midnight,
      Utc
        .with_ymd_and_hms(
          2026, 2, 15, 23, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn rejects_garbage_instants() {
    let zone = DisplayZone::Named(
      chrono_tz::UTC
    );
    assert!(
      parse_instant("", &zone).is_err()
    );
    assert!(
      parse_instant("next tuesday", &zone)
        .is_err()
    );
  }

  #[test]
  fn skipped_local_time_is_an_error() {
    // Clocks jump from 02:00 to 03:00
    // in Berlin on 2026-03-29.
    let zone = DisplayZone::Named(
      chrono_tz::Europe::Berlin
    );
    assert!(
      parse_instant(
        "2026-03-29 02:30",
        &zone
      )
      .is_err()
    );
  }

  #[test]
  fn timezone_ids_are_validated() {
    assert_eq!(
      parse_timezone(
        " Europe/Berlin ",
        "test"
      ),
      Some(chrono_tz::Europe::Berlin)
    );
    assert_eq!(
      parse_timezone("Mars/Base", "test"),
      None
    );
    assert_eq!(
      parse_timezone("  ", "test"),
      None
    );
  }
}
