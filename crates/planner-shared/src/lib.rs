//! Wire shapes for the two event sources the planner reads: the
//! planner backend API and the external calendar provider. Instants
//! stay as raw strings here; parsing and validation happen when
//! `planner_core::sources` normalizes them.

use serde::{
  Deserialize,
  Serialize
};

/// One event as served by `GET /v1/events` on the planner backend.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ApiEvent {
  #[serde(default)]
  pub id:          Option<String>,
  #[serde(default)]
  pub summary:     Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub start:       Option<String>,
  #[serde(default)]
  pub end:         Option<String>,
  #[serde(default)]
  pub location:    Option<String>,
  #[serde(default)]
  pub color:       Option<String>
}

/// Start or end of a provider event. Timed events carry `dateTime`,
/// all-day events carry `date` with an exclusive end date.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEventTime {
  #[serde(default)]
  pub date_time: Option<String>,
  #[serde(default)]
  pub date:      Option<String>,
  #[serde(default)]
  pub time_zone: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEvent {
  #[serde(default)]
  pub id:          Option<String>,
  #[serde(default)]
  pub summary:     Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub location:    Option<String>,
  #[serde(default)]
  pub status:      Option<String>,
  #[serde(default)]
  pub html_link:   Option<String>,
  #[serde(default)]
  pub color_id:    Option<String>,
  #[serde(default)]
  pub start:       Option<ProviderEventTime>,
  #[serde(default)]
  pub end:         Option<ProviderEventTime>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ProviderEventList {
  #[serde(default)]
  pub items: Vec<ProviderEvent>
}

/// RFC 7807 error body returned by the backend instead of an event
/// list.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ProblemDetails {
  #[serde(rename = "type")]
  pub kind:   String,
  pub title:  String,
  pub status: u16,
  pub detail: String
}
