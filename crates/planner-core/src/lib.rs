pub mod cli;
pub mod color;
pub mod config;
pub mod datetime;
pub mod event;
pub mod grid;
pub mod lanes;
pub mod render;
pub mod sources;
pub mod week;

use std::ffi::OsString;
use std::io::{
  self,
  Write
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  NaiveDate,
  Utc
};
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

use crate::cli::{
  Command,
  EventArgs
};
use crate::config::Config;
use crate::datetime::DisplayZone;
use crate::event::{
  CalendarEvent,
  EventWindow
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting planner"
  );
  debug!(?cli.overrides, "command line overrides");

  let mut cfg =
    Config::load(cli.config.as_deref())?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;

  let zone = cfg.display_zone();
  let now = Utc::now();
  let renderer =
    render::Renderer::new(&cfg)
      .with_today(zone.date_of(now));
  let mut out = io::stdout().lock();

  match cli.command {
    | Command::Grid {
      year,
      source,
      json
    } => {
      let year = grid::resolve_year_param(
        year.as_deref(),
        datetime::current_year(now, &zone)
      );
      let window =
        EventWindow::for_year(year, &zone)?;
      let events = event::filter_events(
        load_source(&cfg, &source, &zone)?,
        &window
      );
      let layout =
        week::build_year_render_data(
          year, &events, &zone
        );

      if json {
        serde_json::to_writer_pretty(
          &mut out, &layout
        )
        .context(
          "failed to write layout JSON"
        )?;
        writeln!(out)?;
      } else {
        renderer.write_year_grid(
          &mut out, &layout, &zone
        )?;
      }
    }
    | Command::Weeks {
      year
    } => {
      let year = grid::resolve_year_param(
        year.as_deref(),
        datetime::current_year(now, &zone)
      );
      let weeks =
        grid::build_year_weeks(year);
      let labels =
        grid::build_month_start_labels(
          &weeks
        );
      renderer.write_weeks(
        &mut out, year, &weeks, &labels
      )?;
    }
    | Command::Week {
      date,
      source
    } => {
      let date = NaiveDate::parse_from_str(
        date.trim(),
        "%Y-%m-%d"
      )
      .with_context(|| {
        format!(
          "invalid date {date:?}, use \
           YYYY-MM-DD"
        )
      })?;
      let target =
        grid::Week::containing(date)
          .ok_or_else(|| {
            anyhow!(
              "no calendar week contains \
               {date}"
            )
          })?;
      let events =
        load_source(&cfg, &source, &zone)?;
      let layout = week::WeekLayout {
        data: week::build_week_render_data(
          &target, &events, &zone
        ),
        week: target
      };
      renderer.write_week_detail(
        &mut out, &layout, &zone
      )?;
    }
    | Command::Events {
      source,
      from,
      until
    } => {
      let window = EventWindow::parse(
        from.as_deref(),
        until.as_deref()
      )?;
      let events = event::filter_events(
        load_source(&cfg, &source, &zone)?,
        &window
      );
      renderer.write_events(
        &mut out, &events, &zone
      )?;
    }
  }

  info!("done");
  Ok(())
}

/// Resolves the event list for a
/// command: `--demo`, then `--events`,
/// then `events.file` from the config.
#[tracing::instrument(skip_all)]
pub fn load_source(
  cfg: &Config,
  args: &EventArgs,
  zone: &DisplayZone
) -> anyhow::Result<Vec<CalendarEvent>> {
  if args.demo {
    debug!("using demo events");
    return Ok(
      sources::normalize_api_events(
        sources::demo_events(),
        zone
      )
    );
  }

  let format =
    args.source.unwrap_or(cfg.events.source);
  let Some(path) = args
    .events
    .clone()
    .or_else(|| cfg.events_file())
  else {
    warn!(
      "no events source given; the \
       calendar will be empty"
    );
    return Ok(vec![]);
  };

  let raw =
    sources::read_events_document(&path)?;
  sources::load_events(&raw, format, zone)
    .with_context(|| {
      format!(
        "failed to load events from {}",
        path.display()
      )
    })
}
