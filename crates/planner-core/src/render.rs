use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::color::ColorCache;
use crate::config::Config;
use crate::datetime::{DateKey, DisplayZone, format_event_time};
use crate::event::{CalendarEvent, is_short_event};
use crate::grid::{MonthStartLabel, Week, is_in_year};
use crate::lanes::WeekBar;
use crate::week::{WeekLayout, WeekRenderData, YearLayout};

const CELL_GAP: &str = " ";
const ELLIPSIS: char = '…';

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    cell_width: usize,
    short_rows: usize,
    today: Option<NaiveDate>,
    colors: RefCell<ColorCache>,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.display.color && io::stdout().is_terminal(),
            cell_width: cfg.display.cell_width,
            short_rows: cfg.display.short_rows,
            today: None,
            colors: RefCell::new(ColorCache::new()),
        }
    }

    /// Highlights `today` in the day rows.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    #[tracing::instrument(skip_all, fields(year = layout.year, weeks = layout.weeks.len()))]
    pub fn write_year_grid<W: Write>(
        &self,
        out: &mut W,
        layout: &YearLayout<'_>,
        zone: &DisplayZone,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{}",
            self.paint(&format!("{} ({})", layout.year, layout.timezone), "1")
        )?;

        let header: Vec<String> = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
            .iter()
            .map(|name| fit(name, self.cell_width))
            .collect();
        writeln!(out, "{}", header.join(CELL_GAP).trim_end())?;

        for week in &layout.weeks {
            self.write_month_headers(out, &week.week, &layout.month_start_labels)?;
            self.write_day_row(out, &week.week, layout.year, &layout.month_start_labels)?;
            self.write_bar_rows(out, &week.data)?;
            self.write_short_rows(out, week, zone)?;
        }

        Ok(())
    }

    fn write_month_headers<W: Write>(
        &self,
        out: &mut W,
        week: &Week,
        labels: &BTreeMap<DateKey, MonthStartLabel>,
    ) -> anyhow::Result<()> {
        for (date, key) in week.days().iter().zip(week.date_keys()) {
            if let Some(label) = labels.get(&key) {
                let title = format!("{} {}", label.full, date.year());
                writeln!(out)?;
                writeln!(out, "{}", self.paint(&title, "1;4"))?;
            }
        }
        Ok(())
    }

    fn write_day_row<W: Write>(
        &self,
        out: &mut W,
        week: &Week,
        year: i32,
        labels: &BTreeMap<DateKey, MonthStartLabel>,
    ) -> anyhow::Result<()> {
        let cells: Vec<String> = week
            .days()
            .iter()
            .zip(week.date_keys())
            .map(|(date, key)| {
                let label = labels.get(&key);
                let text = match label {
                    Some(label) => format!("{} {}", label.short, date.day()),
                    None => date.day().to_string(),
                };
                let cell = fit(&text, self.cell_width);
                if self.today == Some(*date) {
                    self.paint(&cell, "7")
                } else if !is_in_year(*date, year) {
                    self.paint(&cell, "2")
                } else if label.is_some() {
                    self.paint(&cell, "1")
                } else {
                    cell
                }
            })
            .collect();
        writeln!(out, "{}", cells.join(CELL_GAP).trim_end())?;
        Ok(())
    }

    fn write_bar_rows<W: Write>(
        &self,
        out: &mut W,
        data: &WeekRenderData<'_>,
    ) -> anyhow::Result<()> {
        let lanes = data
            .week_bars
            .iter()
            .map(|bar| bar.lane + 1)
            .max()
            .unwrap_or(0);

        for lane in 0..lanes {
            let mut line = String::new();
            let mut day_idx = 0;
            for bar in data.week_bars.iter().filter(|bar| bar.lane == lane) {
                while day_idx < bar.start_idx {
                    line.push_str(&self.blank_cell());
                    day_idx += 1;
                }
                line.push_str(&self.bar_text(bar));
                line.push_str(CELL_GAP);
                day_idx = bar.end_idx + 1;
            }
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    fn write_short_rows<W: Write>(
        &self,
        out: &mut W,
        week: &WeekLayout<'_>,
        zone: &DisplayZone,
    ) -> anyhow::Result<()> {
        let keys = week.week.date_keys();

        for row in 0..self.short_rows {
            if keys
                .iter()
                .all(|key| week.data.short_events_on(key.as_str()).len() <= row)
            {
                break;
            }
            let cells: Vec<String> = keys
                .iter()
                .map(|key| match week.data.short_events_on(key.as_str()).get(row) {
                    Some(event) => {
                        let text =
                            format!("{} {}", format_event_time(event.start, zone), event.summary);
                        self.paint_event(&fit(&text, self.cell_width), &event.color)
                    }
                    None => fit("", self.cell_width),
                })
                .collect();
            writeln!(out, "{}", cells.join(CELL_GAP).trim_end())?;
        }

        // Hidden bars and short events that did not fit the rows above.
        let hidden: Vec<usize> = keys
            .iter()
            .map(|key| {
                week.data.overflow_on(key.as_str())
                    + week
                        .data
                        .short_events_on(key.as_str())
                        .len()
                        .saturating_sub(self.short_rows)
            })
            .collect();
        if hidden.iter().any(|&count| count > 0) {
            let cells: Vec<String> = hidden
                .iter()
                .map(|&count| {
                    if count == 0 {
                        fit("", self.cell_width)
                    } else {
                        self.paint(&fit(&format!("+{count} more"), self.cell_width), "2")
                    }
                })
                .collect();
            writeln!(out, "{}", cells.join(CELL_GAP).trim_end())?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(year = year, weeks = weeks.len()))]
    pub fn write_weeks<W: Write>(
        &self,
        out: &mut W,
        year: i32,
        weeks: &[Week],
        labels: &BTreeMap<DateKey, MonthStartLabel>,
    ) -> anyhow::Result<()> {
        let rows = weeks
            .iter()
            .enumerate()
            .map(|(idx, week)| {
                let starts = week
                    .date_keys()
                    .iter()
                    .filter_map(|key| labels.get(key))
                    .map(|label| label.full)
                    .collect::<Vec<_>>()
                    .join(", ");
                let monday = week.monday();
                let first = if is_in_year(monday, year) {
                    monday.to_string()
                } else {
                    self.paint(&monday.to_string(), "2")
                };
                vec![
                    (idx + 1).to_string(),
                    first,
                    week.sunday().to_string(),
                    starts,
                ]
            })
            .collect();

        write_table(out, &["Week", "Monday", "Sunday", "Month starts"], rows)
    }

    #[tracing::instrument(skip_all, fields(monday = %layout.week.monday()))]
    pub fn write_week_detail<W: Write>(
        &self,
        out: &mut W,
        layout: &WeekLayout<'_>,
        zone: &DisplayZone,
    ) -> anyhow::Result<()> {
        let days = layout.week.days();
        writeln!(
            out,
            "{}",
            self.paint(
                &format!("Week {} .. {}", layout.week.monday(), layout.week.sunday()),
                "1"
            )
        )?;

        writeln!(out)?;
        let bar_rows = layout
            .data
            .week_bars
            .iter()
            .map(|bar| {
                let mut flags = Vec::new();
                if bar.continues_from_previous_week {
                    flags.push("from previous week");
                }
                if bar.continues_to_next_week {
                    flags.push("into next week");
                }
                vec![
                    bar.lane.to_string(),
                    format!(
                        "{}-{}",
                        days[bar.start_idx].format("%a"),
                        days[bar.end_idx].format("%a")
                    ),
                    self.paint_event(&bar.event.id, &bar.event.color),
                    bar.event.summary.clone(),
                    flags.join(", "),
                ]
            })
            .collect();
        write_table(&mut *out, &["Lane", "Days", "Event", "Title", "Continues"], bar_rows)?;

        writeln!(out)?;
        let short_rows = layout
            .data
            .short_events_by_date_key
            .iter()
            .flat_map(|(key, events)| {
                events.iter().map(move |event| {
                    vec![
                        key.to_string(),
                        format!(
                            "{}-{}",
                            format_event_time(event.start, zone),
                            format_event_time(event.end, zone)
                        ),
                        self.paint_event(&event.id, &event.color),
                        event.summary.clone(),
                    ]
                })
            })
            .collect();
        write_table(&mut *out, &["Day", "Time", "Event", "Title"], short_rows)?;

        writeln!(out)?;
        let day_rows = days
            .iter()
            .zip(layout.week.date_keys())
            .map(|(date, key)| {
                vec![
                    date.format("%a").to_string(),
                    key.to_string(),
                    layout.data.active_on(key.as_str()).to_string(),
                    layout.data.overflow_on(key.as_str()).to_string(),
                ]
            })
            .collect();
        write_table(&mut *out, &["Day", "Date", "Active", "Overflow"], day_rows)
    }

    #[tracing::instrument(skip_all, fields(events = events.len()))]
    pub fn write_events<W: Write>(
        &self,
        out: &mut W,
        events: &[CalendarEvent],
        zone: &DisplayZone,
    ) -> anyhow::Result<()> {
        if events.is_empty() {
            writeln!(out, "No events.")?;
            return Ok(());
        }

        let stamp = |instant: DateTime<Utc>| {
            format!("{} {}", zone.date_of(instant), format_event_time(instant, zone))
        };
        let rows = events
            .iter()
            .map(|event| {
                let kind = if event.is_all_day {
                    "all-day"
                } else if is_short_event(event) {
                    "timed"
                } else {
                    "bar"
                };
                vec![
                    self.paint_event(&event.id, &event.color),
                    stamp(event.start),
                    stamp(event.end),
                    kind.to_string(),
                    event.summary.clone(),
                ]
            })
            .collect();

        write_table(out, &["ID", "Start", "End", "Kind", "Title"], rows)
    }

    fn blank_cell(&self) -> String {
        " ".repeat(self.cell_width + CELL_GAP.len())
    }

    fn bar_text(&self, bar: &WeekBar<'_>) -> String {
        let cells = bar.end_idx - bar.start_idx + 1;
        let width = cells * self.cell_width + (cells - 1) * CELL_GAP.len();
        let open = if bar.continues_from_previous_week { '<' } else { '[' };
        let close = if bar.continues_to_next_week { '>' } else { ']' };
        let inner = fit(&bar.event.summary, width.saturating_sub(2));
        self.paint_event(&format!("{open}{inner}{close}"), &bar.event.color)
    }

    fn paint_event(&self, text: &str, token: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        let rgba = self.colors.borrow_mut().rgba(token);
        self.paint(text, &format!("38;2;{};{};{}", rgba.r, rgba.g, rgba.b))
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Truncates `text` to `width` display columns, marking the cut with an
/// ellipsis, and pads the rest with spaces.
fn fit(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;

    if UnicodeWidthStr::width(text) <= width {
        out.push_str(text);
        used = UnicodeWidthStr::width(text);
    } else if width > 0 {
        let budget = width - 1;
        for ch in text.chars() {
            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
            if used + ch_width > budget {
                break;
            }
            out.push(ch);
            used += ch_width;
        }
        out.push(ELLIPSIS);
        used += 1;
    }

    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}"))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
            })
            .collect();
        writeln!(writer, "{}", cells.join(" ").trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Renderer, fit, strip_ansi};
    use crate::config::Config;
    use crate::event::tests::utc_zone;
    use crate::grid::{DAYS_PER_WEEK, Week, build_month_start_labels, build_year_weeks};
    use crate::sources::{demo_events, normalize_api_events};
    use crate::week::{WeekLayout, build_week_render_data, build_year_render_data};

    fn plain_renderer() -> Renderer {
        let mut cfg = Config::default();
        cfg.display.color = false;
        Renderer::new(&cfg)
    }

    fn render<F>(draw: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> anyhow::Result<()>,
    {
        let mut buf = Vec::new();
        draw(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn fit_truncates_and_pads() {
        assert_eq!(fit("ab", 4), "ab  ");
        assert_eq!(fit("Hackathon", 5), "Hack…");
        assert_eq!(fit("日本語", 4), "日… ");
        assert_eq!(fit("anything", 0), "");
    }

    #[test]
    fn strip_ansi_removes_escapes() {
        assert_eq!(strip_ansi("\x1b[1;4mFebruary\x1b[0m"), "February");
    }

    #[test]
    fn year_grid_draws_labels_bars_and_timed_events() {
        let zone = utc_zone();
        let events = normalize_api_events(demo_events(), &zone);
        let layout = build_year_render_data(2026, &events, &zone);

        let text = render(|buf| plain_renderer().write_year_grid(buf, &layout, &zone));

        assert!(text.starts_with("2026 (UTC)"));
        assert!(text.contains("January 2026"));
        assert!(text.contains("February 2026"));
        assert!(text.contains("Feb 1"));
        assert!(text.contains("[Hackathon"));
        assert!(text.contains("09:00 Sprin…"));
        // evt-5 runs from Feb 25 into the week of Mar 2.
        assert!(text.contains("<yet another"));
        assert!(!text.contains("more"));
    }

    #[test]
    fn colored_bars_use_the_event_token() {
        let zone = utc_zone();
        let events = normalize_api_events(demo_events(), &zone);
        let week = Week::containing(NaiveDate::from_ymd_opt(2026, 2, 16).expect("date"))
            .expect("week");
        let layout = WeekLayout {
            data: build_week_render_data(&week, &events, &zone),
            week,
        };

        let mut renderer = plain_renderer();
        renderer.color = true;
        let text = render(|buf| renderer.write_week_detail(buf, &layout, &zone));

        // evt-3 carries #54ca00ff.
        assert!(text.contains("\x1b[38;2;84;202;0mevt-3\x1b[0m"));
        assert!(strip_ansi(&text).contains("evt-3"));
    }

    #[test]
    fn hidden_short_events_are_counted() {
        let zone = utc_zone();
        let events = normalize_api_events(demo_events(), &zone);
        let week = Week::containing(NaiveDate::from_ymd_opt(2026, 2, 16).expect("date"))
            .expect("week");
        let layout = crate::week::YearLayout {
            year: 2026,
            timezone: zone.label(),
            month_start_labels: Default::default(),
            weeks: vec![WeekLayout {
                data: build_week_render_data(&week, &events, &zone),
                week,
            }],
        };

        let mut cfg = Config::default();
        cfg.display.color = false;
        cfg.display.short_rows = 0;
        let text = render(|buf| Renderer::new(&cfg).write_year_grid(buf, &layout, &zone));
        assert!(text.contains("+1 more"));
        assert!(!text.contains("09:00"));
    }

    #[test]
    fn weeks_listing_shows_padding_and_month_starts() {
        let weeks = build_year_weeks(2026);
        let labels = build_month_start_labels(&weeks);
        let text = render(|buf| plain_renderer().write_weeks(buf, 2026, &weeks, &labels));

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), weeks.len() + 2);
        assert!(lines[2].contains("2025-12-29"));
        assert!(lines[2].contains("January"));
        assert!(text.contains("2027-01-03"));
    }

    #[test]
    fn week_detail_lists_lanes_and_counts() {
        let zone = utc_zone();
        let events = normalize_api_events(demo_events(), &zone);
        let week = Week::containing(NaiveDate::from_ymd_opt(2026, 2, 19).expect("date"))
            .expect("week");
        let layout = WeekLayout {
            data: build_week_render_data(&week, &events, &zone),
            week,
        };

        let text = render(|buf| plain_renderer().write_week_detail(buf, &layout, &zone));
        assert!(text.starts_with("Week 2026-02-16 .. 2026-02-22"));
        assert!(text.contains("Tue-Sat"));
        assert!(text.contains("09:00-10:30"));

        let thursday = text
            .lines()
            .find(|line| line.contains("2026-02-19") && line.starts_with("Thu"))
            .expect("thursday row");
        let counts: Vec<&str> = thursday.split_whitespace().collect();
        assert_eq!(counts, vec!["Thu", "2026-02-19", "3", "0"]);
        assert_eq!(
            text.lines().filter(|line| line.starts_with("Mon ") || line.starts_with("Sun ")).count(),
            2
        );
        assert_eq!(layout.week.days().len(), DAYS_PER_WEEK);
    }

    #[test]
    fn events_listing_names_kinds() {
        let zone = utc_zone();
        let events = normalize_api_events(demo_events(), &zone);
        let text = render(|buf| plain_renderer().write_events(buf, &events, &zone));

        let evt1 = text.lines().find(|line| line.starts_with("evt-1")).expect("evt-1");
        assert!(evt1.contains("2026-02-16 09:00"));
        assert!(evt1.contains("timed"));
        let evt3 = text.lines().find(|line| line.starts_with("evt-3")).expect("evt-3");
        assert!(evt3.contains("bar"));

        let empty = render(|buf| plain_renderer().write_events(buf, &[], &zone));
        assert_eq!(empty, "No events.\n");
    }
}
