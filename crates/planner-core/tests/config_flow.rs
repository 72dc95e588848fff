use std::fs;

use planner_core::cli::EventArgs;
use planner_core::config::Config;
use planner_core::datetime::DisplayZone;
use planner_core::load_source;
use planner_core::sources::SourceFormat;
use tempfile::tempdir;

#[test]
fn config_file_drives_display_and_event_source() {
    let temp = tempdir().expect("tempdir");
    let events_path = temp.path().join("events.json");
    fs::write(
        &events_path,
        r#"{
  "items": [
    {"id": "p1", "summary": "Offsite", "start": {"date": "2026-03-09"}, "end": {"date": "2026-03-11"}},
    {"id": "p2", "summary": "Dropped", "status": "cancelled",
     "start": {"dateTime": "2026-03-10T09:00:00Z"}, "end": {"dateTime": "2026-03-10T10:00:00Z"}},
    {"id": "p3", "summary": "Call", "colorId": "11",
     "start": {"dateTime": "2026-03-10T09:00:00+01:00"}, "end": {"dateTime": "2026-03-10T09:30:00+01:00"}}
  ]
}"#,
    )
    .expect("write events");

    let config_path = temp.path().join("planner.toml");
    fs::write(
        &config_path,
        format!(
            "timezone = \"UTC\"\n\n[display]\ncolor = false\ncell_width = 10\n\n[events]\nfile = {:?}\nsource = \"provider\"\n",
            events_path.display().to_string()
        ),
    )
    .expect("write config");

    let cfg = Config::load(Some(config_path.as_path())).expect("load config");
    assert_eq!(cfg.loaded_files, vec![config_path.clone()]);
    assert!(!cfg.display.color);
    assert_eq!(cfg.display.cell_width, 10);
    assert_eq!(cfg.events.source, SourceFormat::Provider);

    let zone = DisplayZone::Named(chrono_tz::UTC);
    let events = load_source(&cfg, &EventArgs::default(), &zone).expect("load events");
    let ids: Vec<&str> = events.iter().map(|event| event.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p3"]);

    let offsite = &events[0];
    assert!(offsite.is_all_day);
    assert_eq!(offsite.start.to_rfc3339(), "2026-03-09T00:00:00+00:00");
    assert_eq!(offsite.end.to_rfc3339(), "2026-03-11T00:00:00+00:00");

    let call = &events[1];
    assert_eq!(call.color, "#d50000");
    assert_eq!(call.start.to_rfc3339(), "2026-03-10T08:00:00+00:00");
}

#[test]
fn command_line_source_wins_over_config() {
    let temp = tempdir().expect("tempdir");
    let api_path = temp.path().join("api.json");
    fs::write(
        &api_path,
        r#"[{"id": "a1", "summary": "Review", "start": "2026-05-04T10:00:00Z", "end": "2026-05-04T11:00:00Z"}]"#,
    )
    .expect("write events");

    let mut cfg = Config::default();
    cfg.apply_overrides(vec![("events.source".to_string(), "provider".to_string())])
        .expect("override");

    let zone = DisplayZone::Named(chrono_tz::UTC);
    let args = EventArgs {
        events: Some(api_path),
        source: Some(SourceFormat::Auto),
        demo: false,
    };
    let events = load_source(&cfg, &args, &zone).expect("load events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].summary, "Review");

    let demo = EventArgs {
        demo: true,
        ..EventArgs::default()
    };
    assert_eq!(load_source(&cfg, &demo, &zone).expect("demo").len(), 6);
}

#[test]
fn problem_details_document_is_an_error() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("problem.json");
    fs::write(
        &path,
        r#"{"type": "about:blank", "title": "Bad Request", "status": 400, "detail": "invalid start query value, use RFC3339"}"#,
    )
    .expect("write problem");

    let args = EventArgs {
        events: Some(path),
        ..EventArgs::default()
    };
    let err = load_source(&Config::default(), &args, &DisplayZone::Named(chrono_tz::UTC))
        .expect_err("problem details");
    let message = format!("{err:#}");
    assert!(message.contains("400 Bad Request"));
    assert!(message.contains("invalid start query value"));
}

#[test]
fn missing_and_malformed_config_files_fail() {
    let temp = tempdir().expect("tempdir");
    assert!(Config::load(Some(temp.path().join("absent.toml").as_path())).is_err());

    let broken = temp.path().join("broken.toml");
    fs::write(&broken, "[display]\ncell_width = \"wide\"\n").expect("write config");
    let err = Config::load(Some(broken.as_path())).expect_err("bad type");
    assert!(format!("{err:#}").contains("failed to parse"));
}
