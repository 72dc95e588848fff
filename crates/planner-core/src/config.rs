use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use clap::ValueEnum;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::{
  DisplayZone,
  resolve_display_zone
};
use crate::sources::SourceFormat;

const CONFIG_ENV_VAR: &str =
  "PLANNER_CONFIG";
const CONFIG_DIR_NAME: &str = "planner";
const CONFIG_FILE_NAME: &str =
  "planner.toml";

const MIN_CELL_WIDTH: usize = 6;
const MAX_CELL_WIDTH: usize = 40;
const MAX_SHORT_ROWS: usize = 10;

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
#[serde(default)]
pub struct Config {
  pub timezone:     Option<String>,
  pub display:      DisplayConfig,
  pub events:       EventsConfig,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
#[serde(default)]
pub struct DisplayConfig {
  pub color:      bool,
  pub cell_width: usize,
  pub short_rows: usize
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Default,
  Deserialize,
)]
#[serde(default)]
pub struct EventsConfig {
  pub file:   Option<PathBuf>,
  pub source: SourceFormat
}

impl Default for Config {
  fn default() -> Self {
    Self {
      timezone:     None,
      display:      DisplayConfig::default(),
      events:       EventsConfig::default(),
      loaded_files: vec![]
    }
  }
}

impl Default for DisplayConfig {
  fn default() -> Self {
    Self {
      color:      true,
      cell_width: 12,
      short_rows: 2
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(override_path)?
    else {
      warn!(
        "no planner config found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    info!(config = %path.display(), "loading planner config");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;

    let mut cfg =
      Self::from_toml_str(&text)
        .with_context(|| {
          format!(
            "failed to parse {}",
            path.display()
          )
        })?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut cfg: Self =
      toml::from_str(text)?;
    cfg.sanitize();
    Ok(cfg)
  }

  fn sanitize(&mut self) {
    if self
      .timezone
      .as_deref()
      .is_some_and(|tz| tz.trim().is_empty())
    {
      self.timezone = None;
    }

    let width = self
      .display
      .cell_width
      .clamp(MIN_CELL_WIDTH, MAX_CELL_WIDTH);
    if width != self.display.cell_width
    {
      warn!(
        requested = self.display.cell_width,
        used = width,
        "cell width out of range"
      );
      self.display.cell_width = width;
    }

    if self.display.short_rows
      > MAX_SHORT_ROWS
    {
      warn!(
        requested = self.display.short_rows,
        used = MAX_SHORT_ROWS,
        "too many short-event rows"
      );
      self.display.short_rows =
        MAX_SHORT_ROWS;
    }
  }

  /// Applies `KEY=VALUE` overrides
  /// given on the command line. Unknown
  /// keys are ignored with a warning.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k.trim();
      let value = v.trim();
      debug!(key = %key, value = %value, "applying override");

      match key {
        | "timezone" => {
          self.timezone =
            Some(value.to_string());
        }
        | "display.color" => {
          self.display.color =
            parse_bool(value)
              .ok_or_else(|| {
                anyhow!(
                  "invalid \
                   display.color \
                   value: {value}"
                )
              })?;
        }
        | "display.cell_width" => {
          self.display.cell_width =
            value.parse().with_context(
              || {
                format!(
                  "invalid \
                   display.cell_width \
                   value: {value}"
                )
              }
            )?;
        }
        | "display.short_rows" => {
          self.display.short_rows =
            value.parse().with_context(
              || {
                format!(
                  "invalid \
                   display.short_rows \
                   value: {value}"
                )
              }
            )?;
        }
        | "events.file" => {
          self.events.file =
            Some(PathBuf::from(value));
        }
        | "events.source" => {
          self.events.source =
            SourceFormat::from_str(
              value, true
            )
            .map_err(|err| {
              anyhow!(
                "invalid events.source \
                 value: {err}"
              )
            })?;
        }
        | other => {
          warn!(key = %other, "unknown config override; ignoring");
        }
      }
    }

    self.sanitize();
    Ok(())
  }

  #[must_use]
  pub fn display_zone(
    &self
  ) -> DisplayZone {
    resolve_display_zone(
      self.timezone.as_deref()
    )
  }

  #[must_use]
  pub fn events_file(
    &self
  ) -> Option<PathBuf> {
    self
      .events
      .file
      .as_deref()
      .map(expand_tilde)
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(expand_tilde(path)));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if trimmed == "/dev/null" {
      return Ok(None);
    }
    if !trimmed.is_empty() {
      return Ok(Some(expand_tilde(
        Path::new(trimmed)
      )));
    }
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    debug!(
      "cannot determine config \
       directory"
    );
    return Ok(None);
  };
  let candidate = config_dir
    .join(CONFIG_DIR_NAME)
    .join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

pub(crate) fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
