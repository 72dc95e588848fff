//! Color tokens are opaque to the layout; this module turns them into
//! concrete channel values for renderers.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

pub const DEFAULT_EVENT_COLOR: &str = "#039be5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// CSS `rgba()` with the token's own alpha scaled by `opacity`.
    pub fn to_css(self, opacity: f32) -> String {
        let alpha = (f32::from(self.a) / 255.0) * opacity.clamp(0.0, 1.0);
        format!("rgba({}, {}, {}, {alpha:.2})", self.r, self.g, self.b)
    }
}

fn hex_color_re() -> Option<&'static Regex> {
    static HEX_COLOR: OnceLock<Option<Regex>> = OnceLock::new();
    HEX_COLOR
        .get_or_init(|| {
            Regex::new(r"^#?(?P<hex>[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
                .map_err(|err| tracing::error!(error = %err, "hex color regex failed to compile"))
                .ok()
        })
        .as_ref()
}

/// Accepts `#RGB`, `#RRGGBB` and `#RRGGBBAA`; the leading `#` is optional.
pub fn parse_color_token(token: &str) -> Option<Rgba> {
    let caps = hex_color_re()?.captures(token.trim())?;
    let hex = caps.name("hex")?.as_str();

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    let short = |idx: usize| {
        let digit = u8::from_str_radix(hex.get(idx..idx + 1)?, 16).ok()?;
        Some(digit * 17)
    };

    match hex.len() {
        3 => Some(Rgba {
            r: short(0)?,
            g: short(1)?,
            b: short(2)?,
            a: 255,
        }),
        6 => Some(Rgba {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
            a: 255,
        }),
        8 => Some(Rgba {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
            a: channel(6..8)?,
        }),
        _ => None,
    }
}

/// Like [`parse_color_token`] but falls back to the default event color.
pub fn resolve_color(token: &str) -> Rgba {
    parse_color_token(token)
        .or_else(|| parse_color_token(DEFAULT_EVENT_COLOR))
        .unwrap_or(Rgba {
            r: 3,
            g: 155,
            b: 229,
            a: 255,
        })
}

pub fn to_rgba_css(token: &str, opacity: f32) -> String {
    resolve_color(token).to_css(opacity)
}

/// Memo for [`resolve_color`] and [`to_rgba_css`], owned by whoever renders.
/// The terminal renderer uses the channel values; `rgba_css` serves
/// consumers that draw the JSON layout as HTML.
#[derive(Debug, Clone, Default)]
pub struct ColorCache {
    resolved: HashMap<String, Rgba>,
    entries: HashMap<(String, u32), String>,
}

impl ColorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rgba(&mut self, token: &str) -> Rgba {
        *self
            .resolved
            .entry(token.to_string())
            .or_insert_with(|| resolve_color(token))
    }

    pub fn rgba_css(&mut self, token: &str, opacity: f32) -> String {
        let rgba = self.rgba(token);
        self.entries
            .entry((token.to_string(), opacity.to_bits()))
            .or_insert_with(|| rgba.to_css(opacity))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
