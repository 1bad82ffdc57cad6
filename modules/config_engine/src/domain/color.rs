//! RGBA colour values for the `color` schema type
//!
//! Colours are stored in the settings tree as their canonical string:
//! `#rrggbb` when opaque, `rgba(r, g, b, a)` otherwise.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// 0.0 (transparent) ..= 1.0 (opaque)
    pub alpha: f64,
}

const NAMED_COLORS: &[(&str, u32)] = &[
    ("black", 0x000000),
    ("white", 0xffffff),
    ("red", 0xff0000),
    ("green", 0x008000),
    ("lime", 0x00ff00),
    ("blue", 0x0000ff),
    ("yellow", 0xffff00),
    ("cyan", 0x00ffff),
    ("magenta", 0xff00ff),
    ("gray", 0x808080),
    ("grey", 0x808080),
    ("silver", 0xc0c0c0),
    ("maroon", 0x800000),
    ("navy", 0x000080),
    ("olive", 0x808000),
    ("orange", 0xffa500),
    ("purple", 0x800080),
    ("teal", 0x008080),
];

impl Color {
    pub fn from_rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red: channel(red),
            green: channel(green),
            blue: channel(blue),
            alpha: if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) },
        }
    }

    fn from_hex(hex: u32) -> Self {
        Self {
            red: ((hex >> 16) & 0xff) as u8,
            green: ((hex >> 8) & 0xff) as u8,
            blue: (hex & 0xff) as u8,
            alpha: 1.0,
        }
    }

    /// Parse a colour from a string or a `{red, green, blue, alpha}` object.
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse_str(s),
            Value::Object(map) => {
                let component = |key: &str, fallback: f64| {
                    map.get(key).map_or(fallback, |v| number_like(v).unwrap_or(0.0))
                };
                let alpha = map
                    .get("alpha")
                    .map_or(1.0, |v| number_like(v).unwrap_or(1.0));
                Some(Self::from_rgba(
                    component("red", 0.0),
                    component("green", 0.0),
                    component("blue", 0.0),
                    alpha,
                ))
            }
            _ => None,
        }
    }

    fn parse_str(input: &str) -> Option<Self> {
        let s = input.trim().to_ascii_lowercase();
        if s == "transparent" {
            return Some(Self::from_rgba(0.0, 0.0, 0.0, 0.0));
        }
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Some(args) = function_args(&s, "rgba").or_else(|| function_args(&s, "rgb")) {
            return match args.as_slice() {
                [r, g, b] => Some(Self::from_rgba(*r, *g, *b, 1.0)),
                [r, g, b, a] => Some(Self::from_rgba(*r, *g, *b, *a)),
                _ => None,
            };
        }
        if let Some(args) = function_args(&s, "hsla").or_else(|| function_args(&s, "hsl")) {
            return match args.as_slice() {
                [h, sat, l] => Some(hsl_to_rgb(*h, *sat, *l, 1.0)),
                [h, sat, l, a] => Some(hsl_to_rgb(*h, *sat, *l, *a)),
                _ => None,
            };
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, hex)| Self::from_hex(*hex))
    }

    pub fn to_hex_string(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    pub fn to_rgba_string(&self) -> String {
        format!(
            "rgba({}, {}, {}, {})",
            self.red, self.green, self.blue, self.alpha
        )
    }

    /// Canonical stored form
    pub fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha >= 1.0 {
            f.write_str(&self.to_hex_string())
        } else {
            f.write_str(&self.to_rgba_string())
        }
    }
}

fn channel(value: f64) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 255.0) as u8
    }
}

fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
            u32::from_str_radix(&expanded, 16).ok().map(Color::from_hex)
        }
        6 => u32::from_str_radix(hex, 16).ok().map(Color::from_hex),
        _ => None,
    }
}

/// Numeric arguments of `name(a, b, c)`; percentages keep their number.
fn function_args(s: &str, name: &str) -> Option<Vec<f64>> {
    let inner = s.strip_prefix(name)?.trim_start().strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(|arg| arg.trim().trim_end_matches('%').parse::<f64>().ok())
        .collect()
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64, alpha: f64) -> Color {
    let h = hue.rem_euclid(360.0) / 360.0;
    let s = (saturation / 100.0).clamp(0.0, 1.0);
    let l = (lightness / 100.0).clamp(0.0, 1.0);

    if s == 0.0 {
        let v = l * 255.0;
        return Color::from_rgba(v, v, v, alpha);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue_to_rgb = |mut t: f64| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };

    Color::from_rgba(
        hue_to_rgb(h + 1.0 / 3.0) * 255.0,
        hue_to_rgb(h) * 255.0,
        hue_to_rgb(h - 1.0 / 3.0) * 255.0,
        alpha,
    )
}
