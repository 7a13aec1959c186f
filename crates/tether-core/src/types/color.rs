#![forbid(unsafe_code)]

//! Color property type.
//!
//! Accepted input: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
//! `rgba(r, g, b, a)`, named colors, `transparent`, or an array
//! `[r, g, b]` / `[r, g, b, a]` with alpha in `0..=255`.
//!
//! Wire form is always `[r, g, b, a]` with every channel in `0..=255`; the
//! decoded form is `#rrggbb` when opaque and `rgba(r, g, b, a)` with alpha
//! in `0..=1` otherwise.

use super::{PropertyType, format_number, wire_number};
use crate::bridge::WireValue;
use crate::error::ValueError;
use crate::value::Value;

pub const COLOR: PropertyType = PropertyType::new("color", convert, encode, decode);

const NAMED: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("silver", [192, 192, 192]),
    ("gray", [128, 128, 128]),
    ("white", [255, 255, 255]),
    ("maroon", [128, 0, 0]),
    ("red", [255, 0, 0]),
    ("purple", [128, 0, 128]),
    ("fuchsia", [255, 0, 255]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("olive", [128, 128, 0]),
    ("yellow", [255, 255, 0]),
    ("navy", [0, 0, 128]),
    ("blue", [0, 0, 255]),
    ("teal", [0, 128, 128]),
    ("aqua", [0, 255, 255]),
];

fn convert(raw: &Value) -> Result<Value, ValueError> {
    match raw {
        Value::String(s) => {
            parse_color(s)?;
            Ok(Value::String(s.trim().to_owned()))
        }
        Value::Array(items) => Ok(Value::String(format_color(channels_of(items)?))),
        other => Err(ValueError::unexpected("color", other)),
    }
}

fn encode(value: &Value) -> Result<WireValue, ValueError> {
    let rgba = match value {
        Value::String(s) => parse_color(s)?,
        Value::Array(items) => channels_of(items)?,
        other => return Err(ValueError::unexpected("color", other)),
    };
    Ok(WireValue::from(rgba.to_vec()))
}

fn decode(wire: &WireValue, _ctx: &super::DecodeContext<'_>) -> Value {
    let Some(items) = wire.as_array() else {
        return Value::Null;
    };
    let mut rgba = [0u8, 0, 0, 255];
    for (slot, item) in rgba.iter_mut().zip(items) {
        *slot = wire_number(item).map_or(0, |n| n.clamp(0.0, 255.0).round() as u8);
    }
    Value::String(format_color(rgba))
}

fn format_color([r, g, b, a]: [u8; 4]) -> String {
    if a == u8::MAX {
        return format!("#{r:02x}{g:02x}{b:02x}");
    }
    let alpha = (f64::from(a) / 255.0 * 1000.0).round() / 1000.0;
    format!("rgba({r}, {g}, {b}, {})", format_number(alpha))
}

fn channels_of(items: &[Value]) -> Result<[u8; 4], ValueError> {
    if !(3..=4).contains(&items.len()) {
        return Err(ValueError::invalid(format!(
            "color arrays need 3 or 4 channels, got {}",
            items.len()
        )));
    }
    let mut rgba = [0u8, 0, 0, 255];
    for (slot, item) in rgba.iter_mut().zip(items) {
        let n = item
            .as_f64()
            .ok_or_else(|| ValueError::unexpected("color channel", item))?;
        *slot = channel(n)?;
    }
    Ok(rgba)
}

fn channel(n: f64) -> Result<u8, ValueError> {
    if (0.0..=255.0).contains(&n) {
        Ok(n.round() as u8)
    } else {
        Err(ValueError::invalid(format!("color channel {n} out of range")))
    }
}

/// Parse a color string into `[r, g, b, a]`.
pub fn parse_color(input: &str) -> Result<[u8; 4], ValueError> {
    let s = input.trim();
    let invalid = || ValueError::invalid(format!("invalid color \"{input}\""));
    if s.eq_ignore_ascii_case("transparent") {
        return Ok([0, 0, 0, 0]);
    }
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(invalid);
    }
    let lower = s.to_ascii_lowercase();
    if let Some(args) = lower.strip_prefix("rgba(").and_then(|r| r.strip_suffix(')')) {
        return parse_functional(args, true).ok_or_else(invalid);
    }
    if let Some(args) = lower.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
        return parse_functional(args, false).ok_or_else(invalid);
    }
    NAMED
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, [r, g, b])| [*r, *g, *b, 255])
        .ok_or_else(invalid)
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some([nibble(0)?, nibble(1)?, nibble(2)?, 255]),
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

fn parse_functional(args: &str, with_alpha: bool) -> Option<[u8; 4]> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != if with_alpha { 4 } else { 3 } {
        return None;
    }
    let mut rgba = [0u8, 0, 0, 255];
    for (slot, part) in rgba.iter_mut().zip(&parts[..3]) {
        let n: f64 = part.parse().ok()?;
        *slot = channel(n).ok()?;
    }
    if with_alpha {
        let alpha: f64 = parts[3].parse().ok()?;
        if !(0.0..=1.0).contains(&alpha) {
            return None;
        }
        rgba[3] = (alpha * 255.0).round() as u8;
    }
    Some(rgba)
}
