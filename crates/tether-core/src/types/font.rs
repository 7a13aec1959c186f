#![forbid(unsafe_code)]

//! Font property type.
//!
//! Input is CSS-like shorthand: `[style] [weight] <size>px [family, ...]`,
//! e.g. `"italic bold 12px Arial, sans-serif"`. The wire form is
//! `{family: [...], size, weight, style}`.

use super::{DecodeContext, PropertyType, format_number};
use crate::bridge::{WireMap, WireValue};
use crate::error::ValueError;
use crate::value::Value;

pub const FONT: PropertyType = PropertyType::new("font", convert, encode, decode);

const STYLES: &[&str] = &["normal", "italic"];
const WEIGHTS: &[&str] = &["normal", "thin", "light", "medium", "bold", "black"];

/// Parsed font shorthand.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub style: String,
    pub weight: String,
    pub size: f64,
    pub family: Vec<String>,
}

impl FontSpec {
    /// Canonical shorthand: default style and weight are omitted.
    #[must_use]
    pub fn to_shorthand(&self) -> String {
        let mut out = String::new();
        for (token, default) in [(&self.style, "normal"), (&self.weight, "normal")] {
            if token != default {
                out.push_str(token);
                out.push(' ');
            }
        }
        out.push_str(&format_number(self.size));
        out.push_str("px");
        if !self.family.is_empty() {
            out.push(' ');
            out.push_str(&self.family.join(", "));
        }
        out
    }
}

/// Parse CSS-like font shorthand.
pub fn parse_font(input: &str) -> Result<FontSpec, ValueError> {
    let invalid = |why: &str| ValueError::invalid(format!("invalid font \"{input}\": {why}"));
    let mut style = None;
    let mut weight = None;
    let mut rest = input.trim();
    let size = loop {
        let (token, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if token.is_empty() {
            return Err(invalid("missing size"));
        }
        let lower = token.to_ascii_lowercase();
        rest = tail.trim_start();
        if let Some(px) = lower.strip_suffix("px") {
            let size: f64 = px.parse().map_err(|_| invalid("bad size"))?;
            if !(size.is_finite() && size >= 0.0) {
                return Err(invalid("bad size"));
            }
            break size;
        }
        // "normal" fills the style slot first, then the weight slot.
        if STYLES.contains(&lower.as_str()) && style.is_none() {
            style = Some(lower);
        } else if WEIGHTS.contains(&lower.as_str()) && weight.is_none() {
            weight = Some(lower);
        } else {
            return Err(invalid(&format!("unexpected \"{token}\"")));
        }
    };
    let family = rest
        .split(',')
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_owned())
        .filter(|f| !f.is_empty())
        .collect();
    Ok(FontSpec {
        style: style.unwrap_or_else(|| "normal".to_owned()),
        weight: weight.unwrap_or_else(|| "normal".to_owned()),
        size,
        family,
    })
}

fn convert(raw: &Value) -> Result<Value, ValueError> {
    match raw {
        Value::String(s) => Ok(Value::String(parse_font(s)?.to_shorthand())),
        other => Err(ValueError::unexpected("font", other)),
    }
}

fn encode(value: &Value) -> Result<WireValue, ValueError> {
    let Value::String(s) = value else {
        return Err(ValueError::unexpected("font", value));
    };
    let spec = parse_font(s)?;
    let mut map = WireMap::new();
    map.insert("family".into(), WireValue::from(spec.family));
    map.insert("size".into(), super::encode_number(spec.size)?);
    map.insert("weight".into(), WireValue::from(spec.weight));
    map.insert("style".into(), WireValue::from(spec.style));
    Ok(WireValue::Object(map))
}

fn decode(wire: &WireValue, _ctx: &DecodeContext<'_>) -> Value {
    let Some(map) = wire.as_object() else {
        return Value::Null;
    };
    let text = |key: &str| {
        map.get(key)
            .and_then(WireValue::as_str)
            .unwrap_or("normal")
            .to_owned()
    };
    let spec = FontSpec {
        style: text("style"),
        weight: text("weight"),
        size: map.get("size").and_then(WireValue::as_f64).unwrap_or(0.0),
        family: map
            .get("family")
            .and_then(WireValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(WireValue::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default(),
    };
    Value::String(spec.to_shorthand())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_shorthand() {
        let spec = parse_font("italic bold 12px Arial, \"Helvetica Neue\", sans-serif").unwrap();
        assert_eq!(spec.style, "italic");
        assert_eq!(spec.weight, "bold");
        assert_eq!(spec.size, 12.0);
        assert_eq!(spec.family, ["Arial", "Helvetica Neue", "sans-serif"]);
    }

    #[test]
    fn size_only() {
        let spec = parse_font("16px").unwrap();
        assert_eq!(spec.style, "normal");
        assert!(spec.family.is_empty());
    }

    #[test]
    fn rejects_missing_or_bad_size() {
        assert!(parse_font("bold Arial").is_err());
        assert!(parse_font("bold -3px Arial").is_err());
        assert!(parse_font("wavy 12px").is_err());
    }

    #[test]
    fn convert_normalizes_and_encode_structures() {
        let value = FONT.convert(&"BOLD   14px  serif".into()).unwrap();
        assert_eq!(value, Value::from("bold 14px serif"));
        assert_eq!(
            FONT.encode(&value).unwrap(),
            json!({"family": ["serif"], "size": 14, "weight": "bold", "style": "normal"})
        );
    }

    #[test]
    fn decode_restores_shorthand() {
        let wire = json!({"family": ["mono"], "size": 10, "weight": "normal", "style": "italic"});
        assert_eq!(
            FONT.decode(&wire, &DecodeContext::detached()),
            Value::from("italic 10px mono")
        );
    }
}
