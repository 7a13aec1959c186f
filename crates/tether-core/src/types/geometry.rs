#![forbid(unsafe_code)]

//! Bounds, image and layout-data property types.

use std::collections::BTreeMap;

use super::{DecodeContext, PropertyType, encode_number, number_of, wire_number};
use crate::bridge::{WireMap, WireValue};
use crate::error::ValueError;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

const BOUNDS_KEYS: [&str; 4] = ["left", "top", "width", "height"];

/// `{left, top, width, height}`; wire form `[left, top, width, height]`.
pub const BOUNDS: PropertyType = PropertyType::new(
    "bounds",
    |raw| {
        let numbers = match raw {
            Value::Array(items) if items.len() == 4 => items
                .iter()
                .map(number_of)
                .collect::<Result<Vec<_>, _>>()?,
            Value::Map(map) => BOUNDS_KEYS
                .iter()
                .map(|key| number_of(map.get(*key).unwrap_or(&Value::Undefined)))
                .collect::<Result<Vec<_>, _>>()?,
            other => return Err(ValueError::unexpected("bounds", other)),
        };
        Ok(bounds_value(&numbers))
    },
    |value| {
        let map = value
            .as_map()
            .ok_or_else(|| ValueError::unexpected("bounds", value))?;
        let items = BOUNDS_KEYS
            .iter()
            .map(|key| encode_number(number_of(map.get(*key).unwrap_or(&Value::Undefined))?))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WireValue::Array(items))
    },
    |wire, _ctx| match wire.as_array() {
        Some(items) if items.len() == 4 => {
            let numbers: Vec<f64> = items.iter().map(|n| wire_number(n).unwrap_or(0.0)).collect();
            bounds_value(&numbers)
        }
        _ => Value::Null,
    },
);

fn bounds_value(numbers: &[f64]) -> Value {
    BOUNDS_KEYS
        .iter()
        .zip(numbers)
        .map(|(key, n)| (*key, Value::Number(*n)))
        .collect()
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// `{src, width?, height?, scale?}` (a bare string is the `src`); wire form
/// `[src, width, height, scale]` with `null` for absent entries.
pub const IMAGE: PropertyType = PropertyType::new("image", convert_image, encode_image, decode_image);

fn convert_image(raw: &Value) -> Result<Value, ValueError> {
    let map = match raw {
        Value::String(src) => {
            let mut map = BTreeMap::new();
            map.insert("src".to_owned(), Value::String(src.clone()));
            map
        }
        Value::Map(map) => map.clone(),
        other => return Err(ValueError::unexpected("image", other)),
    };
    match map.get("src") {
        Some(Value::String(src)) if !src.is_empty() => {}
        _ => return Err(ValueError::invalid("image needs a non-empty \"src\"")),
    }
    let mut out = BTreeMap::new();
    out.insert("src".to_owned(), map["src"].clone());
    for key in ["width", "height", "scale"] {
        match map.get(key) {
            None | Some(Value::Null | Value::Undefined) => {}
            Some(raw) => {
                let n = number_of(raw)?;
                if n < 0.0 || (key == "scale" && n == 0.0) {
                    return Err(ValueError::invalid(format!("image {key} {n} out of range")));
                }
                out.insert(key.to_owned(), Value::Number(n));
            }
        }
    }
    if out.contains_key("scale") && (out.contains_key("width") || out.contains_key("height")) {
        return Err(ValueError::invalid(
            "image \"scale\" cannot be combined with \"width\" or \"height\"",
        ));
    }
    Ok(Value::Map(out))
}

fn encode_image(value: &Value) -> Result<WireValue, ValueError> {
    let map = value
        .as_map()
        .ok_or_else(|| ValueError::unexpected("image", value))?;
    let mut items = vec![map.get("src").map_or(Ok(WireValue::Null), Value::to_wire)?];
    for key in ["width", "height", "scale"] {
        items.push(match map.get(key).and_then(Value::as_f64) {
            Some(n) => encode_number(n)?,
            None => WireValue::Null,
        });
    }
    Ok(WireValue::Array(items))
}

fn decode_image(wire: &WireValue, _ctx: &DecodeContext<'_>) -> Value {
    let Some(items) = wire.as_array() else {
        return Value::Null;
    };
    let Some(src) = items.first().and_then(WireValue::as_str) else {
        return Value::Null;
    };
    let mut map = BTreeMap::new();
    map.insert("src".to_owned(), Value::from(src));
    for (key, item) in ["width", "height", "scale"].into_iter().zip(items.iter().skip(1)) {
        if let Some(n) = wire_number(item) {
            map.insert(key.to_owned(), Value::Number(n));
        }
    }
    Value::Map(map)
}

// ---------------------------------------------------------------------------
// Layout data
// ---------------------------------------------------------------------------

const EDGE_KEYS: [&str; 4] = ["left", "right", "top", "bottom"];
const NUMERIC_KEYS: [&str; 4] = ["centerX", "centerY", "width", "height"];

/// Layout attributes.
///
/// Edges (`left`, `right`, `top`, `bottom`) take a number, a reference, or
/// `[reference, offset]`; `baseline` takes a reference; `centerX`, `centerY`,
/// `width` and `height` take numbers. References encode to ids.
pub const LAYOUT_DATA: PropertyType =
    PropertyType::new("layoutData", convert_layout, encode_layout, decode_layout);

fn convert_layout(raw: &Value) -> Result<Value, ValueError> {
    let map = match raw {
        Value::Map(map) => map,
        Value::Null | Value::Undefined => return Ok(Value::Null),
        other => return Err(ValueError::unexpected("layout data", other)),
    };
    let mut out = BTreeMap::new();
    for (key, value) in map {
        let converted = if EDGE_KEYS.contains(&key.as_str()) {
            convert_edge(value)?
        } else if NUMERIC_KEYS.contains(&key.as_str()) {
            Value::Number(number_of(value)?)
        } else if key == "baseline" {
            reference(value)?
        } else {
            return Err(ValueError::invalid(format!("unknown layout attribute \"{key}\"")));
        };
        out.insert(key.clone(), converted);
    }
    Ok(Value::Map(out))
}

fn convert_edge(value: &Value) -> Result<Value, ValueError> {
    match value {
        Value::Number(_) | Value::String(_) => Ok(Value::Number(number_of(value)?)),
        Value::Object(_) => reference(value),
        Value::Array(items) if items.len() == 2 => Ok(Value::Array(vec![
            reference(&items[0])?,
            Value::Number(number_of(&items[1])?),
        ])),
        other => Err(ValueError::unexpected("layout edge", other)),
    }
}

fn reference(value: &Value) -> Result<Value, ValueError> {
    match value {
        Value::Object(obj) if obj.is_disposed() => {
            Err(ValueError::DisposedReference(obj.id().clone()))
        }
        Value::Object(_) => Ok(value.clone()),
        other => Err(ValueError::unexpected("object reference", other)),
    }
}

fn encode_layout(value: &Value) -> Result<WireValue, ValueError> {
    match value {
        Value::Null | Value::Undefined => Ok(WireValue::Null),
        Value::Map(map) => {
            let encoded: WireMap = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), v.to_wire()?)))
                .collect::<Result<_, ValueError>>()?;
            Ok(WireValue::Object(encoded))
        }
        other => Err(ValueError::unexpected("layout data", other)),
    }
}

fn decode_layout(wire: &WireValue, ctx: &DecodeContext<'_>) -> Value {
    let Some(map) = wire.as_object() else {
        return Value::Null;
    };
    let decode_ref = |item: &WireValue| match item {
        WireValue::String(id) => ctx.resolve(id),
        other => Value::from_json(other),
    };
    map.iter()
        .map(|(key, item)| {
            let value = match item {
                WireValue::Array(pair) if pair.len() == 2 => Value::Array(vec![
                    decode_ref(&pair[0]),
                    Value::from_json(&pair[1]),
                ]),
                other => decode_ref(other),
            };
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bounds_accept_array_or_map() {
        let from_array = BOUNDS.convert(&Value::from(vec![1, 2, 3, 4])).unwrap();
        let from_map: Value = [("left", 1), ("top", 2), ("width", 3), ("height", 4)]
            .into_iter()
            .collect();
        assert_eq!(BOUNDS.convert(&from_map).unwrap(), from_array);
        assert_eq!(BOUNDS.encode(&from_array).unwrap(), json!([1, 2, 3, 4]));
        assert!(BOUNDS.convert(&Value::from(vec![1, 2])).is_err());
    }

    #[test]
    fn bounds_decode_from_wire_array() {
        let value = BOUNDS.decode(&json!([0, 0, 100.5, 20]), &DecodeContext::detached());
        assert_eq!(value.get("width"), Some(&Value::from(100.5)));
    }

    #[test]
    fn image_from_string_and_map() {
        let image = IMAGE.convert(&"icon.png".into()).unwrap();
        assert_eq!(IMAGE.encode(&image).unwrap(), json!(["icon.png", null, null, null]));

        let sized: Value = [("src", Value::from("a.png")), ("width", 10.into()), ("height", 20.into())]
            .into_iter()
            .collect();
        let sized = IMAGE.convert(&sized).unwrap();
        assert_eq!(IMAGE.encode(&sized).unwrap(), json!(["a.png", 10, 20, null]));
    }

    #[test]
    fn image_scale_excludes_size() {
        let bad: Value = [("src", Value::from("a.png")), ("width", 10.into()), ("scale", 2.into())]
            .into_iter()
            .collect();
        assert!(IMAGE.convert(&bad).is_err());
        assert!(IMAGE.convert(&"".into()).is_err());
    }

    #[test]
    fn image_decode_skips_nulls() {
        let value = IMAGE.decode(&json!(["b.png", null, null, 3]), &DecodeContext::detached());
        let expected: Value = [("src", Value::from("b.png")), ("scale", 3.into())]
            .into_iter()
            .collect();
        assert_eq!(value, expected);
    }

    #[test]
    fn layout_rejects_unknown_attributes() {
        let bad: Value = [("middle", 3)].into_iter().collect();
        assert!(LAYOUT_DATA.convert(&bad).is_err());
        let numbers: Value = [("left", 3), ("width", 40)].into_iter().collect();
        assert_eq!(
            LAYOUT_DATA.encode(&LAYOUT_DATA.convert(&numbers).unwrap()).unwrap(),
            json!({"left": 3, "width": 40})
        );
    }

    #[test]
    fn layout_unknown_reference_decodes_to_null() {
        let value = LAYOUT_DATA.decode(&json!({"left": ["$404", 8]}), &DecodeContext::detached());
        assert_eq!(
            value.get("left"),
            Some(&Value::Array(vec![Value::Null, Value::from(8)]))
        );
    }
}
