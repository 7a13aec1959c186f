#![forbid(unsafe_code)]

//! Property type system.
//!
//! A [`PropertyType`] bundles the three directional transforms of one kind of
//! property value:
//!
//! - `convert`: raw application input → canonical [`Value`], rejecting
//!   unsupported input with a descriptive [`ValueError`].
//! - `encode`: canonical value → [`WireValue`].
//! - `decode`: wire value → canonical value. Never fails; references to
//!   unknown ids decode to `Null`.
//!
//! Composite types (colors, fonts, images, bounds, layout data, proxy
//! references) define the triple once here so every property of that type
//! shares the same semantics.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown type name | typo in a class definition | [`ConfigError::UnknownType`] at build time |
//! | Duplicate registration | two types with one name | [`ConfigError::DuplicateType`] |
//! | Unsupported input | wrong kind of value | `convert` returns [`ValueError`] |

mod color;
mod font;
mod geometry;

use ahash::AHashMap;

use crate::bridge::WireValue;
use crate::error::{ConfigError, ValueError};
use crate::registry::Registry;
use crate::value::{Value, number_to_wire};

pub use color::{COLOR, parse_color};
pub use font::{FONT, FontSpec, parse_font};
pub use geometry::{BOUNDS, IMAGE, LAYOUT_DATA};

pub type ConvertFn = fn(&Value) -> Result<Value, ValueError>;
pub type EncodeFn = fn(&Value) -> Result<WireValue, ValueError>;
pub type DecodeFn = fn(&WireValue, &DecodeContext<'_>) -> Value;

/// Registry access for decoders that resolve object references.
#[derive(Clone, Copy)]
pub struct DecodeContext<'a> {
    registry: Option<&'a Registry>,
}

impl<'a> DecodeContext<'a> {
    #[must_use]
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// A context without registry; every reference decodes to `Null`.
    #[must_use]
    pub fn detached() -> Self {
        Self { registry: None }
    }

    /// Resolve an id to its live object, or `Null`.
    #[must_use]
    pub fn resolve(&self, id: &str) -> Value {
        self.registry
            .and_then(|registry| registry.find(id))
            .filter(|obj| !obj.is_disposed())
            .map_or(Value::Null, Value::Object)
    }
}

/// Named convert/encode/decode triple.
#[derive(Clone, Copy)]
pub struct PropertyType {
    name: &'static str,
    convert: ConvertFn,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl PropertyType {
    #[must_use]
    pub const fn new(
        name: &'static str,
        convert: ConvertFn,
        encode: EncodeFn,
        decode: DecodeFn,
    ) -> Self {
        Self {
            name,
            convert,
            encode,
            decode,
        }
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn convert(&self, raw: &Value) -> Result<Value, ValueError> {
        (self.convert)(raw)
    }

    pub fn encode(&self, value: &Value) -> Result<WireValue, ValueError> {
        (self.encode)(value)
    }

    #[must_use]
    pub fn decode(&self, wire: &WireValue, ctx: &DecodeContext<'_>) -> Value {
        (self.decode)(wire, ctx)
    }
}

impl std::fmt::Debug for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PropertyType").field(&self.name).finish()
    }
}

impl PartialEq for PropertyType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Named property types available to class definitions.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: AHashMap<&'static str, PropertyType>,
}

impl TypeRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in type.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for ty in [
            ANY,
            BOOLEAN,
            STRING,
            NUMBER,
            NATURAL,
            INTEGER,
            ARRAY,
            OBJECT,
            PROXY,
            COLOR,
            FONT,
            IMAGE,
            BOUNDS,
            LAYOUT_DATA,
        ] {
            registry.types.insert(ty.name(), ty);
        }
        registry
    }

    /// Add a type. Names are unique.
    pub fn register(&mut self, ty: PropertyType) -> Result<(), ConfigError> {
        if self.types.contains_key(ty.name()) {
            return Err(ConfigError::DuplicateType(ty.name()));
        }
        self.types.insert(ty.name(), ty);
        Ok(())
    }

    /// Look up a type by name.
    pub fn resolve(&self, name: &str) -> Result<PropertyType, ConfigError> {
        self.types
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownType(name.to_owned()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Scalar and container types
// ---------------------------------------------------------------------------

fn generic_encode(value: &Value) -> Result<WireValue, ValueError> {
    value.to_wire()
}

fn generic_decode(wire: &WireValue, ctx: &DecodeContext<'_>) -> Value {
    Value::from_wire(wire, ctx)
}

/// Accepts anything encodable.
pub const ANY: PropertyType = PropertyType::new(
    "any",
    |raw| {
        Ok(match raw {
            Value::Undefined => Value::Null,
            other => other.clone(),
        })
    },
    generic_encode,
    generic_decode,
);

pub const BOOLEAN: PropertyType = PropertyType::new(
    "boolean",
    |raw| match raw {
        Value::Bool(_) => Ok(raw.clone()),
        other => Err(ValueError::unexpected("boolean", other)),
    },
    generic_encode,
    generic_decode,
);

/// Scalars are stringified; containers and references are rejected.
pub const STRING: PropertyType = PropertyType::new(
    "string",
    |raw| match raw {
        Value::String(_) => Ok(raw.clone()),
        Value::Null => Ok(Value::String(String::new())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        Value::Number(n) if n.is_finite() => Ok(Value::String(format_number(*n))),
        other => Err(ValueError::unexpected("string", other)),
    },
    generic_encode,
    generic_decode,
);

/// Finite numbers, or strings that parse as one.
pub const NUMBER: PropertyType = PropertyType::new("number", convert_number, generic_encode, generic_decode);

/// Non-negative numbers, rounded.
pub const NATURAL: PropertyType = PropertyType::new(
    "natural",
    |raw| {
        let n = number_of(raw)?;
        if n < 0.0 {
            return Err(ValueError::invalid(format!("{n} is negative")));
        }
        Ok(Value::Number(n.round()))
    },
    generic_encode,
    generic_decode,
);

/// Numbers, rounded.
pub const INTEGER: PropertyType = PropertyType::new(
    "integer",
    |raw| Ok(Value::Number(number_of(raw)?.round())),
    generic_encode,
    generic_decode,
);

/// Arrays; `null` converts to an empty array.
pub const ARRAY: PropertyType = PropertyType::new(
    "array",
    |raw| match raw {
        Value::Array(_) => Ok(raw.clone()),
        Value::Null | Value::Undefined => Ok(Value::Array(Vec::new())),
        other => Err(ValueError::unexpected("array", other)),
    },
    generic_encode,
    generic_decode,
);

/// Plain maps.
pub const OBJECT: PropertyType = PropertyType::new(
    "object",
    |raw| match raw {
        Value::Map(_) => Ok(raw.clone()),
        other => Err(ValueError::unexpected("map", other)),
    },
    generic_encode,
    generic_decode,
);

/// Reference to another proxy. Encodes to its id; decodes by registry lookup.
pub const PROXY: PropertyType = PropertyType::new(
    "proxy",
    |raw| match raw {
        Value::Object(obj) if obj.is_disposed() => {
            Err(ValueError::DisposedReference(obj.id().clone()))
        }
        Value::Object(_) => Ok(raw.clone()),
        other => Err(ValueError::unexpected("object reference", other)),
    },
    generic_encode,
    |wire, ctx| match wire {
        WireValue::String(id) => ctx.resolve(id),
        _ => Value::Null,
    },
);

fn convert_number(raw: &Value) -> Result<Value, ValueError> {
    number_of(raw).map(Value::Number)
}

pub(crate) fn number_of(raw: &Value) -> Result<f64, ValueError> {
    let n = match raw {
        Value::Number(n) => *n,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ValueError::unexpected("number", raw))?,
        other => return Err(ValueError::unexpected("number", other)),
    };
    if n.is_finite() {
        Ok(n)
    } else {
        Err(ValueError::invalid(format!("{n} is not a finite number")))
    }
}

pub(crate) fn wire_number(wire: &WireValue) -> Option<f64> {
    wire.as_f64()
}

pub(crate) fn encode_number(n: f64) -> Result<WireValue, ValueError> {
    number_to_wire(n)
}

/// Integral numbers print without a fraction.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_registry_resolves_builtins() {
        let types = TypeRegistry::standard();
        for name in ["boolean", "color", "font", "image", "bounds", "layoutData", "proxy"] {
            assert_eq!(types.resolve(name).unwrap().name(), name);
        }
        assert_eq!(
            types.resolve("colour"),
            Err(ConfigError::UnknownType("colour".into()))
        );
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut types = TypeRegistry::standard();
        assert_eq!(types.register(BOOLEAN), Err(ConfigError::DuplicateType("boolean")));
    }

    #[test]
    fn number_accepts_numeric_strings() {
        assert_eq!(NUMBER.convert(&"2.5".into()).unwrap(), Value::from(2.5));
        assert!(NUMBER.convert(&"bad".into()).is_err());
        assert!(NUMBER.convert(&true.into()).is_err());
    }

    #[test]
    fn natural_rejects_negative_and_rounds() {
        assert_eq!(NATURAL.convert(&2.6.into()).unwrap(), Value::from(3));
        assert!(NATURAL.convert(&(-1).into()).is_err());
    }

    #[test]
    fn string_stringifies_scalars() {
        assert_eq!(STRING.convert(&3.into()).unwrap(), Value::from("3"));
        assert_eq!(STRING.convert(&0.5.into()).unwrap(), Value::from("0.5"));
        assert_eq!(STRING.convert(&false.into()).unwrap(), Value::from("false"));
        assert!(STRING.convert(&Value::Array(vec![])).is_err());
    }

    #[test]
    fn boolean_is_strict() {
        assert!(BOOLEAN.convert(&1.into()).is_err());
        assert_eq!(BOOLEAN.encode(&true.into()).unwrap(), json!(true));
    }

    #[test]
    fn proxy_decodes_unknown_id_to_null() {
        let ctx = DecodeContext::detached();
        assert_eq!(PROXY.decode(&json!("$99"), &ctx), Value::Null);
        assert_eq!(PROXY.decode(&json!(null), &ctx), Value::Null);
    }
}
