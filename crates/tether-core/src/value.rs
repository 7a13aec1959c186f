#![forbid(unsafe_code)]

//! Canonical in-process values and ordered property batches.
//!
//! [`Value`] is what application code reads and writes; [`WireValue`] is what
//! crosses the bridge. Property types convert between the two (see
//! [`crate::types`]); this module only provides the generic mapping used for
//! untyped payloads such as `call` parameters and event data.

use std::collections::BTreeMap;
use std::fmt;

use crate::bridge::{WireMap, WireValue};
use crate::error::ValueError;
use crate::object::NativeObject;
use crate::types::DecodeContext;

/// A canonical property or event value.
#[derive(Clone, Default)]
pub enum Value {
    /// No value. Returned for unusable reads (disposed object, unknown property).
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Reference to another live proxy.
    Object(NativeObject),
}

impl Value {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Object(_) => "object reference",
        }
    }

    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// `true` for both `Null` and `Undefined`.
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&NativeObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Look up `key` in a map value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Generic encoding: references become ids, `Undefined` becomes `null`.
    pub fn to_wire(&self) -> Result<WireValue, ValueError> {
        Ok(match self {
            Self::Undefined | Self::Null => WireValue::Null,
            Self::Bool(b) => WireValue::Bool(*b),
            Self::Number(n) => number_to_wire(*n)?,
            Self::String(s) => WireValue::String(s.clone()),
            Self::Array(items) => WireValue::Array(
                items
                    .iter()
                    .map(Value::to_wire)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Self::Map(map) => WireValue::Object(map_to_wire(map)?),
            Self::Object(obj) => {
                if obj.is_disposed() {
                    return Err(ValueError::DisposedReference(obj.id().clone()));
                }
                WireValue::String(obj.id().to_string())
            }
        })
    }

    /// Generic decoding. Strings are never resolved as object ids here; typed
    /// properties use their own decoder for that.
    #[must_use]
    pub fn from_wire(wire: &WireValue, _ctx: &DecodeContext<'_>) -> Self {
        Self::from_json(wire)
    }

    pub(crate) fn from_json(wire: &WireValue) -> Self {
        match wire {
            WireValue::Null => Self::Null,
            WireValue::Bool(b) => Self::Bool(*b),
            WireValue::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            WireValue::String(s) => Self::String(s.clone()),
            WireValue::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            WireValue::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Encode a number, using an integer representation when it is integral.
pub(crate) fn number_to_wire(n: f64) -> Result<WireValue, ValueError> {
    if !n.is_finite() {
        return Err(ValueError::invalid(format!("{n} is not a finite number")));
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Ok(WireValue::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(WireValue::Number)
        .ok_or_else(|| ValueError::invalid(format!("{n} is not a finite number")))
}

pub(crate) fn map_to_wire(map: &BTreeMap<String, Value>) -> Result<WireMap, ValueError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), v.to_wire()?)))
        .collect()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(obj) => write!(f, "Object({obj})"),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Object(obj) => write!(f, "{obj}"),
        }
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Self::Number(n as f64)
            }
        })*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<NativeObject> for Value {
    fn from(obj: NativeObject) -> Self {
        Self::Object(obj)
    }
}

impl From<&NativeObject> for Value {
    fn from(obj: &NativeObject) -> Self {
        Self::Object(obj.clone())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Properties: ordered batch for set/create/call
// ---------------------------------------------------------------------------

/// An ordered batch of named values.
///
/// Insertion order is kept; inserting an existing name replaces the value in
/// place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, Value)>,
}

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Generic encoding of every entry.
    pub fn to_wire(&self) -> Result<WireMap, ValueError> {
        self.entries
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.to_wire()?)))
            .collect()
    }
}

impl IntoIterator for Properties {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Properties {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}
