#![forbid(unsafe_code)]

//! Static property and event descriptors for one native type.
//!
//! A [`NativeClass`] is built once per concrete type through
//! [`ClassBuilder`] and validated eagerly: every configuration mistake is a
//! [`ConfigError`] at definition time, never a surprise at first use.
//!
//! # Invariants
//!
//! 1. Exactly one of {has default, `READONLY`, `NOCACHE`} holds per property.
//! 2. `READONLY` excludes `NULLABLE`, `CONST` and a choice list.
//! 3. Defaults and choice members are stored already converted and are
//!    encodable.
//! 4. Every `changes` link names a declared property.
//!
//! # Example
//!
//! ```ignore
//! let class = NativeClass::builder("Widget")
//!     .property("selection", PropertySpec::new("boolean").default(false))
//!     .property("bounds", PropertySpec::new("bounds").readonly())
//!     .event("select", EventSpec::native().changes("selection"))
//!     .build(&TypeRegistry::standard())?;
//! ```

use std::borrow::Cow;
use std::rc::Rc;

use ahash::AHashMap;
use bitflags::bitflags;

use crate::bridge::WireValue;
use crate::error::{ConfigError, ValueError};
use crate::types::{DecodeContext, PropertyType, TypeRegistry};
use crate::value::{Properties, Value};

bitflags! {
    /// Property modifier flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// No setter; the value comes from the peer.
        const READONLY = 1 << 0;
        /// Settable exactly once (initial properties count).
        const CONST = 1 << 1;
        /// `null` is accepted without type conversion.
        const NULLABLE = 1 << 2;
        /// Never cached; every read queries the peer.
        const NOCACHE = 1 << 3;
        /// The first set fires a change event even when the value equals the
        /// default.
        const ALWAYS_FIRE_ON_FIRST_SET = 1 << 4;
    }
}

/// Name of the change event of `property`.
#[must_use]
pub fn change_event_name(property: &str) -> String {
    format!("{property}Changed")
}

/// Property named by a change event, if `event_type` is one.
#[must_use]
pub fn changed_property(event_type: &str) -> Option<&str> {
    event_type
        .strip_suffix("Changed")
        .filter(|property| !property.is_empty())
}

// ---------------------------------------------------------------------------
// Property declarations
// ---------------------------------------------------------------------------

/// Unvalidated property declaration.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    type_name: Cow<'static, str>,
    default: Option<Value>,
    modifiers: Modifiers,
    choice: Option<Vec<Value>>,
}

impl PropertySpec {
    #[must_use]
    pub fn new(type_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            type_name: type_name.into(),
            default: None,
            modifiers: Modifiers::empty(),
            choice: None,
        }
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn readonly(self) -> Self {
        self.with(Modifiers::READONLY)
    }

    #[must_use]
    pub fn constant(self) -> Self {
        self.with(Modifiers::CONST)
    }

    #[must_use]
    pub fn nullable(self) -> Self {
        self.with(Modifiers::NULLABLE)
    }

    #[must_use]
    pub fn nocache(self) -> Self {
        self.with(Modifiers::NOCACHE)
    }

    #[must_use]
    pub fn always_fire_on_first_set(self) -> Self {
        self.with(Modifiers::ALWAYS_FIRE_ON_FIRST_SET)
    }

    /// Restrict values to a closed set.
    #[must_use]
    pub fn choice<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.choice = Some(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with(mut self, modifiers: Modifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    fn resolve(self, name: &str, types: &TypeRegistry) -> Result<PropertyDescriptor, ConfigError> {
        let ty = types.resolve(&self.type_name)?;
        let m = self.modifiers;
        let invalid = |reason| ConfigError::InvalidModifiers {
            property: name.to_owned(),
            reason,
        };
        if m.contains(Modifiers::READONLY) {
            if m.contains(Modifiers::CONST) {
                return Err(invalid("readonly and const are exclusive"));
            }
            if m.contains(Modifiers::NULLABLE) {
                return Err(invalid("readonly and nullable are exclusive"));
            }
            if self.choice.is_some() {
                return Err(invalid("readonly properties cannot have a choice"));
            }
        }
        let sources = [
            self.default.is_some(),
            m.contains(Modifiers::READONLY),
            m.contains(Modifiers::NOCACHE),
        ];
        match sources.iter().filter(|set| **set).count() {
            0 => return Err(invalid("needs a default, readonly or nocache")),
            1 => {}
            _ => return Err(invalid("default, readonly and nocache are exclusive")),
        }

        let mut descriptor = PropertyDescriptor {
            name: name.to_owned(),
            change_event: change_event_name(name),
            ty,
            default: None,
            default_wire: None,
            modifiers: m,
            choice: None,
        };
        if let Some(choice) = self.choice {
            let converted = choice
                .iter()
                .map(|value| ty.convert(value))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| ConfigError::InvalidChoice {
                    property: name.to_owned(),
                    source,
                })?;
            descriptor.choice = Some(converted);
        }
        if let Some(default) = self.default {
            let invalid_default = |source| ConfigError::InvalidDefault {
                property: name.to_owned(),
                source,
            };
            let converted = descriptor.convert(&default).map_err(invalid_default)?;
            let wire = descriptor.encode(&converted).map_err(invalid_default)?;
            descriptor.default = Some(converted);
            descriptor.default_wire = Some(wire);
        }
        Ok(descriptor)
    }
}

/// Validated property declaration.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    name: String,
    change_event: String,
    ty: PropertyType,
    default: Option<Value>,
    default_wire: Option<WireValue>,
    modifiers: Modifiers,
    choice: Option<Vec<Value>>,
}

impl PropertyDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<name>Changed`.
    #[must_use]
    pub fn change_event(&self) -> &str {
        &self.change_event
    }

    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.ty
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub(crate) fn default_wire(&self) -> Option<&WireValue> {
        self.default_wire.as_ref()
    }

    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    #[must_use]
    pub fn is(&self, modifier: Modifiers) -> bool {
        self.modifiers.contains(modifier)
    }

    #[must_use]
    pub fn choice(&self) -> Option<&[Value]> {
        self.choice.as_deref()
    }

    /// Type conversion, honoring `NULLABLE` and the choice list.
    pub fn convert(&self, raw: &Value) -> Result<Value, ValueError> {
        if raw.is_nullish() && self.is(Modifiers::NULLABLE) {
            return Ok(Value::Null);
        }
        let converted = self.ty.convert(raw)?;
        if let Some(choice) = &self.choice {
            if !choice.contains(&converted) {
                let choices = choice
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ValueError::NotInChoice {
                    value: converted.to_string(),
                    choices: format!("[{choices}]"),
                });
            }
        }
        Ok(converted)
    }

    pub fn encode(&self, value: &Value) -> Result<WireValue, ValueError> {
        if value.is_nullish() && self.is(Modifiers::NULLABLE) {
            return Ok(WireValue::Null);
        }
        self.ty.encode(value)
    }

    #[must_use]
    pub fn decode(&self, wire: &WireValue, ctx: &DecodeContext<'_>) -> Value {
        if wire.is_null() && self.is(Modifiers::NULLABLE) {
            return Value::Null;
        }
        self.ty.decode(wire, ctx)
    }
}

// ---------------------------------------------------------------------------
// Event declarations
// ---------------------------------------------------------------------------

/// Pulls a property's new wire value out of a raw event payload.
pub type Extractor = fn(&WireValue) -> WireValue;

fn extract_value(payload: &WireValue) -> WireValue {
    payload.get("value").cloned().unwrap_or(WireValue::Null)
}

/// Unvalidated event declaration.
#[derive(Debug, Clone, Default)]
pub struct EventSpec {
    native: bool,
    wire_name: Option<Cow<'static, str>>,
    changes: Option<(Cow<'static, str>, Extractor)>,
}

impl EventSpec {
    /// An event that only exists in-process.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An event backed by native `listen`, under its own name on the wire.
    #[must_use]
    pub fn native() -> Self {
        Self {
            native: true,
            ..Self::default()
        }
    }

    /// Use a different wire name (implies native).
    #[must_use]
    pub fn wire_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.native = true;
        self.wire_name = Some(name.into());
        self
    }

    /// This event changes `property`; the new value is the payload's `value`.
    #[must_use]
    pub fn changes(self, property: impl Into<Cow<'static, str>>) -> Self {
        self.changes_with(property, extract_value)
    }

    /// This event changes `property`; `extract` pulls the new value.
    #[must_use]
    pub fn changes_with(
        mut self,
        property: impl Into<Cow<'static, str>>,
        extract: Extractor,
    ) -> Self {
        self.changes = Some((property.into(), extract));
        self
    }
}

/// Link from an event to the property it changes.
#[derive(Debug, Clone)]
pub struct ChangeLink {
    pub property: String,
    pub extract: Extractor,
}

/// Validated event declaration.
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    name: String,
    wire_name: Option<String>,
    changes: Option<ChangeLink>,
}

impl EventDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire name for native events, `None` for in-process ones.
    #[must_use]
    pub fn wire_name(&self) -> Option<&str> {
        self.wire_name.as_deref()
    }

    #[must_use]
    pub fn changes(&self) -> Option<&ChangeLink> {
        self.changes.as_ref()
    }
}

// ---------------------------------------------------------------------------
// NativeClass
// ---------------------------------------------------------------------------

/// Validated descriptor tables of one native type.
#[derive(Debug)]
pub struct NativeClass {
    type_name: String,
    properties: Vec<PropertyDescriptor>,
    property_index: AHashMap<String, usize>,
    events: Vec<EventDescriptor>,
    event_index: AHashMap<String, usize>,
    wire_index: AHashMap<String, usize>,
    set_order: Vec<String>,
}

impl NativeClass {
    #[must_use]
    pub fn builder(type_name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            type_name: type_name.into(),
            inherited: Vec::new(),
            inherited_events: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            set_order: Vec::new(),
        }
    }

    /// Start a subtype inheriting every descriptor of `self`.
    ///
    /// Declarations on the returned builder replace inherited ones of the
    /// same name.
    #[must_use]
    pub fn extend(&self, type_name: impl Into<String>) -> ClassBuilder {
        let mut builder = Self::builder(type_name);
        builder.inherited = self.properties.clone();
        builder.inherited_events = self.events.clone();
        builder.set_order = self.set_order.clone();
        builder
    }

    /// Native type name sent with `create`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.property_index.get(name).map(|&i| &self.properties[i])
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter()
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<&EventDescriptor> {
        self.event_index.get(name).map(|&i| &self.events[i])
    }

    /// Native event declared under `wire_name`.
    #[must_use]
    pub fn event_by_wire(&self, wire_name: &str) -> Option<&EventDescriptor> {
        self.wire_index.get(wire_name).map(|&i| &self.events[i])
    }

    pub fn events(&self) -> impl Iterator<Item = &EventDescriptor> {
        self.events.iter()
    }

    /// Events whose `changes` link names `property`.
    pub fn events_changing<'a>(
        &'a self,
        property: &'a str,
    ) -> impl Iterator<Item = &'a EventDescriptor> + 'a {
        self.events
            .iter()
            .filter(move |e| e.changes.as_ref().is_some_and(|l| l.property == property))
    }

    /// Reorder a batch: `set_order` properties first, in that order, then the
    /// rest in caller order.
    #[must_use]
    pub fn order_batch(&self, batch: Properties) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = batch.into_iter().collect();
        if !self.set_order.is_empty() {
            entries.sort_by_key(|(name, _)| {
                self.set_order
                    .iter()
                    .position(|ordered| ordered == name)
                    .unwrap_or(usize::MAX)
            });
        }
        entries
    }
}

/// Collects declarations for a [`NativeClass`].
#[derive(Debug)]
pub struct ClassBuilder {
    type_name: String,
    inherited: Vec<PropertyDescriptor>,
    inherited_events: Vec<EventDescriptor>,
    properties: Vec<(String, PropertySpec)>,
    events: Vec<(String, EventSpec)>,
    set_order: Vec<String>,
}

impl ClassBuilder {
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.push((name.into(), spec));
        self
    }

    #[must_use]
    pub fn event(mut self, name: impl Into<String>, spec: EventSpec) -> Self {
        self.events.push((name.into(), spec));
        self
    }

    /// Properties that must be applied before all others in a batch.
    #[must_use]
    pub fn set_order<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.set_order = names.into_iter().map(Into::into).collect();
        self
    }

    /// Validate every declaration against `types`.
    pub fn build(self, types: &TypeRegistry) -> Result<Rc<NativeClass>, ConfigError> {
        let mut own = AHashMap::new();
        let mut resolved = Vec::with_capacity(self.properties.len());
        for (name, spec) in self.properties {
            if own.insert(name.clone(), ()).is_some() {
                return Err(ConfigError::DuplicateProperty(name));
            }
            resolved.push(spec.resolve(&name, types)?);
        }
        let mut properties: Vec<PropertyDescriptor> = self
            .inherited
            .into_iter()
            .filter(|d| !own.contains_key(d.name()))
            .collect();
        properties.extend(resolved);
        let property_index: AHashMap<String, usize> = properties
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();

        let mut own_events = AHashMap::new();
        let mut declared = Vec::with_capacity(self.events.len());
        for (name, spec) in self.events {
            if own_events.insert(name.clone(), ()).is_some() {
                return Err(ConfigError::DuplicateEvent(name));
            }
            let changes = match spec.changes {
                Some((property, extract)) => {
                    if !property_index.contains_key(property.as_ref()) {
                        return Err(ConfigError::UnknownChangeTarget {
                            event: name,
                            property: property.into_owned(),
                        });
                    }
                    Some(ChangeLink {
                        property: property.into_owned(),
                        extract,
                    })
                }
                None => None,
            };
            let wire_name = spec
                .native
                .then(|| spec.wire_name.map_or_else(|| name.clone(), Cow::into_owned));
            declared.push(EventDescriptor {
                name,
                wire_name,
                changes,
            });
        }
        let mut events: Vec<EventDescriptor> = self
            .inherited_events
            .into_iter()
            .filter(|e| !own_events.contains_key(e.name()))
            .collect();
        events.extend(declared);

        let mut event_index = AHashMap::new();
        let mut wire_index = AHashMap::new();
        for (i, event) in events.iter().enumerate() {
            event_index.insert(event.name.clone(), i);
            if let Some(wire) = &event.wire_name {
                if wire_index.insert(wire.clone(), i).is_some() {
                    return Err(ConfigError::DuplicateEvent(wire.clone()));
                }
            }
        }

        for name in &self.set_order {
            if !property_index.contains_key(name) {
                return Err(ConfigError::UnknownOrderedProperty(name.clone()));
            }
        }

        Ok(Rc::new(NativeClass {
            type_name: self.type_name,
            properties,
            property_index,
            events,
            event_index,
            wire_index,
            set_order: self.set_order,
        }))
    }
}
