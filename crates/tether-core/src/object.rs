#![forbid(unsafe_code)]

//! Native-backed objects (peer proxies).
//!
//! A [`NativeObject`] is a cheap handle to one proxy. It owns the
//! create/get/set/call/destroy lifecycle of its native peer and synthesizes
//! `<property>Changed` events for its declared properties.
//!
//! # Lifecycle
//!
//! ```text
//! Constructed ──create──▶ Active ──dispose──▶ Disposing ──▶ Disposed
//! ```
//!
//! # Invariants
//!
//! 1. While not disposed, the session registry maps `id` to this object.
//! 2. `dispose` runs its sequence exactly once; re-entrant calls are no-ops.
//! 3. A cached property is authoritative; `NOCACHE` properties always query.
//! 4. Within a batch, each property's change event fires right after its own
//!    bridge `set`, before the next property is processed.
//! 5. A native event is listened to iff it, or the change event it feeds,
//!    has a listener. `destroy` releases native listeners on the peer, so
//!    dispose sends no balancing `listen(false)`.
//!
//! # Failure Modes
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | conversion/encoding failure | `warn!`, that property skipped |
//! | readonly write, second const write, unknown property | `warn!`, skipped |
//! | `set`/`get` on a disposed object | `warn!`, no-op / `Undefined` |
//! | `native_get`/`call` on a disposed object | [`UsageError::Disposed`] |

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};
use tracing::{debug, trace, warn};

use crate::bridge::{WireMap, WireValue};
use crate::class::{EventDescriptor, Modifiers, NativeClass, PropertyDescriptor, changed_property};
use crate::error::{Error, UsageError};
use crate::event::{EventData, EventOwner, EventSource, EventStore, value_data};
use crate::id::ObjectId;
use crate::logging::targets;
use crate::session::Session;
use crate::types::DecodeContext;
use crate::value::{Properties, Value};

/// Lifecycle phase of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Registered, native `create` not yet issued.
    Constructed,
    Active,
    Disposing,
    /// Terminal.
    Disposed,
}

struct Cached {
    value: Value,
    wire: WireValue,
}

#[derive(Default)]
struct ObjectState {
    cache: AHashMap<String, Cached>,
    set_once: AHashSet<String>,
}

type ReleaseHook = Box<dyn FnOnce(&NativeObject)>;

pub(crate) struct ObjectInner {
    this: Weak<ObjectInner>,
    id: ObjectId,
    serial: u64,
    class: Rc<NativeClass>,
    session: Session,
    phase: Cell<Phase>,
    state: RefCell<ObjectState>,
    events: EventStore,
    native_listening: RefCell<AHashSet<String>>,
    owned: RefCell<Vec<NativeObject>>,
    owners: RefCell<Vec<Weak<ObjectInner>>>,
    release_hooks: RefCell<Vec<ReleaseHook>>,
}

impl ObjectInner {
    pub(crate) fn handle(&self) -> Option<NativeObject> {
        self.this.upgrade().map(NativeObject)
    }

    /// Issue `listen` for `descriptor` if its wanted state flipped.
    fn sync_listen(&self, descriptor: &EventDescriptor) {
        let Some(wire) = descriptor.wire_name() else {
            return;
        };
        let want = self.events.has_listeners(descriptor.name())
            || descriptor.changes().is_some_and(|link| {
                self.class
                    .property(&link.property)
                    .is_some_and(|p| self.events.has_listeners(p.change_event()))
            });
        let flipped = {
            let mut listening = self.native_listening.borrow_mut();
            if want {
                listening.insert(wire.to_owned())
            } else {
                listening.remove(wire)
            }
        };
        if flipped {
            trace!(target: targets::BRIDGE, id = %self.id, event = wire, enabled = want, "listen");
            self.session.bridge().listen(&self.id, wire, want);
        }
    }
}

impl EventOwner for ObjectInner {
    fn events(&self) -> &EventStore {
        &self.events
    }

    fn is_disposed(&self) -> bool {
        self.phase.get() == Phase::Disposed
    }

    fn activation_changed(&self, event_type: &str) {
        if self.phase.get() == Phase::Disposed {
            return;
        }
        if let Some(descriptor) = self.class.event(event_type) {
            self.sync_listen(descriptor);
        }
        if let Some(property) = changed_property(event_type) {
            for descriptor in self.class.events_changing(property) {
                self.sync_listen(descriptor);
            }
        }
    }

    fn describe(&self) -> String {
        format!("{}[{}]", self.class.type_name(), self.id)
    }

    fn object_id(&self) -> Option<ObjectId> {
        Some(self.id.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handle to a peer proxy. Clones share the same proxy.
#[derive(Clone)]
pub struct NativeObject(Rc<ObjectInner>);

impl NativeObject {
    /// Create an object of `class` with default id and no initial properties.
    pub fn create(session: &Session, class: &Rc<NativeClass>) -> Result<Self, UsageError> {
        Self::builder(class).create(session)
    }

    #[must_use]
    pub fn builder(class: &Rc<NativeClass>) -> ObjectBuilder {
        ObjectBuilder {
            class: Rc::clone(class),
            id: None,
            attach: false,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.0.id
    }

    /// Native type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.0.class.type_name()
    }

    #[must_use]
    pub fn class(&self) -> &Rc<NativeClass> {
        &self.0.class
    }

    /// Creation serial within the session; orders [`Registry::live_objects`](crate::Registry::live_objects).
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.0.serial
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.0.phase.get()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.phase() == Phase::Disposed
    }

    #[must_use]
    pub fn is_disposing(&self) -> bool {
        self.phase() == Phase::Disposing
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn decode_context(&self) -> DecodeContext<'_> {
        DecodeContext::new(self.0.session.registry())
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    /// Set one property. Failures are reported and the write is skipped.
    pub fn set(&self, property: &str, value: impl Into<Value>) {
        if self.warn_if_disposed("set") {
            return;
        }
        self.apply(property, &value.into());
    }

    /// Set a batch, `set_order` properties first, then in caller order.
    pub fn set_all(&self, properties: impl Into<Properties>) {
        if self.warn_if_disposed("set") {
            return;
        }
        for (name, value) in self.0.class.order_batch(properties.into()) {
            if self.is_disposed() {
                break;
            }
            self.apply(&name, &value);
        }
    }

    fn apply(&self, name: &str, raw: &Value) {
        let Some(descriptor) = self.0.class.property(name) else {
            warn!(target: targets::OBJECT, object = %self, property = name, "unknown property, write skipped");
            return;
        };
        let value = match descriptor.convert(raw) {
            Ok(value) => value,
            Err(error) => {
                warn!(target: targets::OBJECT, object = %self, property = name, %error, "conversion failed, write skipped");
                return;
            }
        };
        if descriptor.is(Modifiers::READONLY) {
            warn!(target: targets::OBJECT, object = %self, property = name, "readonly property, write skipped");
            return;
        }
        let already_set = self.0.state.borrow().set_once.contains(name);
        if already_set && descriptor.is(Modifiers::CONST) {
            warn!(target: targets::OBJECT, object = %self, property = name, "const property already set, write skipped");
            return;
        }
        let wire = match descriptor.encode(&value) {
            Ok(wire) => wire,
            Err(error) => {
                warn!(target: targets::OBJECT, object = %self, property = name, %error, "encoding failed, write skipped");
                return;
            }
        };

        let nocache = descriptor.is(Modifiers::NOCACHE);
        let (cached, previous) = {
            let state = self.0.state.borrow();
            let cached = state.cache.get(name).map(|c| c.wire.clone());
            let previous = cached.clone().or_else(|| descriptor.default_wire().cloned());
            (cached, previous)
        };
        if !nocache && already_set && cached.as_ref() == Some(&wire) {
            return;
        }

        trace!(target: targets::BRIDGE, id = %self.0.id, property = name, value = %wire, "set");
        self.0.session.bridge().set(&self.0.id, name, &wire);
        let decoded = descriptor.decode(&wire, &self.decode_context());
        let fire = nocache
            || previous.as_ref() != Some(&wire)
            || (!already_set && descriptor.is(Modifiers::ALWAYS_FIRE_ON_FIRST_SET));
        {
            let mut state = self.0.state.borrow_mut();
            if !nocache {
                state.cache.insert(
                    name.to_owned(),
                    Cached {
                        value: decoded.clone(),
                        wire,
                    },
                );
            }
            state.set_once.insert(name.to_owned());
        }
        if fire {
            self.trigger(descriptor.change_event(), value_data(decoded));
        }
    }

    /// Current value of `property`.
    ///
    /// Returns `Undefined` with a report on a disposed object or an unknown
    /// property.
    #[must_use]
    pub fn get(&self, property: &str) -> Value {
        if self.warn_if_disposed("get") {
            return Value::Undefined;
        }
        let Some(descriptor) = self.0.class.property(property) else {
            warn!(target: targets::OBJECT, object = %self, property, "unknown property");
            return Value::Undefined;
        };
        if !descriptor.is(Modifiers::NOCACHE) {
            if let Some(cached) = self.0.state.borrow().cache.get(property) {
                return cached.value.clone();
            }
            if let Some(default) = descriptor.default_value() {
                return default.clone();
            }
        }
        self.query(descriptor)
    }

    /// Query the peer directly, bypassing the cache.
    pub fn native_get(&self, property: &str) -> Result<Value, UsageError> {
        self.ensure_alive("get")?;
        Ok(match self.0.class.property(property) {
            Some(descriptor) => self.query(descriptor),
            None => {
                let wire = self.0.session.bridge().get(&self.0.id, property);
                Value::from_wire(&wire, &self.decode_context())
            }
        })
    }

    fn query(&self, descriptor: &PropertyDescriptor) -> Value {
        trace!(target: targets::BRIDGE, id = %self.0.id, property = descriptor.name(), "get");
        let wire = self.0.session.bridge().get(&self.0.id, descriptor.name());
        descriptor.decode(&wire, &self.decode_context())
    }

    /// Invoke a native method and decode its reply.
    pub fn call(&self, method: &str, params: impl Into<Properties>) -> Result<Value, Error> {
        self.ensure_alive("call")?;
        let params = params.into().to_wire()?;
        trace!(target: targets::BRIDGE, id = %self.0.id, method, "call");
        let reply = self.0.session.bridge().call(&self.0.id, method, &params);
        Ok(Value::from_wire(&reply, &self.decode_context()))
    }

    // -----------------------------------------------------------------------
    // Ownership and disposal
    // -----------------------------------------------------------------------

    /// Dispose `child` together with this object. The child's native destroy
    /// is suppressed because destroying the parent implies it.
    ///
    /// A child disposed on its own drops out of this object's owned list.
    pub fn own(&self, child: &NativeObject) {
        if self.warn_if_disposed("own") || child.ptr_eq(self) {
            return;
        }
        if matches!(child.phase(), Phase::Disposing | Phase::Disposed) {
            return;
        }
        let mut owned = self.0.owned.borrow_mut();
        if !owned.iter().any(|o| o.ptr_eq(child)) {
            owned.push(child.clone());
            child.0.owners.borrow_mut().push(Rc::downgrade(&self.0));
        }
    }

    /// Run `hook` while this object is disposing, after the `dispose` event.
    pub fn on_release(&self, hook: impl FnOnce(&NativeObject) + 'static) {
        if self.warn_if_disposed("on_release") {
            return;
        }
        self.0.release_hooks.borrow_mut().push(Box::new(hook));
    }

    /// Destroy the native peer and end this object. Idempotent.
    pub fn dispose(&self) {
        self.dispose_inner(true);
    }

    fn dispose_inner(&self, destroy: bool) {
        if matches!(self.phase(), Phase::Disposing | Phase::Disposed) {
            return;
        }
        self.0.phase.set(Phase::Disposing);
        self.trigger("dispose", EventData::new());

        let hooks = self.0.release_hooks.take();
        for hook in hooks {
            hook(self);
        }
        let owned = self.0.owned.take();
        for child in owned {
            child.dispose_inner(false);
        }

        if destroy {
            trace!(target: targets::BRIDGE, id = %self.0.id, "destroy");
            self.0.session.bridge().destroy(&self.0.id);
        }
        self.0.session.registry().remove(self.0.id.as_str());
        self.0.phase.set(Phase::Disposed);
        self.0.state.take();
        self.0.events.clear();
        self.0.native_listening.borrow_mut().clear();
        for owner in self.0.owners.take() {
            if let Some(owner) = owner.upgrade() {
                owner.owned.borrow_mut().retain(|o| !o.ptr_eq(self));
            }
        }
        debug!(target: targets::OBJECT, object = %self, "disposed");
    }

    // -----------------------------------------------------------------------
    // Inbound notifications
    // -----------------------------------------------------------------------

    /// Route a native notification: apply the `changes` link first, then
    /// trigger the plain event.
    pub(crate) fn receive(&self, wire_event: &str, payload: &WireValue) {
        let Some(descriptor) = self.0.class.event_by_wire(wire_event) else {
            debug!(target: targets::SESSION, object = %self, event = wire_event, "undeclared native event dropped");
            return;
        };
        if let Some(link) = descriptor.changes() {
            if let Some(property) = self.0.class.property(&link.property) {
                self.store_inbound(property, (link.extract)(payload));
            }
        }
        if !self.is_disposed() {
            let data = self.decode_payload(payload);
            self.trigger(descriptor.name(), data);
        }
    }

    fn store_inbound(&self, descriptor: &PropertyDescriptor, wire: WireValue) {
        let name = descriptor.name();
        let value = descriptor.decode(&wire, &self.decode_context());
        let changed = if descriptor.is(Modifiers::NOCACHE) {
            true
        } else {
            let mut state = self.0.state.borrow_mut();
            let previous = state
                .cache
                .get(name)
                .map(|c| &c.wire)
                .or_else(|| descriptor.default_wire());
            let changed = previous != Some(&wire);
            state.cache.insert(
                name.to_owned(),
                Cached {
                    value: value.clone(),
                    wire,
                },
            );
            changed
        };
        if changed {
            self.trigger(descriptor.change_event(), value_data(value));
        }
    }

    fn decode_payload(&self, payload: &WireValue) -> EventData {
        let ctx = self.decode_context();
        match payload {
            WireValue::Null => EventData::new(),
            WireValue::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_wire(v, &ctx)))
                .collect(),
            other => value_data(Value::from_wire(other, &ctx)),
        }
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    fn warn_if_disposed(&self, operation: &'static str) -> bool {
        let disposed = self.is_disposed();
        if disposed {
            warn!(target: targets::OBJECT, object = %self, operation, "operation on disposed object ignored");
        }
        disposed
    }

    fn ensure_alive(&self, operation: &'static str) -> Result<(), UsageError> {
        if self.is_disposed() {
            return Err(UsageError::Disposed {
                id: self.0.id.clone(),
                operation,
            });
        }
        Ok(())
    }
}

impl EventSource for NativeObject {
    fn owner(&self) -> Rc<dyn EventOwner> {
        self.0.clone()
    }

    fn session(&self) -> &Session {
        &self.0.session
    }
}

impl PartialEq for NativeObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Display for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name(), self.0.id)
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("id", &self.0.id)
            .field("type", &self.type_name())
            .field("phase", &self.phase())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ObjectBuilder
// ---------------------------------------------------------------------------

/// Configures and creates one [`NativeObject`].
#[must_use]
pub struct ObjectBuilder {
    class: Rc<NativeClass>,
    id: Option<ObjectId>,
    attach: bool,
    properties: Properties,
}

impl ObjectBuilder {
    /// Use a fixed, well-known id (singleton system objects).
    pub fn id(mut self, id: impl Into<ObjectId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The native peer already exists: register without issuing `create`.
    /// Initial properties are sent as plain `set` calls.
    pub fn attach_existing(mut self) -> Self {
        self.attach = true;
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name, value);
        self
    }

    pub fn properties(mut self, properties: impl Into<Properties>) -> Self {
        let properties: Properties = properties.into();
        for (name, value) in properties {
            self.properties.insert(name, value);
        }
        self
    }

    /// Register the object, then issue `create` with the initial properties
    /// that converted and encoded successfully.
    pub fn create(self, session: &Session) -> Result<NativeObject, UsageError> {
        session.ensure_open()?;
        let class = self.class;
        let object = session.registry().register(self.id, |id, serial| {
            NativeObject(Rc::new_cyclic(|this| ObjectInner {
                this: this.clone(),
                id,
                serial,
                class: Rc::clone(&class),
                session: session.clone(),
                phase: Cell::new(Phase::Constructed),
                state: RefCell::new(ObjectState::default()),
                events: EventStore::new(),
                native_listening: RefCell::new(AHashSet::new()),
                owned: RefCell::new(Vec::new()),
                owners: RefCell::new(Vec::new()),
                release_hooks: RefCell::new(Vec::new()),
            }))
        })?;

        let mut initial = WireMap::new();
        for (name, raw) in class.order_batch(self.properties) {
            if let Some(wire) = object.initial_property(&name, &raw) {
                initial.insert(name, wire);
            }
        }
        let bridge = session.bridge();
        if self.attach {
            for (name, wire) in &initial {
                bridge.set(object.id(), name, wire);
            }
        } else {
            trace!(target: targets::BRIDGE, id = %object.id(), type_name = class.type_name(), "create");
            bridge.create(object.id(), class.type_name(), (!initial.is_empty()).then_some(&initial));
        }
        object.0.phase.set(Phase::Active);
        Ok(object)
    }
}

impl NativeObject {
    fn initial_property(&self, name: &str, raw: &Value) -> Option<WireValue> {
        let Some(descriptor) = self.0.class.property(name) else {
            warn!(target: targets::OBJECT, object = %self, property = name, "unknown initial property skipped");
            return None;
        };
        if descriptor.is(Modifiers::READONLY) {
            warn!(target: targets::OBJECT, object = %self, property = name, "readonly initial property skipped");
            return None;
        }
        let encoded = descriptor
            .convert(raw)
            .and_then(|value| descriptor.encode(&value));
        let wire = match encoded {
            Ok(wire) => wire,
            Err(error) => {
                warn!(target: targets::OBJECT, object = %self, property = name, %error, "invalid initial property skipped");
                return None;
            }
        };
        let mut state = self.0.state.borrow_mut();
        if !descriptor.is(Modifiers::NOCACHE) {
            let value = descriptor.decode(&wire, &self.decode_context());
            state.cache.insert(
                name.to_owned(),
                Cached {
                    value,
                    wire: wire.clone(),
                },
            );
        }
        state.set_once.insert(name.to_owned());
        Some(wire)
    }
}

impl fmt::Debug for ObjectBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBuilder")
            .field("type", &self.class.type_name())
            .field("id", &self.id)
            .field("attach", &self.attach)
            .field("properties", &self.properties.len())
            .finish()
    }
}
