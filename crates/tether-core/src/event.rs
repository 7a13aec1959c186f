#![forbid(unsafe_code)]

//! Event store and dispatcher.
//!
//! Every listener-bearing handle implements [`EventSource`]; the trait's
//! provided methods carry the whole `on`/`off`/`once`/`trigger` protocol and
//! only ask the implementor for its [`EventOwner`] and [`Session`].
//!
//! # Channels
//!
//! | Channel | Registered with | Receives | Counts toward activation |
//! |---------|-----------------|----------|--------------------------|
//! | public | [`EventSource::on`] | full [`Event`] | yes |
//! | internal (typed) | [`EventSource::on_internal`] | [`InternalEvent`] | yes |
//! | internal ([`WILDCARD`]) | `on_internal("*", ..)` | every [`InternalEvent`] | no |
//!
//! # Invariants
//!
//! 1. Listeners of one type fire in registration order; internal typed
//!    listeners fire after the public ones and wildcard listeners last.
//! 2. `(listener, context)` pairs are unique per type; a second `on` is a
//!    no-op.
//! 3. A listener removed during dispatch is not called later in the same
//!    dispatch; a `once` listener is removed before it is called.
//! 4. After every change to a type's listener set the owner is asked to
//!    re-derive activation from [`EventStore::has_listeners`].
//!
//! # Failure Modes
//!
//! - A listener returning [`Reply::Failed`], or a pending reply that later
//!   fails, is logged under `tether::event`; dispatch continues.
//! - `trigger` on a disposed owner is logged and ignored.
//! - `on` on a disposed owner is a [`UsageError::Disposed`]; `off` is a no-op.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use ahash::AHashMap;
use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use tracing::warn;

use crate::error::{BoxError, UsageError};
use crate::id::ObjectId;
use crate::logging::targets;
use crate::object::{NativeObject, ObjectInner};
use crate::session::Session;
use crate::value::Value;

/// Event type matching every event on the internal channel.
pub const WILDCARD: &str = "*";

const RESERVED_KEYS: [&str; 3] = ["type", "target", "timeStamp"];

/// Caller-supplied event fields.
pub type EventData = BTreeMap<String, Value>;

/// Event data holding a single `value` field.
#[must_use]
pub fn value_data(value: impl Into<Value>) -> EventData {
    EventData::from([("value".to_owned(), value.into())])
}

// ---------------------------------------------------------------------------
// Owners and targets
// ---------------------------------------------------------------------------

/// The state behind an event-bearing handle.
pub trait EventOwner: 'static {
    fn events(&self) -> &EventStore;

    fn is_disposed(&self) -> bool;

    /// The listener set of `event_type` changed.
    fn activation_changed(&self, _event_type: &str) {}

    /// Short label for log records, e.g. `Widget[$3]`.
    fn describe(&self) -> String;

    fn object_id(&self) -> Option<ObjectId> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// The object an event was dispatched on.
#[derive(Clone)]
pub struct EventTarget(Rc<dyn EventOwner>);

impl EventTarget {
    #[must_use]
    pub fn new(owner: Rc<dyn EventOwner>) -> Self {
        Self(owner)
    }

    #[must_use]
    pub fn id(&self) -> Option<ObjectId> {
        self.0.object_id()
    }

    #[must_use]
    pub fn is_same(&self, owner: &Rc<dyn EventOwner>) -> bool {
        same_rc(&self.0, owner)
    }

    /// The target as a peer proxy, if it is one.
    #[must_use]
    pub fn as_native(&self) -> Option<NativeObject> {
        self.0
            .as_any()
            .downcast_ref::<ObjectInner>()
            .and_then(ObjectInner::handle)
    }

    #[must_use]
    pub fn owner(&self) -> &Rc<dyn EventOwner> {
        &self.0
    }
}

impl PartialEq for EventTarget {
    fn eq(&self, other: &Self) -> bool {
        same_rc(&self.0, &other.0)
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventTarget({})", self.0.describe())
    }
}

fn same_rc<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a).cast::<()>(), Rc::as_ptr(b).cast::<()>())
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Outcome of a listener call.
pub enum Reply {
    Done,
    Failed(BoxError),
    /// Driven by the session executor; a failure is logged when it resolves.
    Pending(LocalBoxFuture<'static, Result<(), BoxError>>),
}

impl Reply {
    pub fn pending(fut: impl Future<Output = Result<(), BoxError>> + 'static) -> Self {
        Self::Pending(fut.boxed_local())
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Done
    }
}

impl<E: Into<BoxError>> From<Result<(), E>> for Reply {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(err) => Self::Failed(err.into()),
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Failed(err) => write!(f, "Failed({err})"),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A public-channel callback. Two listeners are equal iff they share the
/// same allocation, so keep a clone around to call `off` later.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event) -> Reply>);

impl Listener {
    pub fn new<R: Into<Reply>>(f: impl Fn(&Event) -> R + 'static) -> Self {
        Self(Rc::new(move |event| f(event).into()))
    }

    fn call(&self, event: &Event) -> Reply {
        (self.0)(event)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        same_rc(&self.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// Identity token grouping listeners, e.g. everything one component added.
#[derive(Clone)]
pub struct Context(Rc<dyn Any>);

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(()))
    }

    /// Use an existing allocation as the identity.
    #[must_use]
    pub fn of<T: 'static>(value: &Rc<T>) -> Self {
        Self(Rc::clone(value) as Rc<dyn Any>)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        same_rc(&self.0, &other.0)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// Minimal record delivered on the internal channel.
#[derive(Debug, Clone, Copy)]
pub struct InternalEvent<'a> {
    pub event_type: &'a str,
    pub target: &'a EventTarget,
    pub data: &'a EventData,
}

impl InternalEvent<'_> {
    #[must_use]
    pub fn value(&self) -> Value {
        self.data.get("value").cloned().unwrap_or_default()
    }
}

/// An internal-channel callback, compared by allocation like [`Listener`].
#[derive(Clone)]
pub struct InternalListener(Rc<dyn Fn(&InternalEvent<'_>)>);

impl InternalListener {
    pub fn new(f: impl Fn(&InternalEvent<'_>) + 'static) -> Self {
        Self(Rc::new(f))
    }
}

impl PartialEq for InternalListener {
    fn eq(&self, other: &Self) -> bool {
        same_rc(&self.0, &other.0)
    }
}

impl fmt::Debug for InternalListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternalListener({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A public-channel event.
///
/// A fresh `Event` is an uninitialized container: triggering it fills in
/// `type`, `target` and `timeStamp` in place. Triggering an event that was
/// already dispatched copies its data into a new container instead.
pub struct Event {
    event_type: String,
    target: Option<EventTarget>,
    time_stamp: Duration,
    data: EventData,
    initialized: bool,
    default_prevented: Cell<bool>,
}

impl Event {
    #[must_use]
    pub fn new(data: EventData) -> Self {
        Self {
            event_type: String::new(),
            target: None,
            time_stamp: Duration::ZERO,
            data: strip_reserved(data),
            initialized: false,
            default_prevented: Cell::new(false),
        }
    }

    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    #[must_use]
    pub fn target(&self) -> Option<&EventTarget> {
        self.target.as_ref()
    }

    /// Session-relative, strictly increasing across dispatches.
    #[must_use]
    pub fn time_stamp(&self) -> Duration {
        self.time_stamp
    }

    #[must_use]
    pub fn data(&self) -> &EventData {
        &self.data
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The `value` field, or `Undefined`.
    #[must_use]
    pub fn value(&self) -> Value {
        self.data.get("value").cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    fn prepare(self, event_type: &str, target: EventTarget, time_stamp: Duration) -> Self {
        let mut event = if self.initialized {
            Self::new(self.data)
        } else {
            self
        };
        event.event_type = event_type.to_owned();
        event.target = Some(target);
        event.time_stamp = time_stamp;
        event.initialized = true;
        event
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new(EventData::new())
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("target", &self.target)
            .field("time_stamp", &self.time_stamp)
            .field("data", &self.data)
            .finish()
    }
}

fn strip_reserved(mut data: EventData) -> EventData {
    for key in RESERVED_KEYS {
        data.remove(key);
    }
    data
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

struct Entry {
    listener: Listener,
    context: Option<Context>,
    once: bool,
    removed: Cell<bool>,
}

struct InternalEntry {
    listener: InternalListener,
    removed: Cell<bool>,
}

/// Per-owner listener tables. Mutated only through [`EventSource`].
#[derive(Default)]
pub struct EventStore {
    public: RefCell<AHashMap<String, Vec<Rc<Entry>>>>,
    internal: RefCell<AHashMap<String, Vec<Rc<InternalEntry>>>>,
}

impl EventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `event_type` has a public or internal typed listener.
    #[must_use]
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.public
            .borrow()
            .get(event_type)
            .is_some_and(|v| !v.is_empty())
            || self
                .internal
                .borrow()
                .get(event_type)
                .is_some_and(|v| !v.is_empty())
    }

    /// Number of public listeners of `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.public.borrow().get(event_type).map_or(0, Vec::len)
    }

    /// Event types with at least one public or internal typed listener.
    #[must_use]
    pub fn active_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.public.borrow().keys().cloned().collect();
        types.extend(
            self.internal
                .borrow()
                .keys()
                .filter(|k| k.as_str() != WILDCARD)
                .cloned(),
        );
        types.sort();
        types.dedup();
        types
    }

    fn add(&self, event_type: &str, listener: &Listener, context: Option<&Context>, once: bool) -> bool {
        let mut public = self.public.borrow_mut();
        let entries = public.entry(event_type.to_owned()).or_default();
        if entries
            .iter()
            .any(|e| e.listener == *listener && e.context.as_ref() == context)
        {
            return false;
        }
        entries.push(Rc::new(Entry {
            listener: listener.clone(),
            context: context.cloned(),
            once,
            removed: Cell::new(false),
        }));
        true
    }

    fn remove(&self, event_type: &str, listener: &Listener, context: Option<&Context>) -> bool {
        self.remove_where(event_type, |e| {
            e.listener == *listener && e.context.as_ref() == context
        })
    }

    fn remove_entry(&self, event_type: &str, entry: &Rc<Entry>) -> bool {
        self.remove_where(event_type, |e| std::ptr::eq(e, &**entry))
    }

    fn remove_where(&self, event_type: &str, matches: impl Fn(&Entry) -> bool) -> bool {
        let mut public = self.public.borrow_mut();
        let Some(entries) = public.get_mut(event_type) else {
            return false;
        };
        let Some(index) = entries.iter().position(|e| matches(e.as_ref())) else {
            return false;
        };
        entries.remove(index).removed.set(true);
        if entries.is_empty() {
            public.remove(event_type);
        }
        true
    }

    fn remove_context(&self, context: &Context) -> Vec<String> {
        let mut affected = Vec::new();
        let mut public = self.public.borrow_mut();
        for (event_type, entries) in public.iter_mut() {
            let before = entries.len();
            entries.retain(|e| {
                let keep = e.context.as_ref() != Some(context);
                if !keep {
                    e.removed.set(true);
                }
                keep
            });
            if entries.len() != before {
                affected.push(event_type.clone());
            }
        }
        public.retain(|_, entries| !entries.is_empty());
        affected.sort();
        affected
    }

    fn add_internal(&self, event_type: &str, listener: &InternalListener) -> bool {
        let mut internal = self.internal.borrow_mut();
        let entries = internal.entry(event_type.to_owned()).or_default();
        if entries.iter().any(|e| e.listener == *listener) {
            return false;
        }
        entries.push(Rc::new(InternalEntry {
            listener: listener.clone(),
            removed: Cell::new(false),
        }));
        true
    }

    fn remove_internal(&self, event_type: &str, listener: &InternalListener) -> bool {
        let mut internal = self.internal.borrow_mut();
        let Some(entries) = internal.get_mut(event_type) else {
            return false;
        };
        let Some(index) = entries.iter().position(|e| e.listener == *listener) else {
            return false;
        };
        entries.remove(index).removed.set(true);
        if entries.is_empty() {
            internal.remove(event_type);
        }
        true
    }

    fn snapshot(&self, event_type: &str) -> Vec<Rc<Entry>> {
        self.public
            .borrow()
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    fn internal_snapshot(&self, event_type: &str) -> Vec<Rc<InternalEntry>> {
        self.internal
            .borrow()
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every listener on both channels without activation callbacks.
    pub(crate) fn clear(&self) {
        for entry in self.public.take().into_values().flatten() {
            entry.removed.set(true);
        }
        for entry in self.internal.take().into_values().flatten() {
            entry.removed.set(true);
        }
    }
}

impl fmt::Debug for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let public: BTreeMap<String, usize> = self
            .public
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        let internal: BTreeMap<String, usize> = self
            .internal
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        f.debug_struct("EventStore")
            .field("public", &public)
            .field("internal", &internal)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventSource
// ---------------------------------------------------------------------------

/// Listener capability of an event-bearing handle.
pub trait EventSource {
    fn owner(&self) -> Rc<dyn EventOwner>;

    fn session(&self) -> &Session;

    fn is_disposed(&self) -> bool {
        self.owner().is_disposed()
    }

    fn listener_count(&self, event_type: &str) -> usize {
        self.owner().events().listener_count(event_type)
    }

    fn on(&self, event_type: &str, listener: &Listener) -> Result<(), UsageError> {
        self.on_with(event_type, listener, None)
    }

    fn on_with(
        &self,
        event_type: &str,
        listener: &Listener,
        context: Option<&Context>,
    ) -> Result<(), UsageError> {
        register(&self.owner(), event_type, listener, context, false)
    }

    /// Wrap `f` in a new [`Listener`], register it and return it for `off`.
    fn on_fn<R: Into<Reply>>(
        &self,
        event_type: &str,
        f: impl Fn(&Event) -> R + 'static,
    ) -> Result<Listener, UsageError>
    where
        Self: Sized,
    {
        let listener = Listener::new(f);
        self.on(event_type, &listener)?;
        Ok(listener)
    }

    fn once(&self, event_type: &str, listener: &Listener) -> Result<(), UsageError> {
        self.once_with(event_type, listener, None)
    }

    fn once_with(
        &self,
        event_type: &str,
        listener: &Listener,
        context: Option<&Context>,
    ) -> Result<(), UsageError> {
        register(&self.owner(), event_type, listener, context, true)
    }

    fn off(&self, event_type: &str, listener: &Listener) {
        self.off_with(event_type, listener, None);
    }

    fn off_with(&self, event_type: &str, listener: &Listener, context: Option<&Context>) {
        let owner = self.owner();
        if owner.events().remove(event_type, listener, context) {
            owner.activation_changed(event_type);
        }
    }

    /// Remove every public listener registered with `context`.
    fn off_all(&self, context: &Context) {
        let owner = self.owner();
        for event_type in owner.events().remove_context(context) {
            owner.activation_changed(&event_type);
        }
    }

    fn on_internal(&self, event_type: &str, listener: &InternalListener) {
        let owner = self.owner();
        if owner.is_disposed() {
            return;
        }
        if owner.events().add_internal(event_type, listener) && event_type != WILDCARD {
            owner.activation_changed(event_type);
        }
    }

    fn off_internal(&self, event_type: &str, listener: &InternalListener) {
        let owner = self.owner();
        if owner.events().remove_internal(event_type, listener) && event_type != WILDCARD {
            owner.activation_changed(event_type);
        }
    }

    fn trigger(&self, event_type: &str, data: EventData) {
        self.trigger_event(event_type, Event::new(data));
    }

    /// Dispatch `event` and hand it back so the caller can inspect
    /// [`Event::default_prevented`].
    fn trigger_event(&self, event_type: &str, event: Event) -> Event {
        let (event, pending) = dispatch(&self.owner(), self.session(), event_type, event);
        for fut in pending {
            let label = event_type.to_owned();
            self.session().spawn(fut.map(move |result| {
                if let Err(error) = result {
                    warn!(target: targets::EVENT, event_type = %label, %error, "pending listener result failed");
                }
            }));
        }
        event
    }

    /// Dispatch now; the returned future resolves once every pending
    /// listener result has settled.
    fn trigger_async(&self, event_type: &str, data: EventData) -> LocalBoxFuture<'static, Event> {
        let (event, pending) = dispatch(&self.owner(), self.session(), event_type, Event::new(data));
        let label = event_type.to_owned();
        async move {
            for result in future::join_all(pending).await {
                if let Err(error) = result {
                    warn!(target: targets::EVENT, event_type = %label, %error, "pending listener result failed");
                }
            }
            event
        }
        .boxed_local()
    }
}

fn register(
    owner: &Rc<dyn EventOwner>,
    event_type: &str,
    listener: &Listener,
    context: Option<&Context>,
    once: bool,
) -> Result<(), UsageError> {
    if owner.is_disposed() {
        return Err(UsageError::Disposed {
            id: owner
                .object_id()
                .unwrap_or_else(|| ObjectId::new(owner.describe())),
            operation: "listen",
        });
    }
    if owner.events().add(event_type, listener, context, once) {
        owner.activation_changed(event_type);
    }
    Ok(())
}

type Pending = LocalBoxFuture<'static, Result<(), BoxError>>;

fn dispatch(
    owner: &Rc<dyn EventOwner>,
    session: &Session,
    event_type: &str,
    event: Event,
) -> (Event, Vec<Pending>) {
    if owner.is_disposed() {
        warn!(target: targets::EVENT, event_type, object = %owner.describe(), "trigger on disposed object ignored");
        return (event, Vec::new());
    }
    let target = EventTarget::new(Rc::clone(owner));
    let event = event.prepare(event_type, target.clone(), session.time_stamp());
    let store = owner.events();

    let mut pending = Vec::new();
    for entry in store.snapshot(event_type) {
        if entry.removed.get() {
            continue;
        }
        if entry.once && store.remove_entry(event_type, &entry) {
            owner.activation_changed(event_type);
        }
        match entry.listener.call(&event) {
            Reply::Done => {}
            Reply::Failed(error) => {
                warn!(target: targets::EVENT, event_type, object = %owner.describe(), %error, "listener failed");
            }
            Reply::Pending(fut) => pending.push(fut),
        }
    }

    let record = InternalEvent {
        event_type,
        target: &target,
        data: event.data(),
    };
    let typed = store.internal_snapshot(event_type);
    let wildcard = if event_type == WILDCARD {
        Vec::new()
    } else {
        store.internal_snapshot(WILDCARD)
    };
    for entry in typed.iter().chain(&wildcard) {
        if !entry.removed.get() {
            (entry.listener.0)(&record);
        }
    }
    (event, pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBridge;

    struct Plain {
        events: EventStore,
        disposed: Cell<bool>,
        activations: RefCell<Vec<String>>,
    }

    impl EventOwner for Plain {
        fn events(&self) -> &EventStore {
            &self.events
        }

        fn is_disposed(&self) -> bool {
            self.disposed.get()
        }

        fn activation_changed(&self, event_type: &str) {
            self.activations.borrow_mut().push(format!(
                "{event_type}={}",
                self.events.has_listeners(event_type)
            ));
        }

        fn describe(&self) -> String {
            "Plain".into()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Handle {
        inner: Rc<Plain>,
        session: Session,
    }

    impl EventSource for Handle {
        fn owner(&self) -> Rc<dyn EventOwner> {
            self.inner.clone()
        }

        fn session(&self) -> &Session {
            &self.session
        }
    }

    fn handle() -> Handle {
        Handle {
            inner: Rc::new(Plain {
                events: EventStore::new(),
                disposed: Cell::new(false),
                activations: RefCell::new(Vec::new()),
            }),
            session: Session::new(RecordingBridge::new()),
        }
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> Listener {
        let log = Rc::clone(log);
        Listener::new(move |event: &Event| {
            log.borrow_mut().push(format!("{label}:{}", event.event_type()));
        })
    }

    #[test]
    fn on_is_idempotent_per_context() {
        let h = handle();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = recorder(&log, "a");
        let ctx = Context::new();
        h.on("tap", &l).unwrap();
        h.on("tap", &l).unwrap();
        h.on_with("tap", &l, Some(&ctx)).unwrap();
        assert_eq!(h.listener_count("tap"), 2);
        h.trigger("tap", EventData::new());
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn registration_order_then_internal_then_wildcard() {
        let h = handle();
        let log = Rc::new(RefCell::new(Vec::new()));
        let wild_log = Rc::clone(&log);
        h.on_internal(
            WILDCARD,
            &InternalListener::new(move |e| wild_log.borrow_mut().push(format!("*:{}", e.event_type))),
        );
        let typed_log = Rc::clone(&log);
        h.on_internal(
            "tap",
            &InternalListener::new(move |e| typed_log.borrow_mut().push(format!("i:{}", e.event_type))),
        );
        h.on("tap", &recorder(&log, "first")).unwrap();
        h.on("tap", &recorder(&log, "second")).unwrap();
        h.trigger("tap", EventData::new());
        assert_eq!(*log.borrow(), ["first:tap", "second:tap", "i:tap", "*:tap"]);
    }

    #[test]
    fn once_fires_once_and_is_removable_before() {
        let h = handle();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = recorder(&log, "once");
        h.once("tap", &l).unwrap();
        h.trigger("tap", EventData::new());
        h.trigger("tap", EventData::new());
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(h.listener_count("tap"), 0);

        h.once("tap", &l).unwrap();
        h.off("tap", &l);
        h.trigger("tap", EventData::new());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let h = Rc::new(handle());
        let log = Rc::new(RefCell::new(Vec::new()));
        let second = recorder(&log, "second");
        let remover = {
            let h = Rc::clone(&h);
            let second = second.clone();
            Listener::new(move |_: &Event| h.off("tap", &second))
        };
        h.on("tap", &remover).unwrap();
        h.on("tap", &second).unwrap();
        h.trigger("tap", EventData::new());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn activation_follows_listener_presence() {
        let h = handle();
        let l = Listener::new(|_: &Event| ());
        let i = InternalListener::new(|_| ());
        h.on("tap", &l).unwrap();
        h.on_internal("tap", &i);
        h.off("tap", &l);
        h.off_internal("tap", &i);
        h.on_internal(WILDCARD, &i);
        assert_eq!(
            *h.inner.activations.borrow(),
            ["tap=true", "tap=true", "tap=true", "tap=false"]
        );
    }

    #[test]
    fn off_all_removes_context_group() {
        let h = handle();
        let ctx = Context::new();
        let l = Listener::new(|_: &Event| ());
        h.on_with("tap", &l, Some(&ctx)).unwrap();
        h.on_with("resize", &l, Some(&ctx)).unwrap();
        h.on("tap", &l).unwrap();
        h.off_all(&ctx);
        assert_eq!(h.listener_count("tap"), 1);
        assert_eq!(h.listener_count("resize"), 0);
    }

    #[test]
    fn reserved_fields_are_authoritative() {
        let h = handle();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        h.on_fn("tap", move |e: &Event| {
            *sink.borrow_mut() = Some((e.event_type().to_owned(), e.data().clone()));
        })
        .unwrap();
        let data = EventData::from([
            ("type".to_owned(), Value::from("spoofed")),
            ("x".to_owned(), Value::from(3)),
        ]);
        h.trigger("tap", data);
        let (ty, data) = seen.borrow_mut().take().unwrap();
        assert_eq!(ty, "tap");
        assert_eq!(data, EventData::from([("x".to_owned(), Value::from(3))]));
    }

    #[test]
    fn initialized_events_are_copied() {
        let h = handle();
        let first = h.trigger_event("tap", Event::new(value_data(1)));
        let second = h.trigger_event("press", first);
        assert_eq!(second.event_type(), "press");
        assert_eq!(second.value(), Value::from(1));
        assert!(second.target().is_some_and(|t| t.is_same(&h.owner())));
    }

    #[test]
    fn time_stamps_increase() {
        let h = handle();
        let a = h.trigger_event("tap", Event::default());
        let b = h.trigger_event("tap", Event::default());
        assert!(b.time_stamp() > a.time_stamp());
    }

    #[test]
    #[tracing_test::traced_test]
    fn failing_listener_does_not_stop_dispatch() {
        let h = handle();
        let log = Rc::new(RefCell::new(Vec::new()));
        h.on_fn("tap", |_: &Event| Err::<(), _>("boom")).unwrap();
        h.on("tap", &recorder(&log, "after")).unwrap();
        h.trigger("tap", EventData::new());
        assert_eq!(*log.borrow(), ["after:tap"]);
        assert!(logs_contain("listener failed"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn pending_failures_are_logged_on_tick() {
        let h = handle();
        h.on_fn("tap", |_: &Event| {
            Reply::pending(async { Err::<(), BoxError>("late".into()) })
        })
        .unwrap();
        h.trigger("tap", EventData::new());
        h.session.tick();
        assert!(logs_contain("pending listener result failed"));
    }

    #[test]
    fn trigger_async_awaits_pending_results() {
        let h = handle();
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        h.on_fn("tap", move |_: &Event| {
            let flag = Rc::clone(&flag);
            Reply::pending(async move {
                flag.set(true);
                Ok(())
            })
        })
        .unwrap();
        let event = futures::executor::block_on(h.trigger_async("tap", EventData::new()));
        assert!(done.get());
        assert_eq!(event.event_type(), "tap");
    }

    #[test]
    #[tracing_test::traced_test]
    fn disposed_owner_guards() {
        let h = handle();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = recorder(&log, "l");
        h.on("tap", &l).unwrap();
        h.inner.disposed.set(true);
        h.trigger("tap", EventData::new());
        assert!(log.borrow().is_empty());
        assert!(logs_contain("trigger on disposed object ignored"));
        assert!(matches!(h.on("tap", &l), Err(UsageError::Disposed { .. })));
        h.off("tap", &l);
    }
}
