#![forbid(unsafe_code)]

//! Property bindings between event sources.
//!
//! A [`Binding<T>`] reads a property (optionally transformed) on every
//! `get()`. [`sync_property`] pushes one property into another as it
//! changes, and [`TwoWayBinding`] does so in both directions.
//!
//! # Usage
//!
//! ```ignore
//! let label = bind_mapped(&slider, "selection", |v| format!("{v}%"));
//! assert_eq!(label.get(), "0%");
//!
//! let _link = TwoWayBinding::new(&slider, "selection", &model, "level");
//! slider.set("selection", 40);
//! assert_eq!(model.get("level"), Value::from(40));
//! ```
//!
//! # Invariants
//!
//! 1. `Binding::get()` always reads the current property value.
//! 2. `TwoWayBinding` prevents update cycles with a re-entrancy guard.
//! 3. Dropping a `TwoWayBinding` unsubscribes both directions.
//! 4. `BindingScope` releases its subscriptions in reverse registration
//!    order on `clear()` and on drop.
//!
//! # Failure Modes
//!
//! - Transform panic: propagates to the caller of `get()`.
//! - A value the target property rejects is reported by the target and the
//!   sides stay out of sync until the next valid change.
//! - Either side disposed: its change stream completes, so that direction
//!   stops propagating.

use std::cell::Cell;
use std::rc::Rc;

use tether_core::{EventSource, NativeObject, Value};

use super::observable::{Observable, Observer, Subscription};
use super::streams::{ChangeEvent, change_events};
use crate::data::ObservableData;

/// Read/write access to named properties of an event source.
pub trait PropertyAccess: EventSource + Clone + 'static {
    fn get_property(&self, name: &str) -> Value;

    fn set_property(&self, name: &str, value: Value);
}

impl PropertyAccess for NativeObject {
    fn get_property(&self, name: &str) -> Value {
        self.get(name)
    }

    fn set_property(&self, name: &str, value: Value) {
        self.set(name, value);
    }
}

impl PropertyAccess for ObservableData {
    fn get_property(&self, name: &str) -> Value {
        self.get(name)
    }

    fn set_property(&self, name: &str, value: Value) {
        self.set(name, value);
    }
}

// ---------------------------------------------------------------------------
// Binding<T>: one-way read binding
// ---------------------------------------------------------------------------

/// A read-only view of a property with an optional transform.
pub struct Binding<T> {
    eval: Rc<dyn Fn() -> T>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            eval: Rc::clone(&self.eval),
        }
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("value", &self.get())
            .finish()
    }
}

impl<T: 'static> Binding<T> {
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self { eval: Rc::new(f) }
    }

    #[must_use]
    pub fn get(&self) -> T {
        (self.eval)()
    }

    /// Apply a further transform.
    pub fn then<U: 'static>(self, f: impl Fn(T) -> U + 'static) -> Binding<U> {
        Binding {
            eval: Rc::new(move || f((self.eval)())),
        }
    }
}

/// Bind directly to `property` of `source`.
pub fn bind_property<S: PropertyAccess>(source: &S, property: &str) -> Binding<Value> {
    let (source, property) = (source.clone(), property.to_owned());
    Binding::new(move || source.get_property(&property))
}

/// Bind to `property` of `source` transformed by `map`.
pub fn bind_mapped<S: PropertyAccess, T: 'static>(
    source: &S,
    property: &str,
    map: impl Fn(&Value) -> T + 'static,
) -> Binding<T> {
    let (source, property) = (source.clone(), property.to_owned());
    Binding::new(move || map(&source.get_property(&property)))
}

fn property_changes<S: PropertyAccess>(source: &S, property: &str) -> Observable<Value> {
    let property = property.to_owned();
    change_events(source)
        .filter(move |change: &ChangeEvent| change.property == property)
        .map(|change| change.value)
}

/// Copy `property` of `source` into `target_property` of `target` now and on
/// every change.
pub fn sync_property<S: PropertyAccess, D: PropertyAccess>(
    source: &S,
    property: &str,
    target: &D,
    target_property: &str,
) -> Subscription {
    target.set_property(target_property, source.get_property(property));
    let (target, target_property) = (target.clone(), target_property.to_owned());
    property_changes(source, property)
        .subscribe(move |value: Value| target.set_property(&target_property, value))
}

// ---------------------------------------------------------------------------
// TwoWayBinding: bidirectional sync
// ---------------------------------------------------------------------------

/// Keeps two properties equal. Drop it to disconnect both directions.
pub struct TwoWayBinding {
    _a_to_b: Subscription,
    _b_to_a: Subscription,
}

impl TwoWayBinding {
    /// Initially `b` takes `a`'s value; afterwards changes to either side
    /// propagate to the other.
    pub fn new<A: PropertyAccess, B: PropertyAccess>(
        a: &A,
        a_property: &str,
        b: &B,
        b_property: &str,
    ) -> Self {
        b.set_property(b_property, a.get_property(a_property));
        let syncing = Rc::new(Cell::new(false));
        Self {
            _a_to_b: guarded(a, a_property, b, b_property, &syncing),
            _b_to_a: guarded(b, b_property, a, a_property, &syncing),
        }
    }
}

fn guarded<S: PropertyAccess, D: PropertyAccess>(
    source: &S,
    property: &str,
    target: &D,
    target_property: &str,
    syncing: &Rc<Cell<bool>>,
) -> Subscription {
    let (target, target_property) = (target.clone(), target_property.to_owned());
    let guard = Rc::clone(syncing);
    property_changes(source, property).subscribe(move |value: Value| {
        if !guard.replace(true) {
            target.set_property(&target_property, value);
            guard.set(false);
        }
    })
}

impl std::fmt::Debug for TwoWayBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoWayBinding").finish()
    }
}

// ---------------------------------------------------------------------------
// BindingScope: lifecycle management
// ---------------------------------------------------------------------------

/// Collects subscriptions for a logical scope (e.g. one screen).
#[derive(Default)]
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    pub fn subscribe<T: 'static>(
        &mut self,
        source: &Observable<T>,
        observer: impl Into<Observer<T>>,
    ) -> &mut Self {
        let sub = source.subscribe(observer);
        self.subscriptions.push(sub);
        self
    }

    /// [`sync_property`] held by this scope.
    pub fn sync<S: PropertyAccess, D: PropertyAccess>(
        &mut self,
        source: &S,
        property: &str,
        target: &D,
        target_property: &str,
    ) -> &mut Self {
        let sub = sync_property(source, property, target, target_property);
        self.subscriptions.push(sub);
        self
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything now; the scope stays usable.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            sub.unsubscribe();
        }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::reactive::{Subscriber, Teardown};
    use tether_core::testing::RecordingBridge;
    use tether_core::{NativeClass, PropertySpec, Session, TypeRegistry};

    fn slider(session: &Session) -> NativeObject {
        let class = NativeClass::builder("Slider")
            .property("selection", PropertySpec::new("natural").default(0))
            .build(&TypeRegistry::standard())
            .unwrap();
        NativeObject::create(session, &class).unwrap()
    }

    #[test]
    fn binding_reads_current_value() {
        let session = Session::new(RecordingBridge::new());
        let s = slider(&session);
        let b = bind_property(&s, "selection");
        assert_eq!(b.get(), Value::from(0));
        s.set("selection", 12);
        assert_eq!(b.get(), Value::from(12));
    }

    #[test]
    fn mapped_binding_and_then() {
        let session = Session::new(RecordingBridge::new());
        let s = slider(&session);
        let label = bind_mapped(&s, "selection", |v| format!("{v}%"));
        s.set("selection", 40);
        assert_eq!(label.get(), "40%");
        let len = label.then(|text| text.len());
        assert_eq!(len.get(), 3);
    }

    #[test]
    fn binding_new_custom() {
        let counter = Rc::new(Cell::new(0));
        let c = Rc::clone(&counter);
        let b = Binding::new(move || {
            c.set(c.get() + 1);
            c.get()
        });
        assert_eq!(b.get(), 1);
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn sync_property_copies_now_and_later() {
        let session = Session::new(RecordingBridge::new());
        let s = slider(&session);
        let model = ObservableData::new(&session);
        s.set("selection", 3);
        let sub = sync_property(&s, "selection", &model, "level");
        assert_eq!(model.get("level"), Value::from(3));
        s.set("selection", 9);
        assert_eq!(model.get("level"), Value::from(9));
        drop(sub);
        s.set("selection", 1);
        assert_eq!(model.get("level"), Value::from(9));
    }

    #[test]
    fn two_way_binding_syncs_both_directions() {
        let session = Session::new(RecordingBridge::new());
        let s = slider(&session);
        let model = ObservableData::new(&session);
        s.set("selection", 5);
        let link = TwoWayBinding::new(&s, "selection", &model, "level");
        assert_eq!(model.get("level"), Value::from(5));
        s.set("selection", 10);
        assert_eq!(model.get("level"), Value::from(10));
        model.set("level", 20);
        assert_eq!(s.get("selection"), Value::from(20));
        drop(link);
        model.set("level", 30);
        assert_eq!(s.get("selection"), Value::from(20));
    }

    #[test]
    fn two_way_binding_does_not_loop() {
        let session = Session::new(RecordingBridge::new());
        let a = ObservableData::new(&session);
        let b = ObservableData::new(&session);
        let writes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&writes);
        let _probe = change_events(&b).subscribe(move |_: ChangeEvent| counter.set(counter.get() + 1));
        let _link = TwoWayBinding::new(&a, "x", &b, "x");
        a.set("x", 1);
        assert_eq!(b.get("x"), Value::from(1));
        assert_eq!(writes.get(), 1);
    }

    #[test]
    fn scope_releases_in_reverse_order() {
        let session = Session::new(RecordingBridge::new());
        let data = ObservableData::new(&session);
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut scope = BindingScope::new();
        for label in ["first", "second"] {
            let order = Rc::clone(&order);
            let source = Observable::new(move |_: Subscriber<u8>| {
                let order = Rc::clone(&order);
                Teardown::new(move || order.borrow_mut().push(label))
            });
            scope.subscribe(&source, |_: u8| ());
        }
        let target = ObservableData::new(&session);
        scope.sync(&data, "a", &target, "b");
        assert_eq!(scope.binding_count(), 3);
        scope.clear();
        assert!(scope.is_empty());
        assert_eq!(*order.borrow(), ["second", "first"]);
        data.set("a", 1);
        assert_eq!(target.get("b"), Value::Undefined);
    }
}
