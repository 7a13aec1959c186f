#![forbid(unsafe_code)]

//! Plain observable property bag.
//!
//! [`ObservableData`] has no native counterpart: it is a local key/value
//! store that emits `<key>Changed` through the same [`EventStore`] machinery
//! as a [`NativeObject`](tether_core::NativeObject), so bindings and change
//! streams work on both.
//!
//! # Invariants
//!
//! 1. `<key>Changed` fires only when the stored value actually changes.
//! 2. Reading an unknown key yields `Value::Undefined`; storing
//!    `Undefined` under an unknown key does not fire.
//! 3. An `ObservableData` is never disposed.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tether_core::{
    EventOwner, EventSource, EventStore, Properties, Session, Value, change_event_name, value_data,
};

struct DataInner {
    session: Session,
    values: RefCell<BTreeMap<String, Value>>,
    events: EventStore,
}

impl EventOwner for DataInner {
    fn events(&self) -> &EventStore {
        &self.events
    }

    fn is_disposed(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "ObservableData".to_owned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared handle to a local observable store.
#[derive(Clone)]
pub struct ObservableData(Rc<DataInner>);

impl ObservableData {
    #[must_use]
    pub fn new(session: &Session) -> Self {
        Self::with_values(session, Properties::new())
    }

    #[must_use]
    pub fn with_values(session: &Session, values: impl Into<Properties>) -> Self {
        let values: Properties = values.into();
        Self(Rc::new(DataInner {
            session: session.clone(),
            values: RefCell::new(values.into_iter().collect()),
            events: EventStore::default(),
        }))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.0
            .values
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Store `value`; fires `<key>Changed` if it differs from the current one.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let previous = self
            .0
            .values
            .borrow_mut()
            .insert(key.to_owned(), value.clone());
        if previous.unwrap_or_default() != value {
            self.trigger(&change_event_name(key), value_data(value));
        }
    }

    pub fn set_all(&self, values: impl Into<Properties>) {
        let values: Properties = values.into();
        for (key, value) in values {
            self.set(&key, value);
        }
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.values.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl EventSource for ObservableData {
    fn owner(&self) -> Rc<dyn EventOwner> {
        self.0.clone()
    }

    fn session(&self) -> &Session {
        &self.0.session
    }
}

impl PartialEq for ObservableData {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObservableData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableData")
            .field("values", &self.0.values.borrow())
            .finish()
    }
}
