#![forbid(unsafe_code)]

//! Core of the tether native bridge.
//!
//! Application code manipulates [`NativeObject`] proxies as ordinary typed
//! objects; every mutation is translated into [`Bridge`] operations and every
//! inbound native notification is routed back as ordered, typed events.
//!
//! - [`Session`]: owns the [`Bridge`], the object [`Registry`] and the tick
//!   scheduler. There is no process-global registry.
//! - [`NativeClass`]: validated property and event descriptors for one native
//!   type, built once through [`ClassBuilder`].
//! - [`TypeRegistry`]: named [`PropertyType`] descriptors (convert, encode,
//!   decode).
//! - [`EventSource`]: the listener capability shared by every event-bearing
//!   handle, backed by an [`EventStore`].
//!
//! # Invariants
//!
//! 1. While an object is not disposed, the registry holds exactly one entry
//!    for its id, pointing at that object.
//! 2. Disposal is terminal and happens exactly once.
//! 3. A native event is listened to exactly while at least one listener needs
//!    it; `listen(true)`/`listen(false)` always alternate.
//! 4. Listeners fire in registration order; the internal channel fires after
//!    the public one.

pub mod bridge;
pub mod class;
pub mod config;
pub mod error;
pub mod event;
pub mod id;
pub mod logging;
pub mod object;
pub mod registry;
pub mod session;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod types;
pub mod value;

pub use bridge::{Bridge, WireMap, WireValue};
pub use class::{
    ChangeLink, ClassBuilder, EventDescriptor, EventSpec, Extractor, Modifiers, NativeClass,
    PropertyDescriptor, PropertySpec, change_event_name, changed_property,
};
pub use config::SessionConfig;
pub use error::{BoxError, ConfigError, Error, UsageError, ValueError};
pub use event::{
    Context, Event, EventData, EventOwner, EventSource, EventStore, EventTarget, InternalEvent,
    InternalListener, Listener, Reply, WILDCARD, value_data,
};
pub use id::ObjectId;
pub use object::{NativeObject, ObjectBuilder, Phase};
pub use registry::Registry;
pub use session::{Session, WeakSession};
pub use types::{DecodeContext, PropertyType, TypeRegistry};
pub use value::{Properties, Value};
