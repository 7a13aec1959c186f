#![forbid(unsafe_code)]

//! Observable layer for tether objects.
//!
//! - [`reactive`]: push-based [`Observable`] streams with exactly-once
//!   teardown, the `change_events`/`mutations` adapters over any
//!   [`EventSource`](tether_core::EventSource), and property bindings.
//! - [`data`]: [`ObservableData`], an in-process event source whose setters
//!   synthesize change events.

pub mod data;
pub mod reactive;

pub use data::ObservableData;
pub use reactive::{
    Binding, BindingScope, ChangeEvent, Observable, Observer, PropertyAccess, StreamError,
    Subscriber, Subscription, Teardown, TwoWayBinding, bind_mapped, bind_property, change_events,
    mutations, sync_property,
};
