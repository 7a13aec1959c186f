#![forbid(unsafe_code)]

//! Reactive streams over tether event sources.
//!
//! - [`Observable`]: wraps one setup function `(subscriber) -> teardown`,
//!   invoked synchronously once per subscription.
//! - [`Subscription`]: RAII guard; `unsubscribe()` and drop both close the
//!   stream and run its teardown exactly once.
//! - [`change_events`]: every `<property>Changed` event of a source.
//! - [`mutations`]: the source itself, at most once per scheduler tick.
//! - [`Binding`], [`TwoWayBinding`], [`BindingScope`]: property bindings
//!   between objects.
//!
//! # Architecture
//!
//! Streams hook into the internal wildcard channel of the source's
//! [`EventStore`](tether_core::EventStore), so they never build full event
//! objects and never count toward native listen activation. The mutation
//! stream coalesces through a per-session queue flushed by
//! [`Session::defer`](tether_core::Session::defer).
//!
//! # Invariants
//!
//! 1. `closed` becomes true exactly once: on error, complete or unsubscribe.
//! 2. After `closed`, `next`/`error`/`complete` are ignored.
//! 3. Teardown runs exactly once, also when the stream closes itself during
//!    setup.
//! 4. A mutation subscriber is notified at most once per tick.

pub mod binding;
pub mod observable;
pub mod streams;

pub use binding::{
    Binding, BindingScope, PropertyAccess, TwoWayBinding, bind_mapped, bind_property, sync_property,
};
pub use observable::{Observable, Observer, StreamError, Subscriber, Subscription, Teardown};
pub use streams::{ChangeEvent, MutationQueue, change_events, mutations};
