#![forbid(unsafe_code)]

//! Push-based observable streams.
//!
//! # Usage
//!
//! ```ignore
//! let ticks = Observable::new(|subscriber: Subscriber<u32>| {
//!     subscriber.next(1);
//!     subscriber.next(2);
//!     subscriber.complete();
//!     Teardown::none()
//! });
//! let sub = ticks.map(|n| n * 10).subscribe(|n| println!("{n}"));
//! assert!(sub.closed());
//! ```
//!
//! # Failure Modes
//!
//! - An observer callback that panics unwinds through `next`; the
//!   subscription stays open.
//! - Errors passed to `error` without an `on_error` handler are dropped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Error delivered through [`Subscriber::error`].
pub type StreamError = Rc<dyn std::error::Error>;

/// Cleanup returned by an observable's setup function.
#[must_use]
pub struct Teardown(Option<Box<dyn FnOnce()>>);

impl Teardown {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Nothing to clean up.
    pub fn none() -> Self {
        Self(None)
    }

    fn run(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Teardown").field(&self.0.is_some()).finish()
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Callbacks receiving a stream.
pub struct Observer<T> {
    next: Rc<dyn Fn(T)>,
    error: Option<Rc<dyn Fn(StreamError)>>,
    complete: Option<Rc<dyn Fn()>>,
}

impl<T> Observer<T> {
    pub fn new(next: impl Fn(T) + 'static) -> Self {
        Self {
            next: Rc::new(next),
            error: None,
            complete: None,
        }
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(StreamError) + 'static) -> Self {
        self.error = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, f: impl Fn() + 'static) -> Self {
        self.complete = Some(Rc::new(f));
        self
    }
}

impl<T, F: Fn(T) + 'static> From<F> for Observer<T> {
    fn from(next: F) -> Self {
        Self::new(next)
    }
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            next: Rc::clone(&self.next),
            error: self.error.clone(),
            complete: self.complete.clone(),
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

struct SubscriberInner<T> {
    observer: Observer<T>,
    closed: Cell<bool>,
    teardown: RefCell<Option<Teardown>>,
}

impl<T> SubscriberInner<T> {
    /// Close and run the teardown if it is installed. Returns whether this
    /// call did the closing.
    fn close(&self) -> bool {
        if self.closed.replace(true) {
            return false;
        }
        self.run_teardown();
        true
    }

    fn run_teardown(&self) {
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown.run();
        }
    }
}

/// Producer-side handle passed to a setup function.
pub struct Subscriber<T>(Rc<SubscriberInner<T>>);

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Subscriber<T> {
    pub fn next(&self, value: T) {
        if !self.closed() {
            (self.0.observer.next)(value);
        }
    }

    pub fn error(&self, error: StreamError) {
        if self.closed() {
            return;
        }
        self.0.closed.set(true);
        if let Some(on_error) = &self.0.observer.error {
            on_error(error);
        }
        self.0.run_teardown();
    }

    pub fn complete(&self) {
        if self.closed() {
            return;
        }
        self.0.closed.set(true);
        if let Some(on_complete) = &self.0.observer.complete {
            on_complete();
        }
        self.0.run_teardown();
    }

    #[must_use]
    pub fn closed(&self) -> bool {
        self.0.closed.get()
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("closed", &self.closed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

trait Close {
    fn close(&self) -> bool;
    fn is_closed(&self) -> bool;
}

impl<T> Close for SubscriberInner<T> {
    fn close(&self) -> bool {
        SubscriberInner::close(self)
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

/// RAII handle to one subscription.
///
/// Dropping it unsubscribes; call [`detach`](Self::detach) to keep the stream
/// running for as long as the producer does.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    inner: Option<Rc<dyn Close>>,
}

impl Subscription {
    /// Close the stream and run its teardown. Safe to call repeatedly and
    /// from within the teardown itself.
    pub fn unsubscribe(&self) {
        if let Some(inner) = &self.inner {
            inner.close();
        }
    }

    #[must_use]
    pub fn closed(&self) -> bool {
        self.inner.as_ref().is_none_or(|inner| inner.is_closed())
    }

    /// Give up the handle without unsubscribing.
    pub fn detach(mut self) {
        self.inner = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.closed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Observable
// ---------------------------------------------------------------------------

/// A cold stream defined by its setup function.
pub struct Observable<T> {
    setup: Rc<dyn Fn(Subscriber<T>) -> Teardown>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            setup: Rc::clone(&self.setup),
        }
    }
}

impl<T: 'static> Observable<T> {
    pub fn new(setup: impl Fn(Subscriber<T>) -> Teardown + 'static) -> Self {
        Self {
            setup: Rc::new(setup),
        }
    }

    /// Run the setup function once for `observer`.
    pub fn subscribe(&self, observer: impl Into<Observer<T>>) -> Subscription {
        let subscriber = Subscriber(Rc::new(SubscriberInner {
            observer: observer.into(),
            closed: Cell::new(false),
            teardown: RefCell::new(None),
        }));
        let teardown = (self.setup)(subscriber.clone());
        if subscriber.closed() {
            teardown.run();
        } else {
            *subscriber.0.teardown.borrow_mut() = Some(teardown);
        }
        Subscription {
            inner: Some(subscriber.0 as Rc<dyn Close>),
        }
    }

    /// Transform every value.
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> Observable<U> {
        let f = Rc::new(f);
        self.pipe(move |downstream: &Subscriber<U>| {
            let f = Rc::clone(&f);
            let downstream = downstream.clone();
            move |value: T| downstream.next(f(value))
        })
    }

    /// Forward values matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Observable<T> {
        let predicate = Rc::new(predicate);
        self.pipe(move |downstream: &Subscriber<T>| {
            let predicate = Rc::clone(&predicate);
            let downstream = downstream.clone();
            move |value: T| {
                if predicate(&value) {
                    downstream.next(value);
                }
            }
        })
    }

    /// Subscribe upstream with `next` built per downstream subscriber;
    /// errors and completion pass through.
    fn pipe<U: 'static, N: Fn(T) + 'static>(
        &self,
        make_next: impl Fn(&Subscriber<U>) -> N + 'static,
    ) -> Observable<U> {
        let source = self.clone();
        Observable::new(move |downstream: Subscriber<U>| {
            let on_error = downstream.clone();
            let on_complete = downstream.clone();
            let upstream = source.subscribe(
                Observer::new(make_next(&downstream))
                    .on_error(move |error| on_error.error(error))
                    .on_complete(move || on_complete.complete()),
            );
            Teardown::new(move || upstream.unsubscribe())
        })
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Observable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_teardown(count: &Rc<Cell<u32>>) -> Teardown {
        let count = Rc::clone(count);
        Teardown::new(move || count.set(count.get() + 1))
    }

    #[test]
    fn setup_runs_once_per_subscription() {
        let setups = Rc::new(Cell::new(0));
        let counter = Rc::clone(&setups);
        let source = Observable::new(move |_: Subscriber<u8>| {
            counter.set(counter.get() + 1);
            Teardown::none()
        });
        let _a = source.subscribe(|_| ());
        let _b = source.subscribe(|_| ());
        assert_eq!(setups.get(), 2);
    }

    #[test]
    fn unsubscribe_twice_runs_teardown_once() {
        let teardowns = Rc::new(Cell::new(0));
        let count = Rc::clone(&teardowns);
        let source = Observable::new(move |_: Subscriber<u8>| counting_teardown(&count));
        let sub = source.subscribe(|_| ());
        assert!(!sub.closed());
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);
        assert_eq!(teardowns.get(), 1);
    }

    #[test]
    fn drop_unsubscribes() {
        let teardowns = Rc::new(Cell::new(0));
        let count = Rc::clone(&teardowns);
        let source = Observable::new(move |_: Subscriber<u8>| counting_teardown(&count));
        drop(source.subscribe(|_| ()));
        assert_eq!(teardowns.get(), 1);
    }

    #[test]
    fn detach_keeps_stream_open() {
        let handle = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&handle);
        let source = Observable::new(move |s: Subscriber<u8>| {
            *slot.borrow_mut() = Some(s);
            Teardown::none()
        });
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        source.subscribe(move |v| sink.set(v)).detach();
        handle.borrow().as_ref().unwrap().next(7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn complete_closes_and_ignores_later_calls() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let teardowns = Rc::new(Cell::new(0));
        let count = Rc::clone(&teardowns);
        let source = Observable::new(move |s: Subscriber<&'static str>| {
            s.next("a");
            s.complete();
            s.next("b");
            s.error(Rc::new(std::fmt::Error));
            s.complete();
            counting_teardown(&count)
        });
        let (next_log, done_log) = (Rc::clone(&log), Rc::clone(&log));
        let sub = source.subscribe(
            Observer::new(move |v| next_log.borrow_mut().push(v))
                .on_complete(move || done_log.borrow_mut().push("done")),
        );
        assert_eq!(*log.borrow(), ["a", "done"]);
        assert!(sub.closed());
        assert_eq!(teardowns.get(), 1);
        sub.unsubscribe();
        assert_eq!(teardowns.get(), 1);
    }

    #[test]
    fn error_reaches_handler_and_runs_teardown() {
        let handle = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&handle);
        let teardowns = Rc::new(Cell::new(0));
        let count = Rc::clone(&teardowns);
        let source = Observable::new(move |s: Subscriber<u8>| {
            *slot.borrow_mut() = Some(s);
            counting_teardown(&count)
        });
        let errors = Rc::new(Cell::new(0));
        let sink = Rc::clone(&errors);
        let sub = source.subscribe(Observer::new(|_| ()).on_error(move |_| sink.set(sink.get() + 1)));
        let subscriber = handle.borrow_mut().take().unwrap();
        subscriber.error(Rc::new(std::fmt::Error));
        subscriber.error(Rc::new(std::fmt::Error));
        assert_eq!(errors.get(), 1);
        assert_eq!(teardowns.get(), 1);
        assert!(sub.closed());
    }

    #[test]
    fn unsubscribe_from_own_teardown_is_safe() {
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let inner_slot = Rc::clone(&slot);
        let source = Observable::new(move |_: Subscriber<u8>| {
            let inner_slot = Rc::clone(&inner_slot);
            Teardown::new(move || {
                if let Some(sub) = inner_slot.borrow().as_ref() {
                    sub.unsubscribe();
                }
            })
        });
        *slot.borrow_mut() = Some(source.subscribe(|_| ()));
        slot.borrow().as_ref().unwrap().unsubscribe();
        assert!(slot.borrow().as_ref().unwrap().closed());
    }

    #[test]
    fn map_and_filter_compose() {
        let source = Observable::new(|s: Subscriber<i32>| {
            for n in 1..=6 {
                s.next(n);
            }
            s.complete();
            Teardown::none()
        });
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let _sub = source
            .filter(|n| n % 2 == 0)
            .map(|n| format!("#{n}"))
            .subscribe(
                Observer::new(move |s| sink.borrow_mut().push(s)).on_complete(move || flag.set(true)),
            );
        assert_eq!(*log.borrow(), ["#2", "#4", "#6"]);
        assert!(done.get());
    }

    #[test]
    fn unsubscribing_a_mapped_stream_tears_down_upstream() {
        let teardowns = Rc::new(Cell::new(0));
        let count = Rc::clone(&teardowns);
        let source = Observable::new(move |_: Subscriber<u8>| counting_teardown(&count));
        let sub = source.map(u32::from).subscribe(|_| ());
        sub.unsubscribe();
        assert_eq!(teardowns.get(), 1);
    }
}
