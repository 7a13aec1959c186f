#![forbid(unsafe_code)]

//! Stream adapters over [`EventSource`]s.
//!
//! Both adapters subscribe to the internal [`WILDCARD`] channel, so they see
//! every trigger after the public listeners have run, and they complete when
//! the source dispatches `dispose` (or immediately if it is already
//! disposed).
//!
//! # Mutation coalescing
//!
//! [`mutations`] subscribers share one [`MutationQueue`] per session. A
//! change marks the subscriber dirty; the first dirty mark of a tick defers a
//! flush through [`Session::defer`]. A flush keeps draining while observers
//! cause further changes, up to `SessionConfig::flush_budget` rounds; past
//! that the queue is dropped and an `observer recursion` error is logged.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tether_core::logging::targets;
use tether_core::{
    EventSource, EventTarget, InternalEvent, InternalListener, Session, Value, WILDCARD,
    changed_property,
};
use tracing::error;

use super::observable::{Observable, Subscriber, Teardown};

/// One `<property>Changed` notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub target: EventTarget,
    pub property: String,
    pub value: Value,
}

impl ChangeEvent {
    fn from_internal(event: &InternalEvent<'_>) -> Option<Self> {
        changed_property(event.event_type).map(|property| Self {
            target: event.target.clone(),
            property: property.to_owned(),
            value: event.value(),
        })
    }
}

/// Every change event of `source`. Completes when `source` is disposed.
pub fn change_events<S>(source: &S) -> Observable<ChangeEvent>
where
    S: EventSource + Clone + 'static,
{
    let source = source.clone();
    Observable::new(move |subscriber: Subscriber<ChangeEvent>| {
        if source.is_disposed() {
            subscriber.complete();
            return Teardown::none();
        }
        let sink = subscriber.clone();
        let listener = InternalListener::new(move |event| {
            if let Some(change) = ChangeEvent::from_internal(event) {
                sink.next(change);
            } else if event.event_type == "dispose" {
                sink.complete();
            }
        });
        source.on_internal(WILDCARD, &listener);
        let source = source.clone();
        Teardown::new(move || source.off_internal(WILDCARD, &listener))
    })
}

/// `source` now, then again at most once per tick while its properties
/// change. Completes when `source` is disposed.
pub fn mutations<S>(source: &S) -> Observable<S>
where
    S: EventSource + Clone + 'static,
{
    let source = source.clone();
    Observable::new(move |subscriber: Subscriber<S>| {
        subscriber.next(source.clone());
        if subscriber.closed() {
            return Teardown::none();
        }
        if source.is_disposed() {
            subscriber.complete();
            return Teardown::none();
        }
        let session = source.session().clone();
        let queue = session.extension::<MutationQueue>();
        let key = queue.next_key();
        let emit: Rc<dyn Fn()> = {
            let (sink, source) = (subscriber.clone(), source.clone());
            Rc::new(move || sink.next(source.clone()))
        };
        let listener = {
            let (sink, queue) = (subscriber.clone(), Rc::clone(&queue));
            let session = session.downgrade();
            InternalListener::new(move |event| {
                if changed_property(event.event_type).is_some() {
                    if let Some(session) = session.upgrade() {
                        queue.enqueue(&session, key, Rc::clone(&emit));
                    }
                } else if event.event_type == "dispose" {
                    queue.cancel(key);
                    sink.complete();
                }
            })
        };
        source.on_internal(WILDCARD, &listener);
        let source = source.clone();
        Teardown::new(move || {
            queue.cancel(key);
            source.off_internal(WILDCARD, &listener);
        })
    })
}

// ---------------------------------------------------------------------------
// MutationQueue
// ---------------------------------------------------------------------------

/// Per-session set of dirty mutation subscribers.
#[derive(Default)]
pub struct MutationQueue {
    next_key: Cell<u64>,
    pending: RefCell<Vec<(u64, Rc<dyn Fn()>)>>,
    scheduled: Cell<bool>,
}

impl MutationQueue {
    fn next_key(&self) -> u64 {
        let key = self.next_key.get() + 1;
        self.next_key.set(key);
        key
    }

    /// Number of subscribers waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    fn enqueue(self: &Rc<Self>, session: &Session, key: u64, emit: Rc<dyn Fn()>) {
        {
            let mut pending = self.pending.borrow_mut();
            if pending.iter().any(|(k, _)| *k == key) {
                return;
            }
            pending.push((key, emit));
        }
        if !self.scheduled.replace(true) {
            let queue = Rc::clone(self);
            let budget = session.config().flush_budget;
            session.defer(move || queue.flush(budget));
        }
    }

    fn cancel(&self, key: u64) {
        self.pending.borrow_mut().retain(|(k, _)| *k != key);
    }

    fn flush(&self, budget: usize) {
        let mut rounds = 0;
        loop {
            let batch = self.pending.take();
            if batch.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > budget {
                error!(
                    target: targets::REACTIVE,
                    budget,
                    dropped = batch.len(),
                    "observer recursion: mutation queue dropped"
                );
                break;
            }
            for (_, emit) in batch {
                emit();
            }
        }
        self.scheduled.set(false);
    }
}

impl fmt::Debug for MutationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationQueue")
            .field("pending", &self.pending())
            .field("scheduled", &self.scheduled.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tether_core::testing::RecordingBridge;
    use tether_core::{NativeClass, NativeObject, PropertySpec, TypeRegistry};

    fn counter_class() -> Rc<NativeClass> {
        NativeClass::builder("Counter")
            .property("count", PropertySpec::new("number").default(0))
            .property("label", PropertySpec::new("string").default(""))
            .build(&TypeRegistry::standard())
            .unwrap()
    }

    fn setup() -> (Session, NativeObject) {
        let session = Session::new(RecordingBridge::new());
        let obj = NativeObject::create(&session, &counter_class()).unwrap();
        (session, obj)
    }

    #[test]
    fn change_events_carry_property_and_value() {
        let (_session, obj) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = change_events(&obj).subscribe(move |c: ChangeEvent| {
            sink.borrow_mut().push((c.property, c.value));
        });
        obj.set("count", 2);
        obj.set("label", "x");
        obj.set("count", 2);
        assert_eq!(
            *seen.borrow(),
            [
                ("count".to_owned(), Value::from(2)),
                ("label".to_owned(), Value::from("x")),
            ]
        );
    }

    #[test]
    fn change_events_complete_on_dispose() {
        let (_session, obj) = setup();
        let sub = change_events(&obj).subscribe(|_: ChangeEvent| ());
        obj.dispose();
        assert!(sub.closed());
        let late = change_events(&obj).subscribe(|_: ChangeEvent| ());
        assert!(late.closed());
    }

    #[test]
    fn unsubscribe_detaches_from_the_store() {
        let (_session, obj) = setup();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let sub = change_events(&obj).subscribe(move |_: ChangeEvent| sink.set(sink.get() + 1));
        sub.unsubscribe();
        obj.set("count", 5);
        assert_eq!(seen.get(), 0);
    }

    #[test]
    fn mutations_coalesce_per_tick() {
        let (session, obj) = setup();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let _sub = mutations(&obj).subscribe(move |_: NativeObject| sink.set(sink.get() + 1));
        assert_eq!(seen.get(), 1);
        for n in 1..=10 {
            obj.set("count", n);
        }
        assert_eq!(seen.get(), 1);
        session.tick();
        assert_eq!(seen.get(), 2);
        session.tick();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn mutations_complete_on_dispose_and_drop_pending() {
        let (session, obj) = setup();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let sub = mutations(&obj).subscribe(move |_: NativeObject| sink.set(sink.get() + 1));
        obj.set("count", 1);
        obj.dispose();
        session.tick();
        assert_eq!(seen.get(), 1);
        assert!(sub.closed());
        assert_eq!(session.extension::<MutationQueue>().pending(), 0);
    }

    #[test]
    #[tracing_test::traced_test]
    fn recursive_mutations_hit_the_budget() {
        let session = Session::with_config(
            RecordingBridge::new(),
            tether_core::SessionConfig::default().with_flush_budget(5),
        );
        let obj = NativeObject::create(&session, &counter_class()).unwrap();
        let writer = obj.clone();
        let rounds = Rc::new(Cell::new(0));
        let counter = Rc::clone(&rounds);
        let _sub = mutations(&obj).subscribe(move |_: NativeObject| {
            counter.set(counter.get() + 1);
            writer.set("count", f64::from(counter.get()));
        });
        obj.set("count", 100);
        session.tick();
        assert!(logs_contain("observer recursion"));
        assert_eq!(session.extension::<MutationQueue>().pending(), 0);
        // the initial emission plus five flush rounds
        assert_eq!(rounds.get(), 6);
    }
}
