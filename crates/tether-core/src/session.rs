#![forbid(unsafe_code)]

//! Session: bridge, registry and tick scheduler.
//!
//! A [`Session`] is constructed explicitly and passed to every object
//! constructor; there is no process-global registry. It also owns the
//! cooperative scheduler everything above the core relies on:
//!
//! - [`defer`](Session::defer) queues a task for the next tick.
//! - [`spawn`](Session::spawn) hands a future to the local executor (pending
//!   listener results end up here).
//! - [`tick`](Session::tick) drives the executor until stalled, then runs the
//!   tasks queued before the tick started. Tasks deferred while ticking wait
//!   for the following tick.
//!
//! # Failure Modes
//!
//! - Inbound notifications for unknown or disposed ids are dropped with a
//!   `debug!` record.
//! - `run_until_idle` gives up after `idle_tick_limit` ticks and logs a
//!   warning; the remaining tasks stay queued.
//! - After [`shutdown`](Session::shutdown), object creation fails with
//!   [`UsageError::SessionClosed`] and notifications are dropped.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use ahash::AHashMap;
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use tracing::{debug, warn};
use web_time::Instant;

use crate::bridge::{Bridge, WireValue};
use crate::config::SessionConfig;
use crate::error::UsageError;
use crate::logging::targets;
use crate::object::NativeObject;
use crate::registry::Registry;

type Task = Box<dyn FnOnce()>;

struct SessionInner {
    bridge: Rc<dyn Bridge>,
    registry: Registry,
    config: SessionConfig,
    epoch: Instant,
    last_stamp: Cell<Duration>,
    deferred: RefCell<VecDeque<Task>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    closed: Cell<bool>,
    extensions: RefCell<AHashMap<TypeId, Rc<dyn Any>>>,
}

/// Shared handle to one bridge session.
#[derive(Clone)]
pub struct Session(Rc<SessionInner>);

/// Non-owning session handle for tasks and teardowns.
#[derive(Clone)]
pub struct WeakSession(Weak<SessionInner>);

impl WeakSession {
    #[must_use]
    pub fn upgrade(&self) -> Option<Session> {
        self.0.upgrade().map(Session)
    }
}

impl fmt::Debug for WeakSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakSession")
    }
}

impl Session {
    pub fn new(bridge: Rc<dyn Bridge>) -> Self {
        Self::with_config(bridge, SessionConfig::default())
    }

    pub fn with_config(bridge: Rc<dyn Bridge>, config: SessionConfig) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self(Rc::new(SessionInner {
            bridge,
            registry: Registry::new(config.id_prefix.clone()),
            config,
            epoch: Instant::now(),
            last_stamp: Cell::new(Duration::ZERO),
            deferred: RefCell::new(VecDeque::new()),
            pool: RefCell::new(pool),
            spawner,
            closed: Cell::new(false),
            extensions: RefCell::new(AHashMap::new()),
        }))
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.0.config
    }

    pub(crate) fn bridge(&self) -> &dyn Bridge {
        &*self.0.bridge
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakSession {
        WeakSession(Rc::downgrade(&self.0))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The live object registered under `id`.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<NativeObject> {
        self.0.registry.find(id)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.closed.get()
    }

    /// Time since the session started, strictly increasing per call.
    #[must_use]
    pub fn time_stamp(&self) -> Duration {
        let now = self.0.epoch.elapsed();
        let last = self.0.last_stamp.get();
        let stamp = if now > last {
            now
        } else {
            last + Duration::from_nanos(1)
        };
        self.0.last_stamp.set(stamp);
        stamp
    }

    /// Per-session singleton of `T`, created on first use.
    #[must_use]
    pub fn extension<T: Default + 'static>(&self) -> Rc<T> {
        let existing = self.0.extensions.borrow().get(&TypeId::of::<T>()).cloned();
        if let Some(ext) = existing.and_then(|any| any.downcast::<T>().ok()) {
            return ext;
        }
        let ext = Rc::new(T::default());
        self.0
            .extensions
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::clone(&ext) as Rc<dyn Any>);
        ext
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Queue `task` for the next tick.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.0.deferred.borrow_mut().push_back(Box::new(task));
    }

    /// Hand `fut` to the session executor. It first runs on the next tick.
    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) {
        if let Err(error) = self.0.spawner.spawn_local(fut) {
            warn!(target: targets::SESSION, %error, "executor unavailable, future dropped");
        }
    }

    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.0.deferred.borrow().len()
    }

    /// Run one scheduler tick. Returns the number of deferred tasks run.
    pub fn tick(&self) -> usize {
        self.run_spawned();
        let batch: Vec<Task> = self.0.deferred.borrow_mut().drain(..).collect();
        let ran = batch.len();
        for task in batch {
            task();
        }
        self.run_spawned();
        ran
    }

    /// Tick until no deferred task remains or `idle_tick_limit` is reached.
    /// Returns the number of ticks run.
    pub fn run_until_idle(&self) -> usize {
        let limit = self.0.config.idle_tick_limit;
        let mut ticks = 0;
        while self.pending_tasks() > 0 || ticks == 0 {
            if ticks >= limit {
                warn!(target: targets::SESSION, ticks, pending = self.pending_tasks(), "tick limit reached before idle");
                break;
            }
            self.tick();
            ticks += 1;
        }
        ticks
    }

    fn run_spawned(&self) {
        // Re-entrant ticks from inside a spawned future skip the executor.
        if let Ok(mut pool) = self.0.pool.try_borrow_mut() {
            pool.run_until_stalled();
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Deliver a native notification addressed to `id`.
    pub fn notify(&self, id: &str, event: &str, payload: WireValue) {
        if self.is_closed() {
            debug!(target: targets::SESSION, id, event, "notification after shutdown dropped");
            return;
        }
        match self.find(id) {
            Some(object) if !object.is_disposed() => object.receive(event, &payload),
            _ => debug!(target: targets::SESSION, id, event, "notification for unknown object dropped"),
        }
    }

    /// Dispose every live object, newest first, and refuse further work.
    pub fn shutdown(&self) {
        if self.0.closed.replace(true) {
            return;
        }
        for object in self.0.registry.live_objects().into_iter().rev() {
            object.dispose();
        }
        self.0.deferred.borrow_mut().clear();
        self.0.extensions.borrow_mut().clear();
        debug!(target: targets::SESSION, "session shut down");
    }

    /// Fail with [`UsageError::SessionClosed`] after shutdown.
    pub fn ensure_open(&self) -> Result<(), UsageError> {
        if self.is_closed() {
            Err(UsageError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.0.registry)
            .field("config", &self.0.config)
            .field("pending_tasks", &self.pending_tasks())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventSource};
    use crate::testing::{BridgeCall, RecordingBridge, plain_class};
    use serde_json::json;

    #[test]
    fn weak_handle_does_not_keep_session_alive() {
        let session = Session::new(RecordingBridge::new());
        let weak = session.downgrade();
        assert!(weak.upgrade().is_some_and(|s| s.ptr_eq(&session)));
        drop(session);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn deferred_tasks_run_on_next_tick() {
        let session = Session::new(RecordingBridge::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let (outer_log, inner_session) = (Rc::clone(&log), session.clone());
        session.defer(move || {
            outer_log.borrow_mut().push(1);
            let nested = Rc::clone(&outer_log);
            inner_session.defer(move || nested.borrow_mut().push(2));
        });
        assert_eq!(session.tick(), 1);
        assert_eq!(*log.borrow(), [1]);
        assert_eq!(session.tick(), 1);
        assert_eq!(*log.borrow(), [1, 2]);
        assert_eq!(session.tick(), 0);
    }

    #[test]
    fn run_until_idle_drains_chains() {
        let session = Session::new(RecordingBridge::new());
        let count = Rc::new(Cell::new(0));
        fn chain(session: Session, count: Rc<Cell<u32>>) {
            if count.get() < 5 {
                count.set(count.get() + 1);
                let next = session.clone();
                session.defer(move || chain(next, count));
            }
        }
        let (s, c) = (session.clone(), Rc::clone(&count));
        session.defer(move || chain(s, c));
        session.run_until_idle();
        assert_eq!(count.get(), 5);
        assert_eq!(session.pending_tasks(), 0);
    }

    #[test]
    #[tracing_test::traced_test]
    fn run_until_idle_is_bounded() {
        let config = SessionConfig {
            idle_tick_limit: 3,
            ..SessionConfig::default()
        };
        let session = Session::with_config(RecordingBridge::new(), config);
        fn forever(session: Session) {
            let next = session.clone();
            session.defer(move || forever(next));
        }
        forever(session.clone());
        assert_eq!(session.run_until_idle(), 3);
        assert!(logs_contain("tick limit reached before idle"));
    }

    #[test]
    fn spawned_futures_run_on_tick() {
        let session = Session::new(RecordingBridge::new());
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        session.spawn(async move { flag.set(true) });
        assert!(!done.get());
        session.tick();
        assert!(done.get());
    }

    #[test]
    fn extensions_are_per_session_singletons() {
        #[derive(Default)]
        struct Counter(Cell<u32>);
        let a = Session::new(RecordingBridge::new());
        let b = Session::new(RecordingBridge::new());
        a.extension::<Counter>().0.set(3);
        assert_eq!(a.extension::<Counter>().0.get(), 3);
        assert_eq!(b.extension::<Counter>().0.get(), 0);
    }

    #[test]
    fn notify_drops_unknown_ids() {
        let session = Session::new(RecordingBridge::new());
        session.notify("$404", "tap", json!(null));
        let obj = NativeObject::create(&session, &plain_class()).unwrap();
        let id = obj.id().clone();
        obj.dispose();
        session.notify(id.as_str(), "tap", json!(null));
    }

    #[test]
    fn shutdown_disposes_newest_first() {
        let bridge = RecordingBridge::new();
        let session = Session::new(bridge.clone());
        let a = NativeObject::create(&session, &plain_class()).unwrap();
        let b = NativeObject::create(&session, &plain_class()).unwrap();
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        a.on_fn("dispose", move |_: &Event| counter.set(counter.get() + 1))
            .unwrap();
        bridge.clear();
        session.shutdown();
        assert_eq!(
            bridge.calls(),
            [
                BridgeCall::Destroy { id: b.id().to_string() },
                BridgeCall::Destroy { id: a.id().to_string() },
            ]
        );
        assert_eq!(fired.get(), 1);
        assert!(session.registry().is_empty());
        assert_eq!(
            NativeObject::create(&session, &plain_class()).unwrap_err(),
            UsageError::SessionClosed
        );
    }

    #[test]
    fn time_stamps_strictly_increase() {
        let session = Session::new(RecordingBridge::new());
        let stamps: Vec<_> = (0..100).map(|_| session.time_stamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}
