//! Event dispatch queue.
//!
//! Native callbacks only [`enqueue`](Dispatcher::enqueue); listeners run on
//! dedicated worker threads. Every source is pinned to one worker, so events
//! of a source are delivered in enqueue order. A panicking listener is
//! isolated: it is logged and counted, and delivery carries on.

use std::any::Any;
use std::cell::Cell;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::error::{BindError, Result};
use crate::event::{Event, EventRecord};
use crate::handle::SourceId;

/// Maximum events drained into one batch before delivery starts.
const MAX_BATCH: usize = 256;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Delivery threads. Sources are spread across them.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Collapse queued `TimeChanged`/`PositionChanged` of a source to the
    /// latest value. Nothing else is ever collapsed or reordered.
    #[serde(default)]
    pub coalesce_progress: bool,
}

fn default_workers() -> usize {
    2
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { workers: default_workers(), coalesce_progress: false }
    }
}

/// Receives records produced by native callbacks. Must not block.
pub trait EventSink: Send + Sync {
    fn enqueue(&self, source: SourceId, record: EventRecord);
}

/// Counters since the dispatcher was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub listener_failures: u64,
    pub coalesced: u64,
}

type ListenerFn = dyn Fn(&Event) + Send + Sync;

struct Subscriber {
    id: u64,
    /// First sequence number this subscriber may see.
    start_seq: u64,
    active: AtomicBool,
    /// Held for the duration of every listener call.
    call: Mutex<()>,
    listener: Box<ListenerFn>,
}

thread_local! {
    /// Subscriber whose listener is running on this thread (0 = none).
    static DELIVERING: Cell<u64> = const { Cell::new(0) };
}

struct Lane {
    tx: Mutex<Option<mpsc::UnboundedSender<Event>>>,
}

struct Shared {
    /// Copy-on-write listener lists; dispatch clones the `Arc` and iterates
    /// without holding any lock.
    registry: DashMap<SourceId, RwLock<Arc<Vec<Arc<Subscriber>>>>>,
    next_seq: AtomicU64,
    next_subscriber: AtomicU64,
    coalesce_progress: bool,
    enqueued: AtomicU64,
    delivered: AtomicU64,
    listener_failures: AtomicU64,
    coalesced: AtomicU64,
}

/// Multi-worker, per-source FIFO event queue.
pub struct Dispatcher {
    shared: Arc<Shared>,
    lanes: Vec<Lane>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let count = config.workers.max(1);
        let shared = Arc::new(Shared {
            registry: DashMap::new(),
            next_seq: AtomicU64::new(0),
            next_subscriber: AtomicU64::new(1),
            coalesce_progress: config.coalesce_progress,
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        });

        let mut lanes = Vec::with_capacity(count);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker_shared = shared.clone();
            let worker = std::thread::Builder::new()
                .name(format!("vlcbind-dispatch-{index}"))
                .spawn(move || run_worker(worker_shared, rx))
                .map_err(|e| BindError::InitializationFailed(format!("spawn dispatch worker: {e}")))?;
            lanes.push(Lane { tx: Mutex::new(Some(tx)) });
            workers.push(worker);
        }

        info!(workers = count, coalesce_progress = config.coalesce_progress, "event dispatcher started");
        Ok(Self { shared, lanes, workers: Mutex::new(workers) })
    }

    fn lane(&self, source: SourceId) -> &Lane {
        &self.lanes[(source.get() % self.lanes.len() as u64) as usize]
    }

    /// Stamp and queue a record. Never blocks on listeners; safe to call
    /// from a native thread. Records enqueued after shutdown are dropped.
    pub fn enqueue(&self, source: SourceId, record: EventRecord) {
        let lane = self.lane(source);
        // The lane lock keeps channel order equal to sequence order.
        let tx = lane.tx.lock();
        let Some(tx) = tx.as_ref() else {
            debug!(%source, event = record.name(), "dispatcher shut down; dropping event");
            return;
        };
        let seq = self.shared.next_seq.fetch_add(1, Ordering::SeqCst);
        trace!(%source, seq, event = record.name(), "enqueue");
        if tx.send(Event { source, seq, record }).is_ok() {
            self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Register `listener` for events of `source` enqueued from now on.
    pub fn subscribe<F>(&self, source: SourceId, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let entry = self
            .shared
            .registry
            .entry(source)
            .or_insert_with(|| RwLock::new(Arc::new(Vec::new())));
        // The sequence snapshot is taken under the source's write guard so
        // no concurrent dispatch sees a half-registered subscriber.
        let mut list = entry.write();
        let subscriber = Arc::new(Subscriber {
            id,
            start_seq: self.shared.next_seq.load(Ordering::SeqCst),
            active: AtomicBool::new(true),
            call: Mutex::new(()),
            listener: Box::new(listener),
        });
        let mut next = Vec::with_capacity(list.len() + 1);
        next.extend(list.iter().cloned());
        next.push(subscriber);
        *list = Arc::new(next);
        drop(list);
        drop(entry);

        debug!(%source, subscription = id, "subscribed");
        Subscription { id, source, shared: Arc::downgrade(&self.shared) }
    }

    /// Stop deliveries to `subscription`. Once this returns the listener is
    /// not running and never will again.
    ///
    /// From inside any listener it returns without waiting: a call already
    /// under way on another worker may still finish afterwards.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.shared.unsubscribe(subscription.source, subscription.id);
    }

    /// Number of active subscriptions for `source`.
    pub fn subscriber_count(&self, source: SourceId) -> usize {
        self.shared
            .registry
            .get(&source)
            .map_or(0, |list| list.read().len())
    }

    /// Number of sources with at least one subscription.
    pub fn source_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            enqueued: self.shared.enqueued.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            listener_failures: self.shared.listener_failures.load(Ordering::Relaxed),
            coalesced: self.shared.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Close the queues, let workers drain what is already queued, and join
    /// them. Idempotent.
    pub fn shutdown(&self) {
        for lane in &self.lanes {
            lane.tx.lock().take();
        }
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        if workers.is_empty() {
            return;
        }
        let current = std::thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                // Shutdown from a listener: the worker exits on its own.
                continue;
            }
            if worker.join().is_err() {
                error!("dispatch worker panicked");
            }
        }
        info!(stats = ?self.stats(), "event dispatcher stopped");
    }
}

impl EventSink for Dispatcher {
    fn enqueue(&self, source: SourceId, record: EventRecord) {
        Dispatcher::enqueue(self, source, record);
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn unsubscribe(&self, source: SourceId, id: u64) {
        let removed = self.registry.get(&source).and_then(|entry| {
            let mut list = entry.write();
            let found = list.iter().find(|s| s.id == id).cloned()?;
            let next: Vec<_> = list.iter().filter(|s| s.id != id).cloned().collect();
            *list = Arc::new(next);
            Some(found)
        });
        let Some(subscriber) = removed else {
            return;
        };
        subscriber.active.store(false, Ordering::SeqCst);
        // Listeners never wait on each other; two workers could otherwise
        // block on one another's calls.
        if DELIVERING.with(|d| d.get()) == 0 {
            drop(subscriber.call.lock());
        }
        self.registry.remove_if(&source, |_, list| list.read().is_empty());
        debug!(%source, subscription = id, "unsubscribed");
    }

    fn deliver(&self, event: &Event) {
        let Some(snapshot) = self.registry.get(&event.source).map(|list| list.read().clone()) else {
            return;
        };
        for subscriber in snapshot.iter() {
            if event.seq < subscriber.start_seq || !subscriber.active.load(Ordering::SeqCst) {
                continue;
            }
            let _call = subscriber.call.lock();
            if !subscriber.active.load(Ordering::SeqCst) {
                continue;
            }
            let previous = DELIVERING.with(|d| d.replace(subscriber.id));
            let outcome = catch_unwind(AssertUnwindSafe(|| (subscriber.listener)(event)));
            DELIVERING.with(|d| d.set(previous));

            match outcome {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(panic) => {
                    self.listener_failures.fetch_add(1, Ordering::Relaxed);
                    let failure = BindError::ListenerFailure {
                        source_id: event.source.get(),
                        message: panic_message(&panic),
                    };
                    error!(
                        subscription = subscriber.id,
                        event = event.record.name(),
                        seq = event.seq,
                        "{failure}"
                    );
                }
            }
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Keep only the latest progress record of each kind per source. Survivors
/// stay at their own position; everything else is untouched.
fn coalesce(batch: &mut Vec<Event>) -> usize {
    let mut seen = HashSet::new();
    let mut keep = vec![true; batch.len()];
    for (i, event) in batch.iter().enumerate().rev() {
        if event.record.is_progress()
            && !seen.insert((event.source, std::mem::discriminant(&event.record)))
        {
            keep[i] = false;
        }
    }
    let before = batch.len();
    let mut flags = keep.into_iter();
    batch.retain(|_| flags.next().unwrap_or(true));
    before - batch.len()
}

fn run_worker(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<Event>) {
    let mut batch = Vec::new();
    while let Some(first) = rx.blocking_recv() {
        batch.push(first);
        while batch.len() < MAX_BATCH {
            match rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }
        if shared.coalesce_progress {
            let dropped = coalesce(&mut batch);
            if dropped > 0 {
                shared.coalesced.fetch_add(dropped as u64, Ordering::Relaxed);
                trace!(dropped, "coalesced progress events");
            }
        }
        for event in batch.drain(..) {
            shared.deliver(&event);
        }
    }
    debug!("dispatch worker exiting");
}

// ── Subscription ─────────────────────────────────────────────────────

/// Live registration of one listener. Unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    source: SourceId,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Unsubscribe now. Same as dropping the subscription.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.unsubscribe(self.source, self.id);
        }
    }
}

// ── Latch ────────────────────────────────────────────────────────────

/// Lets an application thread wait for the first event of a source that
/// matches a predicate. Create it before triggering the action it waits
/// for.
pub struct EventLatch {
    slot: Arc<(Mutex<Option<Event>>, Condvar)>,
    _subscription: Subscription,
}

impl EventLatch {
    pub fn new<P>(dispatcher: &Dispatcher, source: SourceId, predicate: P) -> Self
    where
        P: Fn(&EventRecord) -> bool + Send + Sync + 'static,
    {
        let slot: Arc<(Mutex<Option<Event>>, Condvar)> = Arc::new((Mutex::new(None), Condvar::new()));
        let writer = slot.clone();
        let subscription = dispatcher.subscribe(source, move |event| {
            if !predicate(&event.record) {
                return;
            }
            let (lock, ready) = &*writer;
            let mut found = lock.lock();
            if found.is_none() {
                *found = Some(event.clone());
                ready.notify_all();
            }
        });
        Self { slot, _subscription: subscription }
    }

    /// Block until the matching event arrives or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Option<Event> {
        let deadline = Instant::now() + timeout;
        let (lock, ready) = &*self.slot;
        let mut found = lock.lock();
        while found.is_none() {
            if ready.wait_until(&mut found, deadline).timed_out() {
                break;
            }
        }
        found.clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot.0.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::sync::Barrier;

    fn dispatcher(workers: usize, coalesce_progress: bool) -> Dispatcher {
        Dispatcher::new(&DispatchConfig { workers, coalesce_progress }).expect("dispatcher")
    }

    #[test]
    fn per_source_fifo() {
        let d = dispatcher(3, false);
        let source = SourceId::next();
        let (tx, rx) = std_mpsc::channel();
        let _sub = d.subscribe(source, move |e| {
            if let EventRecord::TimeChanged(t) = e.record {
                tx.send(t).ok();
            }
        });
        for t in 0..500 {
            d.enqueue(source, EventRecord::TimeChanged(t));
        }
        let got: Vec<i64> = (0..500).map(|_| rx.recv_timeout(Duration::from_secs(5)).expect("event")).collect();
        assert_eq!(got, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let d = dispatcher(1, false);
        let source = SourceId::next();
        let (gate_tx, gate_rx) = std_mpsc::channel::<()>();
        let gate_rx = Mutex::new(gate_rx);
        // Block the worker so the first event is still queued when the
        // second subscriber registers.
        let _blocker = d.subscribe(source, move |_| {
            gate_rx.lock().recv_timeout(Duration::from_secs(5)).ok();
        });
        d.enqueue(source, EventRecord::Playing);

        let (tx, rx) = std_mpsc::channel();
        let _late = d.subscribe(source, move |e| {
            tx.send(e.record.name()).ok();
        });
        d.enqueue(source, EventRecord::Paused);
        gate_tx.send(()).ok();
        gate_tx.send(()).ok();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).ok(), Some("paused"));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let d = dispatcher(1, false);
        let source = SourceId::next();
        let (tx, rx) = std_mpsc::channel();
        let _bad = d.subscribe(source, |e| {
            if matches!(e.record, EventRecord::Playing) {
                panic!("listener bug");
            }
        });
        let _good = d.subscribe(source, move |e| {
            tx.send(e.record.name()).ok();
        });
        d.enqueue(source, EventRecord::Playing);
        d.enqueue(source, EventRecord::Paused);

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).ok(), Some("playing"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).ok(), Some("paused"));
        d.shutdown();
        assert_eq!(d.stats().listener_failures, 1);
        assert_eq!(d.stats().delivered, 3);
    }

    #[test]
    fn unsubscribe_stops_delivery_and_drop_unsubscribes() {
        let d = dispatcher(2, false);
        let source = SourceId::next();
        let (tx, rx) = std_mpsc::channel();
        let sub = d.subscribe(source, move |_| {
            tx.send(()).ok();
        });
        assert_eq!(d.subscriber_count(source), 1);
        d.unsubscribe(&sub);
        assert_eq!(d.subscriber_count(source), 0);
        d.enqueue(source, EventRecord::Playing);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        let (tx, _rx) = std_mpsc::channel::<()>();
        let second = d.subscribe(source, move |_| {
            tx.send(()).ok();
        });
        drop(second);
        assert_eq!(d.subscriber_count(source), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let d = Arc::new(dispatcher(1, false));
        let source = SourceId::next();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (tx, rx) = std_mpsc::channel();
        let inner = slot.clone();
        let sub = d.subscribe(source, move |_| {
            if let Some(me) = inner.lock().take() {
                drop(me);
            }
            tx.send(()).ok();
        });
        *slot.lock() = Some(sub);
        d.enqueue(source, EventRecord::Playing);
        d.enqueue(source, EventRecord::Paused);

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn registry_forgets_sources_without_subscribers() {
        let d = dispatcher(1, false);
        for _ in 0..10_000 {
            drop(d.subscribe(SourceId::next(), |_| {}));
        }
        assert_eq!(d.source_count(), 0);

        let source = SourceId::next();
        let first = d.subscribe(source, |_| {});
        let second = d.subscribe(source, |_| {});
        first.cancel();
        assert_eq!(d.source_count(), 1);
        assert_eq!(d.subscriber_count(source), 1);
        second.cancel();
        assert_eq!(d.source_count(), 0);
        assert_eq!(d.subscriber_count(source), 0);
    }

    #[test]
    fn listeners_on_different_workers_may_unsubscribe_each_other() {
        let d = dispatcher(2, false);
        let a = SourceId::next();
        let b = loop {
            let candidate = SourceId::next();
            if candidate.get() % 2 != a.get() % 2 {
                break candidate;
            }
        };
        let barrier = Arc::new(Barrier::new(2));
        let slot_a: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_b: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (tx, rx) = std_mpsc::channel();
        let listener = |other: Arc<Mutex<Option<Subscription>>>| {
            let barrier = barrier.clone();
            let tx = tx.clone();
            move |_: &Event| {
                // Both listeners are mid-call before either unsubscribes.
                barrier.wait();
                let other = other.lock().take();
                drop(other);
                tx.send(()).ok();
            }
        };
        *slot_a.lock() = Some(d.subscribe(a, listener(slot_b.clone())));
        *slot_b.lock() = Some(d.subscribe(b, listener(slot_a.clone())));

        d.enqueue(a, EventRecord::Playing);
        d.enqueue(b, EventRecord::Playing);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(d.source_count(), 0);
    }

    #[test]
    fn queued_progress_events_are_coalesced_by_the_worker() {
        let d = dispatcher(1, true);
        let (entered_tx, entered_rx) = std_mpsc::channel::<()>();
        let (gate_tx, gate_rx) = std_mpsc::channel::<()>();
        let gate_rx = Mutex::new(gate_rx);
        let blocker = SourceId::next();
        let _blocker = d.subscribe(blocker, move |_| {
            entered_tx.send(()).ok();
            gate_rx.lock().recv_timeout(Duration::from_secs(5)).ok();
        });

        let source = SourceId::next();
        let (tx, rx) = std_mpsc::channel();
        let _sub = d.subscribe(source, move |e| {
            let time = match e.record {
                EventRecord::TimeChanged(t) => Some(t),
                _ => None,
            };
            tx.send(time).ok();
        });

        d.enqueue(blocker, EventRecord::Playing);
        entered_rx.recv_timeout(Duration::from_secs(5)).expect("worker blocked");
        for t in 1..=5 {
            d.enqueue(source, EventRecord::TimeChanged(t * 100));
        }
        d.enqueue(source, EventRecord::Paused);
        gate_tx.send(()).ok();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).ok(), Some(Some(500)));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).ok(), Some(None));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(d.stats().coalesced, 4);
    }

    #[test]
    fn coalescing_keeps_latest_progress_only() {
        let a = SourceId::next();
        let b = SourceId::next();
        let mk = |source, seq, record| Event { source, seq, record };
        let mut batch = vec![
            mk(a, 0, EventRecord::TimeChanged(1)),
            mk(a, 1, EventRecord::Playing),
            mk(b, 2, EventRecord::TimeChanged(10)),
            mk(a, 3, EventRecord::TimeChanged(2)),
            mk(a, 4, EventRecord::PositionChanged(0.5)),
        ];
        assert_eq!(coalesce(&mut batch), 1);
        let seqs: Vec<u64> = batch.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn latch_returns_first_match() {
        let d = dispatcher(1, false);
        let source = SourceId::next();
        let latch = EventLatch::new(&d, source, |r| matches!(r, EventRecord::MediaEnded));
        d.enqueue(source, EventRecord::Playing);
        d.enqueue(source, EventRecord::MediaEnded);
        let event = latch.wait(Duration::from_secs(5)).expect("ended");
        assert!(matches!(event.record, EventRecord::MediaEnded));
        assert!(latch.is_set());

        let idle = EventLatch::new(&d, SourceId::next(), |_| true);
        assert!(idle.wait(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn enqueue_after_shutdown_is_dropped() {
        let d = dispatcher(1, false);
        d.shutdown();
        d.enqueue(SourceId::next(), EventRecord::Playing);
        assert_eq!(d.stats().enqueued, 0);
    }
}
