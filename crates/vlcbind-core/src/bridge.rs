//! Native event bridge.
//!
//! One [`EventBridge`] registers a single trampoline for every event type of
//! an [`EventCategory`] on one native object. The trampoline runs on
//! whatever thread the native library fires from; it only translates the
//! event into an owned [`EventRecord`] and hands it to an [`EventSink`].

use std::cell::Cell;
use std::ffi::c_void;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};
use vlcbind_native::ffi::libvlc_event_t;
use vlcbind_native::NativeApi;

use crate::dispatch::EventSink;
use crate::error::{BindError, Result};
use crate::event::{EventCategory, Translator};
use crate::handle::{NativeHandle, SourceId};
use crate::lifecycle::{CallbackScope, HoldPolicy};

/// Lifecycle of an [`EventBridge`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Unattached,
    Attached,
    Detaching,
    Detached,
}

impl BridgeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => BridgeState::Unattached,
            1 => BridgeState::Attached,
            2 => BridgeState::Detaching,
            _ => BridgeState::Detached,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BridgeState::Unattached => "unattached",
            BridgeState::Attached => "attached",
            BridgeState::Detaching => "detaching",
            BridgeState::Detached => "detached",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

thread_local! {
    /// Bridge whose trampoline is running on this thread (0 = none).
    static ACTIVE_BRIDGE: Cell<usize> = const { Cell::new(0) };
}

/// State reachable from the native `data` pointer.
struct BridgeShared {
    api: Arc<dyn NativeApi>,
    source: SourceId,
    category: EventCategory,
    sink: Arc<dyn EventSink>,
    policy: HoldPolicy,
    state: AtomicU8,
    in_flight: AtomicUsize,
    forwarded: AtomicU64,
    drain: Mutex<()>,
    drained: Condvar,
}

impl BridgeShared {
    fn state(&self) -> BridgeState {
        BridgeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: BridgeState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Translate and enqueue one event inside a fresh callback scope.
    unsafe fn forward(&self, event: &libvlc_event_t) {
        let scope = CallbackScope::open();
        let translator = Translator { api: &self.api, scope: scope.token(), policy: self.policy };
        if let Some(record) = translator.translate(event) {
            trace!(source = %self.source, event = record.name(), "native event");
            self.sink.enqueue(self.source, record);
            self.forwarded.fetch_add(1, Ordering::Relaxed);
        }
        scope.close();
    }

    fn leave(&self) {
        let _drain = self.drain.lock();
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_all();
        }
    }
}

unsafe extern "C" fn bridge_trampoline(event: *const libvlc_event_t, data: *mut c_void) {
    if event.is_null() || data.is_null() {
        return;
    }
    let raw = data as *const BridgeShared;
    // The owning bridge keeps its reference until detach has returned;
    // take our own for the rest of this call.
    Arc::increment_strong_count(raw);
    let shared = Arc::from_raw(raw);

    shared.in_flight.fetch_add(1, Ordering::SeqCst);
    if shared.state() == BridgeState::Attached {
        let previous = ACTIVE_BRIDGE.with(|a| a.replace(raw as usize));
        let outcome = catch_unwind(AssertUnwindSafe(|| shared.forward(&*event)));
        ACTIVE_BRIDGE.with(|a| a.set(previous));
        if outcome.is_err() {
            error!(
                source = %shared.source,
                category = shared.category.as_str(),
                event_type = (*event).type_,
                "panic while translating native event; event dropped"
            );
        }
    }
    shared.leave();
}

/// Per-object registration of the trampoline for one event category.
pub struct EventBridge {
    shared: Arc<BridgeShared>,
    handle: Arc<NativeHandle>,
    /// Serialises attach and detach.
    transition: Mutex<()>,
}

impl EventBridge {
    pub fn new(
        handle: Arc<NativeHandle>,
        category: EventCategory,
        sink: Arc<dyn EventSink>,
        policy: HoldPolicy,
    ) -> Result<Self> {
        if handle.kind() != category.owner_kind() {
            return Err(BindError::InvalidArgument(format!(
                "{} events are not emitted by a {}",
                category.as_str(),
                handle.kind()
            )));
        }
        let shared = Arc::new(BridgeShared {
            api: handle.api().clone(),
            source: handle.source_id(),
            category,
            sink,
            policy,
            state: AtomicU8::new(BridgeState::Unattached as u8),
            in_flight: AtomicUsize::new(0),
            forwarded: AtomicU64::new(0),
            drain: Mutex::new(()),
            drained: Condvar::new(),
        });
        Ok(Self { shared, handle, transition: Mutex::new(()) })
    }

    fn data(&self) -> *mut c_void {
        Arc::as_ptr(&self.shared) as *mut c_void
    }

    /// Register the trampoline for every event type of the category. On a
    /// partial failure the registrations made so far are rolled back and the
    /// bridge stays unattached.
    pub fn attach(&self) -> Result<()> {
        let _transition = self.transition.lock();
        let state = self.shared.state();
        if state != BridgeState::Unattached {
            return Err(BindError::BridgeState { state: state.as_str(), action: "attach" });
        }

        let category = self.shared.category;
        let data = self.data();
        let api = self.shared.api.clone();
        self.handle.with_ptr(|obj| {
            let manager = unsafe { api.event_manager(category.owner_kind(), obj) }
                .ok_or(BindError::NativeCallFailed { call: "libvlc_event_manager" })?;
            let types = category.event_types();
            for (done, &event_type) in types.iter().enumerate() {
                let rc = unsafe { api.event_attach(manager, event_type, bridge_trampoline, data) };
                if rc != 0 {
                    warn!(
                        source = %self.shared.source,
                        category = category.as_str(),
                        event_type,
                        "event registration failed; rolling back"
                    );
                    for &registered in &types[..done] {
                        unsafe { api.event_detach(manager, registered, bridge_trampoline, data) };
                    }
                    return Err(BindError::NativeCallFailed { call: "libvlc_event_attach" });
                }
            }
            Ok(())
        })??;

        self.shared.set_state(BridgeState::Attached);
        debug!(source = %self.shared.source, category = category.as_str(), "event bridge attached");
        Ok(())
    }

    /// Deregister and wait until no trampoline of this bridge is running.
    ///
    /// Detaching an unattached bridge just marks it detached. Calling this
    /// from inside one of the bridge's own callbacks fails instead of
    /// waiting on itself.
    pub fn detach(&self) -> Result<()> {
        if ACTIVE_BRIDGE.with(|a| a.get()) == Arc::as_ptr(&self.shared) as usize {
            return Err(BindError::BridgeState { state: "dispatching", action: "detach" });
        }
        let _transition = self.transition.lock();
        match self.shared.state() {
            BridgeState::Detached => return Ok(()),
            BridgeState::Unattached => {
                self.shared.set_state(BridgeState::Detached);
                return Ok(());
            }
            BridgeState::Attached | BridgeState::Detaching => {}
        }

        self.shared.set_state(BridgeState::Detaching);
        let category = self.shared.category;
        let data = self.data();
        let api = self.shared.api.clone();
        let deregistered = self.handle.with_ptr(|obj| {
            if let Some(manager) = unsafe { api.event_manager(category.owner_kind(), obj) } {
                for &event_type in category.event_types() {
                    unsafe { api.event_detach(manager, event_type, bridge_trampoline, data) };
                }
            }
        });
        if deregistered.is_err() {
            // The native object outlives this handle elsewhere and may still
            // call us; the callback state must outlive it too.
            warn!(
                source = %self.shared.source,
                "object released before its event bridge was detached; leaking callback state"
            );
            std::mem::forget(self.shared.clone());
        }

        let mut drain = self.shared.drain.lock();
        while self.shared.in_flight.load(Ordering::SeqCst) > 0 {
            self.shared.drained.wait(&mut drain);
        }
        drop(drain);

        self.shared.set_state(BridgeState::Detached);
        debug!(
            source = %self.shared.source,
            category = category.as_str(),
            forwarded = self.shared.forwarded.load(Ordering::Relaxed),
            "event bridge detached"
        );
        Ok(())
    }

    pub fn state(&self) -> BridgeState {
        self.shared.state()
    }

    pub fn source_id(&self) -> SourceId {
        self.shared.source
    }

    pub fn category(&self) -> EventCategory {
        self.shared.category
    }

    /// Trampolines of this bridge currently running.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Records handed to the sink so far.
    pub fn forwarded(&self) -> u64 {
        self.shared.forwarded.load(Ordering::Relaxed)
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        if let Err(err) = self.detach() {
            error!(source = %self.shared.source, error = %err, "event bridge dropped while dispatching; leaking callback state");
            std::mem::forget(self.shared.clone());
        }
    }
}

impl fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("source", &self.shared.source)
            .field("category", &self.shared.category)
            .field("state", &self.state())
            .finish()
    }
}

// ── Lazy attachment ──────────────────────────────────────────────────

/// A bridge created on first subscription. Wrappers embed one per event
/// category they expose.
pub(crate) struct LazyBridge {
    handle: Arc<NativeHandle>,
    category: EventCategory,
    bridge: Mutex<Option<EventBridge>>,
}

impl LazyBridge {
    pub fn new(handle: Arc<NativeHandle>, category: EventCategory) -> Self {
        Self { handle, category, bridge: Mutex::new(None) }
    }

    pub fn ensure_attached(&self, sink: Arc<dyn EventSink>, policy: HoldPolicy) -> Result<()> {
        let mut slot = self.bridge.lock();
        if slot.is_some() {
            return Ok(());
        }
        if self.handle.is_released() {
            return Err(BindError::UseAfterRelease { kind: self.handle.kind() });
        }
        let bridge = EventBridge::new(self.handle.clone(), self.category, sink, policy)?;
        bridge.attach()?;
        *slot = Some(bridge);
        Ok(())
    }

    pub fn detach(&self) -> Result<()> {
        let bridge = self.bridge.lock().take();
        match bridge {
            Some(bridge) => bridge.detach(),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.bridge.lock().as_ref().map_or(BridgeState::Unattached, EventBridge::state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventRecord;
    use crate::handle::HandleKind;
    use vlcbind_native::ffi::event_type as ev;
    use vlcbind_native::sim::{FailKind, Payload, SimulatedNative};

    #[derive(Default)]
    struct Collect(Mutex<Vec<(SourceId, EventRecord)>>);

    impl EventSink for Collect {
        fn enqueue(&self, source: SourceId, record: EventRecord) {
            self.0.lock().push((source, record));
        }
    }

    fn player() -> (Arc<SimulatedNative>, Arc<NativeHandle>) {
        let sim = Arc::new(SimulatedNative::new());
        let inst = sim.new_instance(&[]).expect("instance");
        let raw = unsafe { sim.player_new(inst) };
        let api: Arc<dyn NativeApi> = sim.clone();
        let handle = NativeHandle::adopt(api, HandleKind::Player, raw, "player_new").expect("player");
        (sim, Arc::new(handle))
    }

    #[test]
    fn attach_registers_every_type_and_detach_removes_them() {
        let (sim, handle) = player();
        let raw = handle.with_ptr(|p| p).expect("live");
        let sink = Arc::new(Collect::default());
        let bridge = EventBridge::new(handle.clone(), EventCategory::Player, sink.clone(), HoldPolicy::Transient)
            .expect("bridge");
        bridge.attach().expect("attach");
        assert_eq!(bridge.state(), BridgeState::Attached);
        assert_eq!(sim.registered_callbacks(raw), EventCategory::Player.event_types().len());

        sim.fire_raw(raw, ev::MEDIA_PLAYER_TIME_CHANGED, Payload::Time(42));
        bridge.detach().expect("detach");
        assert_eq!(bridge.state(), BridgeState::Detached);
        assert_eq!(sim.registered_callbacks(raw), 0);

        sim.fire_raw(raw, ev::MEDIA_PLAYER_TIME_CHANGED, Payload::Time(43));
        let got = sink.0.lock();
        assert_eq!(got.len(), 1);
        assert!(matches!(got[0].1, EventRecord::TimeChanged(42)));
        assert_eq!(got[0].0, handle.source_id());
    }

    #[test]
    fn failed_registration_rolls_back() {
        let (sim, handle) = player();
        let raw = handle.with_ptr(|p| p).expect("live");
        sim.fail_attach_after(3);
        let bridge = EventBridge::new(handle, EventCategory::Player, Arc::new(Collect::default()), HoldPolicy::Transient)
            .expect("bridge");
        let err = bridge.attach().unwrap_err();
        assert!(matches!(err, BindError::NativeCallFailed { call: "libvlc_event_attach" }));
        assert_eq!(bridge.state(), BridgeState::Unattached);
        assert_eq!(sim.registered_callbacks(raw), 0);
    }

    #[test]
    fn injected_attach_failure_is_reported() {
        let (sim, handle) = player();
        sim.fail_next(FailKind::EventAttach);
        let bridge = EventBridge::new(handle, EventCategory::Player, Arc::new(Collect::default()), HoldPolicy::Transient)
            .expect("bridge");
        assert!(bridge.attach().is_err());
    }

    #[test]
    fn category_must_match_owner() {
        let (_sim, handle) = player();
        let err = EventBridge::new(handle, EventCategory::Media, Arc::new(Collect::default()), HoldPolicy::Transient)
            .unwrap_err();
        assert!(matches!(err, BindError::InvalidArgument(_)));
    }

    #[test]
    fn attach_twice_is_a_state_error() {
        let (_sim, handle) = player();
        let bridge = EventBridge::new(handle, EventCategory::Player, Arc::new(Collect::default()), HoldPolicy::Transient)
            .expect("bridge");
        bridge.attach().expect("attach");
        assert!(matches!(
            bridge.attach(),
            Err(BindError::BridgeState { state: "attached", action: "attach" })
        ));
        bridge.detach().expect("detach");
        assert!(bridge.attach().is_err());
    }

    /// Sink that detaches its own bridge from inside the callback.
    struct SelfDetach {
        bridge: Mutex<Option<Arc<EventBridge>>>,
        outcome: Mutex<Option<Result<()>>>,
    }

    impl EventSink for SelfDetach {
        fn enqueue(&self, _source: SourceId, _record: EventRecord) {
            if let Some(bridge) = self.bridge.lock().clone() {
                *self.outcome.lock() = Some(bridge.detach());
            }
        }
    }

    #[test]
    fn detach_from_own_callback_is_refused() {
        let (sim, handle) = player();
        let raw = handle.with_ptr(|p| p).expect("live");
        let sink = Arc::new(SelfDetach { bridge: Mutex::new(None), outcome: Mutex::new(None) });
        let bridge = Arc::new(
            EventBridge::new(handle, EventCategory::Player, sink.clone(), HoldPolicy::Transient).expect("bridge"),
        );
        bridge.attach().expect("attach");
        *sink.bridge.lock() = Some(bridge.clone());

        sim.fire_raw(raw, ev::MEDIA_PLAYER_PLAYING, Payload::None);
        assert!(matches!(
            sink.outcome.lock().take(),
            Some(Err(BindError::BridgeState { action: "detach", .. }))
        ));
        sink.bridge.lock().take();
        bridge.detach().expect("detach from outside");
    }

    #[test]
    fn dropping_an_attached_bridge_detaches() {
        let (sim, handle) = player();
        let raw = handle.with_ptr(|p| p).expect("live");
        let bridge = EventBridge::new(handle, EventCategory::Player, Arc::new(Collect::default()), HoldPolicy::Transient)
            .expect("bridge");
        bridge.attach().expect("attach");
        drop(bridge);
        assert_eq!(sim.registered_callbacks(raw), 0);
    }

    #[test]
    fn lazy_bridge_attaches_once() {
        let (sim, handle) = player();
        let raw = handle.with_ptr(|p| p).expect("live");
        let lazy = LazyBridge::new(handle, EventCategory::Player);
        let sink: Arc<dyn EventSink> = Arc::new(Collect::default());
        lazy.ensure_attached(sink.clone(), HoldPolicy::Transient).expect("attach");
        lazy.ensure_attached(sink, HoldPolicy::Transient).expect("noop");
        assert_eq!(sim.registered_callbacks(raw), EventCategory::Player.event_types().len());
        assert_eq!(lazy.state(), BridgeState::Attached);
        lazy.detach().expect("detach");
        assert_eq!(sim.registered_callbacks(raw), 0);
    }
}
