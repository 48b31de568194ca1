//! Service discovery: media sources (UPnP, SMB, SAP, ...) and renderers
//! (Chromecast and friends).

use std::ffi::CString;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};
use vlcbind_native::RawPtr;

use crate::bridge::{BridgeState, LazyBridge};
use crate::dispatch::Subscription;
use crate::error::{BindError, Result};
use crate::event::{Event, EventCategory, EventRecord};
use crate::factory::Runtime;
use crate::handle::{HandleKind, NativeHandle, ReleaseOutcome, SourceId};
use crate::media_list::MediaList;

pub(crate) fn service_name(name: &str) -> Result<CString> {
    if name.is_empty() {
        return Err(BindError::InvalidArgument("discovery service name is empty".into()));
    }
    CString::new(name).map_err(|_| BindError::InvalidArgument("service name contains a NUL byte".into()))
}

// ── Media discovery ──────────────────────────────────────────────────

/// Browses one media discovery service. Found media accumulate in
/// [`media_list`](Self::media_list).
///
/// LibVLC 3 no longer fires discoverer events, so `DiscovererStarted` and
/// `DiscovererEnded` are published by [`start`](Self::start) and
/// [`stop`](Self::stop) themselves.
pub struct MediaDiscoverer {
    handle: Arc<NativeHandle>,
    runtime: Arc<Runtime>,
    name: String,
    running: AtomicBool,
}

impl MediaDiscoverer {
    pub(crate) fn adopt(runtime: Arc<Runtime>, raw: Option<RawPtr>, name: &str) -> Result<Self> {
        let handle = Arc::new(NativeHandle::adopt(
            runtime.api.clone(),
            HandleKind::Discoverer,
            raw,
            "libvlc_media_discoverer_new",
        )?);
        Ok(Self { handle, runtime, name: name.to_string(), running: AtomicBool::new(false) })
    }

    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn source_id(&self) -> SourceId {
        self.handle.source_id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> Result<()> {
        let rc = self.handle.call(|api, d| unsafe { api.discoverer_start(d) })?;
        if rc != 0 {
            return Err(BindError::NativeCallFailed { call: "libvlc_media_discoverer_start" });
        }
        if !self.running.swap(true, Ordering::AcqRel) {
            info!(service = %self.name, source = %self.source_id(), "media discovery started");
            self.runtime.dispatcher.enqueue(self.source_id(), EventRecord::DiscovererStarted);
        }
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.handle.call(|api, d| unsafe { api.discoverer_stop(d) })?;
        if self.running.swap(false, Ordering::AcqRel) {
            info!(service = %self.name, source = %self.source_id(), "media discovery stopped");
            self.runtime.dispatcher.enqueue(self.source_id(), EventRecord::DiscovererEnded);
        }
        Ok(())
    }

    pub fn is_running(&self) -> Result<bool> {
        self.handle.call(|api, d| unsafe { api.discoverer_is_running(d) })
    }

    /// The list discovered media are added to, as a new owning reference.
    pub fn media_list(&self) -> Result<MediaList> {
        let raw = self.handle.call(|api, d| unsafe { api.discoverer_media_list(d) })?;
        MediaList::adopt(self.runtime.clone(), raw, "libvlc_media_discoverer_media_list")
    }

    /// Listen for `DiscovererStarted` / `DiscovererEnded`. Item arrivals are
    /// reported on [`media_list`](Self::media_list).
    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if self.handle.is_released() {
            return Err(BindError::UseAfterRelease { kind: HandleKind::Discoverer });
        }
        Ok(self.runtime.dispatcher.subscribe(self.source_id(), listener))
    }

    /// Stop if running, then drop the native reference. Idempotent.
    pub fn release(&self) -> ReleaseOutcome {
        if self.running.load(Ordering::Acquire) {
            if let Err(err) = self.stop() {
                warn!(service = %self.name, error = %err, "media discoverer not stopped");
            }
        }
        self.handle.release()
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }
}

impl Drop for MediaDiscoverer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for MediaDiscoverer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDiscoverer")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}

// ── Renderer discovery ───────────────────────────────────────────────

/// Finds renderers on the local network. Each one is announced as a
/// `RendererItemAdded` event; with [`HoldPolicy::HoldDiscovered`] the item
/// in the event is already held and can be passed to
/// [`MediaPlayer::set_renderer`] later.
///
/// [`HoldPolicy::HoldDiscovered`]: crate::HoldPolicy::HoldDiscovered
/// [`MediaPlayer::set_renderer`]: crate::MediaPlayer::set_renderer
pub struct RendererDiscoverer {
    handle: Arc<NativeHandle>,
    runtime: Arc<Runtime>,
    events: LazyBridge,
    name: String,
}

impl RendererDiscoverer {
    pub(crate) fn adopt(runtime: Arc<Runtime>, raw: Option<RawPtr>, name: &str) -> Result<Self> {
        let handle = Arc::new(NativeHandle::adopt(
            runtime.api.clone(),
            HandleKind::RendererDiscoverer,
            raw,
            "libvlc_renderer_discoverer_new",
        )?);
        let events = LazyBridge::new(handle.clone(), EventCategory::RendererDiscoverer);
        Ok(Self { handle, runtime, events, name: name.to_string() })
    }

    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn source_id(&self) -> SourceId {
        self.handle.source_id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe before starting, or early announcements are missed.
    pub fn start(&self) -> Result<()> {
        let rc = self.handle.call(|api, d| unsafe { api.renderer_discoverer_start(d) })?;
        if rc != 0 {
            return Err(BindError::NativeCallFailed { call: "libvlc_renderer_discoverer_start" });
        }
        info!(service = %self.name, source = %self.source_id(), "renderer discovery started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.handle.call(|api, d| unsafe { api.renderer_discoverer_stop(d) })
    }

    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscription = self.runtime.dispatcher.subscribe(self.source_id(), listener);
        self.events.ensure_attached(self.runtime.sink(), self.runtime.policy)?;
        Ok(subscription)
    }

    pub fn events_state(&self) -> BridgeState {
        self.events.state()
    }

    pub fn release(&self) -> ReleaseOutcome {
        if let Err(err) = self.events.detach() {
            warn!(service = %self.name, error = %err, "renderer discoverer events not detached");
        }
        self.handle.release()
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }
}

impl Drop for RendererDiscoverer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for RendererDiscoverer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererDiscoverer")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("events", &self.events_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BindingConfig;
    use crate::factory::MediaPlayerFactory;
    use crate::lifecycle::{HoldPolicy, ItemRef, RendererFlags};
    use std::sync::mpsc;
    use std::time::Duration;
    use vlcbind_native::ffi::renderer_flag;
    use vlcbind_native::sim::SimulatedNative;

    fn factory(policy: HoldPolicy) -> (Arc<SimulatedNative>, MediaPlayerFactory) {
        let sim = Arc::new(SimulatedNative::new());
        let mut config = BindingConfig::default();
        config.events.hold_policy = policy;
        let factory = MediaPlayerFactory::new(sim.clone(), &config).expect("factory");
        (sim, factory)
    }

    fn discovered(rd: &RendererDiscoverer) -> (Subscription, mpsc::Receiver<ItemRef>) {
        let (tx, rx) = mpsc::channel();
        let sub = rd
            .subscribe(move |e| {
                if let EventRecord::RendererItemAdded(item) = &e.record {
                    tx.send(item.clone()).ok();
                }
            })
            .expect("subscribe");
        (sub, rx)
    }

    #[test]
    fn media_discoverer_publishes_start_and_end() {
        let (sim, factory) = factory(HoldPolicy::Transient);
        let discoverer = factory.new_discoverer("upnp").expect("discoverer");
        let raw = discoverer.handle().with_ptr(|p| p).expect("live");

        let (tx, rx) = mpsc::channel();
        let _sub = discoverer
            .subscribe(move |e| {
                tx.send(e.record.name()).ok();
            })
            .expect("subscribe");

        discoverer.start().expect("start");
        assert!(discoverer.is_running().expect("running"));
        sim.add_discovered_media(raw, "upnp://192.168.1.4/movie.mkv");
        let list = discoverer.media_list().expect("list");
        assert_eq!(list.len().expect("len"), 1);
        discoverer.stop().expect("stop");
        discoverer.stop().expect("second stop");

        let seen: Vec<_> = (0..2).filter_map(|_| rx.recv_timeout(Duration::from_secs(5)).ok()).collect();
        assert_eq!(seen, ["discoverer-started", "discoverer-ended"]);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn empty_service_name_is_rejected() {
        let (_sim, factory) = factory(HoldPolicy::Transient);
        assert!(matches!(factory.new_discoverer(""), Err(BindError::InvalidArgument(_))));
        assert!(matches!(factory.new_renderer_discoverer("a\0b"), Err(BindError::InvalidArgument(_))));
    }

    #[test]
    fn held_renderer_survives_removal() {
        let (sim, factory) = factory(HoldPolicy::HoldDiscovered);
        let rd = factory.new_renderer_discoverer("microdns").expect("renderer discoverer");
        let raw = rd.handle().with_ptr(|p| p).expect("live");
        let (_sub, rx) = discovered(&rd);
        rd.start().expect("start");

        let flags = renderer_flag::CAN_AUDIO | renderer_flag::CAN_VIDEO;
        let item_raw = sim.add_renderer_item(raw, "Living Room", "chromecast", flags).expect("item");
        let item = rx.recv_timeout(Duration::from_secs(5)).expect("added");
        assert!(item.is_held());
        assert_eq!(item.snapshot().name(), Some("Living Room"));

        sim.remove_renderer_item(raw, item_raw);
        assert!(!sim.is_freed(item_raw));

        let held = item.hold().expect("held");
        assert_eq!(held.name().expect("name").as_deref(), Some("Living Room"));
        assert_eq!(held.renderer_kind().expect("kind").as_deref(), Some("chromecast"));
        assert!(held.flags().expect("flags").contains(RendererFlags::VIDEO));

        let player = factory.new_player().expect("player");
        player.set_renderer(Some(&*held)).expect("renderer");
        player.set_renderer(None).expect("local");

        assert!(sim.violations().is_empty());
    }

    #[test]
    fn transient_renderer_expires_with_its_callback() {
        let (sim, factory) = factory(HoldPolicy::Transient);
        let rd = factory.new_renderer_discoverer("microdns").expect("renderer discoverer");
        let raw = rd.handle().with_ptr(|p| p).expect("live");
        let (_sub, rx) = discovered(&rd);
        rd.start().expect("start");

        sim.add_renderer_item(raw, "Kitchen", "chromecast", renderer_flag::CAN_AUDIO).expect("item");
        let item = rx.recv_timeout(Duration::from_secs(5)).expect("added");
        assert!(!item.is_held());
        assert_eq!(item.snapshot().name(), Some("Kitchen"));
        assert!(matches!(item.hold(), Err(BindError::ItemExpired { .. })));
        assert!(sim.violations().is_empty());
    }
}
