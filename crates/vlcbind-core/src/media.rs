use std::ffi::{c_int, CString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use tracing::{debug, warn};
use vlcbind_native::ffi::parse_flag;
use vlcbind_native::RawPtr;

use crate::bridge::LazyBridge;
use crate::dispatch::{EventLatch, Subscription};
use crate::error::{BindError, Result};
use crate::event::{Event, EventCategory, EventRecord, MediaState, MetaKey, ParsedStatus};
use crate::factory::Runtime;
use crate::handle::{HandleKind, NativeHandle, ReleaseOutcome, SourceId};
use crate::media_list::MediaList;

bitflags! {
    /// What [`Media::parse`] may do beyond reading local metadata.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParseFlags: i32 {
        const NETWORK = parse_flag::NETWORK;
        const FETCH_LOCAL = parse_flag::FETCH_LOCAL;
        const FETCH_NETWORK = parse_flag::FETCH_NETWORK;
        const DO_INTERACT = parse_flag::DO_INTERACT;
    }
}

/// A playable item: a location, its metadata and its parse state.
pub struct Media {
    handle: Arc<NativeHandle>,
    runtime: Arc<Runtime>,
    events: LazyBridge,
}

impl Media {
    pub(crate) fn adopt(runtime: Arc<Runtime>, raw: Option<RawPtr>, call: &'static str) -> Result<Self> {
        let handle = Arc::new(NativeHandle::adopt(runtime.api.clone(), HandleKind::Media, raw, call)?);
        let events = LazyBridge::new(handle.clone(), EventCategory::Media);
        Ok(Self { handle, runtime, events })
    }

    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    /// Events of this media are published under this id.
    pub fn source_id(&self) -> SourceId {
        self.handle.source_id()
    }

    pub fn mrl(&self) -> Result<Option<String>> {
        self.handle.call(|api, m| unsafe { api.media_mrl(m) })
    }

    pub fn meta(&self, key: MetaKey) -> Result<Option<String>> {
        self.handle.call(|api, m| unsafe { api.media_meta(m, key.as_raw()) })
    }

    pub fn state(&self) -> Result<MediaState> {
        self.handle.call(|api, m| MediaState::from_raw(unsafe { api.media_state(m) }))
    }

    /// `None` until the duration is known.
    pub fn duration(&self) -> Result<Option<Duration>> {
        let ms = self.handle.call(|api, m| unsafe { api.media_duration(m) })?;
        Ok(u64::try_from(ms).ok().map(Duration::from_millis))
    }

    /// Start asynchronous parsing. Completion is reported by a
    /// `ParsedChanged` event.
    pub fn parse(&self, flags: ParseFlags, timeout: Duration) -> Result<()> {
        let timeout_ms = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
        let rc = self.handle.call(|api, m| unsafe { api.media_parse(m, flags.bits(), timeout_ms) })?;
        if rc != 0 {
            return Err(BindError::NativeCallFailed { call: "libvlc_media_parse_with_options" });
        }
        debug!(source = %self.source_id(), ?flags, "media parse started");
        Ok(())
    }

    pub fn parsed_status(&self) -> Result<ParsedStatus> {
        self.handle.call(|api, m| ParsedStatus::from_raw(unsafe { api.media_parsed_status(m) }))
    }

    /// Items found inside this media (playlist entries, archive members).
    pub fn subitems(&self) -> Result<MediaList> {
        let raw = self.handle.call(|api, m| unsafe { api.media_subitems(m) })?;
        MediaList::adopt(self.runtime.clone(), raw, "libvlc_media_subitems")
    }

    /// Add an input option such as `:no-audio`.
    pub fn add_option(&self, option: &str) -> Result<()> {
        let option = CString::new(option)
            .map_err(|_| BindError::InvalidArgument("media option contains a NUL byte".into()))?;
        self.handle.call(|api, m| unsafe { api.media_add_option(m, &option) })
    }

    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscription = self.runtime.dispatcher.subscribe(self.source_id(), listener);
        self.events.ensure_attached(self.runtime.sink(), self.runtime.policy)?;
        Ok(subscription)
    }

    /// Wait handle for the first event matching `predicate`.
    pub fn latch<P>(&self, predicate: P) -> Result<EventLatch>
    where
        P: Fn(&EventRecord) -> bool + Send + Sync + 'static,
    {
        let latch = EventLatch::new(&self.runtime.dispatcher, self.source_id(), predicate);
        self.events.ensure_attached(self.runtime.sink(), self.runtime.policy)?;
        Ok(latch)
    }

    /// Detach events and drop the native reference. Idempotent.
    pub fn release(&self) -> ReleaseOutcome {
        if let Err(err) = self.events.detach() {
            warn!(source = %self.source_id(), error = %err, "media events not detached");
        }
        self.handle.release()
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }
}

impl Drop for Media {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Media").field("handle", &self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BindingConfig;
    use crate::factory::MediaPlayerFactory;
    use std::sync::mpsc;
    use vlcbind_native::sim::{FailKind, SimulatedNative};

    fn factory() -> (Arc<SimulatedNative>, MediaPlayerFactory) {
        let sim = Arc::new(SimulatedNative::new());
        let factory = MediaPlayerFactory::new(sim.clone(), &BindingConfig::default()).expect("factory");
        (sim, factory)
    }

    #[test]
    fn metadata_and_options() {
        let (sim, factory) = factory();
        let media = factory.new_media("file:///music/track.flac").expect("media");
        let raw = media.handle().with_ptr(|p| p).expect("live");
        sim.set_media_meta(raw, MetaKey::Title.as_raw(), "Track");

        assert_eq!(media.mrl().expect("mrl").as_deref(), Some("file:///music/track.flac"));
        assert_eq!(media.meta(MetaKey::Title).expect("meta").as_deref(), Some("Track"));
        assert_eq!(media.meta(MetaKey::Artist).expect("meta"), None);
        assert_eq!(media.state().expect("state"), MediaState::NothingSpecial);

        media.add_option(":no-audio").expect("option");
        assert_eq!(sim.media_options(raw), vec![":no-audio".to_string()]);
        assert!(matches!(media.add_option("bad\0option"), Err(BindError::InvalidArgument(_))));
    }

    #[test]
    fn parse_reports_duration_and_status() {
        let (sim, factory) = factory();
        let media = factory.new_media("file:///clip.mkv").expect("media");
        let raw = media.handle().with_ptr(|p| p).expect("live");
        sim.set_media_duration(raw, 90_000);
        assert_eq!(media.duration().expect("duration"), None);

        let (tx, rx) = mpsc::channel();
        let _sub = media
            .subscribe(move |e| {
                tx.send(e.record.clone()).ok();
            })
            .expect("subscribe");
        media.parse(ParseFlags::empty(), Duration::from_secs(1)).expect("parse");

        let mut parsed = None;
        while let Ok(record) = rx.recv_timeout(Duration::from_secs(5)) {
            if let EventRecord::ParsedChanged(status) = record {
                parsed = Some(status);
                break;
            }
        }
        assert_eq!(parsed, Some(ParsedStatus::Done));
        assert_eq!(media.parsed_status().expect("status"), ParsedStatus::Done);
        assert_eq!(media.duration().expect("duration"), Some(Duration::from_secs(90)));
    }

    #[test]
    fn injected_parse_failure_is_reported_as_status() {
        let (sim, factory) = factory();
        let media = factory.new_media("file:///broken.avi").expect("media");
        let latch = media
            .latch(|r| matches!(r, EventRecord::ParsedChanged(_)))
            .expect("latch");
        sim.fail_next(FailKind::Parse);
        media.parse(ParseFlags::NETWORK, Duration::from_millis(500)).expect("parse started");
        let event = latch.wait(Duration::from_secs(5)).expect("parsed");
        assert!(matches!(event.record, EventRecord::ParsedChanged(ParsedStatus::Failed)));
    }

    #[test]
    fn release_is_idempotent_and_blocks_further_calls() {
        let (sim, factory) = factory();
        let media = factory.new_media("file:///a.ogg").expect("media");
        let raw = media.handle().with_ptr(|p| p).expect("live");
        assert_eq!(media.release(), ReleaseOutcome::Released);
        assert_eq!(media.release(), ReleaseOutcome::AlreadyReleased);
        assert!(sim.is_freed(raw));
        assert!(matches!(media.mrl(), Err(BindError::UseAfterRelease { kind: HandleKind::Media })));
        assert!(sim.violations().is_empty());
    }
}
