use std::ffi::c_int;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use vlcbind_native::RawPtr;

use crate::bridge::{BridgeState, LazyBridge};
use crate::dispatch::{EventLatch, Subscription};
use crate::error::{BindError, Result};
use crate::event::{Event, EventCategory, EventRecord, MediaState};
use crate::factory::Runtime;
use crate::frame::{RenderCallback, VideoSurface};
use crate::handle::{HandleKind, NativeHandle, ReleaseOutcome, SourceId};
use crate::lifecycle::HeldItem;
use crate::media::Media;
use crate::PlatformWindow;

/// Highest volume the native audio output accepts, in percent.
pub const MAX_VOLUME: u32 = 200;

/// Plays one [`Media`] at a time.
pub struct MediaPlayer {
    handle: Arc<NativeHandle>,
    runtime: Arc<Runtime>,
    events: LazyBridge,
    surface: Mutex<Option<VideoSurface>>,
    /// Surfaces replaced while a video output was running. The output still
    /// calls into them until the player stops.
    retired: Mutex<Vec<VideoSurface>>,
}

fn millis(value: i64) -> Option<Duration> {
    u64::try_from(value).ok().map(Duration::from_millis)
}

impl MediaPlayer {
    pub(crate) fn adopt(runtime: Arc<Runtime>, raw: Option<RawPtr>) -> Result<Self> {
        let handle = Arc::new(NativeHandle::adopt(
            runtime.api.clone(),
            HandleKind::Player,
            raw,
            "libvlc_media_player_new",
        )?);
        let events = LazyBridge::new(handle.clone(), EventCategory::Player);
        Ok(Self {
            handle,
            runtime,
            events,
            surface: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
        })
    }

    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn source_id(&self) -> SourceId {
        self.handle.source_id()
    }

    // ── Media ────────────────────────────────────────────────────────

    /// Replace the current media. The player takes its own reference, so
    /// `media` may be released afterwards.
    pub fn set_media(&self, media: Option<&Media>) -> Result<()> {
        match media {
            Some(media) => media
                .handle()
                .with_ptr(|m| self.handle.call(|api, p| unsafe { api.player_set_media(p, Some(m)) }))??,
            None => self.handle.call(|api, p| unsafe { api.player_set_media(p, None) })?,
        }
        Ok(())
    }

    /// The current media as a new owning reference.
    pub fn media(&self) -> Result<Option<Media>> {
        match self.handle.call(|api, p| unsafe { api.player_media(p) })? {
            Some(raw) => Media::adopt(self.runtime.clone(), Some(raw), "libvlc_media_player_get_media").map(Some),
            None => Ok(None),
        }
    }

    // ── Transport ────────────────────────────────────────────────────

    pub fn play(&self) -> Result<()> {
        let rc = self.handle.call(|api, p| unsafe { api.player_play(p) })?;
        if rc != 0 {
            return Err(BindError::NativeCallFailed { call: "libvlc_media_player_play" });
        }
        debug!(source = %self.source_id(), "play");
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.set_pause(true)
    }

    pub fn resume(&self) -> Result<()> {
        self.set_pause(false)
    }

    pub fn set_pause(&self, pause: bool) -> Result<()> {
        self.handle.call(|api, p| unsafe { api.player_set_pause(p, pause) })
    }

    /// Stop playback. The video output is torn down before this returns,
    /// which frees any surfaces replaced while it was running.
    pub fn stop(&self) -> Result<()> {
        self.handle.call(|api, p| unsafe { api.player_stop(p) })?;
        self.drop_retired();
        Ok(())
    }

    pub fn is_playing(&self) -> Result<bool> {
        self.handle.call(|api, p| unsafe { api.player_is_playing(p) })
    }

    pub fn state(&self) -> Result<MediaState> {
        self.handle.call(|api, p| MediaState::from_raw(unsafe { api.player_state(p) }))
    }

    /// Advance one video frame while paused.
    pub fn next_frame(&self) -> Result<()> {
        self.handle.call(|api, p| unsafe { api.player_next_frame(p) })
    }

    // ── Position ─────────────────────────────────────────────────────

    /// Playback time; `None` without media.
    pub fn time(&self) -> Result<Option<Duration>> {
        Ok(millis(self.handle.call(|api, p| unsafe { api.player_time(p) })?))
    }

    /// Seek to `time`.
    pub fn set_time(&self, time: Duration) -> Result<()> {
        let ms = i64::try_from(time.as_millis())
            .map_err(|_| BindError::InvalidArgument("seek target out of range".into()))?;
        self.handle.call(|api, p| unsafe { api.player_set_time(p, ms) })
    }

    /// Position as a fraction of the length, in `0.0..=1.0`.
    pub fn position(&self) -> Result<f32> {
        self.handle.call(|api, p| unsafe { api.player_position(p) })
    }

    pub fn set_position(&self, position: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&position) {
            return Err(BindError::InvalidArgument(format!("position {position} outside 0..=1")));
        }
        self.handle.call(|api, p| unsafe { api.player_set_position(p, position) })
    }

    pub fn length(&self) -> Result<Option<Duration>> {
        Ok(millis(self.handle.call(|api, p| unsafe { api.player_length(p) })?))
    }

    pub fn is_seekable(&self) -> Result<bool> {
        self.handle.call(|api, p| unsafe { api.player_is_seekable(p) })
    }

    pub fn can_pause(&self) -> Result<bool> {
        self.handle.call(|api, p| unsafe { api.player_can_pause(p) })
    }

    pub fn rate(&self) -> Result<f32> {
        self.handle.call(|api, p| unsafe { api.player_rate(p) })
    }

    pub fn set_rate(&self, rate: f32) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(BindError::InvalidArgument(format!("playback rate {rate} must be positive")));
        }
        let rc = self.handle.call(|api, p| unsafe { api.player_set_rate(p, rate) })?;
        if rc != 0 {
            return Err(BindError::NativeCallFailed { call: "libvlc_media_player_set_rate" });
        }
        Ok(())
    }

    // ── Audio ────────────────────────────────────────────────────────

    /// Volume in percent; `None` while no audio output exists.
    pub fn volume(&self) -> Result<Option<u32>> {
        let volume = self.handle.call(|api, p| unsafe { api.player_volume(p) })?;
        Ok(u32::try_from(volume).ok())
    }

    /// Set the volume in percent, `0..=200`.
    pub fn set_volume(&self, volume: u32) -> Result<()> {
        if volume > MAX_VOLUME {
            return Err(BindError::InvalidArgument(format!("volume {volume} above {MAX_VOLUME}")));
        }
        let rc = self.handle.call(|api, p| unsafe { api.player_set_volume(p, volume as c_int) })?;
        if rc != 0 {
            return Err(BindError::NativeCallFailed { call: "libvlc_audio_set_volume" });
        }
        Ok(())
    }

    /// `None` while no audio output exists.
    pub fn is_muted(&self) -> Result<Option<bool>> {
        let muted = self.handle.call(|api, p| unsafe { api.player_mute(p) })?;
        Ok(match muted {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        })
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.handle.call(|api, p| unsafe { api.player_set_mute(p, muted) })
    }

    // ── Output ───────────────────────────────────────────────────────

    /// Render into a native window instead of a [`VideoSurface`].
    pub fn set_video_window(&self, window: PlatformWindow) -> Result<()> {
        self.handle.call(|api, p| unsafe { api.player_set_window(p, window) })
    }

    /// Send output to a discovered renderer, or back to local output with
    /// `None`. Must be called before playback starts.
    pub fn set_renderer(&self, renderer: Option<&HeldItem>) -> Result<()> {
        let rc = match renderer {
            Some(item) => {
                if item.kind() != HandleKind::RendererItem {
                    return Err(BindError::InvalidArgument(format!("{} is not a renderer item", item.kind())));
                }
                item.handle()
                    .with_ptr(|r| self.handle.call(|api, p| unsafe { api.player_set_renderer(p, Some(r)) }))??
            }
            None => self.handle.call(|api, p| unsafe { api.player_set_renderer(p, None) })?,
        };
        if rc != 0 {
            return Err(BindError::NativeCallFailed { call: "libvlc_media_player_set_renderer" });
        }
        info!(
            source = %self.source_id(),
            renderer = renderer.and_then(|r| r.snapshot().name()).unwrap_or("local"),
            "renderer selected"
        );
        Ok(())
    }

    /// Install `surface` for frame delivery (replacing any previous one), or
    /// remove the current surface with `None`.
    ///
    /// While a video output is running the native side keeps drawing into
    /// the previous surface, so it is held (buffer included) until
    /// [`stop`](Self::stop) or [`release`](Self::release).
    pub fn set_video_surface(&self, surface: Option<VideoSurface>) -> Result<()> {
        let mut slot = self.surface.lock();
        let running = self.output_running();
        if !running {
            self.drop_retired();
        }
        if let Some(previous) = slot.take() {
            if let Err(err) = previous.uninstall(&self.handle) {
                *slot = Some(previous);
                return Err(err);
            }
            if !running {
                previous.release_buffer();
            }
            if running || previous.is_displaying() {
                debug!(source = %self.source_id(), "video surface retired");
                self.retired.lock().push(previous);
            }
        }
        if let Some(surface) = surface {
            surface.install(&self.handle)?;
            *slot = Some(surface);
        }
        Ok(())
    }

    /// Install a surface in the configured default chroma and return it.
    pub fn set_video_renderer(&self, render: impl RenderCallback + 'static) -> Result<VideoSurface> {
        let surface = VideoSurface::with_chroma(self.runtime.chroma, render);
        self.set_video_surface(Some(surface.clone()))?;
        Ok(surface)
    }

    pub fn video_surface(&self) -> Option<VideoSurface> {
        self.surface.lock().clone()
    }

    /// Number of replaced surfaces still reachable from a running output.
    pub fn retired_surfaces(&self) -> usize {
        self.retired.lock().len()
    }

    /// Whether the native side may still hold a video output. Unknown
    /// state counts as running.
    fn output_running(&self) -> bool {
        !matches!(self.state(), Ok(MediaState::NothingSpecial | MediaState::Stopped))
    }

    /// Release retired surfaces. One whose render callback is on this
    /// thread's stack stays parked for the next pass.
    fn drop_retired(&self) {
        let mut retired = std::mem::take(&mut *self.retired.lock());
        for surface in &retired {
            surface.release_buffer();
        }
        retired.retain(VideoSurface::is_displaying);
        self.retired.lock().extend(retired);
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscription = self.runtime.dispatcher.subscribe(self.source_id(), listener);
        self.events.ensure_attached(self.runtime.sink(), self.runtime.policy)?;
        Ok(subscription)
    }

    /// Wait handle for the first player event matching `predicate`.
    /// Create it before the action it waits for.
    pub fn latch<P>(&self, predicate: P) -> Result<EventLatch>
    where
        P: Fn(&EventRecord) -> bool + Send + Sync + 'static,
    {
        let latch = EventLatch::new(&self.runtime.dispatcher, self.source_id(), predicate);
        self.events.ensure_attached(self.runtime.sink(), self.runtime.policy)?;
        Ok(latch)
    }

    pub fn events_state(&self) -> BridgeState {
        self.events.state()
    }

    // ── Release ──────────────────────────────────────────────────────

    /// Detach events (waiting for in-flight callbacks), remove the video
    /// surface, then drop the native reference. Idempotent.
    pub fn release(&self) -> ReleaseOutcome {
        if let Err(err) = self.events.detach() {
            warn!(source = %self.source_id(), error = %err, "player events not detached");
        }
        let surface = self.surface.lock().take();
        if let Some(surface) = &surface {
            if let Err(err) = surface.uninstall(&self.handle) {
                debug!(source = %self.source_id(), error = %err, "video surface already detached");
            }
        }
        let outcome = self.handle.release();
        self.retired.lock().extend(surface);
        self.drop_retired();
        outcome
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for MediaPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPlayer")
            .field("handle", &self.handle)
            .field("events", &self.events_state())
            .finish()
    }
}
