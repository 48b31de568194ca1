//! The native ABI surface the binding core calls through.
//!
//! [`NativeApi`] is the only seam between the safe core and native code.
//! Two implementations ship with this crate:
//!
//! - [`LibVlc`](crate::libvlc::LibVlc) (requires the `libvlc` feature):
//!   resolves every entry point from a dynamically loaded LibVLC.
//! - [`SimulatedNative`](crate::sim::SimulatedNative): an in-process object
//!   table that mirrors LibVLC's retain counts and callback behaviour.
//!   Always available; used by tests and by hosts without LibVLC.

use std::ffi::{c_int, c_void, CStr};
use std::fmt;
use std::ptr::NonNull;

use crate::ffi::{
    libvlc_callback_t, libvlc_video_cleanup_cb, libvlc_video_display_cb, libvlc_video_format_cb,
    libvlc_video_lock_cb, libvlc_video_unlock_cb, log_callback_t,
};

/// A live native object pointer. Creation calls return `Option<RawPtr>`;
/// `None` is the native null sentinel.
pub type RawPtr = NonNull<c_void>;

/// The kind of native object behind a [`RawPtr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Instance,
    Media,
    Player,
    MediaList,
    Discoverer,
    RendererDiscoverer,
    RendererItem,
    Log,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Instance => "instance",
            ObjectKind::Media => "media",
            ObjectKind::Player => "media player",
            ObjectKind::MediaList => "media list",
            ObjectKind::Discoverer => "media discoverer",
            ObjectKind::RendererDiscoverer => "renderer discoverer",
            ObjectKind::RendererItem => "renderer item",
            ObjectKind::Log => "log",
        }
    }

    /// Whether the native library exposes a retain call for this kind.
    pub fn supports_retain(self) -> bool {
        matches!(
            self,
            ObjectKind::Instance
                | ObjectKind::Media
                | ObjectKind::Player
                | ObjectKind::MediaList
                | ObjectKind::RendererItem
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque platform window handle for video output.
///
/// The core never interprets the value; it is handed to exactly one native
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowHandle {
    /// X11 window id.
    Xlib(u32),
    /// Win32 `HWND`.
    Win32(usize),
    /// Cocoa `NSView`/`NSObject` pointer.
    Cocoa(usize),
}

/// Picture-buffer callbacks for `libvlc_video_set_callbacks`.
#[derive(Debug, Clone, Copy)]
pub struct VideoCallbacks {
    pub lock: libvlc_video_lock_cb,
    pub unlock: Option<libvlc_video_unlock_cb>,
    pub display: Option<libvlc_video_display_cb>,
    pub opaque: *mut c_void,
}

/// Format negotiation callbacks for `libvlc_video_set_format_callbacks`.
#[derive(Debug, Clone, Copy)]
pub struct FormatCallbacks {
    pub setup: libvlc_video_format_cb,
    pub cleanup: Option<libvlc_video_cleanup_cb>,
}

/// Fixed, versioned function surface of the native media library.
///
/// # Safety
///
/// Every `unsafe fn` requires that each [`RawPtr`] argument is a live object
/// of the kind the method name implies (an instance for `instance`, a media
/// player for `player`, ...) that has not been released. Callback `data` /
/// `opaque` pointers must stay valid until the matching detach/clear call
/// returns.
pub trait NativeApi: Send + Sync {
    /// Version string, e.g. `"3.0.20 Vetinari"`.
    fn version(&self) -> String;

    /// `libvlc_new`. `None` when the library refuses to initialise.
    fn new_instance(&self, args: &[String]) -> Option<RawPtr>;

    /// Increment the native reference count.
    unsafe fn retain(&self, kind: ObjectKind, obj: RawPtr);

    /// Decrement the native reference count; the object is freed at zero.
    unsafe fn release(&self, kind: ObjectKind, obj: RawPtr);

    // ── Media ────────────────────────────────────────────────────────

    unsafe fn media_new_location(&self, instance: RawPtr, mrl: &CStr) -> Option<RawPtr>;
    unsafe fn media_new_path(&self, instance: RawPtr, path: &CStr) -> Option<RawPtr>;
    unsafe fn media_mrl(&self, media: RawPtr) -> Option<String>;
    unsafe fn media_meta(&self, media: RawPtr, meta: c_int) -> Option<String>;
    unsafe fn media_state(&self, media: RawPtr) -> c_int;
    unsafe fn media_duration(&self, media: RawPtr) -> i64;
    /// Returns `-1` on error, `0` when parsing was started.
    unsafe fn media_parse(&self, media: RawPtr, flags: c_int, timeout_ms: c_int) -> c_int;
    unsafe fn media_parsed_status(&self, media: RawPtr) -> c_int;
    /// A retained list of sub-items.
    unsafe fn media_subitems(&self, media: RawPtr) -> Option<RawPtr>;
    unsafe fn media_add_option(&self, media: RawPtr, option: &CStr);

    // ── Media player ─────────────────────────────────────────────────

    unsafe fn player_new(&self, instance: RawPtr) -> Option<RawPtr>;
    unsafe fn player_set_media(&self, player: RawPtr, media: Option<RawPtr>);
    /// A retained reference to the current media.
    unsafe fn player_media(&self, player: RawPtr) -> Option<RawPtr>;
    /// Returns `0` when playback started, `-1` on error.
    unsafe fn player_play(&self, player: RawPtr) -> c_int;
    unsafe fn player_set_pause(&self, player: RawPtr, pause: bool);
    unsafe fn player_stop(&self, player: RawPtr);
    unsafe fn player_is_playing(&self, player: RawPtr) -> bool;
    unsafe fn player_time(&self, player: RawPtr) -> i64;
    unsafe fn player_set_time(&self, player: RawPtr, time_ms: i64);
    unsafe fn player_position(&self, player: RawPtr) -> f32;
    unsafe fn player_set_position(&self, player: RawPtr, position: f32);
    unsafe fn player_length(&self, player: RawPtr) -> i64;
    unsafe fn player_state(&self, player: RawPtr) -> c_int;
    unsafe fn player_rate(&self, player: RawPtr) -> f32;
    unsafe fn player_set_rate(&self, player: RawPtr, rate: f32) -> c_int;
    unsafe fn player_volume(&self, player: RawPtr) -> c_int;
    unsafe fn player_set_volume(&self, player: RawPtr, volume: c_int) -> c_int;
    /// `1` muted, `0` unmuted, `-1` undefined (no audio output).
    unsafe fn player_mute(&self, player: RawPtr) -> c_int;
    unsafe fn player_set_mute(&self, player: RawPtr, mute: bool);
    unsafe fn player_is_seekable(&self, player: RawPtr) -> bool;
    unsafe fn player_can_pause(&self, player: RawPtr) -> bool;
    unsafe fn player_next_frame(&self, player: RawPtr);
    unsafe fn player_set_window(&self, player: RawPtr, window: WindowHandle);
    unsafe fn player_set_renderer(&self, player: RawPtr, item: Option<RawPtr>) -> c_int;
    unsafe fn video_set_callbacks(
        &self,
        player: RawPtr,
        callbacks: VideoCallbacks,
        format: FormatCallbacks,
    );
    unsafe fn video_clear_callbacks(&self, player: RawPtr);

    // ── Media list ───────────────────────────────────────────────────

    unsafe fn list_new(&self, instance: RawPtr) -> Option<RawPtr>;
    /// Caller must hold the list lock.
    unsafe fn list_add(&self, list: RawPtr, media: RawPtr) -> c_int;
    /// Caller must hold the list lock.
    unsafe fn list_insert(&self, list: RawPtr, media: RawPtr, index: c_int) -> c_int;
    /// Caller must hold the list lock.
    unsafe fn list_remove(&self, list: RawPtr, index: c_int) -> c_int;
    /// Caller must hold the list lock.
    unsafe fn list_count(&self, list: RawPtr) -> c_int;
    /// A retained media. Caller must hold the list lock.
    unsafe fn list_item_at(&self, list: RawPtr, index: c_int) -> Option<RawPtr>;
    unsafe fn list_lock(&self, list: RawPtr);
    unsafe fn list_unlock(&self, list: RawPtr);

    // ── Discovery ────────────────────────────────────────────────────

    unsafe fn discoverer_new(&self, instance: RawPtr, name: &CStr) -> Option<RawPtr>;
    unsafe fn discoverer_start(&self, discoverer: RawPtr) -> c_int;
    unsafe fn discoverer_stop(&self, discoverer: RawPtr);
    unsafe fn discoverer_is_running(&self, discoverer: RawPtr) -> bool;
    /// A retained list of discovered media.
    unsafe fn discoverer_media_list(&self, discoverer: RawPtr) -> Option<RawPtr>;

    unsafe fn renderer_discoverer_new(&self, instance: RawPtr, name: &CStr) -> Option<RawPtr>;
    unsafe fn renderer_discoverer_start(&self, discoverer: RawPtr) -> c_int;
    unsafe fn renderer_discoverer_stop(&self, discoverer: RawPtr);
    unsafe fn renderer_item_name(&self, item: RawPtr) -> Option<String>;
    unsafe fn renderer_item_type(&self, item: RawPtr) -> Option<String>;
    unsafe fn renderer_item_icon_uri(&self, item: RawPtr) -> Option<String>;
    unsafe fn renderer_item_flags(&self, item: RawPtr) -> c_int;

    // ── Events and log ───────────────────────────────────────────────

    /// The event manager owned by `obj`. It lives exactly as long as `obj`.
    unsafe fn event_manager(&self, kind: ObjectKind, obj: RawPtr) -> Option<RawPtr>;
    /// Returns `0` on success.
    unsafe fn event_attach(
        &self,
        manager: RawPtr,
        event_type: c_int,
        callback: libvlc_callback_t,
        data: *mut c_void,
    ) -> c_int;
    unsafe fn event_detach(
        &self,
        manager: RawPtr,
        event_type: c_int,
        callback: libvlc_callback_t,
        data: *mut c_void,
    );
    unsafe fn log_set(&self, instance: RawPtr, callback: log_callback_t, data: *mut c_void);
    unsafe fn log_unset(&self, instance: RawPtr);
}

// ── Version parsing ──────────────────────────────────────────────────

/// `(major, minor, patch)` from a native version string such as
/// `"3.0.20 Vetinari"`. Missing components default to zero.
pub fn parse_version(raw: &str) -> Option<(u32, u32, u32)> {
    let numeric = raw.split_whitespace().next()?;
    let mut parts = numeric.split(['.', '-']);
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_version_strings() {
        assert_eq!(parse_version("3.0.20 Vetinari"), Some((3, 0, 20)));
        assert_eq!(parse_version("4.0.0-dev Otto Chriek"), Some((4, 0, 0)));
        assert_eq!(parse_version("2.2"), Some((2, 2, 0)));
    }

    #[test]
    fn rejects_garbage_versions() {
        assert_eq!(parse_version(""), None);
        assert_eq!(parse_version("Vetinari"), None);
    }

    #[test]
    fn retain_support_matches_native_surface() {
        assert!(ObjectKind::Media.supports_retain());
        assert!(ObjectKind::RendererItem.supports_retain());
        assert!(!ObjectKind::RendererDiscoverer.supports_retain());
        assert!(!ObjectKind::Log.supports_retain());
    }
}
