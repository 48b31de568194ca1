//! Runtime-loaded LibVLC 3.x.
//!
//! The shared library is opened once with `libloading`; every entry point
//! the core needs is resolved up front into a [`Symbols`] table, so an
//! incompatible build fails at load time instead of at the first call.

use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr;

use libloading::Library;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::{FormatCallbacks, NativeApi, ObjectKind, RawPtr, VideoCallbacks, WindowHandle};
use crate::error::NativeError;
use crate::ffi::{
    libvlc_callback_t, libvlc_video_cleanup_cb, libvlc_video_display_cb, libvlc_video_format_cb,
    libvlc_video_lock_cb, libvlc_video_unlock_cb, log_callback_t,
};

type Obj = *mut c_void;

/// `void (*)(void *data, int level, const libvlc_log_t *ctx, const char *fmt, va_list args)`.
///
/// `va_list` is passed as an opaque pointer; on every supported ABI the C
/// parameter is pointer-sized or passed by reference.
type NativeLogCb =
    unsafe extern "C" fn(data: *mut c_void, level: c_int, ctx: *const c_void, fmt: *const c_char, args: *mut c_void);

extern "C" {
    fn vsnprintf(buf: *mut c_char, len: usize, fmt: *const c_char, args: *mut c_void) -> c_int;
}

macro_rules! symbols {
    ($( $name:ident : fn($($arg:ty),*) $(-> $ret:ty)? ;)*) => {
        #[allow(non_snake_case)]
        struct Symbols {
            $( $name: unsafe extern "C" fn($($arg),*) $(-> $ret)?, )*
        }

        impl Symbols {
            unsafe fn resolve(lib: &Library) -> Result<Self, NativeError> {
                Ok(Self {
                    $(
                        $name: *lib
                            .get::<unsafe extern "C" fn($($arg),*) $(-> $ret)?>(
                                concat!(stringify!($name), "\0").as_bytes(),
                            )
                            .map_err(|source| NativeError::MissingSymbol {
                                name: stringify!($name),
                                source,
                            })?,
                    )*
                })
            }
        }
    };
}

symbols! {
    libvlc_new: fn(c_int, *const *const c_char) -> Obj;
    libvlc_release: fn(Obj);
    libvlc_retain: fn(Obj);
    libvlc_get_version: fn() -> *const c_char;
    libvlc_free: fn(*mut c_void);
    libvlc_log_set: fn(Obj, NativeLogCb, *mut c_void);
    libvlc_log_unset: fn(Obj);
    libvlc_log_get_context: fn(*const c_void, *mut *const c_char, *mut *const c_char, *mut c_uint);
    libvlc_event_attach: fn(Obj, c_int, libvlc_callback_t, *mut c_void) -> c_int;
    libvlc_event_detach: fn(Obj, c_int, libvlc_callback_t, *mut c_void);

    libvlc_media_new_location: fn(Obj, *const c_char) -> Obj;
    libvlc_media_new_path: fn(Obj, *const c_char) -> Obj;
    libvlc_media_retain: fn(Obj);
    libvlc_media_release: fn(Obj);
    libvlc_media_get_mrl: fn(Obj) -> *mut c_char;
    libvlc_media_get_meta: fn(Obj, c_int) -> *mut c_char;
    libvlc_media_get_state: fn(Obj) -> c_int;
    libvlc_media_get_duration: fn(Obj) -> i64;
    libvlc_media_parse_with_options: fn(Obj, c_int, c_int) -> c_int;
    libvlc_media_get_parsed_status: fn(Obj) -> c_int;
    libvlc_media_subitems: fn(Obj) -> Obj;
    libvlc_media_add_option: fn(Obj, *const c_char);
    libvlc_media_event_manager: fn(Obj) -> Obj;

    libvlc_media_player_new: fn(Obj) -> Obj;
    libvlc_media_player_retain: fn(Obj);
    libvlc_media_player_release: fn(Obj);
    libvlc_media_player_set_media: fn(Obj, Obj);
    libvlc_media_player_get_media: fn(Obj) -> Obj;
    libvlc_media_player_play: fn(Obj) -> c_int;
    libvlc_media_player_set_pause: fn(Obj, c_int);
    libvlc_media_player_stop: fn(Obj);
    libvlc_media_player_is_playing: fn(Obj) -> c_int;
    libvlc_media_player_get_time: fn(Obj) -> i64;
    libvlc_media_player_set_time: fn(Obj, i64);
    libvlc_media_player_get_position: fn(Obj) -> f32;
    libvlc_media_player_set_position: fn(Obj, f32);
    libvlc_media_player_get_length: fn(Obj) -> i64;
    libvlc_media_player_get_state: fn(Obj) -> c_int;
    libvlc_media_player_get_rate: fn(Obj) -> f32;
    libvlc_media_player_set_rate: fn(Obj, f32) -> c_int;
    libvlc_media_player_is_seekable: fn(Obj) -> c_int;
    libvlc_media_player_can_pause: fn(Obj) -> c_int;
    libvlc_media_player_next_frame: fn(Obj);
    libvlc_media_player_set_xwindow: fn(Obj, u32);
    libvlc_media_player_set_hwnd: fn(Obj, *mut c_void);
    libvlc_media_player_set_nsobject: fn(Obj, *mut c_void);
    libvlc_media_player_set_renderer: fn(Obj, Obj) -> c_int;
    libvlc_media_player_event_manager: fn(Obj) -> Obj;
    libvlc_audio_get_volume: fn(Obj) -> c_int;
    libvlc_audio_set_volume: fn(Obj, c_int) -> c_int;
    libvlc_audio_get_mute: fn(Obj) -> c_int;
    libvlc_audio_set_mute: fn(Obj, c_int);
    libvlc_video_set_callbacks: fn(
        Obj,
        Option<libvlc_video_lock_cb>,
        Option<libvlc_video_unlock_cb>,
        Option<libvlc_video_display_cb>,
        *mut c_void
    );
    libvlc_video_set_format_callbacks: fn(
        Obj,
        Option<libvlc_video_format_cb>,
        Option<libvlc_video_cleanup_cb>
    );

    libvlc_media_list_new: fn(Obj) -> Obj;
    libvlc_media_list_retain: fn(Obj);
    libvlc_media_list_release: fn(Obj);
    libvlc_media_list_add_media: fn(Obj, Obj) -> c_int;
    libvlc_media_list_insert_media: fn(Obj, Obj, c_int) -> c_int;
    libvlc_media_list_remove_index: fn(Obj, c_int) -> c_int;
    libvlc_media_list_count: fn(Obj) -> c_int;
    libvlc_media_list_item_at_index: fn(Obj, c_int) -> Obj;
    libvlc_media_list_lock: fn(Obj);
    libvlc_media_list_unlock: fn(Obj);
    libvlc_media_list_event_manager: fn(Obj) -> Obj;

    libvlc_media_discoverer_new: fn(Obj, *const c_char) -> Obj;
    libvlc_media_discoverer_start: fn(Obj) -> c_int;
    libvlc_media_discoverer_stop: fn(Obj);
    libvlc_media_discoverer_release: fn(Obj);
    libvlc_media_discoverer_is_running: fn(Obj) -> c_int;
    libvlc_media_discoverer_media_list: fn(Obj) -> Obj;

    libvlc_renderer_discoverer_new: fn(Obj, *const c_char) -> Obj;
    libvlc_renderer_discoverer_start: fn(Obj) -> c_int;
    libvlc_renderer_discoverer_stop: fn(Obj);
    libvlc_renderer_discoverer_release: fn(Obj);
    libvlc_renderer_discoverer_event_manager: fn(Obj) -> Obj;
    libvlc_renderer_item_hold: fn(Obj) -> Obj;
    libvlc_renderer_item_release: fn(Obj);
    libvlc_renderer_item_name: fn(Obj) -> *const c_char;
    libvlc_renderer_item_type: fn(Obj) -> *const c_char;
    libvlc_renderer_item_icon_uri: fn(Obj) -> *const c_char;
    libvlc_renderer_item_flags: fn(Obj) -> c_int;
}

/// Forwarding target registered with `libvlc_log_set`.
struct LogForward {
    get_context: unsafe extern "C" fn(*const c_void, *mut *const c_char, *mut *const c_char, *mut c_uint),
    callback: log_callback_t,
    data: *mut c_void,
}

/// Maximum formatted length of a single native log line.
const LOG_LINE_MAX: usize = 1024;

/// A LibVLC shared library opened at runtime.
pub struct LibVlc {
    sym: Symbols,
    /// Log forwarders keyed by instance address; boxed so the pointer handed
    /// to the native side is stable.
    log_forwards: Mutex<HashMap<usize, Box<LogForward>>>,
    path: PathBuf,
    _lib: Library,
}

// Safety: the symbol table holds plain function pointers into a library that
// lives as long as `self`; forwarders are only touched under the mutex.
unsafe impl Send for LibVlc {}
unsafe impl Sync for LibVlc {}

impl LibVlc {
    /// Open LibVLC at `path` and resolve the full symbol table.
    pub fn open(path: &Path) -> Result<Self, NativeError> {
        let lib = unsafe { Library::new(path) }.map_err(|source| NativeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let sym = unsafe { Symbols::resolve(&lib)? };

        let version = unsafe { (sym.libvlc_get_version)() };
        if version.is_null() {
            return Err(NativeError::NotLibVlc(path.to_path_buf()));
        }
        info!(
            path = %path.display(),
            version = %unsafe { CStr::from_ptr(version) }.to_string_lossy(),
            "loaded native media library"
        );

        Ok(Self {
            sym,
            log_forwards: Mutex::new(HashMap::new()),
            path: path.to_path_buf(),
            _lib: lib,
        })
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy and free a string allocated by the native library.
    unsafe fn take_string(&self, raw: *mut c_char) -> Option<String> {
        if raw.is_null() {
            return None;
        }
        let owned = CStr::from_ptr(raw).to_string_lossy().into_owned();
        (self.sym.libvlc_free)(raw as *mut c_void);
        Some(owned)
    }
}

/// Copy a string owned by the native object (not to be freed).
unsafe fn borrow_string(raw: *const c_char) -> Option<String> {
    if raw.is_null() {
        None
    } else {
        Some(CStr::from_ptr(raw).to_string_lossy().into_owned())
    }
}

fn opt(raw: Obj) -> Option<RawPtr> {
    RawPtr::new(raw)
}

unsafe extern "C" fn forward_log(
    data: *mut c_void,
    level: c_int,
    ctx: *const c_void,
    fmt: *const c_char,
    args: *mut c_void,
) {
    let Some(forward) = (data as *const LogForward).as_ref() else {
        return;
    };
    if fmt.is_null() {
        return;
    }

    let mut buf = [0 as c_char; LOG_LINE_MAX];
    if vsnprintf(buf.as_mut_ptr(), buf.len(), fmt, args) < 0 {
        return;
    }
    // vsnprintf always terminates within `len`.
    buf[LOG_LINE_MAX - 1] = 0;

    let mut module: *const c_char = ptr::null();
    let mut file: *const c_char = ptr::null();
    let mut line: c_uint = 0;
    if !ctx.is_null() {
        (forward.get_context)(ctx, &mut module, &mut file, &mut line);
    }

    (forward.callback)(forward.data, level, module, buf.as_ptr());
}

impl NativeApi for LibVlc {
    fn version(&self) -> String {
        unsafe { borrow_string((self.sym.libvlc_get_version)()) }.unwrap_or_default()
    }

    fn new_instance(&self, args: &[String]) -> Option<RawPtr> {
        let owned: Vec<CString> = args
            .iter()
            .filter_map(|a| match CString::new(a.as_str()) {
                Ok(c) => Some(c),
                Err(_) => {
                    warn!(arg = %a, "dropping instance argument with embedded NUL");
                    None
                }
            })
            .collect();
        let argv: Vec<*const c_char> = owned.iter().map(|c| c.as_ptr()).collect();
        let argv_ptr = if argv.is_empty() {
            ptr::null()
        } else {
            argv.as_ptr()
        };
        debug!(argc = argv.len(), "libvlc_new");
        opt(unsafe { (self.sym.libvlc_new)(argv.len() as c_int, argv_ptr) })
    }

    unsafe fn retain(&self, kind: ObjectKind, obj: RawPtr) {
        let p = obj.as_ptr();
        match kind {
            ObjectKind::Instance => (self.sym.libvlc_retain)(p),
            ObjectKind::Media => (self.sym.libvlc_media_retain)(p),
            ObjectKind::Player => (self.sym.libvlc_media_player_retain)(p),
            ObjectKind::MediaList => (self.sym.libvlc_media_list_retain)(p),
            ObjectKind::RendererItem => {
                (self.sym.libvlc_renderer_item_hold)(p);
            }
            ObjectKind::Discoverer | ObjectKind::RendererDiscoverer | ObjectKind::Log => {
                warn!(%kind, "native library has no retain call for this kind");
            }
        }
    }

    unsafe fn release(&self, kind: ObjectKind, obj: RawPtr) {
        let p = obj.as_ptr();
        match kind {
            ObjectKind::Instance => {
                self.log_forwards.lock().remove(&(p as usize));
                (self.sym.libvlc_release)(p)
            }
            ObjectKind::Media => (self.sym.libvlc_media_release)(p),
            ObjectKind::Player => (self.sym.libvlc_media_player_release)(p),
            ObjectKind::MediaList => (self.sym.libvlc_media_list_release)(p),
            ObjectKind::Discoverer => (self.sym.libvlc_media_discoverer_release)(p),
            ObjectKind::RendererDiscoverer => (self.sym.libvlc_renderer_discoverer_release)(p),
            ObjectKind::RendererItem => (self.sym.libvlc_renderer_item_release)(p),
            ObjectKind::Log => {}
        }
    }

    // ── Media ────────────────────────────────────────────────────────

    unsafe fn media_new_location(&self, instance: RawPtr, mrl: &CStr) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_new_location)(instance.as_ptr(), mrl.as_ptr()))
    }

    unsafe fn media_new_path(&self, instance: RawPtr, path: &CStr) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_new_path)(instance.as_ptr(), path.as_ptr()))
    }

    unsafe fn media_mrl(&self, media: RawPtr) -> Option<String> {
        self.take_string((self.sym.libvlc_media_get_mrl)(media.as_ptr()))
    }

    unsafe fn media_meta(&self, media: RawPtr, meta: c_int) -> Option<String> {
        self.take_string((self.sym.libvlc_media_get_meta)(media.as_ptr(), meta))
    }

    unsafe fn media_state(&self, media: RawPtr) -> c_int {
        (self.sym.libvlc_media_get_state)(media.as_ptr())
    }

    unsafe fn media_duration(&self, media: RawPtr) -> i64 {
        (self.sym.libvlc_media_get_duration)(media.as_ptr())
    }

    unsafe fn media_parse(&self, media: RawPtr, flags: c_int, timeout_ms: c_int) -> c_int {
        (self.sym.libvlc_media_parse_with_options)(media.as_ptr(), flags, timeout_ms)
    }

    unsafe fn media_parsed_status(&self, media: RawPtr) -> c_int {
        (self.sym.libvlc_media_get_parsed_status)(media.as_ptr())
    }

    unsafe fn media_subitems(&self, media: RawPtr) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_subitems)(media.as_ptr()))
    }

    unsafe fn media_add_option(&self, media: RawPtr, option: &CStr) {
        (self.sym.libvlc_media_add_option)(media.as_ptr(), option.as_ptr())
    }

    // ── Media player ─────────────────────────────────────────────────

    unsafe fn player_new(&self, instance: RawPtr) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_player_new)(instance.as_ptr()))
    }

    unsafe fn player_set_media(&self, player: RawPtr, media: Option<RawPtr>) {
        let media = media.map_or(ptr::null_mut(), |m| m.as_ptr());
        (self.sym.libvlc_media_player_set_media)(player.as_ptr(), media)
    }

    unsafe fn player_media(&self, player: RawPtr) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_player_get_media)(player.as_ptr()))
    }

    unsafe fn player_play(&self, player: RawPtr) -> c_int {
        (self.sym.libvlc_media_player_play)(player.as_ptr())
    }

    unsafe fn player_set_pause(&self, player: RawPtr, pause: bool) {
        (self.sym.libvlc_media_player_set_pause)(player.as_ptr(), pause as c_int)
    }

    unsafe fn player_stop(&self, player: RawPtr) {
        (self.sym.libvlc_media_player_stop)(player.as_ptr())
    }

    unsafe fn player_is_playing(&self, player: RawPtr) -> bool {
        (self.sym.libvlc_media_player_is_playing)(player.as_ptr()) != 0
    }

    unsafe fn player_time(&self, player: RawPtr) -> i64 {
        (self.sym.libvlc_media_player_get_time)(player.as_ptr())
    }

    unsafe fn player_set_time(&self, player: RawPtr, time_ms: i64) {
        (self.sym.libvlc_media_player_set_time)(player.as_ptr(), time_ms)
    }

    unsafe fn player_position(&self, player: RawPtr) -> f32 {
        (self.sym.libvlc_media_player_get_position)(player.as_ptr())
    }

    unsafe fn player_set_position(&self, player: RawPtr, position: f32) {
        (self.sym.libvlc_media_player_set_position)(player.as_ptr(), position)
    }

    unsafe fn player_length(&self, player: RawPtr) -> i64 {
        (self.sym.libvlc_media_player_get_length)(player.as_ptr())
    }

    unsafe fn player_state(&self, player: RawPtr) -> c_int {
        (self.sym.libvlc_media_player_get_state)(player.as_ptr())
    }

    unsafe fn player_rate(&self, player: RawPtr) -> f32 {
        (self.sym.libvlc_media_player_get_rate)(player.as_ptr())
    }

    unsafe fn player_set_rate(&self, player: RawPtr, rate: f32) -> c_int {
        (self.sym.libvlc_media_player_set_rate)(player.as_ptr(), rate)
    }

    unsafe fn player_volume(&self, player: RawPtr) -> c_int {
        (self.sym.libvlc_audio_get_volume)(player.as_ptr())
    }

    unsafe fn player_set_volume(&self, player: RawPtr, volume: c_int) -> c_int {
        (self.sym.libvlc_audio_set_volume)(player.as_ptr(), volume)
    }

    unsafe fn player_mute(&self, player: RawPtr) -> c_int {
        (self.sym.libvlc_audio_get_mute)(player.as_ptr())
    }

    unsafe fn player_set_mute(&self, player: RawPtr, mute: bool) {
        (self.sym.libvlc_audio_set_mute)(player.as_ptr(), mute as c_int)
    }

    unsafe fn player_is_seekable(&self, player: RawPtr) -> bool {
        (self.sym.libvlc_media_player_is_seekable)(player.as_ptr()) != 0
    }

    unsafe fn player_can_pause(&self, player: RawPtr) -> bool {
        (self.sym.libvlc_media_player_can_pause)(player.as_ptr()) != 0
    }

    unsafe fn player_next_frame(&self, player: RawPtr) {
        (self.sym.libvlc_media_player_next_frame)(player.as_ptr())
    }

    unsafe fn player_set_window(&self, player: RawPtr, window: WindowHandle) {
        let p = player.as_ptr();
        match window {
            WindowHandle::Xlib(xid) => (self.sym.libvlc_media_player_set_xwindow)(p, xid),
            WindowHandle::Win32(hwnd) => {
                (self.sym.libvlc_media_player_set_hwnd)(p, hwnd as *mut c_void)
            }
            WindowHandle::Cocoa(view) => {
                (self.sym.libvlc_media_player_set_nsobject)(p, view as *mut c_void)
            }
        }
    }

    unsafe fn player_set_renderer(&self, player: RawPtr, item: Option<RawPtr>) -> c_int {
        let item = item.map_or(ptr::null_mut(), |i| i.as_ptr());
        (self.sym.libvlc_media_player_set_renderer)(player.as_ptr(), item)
    }

    unsafe fn video_set_callbacks(
        &self,
        player: RawPtr,
        callbacks: VideoCallbacks,
        format: FormatCallbacks,
    ) {
        (self.sym.libvlc_video_set_callbacks)(
            player.as_ptr(),
            Some(callbacks.lock),
            callbacks.unlock,
            callbacks.display,
            callbacks.opaque,
        );
        (self.sym.libvlc_video_set_format_callbacks)(
            player.as_ptr(),
            Some(format.setup),
            format.cleanup,
        );
    }

    unsafe fn video_clear_callbacks(&self, player: RawPtr) {
        (self.sym.libvlc_video_set_callbacks)(player.as_ptr(), None, None, None, ptr::null_mut());
        (self.sym.libvlc_video_set_format_callbacks)(player.as_ptr(), None, None);
    }

    // ── Media list ───────────────────────────────────────────────────

    unsafe fn list_new(&self, instance: RawPtr) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_list_new)(instance.as_ptr()))
    }

    unsafe fn list_add(&self, list: RawPtr, media: RawPtr) -> c_int {
        (self.sym.libvlc_media_list_add_media)(list.as_ptr(), media.as_ptr())
    }

    unsafe fn list_insert(&self, list: RawPtr, media: RawPtr, index: c_int) -> c_int {
        (self.sym.libvlc_media_list_insert_media)(list.as_ptr(), media.as_ptr(), index)
    }

    unsafe fn list_remove(&self, list: RawPtr, index: c_int) -> c_int {
        (self.sym.libvlc_media_list_remove_index)(list.as_ptr(), index)
    }

    unsafe fn list_count(&self, list: RawPtr) -> c_int {
        (self.sym.libvlc_media_list_count)(list.as_ptr())
    }

    unsafe fn list_item_at(&self, list: RawPtr, index: c_int) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_list_item_at_index)(list.as_ptr(), index))
    }

    unsafe fn list_lock(&self, list: RawPtr) {
        (self.sym.libvlc_media_list_lock)(list.as_ptr())
    }

    unsafe fn list_unlock(&self, list: RawPtr) {
        (self.sym.libvlc_media_list_unlock)(list.as_ptr())
    }

    // ── Discovery ────────────────────────────────────────────────────

    unsafe fn discoverer_new(&self, instance: RawPtr, name: &CStr) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_discoverer_new)(instance.as_ptr(), name.as_ptr()))
    }

    unsafe fn discoverer_start(&self, discoverer: RawPtr) -> c_int {
        (self.sym.libvlc_media_discoverer_start)(discoverer.as_ptr())
    }

    unsafe fn discoverer_stop(&self, discoverer: RawPtr) {
        (self.sym.libvlc_media_discoverer_stop)(discoverer.as_ptr())
    }

    unsafe fn discoverer_is_running(&self, discoverer: RawPtr) -> bool {
        (self.sym.libvlc_media_discoverer_is_running)(discoverer.as_ptr()) != 0
    }

    unsafe fn discoverer_media_list(&self, discoverer: RawPtr) -> Option<RawPtr> {
        opt((self.sym.libvlc_media_discoverer_media_list)(discoverer.as_ptr()))
    }

    unsafe fn renderer_discoverer_new(&self, instance: RawPtr, name: &CStr) -> Option<RawPtr> {
        opt((self.sym.libvlc_renderer_discoverer_new)(instance.as_ptr(), name.as_ptr()))
    }

    unsafe fn renderer_discoverer_start(&self, discoverer: RawPtr) -> c_int {
        (self.sym.libvlc_renderer_discoverer_start)(discoverer.as_ptr())
    }

    unsafe fn renderer_discoverer_stop(&self, discoverer: RawPtr) {
        (self.sym.libvlc_renderer_discoverer_stop)(discoverer.as_ptr())
    }

    unsafe fn renderer_item_name(&self, item: RawPtr) -> Option<String> {
        borrow_string((self.sym.libvlc_renderer_item_name)(item.as_ptr()))
    }

    unsafe fn renderer_item_type(&self, item: RawPtr) -> Option<String> {
        borrow_string((self.sym.libvlc_renderer_item_type)(item.as_ptr()))
    }

    unsafe fn renderer_item_icon_uri(&self, item: RawPtr) -> Option<String> {
        borrow_string((self.sym.libvlc_renderer_item_icon_uri)(item.as_ptr()))
    }

    unsafe fn renderer_item_flags(&self, item: RawPtr) -> c_int {
        (self.sym.libvlc_renderer_item_flags)(item.as_ptr())
    }

    // ── Events and log ───────────────────────────────────────────────

    unsafe fn event_manager(&self, kind: ObjectKind, obj: RawPtr) -> Option<RawPtr> {
        let p = obj.as_ptr();
        let manager = match kind {
            ObjectKind::Media => (self.sym.libvlc_media_event_manager)(p),
            ObjectKind::Player => (self.sym.libvlc_media_player_event_manager)(p),
            ObjectKind::MediaList => (self.sym.libvlc_media_list_event_manager)(p),
            ObjectKind::RendererDiscoverer => (self.sym.libvlc_renderer_discoverer_event_manager)(p),
            _ => ptr::null_mut(),
        };
        opt(manager)
    }

    unsafe fn event_attach(
        &self,
        manager: RawPtr,
        event_type: c_int,
        callback: libvlc_callback_t,
        data: *mut c_void,
    ) -> c_int {
        (self.sym.libvlc_event_attach)(manager.as_ptr(), event_type, callback, data)
    }

    unsafe fn event_detach(
        &self,
        manager: RawPtr,
        event_type: c_int,
        callback: libvlc_callback_t,
        data: *mut c_void,
    ) {
        (self.sym.libvlc_event_detach)(manager.as_ptr(), event_type, callback, data)
    }

    unsafe fn log_set(&self, instance: RawPtr, callback: log_callback_t, data: *mut c_void) {
        let forward = Box::new(LogForward {
            get_context: self.sym.libvlc_log_get_context,
            callback,
            data,
        });
        let forward_ptr = &*forward as *const LogForward as *mut c_void;
        // Replace under the lock so the previous forwarder outlives the
        // native switch-over.
        let mut forwards = self.log_forwards.lock();
        (self.sym.libvlc_log_set)(instance.as_ptr(), forward_log, forward_ptr);
        forwards.insert(instance.as_ptr() as usize, forward);
    }

    unsafe fn log_unset(&self, instance: RawPtr) {
        // libvlc_log_unset waits for in-flight log callbacks.
        (self.sym.libvlc_log_unset)(instance.as_ptr());
        self.log_forwards.lock().remove(&(instance.as_ptr() as usize));
    }
}
