//! Raw LibVLC 3.x ABI: event layout, event-type tags, enum values and
//! callback signatures.
//!
//! Only the parts of the C headers the binding core touches are declared.
//! Everything here is `repr(C)` and must match `libvlc_events.h` and
//! `libvlc_media_player.h` byte for byte.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_uint, c_void};

/// Time in milliseconds, as used by the native library.
pub type libvlc_time_t = i64;

// ── Event layout ─────────────────────────────────────────────────────

/// Payload of `media_list_item_added` / `will_add_item` / `item_deleted` /
/// `will_delete_item`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct libvlc_list_item_payload {
    pub item: *mut c_void,
    pub index: c_int,
}

/// Payload of `media_player_es_changed`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct libvlc_es_payload {
    pub i_type: c_int,
    pub i_id: c_int,
}

/// The anonymous union inside `libvlc_event_t`.
///
/// Every member starts at offset zero, so each field aliases the first
/// member of the matching C struct.
#[repr(C)]
#[derive(Clone, Copy)]
pub union libvlc_event_u {
    pub meta_type: c_int,
    /// `new_child`, `md`, `item`, `new_media`: any payload that is a single
    /// native object pointer.
    pub object: *mut c_void,
    pub new_duration: i64,
    pub new_status: c_int,
    pub new_state: c_int,
    pub new_cache: f32,
    pub new_chapter: c_int,
    pub new_position: f32,
    pub new_time: libvlc_time_t,
    pub new_title: c_int,
    pub new_seekable: c_int,
    pub new_pausable: c_int,
    pub new_scrambled: c_int,
    pub new_count: c_int,
    pub list_item: libvlc_list_item_payload,
    pub filename: *const c_char,
    pub new_length: libvlc_time_t,
    pub es: libvlc_es_payload,
    pub volume: f32,
    pub device: *const c_char,
    /// Largest C member is two pointers (`vlm_media_event`).
    pub _reserved: [u64; 4],
}

/// `libvlc_event_t`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct libvlc_event_t {
    pub type_: c_int,
    pub p_obj: *mut c_void,
    pub u: libvlc_event_u,
}

impl libvlc_event_t {
    /// An event with an all-zero payload.
    pub fn empty(type_: c_int, p_obj: *mut c_void) -> Self {
        Self {
            type_,
            p_obj,
            u: libvlc_event_u { _reserved: [0; 4] },
        }
    }
}

// ── Event type tags ──────────────────────────────────────────────────

pub mod event_type {
    use std::ffi::c_int;

    pub const MEDIA_META_CHANGED: c_int = 0;
    pub const MEDIA_SUB_ITEM_ADDED: c_int = 1;
    pub const MEDIA_DURATION_CHANGED: c_int = 2;
    pub const MEDIA_PARSED_CHANGED: c_int = 3;
    pub const MEDIA_FREED: c_int = 4;
    pub const MEDIA_STATE_CHANGED: c_int = 5;
    pub const MEDIA_SUB_ITEM_TREE_ADDED: c_int = 6;

    pub const MEDIA_PLAYER_MEDIA_CHANGED: c_int = 0x100;
    pub const MEDIA_PLAYER_NOTHING_SPECIAL: c_int = 0x101;
    pub const MEDIA_PLAYER_OPENING: c_int = 0x102;
    pub const MEDIA_PLAYER_BUFFERING: c_int = 0x103;
    pub const MEDIA_PLAYER_PLAYING: c_int = 0x104;
    pub const MEDIA_PLAYER_PAUSED: c_int = 0x105;
    pub const MEDIA_PLAYER_STOPPED: c_int = 0x106;
    pub const MEDIA_PLAYER_FORWARD: c_int = 0x107;
    pub const MEDIA_PLAYER_BACKWARD: c_int = 0x108;
    pub const MEDIA_PLAYER_END_REACHED: c_int = 0x109;
    pub const MEDIA_PLAYER_ENCOUNTERED_ERROR: c_int = 0x10a;
    pub const MEDIA_PLAYER_TIME_CHANGED: c_int = 0x10b;
    pub const MEDIA_PLAYER_POSITION_CHANGED: c_int = 0x10c;
    pub const MEDIA_PLAYER_SEEKABLE_CHANGED: c_int = 0x10d;
    pub const MEDIA_PLAYER_PAUSABLE_CHANGED: c_int = 0x10e;
    pub const MEDIA_PLAYER_TITLE_CHANGED: c_int = 0x10f;
    pub const MEDIA_PLAYER_SNAPSHOT_TAKEN: c_int = 0x110;
    pub const MEDIA_PLAYER_LENGTH_CHANGED: c_int = 0x111;
    pub const MEDIA_PLAYER_VOUT: c_int = 0x112;
    pub const MEDIA_PLAYER_SCRAMBLED_CHANGED: c_int = 0x113;
    pub const MEDIA_PLAYER_ES_ADDED: c_int = 0x114;
    pub const MEDIA_PLAYER_ES_DELETED: c_int = 0x115;
    pub const MEDIA_PLAYER_ES_SELECTED: c_int = 0x116;
    pub const MEDIA_PLAYER_CORKED: c_int = 0x117;
    pub const MEDIA_PLAYER_UNCORKED: c_int = 0x118;
    pub const MEDIA_PLAYER_MUTED: c_int = 0x119;
    pub const MEDIA_PLAYER_UNMUTED: c_int = 0x11a;
    pub const MEDIA_PLAYER_AUDIO_VOLUME: c_int = 0x11b;
    pub const MEDIA_PLAYER_AUDIO_DEVICE: c_int = 0x11c;
    pub const MEDIA_PLAYER_CHAPTER_CHANGED: c_int = 0x11d;

    pub const MEDIA_LIST_ITEM_ADDED: c_int = 0x200;
    pub const MEDIA_LIST_WILL_ADD_ITEM: c_int = 0x201;
    pub const MEDIA_LIST_ITEM_DELETED: c_int = 0x202;
    pub const MEDIA_LIST_WILL_DELETE_ITEM: c_int = 0x203;
    pub const MEDIA_LIST_END_REACHED: c_int = 0x204;

    pub const RENDERER_DISCOVERER_ITEM_ADDED: c_int = 0x502;
    pub const RENDERER_DISCOVERER_ITEM_DELETED: c_int = 0x503;
}

// ── Enum values ──────────────────────────────────────────────────────

/// `libvlc_state_t`.
pub mod state {
    use std::ffi::c_int;

    pub const NOTHING_SPECIAL: c_int = 0;
    pub const OPENING: c_int = 1;
    pub const BUFFERING: c_int = 2;
    pub const PLAYING: c_int = 3;
    pub const PAUSED: c_int = 4;
    pub const STOPPED: c_int = 5;
    pub const ENDED: c_int = 6;
    pub const ERROR: c_int = 7;
}

/// `libvlc_media_parsed_status_t`.
pub mod parsed_status {
    use std::ffi::c_int;

    pub const NONE: c_int = 0;
    pub const SKIPPED: c_int = 1;
    pub const FAILED: c_int = 2;
    pub const TIMEOUT: c_int = 3;
    pub const DONE: c_int = 4;
}

/// `libvlc_media_parse_flag_t`.
pub mod parse_flag {
    use std::ffi::c_int;

    pub const LOCAL: c_int = 0x00;
    pub const NETWORK: c_int = 0x01;
    pub const FETCH_LOCAL: c_int = 0x02;
    pub const FETCH_NETWORK: c_int = 0x04;
    pub const DO_INTERACT: c_int = 0x08;
}

/// `libvlc_log_level`.
pub mod log_level {
    use std::ffi::c_int;

    pub const DEBUG: c_int = 0;
    pub const NOTICE: c_int = 2;
    pub const WARNING: c_int = 3;
    pub const ERROR: c_int = 4;
}

/// `libvlc_track_type_t`.
pub mod track_type {
    use std::ffi::c_int;

    pub const UNKNOWN: c_int = -1;
    pub const AUDIO: c_int = 0;
    pub const VIDEO: c_int = 1;
    pub const TEXT: c_int = 2;
}

/// `LIBVLC_RENDERER_CAN_*`.
pub mod renderer_flag {
    use std::ffi::c_int;

    pub const CAN_AUDIO: c_int = 0x0001;
    pub const CAN_VIDEO: c_int = 0x0002;
}

// ── Callback signatures ──────────────────────────────────────────────

/// `libvlc_callback_t`.
pub type libvlc_callback_t = unsafe extern "C" fn(event: *const libvlc_event_t, data: *mut c_void);

/// Log sink after the native `va_list` has been formatted.
///
/// `module` may be null; `message` is always a NUL-terminated string valid
/// for the duration of the call.
pub type log_callback_t = unsafe extern "C" fn(
    data: *mut c_void,
    level: c_int,
    module: *const c_char,
    message: *const c_char,
);

/// `libvlc_video_lock_cb`.
pub type libvlc_video_lock_cb =
    unsafe extern "C" fn(opaque: *mut c_void, planes: *mut *mut c_void) -> *mut c_void;

/// `libvlc_video_unlock_cb`.
pub type libvlc_video_unlock_cb =
    unsafe extern "C" fn(opaque: *mut c_void, picture: *mut c_void, planes: *const *mut c_void);

/// `libvlc_video_display_cb`.
pub type libvlc_video_display_cb = unsafe extern "C" fn(opaque: *mut c_void, picture: *mut c_void);

/// `libvlc_video_format_cb`.
///
/// `chroma` points at four writable bytes; `pitches` and `lines` point at
/// arrays of `PICTURE_PLANE_MAX` entries.
pub type libvlc_video_format_cb = unsafe extern "C" fn(
    opaque: *mut *mut c_void,
    chroma: *mut c_char,
    width: *mut c_uint,
    height: *mut c_uint,
    pitches: *mut c_uint,
    lines: *mut c_uint,
) -> c_uint;

/// `libvlc_video_cleanup_cb`.
pub type libvlc_video_cleanup_cb = unsafe extern "C" fn(opaque: *mut c_void);

/// Plane arrays handed to the format callback have this many entries.
pub const PICTURE_PLANE_MAX: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn event_layout_matches_c_header() {
        // int + padding, then a pointer, then a union aligned to 8.
        assert_eq!(size_of::<libvlc_event_u>(), 32);
        assert_eq!(align_of::<libvlc_event_u>(), 8);
        assert_eq!(size_of::<libvlc_event_t>(), 2 * size_of::<usize>() + 32);
    }

    #[test]
    fn empty_event_has_zero_payload() {
        let ev = libvlc_event_t::empty(event_type::MEDIA_PLAYER_PLAYING, std::ptr::null_mut());
        assert_eq!(ev.type_, event_type::MEDIA_PLAYER_PLAYING);
        assert_eq!(unsafe { ev.u.new_time }, 0);
        assert!(unsafe { ev.u.object }.is_null());
    }
}
