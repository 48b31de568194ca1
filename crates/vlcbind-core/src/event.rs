//! Typed event model and translation from native events.

use std::ffi::{c_char, c_int, CStr};
use std::sync::Arc;

use tracing::{debug, warn};
use vlcbind_native::ffi::{event_type as ev, libvlc_event_t, log_level, parsed_status, state, track_type};
use vlcbind_native::{NativeApi, RawPtr};

use crate::handle::{HandleKind, SourceId};
use crate::lifecycle::{HoldPolicy, ItemRef, ItemSnapshot, ScopeToken, TransientItem};

// ── Enumerations ─────────────────────────────────────────────────────

/// `libvlc_state_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaState {
    NothingSpecial,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl MediaState {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            state::OPENING => MediaState::Opening,
            state::BUFFERING => MediaState::Buffering,
            state::PLAYING => MediaState::Playing,
            state::PAUSED => MediaState::Paused,
            state::STOPPED => MediaState::Stopped,
            state::ENDED => MediaState::Ended,
            state::ERROR => MediaState::Error,
            _ => MediaState::NothingSpecial,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MediaState::Ended | MediaState::Error | MediaState::Stopped)
    }
}

/// `libvlc_media_parsed_status_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParsedStatus {
    NotParsed,
    Skipped,
    Failed,
    Timeout,
    Done,
}

impl ParsedStatus {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            parsed_status::SKIPPED => ParsedStatus::Skipped,
            parsed_status::FAILED => ParsedStatus::Failed,
            parsed_status::TIMEOUT => ParsedStatus::Timeout,
            parsed_status::DONE => ParsedStatus::Done,
            _ => ParsedStatus::NotParsed,
        }
    }
}

/// `libvlc_meta_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKey {
    Title,
    Artist,
    Genre,
    Copyright,
    Album,
    TrackNumber,
    Description,
    Rating,
    Date,
    Setting,
    Url,
    Language,
    NowPlaying,
    Publisher,
    EncodedBy,
    ArtworkUrl,
    TrackId,
    TrackTotal,
    Director,
    Season,
    Episode,
    ShowName,
    Actors,
    AlbumArtist,
    DiscNumber,
    DiscTotal,
    Other(i32),
}

const META_ORDER: [MetaKey; 26] = [
    MetaKey::Title,
    MetaKey::Artist,
    MetaKey::Genre,
    MetaKey::Copyright,
    MetaKey::Album,
    MetaKey::TrackNumber,
    MetaKey::Description,
    MetaKey::Rating,
    MetaKey::Date,
    MetaKey::Setting,
    MetaKey::Url,
    MetaKey::Language,
    MetaKey::NowPlaying,
    MetaKey::Publisher,
    MetaKey::EncodedBy,
    MetaKey::ArtworkUrl,
    MetaKey::TrackId,
    MetaKey::TrackTotal,
    MetaKey::Director,
    MetaKey::Season,
    MetaKey::Episode,
    MetaKey::ShowName,
    MetaKey::Actors,
    MetaKey::AlbumArtist,
    MetaKey::DiscNumber,
    MetaKey::DiscTotal,
];

impl MetaKey {
    pub fn from_raw(raw: c_int) -> Self {
        usize::try_from(raw)
            .ok()
            .and_then(|i| META_ORDER.get(i).copied())
            .unwrap_or(MetaKey::Other(raw))
    }

    pub fn as_raw(self) -> c_int {
        match self {
            MetaKey::Other(raw) => raw,
            key => META_ORDER.iter().position(|k| *k == key).map_or(-1, |i| i as c_int),
        }
    }
}

/// `libvlc_track_type_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Unknown,
    Audio,
    Video,
    Text,
}

impl TrackType {
    fn from_raw(raw: c_int) -> Self {
        match raw {
            track_type::AUDIO => TrackType::Audio,
            track_type::VIDEO => TrackType::Video,
            track_type::TEXT => TrackType::Text,
            _ => TrackType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EsChange {
    Added,
    Deleted,
    Selected,
}

/// Native log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Notice,
    Warning,
    Error,
}

impl LogLevel {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            log_level::ERROR => LogLevel::Error,
            log_level::WARNING => LogLevel::Warning,
            log_level::NOTICE => LogLevel::Notice,
            _ => LogLevel::Debug,
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            LogLevel::Debug => log_level::DEBUG,
            LogLevel::Notice => log_level::NOTICE,
            LogLevel::Warning => log_level::WARNING,
            LogLevel::Error => log_level::ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub level: LogLevel,
    pub module: Option<String>,
    pub message: String,
}

// ── Records ──────────────────────────────────────────────────────────

/// One native occurrence, copied out of callback memory.
#[derive(Debug, Clone)]
pub enum EventRecord {
    // media
    MetaChanged(MetaKey),
    SubItemAdded(ItemRef),
    DurationChanged(i64),
    ParsedChanged(ParsedStatus),
    MediaFreed,
    MediaStateChanged(MediaState),
    SubItemTreeAdded(ItemRef),

    // player
    MediaChanged { mrl: Option<String> },
    NothingSpecial,
    Opening,
    Buffering(f32),
    Playing,
    Paused,
    Stopped,
    Forward,
    Backward,
    /// Playback reached the end (player `EndReached`, or media state `Ended`).
    MediaEnded,
    EncounteredError,
    TimeChanged(i64),
    PositionChanged(f32),
    SeekableChanged(bool),
    PausableChanged(bool),
    TitleChanged(i32),
    SnapshotTaken(String),
    LengthChanged(i64),
    VideoOutputChanged(i32),
    ScrambledChanged(bool),
    ElementaryStream { change: EsChange, track_type: TrackType, id: i32 },
    Corked,
    Uncorked,
    Muted,
    Unmuted,
    VolumeChanged(f32),
    AudioDeviceChanged(String),
    ChapterChanged(i32),

    // media list
    ListItemAdded { index: i32, item: ItemRef },
    ListWillAddItem { index: i32, item: ItemRef },
    ListItemDeleted { index: i32, item: ItemRef },
    ListWillDeleteItem { index: i32, item: ItemRef },
    ListEndReached,

    // discovery
    DiscovererStarted,
    DiscovererEnded,
    RendererItemAdded(ItemRef),
    RendererItemDeleted(ItemRef),

    Log(LogMessage),
}

impl EventRecord {
    pub fn name(&self) -> &'static str {
        match self {
            EventRecord::MetaChanged(_) => "meta-changed",
            EventRecord::SubItemAdded(_) => "sub-item-added",
            EventRecord::DurationChanged(_) => "duration-changed",
            EventRecord::ParsedChanged(_) => "parsed-changed",
            EventRecord::MediaFreed => "media-freed",
            EventRecord::MediaStateChanged(_) => "media-state-changed",
            EventRecord::SubItemTreeAdded(_) => "sub-item-tree-added",
            EventRecord::MediaChanged { .. } => "media-changed",
            EventRecord::NothingSpecial => "nothing-special",
            EventRecord::Opening => "opening",
            EventRecord::Buffering(_) => "buffering",
            EventRecord::Playing => "playing",
            EventRecord::Paused => "paused",
            EventRecord::Stopped => "stopped",
            EventRecord::Forward => "forward",
            EventRecord::Backward => "backward",
            EventRecord::MediaEnded => "media-ended",
            EventRecord::EncounteredError => "encountered-error",
            EventRecord::TimeChanged(_) => "time-changed",
            EventRecord::PositionChanged(_) => "position-changed",
            EventRecord::SeekableChanged(_) => "seekable-changed",
            EventRecord::PausableChanged(_) => "pausable-changed",
            EventRecord::TitleChanged(_) => "title-changed",
            EventRecord::SnapshotTaken(_) => "snapshot-taken",
            EventRecord::LengthChanged(_) => "length-changed",
            EventRecord::VideoOutputChanged(_) => "video-output-changed",
            EventRecord::ScrambledChanged(_) => "scrambled-changed",
            EventRecord::ElementaryStream { .. } => "elementary-stream",
            EventRecord::Corked => "corked",
            EventRecord::Uncorked => "uncorked",
            EventRecord::Muted => "muted",
            EventRecord::Unmuted => "unmuted",
            EventRecord::VolumeChanged(_) => "volume-changed",
            EventRecord::AudioDeviceChanged(_) => "audio-device-changed",
            EventRecord::ChapterChanged(_) => "chapter-changed",
            EventRecord::ListItemAdded { .. } => "list-item-added",
            EventRecord::ListWillAddItem { .. } => "list-will-add-item",
            EventRecord::ListItemDeleted { .. } => "list-item-deleted",
            EventRecord::ListWillDeleteItem { .. } => "list-will-delete-item",
            EventRecord::ListEndReached => "list-end-reached",
            EventRecord::DiscovererStarted => "discoverer-started",
            EventRecord::DiscovererEnded => "discoverer-ended",
            EventRecord::RendererItemAdded(_) => "renderer-item-added",
            EventRecord::RendererItemDeleted(_) => "renderer-item-deleted",
            EventRecord::Log(_) => "log",
        }
    }

    /// High-rate progress records that may be collapsed to the latest value.
    pub fn is_progress(&self) -> bool {
        matches!(self, EventRecord::TimeChanged(_) | EventRecord::PositionChanged(_))
    }
}

/// What listeners receive.
#[derive(Debug, Clone)]
pub struct Event {
    pub source: SourceId,
    /// Global enqueue order.
    pub seq: u64,
    pub record: EventRecord,
}

// ── Categories ───────────────────────────────────────────────────────

/// Group of native event types registered together by one bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Media,
    Player,
    MediaList,
    RendererDiscoverer,
}

const MEDIA_EVENTS: &[c_int] = &[
    ev::MEDIA_META_CHANGED,
    ev::MEDIA_SUB_ITEM_ADDED,
    ev::MEDIA_DURATION_CHANGED,
    ev::MEDIA_PARSED_CHANGED,
    ev::MEDIA_FREED,
    ev::MEDIA_STATE_CHANGED,
    ev::MEDIA_SUB_ITEM_TREE_ADDED,
];

const PLAYER_EVENTS: &[c_int] = &[
    ev::MEDIA_PLAYER_MEDIA_CHANGED,
    ev::MEDIA_PLAYER_NOTHING_SPECIAL,
    ev::MEDIA_PLAYER_OPENING,
    ev::MEDIA_PLAYER_BUFFERING,
    ev::MEDIA_PLAYER_PLAYING,
    ev::MEDIA_PLAYER_PAUSED,
    ev::MEDIA_PLAYER_STOPPED,
    ev::MEDIA_PLAYER_FORWARD,
    ev::MEDIA_PLAYER_BACKWARD,
    ev::MEDIA_PLAYER_END_REACHED,
    ev::MEDIA_PLAYER_ENCOUNTERED_ERROR,
    ev::MEDIA_PLAYER_TIME_CHANGED,
    ev::MEDIA_PLAYER_POSITION_CHANGED,
    ev::MEDIA_PLAYER_SEEKABLE_CHANGED,
    ev::MEDIA_PLAYER_PAUSABLE_CHANGED,
    ev::MEDIA_PLAYER_TITLE_CHANGED,
    ev::MEDIA_PLAYER_SNAPSHOT_TAKEN,
    ev::MEDIA_PLAYER_LENGTH_CHANGED,
    ev::MEDIA_PLAYER_VOUT,
    ev::MEDIA_PLAYER_SCRAMBLED_CHANGED,
    ev::MEDIA_PLAYER_ES_ADDED,
    ev::MEDIA_PLAYER_ES_DELETED,
    ev::MEDIA_PLAYER_ES_SELECTED,
    ev::MEDIA_PLAYER_CORKED,
    ev::MEDIA_PLAYER_UNCORKED,
    ev::MEDIA_PLAYER_MUTED,
    ev::MEDIA_PLAYER_UNMUTED,
    ev::MEDIA_PLAYER_AUDIO_VOLUME,
    ev::MEDIA_PLAYER_AUDIO_DEVICE,
    ev::MEDIA_PLAYER_CHAPTER_CHANGED,
];

const LIST_EVENTS: &[c_int] = &[
    ev::MEDIA_LIST_ITEM_ADDED,
    ev::MEDIA_LIST_WILL_ADD_ITEM,
    ev::MEDIA_LIST_ITEM_DELETED,
    ev::MEDIA_LIST_WILL_DELETE_ITEM,
    ev::MEDIA_LIST_END_REACHED,
];

const RENDERER_EVENTS: &[c_int] = &[
    ev::RENDERER_DISCOVERER_ITEM_ADDED,
    ev::RENDERER_DISCOVERER_ITEM_DELETED,
];

impl EventCategory {
    pub fn event_types(self) -> &'static [c_int] {
        match self {
            EventCategory::Media => MEDIA_EVENTS,
            EventCategory::Player => PLAYER_EVENTS,
            EventCategory::MediaList => LIST_EVENTS,
            EventCategory::RendererDiscoverer => RENDERER_EVENTS,
        }
    }

    /// Kind of object that owns the event manager.
    pub fn owner_kind(self) -> HandleKind {
        match self {
            EventCategory::Media => HandleKind::Media,
            EventCategory::Player => HandleKind::Player,
            EventCategory::MediaList => HandleKind::MediaList,
            EventCategory::RendererDiscoverer => HandleKind::RendererDiscoverer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Media => "media",
            EventCategory::Player => "player",
            EventCategory::MediaList => "media-list",
            EventCategory::RendererDiscoverer => "renderer-discoverer",
        }
    }
}

// ── Translation ──────────────────────────────────────────────────────

/// Everything the translation of one callback needs.
pub(crate) struct Translator<'a> {
    pub api: &'a Arc<dyn NativeApi>,
    pub scope: ScopeToken,
    pub policy: HoldPolicy,
}

unsafe fn copy_str(raw: *const c_char) -> Option<String> {
    if raw.is_null() {
        None
    } else {
        Some(CStr::from_ptr(raw).to_string_lossy().into_owned())
    }
}

impl Translator<'_> {
    /// Wrap an object pointer from the payload, holding it when the policy
    /// says so. Null pointers yield `None`.
    unsafe fn item(&self, kind: HandleKind, raw: *mut std::ffi::c_void) -> Option<ItemRef> {
        let ptr = RawPtr::new(raw)?;
        let snapshot = ItemSnapshot::capture(self.api.as_ref(), kind, ptr);
        let transient = TransientItem::new(self.api.clone(), kind, ptr, self.scope.clone(), snapshot);
        match self.policy {
            HoldPolicy::Transient => Some(ItemRef::Transient(transient)),
            HoldPolicy::HoldDiscovered => match transient.hold() {
                Ok(held) => Some(ItemRef::Held(Arc::new(held))),
                Err(err) => {
                    warn!(%kind, error = %err, "could not hold discovered item");
                    Some(ItemRef::Transient(transient))
                }
            },
        }
    }

    /// Deterministic native-type → record mapping. `None` for unknown
    /// types and for payloads missing a required object.
    ///
    /// # Safety
    ///
    /// `event` must be the event the native library passed to the running
    /// callback.
    pub unsafe fn translate(&self, event: &libvlc_event_t) -> Option<EventRecord> {
        let u = &event.u;
        let record = match event.type_ {
            ev::MEDIA_META_CHANGED => EventRecord::MetaChanged(MetaKey::from_raw(u.meta_type)),
            ev::MEDIA_SUB_ITEM_ADDED => EventRecord::SubItemAdded(self.item(HandleKind::Media, u.object)?),
            ev::MEDIA_DURATION_CHANGED => EventRecord::DurationChanged(u.new_duration),
            ev::MEDIA_PARSED_CHANGED => EventRecord::ParsedChanged(ParsedStatus::from_raw(u.new_status)),
            ev::MEDIA_FREED => EventRecord::MediaFreed,
            ev::MEDIA_STATE_CHANGED => match MediaState::from_raw(u.new_state) {
                MediaState::Ended => EventRecord::MediaEnded,
                other => EventRecord::MediaStateChanged(other),
            },
            ev::MEDIA_SUB_ITEM_TREE_ADDED => {
                EventRecord::SubItemTreeAdded(self.item(HandleKind::Media, u.object)?)
            }

            ev::MEDIA_PLAYER_MEDIA_CHANGED => EventRecord::MediaChanged {
                mrl: RawPtr::new(u.object).and_then(|m| self.api.media_mrl(m)),
            },
            ev::MEDIA_PLAYER_NOTHING_SPECIAL => EventRecord::NothingSpecial,
            ev::MEDIA_PLAYER_OPENING => EventRecord::Opening,
            ev::MEDIA_PLAYER_BUFFERING => EventRecord::Buffering(u.new_cache),
            ev::MEDIA_PLAYER_PLAYING => EventRecord::Playing,
            ev::MEDIA_PLAYER_PAUSED => EventRecord::Paused,
            ev::MEDIA_PLAYER_STOPPED => EventRecord::Stopped,
            ev::MEDIA_PLAYER_FORWARD => EventRecord::Forward,
            ev::MEDIA_PLAYER_BACKWARD => EventRecord::Backward,
            ev::MEDIA_PLAYER_END_REACHED => EventRecord::MediaEnded,
            ev::MEDIA_PLAYER_ENCOUNTERED_ERROR => EventRecord::EncounteredError,
            ev::MEDIA_PLAYER_TIME_CHANGED => EventRecord::TimeChanged(u.new_time),
            ev::MEDIA_PLAYER_POSITION_CHANGED => EventRecord::PositionChanged(u.new_position),
            ev::MEDIA_PLAYER_SEEKABLE_CHANGED => EventRecord::SeekableChanged(u.new_seekable != 0),
            ev::MEDIA_PLAYER_PAUSABLE_CHANGED => EventRecord::PausableChanged(u.new_pausable != 0),
            ev::MEDIA_PLAYER_TITLE_CHANGED => EventRecord::TitleChanged(u.new_title),
            ev::MEDIA_PLAYER_SNAPSHOT_TAKEN => EventRecord::SnapshotTaken(copy_str(u.filename)?),
            ev::MEDIA_PLAYER_LENGTH_CHANGED => EventRecord::LengthChanged(u.new_length),
            ev::MEDIA_PLAYER_VOUT => EventRecord::VideoOutputChanged(u.new_count),
            ev::MEDIA_PLAYER_SCRAMBLED_CHANGED => EventRecord::ScrambledChanged(u.new_scrambled != 0),
            ev::MEDIA_PLAYER_ES_ADDED | ev::MEDIA_PLAYER_ES_DELETED | ev::MEDIA_PLAYER_ES_SELECTED => {
                let change = match event.type_ {
                    ev::MEDIA_PLAYER_ES_ADDED => EsChange::Added,
                    ev::MEDIA_PLAYER_ES_DELETED => EsChange::Deleted,
                    _ => EsChange::Selected,
                };
                EventRecord::ElementaryStream {
                    change,
                    track_type: TrackType::from_raw(u.es.i_type),
                    id: u.es.i_id,
                }
            }
            ev::MEDIA_PLAYER_CORKED => EventRecord::Corked,
            ev::MEDIA_PLAYER_UNCORKED => EventRecord::Uncorked,
            ev::MEDIA_PLAYER_MUTED => EventRecord::Muted,
            ev::MEDIA_PLAYER_UNMUTED => EventRecord::Unmuted,
            ev::MEDIA_PLAYER_AUDIO_VOLUME => EventRecord::VolumeChanged(u.volume),
            ev::MEDIA_PLAYER_AUDIO_DEVICE => {
                EventRecord::AudioDeviceChanged(copy_str(u.device).unwrap_or_default())
            }
            ev::MEDIA_PLAYER_CHAPTER_CHANGED => EventRecord::ChapterChanged(u.new_chapter),

            ev::MEDIA_LIST_ITEM_ADDED
            | ev::MEDIA_LIST_WILL_ADD_ITEM
            | ev::MEDIA_LIST_ITEM_DELETED
            | ev::MEDIA_LIST_WILL_DELETE_ITEM => {
                let index = u.list_item.index;
                let item = self.item(HandleKind::Media, u.list_item.item)?;
                match event.type_ {
                    ev::MEDIA_LIST_ITEM_ADDED => EventRecord::ListItemAdded { index, item },
                    ev::MEDIA_LIST_WILL_ADD_ITEM => EventRecord::ListWillAddItem { index, item },
                    ev::MEDIA_LIST_ITEM_DELETED => EventRecord::ListItemDeleted { index, item },
                    _ => EventRecord::ListWillDeleteItem { index, item },
                }
            }
            ev::MEDIA_LIST_END_REACHED => EventRecord::ListEndReached,

            ev::RENDERER_DISCOVERER_ITEM_ADDED => {
                EventRecord::RendererItemAdded(self.item(HandleKind::RendererItem, u.object)?)
            }
            ev::RENDERER_DISCOVERER_ITEM_DELETED => {
                EventRecord::RendererItemDeleted(self.item(HandleKind::RendererItem, u.object)?)
            }

            other => {
                debug!(event_type = other, "dropping unknown native event");
                return None;
            }
        };
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::CallbackScope;
    use vlcbind_native::ffi::libvlc_event_u;
    use vlcbind_native::sim::SimulatedNative;

    fn translate(api: &Arc<dyn NativeApi>, event: &libvlc_event_t) -> Option<EventRecord> {
        let scope = CallbackScope::open();
        let t = Translator { api, scope: scope.token(), policy: HoldPolicy::Transient };
        unsafe { t.translate(event) }
    }

    #[test]
    fn ended_state_and_end_reached_both_map_to_media_ended() {
        let api: Arc<dyn NativeApi> = Arc::new(SimulatedNative::new());
        let mut media_ended = libvlc_event_t::empty(ev::MEDIA_STATE_CHANGED, std::ptr::null_mut());
        media_ended.u = libvlc_event_u { new_state: state::ENDED };
        let end_reached = libvlc_event_t::empty(ev::MEDIA_PLAYER_END_REACHED, std::ptr::null_mut());

        assert!(matches!(translate(&api, &media_ended), Some(EventRecord::MediaEnded)));
        assert!(matches!(translate(&api, &end_reached), Some(EventRecord::MediaEnded)));
    }

    #[test]
    fn scalar_payloads_are_copied() {
        let api: Arc<dyn NativeApi> = Arc::new(SimulatedNative::new());
        let mut time = libvlc_event_t::empty(ev::MEDIA_PLAYER_TIME_CHANGED, std::ptr::null_mut());
        time.u = libvlc_event_u { new_time: 12_345 };
        let mut paused = libvlc_event_t::empty(ev::MEDIA_STATE_CHANGED, std::ptr::null_mut());
        paused.u = libvlc_event_u { new_state: state::PAUSED };

        assert!(matches!(translate(&api, &time), Some(EventRecord::TimeChanged(12_345))));
        assert!(matches!(
            translate(&api, &paused),
            Some(EventRecord::MediaStateChanged(MediaState::Paused))
        ));
    }

    #[test]
    fn unknown_types_and_missing_objects_are_dropped() {
        let api: Arc<dyn NativeApi> = Arc::new(SimulatedNative::new());
        let unknown = libvlc_event_t::empty(0x7fff, std::ptr::null_mut());
        let no_item = libvlc_event_t::empty(ev::RENDERER_DISCOVERER_ITEM_ADDED, std::ptr::null_mut());
        assert!(translate(&api, &unknown).is_none());
        assert!(translate(&api, &no_item).is_none());
    }

    #[test]
    fn meta_keys_round_trip_through_raw_values() {
        assert_eq!(MetaKey::from_raw(0), MetaKey::Title);
        assert_eq!(MetaKey::from_raw(25), MetaKey::DiscTotal);
        assert_eq!(MetaKey::from_raw(99), MetaKey::Other(99));
        assert_eq!(MetaKey::ArtworkUrl.as_raw(), 15);
    }

    #[test]
    fn log_levels_order_by_severity() {
        assert!(LogLevel::Error > LogLevel::Warning);
        assert_eq!(LogLevel::from_raw(log_level::NOTICE), LogLevel::Notice);
        assert_eq!(LogLevel::from_raw(1), LogLevel::Debug);
    }

    #[test]
    fn every_category_registers_distinct_types() {
        for category in [
            EventCategory::Media,
            EventCategory::Player,
            EventCategory::MediaList,
            EventCategory::RendererDiscoverer,
        ] {
            let types = category.event_types();
            let mut sorted = types.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), types.len(), "{}", category.as_str());
        }
    }
}
