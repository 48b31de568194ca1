//! In-process stand-in for LibVLC.
//!
//! [`SimulatedNative`] keeps a table of fake native objects with real
//! reference counts, event-manager registrations and video callbacks. It
//! never frees memory: released objects stay in the table marked as freed so
//! that double releases and use-after-free calls are recorded as
//! [`Violation`]s instead of crashing the process.
//!
//! Callbacks are always invoked after the internal lock is dropped, so a
//! callback may call back into the simulator. Like LibVLC, event and log
//! callbacks run under a dispatch lock that `event_detach` and `log_unset`
//! also take: once either returns, no callback of that registration is
//! still running.

use std::collections::{HashMap, HashSet};
use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::ptr::{self, NonNull};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace, warn};

use crate::api::{FormatCallbacks, NativeApi, ObjectKind, RawPtr, VideoCallbacks, WindowHandle};
use crate::ffi::{
    event_type as ev, libvlc_callback_t, libvlc_es_payload, libvlc_event_t,
    libvlc_list_item_payload, libvlc_video_cleanup_cb, libvlc_video_display_cb,
    libvlc_video_format_cb, libvlc_video_lock_cb, libvlc_video_unlock_cb, log_callback_t,
    parsed_status, state, PICTURE_PLANE_MAX,
};

const BASE_ADDR: usize = 0x1000_0000;
const ADDR_STRIDE: usize = 0x40;
/// Event managers live inside their owner, like the native structs.
const MANAGER_OFFSET: usize = 8;

pub const DEFAULT_VERSION: &str = "3.0.20 Vetinari";

/// A contract breach observed by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DoubleRelease { kind: ObjectKind, addr: usize },
    UseAfterFree { op: &'static str, addr: usize },
    UnknownObject { op: &'static str, addr: usize },
    KindMismatch { op: &'static str, addr: usize, expected: ObjectKind, actual: ObjectKind },
    ListNotLocked { op: &'static str, addr: usize },
}

/// Calls that can be made to fail once with [`SimulatedNative::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailKind {
    NewInstance,
    NewMedia,
    NewPlayer,
    NewList,
    NewDiscoverer,
    NewRendererDiscoverer,
    EventAttach,
    Play,
    Parse,
}

/// Event payload for [`SimulatedNative::fire_raw`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    /// Any single-`int` payload (state, status, count, chapter, ...).
    Int(c_int),
    /// Position, cache percentage or volume.
    Float(f32),
    /// Time, length or duration in milliseconds.
    Time(i64),
    Object(Option<RawPtr>),
    ListItem { item: RawPtr, index: c_int },
    Es { track_type: c_int, id: c_int },
    /// Snapshot file name or audio device id.
    Text(String),
}

/// Result of [`SimulatedNative::render_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Displayed,
    FormatRejected,
    NoCallbacks,
}

// ── Object table ─────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Registration {
    event_type: c_int,
    callback: libvlc_callback_t,
    data: usize,
}

#[derive(Clone, Copy)]
struct Negotiated {
    width: u32,
    height: u32,
    pitches: [c_uint; PICTURE_PLANE_MAX],
    lines: [c_uint; PICTURE_PLANE_MAX],
    opaque: usize,
}

#[derive(Clone, Copy)]
struct VideoSlot {
    lock: libvlc_video_lock_cb,
    unlock: Option<libvlc_video_unlock_cb>,
    display: Option<libvlc_video_display_cb>,
    setup: libvlc_video_format_cb,
    cleanup: Option<libvlc_video_cleanup_cb>,
    opaque: usize,
    negotiated: Option<Negotiated>,
}

#[derive(Default)]
struct MediaBody {
    mrl: String,
    meta: HashMap<c_int, String>,
    state: c_int,
    duration: i64,
    parsed: c_int,
    options: Vec<String>,
    subitems: Option<usize>,
}

struct PlayerBody {
    media: Option<usize>,
    state: c_int,
    time: i64,
    position: f32,
    rate: f32,
    volume: c_int,
    mute: bool,
    window: Option<WindowHandle>,
    renderer: Option<usize>,
    video: Option<VideoSlot>,
    /// Callbacks the running video output picked up. Changes to `video`
    /// reach it only once the output is torn down by a stop.
    output: Option<VideoSlot>,
}

impl Default for PlayerBody {
    fn default() -> Self {
        Self {
            media: None,
            state: state::NOTHING_SPECIAL,
            time: 0,
            position: 0.0,
            rate: 1.0,
            volume: 100,
            mute: false,
            window: None,
            renderer: None,
            video: None,
            output: None,
        }
    }
}

enum Body {
    Instance { log: Option<(log_callback_t, usize)> },
    Media(MediaBody),
    Player(PlayerBody),
    List { items: Vec<usize>, locked: bool },
    Discoverer { running: bool, list: usize },
    RendererDiscoverer { running: bool, items: Vec<usize> },
    RendererItem { name: String, kind: String, icon: Option<String>, flags: c_int },
}

struct SimObject {
    kind: ObjectKind,
    refs: u32,
    freed: bool,
    release_calls: u32,
    listeners: Vec<Registration>,
    body: Body,
}

struct Pending {
    target: usize,
    event_type: c_int,
    payload: Payload,
}

impl Pending {
    fn new(target: usize, event_type: c_int, payload: Payload) -> Self {
        Self { target, event_type, payload }
    }
}

struct SimState {
    objects: HashMap<usize, SimObject>,
    next: usize,
    violations: Vec<Violation>,
    failures: HashSet<FailKind>,
    attach_budget: Option<usize>,
    version: String,
}

fn ptr_of(addr: usize) -> RawPtr {
    // Addresses are allocated from BASE_ADDR upward and are never zero.
    unsafe { NonNull::new_unchecked(addr as *mut c_void) }
}

fn output_running(player_state: c_int) -> bool {
    !matches!(player_state, state::NOTHING_SPECIAL | state::STOPPED)
}

impl SimState {
    fn alloc(&mut self, kind: ObjectKind, body: Body) -> usize {
        let addr = BASE_ADDR + self.next * ADDR_STRIDE;
        self.next += 1;
        self.objects.insert(
            addr,
            SimObject { kind, refs: 1, freed: false, release_calls: 0, listeners: Vec::new(), body },
        );
        trace!(addr = format_args!("{addr:#x}"), %kind, "sim alloc");
        addr
    }

    fn take_failure(&mut self, kind: FailKind) -> bool {
        self.failures.remove(&kind)
    }

    fn violate(&mut self, violation: Violation) {
        warn!(?violation, "native contract violation");
        self.violations.push(violation);
    }

    fn lookup(&mut self, op: &'static str, addr: usize, kind: ObjectKind) -> Option<&mut SimObject> {
        let found = match self.objects.get(&addr) {
            None => Err(Violation::UnknownObject { op, addr }),
            Some(obj) if obj.freed => Err(Violation::UseAfterFree { op, addr }),
            Some(obj) if obj.kind != kind => Err(Violation::KindMismatch {
                op,
                addr,
                expected: kind,
                actual: obj.kind,
            }),
            Some(_) => Ok(()),
        };
        match found {
            Ok(()) => self.objects.get_mut(&addr),
            Err(v) => {
                self.violate(v);
                None
            }
        }
    }

    fn media(&mut self, op: &'static str, addr: usize) -> Option<&mut MediaBody> {
        match &mut self.lookup(op, addr, ObjectKind::Media)?.body {
            Body::Media(m) => Some(m),
            _ => None,
        }
    }

    fn player(&mut self, op: &'static str, addr: usize) -> Option<&mut PlayerBody> {
        match &mut self.lookup(op, addr, ObjectKind::Player)?.body {
            Body::Player(p) => Some(p),
            _ => None,
        }
    }

    /// Items of a list the caller has locked.
    fn locked_items(&mut self, op: &'static str, addr: usize) -> Option<&mut Vec<usize>> {
        let locked = match &self.lookup(op, addr, ObjectKind::MediaList)?.body {
            Body::List { locked, .. } => *locked,
            _ => return None,
        };
        if !locked {
            self.violate(Violation::ListNotLocked { op, addr });
        }
        match &mut self.objects.get_mut(&addr)?.body {
            Body::List { items, .. } => Some(items),
            _ => None,
        }
    }

    fn retain_addr(&mut self, op: &'static str, addr: usize, kind: ObjectKind) {
        if let Some(obj) = self.lookup(op, addr, kind) {
            obj.refs += 1;
        }
    }

    fn release_addr(&mut self, addr: usize, kind: ObjectKind) {
        let mut pending = vec![(addr, kind)];
        while let Some((addr, kind)) = pending.pop() {
            let Some(obj) = self.objects.get_mut(&addr) else {
                self.violate(Violation::UnknownObject { op: "release", addr });
                continue;
            };
            if obj.freed {
                self.violate(Violation::DoubleRelease { kind, addr });
                continue;
            }
            obj.release_calls += 1;
            obj.refs -= 1;
            if obj.refs > 0 {
                continue;
            }
            obj.freed = true;
            obj.listeners.clear();
            trace!(addr = format_args!("{addr:#x}"), %kind, "sim free");
            match &mut obj.body {
                Body::Media(m) => {
                    pending.extend(m.subitems.take().map(|l| (l, ObjectKind::MediaList)));
                }
                Body::Player(p) => {
                    pending.extend(p.media.take().map(|m| (m, ObjectKind::Media)));
                    pending.extend(p.renderer.take().map(|r| (r, ObjectKind::RendererItem)));
                }
                Body::List { items, .. } => {
                    pending.extend(items.drain(..).map(|m| (m, ObjectKind::Media)));
                }
                Body::Discoverer { list, .. } => pending.push((*list, ObjectKind::MediaList)),
                Body::RendererDiscoverer { items, .. } => {
                    pending.extend(items.drain(..).map(|i| (i, ObjectKind::RendererItem)));
                }
                Body::Instance { .. } | Body::RendererItem { .. } => {}
            }
        }
    }

    fn new_media(&mut self, mrl: String) -> usize {
        self.alloc(
            ObjectKind::Media,
            Body::Media(MediaBody { mrl, ..MediaBody::default() }),
        )
    }
}

/// Simulated native library. See the module docs.
pub struct SimulatedNative {
    state: Mutex<SimState>,
    /// Taken before `state` whenever both are needed.
    dispatch: ReentrantMutex<()>,
}

impl Default for SimulatedNative {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNative {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                objects: HashMap::new(),
                next: 0,
                violations: Vec::new(),
                failures: HashSet::new(),
                attach_budget: None,
                version: DEFAULT_VERSION.to_string(),
            }),
            dispatch: ReentrantMutex::new(()),
        }
    }

    /// Report a different library version.
    pub fn set_version(&self, version: &str) {
        self.state.lock().version = version.to_string();
    }

    /// Make the next call of `kind` fail with the native failure sentinel.
    pub fn fail_next(&self, kind: FailKind) {
        self.state.lock().failures.insert(kind);
    }

    /// Allow `successes` more event attaches, then fail every later one.
    pub fn fail_attach_after(&self, successes: usize) {
        self.state.lock().attach_budget = Some(successes);
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn violations(&self) -> Vec<Violation> {
        self.state.lock().violations.clone()
    }

    /// Native reference count; zero once freed or for unknown objects.
    pub fn native_refs(&self, obj: RawPtr) -> u32 {
        let st = self.state.lock();
        match st.objects.get(&(obj.as_ptr() as usize)) {
            Some(o) if !o.freed => o.refs,
            _ => 0,
        }
    }

    pub fn is_freed(&self, obj: RawPtr) -> bool {
        let st = self.state.lock();
        st.objects.get(&(obj.as_ptr() as usize)).is_some_and(|o| o.freed)
    }

    /// Number of release calls that reached this object, including the one
    /// that freed it but not rejected double releases.
    pub fn release_calls(&self, obj: RawPtr) -> u32 {
        let st = self.state.lock();
        st.objects.get(&(obj.as_ptr() as usize)).map_or(0, |o| o.release_calls)
    }

    /// Callbacks currently attached to `obj`'s event manager.
    pub fn registered_callbacks(&self, obj: RawPtr) -> usize {
        let st = self.state.lock();
        st.objects.get(&(obj.as_ptr() as usize)).map_or(0, |o| o.listeners.len())
    }

    /// Objects that are allocated and not yet freed.
    pub fn live_objects(&self) -> usize {
        self.state.lock().objects.values().filter(|o| !o.freed).count()
    }

    pub fn has_video_callbacks(&self, player: RawPtr) -> bool {
        let mut st = self.state.lock();
        st.player("has_video_callbacks", player.as_ptr() as usize)
            .is_some_and(|p| p.video.is_some())
    }

    /// Whether a video output is still bound to callbacks, possibly ones
    /// the application has since replaced.
    pub fn has_video_output(&self, player: RawPtr) -> bool {
        let mut st = self.state.lock();
        st.player("has_video_output", player.as_ptr() as usize)
            .is_some_and(|p| p.output.is_some())
    }

    pub fn window(&self, player: RawPtr) -> Option<WindowHandle> {
        let mut st = self.state.lock();
        st.player("window", player.as_ptr() as usize).and_then(|p| p.window)
    }

    pub fn media_options(&self, media: RawPtr) -> Vec<String> {
        let mut st = self.state.lock();
        st.media("media_options", media.as_ptr() as usize)
            .map(|m| m.options.clone())
            .unwrap_or_default()
    }

    // ── Test hooks ───────────────────────────────────────────────────

    /// Deliver an arbitrary event to every callback attached to `obj`.
    pub fn fire_raw(&self, obj: RawPtr, event_type: c_int, payload: Payload) {
        self.emit(vec![Pending::new(obj.as_ptr() as usize, event_type, payload)]);
    }

    pub fn set_media_meta(&self, media: RawPtr, meta: c_int, value: &str) {
        let mut st = self.state.lock();
        if let Some(m) = st.media("set_media_meta", media.as_ptr() as usize) {
            m.meta.insert(meta, value.to_string());
        }
    }

    /// Duration reported once the media is parsed.
    pub fn set_media_duration(&self, media: RawPtr, duration_ms: i64) {
        let mut st = self.state.lock();
        if let Some(m) = st.media("set_media_duration", media.as_ptr() as usize) {
            m.duration = duration_ms;
        }
    }

    /// Move playback forward, firing time and position changes.
    pub fn advance(&self, player: RawPtr, time_ms: i64) {
        let addr = player.as_ptr() as usize;
        let batch = {
            let mut st = self.state.lock();
            let media = st.player("advance", addr).and_then(|p| p.media);
            let duration = media
                .and_then(|m| st.media("advance", m).map(|m| m.duration))
                .unwrap_or(0);
            let Some(p) = st.player("advance", addr) else {
                return;
            };
            p.time = time_ms;
            p.position = if duration > 0 { time_ms as f32 / duration as f32 } else { 0.0 };
            vec![
                Pending::new(addr, ev::MEDIA_PLAYER_TIME_CHANGED, Payload::Time(p.time)),
                Pending::new(addr, ev::MEDIA_PLAYER_POSITION_CHANGED, Payload::Float(p.position)),
            ]
        };
        self.emit(batch);
    }

    /// Play the current media to its end.
    pub fn finish_playback(&self, player: RawPtr) {
        let addr = player.as_ptr() as usize;
        let batch = {
            let mut st = self.state.lock();
            let Some(p) = st.player("finish_playback", addr) else {
                return;
            };
            p.state = state::ENDED;
            let media = p.media;
            let mut batch = Vec::new();
            if let Some(m) = media.and_then(|m| st.media("finish_playback", m).map(|b| (m, b))) {
                m.1.state = state::ENDED;
                batch.push(Pending::new(m.0, ev::MEDIA_STATE_CHANGED, Payload::Int(state::ENDED)));
            }
            batch.push(Pending::new(addr, ev::MEDIA_PLAYER_END_REACHED, Payload::None));
            batch
        };
        self.emit(batch);
    }

    /// Add a renderer the discoverer "found". The discoverer owns the item's
    /// only reference until [`remove_renderer_item`](Self::remove_renderer_item).
    pub fn add_renderer_item(
        &self,
        discoverer: RawPtr,
        name: &str,
        kind: &str,
        flags: c_int,
    ) -> Option<RawPtr> {
        let rd = discoverer.as_ptr() as usize;
        let item = {
            let mut st = self.state.lock();
            st.lookup("add_renderer_item", rd, ObjectKind::RendererDiscoverer)?;
            let item = st.alloc(
                ObjectKind::RendererItem,
                Body::RendererItem {
                    name: name.to_string(),
                    kind: kind.to_string(),
                    icon: None,
                    flags,
                },
            );
            if let Some(SimObject { body: Body::RendererDiscoverer { items, .. }, .. }) =
                st.objects.get_mut(&rd)
            {
                items.push(item);
            }
            item
        };
        self.emit(vec![Pending::new(
            rd,
            ev::RENDERER_DISCOVERER_ITEM_ADDED,
            Payload::Object(Some(ptr_of(item))),
        )]);
        Some(ptr_of(item))
    }

    /// The discoverer lost `item`: fire the deletion, then drop its reference.
    pub fn remove_renderer_item(&self, discoverer: RawPtr, item: RawPtr) {
        let rd = discoverer.as_ptr() as usize;
        let addr = item.as_ptr() as usize;
        let owned = {
            let mut st = self.state.lock();
            match st.lookup("remove_renderer_item", rd, ObjectKind::RendererDiscoverer) {
                Some(SimObject { body: Body::RendererDiscoverer { items, .. }, .. }) => {
                    let before = items.len();
                    items.retain(|i| *i != addr);
                    items.len() != before
                }
                _ => false,
            }
        };
        if !owned {
            return;
        }
        self.emit(vec![Pending::new(
            rd,
            ev::RENDERER_DISCOVERER_ITEM_DELETED,
            Payload::Object(Some(item)),
        )]);
        self.state.lock().release_addr(addr, ObjectKind::RendererItem);
    }

    /// A media discoverer found `mrl`; appends it to the discoverer's list.
    pub fn add_discovered_media(&self, discoverer: RawPtr, mrl: &str) -> Option<RawPtr> {
        let list = {
            let mut st = self.state.lock();
            match st.lookup("add_discovered_media", discoverer.as_ptr() as usize, ObjectKind::Discoverer)?
                .body
            {
                Body::Discoverer { list, .. } => list,
                _ => return None,
            }
        };
        let media = self.state.lock().new_media(mrl.to_string());
        let list = ptr_of(list);
        unsafe {
            self.list_lock(list);
            self.list_add(list, ptr_of(media));
            self.list_unlock(list);
        }
        // The list holds its own reference now.
        self.state.lock().release_addr(media, ObjectKind::Media);
        Some(ptr_of(media))
    }

    /// Send a log line through the instance's log callback.
    pub fn emit_log(&self, instance: RawPtr, level: c_int, module: Option<&str>, message: &str) -> bool {
        let _dispatch = self.dispatch.lock();
        let sink = {
            let mut st = self.state.lock();
            match st.lookup("emit_log", instance.as_ptr() as usize, ObjectKind::Instance) {
                Some(SimObject { body: Body::Instance { log }, .. }) => *log,
                _ => None,
            }
        };
        let Some((callback, data)) = sink else {
            return false;
        };
        let module = module.and_then(|m| CString::new(m).ok());
        let Ok(message) = CString::new(message) else {
            return false;
        };
        unsafe {
            callback(
                data as *mut c_void,
                level,
                module.as_ref().map_or(ptr::null(), |m| m.as_ptr()),
                message.as_ptr(),
            );
        }
        true
    }

    /// Drive one picture through the installed video callbacks: format
    /// negotiation (when the size changed), lock, fill every plane with
    /// `fill`, unlock and display.
    pub fn render_frame(&self, player: RawPtr, width: u32, height: u32, fill: u8) -> RenderOutcome {
        let addr = player.as_ptr() as usize;
        let Some(slot) = self.state.lock().player("render_frame", addr).and_then(|p| {
            if p.output.is_none() {
                p.output = p.video;
            }
            p.output
        }) else {
            return RenderOutcome::NoCallbacks;
        };

        let negotiated = match slot.negotiated {
            Some(n) if n.width == width && n.height == height => n,
            previous => {
                if let (Some(prev), Some(cleanup)) = (previous, slot.cleanup) {
                    unsafe { cleanup(prev.opaque as *mut c_void) };
                }
                let mut opaque = slot.opaque as *mut c_void;
                let mut chroma: [c_char; 4] = [b'R' as c_char, b'V' as c_char, b'3' as c_char, b'2' as c_char];
                let (mut w, mut h) = (width, height);
                let mut pitches = [0 as c_uint; PICTURE_PLANE_MAX];
                let mut lines = [0 as c_uint; PICTURE_PLANE_MAX];
                let buffers = unsafe {
                    (slot.setup)(
                        &mut opaque,
                        chroma.as_mut_ptr(),
                        &mut w,
                        &mut h,
                        pitches.as_mut_ptr(),
                        lines.as_mut_ptr(),
                    )
                };
                let n = (buffers != 0).then_some(Negotiated {
                    width,
                    height,
                    pitches,
                    lines,
                    opaque: opaque as usize,
                });
                if let Some(Some(video)) = self
                    .state
                    .lock()
                    .player("render_frame", addr)
                    .map(|p| p.output.as_mut())
                {
                    video.negotiated = n;
                }
                match n {
                    Some(n) => n,
                    None => {
                        debug!("format callback rejected the picture");
                        return RenderOutcome::FormatRejected;
                    }
                }
            }
        };

        let opaque = negotiated.opaque as *mut c_void;
        let mut planes = [ptr::null_mut::<c_void>(); PICTURE_PLANE_MAX];
        unsafe {
            let picture = (slot.lock)(opaque, planes.as_mut_ptr());
            for (i, plane) in planes.iter().enumerate() {
                let len = negotiated.pitches[i] as usize * negotiated.lines[i] as usize;
                if !plane.is_null() && len > 0 {
                    ptr::write_bytes(*plane as *mut u8, fill, len);
                }
            }
            if let Some(unlock) = slot.unlock {
                unlock(opaque, picture, planes.as_ptr());
            }
            if let Some(display) = slot.display {
                display(opaque, picture);
            }
        }
        RenderOutcome::Displayed
    }

    // ── Emission ─────────────────────────────────────────────────────

    fn emit(&self, batch: Vec<Pending>) {
        for pending in batch {
            let _dispatch = self.dispatch.lock();
            let targets: Vec<Registration> = {
                let st = self.state.lock();
                match st.objects.get(&pending.target) {
                    Some(obj) if !obj.freed => obj
                        .listeners
                        .iter()
                        .filter(|r| r.event_type == pending.event_type)
                        .copied()
                        .collect(),
                    _ => Vec::new(),
                }
            };
            if targets.is_empty() {
                continue;
            }

            let text = match &pending.payload {
                Payload::Text(s) => CString::new(s.as_str()).ok(),
                _ => None,
            };
            let mut event = libvlc_event_t::empty(pending.event_type, pending.target as *mut c_void);
            match &pending.payload {
                Payload::None => {}
                Payload::Int(v) => event.u.new_state = *v,
                Payload::Float(v) => event.u.new_position = *v,
                Payload::Time(v) => event.u.new_time = *v,
                Payload::Object(o) => event.u.object = o.map_or(ptr::null_mut(), |p| p.as_ptr()),
                Payload::ListItem { item, index } => {
                    event.u.list_item = libvlc_list_item_payload { item: item.as_ptr(), index: *index }
                }
                Payload::Es { track_type, id } => {
                    event.u.es = libvlc_es_payload { i_type: *track_type, i_id: *id }
                }
                Payload::Text(_) => {
                    event.u.filename = text.as_ref().map_or(ptr::null(), |t| t.as_ptr())
                }
            }

            for reg in targets {
                unsafe { (reg.callback)(&event, reg.data as *mut c_void) };
            }
        }
    }

    fn alloc_checked(&self, fail: FailKind, kind: ObjectKind, body: Body) -> Option<RawPtr> {
        let mut st = self.state.lock();
        if st.take_failure(fail) {
            debug!(%kind, "simulated allocation failure");
            return None;
        }
        Some(ptr_of(st.alloc(kind, body)))
    }

    fn instance_ok(&self, op: &'static str, instance: RawPtr) -> bool {
        self.state
            .lock()
            .lookup(op, instance.as_ptr() as usize, ObjectKind::Instance)
            .is_some()
    }

    fn set_player_state(&self, op: &'static str, player: RawPtr, new_state: c_int, tags: &[c_int]) {
        let addr = player.as_ptr() as usize;
        let batch = {
            let mut st = self.state.lock();
            let Some(p) = st.player(op, addr) else {
                return;
            };
            p.state = new_state;
            let media = p.media;
            let mut batch: Vec<Pending> =
                tags.iter().map(|t| Pending::new(addr, *t, Payload::None)).collect();
            if let Some(m) = media {
                if let Some(body) = st.media(op, m) {
                    body.state = new_state;
                    batch.push(Pending::new(m, ev::MEDIA_STATE_CHANGED, Payload::Int(new_state)));
                }
            }
            batch
        };
        self.emit(batch);
    }
}

fn c_string(s: &CStr) -> String {
    s.to_string_lossy().into_owned()
}

impl NativeApi for SimulatedNative {
    fn version(&self) -> String {
        self.state.lock().version.clone()
    }

    fn new_instance(&self, args: &[String]) -> Option<RawPtr> {
        debug!(argc = args.len(), "sim libvlc_new");
        self.alloc_checked(FailKind::NewInstance, ObjectKind::Instance, Body::Instance { log: None })
    }

    unsafe fn retain(&self, kind: ObjectKind, obj: RawPtr) {
        self.state.lock().retain_addr("retain", obj.as_ptr() as usize, kind);
    }

    unsafe fn release(&self, kind: ObjectKind, obj: RawPtr) {
        let addr = obj.as_ptr() as usize;
        let mut st = self.state.lock();
        let actual = st.objects.get(&addr).map(|o| o.kind);
        if let Some(actual) = actual.filter(|a| *a != kind) {
            st.violate(Violation::KindMismatch { op: "release", addr, expected: kind, actual });
            return;
        }
        st.release_addr(addr, kind);
    }

    // ── Media ────────────────────────────────────────────────────────

    unsafe fn media_new_location(&self, instance: RawPtr, mrl: &CStr) -> Option<RawPtr> {
        if !self.instance_ok("media_new_location", instance) {
            return None;
        }
        let mut st = self.state.lock();
        if st.take_failure(FailKind::NewMedia) {
            return None;
        }
        Some(ptr_of(st.new_media(c_string(mrl))))
    }

    unsafe fn media_new_path(&self, instance: RawPtr, path: &CStr) -> Option<RawPtr> {
        if !self.instance_ok("media_new_path", instance) {
            return None;
        }
        let mut st = self.state.lock();
        if st.take_failure(FailKind::NewMedia) {
            return None;
        }
        Some(ptr_of(st.new_media(format!("file://{}", c_string(path)))))
    }

    unsafe fn media_mrl(&self, media: RawPtr) -> Option<String> {
        let mut st = self.state.lock();
        st.media("media_mrl", media.as_ptr() as usize).map(|m| m.mrl.clone())
    }

    unsafe fn media_meta(&self, media: RawPtr, meta: c_int) -> Option<String> {
        let mut st = self.state.lock();
        st.media("media_meta", media.as_ptr() as usize)
            .and_then(|m| m.meta.get(&meta).cloned())
    }

    unsafe fn media_state(&self, media: RawPtr) -> c_int {
        let mut st = self.state.lock();
        st.media("media_state", media.as_ptr() as usize)
            .map_or(state::ERROR, |m| m.state)
    }

    unsafe fn media_duration(&self, media: RawPtr) -> i64 {
        let mut st = self.state.lock();
        st.media("media_duration", media.as_ptr() as usize)
            .filter(|m| m.parsed == parsed_status::DONE)
            .map_or(-1, |m| m.duration)
    }

    unsafe fn media_parse(&self, media: RawPtr, _flags: c_int, _timeout_ms: c_int) -> c_int {
        let addr = media.as_ptr() as usize;
        let batch = {
            let mut st = self.state.lock();
            let failed = st.take_failure(FailKind::Parse);
            let Some(m) = st.media("media_parse", addr) else {
                return -1;
            };
            if failed {
                m.parsed = parsed_status::FAILED;
                vec![Pending::new(addr, ev::MEDIA_PARSED_CHANGED, Payload::Int(parsed_status::FAILED))]
            } else {
                m.parsed = parsed_status::DONE;
                vec![
                    Pending::new(addr, ev::MEDIA_DURATION_CHANGED, Payload::Time(m.duration)),
                    Pending::new(addr, ev::MEDIA_PARSED_CHANGED, Payload::Int(parsed_status::DONE)),
                ]
            }
        };
        self.emit(batch);
        0
    }

    unsafe fn media_parsed_status(&self, media: RawPtr) -> c_int {
        let mut st = self.state.lock();
        st.media("media_parsed_status", media.as_ptr() as usize)
            .map_or(parsed_status::NONE, |m| m.parsed)
    }

    unsafe fn media_subitems(&self, media: RawPtr) -> Option<RawPtr> {
        let addr = media.as_ptr() as usize;
        let mut st = self.state.lock();
        let existing = st.media("media_subitems", addr)?.subitems;
        let list = match existing {
            Some(list) => list,
            None => {
                let list = st.alloc(ObjectKind::MediaList, Body::List { items: Vec::new(), locked: false });
                if let Some(m) = st.media("media_subitems", addr) {
                    m.subitems = Some(list);
                }
                list
            }
        };
        st.retain_addr("media_subitems", list, ObjectKind::MediaList);
        Some(ptr_of(list))
    }

    unsafe fn media_add_option(&self, media: RawPtr, option: &CStr) {
        let mut st = self.state.lock();
        if let Some(m) = st.media("media_add_option", media.as_ptr() as usize) {
            m.options.push(c_string(option));
        }
    }

    // ── Media player ─────────────────────────────────────────────────

    unsafe fn player_new(&self, instance: RawPtr) -> Option<RawPtr> {
        if !self.instance_ok("player_new", instance) {
            return None;
        }
        self.alloc_checked(FailKind::NewPlayer, ObjectKind::Player, Body::Player(PlayerBody::default()))
    }

    unsafe fn player_set_media(&self, player: RawPtr, media: Option<RawPtr>) {
        let addr = player.as_ptr() as usize;
        let new = media.map(|m| m.as_ptr() as usize);
        {
            let mut st = self.state.lock();
            if let Some(m) = new {
                if st.media("player_set_media", m).is_none() {
                    return;
                }
            }
            let Some(p) = st.player("player_set_media", addr) else {
                return;
            };
            let old = std::mem::replace(&mut p.media, new);
            p.state = state::NOTHING_SPECIAL;
            p.time = 0;
            p.position = 0.0;
            if let Some(m) = new {
                st.retain_addr("player_set_media", m, ObjectKind::Media);
            }
            if let Some(old) = old {
                st.release_addr(old, ObjectKind::Media);
            }
        }
        self.emit(vec![Pending::new(addr, ev::MEDIA_PLAYER_MEDIA_CHANGED, Payload::Object(media))]);
    }

    unsafe fn player_media(&self, player: RawPtr) -> Option<RawPtr> {
        let mut st = self.state.lock();
        let media = st.player("player_media", player.as_ptr() as usize)?.media?;
        st.retain_addr("player_media", media, ObjectKind::Media);
        Some(ptr_of(media))
    }

    unsafe fn player_play(&self, player: RawPtr) -> c_int {
        {
            let mut st = self.state.lock();
            let failed = st.take_failure(FailKind::Play);
            match st.player("player_play", player.as_ptr() as usize) {
                Some(p) if p.media.is_some() && !failed => {}
                _ => return -1,
            }
        }
        self.set_player_state(
            "player_play",
            player,
            state::PLAYING,
            &[ev::MEDIA_PLAYER_OPENING, ev::MEDIA_PLAYER_PLAYING],
        );
        0
    }

    unsafe fn player_set_pause(&self, player: RawPtr, pause: bool) {
        let current = self
            .state
            .lock()
            .player("player_set_pause", player.as_ptr() as usize)
            .map(|p| p.state);
        match (current, pause) {
            (Some(state::PLAYING), true) => self.set_player_state(
                "player_set_pause",
                player,
                state::PAUSED,
                &[ev::MEDIA_PLAYER_PAUSED],
            ),
            (Some(state::PAUSED), false) => self.set_player_state(
                "player_set_pause",
                player,
                state::PLAYING,
                &[ev::MEDIA_PLAYER_PLAYING],
            ),
            _ => {}
        }
    }

    unsafe fn player_stop(&self, player: RawPtr) {
        let cleanup = {
            let mut st = self.state.lock();
            st.player("player_stop", player.as_ptr() as usize)
                .and_then(|p| p.output.take())
                .and_then(|v| v.negotiated.map(|n| (v.cleanup, n.opaque)))
        };
        if let Some((Some(cleanup), opaque)) = cleanup {
            cleanup(opaque as *mut c_void);
        }
        self.set_player_state("player_stop", player, state::STOPPED, &[ev::MEDIA_PLAYER_STOPPED]);
    }

    unsafe fn player_is_playing(&self, player: RawPtr) -> bool {
        let mut st = self.state.lock();
        st.player("player_is_playing", player.as_ptr() as usize)
            .is_some_and(|p| p.state == state::PLAYING)
    }

    unsafe fn player_time(&self, player: RawPtr) -> i64 {
        let mut st = self.state.lock();
        st.player("player_time", player.as_ptr() as usize).map_or(-1, |p| p.time)
    }

    unsafe fn player_set_time(&self, player: RawPtr, time_ms: i64) {
        let addr = player.as_ptr() as usize;
        if let Some(p) = self.state.lock().player("player_set_time", addr) {
            p.time = time_ms;
        } else {
            return;
        }
        self.emit(vec![Pending::new(addr, ev::MEDIA_PLAYER_TIME_CHANGED, Payload::Time(time_ms))]);
    }

    unsafe fn player_position(&self, player: RawPtr) -> f32 {
        let mut st = self.state.lock();
        st.player("player_position", player.as_ptr() as usize).map_or(-1.0, |p| p.position)
    }

    unsafe fn player_set_position(&self, player: RawPtr, position: f32) {
        let addr = player.as_ptr() as usize;
        if let Some(p) = self.state.lock().player("player_set_position", addr) {
            p.position = position;
        } else {
            return;
        }
        self.emit(vec![Pending::new(
            addr,
            ev::MEDIA_PLAYER_POSITION_CHANGED,
            Payload::Float(position),
        )]);
    }

    unsafe fn player_length(&self, player: RawPtr) -> i64 {
        let mut st = self.state.lock();
        let media = st.player("player_length", player.as_ptr() as usize).and_then(|p| p.media);
        media
            .and_then(|m| st.media("player_length", m).map(|m| m.duration))
            .unwrap_or(-1)
    }

    unsafe fn player_state(&self, player: RawPtr) -> c_int {
        let mut st = self.state.lock();
        st.player("player_state", player.as_ptr() as usize).map_or(state::ERROR, |p| p.state)
    }

    unsafe fn player_rate(&self, player: RawPtr) -> f32 {
        let mut st = self.state.lock();
        st.player("player_rate", player.as_ptr() as usize).map_or(1.0, |p| p.rate)
    }

    unsafe fn player_set_rate(&self, player: RawPtr, rate: f32) -> c_int {
        let mut st = self.state.lock();
        match st.player("player_set_rate", player.as_ptr() as usize) {
            Some(p) if rate > 0.0 => {
                p.rate = rate;
                0
            }
            _ => -1,
        }
    }

    unsafe fn player_volume(&self, player: RawPtr) -> c_int {
        let mut st = self.state.lock();
        st.player("player_volume", player.as_ptr() as usize).map_or(-1, |p| p.volume)
    }

    unsafe fn player_set_volume(&self, player: RawPtr, volume: c_int) -> c_int {
        let addr = player.as_ptr() as usize;
        match self.state.lock().player("player_set_volume", addr) {
            Some(p) if (0..=200).contains(&volume) => p.volume = volume,
            _ => return -1,
        }
        self.emit(vec![Pending::new(
            addr,
            ev::MEDIA_PLAYER_AUDIO_VOLUME,
            Payload::Float(volume as f32 / 100.0),
        )]);
        0
    }

    unsafe fn player_mute(&self, player: RawPtr) -> c_int {
        let mut st = self.state.lock();
        st.player("player_mute", player.as_ptr() as usize).map_or(-1, |p| p.mute as c_int)
    }

    unsafe fn player_set_mute(&self, player: RawPtr, mute: bool) {
        let addr = player.as_ptr() as usize;
        match self.state.lock().player("player_set_mute", addr) {
            Some(p) => p.mute = mute,
            None => return,
        }
        let tag = if mute { ev::MEDIA_PLAYER_MUTED } else { ev::MEDIA_PLAYER_UNMUTED };
        self.emit(vec![Pending::new(addr, tag, Payload::None)]);
    }

    unsafe fn player_is_seekable(&self, player: RawPtr) -> bool {
        let mut st = self.state.lock();
        st.player("player_is_seekable", player.as_ptr() as usize)
            .is_some_and(|p| p.media.is_some())
    }

    unsafe fn player_can_pause(&self, player: RawPtr) -> bool {
        let mut st = self.state.lock();
        st.player("player_can_pause", player.as_ptr() as usize)
            .is_some_and(|p| p.media.is_some())
    }

    unsafe fn player_next_frame(&self, player: RawPtr) {
        let mut st = self.state.lock();
        if let Some(p) = st.player("player_next_frame", player.as_ptr() as usize) {
            p.time += 40;
        }
    }

    unsafe fn player_set_window(&self, player: RawPtr, window: WindowHandle) {
        let mut st = self.state.lock();
        if let Some(p) = st.player("player_set_window", player.as_ptr() as usize) {
            p.window = Some(window);
        }
    }

    unsafe fn player_set_renderer(&self, player: RawPtr, item: Option<RawPtr>) -> c_int {
        let addr = player.as_ptr() as usize;
        let new = item.map(|i| i.as_ptr() as usize);
        let mut st = self.state.lock();
        if let Some(i) = new {
            if st.lookup("player_set_renderer", i, ObjectKind::RendererItem).is_none() {
                return -1;
            }
        }
        let Some(p) = st.player("player_set_renderer", addr) else {
            return -1;
        };
        let old = std::mem::replace(&mut p.renderer, new);
        if let Some(i) = new {
            st.retain_addr("player_set_renderer", i, ObjectKind::RendererItem);
        }
        if let Some(old) = old {
            st.release_addr(old, ObjectKind::RendererItem);
        }
        0
    }

    unsafe fn video_set_callbacks(
        &self,
        player: RawPtr,
        callbacks: VideoCallbacks,
        format: FormatCallbacks,
    ) {
        let mut st = self.state.lock();
        if let Some(p) = st.player("video_set_callbacks", player.as_ptr() as usize) {
            if !output_running(p.state) {
                p.output = None;
            }
            p.video = Some(VideoSlot {
                lock: callbacks.lock,
                unlock: callbacks.unlock,
                display: callbacks.display,
                setup: format.setup,
                cleanup: format.cleanup,
                opaque: callbacks.opaque as usize,
                negotiated: None,
            });
        }
    }

    unsafe fn video_clear_callbacks(&self, player: RawPtr) {
        let mut st = self.state.lock();
        if let Some(p) = st.player("video_clear_callbacks", player.as_ptr() as usize) {
            p.video = None;
            if !output_running(p.state) {
                p.output = None;
            }
        }
    }

    // ── Media list ───────────────────────────────────────────────────

    unsafe fn list_new(&self, instance: RawPtr) -> Option<RawPtr> {
        if !self.instance_ok("list_new", instance) {
            return None;
        }
        self.alloc_checked(
            FailKind::NewList,
            ObjectKind::MediaList,
            Body::List { items: Vec::new(), locked: false },
        )
    }

    unsafe fn list_add(&self, list: RawPtr, media: RawPtr) -> c_int {
        let count = self.list_count(list);
        if count < 0 {
            return -1;
        }
        self.list_insert(list, media, count)
    }

    unsafe fn list_insert(&self, list: RawPtr, media: RawPtr, index: c_int) -> c_int {
        let addr = list.as_ptr() as usize;
        let item = media.as_ptr() as usize;
        let payload = Payload::ListItem { item: media, index };
        self.emit(vec![Pending::new(addr, ev::MEDIA_LIST_WILL_ADD_ITEM, payload.clone())]);
        {
            let mut st = self.state.lock();
            if st.media("list_insert", item).is_none() {
                return -1;
            }
            let Some(items) = st.locked_items("list_insert", addr) else {
                return -1;
            };
            if index < 0 || index as usize > items.len() {
                return -1;
            }
            items.insert(index as usize, item);
            st.retain_addr("list_insert", item, ObjectKind::Media);
        }
        self.emit(vec![Pending::new(addr, ev::MEDIA_LIST_ITEM_ADDED, payload)]);
        0
    }

    unsafe fn list_remove(&self, list: RawPtr, index: c_int) -> c_int {
        let addr = list.as_ptr() as usize;
        let item = {
            let mut st = self.state.lock();
            let Some(items) = st.locked_items("list_remove", addr) else {
                return -1;
            };
            match usize::try_from(index).ok().and_then(|i| items.get(i)) {
                Some(item) => *item,
                None => return -1,
            }
        };
        let payload = Payload::ListItem { item: ptr_of(item), index };
        self.emit(vec![Pending::new(addr, ev::MEDIA_LIST_WILL_DELETE_ITEM, payload.clone())]);
        {
            let mut st = self.state.lock();
            if let Some(items) = st.locked_items("list_remove", addr) {
                items.retain(|i| *i != item);
            }
        }
        self.emit(vec![Pending::new(addr, ev::MEDIA_LIST_ITEM_DELETED, payload)]);
        self.state.lock().release_addr(item, ObjectKind::Media);
        0
    }

    unsafe fn list_count(&self, list: RawPtr) -> c_int {
        let mut st = self.state.lock();
        st.locked_items("list_count", list.as_ptr() as usize)
            .map_or(-1, |items| items.len() as c_int)
    }

    unsafe fn list_item_at(&self, list: RawPtr, index: c_int) -> Option<RawPtr> {
        let mut st = self.state.lock();
        let items = st.locked_items("list_item_at", list.as_ptr() as usize)?;
        let item = *items.get(usize::try_from(index).ok()?)?;
        st.retain_addr("list_item_at", item, ObjectKind::Media);
        Some(ptr_of(item))
    }

    unsafe fn list_lock(&self, list: RawPtr) {
        let addr = list.as_ptr() as usize;
        loop {
            {
                let mut st = self.state.lock();
                match st.lookup("list_lock", addr, ObjectKind::MediaList) {
                    Some(SimObject { body: Body::List { locked, .. }, .. }) => {
                        if !*locked {
                            *locked = true;
                            return;
                        }
                    }
                    _ => return,
                }
            }
            std::thread::yield_now();
        }
    }

    unsafe fn list_unlock(&self, list: RawPtr) {
        let mut st = self.state.lock();
        if let Some(SimObject { body: Body::List { locked, .. }, .. }) =
            st.lookup("list_unlock", list.as_ptr() as usize, ObjectKind::MediaList)
        {
            *locked = false;
        }
    }

    // ── Discovery ────────────────────────────────────────────────────

    unsafe fn discoverer_new(&self, instance: RawPtr, name: &CStr) -> Option<RawPtr> {
        if !self.instance_ok("discoverer_new", instance) || name.to_bytes().is_empty() {
            return None;
        }
        let mut st = self.state.lock();
        if st.take_failure(FailKind::NewDiscoverer) {
            return None;
        }
        let list = st.alloc(ObjectKind::MediaList, Body::List { items: Vec::new(), locked: false });
        Some(ptr_of(st.alloc(ObjectKind::Discoverer, Body::Discoverer { running: false, list })))
    }

    unsafe fn discoverer_start(&self, discoverer: RawPtr) -> c_int {
        let mut st = self.state.lock();
        match st.lookup("discoverer_start", discoverer.as_ptr() as usize, ObjectKind::Discoverer) {
            Some(SimObject { body: Body::Discoverer { running, .. }, .. }) => {
                *running = true;
                0
            }
            _ => -1,
        }
    }

    unsafe fn discoverer_stop(&self, discoverer: RawPtr) {
        let mut st = self.state.lock();
        if let Some(SimObject { body: Body::Discoverer { running, .. }, .. }) =
            st.lookup("discoverer_stop", discoverer.as_ptr() as usize, ObjectKind::Discoverer)
        {
            *running = false;
        }
    }

    unsafe fn discoverer_is_running(&self, discoverer: RawPtr) -> bool {
        let mut st = self.state.lock();
        matches!(
            st.lookup("discoverer_is_running", discoverer.as_ptr() as usize, ObjectKind::Discoverer),
            Some(SimObject { body: Body::Discoverer { running: true, .. }, .. })
        )
    }

    unsafe fn discoverer_media_list(&self, discoverer: RawPtr) -> Option<RawPtr> {
        let mut st = self.state.lock();
        let list = match st
            .lookup("discoverer_media_list", discoverer.as_ptr() as usize, ObjectKind::Discoverer)?
            .body
        {
            Body::Discoverer { list, .. } => list,
            _ => return None,
        };
        st.retain_addr("discoverer_media_list", list, ObjectKind::MediaList);
        Some(ptr_of(list))
    }

    unsafe fn renderer_discoverer_new(&self, instance: RawPtr, name: &CStr) -> Option<RawPtr> {
        if !self.instance_ok("renderer_discoverer_new", instance) || name.to_bytes().is_empty() {
            return None;
        }
        self.alloc_checked(
            FailKind::NewRendererDiscoverer,
            ObjectKind::RendererDiscoverer,
            Body::RendererDiscoverer { running: false, items: Vec::new() },
        )
    }

    unsafe fn renderer_discoverer_start(&self, discoverer: RawPtr) -> c_int {
        let mut st = self.state.lock();
        match st.lookup(
            "renderer_discoverer_start",
            discoverer.as_ptr() as usize,
            ObjectKind::RendererDiscoverer,
        ) {
            Some(SimObject { body: Body::RendererDiscoverer { running, .. }, .. }) => {
                *running = true;
                0
            }
            _ => -1,
        }
    }

    unsafe fn renderer_discoverer_stop(&self, discoverer: RawPtr) {
        let mut st = self.state.lock();
        if let Some(SimObject { body: Body::RendererDiscoverer { running, .. }, .. }) = st.lookup(
            "renderer_discoverer_stop",
            discoverer.as_ptr() as usize,
            ObjectKind::RendererDiscoverer,
        ) {
            *running = false;
        }
    }

    unsafe fn renderer_item_name(&self, item: RawPtr) -> Option<String> {
        let mut st = self.state.lock();
        match &st.lookup("renderer_item_name", item.as_ptr() as usize, ObjectKind::RendererItem)?.body {
            Body::RendererItem { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    unsafe fn renderer_item_type(&self, item: RawPtr) -> Option<String> {
        let mut st = self.state.lock();
        match &st.lookup("renderer_item_type", item.as_ptr() as usize, ObjectKind::RendererItem)?.body {
            Body::RendererItem { kind, .. } => Some(kind.clone()),
            _ => None,
        }
    }

    unsafe fn renderer_item_icon_uri(&self, item: RawPtr) -> Option<String> {
        let mut st = self.state.lock();
        match &st
            .lookup("renderer_item_icon_uri", item.as_ptr() as usize, ObjectKind::RendererItem)?
            .body
        {
            Body::RendererItem { icon, .. } => icon.clone(),
            _ => None,
        }
    }

    unsafe fn renderer_item_flags(&self, item: RawPtr) -> c_int {
        let mut st = self.state.lock();
        match st.lookup("renderer_item_flags", item.as_ptr() as usize, ObjectKind::RendererItem) {
            Some(SimObject { body: Body::RendererItem { flags, .. }, .. }) => *flags,
            _ => 0,
        }
    }

    // ── Events and log ───────────────────────────────────────────────

    unsafe fn event_manager(&self, kind: ObjectKind, obj: RawPtr) -> Option<RawPtr> {
        if !matches!(
            kind,
            ObjectKind::Media | ObjectKind::Player | ObjectKind::MediaList | ObjectKind::RendererDiscoverer
        ) {
            return None;
        }
        let addr = obj.as_ptr() as usize;
        self.state.lock().lookup("event_manager", addr, kind)?;
        Some(ptr_of(addr + MANAGER_OFFSET))
    }

    unsafe fn event_attach(
        &self,
        manager: RawPtr,
        event_type: c_int,
        callback: libvlc_callback_t,
        data: *mut c_void,
    ) -> c_int {
        let owner = (manager.as_ptr() as usize).wrapping_sub(MANAGER_OFFSET);
        let mut st = self.state.lock();
        if st.take_failure(FailKind::EventAttach) {
            return -1;
        }
        if let Some(budget) = st.attach_budget.as_mut() {
            if *budget == 0 {
                return -1;
            }
            *budget -= 1;
        }
        let Some(kind) = st.objects.get(&owner).map(|o| o.kind) else {
            st.violate(Violation::UnknownObject { op: "event_attach", addr: owner });
            return -1;
        };
        match st.lookup("event_attach", owner, kind) {
            Some(obj) => {
                obj.listeners.push(Registration { event_type, callback, data: data as usize });
                0
            }
            None => -1,
        }
    }

    unsafe fn event_detach(
        &self,
        manager: RawPtr,
        event_type: c_int,
        callback: libvlc_callback_t,
        data: *mut c_void,
    ) {
        let owner = (manager.as_ptr() as usize).wrapping_sub(MANAGER_OFFSET);
        let _dispatch = self.dispatch.lock();
        let mut st = self.state.lock();
        let Some(kind) = st.objects.get(&owner).map(|o| o.kind) else {
            st.violate(Violation::UnknownObject { op: "event_detach", addr: owner });
            return;
        };
        if let Some(obj) = st.lookup("event_detach", owner, kind) {
            let found = obj.listeners.iter().position(|r| {
                r.event_type == event_type
                    && r.callback as usize == callback as usize
                    && r.data == data as usize
            });
            if let Some(i) = found {
                obj.listeners.remove(i);
            }
        }
    }

    unsafe fn log_set(&self, instance: RawPtr, callback: log_callback_t, data: *mut c_void) {
        let mut st = self.state.lock();
        if let Some(SimObject { body: Body::Instance { log }, .. }) =
            st.lookup("log_set", instance.as_ptr() as usize, ObjectKind::Instance)
        {
            *log = Some((callback, data as usize));
        }
    }

    unsafe fn log_unset(&self, instance: RawPtr) {
        let _dispatch = self.dispatch.lock();
        let mut st = self.state.lock();
        if let Some(SimObject { body: Body::Instance { log }, .. }) =
            st.lookup("log_unset", instance.as_ptr() as usize, ObjectKind::Instance)
        {
            *log = None;
        }
    }
}
