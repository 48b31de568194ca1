//! Zero-copy video frame delivery.
//!
//! A [`VideoSurface`] owns the picture buffer the native decoder writes into.
//! The application picks the buffer layout ([`BufferFormatCallback`]) when
//! the native side reports the source dimensions, and receives every
//! decoded picture as a borrowed [`VideoFrame`] ([`RenderCallback`]) on the
//! native rendering thread.

use std::cell::Cell;
use std::ffi::{c_char, c_uint, c_void};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::RawMutex as _;
use parking_lot::{Mutex, RawMutex};
use tracing::{debug, error, info};
use vlcbind_native::ffi::PICTURE_PLANE_MAX;
use vlcbind_native::{FormatCallbacks, VideoCallbacks};

use crate::error::{BindError, Result};
use crate::handle::NativeHandle;
use crate::lifecycle::{CallbackScope, ScopeToken};

/// Row pitches produced by [`BufferFormat::new`] are multiples of this.
pub const PITCH_ALIGN: u32 = 32;
/// Plane start addresses inside a surface buffer are multiples of this.
const PLANE_ALIGN: usize = 32;

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

// ── Chroma ───────────────────────────────────────────────────────────

/// Pixel layout, identified on the wire by a FourCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chroma {
    /// 32-bit BGRx.
    Rv32,
    /// 24-bit BGR.
    Rv24,
    Rgba,
    /// Planar Y, U, V at 4:2:0.
    I420,
    /// Planar Y, V, U at 4:2:0.
    Yv12,
    /// Y plane followed by an interleaved UV plane at 4:2:0.
    Nv12,
    Other([u8; 4]),
}

impl Chroma {
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            Chroma::Rv32 => *b"RV32",
            Chroma::Rv24 => *b"RV24",
            Chroma::Rgba => *b"RGBA",
            Chroma::I420 => *b"I420",
            Chroma::Yv12 => *b"YV12",
            Chroma::Nv12 => *b"NV12",
            Chroma::Other(code) => code,
        }
    }

    pub fn from_fourcc(code: [u8; 4]) -> Self {
        match &code {
            b"RV32" => Chroma::Rv32,
            b"RV24" => Chroma::Rv24,
            b"RGBA" => Chroma::Rgba,
            b"I420" => Chroma::I420,
            b"YV12" => Chroma::Yv12,
            b"NV12" => Chroma::Nv12,
            _ => Chroma::Other(code),
        }
    }

    /// `None` for chromas this crate cannot lay out.
    pub fn plane_count(self) -> Option<usize> {
        match self {
            Chroma::Rv32 | Chroma::Rv24 | Chroma::Rgba => Some(1),
            Chroma::Nv12 => Some(2),
            Chroma::I420 | Chroma::Yv12 => Some(3),
            Chroma::Other(_) => None,
        }
    }

    /// Bytes per sample in `plane`.
    pub fn bytes_per_pixel(self, plane: usize) -> u32 {
        match self {
            Chroma::Rv32 | Chroma::Rgba => 4,
            Chroma::Rv24 => 3,
            Chroma::Nv12 if plane == 1 => 2,
            _ => 1,
        }
    }

    /// Horizontal and vertical subsampling divisors of `plane`.
    pub fn subsampling(self, plane: usize) -> (u32, u32) {
        match self {
            Chroma::I420 | Chroma::Yv12 | Chroma::Nv12 if plane > 0 => (2, 2),
            _ => (1, 1),
        }
    }

    /// Smallest valid row pitch of `plane` for a picture `width` pixels wide.
    pub fn min_pitch(self, plane: usize, width: u32) -> u64 {
        let (div_x, _) = self.subsampling(plane);
        u64::from(width.div_ceil(div_x)) * u64::from(self.bytes_per_pixel(plane))
    }

    /// Smallest valid line count of `plane` for a picture `height` pixels high.
    pub fn min_lines(self, plane: usize, height: u32) -> u32 {
        let (_, div_y) = self.subsampling(plane);
        height.div_ceil(div_y)
    }
}

impl FromStr for Chroma {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self> {
        let code: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| BindError::FormatNegotiation(format!("chroma '{s}' is not a FourCC")))?;
        Ok(Chroma::from_fourcc(code))
    }
}

impl fmt::Display for Chroma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.fourcc()))
    }
}

// ── Formats ──────────────────────────────────────────────────────────

/// Layout the application asks the decoder to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFormat {
    pub chroma: Chroma,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, one entry per plane.
    pub pitches: Vec<u32>,
    /// Rows, one entry per plane.
    pub lines: Vec<u32>,
}

impl BufferFormat {
    /// Tightly packed planes with row pitches rounded up to [`PITCH_ALIGN`].
    /// Unknown chromas get no planes and are rejected by negotiation.
    pub fn new(chroma: Chroma, width: u32, height: u32) -> Self {
        let planes = chroma.plane_count().unwrap_or(0);
        let pitches = (0..planes)
            .map(|p| {
                let min = chroma.min_pitch(p, width);
                let aligned = align_up(min as usize, PITCH_ALIGN as usize);
                u32::try_from(aligned).unwrap_or(u32::MAX)
            })
            .collect();
        let lines = (0..planes).map(|p| chroma.min_lines(p, height)).collect();
        Self { chroma, width, height, pitches, lines }
    }

    pub fn rv32(width: u32, height: u32) -> Self {
        Self::new(Chroma::Rv32, width, height)
    }
}

/// One plane inside a negotiated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub pitch: u32,
    pub lines: u32,
    /// Byte offset from the start of the frame data.
    pub offset: usize,
    pub len: usize,
}

/// A validated [`BufferFormat`] with computed plane offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub chroma: Chroma,
    pub width: u32,
    pub height: u32,
    pub planes: Vec<PlaneLayout>,
    pub total_len: usize,
}

/// Validate `requested` and lay its planes out back to back, each starting
/// on a 32-byte boundary.
pub fn negotiate_format(requested: &BufferFormat) -> Result<NegotiatedFormat> {
    let fail = |msg: String| Err(BindError::FormatNegotiation(msg));
    let chroma = requested.chroma;
    if requested.width == 0 || requested.height == 0 {
        return fail(format!("empty picture {}x{}", requested.width, requested.height));
    }
    let Some(count) = chroma.plane_count() else {
        return fail(format!("unsupported chroma {chroma}"));
    };
    if count > PICTURE_PLANE_MAX {
        return fail(format!("{chroma} needs {count} planes, at most {PICTURE_PLANE_MAX} allowed"));
    }
    if requested.pitches.len() != count || requested.lines.len() != count {
        return fail(format!(
            "{chroma} needs {count} planes, got {} pitches and {} line counts",
            requested.pitches.len(),
            requested.lines.len()
        ));
    }

    let mut planes = Vec::with_capacity(count);
    let mut offset = 0usize;
    for plane in 0..count {
        let pitch = requested.pitches[plane];
        let lines = requested.lines[plane];
        let min_pitch = chroma.min_pitch(plane, requested.width);
        let min_lines = chroma.min_lines(plane, requested.height);
        if u64::from(pitch) < min_pitch {
            return fail(format!("plane {plane} pitch {pitch} below minimum {min_pitch}"));
        }
        if lines < min_lines {
            return fail(format!("plane {plane} has {lines} lines, needs {min_lines}"));
        }
        let len = (pitch as usize)
            .checked_mul(lines as usize)
            .ok_or_else(|| BindError::FormatNegotiation(format!("plane {plane} size overflows")))?;
        offset = align_up(offset, PLANE_ALIGN);
        planes.push(PlaneLayout { pitch, lines, offset, len });
        offset = offset
            .checked_add(len)
            .ok_or_else(|| BindError::FormatNegotiation("picture size overflows".into()))?;
    }

    Ok(NegotiatedFormat {
        chroma,
        width: requested.width,
        height: requested.height,
        planes,
        total_len: offset,
    })
}

// ── Application callbacks ────────────────────────────────────────────

/// Chooses the buffer layout when the native side reports the source size.
pub trait BufferFormatCallback: Send + Sync {
    fn buffer_format(&self, source_width: u32, source_height: u32) -> BufferFormat;

    /// The buffer for `format` has been allocated.
    fn allocated(&self, _format: &NegotiatedFormat) {}

    /// The native side released the buffer.
    fn cleanup(&self) {}
}

impl<F> BufferFormatCallback for F
where
    F: Fn(u32, u32) -> BufferFormat + Send + Sync,
{
    fn buffer_format(&self, source_width: u32, source_height: u32) -> BufferFormat {
        self(source_width, source_height)
    }
}

/// Receives each decoded picture on the native rendering thread.
pub trait RenderCallback: Send + Sync {
    fn display(&self, frame: &VideoFrame<'_>);
}

impl<F> RenderCallback for F
where
    F: Fn(&VideoFrame<'_>) + Send + Sync,
{
    fn display(&self, frame: &VideoFrame<'_>) {
        self(frame)
    }
}

// ── Frames ───────────────────────────────────────────────────────────

/// A decoded picture, borrowed for the duration of one display callback.
pub struct VideoFrame<'a> {
    format: &'a Arc<NegotiatedFormat>,
    data: &'a [u8],
    number: u64,
    token: ScopeToken,
}

impl<'a> VideoFrame<'a> {
    pub fn format(&self) -> &NegotiatedFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.format.width
    }

    pub fn height(&self) -> u32 {
        self.format.height
    }

    /// 1-based count of pictures displayed by this surface.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// All planes, contiguous.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn plane(&self, index: usize) -> Option<&'a [u8]> {
        let layout = self.format.planes.get(index)?;
        self.data.get(layout.offset..layout.offset + layout.len)
    }

    pub fn to_owned_frame(&self) -> OwnedFrame {
        OwnedFrame {
            format: NegotiatedFormat::clone(self.format),
            data: self.data.to_vec(),
            number: self.number,
        }
    }

    /// A handle that may be stored past this callback; reading through it
    /// afterwards fails with `ItemExpired`.
    pub fn lease(&self) -> FrameLease {
        FrameLease {
            format: self.format.clone(),
            data: self.data.as_ptr(),
            len: self.data.len(),
            number: self.number,
            token: self.token.clone(),
        }
    }
}

/// A copied picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub format: NegotiatedFormat,
    pub data: Vec<u8>,
    pub number: u64,
}

impl OwnedFrame {
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let layout = self.format.planes.get(index)?;
        self.data.get(layout.offset..layout.offset + layout.len)
    }
}

/// Deferred access to the planes of one displayed picture.
pub struct FrameLease {
    format: Arc<NegotiatedFormat>,
    data: *const u8,
    len: usize,
    number: u64,
    token: ScopeToken,
}

// Safety: `data` is only dereferenced inside `ScopeToken::with_open`, which
// holds the scope's read guard; the display callback cannot return (and the
// buffer cannot be rewritten or freed) until that guard is dropped.
unsafe impl Send for FrameLease {}
unsafe impl Sync for FrameLease {}

impl FrameLease {
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn format(&self) -> &NegotiatedFormat {
        &self.format
    }

    pub fn is_valid(&self) -> bool {
        self.token.is_open()
    }

    /// Run `f` over the plane slices while the picture is still on screen.
    pub fn with_planes<T>(&self, f: impl FnOnce(&[&[u8]]) -> T) -> Result<T> {
        self.token.with_open("video frame", || {
            let data = unsafe { std::slice::from_raw_parts(self.data, self.len) };
            let planes: Vec<&[u8]> = self
                .format
                .planes
                .iter()
                .map(|p| &data[p.offset..p.offset + p.len])
                .collect();
            f(&planes)
        })
    }
}

impl fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLease")
            .field("number", &self.number)
            .field("valid", &self.is_valid())
            .finish()
    }
}

// ── Surface ──────────────────────────────────────────────────────────

thread_local! {
    /// Surface whose render callback is running on this thread (0 = none).
    static DISPLAYING: Cell<usize> = const { Cell::new(0) };
}

struct Allocation {
    format: Arc<NegotiatedFormat>,
    /// Start of the first plane inside `_buffer`.
    base: usize,
    _buffer: Box<[u8]>,
}

struct SurfaceShared {
    format_cb: Box<dyn BufferFormatCallback>,
    render_cb: Box<dyn RenderCallback>,
    allocation: Mutex<Option<Allocation>>,
    /// Held from the native lock callback to unlock, and for each display.
    picture: RawMutex,
    error: Mutex<Option<String>>,
    frames: AtomicU64,
    /// Set when the render callback asked for the buffer to go; `display`
    /// releases it after dropping `picture`.
    release_pending: AtomicBool,
}

impl SurfaceShared {
    /// Run the application's format choice and write the result back into
    /// the native out-parameters. Returns the number of picture buffers
    /// (0 rejects the format).
    unsafe fn setup(
        &self,
        chroma: *mut c_char,
        width: *mut c_uint,
        height: *mut c_uint,
        pitches: *mut c_uint,
        lines: *mut c_uint,
    ) -> c_uint {
        let mut native = [0u8; 4];
        ptr::copy_nonoverlapping(chroma as *const u8, native.as_mut_ptr(), 4);
        debug!(
            native_chroma = %Chroma::from_fourcc(native),
            width = *width,
            height = *height,
            "video format requested"
        );

        let requested = self.format_cb.buffer_format(*width, *height);
        let negotiated = match negotiate_format(&requested) {
            Ok(negotiated) => negotiated,
            Err(err) => {
                error!(error = %err, "video format negotiation failed");
                *self.error.lock() = Some(err.to_string());
                return 0;
            }
        };

        ptr::copy_nonoverlapping(negotiated.chroma.fourcc().as_ptr(), chroma as *mut u8, 4);
        *width = negotiated.width;
        *height = negotiated.height;
        for (i, plane) in negotiated.planes.iter().enumerate() {
            *pitches.add(i) = plane.pitch;
            *lines.add(i) = plane.lines;
        }

        let mut buffer = vec![0u8; negotiated.total_len + PLANE_ALIGN].into_boxed_slice();
        let start = buffer.as_mut_ptr() as usize;
        let base = align_up(start, PLANE_ALIGN);
        let format = Arc::new(negotiated);

        self.picture.lock();
        *self.allocation.lock() = Some(Allocation { format: format.clone(), base, _buffer: buffer });
        self.picture.unlock();
        self.error.lock().take();

        info!(
            chroma = %format.chroma,
            width = format.width,
            height = format.height,
            bytes = format.total_len,
            "video buffer allocated"
        );
        self.format_cb.allocated(&format);
        1
    }

    fn current(&self) -> Option<(Arc<NegotiatedFormat>, usize)> {
        self.allocation.lock().as_ref().map(|a| (a.format.clone(), a.base))
    }

    unsafe fn lock_planes(&self, planes: *mut *mut c_void) {
        self.picture.lock();
        if let Some((format, base)) = self.current() {
            for (i, plane) in format.planes.iter().enumerate() {
                *planes.add(i) = (base + plane.offset) as *mut c_void;
            }
        }
    }

    unsafe fn display(&self) {
        self.picture.lock();
        if let Some((format, base)) = self.current() {
            let number = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
            let data = std::slice::from_raw_parts(base as *const u8, format.total_len);
            let scope = CallbackScope::open();
            let frame = VideoFrame { format: &format, data, number, token: scope.token() };
            let previous = DISPLAYING.with(|d| d.replace(self.addr()));
            let outcome = catch_unwind(AssertUnwindSafe(|| self.render_cb.display(&frame)));
            DISPLAYING.with(|d| d.set(previous));
            if outcome.is_err() {
                error!(frame = number, "render callback panicked");
            }
            drop(frame);
            scope.close();
        }
        self.picture.unlock();
        if self.release_pending.swap(false, Ordering::AcqRel) {
            self.release_buffer();
        }
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    fn release_buffer(&self) {
        if DISPLAYING.with(|d| d.get()) == self.addr() {
            // `picture` is held further up this thread's stack.
            self.release_pending.store(true, Ordering::Release);
            return;
        }
        self.picture.lock();
        let released = self.allocation.lock().take();
        // Safety: locked just above on this thread.
        unsafe { self.picture.unlock() };
        if released.is_some() {
            debug!("video buffer released");
            self.format_cb.cleanup();
        }
    }
}

unsafe extern "C" fn surface_format(
    opaque: *mut *mut c_void,
    chroma: *mut c_char,
    width: *mut c_uint,
    height: *mut c_uint,
    pitches: *mut c_uint,
    lines: *mut c_uint,
) -> c_uint {
    let shared = &*(*opaque as *const SurfaceShared);
    catch_unwind(AssertUnwindSafe(|| shared.setup(chroma, width, height, pitches, lines))).unwrap_or_else(|_| {
        *shared.error.lock() = Some("buffer format callback panicked".into());
        0
    })
}

unsafe extern "C" fn surface_cleanup(opaque: *mut c_void) {
    let shared = &*(opaque as *const SurfaceShared);
    if catch_unwind(AssertUnwindSafe(|| shared.release_buffer())).is_err() {
        error!("video cleanup callback panicked");
    }
}

unsafe extern "C" fn surface_lock(opaque: *mut c_void, planes: *mut *mut c_void) -> *mut c_void {
    let shared = &*(opaque as *const SurfaceShared);
    shared.lock_planes(planes);
    ptr::null_mut()
}

unsafe extern "C" fn surface_unlock(opaque: *mut c_void, _picture: *mut c_void, _planes: *const *mut c_void) {
    let shared = &*(opaque as *const SurfaceShared);
    shared.picture.unlock();
}

unsafe extern "C" fn surface_display(opaque: *mut c_void, _picture: *mut c_void) {
    let shared = &*(opaque as *const SurfaceShared);
    shared.display();
}

/// Application-owned picture buffer plus its callbacks. Cloning shares the
/// same surface.
#[derive(Clone)]
pub struct VideoSurface {
    shared: Arc<SurfaceShared>,
}

impl VideoSurface {
    pub fn new(format: impl BufferFormatCallback + 'static, render: impl RenderCallback + 'static) -> Self {
        Self {
            shared: Arc::new(SurfaceShared {
                format_cb: Box::new(format),
                render_cb: Box::new(render),
                allocation: Mutex::new(None),
                picture: RawMutex::INIT,
                error: Mutex::new(None),
                frames: AtomicU64::new(0),
                release_pending: AtomicBool::new(false),
            }),
        }
    }

    /// Surface that always asks for `chroma` at the source size.
    pub fn with_chroma(chroma: Chroma, render: impl RenderCallback + 'static) -> Self {
        Self::new(move |w, h| BufferFormat::new(chroma, w, h), render)
    }

    /// Register the surface's trampolines on a player. The caller keeps the
    /// surface alive until the native side can no longer call them: after
    /// [`uninstall`](Self::uninstall) when no video output is running,
    /// otherwise until the player stops or is released.
    pub(crate) fn install(&self, player: &NativeHandle) -> Result<()> {
        let opaque = Arc::as_ptr(&self.shared) as *mut c_void;
        let api = player.api().clone();
        player.with_ptr(|p| unsafe {
            api.video_set_callbacks(
                p,
                VideoCallbacks {
                    lock: surface_lock,
                    unlock: Some(surface_unlock),
                    display: Some(surface_display),
                    opaque,
                },
                FormatCallbacks { setup: surface_format, cleanup: Some(surface_cleanup) },
            )
        })?;
        debug!(player = %player.source_id(), "video surface installed");
        Ok(())
    }

    /// Unregister the trampolines. A video output that is already running
    /// keeps the ones it started with, so the buffer is left in place.
    pub(crate) fn uninstall(&self, player: &NativeHandle) -> Result<()> {
        let api = player.api().clone();
        player.with_ptr(|p| unsafe { api.video_clear_callbacks(p) })?;
        debug!(player = %player.source_id(), "video surface removed");
        Ok(())
    }

    /// Whether this surface's render callback is running on this thread.
    pub(crate) fn is_displaying(&self) -> bool {
        DISPLAYING.with(|d| d.get()) == self.shared.addr()
    }

    /// Free the picture buffer. From inside this surface's own render
    /// callback the release happens once the callback returns.
    pub(crate) fn release_buffer(&self) {
        self.shared.release_buffer();
    }

    /// The last format the application chose but negotiation rejected.
    pub fn negotiation_error(&self) -> Option<BindError> {
        self.shared.error.lock().clone().map(BindError::FormatNegotiation)
    }

    pub fn current_format(&self) -> Option<Arc<NegotiatedFormat>> {
        self.shared.current().map(|(format, _)| format)
    }

    pub fn frames_displayed(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for VideoSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoSurface")
            .field("format", &self.current_format())
            .field("frames", &self.frames_displayed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rv32_layout() {
        let format = BufferFormat::rv32(1279, 720);
        assert_eq!(format.pitches, vec![5120]);
        assert_eq!(format.lines, vec![720]);
        let negotiated = negotiate_format(&format).expect("valid");
        assert_eq!(negotiated.planes.len(), 1);
        assert_eq!(negotiated.total_len, 5120 * 720);
    }

    #[test]
    fn i420_planes_are_subsampled_and_aligned() {
        let negotiated = negotiate_format(&BufferFormat::new(Chroma::I420, 641, 481)).expect("valid");
        let planes = &negotiated.planes;
        assert_eq!(planes.len(), 3);
        assert_eq!(planes[0].pitch, 672);
        assert_eq!(planes[0].lines, 481);
        assert_eq!(planes[1].pitch, 352);
        assert_eq!(planes[1].lines, 241);
        for plane in planes {
            assert_eq!(plane.offset % PLANE_ALIGN, 0);
        }
        assert_eq!(planes[1].offset, align_up(672 * 481, PLANE_ALIGN));
        assert_eq!(negotiated.total_len, planes[2].offset + planes[2].len);
    }

    #[test]
    fn nv12_chroma_plane_is_interleaved() {
        let negotiated = negotiate_format(&BufferFormat::new(Chroma::Nv12, 64, 32)).expect("valid");
        assert_eq!(negotiated.planes[1].pitch, 64);
        assert_eq!(negotiated.planes[1].lines, 16);
    }

    #[test]
    fn rejects_invalid_requests() {
        let reject = |format: BufferFormat| {
            matches!(negotiate_format(&format), Err(BindError::FormatNegotiation(_)))
        };
        assert!(reject(BufferFormat::rv32(0, 10)));
        assert!(reject(BufferFormat::new(Chroma::Other(*b"XYZW"), 16, 16)));

        let mut short_pitch = BufferFormat::rv32(100, 10);
        short_pitch.pitches[0] = 399;
        assert!(reject(short_pitch));

        let mut short_lines = BufferFormat::new(Chroma::I420, 100, 100);
        short_lines.lines[2] = 49;
        assert!(reject(short_lines));

        let mut missing_plane = BufferFormat::new(Chroma::I420, 100, 100);
        missing_plane.pitches.pop();
        assert!(reject(missing_plane));
    }

    #[test]
    fn chroma_fourcc_parsing() {
        assert_eq!("RV32".parse::<Chroma>().expect("fourcc"), Chroma::Rv32);
        assert_eq!("ABCD".parse::<Chroma>().expect("fourcc"), Chroma::Other(*b"ABCD"));
        assert!("RV3".parse::<Chroma>().is_err());
        assert_eq!(Chroma::Yv12.to_string(), "YV12");
        assert_eq!(Chroma::from_fourcc(Chroma::Nv12.fourcc()), Chroma::Nv12);
    }

    #[test]
    fn lease_expires_after_callback() {
        let format = Arc::new(negotiate_format(&BufferFormat::rv32(2, 2)).expect("valid"));
        let data = vec![7u8; format.total_len];
        let scope = CallbackScope::open();
        let frame = VideoFrame { format: &format, data: &data, number: 1, token: scope.token() };
        let lease = frame.lease();
        assert_eq!(lease.with_planes(|p| p[0][0]).expect("live"), 7);
        assert_eq!(frame.plane(0).map(<[u8]>::len), Some(format.total_len));
        let owned = frame.to_owned_frame();
        scope.close();

        assert!(!lease.is_valid());
        assert!(matches!(lease.with_planes(|_| ()), Err(BindError::ItemExpired { what: "video frame" })));
        assert_eq!(owned.plane(0).map(|p| p[3]), Some(7));
    }
}
