//! Owning wrapper around one native object reference.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};
use vlcbind_native::{NativeApi, ObjectKind, RawPtr};

use crate::error::{BindError, Result};

/// Kind tag of a [`NativeHandle`].
pub type HandleKind = ObjectKind;

/// Process-unique identity of an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

static NEXT_SOURCE: AtomicU64 = AtomicU64::new(1);

impl SourceId {
    pub fn next() -> Self {
        Self(NEXT_SOURCE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src-{}", self.0)
    }
}

/// What a call to [`NativeHandle::release`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// This call performed the native release.
    Released,
    /// The handle had already been released; nothing was done.
    AlreadyReleased,
}

/// Owns exactly one native reference to one object.
///
/// The pointer is set once at creation and cleared once at release. Every
/// native call goes through [`with_ptr`](Self::with_ptr), which holds a read
/// guard for the duration of the call, so `release` (which takes the write
/// guard) can never free the object under an in-flight call.
pub struct NativeHandle {
    api: Arc<dyn NativeApi>,
    kind: HandleKind,
    ptr: RwLock<Option<RawPtr>>,
    released: AtomicBool,
    /// Native references held through this handle and its shares.
    refs: Arc<AtomicU32>,
    source: SourceId,
}

// Safety: the raw pointer is only handed to the native library, which is
// thread-safe for every object kind wrapped here; access is serialised
// against release by the RwLock.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

impl NativeHandle {
    /// Take ownership of a reference returned by a native factory call.
    /// `None` is the native failure sentinel.
    pub fn adopt(
        api: Arc<dyn NativeApi>,
        kind: HandleKind,
        ptr: Option<RawPtr>,
        call: &'static str,
    ) -> Result<Self> {
        let Some(ptr) = ptr else {
            debug!(%kind, call, "native creation returned null");
            return Err(BindError::NativeCreationFailed { kind, call });
        };
        Ok(Self::from_parts(api, kind, ptr, Arc::new(AtomicU32::new(1))))
    }

    fn from_parts(api: Arc<dyn NativeApi>, kind: HandleKind, ptr: RawPtr, refs: Arc<AtomicU32>) -> Self {
        let source = SourceId::next();
        trace!(%kind, %source, addr = ?ptr, "adopted native handle");
        Self {
            api,
            kind,
            ptr: RwLock::new(Some(ptr)),
            released: AtomicBool::new(false),
            refs,
            source,
        }
    }

    /// Run `f` with the live pointer. Fails with `UseAfterRelease` once the
    /// handle is released; a concurrent release waits for `f` to return.
    pub fn with_ptr<T>(&self, f: impl FnOnce(RawPtr) -> T) -> Result<T> {
        let guard = self.ptr.read();
        match *guard {
            Some(ptr) => Ok(f(ptr)),
            None => Err(BindError::UseAfterRelease { kind: self.kind }),
        }
    }

    /// [`with_ptr`](Self::with_ptr) that also hands over the native API.
    pub fn call<T>(&self, f: impl FnOnce(&dyn NativeApi, RawPtr) -> T) -> Result<T> {
        let guard = self.ptr.read();
        match *guard {
            Some(ptr) => Ok(f(self.api.as_ref(), ptr)),
            None => Err(BindError::UseAfterRelease { kind: self.kind }),
        }
    }

    /// A second owning handle to the same object (native retain).
    pub fn share(&self) -> Result<NativeHandle> {
        if !self.kind.supports_retain() {
            return Err(BindError::InvalidArgument(format!("{} cannot be retained", self.kind)));
        }
        let ptr = self.with_ptr(|ptr| {
            unsafe { self.api.retain(self.kind, ptr) };
            ptr
        })?;
        self.refs.fetch_add(1, Ordering::AcqRel);
        Ok(Self::from_parts(self.api.clone(), self.kind, ptr, self.refs.clone()))
    }

    /// Drop this handle's native reference. Idempotent: only the first call
    /// reaches the native library.
    pub fn release(&self) -> ReleaseOutcome {
        if self.released.swap(true, Ordering::AcqRel) {
            debug!(kind = %self.kind, source = %self.source, "release on already released handle");
            return ReleaseOutcome::AlreadyReleased;
        }
        let taken = self.ptr.write().take();
        if let Some(ptr) = taken {
            unsafe { self.api.release(self.kind, ptr) };
            self.refs.fetch_sub(1, Ordering::AcqRel);
            trace!(kind = %self.kind, source = %self.source, "released native handle");
        }
        ReleaseOutcome::Released
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// Diagnostic mirror of the native references held by this handle and
    /// every handle [`share`](Self::share)d from it.
    pub fn local_refs(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    pub fn api(&self) -> &Arc<dyn NativeApi> {
        &self.api
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("released", &self.is_released())
            .finish()
    }
}
