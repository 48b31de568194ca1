//! Hold/release of ephemeral native items.
//!
//! Items the native library hands to an event callback (renderer items,
//! media sub-items, list items) are only guaranteed to exist until that
//! callback returns. They surface as a [`TransientItem`], which carries an
//! eagerly copied [`ItemSnapshot`] and can be turned into an owned
//! [`HeldItem`] with [`TransientItem::hold`] while the callback is still
//! running. Afterwards every live access fails with `ItemExpired`.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vlcbind_native::{NativeApi, RawPtr};

use crate::error::{BindError, Result};
use crate::handle::{HandleKind, NativeHandle, ReleaseOutcome};

bitflags! {
    /// Renderer capabilities (`LIBVLC_RENDERER_CAN_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RendererFlags: u32 {
        const AUDIO = 0x0001;
        const VIDEO = 0x0002;
    }
}

/// Whether the bridge holds discovered items on the application's behalf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HoldPolicy {
    /// Items are valid only inside the notifying callback unless the
    /// application calls `hold()` from a listener that runs in time.
    #[default]
    Transient,
    /// Every discovered item is held before the callback returns.
    HoldDiscovered,
}

// ── Callback scope ───────────────────────────────────────────────────

/// Validity window of one native callback invocation.
///
/// Closing the scope takes the write side of the lock, so it waits for any
/// [`ScopeToken::with_open`] that is using the native memory right now.
pub struct CallbackScope {
    open: Arc<RwLock<bool>>,
}

/// Cloneable observer of a [`CallbackScope`].
#[derive(Clone)]
pub struct ScopeToken {
    open: Arc<RwLock<bool>>,
}

impl CallbackScope {
    pub fn open() -> Self {
        Self { open: Arc::new(RwLock::new(true)) }
    }

    pub fn token(&self) -> ScopeToken {
        ScopeToken { open: self.open.clone() }
    }

    pub fn close(self) {}
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        *self.open.write() = false;
    }
}

impl ScopeToken {
    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    /// Run `f` while the scope is guaranteed to stay open.
    pub fn with_open<T>(&self, what: &'static str, f: impl FnOnce() -> T) -> Result<T> {
        let open = self.open.read();
        if *open {
            Ok(f())
        } else {
            Err(BindError::ItemExpired { what })
        }
    }
}

impl fmt::Debug for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeToken").field("open", &self.is_open()).finish()
    }
}

// ── Snapshots ────────────────────────────────────────────────────────

/// Data copied out of an item while the callback was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSnapshot {
    Media {
        mrl: Option<String>,
    },
    Renderer {
        name: Option<String>,
        kind: Option<String>,
        icon_uri: Option<String>,
        flags: RendererFlags,
    },
    Other,
}

impl ItemSnapshot {
    /// Copy everything readable about `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live object of `kind`.
    pub unsafe fn capture(api: &dyn NativeApi, kind: HandleKind, ptr: RawPtr) -> Self {
        match kind {
            HandleKind::Media => ItemSnapshot::Media { mrl: api.media_mrl(ptr) },
            HandleKind::RendererItem => ItemSnapshot::Renderer {
                name: api.renderer_item_name(ptr),
                kind: api.renderer_item_type(ptr),
                icon_uri: api.renderer_item_icon_uri(ptr),
                flags: RendererFlags::from_bits_truncate(api.renderer_item_flags(ptr) as u32),
            },
            _ => ItemSnapshot::Other,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ItemSnapshot::Renderer { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    pub fn mrl(&self) -> Option<&str> {
        match self {
            ItemSnapshot::Media { mrl } => mrl.as_deref(),
            _ => None,
        }
    }
}

// ── Transient / held ─────────────────────────────────────────────────

/// Non-owning reference to an item that may vanish when its callback
/// returns.
#[derive(Clone)]
pub struct TransientItem {
    api: Arc<dyn NativeApi>,
    kind: HandleKind,
    ptr: RawPtr,
    scope: ScopeToken,
    snapshot: ItemSnapshot,
}

// Safety: the pointer is only dereferenced by the native library and only
// while the scope token proves the callback is still running.
unsafe impl Send for TransientItem {}
unsafe impl Sync for TransientItem {}

impl TransientItem {
    pub fn new(
        api: Arc<dyn NativeApi>,
        kind: HandleKind,
        ptr: RawPtr,
        scope: ScopeToken,
        snapshot: ItemSnapshot,
    ) -> Self {
        Self { api, kind, ptr, scope, snapshot }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn snapshot(&self) -> &ItemSnapshot {
        &self.snapshot
    }

    /// Whether the notifying callback is still running.
    pub fn is_valid(&self) -> bool {
        self.scope.is_open()
    }

    /// Run `f` with the live pointer, or fail with `ItemExpired`.
    pub fn with_live<T>(&self, f: impl FnOnce(&dyn NativeApi, RawPtr) -> T) -> Result<T> {
        self.scope.with_open(self.kind.as_str(), || f(self.api.as_ref(), self.ptr))
    }

    /// Take a native reference so the item outlives its callback.
    pub fn hold(&self) -> Result<HeldItem> {
        let api = self.api.clone();
        let kind = self.kind;
        let handle = self.with_live(|native, ptr| {
            unsafe { native.retain(kind, ptr) };
            NativeHandle::adopt(api, kind, Some(ptr), "hold")
        })??;
        debug!(%kind, source = %handle.source_id(), "held transient item");
        Ok(HeldItem { handle, snapshot: self.snapshot.clone() })
    }
}

impl fmt::Debug for TransientItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientItem")
            .field("kind", &self.kind)
            .field("valid", &self.is_valid())
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

/// Owned reference to a formerly transient item. Released on drop.
#[derive(Debug)]
pub struct HeldItem {
    handle: NativeHandle,
    snapshot: ItemSnapshot,
}

impl HeldItem {
    pub fn kind(&self) -> HandleKind {
        self.handle.kind()
    }

    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn snapshot(&self) -> &ItemSnapshot {
        &self.snapshot
    }

    pub fn release(&self) -> ReleaseOutcome {
        self.handle.release()
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }

    fn expect_kind(&self, kind: HandleKind) -> Result<()> {
        if self.kind() == kind {
            Ok(())
        } else {
            Err(BindError::InvalidArgument(format!("{} is not a {kind}", self.kind())))
        }
    }

    /// Renderer display name.
    pub fn name(&self) -> Result<Option<String>> {
        self.expect_kind(HandleKind::RendererItem)?;
        let api = self.handle.api().clone();
        self.handle.with_ptr(|p| unsafe { api.renderer_item_name(p) })
    }

    /// Renderer type, e.g. `"chromecast"`.
    pub fn renderer_kind(&self) -> Result<Option<String>> {
        self.expect_kind(HandleKind::RendererItem)?;
        let api = self.handle.api().clone();
        self.handle.with_ptr(|p| unsafe { api.renderer_item_type(p) })
    }

    pub fn icon_uri(&self) -> Result<Option<String>> {
        self.expect_kind(HandleKind::RendererItem)?;
        let api = self.handle.api().clone();
        self.handle.with_ptr(|p| unsafe { api.renderer_item_icon_uri(p) })
    }

    pub fn flags(&self) -> Result<RendererFlags> {
        self.expect_kind(HandleKind::RendererItem)?;
        let api = self.handle.api().clone();
        self.handle
            .with_ptr(|p| RendererFlags::from_bits_truncate(unsafe { api.renderer_item_flags(p) } as u32))
    }

    /// MRL of a held media item.
    pub fn mrl(&self) -> Result<Option<String>> {
        self.expect_kind(HandleKind::Media)?;
        let api = self.handle.api().clone();
        self.handle.with_ptr(|p| unsafe { api.media_mrl(p) })
    }
}

/// An item reference as carried by events.
#[derive(Debug, Clone)]
pub enum ItemRef {
    Transient(TransientItem),
    Held(Arc<HeldItem>),
}

impl ItemRef {
    pub fn snapshot(&self) -> &ItemSnapshot {
        match self {
            ItemRef::Transient(t) => t.snapshot(),
            ItemRef::Held(h) => h.snapshot(),
        }
    }

    pub fn kind(&self) -> HandleKind {
        match self {
            ItemRef::Transient(t) => t.kind(),
            ItemRef::Held(h) => h.kind(),
        }
    }

    /// An owned reference: the held item itself, or a fresh hold of a
    /// transient one (fails with `ItemExpired` outside its callback).
    pub fn hold(&self) -> Result<Arc<HeldItem>> {
        match self {
            ItemRef::Transient(t) => t.hold().map(Arc::new),
            ItemRef::Held(h) => Ok(h.clone()),
        }
    }

    pub fn is_held(&self) -> bool {
        matches!(self, ItemRef::Held(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlcbind_native::sim::SimulatedNative;

    fn renderer_fixture() -> (Arc<SimulatedNative>, RawPtr, RawPtr) {
        let sim = Arc::new(SimulatedNative::new());
        let inst = sim.new_instance(&[]).expect("instance");
        let rd = unsafe { sim.renderer_discoverer_new(inst, c"microdns") }.expect("rd");
        let item = sim.add_renderer_item(rd, "Kitchen", "chromecast", 3).expect("item");
        (sim, rd, item)
    }

    fn transient(sim: &Arc<SimulatedNative>, item: RawPtr, scope: &CallbackScope) -> TransientItem {
        let api: Arc<dyn NativeApi> = sim.clone();
        let snapshot = unsafe { ItemSnapshot::capture(api.as_ref(), HandleKind::RendererItem, item) };
        TransientItem::new(api, HandleKind::RendererItem, item, scope.token(), snapshot)
    }

    #[test]
    fn snapshot_copies_renderer_fields() {
        let (sim, _rd, item) = renderer_fixture();
        let scope = CallbackScope::open();
        let t = transient(&sim, item, &scope);
        assert_eq!(t.snapshot().name(), Some("Kitchen"));
        assert!(matches!(
            t.snapshot(),
            ItemSnapshot::Renderer { flags, .. } if *flags == RendererFlags::AUDIO | RendererFlags::VIDEO
        ));
    }

    #[test]
    fn hold_after_scope_closed_is_item_expired() {
        let (sim, rd, item) = renderer_fixture();
        let scope = CallbackScope::open();
        let t = transient(&sim, item, &scope);
        scope.close();
        sim.remove_renderer_item(rd, item);

        assert!(!t.is_valid());
        assert!(matches!(t.hold(), Err(BindError::ItemExpired { what: "renderer item" })));
        // The snapshot is still readable.
        assert_eq!(t.snapshot().name(), Some("Kitchen"));
        assert!(sim.violations().is_empty());
    }

    #[test]
    fn held_item_survives_discoverer_removal() {
        let (sim, rd, item) = renderer_fixture();
        let scope = CallbackScope::open();
        let held = transient(&sim, item, &scope).hold().expect("hold");
        scope.close();
        sim.remove_renderer_item(rd, item);

        assert!(!sim.is_freed(item));
        assert_eq!(held.name().expect("live").as_deref(), Some("Kitchen"));
        assert_eq!(held.flags().expect("live"), RendererFlags::all());
        assert!(held.mrl().is_err());

        assert_eq!(held.release(), ReleaseOutcome::Released);
        assert!(sim.is_freed(item));
    }

    #[test]
    fn hold_policy_reads_from_config_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: HoldPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"hold-discovered\"").expect("parse");
        assert_eq!(w.policy, HoldPolicy::HoldDiscovered);
    }
}
