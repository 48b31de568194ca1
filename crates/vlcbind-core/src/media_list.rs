use std::ffi::c_int;
use std::fmt;
use std::sync::Arc;

use tracing::warn;
use vlcbind_native::{NativeApi, RawPtr};

use crate::bridge::LazyBridge;
use crate::dispatch::Subscription;
use crate::error::{BindError, Result};
use crate::event::{Event, EventCategory};
use crate::factory::Runtime;
use crate::handle::{HandleKind, NativeHandle, ReleaseOutcome, SourceId};
use crate::media::Media;

/// An ordered collection of media. Every operation runs under the native
/// list lock.
pub struct MediaList {
    handle: Arc<NativeHandle>,
    runtime: Arc<Runtime>,
    events: LazyBridge,
}

fn index_arg(index: usize) -> Result<c_int> {
    c_int::try_from(index).map_err(|_| BindError::InvalidArgument(format!("index {index} out of range")))
}

impl MediaList {
    pub(crate) fn adopt(runtime: Arc<Runtime>, raw: Option<RawPtr>, call: &'static str) -> Result<Self> {
        let handle = Arc::new(NativeHandle::adopt(runtime.api.clone(), HandleKind::MediaList, raw, call)?);
        let events = LazyBridge::new(handle.clone(), EventCategory::MediaList);
        Ok(Self { handle, runtime, events })
    }

    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn source_id(&self) -> SourceId {
        self.handle.source_id()
    }

    fn locked<T>(&self, f: impl FnOnce(&dyn NativeApi, RawPtr) -> T) -> Result<T> {
        self.handle.call(|api, list| unsafe {
            api.list_lock(list);
            let out = f(api, list);
            api.list_unlock(list);
            out
        })
    }

    /// Append `media`; the list takes its own reference.
    pub fn add(&self, media: &Media) -> Result<()> {
        let rc = media
            .handle()
            .with_ptr(|m| self.locked(|api, list| unsafe { api.list_add(list, m) }))??;
        if rc != 0 {
            return Err(BindError::NativeCallFailed { call: "libvlc_media_list_add_media" });
        }
        Ok(())
    }

    pub fn insert(&self, index: usize, media: &Media) -> Result<()> {
        let at = index_arg(index)?;
        let rc = media.handle().with_ptr(|m| {
            self.locked(|api, list| unsafe {
                if at > api.list_count(list) {
                    return None;
                }
                Some(api.list_insert(list, m, at))
            })
        })??;
        match rc {
            None => Err(BindError::InvalidArgument(format!("insert position {index} past the end"))),
            Some(0) => Ok(()),
            Some(_) => Err(BindError::NativeCallFailed { call: "libvlc_media_list_insert_media" }),
        }
    }

    pub fn remove(&self, index: usize) -> Result<()> {
        let at = index_arg(index)?;
        let rc = self.locked(|api, list| unsafe {
            if at >= api.list_count(list) {
                return None;
            }
            Some(api.list_remove(list, at))
        })?;
        match rc {
            None => Err(BindError::InvalidArgument(format!("index {index} out of range"))),
            Some(0) => Ok(()),
            Some(_) => Err(BindError::NativeCallFailed { call: "libvlc_media_list_remove_index" }),
        }
    }

    pub fn len(&self) -> Result<usize> {
        let count = self.locked(|api, list| unsafe { api.list_count(list) })?;
        usize::try_from(count).map_err(|_| BindError::NativeCallFailed { call: "libvlc_media_list_count" })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The media at `index`, as a new owning reference.
    pub fn get(&self, index: usize) -> Result<Option<Media>> {
        let at = index_arg(index)?;
        match self.locked(|api, list| unsafe { api.list_item_at(list, at) })? {
            Some(raw) => Media::adopt(self.runtime.clone(), Some(raw), "libvlc_media_list_item_at_index").map(Some),
            None => Ok(None),
        }
    }

    /// Owning references to every item, taken under one lock.
    pub fn items(&self) -> Result<Vec<Media>> {
        let raws = self.locked(|api, list| unsafe {
            let count = api.list_count(list).max(0);
            (0..count).filter_map(|i| api.list_item_at(list, i)).collect::<Vec<_>>()
        })?;
        raws.into_iter()
            .map(|raw| Media::adopt(self.runtime.clone(), Some(raw), "libvlc_media_list_item_at_index"))
            .collect()
    }

    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscription = self.runtime.dispatcher.subscribe(self.source_id(), listener);
        self.events.ensure_attached(self.runtime.sink(), self.runtime.policy)?;
        Ok(subscription)
    }

    pub fn release(&self) -> ReleaseOutcome {
        if let Err(err) = self.events.detach() {
            warn!(source = %self.source_id(), error = %err, "media list events not detached");
        }
        self.handle.release()
    }
}

impl Drop for MediaList {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for MediaList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaList").field("handle", &self.handle).finish()
    }
}
