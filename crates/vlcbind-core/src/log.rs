//! Native log lines as events.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::dispatch::{Dispatcher, Subscription};
use crate::error::Result;
use crate::event::{Event, EventRecord, LogLevel, LogMessage};
use crate::handle::{NativeHandle, SourceId};

struct LogShared {
    dispatcher: Arc<Dispatcher>,
    source: SourceId,
    min_level: LogLevel,
}

unsafe extern "C" fn log_trampoline(
    data: *mut c_void,
    level: c_int,
    module: *const c_char,
    message: *const c_char,
) {
    if data.is_null() || message.is_null() {
        return;
    }
    let shared = &*(data as *const LogShared);
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let level = LogLevel::from_raw(level);
        if level < shared.min_level {
            return;
        }
        let module = (!module.is_null()).then(|| CStr::from_ptr(module).to_string_lossy().into_owned());
        let message = CStr::from_ptr(message).to_string_lossy().into_owned();
        shared
            .dispatcher
            .enqueue(shared.source, EventRecord::Log(LogMessage { level, module, message }));
    }));
    if outcome.is_err() {
        error!("panic while forwarding native log line");
    }
}

/// Routes the instance's log output into the dispatch queue as
/// [`EventRecord::Log`] records on its own source.
pub struct NativeLog {
    instance: Arc<NativeHandle>,
    shared: Arc<LogShared>,
    closed: AtomicBool,
}

impl NativeLog {
    pub(crate) fn open(
        instance: Arc<NativeHandle>,
        dispatcher: Arc<Dispatcher>,
        min_level: LogLevel,
    ) -> Result<Self> {
        let shared = Arc::new(LogShared { dispatcher, source: SourceId::next(), min_level });
        let data = Arc::as_ptr(&shared) as *mut c_void;
        let api = instance.api().clone();
        instance.with_ptr(|inst| unsafe { api.log_set(inst, log_trampoline, data) })?;
        debug!(source = %shared.source, ?min_level, "native log attached");
        Ok(Self { instance, shared, closed: AtomicBool::new(false) })
    }

    pub fn source_id(&self) -> SourceId {
        self.shared.source
    }

    pub fn min_level(&self) -> LogLevel {
        self.shared.min_level
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.dispatcher.subscribe(self.shared.source, listener)
    }

    /// Unset the native callback. Once this returns no further lines are
    /// enqueued. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let api = self.instance.api().clone();
        if self.instance.with_ptr(|inst| unsafe { api.log_unset(inst) }).is_err() {
            // Other objects may still keep the native instance alive.
            warn!(source = %self.shared.source, "instance released before its log; leaking callback state");
            std::mem::forget(self.shared.clone());
        }
        debug!(source = %self.shared.source, "native log detached");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for NativeLog {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchConfig;
    use crate::handle::HandleKind;
    use std::sync::mpsc;
    use std::time::Duration;
    use vlcbind_native::ffi::log_level;
    use vlcbind_native::sim::SimulatedNative;
    use vlcbind_native::NativeApi;

    #[test]
    fn filtered_lines_reach_listeners() {
        let sim = Arc::new(SimulatedNative::new());
        let api: Arc<dyn NativeApi> = sim.clone();
        let instance = Arc::new(
            NativeHandle::adopt(api.clone(), HandleKind::Instance, api.new_instance(&[]), "libvlc_new")
                .expect("instance"),
        );
        let raw = instance.with_ptr(|p| p).expect("live");
        let dispatcher = Arc::new(Dispatcher::new(&DispatchConfig::default()).expect("dispatcher"));
        let log = NativeLog::open(instance.clone(), dispatcher, LogLevel::Warning).expect("log");

        let (tx, rx) = mpsc::channel();
        let _sub = log.subscribe(move |e| {
            if let EventRecord::Log(line) = &e.record {
                tx.send(line.clone()).ok();
            }
        });

        assert!(sim.emit_log(raw, log_level::DEBUG, Some("core"), "noise"));
        assert!(sim.emit_log(raw, log_level::ERROR, Some("main"), "decoder failed"));
        let line = rx.recv_timeout(Duration::from_secs(5)).expect("line");
        assert_eq!(line.level, LogLevel::Error);
        assert_eq!(line.module.as_deref(), Some("main"));
        assert_eq!(line.message, "decoder failed");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        log.close();
        assert!(log.is_closed());
        assert!(!sim.emit_log(raw, log_level::ERROR, None, "after close"));
    }
}
