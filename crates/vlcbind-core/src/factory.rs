//! Library bring-up and the object factory.

use std::ffi::CString;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};
use vlcbind_native::{parse_version, NativeApi};

use crate::config::BindingConfig;
use crate::discovery::{service_name, MediaDiscoverer, RendererDiscoverer};
use crate::dispatch::{DispatchStats, Dispatcher, EventSink};
use crate::error::{BindError, Result};
use crate::event::LogLevel;
use crate::frame::Chroma;
use crate::handle::{HandleKind, NativeHandle, ReleaseOutcome};
use crate::lifecycle::HoldPolicy;
use crate::log::NativeLog;
use crate::media::Media;
use crate::media_list::MediaList;
use crate::player::MediaPlayer;

/// What every wrapper created by one factory shares.
pub(crate) struct Runtime {
    pub api: Arc<dyn NativeApi>,
    pub dispatcher: Arc<Dispatcher>,
    pub policy: HoldPolicy,
    pub chroma: Chroma,
    pub instance: Arc<NativeHandle>,
}

impl Runtime {
    pub fn sink(&self) -> Arc<dyn EventSink> {
        self.dispatcher.clone()
    }
}

/// Parsed `major.minor.patch` of the loaded library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// The full string, including any codename.
    pub raw: String,
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Owns the native instance and creates every other object.
pub struct MediaPlayerFactory {
    runtime: Arc<Runtime>,
    logs: Mutex<Vec<Arc<NativeLog>>>,
    version: LibraryVersion,
}

impl MediaPlayerFactory {
    /// Bring up an instance over an already opened native implementation.
    pub fn new(api: Arc<dyn NativeApi>, config: &BindingConfig) -> Result<Self> {
        let raw = api.version();
        let Some((major, minor, patch)) = parse_version(&raw) else {
            return Err(BindError::InitializationFailed(format!("unparseable library version {raw:?}")));
        };
        let required = config.library.min_major_version;
        if major < required {
            return Err(BindError::IncompatibleVersion { found: raw, required });
        }
        let version = LibraryVersion { major, minor, patch, raw };

        // The environment is left alone here: other threads may be running.
        if let Some(plugins) = &config.library.plugin_path {
            if std::env::var_os("VLC_PLUGIN_PATH").as_deref() != Some(plugins.as_os_str()) {
                warn!(
                    path = %plugins.display(),
                    "library.plugin_path is not exported; call LibraryConfig::export_plugin_path at startup"
                );
            }
        }

        let chroma: Chroma = config
            .video
            .chroma
            .parse()
            .map_err(|err| BindError::Config(format!("video.chroma: {err}")))?;
        let instance = NativeHandle::adopt(
            api.clone(),
            HandleKind::Instance,
            api.new_instance(&config.instance.args),
            "libvlc_new",
        )
        .map_err(|_| BindError::InitializationFailed("libvlc_new returned no instance".into()))?;
        let dispatcher = Arc::new(Dispatcher::new(&config.dispatch)?);

        info!(
            %version,
            args = ?config.instance.args,
            hold_policy = ?config.events.hold_policy,
            "media instance created"
        );

        Ok(Self {
            runtime: Arc::new(Runtime {
                api,
                dispatcher,
                policy: config.events.hold_policy,
                chroma,
                instance: Arc::new(instance),
            }),
            logs: Mutex::new(Vec::new()),
            version,
        })
    }

    /// Locate LibVLC, load it and bring up an instance.
    #[cfg(feature = "libvlc")]
    pub fn load(config: &BindingConfig) -> Result<Self> {
        use crate::locate::{default_strategies, locate_native_library, RealFs};

        let location = locate_native_library(&default_strategies(&config.library), &RealFs)?;
        let lib = vlcbind_native::libvlc::LibVlc::open(&location.path)?;
        Self::new(Arc::new(lib), config)
    }

    pub fn version(&self) -> &LibraryVersion {
        &self.version
    }

    pub fn hold_policy(&self) -> HoldPolicy {
        self.runtime.policy
    }

    /// Queue shared by every object of this factory.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.runtime.dispatcher
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.runtime.dispatcher.stats()
    }

    // ── Creation ─────────────────────────────────────────────────────

    /// Media from a location such as `file:///...`, `http://...`.
    pub fn new_media(&self, mrl: &str) -> Result<Media> {
        let mrl = CString::new(mrl).map_err(|_| BindError::InvalidArgument("MRL contains a NUL byte".into()))?;
        let raw = self.runtime.instance.call(|api, inst| unsafe { api.media_new_location(inst, &mrl) })?;
        Media::adopt(self.runtime.clone(), raw, "libvlc_media_new_location")
    }

    /// Media from a local file path.
    pub fn new_media_path(&self, path: impl AsRef<Path>) -> Result<Media> {
        let path = path.as_ref();
        let text = path
            .to_str()
            .ok_or_else(|| BindError::InvalidArgument(format!("path {} is not UTF-8", path.display())))?;
        let path = CString::new(text).map_err(|_| BindError::InvalidArgument("path contains a NUL byte".into()))?;
        let raw = self.runtime.instance.call(|api, inst| unsafe { api.media_new_path(inst, &path) })?;
        Media::adopt(self.runtime.clone(), raw, "libvlc_media_new_path")
    }

    pub fn new_player(&self) -> Result<MediaPlayer> {
        let raw = self.runtime.instance.call(|api, inst| unsafe { api.player_new(inst) })?;
        MediaPlayer::adopt(self.runtime.clone(), raw)
    }

    pub fn new_media_list(&self) -> Result<MediaList> {
        let raw = self.runtime.instance.call(|api, inst| unsafe { api.list_new(inst) })?;
        MediaList::adopt(self.runtime.clone(), raw, "libvlc_media_list_new")
    }

    /// Media discoverer for a service such as `"upnp"` or `"smb"`.
    pub fn new_discoverer(&self, name: &str) -> Result<MediaDiscoverer> {
        let service = service_name(name)?;
        let raw = self.runtime.instance.call(|api, inst| unsafe { api.discoverer_new(inst, &service) })?;
        MediaDiscoverer::adopt(self.runtime.clone(), raw, name)
    }

    /// Renderer discoverer for a service such as `"microdns"`.
    pub fn new_renderer_discoverer(&self, name: &str) -> Result<RendererDiscoverer> {
        let service = service_name(name)?;
        let raw = self
            .runtime
            .instance
            .call(|api, inst| unsafe { api.renderer_discoverer_new(inst, &service) })?;
        RendererDiscoverer::adopt(self.runtime.clone(), raw, name)
    }

    /// Route native log lines at `min_level` and above into the event queue.
    /// Only one log is active per instance; opening a new one replaces the
    /// previous callback.
    pub fn native_log(&self, min_level: LogLevel) -> Result<Arc<NativeLog>> {
        let mut logs = self.logs.lock();
        for previous in logs.drain(..) {
            previous.close();
        }
        let log = Arc::new(NativeLog::open(
            self.runtime.instance.clone(),
            self.runtime.dispatcher.clone(),
            min_level,
        )?);
        logs.push(log.clone());
        Ok(log)
    }

    // ── Release ──────────────────────────────────────────────────────

    /// Close the native log, release the instance, then drain and stop the
    /// dispatcher. Objects created earlier keep working against the native
    /// library until they are released themselves, but publish nothing.
    pub fn release(&self) -> ReleaseOutcome {
        for log in self.logs.lock().drain(..) {
            log.close();
        }
        let outcome = self.runtime.instance.release();
        if outcome == ReleaseOutcome::Released {
            self.runtime.dispatcher.shutdown();
            info!(version = %self.version, "media instance released");
        } else {
            warn!("media instance already released");
        }
        outcome
    }

    pub fn is_released(&self) -> bool {
        self.runtime.instance.is_released()
    }
}

impl Drop for MediaPlayerFactory {
    fn drop(&mut self) {
        if !self.is_released() {
            self.release();
        }
    }
}

impl fmt::Debug for MediaPlayerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPlayerFactory")
            .field("version", &self.version)
            .field("instance", &self.runtime.instance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlcbind_native::sim::{FailKind, SimulatedNative};

    #[test]
    fn configured_plugin_path_does_not_touch_the_environment() {
        let sim = Arc::new(SimulatedNative::new());
        let plugins = std::path::PathBuf::from("/opt/vlcbind-factory-test/plugins");
        let mut config = BindingConfig::default();
        config.library.plugin_path = Some(plugins.clone());
        let _factory = MediaPlayerFactory::new(sim, &config).expect("factory");
        assert_ne!(std::env::var_os("VLC_PLUGIN_PATH"), Some(plugins.into_os_string()));
    }

    #[test]
    fn reports_parsed_version() {
        let sim = Arc::new(SimulatedNative::new());
        let factory = MediaPlayerFactory::new(sim, &BindingConfig::default()).expect("factory");
        let version = factory.version();
        assert_eq!((version.major, version.minor, version.patch), (3, 0, 20));
        assert_eq!(version.to_string(), "3.0.20 Vetinari");
    }

    #[test]
    fn old_library_is_rejected() {
        let sim = Arc::new(SimulatedNative::new());
        sim.set_version("2.2.8 Weatherwax");
        let err = MediaPlayerFactory::new(sim, &BindingConfig::default()).unwrap_err();
        assert!(matches!(err, BindError::IncompatibleVersion { required: 3, .. }));
    }

    #[test]
    fn garbage_version_fails_initialization() {
        let sim = Arc::new(SimulatedNative::new());
        sim.set_version("unknown");
        let err = MediaPlayerFactory::new(sim, &BindingConfig::default()).unwrap_err();
        assert!(matches!(err, BindError::InitializationFailed(_)));
    }

    #[test]
    fn instance_failure_fails_initialization() {
        let sim = Arc::new(SimulatedNative::new());
        sim.fail_next(FailKind::NewInstance);
        let err = MediaPlayerFactory::new(sim, &BindingConfig::default()).unwrap_err();
        assert!(matches!(err, BindError::InitializationFailed(_)));
    }

    #[test]
    fn bad_chroma_is_a_config_error() {
        let sim = Arc::new(SimulatedNative::new());
        let mut config = BindingConfig::default();
        config.video.chroma = "RGB".into();
        assert!(matches!(MediaPlayerFactory::new(sim, &config), Err(BindError::Config(_))));
    }

    #[test]
    fn creation_failures_surface_as_errors() {
        let sim = Arc::new(SimulatedNative::new());
        let factory = MediaPlayerFactory::new(sim.clone(), &BindingConfig::default()).expect("factory");
        sim.fail_next(FailKind::NewPlayer);
        assert!(matches!(
            factory.new_player(),
            Err(BindError::NativeCreationFailed { kind: HandleKind::Player, .. })
        ));
        assert!(matches!(factory.new_media("bad\0mrl"), Err(BindError::InvalidArgument(_))));
        let media = factory.new_media_path("/srv/media/clip.mkv").expect("path media");
        assert_eq!(media.mrl().expect("mrl").as_deref(), Some("file:///srv/media/clip.mkv"));
    }

    #[test]
    fn release_rejects_further_creation() {
        let sim = Arc::new(SimulatedNative::new());
        let factory = MediaPlayerFactory::new(sim.clone(), &BindingConfig::default()).expect("factory");
        let log = factory.native_log(LogLevel::Notice).expect("log");
        assert_eq!(factory.release(), ReleaseOutcome::Released);
        assert!(log.is_closed());
        assert_eq!(factory.release(), ReleaseOutcome::AlreadyReleased);
        assert!(matches!(
            factory.new_player(),
            Err(BindError::UseAfterRelease { kind: HandleKind::Instance })
        ));
        assert!(sim.violations().is_empty());
    }
}
