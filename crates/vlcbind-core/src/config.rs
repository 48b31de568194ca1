use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchConfig;
use crate::error::{BindError, Result};
use crate::lifecycle::HoldPolicy;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BindingConfig {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Explicit path to the LibVLC shared library. Tried before anything else.
    pub path: Option<PathBuf>,
    /// Native plugin directory; see [`LibraryConfig::export_plugin_path`].
    pub plugin_path: Option<PathBuf>,
    /// Extra directories searched after the platform defaults.
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,
    /// Environment variable naming the library file or its directory.
    #[serde(default = "default_env_var")]
    pub env_var: String,
    #[serde(default = "default_min_major_version")]
    pub min_major_version: u32,
}

impl LibraryConfig {
    /// Export `plugin_path` as `VLC_PLUGIN_PATH`, where the native library
    /// reads it when an instance is created. Returns whether it was set.
    ///
    /// Changing the environment is only sound while the process has a
    /// single thread. Call this at the top of `main`, before any factory
    /// exists (each one starts dispatch workers).
    pub fn export_plugin_path(&self) -> bool {
        let Some(plugins) = &self.plugin_path else {
            return false;
        };
        tracing::debug!(path = %plugins.display(), "exporting VLC_PLUGIN_PATH");
        std::env::set_var("VLC_PLUGIN_PATH", plugins);
        true
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: None,
            plugin_path: None,
            search_dirs: Vec::new(),
            env_var: default_env_var(),
            min_major_version: default_min_major_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Arguments passed to `libvlc_new`.
    #[serde(default = "default_instance_args")]
    pub args: Vec<String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self { args: default_instance_args() }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Whether items announced by events are held for the application.
    #[serde(default)]
    pub hold_policy: HoldPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    /// FourCC requested by surfaces built with `MediaPlayer::set_video_renderer`.
    #[serde(default = "default_chroma")]
    pub chroma: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self { chroma: default_chroma() }
    }
}

fn default_env_var() -> String {
    "VLCBIND_LIBVLC_PATH".into()
}

fn default_min_major_version() -> u32 {
    3
}

fn default_instance_args() -> Vec<String> {
    vec!["--no-video-title-show".into()]
}

fn default_chroma() -> String {
    "RV32".into()
}

impl BindingConfig {
    /// Read `path`, falling back to defaults when it does not exist, then
    /// apply `VLCBIND_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| BindError::Config(format!("{}: {e}", path.display())))?;
            Self::from_toml_str(&content)?
        } else {
            tracing::info!("Config file not found at '{}', using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BindError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("VLCBIND_LIBRARY_PATH") {
            self.library.path = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var("VLCBIND_PLUGIN_PATH") {
            self.library.plugin_path = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var("VLCBIND_DISPATCH_WORKERS") {
            match value.parse::<usize>() {
                Ok(parsed) if parsed > 0 => self.dispatch.workers = parsed,
                _ => tracing::warn!(
                    "Ignoring VLCBIND_DISPATCH_WORKERS='{}': expected a positive integer",
                    value
                ),
            }
        }
        if let Ok(value) = std::env::var("VLCBIND_HOLD_POLICY") {
            match value.trim().to_ascii_lowercase().as_str() {
                "transient" => self.events.hold_policy = HoldPolicy::Transient,
                "hold-discovered" => self.events.hold_policy = HoldPolicy::HoldDiscovered,
                other => tracing::warn!("Unknown VLCBIND_HOLD_POLICY '{}', keeping configured policy", other),
            }
        }
    }
}
