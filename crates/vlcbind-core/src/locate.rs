//! Finding the LibVLC shared library on disk.
//!
//! Strategies are tried in priority order and the first one that yields an
//! existing file wins. Results are never merged.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::LibraryConfig;
use crate::error::{BindError, Result};

/// File-system and environment access used by the strategies.
pub trait LibraryFs {
    fn is_file(&self, path: &Path) -> bool;
    fn env(&self, name: &str) -> Option<OsString>;
}

/// The real file system and process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl LibraryFs for RealFs {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn env(&self, name: &str) -> Option<OsString> {
        std::env::var_os(name).filter(|v| !v.is_empty())
    }
}

/// One way of finding the library.
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> String;
    fn locate(&self, fs: &dyn LibraryFs) -> Option<PathBuf>;
}

/// File names the native library is published under on this platform,
/// most specific first.
pub fn library_file_names() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["libvlc.dll"]
    } else if cfg!(target_os = "macos") {
        &["libvlc.dylib"]
    } else {
        &["libvlc.so.5", "libvlc.so"]
    }
}

pub fn library_file_name() -> &'static str {
    library_file_names()[0]
}

fn first_in_dir(fs: &dyn LibraryFs, dir: &Path) -> Option<PathBuf> {
    library_file_names()
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| fs.is_file(candidate))
}

/// A path given directly in configuration.
#[derive(Debug, Clone)]
pub struct ExplicitPath(pub PathBuf);

impl SearchStrategy for ExplicitPath {
    fn name(&self) -> String {
        format!("explicit path {}", self.0.display())
    }

    fn locate(&self, fs: &dyn LibraryFs) -> Option<PathBuf> {
        fs.is_file(&self.0).then(|| self.0.clone())
    }
}

/// An environment variable naming either the library file or the directory
/// holding it.
#[derive(Debug, Clone)]
pub struct EnvironmentVariable(pub String);

impl SearchStrategy for EnvironmentVariable {
    fn name(&self) -> String {
        format!("environment variable {}", self.0)
    }

    fn locate(&self, fs: &dyn LibraryFs) -> Option<PathBuf> {
        let value = PathBuf::from(fs.env(&self.0)?);
        if fs.is_file(&value) {
            return Some(value);
        }
        first_in_dir(fs, &value)
    }
}

/// Well-known install locations for this platform, then any extra
/// directories from configuration.
#[derive(Debug, Clone, Default)]
pub struct PlatformDirectories {
    pub extra: Vec<PathBuf>,
}

impl PlatformDirectories {
    fn directories(&self, fs: &dyn LibraryFs) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        if cfg!(target_os = "windows") {
            for var in ["ProgramFiles", "ProgramFiles(x86)"] {
                if let Some(root) = fs.env(var) {
                    dirs.push(PathBuf::from(root).join("VideoLAN").join("VLC"));
                }
            }
        } else if cfg!(target_os = "macos") {
            dirs.push(PathBuf::from("/Applications/VLC.app/Contents/MacOS/lib"));
            dirs.push(PathBuf::from("/opt/homebrew/lib"));
            dirs.push(PathBuf::from("/usr/local/lib"));
        } else {
            for dir in [
                "/usr/lib/x86_64-linux-gnu",
                "/usr/lib/aarch64-linux-gnu",
                "/usr/lib64",
                "/usr/lib",
                "/usr/local/lib",
                "/snap/vlc/current/usr/lib",
            ] {
                dirs.push(PathBuf::from(dir));
            }
        }
        dirs.extend(self.extra.iter().cloned());
        dirs
    }
}

impl SearchStrategy for PlatformDirectories {
    fn name(&self) -> String {
        "platform directories".into()
    }

    fn locate(&self, fs: &dyn LibraryFs) -> Option<PathBuf> {
        self.directories(fs).iter().find_map(|dir| first_in_dir(fs, dir))
    }
}

/// The dynamic loader's search path variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSearchPath;

impl SystemSearchPath {
    pub fn variable() -> &'static str {
        if cfg!(target_os = "windows") {
            "PATH"
        } else if cfg!(target_os = "macos") {
            "DYLD_LIBRARY_PATH"
        } else {
            "LD_LIBRARY_PATH"
        }
    }
}

impl SearchStrategy for SystemSearchPath {
    fn name(&self) -> String {
        format!("system search path {}", Self::variable())
    }

    fn locate(&self, fs: &dyn LibraryFs) -> Option<PathBuf> {
        let value = fs.env(Self::variable())?;
        std::env::split_paths(&value).find_map(|dir| first_in_dir(fs, &dir))
    }
}

/// Where the library was found and by which strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLocation {
    pub path: PathBuf,
    pub strategy: String,
}

/// Try `strategies` in order; the first hit wins.
pub fn locate_native_library(
    strategies: &[Box<dyn SearchStrategy>],
    fs: &dyn LibraryFs,
) -> Result<LibraryLocation> {
    let mut tried = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let name = strategy.name();
        match strategy.locate(fs) {
            Some(path) => {
                info!(strategy = %name, path = %path.display(), "located LibVLC");
                return Ok(LibraryLocation { path, strategy: name });
            }
            None => {
                debug!(strategy = %name, "LibVLC not found");
                tried.push(name);
            }
        }
    }
    Err(BindError::LibraryNotFound { tried })
}

/// Explicit path, then the environment variable, then platform directories,
/// then the loader search path.
pub fn default_strategies(config: &LibraryConfig) -> Vec<Box<dyn SearchStrategy>> {
    let mut strategies: Vec<Box<dyn SearchStrategy>> = Vec::new();
    if let Some(path) = &config.path {
        strategies.push(Box::new(ExplicitPath(path.clone())));
    }
    strategies.push(Box::new(EnvironmentVariable(config.env_var.clone())));
    strategies.push(Box::new(PlatformDirectories { extra: config.search_dirs.clone() }));
    strategies.push(Box::new(SystemSearchPath));
    strategies
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeFs {
        files: HashSet<PathBuf>,
        env: HashMap<String, OsString>,
    }

    impl LibraryFs for FakeFs {
        fn is_file(&self, path: &Path) -> bool {
            self.files.contains(path)
        }

        fn env(&self, name: &str) -> Option<OsString> {
            self.env.get(name).cloned()
        }
    }

    struct Fixed {
        name: &'static str,
        result: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl SearchStrategy for Fixed {
        fn name(&self) -> String {
            self.name.into()
        }

        fn locate(&self, _fs: &dyn LibraryFs) -> Option<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.map(PathBuf::from)
        }
    }

    #[test]
    fn first_success_wins_and_later_strategies_are_not_consulted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategies: Vec<Box<dyn SearchStrategy>> = vec![
            Box::new(Fixed { name: "s1", result: None, calls: calls.clone() }),
            Box::new(Fixed { name: "s2", result: Some("/two/libvlc.so"), calls: calls.clone() }),
            Box::new(Fixed { name: "s3", result: Some("/three/libvlc.so"), calls: calls.clone() }),
        ];
        let found = locate_native_library(&strategies, &FakeFs::default()).expect("found");
        assert_eq!(found.path, PathBuf::from("/two/libvlc.so"));
        assert_eq!(found.strategy, "s2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn exhausted_search_lists_every_strategy() {
        let strategies: Vec<Box<dyn SearchStrategy>> = vec![
            Box::new(ExplicitPath(PathBuf::from("/nope/libvlc.so"))),
            Box::new(EnvironmentVariable("VLCBIND_TEST_UNSET".into())),
        ];
        match locate_native_library(&strategies, &FakeFs::default()) {
            Err(BindError::LibraryNotFound { tried }) => {
                assert_eq!(tried.len(), 2);
                assert!(tried[1].contains("VLCBIND_TEST_UNSET"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn environment_variable_accepts_file_or_directory() {
        let dir = PathBuf::from("/opt/vlc");
        let lib = dir.join(library_file_name());
        let mut fs = FakeFs::default();
        fs.files.insert(lib.clone());

        fs.env.insert("LIB".into(), lib.clone().into_os_string());
        assert_eq!(EnvironmentVariable("LIB".into()).locate(&fs), Some(lib.clone()));

        fs.env.insert("LIB".into(), dir.into_os_string());
        assert_eq!(EnvironmentVariable("LIB".into()).locate(&fs), Some(lib));
    }

    #[test]
    fn extra_directories_are_searched() {
        let extra = PathBuf::from("/custom/vlc");
        let lib = extra.join(library_file_names()[library_file_names().len() - 1]);
        let mut fs = FakeFs::default();
        fs.files.insert(lib.clone());
        let strategy = PlatformDirectories { extra: vec![extra] };
        assert_eq!(strategy.locate(&fs), Some(lib));
    }

    #[test]
    fn search_path_splits_entries() {
        let second = PathBuf::from("/b");
        let lib = second.join(library_file_name());
        let mut fs = FakeFs::default();
        fs.files.insert(lib.clone());
        let joined = std::env::join_paths([PathBuf::from("/a"), second]).expect("join");
        fs.env.insert(SystemSearchPath::variable().into(), joined);
        assert_eq!(SystemSearchPath.locate(&fs), Some(lib));
    }

    #[test]
    fn default_order_starts_with_explicit_path() {
        let config = LibraryConfig { path: Some(PathBuf::from("/x/libvlc.so")), ..LibraryConfig::default() };
        let names: Vec<String> = default_strategies(&config).iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 4);
        assert!(names[0].starts_with("explicit path"));
        assert!(names[1].contains("VLCBIND_LIBVLC_PATH"));
        assert_eq!(names[2], "platform directories");
    }

    #[test]
    fn real_fs_finds_file_in_temp_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lib = dir.path().join(library_file_name());
        std::fs::write(&lib, b"").expect("write");
        let strategy = PlatformDirectories { extra: vec![dir.path().to_path_buf()] };
        let found = locate_native_library(&[Box::new(strategy) as Box<dyn SearchStrategy>], &RealFs);
        // A system-wide LibVLC may be found first; either way the result exists.
        let found = found.expect("found");
        assert!(found.path.is_file());
    }
}
