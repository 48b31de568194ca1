use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while bringing up a native library implementation.
#[derive(Debug, Error)]
pub enum NativeError {
    #[cfg(feature = "libvlc")]
    #[error("failed to open native library {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[cfg(feature = "libvlc")]
    #[error("native library is missing symbol `{name}`: {source}")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("native library at {0} is not a LibVLC build")]
    NotLibVlc(PathBuf),
}
