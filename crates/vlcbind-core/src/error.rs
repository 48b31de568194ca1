use thiserror::Error;

use crate::handle::HandleKind;

/// Errors surfaced by the binding core.
#[derive(Debug, Error)]
pub enum BindError {
    /// A native factory call returned its failure sentinel.
    #[error("native {kind} creation failed in {call}")]
    NativeCreationFailed { kind: HandleKind, call: &'static str },

    /// An operation was issued on a handle that was already released.
    #[error("{kind} handle used after release")]
    UseAfterRelease { kind: HandleKind },

    /// A transient native reference was used outside its callback.
    #[error("transient {what} used after its callback returned")]
    ItemExpired { what: &'static str },

    /// Library or instance bring-up failed; nothing can be created.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// A listener panicked during notification.
    #[error("listener failed on {source_id}: {message}")]
    ListenerFailure { source_id: u64, message: String },

    /// Plane count or strides are inconsistent with the pixel format.
    #[error("video format negotiation failed: {0}")]
    FormatNegotiation(String),

    #[error("native library not found (tried: {})", tried.join(", "))]
    LibraryNotFound { tried: Vec<String> },

    #[error("incompatible native library version {found} (need major >= {required})")]
    IncompatibleVersion { found: String, required: u32 },

    /// A native call returned its error sentinel.
    #[error("native call {call} failed")]
    NativeCallFailed { call: &'static str },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Attach/detach requested in a state that does not allow it.
    #[error("event bridge is {state}; cannot {action}")]
    BridgeState { state: &'static str, action: &'static str },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Native(#[from] vlcbind_native::NativeError),
}

pub type Result<T> = std::result::Result<T, BindError>;
