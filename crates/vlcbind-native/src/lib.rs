//! Native ABI layer for vlcbind.
//!
//! Declares the raw LibVLC event layout ([`ffi`]), the [`NativeApi`] trait
//! the binding core calls through, the runtime-loaded [`libvlc::LibVlc`]
//! implementation and the in-process [`sim::SimulatedNative`].

mod api;
mod error;
pub mod ffi;
#[cfg(feature = "libvlc")]
pub mod libvlc;
pub mod sim;

pub use api::{
    parse_version, FormatCallbacks, NativeApi, ObjectKind, RawPtr, VideoCallbacks, WindowHandle,
};
pub use error::NativeError;
