//! Safe LibVLC binding core.
//!
//! A [`MediaPlayerFactory`] owns the native instance and creates media,
//! players, lists and discoverers. Native events are translated on the
//! firing thread into owned [`EventRecord`]s and delivered to listeners by a
//! [`Dispatcher`] in per-source order, never on the native thread.

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod factory;
pub mod frame;
pub mod handle;
pub mod lifecycle;
pub mod locate;
pub mod log;
pub mod media;
pub mod media_list;
pub mod player;

pub use bridge::{BridgeState, EventBridge};
pub use config::BindingConfig;
pub use discovery::{MediaDiscoverer, RendererDiscoverer};
pub use dispatch::{DispatchConfig, DispatchStats, Dispatcher, EventLatch, EventSink, Subscription};
pub use error::{BindError, Result};
pub use event::{Event, EventCategory, EventRecord, LogLevel, LogMessage, MediaState, MetaKey, ParsedStatus};
pub use factory::{LibraryVersion, MediaPlayerFactory};
pub use frame::{BufferFormat, Chroma, FrameLease, NegotiatedFormat, VideoFrame, VideoSurface};
pub use handle::{HandleKind, NativeHandle, ReleaseOutcome, SourceId};
pub use lifecycle::{HeldItem, HoldPolicy, ItemRef, ItemSnapshot, RendererFlags, TransientItem};
pub use log::NativeLog;
pub use media::{Media, ParseFlags};
pub use media_list::MediaList;
pub use player::MediaPlayer;

/// Native window a player can render into.
pub use vlcbind_native::WindowHandle as PlatformWindow;
