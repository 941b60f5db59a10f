//! hlsplay Core - HLS playback session coordination
//!
//! This crate wraps a host-provided media engine and provides:
//! - Playback session lifecycle (setup, readiness, play/pause/seek, stop)
//! - Readiness and progress notifications through a weak delegate
//! - Now-playing info publishing to a process-wide surface
//! - Remote command handling (play, pause, scrub)
//! - Application lifecycle hooks
//! - Clock-style time formatting
//! - OS now-playing surface and transport controls (`os-controls` feature)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         hlsplay Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐                     ┌──────────────┐          │
//! │  │  Lifecycle   │                     │    Remote    │          │
//! │  │    Hooks     │                     │   Commands   │          │
//! │  └──────┬───────┘                     └──────┬───────┘          │
//! │         │                                    │                  │
//! │         └─────────────────┬──────────────────┘                  │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │──────── MediaPlayer          │
//! │                    │   Session   │         (host engine)        │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │         ┌─────────────────┴──────────────────┐                  │
//! │  ┌──────┴───────┐                     ┌──────┴───────┐          │
//! │  │   Delegate   │                     │ Now-Playing  │          │
//! │  │   (weak)     │                     │  Publisher   │          │
//! │  └──────────────┘                     └──────────────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use hlsplay_core::engine::sim::{SimulatedEngine, SimulatedMedia};
//! use hlsplay_core::{MediaMetadata, NowPlayingPublisher, PlaybackSession, SessionConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> hlsplay_core::Result<()> {
//! let engine = Arc::new(SimulatedEngine::new(SimulatedMedia::vod(120.0)));
//! let session = PlaybackSession::new(engine, NowPlayingPublisher::shared(), SessionConfig::default());
//! let surface = session.setup_player(
//!     "https://example.com/stream.m3u8",
//!     MediaMetadata::new("Evening News"),
//!     true,
//! )?;
//! assert!(surface.is_attached());
//! session.stop();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;
pub mod engine;
pub mod surface;
pub mod delegate;
pub mod session;
pub mod now_playing;
pub mod remote;
pub mod lifecycle;
pub mod time_format;
#[cfg(feature = "os-controls")]
pub mod system_controls;

pub use error::{Error, Result};
pub use types::*;
pub use engine::{ItemStatus, MediaPlayer, ObserverToken, PlayerFactory, TimeControlStatus};
pub use surface::RenderSurface;
pub use delegate::PlaybackDelegate;
pub use session::PlaybackSession;
pub use now_playing::{NowPlayingCenter, NowPlayingPublisher, NowPlayingSink, NowPlayingSnapshot};
pub use remote::{
    ChangePlaybackPositionEvent, CommandCenter, CommandStatus, RemoteCommand, RemoteCommandBridge,
    RemoteCommandCenter, RemoteCommandKind,
};
pub use lifecycle::{AppLifecycle, LifecycleEvent, LifecycleHooks};
pub use time_format::{format_duration, TimeDisplay};
#[cfg(feature = "os-controls")]
pub use system_controls::SystemMediaControls;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "hlsplay core initialized");
}
