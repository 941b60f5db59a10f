//! Media engine seam
//!
//! The host platform owns demuxing, bitrate selection, decryption and
//! rendering. The session only talks to it through [`PlayerFactory`] and
//! [`MediaPlayer`]. Every call is fire-and-forget: `play`, `pause` and `seek`
//! return as soon as the request is issued.

#[cfg(feature = "sim")]
pub mod sim;

use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Callback for item status changes
pub type StatusHandler = Box<dyn Fn(ItemStatus) + Send + Sync>;

/// Callback for periodic time reports, in seconds
pub type TimeHandler = Box<dyn Fn(f64) + Send + Sync>;

/// Handle returned when registering an observer with the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(pub u64);

/// Status of the current item as reported by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    /// Not known yet
    Unknown,
    /// Item can be played
    ReadyToPlay,
    /// Item can no longer be played
    Failed(String),
}

/// Whether the engine is actually advancing time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeControlStatus {
    Paused,
    /// Playback requested but the engine is waiting (buffering, loading)
    WaitingToPlay,
    Playing,
}

/// A platform player bound to at most one item
///
/// Status and time handlers run asynchronously on the engine's own schedule,
/// never from inside the call that registered them.
pub trait MediaPlayer: Send + Sync {
    /// Load `url` as the current item, replacing any previous one
    fn replace_current_item(&self, url: &Url);

    /// Observe status changes of the current item
    fn observe_status(&self, handler: StatusHandler) -> ObserverToken;

    fn remove_status_observer(&self, token: ObserverToken);

    fn play(&self);

    fn pause(&self);

    /// Request a seek to exactly `seconds`, with zero tolerance on either side
    fn seek(&self, seconds: f64);

    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Item duration in seconds, `None` while unknown or for live streams
    fn duration(&self) -> Option<f64>;

    fn time_control_status(&self) -> TimeControlStatus;

    /// Invoke `handler` every `interval` while playback advances
    fn add_periodic_time_observer(&self, interval: Duration, handler: TimeHandler) -> ObserverToken;

    fn remove_time_observer(&self, token: ObserverToken);
}

/// Creates fresh platform players
pub trait PlayerFactory: Send + Sync {
    fn create_player(&self) -> Arc<dyn MediaPlayer>;
}
