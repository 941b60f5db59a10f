//! Now-playing info publishing
//!
//! Mirrors session state onto the system-wide "now playing" surface (lock
//! screen, control center). Elapsed time should not be pushed on every
//! progress tick; publish on coarse transitions only (play, pause, lifecycle
//! changes, remote commands).

use crate::engine::{MediaPlayer, TimeControlStatus};
use crate::types::{Artwork, MediaMetadata};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::debug;

/// Key/value snapshot pushed to the now-playing surface
///
/// Absent fields are omitted from the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork: Option<Artwork>,
    /// 1 while playing, 0 while paused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_rate: Option<f64>,
    /// Whole seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_playback_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_live_stream: Option<bool>,
}

impl NowPlayingSnapshot {
    /// Build a snapshot from the current player state.
    ///
    /// With `live_mode` the snapshot carries rate, elapsed time and duration.
    /// Without it the item is flagged as a live stream and timing is left out.
    pub fn capture(metadata: &MediaMetadata, player: &dyn MediaPlayer, live_mode: bool) -> Self {
        let mut snapshot = NowPlayingSnapshot {
            title: Some(metadata.title.clone()),
            artwork: metadata.artwork.clone(),
            ..Default::default()
        };

        if live_mode {
            snapshot.playback_rate = match player.time_control_status() {
                TimeControlStatus::Playing => Some(1.0),
                TimeControlStatus::Paused => Some(0.0),
                TimeControlStatus::WaitingToPlay => None,
            };
            snapshot.elapsed_playback_time = Some(player.current_time().floor().max(0.0) as u64);
            snapshot.playback_duration = player.duration().filter(|d| d.is_finite());
        } else {
            snapshot.is_live_stream = Some(true);
        }

        snapshot
    }

    /// True for the cleared snapshot
    pub fn is_empty(&self) -> bool {
        *self == NowPlayingSnapshot::default()
    }
}

/// Destination of now-playing snapshots
pub trait NowPlayingSink: Send + Sync {
    /// Replace the published info entirely
    fn set_now_playing_info(&self, snapshot: NowPlayingSnapshot);
}

/// Process-wide now-playing target
///
/// There is one surface per process and the last writer wins. Hosts with a
/// single session per process should use [`NowPlayingCenter::shared`];
/// nothing arbitrates between sessions writing concurrently.
pub struct NowPlayingCenter {
    tx: watch::Sender<NowPlayingSnapshot>,
    revision: AtomicU64,
}

impl NowPlayingCenter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(NowPlayingSnapshot::default());
        Self {
            tx,
            revision: AtomicU64::new(0),
        }
    }

    /// The process-wide instance
    pub fn shared() -> Arc<NowPlayingCenter> {
        static SHARED: OnceLock<Arc<NowPlayingCenter>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(NowPlayingCenter::new())))
    }

    /// Currently published info
    pub fn current(&self) -> NowPlayingSnapshot {
        self.tx.borrow().clone()
    }

    /// Watch published info
    pub fn subscribe(&self) -> watch::Receiver<NowPlayingSnapshot> {
        self.tx.subscribe()
    }

    /// Number of snapshots written so far
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

impl Default for NowPlayingCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NowPlayingSink for NowPlayingCenter {
    fn set_now_playing_info(&self, snapshot: NowPlayingSnapshot) {
        self.tx.send_replace(snapshot);
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

/// Publishes session state through an injected sink
#[derive(Clone)]
pub struct NowPlayingPublisher {
    sink: Arc<dyn NowPlayingSink>,
}

impl NowPlayingPublisher {
    pub fn new(sink: Arc<dyn NowPlayingSink>) -> Self {
        Self { sink }
    }

    /// Publisher writing to [`NowPlayingCenter::shared`]
    pub fn shared() -> Self {
        Self::new(NowPlayingCenter::shared())
    }

    /// Publish a fresh snapshot. Does nothing without an active player.
    pub fn publish(
        &self,
        metadata: &MediaMetadata,
        player: Option<&dyn MediaPlayer>,
        live_mode: bool,
    ) -> Option<NowPlayingSnapshot> {
        let player = player?;
        let snapshot = NowPlayingSnapshot::capture(metadata, player, live_mode);
        debug!(
            title = %metadata.title,
            live_mode,
            rate = ?snapshot.playback_rate,
            elapsed = ?snapshot.elapsed_playback_time,
            "Publishing now-playing info"
        );
        self.sink.set_now_playing_info(snapshot.clone());
        Some(snapshot)
    }

    /// Publish an empty snapshot
    pub fn clear(&self) {
        debug!("Clearing now-playing info");
        self.sink.set_now_playing_info(NowPlayingSnapshot::default());
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::engine::sim::{SimulatedEngine, SimulatedMedia};
    use crate::engine::PlayerFactory;
    use std::time::Duration;
    use url::Url;

    fn loaded_player(media: SimulatedMedia) -> Arc<dyn MediaPlayer> {
        let engine = SimulatedEngine::new(media);
        let player = engine.create_player();
        player.replace_current_item(&Url::parse("https://example.com/a.m3u8").unwrap());
        player
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_without_timing_marks_live_stream() {
        let center = Arc::new(NowPlayingCenter::new());
        let publisher = NowPlayingPublisher::new(center.clone());
        let player = loaded_player(SimulatedMedia::vod(120.0));
        let metadata = MediaMetadata::new("Morning Show");

        publisher.publish(&metadata, Some(player.as_ref()), false);

        let snapshot = center.current();
        assert_eq!(snapshot.title.as_deref(), Some("Morning Show"));
        assert_eq!(snapshot.is_live_stream, Some(true));
        assert_eq!(snapshot.playback_rate, None);
        assert_eq!(snapshot.elapsed_playback_time, None);
        assert_eq!(snapshot.playback_duration, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_with_timing_while_paused() {
        let center = Arc::new(NowPlayingCenter::new());
        let publisher = NowPlayingPublisher::new(center.clone());
        let player = loaded_player(SimulatedMedia::vod(120.0));
        player.play();
        tokio::time::sleep(Duration::from_millis(200 + 7_400)).await;
        player.pause();

        publisher.publish(&MediaMetadata::new("Episode 4"), Some(player.as_ref()), true);

        let snapshot = center.current();
        assert_eq!(snapshot.playback_rate, Some(0.0));
        assert_eq!(snapshot.elapsed_playback_time, Some(7));
        assert_eq!(snapshot.playback_duration, Some(120.0));
        assert_eq!(snapshot.is_live_stream, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_without_player_is_noop() {
        let center = Arc::new(NowPlayingCenter::new());
        let publisher = NowPlayingPublisher::new(center.clone());

        assert!(publisher.publish(&MediaMetadata::new("x"), None, true).is_none());
        assert_eq!(center.revision(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_overwrites_previous_snapshot() {
        let center = Arc::new(NowPlayingCenter::new());
        let publisher = NowPlayingPublisher::new(center.clone());
        let player = loaded_player(SimulatedMedia::vod(120.0));
        tokio::time::sleep(Duration::from_millis(300)).await;

        publisher.publish(&MediaMetadata::new("a"), Some(player.as_ref()), true);
        assert!(center.current().elapsed_playback_time.is_some());

        publisher.publish(&MediaMetadata::new("a"), Some(player.as_ref()), false);
        let snapshot = center.current();
        assert_eq!(snapshot.elapsed_playback_time, None);
        assert_eq!(snapshot.playback_duration, None);

        publisher.clear();
        assert!(center.current().is_empty());
        assert_eq!(center.revision(), 3);
    }

    #[test]
    fn test_snapshot_json_keys() {
        let snapshot = NowPlayingSnapshot {
            title: Some("News".into()),
            playback_rate: Some(1.0),
            elapsed_playback_time: Some(42),
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["title"], "News");
        assert_eq!(json["playbackRate"], 1.0);
        assert_eq!(json["elapsedPlaybackTime"], 42);
        assert!(json.get("isLiveStream").is_none());
        assert!(json.get("artwork").is_none());
    }
}
