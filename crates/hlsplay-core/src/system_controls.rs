//! OS media controls backend
//!
//! Publishes now-playing snapshots to the platform surface and feeds its
//! transport events back as [`RemoteCommand`]s.
//!
//! - Linux: MPRIS over D-Bus
//! - macOS: MPNowPlayingInfoCenter / MPRemoteCommandCenter
//! - Windows: System Media Transport Controls

use crate::engine::ObserverToken;
use crate::error::{Error, Result};
use crate::now_playing::{NowPlayingSink, NowPlayingSnapshot};
use crate::remote::{
    ChangePlaybackPositionEvent, CommandCenter, CommandHandler, RemoteCommand, RemoteCommandCenter,
    RemoteCommandKind,
};
use parking_lot::Mutex;
use souvlaki::{
    MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, MediaPosition, PlatformConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const DBUS_NAME: &str = "hlsplay";

/// Platform now-playing surface and transport controls
///
/// Transport events are dispatched through the [`CommandCenter`] given at
/// construction; targets added through [`RemoteCommandCenter`] land there too.
pub struct SystemMediaControls {
    controls: Mutex<MediaControls>,
    commands: Arc<CommandCenter>,
    /// Last published playback state, used to resolve toggle events
    playing: Arc<AtomicBool>,
}

impl SystemMediaControls {
    /// Attach to the platform controls under `display_name`
    ///
    /// On Windows this needs a window handle and fails without one.
    pub fn new(display_name: &str, commands: Arc<CommandCenter>) -> Result<Arc<Self>> {
        let config = PlatformConfig {
            dbus_name: DBUS_NAME,
            display_name,
            hwnd: None,
        };
        let mut controls = MediaControls::new(config).map_err(controls_error)?;

        let playing = Arc::new(AtomicBool::new(false));
        let target = Arc::clone(&commands);
        let state = Arc::clone(&playing);
        controls
            .attach(move |event: MediaControlEvent| {
                match command_for(&event, state.load(Ordering::SeqCst)) {
                    Some(command) => {
                        let status = target.dispatch(command);
                        debug!(?event, ?status, "System media control event");
                    }
                    None => trace!(?event, "Unhandled system media control event"),
                }
            })
            .map_err(controls_error)?;

        info!(display_name, "System media controls attached");
        Ok(Arc::new(Self {
            controls: Mutex::new(controls),
            commands,
            playing,
        }))
    }
}

impl NowPlayingSink for SystemMediaControls {
    fn set_now_playing_info(&self, snapshot: NowPlayingSnapshot) {
        self.playing.store(is_playing(&snapshot), Ordering::SeqCst);

        let mut controls = self.controls.lock();
        let result = controls
            .set_metadata(metadata_for(&snapshot))
            .and_then(|_| controls.set_playback(playback_for(&snapshot)));
        if let Err(e) = result {
            warn!(error = ?e, "Failed to update system now-playing info");
        }
    }
}

impl RemoteCommandCenter for SystemMediaControls {
    fn add_target(&self, kind: RemoteCommandKind, handler: CommandHandler) -> ObserverToken {
        self.commands.add_target(kind, handler)
    }

    fn remove_target(&self, kind: RemoteCommandKind, token: ObserverToken) {
        self.commands.remove_target(kind, token);
    }
}

fn controls_error(e: souvlaki::Error) -> Error {
    Error::SystemControls(format!("{:?}", e))
}

/// Live-style snapshots carry no rate and count as playing
fn is_playing(snapshot: &NowPlayingSnapshot) -> bool {
    !snapshot.is_empty() && snapshot.playback_rate != Some(0.0)
}

fn metadata_for(snapshot: &NowPlayingSnapshot) -> MediaMetadata<'_> {
    MediaMetadata {
        title: snapshot.title.as_deref(),
        duration: snapshot
            .playback_duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(Duration::from_secs_f64),
        ..Default::default()
    }
}

fn playback_for(snapshot: &NowPlayingSnapshot) -> MediaPlayback {
    if snapshot.is_empty() {
        return MediaPlayback::Stopped;
    }
    let progress = snapshot
        .elapsed_playback_time
        .map(|secs| MediaPosition(Duration::from_secs(secs)));
    if is_playing(snapshot) {
        MediaPlayback::Playing { progress }
    } else {
        MediaPlayback::Paused { progress }
    }
}

/// Translate a platform event; `playing` resolves play/pause toggles
fn command_for(event: &MediaControlEvent, playing: bool) -> Option<RemoteCommand> {
    match event {
        MediaControlEvent::Play => Some(RemoteCommand::Play),
        MediaControlEvent::Pause => Some(RemoteCommand::Pause),
        MediaControlEvent::Toggle if playing => Some(RemoteCommand::Pause),
        MediaControlEvent::Toggle => Some(RemoteCommand::Play),
        MediaControlEvent::SetPosition(MediaPosition(position)) => Some(
            RemoteCommand::ChangePlaybackPosition(ChangePlaybackPositionEvent {
                position_time: position.as_secs_f64(),
            }),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_events_map_to_commands() {
        assert_eq!(command_for(&MediaControlEvent::Play, false), Some(RemoteCommand::Play));
        assert_eq!(command_for(&MediaControlEvent::Pause, true), Some(RemoteCommand::Pause));
        assert_eq!(command_for(&MediaControlEvent::Toggle, true), Some(RemoteCommand::Pause));
        assert_eq!(command_for(&MediaControlEvent::Toggle, false), Some(RemoteCommand::Play));
        assert_eq!(command_for(&MediaControlEvent::Next, true), None);
    }

    #[test]
    fn test_set_position_keeps_fraction() {
        let event = MediaControlEvent::SetPosition(MediaPosition(Duration::from_millis(12_700)));
        match command_for(&event, true) {
            Some(RemoteCommand::ChangePlaybackPosition(seek)) => {
                assert!((seek.position_time - 12.7).abs() < 1e-9);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_timed_snapshot_maps_to_paused_playback() {
        let snapshot = NowPlayingSnapshot {
            title: Some("Episode 4".into()),
            playback_rate: Some(0.0),
            elapsed_playback_time: Some(7),
            playback_duration: Some(120.0),
            ..Default::default()
        };

        let metadata = metadata_for(&snapshot);
        assert_eq!(metadata.title, Some("Episode 4"));
        assert_eq!(metadata.duration, Some(Duration::from_secs(120)));
        assert!(matches!(
            playback_for(&snapshot),
            MediaPlayback::Paused { progress: Some(MediaPosition(p)) } if p == Duration::from_secs(7)
        ));
    }

    #[test]
    fn test_live_snapshot_maps_to_playing_without_progress() {
        let snapshot = NowPlayingSnapshot {
            title: Some("News".into()),
            is_live_stream: Some(true),
            ..Default::default()
        };

        assert!(is_playing(&snapshot));
        assert_eq!(metadata_for(&snapshot).duration, None);
        assert!(matches!(playback_for(&snapshot), MediaPlayback::Playing { progress: None }));
    }

    #[test]
    fn test_cleared_snapshot_stops() {
        let snapshot = NowPlayingSnapshot::default();
        assert!(!is_playing(&snapshot));
        assert!(matches!(playback_for(&snapshot), MediaPlayback::Stopped));
    }
}
