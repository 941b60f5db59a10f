//! Remote transport commands
//!
//! Play, pause and scrub requests arriving from outside the app (lock
//! screen, control center, headset) are forwarded to a [`PlaybackSession`].
//! Handlers are best-effort and always report success to the transport.

use crate::engine::ObserverToken;
use crate::session::PlaybackSession;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info};

/// Kinds of remote command a target can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCommandKind {
    Play,
    Pause,
    ChangePlaybackPosition,
}

/// Scrub request carrying an absolute position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangePlaybackPositionEvent {
    /// Requested position in seconds
    pub position_time: f64,
}

/// A remote command as delivered by the transport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RemoteCommand {
    Play,
    Pause,
    ChangePlaybackPosition(ChangePlaybackPositionEvent),
}

impl RemoteCommand {
    pub fn kind(&self) -> RemoteCommandKind {
        match self {
            RemoteCommand::Play => RemoteCommandKind::Play,
            RemoteCommand::Pause => RemoteCommandKind::Pause,
            RemoteCommand::ChangePlaybackPosition(_) => RemoteCommandKind::ChangePlaybackPosition,
        }
    }
}

/// Outcome reported back to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    NoSuchContent,
    CommandFailed,
}

/// Handler invoked for a registered command
pub type CommandHandler = Box<dyn Fn(&RemoteCommand) -> CommandStatus + Send + Sync>;

/// Registry of remote command targets provided by the platform
pub trait RemoteCommandCenter: Send + Sync {
    fn add_target(&self, kind: RemoteCommandKind, handler: CommandHandler) -> ObserverToken;

    fn remove_target(&self, kind: RemoteCommandKind, token: ObserverToken);
}

type SharedHandler = Arc<dyn Fn(&RemoteCommand) -> CommandStatus + Send + Sync>;

/// In-process remote command center
///
/// Hosts feed platform events in through [`CommandCenter::dispatch`].
#[derive(Default)]
pub struct CommandCenter {
    targets: Mutex<HashMap<RemoteCommandKind, Vec<(ObserverToken, SharedHandler)>>>,
    next_token: AtomicU64,
}

impl CommandCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance
    pub fn shared() -> Arc<CommandCenter> {
        static SHARED: OnceLock<Arc<CommandCenter>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(CommandCenter::new())))
    }

    /// Deliver `command` to every target registered for its kind
    ///
    /// Returns the first non-success status, `Success` if all succeeded, or
    /// `NoSuchContent` when nothing is registered.
    pub fn dispatch(&self, command: RemoteCommand) -> CommandStatus {
        let handlers: Vec<SharedHandler> = self
            .targets
            .lock()
            .get(&command.kind())
            .map(|targets| targets.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(?command, "No target for remote command");
            return CommandStatus::NoSuchContent;
        }

        let statuses: Vec<CommandStatus> = handlers.iter().map(|handler| handler(&command)).collect();
        statuses
            .into_iter()
            .find(|status| *status != CommandStatus::Success)
            .unwrap_or(CommandStatus::Success)
    }

    pub fn target_count(&self, kind: RemoteCommandKind) -> usize {
        self.targets.lock().get(&kind).map_or(0, Vec::len)
    }
}

impl RemoteCommandCenter for CommandCenter {
    fn add_target(&self, kind: RemoteCommandKind, handler: CommandHandler) -> ObserverToken {
        let token = ObserverToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.targets
            .lock()
            .entry(kind)
            .or_default()
            .push((token, Arc::from(handler)));
        token
    }

    fn remove_target(&self, kind: RemoteCommandKind, token: ObserverToken) {
        if let Some(targets) = self.targets.lock().get_mut(&kind) {
            targets.retain(|(t, _)| *t != token);
        }
    }
}

/// Routes remote commands to a session
///
/// Holds the session weakly. Targets are removed on [`unregister`] or drop.
///
/// [`unregister`]: RemoteCommandBridge::unregister
pub struct RemoteCommandBridge {
    center: Arc<dyn RemoteCommandCenter>,
    registrations: Vec<(RemoteCommandKind, ObserverToken)>,
}

impl RemoteCommandBridge {
    /// Register pause, play and change-position targets for `session`
    pub fn register(center: Arc<dyn RemoteCommandCenter>, session: &Arc<PlaybackSession>) -> Self {
        let pause = Self::target(session, |session, _| session.pause());
        let play = Self::target(session, |session, _| session.play());
        let seek = Self::target(session, |session, command| {
            if let RemoteCommand::ChangePlaybackPosition(event) = command {
                session.remote_seek(event);
            }
        });

        let registrations = vec![
            (RemoteCommandKind::Pause, center.add_target(RemoteCommandKind::Pause, pause)),
            (RemoteCommandKind::Play, center.add_target(RemoteCommandKind::Play, play)),
            (
                RemoteCommandKind::ChangePlaybackPosition,
                center.add_target(RemoteCommandKind::ChangePlaybackPosition, seek),
            ),
        ];

        info!(session_id = %session.id(), "Remote commands registered");
        Self {
            center,
            registrations,
        }
    }

    fn target<F>(session: &Arc<PlaybackSession>, action: F) -> CommandHandler
    where
        F: Fn(&PlaybackSession, &RemoteCommand) + Send + Sync + 'static,
    {
        let session: Weak<PlaybackSession> = Arc::downgrade(session);
        Box::new(move |command| {
            if let Some(session) = session.upgrade() {
                action(&session, command);
            }
            CommandStatus::Success
        })
    }

    pub fn is_registered(&self) -> bool {
        !self.registrations.is_empty()
    }

    /// Remove all targets. Safe to call repeatedly.
    pub fn unregister(&mut self) {
        for (kind, token) in self.registrations.drain(..) {
            self.center.remove_target(kind, token);
        }
    }
}

impl Drop for RemoteCommandBridge {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl PlaybackSession {
    /// Apply a remote scrub: floor to whole seconds, jump, and let the
    /// delegate resync its UI. Returns the applied position.
    pub fn remote_seek(&self, event: &ChangePlaybackPositionEvent) -> f64 {
        let position = event.position_time.floor();
        debug!(session_id = %self.id(), requested = event.position_time, position, "Remote seek");
        self.time_jump(position, true);
        self.delegate().with(|d| d.change_playback_position(position));
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_dispatch_without_targets() {
        let center = CommandCenter::new();
        assert_eq!(center.dispatch(RemoteCommand::Play), CommandStatus::NoSuchContent);
    }

    #[test]
    fn test_dispatch_reaches_matching_kind_only() {
        let center = CommandCenter::new();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        center.add_target(
            RemoteCommandKind::Pause,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                CommandStatus::Success
            }),
        );

        assert_eq!(center.dispatch(RemoteCommand::Pause), CommandStatus::Success);
        assert_eq!(center.dispatch(RemoteCommand::Play), CommandStatus::NoSuchContent);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_target() {
        let center = CommandCenter::new();
        let token = center.add_target(RemoteCommandKind::Play, Box::new(|_| CommandStatus::Success));
        assert_eq!(center.target_count(RemoteCommandKind::Play), 1);

        center.remove_target(RemoteCommandKind::Play, token);
        assert_eq!(center.target_count(RemoteCommandKind::Play), 0);
    }

    #[test]
    fn test_first_failure_wins() {
        let center = CommandCenter::new();
        center.add_target(RemoteCommandKind::Play, Box::new(|_| CommandStatus::Success));
        center.add_target(RemoteCommandKind::Play, Box::new(|_| CommandStatus::CommandFailed));
        assert_eq!(center.dispatch(RemoteCommand::Play), CommandStatus::CommandFailed);
    }

    #[test]
    fn test_command_json() {
        let command: RemoteCommand = serde_json::from_str(
            r#"{ "command": "change_playback_position", "position_time": 12.7 }"#,
        )
        .unwrap();
        assert_eq!(
            command,
            RemoteCommand::ChangePlaybackPosition(ChangePlaybackPositionEvent { position_time: 12.7 })
        );
        assert_eq!(command.kind(), RemoteCommandKind::ChangePlaybackPosition);
    }
}
