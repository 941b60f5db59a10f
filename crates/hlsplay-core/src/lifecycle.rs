//! Application lifecycle hooks
//!
//! Backgrounding detaches the render surface (audio keeps playing),
//! foregrounding reattaches it, and every transition refreshes now-playing
//! info.

use crate::session::PlaybackSession;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Application state transitions the session reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    WillEnterForeground,
    DidEnterBackground,
    /// An overlay such as the notification or control center is shown
    WillResignActive,
}

impl PlaybackSession {
    /// Reattach the surface to the live player, then publish
    pub fn on_foreground(&self) {
        {
            let state = self.state();
            if let (Some(surface), Some(player)) = (&state.surface, &state.player) {
                surface.attach(Arc::clone(player));
            }
        }
        debug!(session_id = %self.id(), "Entered foreground");
        self.publish();
    }

    /// Detach the surface from the player, then publish
    pub fn on_background(&self) {
        if let Some(surface) = &self.state().surface {
            surface.detach();
        }
        debug!(session_id = %self.id(), "Entered background");
        self.publish();
    }

    /// Publish only
    pub fn on_resign_active(&self) {
        debug!(session_id = %self.id(), "Resigning active");
        self.publish();
    }

    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::WillEnterForeground => self.on_foreground(),
            LifecycleEvent::DidEnterBackground => self.on_background(),
            LifecycleEvent::WillResignActive => self.on_resign_active(),
        }
    }
}

/// Broadcast source of lifecycle events
#[derive(Clone)]
pub struct AppLifecycle {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl AppLifecycle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Post an event; returns the number of listeners reached
    pub fn post(&self, event: LifecycleEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards lifecycle events to a session
pub struct LifecycleHooks;

impl LifecycleHooks {
    /// Listen on `events` for as long as `session` is alive
    pub fn spawn(
        session: &Arc<PlaybackSession>,
        mut events: broadcast::Receiver<LifecycleEvent>,
    ) -> JoinHandle<()> {
        let session: Weak<PlaybackSession> = Arc::downgrade(session);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        session.handle_lifecycle(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Lifecycle listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Lifecycle listener finished");
        })
    }
}
