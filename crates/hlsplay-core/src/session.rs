//! Playback Session - lifecycle of a single streaming session
//!
//! Coordinates:
//! - Player creation and item loading
//! - One-shot readiness observation
//! - Periodic progress reporting to the delegate
//! - Play/pause/seek requests (fire-and-forget)
//! - Now-playing publishing and teardown

use crate::{
    delegate::{DelegateSlot, PlaybackDelegate},
    engine::{ItemStatus, MediaPlayer, ObserverToken, PlayerFactory, StatusHandler},
    now_playing::{NowPlayingPublisher, NowPlayingSnapshot},
    surface::RenderSurface,
    types::*,
    Error,
    Result,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

/// Mutable session fields, guarded by one lock
pub(crate) struct SessionState {
    pub(crate) player: Option<Arc<dyn MediaPlayer>>,
    pub(crate) surface: Option<RenderSurface>,
    url: Option<Url>,
    metadata: MediaMetadata,
    readiness: Readiness,
    readiness_observer: Option<ObserverToken>,
    periodic_observer: Option<ObserverToken>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            player: None,
            surface: None,
            url: None,
            metadata: MediaMetadata::default(),
            readiness: Readiness::Idle,
            readiness_observer: None,
            periodic_observer: None,
        }
    }

    fn transition(&mut self, target: Readiness) -> bool {
        if !self.readiness.can_transition_to(target) {
            return false;
        }
        self.readiness = target;
        if target.is_terminal() {
            self.disarm_readiness();
        }
        true
    }

    fn disarm_readiness(&mut self) {
        if let (Some(token), Some(player)) = (self.readiness_observer.take(), &self.player) {
            player.remove_status_observer(token);
        }
    }

    fn disarm_progress(&mut self) {
        if let (Some(token), Some(player)) = (self.periodic_observer.take(), &self.player) {
            player.remove_time_observer(token);
        }
    }

    /// Pause and release the player. Subscriptions go first so no callback
    /// can reach a released player.
    fn teardown(&mut self) -> bool {
        let Some(player) = self.player.clone() else {
            return false;
        };
        player.pause();
        self.disarm_progress();
        self.disarm_readiness();
        if let Some(surface) = self.surface.take() {
            surface.detach();
        }
        self.player = None;
        self.readiness = Readiness::Idle;
        true
    }
}

/// A single HLS playback session
///
/// Always lives in an `Arc`; engine callbacks hold it weakly. Mutating calls
/// are expected from the engine's callback context.
pub struct PlaybackSession {
    /// Unique session ID
    id: SessionId,
    /// Session configuration
    config: SessionConfig,
    /// Source of platform players
    factory: Arc<dyn PlayerFactory>,
    /// Now-playing output
    publisher: NowPlayingPublisher,
    /// Weak delegate
    delegate: DelegateSlot,
    state: Mutex<SessionState>,
    /// Bumped on every setup and stop; callbacks from older generations are ignored
    generation: AtomicU64,
    this: Weak<PlaybackSession>,
}

impl PlaybackSession {
    /// Create a new session
    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        publisher: NowPlayingPublisher,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: SessionId::new(),
            config,
            factory,
            publisher,
            delegate: DelegateSlot::default(),
            state: Mutex::new(SessionState::new()),
            generation: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Register the delegate. The session only keeps a weak reference.
    pub fn set_delegate<D: PlaybackDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak = Arc::downgrade(delegate);
        self.delegate.set(weak);
    }

    pub fn clear_delegate(&self) {
        self.delegate.clear();
    }

    pub(crate) fn delegate(&self) -> &DelegateSlot {
        &self.delegate
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    /// Load `url` into a fresh player and return its render surface.
    ///
    /// Fails with [`Error::InvalidUrl`] without touching the current session
    /// when `url` is not an absolute URL with a host. Any previous player is
    /// torn down first. With `auto_play`, playback is requested right away;
    /// the engine buffers until the item is ready.
    #[instrument(skip(self, metadata), fields(session_id = %self.id))]
    pub fn setup_player(
        &self,
        url: &str,
        metadata: MediaMetadata,
        auto_play: bool,
    ) -> Result<RenderSurface> {
        let url = parse_media_url(url).inspect_err(|e| {
            warn!(code = e.error_code(), error = %e, "Rejected media URL");
        })?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let player = self.factory.create_player();

        let surface = {
            let mut state = self.state();
            if state.teardown() {
                debug!("Replaced previous player");
            }

            player.replace_current_item(&url);
            let surface = RenderSurface::bind(Arc::clone(&player));
            let token = player.observe_status(self.status_handler(generation));

            state.player = Some(player);
            state.surface = Some(surface.clone());
            state.url = Some(url.clone());
            state.metadata = metadata;
            state.readiness_observer = Some(token);
            state.transition(Readiness::Loading);
            surface
        };

        info!(url = %url, auto_play, "Player set up");

        if auto_play {
            self.play();
        }

        Ok(surface)
    }

    /// Start or resume playback
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn play(&self) {
        let Some(player) = self.player() else {
            debug!("Play requested without a player");
            return;
        };
        player.play();
        self.publish();
    }

    /// Pause playback
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn pause(&self) {
        let Some(player) = self.player() else {
            debug!("Pause requested without a player");
            return;
        };
        player.pause();
        self.publish();
    }

    /// Stop playback and release the player. Safe to call repeatedly.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.state().teardown() {
            info!("Stopping playback");
        }
        self.publisher.clear();
    }

    /// Seek exactly to the whole second `target_seconds`, then optionally resume
    ///
    /// The seek is only requested; completion is not awaited.
    pub fn time_jump(&self, target_seconds: f64, auto_play: bool) {
        let Some(player) = self.player() else {
            debug!(target_seconds, "Time jump without a player");
            return;
        };
        let target = target_seconds.trunc();
        debug!(session_id = %self.id, target, auto_play, "Time jump");
        player.seek(target);
        if auto_play {
            player.play();
        }
    }

    /// Publish now-playing info with an explicit mode
    ///
    /// `live_mode` includes rate, elapsed time and duration; otherwise the item
    /// is published as a live stream without timing.
    pub fn publish_now_playing(&self, live_mode: bool) -> Option<NowPlayingSnapshot> {
        let (player, metadata) = {
            let state = self.state();
            (state.player.clone(), state.metadata.clone())
        };
        self.publisher.publish(&metadata, player.as_deref(), live_mode)
    }

    /// Publish now-playing info in the configured mode
    pub(crate) fn publish(&self) -> Option<NowPlayingSnapshot> {
        self.publish_now_playing(self.config.now_playing_timing)
    }

    pub fn readiness(&self) -> Readiness {
        self.state().readiness
    }

    /// Surface of the current player
    pub fn surface(&self) -> Option<RenderSurface> {
        self.state().surface.clone()
    }

    pub fn url(&self) -> Option<Url> {
        self.state().url.clone()
    }

    pub fn title(&self) -> String {
        self.state().metadata.title.clone()
    }

    /// True while a player is loaded
    pub fn is_active(&self) -> bool {
        self.state().player.is_some()
    }

    /// Current position in seconds
    pub fn current_time(&self) -> Option<f64> {
        self.player().map(|p| p.current_time())
    }

    /// Item duration in seconds, once known
    pub fn duration(&self) -> Option<f64> {
        self.player().and_then(|p| p.duration())
    }

    pub(crate) fn player(&self) -> Option<Arc<dyn MediaPlayer>> {
        self.state().player.clone()
    }

    fn status_handler(&self, generation: u64) -> StatusHandler {
        let session = self.this.clone();
        Box::new(move |status| {
            if let Some(session) = session.upgrade() {
                session.handle_item_status(generation, status);
            }
        })
    }

    fn handle_item_status(&self, generation: u64, status: ItemStatus) {
        match status {
            ItemStatus::Unknown => {
                let error = Error::UnknownStatus;
                debug!(
                    session_id = %self.id,
                    code = error.error_code(),
                    recoverable = error.is_recoverable(),
                    "Item status unknown, still waiting"
                );
            }
            ItemStatus::ReadyToPlay => {
                let duration = {
                    let mut state = self.state();
                    if !self.is_current(generation) || !state.transition(Readiness::Ready) {
                        return;
                    }
                    self.arm_progress(&mut state, generation);
                    state.player.as_ref().and_then(|p| p.duration())
                };

                info!(session_id = %self.id, duration = ?duration, "Ready to play");
                self.delegate.with(|d| d.ready_to_play());
                // The delegate may have stopped or replaced the session
                if !self.is_current(generation) {
                    return;
                }
                self.delegate.with(|d| d.total_time(duration.unwrap_or(f64::NAN)));
            }
            ItemStatus::Failed(reason) => {
                if !self.is_current(generation) || !self.state().transition(Readiness::Failed) {
                    return;
                }

                let error = Error::PlaybackFailed(reason.clone());
                warn!(session_id = %self.id, code = error.error_code(), error = %error, "Item failed");
                self.delegate.with(|d| d.playback_failed(&reason));
            }
        }
    }

    /// Register the periodic progress observer, replacing any existing one
    fn arm_progress(&self, state: &mut SessionState, generation: u64) {
        state.disarm_progress();
        let Some(player) = state.player.clone() else {
            return;
        };

        let session = self.this.clone();
        let token = player.add_periodic_time_observer(
            self.config.progress_interval(),
            Box::new(move |time| {
                if let Some(session) = session.upgrade() {
                    session.handle_tick(generation, time);
                }
            }),
        );
        state.periodic_observer = Some(token);
    }

    fn handle_tick(&self, generation: u64, time: f64) {
        if !self.is_current(generation) {
            return;
        }
        let seconds = time.floor();
        trace!(session_id = %self.id, seconds, "Progress");
        self.delegate.with(|d| d.update_time(seconds));
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    #[cfg(test)]
    fn observer_counts(&self) -> (bool, bool) {
        let state = self.state();
        (state.readiness_observer.is_some(), state.periodic_observer.is_some())
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.state.lock().teardown();
    }
}

/// Parse a media URL; it must be absolute and have a host (`file` excepted)
fn parse_media_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e))?;
    if url.scheme() != "file" && !url.has_host() {
        return Err(Error::invalid_url(raw, "missing host"));
    }
    Ok(url)
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::engine::sim::{SimulatedEngine, SimulatedMedia};
    use crate::now_playing::NowPlayingCenter;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl PlaybackDelegate for Recorder {
        fn ready_to_play(&self) {
            self.events.lock().push("ready".into());
        }
        fn total_time(&self, seconds: f64) {
            self.events.lock().push(format!("total:{}", seconds));
        }
        fn update_time(&self, seconds: f64) {
            self.events.lock().push(format!("tick:{}", seconds));
        }
        fn change_playback_position(&self, seconds: f64) {
            self.events.lock().push(format!("position:{}", seconds));
        }
        fn playback_failed(&self, reason: &str) {
            self.events.lock().push(format!("failed:{}", reason));
        }
    }

    /// Stops the session as soon as it becomes ready
    #[derive(Default)]
    struct StopOnReady {
        session: Mutex<Weak<PlaybackSession>>,
        recorder: Recorder,
    }

    impl PlaybackDelegate for StopOnReady {
        fn ready_to_play(&self) {
            self.recorder.ready_to_play();
            if let Some(session) = self.session.lock().upgrade() {
                session.stop();
            }
        }
        fn total_time(&self, seconds: f64) {
            self.recorder.total_time(seconds);
        }
        fn update_time(&self, seconds: f64) {
            self.recorder.update_time(seconds);
        }
        fn change_playback_position(&self, seconds: f64) {
            self.recorder.change_playback_position(seconds);
        }
    }

    fn session(media: SimulatedMedia) -> (Arc<PlaybackSession>, Arc<SimulatedEngine>) {
        let engine = Arc::new(SimulatedEngine::new(media));
        let publisher = NowPlayingPublisher::new(Arc::new(NowPlayingCenter::new()));
        let session = PlaybackSession::new(engine.clone(), publisher, SessionConfig::default());
        (session, engine)
    }

    #[test]
    fn test_parse_media_url() {
        assert!(parse_media_url("https://cdn.example.com/master.m3u8").is_ok());
        assert!(parse_media_url("file:///tmp/local.m3u8").is_ok());

        for bad in ["", "not a url", "cdn.example.com/master.m3u8", "mailto:someone", "data:text/plain,x"] {
            let err = parse_media_url(bad).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_URL", "accepted {:?}", bad);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_creation() {
        let (session, engine) = session(SimulatedMedia::default());
        assert_eq!(session.readiness(), Readiness::Idle);
        assert!(!session.is_active());
        assert!(session.surface().is_none());
        assert_eq!(engine.players_created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_url_leaves_session_untouched() {
        let (session, engine) = session(SimulatedMedia::default());
        session
            .setup_player("https://example.com/a.m3u8", MediaMetadata::new("a"), false)
            .unwrap();

        assert!(session.setup_player("", MediaMetadata::new("b"), true).is_err());
        assert_eq!(engine.players_created(), 1);
        assert_eq!(session.title(), "a");
        assert!(session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_observer_is_one_shot() {
        let (session, engine) = session(SimulatedMedia::vod(90.0));
        let recorder = Arc::new(Recorder::default());
        session.set_delegate(&recorder);

        session
            .setup_player("https://example.com/a.m3u8", MediaMetadata::default(), false)
            .unwrap();
        assert_eq!(session.readiness(), Readiness::Loading);
        assert_eq!(session.observer_counts(), (true, false));

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(session.readiness(), Readiness::Ready);
        assert_eq!(session.observer_counts(), (false, true));
        let player = engine.last_player().unwrap();
        assert_eq!(player.active_status_observers(), 0);
        assert_eq!(player.active_time_observers(), 1);
        assert_eq!(recorder.events(), vec!["ready".to_string(), "total:90".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_item_detaches_observer_and_notifies() {
        let (session, engine) = session(SimulatedMedia::vod(90.0).failing("403 Forbidden"));
        let recorder = Arc::new(Recorder::default());
        session.set_delegate(&recorder);

        session
            .setup_player("https://example.com/a.m3u8", MediaMetadata::default(), true)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(session.readiness(), Readiness::Failed);
        assert_eq!(session.observer_counts(), (false, false));
        assert_eq!(engine.last_player().unwrap().active_status_observers(), 0);
        assert_eq!(recorder.events(), vec!["failed:403 Forbidden".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_keeps_waiting() {
        let (session, _engine) = session(SimulatedMedia::vod(90.0).stalling());
        let recorder = Arc::new(Recorder::default());
        session.set_delegate(&recorder);

        session
            .setup_player("https://example.com/a.m3u8", MediaMetadata::default(), true)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(session.readiness(), Readiness::Loading);
        assert_eq!(session.observer_counts(), (true, false));
        assert!(recorder.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_replaces_previous_player() {
        let (session, engine) = session(SimulatedMedia::vod(90.0));
        let first = session
            .setup_player("https://example.com/a.m3u8", MediaMetadata::new("a"), true)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let first_player = engine.last_player().unwrap();

        let second = session
            .setup_player("https://example.com/b.m3u8", MediaMetadata::new("b"), true)
            .unwrap();

        assert!(!first.is_attached());
        assert!(second.is_attached());
        assert!(!first.same_surface(&second));
        assert!(!first_player.is_playing());
        assert_eq!(first_player.active_time_observers(), 0);
        assert_eq!(first_player.active_status_observers(), 0);
        assert_eq!(session.title(), "b");
        assert_eq!(session.readiness(), Readiness::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_delegate_is_tolerated() {
        let (session, _engine) = session(SimulatedMedia::vod(90.0));
        let recorder = Arc::new(Recorder::default());
        session.set_delegate(&recorder);
        drop(recorder);

        session
            .setup_player("https://example.com/a.m3u8", MediaMetadata::default(), true)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(session.readiness(), Readiness::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_ready_suppresses_total_time() {
        let (session, engine) = session(SimulatedMedia::vod(90.0));
        let delegate = Arc::new(StopOnReady::default());
        *delegate.session.lock() = Arc::downgrade(&session);
        session.set_delegate(&delegate);

        session
            .setup_player("https://example.com/a.m3u8", MediaMetadata::default(), true)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(delegate.recorder.events(), vec!["ready".to_string()]);
        assert_eq!(session.readiness(), Readiness::Idle);
        assert!(!session.is_active());
        let player = engine.last_player().unwrap();
        assert_eq!(player.active_time_observers(), 0);
        assert_eq!(player.active_status_observers(), 0);
    }
}
