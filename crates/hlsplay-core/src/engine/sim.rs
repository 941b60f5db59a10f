//! Simulated media engine
//!
//! Drives item status and playback time from the tokio clock, so sessions
//! can be exercised without a platform player. Needs a running tokio
//! runtime; under `tokio::time::pause` it is fully deterministic.

use super::{
    ItemStatus, MediaPlayer, ObserverToken, PlayerFactory, StatusHandler, TimeControlStatus,
    TimeHandler,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

/// How a simulated item finishes loading
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Becomes ready to play
    Ready,
    /// Fails with the given reason
    Fail(String),
    /// Reports `Unknown` and never settles
    Stall,
}

/// Description of the media every simulated player serves
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    /// Total duration, `None` for a live stream
    pub duration: Option<f64>,
    /// Time between loading an item and its final status
    pub load_delay: Duration,
    pub outcome: LoadOutcome,
}

impl SimulatedMedia {
    /// On-demand item of `duration` seconds
    pub fn vod(duration: f64) -> Self {
        Self {
            duration: Some(duration),
            load_delay: Duration::from_millis(200),
            outcome: LoadOutcome::Ready,
        }
    }

    /// Live item without a duration
    pub fn live() -> Self {
        Self {
            duration: None,
            load_delay: Duration::from_millis(200),
            outcome: LoadOutcome::Ready,
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.outcome = LoadOutcome::Fail(reason.into());
        self
    }

    pub fn stalling(mut self) -> Self {
        self.outcome = LoadOutcome::Stall;
        self
    }
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self::vod(60.0)
    }
}

/// Factory producing [`SimulatedPlayer`]s
///
/// Keeps every player it created so tests can inspect them after the
/// session let go.
pub struct SimulatedEngine {
    media: SimulatedMedia,
    players: Mutex<Vec<Arc<SimulatedPlayer>>>,
}

impl SimulatedEngine {
    pub fn new(media: SimulatedMedia) -> Self {
        Self {
            media,
            players: Mutex::new(Vec::new()),
        }
    }

    /// Most recently created player
    pub fn last_player(&self) -> Option<Arc<SimulatedPlayer>> {
        self.players.lock().last().cloned()
    }

    pub fn players_created(&self) -> usize {
        self.players.lock().len()
    }
}

impl PlayerFactory for SimulatedEngine {
    fn create_player(&self) -> Arc<dyn MediaPlayer> {
        let player = Arc::new(SimulatedPlayer::new(self.media.clone()));
        self.players.lock().push(Arc::clone(&player));
        debug!(players = self.players_created(), "Simulated player created");
        player
    }
}

type SharedStatusHandler = Arc<dyn Fn(ItemStatus) + Send + Sync>;

struct PlayerState {
    item: Option<Url>,
    status: ItemStatus,
    playing: bool,
    /// Position at `anchor`, or the frozen position when not advancing
    base_position: f64,
    /// Clock reading when time last started advancing
    anchor: Option<Instant>,
    status_observers: HashMap<ObserverToken, SharedStatusHandler>,
    time_observers: HashMap<ObserverToken, JoinHandle<()>>,
    load_task: Option<JoinHandle<()>>,
    seeks: Vec<f64>,
}

impl PlayerState {
    fn position(&self, duration: Option<f64>) -> f64 {
        let position = match self.anchor {
            Some(anchor) => self.base_position + anchor.elapsed().as_secs_f64(),
            None => self.base_position,
        };
        match duration {
            Some(total) => position.min(total),
            None => position,
        }
    }

    fn is_ready(&self) -> bool {
        self.status == ItemStatus::ReadyToPlay
    }

    fn start_clock(&mut self) {
        if self.anchor.is_none() {
            self.anchor = Some(Instant::now());
        }
    }

    fn freeze_clock(&mut self, duration: Option<f64>) {
        self.base_position = self.position(duration);
        self.anchor = None;
    }
}

/// Player whose time advances with the tokio clock
pub struct SimulatedPlayer {
    media: SimulatedMedia,
    state: Arc<Mutex<PlayerState>>,
    next_token: AtomicU64,
}

impl SimulatedPlayer {
    fn new(media: SimulatedMedia) -> Self {
        Self {
            media,
            state: Arc::new(Mutex::new(PlayerState {
                item: None,
                status: ItemStatus::Unknown,
                playing: false,
                base_position: 0.0,
                anchor: None,
                status_observers: HashMap::new(),
                time_observers: HashMap::new(),
                load_task: None,
                seeks: Vec::new(),
            })),
            next_token: AtomicU64::new(1),
        }
    }

    fn token(&self) -> ObserverToken {
        ObserverToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// URL of the current item
    pub fn item(&self) -> Option<Url> {
        self.state.lock().item.clone()
    }

    pub fn status(&self) -> ItemStatus {
        self.state.lock().status.clone()
    }

    /// True if playback has been requested and not paused since
    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn active_status_observers(&self) -> usize {
        self.state.lock().status_observers.len()
    }

    pub fn active_time_observers(&self) -> usize {
        self.state.lock().time_observers.len()
    }

    /// Every seek request issued so far
    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().seeks.clone()
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn replace_current_item(&self, url: &Url) {
        let mut state = self.state.lock();
        if let Some(task) = state.load_task.take() {
            task.abort();
        }
        state.item = Some(url.clone());
        state.status = ItemStatus::Unknown;
        state.base_position = 0.0;
        state.anchor = None;

        let shared = Arc::clone(&self.state);
        let media = self.media.clone();
        state.load_task = Some(tokio::spawn(async move {
            tokio::time::sleep(media.load_delay).await;

            let status = match &media.outcome {
                LoadOutcome::Ready => ItemStatus::ReadyToPlay,
                LoadOutcome::Fail(reason) => ItemStatus::Failed(reason.clone()),
                LoadOutcome::Stall => ItemStatus::Unknown,
            };

            let handlers: Vec<SharedStatusHandler> = {
                let mut state = shared.lock();
                state.status = status.clone();
                if state.is_ready() && state.playing {
                    state.start_clock();
                }
                state.load_task = None;
                state.status_observers.values().cloned().collect()
            };

            debug!(?status, observers = handlers.len(), "Simulated item settled");
            for handler in handlers {
                handler(status.clone());
            }
        }));
    }

    fn observe_status(&self, handler: StatusHandler) -> ObserverToken {
        let token = self.token();
        self.state
            .lock()
            .status_observers
            .insert(token, Arc::from(handler));
        token
    }

    fn remove_status_observer(&self, token: ObserverToken) {
        self.state.lock().status_observers.remove(&token);
    }

    fn play(&self) {
        let mut state = self.state.lock();
        state.playing = true;
        if state.is_ready() {
            state.start_clock();
        }
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.freeze_clock(self.media.duration);
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.state.lock();
        let target = match self.media.duration {
            Some(total) => seconds.clamp(0.0, total),
            None => seconds.max(0.0),
        };
        state.seeks.push(seconds);
        state.base_position = target;
        if state.anchor.is_some() {
            state.anchor = Some(Instant::now());
        }
        trace!(target, "Simulated seek");
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position(self.media.duration)
    }

    fn duration(&self) -> Option<f64> {
        let state = self.state.lock();
        if state.is_ready() {
            self.media.duration
        } else {
            None
        }
    }

    fn time_control_status(&self) -> TimeControlStatus {
        let state = self.state.lock();
        let at_end = self
            .media
            .duration
            .is_some_and(|total| state.position(Some(total)) >= total);
        match (state.playing, state.is_ready()) {
            (true, true) if !at_end => TimeControlStatus::Playing,
            (true, false) => TimeControlStatus::WaitingToPlay,
            _ => TimeControlStatus::Paused,
        }
    }

    fn add_periodic_time_observer(&self, interval: Duration, handler: TimeHandler) -> ObserverToken {
        let token = self.token();
        let shared = Arc::clone(&self.state);
        let duration = self.media.duration;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let position = {
                    let state = shared.lock();
                    if state.anchor.is_none() {
                        continue;
                    }
                    state.position(duration)
                };
                handler(position);
            }
        });

        self.state.lock().time_observers.insert(token, task);
        token
    }

    fn remove_time_observer(&self, token: ObserverToken) {
        if let Some(task) = self.state.lock().time_observers.remove(&token) {
            task.abort();
        }
    }
}

impl Drop for SimulatedPlayer {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(task) = state.load_task.take() {
            task.abort();
        }
        for (_, task) in state.time_observers.drain() {
            task.abort();
        }
    }
}
