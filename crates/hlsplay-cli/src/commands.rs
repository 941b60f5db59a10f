//! CLI command implementations

use crate::output::{render_snapshot, to_json, OutputFormat};
use crate::probe::StreamProbe;
use anyhow::{bail, Context};
use console::style;
use hlsplay_core::engine::sim::{SimulatedEngine, SimulatedMedia};
use hlsplay_core::{
    format_duration, AppLifecycle, Artwork, ChangePlaybackPositionEvent, CommandCenter,
    LifecycleEvent, LifecycleHooks, MediaMetadata, NowPlayingCenter, NowPlayingPublisher,
    NowPlayingSink, PlaybackDelegate, PlaybackSession, RemoteCommand, RemoteCommandBridge,
    RemoteCommandCenter, SessionConfig, TimeDisplay,
};
#[cfg(feature = "os-controls")]
use hlsplay_core::{NowPlayingSnapshot, SystemMediaControls};
use serde_json::json;
use std::path::PathBuf;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};
use url::Url;

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Options for the `play` command
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub url: String,
    pub title: String,
    pub artwork: Option<PathBuf>,
    pub auto_play: bool,
    /// Simulated VOD duration when not probing
    pub duration: f64,
    pub live: bool,
    /// Probe the playlist to shape the simulated media
    pub probe: bool,
    pub seek: Option<f64>,
    pub remote_seek: Option<f64>,
    /// Spend the second half of the run in the background
    pub background: bool,
    pub run_for: u64,
    pub config: Option<PathBuf>,
    pub timing: bool,
    pub os_controls: bool,
}

/// Delegate printing session events to stdout
struct ConsoleDelegate {
    format: OutputFormat,
    total: Mutex<Option<f64>>,
    failure: Mutex<Option<String>>,
    settled: Notify,
}

impl ConsoleDelegate {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            total: Mutex::new(None),
            failure: Mutex::new(None),
            settled: Notify::new(),
        }
    }

    fn display(&self) -> TimeDisplay {
        match *self.total.lock() {
            Some(total) if total.is_finite() && total < 3600.0 => TimeDisplay::Minutes,
            _ => TimeDisplay::Hour,
        }
    }

    fn clock(&self, seconds: f64) -> String {
        format_duration(seconds, self.display())
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }
}

impl PlaybackDelegate for ConsoleDelegate {
    fn ready_to_play(&self) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "event": "ready" })),
            OutputFormat::Text => println!("{}", style("Ready to play").green()),
        }
        self.settled.notify_one();
    }

    fn total_time(&self, seconds: f64) {
        *self.total.lock() = Some(seconds);
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "event": "total_time", "seconds": seconds })),
            OutputFormat::Text if seconds.is_finite() => {
                println!("Duration: {}", self.clock(seconds))
            }
            OutputFormat::Text => println!("Duration: {}", style("live").red()),
        }
    }

    fn update_time(&self, seconds: f64) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "event": "progress", "seconds": seconds })),
            OutputFormat::Text => {
                let total = *self.total.lock();
                match total.filter(|t| t.is_finite()) {
                    Some(total) => println!("  {} / {}", self.clock(seconds), self.clock(total)),
                    None => println!("  {}", self.clock(seconds)),
                }
            }
        }
    }

    fn change_playback_position(&self, seconds: f64) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", json!({ "event": "remote_position", "seconds": seconds }))
            }
            OutputFormat::Text => {
                println!("{} {}", style("Remote seek to").cyan(), self.clock(seconds))
            }
        }
    }

    fn playback_failed(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
        self.settled.notify_one();
    }
}

/// Where now-playing info and remote command targets go
struct Outputs {
    sink: Arc<dyn NowPlayingSink>,
    remote: Arc<dyn RemoteCommandCenter>,
}

/// Writes to the in-process center and the OS surface
#[cfg(feature = "os-controls")]
struct Mirror {
    center: Arc<NowPlayingCenter>,
    system: Arc<SystemMediaControls>,
}

#[cfg(feature = "os-controls")]
impl NowPlayingSink for Mirror {
    fn set_now_playing_info(&self, snapshot: NowPlayingSnapshot) {
        self.system.set_now_playing_info(snapshot.clone());
        self.center.set_now_playing_info(snapshot);
    }
}

fn outputs(
    os_controls: bool,
    center: &Arc<NowPlayingCenter>,
    commands: &Arc<CommandCenter>,
) -> anyhow::Result<Outputs> {
    #[cfg(feature = "os-controls")]
    {
        if os_controls {
            let system = SystemMediaControls::new("hlsplay", Arc::clone(commands))
                .context("Failed to attach OS media controls")?;
            let mirror = Mirror {
                center: Arc::clone(center),
                system: Arc::clone(&system),
            };
            return Ok(Outputs {
                sink: Arc::new(mirror),
                remote: system,
            });
        }
    }
    #[cfg(not(feature = "os-controls"))]
    {
        if os_controls {
            bail!("hlsplay was built without the os-controls feature");
        }
    }

    Ok(Outputs {
        sink: center.clone(),
        remote: commands.clone(),
    })
}

/// Drive a session against the simulated engine
pub async fn play(opts: PlayOptions, format: OutputFormat) -> anyhow::Result<()> {
    let mut config = match &opts.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if opts.timing {
        config.now_playing_timing = true;
    }

    let media = if opts.probe {
        let url = Url::parse(&opts.url)?;
        let report = StreamProbe::new(PROBE_TIMEOUT)?.probe(&url).await?;
        info!(is_live = report.is_live, duration = ?report.duration, "Probed stream");
        report.simulated_media()
    } else if opts.live {
        SimulatedMedia::live()
    } else {
        SimulatedMedia::vod(opts.duration)
    };

    let mut metadata = MediaMetadata::new(opts.title.clone());
    if let Some(path) = &opts.artwork {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read artwork {}", path.display()))?;
        metadata = metadata.with_artwork(Artwork::new(bytes));
    }

    let center = NowPlayingCenter::shared();
    let commands = CommandCenter::shared();
    let outputs = outputs(opts.os_controls, &center, &commands)?;

    let engine = Arc::new(SimulatedEngine::new(media));
    let session = PlaybackSession::new(engine, NowPlayingPublisher::new(outputs.sink), config);
    let delegate = Arc::new(ConsoleDelegate::new(format));
    session.set_delegate(&delegate);

    let _bridge = RemoteCommandBridge::register(outputs.remote, &session);
    let lifecycle = AppLifecycle::new();
    let hooks = LifecycleHooks::spawn(&session, lifecycle.subscribe());

    let surface = session.setup_player(&opts.url, metadata, opts.auto_play)?;
    info!(surface = %surface.id(), session_id = %session.id(), "Render surface ready");

    tokio::time::timeout(READY_TIMEOUT, delegate.settled.notified())
        .await
        .context("Stream did not become ready in time")?;
    if let Some(reason) = delegate.failure() {
        session.stop();
        bail!("Playback failed: {}", reason);
    }
    if !opts.auto_play {
        session.play();
    }

    let run_for = Duration::from_secs(opts.run_for);
    let half = run_for / 2;
    tokio::time::sleep(half).await;

    if let Some(target) = opts.seek {
        session.time_jump(target, true);
    }
    if let Some(target) = opts.remote_seek {
        let status = commands.dispatch(RemoteCommand::ChangePlaybackPosition(
            ChangePlaybackPositionEvent { position_time: target },
        ));
        debug!(?status, "Remote seek dispatched");
    }
    if opts.background {
        lifecycle.post(LifecycleEvent::DidEnterBackground);
    }

    tokio::time::sleep(run_for - half).await;

    if opts.background {
        lifecycle.post(LifecycleEvent::WillEnterForeground);
    }
    session.pause();
    session.publish_now_playing(true);
    println!("{}", render_snapshot(&center.current(), format));

    session.stop();
    drop(lifecycle);
    hooks.await?;
    Ok(())
}

/// Probe a playlist and print what was found
pub async fn probe(url: &str, format: OutputFormat) -> anyhow::Result<()> {
    let url = Url::parse(url)?;
    let report = StreamProbe::new(PROBE_TIMEOUT)?.probe(&url).await?;

    match format {
        OutputFormat::Json => println!("{}", to_json(&report)),
        OutputFormat::Text => {
            println!("Stream: {}", report.url);
            if report.variants > 0 {
                println!("  Variants: {}", report.variants);
                println!("  Probed:   {}", report.media_url);
            }
            println!("  Live:     {}", report.is_live);
            match report.duration {
                Some(duration) => println!(
                    "  Duration: {} ({:.1}s)",
                    format_duration(duration, TimeDisplay::Hour),
                    duration
                ),
                None => println!("  Duration: unknown"),
            }
            println!("  Segments: {} (target {}s)", report.segments, report.target_duration);
        }
    }

    Ok(())
}

/// Print `seconds` as a clock string
pub fn format_time(seconds: f64, display: TimeDisplay) -> anyhow::Result<()> {
    if !seconds.is_finite() {
        bail!("seconds must be a finite number");
    }
    println!("{}", format_duration(seconds, display));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsplay_core::{CommandStatus, RemoteCommandKind};

    #[test]
    fn test_default_outputs_use_in_process_centers() {
        let center = Arc::new(NowPlayingCenter::new());
        let commands = Arc::new(CommandCenter::new());
        let outputs = outputs(false, &center, &commands).unwrap();

        outputs.sink.set_now_playing_info(Default::default());
        assert_eq!(center.revision(), 1);

        let token = outputs
            .remote
            .add_target(RemoteCommandKind::Play, Box::new(|_| CommandStatus::Success));
        assert_eq!(commands.target_count(RemoteCommandKind::Play), 1);
        outputs.remote.remove_target(RemoteCommandKind::Play, token);
        assert_eq!(commands.target_count(RemoteCommandKind::Play), 0);
    }

    #[cfg(not(feature = "os-controls"))]
    #[test]
    fn test_os_controls_need_feature() {
        let center = Arc::new(NowPlayingCenter::new());
        let commands = Arc::new(CommandCenter::new());
        assert!(outputs(true, &center, &commands).is_err());
    }
}
