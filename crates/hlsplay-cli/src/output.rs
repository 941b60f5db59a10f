//! Output formatting for CLI

use console::style;
use hlsplay_core::NowPlayingSnapshot;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON, or `{}` if the value cannot be serialized
pub fn to_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// Render a now-playing snapshot
pub fn render_snapshot(snapshot: &NowPlayingSnapshot, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return to_json(snapshot);
    }
    if snapshot.is_empty() {
        return format!("{}", style("Now playing: (empty)").dim());
    }

    let mut lines = vec![format!("{}", style("Now playing").bold())];
    if let Some(title) = &snapshot.title {
        lines.push(format!("  Title:    {}", title));
    }
    if let Some(artwork) = &snapshot.artwork {
        lines.push(format!("  Artwork:  {} bytes", artwork.len()));
    }
    if let Some(rate) = snapshot.playback_rate {
        lines.push(format!("  Rate:     {}", rate));
    }
    if let Some(elapsed) = snapshot.elapsed_playback_time {
        lines.push(format!("  Elapsed:  {}s", elapsed));
    }
    if let Some(duration) = snapshot.playback_duration {
        lines.push(format!("  Duration: {:.1}s", duration));
    }
    if snapshot.is_live_stream == Some(true) {
        lines.push(format!("  {}", style("LIVE").red().bold()));
    }
    lines.join("\n")
}
