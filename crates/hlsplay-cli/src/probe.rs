//! HLS playlist probing
//!
//! Fetches a playlist once to learn whether the stream is live and how long
//! it runs. When given a multivariant playlist, the lowest-bandwidth variant
//! is followed.

use anyhow::{anyhow, Context, Result};
use hlsplay_core::engine::sim::SimulatedMedia;
use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// What a probe learned about a stream
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// URL that was probed
    pub url: String,
    /// Media playlist the numbers below come from
    pub media_url: String,
    /// Variants in the multivariant playlist (0 for a plain media playlist)
    pub variants: usize,
    pub is_live: bool,
    /// Total duration for VOD
    pub duration: Option<f64>,
    pub target_duration: f64,
    pub segments: usize,
}

impl ProbeReport {
    /// Simulated media with the probed shape
    pub fn simulated_media(&self) -> SimulatedMedia {
        match (self.is_live, self.duration) {
            (false, Some(duration)) => SimulatedMedia::vod(duration),
            _ => SimulatedMedia::live(),
        }
    }
}

/// Media playlist summary
#[derive(Debug, Clone, PartialEq)]
struct MediaSummary {
    is_live: bool,
    duration: Option<f64>,
    target_duration: f64,
    segments: usize,
}

fn summarize_media(media: &MediaPlaylist) -> MediaSummary {
    let is_live = !media.end_list;
    let duration = if media.end_list {
        Some(media.segments.iter().map(|s| s.duration as f64).sum())
    } else {
        None
    };

    MediaSummary {
        is_live,
        duration,
        target_duration: media.target_duration as f64,
        segments: media.segments.len(),
    }
}

/// Lowest-bandwidth playable variant
fn pick_variant(master: &MasterPlaylist) -> Option<&str> {
    master
        .variants
        .iter()
        .filter(|v| !v.is_i_frame)
        .min_by_key(|v| v.bandwidth)
        .map(|v| v.uri.as_str())
}

/// Playlist prober
pub struct StreamProbe {
    client: Client,
}

impl StreamProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &Url) -> Result<Playlist> {
        let bytes = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch playlist: {}", url))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read playlist: {}", url))?;

        m3u8_rs::parse_playlist_res(&bytes)
            .map_err(|e| anyhow!("Failed to parse playlist {}: {:?}", url, e))
    }

    /// Probe `url`, following one level of variant indirection
    #[instrument(skip(self))]
    pub async fn probe(&self, url: &Url) -> Result<ProbeReport> {
        let (media_url, media, variants) = match self.fetch(url).await? {
            Playlist::MediaPlaylist(media) => (url.clone(), media, 0),
            Playlist::MasterPlaylist(master) => {
                let uri = pick_variant(&master)
                    .ok_or_else(|| anyhow!("Multivariant playlist has no playable variants"))?;
                let media_url = url.join(uri).context("Invalid variant URI")?;
                debug!(variant = %media_url, variants = master.variants.len(), "Following variant");

                match self.fetch(&media_url).await? {
                    Playlist::MediaPlaylist(media) => (media_url, media, master.variants.len()),
                    Playlist::MasterPlaylist(_) => {
                        return Err(anyhow!("Variant {} is not a media playlist", media_url));
                    }
                }
            }
        };

        let summary = summarize_media(&media);
        Ok(ProbeReport {
            url: url.to_string(),
            media_url: media_url.to_string(),
            variants,
            is_live: summary.is_live,
            duration: summary.duration,
            target_duration: summary.target_duration,
            segments: summary.segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOD: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:6.0,
seg0.ts
#EXTINF:6.0,
seg1.ts
#EXTINF:4.5,
seg2.ts
#EXT-X-ENDLIST
";

    const LIVE: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:4
#EXT-X-MEDIA-SEQUENCE:120
#EXTINF:4.0,
seg120.ts
#EXTINF:4.0,
seg121.ts
";

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720
hi/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
lo/index.m3u8
";

    #[test]
    fn test_summarize_vod() {
        let media = m3u8_rs::parse_media_playlist_res(VOD.as_bytes()).unwrap();
        let summary = summarize_media(&media);
        assert!(!summary.is_live);
        assert_eq!(summary.duration, Some(16.5));
        assert_eq!(summary.target_duration, 6.0);
        assert_eq!(summary.segments, 3);
    }

    #[test]
    fn test_summarize_live() {
        let media = m3u8_rs::parse_media_playlist_res(LIVE.as_bytes()).unwrap();
        let summary = summarize_media(&media);
        assert!(summary.is_live);
        assert_eq!(summary.duration, None);
        assert_eq!(summary.segments, 2);
    }

    #[test]
    fn test_pick_lowest_variant() {
        let master = m3u8_rs::parse_master_playlist_res(MASTER.as_bytes()).unwrap();
        assert_eq!(pick_variant(&master), Some("lo/index.m3u8"));
    }

    #[test]
    fn test_report_to_simulated_media() {
        let report = ProbeReport {
            url: "https://example.com/a.m3u8".into(),
            media_url: "https://example.com/a.m3u8".into(),
            variants: 0,
            is_live: false,
            duration: Some(16.5),
            target_duration: 6.0,
            segments: 3,
        };
        assert_eq!(report.simulated_media().duration, Some(16.5));

        let live = ProbeReport {
            is_live: true,
            duration: None,
            ..report
        };
        assert_eq!(live.simulated_media().duration, None);
    }
}
