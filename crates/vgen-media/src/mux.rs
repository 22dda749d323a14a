//! Audio/video muxing.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;

/// Lays an audio track over a video clip.
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Duration of a clip in seconds.
    async fn duration(&self, video: &[u8]) -> MediaResult<f64>;

    /// Combine video and audio. The video stream is copied untouched, the audio
    /// is re-encoded, and the result ends with the shorter of the two.
    async fn mux(&self, video: &[u8], audio: &[u8]) -> MediaResult<Vec<u8>>;
}

/// [`Muxer`] backed by the ffmpeg CLI, working in a scratch directory per call.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    work_dir: PathBuf,
    timeout: Duration,
}

impl FfmpegMuxer {
    pub fn new(work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout,
        }
    }

    fn scratch(&self) -> MediaResult<tempfile::TempDir> {
        std::fs::create_dir_all(&self.work_dir)?;
        Ok(tempfile::Builder::new()
            .prefix("vgen-mux-")
            .tempdir_in(&self.work_dir)?)
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new(std::env::temp_dir(), Duration::from_secs(120))
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn duration(&self, video: &[u8]) -> MediaResult<f64> {
        let dir = self.scratch()?;
        let path = dir.path().join("probe.mp4");
        tokio::fs::write(&path, video).await?;
        probe_duration(&path).await
    }

    async fn mux(&self, video: &[u8], audio: &[u8]) -> MediaResult<Vec<u8>> {
        if video.is_empty() {
            return Err(MediaError::invalid_media("empty video input"));
        }
        if audio.is_empty() {
            return Err(MediaError::invalid_media("empty audio input"));
        }

        let dir = self.scratch()?;
        let video_path = dir.path().join("video.mp4");
        let audio_path = dir.path().join("audio.mp3");
        let output_path = dir.path().join("final.mp4");

        tokio::fs::write(&video_path, video).await?;
        tokio::fs::write(&audio_path, audio).await?;

        let cmd = FfmpegCommand::new(&video_path, &output_path)
            .input(&audio_path)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .audio_codec("aac")
            .audio_bitrate("192k")
            .shortest()
            .faststart();

        debug!(video_bytes = video.len(), audio_bytes = audio.len(), "Muxing voice track");
        FfmpegRunner::new()
            .with_timeout(self.timeout)
            .run(&cmd)
            .await?;

        let output = tokio::fs::read(&output_path).await?;
        info!(output_bytes = output.len(), "Muxed voice track");
        Ok(output)
    }
}
