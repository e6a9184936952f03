//! ffmpeg-backed encoder.
//!
//! Streams the input through `ffmpeg` over stdin/stdout, producing MP3 at the
//! requested sample rate and channel count. No temporary files are written.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use baatein_core::error::{UpstreamError, UpstreamKind};

use crate::{AudioEncoder, Bitrate, EncodeSpec};

/// Encoder that shells out to an ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: String,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEncoder {
    /// Create an encoder using the given binary name or path.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Command-line arguments for one re-encode.
    pub fn build_args(spec: &EncodeSpec) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            "pipe:0".into(),
            "-vn".into(),
            "-ar".into(),
            spec.sample_rate.to_string(),
            "-ac".into(),
            spec.channels.to_string(),
        ];
        match spec.bitrate {
            Bitrate::Vbr(quality) => {
                args.push("-q:a".into());
                args.push(quality.to_string());
            }
            Bitrate::Cbr(kbps) => {
                args.push("-b:a".into());
                args.push(format!("{}k", kbps));
            }
        }
        args.extend(
            ["-codec:a", "libmp3lame", "-f", "mp3", "pipe:1"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    async fn reencode(&self, input: &[u8], spec: &EncodeSpec) -> Result<Vec<u8>, UpstreamError> {
        if input.is_empty() {
            return Err(UpstreamError::bad_input("Cannot encode empty audio"));
        }

        let mut child = Command::new(&self.binary)
            .args(Self::build_args(spec))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let kind = if e.kind() == std::io::ErrorKind::NotFound {
                    UpstreamKind::NotFound
                } else {
                    UpstreamKind::Unavailable
                };
                UpstreamError::new(kind, format!("Failed to spawn {}: {}", self.binary, e))
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            UpstreamError::new(UpstreamKind::Unavailable, "ffmpeg stdin not captured")
        })?;

        // Feed stdin concurrently with draining stdout, otherwise a full pipe
        // on either side deadlocks the child.
        let payload = input.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&payload).await;
            drop(stdin);
            result
        });

        let output = child.wait_with_output().await.map_err(|e| {
            UpstreamError::new(UpstreamKind::Unavailable, format!("ffmpeg wait failed: {}", e))
        })?;

        let write_result = writer.await.map_err(|e| {
            UpstreamError::new(UpstreamKind::Unavailable, format!("ffmpeg writer panicked: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, stderr = %stderr.trim(), "ffmpeg re-encode failed");
            return Err(UpstreamError::bad_input(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // ffmpeg may stop reading early once it has what it needs.
        if let Err(e) = write_result {
            tracing::debug!(error = %e, "ffmpeg closed stdin before all input was written");
        }

        if output.stdout.is_empty() {
            return Err(UpstreamError::bad_input("ffmpeg produced no audio"));
        }

        tracing::debug!(
            input_bytes = input.len(),
            output_bytes = output.stdout.len(),
            "Voice note re-encoded"
        );
        Ok(output.stdout)
    }
}
