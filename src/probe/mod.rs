//! Audio stream probing via `ffprobe`.
//!
//! This module shells out to `ffprobe` (part of FFmpeg) and parses its JSON
//! report into [`StreamFacts`]. The child process is bounded by a deadline and
//! killed if it overruns, so a hung analyser cannot stall a scan.
//!
//! Install ffprobe:
//! - Windows: `winget install Gyan.FFmpeg`
//! - macOS: `brew install ffmpeg`
//! - Linux: `apt install ffmpeg` or equivalent

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default per-file probe deadline.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream-level facts for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFacts {
    /// Whole seconds, truncated
    pub duration_secs: u64,
    /// Kilobits per second
    pub bit_rate_kbps: u32,
    /// Hz
    pub sample_rate: u32,
    pub bit_depth: u32,
    pub channels: u32,
}

/// Errors from probing a file.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("failed to parse probe output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no audio stream found")]
    NoAudioStream,
}

/// Capability to probe the audio stream of a file within a deadline.
#[async_trait]
pub trait AudioProber: Send + Sync {
    async fn probe(&self, path: &Path, deadline: Duration) -> Result<StreamFacts, ProbeError>;
}

/// [`AudioProber`] that runs the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl AudioProber for FfprobeProber {
    async fn probe(&self, path: &Path, deadline: Duration) -> Result<StreamFacts, ProbeError> {
        let child = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProbeError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        // Dropping the output future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::Timeout(deadline))?
            .map_err(|source| ProbeError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Failed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the JSON output from `ffprobe -show_format -show_streams`.
///
/// ffprobe reports most numbers as strings. Duration is truncated to whole
/// seconds and the bit rate converted from bit/s to kbit/s by integer division.
/// Stream facts come from the first audio stream.
pub fn parse_ffprobe_json(json: &str) -> Result<StreamFacts, ProbeError> {
    let parsed: FfprobeOutput = serde_json::from_str(json)?;

    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let Some(audio) = audio else {
        return Err(ProbeError::NoAudioStream);
    };

    let duration_secs = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.trunc() as u64)
        .unwrap_or(0);

    let bit_rate_kbps = parse_num(parsed.format.bit_rate.as_deref())
        .map(|bps| (bps / 1000) as u32)
        .unwrap_or(0);

    let bit_depth = parse_num(audio.bits_per_raw_sample.as_deref())
        .filter(|b| *b > 0)
        .or(audio.bits_per_sample.map(u64::from))
        .unwrap_or(0) as u32;

    Ok(StreamFacts {
        duration_secs,
        bit_rate_kbps,
        sample_rate: parse_num(audio.sample_rate.as_deref()).unwrap_or(0) as u32,
        bit_depth,
        channels: audio.channels.unwrap_or(0),
    })
}

fn parse_num(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// ffprobe JSON output structure (only the fields we read)
#[derive(Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    sample_rate: Option<String>,
    bits_per_raw_sample: Option<String>,
    bits_per_sample: Option<u32>,
    channels: Option<u32>,
}

#[derive(Deserialize, Default)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAC_REPORT: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "flac",
                "codec_type": "audio",
                "sample_rate": "44100",
                "channels": 2,
                "bits_per_sample": 0,
                "bits_per_raw_sample": "16"
            }
        ],
        "format": {
            "filename": "song.flac",
            "duration": "245.700000",
            "bit_rate": "320000"
        }
    }"#;

    #[test]
    fn test_parse_ffprobe_json() {
        let facts = parse_ffprobe_json(FLAC_REPORT).unwrap();
        assert_eq!(
            facts,
            StreamFacts {
                duration_secs: 245,
                bit_rate_kbps: 320,
                sample_rate: 44100,
                bit_depth: 16,
                channels: 2,
            }
        );
    }

    #[test]
    fn test_parse_skips_non_audio_streams() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "channels": 0},
                {"codec_type": "audio", "sample_rate": "48000", "channels": 1, "bits_per_sample": 24}
            ],
            "format": {"duration": "10.99"}
        }"#;
        let facts = parse_ffprobe_json(json).unwrap();
        assert_eq!(facts.duration_secs, 10);
        assert_eq!(facts.sample_rate, 48000);
        assert_eq!(facts.channels, 1);
        assert_eq!(facts.bit_depth, 24);
        assert_eq!(facts.bit_rate_kbps, 0);
    }

    #[test]
    fn test_parse_no_audio_stream() {
        let json = r#"{"streams": [{"codec_type": "video"}], "format": {}}"#;
        assert!(matches!(
            parse_ffprobe_json(json),
            Err(ProbeError::NoAudioStream)
        ));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_ffprobe_json("not json"),
            Err(ProbeError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let prober = FfprobeProber::new("/nonexistent/bin/ffprobe");
        let result = prober
            .probe(Path::new("/nonexistent/file.mp3"), DEFAULT_PROBE_TIMEOUT)
            .await;
        assert!(matches!(result, Err(ProbeError::Spawn { .. })));
    }

    /// Write an executable shell script standing in for ffprobe.
    #[cfg(unix)]
    fn fake_ffprobe(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("ffprobe");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_analyser_is_killed_at_deadline() {
        let dir = tempfile::TempDir::new().unwrap();
        let prober = FfprobeProber::new(fake_ffprobe(dir.path(), "exec sleep 30"));
        let deadline = Duration::from_millis(300);

        let started = std::time::Instant::now();
        let result = prober.probe(Path::new("/music/slow.flac"), deadline).await;

        assert!(matches!(result, Err(ProbeError::Timeout(d)) if d == deadline));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_analyser_report_is_parsed() {
        let dir = tempfile::TempDir::new().unwrap();
        let body = format!("cat <<'EOF'\n{FLAC_REPORT}\nEOF");
        let prober = FfprobeProber::new(fake_ffprobe(dir.path(), &body));

        let facts = prober
            .probe(Path::new("/music/song.flac"), DEFAULT_PROBE_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(facts, parse_ffprobe_json(FLAC_REPORT).unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_analyser_exit_status_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let prober = FfprobeProber::new(fake_ffprobe(dir.path(), "echo 'Invalid data' >&2; exit 1"));

        let result = prober
            .probe(Path::new("/music/broken.flac"), DEFAULT_PROBE_TIMEOUT)
            .await;
        match result {
            Err(ProbeError::Failed { stderr, .. }) => assert_eq!(stderr, "Invalid data"),
            other => panic!("expected a failed status, got {other:?}"),
        }
    }
}
