//! Pipeline configuration
//!
//! Built exactly once at process entry from the parsed CLI and the
//! environment, then passed down explicitly. Preconditions (input file,
//! credentials) fail here, before any stage runs.

use std::path::PathBuf;

use anyhow::Result;

use avdiar_core::LabelPolicy;

use crate::cli::Cli;

/// Environment variable holding the diarization model hub token
pub const DIARIZATION_TOKEN_VAR: &str = "DIARIZATION_TOKEN";
/// Environment variable holding the remote transcription API key
pub const TRANSCRIBE_API_KEY_VAR: &str = "TRANSCRIBE_API_KEY";

/// Secrets resolved from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Required by the diarization engine (fusion mode)
    pub diarization_token: Option<String>,
    /// Required by the remote transcription service
    pub transcribe_api_key: Option<String>,
}

/// Fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub media: PathBuf,
    pub out_dir: PathBuf,
    pub rttm: Option<PathBuf>,
    pub policy: LabelPolicy,
    pub min_segment_ms: u64,
    pub detect_every: usize,
    pub face_threshold: f32,
    pub frame_rate: f64,
    pub local: bool,
    pub include_overlap: bool,
    pub upload_width: usize,
    pub ffmpeg: PathBuf,
    pub diarizer_cmd: PathBuf,
    pub face_detector_cmd: PathBuf,
    pub transcriber_cmd: PathBuf,
    pub model: String,
    pub credentials: Credentials,
}

impl PipelineConfig {
    /// Resolve the CLI against the filesystem and the environment.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        anyhow::ensure!(cli.media.exists(), "input file not found: {:?}", cli.media);
        anyhow::ensure!(
            cli.media.is_file(),
            "input path is not a regular file: {:?}",
            cli.media
        );
        if let Some(rttm) = &cli.rttm {
            anyhow::ensure!(rttm.is_file(), "RTTM file not found: {:?}", rttm);
        }

        let credentials = Credentials {
            diarization_token: std::env::var(DIARIZATION_TOKEN_VAR).ok(),
            transcribe_api_key: std::env::var(TRANSCRIBE_API_KEY_VAR).ok(),
        };
        check_credentials(&credentials, cli.rttm.is_some(), cli.local)?;

        Ok(Self {
            media: cli.media,
            out_dir: cli.out_dir,
            rttm: cli.rttm,
            policy: cli.policy,
            min_segment_ms: cli.min_segment_ms,
            detect_every: cli.detect_every,
            face_threshold: cli.face_threshold,
            frame_rate: cli.frame_rate,
            local: cli.local,
            include_overlap: !cli.no_overlap,
            upload_width: cli.upload_width,
            ffmpeg: cli.ffmpeg,
            diarizer_cmd: cli.diarizer_cmd,
            face_detector_cmd: cli.face_detector_cmd,
            transcriber_cmd: cli.transcriber_cmd,
            model: cli.model,
            credentials,
        })
    }

    /// File stem of the input media, used to name artifacts.
    pub fn media_stem(&self) -> String {
        self.media
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string())
    }

    /// Per-input working directory under `out_dir`.
    pub fn work_dir(&self) -> PathBuf {
        self.out_dir.join(self.media_stem())
    }
}

/// Each mode requires only the credentials its engines use: fusion mode
/// needs the diarization token and, unless transcription stays local, the
/// remote API key; the RTTM path runs no credentialed engine at all.
fn check_credentials(credentials: &Credentials, rttm_mode: bool, local: bool) -> Result<()> {
    if rttm_mode {
        return Ok(());
    }
    anyhow::ensure!(
        credentials.diarization_token.is_some(),
        "missing {} in the environment",
        DIARIZATION_TOKEN_VAR
    );
    if !local {
        anyhow::ensure!(
            credentials.transcribe_api_key.is_some(),
            "missing {} in the environment (or pass --local)",
            TRANSCRIBE_API_KEY_VAR
        );
    }
    Ok(())
}
