//! Command-line interface for avdiar
//!
//! Argument parsing with clap derive macros. Defaults mirror the pipeline's
//! tuned constants; credentials come from the environment, never from flags.

use clap::Parser;
use std::path::PathBuf;

use avdiar_core::LabelPolicy;

/// Offline audio-visual speaker diarization
#[derive(Parser, Debug)]
#[command(name = "avdiar", version, about = "Offline audio-visual speaker diarization")]
pub struct Cli {
    /// Input media file (video or audio container readable by ffmpeg)
    pub media: PathBuf,

    /// Root directory for extracted and generated artifacts
    #[arg(long, value_name = "DIR", default_value = "data/segments")]
    pub out_dir: PathBuf,

    /// Label an existing RTTM file against a full-audio transcription
    /// instead of running the fusion pipeline
    #[arg(long, value_name = "PATH")]
    pub rttm: Option<PathBuf>,

    /// Speaker labeling policy for the RTTM path (best-match, multi-match)
    #[arg(long, default_value_t = LabelPolicy::MultiMatch)]
    pub policy: LabelPolicy,

    /// Drop diarized segments shorter than this many milliseconds
    #[arg(long, value_name = "MS", default_value_t = 400)]
    pub min_segment_ms: u64,

    /// Run face detection on every k-th sampled frame, holding results
    /// in between
    #[arg(long, value_name = "K", default_value_t = 2)]
    pub detect_every: usize,

    /// Cosine similarity threshold for reusing a face identity
    #[arg(long, value_name = "T", default_value_t = 0.915)]
    pub face_threshold: f32,

    /// Frame sampling rate in frames per second
    #[arg(long, value_name = "FPS", default_value_t = 1.0)]
    pub frame_rate: f64,

    /// Transcribe with the local engine instead of the remote service
    #[arg(long)]
    pub local: bool,

    /// Ask the diarizer for single-speaker turns only
    #[arg(long)]
    pub no_overlap: bool,

    /// Concurrent clip uploads / local transcription workers
    #[arg(long, value_name = "N", default_value_t = 8)]
    pub upload_width: usize,

    /// ffmpeg executable
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// External diarization command
    #[arg(long, value_name = "PATH", default_value = "diarize-audio")]
    pub diarizer_cmd: PathBuf,

    /// External face detection / embedding command
    #[arg(long, value_name = "PATH", default_value = "detect-faces")]
    pub face_detector_cmd: PathBuf,

    /// External local speech-to-text command
    #[arg(long, value_name = "PATH", default_value = "transcribe-audio")]
    pub transcriber_cmd: PathBuf,

    /// Model name passed to the local speech-to-text command
    #[arg(long, value_name = "MODEL", default_value = "base")]
    pub model: String,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["avdiar", "meeting.mp4"]);
        assert_eq!(cli.media, PathBuf::from("meeting.mp4"));
        assert_eq!(cli.min_segment_ms, 400);
        assert_eq!(cli.detect_every, 2);
        assert_eq!(cli.face_threshold, 0.915);
        assert_eq!(cli.frame_rate, 1.0);
        assert_eq!(cli.policy, LabelPolicy::MultiMatch);
        assert!(!cli.local);
        assert!(cli.rttm.is_none());
    }

    #[test]
    fn test_policy_parsing() {
        let cli = Cli::parse_from(["avdiar", "a.mp4", "--policy", "best-match"]);
        assert_eq!(cli.policy, LabelPolicy::BestMatch);

        let err = Cli::try_parse_from(["avdiar", "a.mp4", "--policy", "nonsense"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_media_is_required() {
        assert!(Cli::try_parse_from(["avdiar"]).is_err());
    }
}
