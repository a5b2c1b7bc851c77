//! Engine traits
//!
//! The seams between the algorithmic core and the external inference
//! engines. Implementations live in this crate; tests substitute doubles.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use avdiar_types::{DiarizedSegment, FaceDetection, TranscribedSegment};

/// Trait for audio diarization engines
pub trait DiarizationEngine: Send + Sync {
    /// Engine name
    fn name(&self) -> &str;

    /// Diarize a waveform file, writing engine scratch output under
    /// `work_dir`, and return the raw speaker segments.
    fn diarize(&self, wav: &Path, work_dir: &Path) -> Result<Vec<DiarizedSegment>>;
}

/// Trait for face detection and embedding extraction
pub trait FaceDetector: Send + Sync {
    /// Engine name
    fn name(&self) -> &str;

    /// Detect faces in one frame image and return bounding boxes with
    /// identity embeddings.
    fn detect(&self, frame: &Path) -> Result<Vec<FaceDetection>>;
}

/// Trait for speech-to-text engines returning timestamped segments
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Engine name
    fn name(&self) -> &str;

    /// Transcribe an audio file into timestamped text segments.
    async fn transcribe(&self, audio: &Path) -> Result<Vec<TranscribedSegment>>;
}
