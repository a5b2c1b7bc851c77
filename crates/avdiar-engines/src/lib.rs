//! External collaborators for avdiar
//!
//! The pipeline core treats the diarizer, the face detector, and the
//! speech-to-text engines as functions returning well-defined records; this
//! crate provides those functions as subprocess and HTTP engines behind
//! traits.

pub mod batch;
pub mod diarizer;
pub mod face_detect;
pub mod local;
pub mod media;
pub mod remote;
pub mod traits;

pub use batch::{transcribe_batch, transcribe_clips, BatchConfig};
pub use diarizer::{DiarizerConfig, SubprocessDiarizer};
pub use face_detect::SubprocessFaceDetector;
pub use local::SubprocessTranscriber;
pub use media::{extract_audio, extract_frames, list_frames, slice_clips, SlicedClip};
pub use remote::{JobStatus, ProviderError, RemoteTranscriber, TranscriptionService};
pub use traits::{DiarizationEngine, FaceDetector, Transcriber};
