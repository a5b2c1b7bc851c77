//! Algorithmic core for avdiar
//!
//! Provides segment filtering, face identity tracking, audio-visual
//! confidence fusion, overlap speaker labeling, and transcript assembly.

pub mod face_track;
pub mod fusion;
pub mod labeling;
pub mod rttm;
pub mod segment_filter;
pub mod similarity;
pub mod transcript;

pub use face_track::{appearance_counts, FaceTracker, TrackerConfig};
pub use fusion::{fuse, ClipSegment, FusionConfig};
pub use labeling::{label_segments, LabelPolicy};
pub use rttm::{load_rttm, parse_rttm, RttmError};
pub use segment_filter::{filter_short, MIN_SEGMENT_MS};
pub use similarity::{cosine_similarity, SimilarityError};
pub use transcript::{format_line, write_face_tracks, write_fused, write_transcript};
