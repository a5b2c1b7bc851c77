//! Shared types for avdiar
//!
//! This crate contains the data structures passed between pipeline stages.
//! Each stage owns its output collection outright; nothing here carries
//! shared mutable state.

use serde::{Deserialize, Serialize};

// ============================================================================
// Audio diarization types
// ============================================================================

/// One speaker segment produced by the audio diarization engine.
///
/// `start < stop` always holds for engine output. The collection is not
/// guaranteed sorted on input; final output is sorted by `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizedSegment {
    /// Start time in seconds
    pub start: f64,
    /// Stop time in seconds
    pub stop: f64,
    /// Speaker identifier assigned by the diarizer
    pub speaker: String,
}

/// One continuous speaker interval parsed from an RTTM turn record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RttmTurn {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (start + duration field)
    pub end: f64,
    /// Speaker label
    pub label: String,
}

// ============================================================================
// Transcription types
// ============================================================================

/// A timestamped text segment from the speech-to-text engine.
///
/// `text` may be empty when the engine partially failed on this range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribedSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

/// Terminal result of transcribing one audio clip.
///
/// Replaces the silent error-to-null conversion of per-clip failures with an
/// explicit outcome that the batch can aggregate into a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClipOutcome {
    /// Transcription succeeded
    Transcribed { text: String },
    /// The engine reported a terminal failure for this clip
    Failed { reason: String },
    /// The clip never reached a terminal state before the batch deadline
    TimedOut,
}

impl ClipOutcome {
    /// Transcribed text, if this outcome carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Transcribed { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::TimedOut)
    }
}

// ============================================================================
// Face tracking types
// ============================================================================

/// Face bounding box in `[top, right, bottom, left]` pixel order.
///
/// Serialized as a 4-element array to match the persisted track format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl From<[i32; 4]> for BoundingBox {
    fn from(v: [i32; 4]) -> Self {
        Self {
            top: v[0],
            right: v[1],
            bottom: v[2],
            left: v[3],
        }
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.top, b.right, b.bottom, b.left]
    }
}

/// One detected face in a sampled frame: location plus identity embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    /// Identity-discriminative feature vector from the face extractor
    pub embedding: Vec<f32>,
}

/// A visual identity created by the tracker.
///
/// The reference embedding is fixed at creation and never averaged, so
/// identities do not adapt to appearance drift within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceIdentity {
    /// Monotonically assigned identifier (`face_0`, `face_1`, ...)
    pub id: String,
    /// Permanent reference embedding
    pub reference: Vec<f32>,
}

/// A face resolved to an identity within one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFace {
    pub face_id: String,
    pub bbox: BoundingBox,
}

/// Per-frame face tracks, indexed by dense 0-based frame index.
///
/// Frames between detection samples copy forward the most recently computed
/// detection list (temporal hold).
pub type FaceTrackTable = Vec<Vec<TrackedFace>>;

// ============================================================================
// Fused output types
// ============================================================================

/// A diarized segment annotated with transcription and a visual identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSegment {
    /// Start time in seconds
    pub start: f64,
    /// Stop time in seconds
    pub stop: f64,
    /// Audio speaker identifier
    pub speaker: String,
    /// Transcribed text, absent when the clip failed transcription
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// File name of the exported audio clip for this segment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wav: Option<String>,
    /// Best matching face identity, or `"unknown"`
    pub visual_id: String,
    /// Fused confidence in `[0.6, 1.0]`, rounded to 3 decimal places
    pub confidence: f64,
}

/// Final speaker-labeled transcript line.
///
/// Under the multi-match policy the same `(start, end, text)` triple may
/// appear more than once with different speakers; that duplication represents
/// overlapping speech and is intentional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledLine {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
    /// Speaker label, `"Unknown"` when no turn overlapped
    pub speaker: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_serializes_as_array() {
        let bbox = BoundingBox {
            top: 10,
            right: 120,
            bottom: 90,
            left: 40,
        };
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[10,120,90,40]");

        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bbox);
    }

    #[test]
    fn tracked_face_matches_persisted_shape() {
        let face = TrackedFace {
            face_id: "face_0".to_string(),
            bbox: BoundingBox::from([1, 2, 3, 4]),
        };
        let json = serde_json::to_value(&face).unwrap();
        assert_eq!(json["face_id"], "face_0");
        assert_eq!(json["bbox"], serde_json::json!([1, 2, 3, 4]));
    }

    #[test]
    fn clip_outcome_text_accessor() {
        let ok = ClipOutcome::Transcribed {
            text: "hello".to_string(),
        };
        assert_eq!(ok.text(), Some("hello"));
        assert!(!ok.is_terminal_failure());

        let failed = ClipOutcome::Failed {
            reason: "boom".to_string(),
        };
        assert_eq!(failed.text(), None);
        assert!(failed.is_terminal_failure());
        assert!(ClipOutcome::TimedOut.is_terminal_failure());
    }

    #[test]
    fn fused_segment_omits_absent_text() {
        let seg = FusedSegment {
            start: 0.0,
            stop: 1.5,
            speaker: "0".to_string(),
            text: None,
            wav: None,
            visual_id: "unknown".to_string(),
            confidence: 0.6,
        };
        let json = serde_json::to_value(&seg).unwrap();
        assert!(json.get("text").is_none());
        assert!(json.get("wav").is_none());
    }
}
