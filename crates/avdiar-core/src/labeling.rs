//! Overlap-based speaker labeling
//!
//! Assigns diarized speaker turns to transcribed text segments by temporal
//! overlap. Two interchangeable policies exist: best-match emits exactly one
//! line per transcribed segment, multi-match emits one line per overlapping
//! (turn, segment) pair so that overlapping speech is represented by
//! duplicate lines with different speakers.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use avdiar_types::{LabeledLine, RttmTurn, TranscribedSegment};

/// Label used when no turn overlaps a transcribed segment
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// Labeling strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPolicy {
    /// One line per segment, labeled with the single best-overlapping turn
    BestMatch,
    /// One line per (turn, segment) overlap pair, duplicates intentional
    MultiMatch,
}

impl FromStr for LabelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best-match" => Ok(Self::BestMatch),
            "multi-match" => Ok(Self::MultiMatch),
            other => Err(format!(
                "unknown label policy '{}' (expected best-match or multi-match)",
                other
            )),
        }
    }
}

impl fmt::Display for LabelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BestMatch => write!(f, "best-match"),
            Self::MultiMatch => write!(f, "multi-match"),
        }
    }
}

/// Label transcribed segments with diarized speaker turns under `policy`.
pub fn label_segments(
    policy: LabelPolicy,
    turns: &[RttmTurn],
    segments: &[TranscribedSegment],
) -> Vec<LabeledLine> {
    let lines = match policy {
        LabelPolicy::BestMatch => best_match(turns, segments),
        LabelPolicy::MultiMatch => multi_match(turns, segments),
    };
    tracing::info!(
        "labeled {} segments into {} lines ({})",
        segments.len(),
        lines.len(),
        policy
    );
    lines
}

fn overlap(seg: &TranscribedSegment, turn: &RttmTurn) -> f64 {
    seg.end.min(turn.end) - seg.start.max(turn.start)
}

/// For each segment, keep the turn with the strictly greatest positive
/// overlap. Equal overlaps do not replace the current best, so ties keep the
/// first turn in input order. No positive overlap means `"Unknown"`.
fn best_match(turns: &[RttmTurn], segments: &[TranscribedSegment]) -> Vec<LabeledLine> {
    segments
        .iter()
        .map(|seg| {
            let mut best: Option<&str> = None;
            let mut best_overlap = 0.0;
            for turn in turns {
                let ov = overlap(seg, turn);
                if ov > 0.0 && ov > best_overlap {
                    best = Some(&turn.label);
                    best_overlap = ov;
                }
            }
            LabeledLine {
                start: seg.start,
                end: seg.end,
                text: seg.text.clone(),
                speaker: best.unwrap_or(UNKNOWN_SPEAKER).to_string(),
            }
        })
        .collect()
}

/// For each turn, emit one line per transcribed segment it overlaps; a
/// segment overlapping two turns yields two lines with different speakers.
/// Segments whose `(start, end)` never matched any turn are appended once
/// with `"Unknown"`. The result is stable-sorted ascending by start.
///
/// The matched-set key is the literal `(start, end)` pair (compared by f64
/// bit pattern); two distinct segments sharing identical boundaries share
/// the key, which only suppresses the extra Unknown fallback line.
fn multi_match(turns: &[RttmTurn], segments: &[TranscribedSegment]) -> Vec<LabeledLine> {
    let mut labeled: Vec<LabeledLine> = Vec::new();
    let mut matched: HashSet<(u64, u64)> = HashSet::new();

    for turn in turns {
        for seg in segments {
            if overlap(seg, turn) > 0.0 {
                matched.insert((seg.start.to_bits(), seg.end.to_bits()));
                labeled.push(LabeledLine {
                    start: seg.start,
                    end: seg.end,
                    text: seg.text.clone(),
                    speaker: turn.label.clone(),
                });
            }
        }
    }

    for seg in segments {
        if !matched.contains(&(seg.start.to_bits(), seg.end.to_bits())) {
            labeled.push(LabeledLine {
                start: seg.start,
                end: seg.end,
                text: seg.text.clone(),
                speaker: UNKNOWN_SPEAKER.to_string(),
            });
        }
    }

    labeled.sort_by(|a, b| a.start.total_cmp(&b.start));
    labeled
}
