//! Audio-visual confidence fusion
//!
//! Maps each diarized audio segment onto the face track table and scores how
//! consistently a single visual identity appears in the segment's frame
//! window.

use avdiar_types::{DiarizedSegment, FaceTrackTable, FusedSegment};

/// Fusion parameters
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Frames per second of the sampled frame sequence
    pub frame_rate: f64,
    /// Base confidence contributed by the audio diarizer
    pub audio_weight: f64,
    /// Maximum additional confidence contributed by the visual match
    pub visual_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            frame_rate: 1.0,
            audio_weight: 0.6,
            visual_weight: 0.4,
        }
    }
}

/// A diarized segment with its transcription attached, pre-fusion.
#[derive(Debug, Clone)]
pub struct ClipSegment {
    pub segment: DiarizedSegment,
    /// Transcribed text, absent when the clip failed transcription
    pub text: Option<String>,
    /// Exported clip file name
    pub wav: Option<String>,
}

/// Annotate each segment with the dominant visual identity and a fused
/// confidence score.
///
/// The segment's `[start, stop]` seconds project to the inclusive frame range
/// `[floor(start*rate), floor(stop*rate)]`. Frames beyond the table bounds
/// contribute nothing. Ties between identity counts keep the identity
/// encountered first when scanning frames low to high and, within a frame,
/// in detection-list order. Output is sorted ascending by segment start.
pub fn fuse(
    clips: &[ClipSegment],
    tracks: &FaceTrackTable,
    config: &FusionConfig,
) -> Vec<FusedSegment> {
    let mut fused: Vec<FusedSegment> = clips
        .iter()
        .map(|clip| fuse_one(clip, tracks, config))
        .collect();

    fused.sort_by(|a, b| a.start.total_cmp(&b.start));

    let known = fused.iter().filter(|s| s.visual_id != "unknown").count();
    tracing::info!(
        "fused {} segments ({} with a visual identity)",
        fused.len(),
        known
    );

    fused
}

fn fuse_one(clip: &ClipSegment, tracks: &FaceTrackTable, config: &FusionConfig) -> FusedSegment {
    let seg = &clip.segment;
    let low = (seg.start * config.frame_rate).floor() as usize;
    let high = (seg.stop * config.frame_rate).floor() as usize;

    // Ordered tally keyed by first encounter; iteration order is the
    // tie-break contract.
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for frame in low..=high {
        let Some(faces) = tracks.get(frame) else {
            continue;
        };
        for face in faces {
            match tally.iter_mut().find(|(id, _)| *id == face.face_id) {
                Some((_, n)) => *n += 1,
                None => tally.push((face.face_id.as_str(), 1)),
            }
        }
    }

    let (visual_id, confidence) = match best_of(&tally) {
        Some((id, count)) => {
            let total: usize = tally.iter().map(|(_, n)| n).sum();
            let visual_score = count as f64 / total as f64;
            let confidence = config.audio_weight + config.visual_weight * visual_score;
            (id.to_string(), round3(confidence))
        }
        None => ("unknown".to_string(), config.audio_weight),
    };

    FusedSegment {
        start: seg.start,
        stop: seg.stop,
        speaker: seg.speaker.clone(),
        text: clip.text.clone(),
        wav: clip.wav.clone(),
        visual_id,
        confidence,
    }
}

/// Maximum-count entry; strictly greater counts replace, so ties keep the
/// earlier entry.
fn best_of<'a>(tally: &[(&'a str, usize)]) -> Option<(&'a str, usize)> {
    let mut best: Option<(&str, usize)> = None;
    for &(id, count) in tally {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((id, count)),
        }
    }
    best
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
