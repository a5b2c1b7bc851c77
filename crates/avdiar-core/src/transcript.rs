//! Transcript assembly
//!
//! Serializes final pipeline output: the flat human-readable transcript, the
//! fused segment list, and the face track table. Formatting only, no
//! transformation logic.

use std::path::Path;

use anyhow::{Context, Result};
use avdiar_types::{FaceTrackTable, FusedSegment, LabeledLine};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Format one labeled line for the flat transcript.
///
/// Text containing the line delimiter is escaped (`\n` and `\r` become the
/// two-character sequences) so the format stays one record per line.
pub fn format_line(line: &LabeledLine) -> String {
    let text = line.text.replace('\\', "\\\\").replace('\n', "\\n").replace('\r', "\\r");
    format!(
        "[{:.2} - {:.2}] Speaker {}: {}",
        line.start, line.end, line.speaker, text
    )
}

/// Write the flat transcript, one formatted line per labeled line.
pub fn write_transcript(path: &Path, lines: &[LabeledLine]) -> Result<()> {
    let mut out = String::new();
    for line in lines {
        out.push_str(&format_line(line));
        out.push('\n');
    }
    atomic_write(path, out.as_bytes())?;
    tracing::info!("wrote {} transcript lines to {:?}", lines.len(), path);
    Ok(())
}

/// Write the fused segment list as pretty JSON.
pub fn write_fused(path: &Path, segments: &[FusedSegment]) -> Result<()> {
    let json = serde_json::to_string_pretty(segments)?;
    atomic_write(path, json.as_bytes())?;
    tracing::info!("wrote {} fused segments to {:?}", segments.len(), path);
    Ok(())
}

/// Face track table keyed by stringified frame index, in frame order.
struct FrameKeyed<'a>(&'a FaceTrackTable);

impl Serialize for FrameKeyed<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (frame, faces) in self.0.iter().enumerate() {
            map.serialize_entry(&frame.to_string(), faces)?;
        }
        map.end()
    }
}

/// Write the face track table as pretty JSON, keyed by frame index.
pub fn write_face_tracks(path: &Path, tracks: &FaceTrackTable) -> Result<()> {
    let json = serde_json::to_string_pretty(&FrameKeyed(tracks))?;
    atomic_write(path, json.as_bytes())?;
    tracing::info!("wrote face tracks for {} frames to {:?}", tracks.len(), path);
    Ok(())
}

/// Atomic write via temp file and rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {:?}", parent))?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, content).with_context(|| format!("writing {:?}", tmp_path))?;
    std::fs::rename(&tmp_path, path).with_context(|| format!("renaming into {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdiar_types::{BoundingBox, TrackedFace};

    fn line(start: f64, end: f64, text: &str, speaker: &str) -> LabeledLine {
        LabeledLine {
            start,
            end,
            text: text.to_string(),
            speaker: speaker.to_string(),
        }
    }

    #[test]
    fn test_format_line() {
        let l = line(4.5, 6.0, "hello", "A");
        assert_eq!(format_line(&l), "[4.50 - 6.00] Speaker A: hello");
    }

    #[test]
    fn test_format_line_escapes_delimiters() {
        let l = line(0.0, 1.0, "two\nlines\r", "A");
        assert_eq!(format_line(&l), "[0.00 - 1.00] Speaker A: two\\nlines\\r");

        let l = line(0.0, 1.0, "back\\slash", "A");
        assert_eq!(format_line(&l), "[0.00 - 1.00] Speaker A: back\\\\slash");
    }

    #[test]
    fn test_write_transcript_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full_transcript.txt");
        let lines = vec![line(0.0, 1.0, "a\nb", "A"), line(1.0, 2.0, "c", "B")];

        write_transcript(&path, &lines).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_face_tracks_keyed_by_frame_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.json");
        let tracks: FaceTrackTable = vec![
            vec![TrackedFace {
                face_id: "face_0".to_string(),
                bbox: BoundingBox::from([1, 2, 3, 4]),
            }],
            vec![],
        ];

        write_face_tracks(&path, &tracks).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["0"][0]["face_id"], "face_0");
        assert_eq!(value["0"][0]["bbox"], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(value["1"], serde_json::json!([]));
    }

    #[test]
    fn test_write_fused_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.json");
        let segments = vec![FusedSegment {
            start: 1.0,
            stop: 2.0,
            speaker: "0".to_string(),
            text: Some("hi".to_string()),
            wav: Some("spk0_0.wav".to_string()),
            visual_id: "face_0".to_string(),
            confidence: 0.867,
        }];

        write_fused(&path, &segments).unwrap();

        let back: Vec<FusedSegment> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, segments);
    }
}
