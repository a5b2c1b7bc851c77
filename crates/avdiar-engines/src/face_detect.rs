//! Subprocess face detection and embedding extraction
//!
//! Calls an external extractor once per sampled frame; the extractor prints
//! a JSON array of detections (bounding box + embedding) on stdout.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use avdiar_types::FaceDetection;

use crate::traits::FaceDetector;

/// Subprocess-based face detector
pub struct SubprocessFaceDetector {
    command: PathBuf,
}

impl SubprocessFaceDetector {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl FaceDetector for SubprocessFaceDetector {
    fn name(&self) -> &str {
        "subprocess-face-detector"
    }

    fn detect(&self, frame: &Path) -> Result<Vec<FaceDetection>> {
        let output = Command::new(&self.command)
            .arg(frame)
            .output()
            .with_context(|| format!("failed to start face detector {:?}", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("face detector failed on {:?}: {}", frame, stderr);
        }

        let detections = parse_detections(&output.stdout)
            .with_context(|| format!("parsing detector output for {:?}", frame))?;
        tracing::trace!("{} faces in {:?}", detections.len(), frame);
        Ok(detections)
    }
}

fn parse_detections(stdout: &[u8]) -> Result<Vec<FaceDetection>> {
    let detections = serde_json::from_slice(stdout)?;
    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detections() {
        let json = br#"[
            {"bbox": [12, 200, 96, 110], "embedding": [0.1, -0.2, 0.3]},
            {"bbox": [0, 50, 40, 10], "embedding": [0.5, 0.5, 0.0]}
        ]"#;
        let detections = parse_detections(json).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].bbox.top, 12);
        assert_eq!(detections[0].bbox.left, 110);
        assert_eq!(detections[1].embedding, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_parse_empty_frame() {
        let detections = parse_detections(b"[]").unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_detections(b"not json").is_err());
    }
}
