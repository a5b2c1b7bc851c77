//! Local subprocess transcription engine
//!
//! Runs an external speech-to-text command per audio file. The command
//! prints a JSON array of timestamped segments on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use avdiar_types::TranscribedSegment;
use tokio::process::Command;

use crate::traits::Transcriber;

/// Subprocess-based local transcriber
pub struct SubprocessTranscriber {
    command: PathBuf,
    model: String,
}

impl SubprocessTranscriber {
    pub fn new(command: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for SubprocessTranscriber {
    fn name(&self) -> &str {
        "subprocess-transcriber"
    }

    async fn transcribe(&self, audio: &Path) -> Result<Vec<TranscribedSegment>> {
        tracing::debug!("transcribing {:?} with model {}", audio, self.model);

        let output = Command::new(&self.command)
            .arg("--audio")
            .arg(audio)
            .arg("--model")
            .arg(&self.model)
            .output()
            .await
            .with_context(|| format!("failed to start transcriber {:?}", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("transcription failed on {:?}: {}", audio, stderr);
        }

        parse_segments(&output.stdout)
            .with_context(|| format!("parsing transcriber output for {:?}", audio))
    }
}

fn parse_segments(stdout: &[u8]) -> Result<Vec<TranscribedSegment>> {
    let segments = serde_json::from_slice(stdout)?;
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let json = br#"[
            {"start": 0.0, "end": 2.5, "text": "hello there"},
            {"start": 2.5, "end": 4.0, "text": "general"}
        ]"#;
        let segments = parse_segments(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hello there");
        assert_eq!(segments[1].start, 2.5);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_segments(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_segments(b"oops").is_err());
    }
}
