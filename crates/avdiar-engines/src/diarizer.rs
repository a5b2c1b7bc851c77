//! Subprocess audio diarization engine
//!
//! Invokes an external diarization command (each call = new process) that
//! writes a JSON object of speaker segments into its output directory. A
//! non-zero exit aborts the run; there is no per-segment recovery at this
//! stage.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use avdiar_types::DiarizedSegment;

use crate::traits::DiarizationEngine;

/// Diarizer configuration
#[derive(Debug, Clone)]
pub struct DiarizerConfig {
    /// External diarization command
    pub command: PathBuf,
    /// Access token for the diarization model hub
    pub access_token: String,
    /// Ask the engine to emit overlapping speech segments
    pub include_overlap: bool,
}

/// Subprocess-based diarization engine
pub struct SubprocessDiarizer {
    config: DiarizerConfig,
}

impl SubprocessDiarizer {
    pub fn new(config: DiarizerConfig) -> Self {
        Self { config }
    }
}

impl DiarizationEngine for SubprocessDiarizer {
    fn name(&self) -> &str {
        "subprocess-diarizer"
    }

    fn diarize(&self, wav: &Path, work_dir: &Path) -> Result<Vec<DiarizedSegment>> {
        std::fs::create_dir_all(work_dir)
            .with_context(|| format!("creating diarizer work dir {:?}", work_dir))?;

        let mut command = Command::new(&self.config.command);
        command
            .arg("--wav")
            .arg(wav)
            .arg("--out-dir")
            .arg(work_dir)
            .arg("--out-type")
            .arg("json")
            .arg("--access-token")
            .arg(&self.config.access_token);
        if self.config.include_overlap {
            command.arg("--include-overlap");
        }

        tracing::info!("running diarization on {:?}", wav);
        let start = std::time::Instant::now();

        let output = command
            .output()
            .with_context(|| format!("failed to start diarizer {:?}", self.config.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("diarization engine failed ({}): {}", output.status, stderr);
        }

        let json_path = find_segment_json(work_dir)?;
        let json = std::fs::read_to_string(&json_path)
            .with_context(|| format!("reading diarizer output {:?}", json_path))?;
        let segments = parse_segment_map(&json)?;

        tracing::info!(
            "diarization found {} segments in {:.1}s",
            segments.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(segments)
    }
}

/// First JSON file in the work directory, by name.
fn find_segment_json(work_dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(work_dir)
        .with_context(|| format!("listing diarizer work dir {:?}", work_dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .with_context(|| format!("diarizer produced no JSON output in {:?}", work_dir))
}

/// Parse the diarizer's segment object, keyed by segment id.
fn parse_segment_map(json: &str) -> Result<Vec<DiarizedSegment>> {
    let map: BTreeMap<String, DiarizedSegment> =
        serde_json::from_str(json).context("failed to parse diarizer segment JSON")?;
    Ok(map.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segment_map() {
        let json = r#"{
            "seg_000": {"start": 0.5, "stop": 4.2, "speaker": "0"},
            "seg_001": {"start": 4.9, "stop": 6.0, "speaker": "1"}
        }"#;
        let segments = parse_segment_map(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 0.5);
        assert_eq!(segments[1].speaker, "1");
    }

    #[test]
    fn test_parse_segment_map_rejects_malformed() {
        assert!(parse_segment_map("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_find_segment_json_picks_first_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let path = find_segment_json(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "a.json");
    }

    #[test]
    fn test_find_segment_json_empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_segment_json(dir.path()).is_err());
    }
}
