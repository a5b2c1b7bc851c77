//! Pipeline orchestration
//!
//! Two modes share the audio extraction front end. Fusion mode runs the full
//! audio-visual chain and writes the fused segment JSON plus the face track
//! table. RTTM mode labels a full-audio transcription against an existing
//! RTTM file and writes the flat transcript.
//!
//! Stage-level failures abort the run with context. Per-clip transcription
//! failures degrade to segments without text and surface in the batch
//! summary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use avdiar_core::{
    appearance_counts, fuse, label_segments, load_rttm, write_face_tracks, write_fused,
    write_transcript, ClipSegment, FaceTracker, FusionConfig, TrackerConfig,
};
use avdiar_engines::{
    extract_audio, extract_frames, slice_clips, transcribe_batch, transcribe_clips, BatchConfig,
    DiarizationEngine, DiarizerConfig, FaceDetector, RemoteTranscriber, SlicedClip,
    SubprocessDiarizer, SubprocessFaceDetector, SubprocessTranscriber, Transcriber,
};
use avdiar_types::ClipOutcome;

use crate::config::PipelineConfig;

pub async fn run(config: &PipelineConfig, cancel: &CancellationToken) -> Result<()> {
    match config.rttm.clone() {
        Some(rttm) => run_labeling(config, &rttm, cancel).await,
        None => run_fusion(config, cancel).await,
    }
}

/// Full audio-visual fusion chain.
async fn run_fusion(config: &PipelineConfig, cancel: &CancellationToken) -> Result<()> {
    let stem = config.media_stem();
    let root = config.work_dir();
    std::fs::create_dir_all(&root)
        .with_context(|| format!("creating working directory {:?}", root))?;

    cleanup_previous(&root, &stem)?;

    let wav = root.join(format!("{}.wav", stem));
    extract_audio(&config.ffmpeg, &config.media, &wav)?;
    ensure_live(cancel)?;

    let token = config
        .credentials
        .diarization_token
        .clone()
        .context("diarization token missing")?;
    let diarizer = SubprocessDiarizer::new(DiarizerConfig {
        command: config.diarizer_cmd.clone(),
        access_token: token,
        include_overlap: config.include_overlap,
    });
    let segments = diarizer.diarize(&wav, &root.join("dia_cache"))?;
    ensure_live(cancel)?;

    let clips = slice_clips(&wav, &segments, config.min_segment_ms, &root)?;
    let clip_paths: Vec<PathBuf> = clips.iter().map(|c| c.path.clone()).collect();

    let outcomes = if config.local {
        let transcriber = SubprocessTranscriber::new(&config.transcriber_cmd, config.model.as_str());
        transcribe_clips(&transcriber, &clip_paths, config.upload_width, cancel).await
    } else {
        let api_key = config
            .credentials
            .transcribe_api_key
            .clone()
            .context("transcription API key missing")?;
        let service = RemoteTranscriber::new(api_key);
        let batch_config = BatchConfig {
            upload_width: config.upload_width,
            ..BatchConfig::default()
        };
        transcribe_batch(&service, &clip_paths, &batch_config, cancel).await?
    };
    write_clip_sidecars(&clips, &outcomes)?;
    ensure_live(cancel)?;

    let frames = extract_frames(
        &config.ffmpeg,
        &config.media,
        &root.join("frames"),
        config.frame_rate,
    )?;

    let detector = SubprocessFaceDetector::new(&config.face_detector_cmd);
    let mut tracker = FaceTracker::new(TrackerConfig {
        similarity_threshold: config.face_threshold,
        detect_every: config.detect_every,
        ..TrackerConfig::default()
    });
    let tracks = tracker.track(frames.len(), cancel, |i| detector.detect(&frames[i]))?;

    write_face_tracks(&root.join(format!("{}.faces.json", stem)), &tracks)?;
    for (face_id, count) in appearance_counts(&tracks) {
        tracing::info!("{}: {} frames", face_id, count);
    }

    let clip_segments = attach_outcomes(&clips, &outcomes);
    let fused = fuse(
        &clip_segments,
        &tracks,
        &FusionConfig {
            frame_rate: config.frame_rate,
            ..FusionConfig::default()
        },
    );
    write_fused(&root.join(format!("{}.merged.json", stem)), &fused)?;

    tracing::info!("pipeline complete, results in {:?}", root);
    Ok(())
}

/// Label an existing RTTM against a full-audio transcription.
async fn run_labeling(config: &PipelineConfig, rttm: &Path, cancel: &CancellationToken) -> Result<()> {
    let stem = config.media_stem();
    let root = config.work_dir();
    std::fs::create_dir_all(&root)
        .with_context(|| format!("creating working directory {:?}", root))?;

    let wav = root.join(format!("{}.wav", stem));
    extract_audio(&config.ffmpeg, &config.media, &wav)?;
    ensure_live(cancel)?;

    let transcriber = SubprocessTranscriber::new(&config.transcriber_cmd, config.model.as_str());
    let segments = transcriber
        .transcribe(&wav)
        .await
        .context("full-audio transcription failed")?;
    ensure_live(cancel)?;

    let turns = load_rttm(rttm).with_context(|| format!("loading RTTM {:?}", rttm))?;
    tracing::info!(
        "labeling {} transcribed segments against {} turns ({})",
        segments.len(),
        turns.len(),
        config.policy
    );

    let lines = label_segments(config.policy, &turns, &segments);
    write_transcript(&root.join("full_transcript.txt"), &lines)?;
    Ok(())
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    anyhow::ensure!(!cancel.is_cancelled(), "pipeline cancelled");
    Ok(())
}

/// Remove artifacts a previous run may have left for the same input.
fn cleanup_previous(root: &Path, stem: &str) -> Result<()> {
    let fixed = [
        root.join(format!("{}.faces.json", stem)),
        root.join(format!("{}.merged.json", stem)),
        root.join("full_transcript.txt"),
    ];
    for path in fixed {
        if path.exists() {
            tracing::debug!("removing stale artifact {:?}", path);
            std::fs::remove_file(&path)?;
        }
    }

    // Stale clips from a previous run would otherwise mix with this run's.
    if root.exists() {
        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            let stale = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("spk") && (n.ends_with(".wav") || n.ends_with(".txt")))
                .unwrap_or(false);
            if stale {
                std::fs::remove_file(&path)?;
            }
        }
    }
    Ok(())
}

/// Join clips back to their transcription outcomes by position.
fn attach_outcomes(clips: &[SlicedClip], outcomes: &[ClipOutcome]) -> Vec<ClipSegment> {
    clips
        .iter()
        .zip(outcomes)
        .map(|(clip, outcome)| ClipSegment {
            segment: clip.segment.clone(),
            text: outcome.text().map(str::to_string),
            wav: Some(clip.file_name()),
        })
        .collect()
}

/// Persist each transcribed clip's text next to its WAV.
fn write_clip_sidecars(clips: &[SlicedClip], outcomes: &[ClipOutcome]) -> Result<()> {
    for (clip, outcome) in clips.iter().zip(outcomes) {
        if let Some(text) = outcome.text() {
            if !text.is_empty() {
                std::fs::write(clip.path.with_extension("txt"), text)
                    .with_context(|| format!("writing transcript sidecar for {:?}", clip.path))?;
            }
        }
    }
    Ok(())
}
