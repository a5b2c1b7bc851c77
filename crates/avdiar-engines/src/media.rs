//! Media extraction and clip slicing
//!
//! Audio extraction and frame extraction shell out to ffmpeg, which owns all
//! container demuxing. Clip slicing works directly on the extracted WAV with
//! hound.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use avdiar_core::segment_filter::filter_short;
use avdiar_types::DiarizedSegment;
use hound::{WavReader, WavWriter};

/// Extract a 16 kHz mono WAV from the input media file.
pub fn extract_audio(ffmpeg: &Path, media: &Path, wav_out: &Path) -> Result<()> {
    if let Some(parent) = wav_out.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!("extracting audio from {:?}", media);
    let output = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(media)
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg("16000")
        .arg(wav_out)
        .output()
        .with_context(|| format!("failed to start ffmpeg {:?}", ffmpeg))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("audio extraction failed ({}): {}", output.status, stderr);
    }
    Ok(())
}

/// Extract frames at a fixed rate into `frames_dir` and return their paths
/// in frame order.
pub fn extract_frames(ffmpeg: &Path, media: &Path, frames_dir: &Path, fps: f64) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(frames_dir)
        .with_context(|| format!("creating frames dir {:?}", frames_dir))?;

    tracing::info!("extracting frames from {:?} at {} fps", media, fps);
    let output = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(media)
        .arg("-vf")
        .arg(format!("fps={}", fps))
        .arg(frames_dir.join("frame_%05d.jpg"))
        .output()
        .with_context(|| format!("failed to start ffmpeg {:?}", ffmpeg))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("frame extraction failed ({}): {}", output.status, stderr);
    }

    let frames = list_frames(frames_dir)?;
    tracing::info!("{} frames extracted to {:?}", frames.len(), frames_dir);
    Ok(frames)
}

/// Frame images in `frames_dir`, sorted by file name (frame order).
pub fn list_frames(frames_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(frames_dir)
        .with_context(|| format!("listing frames dir {:?}", frames_dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("frame_") && n.ends_with(".jpg"))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();
    Ok(frames)
}

/// One exported audio clip for a kept diarized segment.
#[derive(Debug, Clone)]
pub struct SlicedClip {
    /// Positional index of the segment in the original diarizer output
    pub index: usize,
    pub segment: DiarizedSegment,
    pub path: PathBuf,
}

impl SlicedClip {
    /// Clip file name, used in the fused output's `wav` field.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Slice the extracted WAV into one clip per kept segment.
///
/// Applies the minimum-duration filter and names each clip
/// `spk{speaker}_{original index}.wav` so clips stay joinable to their
/// originating segment by index rather than by completion order.
pub fn slice_clips(
    wav: &Path,
    segments: &[DiarizedSegment],
    min_ms: u64,
    out_dir: &Path,
) -> Result<Vec<SlicedClip>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating clips dir {:?}", out_dir))?;

    let mut reader =
        WavReader::open(wav).with_context(|| format!("opening extracted WAV {:?}", wav))?;
    let spec = reader.spec();
    anyhow::ensure!(
        spec.sample_format == hound::SampleFormat::Int && spec.bits_per_sample == 16,
        "expected 16-bit PCM WAV, got {:?}/{} bits",
        spec.sample_format,
        spec.bits_per_sample
    );

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .context("reading WAV samples")?;
    let channels = spec.channels as usize;
    let samples_per_ms = spec.sample_rate as usize * channels / 1000;

    let kept = filter_short(segments, min_ms);
    let mut clips = Vec::with_capacity(kept.len());

    for (index, segment) in kept {
        let start_ms = (segment.start * 1000.0) as usize;
        let stop_ms = (segment.stop * 1000.0) as usize;
        let start_sample = (start_ms * samples_per_ms).min(samples.len());
        let stop_sample = (stop_ms * samples_per_ms).min(samples.len());
        if start_sample >= stop_sample {
            tracing::warn!(
                "segment {} [{:.2}-{:.2}] falls outside the waveform, skipping",
                index,
                segment.start,
                segment.stop
            );
            continue;
        }

        let path = out_dir.join(format!("spk{}_{}.wav", segment.speaker, index));
        let mut writer = WavWriter::create(&path, spec)
            .with_context(|| format!("creating clip {:?}", path))?;
        for &sample in &samples[start_sample..stop_sample] {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        clips.push(SlicedClip {
            index,
            segment,
            path,
        });
    }

    tracing::info!("kept {} clips (>= {} ms) in {:?}", clips.len(), min_ms, out_dir);
    Ok(clips)
}
