//! Incremental face identity tracking
//!
//! Single pass over a frame sequence. Every k-th frame runs detection and
//! matching; all other frames copy the most recent detection list forward
//! (temporal hold). The identity database lives for one processing run and
//! is discarded afterwards.

use anyhow::{Context, Result};
use avdiar_types::{FaceDetection, FaceIdentity, FaceTrackTable, TrackedFace};
use tokio_util::sync::CancellationToken;

use crate::similarity::cosine_similarity;

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Cosine similarity threshold for reusing an existing identity
    pub similarity_threshold: f32,
    /// Run detection on every k-th frame; others hold the last result
    pub detect_every: usize,
    /// Emit a progress log every N frames
    pub log_every: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.915,
            detect_every: 2,
            log_every: 100,
        }
    }
}

/// Face identity tracker owning the per-run identity database.
pub struct FaceTracker {
    config: TrackerConfig,
    identities: Vec<FaceIdentity>,
    next_id: usize,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            identities: Vec::new(),
            next_id: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(TrackerConfig::default())
    }

    /// Identities created so far, in insertion order.
    pub fn identities(&self) -> &[FaceIdentity] {
        &self.identities
    }

    /// Resolve one embedding against the identity database.
    ///
    /// First-accept policy: the database is scanned in insertion order and
    /// the first identity above the threshold wins, even if a later one is
    /// more similar. This is part of the contract, not an optimization.
    fn match_identity(&self, embedding: &[f32]) -> Result<Option<String>> {
        for identity in &self.identities {
            let sim = cosine_similarity(embedding, &identity.reference)
                .with_context(|| format!("comparing against identity {}", identity.id))?;
            if sim > self.config.similarity_threshold {
                return Ok(Some(identity.id.clone()));
            }
        }
        Ok(None)
    }

    /// Process the detections of one sampled frame, creating identities for
    /// unmatched embeddings. Returns the resolved face list for that frame.
    pub fn observe(&mut self, detections: &[FaceDetection]) -> Result<Vec<TrackedFace>> {
        let mut frame_faces = Vec::with_capacity(detections.len());

        for detection in detections {
            let face_id = match self.match_identity(&detection.embedding)? {
                Some(id) => id,
                None => {
                    let id = format!("face_{}", self.next_id);
                    self.next_id += 1;
                    self.identities.push(FaceIdentity {
                        id: id.clone(),
                        reference: detection.embedding.clone(),
                    });
                    tracing::debug!("new identity {} (total {})", id, self.identities.len());
                    id
                }
            };
            frame_faces.push(TrackedFace {
                face_id,
                bbox: detection.bbox,
            });
        }

        Ok(frame_faces)
    }

    /// Run the tracker over frames `0..frame_count`.
    ///
    /// `detect` is invoked only for sampled frames (every `detect_every`-th,
    /// frame 0 included); held frames copy the last sampled result, which may
    /// be empty when the last sample had no detections. The cancellation
    /// token is honored between frames.
    pub fn track<F>(
        &mut self,
        frame_count: usize,
        cancel: &CancellationToken,
        mut detect: F,
    ) -> Result<FaceTrackTable>
    where
        F: FnMut(usize) -> Result<Vec<FaceDetection>>,
    {
        let detect_every = self.config.detect_every.max(1);
        let mut tracks: FaceTrackTable = Vec::with_capacity(frame_count);
        let mut last_faces: Vec<TrackedFace> = Vec::new();

        tracing::info!(
            "tracking faces over {} frames (threshold={}, detect_every={})",
            frame_count,
            self.config.similarity_threshold,
            detect_every
        );

        for frame in 0..frame_count {
            if cancel.is_cancelled() {
                anyhow::bail!("face tracking cancelled at frame {}", frame);
            }

            if frame % detect_every == 0 {
                let detections =
                    detect(frame).with_context(|| format!("detection failed on frame {}", frame))?;
                last_faces = self.observe(&detections)?;
            }
            tracks.push(last_faces.clone());

            if frame > 0 && frame % self.config.log_every == 0 {
                tracing::debug!("processed {} frames", frame);
            }
        }

        tracing::info!(
            "tracked {} unique faces across {} frames",
            self.identities.len(),
            frame_count
        );

        Ok(tracks)
    }
}

/// Count, per identity, the frames in which it appears. Diagnostic only.
///
/// Identities are listed in first-encounter order.
pub fn appearance_counts(tracks: &FaceTrackTable) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for frame in tracks {
        for face in frame {
            match counts.iter_mut().find(|(id, _)| *id == face.face_id) {
                Some((_, n)) => *n += 1,
                None => counts.push((face.face_id.clone(), 1)),
            }
        }
    }
    counts
}
