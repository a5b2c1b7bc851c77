//! Batch transcription workflows
//!
//! Two entry points: [`transcribe_batch`] drives the remote service through
//! its upload/submit/poll phases, [`transcribe_clips`] fans a local engine
//! out over a bounded worker pool. Both return one [`ClipOutcome`] per input
//! clip, in input order.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use avdiar_types::ClipOutcome;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::remote::{JobStatus, TranscriptionService};
use crate::traits::Transcriber;

/// Batch workflow parameters
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Concurrent uploads in flight
    pub upload_width: usize,
    /// Attempts per upload before the failure escalates
    pub upload_attempts: u32,
    /// Delay between poll cycles
    pub poll_interval: Duration,
    /// Overall deadline for the polling phase; pending jobs time out after it
    pub deadline: Duration,
    /// Consecutive transport failures tolerated per job while polling
    pub poll_failure_budget: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            upload_width: 8,
            upload_attempts: 3,
            poll_interval: Duration::from_secs(4),
            deadline: Duration::from_secs(15 * 60),
            poll_failure_budget: 20,
        }
    }
}

/// Per-job polling state.
#[derive(Debug, Clone)]
enum JobState {
    Pending { failures: u32 },
    Completed(String),
    Failed(String),
    TimedOut,
}

impl JobState {
    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

/// Transcribe clips through the remote service.
///
/// Phase 1 uploads all clips on a bounded pool, retrying transient failures
/// with exponential backoff; a non-transient upload failure aborts the batch.
/// Phase 2 submits one job per uploaded clip, sequentially. Phase 3 polls
/// every still-pending job once per cycle until all jobs are terminal or the
/// deadline expires; transport errors while polling are swallowed up to the
/// per-job budget. Cancellation is honored between uploads and between poll
/// cycles.
pub async fn transcribe_batch(
    service: &dyn TranscriptionService,
    clips: &[PathBuf],
    config: &BatchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<ClipOutcome>> {
    if clips.is_empty() {
        return Ok(Vec::new());
    }

    tracing::info!("uploading {} clips (width {})", clips.len(), config.upload_width);
    let upload_urls: Vec<String> = stream::iter(clips.iter())
        .map(|clip| upload_with_retry(service, clip, config, cancel))
        .buffered(config.upload_width.max(1))
        .try_collect()
        .await?;

    let mut job_ids = Vec::with_capacity(upload_urls.len());
    for (clip, url) in clips.iter().zip(&upload_urls) {
        let id = service
            .submit(url)
            .await
            .with_context(|| format!("submitting transcription job for {:?}", clip))?;
        job_ids.push(id);
    }
    tracing::info!("submitted {} transcription jobs", job_ids.len());

    let states = poll_until_terminal(service, &job_ids, config, cancel).await?;

    let outcomes: Vec<ClipOutcome> = states
        .into_iter()
        .map(|state| match state {
            JobState::Completed(text) => ClipOutcome::Transcribed { text },
            JobState::Failed(reason) => ClipOutcome::Failed { reason },
            JobState::TimedOut => ClipOutcome::TimedOut,
            JobState::Pending { .. } => ClipOutcome::TimedOut,
        })
        .collect();

    log_summary(&outcomes);
    Ok(outcomes)
}

async fn upload_with_retry(
    service: &dyn TranscriptionService,
    clip: &Path,
    config: &BatchConfig,
    cancel: &CancellationToken,
) -> Result<String> {
    let attempts = config.upload_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            anyhow::bail!("upload cancelled");
        }

        match service.upload(clip).await {
            Ok(url) => return Ok(url),
            Err(err) if err.is_retryable() && attempt < attempts => {
                let backoff = Duration::from_secs(2 * attempt as u64);
                tracing::warn!(
                    "upload of {:?} failed (attempt {}/{}): {}; retrying in {:?}",
                    clip,
                    attempt,
                    attempts,
                    err,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("uploading {:?}", clip));
            }
        }
    }
}

async fn poll_until_terminal(
    service: &dyn TranscriptionService,
    job_ids: &[String],
    config: &BatchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<JobState>> {
    let mut states = vec![JobState::Pending { failures: 0 }; job_ids.len()];
    let started = Instant::now();

    loop {
        if states.iter().all(JobState::is_terminal) {
            return Ok(states);
        }
        if cancel.is_cancelled() {
            anyhow::bail!("transcription batch cancelled while polling");
        }
        if started.elapsed() >= config.deadline {
            let stuck = states.iter().filter(|s| !s.is_terminal()).count();
            tracing::warn!(
                "polling deadline of {:?} reached with {} jobs still pending",
                config.deadline,
                stuck
            );
            for state in &mut states {
                if !state.is_terminal() {
                    *state = JobState::TimedOut;
                }
            }
            return Ok(states);
        }

        for (i, job_id) in job_ids.iter().enumerate() {
            let JobState::Pending { failures } = states[i] else {
                continue;
            };

            match service.poll(job_id).await {
                Ok(JobStatus::Pending) => {}
                Ok(JobStatus::Completed(text)) => {
                    tracing::debug!("job {} completed", job_id);
                    states[i] = JobState::Completed(text);
                }
                Ok(JobStatus::Failed(reason)) => {
                    tracing::warn!("job {} failed: {}", job_id, reason);
                    states[i] = JobState::Failed(reason);
                }
                Err(err) if err.is_retryable() => {
                    // Transient poll errors are swallowed and retried on the
                    // next cycle, up to the per-job budget.
                    let failures = failures + 1;
                    if failures >= config.poll_failure_budget {
                        states[i] = JobState::Failed(format!(
                            "poll failure budget exhausted after {} attempts: {}",
                            failures, err
                        ));
                    } else {
                        tracing::debug!("poll of job {} failed ({}), will retry", job_id, err);
                        states[i] = JobState::Pending { failures };
                    }
                }
                Err(err) => {
                    states[i] = JobState::Failed(err.to_string());
                }
            }
        }

        if !states.iter().all(JobState::is_terminal) {
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }
}

/// Transcribe clips with a local engine on a bounded worker pool.
///
/// Completion order is irrelevant: results are re-joined to their clip by
/// index. A failing clip degrades to a `Failed` outcome instead of aborting
/// the batch.
pub async fn transcribe_clips(
    transcriber: &dyn Transcriber,
    clips: &[PathBuf],
    width: usize,
    cancel: &CancellationToken,
) -> Vec<ClipOutcome> {
    let mut indexed: Vec<(usize, ClipOutcome)> = stream::iter(clips.iter().enumerate())
        .map(|(i, clip)| async move {
            if cancel.is_cancelled() {
                return (
                    i,
                    ClipOutcome::Failed {
                        reason: "cancelled".to_string(),
                    },
                );
            }
            match transcriber.transcribe(clip).await {
                Ok(segments) => {
                    let text = segments
                        .iter()
                        .map(|s| s.text.trim())
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    (i, ClipOutcome::Transcribed { text })
                }
                Err(err) => {
                    tracing::warn!("transcription of {:?} failed: {:#}", clip, err);
                    (
                        i,
                        ClipOutcome::Failed {
                            reason: err.to_string(),
                        },
                    )
                }
            }
        })
        .buffer_unordered(width.max(1))
        .collect()
        .await;

    indexed.sort_by_key(|(i, _)| *i);
    let outcomes: Vec<ClipOutcome> = indexed.into_iter().map(|(_, o)| o).collect();
    log_summary(&outcomes);
    outcomes
}

fn log_summary(outcomes: &[ClipOutcome]) {
    let transcribed = outcomes.iter().filter(|o| o.text().is_some()).count();
    let timed_out = outcomes
        .iter()
        .filter(|o| matches!(o, ClipOutcome::TimedOut))
        .count();
    let failed = outcomes.len() - transcribed - timed_out;

    if failed > 0 || timed_out > 0 {
        tracing::warn!(
            "transcription batch: {} transcribed, {} failed, {} timed out",
            transcribed,
            failed,
            timed_out
        );
    } else {
        tracing::info!("transcription batch: all {} clips transcribed", transcribed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ProviderError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Scripted service double: each clip/job follows a fixed sequence of
    /// responses.
    struct ScriptedService {
        upload_failures_before_success: u32,
        upload_attempts: Mutex<u32>,
        /// job id -> polls before the terminal status
        polls_required: HashMap<String, u32>,
        poll_counts: Mutex<HashMap<String, u32>>,
        terminal: HashMap<String, JobStatus>,
        poll_error: Option<fn() -> ProviderError>,
    }

    impl ScriptedService {
        fn completing(polls: u32) -> Self {
            let mut polls_required = HashMap::new();
            polls_required.insert("job_0".to_string(), polls);
            let mut terminal = HashMap::new();
            terminal.insert(
                "job_0".to_string(),
                JobStatus::Completed("hello".to_string()),
            );
            Self {
                upload_failures_before_success: 0,
                upload_attempts: Mutex::new(0),
                polls_required,
                poll_counts: Mutex::new(HashMap::new()),
                terminal,
                poll_error: None,
            }
        }
    }

    #[async_trait]
    impl TranscriptionService for ScriptedService {
        async fn upload(&self, _clip: &Path) -> Result<String, ProviderError> {
            let mut attempts = self.upload_attempts.lock().unwrap();
            *attempts += 1;
            if *attempts <= self.upload_failures_before_success {
                return Err(ProviderError::Network("connection reset".to_string()));
            }
            Ok(format!("https://upload/{}", *attempts))
        }

        async fn submit(&self, _audio_url: &str) -> Result<String, ProviderError> {
            Ok("job_0".to_string())
        }

        async fn poll(&self, job_id: &str) -> Result<JobStatus, ProviderError> {
            if let Some(make_error) = self.poll_error {
                return Err(make_error());
            }
            let mut counts = self.poll_counts.lock().unwrap();
            let count = counts.entry(job_id.to_string()).or_insert(0);
            *count += 1;
            let required = self.polls_required.get(job_id).copied().unwrap_or(0);
            if *count > required {
                Ok(self
                    .terminal
                    .get(job_id)
                    .cloned()
                    .unwrap_or(JobStatus::Pending))
            } else {
                Ok(JobStatus::Pending)
            }
        }
    }

    fn clips(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("clip_{}.wav", i))).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_completes_after_pending_polls() {
        let service = ScriptedService::completing(2);
        let outcomes = transcribe_batch(
            &service,
            &clips(1),
            &BatchConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcomes,
            vec![ClipOutcome::Transcribed {
                text: "hello".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_reports_failed_job() {
        let mut service = ScriptedService::completing(0);
        service
            .terminal
            .insert("job_0".to_string(), JobStatus::Failed("bad audio".to_string()));

        let outcomes = transcribe_batch(
            &service,
            &clips(1),
            &BatchConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcomes,
            vec![ClipOutcome::Failed {
                reason: "bad audio".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_times_out_stuck_job() {
        // Job never leaves pending; a short deadline converts it to TimedOut.
        let service = ScriptedService::completing(u32::MAX);
        let config = BatchConfig {
            deadline: Duration::from_secs(10),
            ..BatchConfig::default()
        };

        let outcomes = transcribe_batch(&service, &clips(1), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcomes, vec![ClipOutcome::TimedOut]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_retries_transient_failures() {
        let mut service = ScriptedService::completing(0);
        service.upload_failures_before_success = 2;

        let outcomes = transcribe_batch(
            &service,
            &clips(1),
            &BatchConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(*service.upload_attempts.lock().unwrap(), 3);
        assert!(outcomes[0].text().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_gives_up_after_attempt_cap() {
        let mut service = ScriptedService::completing(0);
        service.upload_failures_before_success = u32::MAX;

        let result = transcribe_batch(
            &service,
            &clips(1),
            &BatchConfig::default(),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*service.upload_attempts.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_upload_error_is_fatal() {
        struct AuthFailing;
        #[async_trait]
        impl TranscriptionService for AuthFailing {
            async fn upload(&self, _clip: &Path) -> Result<String, ProviderError> {
                Err(ProviderError::Auth)
            }
            async fn submit(&self, _audio_url: &str) -> Result<String, ProviderError> {
                unreachable!()
            }
            async fn poll(&self, _job_id: &str) -> Result<JobStatus, ProviderError> {
                unreachable!()
            }
        }

        let result = transcribe_batch(
            &AuthFailing,
            &clips(1),
            &BatchConfig::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_budget_exhaustion() {
        let mut service = ScriptedService::completing(0);
        service.poll_error = Some(|| ProviderError::Network("reset".to_string()));
        let config = BatchConfig {
            poll_failure_budget: 3,
            ..BatchConfig::default()
        };

        let outcomes = transcribe_batch(&service, &clips(1), &config, &CancellationToken::new())
            .await
            .unwrap();

        match &outcomes[0] {
            ClipOutcome::Failed { reason } => {
                assert!(reason.contains("poll failure budget exhausted"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch() {
        let service = ScriptedService::completing(0);
        let outcomes = transcribe_batch(
            &service,
            &[],
            &BatchConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(outcomes.is_empty());
    }

    struct FailingSecondClip;

    #[async_trait]
    impl Transcriber for FailingSecondClip {
        fn name(&self) -> &str {
            "test"
        }

        async fn transcribe(
            &self,
            audio: &Path,
        ) -> anyhow::Result<Vec<avdiar_types::TranscribedSegment>> {
            if audio.to_string_lossy().contains("clip_1") {
                anyhow::bail!("decode error");
            }
            Ok(vec![avdiar_types::TranscribedSegment {
                start: 0.0,
                end: 1.0,
                text: format!(" text for {} ", audio.display()),
            }])
        }
    }

    #[tokio::test]
    async fn test_local_pool_rejoins_by_index_and_degrades() {
        let outcomes =
            transcribe_clips(&FailingSecondClip, &clips(3), 2, &CancellationToken::new()).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].text().unwrap().contains("clip_0"));
        assert!(matches!(outcomes[1], ClipOutcome::Failed { .. }));
        assert!(outcomes[2].text().unwrap().contains("clip_2"));
    }
}
