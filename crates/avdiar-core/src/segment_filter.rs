//! Minimum-duration filter for diarized segments

use avdiar_types::DiarizedSegment;

/// Default minimum segment duration in milliseconds
pub const MIN_SEGMENT_MS: u64 = 400;

/// Drop diarization segments shorter than `min_ms`.
///
/// Returns kept segments paired with their original positional index, which
/// downstream stages use to name per-segment artifacts. Boundaries are
/// truncated to whole milliseconds before comparing; a segment of exactly
/// `min_ms` is retained.
pub fn filter_short(
    segments: &[DiarizedSegment],
    min_ms: u64,
) -> Vec<(usize, DiarizedSegment)> {
    let kept: Vec<(usize, DiarizedSegment)> = segments
        .iter()
        .enumerate()
        .filter(|(_, seg)| {
            let start_ms = (seg.start * 1000.0) as i64;
            let stop_ms = (seg.stop * 1000.0) as i64;
            stop_ms - start_ms >= min_ms as i64
        })
        .map(|(i, seg)| (i, seg.clone()))
        .collect();

    tracing::debug!(
        "filter_short: kept {}/{} segments (min {} ms)",
        kept.len(),
        segments.len(),
        min_ms
    );

    kept
}
