//! Concurrent fan-out of per-anchor fetches.
//!
//! Fetches run concurrently up to a limit but results are always yielded
//! in input order, so callers get one outcome per anchor sorted the same
//! way the anchors were. Dropping the returned future cancels every
//! in-flight fetch.

use crate::backend::AggregateSource;
use crate::models::{Anchor, FetchOutcome};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::debug;

/// Fetch one subject at every anchor.
pub async fn fetch_anchors<S>(
    source: &S,
    subject_id: &str,
    anchors: Vec<Anchor>,
    concurrency: usize,
    progress: &ProgressBar,
) -> Vec<(Anchor, FetchOutcome)>
where
    S: AggregateSource + ?Sized,
{
    stream::iter(anchors)
        .map(|anchor| async move {
            debug!("Dispatching fetch for anchor {}", anchor);
            let outcome = FetchOutcome::from(source.fetch_aggregate(subject_id, &anchor).await);
            debug!("Anchor {} done (success: {})", anchor, outcome.is_success());
            progress.inc(1);
            (anchor, outcome)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Fetch several subjects at a single anchor.
pub async fn fetch_subjects<S>(
    source: &S,
    subject_ids: &[String],
    anchor: Anchor,
    concurrency: usize,
    progress: &ProgressBar,
) -> Vec<(String, FetchOutcome)>
where
    S: AggregateSource + ?Sized,
{
    stream::iter(subject_ids)
        .map(|subject_id| async move {
            debug!("Dispatching fetch for {} at {}", subject_id, anchor);
            let outcome = FetchOutcome::from(source.fetch_aggregate(subject_id, &anchor).await);
            progress.inc(1);
            (subject_id.clone(), outcome)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
