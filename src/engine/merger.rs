//! Merging of per-anchor aggregates.
//!
//! This module folds the ordered outcomes of a fan-out into a single
//! `MergedAggregate` and computes a few statistics over merged events.

use crate::engine::Completeness;
use crate::error::EngineError;
use crate::models::{Anchor, AnchoredSnapshot, Event, FetchOutcome, MergedAggregate, MissingRange};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Merge per-anchor outcomes into one chronological aggregate.
///
/// Events are concatenated in anchor order and stably sorted by event
/// time, so ties keep anchor order and then backend order. An event
/// already contributed by a different anchor is dropped.
pub fn merge(
    outcomes: Vec<(Anchor, FetchOutcome)>,
    completeness: Completeness,
) -> Result<MergedAggregate, EngineError> {
    let mut outcomes = outcomes;
    outcomes.sort_by_key(|(anchor, _)| *anchor);

    let failed: Vec<Anchor> = outcomes
        .iter()
        .filter(|(_, outcome)| !outcome.is_success())
        .map(|(anchor, _)| *anchor)
        .collect();

    if completeness == Completeness::RequireAll && !failed.is_empty() {
        return Err(EngineError::PartialOrTotalFetchFailure { failed });
    }

    let mut merged = MergedAggregate::default();
    let mut tagged: Vec<(usize, Event)> = Vec::new();

    for (index, (anchor, outcome)) in outcomes.into_iter().enumerate() {
        match outcome {
            FetchOutcome::Success(aggregate) => {
                merged.fetched.push(anchor);
                merged.snapshots.push(AnchoredSnapshot {
                    anchor,
                    data_store: aggregate.data_store,
                });
                tagged.extend(aggregate.history.into_iter().map(|event| (index, event)));
            }
            FetchOutcome::Failure(error) => {
                let cause = match error {
                    EngineError::FetchFailed { cause, .. } => cause.to_string(),
                    other => other.to_string(),
                };
                merged.missing.push(MissingRange {
                    anchor,
                    from: anchor.date,
                    to: anchor.last_day(),
                    cause,
                });
            }
        }
    }

    // Stable: equal times keep their concatenation order.
    tagged.sort_by_key(|(_, event)| event.event_time);

    let mut origin: HashMap<(String, i64, String, String), usize> = HashMap::new();
    let mut dropped = 0usize;

    for (index, event) in tagged {
        let first = *origin.entry(event.identity()).or_insert(index);
        if first != index {
            dropped += 1;
            continue;
        }
        merged.events.push(event);
    }

    if dropped > 0 {
        debug!("Dropped {} event(s) reported by more than one anchor", dropped);
    }

    Ok(merged)
}

/// Count merged events by type.
pub fn event_type_counts(events: &[Event]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();

    for event in events {
        *counts.entry(event.event_type.clone()).or_insert(0) += 1;
    }

    counts
}

/// Group merged events by the anchor window they fall into.
///
/// Events whose time is outside every window are left out.
pub fn events_by_anchor<'a>(
    events: &'a [Event],
    anchors: &[Anchor],
) -> BTreeMap<Anchor, Vec<&'a Event>> {
    let mut grouped: BTreeMap<Anchor, Vec<&'a Event>> = BTreeMap::new();

    for event in events {
        let Some(day) = chrono::DateTime::from_timestamp_millis(event.event_time)
            .map(|t| t.date_naive())
        else {
            continue;
        };

        if let Some(anchor) = anchors
            .iter()
            .find(|a| a.date <= day && day <= a.last_day())
        {
            grouped.entry(*anchor).or_default().push(event);
        }
    }

    grouped
}
