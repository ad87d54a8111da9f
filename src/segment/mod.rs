//! Period segmentation.
//!
//! Turns a caller-supplied period into the ordered list of anchors the
//! orchestrator issues one backend request for.

use crate::error::EngineError;
use crate::models::{Anchor, Granularity, Period};
use chrono::{Datelike, Duration, NaiveDate};

/// Monday of the calendar week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Weekly anchors for a period: one Monday per calendar week touching it.
pub fn compute_anchors(period: &Period) -> Result<Vec<Anchor>, EngineError> {
    compute_anchors_with(period, Granularity::Week)
}

/// Anchors for a period at the given granularity.
///
/// The first anchor is the start of the window containing `period.begin`;
/// anchors are then emitted every window length while they do not pass
/// `period.end`.
pub fn compute_anchors_with(
    period: &Period,
    granularity: Granularity,
) -> Result<Vec<Anchor>, EngineError> {
    if period.begin > period.end {
        return Err(EngineError::InvalidPeriod {
            begin: period.begin.to_string(),
            end: period.end.to_string(),
            reason: "begin is after end".to_string(),
        });
    }

    let first = match granularity {
        Granularity::Week => week_start(period.begin),
        Granularity::Day => period.begin,
    };
    let step = Duration::days(granularity.span_days());

    let mut anchors = Vec::with_capacity((period.days() / granularity.span_days() + 2) as usize);
    let mut current = Some(first);

    while let Some(date) = current {
        if date > period.end {
            break;
        }
        anchors.push(Anchor::new(date, granularity));
        current = date.checked_add_signed(step);
    }

    Ok(anchors)
}
