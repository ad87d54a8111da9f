//! Period-segmented retrieval engine.
//!
//! Ties together segmentation, the concurrent fan-out and the merger:
//! `(subject, period)` in, one consolidated calendar view out.

pub mod merger;
pub mod orchestrator;

pub use merger::{event_type_counts, events_by_anchor, merge};

use crate::backend::AggregateSource;
use crate::error::EngineError;
use crate::models::{
    Anchor, CalendarView, FetchOutcome, Granularity, Period, TeamMemberCalendar, TeamSchedule,
};
use crate::segment::{compute_anchors, compute_anchors_with};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Whether a merge may return a result with missing anchors.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Completeness {
    /// Return what could be fetched, annotated with the missing ranges.
    #[default]
    ToleratePartial,
    /// Fail if any anchor could not be fetched.
    RequireAll,
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum number of concurrent backend calls.
    pub concurrency: usize,
    pub completeness: Completeness,
    pub granularity: Granularity,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            completeness: Completeness::default(),
            granularity: Granularity::default(),
        }
    }
}

/// Retrieval engine over any aggregate source.
pub struct RetrievalEngine<S> {
    source: S,
    options: EngineOptions,
    progress: ProgressBar,
}

impl<S: AggregateSource> RetrievalEngine<S> {
    pub fn new(source: S, options: EngineOptions) -> Self {
        Self {
            source,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report per-anchor progress on the given bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// The underlying source.
    #[allow(dead_code)] // Accessor for inspecting the source after a run
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Fetch every anchor of `period` for one subject.
    ///
    /// Only input errors are returned as `Err`; backend failures are
    /// reported per anchor.
    pub async fn fetch_all(
        &self,
        subject_id: &str,
        period: &Period,
    ) -> Result<Vec<(Anchor, FetchOutcome)>, EngineError> {
        validate_subject(subject_id)?;
        let anchors = match self.options.granularity {
            Granularity::Week => compute_anchors(period)?,
            other => compute_anchors_with(period, other)?,
        };

        info!(
            "Fetching {} {} window(s) for {} over {}",
            anchors.len(),
            self.options.granularity,
            subject_id,
            period
        );
        self.progress.set_length(anchors.len() as u64);

        let outcomes = orchestrator::fetch_anchors(
            &self.source,
            subject_id,
            anchors,
            self.options.concurrency,
            &self.progress,
        )
        .await;

        self.progress.finish_and_clear();

        let failed = outcomes.iter().filter(|(_, o)| !o.is_success()).count();
        if failed > 0 {
            warn!("{} of {} window(s) could not be fetched", failed, outcomes.len());
        }

        Ok(outcomes)
    }

    /// Fetch and merge the calendar of one subject over a period.
    pub async fn retrieve(
        &self,
        subject_id: &str,
        period: &Period,
    ) -> Result<CalendarView, EngineError> {
        let outcomes = self.fetch_all(subject_id, period).await?;
        let mut aggregate = merge(outcomes, self.options.completeness)?;
        aggregate.clip_missing_to(period);

        info!(
            "Merged {} event(s) from {} window(s) for {}",
            aggregate.events.len(),
            aggregate.fetched.len(),
            subject_id
        );

        Ok(CalendarView {
            subject_id: subject_id.to_string(),
            period: *period,
            aggregate,
        })
    }

    /// One-anchor, multi-subject variant: every listed member's window
    /// containing `date`.
    pub async fn team_fan_out(
        &self,
        subject_ids: &[String],
        date: NaiveDate,
    ) -> Result<TeamSchedule, EngineError> {
        if subject_ids.is_empty() {
            return Err(EngineError::InvalidInput(
                "at least one team member is required".to_string(),
            ));
        }
        for subject_id in subject_ids {
            validate_subject(subject_id)?;
        }

        let period = Period::new(date, date)?;
        let anchor = compute_anchors_with(&period, self.options.granularity)?[0];

        info!("Fetching {} team member(s) at {}", subject_ids.len(), anchor);
        self.progress.set_length(subject_ids.len() as u64);

        let outcomes = orchestrator::fetch_subjects(
            &self.source,
            subject_ids,
            anchor,
            self.options.concurrency,
            &self.progress,
        )
        .await;

        self.progress.finish_and_clear();

        let any_failed = outcomes.iter().any(|(_, o)| !o.is_success());
        if self.options.completeness == Completeness::RequireAll && any_failed {
            return Err(EngineError::PartialOrTotalFetchFailure {
                failed: vec![anchor],
            });
        }

        let members = outcomes
            .into_iter()
            .map(|(subject_id, outcome)| match outcome {
                FetchOutcome::Success(aggregate) => TeamMemberCalendar {
                    subject_id,
                    aggregate: Some(aggregate),
                    error: None,
                },
                FetchOutcome::Failure(e) => TeamMemberCalendar {
                    subject_id,
                    aggregate: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        Ok(TeamSchedule::FanOut { anchor, members })
    }
}

fn validate_subject(subject_id: &str) -> Result<(), EngineError> {
    if subject_id.trim().is_empty() {
        return Err(EngineError::InvalidInput(
            "subject id must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchCause;
    use crate::models::{Event, SubjectAggregate};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves one event per window; fails the configured subject or date.
    struct StubSource {
        fail_date: Option<NaiveDate>,
        fail_subject: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn healthy() -> Self {
            Self {
                fail_date: None,
                fail_subject: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AggregateSource for StubSource {
        async fn fetch_aggregate(
            &self,
            subject_id: &str,
            anchor: &Anchor,
        ) -> Result<SubjectAggregate, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if Some(anchor.date) == self.fail_date || Some(subject_id) == self.fail_subject {
                return Err(EngineError::FetchFailed {
                    anchor: *anchor,
                    cause: FetchCause::Transport("connection reset".to_string()),
                });
            }

            let midnight = anchor.date.and_hms_opt(0, 0, 0).unwrap().and_utc();
            Ok(SubjectAggregate {
                data_store: json!({"week": anchor.date.to_string()}),
                history: vec![Event {
                    event_time: midnight.timestamp_millis(),
                    event_type: "WeekOpened".to_string(),
                    subject_id: subject_id.to_string(),
                    payload: json!({}),
                }],
            })
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_merges_all_weeks() {
        let engine = RetrievalEngine::new(StubSource::healthy(), EngineOptions::default());
        let period = Period::parse("2023-07-15", "2023-08-10").unwrap();

        let view = engine.retrieve("EMP67890", &period).await.unwrap();

        assert_eq!(view.aggregate.events.len(), 5);
        assert_eq!(view.aggregate.snapshots.len(), 5);
        assert!(view.aggregate.is_complete());
        assert_eq!(engine.source().calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_partial_result_reports_clipped_missing_range() {
        let source = StubSource {
            fail_date: Some(date("2023-07-10")),
            ..StubSource::healthy()
        };
        let engine = RetrievalEngine::new(source, EngineOptions::default());
        let period = Period::parse("2023-07-15", "2023-07-30").unwrap();

        let view = engine.retrieve("EMP1", &period).await.unwrap();

        assert_eq!(view.aggregate.missing.len(), 1);
        assert_eq!(view.aggregate.missing[0].from, date("2023-07-15"));
        assert_eq!(view.aggregate.missing[0].to, date("2023-07-16"));
        assert_eq!(view.aggregate.fetched.len(), 2);
    }

    #[tokio::test]
    async fn test_require_all_propagates_failure() {
        let source = StubSource {
            fail_date: Some(date("2023-06-12")),
            ..StubSource::healthy()
        };
        let options = EngineOptions {
            completeness: Completeness::RequireAll,
            ..EngineOptions::default()
        };
        let engine = RetrievalEngine::new(source, options);
        let period = Period::parse("2023-06-05", "2023-06-25").unwrap();

        let err = engine.retrieve("EMP1", &period).await.unwrap_err();

        assert_eq!(
            err,
            EngineError::PartialOrTotalFetchFailure {
                failed: vec![Anchor::new(date("2023-06-12"), Granularity::Week)]
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_io() {
        let engine = RetrievalEngine::new(StubSource::healthy(), EngineOptions::default());
        let inverted = Period {
            begin: date("2023-06-25"),
            end: date("2023-06-05"),
        };

        assert!(matches!(
            engine.fetch_all("EMP1", &inverted).await,
            Err(EngineError::InvalidPeriod { .. })
        ));
        assert!(matches!(
            engine
                .fetch_all("  ", &Period::parse("2023-06-05", "2023-06-05").unwrap())
                .await,
            Err(EngineError::InvalidInput(_))
        ));
        assert_eq!(engine.source().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_daily_granularity_fetches_each_day() {
        let options = EngineOptions {
            granularity: Granularity::Day,
            ..EngineOptions::default()
        };
        let engine = RetrievalEngine::new(StubSource::healthy(), options);
        let period = Period::parse("2023-06-07", "2023-06-10").unwrap();

        let outcomes = engine.fetch_all("EMP1", &period).await.unwrap();

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].0.date, date("2023-06-07"));
    }

    #[tokio::test]
    async fn test_team_fan_out_uses_one_anchor() {
        let source = StubSource {
            fail_subject: Some("EMP2"),
            ..StubSource::healthy()
        };
        let engine = RetrievalEngine::new(source, EngineOptions::default());
        let subjects = vec!["EMP1".to_string(), "EMP2".to_string(), "EMP3".to_string()];

        let schedule = engine
            .team_fan_out(&subjects, date("2023-06-08"))
            .await
            .unwrap();

        match schedule {
            TeamSchedule::FanOut { anchor, members } => {
                assert_eq!(anchor.date, date("2023-06-05"));
                assert_eq!(members.len(), 3);
                assert!(members[0].aggregate.is_some());
                assert!(members[1].error.as_deref().unwrap().contains("connection reset"));
                assert_eq!(members[2].subject_id, "EMP3");
            }
            other => panic!("unexpected schedule: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_team_fan_out_require_all_fails_on_any_member() {
        let source = StubSource {
            fail_subject: Some("EMP2"),
            ..StubSource::healthy()
        };
        let options = EngineOptions {
            completeness: Completeness::RequireAll,
            ..EngineOptions::default()
        };
        let engine = RetrievalEngine::new(source, options);
        let subjects = vec!["EMP1".to_string(), "EMP2".to_string(), "EMP3".to_string()];

        let err = engine
            .team_fan_out(&subjects, date("2023-06-08"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::PartialOrTotalFetchFailure {
                failed: vec![Anchor::new(date("2023-06-05"), Granularity::Week)]
            }
        );
        // Siblings still ran to completion.
        assert_eq!(engine.source().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_team_fan_out_requires_members() {
        let engine = RetrievalEngine::new(StubSource::healthy(), EngineOptions::default());
        assert!(matches!(
            engine.team_fan_out(&[], date("2023-06-08")).await,
            Err(EngineError::InvalidInput(_))
        ));
    }
}
