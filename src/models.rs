//! Data models for the retrieval engine.
//!
//! This module contains the value types exchanged between the week
//! calculator, the backend client, the orchestrator and the merger, plus
//! the request/response shapes of the single-shot backend calls.

use crate::error::EngineError;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Date format used on every wire and CLI boundary.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// An inclusive range of naive calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Build a period, rejecting `begin > end`.
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if begin > end {
            return Err(EngineError::InvalidPeriod {
                begin: begin.to_string(),
                end: end.to_string(),
                reason: "begin is after end".to_string(),
            });
        }
        Ok(Self { begin, end })
    }

    /// Parse a period from two `YYYY-MM-DD` strings.
    pub fn parse(begin: &str, end: &str) -> Result<Self, EngineError> {
        let invalid = |reason: String| EngineError::InvalidPeriod {
            begin: begin.to_string(),
            end: end.to_string(),
            reason,
        };

        let b = parse_date(begin).ok_or_else(|| invalid(format!("'{}' is not YYYY-MM-DD", begin)))?;
        let e = parse_date(end).ok_or_else(|| invalid(format!("'{}' is not YYYY-MM-DD", end)))?;

        Self::new(b, e)
    }

    /// Number of days in the period, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.begin).num_days() + 1
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.begin, self.end)
    }
}

/// How wide a single backend request is.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One request per calendar week, anchored on Monday.
    #[default]
    Week,
    /// One request per day.
    Day,
}

impl Granularity {
    /// Number of days covered by one anchor.
    pub fn span_days(&self) -> i64 {
        match self {
            Granularity::Week => 7,
            Granularity::Day => 1,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Week => write!(f, "week"),
            Granularity::Day => write!(f, "day"),
        }
    }
}

/// The first day (at midnight) of one backend request window.
///
/// With the default weekly granularity this is always a Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Anchor {
    pub date: NaiveDate,
    pub granularity: Granularity,
}

impl Anchor {
    pub fn new(date: NaiveDate, granularity: Granularity) -> Self {
        Self { date, granularity }
    }

    /// Last day covered by this anchor.
    pub fn last_day(&self) -> NaiveDate {
        self.date + Duration::days(self.granularity.span_days() - 1)
    }

    /// The window covered by this anchor as a period.
    pub fn window(&self) -> Period {
        Period {
            begin: self.date,
            end: self.last_day(),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date)
    }
}

/// One immutable event from the backend's event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Epoch milliseconds.
    pub event_time: i64,
    pub event_type: String,
    pub subject_id: String,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Identity used to detect the same event reported by two windows.
    ///
    /// `serde_json` keeps object keys sorted, so the payload rendering is
    /// stable for equal values.
    pub fn identity(&self) -> (String, i64, String, String) {
        (
            self.subject_id.clone(),
            self.event_time,
            self.event_type.clone(),
            self.payload.to_string(),
        )
    }
}

/// The backend's reconstructed aggregate for one subject and one anchor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectAggregate {
    /// Opaque current-state snapshot.
    #[serde(rename = "getDataStore", alias = "dataStore", default)]
    pub data_store: Value,
    /// Events in backend order.
    #[serde(rename = "getHistory", alias = "history", default)]
    pub history: Vec<Event>,
}

/// Result of one per-anchor fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(SubjectAggregate),
    Failure(EngineError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

impl From<Result<SubjectAggregate, EngineError>> for FetchOutcome {
    fn from(result: Result<SubjectAggregate, EngineError>) -> Self {
        match result {
            Ok(aggregate) => FetchOutcome::Success(aggregate),
            Err(e) => FetchOutcome::Failure(e),
        }
    }
}

/// A `dataStore` snapshot tagged with the anchor that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchoredSnapshot {
    pub anchor: Anchor,
    pub data_store: Value,
}

/// A date range the merged result does not cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRange {
    pub anchor: Anchor,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub cause: String,
}

/// Consolidated view over every successfully fetched anchor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedAggregate {
    /// Events across all fetched windows, chronological.
    pub events: Vec<Event>,
    /// One snapshot per successful anchor, anchor order.
    pub snapshots: Vec<AnchoredSnapshot>,
    /// Anchors that contributed.
    pub fetched: Vec<Anchor>,
    /// Ranges that could not be retrieved.
    pub missing: Vec<MissingRange>,
}

impl MergedAggregate {
    /// True when no anchor is missing.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Snapshot of the most recent successful anchor.
    pub fn latest_snapshot(&self) -> Option<&AnchoredSnapshot> {
        self.snapshots.last()
    }

    /// Restrict the missing ranges to the requested period.
    pub fn clip_missing_to(&mut self, period: &Period) {
        for range in &mut self.missing {
            range.from = range.from.max(period.begin);
            range.to = range.to.min(period.end);
        }
    }
}

/// Calendar retrieval result as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarView {
    pub subject_id: String,
    pub period: Period,
    #[serde(flatten)]
    pub aggregate: MergedAggregate,
}

/// Response of the leave-registry endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRegistry {
    pub leave_registry: SubjectAggregate,
}

/// Response of the leave-registry-id endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRegistryId {
    pub leave_registry_id: String,
}

/// One employee's day as returned by the team endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberDay {
    pub contract_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub day: Value,
    #[serde(default)]
    pub leaves: Value,
}

/// Per-member result of the multi-subject team fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMemberCalendar {
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<SubjectAggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Team schedule for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TeamSchedule {
    /// Single call to the backend team endpoint.
    TeamEndpoint {
        date: NaiveDate,
        members: Vec<TeamMemberDay>,
    },
    /// One calendar fetch per listed subject.
    FanOut {
        anchor: Anchor,
        members: Vec<TeamMemberCalendar>,
    },
}

/// Leave types the simulation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum LeaveType {
    #[serde(rename = "fr_conges_payes")]
    #[value(name = "fr_conges_payes")]
    FrCongesPayes,
    #[serde(rename = "fr_rtt")]
    #[value(name = "fr_rtt")]
    FrRtt,
}

impl fmt::Display for LeaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveType::FrCongesPayes => write!(f, "fr_conges_payes"),
            LeaveType::FrRtt => write!(f, "fr_rtt"),
        }
    }
}

/// A balance simulation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRequest {
    pub contract_id: String,
    pub leave_type: LeaveType,
    pub months: Vec<String>,
}

impl SimulationRequest {
    /// Check the identifier and that every month is `YYYY-MM`.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.contract_id.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "contract id must not be empty".to_string(),
            ));
        }
        if self.months.is_empty() {
            return Err(EngineError::InvalidInput(
                "at least one month is required".to_string(),
            ));
        }
        for month in &self.months {
            let well_formed = month.len() == 7
                && NaiveDate::parse_from_str(&format!("{}-01", month), DATE_FORMAT).is_ok();
            if !well_formed {
                return Err(EngineError::InvalidInput(format!(
                    "month '{}' must be in YYYY-MM format",
                    month
                )));
            }
        }
        Ok(())
    }
}

/// Projection for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySimulation {
    pub month: String,
    pub balance_estimation: f64,
    pub balance_lost_estimation: f64,
}

/// Response of the balance simulation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSimulation {
    pub monthly_simulations: Vec<MonthlySimulation>,
}

/// When during the day a leave starts or ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MomentOfDay {
    BeginningOfDay,
    MiddleOfDay,
    EndOfDay,
}

/// A paid holiday submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidHolidayRequest {
    pub leave_registry_id: String,
    pub begin_date: NaiveDate,
    pub begin_moment: MomentOfDay,
    pub end_date: NaiveDate,
    pub end_moment: MomentOfDay,
}

impl PaidHolidayRequest {
    /// Format checks only; leave policy is the backend's call.
    pub fn validate(&self) -> Result<(), EngineError> {
        if Uuid::parse_str(&self.leave_registry_id).is_err() {
            return Err(EngineError::InvalidInput(format!(
                "leave registry id '{}' is not a UUID",
                self.leave_registry_id
            )));
        }
        if self.begin_moment == MomentOfDay::EndOfDay {
            return Err(EngineError::InvalidInput(
                "a leave cannot begin at end-of-day".to_string(),
            ));
        }
        if self.end_moment == MomentOfDay::BeginningOfDay {
            return Err(EngineError::InvalidInput(
                "a leave cannot end at beginning-of-day".to_string(),
            ));
        }
        if self.begin_date > self.end_date {
            return Err(EngineError::InvalidInput(format!(
                "begin date {} is after end date {}",
                self.begin_date, self.end_date
            )));
        }
        Ok(())
    }
}

/// Response of the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedLeave {
    pub leave_registry_id: String,
    pub leave_record_id: String,
}
