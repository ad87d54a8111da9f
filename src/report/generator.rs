//! Markdown and JSON rendering.
//!
//! Calendars get a coverage section first so a partial result is never
//! mistaken for a complete one.

use crate::engine::{event_type_counts, events_by_anchor};
use crate::models::{
    BalanceSimulation, CalendarView, Event, LeaveRegistry, LeaveType, MergedAggregate,
    SubmittedLeave, TeamSchedule,
};
use anyhow::Result;
use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;

/// Generate a complete Markdown calendar.
pub fn generate_calendar_markdown(view: &CalendarView) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Calendar of {}\n\n", view.subject_id));
    output.push_str(&format!(
        "- **Period:** {} to {} ({} days)\n",
        view.period.begin,
        view.period.end,
        view.period.days()
    ));
    output.push_str(&format!("- **Events:** {}\n\n", view.aggregate.events.len()));

    output.push_str(&generate_coverage_section(&view.aggregate));
    output.push_str(&generate_summary_section(&view.aggregate.events));
    output.push_str(&generate_weeks_section(&view.aggregate));
    output.push_str(&generate_snapshot_section(&view.aggregate));

    output
}

/// Generate the coverage section.
fn generate_coverage_section(aggregate: &MergedAggregate) -> String {
    let mut section = String::new();

    section.push_str("## Coverage\n\n");

    if aggregate.is_complete() {
        section.push_str(&format!(
            "All {} requested window(s) were retrieved.\n\n",
            aggregate.fetched.len()
        ));
        return section;
    }

    section.push_str(&format!(
        "⚠️ **Partial result:** {} of {} window(s) could not be retrieved. \
         Events in the ranges below are missing.\n\n",
        aggregate.missing.len(),
        aggregate.missing.len() + aggregate.fetched.len()
    ));
    section.push_str("| Missing from | Missing to | Cause |\n");
    section.push_str("|:---|:---|:---|\n");
    for range in &aggregate.missing {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            range.from,
            range.to,
            escape_cell(&range.cause)
        ));
    }
    section.push('\n');

    section
}

/// Generate the event type breakdown.
fn generate_summary_section(events: &[Event]) -> String {
    let counts = event_type_counts(events);
    if counts.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Summary\n\n");
    section.push_str("| Event type | Count |\n");
    section.push_str("|:---|:---:|\n");

    let mut types: Vec<_> = counts.iter().collect();
    types.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

    for (event_type, count) in types {
        section.push_str(&format!("| {} | {} |\n", event_type, count));
    }
    section.push('\n');

    section
}

/// Generate one table of events per fetched window.
fn generate_weeks_section(aggregate: &MergedAggregate) -> String {
    let mut section = String::new();

    section.push_str("## Events\n\n");

    if aggregate.events.is_empty() {
        section.push_str("No events were recorded in the retrieved windows.\n\n");
        return section;
    }

    let grouped = events_by_anchor(&aggregate.events, &aggregate.fetched);
    let placed: usize = grouped.values().map(|v| v.len()).sum();

    for (anchor, events) in &grouped {
        section.push_str(&format!("### {} to {}\n\n", anchor.date, anchor.last_day()));
        section.push_str(&generate_event_table(events.iter().copied()));
    }

    // Events the backend timestamped outside every fetched window.
    if placed < aggregate.events.len() {
        let outside = aggregate.events.iter().filter(|event| {
            !grouped
                .values()
                .any(|v| v.iter().any(|e| std::ptr::eq(*e, *event)))
        });
        section.push_str("### Outside the requested windows\n\n");
        section.push_str(&generate_event_table(outside));
    }

    section
}

fn generate_event_table<'a>(events: impl Iterator<Item = &'a Event>) -> String {
    let mut table = String::new();

    table.push_str("| Time | Type | Details |\n");
    table.push_str("|:---|:---|:---|\n");
    for event in events {
        table.push_str(&format!(
            "| {} | {} | {} |\n",
            format_event_time(event.event_time),
            event.event_type,
            escape_cell(&compact(&event.payload))
        ));
    }
    table.push('\n');

    table
}

/// Generate the latest snapshot section.
fn generate_snapshot_section(aggregate: &MergedAggregate) -> String {
    let Some(latest) = aggregate.latest_snapshot() else {
        return String::new();
    };

    let mut section = String::new();
    section.push_str("## Latest State\n\n");
    section.push_str(&format!(
        "Snapshot of the window starting {} ({} snapshot(s) retrieved in total).\n\n",
        latest.anchor.date,
        aggregate.snapshots.len()
    ));
    section.push_str("```json\n");
    section.push_str(&pretty(&latest.data_store));
    section.push_str("\n```\n\n");

    section
}

/// Generate a Markdown team schedule.
pub fn generate_team_markdown(schedule: &TeamSchedule) -> String {
    let mut output = String::new();

    match schedule {
        TeamSchedule::TeamEndpoint { date, members } => {
            output.push_str(&format!("# Team schedule for {}\n\n", date));
            output.push_str("| Employee | Contract | Day | Leaves |\n");
            output.push_str("|:---|:---|:---|:---|\n");
            for member in members {
                output.push_str(&format!(
                    "| {} | `{}` | {} | {} |\n",
                    escape_cell(&member.name),
                    member.contract_id,
                    escape_cell(&compact(&member.day)),
                    escape_cell(&compact(&member.leaves))
                ));
            }
            output.push('\n');
        }
        TeamSchedule::FanOut { anchor, members } => {
            output.push_str(&format!(
                "# Team schedule for {} to {}\n\n",
                anchor.date,
                anchor.last_day()
            ));
            for member in members {
                output.push_str(&format!("## {}\n\n", member.subject_id));
                match (&member.aggregate, &member.error) {
                    (Some(aggregate), _) => {
                        output.push_str(&generate_event_table(aggregate.history.iter()));
                    }
                    (None, Some(error)) => {
                        output.push_str(&format!("⚠️ Not retrieved: {}\n\n", error));
                    }
                    (None, None) => output.push_str("No data.\n\n"),
                }
            }
        }
    }

    output
}

/// Generate a Markdown leave registry.
pub fn generate_registry_markdown(subject_id: &str, registry: &LeaveRegistry) -> String {
    let aggregate = &registry.leave_registry;
    let mut output = String::new();

    output.push_str(&format!("# Leave registry of {}\n\n", subject_id));
    output.push_str("## History\n\n");
    if aggregate.history.is_empty() {
        output.push_str("No leave events.\n\n");
    } else {
        output.push_str(&generate_event_table(aggregate.history.iter()));
    }
    output.push_str("## Current State\n\n```json\n");
    output.push_str(&pretty(&aggregate.data_store));
    output.push_str("\n```\n\n");

    output
}

/// Generate a Markdown balance simulation.
pub fn generate_simulation_markdown(
    subject_id: &str,
    leave_type: LeaveType,
    simulation: &BalanceSimulation,
) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# {} balance simulation for {}\n\n",
        leave_type, subject_id
    ));
    output.push_str("| Month | Balance (days) | Lost (days) |\n");
    output.push_str("|:---|---:|---:|\n");
    for month in &simulation.monthly_simulations {
        output.push_str(&format!(
            "| {} | {:.2} | {:.2} |\n",
            month.month, month.balance_estimation, month.balance_lost_estimation
        ));
    }
    output.push('\n');

    output
}

/// Generate a Markdown submission receipt.
pub fn generate_submission_markdown(submitted: &SubmittedLeave) -> String {
    format!(
        "# Paid holiday submitted\n\n- **Leave registry:** `{}`\n- **Leave record:** `{}`\n",
        submitted.leave_registry_id, submitted.leave_record_id
    )
}

/// Generate a JSON rendering of any result.
pub fn generate_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

fn format_event_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn compact(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
