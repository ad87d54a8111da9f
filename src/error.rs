//! Error taxonomy for the retrieval engine and the backend client.

use crate::models::Anchor;
use thiserror::Error;

/// Why a single backend call did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchCause {
    /// The request never got a response (connect, timeout, TLS...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchCause {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchCause::Decode(e.to_string())
        } else if e.is_timeout() {
            FetchCause::Transport(format!("request timed out: {}", e))
        } else if e.is_connect() {
            FetchCause::Transport(format!("cannot connect to backend: {}", e))
        } else {
            FetchCause::Transport(e.to_string())
        }
    }
}

/// Errors surfaced by the engine and the single-shot calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed or inverted period. Raised before any I/O.
    #[error("invalid period {begin}..{end}: {reason}")]
    InvalidPeriod {
        begin: String,
        end: String,
        reason: String,
    },

    /// Malformed argument to one of the single-shot calls.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// One per-anchor backend call failed.
    #[error("fetch for anchor {anchor} failed: {cause}")]
    FetchFailed {
        anchor: Anchor,
        #[source]
        cause: FetchCause,
    },

    /// Completeness was required and at least one anchor failed.
    #[error(
        "could not retrieve {} of the requested anchors: {}",
        .failed.len(),
        join_anchors(.failed)
    )]
    PartialOrTotalFetchFailure { failed: Vec<Anchor> },

    /// A single-shot call (registry, team, simulation, submission) failed.
    #[error("{operation} failed: {cause}")]
    Request {
        operation: &'static str,
        #[source]
        cause: FetchCause,
    },
}

impl EngineError {
    /// Anchors this error refers to, if any.
    #[allow(dead_code)] // Convenience accessor for callers matching on failures
    pub fn anchors(&self) -> Vec<Anchor> {
        match self {
            EngineError::FetchFailed { anchor, .. } => vec![*anchor],
            EngineError::PartialOrTotalFetchFailure { failed } => failed.clone(),
            _ => Vec::new(),
        }
    }
}

fn join_anchors(anchors: &[Anchor]) -> String {
    anchors
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
