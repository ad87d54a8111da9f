//! Backend access.
//!
//! This module provides the HTTP client for the HRIS backend and the
//! trait the orchestrator fetches per-anchor aggregates through.

pub mod client;

pub use client::{BackendClient, BackendConfig};

use crate::error::EngineError;
use crate::models::{Anchor, SubjectAggregate};
use async_trait::async_trait;

/// Anything that can return the aggregate of one subject for one anchor.
#[async_trait]
pub trait AggregateSource: Send + Sync {
    /// Fetch the raw aggregate. Failures must be `EngineError::FetchFailed`
    /// scoped to `anchor`.
    async fn fetch_aggregate(
        &self,
        subject_id: &str,
        anchor: &Anchor,
    ) -> Result<SubjectAggregate, EngineError>;
}
