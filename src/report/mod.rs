//! Rendering of retrieval results for the calling layer.

pub mod generator;

pub use generator::{
    generate_calendar_markdown, generate_json, generate_registry_markdown,
    generate_simulation_markdown, generate_submission_markdown, generate_team_markdown,
};
