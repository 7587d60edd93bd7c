//! Core domain types
//!
//! These types describe the video pipeline's business entities. They are
//! shared between the orchestrator (which persists and mutates them) and the
//! client/CLI (which only read them).

pub mod artifact;
pub mod job;
pub mod progress;
pub mod render;
pub mod script;
