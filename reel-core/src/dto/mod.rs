//! Data Transfer Objects for the orchestrator API
//!
//! DTOs are the request and response bodies exchanged between the
//! orchestrator's HTTP API and its clients.

pub mod job;
