//! Reel Core
//!
//! Core types shared by every Reel crate.
//!
//! This crate contains:
//! - Domain types: video jobs, scripts, render specs, progress windows
//! - DTOs: request and response shapes exchanged over the orchestrator API

pub mod domain;
pub mod dto;
