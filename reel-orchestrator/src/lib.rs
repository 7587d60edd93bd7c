//! Reel Orchestrator
//!
//! Turns a prompt into a short narrated video. Every job moves through a
//! fixed sequence of stages (script, images, narration, composition code,
//! render), each persisting its artifact before the next begins. Jobs are
//! created through `service::VideoService` and executed in the background by
//! the scheduler.

pub mod api;
pub mod artifact;
pub mod config;
pub mod db;
pub mod pipeline;
pub mod render;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod stage;
