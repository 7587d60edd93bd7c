//! Service Module
//!
//! Business logic layer for the orchestrator. `VideoService` is the
//! programmatic surface: it validates requests, writes jobs through the
//! repository and hands them to the scheduler. Reads resolve artifact ids
//! into URLs at query time.

pub mod error;
pub mod history;
pub mod query;
pub mod video;

pub use error::{ServiceError, ServiceResult};
pub use video::VideoService;
