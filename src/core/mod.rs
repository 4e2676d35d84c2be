//! Core types and traits for the job engine

pub mod control;
pub mod error;
pub mod job;

pub use control::{is_processing_enabled, set_processing_enabled};
pub use error::{Result, WorkError};
pub use job::{Job, JobFailure, JobState, SharedJob};
