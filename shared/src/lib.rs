//! Shared library for Whisper Synth Lambda functions.
//!
//! This crate provides the domain types, validation, prompt composition, the
//! prediction API client and the generation orchestrator used by every handler.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod replicate;
pub mod secrets;
pub mod speech;
pub mod validation;

pub use config::Config;
pub use error::{Error, ErrorCode, Result, ServiceError};
pub use models::{
    GenerateResponse, GenerationRequest, Job, JobId, JobOutput, JobStatus, Mood, PollResponse,
    RenderResponse,
};
pub use orchestrator::{Orchestrator, Outcome, PollPolicy, Submission};
pub use replicate::{JobService, ReplicateClient};
pub use validation::ValidationFailure;

#[cfg(feature = "mocks")]
pub use replicate::MockJobService;
