//! HTTP handlers for the Whisper Synth API.
//!
//! Each endpoint is deployed as its own Lambda binary under `src/bin`; the
//! handlers live here so they can be exercised against a mocked job service.

pub mod generate;
pub mod poll;
pub mod render;

use shared::{Config, Orchestrator, ReplicateClient};

/// Application state shared across requests.
pub struct AppState<S> {
    pub orchestrator: Orchestrator<S>,
}

impl AppState<ReplicateClient> {
    /// Load configuration and build the production clients.
    pub async fn new() -> Result<Self, lambda_http::Error> {
        let config = Config::load().await?;
        Ok(Self {
            orchestrator: Orchestrator::from_config(&config)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use lambda_http::{Body, Response};
    use serde_json::Value;
    use shared::orchestrator::GenerationSettings;
    use shared::{Job, JobId, JobOutput, JobStatus, MockJobService, Orchestrator, PollPolicy};

    use crate::AppState;

    pub fn state(service: MockJobService) -> AppState<MockJobService> {
        AppState {
            orchestrator: Orchestrator::new(
                service,
                GenerationSettings::default(),
                PollPolicy {
                    interval: Duration::from_secs(2),
                    max_attempts: 3,
                },
            ),
        }
    }

    pub fn job(status: JobStatus) -> Job {
        Job {
            id: JobId::parse("p-1").unwrap(),
            status,
            output: None,
            error: None,
            created_at: None,
            completed_at: None,
        }
    }

    pub fn succeeded(url: &str) -> Job {
        Job {
            output: Some(JobOutput::Single(url.to_string())),
            ..job(JobStatus::Succeeded)
        }
    }

    pub fn body_json(response: &Response<Body>) -> Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }
}
