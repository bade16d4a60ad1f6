//! Poll Lambda - Reports generation job status.
//!
//! Endpoints:
//! - GET /poll?id={jobId} - Current status, output and error of a job

use api_gateway::{poll, AppState};
use lambda_http::{run, service_fn, Error};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { poll::handler(&state, event).await }
    }))
    .await
}
