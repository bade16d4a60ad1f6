//! Generate Lambda - Submits whisper-music generation jobs.
//!
//! Endpoints:
//! - POST /generate - Validate text and mood, start a generation job

use api_gateway::{generate, AppState};
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
        async move { generate::handler(&state, event).await }
    }))
    .await
}
