//! Render Lambda - Runs a generation job to completion.
//!
//! Endpoints:
//! - POST /render - Submit a job and poll it until it finishes or times out

use api_gateway::{render, AppState};
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
        async move { render::handler(&state, event).await }
    }))
    .await
}
