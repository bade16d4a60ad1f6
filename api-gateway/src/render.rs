//! `POST /render`: run a generation request to completion server-side.

use lambda_http::{Body, Error, Request, Response};
use shared::http::{error_response, json_response, parse_json_body};
use shared::{GenerationRequest, JobService, RenderResponse};
use tracing::info;
use uuid::Uuid;

use crate::AppState;

pub async fn handler<S: JobService>(
    state: &AppState<S>,
    event: Request,
) -> Result<Response<Body>, Error> {
    let request_id = Uuid::new_v4();

    match render(state, &event, request_id).await {
        Ok(response) => json_response(200, &response),
        Err(e) => error_response(&e),
    }
}

async fn render<S: JobService>(
    state: &AppState<S>,
    event: &Request,
    request_id: Uuid,
) -> shared::Result<RenderResponse> {
    let body = parse_json_body(event.body())?;
    let request = GenerationRequest::from_json(&body)?;

    let policy = state.orchestrator.poll_policy();
    info!(
        %request_id,
        mood = %request.mood,
        max_attempts = policy.max_attempts,
        interval_secs = policy.interval.as_secs(),
        "Rendering generation request"
    );

    let outcome = state.orchestrator.run(&request).await?;

    Ok(RenderResponse {
        output_url: outcome.output_url().map(str::to_string),
        job_id: outcome.job_id,
        status: "completed",
        output: outcome.output,
        attempts: outcome.attempts,
        elapsed_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
    })
}
