//! `POST /generate`: validate the request and submit a generation job.
//!
//! Responds `202` with the job id while the job runs, or `200` with the
//! output URL when the service finished during submission.

use lambda_http::{Body, Error, Request, Response};
use shared::http::{error_response, json_response, parse_json_body};
use shared::{GenerateResponse, GenerationRequest, JobService, Submission};
use tracing::info;
use uuid::Uuid;

use crate::AppState;

pub async fn handler<S: JobService>(
    state: &AppState<S>,
    event: Request,
) -> Result<Response<Body>, Error> {
    let request_id = Uuid::new_v4();

    match generate(state, &event, request_id).await {
        Ok((status, response)) => json_response(status, &response),
        Err(e) => error_response(&e),
    }
}

async fn generate<S: JobService>(
    state: &AppState<S>,
    event: &Request,
    request_id: Uuid,
) -> shared::Result<(u16, GenerateResponse)> {
    let body = parse_json_body(event.body())?;
    let request = GenerationRequest::from_json(&body)?;

    info!(
        %request_id,
        text_chars = request.text.chars().count(),
        mood = %request.mood,
        "Received generation request"
    );

    match state.orchestrator.start(&request).await? {
        Submission::Pending(job) => {
            info!(%request_id, job_id = %job.id, "Generation in progress");
            Ok((202, GenerateResponse::Processing { job_id: job.id }))
        }
        Submission::Complete(outcome) => {
            info!(%request_id, job_id = %outcome.job_id, "Generation completed immediately");
            Ok((
                200,
                GenerateResponse::Completed {
                    output_url: outcome.output_url().map(str::to_string),
                    job_id: outcome.job_id,
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, job, state, succeeded};
    use lambda_http::http;
    use serde_json::json;
    use shared::{JobStatus, MockJobService, ServiceError};

    fn post(body: &str) -> Request {
        http::Request::builder()
            .method("POST")
            .uri("/generate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepts_and_returns_processing() {
        let mut service = MockJobService::new();
        service
            .expect_submit()
            .times(1)
            .returning(|_| Ok(job(JobStatus::Starting)));

        let response = handler(&state(service), post(r#"{"text":"the bells","mood":"dark"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), 202);
        assert_eq!(
            body_json(&response),
            json!({ "jobId": "p-1", "status": "processing" })
        );
    }

    #[tokio::test]
    async fn test_immediate_completion() {
        let mut service = MockJobService::new();
        service
            .expect_submit()
            .returning(|_| Ok(succeeded("https://x/a.wav")));

        let response = handler(&state(service), post(r#"{"text":"the bells"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            body_json(&response),
            json!({ "jobId": "p-1", "status": "completed", "outputUrl": "https://x/a.wav" })
        );
    }

    #[tokio::test]
    async fn test_invalid_text_never_reaches_service() {
        let mut service = MockJobService::new();
        service.expect_submit().never();
        let state = state(service);

        let too_long = json!({ "text": "a".repeat(501) }).to_string();
        for body in [r#"{"text":""}"#, r#"{"mood":"dark"}"#, too_long.as_str()] {
            let response = handler(&state, post(body)).await.unwrap();
            assert_eq!(response.status(), 400);

            let json = body_json(&response);
            assert_eq!(json["code"], "VALIDATION_ERROR");
            assert!(json["fieldErrors"]["text"].is_array());
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let mut service = MockJobService::new();
        service.expect_submit().never();

        let response = handler(&state(service), post("{text")).await.unwrap();
        assert_eq!(response.status(), 400);
        assert!(body_json(&response)["fieldErrors"]["body"].is_array());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_service_error() {
        let mut service = MockJobService::new();
        service.expect_submit().returning(|_| {
            Err(ServiceError::status("submit", 500, r#"{"detail":"boom"}"#).into())
        });

        let response = handler(&state(service), post(r#"{"text":"the bells"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), 502);
        let json = body_json(&response);
        assert_eq!(json["code"], "SERVICE_ERROR");
        assert!(!json["error"].as_str().unwrap().contains("boom"));
    }
}
