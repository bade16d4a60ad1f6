//! `GET /poll?id=<jobId>`: report a job's current status.

use lambda_http::{Body, Error, Request, RequestExt, Response};
use shared::http::{error_response, json_response};
use shared::{JobId, JobService, JobStatus, PollResponse, ValidationFailure};
use tracing::info;

use crate::AppState;

pub async fn handler<S: JobService>(
    state: &AppState<S>,
    event: Request,
) -> Result<Response<Body>, Error> {
    match poll(state, &event).await {
        Ok(response) => json_response(200, &response),
        Err(e) => error_response(&e),
    }
}

async fn poll<S: JobService>(state: &AppState<S>, event: &Request) -> shared::Result<PollResponse> {
    let raw_id = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("id"))
        .ok_or_else(|| ValidationFailure::single("id", "Missing job ID"))?;
    let id = JobId::parse(raw_id)?;

    let job = state.orchestrator.status(&id).await?;

    match job.status {
        JobStatus::Succeeded => info!(job_id = %id, "Job succeeded"),
        JobStatus::Failed => info!(job_id = %id, error = ?job.error, "Job failed"),
        status => info!(job_id = %id, %status, "Job still running"),
    }

    Ok(PollResponse::from(job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, job, state, succeeded};
    use lambda_http::http;
    use serde_json::json;
    use shared::{MockJobService, ServiceError};
    use std::collections::HashMap;

    fn get(id: Option<&str>) -> Request {
        let request = http::Request::builder()
            .method("GET")
            .uri("/poll")
            .body(Body::Empty)
            .unwrap();

        match id {
            Some(id) => request.with_query_string_parameters(HashMap::from([(
                "id".to_string(),
                id.to_string(),
            )])),
            None => request,
        }
    }

    #[tokio::test]
    async fn test_succeeded_job() {
        let mut service = MockJobService::new();
        service
            .expect_fetch_status()
            .withf(|id| id.as_str() == "p-1")
            .times(1)
            .returning(|_| Ok(succeeded("https://x/a.wav")));

        let response = handler(&state(service), get(Some("p-1"))).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            body_json(&response),
            json!({ "status": "succeeded", "output": "https://x/a.wav", "error": null })
        );
    }

    #[tokio::test]
    async fn test_failed_job_reports_vendor_error() {
        let mut service = MockJobService::new();
        service.expect_fetch_status().returning(|_| {
            Ok(shared::Job {
                error: Some("quota exceeded".to_string()),
                ..job(JobStatus::Failed)
            })
        });

        let response = handler(&state(service), get(Some("p-1"))).await.unwrap();
        assert_eq!(
            body_json(&response),
            json!({ "status": "failed", "output": null, "error": "quota exceeded" })
        );
    }

    #[tokio::test]
    async fn test_missing_or_empty_id() {
        for id in [None, Some(""), Some("   ")] {
            let mut service = MockJobService::new();
            service.expect_fetch_status().never();

            let response = handler(&state(service), get(id)).await.unwrap();
            assert_eq!(response.status(), 400);
            let json = body_json(&response);
            assert_eq!(json["code"], "VALIDATION_ERROR");
            assert!(json["fieldErrors"]["id"].is_array());
        }
    }

    #[tokio::test]
    async fn test_upstream_failure() {
        let mut service = MockJobService::new();
        service
            .expect_fetch_status()
            .returning(|_| Err(ServiceError::transport("fetch_status", "connection refused").into()));

        let response = handler(&state(service), get(Some("p-1"))).await.unwrap();
        assert_eq!(response.status(), 502);
        assert_eq!(body_json(&response)["code"], "SERVICE_ERROR");
    }
}
