//! Client for the Replicate prediction API.
//!
//! Every vendor payload passes through [`parse_prediction`] before it leaves
//! this module, so callers only ever see a normalized [`Job`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Response;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{Job, JobId, JobInput, JobOutput, JobStatus};
use crate::validation::{json_type_name, FieldErrors, ValidationFailure};
use crate::{Error, Result};

/// Longest vendor error body kept in logs and error messages.
const MAX_ERROR_BODY: usize = 500;

/// Submits jobs to, and reads job status from, an asynchronous job service.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait JobService: Send + Sync {
    /// Validate and submit a job, returning its handle and initial status.
    async fn submit(&self, input: &JobInput) -> Result<Job>;

    /// Read the current status of a previously submitted job.
    async fn fetch_status(&self, id: &JobId) -> Result<Job>;
}

/// HTTP client for one Replicate account.
pub struct ReplicateClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    music_model_version: String,
    speech_model: String,
}

impl ReplicateClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
        music_model_version: impl Into<String>,
        speech_model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
            music_model_version: music_model_version.into(),
            speech_model: speech_model.into(),
        }
    }

    /// Client authenticated with the music generation token.
    pub fn for_music(config: &Config) -> Result<Self> {
        Self::with_token(config, config.music_token.clone())
    }

    /// Client authenticated with the speech synthesis token.
    pub fn for_speech(config: &Config) -> Result<Self> {
        Self::with_token(config, config.speech_token.clone())
    }

    fn with_token(config: &Config, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::new(
            http,
            config.api_url.clone(),
            token,
            config.music_model_version.clone(),
            config.speech_model.clone(),
        ))
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::Config("Prediction API token is not configured".to_string()))
    }

    fn submission(&self, input: &JobInput) -> (String, Value) {
        match input {
            JobInput::Music(music) => (
                format!("{}/v1/predictions", self.base_url),
                json!({ "version": self.music_model_version, "input": music }),
            ),
            JobInput::Speech(speech) => (
                format!("{}/v1/models/{}/predictions", self.base_url, self.speech_model),
                json!({ "input": speech }),
            ),
        }
    }
}

#[async_trait]
impl JobService for ReplicateClient {
    async fn submit(&self, input: &JobInput) -> Result<Job> {
        // An invalid outbound payload is our bug, not the caller's.
        input
            .validate()
            .map_err(|failure| Error::Internal(format!("Invalid job payload: {}", failure)))?;

        let token = self.token()?;
        let (url, body) = self.submission(input);

        info!(kind = input.kind(), "Creating prediction");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::transport("submit", e.to_string()))?;

        let payload = read_payload("submit", response).await?;
        let job = parse_prediction(&payload)
            .map_err(|failure| schema_error("submit", &failure))?;

        info!(job_id = %job.id, status = %job.status, "Prediction created");
        Ok(job)
    }

    async fn fetch_status(&self, id: &JobId) -> Result<Job> {
        let token = self.token()?;
        let url = format!(
            "{}/v1/predictions/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceError::transport("fetch_status", e.to_string()))?;

        let payload = read_payload("fetch_status", response).await?;
        let job = parse_prediction(&payload)
            .map_err(|failure| schema_error("fetch_status", &failure))?;
        let job = ensure_requested(id, job)?;

        debug!(job_id = %job.id, status = %job.status, "Fetched prediction status");
        Ok(job)
    }
}

async fn read_payload(operation: &'static str, response: Response) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ServiceError::transport(operation, e.to_string()))?;

    if !status.is_success() {
        let body = truncate(&body, MAX_ERROR_BODY);
        warn!(operation, status = status.as_u16(), body = %body, "Prediction API returned an error");
        return Err(ServiceError::status(operation, status.as_u16(), body).into());
    }

    serde_json::from_str(&body).map_err(|e| {
        ServiceError::schema(operation, format!("Response is not valid JSON: {}", e)).into()
    })
}

/// The vendor must answer with the job that was asked for.
fn ensure_requested(id: &JobId, job: Job) -> Result<Job> {
    if &job.id != id {
        return Err(ServiceError::schema(
            "fetch_status",
            format!("Asked for job {} but received {}", id, job.id),
        )
        .into());
    }
    Ok(job)
}

fn schema_error(operation: &'static str, failure: &ValidationFailure) -> Error {
    let fields = failure
        .field_errors
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
        .collect::<Vec<_>>()
        .join(", ");
    ServiceError::schema(operation, format!("Invalid prediction payload ({})", fields)).into()
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Validate a prediction payload and normalize it into a [`Job`].
///
/// A `succeeded` prediction must carry a usable output. Partial output
/// streamed while a job is still running, and error text on anything but a
/// `failed` job, are dropped.
pub fn parse_prediction(payload: &Value) -> std::result::Result<Job, ValidationFailure> {
    let Some(fields) = payload.as_object() else {
        return Err(ValidationFailure::single(
            "body",
            format!("Prediction must be a JSON object, got {}", json_type_name(payload)),
        ));
    };

    let mut errors = FieldErrors::default();

    let id = match fields.get("id") {
        Some(Value::String(raw)) => match JobId::parse(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("id", "Job ID cannot be empty");
                None
            }
        },
        Some(Value::Null) | None => {
            errors.add("id", "Job ID is required");
            None
        }
        Some(other) => {
            errors.add("id", format!("Job ID must be a string, got {}", json_type_name(other)));
            None
        }
    };

    let status = match fields.get("status") {
        Some(Value::String(raw)) => match raw.parse::<JobStatus>() {
            Ok(status) => Some(status),
            Err(message) => {
                errors.add("status", message);
                None
            }
        },
        Some(Value::Null) | None => {
            errors.add("status", "Status is required");
            None
        }
        Some(other) => {
            errors.add(
                "status",
                format!("Status must be a string, got {}", json_type_name(other)),
            );
            None
        }
    };

    let output = normalize_output(fields.get("output").unwrap_or(&Value::Null));

    let error = match fields.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(Value::Null) | None => None,
        Some(other) => {
            errors.add(
                "error",
                format!("Error must be a string or null, got {}", json_type_name(other)),
            );
            None
        }
    };

    let output = match output {
        Ok(None) if status == Some(JobStatus::Succeeded) => {
            errors.add("output", "Succeeded job has no output");
            None
        }
        Ok(output) => output,
        Err(message) => {
            errors.add("output", message);
            None
        }
    };

    errors.into_result()?;

    let (Some(id), Some(status)) = (id, status) else {
        return Err(ValidationFailure::single("body", "Prediction is incomplete"));
    };

    Ok(Job {
        id,
        status,
        output: if status == JobStatus::Succeeded { output } else { None },
        error: if status == JobStatus::Failed { error } else { None },
        created_at: timestamp(fields.get("created_at")),
        completed_at: timestamp(fields.get("completed_at")),
    })
}

/// Collapse the vendor's output shapes into a [`JobOutput`].
///
/// Accepts a URL string, a list of URL strings, a file-reference object
/// (`{"url": ...}`), an audio object (`{"audio_out": ...}` or
/// `{"audio": ...}`), or a list of file-reference objects.
pub fn normalize_output(value: &Value) -> std::result::Result<Option<JobOutput>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(_) | Value::Object(_) => file_url(value).map(|url| Some(JobOutput::Single(url))),
        Value::Array(items) => {
            if items.is_empty() {
                return Err("Output list is empty".to_string());
            }
            let urls = items
                .iter()
                .map(file_url)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Some(JobOutput::Multiple(urls)))
        }
        other => Err(format!(
            "Output must be a URL, a list of URLs or a file object, got {}",
            json_type_name(other)
        )),
    }
}

fn file_url(value: &Value) -> std::result::Result<String, String> {
    let url = match value {
        Value::String(url) => Some(url.as_str()),
        Value::Object(fields) => ["url", "audio_out", "audio"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str)),
        other => {
            return Err(format!(
                "Output entry must be a URL or a file object, got {}",
                json_type_name(other)
            ))
        }
    };

    url.map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| "Output entry has no URL".to_string())
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
