//! Shared data models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::validation::{self, json_type_name, FieldErrors, ValidationFailure};

/// Atmosphere selector for the generated piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Dark,
    #[default]
    Eerie,
    Melancholic,
}

impl Mood {
    pub const ALL: [Mood; 3] = [Mood::Dark, Mood::Eerie, Mood::Melancholic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Dark => "dark",
            Mood::Eerie => "eerie",
            Mood::Melancholic => "melancholic",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == s)
            .ok_or_else(|| {
                format!("Invalid mood '{}': expected one of dark, eerie, melancholic", s)
            })
    }
}

/// A validated request to generate music from text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
pub struct GenerationRequest {
    #[validate(length(min = 1, max = 500, message = "Text must be between 1 and 500 characters"))]
    pub text: String,
    pub mood: Mood,
}

impl GenerationRequest {
    const FIELDS: &'static [&'static str] = &["text", "mood"];

    /// Validate an untyped request body.
    ///
    /// `text` is trimmed before its length is checked; `lyrics` is accepted
    /// as an alias. A missing or null `mood` falls back to the default.
    pub fn from_json(body: &Value) -> Result<Self, ValidationFailure> {
        let Some(fields) = body.as_object() else {
            return Err(ValidationFailure::single(
                "body",
                format!("Request body must be a JSON object, got {}", json_type_name(body)),
            ));
        };

        let mut errors = FieldErrors::default();

        let text_field = ["text", "lyrics"]
            .iter()
            .find_map(|key| fields.get(*key).filter(|value| !value.is_null()));
        let text = match text_field {
            Some(Value::String(s)) => Some(s.trim().to_string()),
            None => {
                errors.add("text", "Text is required");
                None
            }
            Some(other) => {
                errors.add(
                    "text",
                    format!("Text must be a string, got {}", json_type_name(other)),
                );
                None
            }
        };

        let mood = match fields.get("mood") {
            Some(Value::Null) | None => Ok(Mood::default()),
            Some(Value::String(s)) => s.parse::<Mood>(),
            Some(other) => Err(format!("Mood must be a string, got {}", json_type_name(other))),
        };

        let request = GenerationRequest {
            text: text.clone().unwrap_or_default(),
            mood: mood.clone().unwrap_or_default(),
        };

        if text.is_some() {
            if let Err(e) = request.validate() {
                errors.merge(&e, Self::FIELDS);
            }
        }
        if let Err(message) = mood {
            errors.add("mood", message);
        }

        errors.into_result()?;
        Ok(request)
    }
}

/// Vendor-assigned job handle. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn parse(raw: &str) -> Result<Self, ValidationFailure> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationFailure::single("id", "Job ID cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    /// No further transition happens once a job reaches one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(JobStatus::Starting),
            "processing" => Ok(JobStatus::Processing),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            other => Err(format!("Unknown job status '{}'", other)),
        }
    }
}

/// Location(s) of a finished job's generated asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    Single(String),
    Multiple(Vec<String>),
}

impl JobOutput {
    /// The URL a player should load.
    pub fn primary_url(&self) -> Option<&str> {
        match self {
            JobOutput::Single(url) => Some(url),
            JobOutput::Multiple(urls) => urls.first().map(String::as_str),
        }
    }
}

/// Snapshot of a remote job, as last reported by the service.
///
/// Built only from a validated vendor payload, so `output` is set only for
/// `succeeded` jobs and `error` only for `failed` ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub output: Option<JobOutput>,
    pub error: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            other => Err(format!("Unsupported output format '{}'", other)),
        }
    }
}

/// Outbound payload for the music generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct MusicGenInput {
    #[validate(length(min = 1, message = "Prompt cannot be empty"))]
    pub prompt: String,
    #[validate(range(min = 1, max = 300, message = "Duration must be between 1 and 300 seconds"))]
    pub duration: u32,
    pub output_format: OutputFormat,
    /// `false` selects melody conditioning when `input_audio` is set
    pub continuation: bool,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub classifier_free_guidance: u32,
    pub normalization_strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Input audio URL cannot be empty"))]
    pub input_audio: Option<String>,
}

impl MusicGenInput {
    const FIELDS: &'static [&'static str] = &["prompt", "duration", "input_audio"];

    /// Payload with the fixed generation hyperparameters.
    pub fn new(prompt: String, duration: u32, output_format: OutputFormat) -> Self {
        Self {
            prompt,
            duration,
            output_format,
            continuation: false,
            temperature: 1.0,
            top_k: 250,
            top_p: 0.0,
            classifier_free_guidance: 3,
            normalization_strategy: "loudness".to_string(),
            input_audio: None,
        }
    }
}

/// Outbound payload for the text-to-speech model.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct SpeechInput {
    #[validate(length(min = 1, message = "Speech text cannot be empty"))]
    pub text: String,
    #[validate(length(min = 1, message = "Voice ID cannot be empty"))]
    pub voice_id: String,
}

impl SpeechInput {
    const FIELDS: &'static [&'static str] = &["text", "voice_id"];
}

/// Anything that can be submitted as a remote job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobInput {
    Music(MusicGenInput),
    Speech(SpeechInput),
}

impl JobInput {
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        match self {
            JobInput::Music(input) => validation::check(input, MusicGenInput::FIELDS),
            JobInput::Speech(input) => validation::check(input, SpeechInput::FIELDS),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobInput::Music(_) => "music",
            JobInput::Speech(_) => "speech",
        }
    }
}

/// `POST /generate` response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GenerateResponse {
    #[serde(rename_all = "camelCase")]
    Processing { job_id: JobId },
    #[serde(rename_all = "camelCase")]
    Completed {
        job_id: JobId,
        output_url: Option<String>,
    },
}

/// `GET /poll` response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResponse {
    pub status: JobStatus,
    pub output: Option<JobOutput>,
    pub error: Option<String>,
}

impl From<Job> for PollResponse {
    fn from(job: Job) -> Self {
        Self {
            status: job.status,
            output: job.output,
            error: job.error,
        }
    }
}

/// `POST /render` response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub job_id: JobId,
    pub status: &'static str,
    pub output_url: Option<String>,
    pub output: JobOutput,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_trims_and_defaults_mood() {
        let request = GenerationRequest::from_json(&json!({ "text": "  the house is quiet  " }))
            .unwrap();
        assert_eq!(request.text, "the house is quiet");
        assert_eq!(request.mood, Mood::Eerie);
    }

    #[test]
    fn test_request_accepts_lyrics_alias() {
        let request =
            GenerationRequest::from_json(&json!({ "lyrics": "ashes", "mood": "dark" })).unwrap();
        assert_eq!(request.text, "ashes");
        assert_eq!(request.mood, Mood::Dark);
    }

    #[test]
    fn test_null_text_falls_back_to_lyrics() {
        let request =
            GenerationRequest::from_json(&json!({ "text": null, "lyrics": "ashes" })).unwrap();
        assert_eq!(request.text, "ashes");

        let failure =
            GenerationRequest::from_json(&json!({ "text": null, "lyrics": null })).unwrap_err();
        assert_eq!(failure.message, "Text is required");
    }

    #[test]
    fn test_request_rejects_empty_and_whitespace_text() {
        for text in ["", "   \n\t"] {
            let failure = GenerationRequest::from_json(&json!({ "text": text })).unwrap_err();
            assert_eq!(failure.message, "Text must be between 1 and 500 characters");
            assert!(failure.field_errors.contains_key("text"));
        }
    }

    #[test]
    fn test_request_length_counts_characters() {
        let at_limit = "é".repeat(500);
        assert!(GenerationRequest::from_json(&json!({ "text": at_limit })).is_ok());

        let over = "a".repeat(501);
        let failure = GenerationRequest::from_json(&json!({ "text": over })).unwrap_err();
        assert!(failure.field_errors.contains_key("text"));
    }

    #[test]
    fn test_request_reports_every_field() {
        let failure =
            GenerationRequest::from_json(&json!({ "text": 7, "mood": "cheerful" })).unwrap_err();
        assert_eq!(failure.message, "Text must be a string, got number");
        assert_eq!(
            failure.field_errors["mood"],
            vec!["Invalid mood 'cheerful': expected one of dark, eerie, melancholic"]
        );
    }

    #[test]
    fn test_request_rejects_non_object_body() {
        let failure = GenerationRequest::from_json(&json!(["text"])).unwrap_err();
        assert!(failure.field_errors.contains_key("body"));
    }

    #[test]
    fn test_job_id_must_not_be_empty() {
        assert!(JobId::parse("  ").is_err());
        assert_eq!(JobId::parse("abc123").unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Starting.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_music_input_validation() {
        let input = MusicGenInput::new(String::new(), 0, OutputFormat::Wav);
        let failure = JobInput::Music(input).validate().unwrap_err();
        assert_eq!(failure.message, "Prompt cannot be empty");
        assert!(failure.field_errors.contains_key("duration"));

        let input = MusicGenInput::new("haunting".to_string(), 30, OutputFormat::Mp3);
        assert!(JobInput::Music(input).validate().is_ok());
    }

    #[test]
    fn test_music_input_wire_shape() {
        let input = MusicGenInput::new("haunting".to_string(), 30, OutputFormat::Wav);
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["output_format"], "wav");
        assert_eq!(json["top_k"], 250);
        assert_eq!(json["normalization_strategy"], "loudness");
        assert!(json.get("input_audio").is_none());
    }

    #[test]
    fn test_generate_response_shapes() {
        let id = JobId::parse("p-1").unwrap();
        let processing = serde_json::to_value(GenerateResponse::Processing { job_id: id.clone() })
            .unwrap();
        assert_eq!(processing, json!({ "status": "processing", "jobId": "p-1" }));

        let completed = serde_json::to_value(GenerateResponse::Completed {
            job_id: id,
            output_url: Some("https://x/a.wav".to_string()),
        })
        .unwrap();
        assert_eq!(
            completed,
            json!({ "status": "completed", "jobId": "p-1", "outputUrl": "https://x/a.wav" })
        );
    }

    #[test]
    fn test_output_serializes_as_string_or_array() {
        assert_eq!(
            serde_json::to_value(JobOutput::Single("https://x/a.wav".to_string())).unwrap(),
            json!("https://x/a.wav")
        );
        let multiple = JobOutput::Multiple(vec!["https://x/a.wav".into(), "https://x/b.wav".into()]);
        assert_eq!(multiple.primary_url(), Some("https://x/a.wav"));
    }
}
