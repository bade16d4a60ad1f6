//! Configuration management for Lambda functions.

use std::env;
use std::time::Duration;

use tracing::{info, warn};

use crate::models::OutputFormat;
use crate::orchestrator::PollPolicy;
use crate::prompt::DurationPolicy;
use crate::secrets::{get_service_credentials, ServiceCredentials};
use crate::{Error, Result};

/// Pinned version of the fine-tuned melody-conditioned MusicGen model.
pub const DEFAULT_MUSIC_MODEL_VERSION: &str =
    "93ed0f8d7560876afd2a087263a4a788716c36e59de91f83130e700fedc7b2e3";
pub const DEFAULT_SPEECH_MODEL: &str = "minimax/speech-02-hd";
pub const DEFAULT_SPEECH_VOICE_ID: &str = "male-qn-qingse";
pub const DEFAULT_API_URL: &str = "https://api.replicate.com";
pub const DEFAULT_SPEECH_POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_SPEECH_POLL_MAX_ATTEMPTS: u32 = 20;

/// Application configuration loaded once at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the prediction API
    pub api_url: String,
    /// Token for the music generation service
    pub music_token: Option<String>,
    /// Token for the speech synthesis service
    pub speech_token: Option<String>,
    /// Music model version submitted with every job
    pub music_model_version: String,
    /// Speech model as `owner/name`
    pub speech_model: String,
    pub speech_voice_id: String,
    /// Synthesize speech first and use it as the melody guide
    pub speech_guide_enabled: bool,
    pub output_format: OutputFormat,
    pub duration_policy: DurationPolicy,
    pub poll: PollPolicy,
    /// Bound for the speech guide, which runs inside `POST /generate`
    pub speech_poll: PollPolicy,
    /// Per-request timeout for calls to the prediction API
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration, falling back to Secrets Manager for any missing
    /// token when `CREDENTIALS_SECRET_ARN` is set.
    pub async fn load() -> Result<Self> {
        let mut config = Self::from_env()?;

        if config.music_token.is_none() || config.speech_token.is_none() {
            if let Some(secret_arn) = non_empty(env::var("CREDENTIALS_SECRET_ARN").ok()) {
                let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                let client = aws_sdk_secretsmanager::Client::new(&aws);
                let credentials = get_service_credentials(&client, &secret_arn).await?;
                config.apply_credentials(credentials);
                info!("Loaded service credentials from Secrets Manager");
            }
        }

        config.warn_missing_credentials();
        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));

        let output_format = match get("OUTPUT_FORMAT") {
            Some(raw) => raw.parse().map_err(Error::Config)?,
            None => OutputFormat::default(),
        };

        let duration_policy = match get("DURATION_POLICY") {
            Some(raw) => raw.parse().map_err(Error::Config)?,
            None => DurationPolicy::default(),
        };

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            interval: parse_or("POLL_INTERVAL_SECS", get("POLL_INTERVAL_SECS"), defaults.interval.as_secs())
                .map(Duration::from_secs)?,
            max_attempts: parse_or("POLL_MAX_ATTEMPTS", get("POLL_MAX_ATTEMPTS"), defaults.max_attempts)?,
        };
        if poll.max_attempts == 0 {
            return Err(Error::Config("POLL_MAX_ATTEMPTS must be at least 1".to_string()));
        }

        let speech_poll = PollPolicy {
            interval: Duration::from_secs(DEFAULT_SPEECH_POLL_INTERVAL_SECS),
            max_attempts: parse_or(
                "SPEECH_POLL_MAX_ATTEMPTS",
                get("SPEECH_POLL_MAX_ATTEMPTS"),
                DEFAULT_SPEECH_POLL_MAX_ATTEMPTS,
            )?,
        };
        if speech_poll.max_attempts == 0 {
            return Err(Error::Config(
                "SPEECH_POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_url: get("REPLICATE_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            music_token: get("REPLICATE_API_TOKEN"),
            speech_token: get("SPEECH_API_TOKEN"),
            music_model_version: get("MUSIC_MODEL_VERSION")
                .unwrap_or_else(|| DEFAULT_MUSIC_MODEL_VERSION.to_string()),
            speech_model: get("SPEECH_MODEL").unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            speech_voice_id: get("SPEECH_VOICE_ID")
                .unwrap_or_else(|| DEFAULT_SPEECH_VOICE_ID.to_string()),
            speech_guide_enabled: parse_or(
                "SPEECH_GUIDE_ENABLED",
                get("SPEECH_GUIDE_ENABLED"),
                false,
            )?,
            output_format,
            duration_policy,
            poll,
            speech_poll,
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                get("HTTP_TIMEOUT_SECS"),
                30,
            )?),
        })
    }

    /// Fill tokens that were not set in the environment.
    pub fn apply_credentials(&mut self, credentials: ServiceCredentials) {
        if self.music_token.is_none() {
            self.music_token = non_empty(credentials.replicate_api_token);
        }
        if self.speech_token.is_none() {
            self.speech_token = non_empty(credentials.speech_api_token);
        }
    }

    /// Missing credentials are not fatal at startup; calls fail until they are provided.
    pub fn warn_missing_credentials(&self) {
        if self.music_token.is_none() {
            warn!("REPLICATE_API_TOKEN is not set; generation requests will fail");
        }
        if self.speech_guide_enabled && self.speech_token.is_none() {
            warn!("SPEECH_API_TOKEN is not set; speech guide is disabled");
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.music_token.is_none());
        assert_eq!(config.poll.interval, Duration::from_secs(2));
        assert_eq!(config.poll.max_attempts, 180);
        assert_eq!(config.duration_policy, DurationPolicy::Fixed { seconds: 30 });
        assert_eq!(config.output_format, OutputFormat::Wav);
        assert!(!config.speech_guide_enabled);
        assert_eq!(config.speech_poll.interval, Duration::from_secs(1));
        assert_eq!(config.speech_poll.max_attempts, 20);
    }

    #[test]
    fn test_speech_poll_bound_is_separate() {
        let config = config_from(&[
            ("POLL_MAX_ATTEMPTS", "300"),
            ("SPEECH_POLL_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();
        assert_eq!(config.poll.max_attempts, 300);
        assert_eq!(config.speech_poll.max_attempts, 5);
        assert!(config_from(&[("SPEECH_POLL_MAX_ATTEMPTS", "0")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("REPLICATE_API_TOKEN", "r8_token"),
            ("REPLICATE_API_URL", "http://localhost:9000/"),
            ("POLL_INTERVAL_SECS", "5"),
            ("POLL_MAX_ATTEMPTS", "12"),
            ("DURATION_POLICY", "words:3"),
            ("OUTPUT_FORMAT", "mp3"),
            ("SPEECH_GUIDE_ENABLED", "true"),
        ])
        .unwrap();
        assert_eq!(config.music_token.as_deref(), Some("r8_token"));
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.poll.max_attempts, 12);
        assert_eq!(
            config.duration_policy,
            DurationPolicy::PerWord {
                seconds_per_word: 3
            }
        );
        assert_eq!(config.output_format, OutputFormat::Mp3);
        assert!(config.speech_guide_enabled);
    }

    #[test]
    fn test_blank_token_is_missing() {
        let config = config_from(&[("REPLICATE_API_TOKEN", "   ")]).unwrap();
        assert!(config.music_token.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("POLL_INTERVAL_SECS", "soon")]).is_err());
        assert!(config_from(&[("POLL_MAX_ATTEMPTS", "0")]).is_err());
        assert!(config_from(&[("OUTPUT_FORMAT", "flac")]).is_err());
        assert!(config_from(&[("DURATION_POLICY", "forever")]).is_err());
        assert!(matches!(
            config_from(&[("DURATION_POLICY", "fixed:400")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_secret_credentials_fill_gaps_only() {
        let mut config = config_from(&[("REPLICATE_API_TOKEN", "from-env")]).unwrap();
        config.apply_credentials(ServiceCredentials {
            replicate_api_token: Some("from-secret".to_string()),
            speech_api_token: Some("speech-secret".to_string()),
        });
        assert_eq!(config.music_token.as_deref(), Some("from-env"));
        assert_eq!(config.speech_token.as_deref(), Some("speech-secret"));
    }
}
