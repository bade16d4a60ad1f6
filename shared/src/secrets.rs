//! Service tokens from AWS Secrets Manager.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Error, Result};

/// Parsed credentials keyed by secret ARN, kept for the life of the container.
static CREDENTIALS_CACHE: OnceLock<RwLock<HashMap<String, ServiceCredentials>>> = OnceLock::new();

fn cache() -> &'static RwLock<HashMap<String, ServiceCredentials>> {
    CREDENTIALS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Service tokens stored as a JSON secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceCredentials {
    #[serde(rename = "REPLICATE_API_TOKEN", default)]
    pub replicate_api_token: Option<String>,
    #[serde(rename = "SPEECH_API_TOKEN", default)]
    pub speech_api_token: Option<String>,
}

/// Read service tokens from Secrets Manager, once per secret.
pub async fn get_service_credentials(
    client: &SecretsClient,
    secret_arn: &str,
) -> Result<ServiceCredentials> {
    if let Some(credentials) = cache().read().await.get(secret_arn) {
        return Ok(credentials.clone());
    }

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Config(format!("Failed to read credentials secret: {}", e)))?;

    let secret = response
        .secret_string()
        .ok_or_else(|| Error::Config("Credentials secret has no string value".to_string()))?;
    let credentials = parse_service_credentials(secret)?;
    debug!(
        music = credentials.replicate_api_token.is_some(),
        speech = credentials.speech_api_token.is_some(),
        "Loaded service credentials"
    );

    cache()
        .write()
        .await
        .insert(secret_arn.to_string(), credentials.clone());

    Ok(credentials)
}

fn parse_service_credentials(secret: &str) -> Result<ServiceCredentials> {
    serde_json::from_str(secret)
        .map_err(|e| Error::Config(format!("Failed to parse service credentials: {}", e)))
}
