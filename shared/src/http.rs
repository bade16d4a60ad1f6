//! HTTP helpers for Lambda functions.

use std::collections::BTreeMap;

use lambda_http::{Body, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::ErrorCode;
use crate::validation::ValidationFailure;
use crate::Error;

/// Uniform error body returned by every endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, Vec<String>>>,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            error: err.user_message(),
            code: err.code(),
            field_errors: match err {
                Error::Validation(failure) => Some(failure.field_errors.clone()),
                _ => None,
            },
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))
        .map_err(Box::new)?)
}

/// Convert any error into its status code and uniform body.
pub fn error_response(err: &Error) -> Result<Response<Body>, lambda_http::Error> {
    let status = err.status_code();
    if status >= 500 {
        error!(code = ?err.code(), error = %err, "Request failed");
    } else {
        warn!(code = ?err.code(), error = %err, "Request rejected");
    }
    json_response(status, &ErrorBody::from(err))
}

/// Parse a request body as untyped JSON.
///
/// An empty body or malformed JSON is a validation failure on `body`.
pub fn parse_json_body(body: &Body) -> Result<Value, Error> {
    let bytes: &[u8] = body.as_ref();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationFailure::single("body", "Missing request body").into());
    }

    serde_json::from_slice(bytes).map_err(|e| {
        ValidationFailure::single("body", format!("Invalid JSON body: {}", e)).into()
    })
}
