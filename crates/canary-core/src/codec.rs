//! JSON encoding and decoding of analytics payloads.
//!
//! Decoding classifies failures: syntax errors are `Malformed`, absent required
//! keys are `MissingField` (checked before typed decoding so the path is exact),
//! wrong-typed fixed fields are `Schema`, and wrong-typed recognized map keys are
//! `TypeMismatch`. Unknown keys are ignored everywhere.
//!
//! The byte decoders build the typed payload from the original bytes, so
//! `_last_state` and numbers under `traffic_control` keep their exact text.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::PayloadError;
use crate::payload::{Request, Response};

const REQUEST_REQUIRED: &[&str] = &[
    "/name",
    "/baseline",
    "/baseline/start_time",
    "/candidate",
    "/candidate/start_time",
];

const RESPONSE_REQUIRED: &[&str] = &[
    "/baseline",
    "/baseline/traffic_percentage",
    "/candidate",
    "/candidate/traffic_percentage",
    "/assessment",
];

const CRITERION_OUTPUT_REQUIRED: &[&str] =
    &["/metric_name", "/success_criteria_met", "/abort_experiment"];

const REQUEST_KEYS: &[&str] = &[
    "name",
    "baseline",
    "candidate",
    "_last_state",
    "traffic_control",
];

const RESPONSE_KEYS: &[&str] = &["baseline", "candidate", "assessment", "_last_state"];

// ── Request ─────────────────────────────────────────────────────

/// Validate and serialize a request body.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, PayloadError> {
    request.validate()?;
    let bytes = serde_json::to_vec(request).map_err(PayloadError::Serialize)?;
    tracing::debug!(
        experiment = %request.name,
        bytes = bytes.len(),
        last_state = %request.last_state,
        "encoded analytics request"
    );
    Ok(bytes)
}

pub fn encode_request_pretty(request: &Request) -> Result<String, PayloadError> {
    request.validate()?;
    serde_json::to_string_pretty(request).map_err(PayloadError::Serialize)
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, PayloadError> {
    precheck_request(&parse(bytes)?)?;
    let request: Request = typed(serde_json::from_slice(bytes))?;
    request.validate()?;
    Ok(request)
}

/// Decode an already-parsed request. Numbers in `value` carry only the
/// precision `Value` kept; use [`decode_request`] to forward state exactly.
pub fn decode_request_value(value: Value) -> Result<Request, PayloadError> {
    precheck_request(&value)?;
    let request: Request = typed(serde_json::from_value(value))?;
    request.validate()?;
    Ok(request)
}

fn precheck_request(value: &Value) -> Result<(), PayloadError> {
    require_object(value)?;
    require(value, "", REQUEST_REQUIRED)?;
    log_unrecognized(value, REQUEST_KEYS, "request");
    Ok(())
}

// ── Response ────────────────────────────────────────────────────

pub fn encode_response(response: &Response) -> Result<Vec<u8>, PayloadError> {
    check_finite(response)?;
    serde_json::to_vec(response).map_err(PayloadError::Serialize)
}

pub fn encode_response_pretty(response: &Response) -> Result<String, PayloadError> {
    check_finite(response)?;
    serde_json::to_string_pretty(response).map_err(PayloadError::Serialize)
}

/// Parse a response body, ignoring keys this crate does not know.
pub fn decode_response(bytes: &[u8]) -> Result<Response, PayloadError> {
    precheck_response(&parse(bytes)?)?;
    decoded_response(typed(serde_json::from_slice(bytes))?)
}

/// Decode an already-parsed response. See [`decode_request_value`] on precision.
pub fn decode_response_value(value: Value) -> Result<Response, PayloadError> {
    precheck_response(&value)?;
    decoded_response(typed(serde_json::from_value(value))?)
}

fn precheck_response(value: &Value) -> Result<(), PayloadError> {
    require_object(value)?;
    require(value, "", RESPONSE_REQUIRED)?;
    if let Some(outputs) = value
        .pointer("/assessment/success_criteria")
        .and_then(Value::as_array)
    {
        for (i, output) in outputs.iter().enumerate() {
            require(
                output,
                &format!("assessment.success_criteria[{i}]"),
                CRITERION_OUTPUT_REQUIRED,
            )?;
        }
    }
    log_unrecognized(value, RESPONSE_KEYS, "response");
    Ok(())
}

fn decoded_response(response: Response) -> Result<Response, PayloadError> {
    tracing::debug!(
        baseline = response.baseline.traffic_percentage,
        candidate = response.candidate.traffic_percentage,
        criteria = response.assessment.success_criteria.len(),
        last_state = %response.last_state,
        "decoded analytics response"
    );
    Ok(response)
}

// ── Helpers ─────────────────────────────────────────────────────

fn parse(bytes: &[u8]) -> Result<Value, PayloadError> {
    serde_json::from_slice(bytes).map_err(PayloadError::Malformed)
}

fn typed<T: DeserializeOwned>(result: serde_json::Result<T>) -> Result<T, PayloadError> {
    result.map_err(|e| PayloadError::Schema(e.to_string()))
}

fn require_object(value: &Value) -> Result<(), PayloadError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(PayloadError::Schema("payload must be a JSON object".to_string()))
    }
}

/// Fail on the first pointer that is absent or `null`.
fn require(value: &Value, prefix: &str, pointers: &[&str]) -> Result<(), PayloadError> {
    for pointer in pointers {
        if value.pointer(pointer).map_or(true, Value::is_null) {
            let dotted = pointer.trim_start_matches('/').replace('/', ".");
            let path = if prefix.is_empty() {
                dotted
            } else {
                format!("{prefix}.{dotted}")
            };
            return Err(PayloadError::MissingField(path));
        }
    }
    Ok(())
}

fn log_unrecognized(value: &Value, known: &[&str], what: &str) {
    if let Some(obj) = value.as_object() {
        for key in obj.keys().filter(|k| !known.contains(&k.as_str())) {
            tracing::debug!(key = %key, "ignoring unrecognized {what} field");
        }
    }
}

fn check_finite(response: &Response) -> Result<(), PayloadError> {
    for (path, pct) in [
        ("baseline", response.baseline.traffic_percentage),
        ("candidate", response.candidate.traffic_percentage),
    ] {
        if !pct.is_finite() {
            return Err(PayloadError::Schema(format!(
                "{path}.traffic_percentage is not a finite number"
            )));
        }
    }
    Ok(())
}
