use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use jsonschema::Validator;
use serde_json::Value;

use crate::codec::{decode_request_value, decode_response_value};
use crate::errors::{CheckIssue, CheckReport, PayloadError};
use crate::payload::{Request, Response, Window};
use crate::types::CriterionType;

const REQUEST_SCHEMA: &str = include_str!("../schema/analytics-request.schema.json");
const RESPONSE_SCHEMA: &str = include_str!("../schema/analytics-response.schema.json");

/// Which side of the evaluation call a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Request,
    Response,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Request => "request",
            PayloadKind::Response => "response",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "request" => Ok(PayloadKind::Request),
            "response" => Ok(PayloadKind::Response),
            other => bail!("unknown payload kind \"{other}\" (expected request or response)"),
        }
    }
}

/// Guess the payload kind from its top-level keys.
pub fn detect_kind(data: &Value) -> Option<PayloadKind> {
    let obj = data.as_object()?;
    if obj.contains_key("assessment") {
        Some(PayloadKind::Response)
    } else if obj.contains_key("name") || obj.contains_key("traffic_control") {
        Some(PayloadKind::Request)
    } else {
        None
    }
}

/// Compile the embedded schema for `kind`.
pub fn validator_for(kind: PayloadKind) -> Result<Validator> {
    let schema_str = match kind {
        PayloadKind::Request => REQUEST_SCHEMA,
        PayloadKind::Response => RESPONSE_SCHEMA,
    };
    let schema: Value =
        serde_json::from_str(schema_str).context("embedded schema is invalid JSON")?;
    Validator::new(&schema).map_err(|e| anyhow::anyhow!("schema compilation failed: {e}"))
}

/// Validate a payload against its schema.
pub fn validate(data: &Value, kind: PayloadKind) -> Result<()> {
    let v = validator_for(kind)?;
    if v.is_valid(data) {
        return Ok(());
    }
    let msgs: Vec<String> = v
        .iter_errors(data)
        .map(|error| format!("  {}: {error}", location(&error.instance_path.to_string())))
        .collect();
    bail!("validation failed:\n{}", msgs.join("\n"));
}

/// Validate multiple files, printing results. Returns (passed, failed) counts.
pub fn validate_files(paths: &[String], kind: PayloadKind) -> Result<(usize, usize)> {
    let v = validator_for(kind)?;
    let mut passed = 0usize;
    let mut failed = 0usize;
    for path in paths {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?;
        let data: Value =
            serde_json::from_str(&content).with_context(|| format!("{path}: invalid JSON"))?;
        if v.is_valid(&data) {
            eprintln!("  ok  {path}");
            passed += 1;
        } else {
            failed += 1;
            eprintln!("  FAIL {path}");
            for error in v.iter_errors(&data) {
                eprintln!(
                    "       {}: {error}",
                    location(&error.instance_path.to_string())
                );
            }
        }
    }
    Ok((passed, failed))
}

/// Full check producing a structured report (for `canary check --json`).
pub fn check(data: &Value, file: &str, kind: PayloadKind, strict: bool) -> CheckReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match validator_for(kind) {
        Ok(v) => {
            for error in v.iter_errors(data) {
                let path = error.instance_path.to_string();
                errors.push(CheckIssue::new(
                    "E001",
                    "schema",
                    error.to_string(),
                    &json_path(&path),
                ));
            }
        }
        Err(e) => errors.push(CheckIssue::new("E001", "schema", e.to_string(), "$")),
    }

    // Typed decode catches what the schema cannot: recognized-key mismatches
    // inside open maps and unparsable timestamps.
    match kind {
        PayloadKind::Request => match decode_request_value(data.clone()) {
            Ok(req) => lint_request(&req, &mut warnings),
            Err(e) => errors.push(decode_issue(&e)),
        },
        PayloadKind::Response => match decode_response_value(data.clone()) {
            Ok(resp) => lint_response(&resp, &mut warnings),
            Err(e) => errors.push(decode_issue(&e)),
        },
    }

    let pass = errors.is_empty() && (!strict || warnings.is_empty());
    CheckReport {
        file: file.to_string(),
        kind: kind.to_string(),
        pass,
        errors,
        warnings,
    }
}

fn decode_issue(e: &PayloadError) -> CheckIssue {
    match e {
        PayloadError::InvalidTimestamp { path, .. } => {
            CheckIssue::new("E003", "timestamp", e.to_string(), &format!("$.{path}"))
        }
        PayloadError::TypeMismatch { path, .. } | PayloadError::MissingField(path) => {
            CheckIssue::new("E002", "decode", e.to_string(), &format!("$.{path}"))
        }
        _ => CheckIssue::new("E002", "decode", e.to_string(), "$"),
    }
}

fn lint_request(req: &Request, warnings: &mut Vec<CheckIssue>) {
    lint_window(&req.baseline, "baseline", warnings);
    lint_window(&req.candidate, "candidate", warnings);

    // W002: traffic cap outside a percentage range
    if let Ok(Some(max)) = req.traffic_control.max_traffic_percent() {
        if !(0.0..=100.0).contains(&max) {
            warnings.push(CheckIssue::new(
                "W002",
                "lint",
                format!("max_traffic_percent {max} is outside 0-100"),
                "$.traffic_control.max_traffic_percent",
            ));
        }
    }

    let criteria = req.traffic_control.success_criteria().unwrap_or_default();
    let mut seen = HashSet::new();
    for (i, criterion) in criteria.iter().enumerate() {
        let base = format!("$.traffic_control.success_criteria[{i}]");

        // W003: unrecognized criterion type
        if let Ok(Some(name)) = criterion.type_name() {
            if CriterionType::parse(name).is_none() {
                warnings.push(CheckIssue::new(
                    "W003",
                    "lint",
                    format!("unrecognized criterion type '{name}' (expected delta or threshold)"),
                    &format!("{base}.type"),
                ));
            }
        }

        // W004: criterion without metric, W006: same metric twice
        match criterion.metric_name() {
            Ok(Some(metric)) => {
                if !seen.insert(metric.to_string()) {
                    warnings.push(CheckIssue::new(
                        "W006",
                        "lint",
                        format!("duplicate criterion for metric '{metric}'"),
                        &format!("{base}.metric_name"),
                    ));
                }
            }
            _ => warnings.push(CheckIssue::new(
                "W004",
                "lint",
                "success criterion without metric_name",
                &base,
            )),
        }
    }
}

fn lint_window(window: &Window, name: &str, warnings: &mut Vec<CheckIssue>) {
    // W001: window ends before it starts
    let (Some(start), Some(end)) = (
        window.start_time.to_datetime(),
        window.end_time.as_ref().and_then(|t| t.to_datetime()),
    ) else {
        return;
    };
    if end < start {
        warnings.push(CheckIssue::new(
            "W001",
            "lint",
            format!("{name} end_time is earlier than start_time"),
            &format!("$.{name}.end_time"),
        ));
    }
}

fn lint_response(resp: &Response, warnings: &mut Vec<CheckIssue>) {
    // W005: recommended share outside a percentage range
    for (name, pct) in [
        ("baseline", resp.baseline.traffic_percentage),
        ("candidate", resp.candidate.traffic_percentage),
    ] {
        if !(0.0..=100.0).contains(&pct) {
            warnings.push(CheckIssue::new(
                "W005",
                "lint",
                format!("{name} traffic_percentage {pct} is outside 0-100"),
                &format!("$.{name}.traffic_percentage"),
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, output) in resp.assessment.success_criteria.iter().enumerate() {
        if !seen.insert(output.metric_name.as_str()) {
            warnings.push(CheckIssue::new(
                "W006",
                "lint",
                format!("duplicate assessment for metric '{}'", output.metric_name),
                &format!("$.assessment.success_criteria[{i}].metric_name"),
            ));
        }
    }
}

fn location(path: &str) -> String {
    if path.is_empty() {
        "(root)".into()
    } else {
        path.to_string()
    }
}

fn json_path(pointer: &str) -> String {
    if pointer.is_empty() {
        "$(root)".to_string()
    } else {
        format!("${pointer}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> Value {
        json!({
            "name": "exp1",
            "baseline": {"start_time": "2023-01-01T00:00:00Z", "tags": {"version": "v1"}},
            "candidate": {"start_time": "2023-01-01T00:00:00Z", "tags": {"version": "v2"}},
            "traffic_control": {
                "max_traffic_percent": 50,
                "success_criteria": [{"metric_name": "iter8_latency", "type": "threshold", "value": 100}]
            }
        })
    }

    fn response() -> Value {
        json!({
            "baseline": {"traffic_percentage": 75.0},
            "candidate": {"traffic_percentage": 25.0},
            "assessment": {
                "summary": {},
                "success_criteria": [{"metric_name": "iter8_latency", "conclusions": ["met"], "success_criteria_met": true, "abort_experiment": false}]
            },
            "_last_state": null
        })
    }

    fn codes(issues: &[CheckIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn embedded_schemas_compile() {
        assert!(validator_for(PayloadKind::Request).is_ok());
        assert!(validator_for(PayloadKind::Response).is_ok());
    }

    #[test]
    fn detect() {
        assert_eq!(detect_kind(&request()), Some(PayloadKind::Request));
        assert_eq!(detect_kind(&response()), Some(PayloadKind::Response));
        assert_eq!(detect_kind(&json!({"x": 1})), None);
        assert_eq!(detect_kind(&json!([1])), None);
    }

    #[test]
    fn valid_payloads_pass_strict() {
        let report = check(&request(), "req.json", PayloadKind::Request, true);
        assert!(report.pass, "{report:?}");
        let report = check(&response(), "resp.json", PayloadKind::Response, true);
        assert!(report.pass, "{report:?}");
        assert!(validate(&request(), PayloadKind::Request).is_ok());
    }

    #[test]
    fn schema_rejects_missing_name() {
        let mut data = request();
        data.as_object_mut().unwrap().remove("name");
        assert!(validate(&data, PayloadKind::Request).is_err());
        let report = check(&data, "req.json", PayloadKind::Request, false);
        assert!(!report.pass);
        assert!(codes(&report.errors).contains(&"E001"));
        assert!(codes(&report.errors).contains(&"E002"));
    }

    #[test]
    fn schema_rejects_non_numeric_cap() {
        let mut data = request();
        data["traffic_control"]["max_traffic_percent"] = json!("fifty");
        let report = check(&data, "req.json", PayloadKind::Request, false);
        assert!(!report.pass);
        let decode = report.errors.iter().find(|e| e.code == "E002").unwrap();
        assert_eq!(decode.path.as_deref(), Some("$.traffic_control.max_traffic_percent"));
    }

    #[test]
    fn bad_timestamp_is_error() {
        let mut data = request();
        data["baseline"]["start_time"] = json!("last tuesday");
        let report = check(&data, "req.json", PayloadKind::Request, false);
        assert_eq!(codes(&report.errors), vec!["E003"]);
    }

    #[test]
    fn lint_warnings() {
        let mut data = request();
        data["baseline"]["end_time"] = json!("2022-12-31T00:00:00Z");
        data["traffic_control"]["max_traffic_percent"] = json!(150);
        data["traffic_control"]["success_criteria"] = json!([
            {"metric_name": "iter8_latency", "type": "ratio"},
            {"metric_name": "iter8_latency", "type": "delta"},
            {"type": "threshold"}
        ]);
        let report = check(&data, "req.json", PayloadKind::Request, false);
        assert!(report.pass, "warnings alone must not fail a non-strict check");
        assert_eq!(codes(&report.warnings), vec!["W001", "W002", "W003", "W006", "W004"]);

        let strict = check(&data, "req.json", PayloadKind::Request, true);
        assert!(!strict.pass);
    }

    #[test]
    fn unknown_keys_never_raise_issues() {
        let mut data = request();
        data["experiment_owner"] = json!("team-a");
        data["traffic_control"]["step_size"] = json!(5);
        data["traffic_control"]["success_criteria"][0]["window"] = json!({"k": 1});
        let report = check(&data, "req.json", PayloadKind::Request, true);
        assert!(report.pass, "{report:?}");
    }

    #[test]
    fn response_percentage_out_of_range_warns() {
        let mut data = response();
        data["candidate"]["traffic_percentage"] = json!(-5.0);
        let report = check(&data, "resp.json", PayloadKind::Response, false);
        assert!(report.pass);
        assert_eq!(codes(&report.warnings), vec!["W005"]);
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("request".parse::<PayloadKind>().unwrap(), PayloadKind::Request);
        assert!("persona".parse::<PayloadKind>().is_err());
    }
}
