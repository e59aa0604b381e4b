//! CLI integration: encode/decode/check through the `canary` binary.

use test_helpers::{canary_bin, canary_in, canary_json, canary_stdout, fixture};

use std::io::Write;
use std::process::Stdio;

// ── Encode ──────────────────────────────────────────────────────

#[test]
fn encode_keeps_unknown_traffic_keys() {
    let out = canary_stdout(&["encode", &fixture("request_extended.json")]);
    let v: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v["traffic_control"]["step_size"], 5);
    assert_eq!(v["traffic_control"]["success_criteria"][0]["confidence"], 0.95);
    assert_eq!(v["traffic_control"]["success_criteria"][0]["stop_on_failure"], true);
    assert!(v.get("rollout_owner").is_none(), "unknown top-level keys are not part of the request");
}

#[test]
fn encode_drops_empty_end_time() {
    let out = canary_stdout(&["encode", &fixture("request_extended.json")]);
    let v: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert!(v["baseline"].get("end_time").is_none());
    assert!(v["candidate"].get("end_time").is_none());
}

#[test]
fn encode_forwards_state_verbatim() {
    let out = canary_stdout(&["encode", &fixture("request_extended.json")]);
    assert!(
        out.contains(r#""_last_state":{ "baseline": { "observations": 120 }, "candidate": { "observations": 118 } },"#),
        "state changed: {out}"
    );
}

#[test]
fn encode_rejects_non_numeric_cap() {
    let out = canary_bin()
        .args(["encode", &fixture("request_bad_cap.json")])
        .output()
        .expect("failed to run canary");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("max_traffic_percent"), "stderr: {stderr}");
}

#[test]
fn encode_rejects_missing_name() {
    let out = canary_bin()
        .args(["encode", &fixture("request_missing_name.json")])
        .output()
        .expect("failed to run canary");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("missing required field: name"), "stderr: {stderr}");
}

// ── Decode ──────────────────────────────────────────────────────

#[test]
fn decode_prints_assessment_table() {
    let out = canary_stdout(&["decode", &fixture("response_example.json")]);
    assert!(out.contains("candidate 25.0%"), "{out}");
    assert!(out.contains("iter8_latency"), "{out}");
    assert!(out.contains("METRIC"), "{out}");
}

#[test]
fn decode_json_drops_unknown_top_level_key() {
    let v = canary_json(&["decode", &fixture("response_abort.json"), "--json"], 0);
    assert_eq!(v["candidate"]["traffic_percentage"], 0.0);
    assert_eq!(v["assessment"]["summary"]["abort_experiment"], true);
    assert_eq!(v["_last_state"]["posterior"]["beta"], 1.25);
    assert!(v.get("service_version").is_none());
}

#[test]
fn decode_reads_stdin() {
    let body = std::fs::read(fixture("response_example.json")).unwrap();
    let mut child = canary_bin()
        .arg("decode")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run canary");
    child.stdin.take().unwrap().write_all(&body).unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("baseline 75.0%"));
}

#[test]
fn decode_rejects_malformed_body() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{\"baseline\": ").unwrap();
    let out = canary_bin()
        .args(["decode", path.to_str().unwrap()])
        .output()
        .expect("failed to run canary");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("malformed payload"));
}

// ── Next call ───────────────────────────────────────────────────

#[test]
fn next_carries_response_state() {
    let v = canary_json(
        &[
            "next",
            "--request",
            &fixture("request_extended.json"),
            "--response",
            &fixture("response_abort.json"),
            "--end-time",
            "2023-01-01T01:00:00Z",
        ],
        0,
    );
    assert_eq!(
        v["_last_state"],
        serde_json::json!({"round": 4, "posterior": {"alpha": 3.5, "beta": 1.25}})
    );
    assert_eq!(v["baseline"]["end_time"], "2023-01-01T01:00:00Z");
    assert_eq!(v["candidate"]["end_time"], "2023-01-01T01:00:00Z");
    assert_eq!(v["name"], "reviews-rollout");
}

#[test]
fn next_keeps_state_numbers_exact() {
    let out = canary_stdout(&[
        "next",
        "--request",
        &fixture("request_threshold.json"),
        "--response",
        &fixture("response_big_state.json"),
    ]);
    assert!(
        out.contains(r#"{"n":18446744073709551616,"scale":1e2,"ids":[123456789012345678901234567890]}"#),
        "state changed: {out}"
    );
}

#[test]
fn next_rejects_bad_end_time() {
    let out = canary_bin()
        .args([
            "next",
            "--request",
            &fixture("request_threshold.json"),
            "--response",
            &fixture("response_example.json"),
            "--end-time",
            "tomorrow",
        ])
        .output()
        .expect("failed to run canary");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid timestamp"));
}

// ── Validate / check ────────────────────────────────────────────

#[test]
fn validate_request_fixtures() {
    let out = canary_bin()
        .args([
            "validate",
            &fixture("request_threshold.json"),
            &fixture("request_extended.json"),
        ])
        .output()
        .expect("failed to run canary");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "validate failed: {stderr}");
    assert!(stderr.contains("2 passed, 0 failed"));
}

#[test]
fn validate_response_kind() {
    let out = canary_bin()
        .args([
            "validate",
            "--kind",
            "response",
            &fixture("response_example.json"),
            &fixture("response_abort.json"),
        ])
        .output()
        .expect("failed to run canary");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn validate_flags_bad_cap() {
    let out = canary_bin()
        .args(["validate", &fixture("request_bad_cap.json")])
        .output()
        .expect("failed to run canary");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("FAIL"));
}

#[test]
fn check_threshold_passes_strict() {
    let v = canary_json(
        &["check", &fixture("request_threshold.json"), "--strict", "--json"],
        0,
    );
    assert_eq!(v["pass"], true);
    assert_eq!(v["kind"], "request");
}

#[test]
fn check_detects_response() {
    let v = canary_json(&["check", &fixture("response_abort.json"), "--json"], 0);
    assert_eq!(v["kind"], "response");
    assert_eq!(v["pass"], true);
}

#[test]
fn check_reports_type_mismatch() {
    let v = canary_json(&["check", &fixture("request_bad_cap.json"), "--json"], 1);
    assert_eq!(v["pass"], false);
    let errors = v["errors"].as_array().unwrap();
    assert!(errors
        .iter()
        .any(|e| e["code"] == "E002" && e["path"] == "$.traffic_control.max_traffic_percent"));
}

#[test]
fn check_missing_name_needs_kind() {
    let v = canary_json(
        &[
            "check",
            &fixture("request_missing_name.json"),
            "--kind",
            "request",
            "--json",
        ],
        1,
    );
    let errors = v["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e["code"] == "E001"));
    assert!(errors.iter().any(|e| e["path"] == "$.name"));
}

#[test]
fn check_lint_warns_then_fails_strict() {
    let v = canary_json(&["check", &fixture("request_lint.json"), "--json"], 0);
    let codes: Vec<&str> = v["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|w| w["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["W001", "W002", "W003"]);

    let v = canary_json(
        &["check", &fixture("request_lint.json"), "--strict", "--json"],
        1,
    );
    assert_eq!(v["pass"], false);
}

// ── Templates / defaults ────────────────────────────────────────

#[test]
fn templates_are_listed() {
    let out = canary_stdout(&["templates"]);
    for name in ["threshold", "delta", "minimal"] {
        assert!(out.contains(name), "missing template {name}");
    }
}

#[test]
fn new_threshold_request_checks_clean() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("req.json");
    let out = canary_in(dir.path())
        .args(["new", "threshold", "--name", "exp7", "-o", path.to_str().unwrap()])
        .output()
        .expect("failed to run canary");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["name"], "exp7");
    assert_eq!(v["traffic_control"]["success_criteria"][0]["type"], "threshold");

    let out = canary_in(dir.path())
        .args(["check", path.to_str().unwrap(), "--strict"])
        .output()
        .expect("failed to run canary");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn new_unknown_template_fails() {
    let out = canary_bin()
        .args(["new", "ratio"])
        .output()
        .expect("failed to run canary");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("available: threshold, delta, minimal"));
}

#[test]
fn init_defaults_apply_to_new() {
    let dir = tempfile::tempdir().unwrap();
    let out = canary_in(dir.path())
        .arg("init")
        .output()
        .expect("failed to run canary");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(dir.path().join(".canary/defaults.json").exists());

    let out = canary_in(dir.path())
        .args(["new", "minimal"])
        .output()
        .expect("failed to run canary");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["traffic_control"]["max_traffic_percent"], 50);

    let out = canary_in(dir.path())
        .args(["new", "minimal", "--no-defaults"])
        .output()
        .expect("failed to run canary");
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["traffic_control"], serde_json::json!({}));

    let again = canary_in(dir.path())
        .arg("init")
        .output()
        .expect("failed to run canary");
    assert!(!again.status.success(), "init must not overwrite defaults");
}

#[test]
fn verbose_flag_logs_debug_events() {
    let quiet = canary_bin()
        .args(["encode", &fixture("request_threshold.json")])
        .output()
        .expect("failed to run canary");
    assert!(!String::from_utf8_lossy(&quiet.stderr).contains("encoded analytics request"));

    let loud = canary_bin()
        .args(["-v", "encode", &fixture("request_threshold.json")])
        .output()
        .expect("failed to run canary");
    assert!(loud.status.success());
    let stderr = String::from_utf8_lossy(&loud.stderr);
    assert!(stderr.contains("DEBUG"), "stderr: {stderr}");
    assert!(stderr.contains("encoded analytics request"), "stderr: {stderr}");
}

#[test]
fn path_prints_endpoint() {
    assert_eq!(canary_stdout(&["path"]).trim(), "/api/v1/analytics/canary/");
}
