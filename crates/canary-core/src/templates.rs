use chrono::{DateTime, Utc};

use crate::payload::{Request, Window};
use crate::traffic::{
    SuccessCriterion, TrafficControl, SC_KEY_ABSENT_VALUE, SC_KEY_IS_COUNTER,
    SC_KEY_SAMPLE_SIZE_TEMPLATE, SC_KEY_STOP_ON_FAILURE, SC_KEY_TEMPLATE,
};
use crate::types::Timestamp;

const LATENCY_QUERY: &str = "(sum(increase(istio_request_duration_seconds_sum{source_workload_namespace!='knative-serving',reporter='source'}[$interval]$offset_str)) by ($entity_labels)) / (sum(increase(istio_request_duration_seconds_count{source_workload_namespace!='knative-serving',reporter='source'}[$interval]$offset_str)) by ($entity_labels))";

const ERROR_RATE_QUERY: &str = "(sum(increase(istio_requests_total{response_code=~'5..',source_workload_namespace!='knative-serving',reporter='source'}[$interval]$offset_str)) by ($entity_labels)) / (sum(increase(istio_requests_total{source_workload_namespace!='knative-serving',reporter='source'}[$interval]$offset_str)) by ($entity_labels))";

const SAMPLE_SIZE_QUERY: &str = "sum(increase(istio_requests_total{source_workload_namespace!='knative-serving',reporter='source'}[$interval]$offset_str)) by ($entity_labels)";

/// Built-in request templates.
pub fn list_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "threshold",
            "Latency ceiling on the candidate, 50% traffic cap",
        ),
        (
            "delta",
            "Error rate compared against baseline, stops on failure",
        ),
        ("minimal", "Windows and tags only, no traffic control"),
    ]
}

/// Build a request from a template; windows open at `now` and stay open.
pub fn generate(template: &str, experiment: Option<&str>, now: DateTime<Utc>) -> Option<Request> {
    let name = experiment.unwrap_or("reviews-rollout");
    let start = Timestamp::from_datetime(now);
    let baseline = Window::new(start.clone()).with_tag("version", "v1");
    let candidate = Window::new(start).with_tag("version", "v2");
    let request = Request::new(name, baseline, candidate);

    match template {
        "threshold" => Some(request.with_traffic_control(threshold())),
        "delta" => Some(request.with_traffic_control(delta())),
        "minimal" => Some(request),
        _ => None,
    }
}

fn threshold() -> TrafficControl {
    TrafficControl::new()
        .with_max_traffic_percent(50.0)
        .with_criterion(
            SuccessCriterion::threshold("iter8_latency", 0.2)
                .with(SC_KEY_IS_COUNTER, false)
                .with(SC_KEY_ABSENT_VALUE, "None")
                .with(SC_KEY_TEMPLATE, LATENCY_QUERY)
                .with(SC_KEY_SAMPLE_SIZE_TEMPLATE, SAMPLE_SIZE_QUERY),
        )
}

fn delta() -> TrafficControl {
    TrafficControl::new()
        .with_max_traffic_percent(100.0)
        .with_criterion(
            SuccessCriterion::delta("iter8_error_rate", 0.02)
                .with(SC_KEY_IS_COUNTER, false)
                .with(SC_KEY_ABSENT_VALUE, "0.0")
                .with(SC_KEY_TEMPLATE, ERROR_RATE_QUERY)
                .with(SC_KEY_SAMPLE_SIZE_TEMPLATE, SAMPLE_SIZE_QUERY)
                .with(SC_KEY_STOP_ON_FAILURE, true),
        )
}
