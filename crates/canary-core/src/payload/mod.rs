pub mod assessment;
pub mod window;

use serde::{Deserialize, Deserializer, Serialize};

pub use self::assessment::{Assessment, MetricsTraffic, SuccessCriterionOutput, Summary};
pub use self::window::Window;

use crate::errors::PayloadError;
use crate::state::LastState;
use crate::traffic::TrafficControl;

/// Path of the analytics evaluation endpoint.
pub const ANALYTICS_API_PATH: &str = "/api/v1/analytics/canary/";

/// Payload sent to the analytics service for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Experiment name.
    pub name: String,

    pub baseline: Window,

    pub candidate: Window,

    /// State returned by the service on the previous call.
    #[serde(rename = "_last_state", default)]
    pub last_state: LastState,

    #[serde(default, deserialize_with = "null_as_default")]
    pub traffic_control: TrafficControl,
}

impl Request {
    pub fn new(name: impl Into<String>, baseline: Window, candidate: Window) -> Self {
        Self {
            name: name.into(),
            baseline,
            candidate,
            last_state: LastState::none(),
            traffic_control: TrafficControl::new(),
        }
    }

    pub fn with_traffic_control(mut self, traffic_control: TrafficControl) -> Self {
        self.traffic_control = traffic_control;
        self
    }

    pub fn with_last_state(mut self, last_state: LastState) -> Self {
        self.last_state = last_state;
        self
    }

    /// Follow-up request carrying the state from `response` unchanged.
    pub fn next_call(&self, response: &Response) -> Request {
        self.clone().with_last_state(response.last_state.clone())
    }

    /// Required fields, timestamps, and recognized traffic-control keys.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.name.is_empty() {
            return Err(PayloadError::MissingField("name".to_string()));
        }
        self.baseline.validate("baseline")?;
        self.candidate.validate("candidate")?;
        self.traffic_control.validate()
    }
}

/// Result of one evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub baseline: MetricsTraffic,

    pub candidate: MetricsTraffic,

    pub assessment: Assessment,

    /// State to pass on the next call.
    #[serde(rename = "_last_state", default)]
    pub last_state: LastState,
}

impl Response {
    /// True if the summary or any single criterion asks to abort.
    pub fn should_abort(&self) -> bool {
        self.assessment.summary.abort_experiment
            || self
                .assessment
                .success_criteria
                .iter()
                .any(|c| c.abort_experiment)
    }

    /// True if every reported criterion was met.
    pub fn all_criteria_met(&self) -> bool {
        self.assessment
            .success_criteria
            .iter()
            .all(|c| c.success_criteria_met)
    }
}

/// `null` decodes like an absent key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
