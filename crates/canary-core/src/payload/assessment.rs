use serde::{Deserialize, Serialize};

use super::null_as_default;
use crate::state::LastState;

/// Traffic recommendation for one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsTraffic {
    /// Recommended share of traffic, nominally 0 to 100. Not range-checked.
    pub traffic_percentage: f64,

    #[serde(rename = "_last_state", default)]
    pub last_state: LastState,
}

impl MetricsTraffic {
    pub fn new(traffic_percentage: f64) -> Self {
        Self {
            traffic_percentage,
            last_state: LastState::none(),
        }
    }
}

/// Aggregate judgment of the candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: Summary,

    /// One entry per evaluated metric, in evaluation order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub success_criteria: Vec<SuccessCriterionOutput>,
}

/// Overall verdict across all success criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub conclusions: Vec<String>,

    #[serde(default)]
    pub all_success_criteria_met: bool,

    #[serde(default)]
    pub abort_experiment: bool,
}

/// Verdict for a single metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessCriterionOutput {
    pub metric_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub conclusions: Vec<String>,

    pub success_criteria_met: bool,

    pub abort_experiment: bool,
}
