//! Traffic-control parameters and success criteria.
//!
//! Both are open maps: the keys below are the ones this crate understands,
//! anything else is carried through untouched.

use serde::{Deserialize, Serialize};

use crate::errors::PayloadError;
use crate::types::{CriterionType, ParamMap, ParamValue};

/// Upper bound (percent) on traffic shifted to the candidate.
pub const TC_KEY_MAX_TRAFFIC_PERCENT: &str = "max_traffic_percent";

/// Ordered list of success criteria.
pub const TC_KEY_SUCCESS_CRITERIA: &str = "success_criteria";

/// Name of the metric the criterion applies to, e.g. `iter8_latency`.
pub const SC_KEY_METRIC_NAME: &str = "metric_name";

/// Criterion type: `"delta"` compares candidate against baseline,
/// `"threshold"` checks the candidate alone.
pub const SC_KEY_TYPE: &str = "type";

/// Whether the metric is a counter.
pub const SC_KEY_IS_COUNTER: &str = "is_counter";

/// Value to assume when the data source returns none.
pub const SC_KEY_ABSENT_VALUE: &str = "absent_value";

/// Query template for the metric.
pub const SC_KEY_TEMPLATE: &str = "metric_query_template";

/// Query template for the sample size.
pub const SC_KEY_SAMPLE_SIZE_TEMPLATE: &str = "metric_sample_size_query_template";

/// Value the criterion checks against.
pub const SC_KEY_VALUE: &str = "value";

/// Whether the experiment must finish if this criterion fails. Defaults to false.
pub const SC_KEY_STOP_ON_FAILURE: &str = "stop_on_failure";

const TC_KEYS: &[&str] = &[TC_KEY_MAX_TRAFFIC_PERCENT, TC_KEY_SUCCESS_CRITERIA];

const SC_KEYS: &[&str] = &[
    SC_KEY_METRIC_NAME,
    SC_KEY_TYPE,
    SC_KEY_IS_COUNTER,
    SC_KEY_ABSENT_VALUE,
    SC_KEY_TEMPLATE,
    SC_KEY_SAMPLE_SIZE_TEMPLATE,
    SC_KEY_VALUE,
    SC_KEY_STOP_ON_FAILURE,
];

/// Traffic-shaping parameters sent with each request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficControl(ParamMap);

impl TrafficControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: ParamMap) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &ParamMap {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys present that this crate does not interpret.
    pub fn unrecognized_keys(&self) -> Vec<&str> {
        unrecognized(&self.0, TC_KEYS)
    }

    pub fn max_traffic_percent(&self) -> Result<Option<f64>, PayloadError> {
        get_f64(&self.0, TC_KEY_MAX_TRAFFIC_PERCENT, "traffic_control")
    }

    /// Success criteria in order. An absent key yields an empty list.
    pub fn success_criteria(&self) -> Result<Vec<SuccessCriterion>, PayloadError> {
        let path = format!("traffic_control.{TC_KEY_SUCCESS_CRITERIA}");
        let items = match self.0.get(TC_KEY_SUCCESS_CRITERIA) {
            None | Some(ParamValue::Null) => return Ok(Vec::new()),
            Some(ParamValue::List(items)) => items,
            Some(_) => return Err(PayloadError::mismatch(path, "array")),
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                ParamValue::Map(m) => Ok(SuccessCriterion(m.clone())),
                _ => Err(PayloadError::mismatch(format!("{path}[{i}]"), "object")),
            })
            .collect()
    }

    pub fn with_max_traffic_percent(mut self, percent: f64) -> Self {
        self.insert(TC_KEY_MAX_TRAFFIC_PERCENT, percent);
        self
    }

    /// Append a criterion. A non-list `success_criteria` value is replaced.
    pub fn with_criterion(mut self, criterion: SuccessCriterion) -> Self {
        let entry = self
            .0
            .entry(TC_KEY_SUCCESS_CRITERIA.to_string())
            .or_insert_with(|| ParamValue::List(Vec::new()));
        match entry {
            ParamValue::List(items) => items.push(ParamValue::Map(criterion.0)),
            other => *other = ParamValue::List(vec![ParamValue::Map(criterion.0)]),
        }
        self
    }

    /// Check every recognized key, criteria included, for its expected type.
    pub fn validate(&self) -> Result<(), PayloadError> {
        self.max_traffic_percent()?;
        for (i, criterion) in self.success_criteria()?.iter().enumerate() {
            criterion.validate(&format!("traffic_control.{TC_KEY_SUCCESS_CRITERIA}[{i}]"))?;
        }
        Ok(())
    }
}

/// One rule judging the candidate on a single metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuccessCriterion(ParamMap);

impl SuccessCriterion {
    pub fn new(metric_name: &str, kind: CriterionType) -> Self {
        let mut map = ParamMap::new();
        map.insert(SC_KEY_METRIC_NAME.to_string(), metric_name.into());
        map.insert(SC_KEY_TYPE.to_string(), kind.as_str().into());
        Self(map)
    }

    pub fn threshold(metric_name: &str, value: f64) -> Self {
        Self::new(metric_name, CriterionType::Threshold).with(SC_KEY_VALUE, value)
    }

    pub fn delta(metric_name: &str, value: f64) -> Self {
        Self::new(metric_name, CriterionType::Delta).with(SC_KEY_VALUE, value)
    }

    pub fn from_map(map: ParamMap) -> Self {
        Self(map)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn as_map(&self) -> &ParamMap {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn unrecognized_keys(&self) -> Vec<&str> {
        unrecognized(&self.0, SC_KEYS)
    }

    pub fn metric_name(&self) -> Result<Option<&str>, PayloadError> {
        get_str(&self.0, SC_KEY_METRIC_NAME, "success_criterion")
    }

    /// Raw `type` string, recognized or not.
    pub fn type_name(&self) -> Result<Option<&str>, PayloadError> {
        get_str(&self.0, SC_KEY_TYPE, "success_criterion")
    }

    /// `None` when `type` is absent or not one of the known kinds.
    pub fn criterion_type(&self) -> Result<Option<CriterionType>, PayloadError> {
        Ok(self.type_name()?.and_then(CriterionType::parse))
    }

    pub fn is_counter(&self) -> Result<Option<bool>, PayloadError> {
        get_bool(&self.0, SC_KEY_IS_COUNTER, "success_criterion")
    }

    /// String or number.
    pub fn absent_value(&self) -> Result<Option<&ParamValue>, PayloadError> {
        match self.0.get(SC_KEY_ABSENT_VALUE) {
            None | Some(ParamValue::Null) => Ok(None),
            Some(v) if matches!(v, ParamValue::String(_) | ParamValue::Number(_)) => Ok(Some(v)),
            Some(_) => Err(PayloadError::mismatch(
                format!("success_criterion.{SC_KEY_ABSENT_VALUE}"),
                "string or number",
            )),
        }
    }

    pub fn metric_query_template(&self) -> Result<Option<&str>, PayloadError> {
        get_str(&self.0, SC_KEY_TEMPLATE, "success_criterion")
    }

    pub fn metric_sample_size_query_template(&self) -> Result<Option<&str>, PayloadError> {
        get_str(&self.0, SC_KEY_SAMPLE_SIZE_TEMPLATE, "success_criterion")
    }

    pub fn value(&self) -> Result<Option<f64>, PayloadError> {
        get_f64(&self.0, SC_KEY_VALUE, "success_criterion")
    }

    pub fn stop_on_failure(&self) -> Result<bool, PayloadError> {
        Ok(get_bool(&self.0, SC_KEY_STOP_ON_FAILURE, "success_criterion")?.unwrap_or(false))
    }

    /// Check all recognized keys, reporting mismatches under `path`.
    pub fn validate(&self, path: &str) -> Result<(), PayloadError> {
        let checks: [Result<(), PayloadError>; 8] = [
            self.metric_name().map(drop),
            self.type_name().map(drop),
            self.is_counter().map(drop),
            self.absent_value().map(drop),
            self.metric_query_template().map(drop),
            self.metric_sample_size_query_template().map(drop),
            self.value().map(drop),
            self.stop_on_failure().map(drop),
        ];
        for check in checks {
            if let Err(PayloadError::TypeMismatch { path: p, expected }) = check {
                let key = p.trim_start_matches("success_criterion.");
                return Err(PayloadError::mismatch(format!("{path}.{key}"), expected));
            }
        }
        Ok(())
    }
}

fn unrecognized<'a>(map: &'a ParamMap, known: &[&str]) -> Vec<&'a str> {
    map.keys()
        .map(String::as_str)
        .filter(|k| !known.contains(k))
        .collect()
}

// Null reads as absent for every recognized key.

fn get_str<'a>(map: &'a ParamMap, key: &str, scope: &str) -> Result<Option<&'a str>, PayloadError> {
    match map.get(key) {
        None | Some(ParamValue::Null) => Ok(None),
        Some(ParamValue::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(PayloadError::mismatch(format!("{scope}.{key}"), "string")),
    }
}

fn get_f64(map: &ParamMap, key: &str, scope: &str) -> Result<Option<f64>, PayloadError> {
    match map.get(key) {
        None | Some(ParamValue::Null) => Ok(None),
        Some(ParamValue::Number(n)) => Ok(n.as_f64()),
        Some(_) => Err(PayloadError::mismatch(format!("{scope}.{key}"), "number")),
    }
}

fn get_bool(map: &ParamMap, key: &str, scope: &str) -> Result<Option<bool>, PayloadError> {
    match map.get(key) {
        None | Some(ParamValue::Null) => Ok(None),
        Some(ParamValue::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(PayloadError::mismatch(format!("{scope}.{key}"), "boolean")),
    }
}
