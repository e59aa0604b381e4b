use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// Open string-keyed parameter bag.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Loosely-typed parameter value, serialized as the plain JSON value it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(JsonNumber),
    String(String),
    List(Vec<ParamValue>),
    Map(ParamMap),
}

/// A JSON number kept as the literal it was written as, so `1e2` or
/// `18446744073709551616` re-encode unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonNumber(String);

impl JsonNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl From<serde_json::Number> for JsonNumber {
    fn from(n: serde_json::Number) -> Self {
        Self(n.to_string())
    }
}

impl fmt::Display for JsonNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for JsonNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawValue::from_string(self.0.clone())
            .map_err(<S::Error as ser::Error>::custom)?
            .serialize(serializer)
    }
}

/// Captures each value's raw text first so numbers are never routed through
/// `f64`.
impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        ParamValue::from_raw(&raw).map_err(<D::Error as de::Error>::custom)
    }
}

impl ParamValue {
    fn from_raw(raw: &RawValue) -> serde_json::Result<Self> {
        let text = raw.get().trim();
        match text.as_bytes().first().copied() {
            Some(b'n') => Ok(ParamValue::Null),
            Some(b't' | b'f') => serde_json::from_str(text).map(ParamValue::Bool),
            Some(b'"') => serde_json::from_str(text).map(ParamValue::String),
            Some(b'[') => serde_json::from_str(text).map(ParamValue::List),
            Some(b'{') => serde_json::from_str(text).map(ParamValue::Map),
            _ => Ok(ParamValue::Number(JsonNumber(text.to_string()))),
        }
    }

    /// Name of the JSON type held, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Null => "null",
            ParamValue::Bool(_) => "boolean",
            ParamValue::Number(_) => "number",
            ParamValue::String(_) => "string",
            ParamValue::List(_) => "array",
            ParamValue::Map(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ParamMap> {
        match self {
            ParamValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Number(JsonNumber(v.to_string()))
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::Number(JsonNumber(v.to_string()))
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v)
            .map(|n| ParamValue::Number(n.into()))
            .unwrap_or(ParamValue::Null)
    }
}

impl From<Vec<ParamValue>> for ParamValue {
    fn from(v: Vec<ParamValue>) -> Self {
        ParamValue::List(v)
    }
}

impl From<ParamMap> for ParamValue {
    fn from(v: ParamMap) -> Self {
        ParamValue::Map(v)
    }
}

/// How a success criterion judges its metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionType {
    /// Compare the candidate against the baseline.
    Delta,
    /// Check the candidate alone.
    Threshold,
}

impl CriterionType {
    pub fn as_str(self) -> &'static str {
        match self {
            CriterionType::Delta => "delta",
            CriterionType::Threshold => "threshold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delta" => Some(CriterionType::Delta),
            "threshold" => Some(CriterionType::Threshold),
            _ => None,
        }
    }
}

impl fmt::Display for CriterionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO-8601 timestamp, kept as the exact string received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Format as RFC 3339 with second precision and a `Z` suffix.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse as RFC 3339, falling back to an offset-less form read as UTC.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.0) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.0, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Timestamp {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
