use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::PayloadError;
use crate::types::Timestamp;

/// Time range and identifying labels for one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Beginning of the time range of interest.
    pub start_time: Timestamp,

    /// End of the time range; `None` means "now" at evaluation time.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub end_time: Option<Timestamp>,

    /// Labels identifying the data that belongs to this version.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub tags: BTreeMap<String, String>,
}

impl Window {
    pub fn new(start_time: impl Into<Timestamp>) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: None,
            tags: BTreeMap::new(),
        }
    }

    /// Set the end time. An empty string leaves it unset.
    pub fn with_end(mut self, end_time: impl Into<Timestamp>) -> Self {
        let end_time = end_time.into();
        self.end_time = (!end_time.is_empty()).then_some(end_time);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// End of the window, resolving an unset end to `now`.
    ///
    /// Returns `None` only when a set end time does not parse.
    pub fn effective_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.set_end() {
            Some(end) => end.to_datetime(),
            None => Some(now),
        }
    }

    pub(crate) fn validate(&self, path: &str) -> Result<(), PayloadError> {
        if self.start_time.is_empty() {
            return Err(PayloadError::MissingField(format!("{path}.start_time")));
        }
        if self.start_time.to_datetime().is_none() {
            return Err(PayloadError::InvalidTimestamp {
                path: format!("{path}.start_time"),
                value: self.start_time.to_string(),
            });
        }
        if let Some(end) = self.set_end() {
            if end.to_datetime().is_none() {
                return Err(PayloadError::InvalidTimestamp {
                    path: format!("{path}.end_time"),
                    value: end.to_string(),
                });
            }
        }
        Ok(())
    }

    /// `end_time`, reading `Some("")` assigned to the public field as unset.
    fn set_end(&self) -> Option<&Timestamp> {
        self.end_time.as_ref().filter(|end| !end.is_empty())
    }
}

/// Missing, `null`, and `""` all decode to `None`.
fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Timestamp>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(Timestamp::from))
}
