use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Continuation state owned by the analytics service.
///
/// The controller stores and forwards it; there is no accessor for its
/// contents. The JSON text is held as received, so it re-encodes to the same
/// bytes whatever numbers or spellings it contains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LastState(Box<RawValue>);

impl LastState {
    /// No state yet (first call of an experiment). Encodes as `null`.
    pub fn none() -> Self {
        Self(RawValue::NULL.to_owned())
    }

    pub fn from_value(value: Value) -> Self {
        serde_json::value::to_raw_value(&value)
            .map(Self)
            .unwrap_or_else(|_| Self::none())
    }

    pub fn is_absent(&self) -> bool {
        self.raw() == "null"
    }

    /// `sha256:<hex>` digest of the state with object keys sorted.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::from_str::<Value>(self.raw())
            .and_then(|value| serde_json::to_vec(&sorted(&value)))
            .unwrap_or_default();
        format!("sha256:{:x}", Sha256::digest(&canonical))
    }

    fn raw(&self) -> &str {
        self.0.get().trim()
    }
}

impl Default for LastState {
    fn default() -> Self {
        Self::none()
    }
}

/// Equal when the JSON text is equal.
impl PartialEq for LastState {
    fn eq(&self, other: &Self) -> bool {
        self.raw() == other.raw()
    }
}

impl fmt::Display for LastState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_absent() {
            f.write_str("(none)")
        } else {
            f.write_str(&self.fingerprint())
        }
    }
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::with_capacity(obj.len());
            for k in keys {
                out.insert(k.clone(), sorted(&obj[k]));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
