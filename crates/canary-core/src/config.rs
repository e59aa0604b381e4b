use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::payload::Request;
use crate::traffic::TrafficControl;

/// Default location of the workspace defaults file.
pub const DEFAULTS_PATH: &str = ".canary/defaults.json";

/// Environment variable overriding [`DEFAULTS_PATH`].
pub const DEFAULTS_ENV: &str = "CANARY_DEFAULTS";

/// Workspace-level defaults merged into generated requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub traffic_control: TrafficControl,
}

pub fn defaults_path() -> PathBuf {
    std::env::var_os(DEFAULTS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULTS_PATH))
}

/// Load workspace defaults; `Ok(None)` when no file exists.
pub fn load_workspace_defaults() -> Result<Option<Defaults>> {
    load_defaults(&defaults_path())
}

pub fn load_defaults(path: &Path) -> Result<Option<Defaults>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let defaults: Defaults = serde_json::from_str(&content)
        .with_context(|| format!("{}: invalid defaults", path.display()))?;
    defaults
        .traffic_control
        .validate()
        .with_context(|| format!("{}: invalid traffic_control", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded workspace defaults");
    Ok(Some(defaults))
}

/// Fill traffic-control keys the request leaves unset. Request keys win.
pub fn apply_defaults(request: &mut Request, defaults: &Defaults) {
    for (key, value) in defaults.traffic_control.as_map() {
        if !request.traffic_control.contains_key(key) {
            request.traffic_control.insert(key.clone(), value.clone());
        }
    }
}
