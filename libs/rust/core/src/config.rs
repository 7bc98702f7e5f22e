//! Layered service configuration: defaults, optional file, `INFERENCE__*`
//! environment, then the flat `MODEL_*` variables on top.

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_MODEL_VERSION: &str = "v1.0.0";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
/// Names a config file (toml, yaml, json...) layered under the environment.
pub const CONFIG_FILE_VAR: &str = "INFERENCE_CONFIG_FILE";
const ENV_PREFIX: &str = "INFERENCE";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Reported by `/health` and `/predict`; never checked against the artifact.
    pub model_version: String,
    /// Artifact location. `None` means `model.json` next to the executable.
    pub model_path: Option<PathBuf>,
    /// Optional hex SHA-256 pin for the artifact file.
    pub model_sha256: Option<String>,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub log_json: bool,
}

impl ServiceConfig {
    /// Snapshot of the process environment. Entries that are not valid
    /// unicode are skipped.
    pub fn load() -> Result<Self> {
        Self::from_vars(&unicode_vars(std::env::vars_os()))
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("model_version", DEFAULT_MODEL_VERSION)?
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("log_level", "info")?
            .set_default("log_json", false)?;

        if let Some(file) = vars.get(CONFIG_FILE_VAR) {
            builder = builder.add_source(config::File::with_name(file).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .source(Some(vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())),
        );
        builder = builder
            .set_override_option("model_version", vars.get("MODEL_VERSION").cloned())?
            .set_override_option("model_path", vars.get("MODEL_PATH").cloned())?
            .set_override_option("model_sha256", vars.get("MODEL_SHA256").cloned())?;

        let cfg = builder.build()?.try_deserialize::<Self>()?;
        Ok(cfg)
    }
}

fn unicode_vars(vars: impl Iterator<Item = (OsString, OsString)>) -> HashMap<String, String> {
    vars.filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))).collect()
}
