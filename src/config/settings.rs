use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub socket_path: PathBuf,
    pub log_level: String,
}

impl Settings {
    /// Defaults overridable through `DICTRACE_*` environment variables,
    /// e.g. `DICTRACE_SOCKET_PATH=/tmp/pynode.sock`.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .set_default("socket_path", "pynode.sock")?
            .set_default("log_level", "info")?
            .add_source(Environment::with_prefix("DICTRACE"))
            .build()?;

        cfg.try_deserialize()
    }
}
