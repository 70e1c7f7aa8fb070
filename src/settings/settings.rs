use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Required: startup fails without a store to talk to.
    pub database_url: String,
    /// Required: access tokens are unusable without a signing key.
    pub jwt_secret: String,
    #[serde(default)]
    pub node_env: NodeEnv,
    #[serde(default)]
    pub log: Log,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeEnv {
    #[default]
    Dev,
    Prod,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            filter: default_filter(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_filter() -> String {
    "info".to_owned()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Profile file first, then the environment on top (PORT, DATABASE_URL,
/// JWT_SECRET, NODE_ENV). Missing required keys abort startup here, before
/// any socket or pool is opened.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let explicit = path.is_some();
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path).required(explicit))
        .add_source(Environment::default())
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!("invalid configuration: {e}"))?;

    Ok(settings)
}
