use anyhow::Result;
use clap::{Args, ValueEnum};
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Utility function to expand $HOME in a PathBuf
pub fn expand_home_in_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in path"))?;

    if !path_str.contains("$HOME") {
        return Ok(path.to_path_buf());
    }

    let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let home = home_dir
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in home directory"))?;

    Ok(PathBuf::from(path_str.replace("$HOME", home)))
}

#[derive(Config, Clone, Debug, Serialize, Deserialize)]
#[config(layer_attr(derive(Args, Serialize, Clone)))]
pub struct AppConfig {
    #[config(nested, layer_attr(command(flatten)))]
    pub ballot: BallotConfig,

    #[config(nested, layer_attr(command(flatten)))]
    pub output: OutputConfig,
}

#[derive(Config, Clone, Debug, Serialize, Deserialize)]
#[config(layer_attr(derive(Args, Clone, Serialize)))]
pub struct BallotConfig {
    /// The question put to voters
    #[config(env = "EZBALLOT_PROPOSAL", layer_attr(arg(long)))]
    pub proposal: String,

    /// Label of the first option
    #[config(env = "EZBALLOT_OPTION_A", layer_attr(arg(long)))]
    pub option_a: String,

    /// Label of the second option
    #[config(env = "EZBALLOT_OPTION_B", layer_attr(arg(long)))]
    pub option_b: String,

    /// How long the ballot stays open, in minutes
    #[config(default = 60, env = "EZBALLOT_DURATION_MINUTES", layer_attr(arg(long)))]
    pub duration_minutes: i64,

    /// Identity of the ballot administrator
    #[config(env = "EZBALLOT_ADMIN", layer_attr(arg(long)))]
    pub admin: String,

    /// How far, in seconds, a signed step's issue time may be from the clock
    #[config(default = 30, env = "EZBALLOT_MAX_REQUEST_AGE", layer_attr(arg(long)))]
    pub max_request_age: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Config, Clone, Debug, Serialize, Deserialize)]
#[config(layer_attr(derive(Args, Clone, Serialize)))]
pub struct OutputConfig {
    /// How step outcomes are printed
    #[config(default = "text", env = "EZBALLOT_FORMAT", layer_attr(arg(long, value_enum)))]
    pub format: OutputFormat,
}

impl AppConfig {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
