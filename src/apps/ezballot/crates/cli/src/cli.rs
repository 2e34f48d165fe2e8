use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use confique::Config;
use ezballot_core::Keypair;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{AppConfig, OutputFormat, expand_home_in_path};
use crate::script::{Script, Session};

use crate::config::confique_app_config_layer::AppConfigLayer;

#[derive(Parser)]
#[command(name = "ezballot")]
#[command(about = "A single-proposal, two-option ballot registry")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "$HOME/.ezballot/config.toml")]
    config_path: PathBuf,

    /// Configuration object
    #[command(flatten)]
    config: AppConfigLayer,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted session against a fresh ballot
    Run {
        /// Path to the TOML script
        script: PathBuf,
    },
    /// Generate an ed25519 keypair for signing script steps
    Keygen,
    /// Print the resolved configuration
    Config {
        /// Write the resolved configuration back to the config file
        #[arg(long)]
        write: bool,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let log_level = if self.verbose { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(format!("ezballot={log_level},ezballot_core={log_level},warn"))
            .with_writer(std::io::stderr)
            .init();

        match self.command {
            // Keygen needs no ballot configuration
            Commands::Keygen => keygen(),
            Commands::Run { ref script } => {
                let config = Self::resolve_config(&self.config_path, self.config.clone())?;
                run_script(&config, script)
            }
            Commands::Config { write } => {
                let config = Self::resolve_config(&self.config_path, self.config.clone())?;
                if write {
                    let path = expand_home_in_path(&self.config_path)?;
                    config.save(&path)?;
                    info!(path = %path.display(), "configuration written");
                } else {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
                Ok(())
            }
        }
    }

    /// Layer CLI flags over environment variables over the config file.
    fn resolve_config(config_path: &Path, preloaded: AppConfigLayer) -> Result<AppConfig> {
        let config_path = expand_home_in_path(config_path)?;

        AppConfig::builder()
            .preloaded(preloaded)
            .env()
            .file(&config_path)
            .load()
            .with_context(|| format!("failed to load configuration from {}", config_path.display()))
    }
}

fn run_script(config: &AppConfig, path: &Path) -> Result<()> {
    let script = Script::load(path)?;
    let session = Session::create(&config.ballot, script.start)?;

    info!(
        steps = script.steps.len(),
        deadline = session.registry().inspect(|r| r.config().deadline()),
        "replaying script"
    );

    for report in session.replay(&script) {
        match config.output.format {
            OutputFormat::Text => println!("{report}"),
            OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        }
    }

    Ok(())
}

fn keygen() -> Result<()> {
    let keypair = Keypair::generate();

    println!("identity:    {}", keypair.identity());
    println!("public key:  {}", hex::encode(keypair.verifying_key().as_bytes()));
    println!("secret key:  {}", hex::encode(keypair.signing_key().to_bytes()));
    println!();
    println!("Use the identity as `admin` or in `identities`, and the secret key as a step's `signer`.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "ezballot",
            "--proposal",
            "Ship it?",
            "--duration-minutes",
            "10",
            "--format",
            "json",
            "run",
            "session.toml",
        ])
        .unwrap();

        assert_eq!(cli.config.ballot.proposal.as_deref(), Some("Ship it?"));
        assert_eq!(cli.config.ballot.duration_minutes, Some(10));
        assert_eq!(cli.config.output.format, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Run { .. }));
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[ballot]\nproposal = \"p\"\noption_a = \"a\"\noption_b = \"b\"\nadmin = \"root\"\nduration_minutes = 3\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from(["ezballot", "--duration-minutes", "9", "config"]).unwrap();
        let config = Cli::resolve_config(&path, cli.config).unwrap();

        assert_eq!(config.ballot.duration_minutes, 9);
        assert_eq!(config.ballot.admin, "root");
    }
}
