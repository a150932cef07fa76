//! Command-line interface for hitexport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and argument overrides
//! - The `verify` and `completion` subcommands

pub mod completion;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, LogLevel};
use crate::error::Result;
use crate::export::{ArtifactPublisher, Tenant};

/// hitexport - streaming bulk export of tenant analytics
#[derive(Parser, Debug)]
#[command(
    name = "hitexport",
    version,
    about = "Streaming CSV export of tenant analytics records",
    long_about = "Pages through a tenant's records, streams them into a gzip-compressed CSV
artifact and publishes it atomically with a SHA-256 digest."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Directory holding published artifacts
    #[arg(long, value_name = "DIR", global = true)]
    pub artifact_dir: Option<PathBuf>,

    /// Records requested per page
    #[arg(long, value_name = "ROWS", global = true)]
    pub page_size: Option<usize>,

    /// Pause between pages in milliseconds
    #[arg(long = "pacing-ms", value_name = "MS", global = true)]
    pub pacing_ms: Option<u64>,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for hitexport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export a tenant's records from a JSON Lines file
    Export {
        /// Tenant code, used in the artifact file name
        #[arg(short = 't', long, value_name = "CODE")]
        tenant: String,

        /// Numeric tenant identifier
        #[arg(long, value_name = "N", default_value_t = 0)]
        tenant_id: i64,

        /// JSON Lines file with one record per line, ordered by id
        #[arg(short = 'i', long, value_name = "FILE")]
        input: PathBuf,

        /// Export only records with an id greater than this
        #[arg(long, value_name = "N", default_value_t = 0)]
        resume: i64,

        /// Write a JSON receipt next to the artifact
        #[arg(long)]
        receipt: bool,
    },

    /// Check a published artifact against a digest
    Verify {
        /// Tenant code
        #[arg(short = 't', long, value_name = "CODE")]
        tenant: String,

        /// Expected digest, `sha256-<hex>`
        #[arg(long, value_name = "DIGEST")]
        digest: String,
    },

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and environment, then apply arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Effective configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        config.validate()?;
        Ok(config)
    }

    /// Override configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if let Some(dir) = &args.artifact_dir {
            config.export.artifact_dir = dir.clone();
        }
        if let Some(page_size) = args.page_size {
            config.export.page_size = page_size;
        }
        if let Some(pacing) = args.pacing_ms {
            config.export.pacing_delay_ms = pacing;
        }

        if args.very_verbose {
            config.logging.level = LogLevel::Trace;
        } else if args.verbose {
            config.logging.level = LogLevel::Debug;
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Handle subcommands that do not run an export
    ///
    /// # Returns
    /// * `Result<bool>` - True if the subcommand was handled here
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Completion { shell } => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Commands::Verify { tenant, digest } => {
                self.verify(tenant, digest)?;
                Ok(true)
            }
            Commands::Export { .. } => Ok(false),
        }
    }

    /// Check the live artifact of `tenant` against `digest`
    fn verify(&self, tenant: &str, digest: &str) -> Result<()> {
        let tenant = Tenant::new(0, tenant);
        let publisher = ArtifactPublisher::new(self.config.export.artifact_dir.clone());
        let path = publisher.artifact_path(&tenant);

        if publisher.verify(&tenant, digest)? {
            println!("OK {}", path.display());
            Ok(())
        } else {
            Err(format!("Digest mismatch for {}", path.display()).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_cli_args_export() {
        let args = CliArgs::try_parse_from([
            "hitexport",
            "export",
            "--tenant",
            "acme",
            "--input",
            "hits.jsonl",
            "--resume",
            "42",
            "--receipt",
        ])
        .unwrap();
        match args.command {
            Commands::Export {
                tenant,
                tenant_id,
                input,
                resume,
                receipt,
            } => {
                assert_eq!(tenant, "acme");
                assert_eq!(tenant_id, 0);
                assert_eq!(input, PathBuf::from("hits.jsonl"));
                assert_eq!(resume, 42);
                assert!(receipt);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_args_require_subcommand() {
        assert!(CliArgs::try_parse_from(["hitexport"]).is_err());
        assert!(CliArgs::try_parse_from(["hitexport", "export", "--tenant", "acme"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "hitexport",
            "verify",
            "--tenant",
            "acme",
            "--digest",
            "sha256-00",
            "--page-size",
            "10",
            "--vv",
        ])
        .unwrap();
        assert_eq!(args.page_size, Some(10));
        assert!(args.very_verbose);
    }

    #[test]
    fn test_args_override_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            "[export]\nartifact_dir = \"/srv/exports\"\npage_size = 100\npacing_delay_ms = 250\n",
        );
        let args = CliArgs::try_parse_from([
            "hitexport",
            "-c",
            config_path.to_str().unwrap(),
            "--pacing-ms",
            "0",
            "-v",
            "completion",
            "bash",
        ])
        .unwrap();

        let cli = CliInterface::from_args(args).unwrap();
        let config = cli.config();
        assert_eq!(config.export.artifact_dir, PathBuf::from("/srv/exports"));
        assert_eq!(config.export.page_size, 100);
        assert_eq!(config.export.pacing_delay_ms, 0);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, "");
        let args = CliArgs::try_parse_from([
            "hitexport",
            "-c",
            config_path.to_str().unwrap(),
            "--page-size",
            "0",
            "completion",
            "zsh",
        ])
        .unwrap();
        assert!(CliInterface::from_args(args).is_err());
    }

    #[test]
    fn test_verify_checks_live_artifact() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("export-acme.csv.gz");
        std::fs::write(&artifact, b"abc").unwrap();
        let config_path = write_config(&dir, "");
        let digest = crate::export::hash_file(&artifact).unwrap();

        let args = CliArgs::try_parse_from([
            "hitexport",
            "-c",
            config_path.to_str().unwrap(),
            "--artifact-dir",
            dir.path().to_str().unwrap(),
            "verify",
            "--tenant",
            "acme",
            "--digest",
            digest.as_str(),
        ])
        .unwrap();
        let cli = CliInterface::from_args(args).unwrap();
        assert!(cli.handle_subcommand().unwrap());
        assert!(cli.verify("acme", "sha256-00").is_err());
    }
}
