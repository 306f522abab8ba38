//! Command-line interface for varhydrate.
//!
//! The CLI works on a variables file (TOML or JSON, see
//! [`VariableFile`](crate::persistence::VariableFile)) and never talks to a live data
//! source: `hydrate` answers queries from a recorded results file.
//!
//! # Commands
//!
//! - `order` - print the hydration order and any reference cycle
//! - `deps` - print a variable with everything it depends on
//! - `hydrate` - resolve every variable against recorded query results
//!
//! ```bash
//! varhydrate order variables.toml
//! varhydrate deps variables.toml measurement --format json
//! varhydrate hydrate variables.toml --results results.json --select bucket=system
//! ```

mod deps;
mod hydrate;
mod order;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::HydrateConfig;
use crate::core::Variable;
use crate::persistence::VariableFile;

pub use deps::DepsCommand;
pub use hydrate::HydrateCommand;
pub use order::OrderCommand;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter forced by `--verbose` or `--quiet`; `None` defers to `RUST_LOG` and
    /// then to the config file.
    pub log_level: Option<String>,

    /// Config file given with `--config`.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global tracing subscriber; later calls are no-ops.
    ///
    /// Precedence: the verbosity flags, then `RUST_LOG`, then the config file's
    /// `log_level`, then `warn`. Logs go to stderr so JSON output stays parseable.
    pub fn init_logging(&self, config_level: Option<&str>) {
        let filter = match (&self.log_level, std::env::var("RUST_LOG")) {
            (Some(level), _) => EnvFilter::new(level),
            (None, Ok(_)) => EnvFilter::from_default_env(),
            (None, Err(_)) => EnvFilter::new(config_level.unwrap_or("warn")),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Dependency-aware hydration of query variables.
#[derive(Parser)]
#[command(
    name = "varhydrate",
    about = "Resolve query variables in dependency order",
    version,
    long_about = "varhydrate resolves named query variables that reference each other, \
                  detecting reference cycles and honoring per-context selections."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the config file (default: ~/.varhydrate/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the order variables are resolved in
    Order(OrderCommand),

    /// Print a variable and the variables it depends on
    Deps(DepsCommand),

    /// Resolve variables against recorded query results
    Hydrate(HydrateCommand),
}

/// Output format of the `deps` and `hydrate` commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

impl Cli {
    /// Run the parsed command.
    ///
    /// # Errors
    ///
    /// Returns the command's failure for display by the caller.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Run the parsed command with an explicit [`CliConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is invalid or the command fails.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let settings = HydrateConfig::load_with_optional(config.config_path.clone()).await?;
        config.init_logging(settings.log_level.as_deref());

        match self.command {
            Commands::Order(cmd) => cmd.execute(&settings).await,
            Commands::Deps(cmd) => cmd.execute(&settings).await,
            Commands::Hydrate(cmd) => cmd.execute(&settings).await,
        }
    }
}

/// Read the variables of `path` under the configured organization.
async fn read_variables(path: &Path, settings: &HydrateConfig) -> Result<Vec<Variable>> {
    Ok(VariableFile::load(path).await?.into_variables(&settings.org_id))
}
