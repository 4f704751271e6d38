use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::commands::RuleArgs;
use crate::cli::{Cli, OutputFormat};
use crate::config::{Config, PROJECT_CONFIG_FILE};
use crate::diagnostics::MemorySink;
use crate::error::Result;
use crate::orchestrator::ValidationService;

pub struct AppContext {
    pub project_root: PathBuf,
    pub config: Config,
    pub output_format: OutputFormat,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let project_root = find_project_root(&cwd);
        let mut config = Config::load(cli.config.as_deref(), &project_root)?;
        if let Some(dir) = &cli.schemas {
            config.schemas.dir = Some(dir.clone());
        }

        Ok(Self {
            project_root,
            config,
            output_format: cli.output_format(),
            verbosity: cli.verbose,
        })
    }

    /// Build a validation service from the loaded config with per-command
    /// rule overrides applied.
    pub fn service(&self, overrides: &RuleArgs) -> Result<ValidationService> {
        let mut config = self.config.clone();
        overrides.apply(&mut config);
        ValidationService::from_config(&config, Arc::new(MemorySink::new()))
    }

    #[must_use]
    pub fn is_human(&self) -> bool {
        self.output_format == OutputFormat::Human
    }
}

/// Nearest ancestor holding a project config file, else `start` itself.
fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_CONFIG_FILE).is_file())
        .unwrap_or(start)
        .to_path_buf()
}
