//! Interactive prompts for the setup wizard.

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password, Select};

use crate::config::{ConnectionConfig, DeploymentType, MigrationOptions};
use crate::error::{Error, Result};

/// Which side of the migration is being configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Where documents are read from.
    Source,
    /// Where documents are written to.
    Target,
}

impl Side {
    fn title(self) -> &'static str {
        match self {
            Self::Source => "Source",
            Self::Target => "Target",
        }
    }
}

/// Interactive prompts handler.
pub struct SetupPrompts {
    theme: ColorfulTheme,
}

impl Default for SetupPrompts {
    fn default() -> Self {
        Self::new()
    }
}

fn cancelled(e: dialoguer::Error) -> Error {
    Error::Config(format!("Input cancelled: {e}"))
}

impl SetupPrompts {
    /// Creates a new prompts handler.
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    /// Asks before replacing an existing settings file. Defaults to no.
    pub fn confirm_overwrite(&self) -> Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt("An existing configuration file was found. Overwrite?")
            .default(false)
            .interact()
            .map_err(cancelled)
    }

    /// Collects the connection settings of one side.
    pub fn connection(&self, side: Side) -> Result<ConnectionConfig> {
        let uri: String = Input::with_theme(&self.theme)
            .with_prompt(format!("{} MongoDB URI", side.title()))
            .default("mongodb://localhost:27017".to_string())
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                if input.starts_with("mongodb://") || input.starts_with("mongodb+srv://") {
                    Ok(())
                } else {
                    Err("must start with mongodb:// or mongodb+srv://")
                }
            })
            .interact_text()
            .map_err(cancelled)?;

        let deployment_type = self.deployment_type(side)?;
        let mut config = ConnectionConfig::new(uri).with_deployment_type(deployment_type);

        match deployment_type {
            DeploymentType::ReplicaSet => {
                let name: String = Input::with_theme(&self.theme)
                    .with_prompt("Replica Set name")
                    .interact_text()
                    .map_err(cancelled)?;
                config.replica_set = Some(name).filter(|n| !n.is_empty());
            }
            DeploymentType::Atlas => {
                let key = Password::with_theme(&self.theme)
                    .with_prompt("Atlas API Key (optional)")
                    .allow_empty_password(true)
                    .interact()
                    .map_err(cancelled)?;
                config.api_key = Some(key).filter(|k| !k.is_empty());

                if side == Side::Target {
                    let project: String = Input::with_theme(&self.theme)
                        .with_prompt("Atlas Project ID (optional)")
                        .allow_empty(true)
                        .interact_text()
                        .map_err(cancelled)?;
                    config.project_id = Some(project).filter(|p| !p.is_empty());
                }
            }
            DeploymentType::Standalone | DeploymentType::Sharded => {}
        }
        Ok(config)
    }

    fn deployment_type(&self, side: Side) -> Result<DeploymentType> {
        let types = DeploymentType::all();
        let items: Vec<&str> = types.iter().map(DeploymentType::display_name).collect();

        let selection = Select::with_theme(&self.theme)
            .with_prompt(format!("{} deployment type", side.title()))
            .items(&items)
            .default(0)
            .interact()
            .map_err(|e| Error::Config(format!("Selection cancelled: {e}")))?;

        Ok(types[selection])
    }

    /// Collects batch size, concurrency and timeout.
    pub fn options(&self) -> Result<MigrationOptions> {
        let defaults = MigrationOptions::default();
        let batch_size = self.positive("Batch size (documents per batch)", defaults.batch_size)?;
        let concurrency =
            self.positive("Concurrency level (parallel operations)", defaults.concurrency)?;
        let timeout_ms = self.positive("Operation timeout in ms", defaults.timeout_ms)?;

        Ok(MigrationOptions {
            batch_size,
            concurrency,
            timeout_ms,
            ..defaults
        })
    }

    fn positive<T>(&self, prompt: &str, default: T) -> Result<T>
    where
        T: Clone + std::fmt::Display + std::str::FromStr + PartialEq + Default,
        T::Err: std::fmt::Debug + std::fmt::Display,
    {
        Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .validate_with(|value: &T| -> std::result::Result<(), &str> {
                if *value == T::default() {
                    Err("must be greater than 0")
                } else {
                    Ok(())
                }
            })
            .interact_text()
            .map_err(cancelled)
    }
}
