//! Interactive setup wizard.
//!
//! Asks for both connections and the numeric options, then writes the
//! key-value settings file read by `analyze` and `migrate`.

mod prompts;
mod ui;

pub use prompts::{SetupPrompts, Side};
pub use ui::SetupUI;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::settings::Settings;

/// Interactive setup wizard.
pub struct SetupWizard {
    path: PathBuf,
    ui: SetupUI,
    prompts: SetupPrompts,
}

impl SetupWizard {
    /// Creates a wizard writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ui: SetupUI::new(),
            prompts: SetupPrompts::new(),
        }
    }

    /// Settings file the wizard writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs the wizard. Returns `None` when the user kept an existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if a prompt is cancelled or the file cannot be written.
    pub fn run(&self) -> Result<Option<Settings>> {
        self.ui.print_header();

        if self.path.exists() && !self.prompts.confirm_overwrite()? {
            self.ui.print_kept();
            return Ok(None);
        }

        self.ui.print_section("Source MongoDB Configuration:");
        let source = self.prompts.connection(Side::Source)?;

        self.ui.print_section("Target MongoDB Configuration:");
        let target = self.prompts.connection(Side::Target)?;

        self.ui.print_section("Migration Options:");
        let options = self.prompts.options()?;

        let settings = Settings {
            source,
            target,
            options,
            ..Settings::default()
        };
        settings.save(&self.path)?;
        self.ui.print_saved(&self.path);

        Ok(Some(settings))
    }
}
