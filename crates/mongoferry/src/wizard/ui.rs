//! Console output for the setup wizard.

use console::{style, Style};
use std::path::Path;

/// Console UI handler for the wizard.
#[derive(Debug, Default)]
pub struct SetupUI;

impl SetupUI {
    /// Creates a new UI handler.
    pub fn new() -> Self {
        Self
    }

    /// Prints the wizard header.
    pub fn print_header(&self) {
        let cyan = Style::new().cyan().bold();
        println!();
        println!("{}", cyan.apply_to("MongoDB Migration Tool - Interactive Setup"));
        println!();
    }

    /// Prints a section title.
    pub fn print_section(&self, title: &str) {
        println!();
        println!("{}", style(title).bold());
    }

    /// Prints the result of a saved configuration and the next commands.
    pub fn print_saved(&self, path: &Path) {
        let green = Style::new().green().bold();
        let blue = Style::new().blue();

        println!();
        println!("{}", green.apply_to("Configuration saved successfully!"));
        println!("Configuration file: {}", path.display());
        println!();
        println!("You can now run:");
        println!("  {} - To analyze source databases", blue.apply_to("mongoferry analyze"));
        println!("  {} - To start the migration process", blue.apply_to("mongoferry migrate"));
    }

    /// Prints that setup was abandoned without touching the file.
    pub fn print_kept(&self) {
        println!("{}", style("Setup canceled. Existing configuration preserved.").green());
    }
}
