//! Print a variable together with everything it depends on.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::HydrateConfig;
use crate::core::HydrateError;
use crate::export::VariableExport;
use crate::graph::DependencyGraph;

/// Print a variable and its transitive dependencies.
#[derive(Args, Debug)]
pub struct DepsCommand {
    /// Variables file (TOML, or JSON with a .json extension)
    pub file: PathBuf,

    /// Name of the variable to export
    pub name: String,

    /// Output format: text or json
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl DepsCommand {
    /// Print the export bundle of the named variable.
    ///
    /// # Errors
    ///
    /// Returns [`HydrateError::NotFound`] if no variable has that name, or an error if the
    /// variables file cannot be loaded.
    pub async fn execute(self, settings: &HydrateConfig) -> Result<()> {
        let variables = super::read_variables(&self.file, settings).await?;
        let variable = variables.iter().find(|v| v.name == self.name).cloned().ok_or_else(|| {
            HydrateError::NotFound {
                resource: "variable".to_string(),
                id: self.name.clone(),
            }
        })?;

        let export = VariableExport::new(variable, &variables, settings.reference_syntax);

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&export)?);
            }
            OutputFormat::Text => {
                let graph = DependencyGraph::build(&variables, settings.reference_syntax);
                print!("{}", graph.to_tree_string(&export.variable.id));

                if export.dependencies.is_empty() {
                    println!("{}", "No dependencies".dimmed());
                } else {
                    println!(
                        "{} {}",
                        format!("Dependencies ({}):", export.dependencies.len()).bold(),
                        export.dependency_names().join(", ")
                    );
                }
            }
        }

        Ok(())
    }
}
