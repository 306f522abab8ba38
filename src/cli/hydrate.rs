//! Resolve a variables file against recorded query results.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::OutputFormat;
use crate::config::HydrateConfig;
use crate::core::{HydrateError, Variable};
use crate::graph::DependencyGraph;
use crate::hydrate::{StaticExecutor, ValueStatus, VariableValues, VariableValuesByID};
use crate::notify::TracingNotifier;
use crate::persistence::InMemoryPersistence;
use crate::service::VariableService;

/// Resolve variables against recorded query results.
#[derive(Args, Debug)]
pub struct HydrateCommand {
    /// Variables file (TOML, or JSON with a .json extension)
    pub file: PathBuf,

    /// JSON object mapping substituted query text to its result rows
    #[arg(long)]
    pub results: PathBuf,

    /// Context to hydrate
    #[arg(long, default_value = "cli")]
    pub context: String,

    /// Pin a variable to a value, as name=value (repeatable)
    #[arg(long = "select", value_name = "NAME=VALUE", value_parser = parse_selection)]
    pub selections: Vec<(String, String)>,

    /// Output format: text or json
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Parse a `name=value` selection.
fn parse_selection(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

async fn load_results(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;
    let results: HashMap<String, Vec<String>> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse results file: {}", path.display()))?;

    Ok(results.into_iter().map(|(query, rows)| (query.trim().to_string(), rows)).collect())
}

impl HydrateCommand {
    /// Hydrate every variable of the file in one context and print the values.
    ///
    /// # Errors
    ///
    /// Returns an error if an input file cannot be loaded, a selection names an unknown
    /// variable, or hydration fails (for example on a cycle with `strict_cycles`).
    pub async fn execute(self, settings: &HydrateConfig) -> Result<()> {
        let variables = super::read_variables(&self.file, settings).await?;
        let executor = StaticExecutor::new(load_results(&self.results).await?);

        let service = VariableService::new(
            settings.hydration_options(),
            Arc::new(InMemoryPersistence::with_variables(variables.clone())),
            Arc::new(executor),
            Arc::new(TracingNotifier),
        );
        service.load_variables().await?;

        for (name, value) in &self.selections {
            let variable = variables.iter().find(|v| &v.name == name).ok_or_else(|| {
                HydrateError::NotFound {
                    resource: "variable".to_string(),
                    id: name.clone(),
                }
            })?;
            service.select_value(&self.context, &variable.id, value.clone());
        }

        let values = service
            .refresh_variable_values(&self.context, variables.clone())
            .await?
            .ok_or_else(|| HydrateError::Cancelled {
                context_id: self.context.clone(),
            })?;

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&values)?);
            }
            OutputFormat::Text => print_values(&variables, &values, settings),
        }

        Ok(())
    }
}

fn print_values(variables: &[Variable], values: &VariableValuesByID, settings: &HydrateConfig) {
    let graph = DependencyGraph::build(variables, settings.reference_syntax);
    let (order, cycle) = graph.acyclic_order();
    let cyclic = cycle.iter().flat_map(|c| c.nodes.iter().cloned());

    for node in order.into_iter().chain(cyclic) {
        let Some(value) = values.get(&node.id) else {
            continue;
        };
        println!("{} {}", status_marker(value), node.name.bold());
        print_detail(value);
    }
}

fn status_marker(value: &VariableValues) -> colored::ColoredString {
    match value.status {
        ValueStatus::Resolved => "✓".green(),
        ValueStatus::Unresolved => "⚠".yellow(),
        ValueStatus::Failed {
            ..
        }
        | ValueStatus::DependencyFailed {
            ..
        } => "✗".red(),
    }
}

fn print_detail(value: &VariableValues) {
    match &value.status {
        ValueStatus::Resolved => {
            println!("    values:   [{}]", value.values.join(", "));
            if let Some(selected) = &value.selected {
                println!("    selected: {selected}");
            }
            if value.substitution.is_some() && value.substitution != value.selected {
                println!("    substitutes: {}", value.substitution.as_deref().unwrap_or_default());
            }
        }
        ValueStatus::Unresolved => println!("    {}", "part of a reference cycle".yellow()),
        ValueStatus::Failed {
            reason,
        } => println!("    {} {reason}", "query failed:".red()),
        ValueStatus::DependencyFailed {
            dependency,
        } => println!("    {} {dependency}", "blocked by".red()),
    }
}
