//! Print the hydration order of a variables file.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::HydrateConfig;
use crate::graph::DependencyGraph;

/// Print the order variables are resolved in.
#[derive(Args, Debug)]
pub struct OrderCommand {
    /// Variables file (TOML, or JSON with a .json extension)
    pub file: PathBuf,
}

impl OrderCommand {
    /// Print the order and any cycle.
    ///
    /// Cyclic variables are listed separately; they are never resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the variables file cannot be loaded.
    pub async fn execute(self, settings: &HydrateConfig) -> Result<()> {
        let variables = super::read_variables(&self.file, settings).await?;
        let graph = DependencyGraph::build(&variables, settings.reference_syntax);
        let (order, cycle) = graph.acyclic_order();

        println!(
            "{} {} variables, {} references",
            "Hydration order:".bold(),
            graph.node_count(),
            graph.edge_count()
        );
        for (position, node) in order.iter().enumerate() {
            let kind = variables
                .iter()
                .find(|v| v.id == node.id)
                .map(|v| v.kind().to_string())
                .unwrap_or_default();
            println!("  {:>3}. {} {}", position + 1, node.name, format!("({kind})").dimmed());
        }

        if let Some(cycle) = cycle {
            println!();
            println!("{} {}", "⚠".yellow(), cycle.to_string().yellow());
            println!("  These variables stay unresolved: {}", cycle.names().join(", "));
        }

        Ok(())
    }
}
