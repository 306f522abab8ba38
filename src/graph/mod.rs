//! Reference detection and the variable dependency graph.
//!
//! - [`references`] turns query template text into typed [`VariableReference`]s
//! - [`dependency_graph`] builds the reference graph and its deterministic order

pub mod dependency_graph;
pub mod references;

pub use dependency_graph::{CycleDetected, DependencyGraph, ReferenceEdge, VariableNode};
pub use references::{
    ReferenceSyntax, VariableReference, extract_references, referenced_names, substitute,
};
