//! Variable reference extraction for query templates.
//!
//! Query templates name other variables through a placeholder. This module finds those
//! placeholders and returns typed [`VariableReference`]s with their byte spans, so the
//! graph builder, the scheduler's substitution step and the export extractor all share
//! one detection rule.
//!
//! # Supported Syntaxes
//!
//! - **Dollar** (default): `$(name)`
//! - **Flux**: `v.name`, only as a whole token (the `v` must not continue an identifier
//!   or a member access such as `r.v.name`)
//!
//! Names match `[A-Za-z_][A-Za-z0-9_]*`.
//!
//! # Usage
//!
//! ```rust
//! use varhydrate::graph::{ReferenceSyntax, referenced_names, substitute};
//!
//! let query = r#"from(bucket: "$(bucket)") |> filter(fn: (r) => r.host == "$(host)")"#;
//! assert_eq!(referenced_names(query, ReferenceSyntax::Dollar), vec!["bucket", "host"]);
//!
//! let text = substitute(query, ReferenceSyntax::Dollar, |name| {
//!     (name == "bucket").then(|| "telegraf".to_string())
//! });
//! assert!(text.starts_with(r#"from(bucket: "telegraf")"#));
//! assert!(text.contains("$(host)"));
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

/// Placeholder syntax used to reference variables inside query templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSyntax {
    /// `$(name)`
    #[default]
    Dollar,
    /// `v.name`
    Flux,
}

impl fmt::Display for ReferenceSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceSyntax::Dollar => write!(f, "dollar"),
            ReferenceSyntax::Flux => write!(f, "flux"),
        }
    }
}

impl std::str::FromStr for ReferenceSyntax {
    type Err = crate::core::HydrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dollar" => Ok(ReferenceSyntax::Dollar),
            "flux" => Ok(ReferenceSyntax::Flux),
            _ => Err(crate::core::HydrateError::ConfigError {
                message: format!("Unknown reference syntax '{s}' (expected 'dollar' or 'flux')"),
            }),
        }
    }
}

impl ReferenceSyntax {
    fn pattern(self) -> Option<&'static Regex> {
        static DOLLAR: OnceLock<Option<Regex>> = OnceLock::new();
        static FLUX: OnceLock<Option<Regex>> = OnceLock::new();

        match self {
            ReferenceSyntax::Dollar => DOLLAR
                .get_or_init(|| Regex::new(r"\$\(([A-Za-z_][A-Za-z0-9_]*)\)").ok())
                .as_ref(),
            ReferenceSyntax::Flux => {
                FLUX.get_or_init(|| Regex::new(r"v\.([A-Za-z_][A-Za-z0-9_]*)").ok()).as_ref()
            }
        }
    }

    /// Render the placeholder that references `name` in this syntax.
    #[must_use]
    pub fn placeholder(self, name: &str) -> String {
        match self {
            ReferenceSyntax::Dollar => format!("$({name})"),
            ReferenceSyntax::Flux => format!("v.{name}"),
        }
    }
}

/// One placeholder occurrence inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    /// Referenced variable name
    pub name: String,
    /// Byte range of the whole placeholder in the template
    pub span: Range<usize>,
}

/// Extract every placeholder occurrence in `text`, in document order.
#[must_use]
pub fn extract_references(text: &str, syntax: ReferenceSyntax) -> Vec<VariableReference> {
    let mut references = Vec::new();
    let Some(pattern) = syntax.pattern() else {
        return references;
    };

    for cap in pattern.captures_iter(text) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        if syntax == ReferenceSyntax::Flux && !starts_token(text, whole.start()) {
            continue;
        }

        references.push(VariableReference {
            name: name.as_str().to_string(),
            span: whole.range(),
        });
    }

    references
}

/// Distinct referenced names in order of first appearance.
#[must_use]
pub fn referenced_names(text: &str, syntax: ReferenceSyntax) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_references(text, syntax)
        .into_iter()
        .filter_map(|r| seen.insert(r.name.clone()).then_some(r.name))
        .collect()
}

/// Replace placeholders with values from `resolve`.
///
/// Placeholders for which `resolve` returns `None` are left as literal text.
pub fn substitute<F>(text: &str, syntax: ReferenceSyntax, resolve: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;

    for reference in extract_references(text, syntax) {
        if let Some(value) = resolve(&reference.name) {
            output.push_str(&text[cursor..reference.span.start]);
            output.push_str(&value);
            cursor = reference.span.end;
        }
    }

    output.push_str(&text[cursor..]);
    output
}

fn starts_token(text: &str, start: usize) -> bool {
    match text[..start].chars().next_back() {
        None => true,
        Some(prev) => !(prev.is_alphanumeric() || prev == '_' || prev == '.'),
    }
}
