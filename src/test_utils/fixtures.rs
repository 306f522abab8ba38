//! Sample variable sets and CLI input files.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::Variable;

/// A small organization whose variables reference each other.
///
/// `bucket` (constant) ← `measurement` (query) ← `field` (query, also uses `bucket`),
/// and `region` (map) ← `host` (query). All belong to `org`.
#[must_use]
pub fn org_variables() -> Vec<Variable> {
    vec![
        Variable::constant("v-bucket", "bucket", ["telegraf", "system"]),
        Variable::query("v-measurement", "measurement", "measurements(bucket: \"$(bucket)\")"),
        Variable::query(
            "v-field",
            "field",
            "fields(bucket: \"$(bucket)\", measurement: \"$(measurement)\")",
        ),
        Variable::map("v-region", "region", [("west", "us-west-2"), ("east", "us-east-1")]),
        Variable::query("v-host", "host", "hosts(region: \"$(region)\")"),
    ]
    .into_iter()
    .map(|v| v.with_org("org"))
    .collect()
}

/// Test fixture for variables files
#[derive(Clone, Debug)]
pub struct VariablesFixture {
    pub content: String,
    pub file_name: String,
}

impl VariablesFixture {
    /// The bucket → measurement → field chain of [`org_variables`] as TOML.
    pub fn chain() -> Self {
        Self {
            file_name: "variables.toml".to_string(),
            content: r#"
[[variables]]
name = "bucket"
arguments = { type = "constant", values = ["telegraf", "system"] }

[[variables]]
name = "measurement"
arguments = { type = "query", query = "measurements(bucket: \"$(bucket)\")" }

[[variables]]
name = "field"
arguments = { type = "query", query = "fields(bucket: \"$(bucket)\", measurement: \"$(measurement)\")" }
"#
            .trim()
            .to_string(),
        }
    }

    /// Two variables referencing each other plus an independent one.
    pub fn cyclic() -> Self {
        Self {
            file_name: "cyclic.toml".to_string(),
            content: r#"
[[variables]]
name = "a"
arguments = { type = "query", query = "q($(b))" }

[[variables]]
name = "b"
arguments = { type = "query", query = "q($(a))" }

[[variables]]
name = "c"
arguments = { type = "constant", values = ["ok"] }
"#
            .trim()
            .to_string(),
        }
    }

    /// A map whose keys are not in alphabetical order, and a query using it.
    pub fn regions() -> Self {
        Self {
            file_name: "regions.toml".to_string(),
            content: r#"
[[variables]]
name = "region"
arguments = { type = "map", values = { west = "us-west-2", east = "us-east-1" } }

[[variables]]
name = "host"
arguments = { type = "query", query = "hosts(region: \"$(region)\")" }
"#
            .trim()
            .to_string(),
        }
    }

    /// Write the fixture into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.content)?;
        Ok(path)
    }
}

/// Test fixture for recorded query results
#[derive(Clone, Debug)]
pub struct ResultsFixture {
    pub content: String,
}

impl ResultsFixture {
    /// Results matching [`VariablesFixture::chain`] for both bucket choices.
    pub fn chain() -> Self {
        Self {
            content: r#"{
  "measurements(bucket: \"telegraf\")": ["cpu", "mem"],
  "measurements(bucket: \"system\")": ["uptime"],
  "fields(bucket: \"telegraf\", measurement: \"cpu\")": ["usage_user", "usage_system"],
  "fields(bucket: \"system\", measurement: \"uptime\")": ["uptime_format"]
}"#
            .to_string(),
        }
    }

    /// Write the fixture into `dir` as `results.json` and return its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join("results.json");
        fs::write(&path, &self.content)?;
        Ok(path)
    }
}
