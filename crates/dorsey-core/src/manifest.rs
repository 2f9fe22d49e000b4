use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const PACKAGE_MANIFEST_FILE: &str = "package.json";

/// The subset of a `package.json` the dispatcher cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PackageManifest {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        serde_json::from_str(input).context("failed to parse package manifest")
    }

    /// The declared entry file, ignoring blank values.
    pub fn main_entry(&self) -> Option<&str> {
        self.main
            .as_deref()
            .map(str::trim)
            .filter(|main| !main.is_empty())
    }
}
