//! Seed bundles: YAML catalogues of frameworks and their controls.
//!
//! Applied idempotently at startup by [`GrcService::apply_seed`](crate::service::GrcService::apply_seed).

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FieldErrors, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedBundle {
    #[serde(default)]
    pub frameworks: Vec<FrameworkSeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkSeed {
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub controls: Vec<ControlSeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSeed {
    pub identifier: String,
    pub title: String,
    pub description: String,
}

/// Outcome of applying a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub bundle_hash: String,
    pub frameworks_created: usize,
    pub frameworks_existing: usize,
    pub controls_created: usize,
    pub controls_existing: usize,
}

impl SeedBundle {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let bundle: SeedBundle = serde_yaml::from_str(yaml).context("Failed to parse seed bundle")?;
        bundle.check()?;
        Ok(bundle)
    }

    /// Reject blank fields up front so a bundle never applies halfway.
    fn check(&self) -> Result<()> {
        let mut errors = FieldErrors::default();
        let mut require = |path: String, value: &str| {
            if value.trim().is_empty() {
                errors.add(&path, "This field may not be blank.");
            }
        };
        for (i, framework) in self.frameworks.iter().enumerate() {
            require(format!("frameworks[{i}].name"), &framework.name);
            require(format!("frameworks[{i}].version"), &framework.version);
            require(format!("frameworks[{i}].description"), &framework.description);
            for (j, control) in framework.controls.iter().enumerate() {
                let at = format!("frameworks[{i}].controls[{j}]");
                require(format!("{at}.identifier"), &control.identifier);
                require(format!("{at}.title"), &control.title);
                require(format!("{at}.description"), &control.description);
            }
        }
        errors.into_result()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed bundle {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    /// Version-prefixed SHA-256 of the canonical JSON form, with frameworks
    /// and controls sorted so that source ordering does not matter.
    pub fn content_hash(&self) -> Result<String> {
        let mut canonical = self.clone();
        canonical
            .frameworks
            .sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        for framework in &mut canonical.frameworks {
            framework
                .controls
                .sort_by(|a, b| a.identifier.cmp(&b.identifier));
        }
        let json = serde_json::to_string(&canonical)?;
        let hash = Sha256::digest(json.as_bytes());
        Ok(format!("v1:{}", hex::encode(hash)))
    }
}
