//! Generators for the AutoAgenda workflow definitions.
//!
//! Each generator returns the complete definition document for one building
//! block as JSON. The JavaScript and SQL inside the code and query nodes is
//! business logic executed by the platform; here it is opaque text.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

pub mod admin_dashboard;
pub mod availability;
pub mod deep_link;
pub mod error_handler;
pub mod telegram_gateway;

pub type Builder = fn() -> Value;

/// Registry of every generator, keyed by the workflow name it produces.
pub const GENERATORS: &[(&str, Builder)] = &[
    ("BB_00_Global_Error_Handler", error_handler::build),
    ("BB_01_Telegram_Gateway", telegram_gateway::build),
    ("BB_03_Availability_Engine", availability::build),
    ("BB_06_Admin_Dashboard", admin_dashboard::build),
    ("BB_09_Deep_Link_Redirect", deep_link::build),
];

pub fn names() -> Vec<&'static str> {
    GENERATORS.iter().map(|(name, _)| *name).collect()
}

pub fn build(name: &str) -> Option<Value> {
    GENERATORS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, builder)| builder())
}

/// Write a definition as pretty JSON under `dir`, named after the workflow.
pub fn write_definition(dir: &Path, definition: &Value) -> anyhow::Result<PathBuf> {
    let name = definition
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| anyhow::anyhow!("Definition has no name field"))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let path = dir.join(format!("{}.json", name));
    let data = serde_json::to_vec_pretty(definition)?;
    fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::lint_definition;

    #[test]
    fn registry_names_match_definitions() {
        for (name, builder) in GENERATORS {
            let wf = builder();
            assert_eq!(wf["name"].as_str().unwrap(), *name);
        }
    }

    #[test]
    fn every_generator_passes_lint() {
        for (name, builder) in GENERATORS {
            let issues = lint_definition(&builder());
            assert!(issues.is_empty(), "{} has lint issues: {:?}", name, issues);
        }
    }

    #[test]
    fn every_generator_has_a_webhook_trigger() {
        for (name, builder) in GENERATORS {
            let wf = builder();
            let has_webhook = wf["nodes"]
                .as_array()
                .unwrap()
                .iter()
                .any(|n| n["type"] == "n8n-nodes-base.webhook");
            assert!(has_webhook, "{} has no webhook trigger", name);
        }
    }

    #[test]
    fn definitions_round_trip_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let wf = error_handler::build();
        let path = write_definition(dir.path(), &wf).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "BB_00_Global_Error_Handler.json"
        );
        let read: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, wf);
    }

    #[test]
    fn unknown_generator_is_none() {
        assert!(build("BB_42_Nonexistent").is_none());
    }
}
