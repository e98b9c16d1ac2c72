//! Declarative config-file schema (spec.md §4.6, §6): static resources,
//! dynamic-resource lifecycles and reaper expiration policies. Parsed by the
//! `core::config_loader` module; kept here so both `core` and `rest` (which
//! validates the file on startup) can share the same types.

use crate::types::{DynamicResourceLifeCycle, ReaperPolicy};
use serde::{Deserialize, Serialize};

/// One declared static resource entry, expanded to one `Resource` per name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StaticResourceGroup {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default = "default_state")]
    pub state: String,
    pub names: Vec<String>,
}

fn default_state() -> String {
    crate::types::DEFAULT_STATE.to_string()
}

/// Top-level config file contents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoskosConfig {
    #[serde(default)]
    pub resources: Vec<StaticResourceGroup>,
    #[serde(default, rename = "dynamic_resource_life_cycles")]
    pub dynamic_resource_life_cycles: Vec<DynamicResourceLifeCycle>,
    #[serde(default)]
    pub reaper_policies: Vec<ReaperPolicy>,
}

impl BoskosConfig {
    /// Parses either YAML or JSON (YAML is a superset of JSON for our purposes).
    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Every static resource name this config declares, across all type/state groups.
    pub fn static_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().flat_map(|g| g.names.iter().map(String::as_str))
    }

    /// Type names claimed by a DRLC; used to reject a static/dynamic name collision.
    pub fn dynamic_types(&self) -> impl Iterator<Item = &str> {
        self.dynamic_resource_life_cycles
            .iter()
            .map(|d| d.resource_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_config() {
        let raw = r#"
resources:
  - type: project
    state: free
    names: [p1, p2]
dynamic_resource_life_cycles:
  - type: tproj
    initial_state: free
    min_count: 2
    max_count: 4
reaper_policies:
  - type: project
    from_state: busy
    expire: 30s
    to_state: dirty
"#;
        let cfg = BoskosConfig::parse(raw).unwrap();
        assert_eq!(cfg.resources.len(), 1);
        assert_eq!(cfg.static_names().count(), 2);
        assert_eq!(cfg.dynamic_resource_life_cycles[0].min_count, 2);
        assert_eq!(cfg.reaper_policies[0].expire.as_secs(), 30);
    }
}
