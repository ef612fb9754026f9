use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info, warn};

use crate::action::{ActionSpec, Platform};

fn default_true() -> bool {
    true
}

/// A named bundle of actions, one file per airdrop.
#[derive(Debug, Clone, PartialEq)]
pub struct AirdropDefinition {
    pub name: String,
    pub is_activated: bool,
    pub actions: Vec<ActionSpec>,
}

impl AirdropDefinition {
    pub fn active_actions(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.iter().filter(|a| a.is_activated)
    }
}

#[derive(Debug, Deserialize)]
struct RawAirdrop {
    name: String,
    #[serde(rename = "isActivated", alias = "is_activated", default = "default_true")]
    is_activated: bool,
    #[serde(default)]
    actions: Vec<Value>,
}

impl RawAirdrop {
    /// Invalid or unknown actions are logged and left out.
    fn into_definition(self, source: &str) -> AirdropDefinition {
        let mut actions = Vec::with_capacity(self.actions.len());
        for (i, raw) in self.actions.into_iter().enumerate() {
            match serde_json::from_value::<ActionSpec>(raw) {
                Ok(action) => actions.push(action),
                Err(e) => error!(
                    "Skipping action #{} of {} airdrop ({}): {}",
                    i + 1,
                    self.name,
                    source,
                    e
                ),
            }
        }
        AirdropDefinition {
            name: self.name,
            is_activated: self.is_activated,
            actions,
        }
    }
}

/// Every airdrop the farmer knows about, in file name order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    airdrops: Vec<AirdropDefinition>,
}

impl Catalog {
    /// Loads every `*.json` file of `dir`. Unreadable files are logged and
    /// skipped; a missing directory is an error.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Cannot read airdrop directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut airdrops = Vec::new();
        for path in files {
            let source = path.display().to_string();
            let parsed = std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|content| {
                    serde_json::from_str::<RawAirdrop>(&content).map_err(anyhow::Error::from)
                });
            match parsed {
                Ok(raw) => airdrops.push(raw.into_definition(&source)),
                Err(e) => error!("Error loading {}: {}", source, e),
            }
        }

        let catalog = Self::from_definitions(airdrops);
        info!(
            "Loaded {} airdrop(s) from {}",
            catalog.airdrops.len(),
            dir.display()
        );
        Ok(catalog)
    }

    /// Keeps the first definition of each name.
    pub fn from_definitions(definitions: Vec<AirdropDefinition>) -> Self {
        let mut seen = HashSet::new();
        let airdrops = definitions
            .into_iter()
            .filter(|a| {
                let fresh = seen.insert(a.name.clone());
                if !fresh {
                    warn!("Duplicate airdrop name '{}', keeping the first one", a.name);
                }
                fresh
            })
            .collect();
        Self { airdrops }
    }

    pub fn airdrops(&self) -> &[AirdropDefinition] {
        &self.airdrops
    }

    pub fn get(&self, name: &str) -> Option<&AirdropDefinition> {
        self.airdrops.iter().find(|a| a.name == name)
    }

    pub fn active(&self) -> Vec<&AirdropDefinition> {
        self.airdrops.iter().filter(|a| a.is_activated).collect()
    }

    pub fn has_discord_action(&self) -> bool {
        self.airdrops
            .iter()
            .flat_map(|a| a.actions.iter())
            .any(|action| action.platform() == Platform::Discord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(actions: Value) -> RawAirdrop {
        serde_json::from_value(json!({"name": "Scroll", "actions": actions})).unwrap()
    }

    #[test]
    fn test_bad_actions_are_skipped() {
        let airdrop = raw(json!([
            {"platform": "twitter", "action": "tweet", "text": "gm"},
            {"platform": "defi", "blockchain": "goerli", "action": "teleport"},
            {"platform": "twitter", "action": "follow"}
        ]))
        .into_definition("test");
        assert!(airdrop.is_activated);
        assert_eq!(airdrop.actions.len(), 1);
        assert_eq!(airdrop.actions[0].name(), "tweet");
    }

    #[test]
    fn test_duplicates_keep_first() {
        let first = raw(json!([])).into_definition("a");
        let mut second = raw(json!([])).into_definition("b");
        second.is_activated = false;
        let catalog = Catalog::from_definitions(vec![first, second]);
        assert_eq!(catalog.airdrops().len(), 1);
        assert!(catalog.get("Scroll").unwrap().is_activated);
    }
}
