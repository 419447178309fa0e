//! Shared fixtures for tests, benches and demos.
//!
//! Paths come from `fixtures/manifest.json` at the workspace root. Each
//! category module resolves a fixture name to its file and reads or parses it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    skeletons: HashMap<String, String>,
    #[serde(default)]
    symbols: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a str> {
    map.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

fn sorted_keys(map: &HashMap<String, String>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

/// Spine JSON skeleton exports.
pub mod skeletons {
    use super::*;

    pub fn keys() -> Vec<String> {
        sorted_keys(&MANIFEST.skeletons)
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(&MANIFEST.skeletons, "skeleton", name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        super::load_json(lookup(&MANIFEST.skeletons, "skeleton", name)?)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(lookup(&MANIFEST.skeletons, "skeleton", name)?))
    }
}

/// Symbol collections.
pub mod symbols {
    use super::*;

    pub fn keys() -> Vec<String> {
        sorted_keys(&MANIFEST.symbols)
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(&MANIFEST.symbols, "symbol", name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        super::load_json(lookup(&MANIFEST.symbols, "symbol", name)?)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(lookup(&MANIFEST.symbols, "symbol", name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_resolves() {
        for name in skeletons::keys() {
            let value: serde_json::Value = skeletons::load(&name).unwrap();
            assert!(value.get("animations").is_some(), "{name} has no animations");
        }
        for name in symbols::keys() {
            assert!(symbols::path(&name).unwrap().exists());
        }
        assert!(skeletons::json("dragon").is_err());
    }
}
