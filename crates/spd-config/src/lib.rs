//! spd-config
//!
//! Layered YAML configuration for the evaluation engine: instrument
//! specifications, tier rules, and engine settings. Layers are deep-merged
//! (later docs override earlier), canonicalized to compact JSON, and
//! sha256-hashed so a run can record exactly which configuration produced
//! its fills.
//!
//! The core never mutates tier or instrument configuration; it reads a
//! [`SimConfig`] once at startup.

use std::collections::BTreeMap;
use std::fs;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

mod types;

pub use types::{EngineSettings, InstrumentSpec, TierRules};

/// Price/cash scale: micros (1e-6).
pub const MICROS_SCALE: i64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Fully-typed engine configuration parsed out of a [`LoadedConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub engine: EngineSettings,
    /// Keyed by symbol.
    pub instruments: BTreeMap<String, InstrumentSpec>,
    /// Keyed by tier name (e.g. "eval-50k").
    pub tiers: BTreeMap<String, TierRules>,
}

impl SimConfig {
    /// Parse the typed sections out of a merged config document.
    ///
    /// # Errors
    /// Fails if a section is missing or malformed, or if any instrument or
    /// tier fails its own sanity checks.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: SimConfig = serde_json::from_value(loaded.config_json.clone())
            .context("config does not match the expected engine/instruments/tiers shape")?;

        for (symbol, spec) in &cfg.instruments {
            spec.validate()
                .with_context(|| format!("instrument {symbol} failed validation"))?;
        }
        for (name, tier) in &cfg.tiers {
            tier.validate()
                .with_context(|| format!("tier {name} failed validation"))?;
        }
        if cfg.engine.sweep_interval_secs == 0 {
            bail!("engine.sweep_interval_secs must be >= 1");
        }

        Ok(cfg)
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentSpec> {
        self.instruments.get(symbol)
    }

    pub fn tier(&self, name: &str) -> Result<&TierRules> {
        self.tiers
            .get(name)
            .with_context(|| format!("unknown tier: {name}"))
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Merge YAML docs in order: earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // Sort keys recursively so the hash does not depend on YAML key order.
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).context("canonical json serialize failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    hex::encode(out)
}
