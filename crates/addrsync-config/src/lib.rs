//! addrsync-config
//!
//! Layered YAML configuration for address sync.
//!
//! Documents are merged in order (earlier = base, later = override), converted
//! to JSON, hashed over their canonical form, and then read into a typed
//! [`AddressSyncConfig`]. Missing keys fall back to defaults:
//!
//! ```yaml
//! sync:
//!   auto_sync_enabled: true
//!   direction: both            # both | billing_to_shipping | shipping_to_billing
//!   fields: [first_name, last_name, company, address_1, address_2,
//!            city, state, postcode, country, phone]
//! bulk:
//!   page_size: 10
//!   delay_ms: 1000
//! ```

mod consumption;

pub use consumption::{consumed_pointers, report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};

use addrsync_reconcile::{Field, SyncDirection, SyncPolicy};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Bulk-run settings. These are caller-side throttling knobs, not part of the
/// sync contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSettings {
    pub page_size: u32,
    pub delay_ms: u64,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSyncConfig {
    pub policy: SyncPolicy,
    pub bulk: BulkSettings,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
    pub settings: AddressSyncConfig,
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
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    // An empty document parses to null; treat it as an empty mapping.
    if merged.is_null() {
        merged = serde_json::json!({});
    }

    let settings = settings_from_json(&merged)?;
    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
        settings,
    })
}

/// Read typed settings out of a merged config document.
pub fn settings_from_json(v: &Value) -> Result<AddressSyncConfig> {
    let mut out = AddressSyncConfig::default();

    if let Some(enabled) = v.pointer("/sync/auto_sync_enabled") {
        out.policy.auto_sync_enabled = parse_flag(enabled)
            .with_context(|| format!("sync.auto_sync_enabled: expected bool, got {enabled}"))?;
    }

    if let Some(dir) = v.pointer("/sync/direction") {
        let s = dir
            .as_str()
            .with_context(|| format!("sync.direction: expected string, got {dir}"))?;
        out.policy.direction = s
            .parse::<SyncDirection>()
            .map_err(anyhow::Error::msg)
            .context("sync.direction")?;
    }

    if let Some(fields) = v.pointer("/sync/fields") {
        let arr = fields
            .as_array()
            .with_context(|| format!("sync.fields: expected list, got {fields}"))?;
        let mut parsed: Vec<Field> = Vec::with_capacity(arr.len());
        for f in arr {
            let name = f
                .as_str()
                .with_context(|| format!("sync.fields: expected string entry, got {f}"))?;
            let field = name
                .parse::<Field>()
                .map_err(anyhow::Error::msg)
                .context("sync.fields")?;
            if !parsed.contains(&field) {
                parsed.push(field);
            }
        }
        if parsed.is_empty() {
            bail!("sync.fields: list must name at least one field");
        }
        out.policy.fields = parsed;
    }

    if let Some(ps) = v.pointer("/bulk/page_size") {
        let n = ps
            .as_u64()
            .with_context(|| format!("bulk.page_size: expected positive integer, got {ps}"))?;
        if n == 0 || n > u64::from(u32::MAX) {
            bail!("bulk.page_size: must be in 1..={}, got {n}", u32::MAX);
        }
        out.bulk.page_size = n as u32;
    }

    if let Some(d) = v.pointer("/bulk/delay_ms") {
        out.bulk.delay_ms = d
            .as_u64()
            .with_context(|| format!("bulk.delay_ms: expected non-negative integer, got {d}"))?;
    }

    Ok(out)
}

/// The host historically stored the flag as `1`/`0` as well as a bool.
fn parse_flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
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
        // A null overlay (empty YAML document) keeps the base.
        (a_other, Value::Null) => a_other,
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json's default map is ordered by key, so this is stable.
    let s = serde_json::to_string(v).context("canonical json serialize failed")?;
    Ok(s)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    hex::encode(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_accepts_legacy_numeric_form() {
        assert_eq!(parse_flag(&serde_json::json!(1)), Some(true));
        assert_eq!(parse_flag(&serde_json::json!(0)), Some(false));
        assert_eq!(parse_flag(&serde_json::json!("1")), Some(true));
        assert_eq!(parse_flag(&serde_json::json!("maybe")), None);
    }

    #[test]
    fn null_overlay_keeps_base() {
        let merged = deep_merge(serde_json::json!({"a": 1}), Value::Null);
        assert_eq!(merged, serde_json::json!({"a": 1}));
    }
}
