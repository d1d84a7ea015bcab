//! Configuration document handling
//!
//! The base configuration template is a sing-box document whose
//! pass-through sections (`log`, `dns`, `route`, …) this system never
//! inspects; only the `outbounds` list is touched. The merge engine appends
//! freshly compiled outbounds and rewires selector/group entries so they
//! absorb the new tags.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::outbound::Outbound;

// ============================================================================
// Config Document
// ============================================================================

/// A sing-box configuration document.
///
/// `outbounds` is always present as a list after normalization; everything
/// else passes through untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ConfigDocument {
    /// Outbound list; template entries stay untyped because selectors and
    /// other template outbounds are the client's business, not ours
    #[serde(default)]
    pub outbounds: Vec<Value>,

    /// Opaque pass-through sections (log, dns, route, inbounds, …)
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ConfigDocument {
    /// Create an empty document with an empty outbound list
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize a document from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the document to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize the document to a pretty-printed JSON string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Parse a stored base-config JSON string into a normalized document.
///
/// Malformed input yields an empty document rather than an error; a render
/// must always produce something servable.
pub fn parse_base_config(raw: &str) -> ConfigDocument {
    match ConfigDocument::from_json(raw) {
        Ok(mut config) => {
            strip_unsupported_outbound_fields(&mut config);
            config
        }
        Err(e) => {
            warn!("Failed to parse base config JSON: {}", e);
            ConfigDocument::new()
        }
    }
}

/// Parse a stored selector-tag column (a JSON array string) into a trimmed,
/// deduplicated tag list. Malformed input yields an empty list.
pub fn parse_selector_tags(raw: &str) -> Vec<String> {
    let parsed: Vec<Value> = match serde_json::from_str(raw) {
        Ok(Value::Array(items)) => items,
        Ok(_) => return Vec::new(),
        Err(e) => {
            warn!("Failed to parse selector_tags JSON: {}", e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    parsed
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

/// Drop the `domain_resolver` key from every outbound in the document.
/// The deployed clients reject it in per-outbound position.
pub fn strip_unsupported_outbound_fields(config: &mut ConfigDocument) {
    for outbound in config.outbounds.iter_mut() {
        if let Some(obj) = outbound.as_object_mut() {
            obj.remove("domain_resolver");
        }
    }
}

// ============================================================================
// Merge Engine
// ============================================================================

/// Append compiled outbounds to the document and rewire selector entries.
///
/// Every existing outbound whose `tag` is listed in `selector_tags` has its
/// `outbounds` member-tag list extended with the freshly generated tags:
/// a missing or non-list field is replaced with a fresh copy of the new tag
/// set, an existing list gets only the tags not already present, in order.
pub fn merge_outbounds(
    config: &mut ConfigDocument,
    generated: &[Outbound],
    selector_tags: &[String],
) -> Result<(), serde_json::Error> {
    for outbound in generated {
        config.outbounds.push(serde_json::to_value(outbound)?);
    }

    if selector_tags.is_empty() {
        return Ok(());
    }

    let new_tags: Vec<String> = generated
        .iter()
        .map(|o| o.tag().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    if new_tags.is_empty() {
        return Ok(());
    }

    for outbound in config.outbounds.iter_mut() {
        let Some(entry) = outbound.as_object_mut() else {
            continue;
        };
        let Some(tag) = entry.get("tag").and_then(Value::as_str) else {
            continue;
        };
        if !selector_tags.iter().any(|selector| selector == tag) {
            continue;
        }

        debug!("Rewiring selector '{}' with {} new tags", tag, new_tags.len());
        match entry.get_mut("outbounds") {
            Some(Value::Array(members)) => append_unique_tags(members, &new_tags),
            _ => {
                entry.insert(
                    "outbounds".to_string(),
                    Value::Array(new_tags.iter().cloned().map(Value::String).collect()),
                );
            }
        }
    }

    Ok(())
}

/// Append tags not already present, preserving existing order
fn append_unique_tags(members: &mut Vec<Value>, new_tags: &[String]) {
    let mut seen: HashSet<String> = members
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    for tag in new_tags {
        if seen.insert(tag.clone()) {
            members.push(Value::String(tag.clone()));
        }
    }
}
