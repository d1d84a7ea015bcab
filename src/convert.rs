//! Batch conversion
//!
//! Drives parser → tag allocator → compiler over a list of stored link
//! rows. Failures are isolated per item: one malformed link is logged with
//! its identity and dropped, never aborting the batch.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::compiler::compile;
use crate::link::{RawLink, derive_name_from_link};
use crate::outbound::Outbound;
use crate::parser::ParserRegistry;

// ============================================================================
// Tag Allocator
// ============================================================================

/// Allocates unique outbound tags within one batch conversion.
///
/// The first occurrence of a name is returned unchanged; the Nth repeat
/// becomes `"<name> (N)"`. Scoped to a single `convert_links` call.
#[derive(Default)]
pub struct TagRegistry {
    usage: HashMap<String, usize>,
}

impl TagRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique tag for the candidate name.
    ///
    /// Candidates are trimmed; empty candidates become `"node"`.
    pub fn allocate(&mut self, candidate: &str) -> String {
        let trimmed = candidate.trim();
        let normalized = if trimmed.is_empty() { "node" } else { trimmed };

        let count = self.usage.entry(normalized.to_string()).or_insert(0);
        let allocated = if *count == 0 {
            normalized.to_string()
        } else {
            format!("{} ({})", normalized, count)
        };
        *count += 1;
        allocated
    }
}

// ============================================================================
// Batch Converter
// ============================================================================

/// Convert stored link rows into compiled outbounds.
///
/// Blank rows are skipped silently; parse failures are logged with the
/// link's id and dropped. Output preserves input order and carries unique
/// tags.
pub fn convert_links(links: &[RawLink]) -> Vec<Outbound> {
    let registry = ParserRegistry::with_builtin_parsers();
    let mut tags = TagRegistry::new();
    let mut outbounds = Vec::new();

    for link in links {
        let raw = link.raw.trim();
        if raw.is_empty() {
            continue;
        }

        let fallback_name = link
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| derive_name_from_link(raw));

        match registry.parse_link(raw, &fallback_name) {
            Ok(parsed) => {
                let tag = tags.allocate(parsed.name());
                outbounds.extend(compile(parsed, tag));
            }
            Err(e) => {
                warn!("Failed to convert link '{}': {}", link.id, e);
            }
        }
    }

    debug!(
        "Batch conversion complete: {} links in, {} outbounds out",
        links.len(),
        outbounds.len()
    );

    outbounds
}
