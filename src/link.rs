//! Link descriptors
//!
//! This module defines the raw link rows handed over by the storage layer,
//! the typed descriptors the protocol parsers produce, and the display-name
//! derivation rule shared by the batch converter and the subscription
//! keyword filter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

// ============================================================================
// Raw Links
// ============================================================================

/// A stored proxy link row: an opaque link string plus an optional
/// user-assigned display name. Never mutated by the converter.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RawLink {
    /// Row identifier, used only for log context on parse failures
    pub id: String,

    /// User-assigned display name, if any
    #[serde(default)]
    pub name: Option<String>,

    /// The raw link text (`vless://…`, `ss://…`, …)
    pub raw: String,
}

impl RawLink {
    /// Create a link row without a display name
    pub fn new(id: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            raw: raw.into(),
        }
    }

    /// Create a link row with a display name
    pub fn named(id: impl Into<String>, name: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            raw: raw.into(),
        }
    }
}

// ============================================================================
// Parsed Descriptors
// ============================================================================

/// Shadowsocks SIP003 plugin specification.
///
/// Options keep their original order so `plugin_opts` can be re-joined
/// without reordering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginSpec {
    /// Plugin name (first `;`-separated segment of the `plugin` parameter)
    pub name: String,

    /// `key=value` options in original order
    pub options: Vec<(String, String)>,
}

/// A typed, protocol-specific link descriptor.
///
/// Produced by the link parser from one raw link and consumed exactly once
/// by the outbound compiler. Every variant carries a non-empty server and a
/// decoded, non-empty credential.
#[derive(Clone, Debug)]
pub enum ParsedLink {
    Vless {
        name: String,
        server: String,
        port: u16,
        uuid: String,
        /// Query parameters retained verbatim for the compiler (last wins
        /// on duplicate keys)
        params: HashMap<String, String>,
    },
    Vmess {
        name: String,
        server: String,
        port: u16,
        uuid: String,
        alter_id: u32,
        cipher: String,
        network: String,
        security: String,
        tls: bool,
        host: Option<String>,
        path: Option<String>,
        sni: Option<String>,
        alpn: Option<Vec<String>>,
    },
    Trojan {
        name: String,
        server: String,
        port: u16,
        password: String,
        params: HashMap<String, String>,
    },
    Shadowsocks {
        name: String,
        server: String,
        port: u16,
        cipher: String,
        password: String,
        plugin: Option<PluginSpec>,
    },
}

impl ParsedLink {
    /// Display name of the descriptor, used as the tag candidate
    pub fn name(&self) -> &str {
        match self {
            ParsedLink::Vless { name, .. }
            | ParsedLink::Vmess { name, .. }
            | ParsedLink::Trojan { name, .. }
            | ParsedLink::Shadowsocks { name, .. } => name,
        }
    }

    /// Protocol identifier matching the emitted outbound `type` field
    pub fn protocol(&self) -> &'static str {
        match self {
            ParsedLink::Vless { .. } => "vless",
            ParsedLink::Vmess { .. } => "vmess",
            ParsedLink::Trojan { .. } => "trojan",
            ParsedLink::Shadowsocks { .. } => "shadowsocks",
        }
    }
}

// ============================================================================
// Display Name Derivation
// ============================================================================

/// Derive a display name from a raw link.
///
/// Order: a non-empty `#fragment` (percent-decoded, raw fragment text on
/// decode failure), else the URI hostname, else the first 32 characters of
/// the raw text. Shared by the batch converter's fallback naming and the
/// subscription keyword filter.
pub fn derive_name_from_link(link: &str) -> String {
    if let Some(idx) = link.find('#') {
        let fragment = &link[idx + 1..];
        if !fragment.is_empty() {
            return urlencoding::decode(fragment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| fragment.to_string());
        }
    }

    if let Ok(url) = Url::parse(link)
        && let Some(host) = url.host_str()
    {
        return host.to_string();
    }

    link.chars().take(32).collect()
}
