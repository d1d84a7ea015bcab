//! Protocol link parsers
//!
//! This module contains parsers for the proxy link formats this system
//! accepts. Each parser implements the [`LinkParser`] trait to provide a
//! consistent interface for turning one raw link string into a typed
//! [`ParsedLink`] descriptor.

mod shadowsocks;
mod trojan;
mod vless;
mod vmess;

pub use shadowsocks::ShadowsocksParser;
pub use trojan::TrojanParser;
pub use vless::VlessParser;
pub use vmess::VmessParser;

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::ParseError;
use crate::link::ParsedLink;

// ============================================================================
// Link Parser Trait
// ============================================================================

/// Trait for parsing individual protocol links
pub trait LinkParser: Send + Sync {
    /// Returns the link scheme this parser handles (e.g., "ss", "vmess")
    fn scheme(&self) -> &str;

    /// Parses a raw link into a typed descriptor.
    ///
    /// `fallback_name` is the display name to use when the link itself does
    /// not carry one (vmess `ps`, shadowsocks `#fragment`).
    fn parse(&self, raw: &str, fallback_name: &str) -> Result<ParsedLink, ParseError>;

    /// Checks if this parser can handle the given link
    fn can_parse(&self, raw: &str) -> bool {
        raw.starts_with(&format!("{}://", self.scheme()))
    }
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Registry of link parsers keyed by scheme
#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn LinkParser>>,
}

impl ParserRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Creates a registry with all built-in parsers registered
    pub fn with_builtin_parsers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(VlessParser));
        registry.register(Arc::new(VmessParser));
        registry.register(Arc::new(TrojanParser));
        registry.register(Arc::new(ShadowsocksParser));
        registry
    }

    /// Registers a link parser
    pub fn register(&mut self, parser: Arc<dyn LinkParser>) {
        self.parsers.insert(parser.scheme().to_string(), parser);
    }

    /// Gets a parser for the given scheme
    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn LinkParser>> {
        self.parsers.get(scheme)
    }

    /// Parses a raw link with the parser registered for its scheme.
    ///
    /// Links with an unknown or missing scheme fail with
    /// [`ParseError::UnsupportedProtocol`].
    pub fn parse_link(&self, raw: &str, fallback_name: &str) -> Result<ParsedLink, ParseError> {
        let parser = raw
            .split_once("://")
            .and_then(|(scheme, _)| self.parsers.get(scheme))
            .ok_or_else(|| ParseError::UnsupportedProtocol(link_snippet(raw)))?;

        let result = parser.parse(raw, fallback_name);
        match &result {
            Ok(parsed) => {
                debug!(
                    "Parsed {} link -> descriptor '{}'",
                    parsed.protocol(),
                    parsed.name()
                );
            }
            Err(e) => {
                debug!("Failed to parse {} link: {}", parser.scheme(), e);
            }
        }
        result
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// First 16 characters of a link, for error messages
fn link_snippet(raw: &str) -> String {
    raw.chars().take(16).collect()
}

/// Percent-decode a value, keeping the original text on decode failure
pub(crate) fn percent_decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| value.to_string())
}
