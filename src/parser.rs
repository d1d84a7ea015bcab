//! Link parsing
//!
//! This module turns one raw proxy-link string into a typed,
//! protocol-specific descriptor. Dispatch happens on the URI scheme prefix
//! (`vless://`, `vmess://`, `trojan://`, `ss://`); anything else fails with
//! an unsupported-protocol error. Parsing does no I/O and never aborts a
//! batch — the batch converter catches failures per link.

pub mod base64;
pub mod protocols;

pub use protocols::{
    LinkParser, ParserRegistry, ShadowsocksParser, TrojanParser, VlessParser, VmessParser,
};

use crate::error::ParseError;
use crate::link::ParsedLink;

/// Parse one raw link with the built-in protocol parsers.
///
/// `fallback_name` is used as the display name when the link carries none
/// of its own (vmess `ps`, shadowsocks `#fragment`).
pub fn parse_link(raw: &str, fallback_name: &str) -> Result<ParsedLink, ParseError> {
    ParserRegistry::with_builtin_parsers().parse_link(raw, fallback_name)
}
