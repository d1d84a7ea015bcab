//! VLESS link parser
//!
//! Format: vless://uuid@host:port?params#fragment

use std::collections::HashMap;

use tracing::trace;
use url::Url;

use crate::error::ParseError;
use crate::link::ParsedLink;

use super::{LinkParser, percent_decode};

/// Parser for VLESS (vless://) links
pub struct VlessParser;

impl LinkParser for VlessParser {
    fn scheme(&self) -> &str {
        "vless"
    }

    fn parse(&self, raw: &str, fallback_name: &str) -> Result<ParsedLink, ParseError> {
        trace!("Parsing VLESS link");
        let url = Url::parse(raw)?;

        let server = url
            .host_str()
            .ok_or(ParseError::MissingHost)?
            .to_string();

        // vless is a non-special scheme, so the port is never elided by the
        // URL parser; absence means the conventional TLS port
        let port = url.port().unwrap_or(443);

        let uuid = percent_decode(url.username());
        if uuid.is_empty() {
            return Err(ParseError::MissingCredential("uuid"));
        }

        // Query parameters are retained verbatim for the compiler
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        Ok(ParsedLink::Vless {
            name: fallback_name.to_string(),
            server,
            port,
            uuid,
            params,
        })
    }
}
