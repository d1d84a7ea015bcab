//! Trojan link parser
//!
//! Format: trojan://password@host:port?params#fragment

use std::collections::HashMap;

use tracing::trace;
use url::Url;

use crate::error::ParseError;
use crate::link::ParsedLink;

use super::{LinkParser, percent_decode};

/// Parser for Trojan (trojan://) links
pub struct TrojanParser;

impl LinkParser for TrojanParser {
    fn scheme(&self) -> &str {
        "trojan"
    }

    fn parse(&self, raw: &str, fallback_name: &str) -> Result<ParsedLink, ParseError> {
        trace!("Parsing Trojan link");
        let url = Url::parse(raw)?;

        let server = url
            .host_str()
            .ok_or(ParseError::MissingHost)?
            .to_string();

        // Some generators put the password in the URI password slot instead
        // of the username
        let credential = if url.username().is_empty() {
            url.password().unwrap_or("")
        } else {
            url.username()
        };
        let password = percent_decode(credential);
        if password.is_empty() {
            return Err(ParseError::MissingCredential("password"));
        }

        let port = url.port().unwrap_or(443);

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        Ok(ParsedLink::Trojan {
            name: fallback_name.to_string(),
            server,
            port,
            password,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trojan_basic() {
        let parsed = TrojanParser
            .parse("trojan://password123@server.com:8443?sni=sni.com", "node")
            .unwrap();

        if let ParsedLink::Trojan {
            server,
            port,
            password,
            params,
            ..
        } = parsed
        {
            assert_eq!(server, "server.com");
            assert_eq!(port, 8443);
            assert_eq!(password, "password123");
            assert_eq!(params.get("sni").map(String::as_str), Some("sni.com"));
        } else {
            panic!("Expected Trojan descriptor");
        }
    }

    #[test]
    fn test_trojan_port_defaults_to_443() {
        let parsed = TrojanParser.parse("trojan://pw@server.com", "node").unwrap();
        if let ParsedLink::Trojan { port, .. } = parsed {
            assert_eq!(port, 443);
        } else {
            panic!("Expected Trojan descriptor");
        }
    }

    #[test]
    fn test_trojan_password_percent_decoded() {
        let parsed = TrojanParser
            .parse("trojan://p%40ss%3Aword@server.com:443", "node")
            .unwrap();
        if let ParsedLink::Trojan { password, .. } = parsed {
            assert_eq!(password, "p@ss:word");
        } else {
            panic!("Expected Trojan descriptor");
        }
    }

    #[test]
    fn test_trojan_password_slot_fallback() {
        let parsed = TrojanParser
            .parse("trojan://:secret@server.com:443", "node")
            .unwrap();
        if let ParsedLink::Trojan { password, .. } = parsed {
            assert_eq!(password, "secret");
        } else {
            panic!("Expected Trojan descriptor");
        }
    }

    #[test]
    fn test_trojan_missing_password() {
        let err = TrojanParser.parse("trojan://server.com:443", "node").unwrap_err();
        assert!(matches!(err, ParseError::MissingCredential("password")));
    }

    #[test]
    fn test_trojan_missing_host() {
        let err = TrojanParser.parse("trojan://pw@:443", "node").unwrap_err();
        assert!(matches!(err, ParseError::MissingHost));
    }
}
