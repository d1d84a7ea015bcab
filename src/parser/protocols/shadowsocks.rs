//! Shadowsocks link parser
//!
//! Supports both SIP002 and the legacy all-base64 form:
//! - SIP002: ss://method:password@host:port?plugin=…#fragment
//! - Legacy: ss://BASE64(method:password@host:port)#fragment

use tracing::trace;

use crate::error::ParseError;
use crate::link::{ParsedLink, PluginSpec};
use crate::parser::base64::decode_base64_string;

use super::{LinkParser, percent_decode};

/// Parser for Shadowsocks (ss://) links
pub struct ShadowsocksParser;

impl LinkParser for ShadowsocksParser {
    fn scheme(&self) -> &str {
        "ss"
    }

    fn parse(&self, raw: &str, fallback_name: &str) -> Result<ParsedLink, ParseError> {
        trace!("Parsing Shadowsocks link");

        let without_scheme = raw
            .strip_prefix("ss://")
            .ok_or_else(|| ParseError::UnsupportedProtocol(raw.chars().take(16).collect()))?;

        // The fragment is the display-name override
        let (credential_part, fragment) = match without_scheme.split_once('#') {
            Some((body, fragment)) => (body, Some(fragment)),
            None => (without_scheme, None),
        };
        let name = fragment
            .filter(|f| !f.is_empty())
            .map(percent_decode)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        let (main_part, query) = match credential_part.split_once('?') {
            Some((main, query)) => (main, query),
            None => (credential_part, ""),
        };

        // No '@' means the whole credential block is base64 (legacy form)
        let credentials = if main_part.contains('@') {
            main_part.to_string()
        } else {
            trace!("Decoding legacy base64 credential block");
            decode_base64_string(main_part)?
        };

        // Split on the last '@' so passwords containing '@' survive
        let at_index = credentials
            .rfind('@')
            .ok_or(ParseError::InvalidCredentialFormat)?;
        let method_and_password = &credentials[..at_index];
        let server_and_port = &credentials[at_index + 1..];

        let (cipher, password) = method_and_password
            .split_once(':')
            .ok_or(ParseError::InvalidCredentialFormat)?;
        let (server, port_str) = server_and_port
            .split_once(':')
            .ok_or(ParseError::InvalidCredentialFormat)?;

        if cipher.is_empty() || password.is_empty() || server.is_empty() || port_str.is_empty() {
            return Err(ParseError::InvalidCredentialFormat);
        }

        let port: u16 = port_str
            .parse()
            .map_err(|_| ParseError::InvalidPort(port_str.to_string()))?;

        let plugin = parse_plugin(query);

        Ok(ParsedLink::Shadowsocks {
            name,
            server: server.to_string(),
            port,
            cipher: cipher.to_string(),
            password: password.to_string(),
            plugin,
        })
    }
}

/// Extract a SIP003 plugin spec from the query string, if present.
///
/// The `plugin` parameter is a `;`-separated string whose first segment is
/// the plugin name and remaining segments are `key=value` options.
fn parse_plugin(query: &str) -> Option<PluginSpec> {
    let plugin_raw = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "plugin")
        .map(|(_, value)| value.into_owned())?;

    let (name, opts) = match plugin_raw.split_once(';') {
        Some((name, opts)) => (name, opts),
        None => (plugin_raw.as_str(), ""),
    };

    let options: Vec<(String, String)> = opts
        .split(';')
        .filter_map(|opt| opt.split_once('='))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Some(PluginSpec {
        name: name.to_string(),
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_shadowsocks_sip002_plain() {
        let parsed = ShadowsocksParser
            .parse("ss://aes-256-gcm:secret@server.com:8388#My%20Node", "fallback")
            .unwrap();

        if let ParsedLink::Shadowsocks {
            name,
            server,
            port,
            cipher,
            password,
            plugin,
        } = parsed
        {
            assert_eq!(name, "My Node");
            assert_eq!(server, "server.com");
            assert_eq!(port, 8388);
            assert_eq!(cipher, "aes-256-gcm");
            assert_eq!(password, "secret");
            assert!(plugin.is_none());
        } else {
            panic!("Expected Shadowsocks descriptor");
        }
    }

    #[test]
    fn test_shadowsocks_legacy_base64() {
        let encoded = STANDARD.encode("aes-128-gcm:password@server.example.com:8388");
        let raw = format!("ss://{}#Legacy", encoded);
        let parsed = ShadowsocksParser.parse(&raw, "fallback").unwrap();

        if let ParsedLink::Shadowsocks {
            name,
            server,
            port,
            cipher,
            password,
            ..
        } = parsed
        {
            assert_eq!(name, "Legacy");
            assert_eq!(server, "server.example.com");
            assert_eq!(port, 8388);
            assert_eq!(cipher, "aes-128-gcm");
            assert_eq!(password, "password");
        } else {
            panic!("Expected Shadowsocks descriptor");
        }
    }

    #[test]
    fn test_shadowsocks_legacy_without_padding() {
        // URL-safe, padding stripped, as providers commonly emit
        let encoded = STANDARD
            .encode("chacha20-ietf-poly1305:pw@host.net:443")
            .replace('=', "");
        let raw = format!("ss://{}", encoded);
        let parsed = ShadowsocksParser.parse(&raw, "fallback").unwrap();
        if let ParsedLink::Shadowsocks { cipher, .. } = parsed {
            assert_eq!(cipher, "chacha20-ietf-poly1305");
        } else {
            panic!("Expected Shadowsocks descriptor");
        }
    }

    #[test]
    fn test_shadowsocks_password_with_at_sign() {
        let parsed = ShadowsocksParser
            .parse("ss://aes-256-gcm:p@ss@server.com:8388", "fallback")
            .unwrap();
        if let ParsedLink::Shadowsocks { password, .. } = parsed {
            assert_eq!(password, "p@ss");
        } else {
            panic!("Expected Shadowsocks descriptor");
        }
    }

    #[test]
    fn test_shadowsocks_plugin() {
        let parsed = ShadowsocksParser
            .parse(
                "ss://aes-256-gcm:pw@server.com:8388?plugin=obfs-local%3Bobfs%3Dhttp%3Bobfs-host%3Dexample.com",
                "fallback",
            )
            .unwrap();

        if let ParsedLink::Shadowsocks { plugin, .. } = parsed {
            let plugin = plugin.expect("plugin should be parsed");
            assert_eq!(plugin.name, "obfs-local");
            assert_eq!(
                plugin.options,
                vec![
                    ("obfs".to_string(), "http".to_string()),
                    ("obfs-host".to_string(), "example.com".to_string()),
                ]
            );
        } else {
            panic!("Expected Shadowsocks descriptor");
        }
    }

    #[test]
    fn test_shadowsocks_plugin_name_only() {
        let parsed = ShadowsocksParser
            .parse("ss://aes-256-gcm:pw@server.com:8388?plugin=v2ray-plugin", "fallback")
            .unwrap();
        if let ParsedLink::Shadowsocks { plugin, .. } = parsed {
            let plugin = plugin.expect("plugin should be parsed");
            assert_eq!(plugin.name, "v2ray-plugin");
            assert!(plugin.options.is_empty());
        } else {
            panic!("Expected Shadowsocks descriptor");
        }
    }

    #[test]
    fn test_shadowsocks_fallback_name_without_fragment() {
        let parsed = ShadowsocksParser
            .parse("ss://aes-256-gcm:pw@server.com:8388", "stored name")
            .unwrap();
        assert_eq!(parsed.name(), "stored name");
    }

    #[test]
    fn test_shadowsocks_missing_at() {
        // decodes fine but has no '@' separator
        let encoded = STANDARD.encode("aes-256-gcm:password-server.com:8388");
        let err = ShadowsocksParser
            .parse(&format!("ss://{}", encoded), "n")
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidCredentialFormat));
    }

    #[test]
    fn test_shadowsocks_missing_port() {
        let err = ShadowsocksParser
            .parse("ss://aes-256-gcm:pw@server.com", "n")
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidCredentialFormat));
    }

    #[test]
    fn test_shadowsocks_invalid_port() {
        let err = ShadowsocksParser
            .parse("ss://aes-256-gcm:pw@server.com:eighty", "n")
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidPort(_)));
    }

    #[test]
    fn test_shadowsocks_legacy_and_sip002_agree() {
        let sip002 = ShadowsocksParser
            .parse("ss://aes-128-gcm:password@server.example.com:8388", "n")
            .unwrap();
        let encoded = STANDARD.encode("aes-128-gcm:password@server.example.com:8388");
        let legacy = ShadowsocksParser
            .parse(&format!("ss://{}", encoded), "n")
            .unwrap();

        match (sip002, legacy) {
            (
                ParsedLink::Shadowsocks {
                    server: s1,
                    port: p1,
                    cipher: c1,
                    password: pw1,
                    ..
                },
                ParsedLink::Shadowsocks {
                    server: s2,
                    port: p2,
                    cipher: c2,
                    password: pw2,
                    ..
                },
            ) => {
                assert_eq!(s1, s2);
                assert_eq!(p1, p2);
                assert_eq!(c1, c2);
                assert_eq!(pw1, pw2);
            }
            _ => panic!("Expected Shadowsocks descriptors"),
        }
    }
}
