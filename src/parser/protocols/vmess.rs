//! VMess link parser
//!
//! VMess links are base64-encoded JSON:
//! vmess://BASE64({ "v": "2", "ps": "name", "add": "host", "port": 443, … })
//!
//! Providers are loose with the payload: ports and alter ids arrive as
//! strings or numbers, the server lives in `add` or `address`, and most
//! optional fields may be absent or empty.

use serde::Deserialize;
use tracing::trace;

use crate::error::ParseError;
use crate::link::ParsedLink;
use crate::parser::base64::decode_base64_string;

use super::LinkParser;

/// Parser for VMess (vmess://) links
pub struct VmessParser;

/// VMess payload JSON structure
#[derive(Deserialize, Debug)]
struct VmessPayload {
    /// Remark/name
    #[serde(default)]
    ps: Option<String>,
    /// Server address
    #[serde(default)]
    add: Option<String>,
    /// Alternate server address key used by some providers
    #[serde(default)]
    address: Option<String>,
    /// Server port (string or number)
    #[serde(default, deserialize_with = "deserialize_port")]
    port: Option<u16>,
    /// UUID
    #[serde(default)]
    id: Option<String>,
    /// Alter ID (string or number)
    #[serde(default, deserialize_with = "deserialize_lenient_u32")]
    aid: Option<u32>,
    /// Alternate alter-ID key
    #[serde(default, rename = "alterId", deserialize_with = "deserialize_lenient_u32")]
    alter_id: Option<u32>,
    /// Cipher, carried in the `type` key
    #[serde(default, rename = "type")]
    cipher: Option<String>,
    /// Network type (tcp, ws, grpc, …)
    #[serde(default)]
    net: Option<String>,
    /// TLS flag; enabled only when the value equals "tls"
    #[serde(default)]
    tls: Option<String>,
    /// Security/encryption method
    #[serde(default)]
    scy: Option<String>,
    /// Alternate security key
    #[serde(default)]
    security: Option<String>,
    /// Transport host header
    #[serde(default)]
    host: Option<String>,
    /// Transport path
    #[serde(default)]
    path: Option<String>,
    /// SNI
    #[serde(default)]
    sni: Option<String>,
    /// Comma-separated ALPN list
    #[serde(default)]
    alpn: Option<String>,
}

impl LinkParser for VmessParser {
    fn scheme(&self) -> &str {
        "vmess"
    }

    fn parse(&self, raw: &str, fallback_name: &str) -> Result<ParsedLink, ParseError> {
        trace!("Parsing VMess link");

        let payload = raw
            .strip_prefix("vmess://")
            .ok_or_else(|| ParseError::UnsupportedProtocol(raw.chars().take(16).collect()))?;

        let decoded = decode_base64_string(payload.trim())?;
        trace!("Decoded VMess payload: {}", decoded);

        let data: VmessPayload = serde_json::from_str(&decoded)
            .map_err(|e| ParseError::InvalidPayload(e.to_string()))?;

        let server = data
            .add
            .or(data.address)
            .filter(|s| !s.is_empty())
            .ok_or(ParseError::MissingField("add"))?;
        let port = data
            .port
            .filter(|p| *p != 0)
            .ok_or(ParseError::MissingField("port"))?;
        let uuid = data
            .id
            .filter(|s| !s.is_empty())
            .ok_or(ParseError::MissingField("id"))?;

        let name = data
            .ps
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());
        let network = data.net.filter(|s| !s.is_empty()).unwrap_or_else(|| "tcp".to_string());
        let cipher = data
            .cipher
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "auto".to_string());
        let security = data
            .scy
            .or(data.security)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "auto".to_string());
        let tls = data
            .tls
            .map(|s| s.eq_ignore_ascii_case("tls"))
            .unwrap_or(false);
        let alpn = data
            .alpn
            .map(|s| s.split(',').map(str::to_string).collect::<Vec<_>>());

        Ok(ParsedLink::Vmess {
            name,
            server,
            port,
            uuid,
            alter_id: data.aid.or(data.alter_id).unwrap_or(0),
            cipher,
            network,
            security,
            tls,
            host: data.host.filter(|s| !s.is_empty()),
            path: data.path.filter(|s| !s.is_empty()),
            sni: data.sni.filter(|s| !s.is_empty()),
            alpn,
        })
    }
}

/// Port deserializer accepting both string and number forms
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        String(String),
    }

    match Option::<PortValue>::deserialize(deserializer)? {
        Some(PortValue::Number(n)) => Ok(Some(n)),
        Some(PortValue::String(s)) => Ok(s.trim().parse().ok()),
        None => Ok(None),
    }
}

/// Lenient u32 deserializer: numbers pass through, unparsable strings and
/// null collapse to None
fn deserialize_lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U32Value {
        Number(u32),
        String(String),
        Null,
    }

    match Option::<U32Value>::deserialize(deserializer)? {
        Some(U32Value::Number(n)) => Ok(Some(n)),
        Some(U32Value::String(s)) => Ok(s.trim().parse().ok()),
        Some(U32Value::Null) | None => Ok(None),
    }
}
