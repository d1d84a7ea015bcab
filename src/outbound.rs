//! Compiled outbound schema
//!
//! Typed model of the sing-box outbound documents this system emits. Every
//! outbound carries a `tag` and a `type`; optional fields are omitted from
//! the serialized document entirely rather than emitted as null, because
//! the downstream client treats key presence as meaningful.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Outbound
// ============================================================================

/// A compiled outbound document, one per supported protocol
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    Vless(VlessOutbound),
    Vmess(VmessOutbound),
    Trojan(TrojanOutbound),
    Shadowsocks(ShadowsocksOutbound),
}

impl Outbound {
    /// The unique tag of this outbound within a configuration
    pub fn tag(&self) -> &str {
        match self {
            Outbound::Vless(o) => &o.tag,
            Outbound::Vmess(o) => &o.tag,
            Outbound::Trojan(o) => &o.tag,
            Outbound::Shadowsocks(o) => &o.tag,
        }
    }

    /// The server address of this outbound
    pub fn server(&self) -> &str {
        match self {
            Outbound::Vless(o) => &o.server,
            Outbound::Vmess(o) => &o.server,
            Outbound::Trojan(o) => &o.server,
            Outbound::Shadowsocks(o) => &o.server,
        }
    }
}

/// VLESS outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VlessOutbound {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub uuid: String,

    /// Flow control (e.g. xtls-rprx-vision)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,

    /// UDP packet encoding; only set for transports that leave the
    /// transport block empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_encoding: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

/// VMess outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VmessOutbound {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub uuid: String,

    /// Encryption method (default "auto")
    pub security: String,

    pub alter_id: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

/// Trojan outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TrojanOutbound {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub password: String,

    /// Trojan always runs over TLS; the block is still optional in the
    /// schema so foreign documents deserialize
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

/// Shadowsocks outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ShadowsocksOutbound {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub method: String,
    pub password: String,

    /// SIP003 plugin name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    /// SIP003 plugin options as a `;`-joined `key=value` string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_opts: Option<String>,
}

// ============================================================================
// TLS
// ============================================================================

/// TLS block for outbound connections
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct OutboundTlsConfig {
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// Accept any server certificate
    #[serde(default)]
    pub insecure: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality: Option<RealityConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utls: Option<UtlsConfig>,
}

/// Reality sub-block
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RealityConfig {
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}

/// uTLS fingerprint sub-block
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UtlsConfig {
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

// ============================================================================
// Transport
// ============================================================================

/// V2Ray-style transport block
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum Transport {
    #[serde(rename = "ws")]
    WebSocket(WebSocketTransport),
    #[serde(rename = "grpc")]
    Grpc(GrpcTransport),
    #[serde(rename = "http")]
    Http(HttpTransport),
}

/// WebSocket transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct WebSocketTransport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_data_header_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_early_data: Option<u32>,
}

/// gRPC transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GrpcTransport {
    #[serde(default)]
    pub service_name: String,
}

/// HTTP transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct HttpTransport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}
