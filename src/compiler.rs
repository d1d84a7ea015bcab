//! Outbound compilation
//!
//! Turns one typed link descriptor into compiled outbound documents,
//! applying the protocol-specific transport and TLS rules. Pure functions:
//! everything fallible was already rejected by the parser.

use std::collections::HashMap;

use crate::link::{ParsedLink, PluginSpec};
use crate::outbound::{
    GrpcTransport, HttpTransport, Outbound, OutboundTlsConfig, RealityConfig, ShadowsocksOutbound,
    Transport, TrojanOutbound, UtlsConfig, VlessOutbound, VmessOutbound, WebSocketTransport,
};

/// Compile a parsed link into outbound documents under the given tag.
///
/// The interface supports one descriptor expanding into several outbounds;
/// every protocol currently compiles 1:1.
pub fn compile(link: ParsedLink, tag: String) -> Vec<Outbound> {
    let outbound = match link {
        ParsedLink::Vless {
            server,
            port,
            uuid,
            params,
            ..
        } => vless_outbound(server, port, uuid, &params, tag),
        ParsedLink::Vmess {
            server,
            port,
            uuid,
            alter_id,
            network,
            security,
            tls,
            host,
            path,
            sni,
            alpn,
            ..
        } => vmess_outbound(
            server, port, uuid, alter_id, &network, security, tls, host, path, sni, alpn, tag,
        ),
        ParsedLink::Trojan {
            server,
            port,
            password,
            params,
            ..
        } => trojan_outbound(server, port, password, &params, tag),
        ParsedLink::Shadowsocks {
            server,
            port,
            cipher,
            password,
            plugin,
            ..
        } => shadowsocks_outbound(server, port, cipher, password, plugin, tag),
    };
    vec![outbound]
}

// ============================================================================
// VLESS
// ============================================================================

fn vless_outbound(
    server: String,
    port: u16,
    uuid: String,
    params: &HashMap<String, String>,
    tag: String,
) -> Outbound {
    let network = first_param(params, &["type", "network"]).unwrap_or("tcp");
    let security = params.get("security").map(String::as_str).unwrap_or("");
    let sni = first_param(params, &["sni", "serverName", "host"]);
    let fingerprint = first_param(params, &["fp", "fingerprint"]);
    let public_key = first_param(params, &["pbk", "publicKey"]);
    let short_id = first_param(params, &["sid", "shortId"]);
    let alpn = split_alpn(params.get("alpn").map(String::as_str));

    let tls_enabled = !security.is_empty() && security != "none";
    let tls = if tls_enabled
        || sni.is_some()
        || fingerprint.is_some()
        || public_key.is_some()
        || short_id.is_some()
    {
        let utls = if security == "reality" {
            Some(UtlsConfig {
                enabled: fingerprint.is_some(),
                fingerprint: fingerprint.map(str::to_string),
            })
        } else {
            fingerprint.map(|fp| UtlsConfig {
                enabled: true,
                fingerprint: Some(fp.to_string()),
            })
        };

        Some(OutboundTlsConfig {
            enabled: true,
            server_name: Some(sni.unwrap_or(&server).to_string()),
            insecure: parse_boolean_param(params.get("allowInsecure")),
            alpn,
            reality: (security == "reality").then(|| RealityConfig {
                enabled: true,
                public_key: public_key.map(str::to_string),
                short_id: short_id.map(str::to_string),
            }),
            utls,
        })
    } else {
        None
    };

    let transport = match network {
        "ws" => {
            let early_data = first_param(params, &["ed"]);
            Some(Transport::WebSocket(WebSocketTransport {
                path: Some(
                    first_param(params, &["path", "ws-path"])
                        .unwrap_or("/")
                        .to_string(),
                ),
                headers: host_header(first_param(params, &["host", "ws-headers"])),
                early_data_header_name: early_data.map(str::to_string),
                max_early_data: early_data.and_then(|v| v.parse().ok()),
            }))
        }
        "grpc" => Some(Transport::Grpc(GrpcTransport {
            service_name: first_param(params, &["serviceName", "service_name"])
                .unwrap_or("grpc")
                .to_string(),
        })),
        "http" | "h2" => Some(Transport::Http(HttpTransport {
            path: Some(params.get("path").cloned().unwrap_or_else(|| "/".to_string())),
            host: split_host(first_param(params, &["host"])),
            method: first_param(params, &["method"]).map(str::to_string),
        })),
        _ => None,
    };

    // packet encoding only applies when no transport block was selected
    let packet_encoding = if transport.is_none() {
        first_param(params, &["spx"]).map(str::to_string)
    } else {
        None
    };

    Outbound::Vless(VlessOutbound {
        tag,
        server,
        server_port: port,
        uuid,
        flow: first_param(params, &["flow"]).map(str::to_string),
        packet_encoding,
        tls,
        transport,
    })
}

// ============================================================================
// VMess
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn vmess_outbound(
    server: String,
    port: u16,
    uuid: String,
    alter_id: u32,
    network: &str,
    security: String,
    tls_flag: bool,
    host: Option<String>,
    path: Option<String>,
    sni: Option<String>,
    alpn: Option<Vec<String>>,
    tag: String,
) -> Outbound {
    let tls = tls_flag.then(|| OutboundTlsConfig {
        enabled: true,
        server_name: Some(sni.unwrap_or_else(|| server.clone())),
        insecure: false,
        alpn: alpn.unwrap_or_default(),
        reality: None,
        utls: None,
    });

    let transport = match network {
        "ws" => Some(Transport::WebSocket(WebSocketTransport {
            path: Some(path.clone().unwrap_or_else(|| "/".to_string())),
            headers: host_header(host.as_deref()),
            early_data_header_name: None,
            max_early_data: None,
        })),
        "grpc" => Some(Transport::Grpc(GrpcTransport {
            service_name: path.clone().unwrap_or_else(|| "grpc".to_string()),
        })),
        "http" | "h2" => Some(Transport::Http(HttpTransport {
            path: Some(path.unwrap_or_else(|| "/".to_string())),
            host: split_host(host.as_deref()),
            method: None,
        })),
        _ => None,
    };

    Outbound::Vmess(VmessOutbound {
        tag,
        server,
        server_port: port,
        uuid,
        security: if security.is_empty() {
            "auto".to_string()
        } else {
            security
        },
        alter_id,
        tls,
        transport,
    })
}

// ============================================================================
// Trojan
// ============================================================================

fn trojan_outbound(
    server: String,
    port: u16,
    password: String,
    params: &HashMap<String, String>,
    tag: String,
) -> Outbound {
    let network = first_param(params, &["type", "network"]).unwrap_or("tcp");
    let sni = first_param(params, &["sni", "host"]);
    let fingerprint = first_param(params, &["fp"]);

    let tls = Some(OutboundTlsConfig {
        enabled: true,
        server_name: Some(sni.unwrap_or(&server).to_string()),
        insecure: parse_boolean_param(params.get("allowInsecure")),
        alpn: Vec::new(),
        reality: None,
        utls: fingerprint.map(|fp| UtlsConfig {
            enabled: true,
            fingerprint: Some(fp.to_string()),
        }),
    });

    let transport = match network {
        "ws" => Some(Transport::WebSocket(WebSocketTransport {
            path: Some(params.get("path").cloned().unwrap_or_else(|| "/".to_string())),
            headers: host_header(first_param(params, &["host"])),
            early_data_header_name: None,
            max_early_data: None,
        })),
        "grpc" => Some(Transport::Grpc(GrpcTransport {
            service_name: first_param(params, &["serviceName"])
                .unwrap_or("grpc")
                .to_string(),
        })),
        "http" | "h2" => Some(Transport::Http(HttpTransport {
            path: Some(params.get("path").cloned().unwrap_or_else(|| "/".to_string())),
            host: split_host(first_param(params, &["host"])),
            method: None,
        })),
        _ => None,
    };

    Outbound::Trojan(TrojanOutbound {
        tag,
        server,
        server_port: port,
        password,
        tls,
        transport,
    })
}

// ============================================================================
// Shadowsocks
// ============================================================================

fn shadowsocks_outbound(
    server: String,
    port: u16,
    cipher: String,
    password: String,
    plugin: Option<PluginSpec>,
    tag: String,
) -> Outbound {
    let (plugin_name, plugin_opts) = match plugin {
        Some(spec) => {
            let opts = if spec.options.is_empty() {
                None
            } else {
                Some(
                    spec.options
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(";"),
                )
            };
            (Some(spec.name), opts)
        }
        None => (None, None),
    };

    Outbound::Shadowsocks(ShadowsocksOutbound {
        tag,
        server,
        server_port: port,
        method: cipher,
        password,
        plugin: plugin_name,
        plugin_opts,
    })
}

// ============================================================================
// Helper Functions
// ============================================================================

/// First non-empty value among the given parameter keys
fn first_param<'a>(params: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| params.get(*key))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Permissive boolean parse: 1/true/yes/on (case-insensitive) are true
fn parse_boolean_param(value: Option<&String>) -> bool {
    value
        .map(|v| {
            matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

/// Comma-split and trim an alpn parameter, dropping empty entries
fn split_alpn(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Comma-split a transport host parameter into a list
fn split_host(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

/// Host header map for ws transports, empty when no host was given
fn host_header(host: Option<&str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(host) = host
        && !host.is_empty()
    {
        headers.insert("Host".to_string(), host.to_string());
    }
    headers
}
