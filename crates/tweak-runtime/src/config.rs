//! Endpoint configuration: parses the three-string constructor
//! `(transport_kind, params, uri)`. `params` is a semicolon-separated
//! `key=value` grammar; only `role=server`/`role=client` are currently
//! interpreted, everything else is kept in `extra` for forward
//! compatibility, following a structured-but-permissive-of-unknown-keys
//! convention, simplified to a flat wire grammar instead of TOML.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    /// TCP-backed datagrams; the one concrete, real transport this crate
    /// implements.
    Nng,
    /// ARM inter-core transport; recognized, not implemented.
    Rpmsg,
    /// UART; recognized, not implemented.
    Serial,
    /// Anything else — accepted at the config layer, rejected only when a
    /// connection is actually attempted.
    Other(String),
}

impl TransportKind {
    pub fn parse(s: &str) -> TransportKind {
        match s {
            "nng" => TransportKind::Nng,
            "rpmsg" => TransportKind::Rpmsg,
            "serial" => TransportKind::Serial,
            other => TransportKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransportKind::Nng => "nng",
            TransportKind::Rpmsg => "rpmsg",
            TransportKind::Serial => "serial",
            TransportKind::Other(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub transport_kind: TransportKind,
    pub role: Role,
    pub uri: String,
    pub extra: HashMap<String, String>,
}

impl Config {
    /// Parses `params` (`"role=server;foo=bar"`) against `transport_kind`
    /// and `uri`. Missing `role` defaults to `Client` — a client dialing
    /// out is the more common caller, mirroring how a bare `nng` URI with
    /// no params is the client-oriented form in the original API.
    pub fn parse(transport_kind: &str, params: &str, uri: &str) -> Config {
        let mut role = Role::Client;
        let mut extra = HashMap::new();
        for pair in params.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            if let Some((k, v)) = pair.split_once('=') {
                let (k, v) = (k.trim(), v.trim());
                match k {
                    "role" if v == "server" => role = Role::Server,
                    "role" if v == "client" => role = Role::Client,
                    _ => {
                        extra.insert(k.to_string(), v.to_string());
                    }
                }
            }
        }
        Config {
            transport_kind: TransportKind::parse(transport_kind),
            role,
            uri: uri.to_string(),
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_and_uri() {
        let c = Config::parse("nng", "role=server", "tcp://0.0.0.0:7777/");
        assert_eq!(c.transport_kind, TransportKind::Nng);
        assert_eq!(c.role, Role::Server);
        assert_eq!(c.uri, "tcp://0.0.0.0:7777/");
    }

    #[test]
    fn unknown_keys_land_in_extra() {
        let c = Config::parse("nng", "role=client;timeout=500", "tcp://127.0.0.1:7777/");
        assert_eq!(c.role, Role::Client);
        assert_eq!(c.extra.get("timeout"), Some(&"500".to_string()));
    }

    #[test]
    fn unsupported_kinds_round_trip_through_parse() {
        let c = Config::parse("rpmsg", "role=server", "rpmsg://0");
        assert_eq!(c.transport_kind, TransportKind::Rpmsg);
        let c = Config::parse("serial", "role=client", "/dev/ttyUSB0");
        assert_eq!(c.transport_kind, TransportKind::Serial);
        let c = Config::parse("carrier-pigeon", "", "n/a");
        assert_eq!(c.transport_kind, TransportKind::Other("carrier-pigeon".to_string()));
    }

    #[test]
    fn default_role_is_client() {
        let c = Config::parse("nng", "", "tcp://127.0.0.1:7777/");
        assert_eq!(c.role, Role::Client);
    }
}
