//! Gateway configuration from `GATEWAY_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::GatewayError;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TOPIC_CAPACITY: usize = 1024;
/// HS256 secrets shorter than this are refused.
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// JSON instrument list; a built-in universe is served when unset.
    pub instruments_file: Option<PathBuf>,
    /// `"EXCHANGE:YYYY-MM-DD,..."`
    pub holidays: Option<String>,
    pub weekends_closed: bool,
    /// Per-topic buffer before slow subscribers start lagging.
    pub topic_capacity: usize,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("GATEWAY_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr.trim().parse().map_err(|_| {
            GatewayError::Configuration(format!("GATEWAY_BIND_ADDR is not a socket address: {}", bind_addr))
        })?;

        let jwt_secret = lookup("GATEWAY_JWT_SECRET")
            .ok_or_else(|| GatewayError::Configuration("GATEWAY_JWT_SECRET is required".into()))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(GatewayError::Configuration(format!(
                "GATEWAY_JWT_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        let weekends_closed = match lookup("GATEWAY_WEEKENDS_CLOSED") {
            None => false,
            Some(v) => v.trim().parse::<bool>().map_err(|_| {
                GatewayError::Configuration(format!("GATEWAY_WEEKENDS_CLOSED must be true or false: {}", v))
            })?,
        };

        let topic_capacity = match lookup("GATEWAY_TOPIC_CAPACITY") {
            None => DEFAULT_TOPIC_CAPACITY,
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(GatewayError::Configuration(format!(
                        "GATEWAY_TOPIC_CAPACITY must be a positive integer: {}",
                        v
                    )));
                }
            },
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            instruments_file: lookup("GATEWAY_INSTRUMENTS_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            holidays: lookup("GATEWAY_HOLIDAYS").filter(|h| !h.trim().is_empty()),
            weekends_closed,
            topic_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("GATEWAY_JWT_SECRET", "0123456789abcdef")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.topic_capacity, 1024);
        assert!(!config.weekends_closed);
        assert!(config.instruments_file.is_none());
        assert!(config.holidays.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("GATEWAY_JWT_SECRET", "0123456789abcdef"),
            ("GATEWAY_BIND_ADDR", "127.0.0.1:9000"),
            ("GATEWAY_INSTRUMENTS_FILE", "/etc/feed/instruments.json"),
            ("GATEWAY_HOLIDAYS", "NSE:2026-01-26"),
            ("GATEWAY_WEEKENDS_CLOSED", "true"),
            ("GATEWAY_TOPIC_CAPACITY", "64"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(
            config.instruments_file,
            Some(PathBuf::from("/etc/feed/instruments.json"))
        );
        assert_eq!(config.holidays.as_deref(), Some("NSE:2026-01-26"));
        assert!(config.weekends_closed);
        assert_eq!(config.topic_capacity, 64);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let cases: &[&[(&str, &str)]] = &[
            &[],
            &[("GATEWAY_JWT_SECRET", "short")],
            &[("GATEWAY_JWT_SECRET", "0123456789abcdef"), ("GATEWAY_BIND_ADDR", "nowhere")],
            &[("GATEWAY_JWT_SECRET", "0123456789abcdef"), ("GATEWAY_TOPIC_CAPACITY", "0")],
            &[("GATEWAY_JWT_SECRET", "0123456789abcdef"), ("GATEWAY_WEEKENDS_CLOSED", "maybe")],
        ];
        for pairs in cases {
            assert!(
                matches!(
                    GatewayConfig::from_lookup(lookup(pairs)),
                    Err(GatewayError::Configuration(_))
                ),
                "{:?}",
                pairs
            );
        }
    }
}
