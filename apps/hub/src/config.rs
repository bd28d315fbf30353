use std::{net::SocketAddr, path::PathBuf};

#[derive(Clone, Debug)]
pub struct HubConfig {
    pub bind_addr: SocketAddr, // HUB_BIND_ADDR
    pub db_path: PathBuf,      // HUB_DB_PATH
    /// Push newly inserted records to websocket subscribers (HUB_BROADCAST_INSERTS).
    pub broadcast_inserts: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            db_path: "road_hub.db".into(),
            broadcast_inserts: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{var}={value:?} is not a valid {expected}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl HubConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Unset variables keep their defaults; set but unparsable ones are an error.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = get("HUB_BIND_ADDR") {
            cfg.bind_addr = v.trim().parse().map_err(|_| ConfigError {
                var: "HUB_BIND_ADDR",
                value: v.clone(),
                expected: "socket address",
            })?;
        }
        if let Some(v) = get("HUB_DB_PATH") {
            cfg.db_path = v.into();
        }
        if let Some(v) = get("HUB_BROADCAST_INSERTS") {
            cfg.broadcast_inserts = parse_flag(&v).ok_or(ConfigError {
                var: "HUB_BROADCAST_INSERTS",
                value: v,
                expected: "boolean",
            })?;
        }
        Ok(cfg)
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = HubConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8000);
        assert!(!cfg.broadcast_inserts);
    }

    #[test]
    fn reads_overrides() {
        let cfg = HubConfig::from_lookup(lookup(&[
            ("HUB_BIND_ADDR", "0.0.0.0:9100"),
            ("HUB_DB_PATH", "/tmp/x.db"),
            ("HUB_BROADCAST_INSERTS", "Yes"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:9100");
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert!(cfg.broadcast_inserts);
    }

    #[test]
    fn rejects_garbage() {
        let err = HubConfig::from_lookup(lookup(&[("HUB_BIND_ADDR", "localhost")])).unwrap_err();
        assert_eq!(err.var, "HUB_BIND_ADDR");
        let err = HubConfig::from_lookup(lookup(&[("HUB_BROADCAST_INSERTS", "maybe")])).unwrap_err();
        assert_eq!(err.expected, "boolean");
    }
}
