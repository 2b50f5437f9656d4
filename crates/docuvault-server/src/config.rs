//! Server configuration for `DocuVault`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `DOCUVAULT_*` environment variables.

use std::net::SocketAddr;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_OTP_TTL_SECS: i64 = 600;
const DEFAULT_INVITE_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Upper bound for every TTL setting: ten years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Where profiles, documents and grants live.
    pub database: DatabaseType,
    /// Where document binaries live.
    pub object_store: ObjectStoreType,
    /// Base URL that serves the documents bucket.
    pub public_url: String,
    /// Session lifetime in seconds.
    pub session_ttl_secs: i64,
    /// How long a pending OTP challenge stays valid, in seconds.
    pub otp_ttl_secs: i64,
    /// Invite code lifetime in seconds.
    pub invite_ttl_secs: i64,
}

/// Supported relational stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// PostgreSQL.
    Postgres { url: String },
}

/// Supported object stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectStoreType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// One file per object under a directory.
    Fs { path: String },
    /// `RocksDB` database directory.
    RocksDb { path: String },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on, binds to `0.0.0.0`
    /// - `DOCUVAULT_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:8080`)
    /// - `DOCUVAULT_LOG_LEVEL`: log filter (default: `info`)
    /// - `DOCUVAULT_DATABASE`: `memory` or `postgres` (default: `memory`)
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `DOCUVAULT_OBJECT_STORE`: `memory`, `fs`, or `rocksdb` (default: `memory`)
    /// - `DOCUVAULT_OBJECT_PATH`: path for persistent object stores (default: `./data/objects`)
    /// - `DOCUVAULT_PUBLIC_URL`: public base URL of the documents bucket
    ///   (default: `http://<bind_addr>/storage/documents`)
    /// - `DOCUVAULT_SESSION_TTL`: session lifetime in seconds (default: 7 days)
    /// - `DOCUVAULT_OTP_TTL`: pending OTP lifetime in seconds (default: `600`)
    /// - `DOCUVAULT_INVITE_TTL`: invite code lifetime in seconds (default: 7 days)
    ///
    /// Non-positive TTLs fall back to the default; larger ones are capped at
    /// [`MAX_TTL_SECS`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let default_addr = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT));

        // DOCUVAULT_BIND_ADDR > PORT > default
        let bind_addr = if let Some(addr) = var("DOCUVAULT_BIND_ADDR") {
            addr.parse().unwrap_or(default_addr)
        } else if let Some(port) = var("PORT") {
            SocketAddr::from(([0, 0, 0, 0], port.parse().unwrap_or(DEFAULT_PORT)))
        } else {
            default_addr
        };

        let log_level = var("DOCUVAULT_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let database = match var("DOCUVAULT_DATABASE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => DatabaseType::Postgres {
                url: var("DATABASE_URL")
                    .unwrap_or_else(|| "postgres://localhost/docuvault".to_owned()),
            },
            _ => DatabaseType::Memory,
        };

        let object_path = var("DOCUVAULT_OBJECT_PATH").unwrap_or_else(|| "./data/objects".to_owned());
        let object_store = match var("DOCUVAULT_OBJECT_STORE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "fs" | "file" | "filesystem" => ObjectStoreType::Fs { path: object_path },
            "rocksdb" => ObjectStoreType::RocksDb { path: object_path },
            _ => ObjectStoreType::Memory,
        };

        let public_url = var("DOCUVAULT_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{bind_addr}/storage/documents"));

        let secs = |key: &str, default: i64| {
            var(key)
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .map_or(default, |v| v.min(MAX_TTL_SECS))
        };

        Self {
            bind_addr,
            log_level,
            database,
            object_store,
            public_url,
            session_ttl_secs: secs("DOCUVAULT_SESSION_TTL", DEFAULT_SESSION_TTL_SECS),
            otp_ttl_secs: secs("DOCUVAULT_OTP_TTL", DEFAULT_OTP_TTL_SECS),
            invite_ttl_secs: secs("DOCUVAULT_INVITE_TTL", DEFAULT_INVITE_TTL_SECS),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.database, DatabaseType::Memory);
        assert_eq!(cfg.object_store, ObjectStoreType::Memory);
        assert_eq!(cfg.public_url, "http://127.0.0.1:8080/storage/documents");
        assert_eq!(cfg.session_ttl_secs, 604_800);
        assert_eq!(cfg.otp_ttl_secs, 600);
        assert_eq!(cfg.invite_ttl_secs, 604_800);
    }

    #[test]
    fn bind_addr_beats_port() {
        let cfg = config(&[("PORT", "9000")]);
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000".parse().unwrap());

        let cfg = config(&[("PORT", "9000"), ("DOCUVAULT_BIND_ADDR", "10.0.0.1:7000")]);
        assert_eq!(cfg.bind_addr, "10.0.0.1:7000".parse().unwrap());
    }

    #[test]
    fn backends_and_ttls() {
        let cfg = config(&[
            ("DOCUVAULT_DATABASE", "Postgres"),
            ("DATABASE_URL", "postgres://db/dv"),
            ("DOCUVAULT_OBJECT_STORE", "fs"),
            ("DOCUVAULT_OBJECT_PATH", "/var/lib/dv"),
            ("DOCUVAULT_OTP_TTL", "60"),
            ("DOCUVAULT_INVITE_TTL", "-5"),
        ]);
        assert_eq!(
            cfg.database,
            DatabaseType::Postgres {
                url: "postgres://db/dv".to_owned()
            }
        );
        assert_eq!(
            cfg.object_store,
            ObjectStoreType::Fs {
                path: "/var/lib/dv".to_owned()
            }
        );
        assert_eq!(cfg.otp_ttl_secs, 60);
        assert_eq!(cfg.invite_ttl_secs, 604_800);
    }

    #[test]
    fn huge_ttls_are_capped() {
        let cfg = config(&[
            ("DOCUVAULT_SESSION_TTL", "10000000000000000"),
            ("DOCUVAULT_OTP_TTL", "9223372036854775807"),
            ("DOCUVAULT_INVITE_TTL", "99999999999999999999"),
        ]);
        assert_eq!(cfg.session_ttl_secs, MAX_TTL_SECS);
        assert_eq!(cfg.otp_ttl_secs, MAX_TTL_SECS);
        // Does not parse as i64 at all.
        assert_eq!(cfg.invite_ttl_secs, 604_800);
    }
}
