use std::{env, fmt, time::Duration};

use thiserror::Error;
use uuid::Uuid;

/// Default session lifetime: seven days.
const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_BCRYPT_COST: u32 = 10;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// AppConfig
///
/// Holds the application's entire configuration state. This struct is immutable once
/// loaded and is injected into every component through `AppState` (see `FromRef` in lib.rs),
/// so no component reads the process environment on its own.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which secrets are mandatory.
    pub env: Env,
    // Postgres connection string. `None` in local mode selects the in-memory store.
    pub db_url: Option<String>,
    // HS256 secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued token.
    pub token_ttl: Duration,
    // bcrypt work factor for password digests.
    pub bcrypt_cost: u32,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // When true, the bulk and author listings sit behind the auth gate.
    pub gate_read_routes: bool,
}

/// Env
///
/// Defines the runtime context: `Local` tolerates missing infrastructure (in-memory store,
/// throwaway signing secret), `Production` demands every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

// The signing secret is redacted so the config can be logged safely.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("db_url", &self.db_url.as_ref().map(|_| "<set>"))
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("bind_addr", &self.bind_addr)
            .field("gate_read_routes", &self.gate_read_routes)
            .finish()
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a non-panicking AppConfig used for test state scaffolding. The secret is
    /// random per instance and the bcrypt cost is the cheapest the algorithm accepts.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: ephemeral_secret(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            bcrypt_cost: 4,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            gate_read_routes: false,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables. Production requires
    /// `DATABASE_URL` and `JWT_SECRET`; local mode falls back to the in-memory store and a
    /// random per-process secret (tokens then do not survive a restart).
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = non_empty_var("DATABASE_URL");
        let jwt_secret = non_empty_var("JWT_SECRET");

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(db_url.ok_or(ConfigError::Missing("DATABASE_URL"))?),
                jwt_secret.ok_or(ConfigError::Missing("JWT_SECRET"))?,
            ),
            Env::Local => (
                db_url,
                jwt_secret.unwrap_or_else(|| {
                    tracing::warn!("JWT_SECRET not set, using an ephemeral signing secret");
                    ephemeral_secret()
                }),
            ),
        };

        let token_ttl_secs = parse_var("TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        if token_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_SECS",
                value: "0".to_string(),
            });
        }

        let bcrypt_cost = parse_var("BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Self {
            env,
            db_url,
            jwt_secret,
            token_ttl: Duration::from_secs(token_ttl_secs),
            bcrypt_cost,
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            gate_read_routes: parse_var("GATE_READ_ROUTES", false)?,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn ephemeral_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
