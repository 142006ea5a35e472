use std::{env, net::SocketAddr, time::Duration};

use tracing::warn;

use crate::error::AppError;

const DEV_COOKIE_SECRET: &str = "6465762d6f6e6c792d636f6f6b69652d7365637265742d6368616e67652d6d6521";
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cookie_secret: Vec<u8>,
    pub store: StoreConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub namespace: String,
    pub table_prefix: String,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: "main".into(),
            table_prefix: "cfa_".into(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://cashflow.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = match env::var("COOKIE_SECRET") {
            Ok(secret) => decode_secret(&secret)?,
            Err(_) => {
                warn!("COOKIE_SECRET not set, using the development secret");
                decode_secret(DEV_COOKIE_SECRET)?
            }
        };

        let defaults = StoreConfig::default();
        let timeout = match env::var("STORE_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|err| AppError::Config(format!("invalid STORE_TIMEOUT_SECS: {err}")))?,
            Err(_) => defaults.timeout,
        };
        let store = StoreConfig {
            namespace: env::var("TABLE_NAMESPACE").unwrap_or(defaults.namespace),
            table_prefix: env::var("TABLE_PREFIX").unwrap_or(defaults.table_prefix),
            timeout,
        };

        Ok(Self {
            database_url,
            listen_addr,
            cookie_secret,
            store,
        })
    }
}

pub fn decode_secret(hex_secret: &str) -> Result<Vec<u8>, AppError> {
    let bytes = hex::decode(hex_secret.trim())
        .map_err(|err| AppError::Config(format!("invalid COOKIE_SECRET: {err}")))?;
    if bytes.len() < MIN_SECRET_BYTES {
        return Err(AppError::Config(format!(
            "COOKIE_SECRET must decode to at least {MIN_SECRET_BYTES} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}
