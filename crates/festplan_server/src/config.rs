//! Environment-driven server configuration.
//!
//! # Responsibility
//! - Resolve bind address, storage path, static assets and AI settings from
//!   the process environment with usable defaults.
//!
//! # Invariants
//! - Missing or unparsable variables fall back to defaults; configuration
//!   never panics.

use crate::ai::AiConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_DB_PATH: &str = "festplan.db";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_AI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_AI_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_RECIPE_CACHE_CAP: usize = 256;

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    /// Directory holding `index.html` and the assets served under
    /// `/static/*`.
    pub static_dir: PathBuf,
    /// `None` means stderr-only logging.
    pub log_dir: Option<String>,
    pub log_level: String,
    /// `None` when no API key is configured.
    pub ai: Option<AiConfig>,
}

impl ServerConfig {
    /// Reads configuration from `FESTPLAN_*` environment variables.
    ///
    /// `PORT` alone is honored too, for container platforms that inject
    /// only a port number.
    pub fn from_env() -> Self {
        let ai = env::var("FESTPLAN_AI_KEY").ok().map(|api_key| AiConfig {
            base_url: env_string("FESTPLAN_AI_URL", DEFAULT_AI_BASE_URL),
            api_key,
            model: env_string("FESTPLAN_AI_MODEL", DEFAULT_AI_MODEL),
            timeout: Duration::from_millis(env_u64(
                "FESTPLAN_AI_TIMEOUT_MS",
                DEFAULT_AI_TIMEOUT_MS,
            )),
            recipe_cache_capacity: env_usize(
                "FESTPLAN_RECIPE_CACHE_CAP",
                DEFAULT_RECIPE_CACHE_CAP,
            ),
        });

        Self {
            bind_addr: resolve_bind(
                env::var("FESTPLAN_BIND").ok(),
                env::var("PORT").ok(),
            ),
            db_path: PathBuf::from(env_string("FESTPLAN_DB_PATH", DEFAULT_DB_PATH)),
            static_dir: PathBuf::from(env_string("FESTPLAN_STATIC_DIR", DEFAULT_STATIC_DIR)),
            log_dir: env::var("FESTPLAN_LOG_DIR").ok(),
            log_level: env_string(
                "FESTPLAN_LOG_LEVEL",
                festplan_core::default_log_level(),
            ),
            ai,
        }
    }
}

fn resolve_bind(bind: Option<String>, port: Option<String>) -> String {
    if let Some(bind) = bind {
        let trimmed = bind.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    if let Some(port) = port {
        if port.trim().parse::<u16>().is_ok() {
            return format!("0.0.0.0:{}", port.trim());
        }
    }
    DEFAULT_BIND.to_string()
}

fn env_string(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}
