use std::{net::SocketAddr, time::Duration};

const DEFAULT_DATABASE_URL: &str = "sqlite://shadowing.db?mode=rwc";
const DEFAULT_BIND: &str = "127.0.0.1:5000";
const DEFAULT_API_PREFIX: &str = "/api";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";
const DEFAULT_YTDLP_BIN: &str = "yt-dlp";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Process configuration, read once at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind: SocketAddr,
    /// Normalised: empty for root, otherwise `/segment` without a trailing slash.
    pub api_prefix: String,
    pub allowed_origins: Vec<String>,
    pub ytdlp_bin: String,
    pub fetch_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = match get("SHADOWING_BIND") {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(%raw, %err, "invalid SHADOWING_BIND, using default");
                default_bind()
            }),
            None => default_bind(),
        };

        let fetch_timeout_secs = match get("SHADOWING_FETCH_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|err| {
                tracing::warn!(%raw, %err, "invalid SHADOWING_FETCH_TIMEOUT_SECS, using default");
                DEFAULT_FETCH_TIMEOUT_SECS
            }),
            None => DEFAULT_FETCH_TIMEOUT_SECS,
        }
        .clamp(1, 600);

        Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind,
            api_prefix: normalize_prefix(
                &get("SHADOWING_API_PREFIX").unwrap_or_else(|| DEFAULT_API_PREFIX.to_string()),
            ),
            allowed_origins: parse_origins(
                &get("SHADOWING_ALLOWED_ORIGINS")
                    .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            ytdlp_bin: get("SHADOWING_YTDLP_BIN").unwrap_or_else(|| DEFAULT_YTDLP_BIN.to_string()),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
        }
    }
}

fn default_bind() -> SocketAddr {
    DEFAULT_BIND
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 5000)))
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}
