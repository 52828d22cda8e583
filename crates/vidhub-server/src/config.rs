use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

const MIN_SECRET_LEN: usize = 16;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub public_url: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub cors_origin: Option<String>,
    pub secure_cookies: bool,
    pub max_upload_mb: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset and blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(get("VIDHUB_PORT"), "VIDHUB_PORT", 8000)?;
        let config = Self {
            host: get("VIDHUB_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("VIDHUB_DB_PATH").unwrap_or_else(|| "vidhub.db".into()).into(),
            media_dir: get("VIDHUB_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into(),
            public_url: get("VIDHUB_PUBLIC_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}"))
                .trim_end_matches('/')
                .to_string(),
            access_token_secret: secret(
                get("VIDHUB_ACCESS_TOKEN_SECRET"),
                "VIDHUB_ACCESS_TOKEN_SECRET",
            )?,
            refresh_token_secret: secret(
                get("VIDHUB_REFRESH_TOKEN_SECRET"),
                "VIDHUB_REFRESH_TOKEN_SECRET",
            )?,
            access_token_ttl_minutes: parse_or(
                get("VIDHUB_ACCESS_TOKEN_TTL_MINUTES"),
                "VIDHUB_ACCESS_TOKEN_TTL_MINUTES",
                15,
            )?,
            refresh_token_ttl_days: parse_or(
                get("VIDHUB_REFRESH_TOKEN_TTL_DAYS"),
                "VIDHUB_REFRESH_TOKEN_TTL_DAYS",
                10,
            )?,
            cors_origin: get("VIDHUB_CORS_ORIGIN"),
            secure_cookies: parse_or(get("VIDHUB_SECURE_COOKIES"), "VIDHUB_SECURE_COOKIES", true)?,
            max_upload_mb: parse_or(get("VIDHUB_MAX_UPLOAD_MB"), "VIDHUB_MAX_UPLOAD_MB", 512)?,
        };

        if config.access_token_secret == config.refresh_token_secret {
            bail!("VIDHUB_ACCESS_TOKEN_SECRET and VIDHUB_REFRESH_TOKEN_SECRET must differ");
        }
        if config.access_token_ttl_minutes <= 0 || config.refresh_token_ttl_days <= 0 {
            bail!("Token lifetimes must be positive");
        }
        Ok(config)
    }

    /// Base URL under which stored media is served.
    pub fn media_base_url(&self) -> String {
        format!("{}/api/v1/media", self.public_url)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v.parse().with_context(|| format!("{key} has an invalid value '{v}'")),
        None => Ok(default),
    }
}

fn secret(value: Option<String>, key: &str) -> Result<String> {
    match value {
        None => bail!("{key} is unset"),
        Some(v) if PLACEHOLDER_SECRETS.contains(&v.as_str()) => {
            bail!("{key} is still a placeholder")
        }
        Some(v) if v.len() < MIN_SECRET_LEN => {
            bail!("{key} must be at least {MIN_SECRET_LEN} characters")
        }
        Some(v) => Ok(v),
    }
}
