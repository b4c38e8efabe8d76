use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Where uploaded photos land on disk and how they are addressed publicly.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    pub dir: String,
    pub url_prefix: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub reset_ttl_minutes: i64,
    pub static_files: StaticConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "stockroom".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "stockroom-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES", 60),
        };
        let static_files = StaticConfig {
            dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "photos".into()),
            url_prefix: std::env::var("STATIC_URL_PREFIX").unwrap_or_else(|_| "/static".into()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            reset_ttl_minutes: env_i64("RESET_TOKEN_TTL_MINUTES", 30),
            static_files,
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
