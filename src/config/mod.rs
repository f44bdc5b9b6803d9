use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::security_headers;

const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub jwt: JwtConfig,
}

/// Signing key and token lifetimes, shared by issue and validate paths.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using an insecure development secret");
            "insecure-dev-secret".to_string()
        });

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/eventboard".to_string()),
            port: parse_env("PORT", 3001),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5),
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_secs: parse_env("JWT_ACCESS_TTL_SECS", DEFAULT_ACCESS_TTL_SECS),
                refresh_ttl_secs: parse_env("JWT_REFRESH_TTL_SECS", DEFAULT_REFRESH_TTL_SECS),
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}, falling back to default", name);
            default
        }),
        Err(_) => default,
    }
}
