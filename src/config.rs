//! Runtime configuration loaded from the environment (.env supported via dotenvy).

use chrono::{Duration, FixedOffset};
use jsonwebtoken::Algorithm;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub app: ServerConfig,
    pub db: DbConfig,
    pub jwt: JwtConfig,
    /// Fixed UTC offset used for every date-only comparison and timestamp
    /// formatting. Threaded explicitly; never set process-globally.
    pub timezone: FixedOffset,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub env: String,
    pub port: u16,
    pub name: String,
    pub desc: String,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub name: String,
}

impl DbConfig {
    /// Connection URL for sqlx. `DATABASE_URL` in the environment wins over
    /// the individual DB_* variables.
    pub fn url(&self) -> String {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.pass, self.host, self.port, self.name
        )
    }
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub key: String,
    pub key_refresh: String,
    pub algorithm: Algorithm,
    /// Access token lifetime.
    pub expire: Duration,
    /// Refresh token lifetime.
    pub expire_refresh: Duration,
}

impl AppConfig {
    /// Read configuration from the environment. Missing variables fall back
    /// to development defaults; malformed spans or offsets are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let algorithm = env_or("JWT_ALGORITHM", "HS256");
        let algorithm = Algorithm::from_str(&algorithm)
            .map_err(|_| ConfigError::Invalid("JWT_ALGORITHM", algorithm))?;

        Ok(AppConfig {
            app: ServerConfig {
                env: env_or("APP_ENV", "development"),
                port: parse_env("APP_PORT", 3000)?,
                name: env_or("APP_NAME", "Data Service API"),
                desc: env_or(
                    "APP_DESC",
                    "Provide service data for Desktop, Mobile, and Web App.",
                ),
            },
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: parse_env("DB_PORT", 5432)?,
                user: env_or("DB_USERNAME", "postgres"),
                pass: env_or("DB_PASS", ""),
                name: env_or("DB_NAME", "postgres"),
            },
            jwt: JwtConfig {
                key: env_or("JWT_KEY", "the_key"),
                key_refresh: env_or("JWT_KEY_REFRESH", "the_key"),
                algorithm,
                expire: parse_span(&env_or("JWT_EXPIRE", "1h"))
                    .ok_or_else(|| ConfigError::Invalid("JWT_EXPIRE", env_or("JWT_EXPIRE", "1h")))?,
                expire_refresh: parse_span(&env_or("JWT_EXPIRE_REFRESH", "1h")).ok_or_else(|| {
                    ConfigError::Invalid("JWT_EXPIRE_REFRESH", env_or("JWT_EXPIRE_REFRESH", "1h"))
                })?,
            },
            timezone: parse_offset(&env_or("APP_TIMEZONE", "+07:00"))
                .ok_or_else(|| ConfigError::Invalid("APP_TIMEZONE", env_or("APP_TIMEZONE", "+07:00")))?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid(key, v.clone())),
        Err(_) => Ok(default),
    }
}

/// Parse a time span like `30s`, `15m`, `1h`, `7d`, or a bare number of
/// seconds.
pub fn parse_span(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<i64>() {
        return (secs >= 0).then(|| Duration::seconds(secs));
    }
    let (num, unit) = s.split_at(s.len() - 1);
    let n: i64 = num.trim().parse().ok()?;
    if n < 0 {
        return None;
    }
    match unit {
        "s" => Some(Duration::seconds(n)),
        "m" => Some(Duration::minutes(n)),
        "h" => Some(Duration::hours(n)),
        "d" => Some(Duration::days(n)),
        _ => None,
    }
}

/// Parse a fixed UTC offset of the form `+07:00` / `-03:30` / `Z`.
pub fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1i32, &s[1..]),
        b'-' => (-1i32, &s[1..]),
        _ => (1i32, s),
    };
    let (h, m) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=14).contains(&h) || !(0..60).contains(&m) {
        return None;
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_parse_with_units_and_bare_seconds() {
        assert_eq!(parse_span("30s"), Some(Duration::seconds(30)));
        assert_eq!(parse_span("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_span("1h"), Some(Duration::hours(1)));
        assert_eq!(parse_span("7d"), Some(Duration::days(7)));
        assert_eq!(parse_span("3600"), Some(Duration::seconds(3600)));
    }

    #[test]
    fn malformed_spans_are_rejected() {
        assert_eq!(parse_span(""), None);
        assert_eq!(parse_span("1w"), None);
        assert_eq!(parse_span("-5m"), None);
        assert_eq!(parse_span("abc"), None);
    }

    #[test]
    fn offsets_parse_both_signs() {
        assert_eq!(parse_offset("+07:00"), FixedOffset::east_opt(7 * 3600));
        assert_eq!(parse_offset("-03:30"), FixedOffset::west_opt(3 * 3600 + 1800));
        assert_eq!(parse_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_offset("25:00"), None);
    }
}
