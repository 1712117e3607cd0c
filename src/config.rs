//! Service configuration, read from the environment

use anyhow::{bail, Context};
use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::auth::TokenConfig;
use crate::notify::{EmailConfig, SmsConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub tokens: TokenConfig,
    pub otp_ttl: Duration,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub request_timeout: Duration,
    pub cors_origin: Option<String>,
    /// Set when `EMAIL_FROM` is.
    pub email: Option<EmailConfig>,
    /// Set when all three Twilio variables are.
    pub sms: Option<SmsConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> { Self::from_lookup(|key| std::env::var(key).ok()) }

    /// Builds the configuration from any key lookup; unset and empty values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        fn parse<T: FromStr>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            match raw {
                Some(v) => v.trim().parse().with_context(|| format!("{key} has an invalid value: {v}")),
                None => Ok(default),
            }
        }

        let secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.len() < 32 { bail!("JWT_SECRET must be at least 32 characters long"); }

        let port: u16 = parse("PORT", get("PORT"), 5000)?;
        let days = |key: &str, default: i64| -> anyhow::Result<chrono::Duration> {
            let n: i64 = parse(key, get(key), default)?;
            if n <= 0 { bail!("{key} must be positive"); }
            Ok(chrono::Duration::days(n))
        };

        let sms = match (get("TWILIO_ACCOUNT_SID"), get("TWILIO_AUTH_TOKEN"), get("TWILIO_FROM")) {
            (Some(account_sid), Some(auth_token), Some(from)) => Some(SmsConfig {
                account_sid, auth_token, from,
                api_base: get("TWILIO_API_BASE")
                    .unwrap_or_else(|| "https://api.twilio.com".into())
                    .trim_end_matches('/')
                    .to_string(),
            }),
            (None, None, None) => None,
            _ => bail!("TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_FROM must be set together"),
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 10)?,
            nats_url: get("NATS_URL"),
            tokens: TokenConfig {
                secret,
                customer_ttl: days("CUSTOMER_TOKEN_DAYS", 7)?,
                seller_ttl: days("SELLER_TOKEN_DAYS", 7)?,
                admin_ttl: days("ADMIN_TOKEN_DAYS", 1)?,
            },
            otp_ttl: Duration::from_secs(parse("OTP_TTL_SECS", get("OTP_TTL_SECS"), 300)?),
            upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./uploads")),
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}"))
                .trim_end_matches('/')
                .to_string(),
            request_timeout: Duration::from_secs(parse("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"), 30)?),
            cors_origin: get("CORS_ORIGIN"),
            email: get("EMAIL_FROM").map(|from| EmailConfig { from, ses_region: get("SES_REGION") }),
            sms,
        })
    }
}
