use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const DEFAULT_MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: Option<String>,
    pub public_base_url: String,
    pub frontend_url: String,
    pub uploads_dir: PathBuf,
    pub max_resume_bytes: usize,
    pub public_rps: u32,
    pub mail: MailConfig,
    pub allowed_origins: Vec<String>,
    pub log_format: String,
}

/// Outbound mail settings. The relay is only used when all of
/// `from`, `relay_url` and `relay_api_key` are present.
#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    pub from: String,
    pub relay_url: Option<String>,
    pub relay_api_key: Option<String>,
    pub recruiter_cc: Option<String>,
}

impl MailConfig {
    pub fn relay_credentials(&self) -> Option<(&str, &str)> {
        if self.from.trim().is_empty() {
            return None;
        }
        match (self.relay_url.as_deref(), self.relay_api_key.as_deref()) {
            (Some(url), Some(key)) => Some((url, key)),
            _ => None,
        }
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:8080"),
            database_url: get_env_opt("DATABASE_URL"),
            public_base_url: trim_base(get_env_or("PUBLIC_BASE_URL", "http://localhost:8080")),
            frontend_url: trim_base(get_env_or("FRONTEND_URL", "http://localhost:3000")),
            uploads_dir: PathBuf::from(get_env_or("UPLOADS_DIR", "./uploads")),
            max_resume_bytes: get_env_parse_or("MAX_RESUME_BYTES", DEFAULT_MAX_RESUME_BYTES)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 20)?,
            mail: MailConfig {
                from: get_env_or("MAIL_FROM", "no-reply@jobboard.local"),
                relay_url: get_env_opt("MAIL_RELAY_URL"),
                relay_api_key: get_env_opt("MAIL_RELAY_API_KEY"),
                recruiter_cc: get_env_opt("RECRUITER_CC"),
            },
            allowed_origins: get_env_or("ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            log_format: get_env_or("LOG_FORMAT", "pretty"),
        })
    }

    /// Local defaults rooted at `uploads_dir`, sandbox mail, no database.
    pub fn for_uploads_dir(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            database_url: None,
            public_base_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            uploads_dir: uploads_dir.into(),
            max_resume_bytes: DEFAULT_MAX_RESUME_BYTES,
            public_rps: 1000,
            mail: MailConfig {
                from: "no-reply@jobboard.local".to_string(),
                ..MailConfig::default()
            },
            allowed_origins: vec!["*".to_string()],
            log_format: "pretty".to_string(),
        }
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn get_env_or(name: &str, default: &str) -> String {
    get_env_opt(name).unwrap_or_else(|| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_requires_every_credential() {
        let mut mail = MailConfig {
            from: "jobs@example.com".into(),
            relay_url: Some("https://relay.example.com/send".into()),
            relay_api_key: None,
            recruiter_cc: None,
        };
        assert!(mail.relay_credentials().is_none());

        mail.relay_api_key = Some("key".into());
        assert_eq!(
            mail.relay_credentials(),
            Some(("https://relay.example.com/send", "key"))
        );

        mail.from = " ".into();
        assert!(mail.relay_credentials().is_none());
    }

    #[test]
    fn local_config_has_ten_megabyte_ceiling() {
        let config = Config::for_uploads_dir("/tmp/uploads");
        assert_eq!(config.max_resume_bytes, 10 * 1024 * 1024);
        assert!(config.mail.relay_credentials().is_none());
    }
}
