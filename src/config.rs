use std::collections::HashMap;
use std::env;

/// Prefix shared by every mail setting read from the host application.
pub const MAIL_PREFIX: &str = "FLASK_MAIL_";

pub const MAIL_SERVER: &str = "FLASK_MAIL_SERVER";
pub const MAIL_USERNAME: &str = "FLASK_MAIL_USERNAME";
pub const MAIL_PASSWORD: &str = "FLASK_MAIL_PASSWORD";
pub const MAIL_PORT: &str = "FLASK_MAIL_PORT";
pub const MAIL_USE_TLS: &str = "FLASK_MAIL_USE_TLS";
pub const MAIL_USE_SSL: &str = "FLASK_MAIL_USE_SSL";
pub const MAIL_DEFAULT_SENDER: &str = "FLASK_MAIL_DEFAULT_SENDER";
pub const MAIL_MAX_EMAILS: &str = "FLASK_MAIL_MAX_EMAILS";
pub const MAIL_SUPPRESS: &str = "FLASK_MAIL_SUPPRESS";
pub const MAIL_DEBUG: &str = "FLASK_MAIL_DEBUG";

/// Settings of the host application the mailer is initialised against.
///
/// Keys are case-sensitive. `debug` and `testing` mirror the host's own flags
/// and act as fallbacks for `FLASK_MAIL_DEBUG` and `FLASK_MAIL_SUPPRESS`.
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub debug: bool,
    pub testing: bool,
    values: HashMap<String, String>,
}

impl AppSettings {
    pub fn new(debug: bool, testing: bool) -> Self {
        Self {
            debug,
            testing,
            values: HashMap::new(),
        }
    }

    /// Builder-style insert, handy for tests and embedding hosts.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Load the host flags and every `FLASK_MAIL_*` variable from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut settings = Self::new(
            read_env_flag("APP_DEBUG")?.unwrap_or(false),
            read_env_flag("APP_TESTING")?.unwrap_or(false),
        );
        for (key, value) in env::vars().filter(|(key, _)| key.starts_with(MAIL_PREFIX)) {
            settings.values.insert(key, value);
        }

        Ok(settings)
    }

    /// Raw value; empty strings count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get(key).map(|value| parse_flag(key, value)).transpose()
    }

    pub fn get_u16(&self, key: &str) -> Result<Option<u16>, ConfigError> {
        self.get(key)
            .map(|value| {
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        self.get(key)
            .map(|value| {
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }
}

/// Bind address of the demo host server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn read_env_flag(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => parse_flag(key, &value).map(Some),
        _ => Ok(None),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing FLASK_MAIL_SERVER. Cannot proceed")]
    MissingServer,
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("Invalid server port")]
    InvalidPort,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_accept_common_spellings() {
        let settings = AppSettings::default()
            .with(MAIL_USE_TLS, "Yes")
            .with(MAIL_USE_SSL, "0")
            .with(MAIL_SUPPRESS, "ON");

        assert_eq!(settings.get_bool(MAIL_USE_TLS), Ok(Some(true)));
        assert_eq!(settings.get_bool(MAIL_USE_SSL), Ok(Some(false)));
        assert_eq!(settings.get_bool(MAIL_SUPPRESS), Ok(Some(true)));
        assert_eq!(settings.get_bool(MAIL_DEBUG), Ok(None));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let settings = AppSettings::default()
            .with(MAIL_PORT, "smtp")
            .with(MAIL_USE_TLS, "maybe");

        assert_eq!(
            settings.get_u16(MAIL_PORT),
            Err(ConfigError::InvalidValue {
                key: MAIL_PORT.to_string(),
                value: "smtp".to_string(),
            })
        );
        assert!(settings.get_bool(MAIL_USE_TLS).is_err());
    }

    #[test]
    fn test_empty_values_count_as_absent() {
        let settings = AppSettings::default().with(MAIL_SERVER, "  ");

        assert_eq!(settings.get(MAIL_SERVER), None);
        assert_eq!(settings.get_usize(MAIL_MAX_EMAILS), Ok(None));
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8025,
        };

        assert_eq!(config.addr(), "127.0.0.1:8025");
    }
}
