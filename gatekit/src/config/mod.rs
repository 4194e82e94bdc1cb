use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_TOKEN_FIELD: &str = "authtoken";
pub const DEFAULT_TOKEN_TTL_MINUTES: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid auth configuration: {0}")]
    Token(#[from] crate::auth_token::TokenError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Secret and credential field name for one authenticator.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    #[serde(default = "default_token_field")]
    pub token_field: String,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,
}

// The secret stays out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_field", &self.token_field)
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub password_hash: String,
}

fn default_token_field() -> String {
    DEFAULT_TOKEN_FIELD.to_string()
}

fn default_token_ttl_minutes() -> u64 {
    DEFAULT_TOKEN_TTL_MINUTES
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>, token_field: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            token_field: token_field.into(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(ConfigError::Invalid("auth.secret must not be empty".to_string()));
        }
        if self.token_field.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.token_field must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Applies `GATEKIT_*` and `SERVER_*` environment overrides, then validates.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(secret) = std::env::var("GATEKIT_SECRET") {
            self.auth.secret = secret;
        }
        if let Ok(field) = std::env::var("GATEKIT_TOKEN_FIELD") {
            self.auth.token_field = field;
        }
        if let Some(ttl) = parse_env("GATEKIT_TOKEN_TTL_MINUTES")? {
            self.auth.token_ttl_minutes = ttl;
        }
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.http.host = host;
        }
        if let Some(port) = parse_env("SERVER_PORT")? {
            self.http.port = port;
        }

        self.auth.validate()?;
        Ok(self)
    }

    pub fn find_account(&self, username: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|account| account.username == username)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}
