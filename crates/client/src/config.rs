use std::time::Duration;

/// Default studio API base URL for local development.
pub const DEFAULT_BASE_URL: &str = "http://api.ai4mde.localhost/api";

/// Client configuration loaded from environment variables.
///
/// Request timeouts are left to the HTTP client's defaults unless
/// `MDE_REQUEST_TIMEOUT_SECS` is set.
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Base URL without a trailing slash, e.g. `http://host/api`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Credentials exchanged for a token when no token is configured.
    pub credentials: Option<Credentials>,
    pub request_timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field(
                "credentials",
                &self.credentials.as_ref().map(|c| c.username.as_str()),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Errors from reading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl ClientConfig {
    /// Configuration pointing at `base_url`, everything else unset.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                           |
    /// |----------------------------|-----------------------------------|
    /// | `MDE_API_BASE_URL`         | `http://api.ai4mde.localhost/api` |
    /// | `MDE_API_TOKEN`            | unset                             |
    /// | `MDE_API_USERNAME`         | unset                             |
    /// | `MDE_API_PASSWORD`         | unset                             |
    /// | `MDE_REQUEST_TIMEOUT_SECS` | unset (client default)            |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load a `.env` file if present, then read the environment.
    pub fn from_dotenv() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = non_empty("MDE_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let token = non_empty("MDE_API_TOKEN");

        let credentials = match (non_empty("MDE_API_USERNAME"), lookup("MDE_API_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        let request_timeout = match non_empty("MDE_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: "MDE_REQUEST_TIMEOUT_SECS",
                    expected: "a whole number of seconds",
                    value: raw.clone(),
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            base_url: normalize_base_url(base_url),
            token,
            credentials,
            request_timeout,
        })
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
