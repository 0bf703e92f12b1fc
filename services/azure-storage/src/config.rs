use std::time::Duration;

use reqsend_core::Context;

use crate::constants::*;

/// Environment variable carrying the storage account name.
pub const AZURE_STORAGE_ACCOUNT: &str = "AZURE_STORAGE_ACCOUNT";
/// Environment variable carrying the base64 account key.
pub const AZURE_STORAGE_KEY: &str = "AZURE_STORAGE_KEY";
/// Environment variable carrying a pre-issued account SAS token.
pub const AZURE_STORAGE_SAS_TOKEN: &str = "AZURE_STORAGE_SAS_TOKEN";

/// Config carries all the configuration for a storage client.
///
/// Values are fixed once the client is built; changing a config afterwards
/// has no effect on clients already created from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// `account_name` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AZURE_STORAGE_ACCOUNT`]
    pub account_name: Option<String>,
    /// `account_key` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AZURE_STORAGE_KEY`]
    pub account_key: Option<String>,
    /// `sas_token` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AZURE_STORAGE_SAS_TOKEN`]
    ///
    /// When set, requests are authorized by the token instead of the account key.
    pub sas_token: Option<String>,
    /// `api_version` sent as `x-ms-version` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: `APIVERSION_STORAGE`
    /// - [`DEFAULT_API_VERSION`]
    pub api_version: Option<String>,
    /// Domain suffix of the storage endpoints, `core.windows.net` for the public cloud.
    pub base_url: String,
    /// Whether to talk https to the service.
    pub use_https: bool,
    /// Sign with `SharedKeyLite` instead of `SharedKey`.
    pub use_shared_key_lite: bool,
    /// Total number of attempts for requests answered with a transient status.
    pub retry_attempts: usize,
    /// Base backoff between attempts, doubled after each attempt.
    pub retry_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_name: None,
            account_key: None,
            sas_token: None,
            api_version: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            use_https: DEFAULT_USE_HTTPS,
            use_shared_key_lite: false,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl Config {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from env.
    ///
    /// Fields already set are kept. An empty `APIVERSION_STORAGE` is ignored.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        if self.api_version.is_none() {
            self.api_version = ctx.env_var(APIVERSION_STORAGE).filter(|v| !v.is_empty());
        }

        if self.account_name.is_none() {
            self.account_name = ctx.env_var(AZURE_STORAGE_ACCOUNT);
        }

        if self.account_key.is_none() {
            self.account_key = ctx.env_var(AZURE_STORAGE_KEY);
        }

        if self.sas_token.is_none() {
            self.sas_token = ctx.env_var(AZURE_STORAGE_SAS_TOKEN);
        }

        self
    }

    /// Set the account name.
    pub fn with_account_name(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = Some(account_name.into());
        self
    }

    /// Set the base64 encoded account key.
    pub fn with_account_key(mut self, account_key: impl Into<String>) -> Self {
        self.account_key = Some(account_key.into());
        self
    }

    /// Set the account SAS token.
    pub fn with_sas_token(mut self, sas_token: impl Into<String>) -> Self {
        self.sas_token = Some(sas_token.into());
        self
    }

    /// Set the API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Set the endpoint domain suffix.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set whether to use https.
    pub fn with_use_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    /// Set whether to sign with `SharedKeyLite`.
    pub fn with_shared_key_lite(mut self, enabled: bool) -> Self {
        self.use_shared_key_lite = enabled;
        self
    }

    /// Set the retry attempt budget and base backoff.
    pub fn with_retry(mut self, attempts: usize, backoff: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqsend_core::StaticEnv;
    use std::collections::HashMap;

    #[test]
    fn test_default() {
        let cfg = Config::new();
        assert_eq!(cfg.api_version, None);
        assert_eq!(cfg.base_url, "core.windows.net");
        assert!(cfg.use_https);
        assert_eq!(cfg.retry_attempts, 5);
        assert_eq!(cfg.retry_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_from_env() {
        let ctx = Context::new().with_env(StaticEnv {
            envs: HashMap::from([
                (APIVERSION_STORAGE.to_string(), "2017-07-29".to_string()),
                (AZURE_STORAGE_ACCOUNT.to_string(), "fromenv".to_string()),
                (AZURE_STORAGE_KEY.to_string(), "a2V5".to_string()),
            ]),
        });

        let cfg = Config::new().with_account_name("explicit").from_env(&ctx);

        assert_eq!(cfg.api_version.as_deref(), Some("2017-07-29"));
        assert_eq!(cfg.account_name.as_deref(), Some("explicit"));
        assert_eq!(cfg.account_key.as_deref(), Some("a2V5"));
        assert_eq!(cfg.sas_token, None);
    }

    #[test]
    fn test_from_env_keeps_default_version() {
        let ctx = Context::new().with_env(StaticEnv {
            envs: HashMap::from([(APIVERSION_STORAGE.to_string(), "".to_string())]),
        });

        let cfg = Config::new().from_env(&ctx);
        assert_eq!(cfg.api_version, None);
    }

    #[test]
    fn test_from_env_keeps_explicit_version() {
        let ctx = Context::new().with_env(StaticEnv {
            envs: HashMap::from([(APIVERSION_STORAGE.to_string(), "2017-07-29".to_string())]),
        });

        let cfg = Config::new().with_api_version("2015-04-05").from_env(&ctx);
        assert_eq!(cfg.api_version.as_deref(), Some("2015-04-05"));
    }
}
