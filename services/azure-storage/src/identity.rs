use std::fmt::{Debug, Formatter};

use reqsend_core::hash::base64_decode;
use reqsend_core::utils::Redact;
use reqsend_core::{Error, Result};

use crate::constants::*;
use crate::Config;

/// Storage services an account exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Blob service.
    Blob,
    /// Queue service.
    Queue,
    /// Table service.
    Table,
    /// File service.
    File,
}

impl Service {
    /// Name of the service as used in endpoints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Blob => "blob",
            Service::Queue => "queue",
            Service::Table => "table",
            Service::File => "file",
        }
    }

    fn emulator_host(&self) -> Option<&'static str> {
        match self {
            Service::Blob => Some(EMULATOR_BLOB_HOST),
            Service::Queue => Some(EMULATOR_QUEUE_HOST),
            Service::Table => Some(EMULATOR_TABLE_HOST),
            Service::File => None,
        }
    }
}

/// How requests made with an identity are authorized.
#[derive(Clone)]
pub enum SigningMode {
    /// Shared key signing with the decoded account key.
    AccountKey(Vec<u8>),
    /// Pre-issued account SAS token, sent as query parameters.
    AccountSas(Vec<(String, String)>),
}

impl Debug for SigningMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningMode::AccountKey(_) => f.write_str("SigningMode::AccountKey(***)"),
            SigningMode::AccountSas(token) => {
                let sig = token_value(token, "sig").unwrap_or_default();
                f.debug_struct("SigningMode::AccountSas")
                    .field("sig", &Redact::from(sig))
                    .finish()
            }
        }
    }
}

/// Identity of a storage account client: who we are and where we talk to.
///
/// Immutable once built and safe to share across concurrent requests.
#[derive(Clone)]
pub struct ClientIdentity {
    account_name: String,
    mode: SigningMode,
    api_version: String,
    use_https: bool,
    base_url: String,
}

impl Debug for ClientIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("account_name", &self.account_name)
            .field("mode", &self.mode)
            .field("api_version", &self.api_version)
            .field("use_https", &self.use_https)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// First value of `name` in a decoded token.
fn token_value<'a>(token: &'a [(String, String)], name: &str) -> Option<&'a str> {
    token
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Check if the storage account name is valid: 3 to 24 numbers and lowercase letters.
pub fn is_valid_account_name(account: &str) -> bool {
    (3..=24).contains(&account.len())
        && account
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

impl ClientIdentity {
    /// Create an identity signing with the given account key.
    pub fn new(
        account_name: &str,
        account_key: &str,
        base_url: &str,
        api_version: &str,
        use_https: bool,
    ) -> Result<Self> {
        if !is_valid_account_name(account_name) {
            return Err(Error::config_invalid(format!(
                "account name is not valid: it must be between 3 and 24 characters, and only may contain numbers and lowercase letters: {account_name}"
            )));
        }
        if account_key.is_empty() {
            return Err(Error::config_invalid("account key required"));
        }
        if base_url.is_empty() {
            return Err(Error::config_invalid("base storage service url required"));
        }

        let key = base64_decode(account_key)
            .map_err(|e| Error::config_invalid("malformed storage account key").with_source(e))?;

        Ok(Self {
            account_name: account_name.to_string(),
            mode: SigningMode::AccountKey(key),
            api_version: api_version.to_string(),
            use_https,
            base_url: base_url.to_string(),
        })
    }

    /// Create an identity for the storage emulator.
    pub fn emulator(api_version: &str) -> Result<Self> {
        Self::new(
            EMULATOR_ACCOUNT_NAME,
            EMULATOR_ACCOUNT_KEY,
            DEFAULT_BASE_URL,
            api_version,
            false,
        )
    }

    /// Create an identity authorized by a pre-issued account SAS token.
    ///
    /// The api version comes from the token's `sv` and https is used only
    /// when the token's `spr` is exactly `https`.
    pub fn with_account_sas(account_name: &str, token: &str, base_url: &str) -> Result<Self> {
        let raw = token.trim_start_matches('?').as_bytes();
        let token: Vec<(String, String)> = form_urlencoded::parse(raw)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let Some(api_version) = token_value(&token, "sv").map(str::to_string) else {
            return Err(Error::config_invalid(
                "account sas token has no sv parameter",
            ));
        };
        if token_value(&token, "sig").is_none() {
            return Err(Error::config_invalid(
                "account sas token has no sig parameter",
            ));
        }
        let use_https = token_value(&token, "spr") == Some("https");

        Ok(Self {
            account_name: account_name.to_string(),
            mode: SigningMode::AccountSas(token),
            api_version,
            use_https,
            base_url: base_url.to_string(),
        })
    }

    /// Build the identity described by a config.
    ///
    /// A SAS token wins over the account key, the emulator account name
    /// selects the emulator identity.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let Some(account_name) = cfg.account_name.as_deref() else {
            return Err(Error::config_invalid("account name required"));
        };

        if let Some(token) = cfg.sas_token.as_deref().filter(|v| !v.is_empty()) {
            return Self::with_account_sas(account_name, token, &cfg.base_url);
        }
        let api_version = cfg.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION);
        if account_name == EMULATOR_ACCOUNT_NAME {
            return Self::emulator(api_version);
        }

        Self::new(
            account_name,
            cfg.account_key.as_deref().unwrap_or_default(),
            &cfg.base_url,
            api_version,
            cfg.use_https,
        )
    }

    /// Storage account name.
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// API version sent with every request.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Whether requests go over https.
    pub fn use_https(&self) -> bool {
        self.use_https
    }

    /// How requests are authorized.
    pub fn signing_mode(&self) -> &SigningMode {
        &self.mode
    }

    /// Decoded account key, absent for SAS identities.
    pub fn account_key(&self) -> Option<&[u8]> {
        match &self.mode {
            SigningMode::AccountKey(key) => Some(key),
            SigningMode::AccountSas(_) => None,
        }
    }

    /// Whether this identity talks to the storage emulator.
    pub fn is_emulator(&self) -> bool {
        self.account_name == EMULATOR_ACCOUNT_NAME
    }

    /// `scheme://host` of the given service.
    pub fn base_uri(&self, service: Service) -> Result<String> {
        let scheme = if self.use_https { "https" } else { "http" };
        let host = if self.is_emulator() {
            service
                .emulator_host()
                .ok_or_else(|| {
                    Error::config_invalid(format!(
                        "{} service is not available on the storage emulator",
                        service.as_str()
                    ))
                })?
                .to_string()
        } else {
            let service = service.as_str();
            format!("{}.{service}.{}", self.account_name, self.base_url)
        };

        Ok(format!("{scheme}://{host}"))
    }

    /// Full endpoint for a path and query of the given service.
    ///
    /// Emulator paths are prefixed with the emulator account name.
    pub fn endpoint(
        &self,
        service: Service,
        path: &str,
        query: &[(String, String)],
    ) -> Result<String> {
        let mut s = self.base_uri(service)?;

        if self.is_emulator() {
            s.push('/');
            s.push_str(EMULATOR_ACCOUNT_NAME);
        }
        if !path.starts_with('/') {
            s.push('/');
        }
        s.push_str(path);

        if !query.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (k, v) in query {
                serializer.append_pair(k, v);
            }
            s.push('?');
            s.push_str(&serializer.finish());
        }

        Ok(s)
    }
}
