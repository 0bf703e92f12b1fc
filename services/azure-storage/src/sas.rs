//! Account shared access signatures.
//!
//! - [Create an account SAS](https://learn.microsoft.com/en-us/rest/api/storageservices/create-account-sas)

use log::debug;
use reqsend_core::hash::base64_hmac_sha256;
use reqsend_core::time::{format_date, DateTime};
use reqsend_core::{Error, Result};

use crate::constants::ACCOUNT_SAS_MIN_VERSION;
use crate::identity::ClientIdentity;

/// Services accessible with an account SAS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Services {
    pub blob: bool,
    pub queue: bool,
    pub table: bool,
    pub file: bool,
}

impl Services {
    /// Flags in canonical order: `bqtf`.
    pub fn as_flags(&self) -> String {
        flags(&[
            (self.blob, 'b'),
            (self.queue, 'q'),
            (self.table, 't'),
            (self.file, 'f'),
        ])
    }
}

/// Resource types accessible with an account SAS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceTypes {
    pub service: bool,
    pub container: bool,
    pub object: bool,
}

impl ResourceTypes {
    /// Flags in canonical order: `sco`.
    pub fn as_flags(&self) -> String {
        flags(&[
            (self.service, 's'),
            (self.container, 'c'),
            (self.object, 'o'),
        ])
    }
}

/// Permissions granted by an account SAS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
    pub add: bool,
    pub create: bool,
    pub update: bool,
    pub process: bool,
}

impl Permissions {
    /// Flags in canonical order: `rwdlacup`.
    pub fn as_flags(&self) -> String {
        flags(&[
            (self.read, 'r'),
            (self.write, 'w'),
            (self.delete, 'd'),
            (self.list, 'l'),
            (self.add, 'a'),
            (self.create, 'c'),
            (self.update, 'u'),
            (self.process, 'p'),
        ])
    }
}

fn flags(v: &[(bool, char)]) -> String {
    v.iter().filter(|(on, _)| *on).map(|(_, c)| *c).collect()
}

/// Options of an account SAS token.
#[derive(Debug, Clone)]
pub struct AccountSasOptions {
    api_version: Option<String>,
    services: Services,
    resource_types: ResourceTypes,
    permissions: Permissions,
    start: Option<DateTime>,
    expiry: DateTime,
    ip: Option<String>,
    use_https: bool,
}

impl AccountSasOptions {
    /// Create options for a token valid until `expiry`.
    pub fn new(expiry: DateTime) -> Self {
        Self {
            api_version: None,
            services: Services::default(),
            resource_types: ResourceTypes::default(),
            permissions: Permissions::default(),
            start: None,
            expiry,
            ip: None,
            use_https: false,
        }
    }

    /// Set the signed version, the identity's api version is used otherwise.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn with_resource_types(mut self, resource_types: ResourceTypes) -> Self {
        self.resource_types = resource_types;
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set the start of the validity window.
    pub fn with_start(mut self, start: DateTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Restrict the token to an ip or ip range.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Only allow https requests with this token.
    pub fn with_https_only(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }
}

/// Build an account SAS token signed with the identity's account key.
///
/// Keys come out in the order `sv, ss, srt, sp, se, spr, sig`, followed by
/// `st` and `sip` when set. Values are not url encoded.
pub fn account_sas_token(
    identity: &ClientIdentity,
    options: &AccountSasOptions,
) -> Result<Vec<(String, String)>> {
    let version = options
        .api_version
        .as_deref()
        .unwrap_or(identity.api_version());
    if version < ACCOUNT_SAS_MIN_VERSION {
        return Err(Error::config_invalid(format!(
            "account SAS does not support API versions prior to {ACCOUNT_SAS_MIN_VERSION}. API version : {version}"
        )));
    }

    let Some(key) = identity.account_key() else {
        return Err(Error::config_invalid(
            "account SAS can only be generated with an account key",
        ));
    };

    let services = options.services.as_flags();
    let resource_types = options.resource_types.as_flags();
    let permissions = options.permissions.as_flags();
    // A start at the epoch counts as not set.
    let start = options
        .start
        .filter(|v| *v != DateTime::default())
        .map(format_date);
    let expiry = format_date(options.expiry);
    let ip = options.ip.clone().unwrap_or_default();
    let protocol = if options.use_https {
        "https"
    } else {
        "https,http"
    };

    let string_to_sign = [
        identity.account_name(),
        &permissions,
        &services,
        &resource_types,
        start.as_deref().unwrap_or_default(),
        &expiry,
        &ip,
        protocol,
        version,
        "",
    ]
    .join("\n");
    debug!("account sas string to sign: {}", &string_to_sign);

    let signature = base64_hmac_sha256(key, string_to_sign.as_bytes());

    let mut token = vec![
        ("sv".to_string(), version.to_string()),
        ("ss".to_string(), services),
        ("srt".to_string(), resource_types),
        ("sp".to_string(), permissions),
        ("se".to_string(), expiry),
        ("spr".to_string(), protocol.to_string()),
        ("sig".to_string(), signature),
    ];
    if let Some(start) = start {
        token.push(("st".to_string(), start));
    }
    if !ip.is_empty() {
        token.push(("sip".to_string(), ip));
    }

    Ok(token)
}
