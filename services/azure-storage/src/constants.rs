use http::StatusCode;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;

// Headers used in azure services.
pub const X_MS_DATE: &str = "x-ms-date";
pub const X_MS_VERSION: &str = "x-ms-version";
pub const X_MS_REQUEST_ID: &str = "x-ms-request-id";
pub const X_MS_META_PREFIX: &str = "x-ms-meta-";
pub const CONTENT_MD5: &str = "content-md5";

// Env values used in azure services.
pub const APIVERSION_STORAGE: &str = "APIVERSION_STORAGE";

/// API version used when neither the caller nor the environment picks one.
pub const DEFAULT_API_VERSION: &str = "2016-05-31";
/// Domain used for storage requests in the public cloud.
pub const DEFAULT_BASE_URL: &str = "core.windows.net";
pub const DEFAULT_USE_HTTPS: bool = true;

/// Account SAS is not accepted by the service for versions before this one.
pub const ACCOUNT_SAS_MIN_VERSION: &str = "2015-04-05";

pub const DEFAULT_RETRY_ATTEMPTS: usize = 5;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_TRANSIENT_STATUS_CODES: [StatusCode; 5] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Fixed storage account used by the storage emulator.
pub const EMULATOR_ACCOUNT_NAME: &str = "devstoreaccount1";
/// Fixed storage account key used by the storage emulator.
pub const EMULATOR_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
pub const EMULATOR_BLOB_HOST: &str = "127.0.0.1:10000";
pub const EMULATOR_QUEUE_HOST: &str = "127.0.0.1:10001";
pub const EMULATOR_TABLE_HOST: &str = "127.0.0.1:10002";

pub const EMPTY_BODY_MESSAGE: &str = "no response body was available for error status code";

/// Query values are encoded with everything but unreserved characters escaped.
pub static AZURE_QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
