//! Azure Storage request signing, sending and response decoding.
//!
//! This crate provides:
//! - Shared Key authorization for the blob, queue, table and file services
//! - Account SAS token generation, and signing with a pre-issued account SAS
//! - Sending with retries on transient status codes
//! - Decoding of xml and OData json service errors
//! - Decoding of table batch responses
//!
//! # Example
//!
//! ```rust,no_run
//! use anyhow::Result;
//! use http::{Method, StatusCode};
//! use reqsend_azure_storage::{Client, Config};
//! use reqsend_core::{Context, OsEnv};
//! use reqsend_http_send_reqwest::ReqwestHttpSend;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::new()
//!         .with_http_send(ReqwestHttpSend::default())
//!         .with_env(OsEnv);
//!
//!     // Reads AZURE_STORAGE_ACCOUNT, AZURE_STORAGE_KEY and APIVERSION_STORAGE.
//!     let cfg = Config::new().from_env(&ctx);
//!     let client = Client::from_config(ctx, &cfg)?;
//!
//!     let blob = client.blob_service();
//!     let intent = blob
//!         .request(Method::PUT, "/mycontainer")
//!         .with_query("restype", "container");
//!     blob.call(intent, &[StatusCode::CREATED]).await?;
//!
//!     Ok(())
//! }
//! ```

mod constants;
pub use constants::{
    APIVERSION_STORAGE, DEFAULT_API_VERSION, DEFAULT_BASE_URL, EMULATOR_ACCOUNT_KEY,
    EMULATOR_ACCOUNT_NAME,
};

mod error;
pub use error::{DebugHeaders, Error, Result, ServiceError, UnexpectedStatusError};

mod config;
pub use config::{Config, AZURE_STORAGE_ACCOUNT, AZURE_STORAGE_KEY, AZURE_STORAGE_SAS_TOKEN};

mod identity;
pub use identity::{is_valid_account_name, ClientIdentity, Service, SigningMode};

mod sas;
pub use sas::{account_sas_token, AccountSasOptions, Permissions, ResourceTypes, Services};

mod sign_request;
pub use sign_request::{AuthScheme, RequestSigner};

mod send;
pub use send::{NoRetrySender, RetryPolicy, RetrySender, SendRequest};

mod decode;
pub use decode::{service_error_from_json, service_error_from_status, service_error_from_xml};

mod classify;
pub use classify::{check_status, classify, debug_headers, is_failure, StorageResponse};

mod multipart;

mod batch;
pub use batch::{parse_batch_response, BatchEnvelope, BatchOutcome};

mod client;
pub use client::{Client, RequestIntent, ServiceClient};
