//! Core components for signing and sending storage API requests.
//!
//! This crate provides the foundational types shared by the reqsend ecosystem.
//!
//! ## Overview
//!
//! - **Context**: A container that holds implementations for HTTP sending and environment access
//! - **Error**: The error type every crate in the workspace builds on
//! - **SigningRequest**: A mutable view over request parts used while computing signatures
//!
//! ## Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use reqsend_core::{Context, HttpSend, OsEnv, Result};
//!
//! #[derive(Debug)]
//! struct MyHttpSend;
//!
//! #[async_trait::async_trait]
//! impl HttpSend for MyHttpSend {
//!     async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
//!         // Put the request on the wire here
//!         todo!()
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let ctx = Context::new().with_http_send(MyHttpSend).with_env(OsEnv);
//!
//! let req = http::Request::get("https://example.com").body(Bytes::new())?;
//! let resp = ctx.http_send(req).await?;
//! println!("{}", resp.status());
//! # Ok(())
//! # }
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: Cryptographic hashing utilities
//! - [`time`]: Time formatting utilities
//! - [`utils`]: General utilities including data redaction

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::{Context, Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, StaticEnv};

mod error;
pub use error::{Error, ErrorKind, Result};

mod request;
pub use request::SigningRequest;
