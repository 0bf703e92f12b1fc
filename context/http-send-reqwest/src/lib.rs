//! [`HttpSend`] implementation backed by [`reqwest`].
//!
//! Connection pooling, TLS and timeouts are whatever the wrapped
//! [`reqwest::Client`] is configured with.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use reqsend_core::{Error, HttpSend, Result};
use reqwest::{Client, Request};

/// ReqwestHttpSend puts requests on the wire with a [`reqwest::Client`].
#[derive(Debug, Default)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req).map_err(|e| {
            Error::request_invalid("failed to convert request for reqwest").with_source(e)
        })?;
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::transport("failed to send request").with_source(e))?
            .into();

        // Collect the whole body so the connection goes back to the pool
        // before the response is handed to the caller.
        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| Error::transport("failed to read response body").with_source(e))?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let sender = ReqwestHttpSend::default();
        // Port 9 (discard) on localhost is never served in test environments.
        let req = http::Request::get("http://127.0.0.1:9/")
            .body(Bytes::new())
            .unwrap();

        let err = sender.http_send(req).await.unwrap_err();
        assert!(err.is_transport());
    }
}
