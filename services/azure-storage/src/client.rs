use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, USER_AGENT};
use http::{Method, Request, Response, StatusCode};
use log::debug;
use reqsend_core::time::{format_http_date, now};
use reqsend_core::Context;
use serde::de::DeserializeOwned;

use crate::batch::{parse_batch_response, BatchOutcome};
use crate::classify::{classify, StorageResponse};
use crate::constants::*;
use crate::identity::{ClientIdentity, Service};
use crate::sas::{account_sas_token, AccountSasOptions};
use crate::send::{RetryPolicy, RetrySender, SendRequest};
use crate::sign_request::{AuthScheme, RequestSigner};
use crate::{Config, Result};

/// Client of a storage account.
///
/// Cheap to clone, clones share the identity and the sender.
#[derive(Clone)]
pub struct Client {
    ctx: Context,
    identity: Arc<ClientIdentity>,
    sender: Arc<dyn SendRequest>,
    signer: Arc<RequestSigner>,
    user_agent: String,
    use_shared_key_lite: bool,
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.identity)
            .field("sender", &self.sender)
            .field("user_agent", &self.user_agent)
            .field("use_shared_key_lite", &self.use_shared_key_lite)
            .finish()
    }
}

impl Client {
    /// Create a client sending through `ctx` with the default retry policy.
    pub fn new(ctx: Context, identity: ClientIdentity) -> Self {
        let user_agent = default_user_agent(identity.api_version());
        Self {
            ctx,
            identity: Arc::new(identity),
            sender: Arc::new(RetrySender::default()),
            signer: Arc::new(RequestSigner::new()),
            user_agent,
            use_shared_key_lite: false,
        }
    }

    /// Create a client from a config.
    pub fn from_config(ctx: Context, cfg: &Config) -> Result<Self> {
        let identity = ClientIdentity::from_config(cfg)?;
        let policy = RetryPolicy::new(cfg.retry_attempts, cfg.retry_backoff)?;

        Ok(Self::new(ctx, identity)
            .with_sender(RetrySender::new(policy))
            .with_shared_key_lite(cfg.use_shared_key_lite))
    }

    /// Replace the sender.
    pub fn with_sender(mut self, sender: impl SendRequest) -> Self {
        self.sender = Arc::new(sender);
        self
    }

    /// Sign with the lite variants of the shared key schemes.
    pub fn with_shared_key_lite(mut self, enabled: bool) -> Self {
        self.use_shared_key_lite = enabled;
        self
    }

    /// Append an extension to the user agent.
    pub fn add_to_user_agent(&mut self, extension: &str) -> Result<()> {
        if extension.is_empty() {
            return Err(reqsend_core::Error::config_invalid(format!(
                "extension was empty, user agent stayed as {}",
                self.user_agent
            ))
            .into());
        }

        self.user_agent = format!("{} {extension}", self.user_agent);
        Ok(())
    }

    /// The user agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The identity requests are made with.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Build an account SAS token signed with this client's account key.
    pub fn account_sas_token(&self, options: &AccountSasOptions) -> Result<Vec<(String, String)>> {
        Ok(account_sas_token(&self.identity, options)?)
    }

    /// Handle on the blob service.
    pub fn blob_service(&self) -> ServiceClient {
        self.service(Service::Blob)
    }

    /// Handle on the queue service.
    pub fn queue_service(&self) -> ServiceClient {
        self.service(Service::Queue)
    }

    /// Handle on the table service.
    pub fn table_service(&self) -> ServiceClient {
        self.service(Service::Table)
    }

    /// Handle on the file service.
    pub fn file_service(&self) -> ServiceClient {
        self.service(Service::File)
    }

    /// Handle on the given service, its requests carry the service name in the user agent.
    pub fn service(&self, service: Service) -> ServiceClient {
        let mut client = self.clone();
        client.user_agent = format!("{} {}", self.user_agent, service.as_str());

        ServiceClient {
            scheme: AuthScheme::for_service(service, self.use_shared_key_lite),
            client,
            service,
        }
    }
}

fn default_user_agent(api_version: &str) -> String {
    format!(
        "reqsend-azure-storage/{} ({}-{}) api-version/{api_version}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        std::env::consts::OS,
    )
}

/// A request to one of the storage services, before standard headers and signing.
#[derive(Debug, Clone)]
pub struct RequestIntent {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    metadata: Vec<(String, String)>,
    body: Bytes,
    scheme: Option<AuthScheme>,
}

impl RequestIntent {
    /// Create a request for `path`, relative to the service endpoint.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            metadata: Vec::new(),
            body: Bytes::new(),
            scheme: None,
        }
    }

    /// Append a query parameter, unencoded.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a header, replacing a standard header of the same name.
    ///
    /// A `User-Agent` is appended to the client's user agent instead.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add user metadata, sent as an `x-ms-meta-` header.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sign with the given scheme instead of the service's default.
    pub fn with_auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// The method of the request.
    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// Handle on one service of the account.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    service: Service,
    scheme: AuthScheme,
}

impl ServiceClient {
    /// The service this handle talks to.
    pub fn service(&self) -> Service {
        self.service
    }

    /// The scheme requests are signed with by default.
    pub fn auth_scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// The user agent sent by this handle.
    pub fn user_agent(&self) -> &str {
        self.client.user_agent()
    }

    /// Start a request against this service.
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestIntent {
        RequestIntent::new(method, path)
    }

    /// Build, sign and send the request, returning the raw response.
    pub async fn send(&self, intent: RequestIntent) -> Result<Response<Bytes>> {
        let req = self.build(intent)?;
        debug!("sending {} {}", req.method(), req.uri());

        Ok(self.client.sender.send(&self.client.ctx, req).await?)
    }

    /// Send the request and classify the response.
    pub async fn execute(&self, intent: RequestIntent) -> Result<StorageResponse> {
        classify(self.send(intent).await?)
    }

    /// Send the request and require one of the `expected` statuses.
    pub async fn call(
        &self,
        intent: RequestIntent,
        expected: &[StatusCode],
    ) -> Result<StorageResponse> {
        let resp = self.execute(intent).await?;
        resp.check_status(expected)?;
        Ok(resp)
    }

    /// Like [`ServiceClient::call`], decoding the xml body into `T`.
    pub async fn call_xml<T: DeserializeOwned>(
        &self,
        intent: RequestIntent,
        expected: &[StatusCode],
    ) -> Result<T> {
        let resp = self.call(intent, expected).await?;
        let text = String::from_utf8_lossy(&resp.body);

        let v = quick_xml::de::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| {
            reqsend_core::Error::unexpected("failed to decode xml response body").with_source(e)
        })?;
        Ok(v)
    }

    /// Like [`ServiceClient::call`], decoding the json body into `T`.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        intent: RequestIntent,
        expected: &[StatusCode],
    ) -> Result<T> {
        let resp = self.call(intent, expected).await?;

        Ok(serde_json::from_slice(&resp.body).map_err(|e| {
            reqsend_core::Error::unexpected("failed to decode json response body").with_source(e)
        })?)
    }

    /// Send a batch request and decode its embedded response.
    pub async fn batch(&self, intent: RequestIntent) -> Result<BatchOutcome> {
        let method = intent.method.clone();
        parse_batch_response(&method, self.send(intent).await?)
    }

    fn build(&self, intent: RequestIntent) -> reqsend_core::Result<Request<Bytes>> {
        let RequestIntent {
            method,
            path,
            query,
            headers,
            metadata,
            body,
            scheme,
        } = intent;

        let identity = &self.client.identity;
        let uri = identity.endpoint(self.service, &path, &query)?;

        let mut user_agent = self.client.user_agent.clone();
        let len = body.len();
        let mut req = Request::builder().method(method).uri(uri).body(body)?;

        {
            let h = req.headers_mut();
            h.insert(X_MS_VERSION, identity.api_version().parse()?);
            h.insert(X_MS_DATE, format_http_date(now()).parse()?);

            let extra = headers
                .into_iter()
                .map(|(k, v)| (k, v, false))
                .chain(metadata.into_iter().map(|(k, v)| (k, v, true)));
            for (k, v, is_metadata) in extra {
                // The client's user agent is extended, never replaced.
                if k.eq_ignore_ascii_case(USER_AGENT.as_str()) {
                    user_agent = format!("{user_agent} {v}");
                    continue;
                }

                let name = if is_metadata {
                    HeaderName::from_bytes(format!("{X_MS_META_PREFIX}{k}").as_bytes())?
                } else {
                    HeaderName::from_bytes(k.as_bytes())?
                };
                h.insert(name, HeaderValue::from_str(&v)?);
            }

            h.insert(USER_AGENT, user_agent.parse()?);
            if len > 0 {
                h.insert(CONTENT_LENGTH, HeaderValue::from(len));
            }
        }

        let (mut parts, body) = req.into_parts();
        self.client
            .signer
            .sign(identity, scheme.unwrap_or(self.scheme), &mut parts)?;

        Ok(Request::from_parts(parts, body))
    }
}
