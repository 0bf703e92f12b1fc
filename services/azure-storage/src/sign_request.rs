use std::collections::BTreeMap;
use std::fmt::Write;

use http::header::{self, HeaderName};
use http::request::Parts;
use http::HeaderValue;
use log::debug;
use percent_encoding::percent_encode;
use reqsend_core::hash::base64_hmac_sha256;
use reqsend_core::time::{format_http_date, now, DateTime};
use reqsend_core::{Result, SigningRequest};

use crate::constants::*;
use crate::identity::{ClientIdentity, Service, SigningMode};

/// Shared key authorization schemes accepted by the storage services.
///
/// - [Authorize with Shared Key](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// Blob, queue and file services.
    SharedKey,
    /// Blob, queue and file services, shorter string to sign.
    SharedKeyLite,
    /// Table service.
    SharedKeyForTable,
    /// Table service, shorter string to sign.
    SharedKeyLiteForTable,
}

impl AuthScheme {
    /// Pick the scheme a service expects.
    pub fn for_service(service: Service, lite: bool) -> Self {
        match (service, lite) {
            (Service::Table, false) => AuthScheme::SharedKeyForTable,
            (Service::Table, true) => AuthScheme::SharedKeyLiteForTable,
            (_, false) => AuthScheme::SharedKey,
            (_, true) => AuthScheme::SharedKeyLite,
        }
    }

    fn authorization_prefix(&self) -> &'static str {
        match self {
            AuthScheme::SharedKey | AuthScheme::SharedKeyForTable => "SharedKey",
            AuthScheme::SharedKeyLite | AuthScheme::SharedKeyLiteForTable => "SharedKeyLite",
        }
    }
}

/// RequestSigner that implement Azure Storage Shared Key Authorization.
///
/// Identities built from an account SAS token get the token appended to the
/// query instead of an `Authorization` header.
#[derive(Debug, Default)]
pub struct RequestSigner {
    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer.
    pub fn new() -> Self {
        Self { time: None }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Sign the request in place.
    pub fn sign(
        &self,
        identity: &ClientIdentity,
        scheme: AuthScheme,
        req: &mut Parts,
    ) -> Result<()> {
        let mut ctx = SigningRequest::build(req)?;

        match identity.signing_mode() {
            SigningMode::AccountSas(token) => {
                for (k, v) in token {
                    if !ctx.query_contains(k) {
                        ctx.query_push(k, v);
                    }
                }
            }
            SigningMode::AccountKey(key) => {
                if !ctx.headers.contains_key(X_MS_DATE) {
                    let now_time = self.time.unwrap_or_else(now);
                    ctx.headers
                        .insert(X_MS_DATE, format_http_date(now_time).parse()?);
                }

                let account_name = identity.account_name();
                let string_to_sign = string_to_sign(&ctx, scheme, account_name)?;
                debug!("string to sign: {}", &string_to_sign);

                let signature = base64_hmac_sha256(key, string_to_sign.as_bytes());

                ctx.headers.insert(header::AUTHORIZATION, {
                    let mut value: HeaderValue = format!(
                        "{} {account_name}:{signature}",
                        scheme.authorization_prefix()
                    )
                    .parse()?;
                    value.set_sensitive(true);
                    value
                });
            }
        }

        // Apply percent encoding for query parameters
        for (_, v) in ctx.query.iter_mut() {
            *v = percent_encode(v.as_bytes(), &AZURE_QUERY_ENCODE_SET).to_string();
        }

        ctx.apply(req)
    }
}

/// Construct string to sign for the given scheme.
///
/// ## SharedKey
///
/// ```text
/// VERB + "\n" +
/// Content-Encoding + "\n" +
/// Content-Language + "\n" +
/// Content-Length + "\n" +
/// Content-MD5 + "\n" +
/// Content-Type + "\n" +
/// Date + "\n" +
/// If-Modified-Since + "\n" +
/// If-Match + "\n" +
/// If-None-Match + "\n" +
/// If-Unmodified-Since + "\n" +
/// Range + "\n" +
/// CanonicalizedHeaders +
/// CanonicalizedResource;
/// ```
///
/// ## SharedKeyLite
///
/// ```text
/// VERB + "\n" + Content-MD5 + "\n" + Content-Type + "\n" + Date + "\n" +
/// CanonicalizedHeaders + CanonicalizedResource;
/// ```
///
/// ## SharedKeyForTable
///
/// ```text
/// VERB + "\n" + Content-MD5 + "\n" + Content-Type + "\n" + x-ms-date + "\n" +
/// CanonicalizedResource;
/// ```
///
/// ## SharedKeyLiteForTable
///
/// ```text
/// x-ms-date + "\n" + CanonicalizedResource;
/// ```
fn string_to_sign(
    ctx: &SigningRequest,
    scheme: AuthScheme,
    account_name: &str,
) -> Result<String> {
    let content_md5 = HeaderName::from_static(CONTENT_MD5);
    let x_ms_date = HeaderName::from_static(X_MS_DATE);
    let get = |name: &HeaderName| ctx.header_get_or_default(name);
    let mut s = String::with_capacity(256);

    match scheme {
        AuthScheme::SharedKey => {
            writeln!(&mut s, "{}", ctx.method.as_str())?;
            writeln!(&mut s, "{}", get(&header::CONTENT_ENCODING)?)?;
            writeln!(&mut s, "{}", get(&header::CONTENT_LANGUAGE)?)?;
            writeln!(&mut s, "{}", {
                let content_length = get(&header::CONTENT_LENGTH)?;
                if content_length == "0" {
                    ""
                } else {
                    content_length
                }
            })?;
            writeln!(&mut s, "{}", get(&content_md5)?)?;
            writeln!(&mut s, "{}", get(&header::CONTENT_TYPE)?)?;
            writeln!(&mut s, "{}", get(&header::DATE)?)?;
            writeln!(&mut s, "{}", get(&header::IF_MODIFIED_SINCE)?)?;
            writeln!(&mut s, "{}", get(&header::IF_MATCH)?)?;
            writeln!(&mut s, "{}", get(&header::IF_NONE_MATCH)?)?;
            writeln!(&mut s, "{}", get(&header::IF_UNMODIFIED_SINCE)?)?;
            writeln!(&mut s, "{}", get(&header::RANGE)?)?;
            writeln!(&mut s, "{}", canonicalize_header(ctx)?)?;
            write!(&mut s, "{}", canonicalize_resource(ctx, account_name))?;
        }
        AuthScheme::SharedKeyLite => {
            writeln!(&mut s, "{}", ctx.method.as_str())?;
            writeln!(&mut s, "{}", get(&content_md5)?)?;
            writeln!(&mut s, "{}", get(&header::CONTENT_TYPE)?)?;
            writeln!(&mut s, "{}", get(&header::DATE)?)?;
            writeln!(&mut s, "{}", canonicalize_header(ctx)?)?;
            write!(&mut s, "{}", canonicalize_resource_lite(ctx, account_name))?;
        }
        AuthScheme::SharedKeyForTable => {
            writeln!(&mut s, "{}", ctx.method.as_str())?;
            writeln!(&mut s, "{}", get(&content_md5)?)?;
            writeln!(&mut s, "{}", get(&header::CONTENT_TYPE)?)?;
            writeln!(&mut s, "{}", get(&x_ms_date)?)?;
            write!(&mut s, "{}", canonicalize_resource_lite(ctx, account_name))?;
        }
        AuthScheme::SharedKeyLiteForTable => {
            writeln!(&mut s, "{}", get(&x_ms_date)?)?;
            write!(&mut s, "{}", canonicalize_resource_lite(ctx, account_name))?;
        }
    }

    Ok(s)
}

/// ## Reference
///
/// - [Constructing the canonicalized headers string](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key#constructing-the-canonicalized-headers-string)
fn canonicalize_header(ctx: &SigningRequest) -> Result<String> {
    Ok(SigningRequest::header_to_string(
        ctx.header_to_vec_with_prefix("x-ms-")?,
        ":",
        "\n",
    ))
}

/// Query names are lowercased and sorted, values of repeated names are sorted and comma joined.
///
/// ## Reference
///
/// - [Constructing the canonicalized resource string](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key#constructing-the-canonicalized-resource-string)
fn canonicalize_resource(ctx: &SigningRequest, account_name: &str) -> String {
    let mut s = format!("/{}{}", account_name, ctx.path);

    let mut params: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for (k, v) in &ctx.query {
        params.entry(k.to_lowercase()).or_default().push(v);
    }

    for (k, mut values) in params {
        values.sort_unstable();
        s.push('\n');
        s.push_str(&k);
        s.push(':');
        s.push_str(&values.join(","));
    }

    s
}

/// Lite and table schemes only keep the `comp` parameter.
fn canonicalize_resource_lite(ctx: &SigningRequest, account_name: &str) -> String {
    let mut s = format!("/{}{}", account_name, ctx.path);

    if let Some(comp) = ctx.query_get("comp") {
        s.push_str("?comp=");
        s.push_str(comp);
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;
    use reqsend_core::time::parse_rfc3339;
    use test_case::test_case;

    fn identity() -> ClientIdentity {
        ClientIdentity::new("account", "a2V5", DEFAULT_BASE_URL, "2016-05-31", true).unwrap()
    }

    fn signer() -> RequestSigner {
        RequestSigner::new().with_time(parse_rfc3339("2022-03-01T08:12:34Z").unwrap())
    }

    fn parts(method: &str, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(X_MS_VERSION, "2016-05-31")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn signing_request(method: &str, uri: &str) -> SigningRequest {
        let mut p = parts(method, uri);
        p.headers
            .insert(X_MS_DATE, "Tue, 01 Mar 2022 08:12:34 GMT".parse().unwrap());
        SigningRequest::build(&mut p).unwrap()
    }

    #[test_case(Service::Blob, false => AuthScheme::SharedKey)]
    #[test_case(Service::File, true => AuthScheme::SharedKeyLite)]
    #[test_case(Service::Table, false => AuthScheme::SharedKeyForTable)]
    #[test_case(Service::Table, true => AuthScheme::SharedKeyLiteForTable)]
    fn test_scheme_for_service(service: Service, lite: bool) -> AuthScheme {
        AuthScheme::for_service(service, lite)
    }

    #[test]
    fn test_string_to_sign_shared_key() {
        let ctx = signing_request(
            "GET",
            "https://account.blob.core.windows.net/container/blob?timeout=30&comp=metadata&Include=b&include=a",
        );

        let s = string_to_sign(&ctx, AuthScheme::SharedKey, "account").unwrap();
        assert_eq!(
            s,
            "GET\n\n\n\n\n\n\n\n\n\n\n\n\
             x-ms-date:Tue, 01 Mar 2022 08:12:34 GMT\n\
             x-ms-version:2016-05-31\n\
             /account/container/blob\n\
             comp:metadata\n\
             include:a,b\n\
             timeout:30"
        );
    }

    #[test]
    fn test_string_to_sign_shared_key_lite() {
        let ctx = signing_request(
            "PUT",
            "https://account.queue.core.windows.net/myqueue?comp=metadata&timeout=30",
        );

        let s = string_to_sign(&ctx, AuthScheme::SharedKeyLite, "account").unwrap();
        assert_eq!(
            s,
            "PUT\n\n\n\n\
             x-ms-date:Tue, 01 Mar 2022 08:12:34 GMT\n\
             x-ms-version:2016-05-31\n\
             /account/myqueue?comp=metadata"
        );
    }

    #[test]
    fn test_string_to_sign_table() {
        let ctx = signing_request("POST", "https://account.table.core.windows.net/Tables");

        let s = string_to_sign(&ctx, AuthScheme::SharedKeyForTable, "account").unwrap();
        assert_eq!(
            s,
            "POST\n\n\nTue, 01 Mar 2022 08:12:34 GMT\n/account/Tables"
        );

        let s = string_to_sign(&ctx, AuthScheme::SharedKeyLiteForTable, "account").unwrap();
        assert_eq!(s, "Tue, 01 Mar 2022 08:12:34 GMT\n/account/Tables");
    }

    #[test]
    fn test_sign_shared_key() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut req = parts(
            "GET",
            "https://account.blob.core.windows.net/container?restype=container",
        );
        signer().sign(&identity(), AuthScheme::SharedKey, &mut req)?;

        assert_eq!(
            req.headers.get(X_MS_DATE).unwrap(),
            "Tue, 01 Mar 2022 08:12:34 GMT"
        );
        let auth = req.headers.get(header::AUTHORIZATION).unwrap();
        assert!(auth.is_sensitive());
        assert_eq!(
            auth.to_str().unwrap(),
            "SharedKey account:T+VG/NqodaOrG0AJ7RvNkjytzqFjxag6iw7sLJ+pJCM="
        );
        assert_eq!(
            req.uri.to_string(),
            "https://account.blob.core.windows.net/container?restype=container"
        );
        Ok(())
    }

    #[test]
    fn test_sign_keeps_caller_date() -> Result<()> {
        let mut req = parts(
            "DELETE",
            "https://account.table.core.windows.net/Tables('t')",
        );
        req.headers
            .insert(X_MS_DATE, "Wed, 02 Mar 2022 00:00:00 GMT".parse()?);

        signer().sign(&identity(), AuthScheme::SharedKeyLiteForTable, &mut req)?;

        assert_eq!(
            req.headers.get(X_MS_DATE).unwrap(),
            "Wed, 02 Mar 2022 00:00:00 GMT"
        );
        assert!(req
            .headers
            .get(header::AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("SharedKeyLite account:"));
        Ok(())
    }

    #[test]
    fn test_sign_account_sas() -> Result<()> {
        let id = ClientIdentity::with_account_sas(
            "account",
            "sv=2016-05-31&ss=b&srt=sco&sp=rl&se=2017-01-01&spr=https&sig=a%2Bb%3D",
            DEFAULT_BASE_URL,
        )?;

        let mut req = parts(
            "GET",
            "https://account.blob.core.windows.net/container?restype=container&sv=2015-04-05",
        );
        signer().sign(&id, AuthScheme::SharedKey, &mut req)?;

        assert!(req.headers.get(header::AUTHORIZATION).is_none());
        assert!(req.headers.get(X_MS_DATE).is_none());
        assert_eq!(
            req.uri.to_string(),
            "https://account.blob.core.windows.net/container?restype=container&sv=2015-04-05&ss=b&srt=sco&sp=rl&se=2017-01-01&spr=https&sig=a%2Bb%3D"
        );
        Ok(())
    }
}
