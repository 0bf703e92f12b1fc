use bytes::Bytes;
use http::header::{CONTENT_TYPE, DATE};
use http::{HeaderMap, Response, StatusCode};

use crate::constants::{X_MS_REQUEST_ID, X_MS_VERSION};
use crate::decode::{service_error_from_json, service_error_from_status, service_error_from_xml};
use crate::error::{DebugHeaders, ServiceError, UnexpectedStatusError};
use crate::Result;

/// Response of a storage call the service did not report as failed.
#[derive(Debug, Clone)]
pub struct StorageResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl From<Response<Bytes>> for StorageResponse {
    fn from(resp: Response<Bytes>) -> Self {
        let (parts, body) = resp.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }
}

impl StorageResponse {
    /// Fail with [`UnexpectedStatusError`] unless the status is one of `allowed`.
    pub fn check_status(&self, allowed: &[StatusCode]) -> Result<()> {
        check_status(self.status, allowed)
    }

    /// Get a header value as string, empty if absent or not valid.
    pub fn header(&self, name: &str) -> &str {
        header_str(&self.headers, name)
    }
}

/// Fail with [`UnexpectedStatusError`] unless `status` is one of `allowed`.
pub fn check_status(status: StatusCode, allowed: &[StatusCode]) -> Result<()> {
    if allowed.contains(&status) {
        Ok(())
    } else {
        Err(UnexpectedStatusError::new(allowed, status).into())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Extract the correlation headers of a response.
pub fn debug_headers(headers: &HeaderMap) -> DebugHeaders {
    DebugHeaders {
        request_id: header_str(headers, X_MS_REQUEST_ID).to_string(),
        date: header_str(headers, DATE.as_str()).to_string(),
        api_version: header_str(headers, X_MS_VERSION).to_string(),
    }
}

/// Check whether the service reports a failure with this status.
pub fn is_failure(status: StatusCode) -> bool {
    (400..=505).contains(&status.as_u16())
}

/// Decode the error carried by a failure response.
///
/// Bodies are xml when the content type says so and OData json otherwise.
pub fn decode_failure(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> ServiceError {
    let debug = debug_headers(headers);

    if body.is_empty() {
        return service_error_from_status(status, debug);
    }

    if is_xml(headers) {
        service_error_from_xml(body, status, debug)
    } else {
        service_error_from_json(body, status, debug)
    }
}

fn is_xml(headers: &HeaderMap) -> bool {
    header_str(headers, CONTENT_TYPE.as_str())
        .parse::<mime::Mime>()
        .map(|v| v.essence_str() == "application/xml")
        .unwrap_or(false)
}

/// Turn a raw response into a [`StorageResponse`] or the error the service reported.
///
/// Statuses from 400 through 505 are failures, everything else passes through.
pub fn classify(resp: Response<Bytes>) -> Result<StorageResponse> {
    let resp = StorageResponse::from(resp);

    if is_failure(resp.status) {
        let err = decode_failure(resp.status, &resp.headers, &resp.body);
        return Err(err.into());
    }

    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use test_case::test_case;

    fn response(status: u16, content_type: Option<&str>, body: &'static str) -> Response<Bytes> {
        let mut builder = Response::builder()
            .status(status)
            .header(X_MS_REQUEST_ID, "req-1")
            .header(X_MS_VERSION, "2016-05-31")
            .header(DATE, "Tue, 01 Mar 2022 08:12:34 GMT");
        if let Some(v) = content_type {
            builder = builder.header(CONTENT_TYPE, v);
        }
        builder.body(Bytes::from_static(body.as_bytes())).unwrap()
    }

    fn service_error(res: Result<StorageResponse>) -> ServiceError {
        match res {
            Err(Error::Service(e)) => *e,
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test_case(200 => false)]
    #[test_case(304 => false)]
    #[test_case(399 => false)]
    #[test_case(400 => true)]
    #[test_case(404 => true)]
    #[test_case(505 => true)]
    #[test_case(506 => false)]
    fn test_is_failure(status: u16) -> bool {
        is_failure(StatusCode::from_u16(status).unwrap())
    }

    #[test]
    fn test_success_passes_body_through() {
        let resp = classify(response(200, Some("application/xml"), "<List/>")).unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body.as_ref(), b"<List/>");
        assert_eq!(resp.header(X_MS_REQUEST_ID), "req-1");
    }

    #[test]
    fn test_status_beyond_failure_window_passes() {
        let resp = classify(response(507, None, "")).unwrap();
        assert_eq!(resp.status, StatusCode::INSUFFICIENT_STORAGE);
        assert!(resp.check_status(&[StatusCode::OK]).is_err());
    }

    #[test]
    fn test_empty_body_failure() {
        let err = service_error(classify(response(404, None, "")));

        assert_eq!(err.code, "404 Not Found");
        assert_eq!(
            err.message,
            "no response body was available for error status code"
        );
        assert_eq!(err.request_id, "req-1");
        assert_eq!(err.api_version, "2016-05-31");
        assert_eq!(err.date, "Tue, 01 Mar 2022 08:12:34 GMT");
    }

    #[test]
    fn test_xml_failure() {
        let err = service_error(classify(response(
            409,
            Some("application/xml"),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>ContainerAlreadyExists</Code><Message>exists</Message></Error>",
        )));

        assert_eq!(err.status_code, StatusCode::CONFLICT);
        assert_eq!(err.code, "ContainerAlreadyExists");
        assert_eq!(err.message, "exists");
    }

    #[test]
    fn test_json_failure() {
        let err = service_error(classify(response(
            409,
            Some("application/json;odata=minimalmetadata;streaming=true;charset=utf-8"),
            r#"{"odata.error":{"code":"TableAlreadyExists","message":{"lang":"en-US","value":"The table specified already exists."}}}"#,
        )));

        assert_eq!(err.code, "TableAlreadyExists");
        assert_eq!(err.lang, "en-US");
    }

    #[test]
    fn test_check_status() {
        let allowed = [StatusCode::CREATED, StatusCode::NO_CONTENT];
        assert!(check_status(StatusCode::CREATED, &allowed).is_ok());

        let err = check_status(StatusCode::OK, &allowed).unwrap_err();
        match err {
            Error::UnexpectedStatus(e) => {
                assert_eq!(e.got(), StatusCode::OK);
                assert_eq!(e.allowed(), &allowed);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
