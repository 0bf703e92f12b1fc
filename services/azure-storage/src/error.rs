use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Result returned by storage calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by storage calls.
///
/// Transport and configuration failures come through as [`reqsend_core::Error`],
/// everything the service itself answered with is either an
/// [`UnexpectedStatusError`] or a [`ServiceError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Signing, configuration or transport failure.
    #[error(transparent)]
    Core(#[from] reqsend_core::Error),
    /// The service answered with a status outside of the accepted set.
    #[error(transparent)]
    UnexpectedStatus(#[from] UnexpectedStatusError),
    /// The service reported a failure.
    #[error(transparent)]
    Service(#[from] Box<ServiceError>),
}

impl From<ServiceError> for Error {
    fn from(err: ServiceError) -> Self {
        Error::Service(Box::new(err))
    }
}

impl Error {
    /// Check if the exchange failed before the service answered.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Core(e) if e.is_transport())
    }

    /// Get the service error if the service reported one.
    pub fn as_service_error(&self) -> Option<&ServiceError> {
        match self {
            Error::Service(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Get the status code the service answered with, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Core(_) => None,
            Error::UnexpectedStatus(e) => Some(e.got()),
            Error::Service(e) => Some(e.status_code),
        }
    }
}

/// Error reported by the storage service.
///
/// Built once per failed exchange from the response status, the debug headers and
/// whatever the body could be decoded into. Some fields are specific to certain calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// Service error code, or the status line when the body is empty.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// Detail for authentication failures.
    pub authentication_error_detail: String,
    /// Name of the offending query parameter.
    pub query_parameter_name: String,
    /// Value of the offending query parameter.
    pub query_parameter_value: String,
    /// Reason reported along with the code.
    pub reason: String,
    /// Language tag of the message, OData bodies only.
    pub lang: String,
    /// HTTP status code of the response.
    pub status_code: StatusCode,
    /// `x-ms-request-id` of the response.
    pub request_id: String,
    /// `Date` of the response.
    pub date: String,
    /// `x-ms-version` echoed by the service.
    pub api_version: String,
}

impl ServiceError {
    /// Create an error carrying only the status and correlation fields.
    pub fn new(status_code: StatusCode, debug: DebugHeaders) -> Self {
        Self {
            code: String::new(),
            message: String::new(),
            authentication_error_detail: String::new(),
            query_parameter_name: String::new(),
            query_parameter_value: String::new(),
            reason: String::new(),
            lang: String::new(),
            status_code,
            request_id: debug.request_id,
            date: debug.date,
            api_version: debug.api_version,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "storage: service returned error: StatusCode={}, ErrorCode={}, ErrorMessage={}, RequestInitiated={}, RequestId={}, API Version={}, QueryParameterName={}, QueryParameterValue={}",
            self.status_code.as_u16(),
            self.code,
            self.message,
            self.date,
            self.request_id,
            self.api_version,
            self.query_parameter_name,
            self.query_parameter_value
        )
    }
}

impl std::error::Error for ServiceError {}

/// Correlation headers the service sets on every response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugHeaders {
    /// `x-ms-request-id`
    pub request_id: String,
    /// `Date`
    pub date: String,
    /// `x-ms-version`
    pub api_version: String,
}

/// Returned when the service answers with neither an error nor an accepted status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedStatusError {
    allowed: Vec<StatusCode>,
    got: StatusCode,
}

impl UnexpectedStatusError {
    pub(crate) fn new(allowed: &[StatusCode], got: StatusCode) -> Self {
        Self {
            allowed: allowed.to_vec(),
            got,
        }
    }

    /// The status codes the caller accepted.
    pub fn allowed(&self) -> &[StatusCode] {
        &self.allowed
    }

    /// The status code the service answered with.
    pub fn got(&self) -> StatusCode {
        self.got
    }
}

impl fmt::Display for UnexpectedStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = self
            .allowed
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        write!(
            f,
            "storage: status code from service response is {}; was expecting {}",
            self.got, expected
        )
    }
}

impl std::error::Error for UnexpectedStatusError {}

/// XML shape of a service error body.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "Error", default)]
pub(crate) struct XmlServiceError {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "AuthenticationErrorDetail")]
    pub authentication_error_detail: String,
    #[serde(rename = "QueryParameterName")]
    pub query_parameter_name: String,
    #[serde(rename = "QueryParameterValue")]
    pub query_parameter_value: String,
    #[serde(rename = "Reason")]
    pub reason: String,
}

/// OData shape of a service error body: `{"odata.error": {"code": .., "message": {"lang": .., "value": ..}}}`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ODataErrorWrapper {
    #[serde(rename = "odata.error")]
    pub error: ODataError,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ODataError {
    pub code: String,
    pub message: ODataErrorMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ODataErrorMessage {
    pub lang: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unexpected_status_display() {
        let err = UnexpectedStatusError::new(
            &[StatusCode::CREATED, StatusCode::NO_CONTENT],
            StatusCode::OK,
        );
        assert_eq!(
            err.to_string(),
            "storage: status code from service response is 200 OK; was expecting 201 Created or 204 No Content"
        );
        assert_eq!(err.got(), StatusCode::OK);
    }

    #[test]
    fn test_error_status() {
        let err: Error = ServiceError::new(StatusCode::CONFLICT, DebugHeaders::default()).into();
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert!(err.as_service_error().is_some());
        assert!(!err.is_transport());

        let err: Error = reqsend_core::Error::transport("reset").into();
        assert_eq!(err.status(), None);
        assert!(err.is_transport());
    }
}
