//! Decoding of service error bodies.
//!
//! Decoding never fails: a body that can't be parsed still produces a
//! [`ServiceError`] whose message carries the parse failure and the raw body.

use http::StatusCode;
use log::warn;

use crate::constants::EMPTY_BODY_MESSAGE;
use crate::error::{DebugHeaders, ODataErrorWrapper, ServiceError, XmlServiceError};

/// Build the error for a failure response that carried no body, as HEAD responses do.
pub fn service_error_from_status(status: StatusCode, debug: DebugHeaders) -> ServiceError {
    let mut err = ServiceError::new(status, debug);
    err.code = status.to_string();
    err.message = EMPTY_BODY_MESSAGE.to_string();
    err
}

/// Decode an `application/xml` error body.
pub fn service_error_from_xml(
    body: &[u8],
    status: StatusCode,
    debug: DebugHeaders,
) -> ServiceError {
    let mut err = ServiceError::new(status, debug);
    let text = String::from_utf8_lossy(body);

    // The service prefixes some xml bodies with a byte order mark.
    match quick_xml::de::from_str::<XmlServiceError>(text.trim_start_matches('\u{feff}')) {
        Ok(v) => {
            err.code = v.code;
            err.message = v.message;
            err.authentication_error_detail = v.authentication_error_detail;
            err.query_parameter_name = v.query_parameter_name;
            err.query_parameter_value = v.query_parameter_value;
            err.reason = v.reason;
        }
        Err(e) => {
            warn!("failed to decode xml error body: {e}");
            err.message = unparsable_message(&e, &text);
        }
    }

    err
}

/// Decode an OData json error body.
pub fn service_error_from_json(
    body: &[u8],
    status: StatusCode,
    debug: DebugHeaders,
) -> ServiceError {
    let mut err = ServiceError::new(status, debug);

    match serde_json::from_slice::<ODataErrorWrapper>(body) {
        Ok(v) => {
            err.code = v.error.code;
            err.message = v.error.message.value;
            err.lang = v.error.message.lang;
        }
        Err(e) => {
            warn!("failed to decode odata error body: {e}");
            err.message = unparsable_message(&e, &String::from_utf8_lossy(body));
        }
    }

    err
}

fn unparsable_message(err: &dyn std::fmt::Display, body: &str) -> String {
    format!("Response body could not be unmarshaled: {err}. Body: {body}.")
}

impl ServiceError {
    /// Encode the structured fields into the xml shape the service uses.
    ///
    /// Status and correlation fields travel in the status line and headers, not in the body.
    /// Decoding trims leading and trailing whitespace from each field, so only
    /// values without it survive a round trip unchanged.
    pub fn to_xml(&self) -> reqsend_core::Result<String> {
        let v = XmlServiceError {
            code: self.code.clone(),
            message: self.message.clone(),
            authentication_error_detail: self.authentication_error_detail.clone(),
            query_parameter_name: self.query_parameter_name.clone(),
            query_parameter_value: self.query_parameter_value.clone(),
            reason: self.reason.clone(),
        };

        quick_xml::se::to_string(&v).map_err(|e| {
            reqsend_core::Error::unexpected("failed to encode service error as xml").with_source(e)
        })
    }
}
