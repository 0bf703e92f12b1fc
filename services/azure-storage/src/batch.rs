//! Table batch responses.
//!
//! A batch response nests an embedded HTTP response two multipart levels deep:
//!
//! ```text
//! --batchresponse_...
//! Content-Type: multipart/mixed; boundary=changesetresponse_...
//!
//! --changesetresponse_...
//! Content-Type: application/http
//! Content-Transfer-Encoding: binary
//!
//! HTTP/1.1 204 No Content
//! ...
//! --changesetresponse_...--
//! --batchresponse_...--
//! ```
//!
//! Only the first part of each level is read.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderMap, Method, Response, StatusCode};
use log::debug;
use reqsend_core::Error;

use crate::classify::{classify, debug_headers, is_failure};
use crate::decode::{service_error_from_json, service_error_from_status};
use crate::error::DebugHeaders;
use crate::multipart::{boundary_of, first_part, to_header_map, Part};
use crate::Result;

const MAX_EMBEDDED_HEADERS: usize = 64;

/// The decoded framing of a batch response.
#[derive(Debug, Clone)]
pub struct BatchEnvelope {
    /// Boundary of the outer batch body.
    pub batch_boundary: String,
    /// Boundary of the changeset inside the batch part.
    pub changeset_boundary: String,
    /// Status of the embedded response.
    pub status: StatusCode,
    /// Headers of the embedded response.
    pub headers: HeaderMap,
    /// Body of the embedded response.
    pub body: Bytes,
}

/// Result of a batch call that the service did not report as failed.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Status of the outer response.
    pub status: StatusCode,
    /// Headers of the outer response.
    pub headers: HeaderMap,
    /// The embedded response.
    pub envelope: BatchEnvelope,
}

#[derive(Debug)]
enum BatchState {
    AwaitOuterBoundary {
        content_type: String,
        body: Bytes,
    },
    AwaitInnerBoundary {
        batch_boundary: String,
        part: Part,
    },
    AwaitEmbeddedResponse {
        batch_boundary: String,
        changeset_boundary: String,
        part: Part,
    },
    Done(BatchEnvelope),
}

impl BatchState {
    fn name(&self) -> &'static str {
        match self {
            BatchState::AwaitOuterBoundary { .. } => "await_outer_boundary",
            BatchState::AwaitInnerBoundary { .. } => "await_inner_boundary",
            BatchState::AwaitEmbeddedResponse { .. } => "await_embedded_response",
            BatchState::Done(_) => "done",
        }
    }

    fn next(self, method: &Method) -> reqsend_core::Result<BatchState> {
        match self {
            BatchState::AwaitOuterBoundary { content_type, body } => {
                let batch_boundary = boundary_of(&content_type)?;
                let part = first_part(&body, &batch_boundary)?;
                Ok(BatchState::AwaitInnerBoundary {
                    batch_boundary,
                    part,
                })
            }
            BatchState::AwaitInnerBoundary {
                batch_boundary,
                part,
            } => {
                let content_type = part
                    .headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                let changeset_boundary = boundary_of(content_type)?;
                let part = first_part(&part.body, &changeset_boundary)?;
                Ok(BatchState::AwaitEmbeddedResponse {
                    batch_boundary,
                    changeset_boundary,
                    part,
                })
            }
            BatchState::AwaitEmbeddedResponse {
                batch_boundary,
                changeset_boundary,
                part,
            } => {
                let (status, headers, body) = parse_embedded_response(method, &part.body)?;
                Ok(BatchState::Done(BatchEnvelope {
                    batch_boundary,
                    changeset_boundary,
                    status,
                    headers,
                    body,
                }))
            }
            BatchState::Done(envelope) => Ok(BatchState::Done(envelope)),
        }
    }
}

/// Decode the response of a batch request sent with `method`.
///
/// A failed outer response is classified like any other response. Any embedded
/// status other than 204 replaces the outer one, and a failed embedded response
/// becomes the returned service error. Framing that can't be read is a
/// transport error.
pub fn parse_batch_response(method: &Method, resp: Response<Bytes>) -> Result<BatchOutcome> {
    let resp = classify(resp)?;

    let content_type = resp
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut state = BatchState::AwaitOuterBoundary {
        content_type,
        body: resp.body.clone(),
    };
    let envelope = loop {
        debug!("batch response state: {}", state.name());
        state = match state.next(method)? {
            BatchState::Done(envelope) => break envelope,
            next => next,
        };
    };
    debug!(
        "batch response state: done, embedded status {}",
        envelope.status
    );

    if envelope.status == StatusCode::NO_CONTENT {
        return Ok(BatchOutcome {
            status: resp.status,
            headers: resp.headers,
            envelope,
        });
    }

    if is_failure(envelope.status) {
        let debug = embedded_debug_headers(&envelope.headers, &resp.headers);
        let err = if envelope.body.is_empty() {
            service_error_from_status(envelope.status, debug)
        } else {
            service_error_from_json(&envelope.body, envelope.status, debug)
        };
        return Err(err.into());
    }

    Ok(BatchOutcome {
        status: envelope.status,
        headers: resp.headers,
        envelope,
    })
}

/// Correlation headers of the embedded response, falling back to the outer ones.
fn embedded_debug_headers(inner: &HeaderMap, outer: &HeaderMap) -> DebugHeaders {
    let inner = debug_headers(inner);
    let outer = debug_headers(outer);
    let pick = |a: String, b: String| if a.is_empty() { b } else { a };

    DebugHeaders {
        request_id: pick(inner.request_id, outer.request_id),
        date: pick(inner.date, outer.date),
        api_version: pick(inner.api_version, outer.api_version),
    }
}

/// Parse a raw HTTP/1.1 response.
///
/// The body is empty for `HEAD` requests and for 1xx, 204 and 304 responses,
/// otherwise framed by chunked transfer encoding, `Content-Length`, or the end
/// of the part.
fn parse_embedded_response(
    method: &Method,
    raw: &Bytes,
) -> reqsend_core::Result<(StatusCode, HeaderMap, Bytes)> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_EMBEDDED_HEADERS];
    let mut resp = httparse::Response::new(&mut raw_headers);

    let consumed = match resp.parse(raw) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => {
            return Err(Error::transport("embedded batch response is incomplete"))
        }
        Err(e) => {
            let err = Error::transport("failed to parse embedded batch response");
            return Err(err.with_source(e));
        }
    };

    let code = resp
        .code
        .ok_or_else(|| Error::transport("embedded batch response has no status"))?;
    let status = StatusCode::from_u16(code).map_err(|e| {
        let msg = format!("embedded batch response has invalid status {code}");
        Error::transport(msg).with_source(e)
    })?;
    let headers = to_header_map(resp.headers)?;
    let rest = raw.slice(consumed..);

    let body = if method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        Bytes::new()
    } else if is_chunked(&headers) {
        decode_chunked(&rest)?
    } else if let Some(len) = content_length(&headers)? {
        if rest.len() < len {
            return Err(Error::transport(format!(
                "embedded batch response body is shorter than its content length {len}"
            )));
        }
        rest.slice(..len)
    } else {
        rest
    };

    Ok((status, headers, body))
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| v.trim().eq_ignore_ascii_case("chunked"))
}

fn content_length(headers: &HeaderMap) -> reqsend_core::Result<Option<usize>> {
    let Some(v) = headers.get(CONTENT_LENGTH) else {
        return Ok(None);
    };

    v.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(Some)
        .ok_or_else(|| Error::transport("embedded batch response has invalid content length"))
}

fn decode_chunked(raw: &[u8]) -> reqsend_core::Result<Bytes> {
    let mut body = Vec::with_capacity(raw.len());
    let mut rest = raw;

    loop {
        let (line, after) = split_line(rest)
            .ok_or_else(|| Error::transport("chunked batch body ends without last chunk"))?;
        let size = std::str::from_utf8(line)
            .ok()
            .map(|v| v.split(';').next().unwrap_or_default().trim())
            .and_then(|v| usize::from_str_radix(v, 16).ok())
            .ok_or_else(|| Error::transport("chunked batch body has invalid chunk size"))?;

        // Trailers after the last chunk are ignored.
        if size == 0 {
            break;
        }
        if after.len() < size {
            return Err(Error::transport("chunked batch body is truncated"));
        }

        body.extend_from_slice(&after[..size]);
        rest = &after[size..];
        rest = rest
            .strip_prefix(b"\r\n")
            .or_else(|| rest.strip_prefix(b"\n"))
            .ok_or_else(|| Error::transport("chunked batch body has no chunk terminator"))?;
    }

    Ok(Bytes::from(body))
}

/// Split off one line, accepting CRLF and LF endings.
fn split_line(v: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = v.iter().position(|b| *b == b'\n')?;
    let line = &v[..idx];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, &v[idx + 1..]))
}
