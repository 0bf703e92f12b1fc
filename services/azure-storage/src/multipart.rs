//! Minimal `multipart/mixed` reader for batch responses.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use reqsend_core::{Error, Result};

const MAX_PART_HEADERS: usize = 32;

/// One part of a multipart body.
#[derive(Debug, Clone)]
pub struct Part {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Read the `boundary` parameter of a multipart content type.
pub fn boundary_of(content_type: &str) -> Result<String> {
    let mime: mime::Mime = content_type.parse().map_err(|e| {
        Error::transport(format!("invalid multipart content type: {content_type}")).with_source(e)
    })?;

    if mime.type_() != mime::MULTIPART {
        return Err(Error::transport(format!(
            "expected multipart content, got {content_type}"
        )));
    }

    mime.get_param(mime::BOUNDARY)
        .map(|v| v.as_str().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::transport(format!("no boundary in content type: {content_type}")))
}

/// Read the first part delimited by `boundary`.
///
/// Lines may end with either CRLF or a bare LF.
pub fn first_part(body: &Bytes, boundary: &str) -> Result<Part> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let Some(start) = find_delimiter(body, delimiter, 0) else {
        return Err(Error::transport(format!(
            "multipart body has no part delimited by {boundary}"
        )));
    };

    let mut pos = start + delimiter.len();
    if body[pos..].starts_with(b"--") {
        return Err(Error::transport(format!(
            "multipart body delimited by {boundary} has no parts"
        )));
    }
    // Transport padding after the delimiter is ignored.
    while pos < body.len() && (body[pos] == b' ' || body[pos] == b'\t') {
        pos += 1;
    }
    pos += line_break_len(&body[pos..]).ok_or_else(|| {
        Error::transport(format!("malformed multipart delimiter line for {boundary}"))
    })?;

    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
    let (consumed, parsed) = match httparse::parse_headers(&body[pos..], &mut raw_headers) {
        Ok(httparse::Status::Complete(v)) => v,
        Ok(httparse::Status::Partial) => {
            return Err(Error::transport("multipart part headers are incomplete"))
        }
        Err(e) => {
            let err = Error::transport("failed to parse multipart part headers");
            return Err(err.with_source(e));
        }
    };
    let headers = to_header_map(parsed)?;
    pos += consumed;

    let Some(end) = find_delimiter(body, delimiter, pos) else {
        return Err(Error::transport(format!(
            "multipart part delimited by {boundary} is not terminated"
        )));
    };

    // The line break before the next delimiter belongs to the delimiter.
    let mut body_end = end;
    if body_end > pos && body[body_end - 1] == b'\n' {
        body_end -= 1;
        if body_end > pos && body[body_end - 1] == b'\r' {
            body_end -= 1;
        }
    }

    Ok(Part {
        headers,
        body: body.slice(pos..body_end.max(pos)),
    })
}

/// Find a delimiter that starts a line at or after `from`.
///
/// The delimiter must be followed by `--`, transport padding, a line break or
/// the end of the body, so body lines that merely start with it are skipped.
fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut offset = from;
    while offset <= body.len() {
        let idx = body[offset..]
            .windows(delimiter.len())
            .position(|w| w == delimiter)?
            + offset;
        let line_start = idx == 0 || body[idx - 1] == b'\n';
        if line_start && ends_delimiter(&body[idx + delimiter.len()..]) {
            return Some(idx);
        }
        offset = idx + 1;
    }
    None
}

fn ends_delimiter(rest: &[u8]) -> bool {
    match rest.first() {
        None | Some(b' ' | b'\t' | b'\r' | b'\n') => true,
        Some(b'-') => rest.starts_with(b"--"),
        Some(_) => false,
    }
}

fn line_break_len(v: &[u8]) -> Option<usize> {
    if v.starts_with(b"\r\n") {
        Some(2)
    } else if v.starts_with(b"\n") {
        Some(1)
    } else {
        None
    }
}

pub(crate) fn to_header_map(parsed: &[httparse::Header<'_>]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(parsed.len());
    for h in parsed {
        let name = HeaderName::from_bytes(h.name.as_bytes()).map_err(|e| {
            Error::transport(format!("invalid header name: {}", h.name)).with_source(e)
        })?;
        let value = HeaderValue::from_bytes(h.value).map_err(|e| {
            Error::transport(format!("invalid value for header {}", h.name)).with_source(e)
        })?;
        headers.append(name, value);
    }
    Ok(headers)
}
