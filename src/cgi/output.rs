// CGI response parsing (RFC 3875 section 6)

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, LOCATION};
use hyper::{Response, StatusCode};

use super::CgiError;
use crate::logger;

/// Script output split into status, headers and body
#[derive(Debug)]
pub struct CgiOutput {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

/// Parse raw script stdout
///
/// The header block ends at the first empty line (`\n` or `\r\n`). A
/// `Status` header sets the response status and is not forwarded; a
/// `Location` without `Status` means 302. The body is kept byte-for-byte.
pub fn parse_output(raw: Vec<u8>) -> Result<CgiOutput, CgiError> {
    let mut headers = Vec::new();
    let mut status = None;
    let mut pos = 0;

    loop {
        let Some(nl) = raw[pos..].iter().position(|&b| b == b'\n') else {
            return Err(CgiError::MalformedOutput(
                "missing blank line after headers".to_string(),
            ));
        };
        let line = &raw[pos..pos + nl];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        pos += nl + 1;

        if line.is_empty() {
            break;
        }

        let (name, value) = split_header(line)?;
        if name.eq_ignore_ascii_case(b"status") {
            status = Some(parse_status(value)?);
            continue;
        }

        let name = HeaderName::from_bytes(name).map_err(|_| {
            CgiError::MalformedOutput(format!(
                "invalid header name {:?}",
                String::from_utf8_lossy(name)
            ))
        })?;
        let value = HeaderValue::from_bytes(value).map_err(|_| {
            CgiError::MalformedOutput(format!("invalid value for header {name}"))
        })?;
        headers.push((name, value));
    }

    let status = status.unwrap_or_else(|| {
        if headers.iter().any(|(name, _)| *name == LOCATION) {
            StatusCode::FOUND
        } else {
            StatusCode::OK
        }
    });

    let body = Bytes::from(raw).slice(pos..);
    Ok(CgiOutput {
        status,
        headers,
        body,
    })
}

fn split_header(line: &[u8]) -> Result<(&[u8], &[u8]), CgiError> {
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        return Err(CgiError::MalformedOutput(format!(
            "header line without colon: {:?}",
            String::from_utf8_lossy(line)
        )));
    };
    let name = &line[..colon];
    let value = line[colon + 1..].trim_ascii();
    if name.is_empty() || name.iter().any(u8::is_ascii_whitespace) {
        return Err(CgiError::MalformedOutput(format!(
            "invalid header line: {:?}",
            String::from_utf8_lossy(line)
        )));
    }
    Ok((name, value))
}

/// `Status: 404 Not Found` -> 404
fn parse_status(value: &[u8]) -> Result<StatusCode, CgiError> {
    let code = value.split(|&b| b == b' ').next().unwrap_or_default();
    StatusCode::from_bytes(code).map_err(|_| {
        CgiError::MalformedOutput(format!(
            "invalid Status header {:?}",
            String::from_utf8_lossy(value)
        ))
    })
}

impl CgiOutput {
    /// Turn the script output into the HTTP response
    ///
    /// `Content-Length` always reflects the body actually produced. For
    /// HEAD requests the body is dropped but its length is still announced.
    pub fn into_response(self, is_head: bool) -> Response<Full<Bytes>> {
        let content_length = self.body.len();
        let mut builder = Response::builder().status(self.status);
        for (name, value) in self.headers {
            if name == CONTENT_LENGTH {
                continue;
            }
            builder = builder.header(name, value);
        }
        builder = builder.header(CONTENT_LENGTH, content_length);

        let body = if is_head { Bytes::new() } else { self.body };
        builder.body(Full::new(body)).unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build CGI response: {e}"));
            Response::new(Full::new(Bytes::new()))
        })
    }
}
