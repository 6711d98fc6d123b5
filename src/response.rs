//! Buffered response state behind a [`Context`](crate::Context).
//!
//! Handlers write into a [`ResponseWriter`]; the router turns it into a hyper
//! response once the chain has finished. It keeps the header-then-body rules
//! of a streaming writer:
//!
//! - the status line is written at most once,
//! - headers set after the status is written are dropped,
//! - writing body bytes without a status writes `200 OK` first.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

pub(crate) const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

#[derive(Debug)]
pub(crate) struct ResponseWriter {
    status: StatusCode,
    wrote_header: bool,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCode::OK,
            wrote_header: false,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub(crate) fn header_written(&self) -> bool {
        self.wrote_header
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns `false` (and changes nothing) once the status is written.
    pub(crate) fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.wrote_header {
            return false;
        }
        self.headers.insert(name, value);
        true
    }

    /// Returns `false` if a status had already been written.
    pub(crate) fn write_header(&mut self, code: StatusCode) -> bool {
        if self.wrote_header {
            return false;
        }
        self.status = code;
        self.wrote_header = true;
        true
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        if !self.wrote_header {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
    }

    pub(crate) fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

/// A bodyless response with just a status (405, 204, …).
pub(crate) fn empty(code: StatusCode) -> http::Response<Full<Bytes>> {
    let mut res = http::Response::new(Full::new(Bytes::new()));
    *res.status_mut() = code;
    res
}

/// A `text/plain` response with the given status.
pub(crate) fn text(code: StatusCode, body: &'static str) -> http::Response<Full<Bytes>> {
    let mut res = http::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *res.status_mut() = code;
    res.headers_mut().insert(CONTENT_TYPE, TEXT_PLAIN);
    res
}
