//! Response writing.
//!
//! A [`ResponseWriter`] buffers one response and walks a one-way state
//! machine: `Open` while headers and cookies may still change, committed by
//! the first [`write`]/[`write_status`], closed at flush. Nothing reaches
//! the wire until the dispatcher flushes, which is what gives Commit-phase
//! interceptors their last word on headers.
//!
//! The body accepts only [`SafeOutput`] values; there is no method taking a
//! raw string or bytes.
//!
//! [`write`]: ResponseWriter::write
//! [`write_status`]: ResponseWriter::write_status
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode, header};

use crate::{
    cookie::Cookie,
    mode,
    safe::{OutputContext, SafeOutput},
};

/// Per-request response builder with enforced secure defaults.
#[derive(Debug)]
pub struct ResponseWriter {
    state: State,
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    body: Vec<u8>,
    dev: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    HeadersCommitted,
    BodyStarted,
    Closed,
}

impl ResponseWriter {
    pub(crate) fn new() -> Self {
        Self::with_mode(mode::is_dev_mode())
    }

    pub(crate) fn with_mode(dev: bool) -> Self {
        Self {
            state: State::Open,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Vec::new(),
            dev,
        }
    }

    /// Set a response header.
    ///
    /// Fails once the response has been committed; the queued headers are
    /// left untouched by a failed call.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), WriteError> {
        self.check_open()?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Queue a cookie for the response.
    ///
    /// At flush, every queued cookie is serialized with `Secure` forced on
    /// unless it came from [`Cookie::insecure`] or the process runs in dev
    /// mode. Fails once the response has been committed.
    pub fn add_cookie(&mut self, cookie: Cookie) -> Result<(), WriteError> {
        self.check_open()?;
        self.cookies.push(cookie);
        Ok(())
    }

    /// Write the response body, committing the response.
    ///
    /// Sets a `Content-Type` matching the payload's context when none was
    /// set. The returned [`Outcome`] is the handler's receipt that the
    /// response has been decided.
    ///
    /// # Panics
    ///
    /// Panics when the body has already been written; a handler producing
    /// two bodies is a bug, and the dispatcher converts the panic into a
    /// 500 for this request alone.
    pub fn write(&mut self, output: SafeOutput) -> Outcome {
        match self.state {
            State::Open | State::HeadersCommitted => {}
            State::BodyStarted => panic!("response body has already been written"),
            State::Closed => panic!("response writer is closed"),
        }
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            let content_type = match output.context() {
                OutputContext::Html => "text/html; charset=utf-8",
                OutputContext::JsString => "application/javascript; charset=utf-8",
                OutputContext::UrlParam => "text/plain; charset=utf-8",
            };
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        self.state = State::BodyStarted;
        self.body.extend_from_slice(output.as_str().as_bytes());
        Outcome { status: self.status }
    }

    /// Commit the response with `status` and no body.
    ///
    /// # Panics
    ///
    /// Panics when the response has already been committed.
    pub fn write_status(&mut self, status: StatusCode) -> Outcome {
        match self.state {
            State::Open => {}
            _ => panic!("response headers have already been committed"),
        }
        self.status = status;
        self.state = State::HeadersCommitted;
        Outcome { status }
    }

    /// Commit a `204 No Content` response.
    pub fn no_content(&mut self) -> Outcome {
        self.write_status(StatusCode::NO_CONTENT)
    }

    /// Commit an error response carrying only the status's canonical reason
    /// phrase, never internal detail.
    ///
    /// # Panics
    ///
    /// Panics when the response has already been committed.
    pub fn write_error(&mut self, status: StatusCode) -> Outcome {
        match self.state {
            State::Open => {}
            _ => panic!("response headers have already been committed"),
        }
        self.status = status;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.state = State::BodyStarted;
        self.body
            .extend_from_slice(status.canonical_reason().unwrap_or("").as_bytes());
        Outcome { status }
    }

    /// Commit a redirect to `location`.
    ///
    /// # Panics
    ///
    /// Panics when `status` is not a redirection code or the response has
    /// already been committed.
    pub fn redirect(&mut self, location: &str, status: StatusCode) -> Outcome {
        assert!(status.is_redirection(), "redirect status must be 3xx");
        match HeaderValue::from_str(location) {
            Ok(value) => {
                self.headers.insert(header::LOCATION, value);
                self.write_status(status)
            }
            Err(_) => self.write_error(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// The status the response will carry.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Close the writer. Idempotent; flushing closes implicitly.
    pub fn close(&mut self) {
        self.state = State::Closed;
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Flush into the final response: serialize queued cookies (with the
    /// forced-`Secure` pass) and hand over status, headers and body.
    pub(crate) fn into_response(mut self) -> Response<Bytes> {
        for cookie in &self.cookies {
            match HeaderValue::from_str(&cookie.serialize(!self.dev)) {
                Ok(value) => {
                    self.headers.append(header::SET_COOKIE, value);
                }
                Err(_err) => {
                    #[cfg(feature = "log")]
                    log::error!("dropping unserializable cookie {:?}: {_err}", cookie.name());
                }
            }
        }
        let mut response = Response::new(Bytes::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    fn check_open(&self) -> Result<(), WriteError> {
        match self.state {
            State::Open => Ok(()),
            _ => Err(WriteError::AlreadyCommitted),
        }
    }
}

// ===== Outcome =====

/// Receipt that a response has been fully decided.
///
/// Produced only by [`ResponseWriter`] methods, so a handler cannot return
/// without actually driving the writer to completion.
#[derive(Debug)]
#[must_use]
pub struct Outcome {
    status: StatusCode,
}

impl Outcome {
    /// The status the response was committed with.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

// ===== CommitWriter =====

/// The header-and-cookie view handed to Commit-phase interceptors.
///
/// Commit hooks run after the handler has committed the response but before
/// it flushes, so this view mutates freely; the body is not reachable
/// through it by construction.
#[derive(Debug)]
pub struct CommitWriter<'a> {
    inner: &'a mut ResponseWriter,
}

impl<'a> CommitWriter<'a> {
    pub(crate) fn new(inner: &'a mut ResponseWriter) -> Self {
        Self { inner }
    }

    /// Set a response header.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.headers.insert(name, value);
    }

    /// Queue a cookie for the response.
    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.inner.cookies.push(cookie);
    }

    /// The headers queued so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// The status the response was committed with.
    pub fn status(&self) -> StatusCode {
        self.inner.status
    }

    /// A receipt for the committed response, for short-circuiting the
    /// remaining Commit hooks.
    pub fn outcome(&self) -> Outcome {
        Outcome { status: self.inner.status }
    }
}

// ===== Error =====

/// Rejected writer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// Headers and cookies can no longer change; the response was committed.
    AlreadyCommitted,
}

impl std::error::Error for WriteError {}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::AlreadyCommitted => f.write_str("response has already been committed"),
        }
    }
}
