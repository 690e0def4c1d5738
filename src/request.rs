//! Incoming HTTP request.
//!
//! [`IncomingRequest`] wraps one decoded request for exactly one handler
//! execution. The derived views — query form, body form, cookie list — are
//! parsed on first access and memoized for the life of the request.
use std::cell::OnceCell;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Uri, header};

use crate::form::{Form, FormError};

/// One in-flight request, exclusively owned by its handler execution.
#[derive(Debug)]
pub struct IncomingRequest {
    parts: http::request::Parts,
    body: Bytes,
    query: OnceCell<Result<Form, FormError>>,
    post: OnceCell<Result<Form, FormError>>,
    cookies: OnceCell<Vec<(String, String)>>,
}

impl IncomingRequest {
    pub(crate) fn new(req: Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            parts,
            body,
            query: OnceCell::new(),
            post: OnceCell::new(),
            cookies: OnceCell::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// The request's host: the URI authority when the request came in
    /// absolute-form, the `Host` header otherwise. Ports are stripped.
    pub fn host(&self) -> Option<&str> {
        if let Some(host) = self.parts.uri.host() {
            return Some(host);
        }
        let header = self.parts.headers.get(header::HOST)?.to_str().ok()?;
        Some(strip_port(header))
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// A header value as a string, when present and valid UTF-8.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.parts.headers.get(name)?.to_str().ok()
    }

    /// The decoded query string.
    ///
    /// Parsed once per request; repeated calls reuse the cached form. A
    /// malformed encoding is reported as an error on every access, never as
    /// a panic — query strings are hostile input.
    pub fn query(&self) -> Result<&Form, FormError> {
        self.query
            .get_or_init(|| Form::parse(self.parts.uri.query().unwrap_or("")))
            .as_ref()
            .map_err(|&err| err)
    }

    /// The decoded `application/x-www-form-urlencoded` body.
    ///
    /// Fails with [`FormError::ContentType`] when the request does not
    /// declare a urlencoded body. Parsed once per request.
    pub fn post_form(&self) -> Result<&Form, FormError> {
        self.post
            .get_or_init(|| {
                if !is_form_content_type(&self.parts.headers) {
                    return Err(FormError::ContentType);
                }
                let raw = std::str::from_utf8(&self.body)
                    .map_err(|_| FormError::MalformedEncoding)?;
                Form::parse(raw)
            })
            .as_ref()
            .map_err(|&err| err)
    }

    /// Deserialize the urlencoded body into `T`.
    #[cfg(feature = "form")]
    pub fn body_form<T: serde::de::DeserializeOwned>(&self) -> Result<T, BodyFormError> {
        if !is_form_content_type(&self.parts.headers) {
            return Err(BodyFormError::ContentType);
        }
        serde_urlencoded::from_bytes(&self.body).map_err(BodyFormError::Serde)
    }

    /// The value of the request cookie `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let cookies = self.cookies.get_or_init(|| {
            let mut pairs = Vec::new();
            for value in self.parts.headers.get_all(header::COOKIE) {
                let Ok(value) = value.to_str() else { continue };
                for pair in value.split(';') {
                    if let Some((name, value)) = pair.trim().split_once('=') {
                        pairs.push((name.to_owned(), value.to_owned()));
                    }
                }
            }
            pairs
        });
        cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Per-request extensions, for passing values from interceptors to the
    /// handler.
    pub fn extensions(&self) -> &http::Extensions {
        &self.parts.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.parts.extensions
    }
}

fn is_form_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .is_some_and(|m| m.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
}

fn strip_port(host: &str) -> &str {
    match host.rfind(':') {
        Some(i) if !host[i..].contains(']') => &host[..i],
        _ => host,
    }
}

// ===== Error =====

/// Failure to deserialize a request body form.
#[cfg(feature = "form")]
#[derive(Debug)]
pub enum BodyFormError {
    /// The request does not declare a urlencoded body.
    ContentType,
    /// The body did not deserialize into the target type.
    Serde(serde_urlencoded::de::Error),
}

#[cfg(feature = "form")]
impl From<serde_urlencoded::de::Error> for BodyFormError {
    fn from(err: serde_urlencoded::de::Error) -> Self {
        Self::Serde(err)
    }
}

#[cfg(feature = "form")]
impl std::error::Error for BodyFormError {}

#[cfg(feature = "form")]
impl std::fmt::Display for BodyFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyFormError::ContentType => f.write_str("invalid media type"),
            BodyFormError::Serde(error) => error.fmt(f),
        }
    }
}
