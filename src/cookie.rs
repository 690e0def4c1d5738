//! Response cookies with secure defaults.
//!
//! [`Cookie::new`] produces a cookie that is `Secure`, `HttpOnly` and
//! `SameSite=Lax` without the caller asking for any of it. The only way to
//! send a cookie over plaintext is the separate [`Cookie::insecure`]
//! constructor; flipping flags on a default cookie is undone at flush time by
//! the writer, which re-forces `Secure` outside dev mode.
use crate::mode;

/// The `SameSite` attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// A response cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    secure: bool,
    http_only: bool,
    same_site: SameSite,
    path: Option<String>,
    domain: Option<String>,
    max_age: Option<i64>,
    /// Constructed through [`Cookie::insecure`]; exempts the cookie from the
    /// writer's forced-`Secure` pass.
    opt_out: bool,
}

impl Cookie {
    /// Create a cookie with secure defaults.
    ///
    /// `Secure` is set unless the process runs in [dev mode](crate::mode),
    /// `HttpOnly` is set, and `SameSite` is `Lax`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_mode(name, value, mode::is_dev_mode())
    }

    pub(crate) fn with_mode(name: impl Into<String>, value: impl Into<String>, dev: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secure: !dev,
            http_only: true,
            same_site: SameSite::Lax,
            path: None,
            domain: None,
            max_age: None,
            opt_out: false,
        }
    }

    /// Create a cookie that may travel over plaintext.
    ///
    /// This is the explicit opt-out from the `Secure` default; the writer
    /// will not force `Secure` back on. `HttpOnly` and `SameSite=Lax` still
    /// apply.
    pub fn insecure(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            secure: false,
            opt_out: true,
            ..Self::with_mode(name, value, false)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Set the `SameSite` attribute.
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set the `Path` attribute.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the `Domain` attribute.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the `Max-Age` attribute in seconds. Zero or negative values expire
    /// the cookie immediately.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Clear the `HttpOnly` attribute, for cookies that scripts must read.
    pub fn script_readable(mut self) -> Self {
        self.http_only = false;
        self
    }

    /// Serialize to a `Set-Cookie` header value.
    ///
    /// With `enforce_secure`, the `Secure` attribute is emitted regardless of
    /// the current flag unless the cookie was constructed through
    /// [`Cookie::insecure`].
    pub(crate) fn serialize(&self, enforce_secure: bool) -> String {
        let mut out = String::new();
        out.push_str(&sanitize_name(&self.name));
        out.push('=');
        sanitize_value_into(&self.value, &mut out);
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(max_age) = self.max_age {
            let mut buf = itoa::Buffer::new();
            out.push_str("; Max-Age=");
            out.push_str(buf.format(max_age.max(0)));
        }
        if self.secure || (enforce_secure && !self.opt_out) {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out.push_str("; SameSite=");
        out.push_str(self.same_site.as_str());
        out
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\n' | '\r' | ';' | '=' | ',' | ' ' => '-',
            c => c,
        })
        .collect()
}

/// RFC 6265 cookie-octet; anything else is dropped.
fn sanitize_value_into(value: &str, out: &mut String) {
    out.extend(
        value
            .bytes()
            .filter(|&b| matches!(b, 0x21..=0x7e) && !matches!(b, b'"' | b';' | b'\\'))
            .map(char::from),
    );
}
