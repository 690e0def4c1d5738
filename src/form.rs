//! Typed request form access.
//!
//! A [`Form`] is the decoded view of a query string or urlencoded body.
//! Decoding happens once; the typed accessors reuse the cached map. Each
//! accessor takes a default and falls back to it when the key is absent or
//! the value does not parse — a garbled optional flag degrades to its
//! default instead of failing the request. Only an undecodable *encoding*
//! is an error, reported through [`FormError`] at parse time.
//!
//! When a key repeats, the first occurrence wins; later occurrences stay
//! reachable through [`Form::values`].
use fnv::FnvHashMap;

/// Decoded form parameters.
#[derive(Debug, Clone, Default)]
pub struct Form {
    values: FnvHashMap<String, Vec<String>>,
}

impl Form {
    /// Decode a raw query string.
    ///
    /// Splits on `&`, splits each pair on the first `=`, percent-decodes
    /// both halves with `+` meaning space. An invalid or truncated percent
    /// escape, or a decode that is not UTF-8, fails the whole parse —
    /// malformed encodings are hostile traffic, not data.
    pub fn parse(raw: &str) -> Result<Self, FormError> {
        let mut values: FnvHashMap<String, Vec<String>> = FnvHashMap::default();
        for pair in raw.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = decode(name)?;
            let value = decode(value)?;
            values.entry(name).or_default().push(value);
        }
        Ok(Self { values })
    }

    /// The first value for `name`, or `default` when absent or not a
    /// boolean literal (`1/t/T/TRUE/true/True`, `0/f/F/FALSE/false/False`).
    pub fn bool(&self, name: &str, default: bool) -> bool {
        match self.first(name) {
            Some("1" | "t" | "T" | "TRUE" | "true" | "True") => true,
            Some("0" | "f" | "F" | "FALSE" | "false" | "False") => false,
            _ => default,
        }
    }

    /// The first value for `name` as an `i64`, or `default`.
    pub fn int(&self, name: &str, default: i64) -> i64 {
        self.parsed(name).unwrap_or(default)
    }

    /// The first value for `name` as a `u64`, or `default`.
    pub fn uint(&self, name: &str, default: u64) -> u64 {
        self.parsed(name).unwrap_or(default)
    }

    /// The first value for `name` as an `f64`, or `default`.
    pub fn float(&self, name: &str, default: f64) -> f64 {
        self.parsed(name).unwrap_or(default)
    }

    /// The first value for `name`, or `default` when absent.
    pub fn str<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.first(name).unwrap_or(default)
    }

    /// Every value submitted for `name`, in submission order.
    pub fn values(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether any value was submitted for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn first(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first().map(String::as_str)
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.first(name)?.parse().ok()
    }
}

fn decode(input: &str) -> Result<String, FormError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(hex);
                let lo = bytes.get(i + 2).copied().and_then(hex);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => return Err(FormError::MalformedEncoding),
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| FormError::MalformedEncoding)
}

fn hex(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

// ===== Error =====

/// Failure to decode a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormError {
    /// A percent escape was invalid or the decoded bytes were not UTF-8.
    MalformedEncoding,
    /// The request body does not carry a urlencoded form.
    ContentType,
}

impl std::error::Error for FormError {}

impl std::fmt::Display for FormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::MalformedEncoding => f.write_str("malformed form encoding"),
            FormError::ContentType => f.write_str("invalid media type"),
        }
    }
}
