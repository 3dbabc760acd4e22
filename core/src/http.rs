//! Plain-data HTTP types shared by the builder, the encoders and the
//! transport seam.
//!
//! # Design
//! Everything here is owned data (`String`, `Vec`, `Bytes`) so values move
//! freely between the builder, the transport's blocking task and the
//! caller. `RequestHead` is the frozen snapshot handed to a transport at
//! `start()`; `ResponseMeta` is what comes back before the body streams.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::Error;

/// HTTP method for a request. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Put,
    Post,
    Patch,
    Delete,
    Get,
    Head,
    Options,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Put,
        Method::Post,
        Method::Patch,
        Method::Delete,
        Method::Get,
        Method::Head,
        Method::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Only PUT, POST and PATCH may carry a request body.
    pub fn allows_body(&self) -> bool {
        matches!(self, Method::Put | Method::Post | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Verbs are matched exactly; `get` is not `GET`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::InvalidMethod(s.to_string()))
    }
}

/// URL scheme accepted by `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn parse(scheme: &str) -> Result<Self, Error> {
        match scheme {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(Error::InvalidProtocol(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// A request header value. Numbers and lists are rendered at transmission;
/// a list becomes one header line per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Text(String),
    Number(u64),
    List(Vec<String>),
}

impl HeaderValue {
    /// Rendered values, one per header line.
    pub fn values(&self) -> Vec<String> {
        match self {
            HeaderValue::Text(s) => vec![s.clone()],
            HeaderValue::Number(n) => vec![n.to_string()],
            HeaderValue::List(items) => items.clone(),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Text(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Text(s)
    }
}

impl From<u64> for HeaderValue {
    fn from(n: u64) -> Self {
        HeaderValue::Number(n)
    }
}

impl From<usize> for HeaderValue {
    fn from(n: usize) -> Self {
        HeaderValue::Number(n as u64)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(items: Vec<String>) -> Self {
        HeaderValue::List(items)
    }
}

/// Snapshot of the request configuration taken at `start()`.
///
/// `path` already carries the serialized query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Absolute URI with an explicit port.
    pub fn uri(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.path
        )
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseMeta {
    /// Get the first header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }
}

/// Aggregated response body, shaped by `custom.return_body_as_bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Text(String),
    Bytes(Bytes),
}

impl ResponseBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResponseBody::Text(s) => s.as_bytes(),
            ResponseBody::Bytes(b) => b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(s) => Some(s),
            ResponseBody::Bytes(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolution value of `perform()`.
#[derive(Debug, Clone)]
pub struct Completion {
    pub body: ResponseBody,
    pub response: ResponseMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_method_parses() {
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
        }
    }

    #[test]
    fn unsupported_methods_are_rejected() {
        for verb in ["TRACE", "CONNECT", "get", "", "POSTS"] {
            let err = verb.parse::<Method>().unwrap_err();
            assert!(matches!(err, Error::InvalidMethod(_)), "{verb}");
        }
    }

    #[test]
    fn only_put_post_patch_allow_a_body() {
        let writable: Vec<Method> = Method::ALL.into_iter().filter(Method::allows_body).collect();
        assert_eq!(writable, vec![Method::Put, Method::Post, Method::Patch]);
    }

    #[test]
    fn scheme_default_ports() {
        assert_eq!(Scheme::parse("http").unwrap().default_port(), 80);
        assert_eq!(Scheme::parse("https").unwrap().default_port(), 443);
        assert!(matches!(Scheme::parse("ftp"), Err(Error::InvalidProtocol(_))));
    }

    #[test]
    fn response_meta_header_lookup_is_case_insensitive() {
        let meta = ResponseMeta {
            status: 200,
            headers: vec![("Content-Length".to_string(), "42".to_string())],
        };
        assert_eq!(meta.header("content-length"), Some("42"));
        assert_eq!(meta.content_length(), Some(42));
    }

    #[test]
    fn non_numeric_content_length_is_ignored() {
        let meta = ResponseMeta {
            status: 200,
            headers: vec![("content-length".to_string(), "lots".to_string())],
        };
        assert_eq!(meta.content_length(), None);
    }

    #[test]
    fn header_values_render_per_line() {
        assert_eq!(HeaderValue::from(12u64).values(), vec!["12"]);
        assert_eq!(
            HeaderValue::from(vec!["a".to_string(), "b".to_string()]).values(),
            vec!["a", "b"]
        );
    }
}
