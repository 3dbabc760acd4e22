//! Per-verb factory for request builders.
//!
//! # Design
//! `Client` carries only what every request it creates shares: the
//! transport table and default options. It holds no connection state;
//! each call returns an independent `RequestBuilder` with its method fixed.
//! The free functions (`get`, `post`, ...) use `Client::default()`; their
//! `*_with_options` twins start from the given options instead.

use crate::builder::RequestBuilder;
use crate::config::RequestOptions;
use crate::error::Error;
use crate::http::Method;
use crate::transport::Transports;

/// Factory for `RequestBuilder`s sharing transports and default options.
#[derive(Debug, Clone, Default)]
pub struct Client {
    transports: Transports,
    options: RequestOptions,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transports(mut self, transports: Transports) -> Self {
        self.transports = transports;
        self
    }

    /// Options copied into every builder this client creates.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a request for an arbitrary verb. Unsupported verbs fail with
    /// `InvalidMethod`.
    pub fn request(&self, method: &str, url: &str) -> Result<RequestBuilder, Error> {
        self.build(method.parse()?, url)
    }

    pub fn build(&self, method: Method, url: &str) -> Result<RequestBuilder, Error> {
        Ok(RequestBuilder::new(method, url, self.options.clone())?
            .with_transports(self.transports.clone()))
    }

    pub fn get(&self, url: &str) -> Result<RequestBuilder, Error> {
        self.build(Method::Get, url)
    }

    pub fn post(&self, url: &str) -> Result<RequestBuilder, Error> {
        self.build(Method::Post, url)
    }

    pub fn put(&self, url: &str) -> Result<RequestBuilder, Error> {
        self.build(Method::Put, url)
    }

    pub fn patch(&self, url: &str) -> Result<RequestBuilder, Error> {
        self.build(Method::Patch, url)
    }

    pub fn delete(&self, url: &str) -> Result<RequestBuilder, Error> {
        self.build(Method::Delete, url)
    }

    pub fn head(&self, url: &str) -> Result<RequestBuilder, Error> {
        self.build(Method::Head, url)
    }

    pub fn options(&self, url: &str) -> Result<RequestBuilder, Error> {
        self.build(Method::Options, url)
    }
}

pub fn request(method: &str, url: &str) -> Result<RequestBuilder, Error> {
    Client::default().request(method, url)
}

/// Like [`request`], with explicit options.
pub fn request_with_options(
    method: &str,
    url: &str,
    options: RequestOptions,
) -> Result<RequestBuilder, Error> {
    Client::default().with_options(options).request(method, url)
}

pub fn get(url: &str) -> Result<RequestBuilder, Error> {
    Client::default().get(url)
}

pub fn post(url: &str) -> Result<RequestBuilder, Error> {
    Client::default().post(url)
}

pub fn put(url: &str) -> Result<RequestBuilder, Error> {
    Client::default().put(url)
}

pub fn patch(url: &str) -> Result<RequestBuilder, Error> {
    Client::default().patch(url)
}

pub fn delete(url: &str) -> Result<RequestBuilder, Error> {
    Client::default().delete(url)
}

pub fn head(url: &str) -> Result<RequestBuilder, Error> {
    Client::default().head(url)
}

pub fn options(url: &str) -> Result<RequestBuilder, Error> {
    Client::default().options(url)
}

pub fn get_with_options(url: &str, options: RequestOptions) -> Result<RequestBuilder, Error> {
    Client::default().with_options(options).get(url)
}

pub fn post_with_options(url: &str, options: RequestOptions) -> Result<RequestBuilder, Error> {
    Client::default().with_options(options).post(url)
}

pub fn put_with_options(url: &str, options: RequestOptions) -> Result<RequestBuilder, Error> {
    Client::default().with_options(options).put(url)
}

pub fn patch_with_options(url: &str, options: RequestOptions) -> Result<RequestBuilder, Error> {
    Client::default().with_options(options).patch(url)
}

pub fn delete_with_options(url: &str, options: RequestOptions) -> Result<RequestBuilder, Error> {
    Client::default().with_options(options).delete(url)
}

pub fn head_with_options(url: &str, options: RequestOptions) -> Result<RequestBuilder, Error> {
    Client::default().with_options(options).head(url)
}

pub fn options_with_options(url: &str, options: RequestOptions) -> Result<RequestBuilder, Error> {
    Client::default().with_options(options).options(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::State;

    fn client() -> Client {
        Client::new()
    }

    #[test]
    fn each_verb_fixes_its_method() {
        let c = client();
        let url = "http://localhost:3000/items";
        assert_eq!(c.get(url).unwrap().method(), Method::Get);
        assert_eq!(c.post(url).unwrap().method(), Method::Post);
        assert_eq!(c.put(url).unwrap().method(), Method::Put);
        assert_eq!(c.patch(url).unwrap().method(), Method::Patch);
        assert_eq!(c.delete(url).unwrap().method(), Method::Delete);
        assert_eq!(c.head(url).unwrap().method(), Method::Head);
        assert_eq!(c.options(url).unwrap().method(), Method::Options);
    }

    #[test]
    fn unsupported_verb_is_invalid_method() {
        for verb in ["TRACE", "CONNECT", "FETCH", "get"] {
            let err = client().request(verb, "http://localhost/").unwrap_err();
            assert!(matches!(err, Error::InvalidMethod(_)), "{verb}");
            assert_eq!(err.code(), "invalid_method");
        }
    }

    #[test]
    fn every_supported_verb_is_accepted() {
        for method in Method::ALL {
            let req = client().request(method.as_str(), "http://localhost/").unwrap();
            assert_eq!(req.method(), method);
            assert_eq!(req.state(), State::Idle);
        }
    }

    #[test]
    fn malformed_url_is_rejected() {
        let err = get("not a url").unwrap_err();
        assert_eq!(err.code(), "invalid_url");
    }

    #[test]
    fn url_query_seeds_parameters() {
        let req = get("http://localhost/search?q=rust&page=2").unwrap();
        assert_eq!(req.query().get("q").map(String::as_str), Some("rust"));
        assert_eq!(req.query().get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn default_options_are_copied_into_builders() {
        let mut options = RequestOptions::default();
        options.custom.return_body_as_bytes = true;
        let req = request_with_options("GET", "http://localhost/", options).unwrap();
        assert!(req.options().custom.return_body_as_bytes);
    }

    #[test]
    fn per_verb_option_variants() {
        let mut options = RequestOptions::default();
        options.port = Some(8081);
        options.custom.emit_progress = true;
        let url = "http://localhost/items";
        let built = [
            put_with_options(url, options.clone()).unwrap(),
            post_with_options(url, options.clone()).unwrap(),
            patch_with_options(url, options.clone()).unwrap(),
            delete_with_options(url, options.clone()).unwrap(),
            get_with_options(url, options.clone()).unwrap(),
            head_with_options(url, options.clone()).unwrap(),
            options_with_options(url, options.clone()).unwrap(),
        ];
        for (req, method) in built.iter().zip(Method::ALL) {
            assert_eq!(req.method(), method);
            assert_eq!(req.options(), &options);
        }
    }
}
