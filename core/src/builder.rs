//! Chainable request builder and its lifecycle state machine.
//!
//! # Design
//! A builder moves through `Idle -> Started -> Active -> Settled`, or to
//! `Disposed` from any state. Configuration (headers, query, options) is
//! mutable while `Idle`. `start()` freezes it into a [`RequestHead`], opens
//! exactly one [`Connection`] and is a no-op when repeated. `perform()`
//! finishes the outgoing body, fans the response chunks out to event
//! subscribers, chunk streams and the aggregate, then settles once.
//!
//! Query parameters set after `start()` fail with `QueryFrozen` because the
//! path is already serialized. Header and option changes after `start()`
//! are kept but never reach the open request.

use std::fmt;
use std::future::IntoFuture;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use indexmap::IndexMap;
use serde::Serialize;
use url::Url;

use crate::config::RequestOptions;
use crate::encode::{self, multipart::Parts, EncodedBody};
use crate::error::Error;
use crate::events::{ChunkStream, Emitter, EventReceiver, RequestEvent};
use crate::http::{Completion, HeaderValue, Method, RequestHead, ResponseBody, Scheme};
use crate::transport::{Connection, IncomingResponse, Transports};

/// Lifecycle of a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Configuration is mutable; nothing has been sent.
    Idle,
    /// The transport handle is open and the path is final.
    Started,
    /// `perform()` is consuming the response.
    Active,
    /// The response was fully consumed or an error occurred.
    Settled,
    /// Released before settling.
    Disposed,
}

/// One logical HTTP call.
pub struct RequestBuilder {
    method: Method,
    url: Url,
    headers: IndexMap<String, HeaderValue>,
    query: IndexMap<String, String>,
    options: RequestOptions,
    transports: Transports,
    state: State,
    head: Option<RequestHead>,
    connection: Option<Box<dyn Connection>>,
    received: Vec<Bytes>,
    emitter: Emitter,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    /// Parse `url` and seed the query parameters from its query string.
    pub fn new(method: Method, url: &str, options: RequestOptions) -> Result<Self, Error> {
        let url = Url::parse(url)?;
        let query = url.query_pairs().into_owned().collect();
        Ok(Self {
            method,
            url,
            headers: IndexMap::new(),
            query,
            options,
            transports: Transports::default(),
            state: State::Idle,
            head: None,
            connection: None,
            received: Vec::new(),
            emitter: Emitter::default(),
        })
    }

    /// Replace the transport table. Only meaningful before `start()`.
    pub fn with_transports(mut self, transports: Transports) -> Self {
        self.transports = transports;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn headers(&self) -> &IndexMap<String, HeaderValue> {
        &self.headers
    }

    pub fn query(&self) -> &IndexMap<String, String> {
        &self.query
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// The frozen request as handed to the transport, once started.
    pub fn head(&self) -> Option<&RequestHead> {
        self.head.as_ref()
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    /// Set one header. Names match case-insensitively; the last write wins.
    pub fn set_header(&mut self, key: &str, value: impl Into<HeaderValue>) -> Result<&mut Self, Error> {
        let value = value.into();
        ureq::http::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::invalid_argument("key", format!("`{key}`: {e}")))?;
        for line in value.values() {
            ureq::http::HeaderValue::from_str(&line)
                .map_err(|e| Error::invalid_argument("value", format!("header `{key}`: {e}")))?;
        }
        if self.state != State::Idle {
            tracing::debug!(header = key, state = ?self.state, "header set after start; not sent");
        }
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        self.headers.insert(key.to_string(), value);
        Ok(self)
    }

    pub fn set_headers<K, V, I>(&mut self, headers: I) -> Result<&mut Self, Error>
    where
        K: AsRef<str>,
        V: Into<HeaderValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in headers {
            self.set_header(key.as_ref(), value)?;
        }
        Ok(self)
    }

    /// Set one option by dotted key, e.g. `port` or `custom.emit_progress`.
    pub fn set_option(&mut self, key: &str, value: serde_json::Value) -> Result<&mut Self, Error> {
        self.options.set(key, value)?;
        self.note_late_option();
        Ok(self)
    }

    /// Deep-merge a JSON object of options.
    pub fn set_options(&mut self, options: serde_json::Value) -> Result<&mut Self, Error> {
        self.options.merge(options)?;
        self.note_late_option();
        Ok(self)
    }

    pub fn return_body_as_bytes(&mut self, enabled: bool) -> &mut Self {
        self.options.custom.return_body_as_bytes = enabled;
        self
    }

    pub fn emit_progress(&mut self, enabled: bool) -> &mut Self {
        self.options.custom.emit_progress = enabled;
        self
    }

    fn note_late_option(&self) {
        if self.state != State::Idle {
            tracing::debug!(state = ?self.state, "option set after start");
        }
    }

    /// Add a query parameter. Fails with `QueryFrozen` once started.
    pub fn set_query_param(&mut self, key: &str, value: &str) -> Result<&mut Self, Error> {
        if self.state != State::Idle {
            return Err(Error::QueryFrozen);
        }
        self.query.insert(key.to_string(), value.to_string());
        Ok(self)
    }

    pub fn set_query_params<K, V, I>(&mut self, params: I) -> Result<&mut Self, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        if self.state != State::Idle {
            return Err(Error::QueryFrozen);
        }
        for (key, value) in params {
            self.query.insert(key.as_ref().to_string(), value.as_ref().to_string());
        }
        Ok(self)
    }

    /// `Authorization: Basic base64(username:password)`.
    pub fn add_basic_auth(&mut self, username: &str, password: &str) -> Result<&mut Self, Error> {
        let credentials = BASE64.encode(format!("{username}:{password}"));
        self.set_header("Authorization", format!("Basic {credentials}"))
    }

    /// `Authorization: Bearer <token>`.
    pub fn add_bearer_auth(&mut self, token: &str) -> Result<&mut Self, Error> {
        self.set_header("Authorization", format!("Bearer {token}"))
    }

    // ---------------------------------------------------------------------
    // Observation
    // ---------------------------------------------------------------------

    /// Receive every [`RequestEvent`] emitted from now on.
    pub fn subscribe(&mut self) -> EventReceiver {
        self.emitter.subscribe()
    }

    /// Read raw response chunks while `perform()` aggregates them.
    pub fn as_stream(&mut self) -> ChunkStream {
        self.emitter.stream()
    }

    // ---------------------------------------------------------------------
    // Transmission
    // ---------------------------------------------------------------------

    /// Open the transport handle. Repeated calls are no-ops.
    pub fn start(&mut self) -> Result<&mut Self, Error> {
        match self.state {
            State::Idle => {}
            State::Started | State::Active => return Ok(self),
            State::Settled | State::Disposed => return Err(Error::Settled),
        }

        let scheme = Scheme::parse(self.url.scheme())?;
        let host = match &self.options.host {
            Some(host) => host.clone(),
            None => self
                .url
                .host_str()
                .map(str::to_string)
                .ok_or_else(|| Error::invalid_argument("url", "missing host"))?,
        };
        let port = self
            .options
            .port
            .or(self.url.port())
            .unwrap_or(scheme.default_port());

        let head = RequestHead {
            method: self.method,
            scheme,
            host,
            port,
            path: self.finalized_path()?,
            headers: self
                .headers
                .iter()
                .flat_map(|(name, value)| value.values().into_iter().map(move |v| (name.clone(), v)))
                .collect(),
        };
        tracing::debug!(
            method = %head.method,
            scheme = head.scheme.as_str(),
            host = %head.host,
            port = head.port,
            path = %head.path,
            "starting request"
        );

        let connection = self.transports.select(scheme).open(head.clone())?;
        self.connection = Some(connection);
        self.head = Some(head);
        self.state = State::Started;
        Ok(self)
    }

    fn finalized_path(&self) -> Result<String, Error> {
        let path = self.url.path().to_string();
        if self.query.is_empty() {
            return Ok(path);
        }
        let query = serde_urlencoded::to_string(&self.query)
            .map_err(|e| Error::invalid_argument("query", e.to_string()))?;
        Ok(format!("{path}?{query}"))
    }

    /// Append a chunk to the outgoing body, starting the request if needed.
    pub fn write(&mut self, chunk: impl Into<Bytes>) -> Result<&mut Self, Error> {
        if !self.method.allows_body() {
            return Err(Error::WriteOnReadOnlyMethod(self.method));
        }
        self.start()?;
        let connection = self.connection.as_mut().ok_or(Error::Settled)?;
        connection.write(chunk.into())?;
        Ok(self)
    }

    /// Decode `text` per `encoding` (`utf8`, `base64`, `hex`) and write it.
    pub fn write_encoded(&mut self, text: &str, encoding: &str) -> Result<&mut Self, Error> {
        let bytes = decode_text(text, encoding)?;
        self.write(bytes)
    }

    /// Finish the body and consume the response.
    ///
    /// Resolves with the aggregated body once the response ends, or fails
    /// with the first transport or stream error. Either way the builder is
    /// settled afterwards and later calls fail with `Settled`.
    pub async fn perform(&mut self) -> Result<Completion, Error> {
        self.start()?;
        let connection = self.connection.take().ok_or(Error::Settled)?;
        self.state = State::Active;

        match self.receive(connection).await {
            Ok(completion) => {
                self.emitter.emit(RequestEvent::End);
                tracing::debug!(
                    status = completion.response.status,
                    bytes = completion.body.len(),
                    "request completed"
                );
                self.settle();
                self.emitter.emit(RequestEvent::Close);
                self.emitter.close();
                Ok(completion)
            }
            Err(err) => {
                tracing::warn!(error = %err, code = err.code(), "request failed");
                self.emitter.fail(&err);
                self.settle();
                self.emitter.close();
                Err(err)
            }
        }
    }

    async fn receive(&mut self, connection: Box<dyn Connection>) -> Result<Completion, Error> {
        let IncomingResponse { meta, mut body } = connection.finish().await?;
        let total = meta.content_length();
        let mut received: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            self.emitter.chunk(&chunk);
            received += chunk.len() as u64;
            self.received.push(chunk);

            if let (true, Some(total)) = (self.options.custom.emit_progress, total) {
                let fraction = if total == 0 {
                    1.0
                } else {
                    received as f64 / total as f64
                };
                self.emitter.emit(RequestEvent::Progress {
                    fraction,
                    received,
                    total,
                });
            }
        }

        let mut bytes = BytesMut::with_capacity(received as usize);
        for chunk in self.received.drain(..) {
            bytes.extend_from_slice(&chunk);
        }
        let bytes = bytes.freeze();
        let body = if self.options.custom.return_body_as_bytes {
            ResponseBody::Bytes(bytes)
        } else {
            ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
        };
        Ok(Completion {
            body,
            response: meta,
        })
    }

    /// `write(body)` then `perform()`.
    pub async fn send(&mut self, body: impl Into<Bytes>) -> Result<Completion, Error> {
        self.write(body)?;
        self.perform().await
    }

    pub async fn send_encoded(&mut self, text: &str, encoding: &str) -> Result<Completion, Error> {
        self.write_encoded(text, encoding)?;
        self.perform().await
    }

    /// Send `fields` as `application/x-www-form-urlencoded`.
    pub async fn send_form<T: Serialize + ?Sized>(&mut self, fields: &T) -> Result<Completion, Error> {
        let encoded = encode::encode_url_form(fields)?;
        self.send_encoded_body(encoded).await
    }

    /// Send `value` as `application/json`.
    pub async fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<Completion, Error> {
        let encoded = encode::encode_json(value)?;
        self.send_encoded_body(encoded).await
    }

    /// Send fields and files as `multipart/form-data`.
    pub async fn send_multipart(
        &mut self,
        fields: Option<&Parts>,
        files: Option<&Parts>,
        file_field_name_format: Option<&str>,
        transfer_encoding: Option<&str>,
    ) -> Result<Completion, Error> {
        let encoded =
            encode::encode_multipart(fields, files, file_field_name_format, transfer_encoding)?;
        self.send_encoded_body(encoded).await
    }

    async fn send_encoded_body(&mut self, encoded: EncodedBody) -> Result<Completion, Error> {
        self.set_headers(encoded.headers())?;
        self.send(encoded.bytes).await
    }

    /// Release the transport handle and drop all buffers and listeners.
    /// No events fire afterwards.
    ///
    /// A started request with a body (`PUT`, `POST`, `PATCH`) is aborted
    /// and the peer never receives a complete request. Read-only methods
    /// are already on the wire once `start()` returns, so for them this
    /// only discards the response.
    pub fn dispose(&mut self) {
        if self.state != State::Settled {
            self.state = State::Disposed;
        }
        self.connection = None;
        self.received.clear();
        self.emitter.close();
    }

    fn settle(&mut self) {
        self.state = State::Settled;
        self.connection = None;
        self.received.clear();
    }
}

impl IntoFuture for RequestBuilder {
    type Output = Result<Completion, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(mut self) -> Self::IntoFuture {
        async move { self.perform().await }.boxed()
    }
}

fn decode_text(text: &str, encoding: &str) -> Result<Vec<u8>, Error> {
    match encoding.to_ascii_lowercase().as_str() {
        "utf8" | "utf-8" => Ok(text.as_bytes().to_vec()),
        "base64" => BASE64
            .decode(text)
            .map_err(|e| Error::invalid_argument("chunk", e.to_string())),
        "hex" => hex::decode(text).map_err(|e| Error::invalid_argument("chunk", e.to_string())),
        other => Err(Error::invalid_argument(
            "encoding",
            format!("unsupported encoding `{other}`"),
        )),
    }
}
