//! Fluent HTTP request builder.
//!
//! # Overview
//! A `RequestBuilder` accumulates method, URL, headers, query parameters
//! and options, then issues exactly one outbound request through a
//! pluggable transport. The response is available both as an aggregated
//! completion value (`perform()`, or simply `.await` on the builder) and as
//! a stream of raw chunks (`as_stream()`), fed from the same arrivals.
//!
//! # Design
//! - The lifecycle is an explicit state machine; `start()` is the only
//!   place a transport handle is opened, and it is idempotent.
//! - Body encoders (`encode`) are pure functions producing bytes plus the
//!   `Content-Type` / `Content-Length` headers that describe them.
//! - Transports sit behind the `Transport` trait. The default drives a
//!   blocking `ureq` agent from tokio's blocking pool, with redirects off.
//! - Events (`data`, `progress`, `end`, `close`, `error`) are delivered over
//!   channels to any number of subscribers.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), fetchline_core::Error> {
//! let mut req = fetchline_core::post("http://localhost:3000/json")?;
//! req.add_bearer_auth("token")?.set_query_param("dry_run", "1")?;
//! let done = req.send_json(&serde_json::json!({ "title": "hello" })).await?;
//! println!("{} {:?}", done.response.status, done.body);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod events;
pub mod http;
pub mod transport;

pub use builder::{RequestBuilder, State};
pub use client::{
    delete, delete_with_options, get, get_with_options, head, head_with_options, options,
    options_with_options, patch, patch_with_options, post, post_with_options, put,
    put_with_options, request, request_with_options, Client,
};
pub use config::{CustomOptions, RequestOptions};
pub use encode::multipart::{parts, Parts};
pub use encode::{encode_json, encode_multipart, encode_url_form, EncodedBody, TransferEncoding};
pub use error::Error;
pub use events::{ChunkStream, EventReceiver, RequestEvent};
pub use http::{Completion, HeaderValue, Method, RequestHead, ResponseBody, ResponseMeta, Scheme};
pub use transport::{Connection, IncomingResponse, Transport, Transports, UreqTransport};
