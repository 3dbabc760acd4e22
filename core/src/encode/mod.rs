//! Body encoders: structured input in, payload bytes plus describing
//! headers out.
//!
//! All encoders are pure. The builder's `send_form`, `send_json` and
//! `send_multipart` merge [`EncodedBody::headers`] into the request and
//! then send [`EncodedBody::bytes`].

mod form;
mod json;
pub mod mime;
pub mod multipart;

use bytes::Bytes;

use crate::http::HeaderValue;

pub use form::encode_url_form;
pub use json::encode_json;
pub use multipart::{encode_multipart, TransferEncoding, DEFAULT_FILE_FIELD_FORMAT};

/// An encoded request body and its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: String,
    pub bytes: Bytes,
}

impl EncodedBody {
    pub(crate) fn new(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn content_length(&self) -> usize {
        self.bytes.len()
    }

    /// `Content-Type` and `Content-Length`, ready to merge into a builder.
    pub fn headers(&self) -> Vec<(String, HeaderValue)> {
        vec![
            (
                "Content-Type".to_string(),
                HeaderValue::Text(self.content_type.clone()),
            ),
            (
                "Content-Length".to_string(),
                HeaderValue::from(self.content_length()),
            ),
        ]
    }
}
