//! `multipart/form-data` encoder.
//!
//! # Design
//! Fields are emitted first, then files, each in insertion order. A file's
//! form field name comes from a format string whose first `%i`, `%d` or
//! `%s` marker is replaced with the file's zero-based position, so several
//! files can share one logical field (`files[0]`, `files[1]`, ...).
//!
//! The boundary is 26 dashes followed by 6 random bytes in hex. Payload
//! content is not scanned for it; with 48 bits of entropy a collision is an
//! accepted residual risk.

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::{mime, EncodedBody};
use crate::error::Error;

pub const DEFAULT_FILE_FIELD_FORMAT: &str = "files[%i]";

const BOUNDARY_DASHES: usize = 26;
const BOUNDARY_RANDOM_BYTES: usize = 6;

/// Characters JavaScript's `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Ordered name to content mapping used for both fields and files.
pub type Parts = IndexMap<String, Bytes>;

/// Build [`Parts`] from any pairs, keeping their order.
pub fn parts<K, V, I>(pairs: I) -> Parts
where
    K: Into<String>,
    V: Into<Bytes>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// How part values are written into the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferEncoding {
    /// Raw bytes, no transfer-encoding headers.
    #[default]
    Utf8,
    /// Values re-encoded as base64 text.
    Base64,
}

impl FromStr for TransferEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "utf8" | "UTF8" | "utf-8" | "UTF-8" => Ok(TransferEncoding::Utf8),
            "base64" | "BASE64" => Ok(TransferEncoding::Base64),
            other => Err(Error::invalid_argument(
                "transfer_encoding",
                format!("unsupported transfer encoding `{other}`"),
            )),
        }
    }
}

/// Encode `fields` and `files` as `multipart/form-data`.
///
/// `file_field_name_format` defaults to `files[%i]`. `transfer_encoding`
/// must be one of `utf8`, `UTF8`, `utf-8`, `UTF-8`, `base64`, `BASE64`.
pub fn encode_multipart(
    fields: Option<&Parts>,
    files: Option<&Parts>,
    file_field_name_format: Option<&str>,
    transfer_encoding: Option<&str>,
) -> Result<EncodedBody, Error> {
    let encoding = transfer_encoding
        .map(TransferEncoding::from_str)
        .transpose()?
        .unwrap_or_default();
    let format = file_field_name_format.unwrap_or(DEFAULT_FILE_FIELD_FORMAT);
    let boundary = generate_boundary();

    let mut body = BytesMut::new();

    for (name, value) in fields.into_iter().flatten() {
        let mut head = part_preamble(&boundary, encoding);
        head.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
            escape(name)
        ));
        push_part(&mut body, &head, value, encoding);
    }

    for (index, (file_name, content)) in files.into_iter().flatten().enumerate() {
        let mut head = part_preamble(&boundary, encoding);
        head.push_str(&format!("Content-Type: {}\r\n", mime::for_file_name(file_name)));
        head.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
            escape(&file_field_name(format, index)),
            escape(file_name)
        ));
        push_part(&mut body, &head, content, encoding);
    }

    body.put_slice(format!("--{boundary}--").as_bytes());

    Ok(EncodedBody::new(
        format!("multipart/form-data; boundary={boundary}"),
        body.freeze(),
    ))
}

fn generate_boundary() -> String {
    let random: [u8; BOUNDARY_RANDOM_BYTES] = rand::random();
    format!("{}{}", "-".repeat(BOUNDARY_DASHES), hex::encode(random))
}

fn part_preamble(boundary: &str, encoding: TransferEncoding) -> String {
    let mut head = format!("--{boundary}\r\n");
    if encoding == TransferEncoding::Base64 {
        head.push_str("MIME-Version: 1.0\r\n");
        head.push_str("Content-Transfer-Encoding: base64\r\n");
    }
    head
}

fn push_part(body: &mut BytesMut, head: &str, value: &[u8], encoding: TransferEncoding) {
    body.put_slice(head.as_bytes());
    match encoding {
        TransferEncoding::Utf8 => body.put_slice(value),
        TransferEncoding::Base64 => body.put_slice(BASE64.encode(value).as_bytes()),
    }
    body.put_slice(b"\r\n");
}

fn escape(name: &str) -> String {
    utf8_percent_encode(name, COMPONENT).to_string()
}

/// Substitute `index` for the first `%i`, `%d` or `%s` in `format`.
///
/// A format without `%` is used verbatim for every file. A `%` with no
/// recognised marker gets the index appended after a space.
fn file_field_name(format: &str, index: usize) -> String {
    if !format.contains('%') {
        return format.to_string();
    }
    let marker = format
        .match_indices('%')
        .map(|(i, _)| i)
        .find(|&i| matches!(format.as_bytes().get(i + 1), Some(b'i' | b'd' | b's')));
    match marker {
        Some(i) => format!("{}{}{}", &format[..i], index, &format[i + 2..]),
        None => format!("{format} {index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary_of(body: &EncodedBody) -> String {
        body.content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string()
    }

    fn text(body: &EncodedBody) -> String {
        String::from_utf8(body.bytes.to_vec()).unwrap()
    }

    #[test]
    fn single_field_payload() {
        let fields = parts([("name", "x")]);
        let body = encode_multipart(Some(&fields), None, None, None).unwrap();
        let boundary = boundary_of(&body);

        let expected = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nx\r\n--{boundary}--"
        );
        assert_eq!(text(&body), expected);
        assert_eq!(text(&body).matches(&format!("--{boundary}--")).count(), 1);
        assert_eq!(body.content_length(), expected.len());
    }

    #[test]
    fn boundary_shape() {
        let body = encode_multipart(None, None, None, None).unwrap();
        let boundary = boundary_of(&body);
        assert_eq!(boundary.len(), BOUNDARY_DASHES + 2 * BOUNDARY_RANDOM_BYTES);
        assert!(boundary.starts_with(&"-".repeat(BOUNDARY_DASHES)));
        assert!(boundary[BOUNDARY_DASHES..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(text(&body), format!("--{boundary}--"));
    }

    #[test]
    fn boundaries_differ_per_payload() {
        let a = encode_multipart(None, None, None, None).unwrap();
        let b = encode_multipart(None, None, None, None).unwrap();
        assert_ne!(boundary_of(&a), boundary_of(&b));
    }

    #[test]
    fn files_get_indexed_names_and_inferred_types() {
        let files = parts([
            ("a.png", Bytes::from_static(&[0x89, b'P', b'N', b'G'])),
            ("notes.unknownext", Bytes::from_static(b"hello")),
        ]);
        let body = encode_multipart(None, Some(&files), None, None).unwrap();
        let payload = String::from_utf8_lossy(&body.bytes).into_owned();

        assert!(payload.contains(
            "Content-Type: image/png\r\nContent-Disposition: form-data; name=\"files%5B0%5D\"; filename=\"a.png\"\r\n\r\n"
        ));
        assert!(payload.contains(
            "Content-Type: application/octet-stream\r\nContent-Disposition: form-data; name=\"files%5B1%5D\"; filename=\"notes.unknownext\"\r\n\r\nhello\r\n"
        ));
    }

    #[test]
    fn fields_precede_files_in_insertion_order() {
        let fields = parts([("z", "1"), ("a", "2")]);
        let files = parts([("b.txt", "B"), ("a.txt", "A")]);
        let body = encode_multipart(Some(&fields), Some(&files), Some("upload"), None).unwrap();
        let payload = text(&body);

        let positions: Vec<usize> = ["name=\"z\"", "name=\"a\"", "filename=\"b.txt\"", "filename=\"a.txt\""]
            .iter()
            .map(|needle| payload.find(needle).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(payload.matches("name=\"upload\"").count(), 2);
    }

    #[test]
    fn base64_transfer_encoding() {
        let fields = parts([("greeting", "hello")]);
        let body = encode_multipart(Some(&fields), None, None, Some("BASE64")).unwrap();
        let payload = text(&body);
        assert!(payload.contains(
            "MIME-Version: 1.0\r\nContent-Transfer-Encoding: base64\r\nContent-Disposition: form-data; name=\"greeting\"\r\n\r\naGVsbG8=\r\n"
        ));
    }

    #[test]
    fn default_spellings_add_no_headers() {
        let fields = parts([("k", "v")]);
        for spelling in ["utf8", "UTF8", "utf-8", "UTF-8"] {
            let body = encode_multipart(Some(&fields), None, None, Some(spelling)).unwrap();
            assert!(!text(&body).contains("Content-Transfer-Encoding"), "{spelling}");
        }
    }

    #[test]
    fn unknown_transfer_encoding_is_rejected() {
        let err = encode_multipart(None, None, None, Some("utf16")).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
        assert!(encode_multipart(None, None, None, Some("Base64")).is_err());
    }

    #[test]
    fn names_are_component_escaped() {
        let fields = parts([("a b/c", "1")]);
        let files = parts([("my file (1).txt", "x")]);
        let body = encode_multipart(Some(&fields), Some(&files), None, None).unwrap();
        let payload = text(&body);
        assert!(payload.contains("name=\"a%20b%2Fc\""));
        assert!(payload.contains("filename=\"my%20file%20(1).txt\""));
    }

    #[test]
    fn field_name_substitution() {
        assert_eq!(file_field_name("files[%i]", 3), "files[3]");
        assert_eq!(file_field_name("doc_%d_%d", 1), "doc_1_%d");
        assert_eq!(file_field_name("attachment", 7), "attachment");
        assert_eq!(file_field_name("pct%", 2), "pct% 2");
    }
}
