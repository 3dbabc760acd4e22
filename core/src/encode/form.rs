use serde::Serialize;

use super::EncodedBody;
use crate::error::Error;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Serialize a flat mapping as `application/x-www-form-urlencoded`.
///
/// Anything that is not map-like (a bare string, a number, a nested map)
/// fails with `InvalidArgument`.
pub fn encode_url_form<T: Serialize + ?Sized>(fields: &T) -> Result<EncodedBody, Error> {
    let encoded =
        serde_urlencoded::to_string(fields).map_err(|e| Error::invalid_argument("fields", e.to_string()))?;
    Ok(EncodedBody::new(FORM_CONTENT_TYPE, encoded))
}
