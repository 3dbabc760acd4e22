use serde::Serialize;

use super::EncodedBody;
use crate::error::Error;

/// Serialize `value` as `application/json`.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<EncodedBody, Error> {
    let bytes =
        serde_json::to_vec(value).map_err(|e| Error::invalid_argument("value", e.to_string()))?;
    Ok(EncodedBody::new("application/json", bytes))
}
