//! Response envelope handling for agent daemon endpoints.
//!
//! Depending on version, the daemon answers either with the payload at the
//! top level or wrapped in a `{"data": ...}` object. Both shapes are accepted
//! with a single untagged parse: the direct shape is tried first, then the
//! wrapped one.

use serde::Deserialize;

/// A daemon response payload in either of its two accepted shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    /// Payload at the top level of the response body.
    Direct(T),
    /// Payload nested under a `data` key.
    Wrapped { data: T },
}

impl<T> Envelope<T> {
    /// Unwrap the payload regardless of shape.
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Direct(inner) => inner,
            Envelope::Wrapped { data } => data,
        }
    }
}
