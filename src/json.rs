//! # JSON-via-MQTT Documents
//!
//! Custom inventory fragments and events that do not fit a static template
//! are sent as JSON on their own topics. Documents are plain `serde` types;
//! `serde-json-core` writes them into a stack buffer, so no allocator is
//! involved.
//!
//! ```ignore
//! #[derive(Serialize)]
//! struct Custom<'a> {
//!     #[serde(rename = "yourCustomFragment")]
//!     fragment: Values<'a>,
//! }
//!
//! let document: Document = to_document(&custom)?;
//! let fact = OutboundFact::CustomJson(JsonFragment {
//!     topic: &options.inventory_update_topic().unwrap(),
//!     document: &document,
//! });
//! ```

use heapless::String;
use serde::Serialize;

use crate::config::MAX_PAYLOAD_LEN;
use crate::error::JsonError;

/// A serialized document that fits one outbound payload.
pub type Document = String<MAX_PAYLOAD_LEN>;

/// Body of an event created through `event/events/create`.
///
/// Without a time the platform stamps the event on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JsonEvent<'a> {
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<&'a str>,
}

/// Serializes `value` into a document of at most `N` bytes.
pub fn to_document<T, const N: usize>(value: &T) -> Result<String<N>, JsonError>
where
    T: Serialize + ?Sized,
{
    let mut buf = [0u8; N];
    let len = serde_json_core::to_slice(value, &mut buf).map_err(|_| JsonError::TooLong)?;
    let text = core::str::from_utf8(&buf[..len]).map_err(|_| JsonError::InvalidText)?;
    String::try_from(text).map_err(|_| JsonError::TooLong)
}
