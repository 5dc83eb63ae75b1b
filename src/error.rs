//! # Error Types
//!
//! Errors raised while encoding and decoding SmartREST rows, while turning rows
//! into operation requests, while serializing JSON documents, and while
//! publishing facts through the transport.
//!
//! Row and dispatch errors together form the "malformed row" family: the
//! offending row is logged and dropped, and processing carries on with the
//! next row. Publish errors are propagated to whoever asked for the publish.

use core::fmt;

use crate::transport::TransportError;

/// A structural problem with a single SmartREST row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RowError {
    /// The row holds no fields at all.
    Empty,
    /// A quoted field was never closed.
    UnbalancedQuote,
    /// A quote character appeared inside an unquoted field.
    BareQuote,
    /// Text followed the closing quote of a quoted field.
    TrailingText,
    /// The row has more fields than a row buffer can hold.
    TooManyFields,
    /// The row does not fit into its buffer.
    RowTooLong,
    /// A field contains a carriage return or line feed.
    LineBreak,
    /// The payload is not valid UTF-8.
    InvalidUtf8,
    /// An encoded row does not have the field count its template declares.
    Nonconforming { template: &'static str, found: usize },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Empty => "empty row",
            Self::UnbalancedQuote => "unbalanced quote",
            Self::BareQuote => "bare quote in unquoted field",
            Self::TrailingText => "text after closing quote",
            Self::TooManyFields => "too many fields",
            Self::RowTooLong => "row too long",
            Self::LineBreak => "line break inside field",
            Self::InvalidUtf8 => "payload is not valid UTF-8",
            Self::Nonconforming { template, found } => {
                return write!(f, "template {template} cannot carry {found} fields");
            }
        };
        f.write_str(msg)
    }
}

/// A JSON document could not be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JsonError {
    /// The document does not fit into its buffer.
    TooLong,
    /// The serializer produced bytes that are not UTF-8.
    InvalidText,
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong => f.write_str("JSON document too long"),
            Self::InvalidText => f.write_str("JSON document is not UTF-8"),
        }
    }
}

/// A row that decoded fine but does not match the shape its template declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// The row itself could not be decoded.
    Malformed(RowError),
    /// Fewer fields than the template's declared minimum.
    TooFewFields {
        template: &'static str,
        expected: usize,
        found: usize,
    },
    /// The repeating groups of a template do not divide evenly.
    UnevenGroups {
        template: &'static str,
        width: usize,
        found: usize,
    },
    /// A numeric field did not parse.
    InvalidNumber {
        template: &'static str,
        index: usize,
    },
    /// A field is longer than the parameter it is extracted into.
    FieldTooLong {
        template: &'static str,
        index: usize,
    },
    /// More repeating groups than a request can carry.
    TooManyGroups { template: &'static str, found: usize },
}

impl From<RowError> for DispatchError {
    fn from(err: RowError) -> Self {
        DispatchError::Malformed(err)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed row: {err}"),
            Self::TooFewFields {
                template,
                expected,
                found,
            } => write!(
                f,
                "template {template} needs at least {expected} fields, got {found}"
            ),
            Self::UnevenGroups {
                template,
                width,
                found,
            } => write!(
                f,
                "template {template} has {found} trailing fields, not a multiple of {width}"
            ),
            Self::InvalidNumber { template, index } => {
                write!(f, "template {template} field {index} is not a number")
            }
            Self::FieldTooLong { template, index } => {
                write!(f, "template {template} field {index} is too long")
            }
            Self::TooManyGroups { template, found } => {
                write!(f, "template {template} carries too many groups ({found})")
            }
        }
    }
}

/// The error returned when a fact could not be handed to the transport.
///
/// It is generic over the transport error type `T`, in the same way the
/// underlying MQTT client wraps its socket errors.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError<T> {
    /// The transport rejected or failed the publish.
    Transport(T),
    /// The fact could not be encoded into a payload.
    Encode(RowError),
    /// The link is down; publishing was abandoned.
    Cancelled,
}

impl<T: TransportError> From<T> for PublishError<T> {
    fn from(err: T) -> Self {
        PublishError::Transport(err)
    }
}

impl<T> PublishError<T> {
    /// A short, allocation-free description for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Transport(_) => "transport error",
            PublishError::Encode(_) => "encode error",
            PublishError::Cancelled => "cancelled",
        }
    }
}

impl<T: fmt::Debug> fmt::Display for PublishError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err:?}"),
            Self::Encode(err) => write!(f, "encode error: {err}"),
            Self::Cancelled => f.write_str("publish cancelled"),
        }
    }
}
