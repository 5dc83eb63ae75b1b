//! # Transport Abstraction
//!
//! This module defines the `SmartRestTransport` trait, which abstracts the MQTT
//! connection the engine publishes through. Connecting, reconnecting and TLS
//! are the transport's business; the engine only needs an ordered publish
//! primitive that resolves once the message has been handed off.
//!
//! With the Rust 2024 Edition, this trait uses native `async fn`, removing the
//! need for the `#[async_trait]` macro.

/// Represents the Quality of Service (QoS) levels for MQTT messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// A marker trait for transport-related errors.
pub trait TransportError: core::fmt::Debug {}

/// A publish-capable connection to the platform.
///
/// Implementations must deliver the whole payload as one MQTT message. The
/// engine serializes its own calls, so an implementation does not need to be
/// safe for concurrent use.
#[allow(async_fn_in_trait)]
pub trait SmartRestTransport {
    /// The error type returned by the transport.
    type Error: TransportError;

    /// Publishes `payload` on `topic`.
    ///
    /// Resolves once the transport has acknowledged the send (the `PUBACK` for
    /// QoS 1), not once the platform has processed the message.
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error>;
}

impl<T: SmartRestTransport> SmartRestTransport for &mut T {
    type Error = T::Error;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        (**self).publish(topic, payload, qos, retain).await
    }
}
