//! Outbound fact publishing.
//!
//! `FactPublisher` is the single serialization point in front of the transport.
//! Every task that reports something (the startup announcement, operation
//! lifecycles, the telemetry loop) goes through it. Each call encodes one
//! complete payload first and then holds the transport lock for exactly one
//! publish, so rows from different tasks never interleave.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use heapless::String;

use super::cancel::CancellationToken;
use crate::config::MAX_PAYLOAD_LEN;
use crate::error::PublishError;
use crate::fact::OutboundFact;
use crate::transport::{QoS, SmartRestTransport};

/// Outbound payload buffer.
pub type Payload = String<MAX_PAYLOAD_LEN>;

/// Publishes facts through a shared transport.
///
/// Publishing uses QoS 1 without the retain flag and waits for the transport
/// to acknowledge the send. While `link` is cancelled every publish fails
/// fast with [`PublishError::Cancelled`] instead of touching the transport.
pub struct FactPublisher<'a, M: RawMutex, T: SmartRestTransport> {
    transport: Mutex<M, T>,
    upstream_topic: &'a str,
    link: &'a CancellationToken<M>,
}

impl<'a, M: RawMutex, T: SmartRestTransport> FactPublisher<'a, M, T> {
    pub fn new(transport: T, upstream_topic: &'a str, link: &'a CancellationToken<M>) -> Self {
        Self {
            transport: Mutex::new(transport),
            upstream_topic,
            link,
        }
    }

    /// The token signalling that the transport link is down.
    pub fn link(&self) -> &'a CancellationToken<M> {
        self.link
    }

    pub fn upstream_topic(&self) -> &'a str {
        self.upstream_topic
    }

    /// Gives the transport back, e.g. to reconnect it.
    pub fn into_inner(self) -> T {
        self.transport.into_inner()
    }

    /// Encodes and publishes a single fact.
    pub async fn publish_fact(&self, fact: &OutboundFact<'_>) -> Result<(), PublishError<T::Error>> {
        let mut payload = Payload::new();
        fact.encode(&mut payload).map_err(PublishError::Encode)?;
        let topic = fact.json_topic().unwrap_or(self.upstream_topic);
        self.publish_raw(topic, payload.as_bytes()).await
    }

    /// Publishes several facts with as few messages as possible.
    ///
    /// All row facts are joined with newlines into one upstream message; JSON
    /// facts follow, one message each, on their own topics. Returns the
    /// number of messages sent.
    pub async fn publish_batch(
        &self,
        facts: &[OutboundFact<'_>],
    ) -> Result<usize, PublishError<T::Error>> {
        let mut rows = Payload::new();
        for fact in facts.iter().filter(|f| f.json_topic().is_none()) {
            fact.encode(&mut rows).map_err(PublishError::Encode)?;
        }

        let mut sent = 0;
        if !rows.is_empty() {
            self.publish_raw(self.upstream_topic, rows.as_bytes()).await?;
            sent += 1;
        }
        for fact in facts.iter().filter(|f| f.json_topic().is_some()) {
            self.publish_fact(fact).await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Hands one payload to the transport under the lock.
    pub async fn publish_raw(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), PublishError<T::Error>> {
        if self.link.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        let mut transport = self.transport.lock().await;
        transport
            .publish(topic, payload, QoS::AtLeastOnce, false)
            .await?;
        trace!("published {} bytes to {}", payload.len(), topic);
        Ok(())
    }
}
