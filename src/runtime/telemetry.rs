//! Periodic telemetry producer.
//!
//! Samples a [`TelemetrySource`] on a fixed interval and publishes each
//! sample as one batch. The task shares the publisher with the operation
//! lifecycles; its rows are never interleaved with theirs, but no ordering
//! between the two streams is implied.

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Ticker};

use super::cancel::CancellationToken;
use super::publisher::FactPublisher;
use super::traits::{FactBatch, TelemetrySource};
use crate::config::MAX_WAITERS;
use crate::error::PublishError;
use crate::transport::SmartRestTransport;

/// Timer-driven telemetry loop with a stop token.
///
/// The stop token is separate from the link and may be sized on its own.
pub struct TelemetryTask<'p, 'a, M, T, const STOP: usize = MAX_WAITERS>
where
    M: RawMutex,
    T: SmartRestTransport,
{
    publisher: &'p FactPublisher<'a, M, T>,
    interval: Duration,
    stop: &'p CancellationToken<M, STOP>,
}

impl<'p, 'a, M, T, const STOP: usize> TelemetryTask<'p, 'a, M, T, STOP>
where
    M: RawMutex,
    T: SmartRestTransport,
{
    pub fn new(
        publisher: &'p FactPublisher<'a, M, T>,
        interval: Duration,
        stop: &'p CancellationToken<M, STOP>,
    ) -> Self {
        Self {
            publisher,
            interval,
            stop,
        }
    }

    /// Samples `source` once and publishes the result.
    ///
    /// Returns the number of messages sent; an empty sample sends nothing.
    pub async fn tick<S: TelemetrySource>(
        &self,
        source: &mut S,
    ) -> Result<usize, PublishError<T::Error>> {
        let mut batch = FactBatch::new();
        source.sample(&mut batch);
        if batch.is_empty() {
            return Ok(0);
        }
        self.publisher.publish_batch(&batch).await
    }

    /// Publishes a sample right away and then once per interval, until the
    /// stop token fires.
    ///
    /// A failed tick is logged and the loop carries on with the next one.
    pub async fn run<S: TelemetrySource>(&self, mut source: S) {
        info!("telemetry every {} ms", self.interval.as_millis());
        let mut ticker = Ticker::every(self.interval);
        loop {
            if self.stop.is_cancelled() {
                break;
            }
            match self.tick(&mut source).await {
                Ok(sent) => trace!("telemetry tick sent {} messages", sent),
                Err(err) => warn!("telemetry tick failed: {}", err.kind()),
            }
            if let Either::Second(()) = select(ticker.next(), self.stop.cancelled()).await {
                break;
            }
        }
        info!("telemetry stopped");
    }
}
