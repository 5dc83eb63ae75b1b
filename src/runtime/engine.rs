//! # Operation Engine
//!
//! Glue between the downstream subscription and the lifecycle controller.
//!
//! The application forwards every received message to
//! [`OperationEngine::handle_message`]. That call decodes the payload, drops
//! malformed rows with a log entry, and queues each supported request on a
//! bounded channel. Lifecycle workers take requests off the channel one at a
//! time, so a slow action only occupies its own worker while reception goes
//! on.
//!
//! ```ignore
//! static LINK: CancellationToken<CriticalSectionRawMutex> = CancellationToken::new();
//!
//! let publisher = FactPublisher::new(transport, options.upstream_topic, &LINK);
//! let engine = OperationEngine::<_, _, 4>::new(&publisher, options.downstream_topic);
//!
//! // Two workers: two operations may run at once.
//! join3(
//!     engine.run_worker(&device),
//!     engine.run_worker(&device),
//!     async {
//!         while let Some((topic, payload)) = next_message().await {
//!             engine.handle_message(topic, payload).await;
//!         }
//!     },
//! )
//! .await;
//! ```

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use super::lifecycle::{LifecycleController, LifecycleReport};
use super::publisher::FactPublisher;
use super::traits::ActionHandler;
use crate::error::DispatchError;
use crate::operation::{OperationRequest, dispatch};
use crate::row::decode_all;
use crate::transport::SmartRestTransport;

/// Per-message counts of what [`OperationEngine::handle_message`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundSummary {
    /// Requests queued for a lifecycle worker.
    pub accepted: usize,
    /// Rows of templates this device does not handle.
    pub unsupported: usize,
    /// Rows dropped because they were malformed.
    pub malformed: usize,
    /// Rows left unhandled because the link went down while the queue was full.
    pub dropped: usize,
}

/// Decodes inbound operations and runs their lifecycles.
///
/// `DEPTH` bounds the number of requests waiting for a worker; when the queue
/// is full `handle_message` waits for room, or until the link drops.
pub struct OperationEngine<'p, 'a, M: RawMutex, T: SmartRestTransport, const DEPTH: usize> {
    publisher: &'p FactPublisher<'a, M, T>,
    downstream_topic: &'a str,
    queue: Channel<M, OperationRequest, DEPTH>,
}

impl<'p, 'a, M, T, const DEPTH: usize> OperationEngine<'p, 'a, M, T, DEPTH>
where
    M: RawMutex,
    T: SmartRestTransport,
{
    pub fn new(publisher: &'p FactPublisher<'a, M, T>, downstream_topic: &'a str) -> Self {
        Self {
            publisher,
            downstream_topic,
            queue: Channel::new(),
        }
    }

    /// Topics the transport must subscribe to for operations to arrive.
    pub fn subscriptions(&self) -> [&'a str; 1] {
        [self.downstream_topic]
    }

    pub fn publisher(&self) -> &'p FactPublisher<'a, M, T> {
        self.publisher
    }

    /// Decodes one inbound message and queues the operations it carries.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> InboundSummary {
        let mut summary = InboundSummary::default();
        if topic != self.downstream_topic {
            debug!("ignoring message on {}", topic);
            return summary;
        }

        let mut rows = match decode_all(payload) {
            Ok(rows) => rows,
            Err(err) => {
                warn!("dropping payload of {} bytes: {}", payload.len(), err);
                summary.malformed += 1;
                return summary;
            }
        };

        let link = self.publisher.link();
        while let Some((line, row)) = rows.next() {
            let request = match row.map_err(DispatchError::from).and_then(|row| dispatch(&row)) {
                Ok(request) => request,
                Err(err) => {
                    warn!("dropping malformed row on line {}: {}", line, err);
                    summary.malformed += 1;
                    continue;
                }
            };
            if let OperationRequest::Unsupported { template } = &request {
                info!("unsupported template {} on line {}", template.as_str(), line);
                summary.unsupported += 1;
                continue;
            }
            if let Either::Second(()) = select(self.queue.send(request), link.cancelled()).await {
                warn!("link down with a full queue, dropping the rest of the message");
                summary.dropped = 1 + rows.by_ref().count();
                break;
            }
            summary.accepted += 1;
        }
        summary
    }

    /// Takes the next queued request and runs its lifecycle.
    pub async fn process_next<H: ActionHandler>(&self, handler: &H) -> LifecycleReport {
        let request = self.queue.receive().await;
        LifecycleController::new(self.publisher)
            .run(&request, handler)
            .await
    }

    /// Runs lifecycles until the link is cancelled.
    ///
    /// Run several of these concurrently to let operations overlap. A
    /// lifecycle already in progress when the link drops finishes on its own
    /// (publishing nothing further); the worker returns afterwards.
    pub async fn run_worker<H: ActionHandler>(&self, handler: &H) {
        let link = self.publisher.link();
        loop {
            if link.is_cancelled() {
                debug!("link down, lifecycle worker stopping");
                return;
            }
            match select(self.queue.receive(), link.cancelled()).await {
                Either::First(request) => {
                    LifecycleController::new(self.publisher)
                        .run(&request, handler)
                        .await;
                }
                Either::Second(()) => {}
            }
        }
    }

    /// Drops every queued request, e.g. after the link went down.
    ///
    /// Returns how many were discarded.
    pub fn discard_pending(&self) -> usize {
        let mut discarded = 0;
        while self.queue.try_receive().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            info!("discarded {} queued operations", discarded);
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::join::join;
    use embassy_futures::yield_now;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use futures::executor::block_on;

    use super::*;
    use crate::operation::OperationOutcome;
    use crate::runtime::cancel::CancellationToken;
    use crate::runtime::mock::{MockTransport, TransportLog};
    use crate::runtime::traits::NoopHandler;

    type Link = CancellationToken<NoopRawMutex>;

    #[test]
    fn malformed_rows_do_not_stop_the_batch() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let engine = OperationEngine::<_, _, 4>::new(&publisher, "s/ds");
        let summary = block_on(engine.handle_message("s/ds", b"522,dev1\n510,dev1\n"));
        assert_eq!(
            summary,
            InboundSummary {
                accepted: 1,
                unsupported: 0,
                malformed: 1,
                dropped: 0,
            }
        );
        let report = block_on(engine.process_next(&NoopHandler));
        assert!(matches!(
            report,
            LifecycleReport::Completed(OperationOutcome::Failed(_))
        ));
        assert_eq!(log.payloads()[0], "501,c8y_Restart");
    }

    #[test]
    fn unsupported_rows_are_counted_not_queued() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let engine = OperationEngine::<_, _, 4>::new(&publisher, "s/ds");
        let summary = block_on(engine.handle_message("s/ds", b"999,dev1\n114,c8y_Restart"));
        assert_eq!(summary.unsupported, 2);
        assert_eq!(summary.accepted, 0);
        assert_eq!(engine.discard_pending(), 0);
        assert_eq!(log.attempts(), 0);
    }

    #[test]
    fn other_topics_are_ignored() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let engine = OperationEngine::<_, _, 4>::new(&publisher, "s/ds");
        let summary = block_on(engine.handle_message("s/e", b"510,dev1"));
        assert_eq!(summary, InboundSummary::default());
        assert_eq!(engine.subscriptions(), ["s/ds"]);
    }

    #[test]
    fn binary_payloads_count_as_malformed() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let engine = OperationEngine::<_, _, 4>::new(&publisher, "s/ds");
        let summary = block_on(engine.handle_message("s/ds", &[0xff, 0xfe, b'5']));
        assert_eq!(summary.malformed, 1);
    }

    #[test]
    fn worker_returns_when_the_link_drops() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let engine = OperationEngine::<_, _, 4>::new(&publisher, "s/ds");
        block_on(engine.handle_message("s/ds", b"510,dev1"));
        link.cancel();
        block_on(engine.run_worker(&NoopHandler));
        assert_eq!(engine.discard_pending(), 1);
        assert_eq!(log.attempts(), 0);
    }

    #[test]
    fn full_queue_gives_up_when_the_link_drops() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let engine = OperationEngine::<_, _, 1>::new(&publisher, "s/ds");

        let (summary, ()) = block_on(join(
            engine.handle_message("s/ds", b"510,dev1\n511,dev1,ls\n510,dev1"),
            async {
                yield_now().await;
                link.cancel();
            },
        ));

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.dropped, 2);
        assert_eq!(engine.discard_pending(), 1);
        assert_eq!(log.attempts(), 0);
    }
}
