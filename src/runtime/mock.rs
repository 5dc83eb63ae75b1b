//! In-memory transport for unit tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embassy_futures::yield_now;

use crate::transport::{QoS, SmartRestTransport, TransportError};

#[derive(Debug)]
pub(crate) struct MockError;

impl TransportError for MockError {}

struct Published {
    topic: String,
    payload: String,
    qos: QoS,
    retain: bool,
}

#[derive(Default)]
struct Inner {
    published: Vec<Published>,
    attempts: usize,
    failing: Vec<usize>,
}

/// Shared record of everything a [`MockTransport`] was asked to publish.
#[derive(Clone, Default)]
pub(crate) struct TransportLog {
    inner: Rc<RefCell<Inner>>,
}

impl TransportLog {
    /// Makes the next `count` publish attempts fail.
    pub(crate) fn fail_next(&self, count: usize) {
        let mut inner = self.inner.borrow_mut();
        let first = inner.attempts;
        inner.failing.extend(first..first + count);
    }

    /// Makes the publish attempt with the given 0-based index fail.
    pub(crate) fn fail_attempt(&self, index: usize) {
        self.inner.borrow_mut().failing.push(index);
    }

    pub(crate) fn attempts(&self) -> usize {
        self.inner.borrow().attempts
    }

    pub(crate) fn topics(&self) -> Vec<String> {
        self.inner.borrow().published.iter().map(|p| p.topic.clone()).collect()
    }

    pub(crate) fn payloads(&self) -> Vec<String> {
        self.inner.borrow().published.iter().map(|p| p.payload.clone()).collect()
    }

    pub(crate) fn all_qos_one_not_retained(&self) -> bool {
        self.inner
            .borrow()
            .published
            .iter()
            .all(|p| p.qos == QoS::AtLeastOnce && !p.retain)
    }
}

pub(crate) struct MockTransport {
    log: TransportLog,
}

impl MockTransport {
    pub(crate) fn new(log: &TransportLog) -> Self {
        Self { log: log.clone() }
    }
}

impl SmartRestTransport for MockTransport {
    type Error = MockError;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        // Suspend like a real transport waiting for its PUBACK.
        yield_now().await;
        let mut inner = self.log.inner.borrow_mut();
        let attempt = inner.attempts;
        inner.attempts += 1;
        if inner.failing.contains(&attempt) {
            return Err(MockError);
        }
        inner.published.push(Published {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
            retain,
        });
        Ok(())
    }
}
