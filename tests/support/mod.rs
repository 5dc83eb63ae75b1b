#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use myrtio_smartrest::runtime::{CancellationToken, FactPublisher};
use myrtio_smartrest::{QoS, SmartRestTransport, TransportError};

pub type Link = CancellationToken<NoopRawMutex>;

#[derive(Debug)]
pub struct Refused;

impl TransportError for Refused {}

/// Remembers every published message in order.
#[derive(Clone, Default)]
pub struct Recorder {
    messages: Rc<RefCell<Vec<(String, String)>>>,
    refuse: Rc<RefCell<bool>>,
}

impl Recorder {
    pub fn transport(&self) -> RecordingTransport {
        RecordingTransport {
            recorder: self.clone(),
        }
    }

    pub fn refuse_all(&self) {
        *self.refuse.borrow_mut() = true;
    }

    pub fn payloads(&self) -> Vec<String> {
        self.messages.borrow().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.messages.borrow().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Payloads starting with `prefix`, in publish order.
    pub fn payloads_starting_with(&self, prefix: &str) -> Vec<String> {
        self.payloads()
            .into_iter()
            .filter(|p| p.starts_with(prefix))
            .collect()
    }
}

pub struct RecordingTransport {
    recorder: Recorder,
}

impl SmartRestTransport for RecordingTransport {
    type Error = Refused;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        assert_eq!(qos, QoS::AtLeastOnce);
        assert!(!retain);
        embassy_futures::yield_now().await;
        if *self.recorder.refuse.borrow() {
            return Err(Refused);
        }
        self.recorder.messages.borrow_mut().push((
            topic.to_owned(),
            String::from_utf8(payload.to_vec()).expect("payload is text"),
        ));
        Ok(())
    }
}

pub fn publisher<'a>(
    recorder: &Recorder,
    link: &'a Link,
) -> FactPublisher<'a, NoopRawMutex, RecordingTransport> {
    FactPublisher::new(recorder.transport(), "s/us", link)
}
