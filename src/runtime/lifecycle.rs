//! Operation lifecycle: `EXECUTING`, the action, then `SUCCESSFUL` or `FAILED`.
//!
//! One [`LifecycleController::run`] call drives one operation. Nothing is
//! shared between calls apart from the publisher, so lifecycles of
//! overlapping operations never observe each other's state.

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::publisher::FactPublisher;
use super::traits::{ActionHandler, SoftwareInventory, software_items};
use crate::error::PublishError;
use crate::fact::{InventoryUpdate, OutboundFact};
use crate::operation::{Failure, OperationKind, OperationOutcome, OperationRequest};
use crate::transport::SmartRestTransport;

/// What the platform got to see of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleReport {
    /// Not an operation this device handles; nothing was published.
    Unsupported,
    /// `EXECUTING` could not be published, so the action never ran.
    Aborted,
    /// The link went down; no terminal status was published.
    Cancelled,
    /// The terminal status was published.
    Completed(OperationOutcome),
    /// The terminal status could not be published, even after a retry.
    Dropped(OperationOutcome),
}

/// Runs operation lifecycles against a shared publisher.
pub struct LifecycleController<'p, 'a, M: RawMutex, T: SmartRestTransport> {
    publisher: &'p FactPublisher<'a, M, T>,
}

impl<'p, 'a, M: RawMutex, T: SmartRestTransport> LifecycleController<'p, 'a, M, T> {
    pub fn new(publisher: &'p FactPublisher<'a, M, T>) -> Self {
        Self { publisher }
    }

    /// Drives `request` through its lifecycle using `handler`.
    pub async fn run<H: ActionHandler>(
        &self,
        request: &OperationRequest,
        handler: &H,
    ) -> LifecycleReport {
        let Some(kind) = request.kind() else {
            if let OperationRequest::Unsupported { template } = request {
                info!("ignoring unsupported template {}", template.as_str());
            }
            return LifecycleReport::Unsupported;
        };
        let capability = kind.capability();

        let executing = OperationOutcome::Executing;
        if let Err(err) = self
            .publisher
            .publish_fact(&OutboundFact::status(kind, &executing))
            .await
        {
            error!(
                "{}: could not report EXECUTING ({}), abandoning",
                capability,
                err.kind()
            );
            return LifecycleReport::Aborted;
        }
        debug!("{}: executing", capability);

        let mut installed = SoftwareInventory::new();
        let result = self.perform(request, handler, &mut installed).await;

        if self.publisher.link().is_cancelled() {
            warn!("{}: link down, abandoning status report", capability);
            return LifecycleReport::Cancelled;
        }

        let outcome = match result {
            Ok(()) => {
                self.report_installed(request, &installed).await;
                OperationOutcome::Successful
            }
            Err(failure) => {
                warn!("{}: failed: {}", capability, failure.reason());
                OperationOutcome::Failed(failure)
            }
        };
        self.finish(kind, outcome).await
    }

    async fn perform<H: ActionHandler>(
        &self,
        request: &OperationRequest,
        handler: &H,
        installed: &mut SoftwareInventory,
    ) -> Result<(), Failure> {
        let cancel = self.publisher.link();
        match request {
            OperationRequest::Restart(op) => handler.restart(op, cancel).await,
            OperationRequest::Shell(op) => handler.shell(op, cancel).await,
            OperationRequest::FirmwareUpdate(op) => handler.update_firmware(op, cancel).await,
            OperationRequest::LogfileRequest(op) => handler.upload_logfile(op, cancel).await,
            OperationRequest::SoftwareUpdate(op) => {
                handler.update_software(op, installed, cancel).await
            }
            OperationRequest::RemoteAccessConnect(op) => {
                handler.connect_remote_access(op, cancel).await
            }
            OperationRequest::Unsupported { .. } => Err(Failure::unsupported()),
        }
    }

    /// Publishes the installed state that must precede `SUCCESSFUL`.
    ///
    /// A software update always reports the full list, even when it is now
    /// empty. A failure here is logged; the operation is still reported
    /// successful since the action itself completed.
    async fn report_installed(&self, request: &OperationRequest, installed: &SoftwareInventory) {
        let items;
        let fact = match request {
            OperationRequest::FirmwareUpdate(fw) => {
                OutboundFact::Inventory(InventoryUpdate::Firmware {
                    name: &fw.name,
                    version: &fw.version,
                    url: &fw.url,
                })
            }
            OperationRequest::SoftwareUpdate(_) => {
                items = software_items(installed);
                OutboundFact::Inventory(InventoryUpdate::SoftwareList(&items))
            }
            _ => return,
        };
        if let Err(err) = self.publisher.publish_fact(&fact).await {
            warn!("could not report installed state: {}", err.kind());
        }
    }

    /// Publishes the terminal status, retrying once.
    async fn finish(&self, kind: OperationKind, outcome: OperationOutcome) -> LifecycleReport {
        let fact = OutboundFact::status(kind, &outcome);
        let mut last = self.publisher.publish_fact(&fact).await;
        let retry = match &last {
            Ok(()) | Err(PublishError::Cancelled) => false,
            Err(err) => {
                warn!(
                    "{}: terminal status failed ({}), retrying",
                    kind.capability(),
                    err.kind()
                );
                true
            }
        };
        if retry {
            last = self.publisher.publish_fact(&fact).await;
        }
        match last {
            Ok(()) => {
                debug!("{}: terminal status reported", kind.capability());
                LifecycleReport::Completed(outcome)
            }
            Err(PublishError::Cancelled) => LifecycleReport::Cancelled,
            Err(err) => {
                error!(
                    "{}: dropping terminal status ({})",
                    kind.capability(),
                    err.kind()
                );
                LifecycleReport::Dropped(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_time::Duration;
    use futures::executor::block_on;

    use super::*;
    use crate::operation::{FirmwareUpdate, Restart, ShellCommand, SoftwareUpdate, dispatch};
    use crate::row::decode;
    use crate::runtime::cancel::CancellationToken;
    use crate::runtime::mock::{MockTransport, TransportLog};
    use crate::runtime::simulated::SimulatedDevice;
    use crate::runtime::traits::{InstalledPackage, NoopHandler};

    type Link = CancellationToken<NoopRawMutex>;

    fn request(raw: &str) -> OperationRequest {
        dispatch(&decode(raw).unwrap()).unwrap()
    }

    struct Succeeds;

    impl ActionHandler for Succeeds {
        async fn restart<M: RawMutex>(
            &self,
            _: &Restart,
            _: &CancellationToken<M>,
        ) -> Result<(), Failure> {
            Ok(())
        }

        async fn update_firmware<M: RawMutex>(
            &self,
            _: &FirmwareUpdate,
            _: &CancellationToken<M>,
        ) -> Result<(), Failure> {
            Ok(())
        }

        async fn update_software<M: RawMutex>(
            &self,
            update: &SoftwareUpdate,
            installed: &mut SoftwareInventory,
            _: &CancellationToken<M>,
        ) -> Result<(), Failure> {
            for package in &update.packages {
                let _ = installed.push(InstalledPackage {
                    name: package.name.clone(),
                    version: package.version.clone(),
                    url: package.url.clone(),
                });
            }
            Ok(())
        }
    }

    /// Cancels the link from inside the action, like a disconnect mid-flight.
    struct Disconnects;

    impl ActionHandler for Disconnects {
        async fn shell<M: RawMutex>(
            &self,
            _: &ShellCommand,
            cancel: &CancellationToken<M>,
        ) -> Result<(), Failure> {
            cancel.cancel();
            Err(Failure::cancelled())
        }
    }

    #[test]
    fn firmware_inventory_precedes_successful() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let report = block_on(controller.run(&request("515,dev1,fwA,2.0,http://x"), &Succeeds));
        assert_eq!(report, LifecycleReport::Completed(OperationOutcome::Successful));
        assert_eq!(
            log.payloads(),
            ["501,c8y_Firmware", "115,fwA,2.0,http://x", "503,c8y_Firmware"]
        );
    }

    #[test]
    fn software_list_precedes_successful() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let op = request("528,dev1,sw1,1.0,u1,install");
        block_on(controller.run(&op, &Succeeds));
        assert_eq!(
            log.payloads(),
            ["501,c8y_SoftwareUpdate", "116,sw1,1.0,u1", "503,c8y_SoftwareUpdate"]
        );
    }

    #[test]
    fn emptied_software_list_is_still_reported() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let device = SimulatedDevice::<NoopRawMutex>::new(Duration::from_millis(1));

        block_on(controller.run(&request("528,dev1,sw1,1.0,u1,install"), &device));
        let report = block_on(controller.run(&request("528,dev1,sw1,,,delete"), &device));

        assert_eq!(report, LifecycleReport::Completed(OperationOutcome::Successful));
        assert_eq!(
            log.payloads(),
            [
                "501,c8y_SoftwareUpdate",
                "116,sw1,1.0,u1",
                "503,c8y_SoftwareUpdate",
                "501,c8y_SoftwareUpdate",
                "116",
                "503,c8y_SoftwareUpdate",
            ]
        );
    }

    #[test]
    fn handler_failure_reports_reason() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let report = block_on(controller.run(&request("511,dev1,ls -la"), &NoopHandler));
        assert!(matches!(
            report,
            LifecycleReport::Completed(OperationOutcome::Failed(_))
        ));
        assert_eq!(
            log.payloads(),
            [
                "501,c8y_Command",
                "502,c8y_Command,operation not supported by this device"
            ]
        );
    }

    #[test]
    fn unsupported_requests_publish_nothing() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let report = block_on(controller.run(&request("999,dev1"), &Succeeds));
        assert_eq!(report, LifecycleReport::Unsupported);
        assert_eq!(log.attempts(), 0);
    }

    #[test]
    fn failed_executing_aborts_before_the_action() {
        let link = Link::new();
        let log = TransportLog::default();
        log.fail_next(1);
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let report = block_on(controller.run(&request("510,dev1"), &Succeeds));
        assert_eq!(report, LifecycleReport::Aborted);
        assert_eq!(log.attempts(), 1);
        assert!(log.payloads().is_empty());
    }

    #[test]
    fn terminal_status_is_retried_once() {
        let link = Link::new();
        let log = TransportLog::default();
        log.fail_attempt(1);
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let report = block_on(controller.run(&request("510,dev1"), &Succeeds));
        assert_eq!(report, LifecycleReport::Completed(OperationOutcome::Successful));
        assert_eq!(log.attempts(), 3);
        assert_eq!(log.payloads(), ["501,c8y_Restart", "503,c8y_Restart"]);
    }

    #[test]
    fn terminal_status_is_dropped_after_the_retry() {
        let link = Link::new();
        let log = TransportLog::default();
        log.fail_attempt(1);
        log.fail_attempt(2);
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let report = block_on(controller.run(&request("510,dev1"), &Succeeds));
        assert_eq!(report, LifecycleReport::Dropped(OperationOutcome::Successful));
        assert_eq!(log.attempts(), 3);
        assert_eq!(log.payloads(), ["501,c8y_Restart"]);
    }

    #[test]
    fn cancelled_link_suppresses_terminal_status() {
        let link = Link::new();
        let log = TransportLog::default();
        let publisher = FactPublisher::new(MockTransport::new(&log), "s/us", &link);
        let controller = LifecycleController::new(&publisher);
        let report = block_on(controller.run(&request("511,dev1,reboot"), &Disconnects));
        assert_eq!(report, LifecycleReport::Cancelled);
        assert_eq!(log.payloads(), ["501,c8y_Command"]);
    }
}
