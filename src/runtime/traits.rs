//! Collaborator traits: the device actions behind each operation and the
//! source of periodic telemetry.
//!
//! # Action Handlers
//!
//! The engine never performs device actions itself. An [`ActionHandler`]
//! provides one async method per operation kind; each receives the extracted
//! parameters and the link's cancellation token, and reports a single
//! terminal result. Handlers are shared by every lifecycle worker through
//! `&self`, so mutable device state needs interior mutability.
//!
//! Every method has a default that fails with [`Failure::unsupported`], which
//! lets a device implement only the operations it declares as capabilities.
//!
//! # Example
//!
//! ```ignore
//! struct Device;
//!
//! impl ActionHandler for Device {
//!     async fn restart<M: RawMutex>(
//!         &self,
//!         _request: &Restart,
//!         cancel: &CancellationToken<M>,
//!     ) -> Result<(), Failure> {
//!         schedule_reboot();
//!         Ok(())
//!     }
//! }
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;

use super::cancel::CancellationToken;
use crate::config::{MAX_BATCH, MAX_PACKAGES};
use crate::fact::{OutboundFact, SoftwareItem};
use crate::operation::{
    Failure, FirmwareUpdate, LogfileRequest, Param, RemoteAccessConnect, Restart, ShellCommand,
    SoftwareUpdate, Text,
};

/// Maximum number of installed packages reported after a software update.
pub const MAX_INSTALLED: usize = 2 * MAX_PACKAGES;

/// Facts produced by one telemetry tick.
pub type FactBatch<'a> = Vec<OutboundFact<'a>, MAX_BATCH>;

/// An installed software package, as reported with template `116`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: Param,
    pub version: Param,
    pub url: Text,
}

impl InstalledPackage {
    pub fn as_item(&self) -> SoftwareItem<'_> {
        SoftwareItem {
            name: &self.name,
            version: &self.version,
            url: &self.url,
        }
    }
}

/// The installed-software list a handler reports after a software update.
pub type SoftwareInventory = Vec<InstalledPackage, MAX_INSTALLED>;

/// Borrows every package of `installed` as a `116` entry.
pub fn software_items<const N: usize>(
    installed: &Vec<InstalledPackage, N>,
) -> Vec<SoftwareItem<'_>, N> {
    installed.iter().map(InstalledPackage::as_item).collect()
}

/// Performs the device side of each operation.
#[allow(async_fn_in_trait)]
pub trait ActionHandler {
    /// `c8y_Restart`
    async fn restart<M: RawMutex>(
        &self,
        _request: &Restart,
        _cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        Err(Failure::unsupported())
    }

    /// `c8y_Command`
    async fn shell<M: RawMutex>(
        &self,
        _request: &ShellCommand,
        _cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        Err(Failure::unsupported())
    }

    /// `c8y_Firmware`. On success the engine reports the requested firmware
    /// as installed before reporting the operation successful.
    async fn update_firmware<M: RawMutex>(
        &self,
        _request: &FirmwareUpdate,
        _cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        Err(Failure::unsupported())
    }

    /// `c8y_LogfileRequest`
    async fn upload_logfile<M: RawMutex>(
        &self,
        _request: &LogfileRequest,
        _cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        Err(Failure::unsupported())
    }

    /// `c8y_SoftwareUpdate`. On success, `installed` holds the complete list of
    /// installed software; a non-empty list is reported before the operation
    /// is marked successful.
    async fn update_software<M: RawMutex>(
        &self,
        _request: &SoftwareUpdate,
        _installed: &mut SoftwareInventory,
        _cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        Err(Failure::unsupported())
    }

    /// `c8y_RemoteAccessConnect`
    async fn connect_remote_access<M: RawMutex>(
        &self,
        _request: &RemoteAccessConnect,
        _cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        Err(Failure::unsupported())
    }
}

/// A handler that supports nothing.
///
/// Useful as a placeholder or for testing.
pub struct NoopHandler;

impl ActionHandler for NoopHandler {}

impl<H: ActionHandler> ActionHandler for &H {
    async fn restart<M: RawMutex>(
        &self,
        request: &Restart,
        cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        (**self).restart(request, cancel).await
    }

    async fn shell<M: RawMutex>(
        &self,
        request: &ShellCommand,
        cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        (**self).shell(request, cancel).await
    }

    async fn update_firmware<M: RawMutex>(
        &self,
        request: &FirmwareUpdate,
        cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        (**self).update_firmware(request, cancel).await
    }

    async fn upload_logfile<M: RawMutex>(
        &self,
        request: &LogfileRequest,
        cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        (**self).upload_logfile(request, cancel).await
    }

    async fn update_software<M: RawMutex>(
        &self,
        request: &SoftwareUpdate,
        installed: &mut SoftwareInventory,
        cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        (**self).update_software(request, installed, cancel).await
    }

    async fn connect_remote_access<M: RawMutex>(
        &self,
        request: &RemoteAccessConnect,
        cancel: &CancellationToken<M>,
    ) -> Result<(), Failure> {
        (**self).connect_remote_access(request, cancel).await
    }
}

/// Produces the facts published on every telemetry tick.
///
/// Facts may borrow from the source; the batch is published before the
/// source is sampled again.
pub trait TelemetrySource {
    fn sample<'s>(&'s mut self, batch: &mut FactBatch<'s>);
}

impl<S: TelemetrySource + ?Sized> TelemetrySource for &mut S {
    fn sample<'s>(&'s mut self, batch: &mut FactBatch<'s>) {
        (**self).sample(batch)
    }
}
