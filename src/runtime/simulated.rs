//! A device that pretends to perform every action.
//!
//! Each action waits for a fixed duration and then succeeds, unless the link
//! drops first. Firmware and software updates are remembered so the reported
//! inventory reflects what was "installed". Handy for demos and for running
//! the engine against a real platform without real hardware behind it.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};
use futures::future::{Either, select};

use super::cancel::CancellationToken;
use super::traits::{ActionHandler, InstalledPackage, SoftwareInventory};
use crate::operation::{
    Failure, FirmwareUpdate, LogfileRequest, Param, RemoteAccessConnect, Restart, ShellCommand,
    SoftwareAction, SoftwareUpdate,
};

struct State {
    firmware: Option<(Param, Param)>,
    software: SoftwareInventory,
}

/// An [`ActionHandler`] that simulates every operation.
pub struct SimulatedDevice<M: RawMutex> {
    action_time: Duration,
    state: Mutex<M, RefCell<State>>,
}

impl<M: RawMutex> SimulatedDevice<M> {
    /// A device whose actions each take `action_time`.
    pub const fn new(action_time: Duration) -> Self {
        Self {
            action_time,
            state: Mutex::new(RefCell::new(State {
                firmware: None,
                software: SoftwareInventory::new(),
            })),
        }
    }

    /// Name and version of the last firmware installed.
    pub fn firmware(&self) -> Option<(Param, Param)> {
        self.state.lock(|state| state.borrow().firmware.clone())
    }

    /// The currently installed software.
    pub fn software(&self) -> SoftwareInventory {
        self.state.lock(|state| state.borrow().software.clone())
    }

    async fn work<C: RawMutex>(&self, cancel: &CancellationToken<C>) -> Result<(), Failure> {
        let timer = Timer::after(self.action_time);
        let cancelled = cancel.cancelled();
        match select(core::pin::pin!(timer), core::pin::pin!(cancelled)).await {
            Either::Left(((), _)) => Ok(()),
            Either::Right(((), _)) => Err(Failure::cancelled()),
        }
    }
}

impl<M: RawMutex> ActionHandler for SimulatedDevice<M> {
    async fn restart<C: RawMutex>(
        &self,
        _request: &Restart,
        cancel: &CancellationToken<C>,
    ) -> Result<(), Failure> {
        info!("simulating restart");
        self.work(cancel).await
    }

    async fn shell<C: RawMutex>(
        &self,
        request: &ShellCommand,
        cancel: &CancellationToken<C>,
    ) -> Result<(), Failure> {
        info!("simulating shell command: {}", request.command.as_str());
        self.work(cancel).await
    }

    async fn update_firmware<C: RawMutex>(
        &self,
        request: &FirmwareUpdate,
        cancel: &CancellationToken<C>,
    ) -> Result<(), Failure> {
        info!(
            "simulating firmware update to {} {}",
            request.name.as_str(),
            request.version.as_str()
        );
        self.work(cancel).await?;
        self.state.lock(|state| {
            state.borrow_mut().firmware = Some((request.name.clone(), request.version.clone()));
        });
        Ok(())
    }

    async fn upload_logfile<C: RawMutex>(
        &self,
        request: &LogfileRequest,
        cancel: &CancellationToken<C>,
    ) -> Result<(), Failure> {
        info!("simulating log upload of {}", request.log_file.as_str());
        self.work(cancel).await
    }

    async fn update_software<C: RawMutex>(
        &self,
        request: &SoftwareUpdate,
        installed: &mut SoftwareInventory,
        cancel: &CancellationToken<C>,
    ) -> Result<(), Failure> {
        info!("simulating update of {} packages", request.packages.len());
        self.work(cancel).await?;
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let mut software = state.software.clone();
            for package in &request.packages {
                software.retain(|p| p.name != package.name);
                match package.action {
                    SoftwareAction::Install => software
                        .push(InstalledPackage {
                            name: package.name.clone(),
                            version: package.version.clone(),
                            url: package.url.clone(),
                        })
                        .map_err(|_| Failure::new("too many installed packages"))?,
                    SoftwareAction::Delete => {}
                    SoftwareAction::Other(_) => {
                        return Err(Failure::new("unsupported software action"));
                    }
                }
            }
            state.software = software.clone();
            *installed = software;
            Ok(())
        })
    }

    async fn connect_remote_access<C: RawMutex>(
        &self,
        request: &RemoteAccessConnect,
        cancel: &CancellationToken<C>,
    ) -> Result<(), Failure> {
        info!(
            "simulating remote access to {}:{}",
            request.host.as_str(),
            request.port
        );
        self.work(cancel).await
    }
}
