//! SmartREST Runtime Module
//!
//! The async half of the crate: everything that talks to the transport.
//!
//! # Overview
//!
//! - [`FactPublisher`] owns the transport and is the only place facts are
//!   published from. Every other component borrows it.
//! - [`OperationEngine`] receives downstream messages and feeds a pool of
//!   lifecycle workers.
//! - [`LifecycleController`] reports `EXECUTING` and the terminal status of
//!   one operation around an [`ActionHandler`] call.
//! - [`TelemetryTask`] publishes a [`TelemetrySource`] sample on a fixed
//!   interval.
//! - [`announce`] publishes the connect-time device description.
//!
//! # Cancellation
//!
//! A single [`CancellationToken`], the link token, is cancelled by the
//! application when the MQTT connection drops. Publishing fails fast while it
//! is cancelled, handlers see it and can give up early, and lifecycle workers
//! return. Call [`CancellationToken::reset`] after reconnecting and start the
//! workers again.
//!
//! No component spawns tasks; the application decides how futures are run
//! (an Embassy task pool, `join`, ...).

pub(crate) mod cancel;
pub(crate) mod engine;
pub(crate) mod lifecycle;
pub(crate) mod publisher;
pub(crate) mod simulated;
pub(crate) mod startup;
pub(crate) mod telemetry;
pub(crate) mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use cancel::CancellationToken;
pub use engine::{InboundSummary, OperationEngine};
pub use lifecycle::{LifecycleController, LifecycleReport};
pub use publisher::{FactPublisher, Payload};
pub use simulated::SimulatedDevice;
pub use startup::{DeviceProfile, announce};
pub use telemetry::TelemetryTask;
pub use traits::{
    ActionHandler, FactBatch, InstalledPackage, MAX_INSTALLED, NoopHandler, SoftwareInventory,
    TelemetrySource, software_items,
};
