//! # SmartREST Device Engine for Embedded Systems
//!
//! `myrtio-smartrest` is a `no_std`, allocation-free implementation of the
//! device side of Cumulocity's SmartREST protocol over MQTT, built on the
//! [Embassy](https://embassy.dev/) async ecosystem.
//!
//! SmartREST multiplexes everything over two topics. Device-to-platform rows
//! go to `s/us`, platform-to-device rows arrive on `s/ds`, and the leading
//! numeric field of each row (the template identifier) says what it means.
//!
//! ## Core Features
//!
//! - **Row codec:** CSV-style quoting for fields holding the delimiter or the
//!   quote character, and line-by-line decoding of batched payloads.
//! - **Template registry:** a static table of the supported templates and
//!   their shapes, including repeating field groups.
//! - **Typed operations:** downstream rows become [`OperationRequest`]s with
//!   extracted, bounded parameters.
//! - **Operation lifecycle:** `EXECUTING`, then `SUCCESSFUL` or `FAILED`, in
//!   order, for every operation, even when several run at once.
//! - **Shared publishing:** lifecycles, telemetry and the startup sequence
//!   share one transport without interleaving their rows.
//! - **JSON-via-MQTT:** custom fragments and events are `serde` types,
//!   serialized without an allocator by [`json::to_document`].
//! - **Transport agnostic:** anything implementing [`SmartRestTransport`] can
//!   carry the messages.
//!
//! ## Architecture
//!
//! The pure parts ([`row`], [`template`], [`operation`], [`fact`]) have no
//! async code and no shared state. The [`runtime`] module ties them to a
//! transport:
//!
//! ```ignore
//! let options = AgentOptions::new("showcase-device-01", "kobu-sn-7123");
//! let publisher = FactPublisher::new(transport, options.upstream_topic, &LINK);
//! let engine = OperationEngine::<_, _, 4>::new(&publisher, options.downstream_topic);
//! let telemetry = TelemetryTask::new(&publisher, options.telemetry_interval, &LINK);
//! let device = SimulatedDevice::<NoopRawMutex>::new(Duration::from_secs(2));
//!
//! announce(&publisher, &options, &DeviceProfile::default()).await?;
//! join4(
//!     engine.run_worker(&device),
//!     engine.run_worker(&device),
//!     telemetry.run(sensors),
//!     receive_loop(&engine),
//! )
//! .await;
//! ```
//!
//! ## Logging
//!
//! Enable one of the `log`, `defmt` or `esp32-log` features to get log
//! output; without them logging compiles to nothing.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod fact;
pub mod json;
pub mod operation;
pub mod row;
pub mod runtime;
pub mod template;
pub mod transport;

pub use config::AgentOptions;
pub use error::{DispatchError, JsonError, PublishError, RowError};
pub use fact::{InventoryUpdate, OutboundFact};
pub use operation::{Failure, OperationKind, OperationOutcome, OperationRequest, dispatch};
pub use row::{TemplateRow, decode, decode_all, encode};
pub use template::{TemplateDescriptor, describe};
pub use transport::{QoS, SmartRestTransport, TransportError};
