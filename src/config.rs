//! # Agent Configuration
//!
//! Compile-time capacities for the heapless buffers used throughout the crate,
//! plus `AgentOptions`, the runtime description of the device the engine
//! speaks for.

use embassy_time::Duration;
use heapless::String;

/// Maximum number of fields a single row may carry.
pub const MAX_FIELDS: usize = 64;

/// Maximum length of one decoded row (unescaped text of all fields).
pub const MAX_ROW_LEN: usize = 512;

/// Maximum size of one outbound payload, including batched rows.
pub const MAX_PAYLOAD_LEN: usize = 1024;

/// Maximum length for a single topic string.
pub const MAX_TOPIC_LEN: usize = 128;

/// Maximum length of short operation parameters (serials, names, versions).
pub const MAX_PARAM_LEN: usize = 64;

/// Maximum length of URLs and free-text operation parameters.
pub const MAX_TEXT_LEN: usize = 256;

/// Maximum number of software packages carried by one update request.
pub const MAX_PACKAGES: usize = 8;

/// Maximum number of facts one telemetry tick may produce.
pub const MAX_BATCH: usize = 16;

/// Default number of tasks that may wait on one cancellation token at once.
pub const MAX_WAITERS: usize = 8;

/// Topic for SmartREST static templates, device to platform.
pub const UPSTREAM_TOPIC: &str = "s/us";

/// Topic for SmartREST static templates, platform to device.
pub const DOWNSTREAM_TOPIC: &str = "s/ds";

/// JSON-via-MQTT topic for creating events.
pub const EVENT_CREATE_TOPIC: &str = "event/events/create";

/// JSON-via-MQTT topic prefix for updating the device's managed object.
pub const INVENTORY_UPDATE_PREFIX: &str = "inventory/managedObjects/update/";

/// Capabilities declared by default with template `114`.
pub const DEFAULT_CAPABILITIES: &[&str] = &[
    "c8y_Firmware",
    "c8y_Restart",
    "c8y_Command",
    "c8y_SoftwareList",
    "c8y_SoftwareUpdate",
    "c8y_LogfileRequest",
    "c8y_RemoteAccessConnect",
    "c8y_DeviceProfile",
];

/// Describes the device and how the engine talks to the platform.
///
/// ```ignore
/// let options = AgentOptions::new("showcase-device-01", "kobu-sn-7123")
///     .with_device_type("yourDeviceType")
///     .with_telemetry_interval(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct AgentOptions<'a> {
    /// Display name of the device, used by the device-creation template.
    pub device_name: &'a str,
    /// Platform type of the device.
    pub device_type: &'a str,
    /// Hardware serial; also the MQTT client id and external id.
    pub serial: &'a str,
    /// Topic outbound rows are published on.
    pub upstream_topic: &'a str,
    /// Topic operation requests arrive on.
    pub downstream_topic: &'a str,
    /// Period of the telemetry task.
    pub telemetry_interval: Duration,
    /// Interval, in minutes, the platform should expect data within.
    pub required_interval: Option<u32>,
    /// Capability fragments announced at startup.
    pub capabilities: &'a [&'a str],
}

impl<'a> AgentOptions<'a> {
    /// Creates options for a device with the given name and serial.
    pub fn new(device_name: &'a str, serial: &'a str) -> Self {
        Self {
            device_name,
            device_type: "c8y_SmartRestDevice",
            serial,
            upstream_topic: UPSTREAM_TOPIC,
            downstream_topic: DOWNSTREAM_TOPIC,
            telemetry_interval: Duration::from_secs(60),
            required_interval: None,
            capabilities: DEFAULT_CAPABILITIES,
        }
    }

    pub fn with_device_type(mut self, device_type: &'a str) -> Self {
        self.device_type = device_type;
        self
    }

    pub fn with_topics(mut self, upstream: &'a str, downstream: &'a str) -> Self {
        self.upstream_topic = upstream;
        self.downstream_topic = downstream;
        self
    }

    pub fn with_telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }

    pub fn with_required_interval(mut self, minutes: u32) -> Self {
        self.required_interval = Some(minutes);
        self
    }

    pub fn with_capabilities(mut self, capabilities: &'a [&'a str]) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The JSON-via-MQTT topic that updates this device's managed object.
    ///
    /// Returns `None` if the serial does not fit into a topic buffer.
    pub fn inventory_update_topic(&self) -> Option<String<MAX_TOPIC_LEN>> {
        let mut topic = String::new();
        topic.push_str(INVENTORY_UPDATE_PREFIX).ok()?;
        topic.push_str(self.serial).ok()?;
        Some(topic)
    }
}
