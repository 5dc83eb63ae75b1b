//! Connect-time announcement.
//!
//! After every (re)connect the device creates itself if needed, declares its
//! capabilities and publishes its static properties, in that order.

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::publisher::FactPublisher;
use crate::config::AgentOptions;
use crate::error::PublishError;
use crate::fact::{InventoryUpdate, JsonFragment, OutboundFact};
use crate::transport::SmartRestTransport;

/// Device properties published once per connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceProfile<'a> {
    /// Inventory rows (hardware, position, firmware, software list, ...).
    pub inventory: &'a [InventoryUpdate<'a>],
    /// A JSON document merged into the device's managed object.
    pub custom_fragment: Option<&'a str>,
}

/// Publishes the startup sequence:
///
/// 1. `100` device creation
/// 2. `114` capabilities
/// 3. every inventory row of `profile`
/// 4. `117` required interval, if configured
/// 5. the custom JSON fragment on the inventory update topic
///
/// Stops at the first failed publish.
pub async fn announce<M: RawMutex, T: SmartRestTransport>(
    publisher: &FactPublisher<'_, M, T>,
    options: &AgentOptions<'_>,
    profile: &DeviceProfile<'_>,
) -> Result<(), PublishError<T::Error>> {
    info!("announcing device {}", options.device_name);

    publisher
        .publish_fact(&OutboundFact::Inventory(InventoryUpdate::DeviceCreation {
            name: options.device_name,
            device_type: options.device_type,
        }))
        .await?;
    publisher
        .publish_fact(&OutboundFact::Capabilities(options.capabilities))
        .await?;

    for update in profile.inventory {
        publisher
            .publish_fact(&OutboundFact::Inventory(*update))
            .await?;
    }

    if let Some(minutes) = options.required_interval {
        publisher
            .publish_fact(&OutboundFact::Inventory(InventoryUpdate::RequiredInterval(
                minutes,
            )))
            .await?;
    }

    if let Some(document) = profile.custom_fragment {
        match options.inventory_update_topic() {
            Some(topic) => {
                publisher
                    .publish_fact(&OutboundFact::CustomJson(JsonFragment {
                        topic: &topic,
                        document,
                    }))
                    .await?
            }
            None => warn!("serial too long for an inventory topic, skipping custom fragment"),
        }
    }

    debug!("device announced");
    Ok(())
}
