//! # Outbound Facts
//!
//! Everything the device tells the platform: inventory, capabilities,
//! measurements, events, alarms, operation status and custom JSON fragments.
//! A fact is built, encoded, published and dropped; nothing here owns data
//! beyond the borrow of the values it reports.

use heapless::String;

use crate::error::RowError;
use crate::operation::{OperationKind, OperationOutcome};
use crate::row::RowWriter;
use crate::template::describe;

/// One installed software entry for template `116`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareItem<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub url: &'a str,
}

/// Inventory templates describing the device itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InventoryUpdate<'a> {
    /// `100`: creates the device if it does not exist yet.
    DeviceCreation { name: &'a str, device_type: &'a str },
    /// `110`
    Hardware {
        serial: &'a str,
        model: &'a str,
        revision: &'a str,
    },
    /// `112`
    Position {
        latitude: f64,
        longitude: f64,
        altitude: Option<f64>,
        accuracy: Option<u32>,
    },
    /// `115`
    Firmware {
        name: &'a str,
        version: &'a str,
        url: &'a str,
    },
    /// `116`: replaces the full installed-software list.
    SoftwareList(&'a [SoftwareItem<'a>]),
    /// `117`, in minutes.
    RequiredInterval(u32),
    /// `118`
    LogfileTypes(&'a [&'a str]),
    /// `122`
    Agent {
        name: &'a str,
        version: &'a str,
        url: &'a str,
        maintainer: &'a str,
    },
}

/// A single-value measurement, template `200`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement<'a> {
    pub fragment: &'a str,
    pub series: &'a str,
    pub value: f64,
    pub unit: Option<&'a str>,
    pub time: Option<&'a str>,
}

/// One series of a [`SeriesMeasurement`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesValue<'a> {
    pub fragment: &'a str,
    pub series: &'a str,
    pub value: f64,
    pub unit: &'a str,
}

/// A multi-series measurement, template `201`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesMeasurement<'a> {
    pub measurement_type: &'a str,
    pub time: Option<&'a str>,
    pub values: &'a [SeriesValue<'a>],
}

/// An event, template `400`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<'a> {
    pub event_type: &'a str,
    pub text: &'a str,
    pub time: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmSeverity {
    Critical,
    Major,
    Minor,
    Warning,
}

impl AlarmSeverity {
    pub fn template(self) -> &'static str {
        match self {
            AlarmSeverity::Critical => "301",
            AlarmSeverity::Major => "302",
            AlarmSeverity::Minor => "303",
            AlarmSeverity::Warning => "304",
        }
    }
}

/// An alarm, templates `301` to `304` depending on severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alarm<'a> {
    pub severity: AlarmSeverity,
    pub alarm_type: &'a str,
    pub text: &'a str,
    pub time: Option<&'a str>,
}

/// An operation status transition, templates `501` to `503`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationStatus<'a> {
    pub kind: OperationKind,
    pub outcome: &'a OperationOutcome,
}

/// A caller-built JSON document for a JSON-via-MQTT topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonFragment<'a> {
    pub topic: &'a str,
    pub document: &'a str,
}

/// Anything the device publishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutboundFact<'a> {
    Inventory(InventoryUpdate<'a>),
    /// `114`: the operations and features the device supports.
    Capabilities(&'a [&'a str]),
    Measurement(Measurement<'a>),
    SeriesMeasurement(SeriesMeasurement<'a>),
    Event(Event<'a>),
    Alarm(Alarm<'a>),
    OperationStatus(OperationStatus<'a>),
    CustomJson(JsonFragment<'a>),
}

impl<'a> OutboundFact<'a> {
    /// Status fact for an operation transition.
    pub fn status(kind: OperationKind, outcome: &'a OperationOutcome) -> Self {
        OutboundFact::OperationStatus(OperationStatus { kind, outcome })
    }

    /// The dedicated topic of a JSON fact; row facts go to the upstream topic.
    pub fn json_topic(&self) -> Option<&'a str> {
        match self {
            OutboundFact::CustomJson(fragment) => Some(fragment.topic),
            _ => None,
        }
    }

    /// The template identifier of a row fact.
    pub fn template(&self) -> Option<&'static str> {
        let id = match self {
            OutboundFact::Inventory(update) => match update {
                InventoryUpdate::DeviceCreation { .. } => "100",
                InventoryUpdate::Hardware { .. } => "110",
                InventoryUpdate::Position { .. } => "112",
                InventoryUpdate::Firmware { .. } => "115",
                InventoryUpdate::SoftwareList(_) => "116",
                InventoryUpdate::RequiredInterval(_) => "117",
                InventoryUpdate::LogfileTypes(_) => "118",
                InventoryUpdate::Agent { .. } => "122",
            },
            OutboundFact::Capabilities(_) => "114",
            OutboundFact::Measurement(_) => "200",
            OutboundFact::SeriesMeasurement(_) => "201",
            OutboundFact::Event(_) => "400",
            OutboundFact::Alarm(alarm) => alarm.severity.template(),
            OutboundFact::OperationStatus(status) => match status.outcome {
                OperationOutcome::Executing => "501",
                OperationOutcome::Failed(_) => "502",
                OperationOutcome::Successful => "503",
            },
            OutboundFact::CustomJson(_) => return None,
        };
        Some(id)
    }

    /// Appends this fact to `out`.
    ///
    /// Row facts become one escaped row, separated by a newline from anything
    /// already in `out`. A row with fewer fields than its template requires,
    /// or with a partial repeating group, is refused and `out` is left as it
    /// was. JSON facts append their document verbatim and should be given a
    /// buffer of their own.
    pub fn encode<const N: usize>(&self, out: &mut String<N>) -> Result<(), RowError> {
        let Some(template) = self.template() else {
            if let OutboundFact::CustomJson(fragment) = self {
                out.push_str(fragment.document)
                    .map_err(|_| RowError::RowTooLong)?;
            }
            return Ok(());
        };

        let start = out.len();
        let mut w = RowWriter::new(out);
        w.begin(template)?;
        self.encode_fields(&mut w)?;
        let found = w.fields();
        if let Some(descriptor) = describe(template)
            && descriptor.check_count(found).is_err()
        {
            out.truncate(start);
            return Err(RowError::Nonconforming { template, found });
        }
        Ok(())
    }

    fn encode_fields<const N: usize>(&self, w: &mut RowWriter<'_, N>) -> Result<(), RowError> {
        match *self {
            OutboundFact::Inventory(update) => encode_inventory(w, update)?,
            OutboundFact::Capabilities(fragments) => {
                for fragment in fragments {
                    w.field(fragment)?;
                }
            }
            OutboundFact::Measurement(m) => {
                w.field(m.fragment)?.field(m.series)?.display(m.value)?;
                if m.unit.is_some() || m.time.is_some() {
                    w.optional(m.unit)?;
                }
                if let Some(time) = m.time {
                    w.field(time)?;
                }
            }
            OutboundFact::SeriesMeasurement(m) => {
                w.field(m.measurement_type)?.optional(m.time)?;
                for value in m.values {
                    w.field(value.fragment)?
                        .field(value.series)?
                        .display(value.value)?
                        .field(value.unit)?;
                }
            }
            OutboundFact::Event(event) => {
                w.field(event.event_type)?.field(event.text)?;
                if let Some(time) = event.time {
                    w.field(time)?;
                }
            }
            OutboundFact::Alarm(alarm) => {
                w.field(alarm.alarm_type)?.field(alarm.text)?;
                if let Some(time) = alarm.time {
                    w.field(time)?;
                }
            }
            OutboundFact::OperationStatus(status) => {
                w.field(status.kind.capability())?;
                if let OperationOutcome::Failed(failure) = status.outcome {
                    w.field(failure.reason())?;
                }
            }
            OutboundFact::CustomJson(_) => {}
        }
        Ok(())
    }
}

fn encode_inventory<const N: usize>(
    w: &mut RowWriter<'_, N>,
    update: InventoryUpdate<'_>,
) -> Result<(), RowError> {
    match update {
        InventoryUpdate::DeviceCreation { name, device_type } => {
            w.field(name)?.field(device_type)?;
        }
        InventoryUpdate::Hardware {
            serial,
            model,
            revision,
        } => {
            w.field(serial)?.field(model)?.field(revision)?;
        }
        InventoryUpdate::Position {
            latitude,
            longitude,
            altitude,
            accuracy,
        } => {
            w.display(latitude)?.display(longitude)?;
            if let Some(altitude) = altitude {
                w.display(altitude)?;
            } else if accuracy.is_some() {
                w.field("")?;
            }
            if let Some(accuracy) = accuracy {
                w.display(accuracy)?;
            }
        }
        InventoryUpdate::Firmware { name, version, url } => {
            w.field(name)?.field(version)?.field(url)?;
        }
        InventoryUpdate::SoftwareList(items) => {
            for item in items {
                w.field(item.name)?.field(item.version)?.field(item.url)?;
            }
        }
        InventoryUpdate::RequiredInterval(minutes) => {
            w.display(minutes)?;
        }
        InventoryUpdate::LogfileTypes(types) => {
            for log_type in types {
                w.field(log_type)?;
            }
        }
        InventoryUpdate::Agent {
            name,
            version,
            url,
            maintainer,
        } => {
            w.field(name)?.field(version)?.field(url)?.field(maintainer)?;
        }
    }
    Ok(())
}
