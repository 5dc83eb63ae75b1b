//! Example: a complete showcase agent on the host
//!
//! Wires every runtime piece together the way a device firmware would, with
//! a transport that prints each MQTT message instead of sending it.
//!
//! # Key Concepts
//!
//! - `announce` creates the device and publishes its properties
//! - `TelemetryTask` sends the periodic measurement, event and alarm batch
//! - `OperationEngine` queues downstream operations for two workers
//! - `SimulatedDevice` pretends to perform each operation
//! - Cancelling the link token stops the workers once the demo is over
//!
//! Run with `cargo run --example showcase_agent`.

use embassy_futures::join::join4;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::{Duration, Timer};
use futures::executor::block_on;
use myrtio_smartrest::fact::{
    Alarm, AlarmSeverity, Event, JsonFragment, Measurement, SeriesMeasurement, SeriesValue,
    SoftwareItem,
};
use myrtio_smartrest::json::{Document, to_document};
use myrtio_smartrest::runtime::{
    CancellationToken, DeviceProfile, FactBatch, FactPublisher, OperationEngine, SimulatedDevice,
    TelemetrySource, TelemetryTask, announce,
};
use myrtio_smartrest::{
    AgentOptions, InventoryUpdate, OutboundFact, QoS, SmartRestTransport, TransportError,
};
use serde::Serialize;

const DEVICE_NAME: &str = "showcase-device-01";
const DEVICE_SERIAL: &str = "kobu-sn-7123";
const EVENT_TOPIC: &str = "event/events/create";

/// Operations a user might schedule from the platform.
const SCHEDULED: &[&str] = &[
    "510,kobu-sn-7123",
    "511,kobu-sn-7123,\"ls -la\"",
    "515,kobu-sn-7123,myFirmware,1.0,http://www.my.url",
    "522,kobu-sn-7123,logfileA,2013-06-22T17:03:14.000+02:00,2013-06-22T18:03:14.000+02:00,ERROR,1000",
    "528,kobu-sn-7123,softwareA,1.0,url1,install,softwareB,2.0,url2,install",
    "530,kobu-sn-7123,10.0.0.67,22,eb5e9d13-1caa-486b-bdda-130ca0d87df8",
    "599,kobu-sn-7123,not for this device",
];

#[derive(Debug)]
struct Offline;

impl TransportError for Offline {}

/// Prints every message it is asked to publish.
struct StdoutTransport;

impl SmartRestTransport for StdoutTransport {
    type Error = Offline;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        let text = core::str::from_utf8(payload).map_err(|_| Offline)?;
        println!("published to {topic} (qos {}, retained {retain})", qos as u8);
        for line in text.lines() {
            println!("    {line}");
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Values {
    a: &'static str,
    b: u32,
    c: [u8; 3],
}

#[derive(Serialize)]
struct CustomProperties {
    #[serde(rename = "yourCustomFragment")]
    fragment: Values,
}

#[derive(Serialize)]
struct CustomEvent {
    #[serde(rename = "type")]
    event_type: &'static str,
    text: &'static str,
    #[serde(rename = "yourCustomFragment")]
    fragment: u32,
}

/// The periodic set: three measurements, a two-series energy reading, an
/// event, a critical alarm and a JSON event with a custom fragment.
struct Showcase {
    energy: [SeriesValue<'static>; 2],
    event: Document,
}

impl Showcase {
    fn new(event: Document) -> Self {
        let phase = "c8y_SinglePhaseEnergyMeasurement";
        Self {
            energy: [
                SeriesValue {
                    fragment: phase,
                    series: "A1",
                    value: 1234.0,
                    unit: "kWh",
                },
                SeriesValue {
                    fragment: phase,
                    series: "A2",
                    value: 2345.0,
                    unit: "kWh",
                },
            ],
            event,
        }
    }
}

impl TelemetrySource for Showcase {
    fn sample<'s>(&'s mut self, batch: &mut FactBatch<'s>) {
        let readings = [
            ("temperature", "T", 15.0),
            ("pressure", "p", 15.0),
            ("yourMeasurementCategory", "yourMeasurementName", 16.0),
        ];
        let facts = readings
            .into_iter()
            .map(|(fragment, series, value)| {
                OutboundFact::Measurement(Measurement {
                    fragment,
                    series,
                    value,
                    unit: None,
                    time: None,
                })
            })
            .chain([
                OutboundFact::SeriesMeasurement(SeriesMeasurement {
                    measurement_type: "yourMeaType",
                    time: None,
                    values: &self.energy,
                }),
                OutboundFact::Event(Event {
                    event_type: "yourEventType",
                    text: "Your Event description",
                    time: None,
                }),
                OutboundFact::Alarm(Alarm {
                    severity: AlarmSeverity::Critical,
                    alarm_type: "yourAlarmType",
                    text: "here is your alarm text",
                    time: None,
                }),
                OutboundFact::CustomJson(JsonFragment {
                    topic: EVENT_TOPIC,
                    document: &self.event,
                }),
            ]);
        for fact in facts {
            if batch.push(fact).is_err() {
                println!("telemetry batch full, dropping the rest");
                break;
            }
        }
    }
}

fn main() {
    let options = AgentOptions::new(DEVICE_NAME, DEVICE_SERIAL)
        .with_device_type("yourDeviceType")
        .with_telemetry_interval(Duration::from_secs(5))
        .with_required_interval(60);

    let properties = to_document::<_, 128>(&CustomProperties {
        fragment: Values {
            a: "abc",
            b: 123,
            c: [1, 2, 3],
        },
    });
    let event: Result<Document, _> = to_document(&CustomEvent {
        event_type: "myCustomEventType",
        text: "Your new Event",
        fragment: 123,
    });
    let (properties, event) = match (properties, event) {
        (Ok(properties), Ok(event)) => (properties, event),
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("could not build JSON documents: {err}");
            return;
        }
    };

    let software = [
        SoftwareItem {
            name: "software1",
            version: "1.0.1",
            url: "url1",
        },
        SoftwareItem {
            name: "software2",
            version: "1.0.2",
            url: "url2",
        },
        SoftwareItem {
            name: "software3",
            version: "1.0.3",
            url: "",
        },
    ];
    let inventory = [
        InventoryUpdate::Firmware {
            name: "firmwareName",
            version: "firmwareVersion",
            url: "firmwareUrl",
        },
        InventoryUpdate::SoftwareList(&software),
        InventoryUpdate::Hardware {
            serial: DEVICE_SERIAL,
            model: "myHardwareModel",
            revision: "1.2.3",
        },
        InventoryUpdate::Position {
            latitude: 50.323423,
            longitude: 6.423423,
            altitude: None,
            accuracy: None,
        },
        InventoryUpdate::LogfileTypes(&["dpkg", "container", "logread"]),
        InventoryUpdate::Agent {
            name: "your-device-agent",
            version: "0.1",
            url: "https://cumulocity.com",
            maintainer: "Korbinian Butz",
        },
    ];
    let profile = DeviceProfile {
        inventory: &inventory,
        custom_fragment: Some(properties.as_str()),
    };

    let link = CancellationToken::<NoopRawMutex>::new();
    let stop = CancellationToken::<NoopRawMutex>::new();
    let publisher = FactPublisher::new(StdoutTransport, options.upstream_topic, &link);
    let engine = OperationEngine::<_, _, 4>::new(&publisher, options.downstream_topic);
    let telemetry = TelemetryTask::new(&publisher, options.telemetry_interval, &stop);
    let device = SimulatedDevice::<NoopRawMutex>::new(Duration::from_secs(3));

    block_on(async {
        if let Err(err) = announce(&publisher, &options, &profile).await {
            eprintln!("startup failed: {err}");
            return;
        }

        join4(
            engine.run_worker(&device),
            engine.run_worker(&device),
            telemetry.run(Showcase::new(event)),
            async {
                for row in SCHEDULED {
                    Timer::after(Duration::from_secs(2)).await;
                    println!("received on {}: {row}", options.downstream_topic);
                    let summary = engine
                        .handle_message(options.downstream_topic, row.as_bytes())
                        .await;
                    println!("    {summary:?}");
                }
                // Let the last operations finish before going offline.
                Timer::after(Duration::from_secs(10)).await;
                stop.cancel();
                link.cancel();
            },
        )
        .await;

        if let Some((name, version)) = device.firmware() {
            println!("firmware now {name} {version}");
        }
        println!("{} packages installed", device.software().len());
    });
}
