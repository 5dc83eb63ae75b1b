mod support;

use embassy_futures::join::join;
use embassy_futures::yield_now;
use embassy_time::Duration;
use futures::executor::block_on;
use myrtio_smartrest::fact::{
    Alarm, AlarmSeverity, Event, JsonFragment, Measurement, SoftwareItem,
};
use myrtio_smartrest::json::{Document, JsonEvent, to_document};
use myrtio_smartrest::runtime::{DeviceProfile, FactBatch, TelemetrySource, TelemetryTask, announce};
use myrtio_smartrest::{AgentOptions, InventoryUpdate, OutboundFact, decode_all};
use serde::Serialize;

use support::{Link, Recorder, publisher};

#[derive(Serialize)]
struct Values<'a> {
    a: &'a str,
}

#[derive(Serialize)]
struct Custom<'a> {
    #[serde(rename = "yourCustomFragment")]
    fragment: Values<'a>,
}

#[test]
fn startup_announces_device_then_capabilities_then_properties() {
    let link = Link::new();
    let recorder = Recorder::default();
    let publisher = publisher(&recorder, &link);
    let options = AgentOptions::new("showcase-device-01", "kobu-sn-7123")
        .with_device_type("yourDeviceType")
        .with_capabilities(&["c8y_Restart", "c8y_Firmware", "c8y_SoftwareUpdate"])
        .with_required_interval(5);

    let fragment: Document = to_document(&Custom {
        fragment: Values { a: "abc" },
    })
    .unwrap();

    let software = [SoftwareItem {
        name: "sw1",
        version: "1.0",
        url: "",
    }];
    let inventory = [
        InventoryUpdate::Hardware {
            serial: "kobu-sn-7123",
            model: "yourModel",
            revision: "1.0",
        },
        InventoryUpdate::Position {
            latitude: 50.323423,
            longitude: 6.423423,
            altitude: None,
            accuracy: None,
        },
        InventoryUpdate::Firmware {
            name: "fwA",
            version: "1.0",
            url: "",
        },
        InventoryUpdate::SoftwareList(&software),
    ];
    let profile = DeviceProfile {
        inventory: &inventory,
        custom_fragment: Some(fragment.as_str()),
    };

    block_on(announce(&publisher, &options, &profile)).unwrap();

    assert_eq!(
        recorder.payloads(),
        [
            "100,showcase-device-01,yourDeviceType",
            "114,c8y_Restart,c8y_Firmware,c8y_SoftwareUpdate",
            "110,kobu-sn-7123,yourModel,1.0",
            "112,50.323423,6.423423",
            "115,fwA,1.0,",
            "116,sw1,1.0,",
            "117,5",
            r#"{"yourCustomFragment":{"a":"abc"}}"#,
        ]
    );
    assert_eq!(
        recorder.topics().last().map(|t| t.as_str()),
        Some("inventory/managedObjects/update/kobu-sn-7123")
    );
}

/// Temperature, a door event and a custom JSON event per tick.
struct Sensors<'t> {
    ticks: u32,
    stop_after: u32,
    link: &'t Link,
    tick_event: Document,
}

impl<'t> Sensors<'t> {
    fn new(stop_after: u32, link: &'t Link) -> Self {
        let tick_event = to_document(&JsonEvent {
            event_type: "c8y_Tick",
            text: "tick",
            time: None,
        })
        .unwrap();
        Self {
            ticks: 0,
            stop_after,
            link,
            tick_event,
        }
    }
}

impl TelemetrySource for Sensors<'_> {
    fn sample<'s>(&'s mut self, batch: &mut FactBatch<'s>) {
        self.ticks += 1;
        let _ = batch.push(OutboundFact::Measurement(Measurement {
            fragment: "temperature",
            series: "T",
            value: 15.0,
            unit: None,
            time: None,
        }));
        let _ = batch.push(OutboundFact::CustomJson(JsonFragment {
            topic: "event/events/create",
            document: &self.tick_event,
        }));
        let _ = batch.push(OutboundFact::Event(Event {
            event_type: "c8y_Door",
            text: "Door, opened",
            time: None,
        }));
        if self.ticks >= self.stop_after {
            self.link.cancel();
        }
    }
}

#[test]
fn telemetry_batches_rows_and_stops_on_cancel() {
    let link = Link::new();
    let stop = Link::new();
    let recorder = Recorder::default();
    let publisher = publisher(&recorder, &link);
    let task = TelemetryTask::new(&publisher, Duration::from_millis(5), &stop);

    block_on(task.run(Sensors::new(2, &stop)));

    let rows = "200,temperature,T,15\n400,c8y_Door,\"Door, opened\"";
    assert_eq!(
        recorder.payloads(),
        [
            rows,
            r#"{"type":"c8y_Tick","text":"tick"}"#,
            rows,
            r#"{"type":"c8y_Tick","text":"tick"}"#,
        ]
    );
    assert_eq!(
        recorder.topics(),
        ["s/us", "event/events/create", "s/us", "event/events/create"]
    );

    // A batched payload decodes back into its rows.
    let decoded: Vec<_> = decode_all(rows.as_bytes())
        .unwrap()
        .map(|(_, row)| row.unwrap())
        .collect();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[1].field(2), Some("Door, opened"));
}

#[test]
fn telemetry_stops_while_waiting_for_the_next_tick() {
    let link = Link::new();
    let stop = Link::new();
    let recorder = Recorder::default();
    let publisher = publisher(&recorder, &link);
    let task = TelemetryTask::new(&publisher, Duration::from_secs(3600), &stop);

    block_on(join(
        task.run(Sensors::new(u32::MAX, &stop)),
        async {
            while recorder.payloads().len() < 2 {
                yield_now().await;
            }
            stop.cancel();
        },
    ));

    assert_eq!(recorder.payloads().len(), 2);
}

#[test]
fn alarms_are_batched_into_one_upstream_message() {
    let link = Link::new();
    let recorder = Recorder::default();
    let publisher = publisher(&recorder, &link);

    let facts = [
        OutboundFact::Alarm(Alarm {
            severity: AlarmSeverity::Critical,
            alarm_type: "c8y_TemperatureAlarm",
            text: "too hot",
            time: None,
        }),
        OutboundFact::Alarm(Alarm {
            severity: AlarmSeverity::Warning,
            alarm_type: "c8y_BatteryAlarm",
            text: "low",
            time: None,
        }),
    ];
    assert_eq!(block_on(publisher.publish_batch(&facts)).unwrap(), 1);
    assert_eq!(
        recorder.payloads(),
        ["301,c8y_TemperatureAlarm,too hot\n304,c8y_BatteryAlarm,low"]
    );
}
