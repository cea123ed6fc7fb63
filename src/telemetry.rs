/*
 *  telemetry.rs
 *
 *  inkboard - slow glass for fast data
 *  (c) 2023-26 inkboard contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
//! Telemetry producer: a persistent MQTT subscription feeding per-zone
//! current temperature plus daily high/low records.
//!
//! Rollover is lazy: highs and lows are discarded by the first reading whose
//! local calendar day differs from the one recorded on them, never by a
//! clock-driven sweep. A zone that goes silent keeps its last records until
//! the staleness window hides them.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use log::{debug, error, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::num::ParseFloatError;
use std::time::{Duration, SystemTime};

use crate::constants::MQTT_RECONNECT_DELAY;
use crate::store::{MeasurementStore, Value};

/// The two physical sensor zones, distinguished by topic substring.
/// Nursery payloads are Celsius; basement payloads are Fahrenheit. The unit
/// is resolved at projection time — the store holds readings as published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Nursery,
    Basement,
}

impl Zone {
    pub fn from_topic(topic: &str) -> Option<Self> {
        if topic.contains("tmp102") {
            Some(Zone::Nursery)
        } else if topic.contains("sht41") {
            Some(Zone::Basement)
        } else {
            None
        }
    }

    pub fn key_prefix(self) -> &'static str {
        match self {
            Zone::Nursery => "nursery",
            Zone::Basement => "basement",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub nursery_topic: String,
    pub basement_topic: String,
}

enum Extremum {
    High,
    Low,
}

fn local_day(at: SystemTime, tz: Tz) -> NaiveDate {
    DateTime::<Utc>::from(at).with_timezone(&tz).date_naive()
}

fn update_extremum(
    store: &MeasurementStore,
    key: &str,
    value: f64,
    at: SystemTime,
    day: NaiveDate,
    tz: Tz,
    kind: Extremum,
) {
    // Lazy rollover: a record from a different local calendar day is treated
    // as absent, so the incoming reading replaces it unconditionally.
    let standing = store
        .get(key)
        .filter(|m| local_day(m.timestamp, tz) == day)
        .and_then(|m| m.value.as_scalar());
    let replace = match (kind, standing) {
        (_, None) => true,
        (Extremum::High, Some(prev)) => value > prev,
        (Extremum::Low, Some(prev)) => value < prev,
    };
    if replace {
        store.put_at(key, Value::Scalar(value), at);
    }
}

/// Apply one zone reading: update the current value unconditionally, then
/// the daily high and low with day-rollover semantics. A payload that does
/// not parse as a number is rejected before anything is written, so a bad
/// message can never corrupt the standing records.
pub fn record_reading(
    store: &MeasurementStore,
    zone: Zone,
    payload: &str,
    at: SystemTime,
    tz: Tz,
) -> Result<(), ParseFloatError> {
    let value: f64 = payload.trim().parse()?;
    let prefix = zone.key_prefix();

    store.put_at(&format!("{prefix}_temp"), Value::Scalar(value), at);

    let day = local_day(at, tz);
    update_extremum(store, &format!("{prefix}_high"), value, at, day, tz, Extremum::High);
    update_extremum(store, &format!("{prefix}_low"), value, at, day, tz, Extremum::Low);
    Ok(())
}

fn handle_publish(store: &MeasurementStore, topic: &str, payload: &[u8], tz: Tz) {
    let Some(zone) = Zone::from_topic(topic) else {
        debug!("ignoring message on unrecognized topic {}", topic);
        return;
    };
    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to handle telemetry message on {}: {}", topic, e);
            return;
        }
    };
    if let Err(e) = record_reading(store, zone, text, SystemTime::now(), tz) {
        warn!(
            "Failed to handle telemetry message on {} ({:?}): {}",
            topic, text, e
        );
    }
}

/// Long-running subscription task. Per-message faults are logged and the
/// stream continues; a connection fault tears the session down and a fresh
/// client resubscribes after a short fixed delay.
pub async fn run(bus: BusConfig, store: MeasurementStore, tz: Tz) {
    loop {
        let mut options = MqttOptions::new("inkboard", &bus.host, bus.port);
        options.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(options, 16);

        // Requests queue locally and flush once the broker acknowledges the
        // connection, so subscribing up front is safe.
        for topic in [bus.nursery_topic.as_str(), bus.basement_topic.as_str()] {
            if let Err(e) = client.subscribe(topic, QoS::AtMostOnce).await {
                error!("Failed to subscribe to {}: {}", topic, e);
            }
        }

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    handle_publish(&store, &msg.topic, &msg.payload, tz);
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        "Connection lost; Reconnecting in {} seconds ... ({})",
                        MQTT_RECONNECT_DELAY.as_secs(),
                        e
                    );
                    break;
                }
            }
        }

        tokio::time::sleep(MQTT_RECONNECT_DELAY).await;
    }
}
