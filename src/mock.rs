/*
 *  mock.rs
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
//! Offline mode: seed the store from local fixtures instead of the network.
//!
//! The fixtures land under the same keys the live producers own, so the
//! store, projector, and render pipeline behave identically either way.

use log::info;
use serde_json::Value as JsonValue;
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::aqi::AqiClient;
use crate::constants::{KEY_AQI, KEY_WEATHER_CURRENT, KEY_WEATHER_FORECAST};
use crate::store::{MeasurementStore, Value};

fn read_doc(dir: &Path, name: &str) -> Result<JsonValue, Box<dyn Error>> {
    let body = fs::read_to_string(dir.join(name))?;
    Ok(serde_json::from_str(&body)?)
}

/// Seed every producer-owned key once from `fixture_dir`.
pub fn seed(store: &MeasurementStore, fixture_dir: &Path) -> Result<(), Box<dyn Error>> {
    store.put(
        KEY_WEATHER_CURRENT,
        Value::Doc(read_doc(fixture_dir, "weather_current.json")?),
    );
    store.put(
        KEY_WEATHER_FORECAST,
        Value::Doc(read_doc(fixture_dir, "weather_forecast.json")?),
    );

    let aqi_doc = read_doc(fixture_dir, "aqi.json")?;
    store.put(KEY_AQI, Value::Scalar(AqiClient::extract(&aqi_doc)?));

    // Fixed zone readings, matching what the bus publishes on a mild day:
    // nursery in Celsius, basement in Fahrenheit.
    for (key, value) in [
        ("nursery_temp", 19.4),
        ("nursery_low", 18.2),
        ("nursery_high", 20.2),
        ("basement_temp", 66.1),
        ("basement_low", 65.5),
        ("basement_high", 67.0),
    ] {
        store.put(key, Value::Scalar(value));
    }

    info!("mock fixtures seeded from {}", fixture_dir.display());
    Ok(())
}
