/*
 *  view.rs
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
//! View projection: resolve the measurement store into a complete,
//! display-ready snapshot at one instant.
//!
//! `project` never fails. Stale or absent metrics come out as placeholders,
//! a malformed upstream field degrades only the fields derived from it, and
//! the weather sub-view degrades wholesale rather than showing a current
//! reading against a missing forecast.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value as JsonValue;
use std::time::SystemTime;

use crate::constants::{
    AQI_PLACEHOLDER, FORECAST_HOURS, GRAPH_MIN_SPAN, KEY_AQI, KEY_WEATHER_CURRENT,
    KEY_WEATHER_FORECAST, MAX_AGE_AQI, MAX_AGE_CURRENT, MAX_AGE_DAILY, MAX_AGE_WEATHER,
    TEMP_PLACEHOLDER,
};
use crate::store::MeasurementStore;
use crate::sun::{self, Observer};
use crate::weather::code_description;

/// One column of the hourly forecast strip.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastHour {
    pub hour: String,
    pub temperature: f64,
    pub weather_code: i64,
    pub precipitation_probability: f64,
    /// Day/night at this entry's own time, not at projection time.
    pub is_dark: bool,
}

/// Current, daily-high, and daily-low strings for one sensor zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneReadout {
    pub current: String,
    pub high: String,
    pub low: String,
}

/// The fully-resolved snapshot handed to the renderer. Value data only;
/// consumed once per render cycle and discarded.
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub weather_description: String,
    pub weather_code: i64,
    pub current_date: String,
    pub current_temp: String,
    pub is_dark: bool,
    pub daily_temp_high: String,
    pub daily_temp_low: String,
    pub forecast: Vec<ForecastHour>,
    pub graph_min: f64,
    pub graph_max: f64,
    pub nursery: ZoneReadout,
    pub basement: ZoneReadout,
    pub aqi: String,
    pub last_refreshed: String,
}

/// Temperature axis for the forecast graph: a symmetric window around the
/// midpoint, at least `GRAPH_MIN_SPAN` wide, widened outward until every
/// input value fits. Empty input falls back to [0, 100].
pub fn graph_range(values: &[f64]) -> (f64, f64) {
    let Some(first) = values.first() else {
        return (0.0, 100.0);
    };
    let (mut low, mut high) = (*first, *first);
    for &v in values {
        low = low.min(v);
        high = high.max(v);
    }
    let mid = low + (high - low) / 2.0;
    let mut graph_min = mid - GRAPH_MIN_SPAN / 2.0;
    let mut graph_max = mid + GRAPH_MIN_SPAN / 2.0;
    if high > graph_max {
        graph_max = high;
    }
    if low < graph_min {
        graph_min = low;
    }
    (graph_min, graph_max)
}

fn fmt_temp(v: f64) -> String {
    format!("{v:.0}")
}

fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

// Intermediate weather fields before they are folded into the view.
struct WeatherPart {
    description: String,
    code: i64,
    current_temp: String,
    daily_high: String,
    daily_low: String,
    forecast: Vec<ForecastHour>,
    graph_min: f64,
    graph_max: f64,
}

impl WeatherPart {
    fn placeholders() -> Self {
        WeatherPart {
            description: TEMP_PLACEHOLDER.to_string(),
            code: 0,
            current_temp: TEMP_PLACEHOLDER.to_string(),
            daily_high: TEMP_PLACEHOLDER.to_string(),
            daily_low: TEMP_PLACEHOLDER.to_string(),
            forecast: Vec::new(),
            graph_min: 0.0,
            graph_max: 100.0,
        }
    }
}

fn forecast_hour(entry: &JsonValue, observer: &Observer, tz: Tz) -> Option<ForecastHour> {
    let when = DateTime::parse_from_rfc3339(entry["time"].as_str()?)
        .ok()?
        .with_timezone(&Utc);
    let values = &entry["values"];
    Some(ForecastHour {
        hour: when.with_timezone(&tz).format("%-I %p").to_string(),
        temperature: values["temperature"].as_f64()?,
        weather_code: values["weatherCode"].as_i64().unwrap_or(0),
        precipitation_probability: values["precipitationProbability"].as_f64().unwrap_or(0.0),
        is_dark: sun::is_dark(observer, when.into()),
    })
}

fn weather_part(
    store: &MeasurementStore,
    observer: &Observer,
    tz: Tz,
    now: SystemTime,
    dark_now: bool,
) -> WeatherPart {
    // Both payloads must be present and fresh, or the whole sub-view
    // degrades: current conditions against a vanished forecast read as a
    // working dashboard when it is not.
    let current = store
        .get_fresh_at(KEY_WEATHER_CURRENT, MAX_AGE_WEATHER, now)
        .and_then(|v| v.as_doc().cloned());
    let forecast = store
        .get_fresh_at(KEY_WEATHER_FORECAST, MAX_AGE_WEATHER, now)
        .and_then(|v| v.as_doc().cloned());
    let (Some(current), Some(forecast)) = (current, forecast) else {
        return WeatherPart::placeholders();
    };

    let mut part = WeatherPart::placeholders();

    let values = &current["data"]["values"];
    if let Some(temp) = values["temperature"].as_f64() {
        part.current_temp = fmt_temp(temp);
    }
    part.code = values["weatherCode"].as_i64().unwrap_or(0);
    part.description = code_description(part.code).to_string();
    if dark_now && part.code == 1000 {
        // No sun to be sunny with.
        part.description = "Clear".to_string();
    }

    let daily = &forecast["timelines"]["daily"][0]["values"];
    if let Some(max) = daily["temperatureMax"].as_f64() {
        part.daily_high = fmt_temp(max);
    }
    if let Some(min) = daily["temperatureMin"].as_f64() {
        part.daily_low = fmt_temp(min);
    }

    if let Some(hourly) = forecast["timelines"]["hourly"].as_array() {
        part.forecast = hourly
            .iter()
            .filter_map(|entry| forecast_hour(entry, observer, tz))
            .take(FORECAST_HOURS)
            .collect();
    }
    if !part.forecast.is_empty() {
        let temps: Vec<f64> = part.forecast.iter().map(|h| h.temperature).collect();
        (part.graph_min, part.graph_max) = graph_range(&temps);
    }

    part
}

fn zone_readout(
    store: &MeasurementStore,
    now: SystemTime,
    prefix: &str,
    convert: fn(f64) -> f64,
) -> ZoneReadout {
    let read = |suffix: &str, max_age| {
        store
            .get_fresh_at(&format!("{prefix}_{suffix}"), max_age, now)
            .and_then(|v| v.as_scalar())
            .map(|v| fmt_temp(convert(v)))
            .unwrap_or_else(|| TEMP_PLACEHOLDER.to_string())
    };
    ZoneReadout {
        current: read("temp", MAX_AGE_CURRENT),
        high: read("high", MAX_AGE_DAILY),
        low: read("low", MAX_AGE_DAILY),
    }
}

/// Resolve the store into a complete view at `now`. Pure with respect to its
/// inputs; every absence becomes a placeholder and nothing here can fail.
pub fn project(store: &MeasurementStore, observer: &Observer, tz: Tz, now: SystemTime) -> RenderedView {
    let local_now = DateTime::<Utc>::from(now).with_timezone(&tz);
    let dark_now = sun::is_dark(observer, now);
    let weather = weather_part(store, observer, tz, now, dark_now);

    RenderedView {
        weather_description: weather.description,
        weather_code: weather.code,
        current_date: local_now.format("%A, %B %-d").to_string(),
        current_temp: weather.current_temp,
        is_dark: dark_now,
        daily_temp_high: weather.daily_high,
        daily_temp_low: weather.daily_low,
        forecast: weather.forecast,
        graph_min: weather.graph_min,
        graph_max: weather.graph_max,
        nursery: zone_readout(store, now, "nursery", celsius_to_fahrenheit),
        basement: zone_readout(store, now, "basement", |f| f),
        aqi: store
            .get_fresh_at(KEY_AQI, MAX_AGE_AQI, now)
            .and_then(|v| v.as_scalar())
            .map(|v| format!("{v:.0}"))
            .unwrap_or_else(|| AQI_PLACEHOLDER.to_string()),
        last_refreshed: local_now.format("%-I:%M %p").to_string(),
    }
}
