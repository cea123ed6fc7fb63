/*
 *  weather.rs
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
//! Weather producer: polls the tomorrow.io realtime and forecast endpoints
//! and writes both payloads into the measurement store. The payloads are
//! stored as whole JSON documents; the projector picks fields out of them
//! so that one malformed field degrades only itself.

use log::{error, info};
use reqwest::{Client, StatusCode, header};
use serde_json::{Error as JsonError, Value as JsonValue};
use std::fmt::{self, Display};
use std::time::Duration;

use crate::constants::{KEY_WEATHER_CURRENT, KEY_WEATHER_FORECAST, WEATHER_POLL_INTERVAL};
use crate::store::{MeasurementStore, Value};

const REALTIME_URL: &str = "https://api.tomorrow.io/v4/weather/realtime";
const FORECAST_URL: &str = "https://api.tomorrow.io/v4/weather/forecast";

/// Human-readable label for a tomorrow.io weather code. Unknown codes map to
/// "Unknown" rather than failing the projection.
pub fn code_description(code: i64) -> &'static str {
    match code {
        1000 => "Clear, Sunny",
        1100 => "Mostly Clear",
        1101 => "Partly Cloudy",
        1102 => "Mostly Cloudy",
        1001 => "Cloudy",
        2000 => "Fog",
        2100 => "Light Fog",
        4000 => "Drizzle",
        4001 => "Rain",
        4200 => "Light Rain",
        4201 => "Heavy Rain",
        5000 => "Snow",
        5001 => "Flurries",
        5100 => "Light Snow",
        5101 => "Heavy Snow",
        6000 | 6001 | 6200 | 6201 => "Freezing Rain",
        7000 | 7101 | 7102 => "Ice Pellets",
        8000 => "Thunderstorm",
        _ => "Unknown",
    }
}

/// Every code the upstream vocabulary defines; kept in one place so the
/// completeness test and the mapping cannot drift apart.
#[allow(dead_code)]
pub const KNOWN_CODES: [i64; 24] = [
    0, 1000, 1100, 1101, 1102, 1001, 2000, 2100, 4000, 4001, 4200, 4201, 5000, 5001, 5100, 5101,
    6000, 6001, 6200, 6201, 7000, 7101, 7102, 8000,
];

// Error type for weather API operations.
#[derive(Debug)]
pub enum WeatherApiError {
    HttpRequestError(reqwest::Error),
    BadStatus(StatusCode),
    DeserializationError(JsonError),
}

impl Display for WeatherApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherApiError::HttpRequestError(e) => write!(f, "HTTP request error: {}", e),
            WeatherApiError::BadStatus(code) => {
                write!(f, "non-success response from weather API: {}", code)
            }
            WeatherApiError::DeserializationError(e) => {
                write!(f, "JSON deserialization error: {}", e)
            }
        }
    }
}

impl std::error::Error for WeatherApiError {}

impl From<reqwest::Error> for WeatherApiError {
    fn from(err: reqwest::Error) -> Self {
        WeatherApiError::HttpRequestError(err)
    }
}

impl From<JsonError> for WeatherApiError {
    fn from(err: JsonError) -> Self {
        WeatherApiError::DeserializationError(err)
    }
}

/// Client for the two tomorrow.io endpoints.
#[derive(Debug)]
pub struct WeatherClient {
    client: Client,
    api_key: String,
    location: String,
}

impl WeatherClient {
    pub fn new(api_key: &str, location: &str) -> Self {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .default_headers(headers)
            .build()
            .expect("reqwest client construction cannot fail with static options");

        WeatherClient {
            client,
            api_key: api_key.to_string(),
            location: location.to_string(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<JsonValue, WeatherApiError> {
        let response = self
            .client
            .get(url)
            .query(&[
                ("units", "imperial"),
                ("location", self.location.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WeatherApiError::BadStatus(response.status()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// One polling attempt: realtime first, then forecast. A payload that
    /// made it back intact is stored even when the following request fails,
    /// so a half-successful poll still refreshes what it can.
    pub async fn refresh(&self, store: &MeasurementStore) -> Result<(), WeatherApiError> {
        let current = self.fetch(REALTIME_URL).await?;
        store.put(KEY_WEATHER_CURRENT, Value::Doc(current));

        let forecast = self.fetch(FORECAST_URL).await?;
        store.put(KEY_WEATHER_FORECAST, Value::Doc(forecast));
        Ok(())
    }
}

/// Long-running polling task. Sleeps the fixed interval whether or not the
/// attempt succeeded; transport failures never escape this loop.
pub async fn run(client: WeatherClient, store: MeasurementStore) {
    loop {
        match client.refresh(&store).await {
            Ok(()) => info!("weather refreshed"),
            Err(e) => error!("Failed to get weather. Error: {}", e),
        }
        tokio::time::sleep(WEATHER_POLL_INTERVAL).await;
    }
}
