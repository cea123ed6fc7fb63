/*
 *  aqi.rs
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
//! Air-quality producer: polls open-meteo for the current US AQI and writes
//! the single scalar into the store.

use log::{error, info};
use serde_json::Value as JsonValue;
use std::fmt::{self, Display};
use std::time::Duration;

use crate::constants::{AQI_POLL_INTERVAL, KEY_AQI};
use crate::store::{MeasurementStore, Value};

#[derive(Debug)]
pub enum AqiError {
    HttpRequestError(reqwest::Error),
    BadStatus(reqwest::StatusCode),
    MissingField(&'static str),
}

impl Display for AqiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AqiError::HttpRequestError(e) => write!(f, "HTTP request error: {}", e),
            AqiError::BadStatus(code) => write!(f, "non-success response from AQI API: {}", code),
            AqiError::MissingField(path) => write!(f, "AQI payload missing field: {}", path),
        }
    }
}

impl std::error::Error for AqiError {}

impl From<reqwest::Error> for AqiError {
    fn from(err: reqwest::Error) -> Self {
        AqiError::HttpRequestError(err)
    }
}

#[derive(Debug)]
pub struct AqiClient {
    client: reqwest::Client,
    url: String,
}

impl AqiClient {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        let url = format!(
            "https://air-quality-api.open-meteo.com/v1/air-quality?latitude={latitude}&longitude={longitude}&current=us_aqi"
        );
        AqiClient { client, url }
    }

    /// Extract `current.us_aqi` from an open-meteo response body.
    pub fn extract(body: &JsonValue) -> Result<f64, AqiError> {
        body["current"]["us_aqi"]
            .as_f64()
            .ok_or(AqiError::MissingField("current.us_aqi"))
    }

    pub async fn refresh(&self, store: &MeasurementStore) -> Result<(), AqiError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(AqiError::BadStatus(response.status()));
        }
        let body: JsonValue = response.json().await?;
        store.put(KEY_AQI, Value::Scalar(Self::extract(&body)?));
        Ok(())
    }
}

/// Long-running polling task, same shape as the weather loop.
pub async fn run(client: AqiClient, store: MeasurementStore) {
    loop {
        match client.refresh(&store).await {
            Ok(()) => info!("AQI refreshed"),
            Err(e) => error!("Failed to get AQI. Error: {}", e),
        }
        tokio::time::sleep(AQI_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_reads_current_us_aqi() {
        let body = json!({"current": {"time": "2026-08-06T10:00", "us_aqi": 23}});
        assert_eq!(AqiClient::extract(&body).unwrap(), 23.0);
    }

    #[test]
    fn extract_rejects_missing_or_non_numeric() {
        assert!(AqiClient::extract(&json!({})).is_err());
        assert!(AqiClient::extract(&json!({"current": {}})).is_err());
        assert!(AqiClient::extract(&json!({"current": {"us_aqi": "fine"}})).is_err());
    }
}
