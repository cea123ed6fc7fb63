/*
 *  main.rs
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

use env_logger::Env;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

mod aqi;
mod config;
mod constants;
mod mock;
mod render;
mod store;
mod sun;
mod telemetry;
mod template;
mod view;
mod weather;

use crate::constants::{RENDER_STARTUP_DELAY, RENDER_STARTUP_DELAY_MOCK};
use crate::render::Publisher;
use crate::store::MeasurementStore;

/// Wait for SIGINT, SIGTERM, or SIGHUP, then return so main can exit.
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load()?;
    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_filter())).init();
    info!(
        "inkboard v{} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATE")
    );

    let tz = cfg.timezone();
    let observer = cfg.observer();
    let store = MeasurementStore::new();

    if cfg.mock {
        info!("Running in mock APIs mode");
        mock::seed(&store, Path::new("mock"))?;
    } else {
        // The producers are independent supervised loops sharing only the
        // store. A wedged or permanently failing producer leaves its own
        // keys to go stale while the rest of the dashboard keeps updating.
        let api_key = cfg.api_key().unwrap_or_default();
        if api_key.is_empty() {
            warn!("no tomorrow.io API key configured; weather will show placeholders");
        }
        let weather_client = weather::WeatherClient::new(&api_key, &cfg.weather_location());
        tokio::spawn(weather::run(weather_client, store.clone()));

        let aqi_client = aqi::AqiClient::new(observer.latitude, observer.longitude);
        tokio::spawn(aqi::run(aqi_client, store.clone()));

        tokio::spawn(telemetry::run(cfg.bus(), store.clone(), tz));
    }

    let publisher: Arc<dyn Publisher + Send + Sync> =
        Arc::new(render::PngPublisher::new(cfg.out_dir(), cfg.mock));
    let startup_delay = if cfg.mock {
        RENDER_STARTUP_DELAY_MOCK
    } else {
        RENDER_STARTUP_DELAY
    };

    tokio::select! {
        _ = signal_handler() => {}
        _ = render::run(publisher, store, observer, tz, startup_delay) => {
            // The render loop never returns on its own.
        }
    }

    info!("Main application exiting.");
    Ok(())
}
