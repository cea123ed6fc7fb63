//! Global constants shared by the producers, projector, and renderer.

use std::time::Duration;

// Store keys. Each producer owns a disjoint subset; the projector only reads.
/// Latest realtime payload from the weather API (whole JSON document).
pub const KEY_WEATHER_CURRENT: &str = "weather_current";
/// Latest forecast payload from the weather API (whole JSON document).
pub const KEY_WEATHER_FORECAST: &str = "weather_forecast";
/// Current US AQI reading.
pub const KEY_AQI: &str = "aqi";

// Staleness windows, applied exclusively through `MeasurementStore::get_fresh`.
/// Current room readings go blank after 10 minutes without an update.
pub const MAX_AGE_CURRENT: Duration = Duration::from_secs(10 * 60);
/// AQI is a slower-moving signal; 15 minutes.
pub const MAX_AGE_AQI: Duration = Duration::from_secs(15 * 60);
/// Weather payloads survive three missed 10-minute polls plus slack.
pub const MAX_AGE_WEATHER: Duration = Duration::from_secs(35 * 60);
/// Daily highs/lows stay displayable for a full day.
pub const MAX_AGE_DAILY: Duration = Duration::from_secs(24 * 60 * 60);

// Task cadences.
pub const WEATHER_POLL_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const AQI_POLL_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const RENDER_INTERVAL: Duration = Duration::from_secs(60);
pub const MQTT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Give producers a head start before the first render.
pub const RENDER_STARTUP_DELAY: Duration = Duration::from_secs(3);
pub const RENDER_STARTUP_DELAY_MOCK: Duration = Duration::from_secs(1);

// Display placeholders for absent or stale metrics.
pub const TEMP_PLACEHOLDER: &str = "--";
pub const AQI_PLACEHOLDER: &str = "n/a";

/// Number of hourly forecast entries shown on the dashboard.
pub const FORECAST_HOURS: usize = 12;
/// Minimum span of the forecast graph's temperature axis, in degrees.
pub const GRAPH_MIN_SPAN: f64 = 20.0;

// Render geometry: landscape composition, rotated to portrait for the panel.
pub const VIEWPORT_WIDTH: u32 = 1448;
pub const VIEWPORT_HEIGHT: u32 = 1072;

/// Published artifact name, and the scratch name it is staged under. The
/// artifact is written to the scratch path and renamed into place so a
/// concurrent HTTP reader never sees a partial file.
pub const OUTPUT_FILE: &str = "dashboard.png";
pub const OUTPUT_SCRATCH_FILE: &str = "dashboard.out.png";

// Defaults, overridable from the config file.
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";
pub const DEFAULT_LATITUDE: f64 = 47.677696;
pub const DEFAULT_LONGITUDE: f64 = -122.351851;
/// Postal code the weather endpoints are keyed by.
pub const DEFAULT_WEATHER_LOCATION: &str = "98103";
pub const DEFAULT_MQTT_HOST: &str = "10.0.0.69";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
/// Nursery sensor publishes degrees Celsius.
pub const DEFAULT_NURSERY_TOPIC: &str = "temperature-tmp102/sensor/temperature_sensor/state";
/// Basement sensor publishes degrees Fahrenheit.
pub const DEFAULT_BASEMENT_TOPIC: &str = "temperature-sht41/sensor/sht41_temperature/state";
