use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};
use thiserror::Error;

use crate::constants::{
    DEFAULT_BASEMENT_TOPIC, DEFAULT_LATITUDE, DEFAULT_LONGITUDE, DEFAULT_MQTT_HOST,
    DEFAULT_MQTT_PORT, DEFAULT_NURSERY_TOPIC, DEFAULT_TIMEZONE, DEFAULT_WEATHER_LOCATION,
};
use crate::sun::Observer;
use crate::telemetry::BusConfig;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. All fields optional so YAML and CLI layers
/// can be merged Option-by-Option over the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>, // e.g., "info" | "debug"
    /// tomorrow.io API key; falls back to the TOMORROW_IO_API_KEY env var
    pub api_key: Option<String>,
    /// location the weather endpoints are keyed by (postal code or "lat,lng")
    pub weather_location: Option<String>,
    /// observer position for day/night and the AQI query
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// IANA zone name the dashboard's calendar lives in
    pub timezone: Option<String>,
    /// directory the PNG artifact is published into; WWW_DIR env, then cwd
    pub out_dir: Option<PathBuf>,
    pub mqtt: Option<MqttConfig>,
    /// substitute local fixtures for every external fetch (CLI only)
    #[serde(skip)]
    pub mock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MqttConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub nursery_topic: Option<String>,
    pub basement_topic: Option<String>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "inkboard", version, about = "e-ink dashboard compositor")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// Enable mock API mode
    #[arg(long, action = ArgAction::SetTrue)]
    pub mock: bool,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub out_dir: Option<PathBuf>,
    #[arg(long)]
    pub api_key: Option<String>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();

    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/inkboard/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/inkboard/config.yaml");
        if p.exists() {
            return Some(p);
        }
        let p = home.join(".config/inkboard.yaml");
        if p.exists() {
            return Some(p);
        }
    }
    // project local
    for candidate in &["inkboard.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() {
        dst.log_level = src.log_level;
    }
    if src.api_key.is_some() {
        dst.api_key = src.api_key;
    }
    if src.weather_location.is_some() {
        dst.weather_location = src.weather_location;
    }
    if src.latitude.is_some() {
        dst.latitude = src.latitude;
    }
    if src.longitude.is_some() {
        dst.longitude = src.longitude;
    }
    if src.timezone.is_some() {
        dst.timezone = src.timezone;
    }
    if src.out_dir.is_some() {
        dst.out_dir = src.out_dir;
    }
    match (&mut dst.mqtt, src.mqtt) {
        (None, Some(m)) => dst.mqtt = Some(m),
        (Some(d), Some(s)) => merge_mqtt(d, s),
        _ => {}
    }
}

fn merge_mqtt(dst: &mut MqttConfig, src: MqttConfig) {
    if src.host.is_some() {
        dst.host = src.host;
    }
    if src.port.is_some() {
        dst.port = src.port;
    }
    if src.nursery_topic.is_some() {
        dst.nursery_topic = src.nursery_topic;
    }
    if src.basement_topic.is_some() {
        dst.basement_topic = src.basement_topic;
    }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() {
        cfg.log_level = cli.log_level.clone();
    }
    if cli.debug {
        cfg.log_level = Some("debug".to_string());
    }
    if cli.out_dir.is_some() {
        cfg.out_dir = cli.out_dir.clone();
    }
    if cli.api_key.is_some() {
        cfg.api_key = cli.api_key.clone();
    }
    cfg.mock = cli.mock;
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(lat) = cfg.latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ConfigError::Validation(format!("invalid latitude: {lat}")));
        }
    }
    if let Some(lng) = cfg.longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(ConfigError::Validation(format!("invalid longitude: {lng}")));
        }
    }
    if let Some(tz) = cfg.timezone.as_deref() {
        if tz.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Validation(format!("unknown timezone: {tz}")));
        }
    }
    Ok(())
}

impl Config {
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| env::var("TOMORROW_IO_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }

    pub fn weather_location(&self) -> String {
        self.weather_location
            .clone()
            .unwrap_or_else(|| DEFAULT_WEATHER_LOCATION.to_string())
    }

    pub fn observer(&self) -> Observer {
        Observer {
            latitude: self.latitude.unwrap_or(DEFAULT_LATITUDE),
            longitude: self.longitude.unwrap_or(DEFAULT_LONGITUDE),
        }
    }

    /// Validated at load; an unset or unparseable zone falls back to the
    /// default rather than panicking.
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.timezone
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.parse().expect("default timezone is valid"))
    }

    pub fn out_dir(&self) -> PathBuf {
        self.out_dir
            .clone()
            .or_else(|| env::var("WWW_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn bus(&self) -> BusConfig {
        let mqtt = self.mqtt.clone().unwrap_or_default();
        BusConfig {
            host: mqtt.host.unwrap_or_else(|| DEFAULT_MQTT_HOST.to_string()),
            port: mqtt.port.unwrap_or(DEFAULT_MQTT_PORT),
            nursery_topic: mqtt
                .nursery_topic
                .unwrap_or_else(|| DEFAULT_NURSERY_TOPIC.to_string()),
            basement_topic: mqtt
                .basement_topic
                .unwrap_or_else(|| DEFAULT_BASEMENT_TOPIC.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_the_overlay() {
        let mut base = Config {
            timezone: Some("UTC".into()),
            latitude: Some(10.0),
            ..Default::default()
        };
        let overlay = Config {
            timezone: Some("America/Los_Angeles".into()),
            longitude: Some(-122.0),
            mqtt: Some(MqttConfig {
                host: Some("broker.local".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        merge(&mut base, overlay);
        assert_eq!(base.timezone.as_deref(), Some("America/Los_Angeles"));
        assert_eq!(base.latitude, Some(10.0)); // untouched
        assert_eq!(base.longitude, Some(-122.0));
        assert_eq!(base.mqtt.unwrap().host.as_deref(), Some("broker.local"));
    }

    #[test]
    fn validate_rejects_bad_coordinates_and_zones() {
        let bad_lat = Config {
            latitude: Some(91.0),
            ..Default::default()
        };
        assert!(validate(&bad_lat).is_err());

        let bad_tz = Config {
            timezone: Some("America/Atlantis".into()),
            ..Default::default()
        };
        assert!(validate(&bad_tz).is_err());

        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn defaults_resolve_to_seattle() {
        let cfg = Config::default();
        assert_eq!(cfg.timezone(), chrono_tz::America::Los_Angeles);
        assert_eq!(cfg.weather_location(), "98103");
        let bus = cfg.bus();
        assert_eq!(bus.port, 1883);
        assert!(bus.nursery_topic.contains("tmp102"));
        assert!(bus.basement_topic.contains("sht41"));
    }

    #[test]
    fn empty_api_key_counts_as_absent() {
        let cfg = Config {
            api_key: Some(String::new()),
            ..Default::default()
        };
        // An empty key would only produce auth failures; treat it as unset.
        if env::var("TOMORROW_IO_API_KEY").is_err() {
            assert!(cfg.api_key().is_none());
        }
    }

    #[test]
    fn yaml_round_trip() {
        let yaml = r#"
log_level: debug
latitude: 47.6
longitude: -122.3
timezone: America/Los_Angeles
mqtt:
  host: 10.0.0.69
  port: 1883
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.log_filter(), "debug");
        assert_eq!(cfg.bus().host, "10.0.0.69");
        assert!(validate(&cfg).is_ok());
    }
}
