use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info};

use crate::mqtt::config::MqttSettings;

pub const DEFAULT_DEVICE: &str = "/dev/input/js0";
const CONFIG_DIR_NAME: &str = "js2mqtt";
const CONFIG_FILE_NAME: &str = "config.toml";

const PAYLOAD_HELP: &str = "\
This program listens for Linux joystick events as described here:
https://www.kernel.org/doc/Documentation/input/joystick-api.txt

It then decodes those events into the following JSON format:
{
    \"time\": <event timestamp in milliseconds>,
    \"value\": <signed 16-bit event value>,
    \"type\": <\"button\"|\"axis\">,
    \"number\": <axis or button number>
}";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Command line of the bridge
#[derive(Parser, Debug, Default)]
#[command(
    name = "js2mqtt",
    about = "Listen for joystick events and forward them to a MQTT server.",
    after_help = PAYLOAD_HELP,
    disable_version_flag = true
)]
pub struct Cli {
    /// Path to the joystick device [default: /dev/input/js0]
    #[arg(short = 'i', long = "device", value_name = "DEVICE_PATH")]
    pub device: Option<PathBuf>,

    /// MQTT server address [default: localhost]
    #[arg(short = 'o', long = "host", value_name = "MQTT_SERVER_ADDRESS")]
    pub host: Option<String>,

    /// MQTT server port [default: 1883]
    #[arg(short = 'p', long = "port", value_name = "MQTT_SERVER_PORT")]
    pub port: Option<u16>,

    /// MQTT topic [default: /joystick]
    #[arg(short = 't', long = "topic", value_name = "MQTT_TOPIC")]
    pub topic: Option<String>,

    /// Display the JSON object on the standard output
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Read settings from a TOML file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log diagnostics at debug level
    #[arg(short = 'V', long = "verbose")]
    pub verbose: bool,

    /// Display version and exit
    #[arg(short = 'v', long = "version")]
    pub version: bool,
}

/// Settings as they may appear in a config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub device: Option<PathBuf>,
    pub debug: Option<bool>,
    pub mqtt: Option<FileMqttConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileMqttConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub topic: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub queue_capacity: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved settings, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub device: PathBuf,
    pub debug: bool,
    pub mqtt: MqttSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            debug: false,
            mqtt: MqttSettings::default(),
        }
    }
}

impl Config {
    /// Defaults, then the config file, then command line flags
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => {
                info!("Loading config file {}", path.display());
                Some(FileConfig::load(path)?)
            }
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    info!("Loading config file {}", path.display());
                    Some(FileConfig::load(&path)?)
                }
                None => None,
            },
        };

        let mut config = Self::default();
        if let Some(file) = file {
            config.apply_file(file);
        }
        config.apply_cli(cli);
        config.validate()?;

        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(device) = file.device {
            self.device = device;
        }
        if let Some(debug) = file.debug {
            self.debug = debug;
        }
        let Some(mqtt) = file.mqtt else {
            return;
        };
        if let Some(host) = mqtt.host {
            self.mqtt.host = host;
        }
        if let Some(port) = mqtt.port {
            self.mqtt.port = port;
        }
        if let Some(topic) = mqtt.topic {
            self.mqtt.topic = topic;
        }
        if let Some(client_id) = mqtt.client_id {
            self.mqtt.client_id = client_id;
        }
        if let Some(keep_alive_secs) = mqtt.keep_alive_secs {
            self.mqtt.keep_alive_secs = keep_alive_secs;
        }
        if let Some(queue_capacity) = mqtt.queue_capacity {
            self.mqtt.queue_capacity = queue_capacity;
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(device) = &cli.device {
            self.device = device.clone();
        }
        if let Some(host) = &cli.host {
            self.mqtt.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.mqtt.port = port;
        }
        if let Some(topic) = &cli.topic {
            self.mqtt.topic = topic.clone();
        }
        // The flag can only switch echo on.
        self.debug |= cli.debug;
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.device.as_os_str().is_empty() {
            return invalid("device", "must not be empty");
        }
        if self.mqtt.host.trim().is_empty() {
            return invalid("mqtt.host", "must not be empty");
        }
        if self.mqtt.topic.is_empty() {
            return invalid("mqtt.topic", "must not be empty");
        }
        if self.mqtt.topic.contains(['+', '#']) {
            return invalid("mqtt.topic", "wildcards are not allowed when publishing");
        }
        if self.mqtt.client_id.is_empty() || self.mqtt.client_id.starts_with(char::is_whitespace)
        {
            return invalid("mqtt.client_id", "must be non-empty without leading whitespace");
        }
        if self.mqtt.keep_alive_secs < 5 {
            return invalid("mqtt.keep_alive_secs", "must be at least 5 seconds");
        }
        if self.mqtt.queue_capacity == 0 {
            return invalid("mqtt.queue_capacity", "must be at least 1");
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
