//! Configuration management for bitcrane.
//!
//! Port paths, baud rates, timeouts and PSU addressing are gathered into one
//! structure which is handed to the transport and driver constructors. It
//! can be loaded from a JSON file and then overridden from environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default baud rate of both bridge ports.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout of the control port.
pub const CONTROL_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default read timeout of the ASIC port.
pub const ASIC_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Main configuration structure for the harness.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Control bridge port (paged register protocol)
    pub control: SerialConfig,

    /// ASIC data port, if the bench has one wired up
    #[serde(deserialize_with = "asic_port")]
    pub asic: Option<SerialConfig>,

    /// PSU addressing and timing
    pub psu: PsuConfig,

    /// Choreography delays owned by callers
    pub timing: TimingConfig,
}

/// Serial port parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Device path, e.g. /dev/ttyACM0
    pub port_path: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// How long a read waits for the requested byte count
    #[serde(rename = "read_timeout_ms", with = "duration_ms", default = "default_read_timeout")]
    pub read_timeout: Duration,
}

/// The ASIC port as written in a config file. Same fields as
/// [`SerialConfig`], with the ASIC timeout as default.
#[derive(Deserialize)]
struct AsicPortFile {
    port_path: String,

    #[serde(default = "default_baud_rate")]
    baud_rate: u32,

    #[serde(
        rename = "read_timeout_ms",
        deserialize_with = "duration_ms::deserialize",
        default = "default_asic_read_timeout"
    )]
    read_timeout: Duration,
}

fn asic_port<'de, D>(d: D) -> std::result::Result<Option<SerialConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let port = Option::<AsicPortFile>::deserialize(d)?;
    Ok(port.map(|p| SerialConfig {
        port_path: p.port_path,
        baud_rate: p.baud_rate,
        read_timeout: p.read_timeout,
    }))
}

impl SerialConfig {
    /// Control port defaults: 115200 baud, 1 s read timeout.
    pub fn control(port_path: impl Into<String>) -> Self {
        Self {
            port_path: port_path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: CONTROL_READ_TIMEOUT,
        }
    }

    /// ASIC port defaults: 115200 baud, 2 s read timeout.
    pub fn asic(port_path: impl Into<String>) -> Self {
        Self {
            read_timeout: ASIC_READ_TIMEOUT,
            ..Self::control(port_path)
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::control("/dev/ttyACM0")
    }
}

/// PSU addressing behind the PSU-I2C page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PsuConfig {
    /// I2C address of the PSU microcontroller
    pub address: u8,

    /// Register every command byte is written to
    pub register: u8,

    /// Bytes in every reply
    pub reply_len: usize,

    /// Time the PSU firmware needs between a command and its reply
    #[serde(rename = "settle_delay_ms", with = "duration_ms")]
    pub settle_delay: Duration,

    /// Active-low GPIO that enables the PSU, if wired
    pub enable_gpio: Option<u8>,
}

impl Default for PsuConfig {
    fn default() -> Self {
        Self {
            address: 0x10,
            register: 0x11,
            reply_len: 8,
            settle_delay: Duration::from_millis(500),
            enable_gpio: None,
        }
    }
}

impl PsuConfig {
    /// The PSU enable pin, which must be configured before the PSU can be
    /// switched.
    pub fn enable_pin(&self) -> Result<u8> {
        self.enable_gpio
            .ok_or_else(|| Error::InvalidArgument("psu.enable_gpio is not configured".into()))
    }
}

/// Delays used by multi-step sequences.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Width of the low pulse on a hashboard reset line
    #[serde(rename = "reset_pulse_ms", with = "duration_ms")]
    pub reset_pulse: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reset_pulse: Duration::from_millis(100),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given (defaults otherwise), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    ///
    /// Recognised variables: `BITCRANE_CONTROL_PORT`, `BITCRANE_ASIC_PORT`,
    /// `BITCRANE_BAUD`, `BITCRANE_READ_TIMEOUT_MS`, `BITCRANE_PSU_SETTLE_MS`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("BITCRANE_CONTROL_PORT") {
            self.control.port_path = port;
        }
        if let Some(port) = lookup("BITCRANE_ASIC_PORT") {
            match self.asic.as_mut() {
                Some(asic) => asic.port_path = port,
                None => self.asic = Some(SerialConfig::asic(port)),
            }
        }
        if let Some(baud) = lookup("BITCRANE_BAUD") {
            let baud = parse_number::<u32>("BITCRANE_BAUD", &baud)?;
            self.control.baud_rate = baud;
            if let Some(asic) = self.asic.as_mut() {
                asic.baud_rate = baud;
            }
        }
        if let Some(ms) = lookup("BITCRANE_READ_TIMEOUT_MS") {
            self.control.read_timeout =
                Duration::from_millis(parse_number("BITCRANE_READ_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("BITCRANE_PSU_SETTLE_MS") {
            self.psu.settle_delay =
                Duration::from_millis(parse_number("BITCRANE_PSU_SETTLE_MS", &ms)?);
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        for port in std::iter::once(&self.control).chain(self.asic.as_ref()) {
            if port.port_path.is_empty() {
                return Err(Error::Config("empty serial port path".into()));
            }
            if port.baud_rate == 0 {
                return Err(Error::Config(format!("{}: baud rate is zero", port.port_path)));
            }
        }
        if self.psu.reply_len == 0 {
            return Err(Error::Config("psu.reply_len must be at least 1".into()));
        }
        Ok(())
    }
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout() -> Duration {
    CONTROL_READ_TIMEOUT
}

fn default_asic_read_timeout() -> Duration {
    ASIC_READ_TIMEOUT
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: not a number: {value:?}")))
}

// Durations are written as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
