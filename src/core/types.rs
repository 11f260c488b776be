use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// Vertex identifier within a map
pub type VertexId = i64;

/// Edge weight and path length, in distance units
pub type Distance = i64;

/// File size in bits
pub type FileSize = i64;

/// Transmission or propagation delay in seconds
pub type Seconds = f64;

/// Single-character map identifier
///
/// Restricted to ASCII so it always fits the one-byte wire slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MapId(u8);

impl MapId {
    /// Creates a map identifier from an ASCII character
    pub fn new(id: char) -> Result<Self> {
        if id.is_ascii_graphic() {
            Ok(MapId(id as u8))
        } else {
            Err(Error::invalid_argument(format!(
                "map id must be one printable ASCII character, got {:?}",
                id
            )))
        }
    }

    /// Creates a map identifier from its wire byte, with the same restriction
    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte.is_ascii_graphic() {
            Ok(MapId(byte))
        } else {
            Err(Error::invalid_argument(format!(
                "map id byte 0x{:02x} is not a printable ASCII character",
                byte
            )))
        }
    }

    /// Returns the wire byte
    pub fn as_byte(&self) -> u8 {
        self.0
    }

    /// Returns the identifier as a character
    pub fn as_char(&self) -> char {
        self.0 as char
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl std::str::FromStr for MapId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => MapId::new(c),
            _ => Err(Error::invalid_argument(format!(
                "map id must be exactly one character, got {:?}",
                s
            ))),
        }
    }
}

/// What the relay sends back to the requester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Forward the delay engine's result unchanged
    Delay,
    /// Join distances and delays before replying
    Combined,
}

impl std::str::FromStr for ReplyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "delay" => Ok(ReplyMode::Delay),
            "combined" => Ok(ReplyMode::Combined),
            other => Err(Error::config(format!("unknown reply mode: {}", other))),
        }
    }
}

/// Configuration shared by all four roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host every role binds to and connects to
    pub host: String,
    /// Datagram port of the path engine
    pub path_engine_port: u16,
    /// Datagram port of the delay engine
    pub delay_engine_port: u16,
    /// Datagram port the relay uses towards both engines
    pub relay_datagram_port: u16,
    /// Stream port the relay accepts requesters on
    pub relay_stream_port: u16,
    /// Map description loaded by the path engine
    pub map_file: PathBuf,
    /// Reply shape between relay and requester
    pub reply_mode: ReplyMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: super::DEFAULT_HOST.to_string(),
            path_engine_port: super::PATH_ENGINE_PORT,
            delay_engine_port: super::DELAY_ENGINE_PORT,
            relay_datagram_port: super::RELAY_DATAGRAM_PORT,
            relay_stream_port: super::RELAY_STREAM_PORT,
            map_file: PathBuf::from("map.txt"),
            reply_mode: ReplyMode::Combined,
        }
    }
}

impl Config {
    /// Builds the default configuration with `PATHDELAY_*` environment overrides
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("PATHDELAY_HOST") {
            config.host = host;
        }
        let ports = [
            ("PATHDELAY_PATH_ENGINE_PORT", &mut config.path_engine_port),
            ("PATHDELAY_DELAY_ENGINE_PORT", &mut config.delay_engine_port),
            ("PATHDELAY_RELAY_DATAGRAM_PORT", &mut config.relay_datagram_port),
            ("PATHDELAY_RELAY_STREAM_PORT", &mut config.relay_stream_port),
        ];
        for (key, slot) in ports {
            if let Some(value) = lookup(key) {
                *slot = value
                    .parse()
                    .map_err(|e| Error::config(format!("{}={:?}: {}", key, value, e)))?;
            }
        }
        if let Some(path) = lookup("PATHDELAY_MAP_FILE") {
            config.map_file = PathBuf::from(path);
        }
        if let Some(mode) = lookup("PATHDELAY_REPLY_MODE") {
            config.reply_mode = mode.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }

        let mut ports = vec![
            self.path_engine_port,
            self.delay_engine_port,
            self.relay_datagram_port,
            self.relay_stream_port,
        ];
        // Port 0 asks the OS for an ephemeral port, so repeats are fine there
        ports.retain(|&p| p != 0);
        let count = ports.len();
        ports.sort_unstable();
        ports.dedup();
        if ports.len() != count {
            return Err(Error::config("service ports must be distinct"));
        }

        Ok(())
    }

    /// Datagram address of the path engine
    pub fn path_engine_addr(&self) -> String {
        format!("{}:{}", self.host, self.path_engine_port)
    }

    /// Datagram address of the delay engine
    pub fn delay_engine_addr(&self) -> String {
        format!("{}:{}", self.host, self.delay_engine_port)
    }

    /// Datagram address of the relay
    pub fn relay_datagram_addr(&self) -> String {
        format!("{}:{}", self.host, self.relay_datagram_port)
    }

    /// Stream address of the relay
    pub fn relay_stream_addr(&self) -> String {
        format!("{}:{}", self.host, self.relay_stream_port)
    }
}
