use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub emitter: EmitterConfig,
    pub init: InitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Explicit device path; when unset the first port matching `pattern` is used
    pub port: Option<String>,
    pub pattern: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: None,
            pattern: "usbserial".to_string(),
            baud_rate: 9600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Pause between bundled writes
    pub interval_ms: u64,
    /// If set, each packet is written on its own with this pause in between
    pub packet_delay_ms: Option<u64>,
    /// Stop after this many bundles (runs until Ctrl-C when unset)
    pub iterations: Option<u64>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        EmitterConfig {
            interval_ms: 50,
            packet_delay_ms: None,
            iterations: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InitConfig {
    pub enabled: bool,
    /// Zero bytes written ahead of the init frame to flush the receiver
    pub noop_pad: usize,
    /// Pause after the init write before the loop starts
    pub pad_delay_ms: u64,
    /// If set, the sentinel and each init packet are written separately
    pub packet_delay_ms: Option<u64>,
}

impl Default for InitConfig {
    fn default() -> Self {
        InitConfig {
            enabled: true,
            noop_pad: 0,
            pad_delay_ms: 2000,
            packet_delay_ms: None,
        }
    }
}
