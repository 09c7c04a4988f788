//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! logger-config.toml file. It covers the pieces that genuinely vary per
//! deployment: which I2C character device the bus lives on, the default bus
//! clock rate, and the multiplexer's address. Sensor wiring, clamp
//! thresholds, and physical constants stay compiled into the station module
//! — a misconfigured file should never be able to change what a column
//! means.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Application configuration loaded from logger-config.toml
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Shared I2C bus configuration
    pub bus: BusConfig,
    /// Multiplexer configuration
    pub mux: MuxConfig,
}

/// Shared I2C bus configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct BusConfig {
    /// I2C character device the sensors hang off (e.g. "/dev/i2c-1")
    pub device: String,
    /// Default bus clock rate in Hz, restored after any sensor that
    /// requires a non-default rate
    pub default_clock_hz: u32,
}

/// Bus multiplexer configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct MuxConfig {
    /// 7-bit bus address of the multiplexer (set in PCB hardware)
    pub address: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bus: BusConfig {
                device: "/dev/i2c-1".to_string(),
                default_clock_hz: crate::station::DEFAULT_BUS_CLOCK_HZ,
            },
            mux: MuxConfig {
                address: crate::station::MUX_ADDRESS,
            },
        }
    }
}

impl Config {
    /// Load configuration from logger-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path("logger-config.toml")
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    println!("Loaded configuration for bus: {}", config.bus.device);
                    config
                }
                Err(e) => {
                    eprintln!("Warning: Invalid config file format: {}", e);
                    eprintln!("Using default configuration (/dev/i2c-1)");
                    Self::default()
                }
            },
            Err(_) => {
                eprintln!("Info: No config file found, using default configuration (/dev/i2c-1)");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bus.device, "/dev/i2c-1");
        assert_eq!(config.bus.default_clock_hz, 50_000);
        assert_eq!(config.mux.address, 0x73);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.bus.device, parsed.bus.device);
        assert_eq!(config.bus.default_clock_hz, parsed.bus.default_clock_hz);
        assert_eq!(config.mux.address, parsed.mux.address);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.bus.device, "/dev/i2c-1");
    }

    #[test]
    fn test_load_custom_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[bus]\ndevice = \"/dev/i2c-7\"\ndefault_clock_hz = 100000\n\n[mux]\naddress = 0x71\n"
        )
        .unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.bus.device, "/dev/i2c-7");
        assert_eq!(config.bus.default_clock_hz, 100_000);
        assert_eq!(config.mux.address, 0x71);
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml at all [").unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.bus.device, "/dev/i2c-1");
    }
}
