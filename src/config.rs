//! Sound system configuration
//!
//! Loaded from JSON; any missing key takes its default.

use crate::streaming::StreamConfig;
use crate::{Ay8051Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of one sound system instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Sound chip master clock in Hz
    pub master_clock_hz: u32,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Microcontroller oscillator in Hz (one machine cycle = 12 periods)
    pub cpu_clock_hz: u32,
    /// Sample FIFO capacity (rounded up to a power of two)
    pub fifo_capacity: usize,
    /// Machine cycles between two delivered serial bytes
    pub serial_byte_cycles: u32,
    /// Apply completed command frames to the chip directly
    pub dispatch_frames: bool,
    /// Log level name (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            master_clock_hz: 2_000_000,
            sample_rate: 44_100,
            cpu_clock_hz: 11_059_200,
            fifo_capacity: 4096,
            // 10 bits per byte at 9600 baud on an 11.0592 MHz part
            serial_byte_cycles: 960,
            dispatch_frames: true,
            log_level: "info".to_string(),
        }
    }
}

impl SystemConfig {
    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse from JSON text and validate
    pub fn from_json(text: &str) -> Result<Self> {
        let config: SystemConfig = serde_json::from_str(text)
            .map_err(|e| Ay8051Error::ConfigError(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Ay8051Error::ConfigError(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the system cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.master_clock_hz == 0 {
            return Err(Ay8051Error::ConfigError("master_clock_hz must be > 0".into()));
        }
        if self.sample_rate == 0 {
            return Err(Ay8051Error::ConfigError("sample_rate must be > 0".into()));
        }
        if self.cpu_clock_hz < 12 {
            return Err(Ay8051Error::ConfigError(
                "cpu_clock_hz must cover at least one machine cycle".into(),
            ));
        }
        if self.fifo_capacity == 0 {
            return Err(Ay8051Error::ConfigError("fifo_capacity must be > 0".into()));
        }
        if self.serial_byte_cycles == 0 {
            return Err(Ay8051Error::ConfigError("serial_byte_cycles must be > 0".into()));
        }
        self.level_filter()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        self.log_level.parse().map_err(|_| {
            Ay8051Error::ConfigError(format!("unknown log level '{}'", self.log_level))
        })
    }

    /// Machine cycles the interpreter runs per output sample
    pub fn machine_cycles_per_sample(&self) -> f64 {
        crate::cpu::cycle_counter::machine_cycles_per_second(self.cpu_clock_hz)
            / self.sample_rate as f64
    }

    /// Streaming parameters derived from this configuration
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            fifo_capacity: self.fifo_capacity,
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_validate() {
        let config = SystemConfig::default();
        config.validate().unwrap();
        assert_eq!(config.level_filter().unwrap(), log::LevelFilter::Info);
        assert_relative_eq!(config.machine_cycles_per_sample(), 921_600.0 / 44_100.0);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = SystemConfig::from_json(r#"{ "sample_rate": 22050 }"#).unwrap();
        assert_eq!(config.sample_rate, 22_050);
        assert_eq!(config.master_clock_hz, 2_000_000);
        assert!(config.dispatch_frames);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SystemConfig::from_json(r#"{ "sample_rate": 0 }"#).is_err());
        assert!(SystemConfig::from_json(r#"{ "fifo_capacity": 0 }"#).is_err());
        assert!(SystemConfig::from_json(r#"{ "log_level": "loud" }"#).is_err());
        assert!(SystemConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.json");
        let config = SystemConfig {
            dispatch_frames: false,
            log_level: "debug".into(),
            ..SystemConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SystemConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_stream_config() {
        let stream = SystemConfig::default().stream_config();
        assert_eq!(stream.fifo_capacity, 4096);
        assert_eq!(stream.sample_rate, 44_100);
    }
}
