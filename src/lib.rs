//! # 8051 + AY-3-8910 Sound Board Emulator
//!
//! Re-executes the firmware of an 8051-based sound board: the microcontroller
//! receives commands over its UART and drives an AY-3-8910 programmable sound
//! generator through two parallel ports.
//!
//! ## Layers
//!
//! - [`cpu`] - instruction-set interpreter with a table-driven decoder
//! - [`memory`] - unified internal RAM/SFR space, external data, program space
//! - [`bus`] - peripheral bridge translating port writes into chip bus cycles
//! - [`protocol`] - serial command framer and command dispatch
//! - [`ay38910`] - sound chip model (tone, noise, envelope, mixer)
//! - [`streaming`] - bounded sample FIFO and the real-time sample pipeline
//! - [`system`] - wiring of all of the above into a runnable sound system
//!
//! ## Quick Start
//!
//! ```no_run
//! use ay8051::{SoundSystem, SystemConfig};
//!
//! # fn main() -> ay8051::Result<()> {
//! let firmware = std::fs::read("sound_cpu_8051.bin")?;
//! let mut system = SoundSystem::new(SystemConfig::default())?;
//! system.load_firmware(&firmware)?;
//!
//! // Play a note on channel A through the serial protocol.
//! system.send_bytes(&[0xB5, 0xA4, 0x00, 0xDD, 0x01, 0x0F, 0xB0]);
//! let samples = system.render(44_100)?;
//! assert_eq!(samples.len(), 44_100);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod ay38910;
pub mod bus;
pub mod config;
pub mod cpu;
pub mod memory;
pub mod protocol;
pub mod streaming;
pub mod system;

#[cfg(feature = "wav-export")]
pub mod export;

/// Error types for the sound board emulator
#[derive(thiserror::Error, Debug)]
pub enum Ay8051Error {
    /// The interpreter fetched an opcode with no defined behavior
    #[error("undefined opcode 0x{opcode:02X} at PC=0x{pc:04X}")]
    UndefinedOpcode {
        /// Address the opcode was fetched from
        pc: u16,
        /// The offending opcode byte
        opcode: u8,
    },

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Firmware image could not be loaded
    #[error("Firmware error: {0}")]
    FirmwareError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Ay8051Error {
    /// Converts a String into `Ay8051Error::Other`.
    ///
    /// Prefer the specific variants where the failure class is known.
    fn from(msg: String) -> Self {
        Ay8051Error::Other(msg)
    }
}

impl From<&str> for Ay8051Error {
    /// Converts a string slice into `Ay8051Error::Other`.
    fn from(msg: &str) -> Self {
        Ay8051Error::Other(msg.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, Ay8051Error>;

// Public API exports
pub use ay38910::Ay38910;
pub use bus::{BusObserver, PeripheralBridge};
pub use config::SystemConfig;
pub use cpu::{Cpu8051, CpuState};
pub use protocol::{CommandFramer, Frame};
pub use streaming::{SampleFifo, SamplePipeline, StreamConfig};
pub use system::{RunningSystem, SerialInput, SoundSystem, SystemReport};

#[cfg(feature = "streaming")]
pub use streaming::AudioDevice;
