//! Command decoding and application
//!
//! A decoded [`Command`] is applied to the sound chip with direct register
//! access. No bus cycle is run, so an address the firmware has latched
//! survives a command landing between its latch and write cycles.

use super::framer::Frame;
use crate::ay38910::registers::Register;
use crate::bus::BusObserver;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Known command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum CommandCode {
    /// Status/control query
    Status = 0xA0,
    /// Replace the low byte of a channel period
    FrequencyLow = 0xA2,
    /// Replace the high nibble of a channel period
    FrequencyHigh = 0xA3,
    /// Full period, amplitude and tone enable
    SetNote = 0xA4,
    /// Silence all channels
    Stop = 0xA6,
    /// Reserved
    Special1 = 0xA7,
    /// Reserved
    Special2 = 0xA8,
}

/// Reasons a frame is discarded instead of applied
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFault {
    /// Command byte is not one of [`CommandCode`]
    #[error("unknown command 0x{0:02X}")]
    UnknownCommand(u8),

    /// Channel byte outside 0-2
    #[error("command 0x{command:02X}: invalid channel {channel}")]
    InvalidChannel {
        /// Command code
        command: u8,
        /// Channel value received
        channel: u8,
    },

    /// Not enough payload bytes for the command layout
    #[error("command 0x{command:02X}: payload has {actual} bytes, needs {expected}")]
    PayloadTooShort {
        /// Command code
        command: u8,
        /// Bytes required
        expected: usize,
        /// Bytes received
        actual: usize,
    },
}

/// A validated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Accepted, no chip effect
    Status,
    /// New low byte for a channel period
    FrequencyLow {
        /// Channel 0-2
        channel: u8,
        /// Low 8 bits of the period
        low: u8,
    },
    /// New high nibble for a channel period
    FrequencyHigh {
        /// Channel 0-2
        channel: u8,
        /// High 4 bits of the period
        high: u8,
    },
    /// Full note setup
    SetNote {
        /// Channel 0-2
        channel: u8,
        /// 12-bit tone period
        period: u16,
        /// 5-bit amplitude (bit 4 selects the envelope)
        amplitude: u8,
    },
    /// All amplitudes to zero
    Stop,
    /// Reserved, accepted without effect
    Special1,
    /// Reserved, accepted without effect
    Special2,
}

impl Command {
    /// Validate a frame against the layout of its command code.
    ///
    /// Offsets count from the first byte after the command code. The trailing
    /// end marker is not data and does not count towards the length.
    pub fn decode(frame: &Frame) -> Result<Command, CommandFault> {
        let code = CommandCode::from_u8(frame.command)
            .ok_or(CommandFault::UnknownCommand(frame.command))?;
        let payload = frame.data();

        let need = |expected: usize| -> Result<(), CommandFault> {
            if payload.len() < expected {
                Err(CommandFault::PayloadTooShort {
                    command: frame.command,
                    expected,
                    actual: payload.len(),
                })
            } else {
                Ok(())
            }
        };
        let channel = |value: u8| -> Result<u8, CommandFault> {
            if value <= 2 {
                Ok(value)
            } else {
                Err(CommandFault::InvalidChannel {
                    command: frame.command,
                    channel: value,
                })
            }
        };

        match code {
            CommandCode::Status => Ok(Command::Status),
            CommandCode::FrequencyLow => {
                need(2)?;
                Ok(Command::FrequencyLow {
                    channel: channel(payload[0])?,
                    low: payload[1],
                })
            }
            CommandCode::FrequencyHigh => {
                need(2)?;
                Ok(Command::FrequencyHigh {
                    channel: channel(payload[0])?,
                    high: payload[1] & 0x0F,
                })
            }
            CommandCode::SetNote => {
                need(4)?;
                Ok(Command::SetNote {
                    channel: channel(payload[0])?,
                    period: payload[1] as u16 | ((payload[2] as u16 & 0x0F) << 8),
                    amplitude: payload[3] & 0x1F,
                })
            }
            CommandCode::Stop => Ok(Command::Stop),
            CommandCode::Special1 => Ok(Command::Special1),
            CommandCode::Special2 => Ok(Command::Special2),
        }
    }

    /// Apply the command to a chip, leaving its address latch untouched
    pub fn apply(&self, chip: &mut dyn BusObserver) {
        match *self {
            Command::Status | Command::Special1 | Command::Special2 => {}
            Command::FrequencyLow { channel, low } => {
                chip.store_register(Register::tone_low(channel).addr(), low);
            }
            Command::FrequencyHigh { channel, high } => {
                chip.store_register(Register::tone_high(channel).addr(), high & 0x0F);
            }
            Command::SetNote {
                channel,
                period,
                amplitude,
            } => {
                chip.store_register(Register::tone_low(channel).addr(), period as u8);
                chip.store_register(
                    Register::tone_high(channel).addr(),
                    (period >> 8) as u8 & 0x0F,
                );
                chip.store_register(Register::amplitude(channel).addr(), amplitude & 0x1F);
                let mixer = chip.load_register(Register::Mixer.addr());
                chip.store_register(Register::Mixer.addr(), mixer & !(1 << channel));
            }
            Command::Stop => {
                for channel in 0..3 {
                    chip.store_register(Register::amplitude(channel).addr(), 0);
                }
            }
        }
    }
}
