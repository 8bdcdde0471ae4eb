//! Serial command protocol
//!
//! Commands arrive on the UART as `START COMMAND DATA... END` with
//! `START` one of [`START_MARKERS`] and `END` = [`END_MARKER`].

pub mod command;
pub mod framer;

pub use command::{Command, CommandCode, CommandFault};
pub use framer::{CommandFramer, Frame, FramerState, ProtocolStats};

/// Bytes that open a frame
pub const START_MARKERS: [u8; 2] = [0xB5, 0xB6];

/// Byte that closes a frame (kept as the last payload byte)
pub const END_MARKER: u8 = 0xB0;

/// Longest payload accepted before a runaway frame is abandoned
pub const MAX_PAYLOAD: usize = 256;

/// Parse a line of whitespace-separated hex bytes (`"B5 A4 00 DD"`).
///
/// Accepts optional `0x` prefixes and also runs of digits without spaces
/// (`"B5A400DD"`).
pub fn parse_hex_bytes(line: &str) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    for token in line.split(|c: char| c.is_whitespace() || c == ',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid hex byte sequence '{}'", token));
        }
        for pair in digits.as_bytes().chunks(2) {
            let text = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            let value = u8::from_str_radix(text, 16).map_err(|e| e.to_string())?;
            bytes.push(value);
        }
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(
            parse_hex_bytes("B5 a4 0x00 DD").unwrap(),
            vec![0xB5, 0xA4, 0x00, 0xDD]
        );
        assert_eq!(parse_hex_bytes("B5A6B0").unwrap(), vec![0xB5, 0xA6, 0xB0]);
        assert_eq!(parse_hex_bytes("  ").unwrap(), Vec::<u8>::new());
        assert!(parse_hex_bytes("B").is_err());
        assert!(parse_hex_bytes("ZZ").is_err());
    }
}
