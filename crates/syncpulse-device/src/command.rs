//! Controller command alphabet
//!
//! Every command is a single byte. Lines 1..8 map onto a row of keys:
//! `1..8` raise a line, `QWERTYUI` lower it, `ASDFGHJK` request its state.

use std::fmt;

use syncpulse_core::Line;

const ASSERT_CODES: [u8; 8] = *b"12345678";
const DEASSERT_CODES: [u8; 8] = *b"QWERTYUI";
const READ_CODES: [u8; 8] = *b"ASDFGHJK";

/// Ping request byte
pub const PING: u8 = 0x27;
/// Byte the controller answers a ping with
pub const PING_REPLY: u8 = b'Q';
/// Switch line-state answers to single binary bytes
pub const BINARY_MODE: u8 = 0x5C;
/// Switch line-state answers to ASCII digits
pub const ASCII_MODE: u8 = 0x60;

/// A command understood by the controller
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Drive the line high
    Assert(Line),
    /// Drive the line low
    Deassert(Line),
    /// Request the line state; the answer arrives on the read side
    Read(Line),
    /// Liveness check, answered with `PING_REPLY`
    Ping,
    BinaryMode,
    AsciiMode,
}

impl Command {
    /// Wire byte for this command
    pub fn byte(self) -> u8 {
        match self {
            Command::Assert(line) => ASSERT_CODES[line.index()],
            Command::Deassert(line) => DEASSERT_CODES[line.index()],
            Command::Read(line) => READ_CODES[line.index()],
            Command::Ping => PING,
            Command::BinaryMode => BINARY_MODE,
            Command::AsciiMode => ASCII_MODE,
        }
    }

    /// Does this command produce bytes on the read side?
    pub fn expects_reply(self) -> bool {
        matches!(self, Command::Read(_) | Command::Ping)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Assert(line) => write!(f, "Assert({})", line),
            Command::Deassert(line) => write!(f, "Deassert({})", line),
            Command::Read(line) => write!(f, "Read({})", line),
            Command::Ping => write!(f, "Ping"),
            Command::BinaryMode => write!(f, "BinaryMode"),
            Command::AsciiMode => write!(f, "AsciiMode"),
        }
    }
}

/// Format of line-state answers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnMode {
    Ascii,
    Binary,
}

impl ReturnMode {
    pub fn command(self) -> Command {
        match self {
            ReturnMode::Ascii => Command::AsciiMode,
            ReturnMode::Binary => Command::BinaryMode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u8) -> Line {
        Line::new(n).unwrap()
    }

    #[test]
    fn test_line_one_and_two_codes() {
        assert_eq!(Command::Assert(line(1)).byte(), b'1');
        assert_eq!(Command::Deassert(line(1)).byte(), b'Q');
        assert_eq!(Command::Read(line(2)).byte(), b'S');
    }

    #[test]
    fn test_line_eight_codes() {
        assert_eq!(Command::Assert(line(8)).byte(), b'8');
        assert_eq!(Command::Deassert(line(8)).byte(), b'I');
        assert_eq!(Command::Read(line(8)).byte(), b'K');
    }

    #[test]
    fn test_control_codes() {
        assert_eq!(Command::Ping.byte(), b'\'');
        assert_eq!(ReturnMode::Binary.command().byte(), b'\\');
        assert_eq!(ReturnMode::Ascii.command().byte(), b'`');
        assert!(Command::Ping.expects_reply());
        assert!(!Command::Assert(Line::ONE).expects_reply());
    }
}
