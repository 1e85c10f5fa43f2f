use core::time::Duration;

/// Every frame, in both directions, starts with this.
pub const HEADER: [u8; 2] = [0xff, 0xff];

/// Factory default for STS/SMS servos (baud register value 0).
pub const BAUD_RATE: u32 = 1_000_000;

/// Per-byte read timeout. An absent servo shows up as one of these.
pub const READ_TIMEOUT: Duration = Duration::from_millis(30);

/// Every servo acts on frames sent here, and none of them reply.
pub const BROADCAST_ID: u8 = 0xfe;

/// Largest id a single servo can have.
pub const MAX_ID: u8 = 0xfd;

/// The length byte counts the instruction (or status), the parameters
/// and the checksum, so it caps the parameter count.
pub const MAX_PARAMS: usize = u8::MAX as usize - 2;

/// Header, id, length, then `length` more bytes.
pub const MAX_FRAME_SIZE: usize = HEADER.len() + 2 + u8::MAX as usize;

pub mod checksum;
pub use checksum::{checksum, Checksum};

pub mod parse;
pub use parse::{ChecksumMismatch, ParseResult, ReplyReader, ReplyState};

pub mod serialize;
pub use serialize::{FrameSerialize, FrameTooLong, Reply, Request};

/// Instruction codes understood by the servos.
///
/// Sync write (0x83) exists on the wire but is not spoken here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
}

impl Instruction {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Instruction {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(Self::Ping),
            0x02 => Ok(Self::Read),
            0x03 => Ok(Self::Write),
            0x04 => Ok(Self::RegWrite),
            0x05 => Ok(Self::Action),
            other => Err(other),
        }
    }
}

/// Little-endian bytes of a 16-bit register value.
pub fn encode16(value: u16) -> [u8; 2] {
    [(value & 0xff) as u8, (value >> 8) as u8]
}

/// Inverse of [encode16].
pub fn decode16(bytes: [u8; 2]) -> u16 {
    (bytes[0] as u16) | ((bytes[1] as u16) << 8)
}

#[cfg(test)]
mod test {
    use super::*;

    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn encode16_decode16(value: u16) -> bool {
        decode16(encode16(value)) == value
    }

    #[test]
    fn encode16_decode16_every_value() {
        for value in 0..=u16::MAX {
            assert_eq!(decode16(encode16(value)), value);
        }
    }

    #[test]
    fn encode16_is_little_endian() {
        assert_eq!(encode16(0x1234), [0x34, 0x12]);
        assert_eq!(decode16([0x64, 0x00]), 100);
    }

    #[test]
    fn instruction_codes() {
        for inst in [
            Instruction::Ping,
            Instruction::Read,
            Instruction::Write,
            Instruction::RegWrite,
            Instruction::Action,
        ] {
            assert_eq!(Instruction::try_from(inst.code()), Ok(inst));
        }
        assert_eq!(Instruction::try_from(0x83), Err(0x83));
    }

    #[test]
    fn max_frame_size() {
        assert_eq!(MAX_FRAME_SIZE, 259);
        assert_eq!(MAX_PARAMS, 253);
    }
}
