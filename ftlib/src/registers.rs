//! Control table layout for STS/SMS series servos.
//!
//! Multi-byte registers are little-endian. Addresses below
//! [LOCK] live in EEPROM and only stick while the servo is unlocked.

use alloc::vec::Vec;

use crate::protocol::{decode16, encode16};

/// How many bytes a register spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Width {
    Byte = 1,
    Word = 2,
}

impl Width {
    pub fn len(self) -> u8 {
        self as u8
    }
}

/// A named location in the control table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub name: &'static str,
    pub address: u8,
    pub width: Width,
}

impl Register {
    pub const fn new(name: &'static str, address: u8, width: Width) -> Self {
        Self {
            name,
            address,
            width,
        }
    }

    /// Turn a value into the bytes to write, if it fits.
    pub fn encode(&self, value: u16) -> Option<Vec<u8>> {
        match self.width {
            Width::Byte => u8::try_from(value).ok().map(|b| alloc::vec![b]),
            Width::Word => Some(encode16(value).to_vec()),
        }
    }

    /// Turn bytes read from the servo into a value. Returns [None] if
    /// there aren't exactly [Self::width] of them.
    pub fn decode(&self, bytes: &[u8]) -> Option<u16> {
        match (self.width, bytes) {
            (Width::Byte, [b]) => Some(*b as u16),
            (Width::Word, [lo, hi]) => Some(decode16([*lo, *hi])),
            _ => None,
        }
    }

    /// Look up a register by name, ignoring case.
    pub fn by_name(name: &str) -> Option<&'static Register> {
        ALL.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn by_address(address: u8) -> Option<&'static Register> {
        ALL.iter().find(|r| r.address == address)
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub const MODEL: Register = Register::new("model", 3, Width::Word);
pub const ID: Register = Register::new("id", 5, Width::Byte);
/// Baud rate index, 0 is 1Mbps.
pub const BAUD_RATE: Register = Register::new("baud", 6, Width::Byte);
pub const MIN_ANGLE_LIMIT: Register = Register::new("min-angle", 9, Width::Word);
pub const MAX_ANGLE_LIMIT: Register = Register::new("max-angle", 11, Width::Word);
pub const TORQUE_ENABLE: Register = Register::new("torque", 40, Width::Byte);
pub const GOAL_POSITION: Register = Register::new("goal-position", 42, Width::Word);
pub const GOAL_TIME: Register = Register::new("goal-time", 44, Width::Word);
pub const GOAL_SPEED: Register = Register::new("goal-speed", 46, Width::Word);
/// EEPROM write lock. 0 unlocks, 1 locks.
pub const LOCK: Register = Register::new("lock", 55, Width::Byte);
pub const PRESENT_POSITION: Register = Register::new("position", 56, Width::Word);
pub const PRESENT_SPEED: Register = Register::new("speed", 58, Width::Word);
/// In tenths of a volt.
pub const PRESENT_VOLTAGE: Register = Register::new("voltage", 62, Width::Byte);
/// In degrees Celsius.
pub const PRESENT_TEMPERATURE: Register = Register::new("temperature", 63, Width::Byte);

/// Every register known by name, in address order.
pub const ALL: &[Register] = &[
    MODEL,
    ID,
    BAUD_RATE,
    MIN_ANGLE_LIMIT,
    MAX_ANGLE_LIMIT,
    TORQUE_ENABLE,
    GOAL_POSITION,
    GOAL_TIME,
    GOAL_SPEED,
    LOCK,
    PRESENT_POSITION,
    PRESENT_SPEED,
    PRESENT_VOLTAGE,
    PRESENT_TEMPERATURE,
];

/// The registers shown by a dump, in display order.
pub const DUMP: &[Register] = &[
    MODEL,
    ID,
    BAUD_RATE,
    MIN_ANGLE_LIMIT,
    MAX_ANGLE_LIMIT,
    TORQUE_ENABLE,
    GOAL_POSITION,
    GOAL_TIME,
    PRESENT_POSITION,
    PRESENT_SPEED,
    PRESENT_VOLTAGE,
    PRESENT_TEMPERATURE,
];

/// Position steps in one full turn.
pub const STEPS_PER_TURN: u16 = 4096;

/// Convert a position to degrees.
pub fn steps_to_degrees(steps: u16) -> f32 {
    steps as f32 * 360.0 / STEPS_PER_TURN as f32
}

/// Convert degrees to the nearest position, clamped to one turn.
pub fn degrees_to_steps(degrees: f32) -> u16 {
    let steps = degrees * STEPS_PER_TURN as f32 / 360.0;
    if steps.is_nan() || steps <= 0.0 {
        0
    } else if steps >= (STEPS_PER_TURN - 1) as f32 {
        STEPS_PER_TURN - 1
    } else {
        // round half up without libm
        (steps + 0.5) as u16
    }
}
