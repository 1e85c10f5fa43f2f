/// Running frame checksum: the inverted low byte of the sum of every
/// byte after the header.
///
/// Used the same way in both directions. For requests that's id,
/// length, instruction and parameters; for replies it's id, length,
/// status and data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checksum {
    sum: u8,
}

impl Checksum {
    pub const fn new() -> Self {
        Self { sum: 0 }
    }

    pub fn update_u8(&mut self, byte: u8) {
        self.sum = self.sum.wrapping_add(byte);
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.update_u8(*b);
        }
    }

    pub fn finalize(self) -> u8 {
        !self.sum
    }
}

/// Checksum a complete run of frame bytes in one go.
pub fn checksum(bytes: &[u8]) -> u8 {
    let mut digest = Checksum::new();
    digest.update(bytes);
    digest.finalize()
}
