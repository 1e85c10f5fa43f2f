use alloc::vec::Vec;

use crate::protocol::MAX_ID;
use crate::registers::{self, Register};
use crate::{Client, Error};

impl<F, const SIZE: usize> Client<F, SIZE>
where
    F: embedded_io::Read + embedded_io::Write,
{
    pub fn set_torque(&mut self, id: u8, enabled: bool) -> Result<(), Error<F::Error>> {
        self.write(id, &registers::TORQUE_ENABLE, enabled as u16)
    }

    /// Flip torque on or off. Returns the new state.
    pub fn toggle_torque(&mut self, id: u8) -> Result<bool, Error<F::Error>> {
        let enabled = self.read(id, &registers::TORQUE_ENABLE)? == 0;
        self.set_torque(id, enabled)?;
        Ok(enabled)
    }

    pub fn set_goal_position(&mut self, id: u8, position: u16) -> Result<(), Error<F::Error>> {
        self.write(id, &registers::GOAL_POSITION, position)
    }

    /// Allow EEPROM registers to be changed.
    pub fn unlock(&mut self, id: u8) -> Result<(), Error<F::Error>> {
        self.write(id, &registers::LOCK, 0)
    }

    pub fn lock(&mut self, id: u8) -> Result<(), Error<F::Error>> {
        self.write(id, &registers::LOCK, 1)
    }

    /// Give a servo a new id.
    ///
    /// The servo answers at its new id as soon as the write lands, so
    /// the final lock goes there.
    pub fn change_id(&mut self, id: u8, new_id: u8) -> Result<(), Error<F::Error>> {
        if new_id > MAX_ID {
            return Err(Error::ValueOutOfRange {
                width: registers::ID.width.len(),
                value: new_id as u16,
            });
        }
        self.unlock(id)?;
        self.write(id, &registers::ID, new_id as u16)?;
        self.lock(new_id)
    }

    /// Set the soft position limits.
    pub fn set_limits(&mut self, id: u8, min: u16, max: u16) -> Result<(), Error<F::Error>> {
        self.unlock(id)?;
        self.write(id, &registers::MIN_ANGLE_LIMIT, min)?;
        self.write(id, &registers::MAX_ANGLE_LIMIT, max)?;
        self.lock(id)
    }

    /// Read every register in [registers::DUMP], stopping at the first
    /// failure.
    pub fn dump(&mut self, id: u8) -> Result<Vec<(Register, u16)>, Error<F::Error>> {
        let mut values = Vec::with_capacity(registers::DUMP.len());
        for register in registers::DUMP {
            values.push((*register, self.read(id, register)?));
        }
        Ok(values)
    }

    /// Read `len` raw bytes of the control table from `start`, at most
    /// `chunk` bytes per request. `progress` gets the running total.
    ///
    /// The read stops at the end of the table.
    pub fn read_table<P>(
        &mut self,
        id: u8,
        start: u8,
        len: usize,
        chunk: u8,
        mut progress: P,
    ) -> Result<Vec<u8>, Error<F::Error>>
    where
        P: FnMut(usize),
    {
        let len = len.min(u8::MAX as usize + 1 - start as usize);
        let chunk = chunk.max(1) as usize;
        let mut table = Vec::with_capacity(len);
        while table.len() < len {
            let address = start as usize + table.len();
            let width = chunk.min(len - table.len());
            let bytes = self.read_register(id, address as u8, width as u8)?;
            table.extend_from_slice(&bytes);
            progress(table.len());
        }
        Ok(table)
    }
}
