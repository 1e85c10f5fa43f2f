use crate::Error;

/// Re-export to allow using [Transport] with [std::io] streams.
#[cfg(feature = "std")]
pub use embedded_io_adapters::std::FromStd;

/// Default size of the read-ahead buffer in [Transport].
pub const READ_BUFFER_SIZE: usize = 64;

/// Byte-level access to a half-duplex serial bus.
///
/// Writes go straight through and are flushed. Reads are pulled from the
/// port in chunks of up to `SIZE` bytes and handed out one at a time, so
/// a reply parser can stop exactly where a frame ends.
///
/// Timeouts are whatever the port does. A port that blocks forever will
/// block [Self::read_byte] forever too.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Transport<F, const SIZE: usize = READ_BUFFER_SIZE> {
    port: F,
    buffer: [u8; SIZE],
    start: usize,
    end: usize,
}

impl<F, const SIZE: usize> Transport<F, SIZE> {
    pub fn new(port: F) -> Self {
        Self {
            port,
            buffer: [0u8; SIZE],
            start: 0,
            end: 0,
        }
    }

    /// Release the underlying port. Any read-ahead is lost.
    pub fn free(self) -> F {
        self.port
    }

    /// Get the underlying port.
    pub fn port(&self) -> &F {
        &self.port
    }

    /// Get the underlying port, mutably.
    ///
    /// Reading from this directly will skip over anything already sitting
    /// in the read-ahead buffer.
    pub fn port_mut(&mut self) -> &mut F {
        &mut self.port
    }

    /// Bytes read from the port but not yet handed out.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.start..self.end]
    }

    /// Throw away the read-ahead buffer.
    pub fn discard(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// Write all of `bytes` and flush.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error<F::Error>>
    where
        F: embedded_io::Write,
    {
        self.port.write_all(bytes).map_err(Error::from_io)?;
        self.port.flush().map_err(Error::from_io)
    }

    /// Read one byte, going to the port only when the buffer is empty.
    pub fn read_byte(&mut self) -> Result<u8, Error<F::Error>>
    where
        F: embedded_io::Read,
    {
        if self.start >= self.end {
            let amt = self.port.read(&mut self.buffer).map_err(Error::from_io)?;
            if amt == 0 {
                // end of file is an error
                return Err(Error::UnexpectedEof);
            }
            self.start = 0;
            self.end = amt;
        }

        let byte = self.buffer[self.start];
        self.start += 1;
        Ok(byte)
    }
}

#[cfg(feature = "std")]
impl<F, const SIZE: usize> Transport<FromStd<F>, SIZE> {
    /// Create a transport over an [std::io] port.
    pub fn new_std(port: F) -> Self {
        Self::new(FromStd::new(port))
    }
}
