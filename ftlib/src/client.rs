use alloc::vec::Vec;

use crate::protocol::{FrameSerialize, Reply, ReplyReader, Request, BROADCAST_ID};
use crate::registers::Register;
use crate::transport::{Transport, READ_BUFFER_SIZE};
use crate::Error;

#[cfg(feature = "std")]
use crate::transport::FromStd;

/// A host-side client for the servo bus.
///
/// One request goes out, one reply comes back. Nothing here is
/// pipelined, so a single client should own the port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Client<F, const SIZE: usize = READ_BUFFER_SIZE> {
    transport: Transport<F, SIZE>,
    reader: ReplyReader,
}

/// A client using an [std::io] port.
#[cfg(feature = "std")]
pub type ClientStd<F> = Client<FromStd<F>>;

impl<F, const SIZE: usize> Client<F, SIZE> {
    /// Create a new client.
    pub fn new(port: F) -> Self {
        Self::new_with(Transport::new(port))
    }

    /// Create a new client from an existing [Transport].
    pub fn new_with(transport: Transport<F, SIZE>) -> Self {
        Self {
            transport,
            reader: ReplyReader::new(),
        }
    }

    /// Release the underlying port.
    pub fn free(self) -> F {
        self.transport.free()
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &Transport<F, SIZE> {
        &self.transport
    }

    /// Get the underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut Transport<F, SIZE> {
        &mut self.transport
    }

    /// Get the underlying port.
    pub fn port(&self) -> &F {
        self.transport.port()
    }

    /// Get the underlying port, mutably.
    ///
    /// Using this won't confuse the client, but bytes already buffered
    /// by the transport will not show up here.
    pub fn port_mut(&mut self) -> &mut F {
        self.transport.port_mut()
    }
}

#[cfg(feature = "std")]
impl<F> ClientStd<F> {
    /// Create a new client using an [std::io] port.
    pub fn new_std(port: F) -> Self {
        Self::new(FromStd::new(port))
    }
}

impl<F, const SIZE: usize> Client<F, SIZE>
where
    F: embedded_io::Read + embedded_io::Write,
{
    /// Send a request without waiting for anything back.
    ///
    /// Anything still in the read-ahead buffer belongs to an earlier
    /// exchange and is dropped first.
    pub fn send(&mut self, request: &Request) -> Result<(), Error<F::Error>> {
        let stale = self.transport.buffered().len();
        if stale > 0 {
            tracing::debug!(stale, "dropping unread bytes before send");
        }
        self.transport.discard();

        let bytes = request.to_bytes();
        tracing::trace!("tx {:?} {:02x?}", request.instruction(), bytes);
        self.transport.write(&bytes)
    }

    /// Wait for the next complete reply.
    ///
    /// Garbage before the header is skipped. Each byte gets the full
    /// port timeout, so a chattering bus can hold this up indefinitely.
    pub fn receive(&mut self) -> Result<Reply, Error<F::Error>> {
        self.reader.reset();
        loop {
            let byte = self.transport.read_byte()?;
            match self.reader.push(byte) {
                Ok(None) => continue,
                Ok(Some(reply)) => {
                    tracing::trace!(
                        "rx id={} status={:#04x} {:02x?}",
                        reply.id(),
                        reply.status(),
                        reply.payload()
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    tracing::warn!("dropping corrupt reply: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Send a request and wait for its reply. A nonzero status becomes
    /// [Error::DeviceError].
    ///
    /// Replies from other ids are skipped, so a late answer to an
    /// earlier request runs into the timeout instead of being taken for
    /// this one.
    pub fn transact(&mut self, request: &Request) -> Result<Reply, Error<F::Error>> {
        self.send(request)?;
        let reply = loop {
            let reply = self.receive()?;
            if reply.id() == request.id() {
                break reply;
            }
            tracing::warn!(
                sent = request.id(),
                got = reply.id(),
                "skipping reply from another id"
            );
        };
        if reply.status() != 0 {
            return Err(Error::DeviceError(reply.status()));
        }
        Ok(reply)
    }

    /// Requests to [BROADCAST_ID] get no reply, so only send those.
    fn command(&mut self, request: &Request) -> Result<(), Error<F::Error>> {
        if request.id() == BROADCAST_ID {
            self.send(request)
        } else {
            self.transact(request).map(|_| ())
        }
    }

    /// Check that a servo answers.
    pub fn ping(&mut self, id: u8) -> Result<(), Error<F::Error>> {
        self.transact(&Request::ping(id)).map(|_| ())
    }

    /// Read `width` raw bytes starting at `address`.
    pub fn read_register(
        &mut self,
        id: u8,
        address: u8,
        width: u8,
    ) -> Result<Vec<u8>, Error<F::Error>> {
        let reply = self.transact(&Request::read(id, address, width))?;
        if reply.payload().len() != width as usize {
            return Err(Error::LengthMismatch {
                expected: width as usize,
                actual: reply.payload().len(),
            });
        }
        Ok(reply.into_payload())
    }

    /// Write raw bytes starting at `address`.
    ///
    /// No width checking happens here, the bytes go out as given.
    pub fn write_register(
        &mut self,
        id: u8,
        address: u8,
        payload: &[u8],
    ) -> Result<(), Error<F::Error>> {
        self.command(&Request::write(id, address, payload)?)
    }

    /// Stage a write, to be applied on the next [Self::action].
    pub fn reg_write(
        &mut self,
        id: u8,
        address: u8,
        payload: &[u8],
    ) -> Result<(), Error<F::Error>> {
        self.command(&Request::reg_write(id, address, payload)?)
    }

    /// Apply staged writes. Usually sent to [BROADCAST_ID].
    pub fn action(&mut self, id: u8) -> Result<(), Error<F::Error>> {
        self.command(&Request::action(id))
    }

    /// Read a register as a number.
    pub fn read(&mut self, id: u8, register: &Register) -> Result<u16, Error<F::Error>> {
        let width = register.width.len();
        let bytes = self.read_register(id, register.address, width)?;
        register.decode(&bytes).ok_or(Error::LengthMismatch {
            expected: width as usize,
            actual: bytes.len(),
        })
    }

    /// Write a number to a register, refusing values that don't fit.
    pub fn write(
        &mut self,
        id: u8,
        register: &Register,
        value: u16,
    ) -> Result<(), Error<F::Error>> {
        let bytes = register.encode(value).ok_or(Error::ValueOutOfRange {
            width: register.width.len(),
            value,
        })?;
        self.write_register(id, register.address, &bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::protocol::parse;
    use crate::registers;
    use crate::sim::{SimBus, SimError};

    use quickcheck_macros::quickcheck;

    fn bus(ids: &[u8]) -> Client<SimBus> {
        Client::new(SimBus::with_servos(ids.iter().copied()))
    }

    #[test]
    fn read_present_position() {
        let mut client = bus(&[1]);
        client
            .port_mut()
            .servo_mut(1)
            .unwrap()
            .set(&registers::PRESENT_POSITION, 100);

        assert_eq!(client.read(1, &registers::PRESENT_POSITION), Ok(100));
        // exactly one read request went out
        assert_eq!(
            client.port().sent(),
            &[0xff, 0xff, 0x01, 0x04, 0x02, 0x38, 0x02, 0xb8]
        );
    }

    #[test]
    fn absent_servo_times_out() {
        let mut client = bus(&[1]);
        assert_eq!(client.ping(2), Err(Error::Timeout));
        assert_eq!(client.ping(1), Ok(()));
    }

    #[test]
    fn nonzero_status_is_device_error() {
        let mut client = bus(&[3]);
        client.port_mut().servo_mut(3).unwrap().set_status(0x20);
        assert_eq!(
            client.read(3, &registers::PRESENT_TEMPERATURE),
            Err(Error::DeviceError(0x20))
        );
    }

    #[test]
    fn device_error_wins_over_length() {
        let mut client = bus(&[3]);
        // status 0x04 and no data at all
        client.port_mut().inject(&Reply::new(3, 0x04, &[]).unwrap().to_bytes());
        client.port_mut().remove_servo(3);
        assert_eq!(
            client.read_register(3, 56, 2),
            Err(Error::DeviceError(0x04))
        );
    }

    #[test]
    fn short_reply_is_length_mismatch() {
        let mut client = bus(&[]);
        client.port_mut().inject(&Reply::new(1, 0, &[0x64]).unwrap().to_bytes());
        assert_eq!(
            client.read_register(1, 56, 2),
            Err(Error::LengthMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn corrupt_reply_is_checksum_mismatch() {
        let mut client = bus(&[]);
        client
            .port_mut()
            .inject(&[0xff, 0xff, 0x01, 0x04, 0x00, 0x64, 0x00, 0x00]);
        assert_eq!(
            client.read_register(1, 56, 2),
            Err(Error::ChecksumMismatch {
                provided: 0x00,
                expected: 0x96
            })
        );
    }

    #[test]
    fn noise_before_reply_is_skipped() {
        let mut client = bus(&[1]);
        client
            .port_mut()
            .servo_mut(1)
            .unwrap()
            .set(&registers::PRESENT_POSITION, 0x0123);
        client.port_mut().inject(&[0x00, 0xff, 0x13, 0x37]);
        assert_eq!(client.read(1, &registers::PRESENT_POSITION), Ok(0x0123));
    }

    #[test]
    fn reply_from_other_id_is_skipped() {
        let mut client = bus(&[1]);
        client
            .port_mut()
            .servo_mut(1)
            .unwrap()
            .set(&registers::PRESENT_POSITION, 300);
        client
            .port_mut()
            .inject(&Reply::new(6, 0, &[0x00, 0x08]).unwrap().to_bytes());
        assert_eq!(client.read(1, &registers::PRESENT_POSITION), Ok(300));
    }

    #[test]
    fn corrupt_ff_id_is_checksum_mismatch() {
        let mut client = bus(&[]);
        let mut bytes = Reply::new(1, 0x20, &[0x64, 0x00]).unwrap().to_bytes();
        bytes[2] = 0xff;
        client.port_mut().inject(&bytes);
        assert_eq!(
            client.read_register(1, 56, 2),
            Err(Error::ChecksumMismatch {
                provided: 0x76,
                expected: 0x78
            })
        );
    }

    #[test]
    fn send_drops_read_ahead() {
        let mut client = bus(&[1]);
        client
            .port_mut()
            .answer_next(&Reply::new(1, 0, &[0x11, 0x00]).unwrap().to_bytes());
        client.ping(1).unwrap();
        // the canned reply arrived with the ping reply and was buffered
        assert!(!client.transport().buffered().is_empty());

        client.port_mut().remove_servo(1);
        assert_eq!(client.read(1, &registers::PRESENT_POSITION), Err(Error::Timeout));
        assert!(client.transport().buffered().is_empty());
    }

    #[test]
    fn write_then_read_back() {
        let mut client = bus(&[7]);
        client.write(7, &registers::GOAL_POSITION, 1000).unwrap();
        assert_eq!(client.read(7, &registers::GOAL_POSITION), Ok(1000));

        client.write_register(7, 44, &[0x10, 0x00]).unwrap();
        assert_eq!(client.read_register(7, 44, 2), Ok(vec![0x10, 0x00]));
    }

    #[test]
    fn write_rejects_wide_values() {
        let mut client = bus(&[7]);
        assert_eq!(
            client.write(7, &registers::TORQUE_ENABLE, 300),
            Err(Error::ValueOutOfRange {
                width: 1,
                value: 300
            })
        );
        // nothing was sent
        assert!(client.port().sent().is_empty());
    }

    #[test]
    fn too_many_params() {
        let mut client = bus(&[7]);
        assert_eq!(
            client.write_register(7, 0, &[0u8; 254]),
            Err(Error::FrameTooLong(255))
        );
    }

    #[test]
    fn broadcast_does_not_wait() {
        let mut client = bus(&[1, 2]);
        client
            .write(BROADCAST_ID, &registers::TORQUE_ENABLE, 1)
            .unwrap();
        for id in [1, 2] {
            assert_eq!(client.read(id, &registers::TORQUE_ENABLE), Ok(1));
        }
    }

    #[test]
    fn reg_write_waits_for_action() {
        let mut client = bus(&[1, 2]);
        for id in [1, 2] {
            client.reg_write(id, 42, &[0x00, 0x04]).unwrap();
            assert_ne!(client.read(id, &registers::GOAL_POSITION), Ok(1024));
            assert!(client.port().servo(id).unwrap().is_staged());
        }
        client.action(BROADCAST_ID).unwrap();
        for id in [1, 2] {
            assert_eq!(client.read(id, &registers::GOAL_POSITION), Ok(1024));
            assert!(!client.port().servo(id).unwrap().is_staged());
        }
    }

    #[test]
    fn sent_frames_parse_back() {
        let mut client = bus(&[1]);
        client.ping(1).unwrap();
        let (consumed, res) = parse::request(client.port().sent());
        assert_eq!(consumed, client.port().sent().len());
        assert_eq!(res.ok(), Some(Request::ping(1)));
    }

    #[test]
    fn io_error_is_reported() {
        let mut client = bus(&[1]);
        client.port_mut().fail_next_read();
        assert_eq!(client.ping(1), Err(Error::Io(SimError::Unplugged)));
    }

    #[quickcheck]
    fn word_registers_round_trip(value: u16) -> bool {
        let mut client = bus(&[9]);
        client.write(9, &registers::GOAL_TIME, value).is_ok()
            && client.read(9, &registers::GOAL_TIME) == Ok(value)
    }
}
