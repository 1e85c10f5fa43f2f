use alloc::vec::Vec;

use void::ResultVoidExt;

use super::checksum::Checksum;
use super::{Instruction, HEADER, MAX_PARAMS};

/// A trait for serializing frames.
pub trait Serializer {
    type Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error>;

    // everything else can be written in terms of write_u8

    // Note: specialize these in SerializerLength and &mut S too, if
    // you add one here.

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        for b in val.iter() {
            self.write_u8(*b)?;
        }
        Ok(())
    }

    fn write_le_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        self.write_bytes(&super::encode16(val))
    }
}

impl<S> Serializer for &mut S
where
    S: Serializer,
{
    type Error = S::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        (*self).write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        (*self).write_bytes(val)
    }

    fn write_le_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        (*self).write_le_u16(val)
    }
}

/// Wrap an [embedded_io::Write] to become a Serializer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerWrap<T> {
    inner: T,
}

impl<T> SerializerWrap<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn done(self) -> T {
        self.inner
    }
}

impl<T> core::ops::Deref for SerializerWrap<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> core::ops::DerefMut for SerializerWrap<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T> Serializer for SerializerWrap<T>
where
    T: embedded_io::Write,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.inner.write_all(&[val])
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(val)
    }
}

/// A serializer that collects everything into a [Vec].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerVec {
    data: Vec<u8>,
}

impl SerializerVec {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn done(self) -> Vec<u8> {
        self.data
    }
}

impl Serializer for SerializerVec {
    type Error = void::Void;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.data.push(val);
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.data.extend_from_slice(val);
        Ok(())
    }
}

/// A serializer that only counts bytes written.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerLength {
    len: usize,
}

impl SerializerLength {
    pub fn new() -> Self {
        SerializerLength { len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Serializer for SerializerLength {
    type Error = void::Void;

    fn write_u8(&mut self, _val: u8) -> Result<(), Self::Error> {
        self.len += 1;
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.len += val.len();
        Ok(())
    }

    fn write_le_u16(&mut self, _val: u16) -> Result<(), Self::Error> {
        self.len += 2;
        Ok(())
    }
}

/// A serializer that also computes the frame checksum on the side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerChecksum<T> {
    digest: Checksum,
    inner: T,
}

impl<T> SerializerChecksum<T> {
    pub fn new(inner: T) -> Self {
        Self {
            digest: Checksum::new(),
            inner,
        }
    }

    pub fn finalize(self) -> (u8, T) {
        (self.digest.finalize(), self.inner)
    }
}

impl<T> Serializer for SerializerChecksum<T>
where
    T: Serializer,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.digest.update_u8(val);
        self.inner.write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.digest.update(val);
        self.inner.write_bytes(val)
    }
}

/// Too many parameter (or data) bytes to fit the length byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameTooLong(pub usize);

impl core::fmt::Display for FrameTooLong {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{} parameter bytes do not fit in a frame (max {})",
            self.0, MAX_PARAMS
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameTooLong {}

/// A trait for things that serialize into a complete frame.
///
/// Requests and replies share a layout: header, id, length, one code
/// byte (instruction or status), body, checksum.
pub trait FrameSerialize {
    /// The id this frame is addressed to (or from).
    fn frame_id(&self) -> u8;

    /// Instruction code for requests, status byte for replies.
    fn frame_code(&self) -> u8;

    /// Serialize just the body (parameters or data).
    ///
    /// This *must* write the same bytes every time it's called, it is
    /// run once to measure the length.
    fn frame_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer;

    /// Serialize the whole frame, with header, length and checksum.
    fn frame<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        let mut len_ser = SerializerLength::new();
        self.frame_body(&mut len_ser).void_unwrap();
        // code + body + checksum. constructors keep this within a u8
        let len = (len_ser.len() + 2) as u8;

        ser.write_bytes(&HEADER)?;

        let mut sum_ser = SerializerChecksum::new(ser);
        sum_ser.write_u8(self.frame_id())?;
        sum_ser.write_u8(len)?;
        sum_ser.write_u8(self.frame_code())?;
        self.frame_body(&mut sum_ser)?;
        let (sum, ser) = sum_ser.finalize();

        ser.write_u8(sum)
    }

    /// Serialize the whole frame into a fresh [Vec].
    fn to_bytes(&self) -> Vec<u8> {
        let mut ser = SerializerVec::new();
        self.frame(&mut ser).void_unwrap();
        ser.done()
    }
}

fn check_len(params: &[u8]) -> Result<(), FrameTooLong> {
    if params.len() > MAX_PARAMS {
        Err(FrameTooLong(params.len()))
    } else {
        Ok(())
    }
}

/// An instruction packet, host to servo.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Request {
    id: u8,
    instruction: Instruction,
    params: Vec<u8>,
}

impl Request {
    pub fn new(id: u8, instruction: Instruction, params: &[u8]) -> Result<Self, FrameTooLong> {
        check_len(params)?;
        Ok(Self {
            id,
            instruction,
            params: params.to_vec(),
        })
    }

    pub fn ping(id: u8) -> Self {
        Self {
            id,
            instruction: Instruction::Ping,
            params: Vec::new(),
        }
    }

    /// Read `width` bytes starting at `address`.
    pub fn read(id: u8, address: u8, width: u8) -> Self {
        Self {
            id,
            instruction: Instruction::Read,
            params: alloc::vec![address, width],
        }
    }

    /// Write `payload` starting at `address`.
    pub fn write(id: u8, address: u8, payload: &[u8]) -> Result<Self, FrameTooLong> {
        Self::with_address(id, Instruction::Write, address, payload)
    }

    /// Stage a write, to be applied by a later [Request::action].
    pub fn reg_write(id: u8, address: u8, payload: &[u8]) -> Result<Self, FrameTooLong> {
        Self::with_address(id, Instruction::RegWrite, address, payload)
    }

    pub fn action(id: u8) -> Self {
        Self {
            id,
            instruction: Instruction::Action,
            params: Vec::new(),
        }
    }

    fn with_address(
        id: u8,
        instruction: Instruction,
        address: u8,
        payload: &[u8],
    ) -> Result<Self, FrameTooLong> {
        let mut params = Vec::with_capacity(payload.len() + 1);
        params.push(address);
        params.extend_from_slice(payload);
        check_len(&params)?;
        Ok(Self {
            id,
            instruction,
            params,
        })
    }

    // the parser can't produce more than MAX_PARAMS bytes
    pub(crate) fn from_parts(id: u8, instruction: Instruction, params: &[u8]) -> Self {
        Self {
            id,
            instruction,
            params: params.to_vec(),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    pub fn params(&self) -> &[u8] {
        &self.params
    }
}

impl FrameSerialize for Request {
    fn frame_id(&self) -> u8 {
        self.id
    }

    fn frame_code(&self) -> u8 {
        self.instruction.code()
    }

    fn frame_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_bytes(&self.params)
    }
}

/// A status packet, servo to host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reply {
    id: u8,
    status: u8,
    payload: Vec<u8>,
}

impl Reply {
    pub fn new(id: u8, status: u8, payload: &[u8]) -> Result<Self, FrameTooLong> {
        check_len(payload)?;
        Ok(Self {
            id,
            status,
            payload: payload.to_vec(),
        })
    }

    // the reader can't produce more than MAX_PARAMS bytes
    pub(crate) fn from_parts(id: u8, status: u8, payload: Vec<u8>) -> Self {
        Self {
            id,
            status,
            payload,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Zero means success. Anything else is a device-reported error.
    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// The checksum byte this reply carries on the wire.
    pub fn checksum(&self) -> u8 {
        let mut digest = Checksum::new();
        digest.update(&[self.id, (self.payload.len() + 2) as u8, self.status]);
        digest.update(&self.payload);
        digest.finalize()
    }
}

impl FrameSerialize for Reply {
    fn frame_id(&self) -> u8 {
        self.id
    }

    fn frame_code(&self) -> u8 {
        self.status
    }

    fn frame_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_bytes(&self.payload)
    }
}
