//! An in-memory servo bus, for tests and for `fttool simulate`.
//!
//! [SimBus] implements [embedded_io::Read] and [embedded_io::Write]
//! like a serial port would. Requests written to it are answered by
//! whichever simulated servos they are addressed to.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use crate::protocol::{
    parse, FrameSerialize, Instruction, ParseResult, Reply, Request, BROADCAST_ID, MAX_PARAMS,
};
use crate::registers::{self, Register, Width};

/// Bytes in a simulated control table.
pub const TABLE_SIZE: usize = 256;

/// Status bit for an out-of-range access.
pub const STATUS_RANGE: u8 = 0x10;

/// Model number reported by simulated servos (STS3215).
pub const SIM_MODEL: u16 = 777;

/// Errors from reading a [SimBus].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SimError {
    /// Nothing left to read.
    TimedOut,
    /// Set up with [SimBus::fail_next_read].
    Unplugged,
}

impl embedded_io::Error for SimError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::TimedOut => embedded_io::ErrorKind::TimedOut,
            Self::Unplugged => embedded_io::ErrorKind::Other,
        }
    }
}

impl core::fmt::Display for SimError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timed out"),
            Self::Unplugged => write!(f, "bus unplugged"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SimError {}

/// One simulated servo: a control table and a staged write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimServo {
    table: [u8; TABLE_SIZE],
    staged: Option<(u8, Vec<u8>)>,
    status: u8,
}

impl SimServo {
    pub fn new(id: u8) -> Self {
        let mut servo = Self {
            table: [0u8; TABLE_SIZE],
            staged: None,
            status: 0,
        };
        servo.set(&registers::MODEL, SIM_MODEL);
        servo.set(&registers::ID, id as u16);
        servo.set(&registers::MIN_ANGLE_LIMIT, 0);
        servo.set(&registers::MAX_ANGLE_LIMIT, 4095);
        servo.set(&registers::LOCK, 1);
        servo.set(&registers::GOAL_POSITION, 2048);
        servo.set(&registers::PRESENT_POSITION, 2048);
        servo.set(&registers::PRESENT_VOLTAGE, 120);
        servo.set(&registers::PRESENT_TEMPERATURE, 30);
        servo
    }

    pub fn id(&self) -> u8 {
        self.table[registers::ID.address as usize]
    }

    pub fn table(&self) -> &[u8; TABLE_SIZE] {
        &self.table
    }

    pub fn get(&self, register: &Register) -> u16 {
        let at = register.address as usize;
        match register.width {
            Width::Byte => self.table[at] as u16,
            Width::Word => u16::from_le_bytes([self.table[at], self.table[at + 1]]),
        }
    }

    /// Set a register directly. Byte registers keep the low byte.
    pub fn set(&mut self, register: &Register, value: u16) {
        let at = register.address as usize;
        let bytes = value.to_le_bytes();
        let len = register.width.len() as usize;
        self.table[at..at + len].copy_from_slice(&bytes[..len]);
    }

    /// Make every following reply carry this status (0 to stop).
    pub fn set_status(&mut self, status: u8) {
        self.status = status;
    }

    /// Is there a reg-write waiting for an action?
    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    fn store(&mut self, address: u8, data: &[u8]) -> bool {
        let start = address as usize;
        let end = start + data.len();
        if data.is_empty() || end > TABLE_SIZE {
            return false;
        }
        self.table[start..end].copy_from_slice(data);

        // with torque on, the horn gets where it's told instantly
        if self.get(&registers::TORQUE_ENABLE) != 0 {
            let goal = self.get(&registers::GOAL_POSITION);
            self.set(&registers::PRESENT_POSITION, goal);
        }
        true
    }

    /// Act on a request. Returns the reply status and data.
    fn execute(&mut self, request: &Request) -> (u8, Vec<u8>) {
        if self.status != 0 {
            return (self.status, Vec::new());
        }

        let params = request.params();
        match request.instruction() {
            Instruction::Ping => (0, Vec::new()),
            Instruction::Read => {
                let [address, len] = params else {
                    return (STATUS_RANGE, Vec::new());
                };
                let start = *address as usize;
                let end = start + *len as usize;
                if *len as usize > MAX_PARAMS || end > TABLE_SIZE {
                    return (STATUS_RANGE, Vec::new());
                }
                (0, self.table[start..end].to_vec())
            }
            Instruction::Write => match params.split_first() {
                Some((address, data)) if self.store(*address, data) => (0, Vec::new()),
                _ => (STATUS_RANGE, Vec::new()),
            },
            Instruction::RegWrite => match params.split_first() {
                Some((address, data)) if !data.is_empty() => {
                    self.staged = Some((*address, data.to_vec()));
                    (0, Vec::new())
                }
                _ => (STATUS_RANGE, Vec::new()),
            },
            Instruction::Action => {
                if let Some((address, data)) = self.staged.take() {
                    self.store(address, &data);
                }
                (0, Vec::new())
            }
        }
    }
}

/// A bus full of [SimServo]s, behaving like a serial port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SimBus {
    servos: BTreeMap<u8, SimServo>,
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
    answers: VecDeque<Vec<u8>>,
    sent: Vec<u8>,
    fail_next_read: bool,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus with a factory-fresh servo at each id.
    pub fn with_servos<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        let mut bus = Self::new();
        for id in ids {
            bus.add_servo(id);
        }
        bus
    }

    /// Add (or reset) the servo at `id`.
    pub fn add_servo(&mut self, id: u8) -> &mut SimServo {
        self.servos
            .entry(id)
            .and_modify(|servo| *servo = SimServo::new(id))
            .or_insert_with(|| SimServo::new(id))
    }

    pub fn remove_servo(&mut self, id: u8) -> Option<SimServo> {
        self.servos.remove(&id)
    }

    pub fn servo(&self, id: u8) -> Option<&SimServo> {
        self.servos.get(&id)
    }

    pub fn servo_mut(&mut self, id: u8) -> Option<&mut SimServo> {
        self.servos.get_mut(&id)
    }

    /// Ids of every servo on the bus, in order.
    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.servos.keys().copied()
    }

    /// Queue bytes to be read back, as if something else on the bus
    /// had sent them.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.outbox.extend(bytes);
    }

    /// Everything written to the bus so far.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Queue a canned reply, let out right after the next request is
    /// handled, as if some other device had answered it.
    pub fn answer_next(&mut self, bytes: &[u8]) {
        self.answers.push_back(bytes.to_vec());
    }

    /// Make the next read fail with [SimError::Unplugged].
    pub fn fail_next_read(&mut self) {
        self.fail_next_read = true;
    }

    /// Take every reply byte waiting to be read.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.outbox.drain(..).collect()
    }

    fn process(&mut self) {
        loop {
            let (consumed, res) = parse::request(&self.inbox);
            self.inbox.drain(..consumed);
            match res {
                ParseResult::Ok(_, request) => {
                    self.handle(&request);
                    if let Some(answer) = self.answers.pop_front() {
                        self.outbox.extend(answer);
                    }
                }
                ParseResult::ParseErr(_, code) => {
                    tracing::debug!("sim: ignoring instruction {:#04x}", code);
                }
                ParseResult::ChecksumErr(_, e) => {
                    tracing::debug!("sim: ignoring request, {}", e);
                }
                ParseResult::None => break,
            }
        }
    }

    fn handle(&mut self, request: &Request) {
        if request.id() == BROADCAST_ID {
            for servo in self.servos.values_mut() {
                servo.execute(request);
            }
            self.renumber();
            return;
        }

        let Some(servo) = self.servos.get_mut(&request.id()) else {
            return;
        };
        let (status, data) = servo.execute(request);
        let reply = Reply::from_parts(request.id(), status, data);
        self.outbox.extend(reply.to_bytes());
        self.renumber();
    }

    // servos whose id register changed move to their new address
    fn renumber(&mut self) {
        let moved: Vec<u8> = self
            .servos
            .iter()
            .filter(|(id, servo)| **id != servo.id())
            .map(|(id, _)| *id)
            .collect();
        for old in moved {
            if let Some(servo) = self.servos.remove(&old) {
                self.servos.insert(servo.id(), servo);
            }
        }
    }
}

impl embedded_io::ErrorType for SimBus {
    type Error = SimError;
}

impl embedded_io::Read for SimBus {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.fail_next_read {
            self.fail_next_read = false;
            return Err(SimError::Unplugged);
        }
        if self.outbox.is_empty() {
            return Err(SimError::TimedOut);
        }

        let amt = buf.len().min(self.outbox.len());
        for (dest, byte) in buf.iter_mut().zip(self.outbox.drain(..amt)) {
            *dest = byte;
        }
        Ok(amt)
    }
}

impl embedded_io::Write for SimBus {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.sent.extend_from_slice(buf);
        self.inbox.extend_from_slice(buf);
        self.process();
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
