use core::ops::RangeInclusive;

use alloc::vec::Vec;

use crate::protocol::MAX_ID;
use crate::registers::{self, Register};
use crate::{Client, Error};

/// Ids probed when nothing else is asked for.
pub const DEFAULT_SCAN_IDS: RangeInclusive<u8> = 1..=200;

/// What a scan learned about one servo.
///
/// Only the position is guaranteed, it is what the servo answered when
/// probed. The rest are read afterwards and are [None] if that read
/// failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snapshot {
    pub id: u8,
    pub model: Option<u16>,
    pub position: u16,
    /// In tenths of a volt.
    pub voltage: Option<u8>,
    /// In degrees Celsius.
    pub temperature: Option<u8>,
    pub torque_enabled: Option<bool>,
    pub min_limit: Option<u16>,
    pub max_limit: Option<u16>,
}

impl Snapshot {
    pub fn volts(&self) -> Option<f32> {
        self.voltage.map(|v| v as f32 / 10.0)
    }
}

/// The outcome of probing one id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Probe {
    Absent(u8),
    Present(Snapshot),
}

impl Probe {
    pub fn id(&self) -> u8 {
        match self {
            Self::Absent(id) => *id,
            Self::Present(snapshot) => snapshot.id,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Absent(_) => None,
            Self::Present(snapshot) => Some(snapshot),
        }
    }

    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Self::Absent(_) => None,
            Self::Present(snapshot) => Some(snapshot),
        }
    }
}

/// A lazy scan over a range of ids, one [Probe] per id.
///
/// Stops for good after the first I/O error. Dropping it early
/// abandons the rest of the range.
#[derive(Debug)]
pub struct Scan<'a, F, const SIZE: usize> {
    client: &'a mut Client<F, SIZE>,
    ids: RangeInclusive<u8>,
    failed: bool,
}

impl<'a, F, const SIZE: usize> Iterator for Scan<'a, F, SIZE>
where
    F: embedded_io::Read + embedded_io::Write,
{
    type Item = Result<Probe, Error<F::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let id = self.ids.next()?;

        let res = match self.client.probe_position(id) {
            Ok(Some(position)) => self
                .client
                .snapshot_at(id, position)
                .map(Probe::Present),
            Ok(None) => Ok(Probe::Absent(id)),
            Err(e) => Err(e),
        };
        if res.is_err() {
            self.failed = true;
        }
        Some(res)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            self.ids.size_hint()
        }
    }
}

impl<F, const SIZE: usize> Client<F, SIZE>
where
    F: embedded_io::Read + embedded_io::Write,
{
    /// Is there a servo at `id`?
    ///
    /// Anything short of an I/O failure counts as an answer: a timeout,
    /// a device error or a garbled reply all mean absent.
    pub fn probe(&mut self, id: u8) -> Result<bool, Error<F::Error>> {
        Ok(self.probe_position(id)?.is_some())
    }

    fn probe_position(&mut self, id: u8) -> Result<Option<u16>, Error<F::Error>> {
        match self.read(id, &registers::PRESENT_POSITION) {
            Ok(position) => {
                tracing::debug!(id, position, "found servo");
                Ok(Some(position))
            }
            Err(e) if e.is_io() => Err(e),
            Err(Error::Timeout) => {
                tracing::trace!(id, "no reply");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(id, "treating as absent: {}", e);
                Ok(None)
            }
        }
    }

    /// Read everything a scan would about a servo known to be there.
    pub fn snapshot(&mut self, id: u8) -> Result<Snapshot, Error<F::Error>> {
        let position = self.read(id, &registers::PRESENT_POSITION)?;
        self.snapshot_at(id, position)
    }

    fn snapshot_at(&mut self, id: u8, position: u16) -> Result<Snapshot, Error<F::Error>> {
        Ok(Snapshot {
            id,
            model: self.telemetry(id, &registers::MODEL)?,
            position,
            voltage: self
                .telemetry(id, &registers::PRESENT_VOLTAGE)?
                .map(|v| v as u8),
            temperature: self
                .telemetry(id, &registers::PRESENT_TEMPERATURE)?
                .map(|v| v as u8),
            torque_enabled: self
                .telemetry(id, &registers::TORQUE_ENABLE)?
                .map(|v| v != 0),
            min_limit: self.telemetry(id, &registers::MIN_ANGLE_LIMIT)?,
            max_limit: self.telemetry(id, &registers::MAX_ANGLE_LIMIT)?,
        })
    }

    // secondary reads: only I/O failures are errors
    fn telemetry(&mut self, id: u8, register: &Register) -> Result<Option<u16>, Error<F::Error>> {
        match self.read(id, register) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_io() => Err(e),
            Err(e) => {
                tracing::warn!(id, register = register.name, "read failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Probe each id in `ids` in turn. Ids past [MAX_ID] are skipped.
    pub fn scan(&mut self, ids: RangeInclusive<u8>) -> Scan<'_, F, SIZE> {
        let (start, end) = ids.into_inner();
        Scan {
            client: self,
            ids: start..=end.min(MAX_ID),
            failed: false,
        }
    }

    /// Scan `ids` and collect every servo found, sorted by id.
    pub fn scan_bus(&mut self, ids: RangeInclusive<u8>) -> Result<Vec<Snapshot>, Error<F::Error>> {
        let mut found = Vec::new();
        for probe in self.scan(ids) {
            if let Some(snapshot) = probe?.into_snapshot() {
                found.push(snapshot);
            }
        }
        found.sort_by_key(|s| s.id);
        Ok(found)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::protocol::{FrameSerialize, Reply};
    use crate::sim::{SimBus, SimError, SIM_MODEL};

    fn bus(ids: &[u8]) -> Client<SimBus> {
        Client::new(SimBus::with_servos(ids.iter().copied()))
    }

    #[test]
    fn finds_servos_in_order() {
        let mut client = bus(&[7, 3, 120]);
        let found = client.scan_bus(DEFAULT_SCAN_IDS).unwrap();
        let ids: Vec<_> = found.iter().map(|s| s.id).collect();
        assert_eq!(ids, [3, 7, 120]);
    }

    #[test]
    fn full_snapshot() {
        let mut client = bus(&[1]);
        {
            let servo = client.port_mut().servo_mut(1).unwrap();
            servo.set(&registers::PRESENT_POSITION, 100);
            servo.set(&registers::PRESENT_VOLTAGE, 121);
            servo.set(&registers::TORQUE_ENABLE, 1);
            servo.set(&registers::MIN_ANGLE_LIMIT, 10);
            servo.set(&registers::MAX_ANGLE_LIMIT, 4000);
        }

        let found = client.scan_bus(1..=1).unwrap();
        assert_eq!(
            found,
            [Snapshot {
                id: 1,
                model: Some(SIM_MODEL),
                position: 100,
                voltage: Some(121),
                temperature: Some(30),
                torque_enabled: Some(true),
                min_limit: Some(10),
                max_limit: Some(4000),
            }]
        );
        assert_eq!(found[0].volts(), Some(12.1));
    }

    #[test]
    fn scan_is_one_probe_per_id() {
        let mut client = bus(&[2]);
        let probes: Vec<_> = client.scan(1..=4).collect::<Result<_, _>>().unwrap();
        assert_eq!(probes.len(), 4);
        assert_eq!(probes[0], Probe::Absent(1));
        assert_eq!(probes[1].id(), 2);
        assert!(probes[1].snapshot().is_some());
        assert_eq!(probes[3], Probe::Absent(4));
    }

    #[test]
    fn empty_bus() {
        let mut client = bus(&[]);
        assert_eq!(client.scan_bus(DEFAULT_SCAN_IDS), Ok(vec![]));
    }

    #[test]
    fn range_stops_at_max_id() {
        let mut client = bus(&[]);
        assert_eq!(client.scan(250..=255).count(), 4);
        assert_eq!(client.scan(0..=255).size_hint(), (254, Some(254)));
    }

    #[test]
    fn probe_reports_presence() {
        let mut client = bus(&[5]);
        assert_eq!(client.probe(5), Ok(true));
        assert_eq!(client.probe(6), Ok(false));
    }

    #[test]
    fn device_error_is_absent() {
        let mut client = bus(&[5]);
        client.port_mut().servo_mut(5).unwrap().set_status(0x20);
        assert_eq!(client.probe(5), Ok(false));
    }

    #[test]
    fn garbled_probe_is_absent() {
        let mut client = bus(&[]);
        client
            .port_mut()
            .inject(&[0xff, 0xff, 0x05, 0x04, 0x00, 0x64, 0x00, 0x00]);
        assert_eq!(client.probe(5), Ok(false));
    }

    #[test]
    fn stale_reply_from_other_id_is_absent() {
        let mut client = bus(&[]);
        client
            .port_mut()
            .inject(&Reply::new(5, 0, &[0x00, 0x08]).unwrap().to_bytes());
        assert_eq!(client.probe(1), Ok(false));
    }

    #[test]
    fn late_reply_is_not_credited_to_next_id() {
        let mut client = bus(&[1]);
        // lands right behind servo 1's answer, as if servo 2 was late
        client
            .port_mut()
            .answer_next(&Reply::new(2, 0, &[0x00, 0x08]).unwrap().to_bytes());
        assert_eq!(client.probe(1), Ok(true));
        assert_eq!(client.probe(2), Ok(false));
    }

    #[test]
    fn io_failure_stops_scan() {
        let mut client = bus(&[1, 2]);
        client.port_mut().fail_next_read();
        let mut scan = client.scan(1..=3);
        assert_eq!(scan.next(), Some(Err(Error::Io(SimError::Unplugged))));
        assert_eq!(scan.next(), None);
    }

    #[test]
    fn partial_snapshot() {
        let mut client = bus(&[]);
        // position answers, then the model read gets a device error, the
        // rest time out
        client
            .port_mut()
            .answer_next(&Reply::new(4, 0, &[0x00, 0x02]).unwrap().to_bytes());
        client
            .port_mut()
            .answer_next(&Reply::new(4, 0x08, &[]).unwrap().to_bytes());

        assert_eq!(
            client.scan_bus(4..=4),
            Ok(vec![Snapshot {
                id: 4,
                model: None,
                position: 0x200,
                voltage: None,
                temperature: None,
                torque_enabled: None,
                min_limit: None,
                max_limit: None,
            }])
        );
    }

    #[test]
    fn snapshot_of_known_servo() {
        let mut client = bus(&[9]);
        let snapshot = client.snapshot(9).unwrap();
        assert_eq!(snapshot.id, 9);
        assert_eq!(snapshot.position, 2048);
        assert_eq!(client.snapshot(10), Err(Error::Timeout));
    }
}
