use core::ops::Range;

use alloc::vec::Vec;

use nom::error::Error;
use nom::IResult;

use super::checksum::Checksum;
use super::serialize::{Reply, Request};
use super::{Instruction, HEADER};

/// A frame arrived whole, but its checksum byte is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChecksumMismatch {
    /// The checksum byte found on the wire.
    pub provided: u8,
    /// The checksum computed over the frame.
    pub expected: u8,
}

impl core::fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "checksum mismatch: got {:02X} want {:02X}",
            self.provided, self.expected
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ChecksumMismatch {}

/// Where a [ReplyReader] is in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReplyState {
    /// Looking for two 0xff bytes in a row.
    SeekingHeader,
    ReadId,
    ReadLen,
    ReadStatus,
    ReadPayload,
    ReadChecksum,
    /// Just finished a frame (good or bad). The next byte starts over.
    Done,
}

/// Byte-at-a-time decoder for status packets.
///
/// Feed it bytes with [ReplyReader::push] until it produces a reply
/// or a checksum error. It never gets stuck: garbage before a header
/// is skipped, and a single 0xff followed by anything else does not
/// count towards the next header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyReader {
    state: ReplyState,
    // saw one 0xff while seeking
    primed: bool,
    id: u8,
    status: u8,
    remaining: usize,
    payload: Vec<u8>,
    digest: Checksum,
}

impl Default for ReplyReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyReader {
    pub fn new() -> Self {
        Self {
            state: ReplyState::SeekingHeader,
            primed: false,
            id: 0,
            status: 0,
            remaining: 0,
            payload: Vec::new(),
            digest: Checksum::new(),
        }
    }

    pub fn state(&self) -> ReplyState {
        self.state
    }

    /// Forget any partial frame.
    pub fn reset(&mut self) {
        self.state = ReplyState::SeekingHeader;
        self.primed = false;
        self.payload.clear();
    }

    /// Advance by one byte.
    ///
    /// Returns `Ok(None)` while the frame is incomplete.
    pub fn push(&mut self, byte: u8) -> Result<Option<Reply>, ChecksumMismatch> {
        match self.state {
            ReplyState::SeekingHeader | ReplyState::Done => {
                if self.state == ReplyState::Done {
                    self.reset();
                }

                if byte != HEADER[0] {
                    self.primed = false;
                } else if self.primed {
                    self.primed = false;
                    self.state = ReplyState::ReadId;
                } else {
                    self.primed = true;
                }
            }
            ReplyState::ReadId => {
                // even 0xff, a corrupt id must still fail the checksum
                self.id = byte;
                self.digest = Checksum::new();
                self.digest.update_u8(byte);
                self.state = ReplyState::ReadLen;
            }
            ReplyState::ReadLen => {
                // length counts status and checksum too
                self.remaining = (byte as usize).saturating_sub(2);
                self.digest.update_u8(byte);
                self.state = ReplyState::ReadStatus;
            }
            ReplyState::ReadStatus => {
                self.status = byte;
                self.digest.update_u8(byte);
                self.payload.clear();
                self.state = if self.remaining > 0 {
                    ReplyState::ReadPayload
                } else {
                    ReplyState::ReadChecksum
                };
            }
            ReplyState::ReadPayload => {
                self.payload.push(byte);
                self.digest.update_u8(byte);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.state = ReplyState::ReadChecksum;
                }
            }
            ReplyState::ReadChecksum => {
                self.state = ReplyState::Done;
                let expected = self.digest.finalize();
                if byte != expected {
                    return Err(ChecksumMismatch {
                        provided: byte,
                        expected,
                    });
                }
                let payload = core::mem::take(&mut self.payload);
                return Ok(Some(Reply::from_parts(self.id, self.status, payload)));
            }
        }

        Ok(None)
    }

    /// Push bytes from a buffer until a frame completes or it runs out.
    ///
    /// Returns the number of consumed bytes, and the outcome if a frame
    /// completed.
    pub fn feed(&mut self, bytes: &[u8]) -> (usize, Option<Result<Reply, ChecksumMismatch>>) {
        for (i, b) in bytes.iter().enumerate() {
            match self.push(*b) {
                Ok(None) => continue,
                Ok(Some(reply)) => return (i + 1, Some(Ok(reply))),
                Err(e) => return (i + 1, Some(Err(e))),
            }
        }
        (bytes.len(), None)
    }
}

/// A possible result from [request()].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseResult<O> {
    /// Parse result, alongside range where the whole frame was located.
    Ok(Range<usize>, O),
    /// Frame was well-formed but carried an unknown instruction code.
    ParseErr(Range<usize>, u8),
    /// Checksum failed, with range for the whole frame.
    ChecksumErr(Range<usize>, ChecksumMismatch),
    /// Only non-frame input was consumed.
    None,
}

impl<O> ParseResult<O> {
    pub fn ok(self) -> Option<O> {
        match self {
            Self::Ok(_, o) => Some(o),
            _ => None,
        }
    }

    pub fn range(&self) -> Option<&Range<usize>> {
        match self {
            Self::Ok(r, _) => Some(r),
            Self::ParseErr(r, _) => Some(r),
            Self::ChecksumErr(r, _) => Some(r),
            Self::None => None,
        }
    }
}

/// The fields of an instruction packet, before any checking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RawFrame<'a> {
    id: u8,
    len: u8,
    code: u8,
    params: &'a [u8],
    checksum: u8,
}

/// Parse one instruction packet starting right at the header.
fn raw_frame(input: &[u8]) -> IResult<&[u8], RawFrame<'_>> {
    use nom::bytes::streaming::{tag, take};
    use nom::number::streaming::u8 as byte;

    let (rest, _) = tag::<_, _, Error<&[u8]>>(&HEADER[..])(input)?;
    let (rest, id) = byte::<_, Error<&[u8]>>(rest)?;
    // instruction and checksum are always there
    let (rest, len) =
        nom::combinator::verify(byte::<_, Error<&[u8]>>, |l: &u8| *l >= 2)(rest)?;
    let (rest, code) = byte::<_, Error<&[u8]>>(rest)?;
    let (rest, params) = take::<_, _, Error<&[u8]>>(len as usize - 2)(rest)?;
    let (rest, checksum) = byte::<_, Error<&[u8]>>(rest)?;

    Ok((
        rest,
        RawFrame {
            id,
            len,
            code,
            params,
            checksum,
        },
    ))
}

/// Find and parse an instruction packet, skipping data before it.
///
/// Returns the number of consumed bytes and the result. Frames with a
/// bad checksum or unknown instruction are still consumed. Incomplete
/// frames are left in place so they can be retried with more data.
pub fn request(input: &[u8]) -> (usize, ParseResult<Request>) {
    let mut start = 0;
    loop {
        let skipped = nom::bytes::complete::take_until::<_, _, Error<&[u8]>>(&HEADER[..])(
            &input[start..],
        );
        let Ok((frame, _)) = skipped else {
            // no header anywhere, but a trailing 0xff may become one
            let consumed = if input[start..].last() == Some(&HEADER[0]) {
                input.len() - 1
            } else {
                input.len()
            };
            return (consumed, ParseResult::None);
        };

        let begin = input.len() - frame.len();
        match raw_frame(frame) {
            Ok((rest, raw)) => {
                let end = input.len() - rest.len();
                let range = begin..end;

                let mut digest = Checksum::new();
                digest.update(&[raw.id, raw.len, raw.code]);
                digest.update(raw.params);
                let expected = digest.finalize();
                if expected != raw.checksum {
                    let e = ChecksumMismatch {
                        provided: raw.checksum,
                        expected,
                    };
                    return (end, ParseResult::ChecksumErr(range, e));
                }

                return match Instruction::try_from(raw.code) {
                    Ok(inst) => (
                        end,
                        ParseResult::Ok(range, Request::from_parts(raw.id, inst, raw.params)),
                    ),
                    Err(code) => (end, ParseResult::ParseErr(range, code)),
                };
            }
            Err(nom::Err::Incomplete(_)) => {
                // might be a frame later, keep it
                return (begin, ParseResult::None);
            }
            Err(_) => {
                // not a frame, skip one past the header start and look again
                start = begin + 1;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use alloc::vec::Vec;

    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::super::serialize::FrameSerialize;
    use super::*;

    const POSITION_REPLY: [u8; 8] = [0xff, 0xff, 0x01, 0x04, 0x00, 0x64, 0x00, 0x96];

    fn frame_checksum(id: u8, len: u8, code: u8, body: &[u8]) -> u8 {
        let mut all = alloc::vec![id, len, code];
        all.extend_from_slice(body);
        super::super::checksum(&all)
    }

    impl Arbitrary for Reply {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut payload = Vec::<u8>::arbitrary(g);
            payload.truncate(250);
            Reply::new(u8::arbitrary(g), u8::arbitrary(g), &payload).unwrap()
        }
    }

    fn decode(bytes: &[u8]) -> Option<Result<Reply, ChecksumMismatch>> {
        ReplyReader::new().feed(bytes).1
    }

    #[test]
    fn position_reply() {
        let reply = decode(&POSITION_REPLY).unwrap().unwrap();
        assert_eq!(reply.id(), 1);
        assert_eq!(reply.status(), 0);
        assert_eq!(reply.payload(), &[0x64, 0x00]);
        assert_eq!(super::super::decode16([0x64, 0x00]), 100);
    }

    #[test]
    fn stray_ff_then_noise() {
        let mut bytes = alloc::vec![0xff, 0x12, 0x34, 0x00, 0xfe];
        bytes.extend_from_slice(&POSITION_REPLY);
        let reply = decode(&bytes).unwrap().unwrap();
        assert_eq!(reply.payload(), &[0x64, 0x00]);
    }

    #[test]
    fn single_ff_does_not_pair_later() {
        // ff 01 ff: the two 0xff are not consecutive, no header yet
        let mut reader = ReplyReader::new();
        for b in [0xff, 0x01, 0xff] {
            assert_eq!(reader.push(b), Ok(None));
        }
        assert_eq!(reader.state(), ReplyState::SeekingHeader);
        assert_eq!(reader.push(0xff), Ok(None));
        assert_eq!(reader.state(), ReplyState::ReadId);
    }

    #[test]
    fn ff_id_is_read_as_id() {
        // id 1 corrupted to 0xff, checksum still for id 1
        let bytes = [0xff, 0xff, 0xff, 0x04, 0x20, 0x64, 0x00, 0x76];
        assert_eq!(
            decode(&bytes),
            Some(Err(ChecksumMismatch {
                provided: 0x76,
                expected: 0x78
            }))
        );
    }

    #[test]
    fn ff_id_does_not_shift_framing() {
        let mut reader = ReplyReader::new();
        for b in [0xff, 0xff, 0xff] {
            assert_eq!(reader.push(b), Ok(None));
        }
        assert_eq!(reader.state(), ReplyState::ReadLen);
    }

    #[test]
    fn partial_prior_frame() {
        // the tail end of some earlier frame, then a good one
        let mut bytes = POSITION_REPLY[3..].to_vec();
        bytes.extend_from_slice(&POSITION_REPLY);
        let reply = decode(&bytes).unwrap().unwrap();
        assert_eq!(reply.payload(), &[0x64, 0x00]);
    }

    #[test]
    fn states_walk_in_order() {
        let mut reader = ReplyReader::new();
        let expect = [
            ReplyState::SeekingHeader,
            ReplyState::ReadId,
            ReplyState::ReadLen,
            ReplyState::ReadStatus,
            ReplyState::ReadPayload,
            ReplyState::ReadPayload,
            ReplyState::ReadChecksum,
        ];
        for (b, state) in POSITION_REPLY.iter().zip(expect.iter()) {
            assert_eq!(reader.push(*b), Ok(None));
            assert_eq!(reader.state(), *state);
        }
        assert!(reader.push(POSITION_REPLY[7]).unwrap().is_some());
        assert_eq!(reader.state(), ReplyState::Done);
    }

    #[test]
    fn stalled_frame_stays_pending() {
        let mut reader = ReplyReader::new();
        let (consumed, res) = reader.feed(&POSITION_REPLY[..6]);
        assert_eq!(consumed, 6);
        assert_eq!(res, None);
        assert_eq!(reader.state(), ReplyState::ReadPayload);
    }

    #[test]
    fn short_length_clamps_payload() {
        // len 1 is nonsense, but it's read as no payload
        let sum = frame_checksum(0x01, 0x01, 0x00, &[]);
        let reply = decode(&[0xff, 0xff, 0x01, 0x01, 0x00, sum])
            .unwrap()
            .unwrap();
        assert!(reply.payload().is_empty());
    }

    #[test]
    fn checksum_error_carries_both() {
        let mut bytes = POSITION_REPLY;
        bytes[7] = 0x95;
        assert_eq!(
            decode(&bytes),
            Some(Err(ChecksumMismatch {
                provided: 0x95,
                expected: 0x96
            }))
        );
    }

    #[test]
    fn reader_recovers_after_bad_frame() {
        let mut bytes = POSITION_REPLY.to_vec();
        bytes[5] = 0x65;
        bytes.extend_from_slice(&POSITION_REPLY);

        let mut reader = ReplyReader::new();
        let (consumed, first) = reader.feed(&bytes);
        assert!(matches!(first, Some(Err(_))));
        let (_, second) = reader.feed(&bytes[consumed..]);
        assert_eq!(second.unwrap().unwrap().payload(), &[0x64, 0x00]);
    }

    #[test]
    fn corrupt_length_is_caught() {
        // length says one byte of data, so the checksum lands on 0x00
        let mut bytes = POSITION_REPLY;
        bytes[3] = 0x03;
        assert!(matches!(decode(&bytes), Some(Err(_))));
    }

    #[quickcheck]
    fn decodes_what_it_encodes(msg: Reply) -> bool {
        decode(&msg.to_bytes()) == Some(Ok(msg))
    }

    #[quickcheck]
    fn single_byte_corruption(msg: Reply, pos: usize, flip: u8) -> bool {
        let mut bytes = msg.to_bytes();
        if flip == 0 {
            return true;
        }
        // id, status, data or checksum; header and length change framing
        let mut targets = alloc::vec![2];
        targets.extend(4..bytes.len());
        let pos = targets[pos % targets.len()];
        bytes[pos] ^= flip;
        matches!(decode(&bytes), Some(Err(_)))
    }

    #[test]
    fn request_empty() {
        assert_eq!(request(b""), (0, ParseResult::None));
    }

    #[test]
    fn request_discard_garbage() {
        assert_eq!(request(b"abcdef"), (6, ParseResult::None));
    }

    #[test]
    fn request_keep_trailing_ff() {
        assert_eq!(request(b"abc\xff"), (3, ParseResult::None));
    }

    #[test]
    fn request_complete() {
        let mut data = b"abc".to_vec();
        data.extend_from_slice(&Request::read(1, 56, 2).to_bytes());
        data.extend_from_slice(b"after");
        assert_eq!(
            request(&data),
            (11, ParseResult::Ok(3..11, Request::read(1, 56, 2)))
        );
    }

    #[test]
    fn request_incomplete() {
        let frame = Request::read(1, 56, 2).to_bytes();
        let mut data = b"abc".to_vec();
        data.extend_from_slice(&frame[..5]);
        assert_eq!(request(&data), (3, ParseResult::None));
    }

    #[test]
    fn request_bad_length() {
        // length 1 can't hold an instruction, skip it and find the real one
        let mut data = alloc::vec![0xff, 0xff, 0x01, 0x01, 0x00];
        data.extend_from_slice(&Request::ping(2).to_bytes());
        assert_eq!(
            request(&data),
            (11, ParseResult::Ok(5..11, Request::ping(2)))
        );
    }

    #[test]
    fn request_checksum_error() {
        let mut data = Request::read(1, 56, 2).to_bytes();
        data[7] = 0x00;
        assert_eq!(
            request(&data),
            (
                8,
                ParseResult::ChecksumErr(
                    0..8,
                    ChecksumMismatch {
                        provided: 0x00,
                        expected: 0xb8
                    }
                )
            )
        );
    }

    #[test]
    fn request_unknown_instruction() {
        // sync write
        let sum = frame_checksum(0xfe, 0x02, 0x83, &[]);
        let data = [0xff, 0xff, 0xfe, 0x02, 0x83, sum];
        assert_eq!(request(&data), (6, ParseResult::ParseErr(0..6, 0x83)));
    }

    #[quickcheck]
    fn request_roundtrip(req: Request) -> bool {
        let bytes = req.to_bytes();
        request(&bytes) == (bytes.len(), ParseResult::Ok(0..bytes.len(), req))
    }
}
