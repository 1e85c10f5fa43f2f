use crate::protocol::{ChecksumMismatch, FrameTooLong};

/// An error type for [Client](crate::Client) and [Transport](crate::Transport).
///
/// Every operation ends in exactly one of these, or success.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Error<E> {
    /// EOF in underlying stream.
    UnexpectedEof,
    /// Other IO error in underlying stream.
    Io(E),
    /// Nothing arrived within the read timeout. Usually means there is
    /// no servo at that id.
    Timeout,
    /// A reply arrived, but was corrupted.
    ChecksumMismatch { provided: u8, expected: u8 },
    /// The servo answered with a nonzero status byte.
    DeviceError(u8),
    /// The reply carried a different number of bytes than were asked for.
    LengthMismatch { expected: usize, actual: usize },
    /// Too many parameter bytes for one frame.
    FrameTooLong(usize),
    /// Value does not fit in the register.
    ValueOutOfRange { width: u8, value: u16 },
}

impl<E> Error<E> {
    /// Wrap a port error, picking out timeouts.
    pub fn from_io(e: E) -> Self
    where
        E: embedded_io::Error,
    {
        match e.kind() {
            embedded_io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(e),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Hard transport faults. Nothing more can be done on this port.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::UnexpectedEof)
    }
}

impl<E> From<ChecksumMismatch> for Error<E> {
    fn from(other: ChecksumMismatch) -> Self {
        Self::ChecksumMismatch {
            provided: other.provided,
            expected: other.expected,
        }
    }
}

impl<E> From<FrameTooLong> for Error<E> {
    fn from(other: FrameTooLong) -> Self {
        Self::FrameTooLong(other.0)
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for Error<E> where E: core::fmt::Debug {}

impl<E> core::fmt::Display for Error<E>
where
    E: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected eof"),
            Self::Io(e) => write!(f, "io error: {:?}", e),
            Self::Timeout => write!(f, "timed out waiting for reply"),
            Self::ChecksumMismatch { provided, expected } => write!(
                f,
                "checksum mismatch: got {:02X} want {:02X}",
                provided, expected
            ),
            Self::DeviceError(status) => write!(f, "servo err=0x{:02X}", status),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "short read: {} != {}", actual, expected)
            }
            Self::FrameTooLong(n) => write!(f, "{} parameter bytes do not fit in a frame", n),
            Self::ValueOutOfRange { width, value } => {
                write!(f, "value {} does not fit in {} byte(s)", value, width)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Kind(embedded_io::ErrorKind);

    impl embedded_io::Error for Kind {
        fn kind(&self) -> embedded_io::ErrorKind {
            self.0
        }
    }

    #[test]
    fn timeouts_are_split_out() {
        let e = Error::from_io(Kind(embedded_io::ErrorKind::TimedOut));
        assert!(e.is_timeout());
        assert!(!e.is_io());

        let e = Error::from_io(Kind(embedded_io::ErrorKind::Other));
        assert_eq!(e, Error::Io(Kind(embedded_io::ErrorKind::Other)));
        assert!(e.is_io());
    }

    #[test]
    fn checksum_mismatch_converts() {
        let e: Error<Kind> = ChecksumMismatch {
            provided: 1,
            expected: 2,
        }
        .into();
        assert_eq!(
            e,
            Error::ChecksumMismatch {
                provided: 1,
                expected: 2
            }
        );
    }
}
