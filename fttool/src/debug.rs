use std::io::{Read, Write};

use ftlib::protocol::serialize::{Serializer, SerializerWrap};
use ftlib::FromStd;

/// Which way bytes were travelling, as recorded in a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Direction {
    ToHost = 0,
    ToServo = 1,
}

impl Direction {
    pub fn flip(&self) -> Self {
        match self {
            Direction::ToHost => Direction::ToServo,
            Direction::ToServo => Direction::ToHost,
        }
    }

    pub fn from_u8(dir: u8) -> Option<Self> {
        match dir {
            0 => Some(Self::ToHost),
            1 => Some(Self::ToServo),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::ToHost => write!(f, "servo -> host"),
            Self::ToServo => write!(f, "host -> servo"),
        }
    }
}

/// Map -d count to a log level. RUST_LOG still wins if it is set.
pub fn init_logging(debug: u8) {
    use tracing_subscriber::filter::LevelFilter;

    let level = match debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();
}

#[derive(clap::Args, Debug, Clone)]
pub struct DebugArgs {
    /// Append all bus traffic to this file, for parse-dump.
    #[arg(long)]
    dump: Option<String>,
}

/// A port that copies everything through it into a dump file.
pub struct DebugPort<F> {
    port: F,
    dump: Option<SerializerWrap<FromStd<std::fs::File>>>,
    // direction of the bytes this port *writes*
    direction: Direction,
}

/// A client on the host side of a [DebugPort].
pub type DebugClient<F> = ftlib::ClientStd<DebugPort<F>>;

impl DebugArgs {
    /// Wrap a host-side port into a ready client.
    pub fn client<F>(&self, port: F) -> anyhow::Result<DebugClient<F>> {
        Ok(ftlib::Client::new_std(
            self.wrap(Direction::ToServo, port)?,
        ))
    }

    // direction is the way bytes *written* to the port go
    pub fn wrap<F>(&self, direction: Direction, port: F) -> anyhow::Result<DebugPort<F>> {
        let mut dump = None;
        if let Some(ref path) = self.dump {
            dump = Some(SerializerWrap::new(FromStd::new(
                std::fs::File::options()
                    .create(true)
                    .append(true)
                    .open(path)?,
            )));
        }

        Ok(DebugPort {
            port,
            dump,
            direction,
        })
    }
}

impl<F> DebugPort<F> {
    fn record(&mut self, direction: Direction, raw: &[u8]) -> std::io::Result<()> {
        if let Some(ref mut dump) = self.dump {
            // length prefix is only a u16
            for part in raw.chunks(u16::MAX as usize) {
                dump.write_u8(direction as u8)?;
                dump.write_le_u16(part.len() as u16)?;
                dump.write_bytes(part)?;
            }
        }
        Ok(())
    }
}

impl<F> Read for DebugPort<F>
where
    F: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let amt = self.port.read(buf)?;
        self.record(self.direction.flip(), &buf[..amt])?;
        Ok(amt)
    }
}

impl<F> Write for DebugPort<F>
where
    F: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let amt = self.port.write(buf)?;
        self.record(self.direction, &buf[..amt])?;
        Ok(amt)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}
