use std::io::{Read, Write};
use std::time::Duration;

/// How the bus is reached.
#[derive(clap::Args, Debug, Clone)]
pub struct SerialPortArgs {
    #[arg(default_value_t = default_serial_port())]
    port: String,
    #[arg(short, long, default_value_t = ftlib::protocol::BAUD_RATE)]
    baud: u32,
    /// Per-read timeout. A servo that stays quiet this long is absent.
    #[arg(long, default_value_t = ftlib::protocol::READ_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,
    /// Treat the port as a plain file.
    #[arg(long)]
    plain_file: bool,
    /// Treat the port as host:port, such as a running `simulate`.
    #[arg(long)]
    tcp: bool,
}

pub enum SerialPort {
    Serial(std::io::BufWriter<Box<dyn serialport::SerialPort>>),
    File(std::io::BufWriter<std::fs::File>),
    Tcp(std::io::BufWriter<std::net::TcpStream>),
}

pub fn default_serial_port() -> String {
    if let Ok(infos) = serialport::available_ports() {
        for info in infos {
            #[cfg(target_os = "macos")]
            if info.port_name.ends_with(".Bluetooth-Incoming-Port") {
                // these ports are almost always *not* what we want
                continue;
            }

            #[cfg(target_os = "macos")]
            if info.port_name.starts_with("/dev/tty.") {
                // use cu. ports instead
                continue;
            }

            return info.port_name.clone();
        }
    }

    // not great, but reasonable fallback
    "/dev/ttyUSB0".to_owned()
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.get_mut().read(buf),
            Self::File(port) => port.get_mut().read(buf),
            // sockets report an expired read timeout as WouldBlock on unix
            Self::Tcp(port) => port.get_mut().read(buf).map_err(|e| {
                if e.kind() == std::io::ErrorKind::WouldBlock {
                    std::io::Error::from(std::io::ErrorKind::TimedOut)
                } else {
                    e
                }
            }),
        }
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::File(port) => port.write(buf),
            Self::Tcp(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::File(port) => port.flush(),
            Self::Tcp(port) => port.flush(),
        }
    }
}

impl SerialPortArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn open(&self) -> anyhow::Result<SerialPort> {
        if self.tcp {
            let port = std::net::TcpStream::connect(&self.port)?;
            port.set_read_timeout(Some(self.timeout()))?;
            port.set_nodelay(true)?;
            Ok(SerialPort::Tcp(std::io::BufWriter::new(port)))
        } else if self.plain_file {
            let port = std::fs::File::options()
                .read(true)
                .write(true)
                .open(&self.port)?;

            Ok(SerialPort::File(std::io::BufWriter::new(port)))
        } else {
            let port = serialport::new(&self.port, self.baud)
                .timeout(self.timeout())
                .open()?;
            tracing::info!(port = %self.port, baud = self.baud, "opened serial port");
            Ok(SerialPort::Serial(std::io::BufWriter::new(port)))
        }
    }
}

/// Ask before doing something hard to undo. `yes` skips the question.
pub fn confirm(prompt: &str, yes: bool) -> anyhow::Result<()> {
    if yes {
        return Ok(());
    }
    if dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?
    {
        Ok(())
    } else {
        anyhow::bail!("Cancelled.")
    }
}

pub fn scan_bar(ids: u64) -> anyhow::Result<indicatif::ProgressBar> {
    let bar = indicatif::ProgressBar::new(ids);
    bar.set_style(
        indicatif::ProgressStyle::with_template(
            "({spinner}) [{wide_bar}] ({pos:>3}/{len:3}, {msg:>10})",
        )?
        .progress_chars("=> ")
        .tick_strings(&["<<<  ", "<<  <", "<  <<", "  <<<", " <<< ", "-----"]),
    );
    Ok(bar)
}

pub fn download_bar(size: u64) -> anyhow::Result<indicatif::ProgressBar> {
    let bar = indicatif::ProgressBar::new(size);
    bar.set_style(
        indicatif::ProgressStyle::with_template(
            "({spinner}) [{wide_bar}] ({percent:>3}%, {bytes_per_sec:>12})",
        )?
        .progress_chars("=> ")
        .tick_strings(&["<<<  ", "<<  <", "<  <<", "  <<<", " <<< ", "-----"]),
    );
    Ok(bar)
}

/// Parse decimal, or hex with a 0x prefix.
pub fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("{}: {}", s, e))
}

pub fn parse_u8(s: &str) -> Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("{} does not fit in a byte", s))
}

pub fn parse_u16(s: &str) -> Result<u16, String> {
    let n = parse_number(s)?;
    u16::try_from(n).map_err(|_| format!("{} does not fit in two bytes", s))
}

/// A servo id, 0 through 253.
pub fn parse_id(s: &str) -> Result<u8, String> {
    let id = parse_u8(s)?;
    if id > ftlib::protocol::MAX_ID {
        return Err(format!("{} is not a servo id", s));
    }
    Ok(id)
}

/// A servo id, or the broadcast id.
pub fn parse_target(s: &str) -> Result<u8, String> {
    let id = parse_u8(s)?;
    if id > ftlib::protocol::BROADCAST_ID {
        return Err(format!("{} is not a servo id", s));
    }
    Ok(id)
}

/// Print an optional reading, or a dash.
pub fn or_dash<T>(value: Option<T>) -> String
where
    T: std::fmt::Display,
{
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_owned())
}
