use std::io::{Read, Write};

use ftlib::sim::SimBus;

use crate::debug::Direction;

#[derive(clap::Args, Debug)]
pub struct SimulateOpts {
    #[arg(default_value = "localhost:8855")]
    bind: String,
    /// Ids of the simulated servos.
    #[arg(long, value_delimiter = ',', default_values_t = [1u8, 2, 3], value_parser = crate::common::parse_id)]
    servos: Vec<u8>,
    #[command(flatten)]
    debug: crate::debug::DebugArgs,
}

impl crate::ToolRun for SimulateOpts {
    fn run(&self) -> anyhow::Result<()> {
        // the bus outlives connections, so id changes stick around
        let mut bus = SimBus::with_servos(self.servos.iter().copied());

        let listener = std::net::TcpListener::bind(&self.bind)?;
        eprintln!("Listening on {}.", self.bind);

        loop {
            let ids: Vec<_> = bus.ids().map(|id| id.to_string()).collect();
            eprintln!("Servos at: {}", ids.join(", "));

            let (stream, addr) = listener.accept()?;
            eprintln!("Connected to {}.", addr);

            // short timeout, so a quiet client doesn't look like an error
            stream.set_read_timeout(Some(std::time::Duration::from_millis(100)))?;
            stream.set_nodelay(true)?;

            let port = self.debug.wrap(Direction::ToHost, stream)?;
            match serve(&mut bus, port) {
                Ok(()) => eprintln!("Disconnected from {}.", addr),
                Err(e) => match e.downcast_ref::<std::io::Error>().map(|e| e.kind()) {
                    // an expected error, at disconnect
                    Some(std::io::ErrorKind::ConnectionReset) => {
                        eprintln!("Disconnected from {}.", addr);
                    }
                    // any other error is unexpected
                    _ => anyhow::bail!(e),
                },
            }
        }
    }
}

fn serve<F>(bus: &mut SimBus, mut port: F) -> anyhow::Result<()>
where
    F: Read + Write,
{
    let mut buf = [0u8; 256];
    loop {
        let amt = match port.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(amt) => amt,
            Err(e) => {
                if let std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock = e.kind() {
                    // try again if timed out
                    continue;
                } else {
                    anyhow::bail!(e);
                }
            }
        };

        embedded_io::Write::write_all(bus, &buf[..amt])?;
        let replies = bus.take_output();
        if !replies.is_empty() {
            port.write_all(&replies)?;
            port.flush()?;
        }
    }
}
