use std::io::Write;

/// Bytes per read request. Small enough for any servo firmware.
const CHUNK_SIZE: u8 = 0x20;

// the whole table, can be overridden
const TABLE_SIZE: usize = 0x100;

#[derive(clap::Args, Debug)]
pub struct ReadTableOpts {
    #[arg(value_parser = crate::common::parse_id)]
    id: u8,
    #[arg(short, long)]
    output: Option<String>,
    /// Write raw bytes to stdout instead of a hexdump.
    #[arg(long)]
    raw: bool,
    #[arg(long, default_value_t = 0, value_parser = crate::common::parse_u8)]
    start: u8,
    #[arg(long, default_value_t = TABLE_SIZE)]
    len: usize,
    #[arg(long, default_value_t = CHUNK_SIZE, value_parser = crate::common::parse_u8)]
    chunk: u8,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for ReadTableOpts {
    fn run(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.chunk > 0, "--chunk must be at least 1");
        let len = self.len.min(TABLE_SIZE - self.start as usize);

        let mut client = self.debug.client(self.port.open()?)?;
        let bar = crate::common::download_bar(len as u64)?;
        bar.set_position(0);
        let table = client.read_table(self.id, self.start, len, self.chunk, |done| {
            bar.set_position(done as u64)
        })?;
        bar.finish_and_clear();

        if let Some(ref path) = self.output {
            std::fs::write(path, &table)?;
        } else if self.raw {
            std::io::stdout().write_all(&table)?;
        } else {
            crate::hexdump::hexdump(self.start as usize, &table);
        }

        eprintln!("Done.");
        Ok(())
    }
}
