use ftlib::registers::{Register, Width};

/// A register by name, or a raw address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterArg {
    Named(&'static Register),
    Address(u8),
}

impl RegisterArg {
    /// Raw addresses are one byte wide unless `word` is set.
    pub fn resolve(&self, word: bool) -> Register {
        match self {
            Self::Named(register) => **register,
            Self::Address(address) => {
                if let Some(known) = Register::by_address(*address) {
                    if (known.width == Width::Word) == word {
                        return *known;
                    }
                }
                let width = if word { Width::Word } else { Width::Byte };
                Register::new("raw", *address, width)
            }
        }
    }
}

pub fn parse_register(s: &str) -> Result<RegisterArg, String> {
    if let Some(register) = Register::by_name(s) {
        return Ok(RegisterArg::Named(register));
    }
    crate::common::parse_u8(s)
        .map(RegisterArg::Address)
        .map_err(|_| {
            let names: Vec<_> = ftlib::registers::ALL.iter().map(|r| r.name).collect();
            format!("unknown register {}, try one of: {}", s, names.join(", "))
        })
}

#[derive(clap::Args, Debug)]
pub struct PingOpts {
    #[arg(value_parser = crate::common::parse_id)]
    id: u8,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for PingOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut client = self.debug.client(self.port.open()?)?;
        let start = std::time::Instant::now();
        client.ping(self.id)?;
        println!("Servo {} answered in {:?}.", self.id, start.elapsed());
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct ReadOpts {
    #[arg(value_parser = crate::common::parse_id)]
    id: u8,
    /// Register name or address.
    #[arg(value_parser = parse_register)]
    register: RegisterArg,
    /// Read two bytes at a raw address.
    #[arg(short, long)]
    word: bool,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for ReadOpts {
    fn run(&self) -> anyhow::Result<()> {
        let register = self.register.resolve(self.word);
        let mut client = self.debug.client(self.port.open()?)?;
        let value = client.read(self.id, &register)?;
        println!("{} ({}) = {} ({:#06x})", register, register.address, value, value);
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct WriteOpts {
    /// Servo id, or 254 to write to every servo without waiting for replies.
    #[arg(value_parser = crate::common::parse_target)]
    id: u8,
    /// Register name or address.
    #[arg(value_parser = parse_register)]
    register: RegisterArg,
    #[arg(value_parser = crate::common::parse_u16)]
    value: u16,
    /// Write two bytes at a raw address.
    #[arg(short, long)]
    word: bool,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for WriteOpts {
    fn run(&self) -> anyhow::Result<()> {
        let register = self.register.resolve(self.word);
        let mut client = self.debug.client(self.port.open()?)?;
        client.write(self.id, &register, self.value)?;
        eprintln!("Wrote {} to {}.", self.value, register);
        Ok(())
    }
}
