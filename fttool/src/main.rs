use clap::{Parser, Subcommand};

mod common;
mod debug;
mod hexdump;
mod parsedump;
mod read_table;
mod register;
mod scan;
mod servo;
mod simulate;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()>;
}

/// Talk to Feetech STS/SMS servos over a serial bus.
#[derive(Parser, Debug)]
#[command(version, about)]
struct ToolOptions {
    /// More output. Repeat for more (-dd shows probes, -ddd every frame).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// Find every servo on the bus.
    Scan(scan::ScanOpts),
    /// Check that one servo answers.
    Ping(register::PingOpts),
    /// Read a register.
    Read(register::ReadOpts),
    /// Write a register.
    Write(register::WriteOpts),
    /// Turn torque on or off, or flip it.
    Torque(servo::TorqueOpts),
    /// Set the goal position.
    Move(servo::MoveOpts),
    /// Give a servo a new id.
    SetId(servo::SetIdOpts),
    /// Set the soft position limits.
    Limits(servo::LimitsOpts),
    /// Print every known register.
    Dump(servo::DumpOpts),
    /// Read a raw range of the control table.
    ReadTable(read_table::ReadTableOpts),
    /// Serve a simulated bus over TCP.
    Simulate(simulate::SimulateOpts),
    /// Decode a traffic capture made with --dump.
    ParseDump(parsedump::ParseDumpOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Scan(o) => o.run(),
            Ping(o) => o.run(),
            Read(o) => o.run(),
            Write(o) => o.run(),
            Torque(o) => o.run(),
            Move(o) => o.run(),
            SetId(o) => o.run(),
            Limits(o) => o.run(),
            Dump(o) => o.run(),
            ReadTable(o) => o.run(),
            Simulate(o) => o.run(),
            ParseDump(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let opts = ToolOptions::parse();
    debug::init_logging(opts.debug);
    opts.command.run()
}
