use ftlib::registers;

#[derive(clap::Args, Debug)]
pub struct TorqueOpts {
    #[arg(value_parser = crate::common::parse_id)]
    id: u8,
    /// Turn torque on. With neither --on nor --off, flip it.
    #[arg(long, conflicts_with = "off")]
    on: bool,
    /// Turn torque off.
    #[arg(long)]
    off: bool,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for TorqueOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut client = self.debug.client(self.port.open()?)?;
        let enabled = if self.on || self.off {
            client.set_torque(self.id, self.on)?;
            self.on
        } else {
            client.toggle_torque(self.id)?
        };
        println!(
            "Servo {} torque {}.",
            self.id,
            if enabled { "on" } else { "off" }
        );
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct MoveOpts {
    #[arg(value_parser = crate::common::parse_id)]
    id: u8,
    /// Goal position, in steps (4096 per turn) or degrees.
    #[arg(allow_negative_numbers = true)]
    position: f32,
    /// Read the position as degrees.
    #[arg(long)]
    degrees: bool,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl MoveOpts {
    fn steps(&self) -> anyhow::Result<u16> {
        if self.degrees {
            return Ok(registers::degrees_to_steps(self.position));
        }
        anyhow::ensure!(
            self.position.fract() == 0.0 && (0.0..=u16::MAX as f32).contains(&self.position),
            "position {} is not a step count, use --degrees for angles",
            self.position
        );
        Ok(self.position as u16)
    }
}

impl crate::ToolRun for MoveOpts {
    fn run(&self) -> anyhow::Result<()> {
        let steps = self.steps()?;
        let mut client = self.debug.client(self.port.open()?)?;
        client.set_goal_position(self.id, steps)?;
        println!(
            "Servo {} moving to {} ({:.1} degrees).",
            self.id,
            steps,
            registers::steps_to_degrees(steps)
        );
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct SetIdOpts {
    #[arg(value_parser = crate::common::parse_id)]
    id: u8,
    #[arg(value_parser = crate::common::parse_id)]
    new_id: u8,
    #[arg(short, long)]
    yes: bool,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for SetIdOpts {
    fn run(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.id != self.new_id, "servo already has id {}", self.id);

        let mut client = self.debug.client(self.port.open()?)?;
        client.ping(self.id)?;
        if client.probe(self.new_id)? {
            anyhow::bail!("id {} is already taken", self.new_id);
        }

        crate::common::confirm(
            &format!(
                "Change servo id {} to {}? This is written to EEPROM.",
                self.id, self.new_id
            ),
            self.yes,
        )?;
        client.change_id(self.id, self.new_id)?;
        println!("Servo {} is now servo {}.", self.id, self.new_id);
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct LimitsOpts {
    #[arg(value_parser = crate::common::parse_id)]
    id: u8,
    #[arg(value_parser = crate::common::parse_u16)]
    min: u16,
    #[arg(value_parser = crate::common::parse_u16)]
    max: u16,
    #[arg(short, long)]
    yes: bool,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for LimitsOpts {
    fn run(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.min <= self.max, "min is above max");

        let mut client = self.debug.client(self.port.open()?)?;
        crate::common::confirm(
            &format!(
                "Set servo {} limits to {}..{}? This is written to EEPROM.",
                self.id, self.min, self.max
            ),
            self.yes,
        )?;
        client.set_limits(self.id, self.min, self.max)?;
        println!(
            "Servo {} limited to {}..{} ({:.1}..{:.1} degrees).",
            self.id,
            self.min,
            self.max,
            registers::steps_to_degrees(self.min),
            registers::steps_to_degrees(self.max)
        );
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct DumpOpts {
    #[arg(value_parser = crate::common::parse_id)]
    id: u8,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for DumpOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut client = self.debug.client(self.port.open()?)?;
        for (register, value) in client.dump(self.id)? {
            println!(
                "{:>3}  {:<14} {:>5}  ({:#06x})",
                register.address, register.name, value, value
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use clap::Parser;

    #[derive(Parser)]
    struct Wrap {
        #[command(flatten)]
        opts: MoveOpts,
    }

    fn steps(args: &[&str]) -> anyhow::Result<u16> {
        let args = ["fttool", "1"].iter().chain(args).chain(&["/dev/null"]);
        Wrap::try_parse_from(args)?.opts.steps()
    }

    #[test]
    fn move_in_steps() {
        assert_eq!(steps(&["2048"]).unwrap(), 2048);
        assert!(steps(&["12.5"]).is_err());
        assert!(steps(&["70000"]).is_err());
    }

    #[test]
    fn move_in_degrees() {
        assert_eq!(steps(&["90", "--degrees"]).unwrap(), 1024);
        assert_eq!(steps(&["--degrees", "-10"]).unwrap(), 0);
    }
}
