use std::time::{Duration, Instant};

use ftlib::{registers, Snapshot};

use crate::common::or_dash;

#[derive(clap::Args, Debug)]
pub struct ScanOpts {
    /// First id to probe.
    #[arg(long, default_value_t = *ftlib::DEFAULT_SCAN_IDS.start(), value_parser = crate::common::parse_id)]
    first: u8,
    /// Last id to probe.
    #[arg(long, default_value_t = *ftlib::DEFAULT_SCAN_IDS.end(), value_parser = crate::common::parse_id)]
    last: u8,
    /// Stop probing after this many seconds.
    #[arg(long)]
    deadline: Option<f64>,

    #[command(flatten)]
    debug: crate::debug::DebugArgs,
    #[command(flatten)]
    port: crate::common::SerialPortArgs,
}

impl crate::ToolRun for ScanOpts {
    fn run(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.first <= self.last, "--first is past --last");
        let deadline = self
            .deadline
            .map(Duration::try_from_secs_f64)
            .transpose()?
            .map(|d| Instant::now() + d);

        let mut client = self.debug.client(self.port.open()?)?;
        let bar = crate::common::scan_bar((self.last - self.first) as u64 + 1)?;

        let mut found = Vec::new();
        bar.set_message("0 found");
        for probe in client.scan(self.first..=self.last) {
            let probe = probe?;
            bar.inc(1);
            if let Some(snapshot) = probe.into_snapshot() {
                bar.println(format!("Found servo at id {}.", snapshot.id));
                found.push(snapshot);
                bar.set_message(format!("{} found", found.len()));
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                bar.println("Deadline reached, rest of the range skipped.");
                break;
            }
        }
        bar.finish_and_clear();

        found.sort_by_key(|s| s.id);
        if found.is_empty() {
            eprintln!("No servos found.");
        } else {
            print_table(&found);
        }
        Ok(())
    }
}

fn print_table(found: &[Snapshot]) {
    println!(
        "{:>3}  {:>5}  {:>5}  {:>6}  {:>5}  {:>4}  {:>6}  {:>5}  {:>5}",
        "ID", "MODEL", "POS", "DEG", "VOLT", "TEMP", "TORQUE", "MIN", "MAX"
    );
    for s in found {
        println!(
            "{:>3}  {:>5}  {:>5}  {:>6.1}  {:>5}  {:>4}  {:>6}  {:>5}  {:>5}",
            s.id,
            or_dash(s.model),
            s.position,
            registers::steps_to_degrees(s.position),
            or_dash(s.volts().map(|v| format!("{:.1}", v))),
            or_dash(s.temperature),
            or_dash(s.torque_enabled.map(|t| if t { "on" } else { "off" })),
            or_dash(s.min_limit),
            or_dash(s.max_limit),
        );
    }
}
