use ftlib::protocol::{decode16, parse, FrameSerialize, ParseResult, ReplyReader};

use crate::debug::Direction;
use crate::hexdump::hex;

#[derive(clap::Args, Debug)]
pub struct ParseDumpOpts {
    dump: String,
}

impl crate::ToolRun for ParseDumpOpts {
    fn run(&self) -> anyhow::Result<()> {
        let rawdata = std::fs::read(&self.dump)?;
        let mut raw = &rawdata[..];

        // chunks are whatever the port handed over, so frames can span them
        let mut requests = Vec::new();
        let mut replies = ReplyReader::new();

        while !raw.is_empty() {
            anyhow::ensure!(raw.len() >= 3, "Dump ends inside a record header.");
            let dir = Direction::from_u8(raw[0])
                .ok_or_else(|| anyhow::anyhow!("Bad direction byte {:#04x}.", raw[0]))?;
            let len = decode16([raw[1], raw[2]]) as usize;
            anyhow::ensure!(raw.len() >= 3 + len, "Dump ends inside a record.");
            let chunk = &raw[3..3 + len];
            raw = &raw[3 + len..];

            match dir {
                Direction::ToServo => {
                    requests.extend_from_slice(chunk);
                    decode_requests(&mut requests);
                }
                Direction::ToHost => decode_replies(&mut replies, chunk),
            }
        }

        if !requests.is_empty() {
            println!("{}: {} trailing bytes", Direction::ToServo, requests.len());
            crate::hexdump::hexdump_prefix("    ", &requests);
        }
        Ok(())
    }
}

fn decode_requests(buf: &mut Vec<u8>) {
    loop {
        let (consumed, res) = parse::request(buf);
        let skipped = res.range().map_or(consumed, |r| r.start);
        if skipped > 0 {
            println!("{}: skipped {}", Direction::ToServo, hex(&buf[..skipped]));
        }

        match res {
            ParseResult::Ok(range, request) => {
                println!("{}: {:?}", Direction::ToServo, request);
                println!("    {}", hex(&buf[range]));
            }
            ParseResult::ParseErr(range, code) => {
                println!(
                    "{}: unknown instruction {:#04x}",
                    Direction::ToServo,
                    code
                );
                println!("    {}", hex(&buf[range]));
            }
            ParseResult::ChecksumErr(range, e) => {
                println!("{}: {}", Direction::ToServo, e);
                println!("    {}", hex(&buf[range]));
            }
            ParseResult::None => {
                buf.drain(..consumed);
                break;
            }
        }
        buf.drain(..consumed);
    }
}

fn decode_replies(reader: &mut ReplyReader, mut chunk: &[u8]) {
    loop {
        let (used, res) = reader.feed(chunk);
        chunk = &chunk[used..];
        match res {
            Some(Ok(reply)) => {
                println!("{}: {:?}", Direction::ToHost, reply);
                println!("    {}", hex(&reply.to_bytes()));
            }
            Some(Err(e)) => println!("{}: {}", Direction::ToHost, e),
            None => break,
        }
    }
}
