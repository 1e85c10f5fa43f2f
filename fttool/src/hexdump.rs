const WIDTH: usize = 0x10;

/// One row of a hexdump: an address and up to [WIDTH] bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Line<'a> {
    address: usize,
    data: &'a [u8],
}

pub fn printable(chr: u8) -> Option<char> {
    if (0x20..0x7f).contains(&chr) {
        Some(chr as char)
    } else {
        None
    }
}

impl<'a> std::fmt::Display for Line<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:02x}", self.address)?;

        for i in 0..WIDTH {
            if i % 8 == 0 {
                write!(f, " ")?;
            }
            if i < self.data.len() {
                write!(f, " {:02x}", self.data[i])?;
            } else {
                write!(f, "   ")?;
            }
        }

        write!(f, "  |")?;
        for b in self.data {
            write!(f, "{}", printable(*b).unwrap_or('.'))?;
        }
        write!(f, "|")
    }
}

/// Rows for `data`, numbered from `base`.
pub fn lines(base: usize, data: &[u8]) -> impl Iterator<Item = Line<'_>> {
    data.chunks(WIDTH).enumerate().map(move |(i, chunk)| Line {
        address: base + i * WIDTH,
        data: chunk,
    })
}

pub fn hexdump(base: usize, data: &[u8]) {
    for line in lines(base, data) {
        println!("{}", line);
    }
}

pub fn hexdump_prefix(prefix: &str, data: &[u8]) {
    for line in lines(0, data) {
        println!("{}{}", prefix, line);
    }
}

/// Bytes as space-separated hex on one line.
pub fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
