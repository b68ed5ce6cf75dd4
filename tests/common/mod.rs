//! Assembles small BIN databases in memory.

#![allow(dead_code)]

// 1-based column of each field per package, in Entry::fields() order.
const POSITIONS: [[u8; 9]; 10] = [
    [0, 0, 2, 2, 2, 2, 2, 2, 2],  // proxy type
    [0, 2, 3, 3, 3, 3, 3, 3, 3],  // country
    [0, 0, 0, 4, 4, 4, 4, 4, 4],  // region
    [0, 0, 0, 5, 5, 5, 5, 5, 5],  // city
    [0, 0, 0, 0, 6, 6, 6, 6, 6],  // isp
    [0, 0, 0, 0, 0, 7, 7, 7, 7],  // domain
    [0, 0, 0, 0, 0, 0, 8, 8, 8],  // usage type
    [0, 0, 0, 0, 0, 0, 0, 9, 9],  // asn
    [0, 0, 0, 0, 0, 0, 0, 10, 10], // as name
    [0, 0, 0, 0, 0, 0, 0, 0, 11], // last seen
];

const NUM_COLUMNS: [u8; 9] = [0, 2, 3, 5, 6, 7, 8, 10, 11];

#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub proxy_type: &'static str,
    pub country_short: &'static str,
    pub country_long: &'static str,
    pub region: &'static str,
    pub city: &'static str,
    pub isp: &'static str,
    pub domain: &'static str,
    pub usage_type: &'static str,
    pub asn: &'static str,
    pub as_name: &'static str,
    pub last_seen: &'static str,
}

impl Entry {
    pub fn new(proxy_type: &'static str, country_short: &'static str, country_long: &'static str) -> Entry {
        Entry {
            proxy_type,
            country_short,
            country_long,
            ..Entry::default()
        }
    }

    /// Entry with every field set to a value derived from `tag`.
    pub fn full(tag: &'static str) -> Entry {
        Entry {
            proxy_type: "PUB",
            country_short: "US",
            country_long: "United States of America",
            region: tag,
            city: tag,
            isp: tag,
            domain: tag,
            usage_type: tag,
            asn: tag,
            as_name: tag,
            last_seen: tag,
        }
    }

    fn fields(&self) -> [&'static str; 10] {
        [
            self.proxy_type,
            self.country_short,
            self.region,
            self.city,
            self.isp,
            self.domain,
            self.usage_type,
            self.asn,
            self.as_name,
            self.last_seen,
        ]
    }
}

#[derive(Clone)]
pub struct Builder {
    px: u8,
    v4: Vec<(u32, Entry)>,
    v6: Vec<(u128, Entry)>,
    index: bool,
}

impl Builder {
    pub fn new(px: u8) -> Builder {
        Builder {
            px,
            v4: Vec::new(),
            v6: Vec::new(),
            index: false,
        }
    }

    /// Adds an IPv4 range starting at `from`. Ranges must be added in
    /// ascending order; each one ends where the next begins.
    pub fn ipv4(mut self, from: &str, entry: Entry) -> Builder {
        let from: std::net::Ipv4Addr = from.parse().unwrap();
        self.v4.push((u32::from(from), entry));
        self
    }

    pub fn ipv6(mut self, from: &str, entry: Entry) -> Builder {
        let from: std::net::Ipv6Addr = from.parse().unwrap();
        self.v6.push((u128::from(from), entry));
        self
    }

    pub fn with_index(mut self) -> Builder {
        self.index = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let px = usize::from(self.px);
        let num_columns = NUM_COLUMNS[px];

        let mut buf = vec![0; 64];

        // String pool.
        let v4_ptrs: Vec<Vec<u32>> = self.v4.iter().map(|(_, e)| write_entry(&mut buf, e)).collect();
        let v6_ptrs: Vec<Vec<u32>> = self.v6.iter().map(|(_, e)| write_entry(&mut buf, e)).collect();

        // Tables, each followed by a sentinel row.
        let base_v4 = buf.len() + 1;
        for ((from, _), ptrs) in self.v4.iter().zip(&v4_ptrs) {
            buf.extend_from_slice(&from.to_le_bytes());
            write_columns(&mut buf, px, num_columns, ptrs);
        }
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        write_columns(&mut buf, px, num_columns, &[0; 10]);

        let base_v6 = buf.len() + 1;
        for ((from, _), ptrs) in self.v6.iter().zip(&v6_ptrs) {
            buf.extend_from_slice(&from.to_le_bytes());
            write_columns(&mut buf, px, num_columns, ptrs);
        }
        buf.extend_from_slice(&u128::MAX.to_le_bytes());
        write_columns(&mut buf, px, num_columns, &[0; 10]);

        let mut index_v4 = 0;
        let mut index_v6 = 0;
        if self.index {
            index_v4 = buf.len() + 1;
            let froms: Vec<u128> = self.v4.iter().map(|(from, _)| u128::from(*from)).collect();
            write_index(&mut buf, &froms, 16, u128::from(u32::MAX - 1));

            if !self.v6.is_empty() {
                index_v6 = buf.len() + 1;
                let froms: Vec<u128> = self.v6.iter().map(|(from, _)| *from).collect();
                write_index(&mut buf, &froms, 112, u128::MAX - 1);
            }
        }

        let header = [
            self.v4.len() as u32,
            base_v4 as u32,
            self.v6.len() as u32,
            if self.v6.is_empty() { 0 } else { base_v6 as u32 },
            index_v4 as u32,
            index_v6 as u32,
        ];
        buf[..5].copy_from_slice(&[self.px, num_columns, 16, 11, 17]);
        for (i, value) in header.iter().enumerate() {
            buf[5 + i * 4..9 + i * 4].copy_from_slice(&value.to_le_bytes());
        }

        buf
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.push(s.len() as u8);
    buf.extend_from_slice(s.as_bytes());
}

fn write_entry(buf: &mut Vec<u8>, entry: &Entry) -> Vec<u32> {
    entry
        .fields()
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let ptr = buf.len() as u32;
            if i == 1 {
                // Short code padded to 2 bytes, long name at ptr + 3.
                assert!(s.len() <= 2);
                write_str(buf, s);
                buf.resize(ptr as usize + 3, 0);
                write_str(buf, entry.country_long);
            } else {
                write_str(buf, s);
            }
            ptr
        })
        .collect()
}

fn write_columns(buf: &mut Vec<u8>, px: usize, num_columns: u8, ptrs: &[u32]) {
    let mut columns = vec![0u32; usize::from(num_columns) - 1];
    for (field, positions) in POSITIONS.iter().enumerate() {
        let position = positions[px];
        if position != 0 {
            columns[usize::from(position) - 2] = ptrs[field];
        }
    }
    for column in columns {
        buf.extend_from_slice(&column.to_le_bytes());
    }
}

/// Writes 2^16 `(low_row, high_row)` buckets over the top 16 bits.
fn write_index(buf: &mut Vec<u8>, froms: &[u128], shift: u32, max: u128) {
    let row_of = |addr: u128| froms.iter().rposition(|from| *from <= addr).unwrap_or(0) as u32;
    for bucket in 0..(1u128 << 16) {
        let low = bucket << shift;
        let high = std::cmp::min(low | ((1u128 << shift) - 1), max);
        buf.extend_from_slice(&row_of(low).to_le_bytes());
        buf.extend_from_slice(&row_of(high).to_le_bytes());
    }
}

/// PX4 database modelled after the published sample.
pub fn sample_px4() -> Builder {
    let apnic = Entry {
        region: "Queensland",
        city: "Brisbane",
        isp: "Research Prefix for APNIC Labs",
        ..Entry::new("DCH", "AU", "Australia")
    };
    let i2ts = Entry {
        region: "Tokyo",
        city: "Tokyo",
        isp: "I2TS Inc.",
        ..Entry::new("DCH", "JP", "Japan")
    };
    let unknown = Entry {
        region: "-",
        city: "-",
        isp: "-",
        ..Entry::new("-", "-", "-")
    };
    let vpn = Entry {
        region: "Hessen",
        city: "Frankfurt am Main",
        isp: "Example VPN",
        ..Entry::new("VPN", "DE", "Germany")
    };
    let search = Entry {
        region: "California",
        city: "Mountain View",
        isp: "Example Search",
        ..Entry::new("SES", "US", "United States of America")
    };

    Builder::new(4)
        .ipv4("0.0.0.0", unknown.clone())
        .ipv4("1.0.0.0", apnic)
        .ipv4("1.0.1.0", unknown.clone())
        .ipv4("1.0.31.0", i2ts)
        .ipv4("1.0.32.0", unknown.clone())
        .ipv4("5.9.0.0", vpn)
        .ipv4("5.10.0.0", unknown.clone())
        .ipv4("66.249.64.0", search)
        .ipv4("66.249.96.0", unknown)
}
