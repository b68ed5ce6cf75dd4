//! Query IP2Proxy BIN data files.
//!
//! # Example
//!
//! ```no_run
//! use ip2proxy_query::{Columns, Database};
//!
//! let database = Database::open("IP2PROXY-IP-PROXYTYPE-COUNTRY.BIN")?;
//! let row = database.lookup("1.0.0.1", Columns::all())?;
//! println!("{:?} {:?}", row.country_short, row.is_proxy);
//! # Ok::<(), ip2proxy_query::Error>(())
//! ```

#![forbid(unsafe_code)]

mod error;
mod header;
mod normalize;
mod row;

use std::net::IpAddr;
use std::path::Path;

use bitflags::bitflags;
use bstr::BString;
use byteorder::{ByteOrder as _, LE};
use log::{debug, trace};
use positioned_io::{RandomAccessFile, ReadAt, ReadBytesAtExt as _};

pub use crate::error::{Error, Result};
pub use crate::header::Header;
pub use crate::normalize::{Family, Target};
pub use crate::row::{IsProxy, Row};

use crate::header::{Field, Layout, HEADER_LEN, MAX_COLUMNS};

bitflags! {
    /// Set of supported or selected columns.
    ///
    /// # Example
    ///
    /// ```
    /// use ip2proxy_query::Columns;
    ///
    /// assert_eq!(Columns::PX2, Columns::PROXY_TYPE | Columns::COUNTRY_SHORT | Columns::COUNTRY_LONG | Columns::IS_PROXY);
    /// ```
    pub struct Columns: u32 {
        /// See [`Row::country_short`](struct.Row.html#structfield.country_short).
        const COUNTRY_SHORT = 1 <<  0;
        /// See [`Row::country_long`](struct.Row.html#structfield.country_long).
        const COUNTRY_LONG  = 1 <<  1;
        /// See [`Row::region`](struct.Row.html#structfield.region).
        const REGION        = 1 <<  2;
        /// See [`Row::city`](struct.Row.html#structfield.city).
        const CITY          = 1 <<  3;
        /// See [`Row::isp`](struct.Row.html#structfield.isp).
        const ISP           = 1 <<  4;
        /// See [`Row::proxy_type`](struct.Row.html#structfield.proxy_type).
        const PROXY_TYPE    = 1 <<  5;
        /// See [`Row::is_proxy`](struct.Row.html#structfield.is_proxy).
        /// Implies decoding the proxy type and short country code.
        const IS_PROXY      = 1 <<  6;
        /// See [`Row::domain`](struct.Row.html#structfield.domain).
        const DOMAIN        = 1 <<  7;
        /// See [`Row::usage_type`](struct.Row.html#structfield.usage_type).
        const USAGE_TYPE    = 1 <<  8;
        /// See [`Row::asn`](struct.Row.html#structfield.asn).
        const ASN           = 1 <<  9;
        /// See [`Row::as_name`](struct.Row.html#structfield.as_name).
        const AS_NAME       = 1 << 10;
        /// See [`Row::last_seen`](struct.Row.html#structfield.last_seen).
        const LAST_SEEN     = 1 << 11;

        /// Alias for columns of PX1: IP-Country Database.
        const PX1 = Columns::COUNTRY_SHORT.bits | Columns::COUNTRY_LONG.bits | Columns::IS_PROXY.bits;
        /// Alias for columns of PX2: IP-ProxyType-Country Database.
        const PX2 = Columns::PROXY_TYPE.bits | Columns::PX1.bits;
        /// Alias for columns of PX3: IP-ProxyType-Country-Region-City Database.
        const PX3 = Columns::PX2.bits | Columns::REGION.bits | Columns::CITY.bits;
        /// Alias for columns of PX4: IP-ProxyType-Country-Region-City-ISP Database.
        const PX4 = Columns::PX3.bits | Columns::ISP.bits;
        /// Alias for columns of PX5: IP-ProxyType-Country-Region-City-ISP-Domain Database.
        const PX5 = Columns::PX4.bits | Columns::DOMAIN.bits;
        /// Alias for columns of PX6: IP-ProxyType-Country-Region-City-ISP-Domain-UsageType
        /// Database.
        const PX6 = Columns::PX5.bits | Columns::USAGE_TYPE.bits;
        /// Alias for columns of PX7: IP-ProxyType-Country-Region-City-ISP-Domain-UsageType-ASN
        /// Database.
        const PX7 = Columns::PX6.bits | Columns::ASN.bits | Columns::AS_NAME.bits;
        /// Alias for columns of PX8:
        /// IP-ProxyType-Country-Region-City-ISP-Domain-UsageType-ASN-LastSeen Database.
        const PX8 = Columns::PX7.bits | Columns::LAST_SEEN.bits;
    }
}

/// Handle to an opened database.
///
/// The handle is immutable while open, so any number of threads can query it
/// concurrently if the store supports positioned reads from `&R`.
pub struct Database<R> {
    raf: Option<R>,
    header: Header,
    layout: Layout,
}

impl<R> Database<R> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Columns provided by the database package.
    pub fn columns(&self) -> Columns {
        self.layout.columns()
    }

    pub fn is_open(&self) -> bool {
        self.raf.is_some()
    }

    /// Releases the underlying store. Subsequent queries fail with
    /// [`Error::NotReady`].
    pub fn close(&mut self) -> Result<()> {
        match self.raf.take() {
            Some(_) => {
                debug!("closed px{} database", self.header.px());
                Ok(())
            }
            None => Err(Error::NotReady),
        }
    }
}

impl Database<RandomAccessFile> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(RandomAccessFile::open(path)?)
    }
}

impl<R: ReadAt> Database<R> {
    pub fn new(raf: R) -> Result<Self> {
        let mut header_buf = [0; HEADER_LEN];
        raf.read_exact_at(0, &mut header_buf)?;
        let header = Header::read(&header_buf[..])?;
        let layout = Layout::new(header.px(), header.num_columns())?;

        debug!(
            "opened px{} database {}: {} ipv4 rows (index: {}), {} ipv6 rows (index: {})",
            header.px(),
            header.database_version(),
            header.rows_ipv4(),
            header.has_index_ipv4(),
            header.rows_ipv6(),
            header.has_index_ipv6(),
        );

        Ok(Database {
            raf: Some(raf),
            header,
            layout,
        })
    }

    /// Parses a textual address and looks it up.
    pub fn lookup(&self, ip: &str, query: Columns) -> Result<Row> {
        self.search(Target::parse(ip)?, query)
    }

    pub fn query(&self, addr: IpAddr, query: Columns) -> Result<Row> {
        self.search(Target::new(addr), query)
    }

    fn search(&self, target: Target, query: Columns) -> Result<Row> {
        let raf = self.raf.as_ref().ok_or(Error::NotReady)?;

        let (rows, base_ptr, index_ptr, addr_size, row_size) = match target.family {
            Family::V4 => (
                self.header.rows_v4,
                self.header.base_ptr_v4,
                self.header.index_ptr_v4,
                4,
                self.header.row_size_v4(),
            ),
            Family::V6 => {
                if self.header.rows_v6 == 0 {
                    return Err(Error::AddressFamilyUnsupported);
                }
                (
                    self.header.rows_v6,
                    self.header.base_ptr_v6,
                    self.header.index_ptr_v6,
                    16,
                    self.header.row_size_v6(),
                )
            }
        };

        if rows == 0 {
            return Err(Error::RangeNotFound);
        }

        let (mut low_row, mut high_row) = match target.index_key(index_ptr) {
            Some(key) => {
                let mut bucket = [0; 8];
                raf.read_exact_at(key - 1, &mut bucket)?; // index_ptr > 0
                (LE::read_u32(&bucket), LE::read_u32(&bucket[4..]))
            }
            None => (0, rows),
        };

        let value = target.search_value();
        trace!("searching {:?} {:#x} in rows {}..={}", target.family, value, low_row, high_row);

        let mut buffer = [0; 16 + 16 + (MAX_COLUMNS - 1) * 4];

        while low_row <= high_row {
            let mid_row = mid(low_row, high_row);

            let row_ptr = u64::from(base_ptr) + u64::from(mid_row) * row_size as u64 - 1; // base_ptr > 0
            let buf = &mut buffer[..row_size + addr_size];
            raf.read_exact_at(row_ptr, buf)?; // row and next ip_from

            let (ip_from, ip_to) = match target.family {
                Family::V4 => (u128::from(LE::read_u32(buf)), u128::from(LE::read_u32(&buf[row_size..]))),
                Family::V6 => (LE::read_u128(buf), LE::read_u128(&buf[row_size..])),
            };

            if value < ip_from {
                high_row = match mid_row.checked_sub(1) {
                    Some(high_row) => high_row,
                    None => break,
                };
            } else if value >= ip_to {
                low_row = mid_row.checked_add(1).ok_or(Error::Malformed("overflow in binary search"))?;
            } else {
                let mut row = Row::new(target.to_addr(ip_from), target.to_addr(ip_to));
                // Column offsets count 4 bytes for the address column.
                self.read_row(raf, &buf[addr_size - 4..row_size], query, &mut row)?;
                return Ok(row);
            }
        }

        trace!("no range covers {:?} {:#x}", target.family, value);
        Err(Error::RangeNotFound)
    }

    fn read_row(&self, raf: &R, cols: &[u8], query: Columns, row: &mut Row) -> Result<()> {
        row.proxy_type = self.read_col(raf, cols, query, Columns::PROXY_TYPE | Columns::IS_PROXY, Field::ProxyType)?;

        if let Some(ptr) = self.pointer(cols, Field::Country) {
            if query.intersects(Columns::COUNTRY_SHORT | Columns::IS_PROXY) {
                row.country_short = Some(read_str(raf, ptr)?);
            }
            if query.contains(Columns::COUNTRY_LONG) {
                row.country_long = Some(read_str(raf, ptr + 3)?); // ptr <= u32::MAX
            }
        }

        row.region = self.read_col(raf, cols, query, Columns::REGION, Field::Region)?;
        row.city = self.read_col(raf, cols, query, Columns::CITY, Field::City)?;
        row.isp = self.read_col(raf, cols, query, Columns::ISP, Field::Isp)?;
        row.domain = self.read_col(raf, cols, query, Columns::DOMAIN, Field::Domain)?;
        row.usage_type = self.read_col(raf, cols, query, Columns::USAGE_TYPE, Field::UsageType)?;
        row.asn = self.read_col(raf, cols, query, Columns::ASN, Field::Asn)?;
        row.as_name = self.read_col(raf, cols, query, Columns::AS_NAME, Field::AsName)?;
        row.last_seen = self.read_col(raf, cols, query, Columns::LAST_SEEN, Field::LastSeen)?;

        if query.contains(Columns::IS_PROXY) || (row.proxy_type.is_some() && row.country_short.is_some()) {
            row.is_proxy = Some(IsProxy::classify(
                row.country_short.as_ref().map(|s| s.as_slice()),
                row.proxy_type.as_ref().map(|s| s.as_slice()),
            ));
        }

        Ok(())
    }

    fn pointer(&self, cols: &[u8], field: Field) -> Option<u64> {
        self.layout.offset(field).map(|offset| u64::from(LE::read_u32(&cols[offset..])))
    }

    fn read_col(&self, raf: &R, cols: &[u8], query: Columns, column: Columns, field: Field) -> Result<Option<BString>> {
        match self.pointer(cols, field) {
            Some(ptr) if query.intersects(column) => Ok(Some(read_str(raf, ptr)?)),
            _ => Ok(None),
        }
    }
}

fn read_str<R: ReadAt>(raf: &R, ptr: u64) -> Result<BString> {
    // +-----+-------+-------+-----+
    // | len | buf 0 | buf 1 | ... |
    // +-----+-------+-------+-----+
    let len = raf.read_u8_at(ptr)?;
    let mut buf = vec![0; usize::from(len)];
    raf.read_exact_at(ptr + 1, &mut buf)?;
    Ok(buf.into())
}

fn mid(low_row: u32, high_row: u32) -> u32 {
    ((u64::from(low_row) + u64::from(high_row)) / 2) as u32
}
