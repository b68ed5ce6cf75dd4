use std::io::Read;

use byteorder::{ReadBytesExt as _, LE};

use crate::error::{Error, Result};
use crate::Columns;

pub(crate) const HEADER_LEN: usize = 5 * 1 + 6 * 4;

pub(crate) const MAX_COLUMNS: usize = 11;

/// Fixed-layout metadata at the start of every database.
///
/// Table and index pointers are 1-based file positions, as stored.
#[derive(Debug, Clone)]
pub struct Header {
    px: u8,
    num_columns: u8,
    year: u8,
    month: u8,
    day: u8,
    pub(crate) rows_v4: u32,
    pub(crate) base_ptr_v4: u32,
    pub(crate) rows_v6: u32,
    pub(crate) base_ptr_v6: u32,
    pub(crate) index_ptr_v4: u32,
    pub(crate) index_ptr_v6: u32,
}

fn validate_columns(num_columns: u8) -> Result<u8> {
    if num_columns < 1 || MAX_COLUMNS < usize::from(num_columns) {
        Err(Error::Malformed("invalid number of columns"))
    } else {
        Ok(num_columns)
    }
}

impl Header {
    pub(crate) fn read<R: Read>(mut reader: R) -> Result<Header> {
        let header = Header {
            px: reader.read_u8()?,
            num_columns: validate_columns(reader.read_u8()?)?,
            year: reader.read_u8()?,
            month: reader.read_u8()?,
            day: reader.read_u8()?,
            rows_v4: reader.read_u32::<LE>()?,
            base_ptr_v4: reader.read_u32::<LE>()?,
            rows_v6: reader.read_u32::<LE>()?,
            base_ptr_v6: reader.read_u32::<LE>()?,
            index_ptr_v4: reader.read_u32::<LE>()?,
            index_ptr_v6: reader.read_u32::<LE>()?,
        };

        if header.rows_v4 > 0 && header.base_ptr_v4 == 0 {
            return Err(Error::Malformed("ipv4 rows without ipv4 table"));
        }
        if header.rows_v6 > 0 && header.base_ptr_v6 == 0 {
            return Err(Error::Malformed("ipv6 rows without ipv6 table"));
        }

        Ok(header)
    }

    /// Database package, i.e. the schema type selecting the column layout.
    pub fn px(&self) -> u8 {
        self.px
    }

    pub fn num_columns(&self) -> u8 {
        self.num_columns
    }

    /// Two-digit year of the database build, offset from 2000.
    pub fn year(&self) -> u8 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn rows_ipv4(&self) -> u32 {
        self.rows_v4
    }

    pub fn rows_ipv6(&self) -> u32 {
        self.rows_v6
    }

    pub fn has_index_ipv4(&self) -> bool {
        self.index_ptr_v4 != 0
    }

    pub fn has_index_ipv6(&self) -> bool {
        self.index_ptr_v6 != 0
    }

    /// Build date formatted as `20YY.M.D`.
    ///
    /// # Example
    ///
    /// ```
    /// # fn example(database: &ip2proxy_query::Database<Vec<u8>>) {
    /// println!("{}", database.header().database_version()); // e.g. 2016.11.17
    /// # }
    /// ```
    pub fn database_version(&self) -> String {
        format!("20{}.{}.{}", self.year, self.month, self.day)
    }

    /// Size of an IPv4 row: every column is 4 bytes wide.
    pub(crate) fn row_size_v4(&self) -> usize {
        usize::from(self.num_columns) * 4
    }

    /// Size of an IPv6 row: the leading address column is 16 bytes wide.
    pub(crate) fn row_size_v6(&self) -> usize {
        16 + (usize::from(self.num_columns) - 1) * 4 // num_columns >= 1
    }
}

/// Logical field stored as a pointer column.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Field {
    Country,
    Region,
    City,
    Isp,
    ProxyType,
    Domain,
    UsageType,
    Asn,
    AsName,
    LastSeen,
}

const NUM_FIELDS: usize = 10;

const FIELDS: [Field; NUM_FIELDS] = [
    Field::Country,
    Field::Region,
    Field::City,
    Field::Isp,
    Field::ProxyType,
    Field::Domain,
    Field::UsageType,
    Field::Asn,
    Field::AsName,
    Field::LastSeen,
];

const NUM_PX: usize = 9;

// 1-based column of each field, per schema type. 0 if absent.
const POSITIONS: [[u8; NUM_PX]; NUM_FIELDS] = [
    [0, 2, 3, 3, 3, 3, 3, 3, 3],  // country
    [0, 0, 0, 4, 4, 4, 4, 4, 4],  // region
    [0, 0, 0, 5, 5, 5, 5, 5, 5],  // city
    [0, 0, 0, 0, 6, 6, 6, 6, 6],  // isp
    [0, 0, 2, 2, 2, 2, 2, 2, 2],  // proxy type
    [0, 0, 0, 0, 0, 7, 7, 7, 7],  // domain
    [0, 0, 0, 0, 0, 0, 8, 8, 8],  // usage type
    [0, 0, 0, 0, 0, 0, 0, 9, 9],  // asn
    [0, 0, 0, 0, 0, 0, 0, 10, 10], // as name
    [0, 0, 0, 0, 0, 0, 0, 0, 11], // last seen
];

impl Field {
    fn columns(self) -> Columns {
        match self {
            Field::Country => Columns::COUNTRY_SHORT | Columns::COUNTRY_LONG | Columns::IS_PROXY,
            Field::Region => Columns::REGION,
            Field::City => Columns::CITY,
            Field::Isp => Columns::ISP,
            Field::ProxyType => Columns::PROXY_TYPE | Columns::IS_PROXY,
            Field::Domain => Columns::DOMAIN,
            Field::UsageType => Columns::USAGE_TYPE,
            Field::Asn => Columns::ASN,
            Field::AsName => Columns::AS_NAME,
            Field::LastSeen => Columns::LAST_SEEN,
        }
    }
}

/// Byte offsets of the pointer columns within a row, fixed for the lifetime
/// of a database.
///
/// Offsets assume uniform 4-byte columns, counted from the first column.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    offsets: [Option<usize>; NUM_FIELDS],
    columns: Columns,
}

impl Layout {
    pub(crate) fn new(px: u8, num_columns: u8) -> Result<Layout> {
        let px = usize::from(px);
        if px == 0 || NUM_PX <= px {
            return Err(Error::Malformed("only px1 - px8 supported"));
        }

        let mut offsets = [None; NUM_FIELDS];
        let mut columns = Columns::empty();
        for (i, field) in FIELDS.iter().enumerate() {
            let position = POSITIONS[i][px];
            if position == 0 {
                continue;
            }
            if num_columns < position {
                return Err(Error::Malformed("column count too small for database package"));
            }
            offsets[i] = Some((usize::from(position) - 1) * 4);
            columns |= field.columns();
        }

        Ok(Layout { offsets, columns })
    }

    pub(crate) fn offset(&self, field: Field) -> Option<usize> {
        self.offsets[field as usize]
    }

    pub(crate) fn columns(&self) -> Columns {
        self.columns
    }
}
