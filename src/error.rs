use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Errors returned when opening or querying a database.
#[derive(Debug)]
pub enum Error {
    /// The input is neither an IPv4 nor an IPv6 address.
    InvalidAddress(String),
    /// The backing store could not be read, including reads past the end of
    /// the file caused by truncated or corrupt data.
    StoreUnavailable(io::Error),
    /// The store is readable but its contents are inconsistent.
    Malformed(&'static str),
    /// The database handle has been closed.
    NotReady,
    /// IPv6 query against a database built without IPv6 data.
    AddressFamilyUnsupported,
    /// No range in the database covers the address. This is an ordinary
    /// outcome, not a fault.
    RangeNotFound,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidAddress(input) => write!(f, "invalid ip address: {:?}", input),
            Error::StoreUnavailable(err) => write!(f, "store unavailable: {}", err),
            Error::Malformed(msg) => write!(f, "malformed database: {}", msg),
            Error::NotReady => f.write_str("database is not open"),
            Error::AddressFamilyUnsupported => f.write_str("ipv6 address missing in ipv4 database"),
            Error::RangeNotFound => f.write_str("no range covers the address"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::StoreUnavailable(err)
    }
}
