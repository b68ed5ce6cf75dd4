//! Canonical numeric form of query addresses.
//!
//! IPv6 addresses that embed an IPv4 address (IPv4-mapped, 6to4, Teredo) are
//! looked up in the IPv4 table.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

const FROM_V4MAPPED: u128 = 0x0000_0000_0000_0000_0000_ffff_0000_0000;
const TO_V4MAPPED: u128   = 0x0000_0000_0000_0000_0000_ffff_ffff_ffff;
const FROM_6TO4: u128     = 0x2002_0000_0000_0000_0000_0000_0000_0000;
const TO_6TO4: u128       = 0x2002_ffff_ffff_ffff_ffff_ffff_ffff_ffff;
const FROM_TEREDO: u128   = 0x2001_0000_0000_0000_0000_0000_0000_0000;
const TO_TEREDO: u128     = 0x2001_0000_ffff_ffff_ffff_ffff_ffff_ffff;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

/// Normalized query address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Target {
    pub family: Family,
    /// Address as an unsigned integer, at most 32 bits wide for `Family::V4`.
    pub value: u128,
}

impl Target {
    pub fn new(addr: IpAddr) -> Target {
        match addr {
            IpAddr::V4(addr) => Target::v4(u32::from(addr)),
            IpAddr::V6(addr) => {
                let value = u128::from(addr);
                if FROM_V4MAPPED <= value && value <= TO_V4MAPPED {
                    Target::v4((value - FROM_V4MAPPED) as u32)
                } else if FROM_6TO4 <= value && value <= TO_6TO4 {
                    Target::v4((value >> 80) as u32)
                } else if FROM_TEREDO <= value && value <= TO_TEREDO {
                    Target::v4(!value as u32)
                } else {
                    Target { family: Family::V6, value }
                }
            }
        }
    }

    pub fn parse(ip: &str) -> Result<Target> {
        ip.parse::<IpAddr>()
            .map(Target::new)
            .map_err(|_| Error::InvalidAddress(ip.to_owned()))
    }

    fn v4(value: u32) -> Target {
        Target { family: Family::V4, value: u128::from(value) }
    }

    fn max(&self) -> u128 {
        match self.family {
            Family::V4 => u128::from(u32::MAX),
            Family::V6 => u128::MAX,
        }
    }

    /// Value used for the range search. The all-ones address is never a
    /// stored lower bound, so it is folded onto its predecessor.
    pub(crate) fn search_value(&self) -> u128 {
        if self.value >= self.max() {
            self.max() - 1
        } else {
            self.value
        }
    }

    /// 1-based position of the 8-byte index bucket for this address, given
    /// the 1-based index base of its family. `None` if there is no index.
    pub(crate) fn index_key(&self, index_base: u32) -> Option<u64> {
        if index_base == 0 {
            return None;
        }
        let bucket = match self.family {
            Family::V4 => (self.value >> 16) as u64,
            Family::V6 => (self.value >> 112) as u64,
        };
        Some((bucket << 3) + u64::from(index_base))
    }

    /// Converts a numeric value of this family back to an address.
    pub(crate) fn to_addr(&self, value: u128) -> IpAddr {
        match self.family {
            Family::V4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
            Family::V6 => IpAddr::V6(Ipv6Addr::from(value)),
        }
    }
}
