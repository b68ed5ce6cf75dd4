use std::net::IpAddr;

use bstr::BString;
#[cfg(feature = "serde")]
use serde::Serialize;

/// Derived proxy classification of a range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum IsProxy {
    /// Country or proxy type unknown (`-`).
    No,
    /// Anonymizing proxy.
    Yes,
    /// Data center or search engine range (`DCH`, `SES`).
    DataCenter,
}

impl IsProxy {
    pub(crate) fn classify(country_short: Option<&[u8]>, proxy_type: Option<&[u8]>) -> IsProxy {
        if country_short == Some(&b"-"[..]) || proxy_type == Some(&b"-"[..]) {
            IsProxy::No
        } else if proxy_type == Some(&b"DCH"[..]) || proxy_type == Some(&b"SES"[..]) {
            IsProxy::DataCenter
        } else {
            IsProxy::Yes
        }
    }

    /// Numeric code: 0, 1 or 2.
    pub fn code(self) -> u8 {
        match self {
            IsProxy::No => 0,
            IsProxy::Yes => 1,
            IsProxy::DataCenter => 2,
        }
    }
}

/// Record of the range covering a queried address.
///
/// Fields that were not selected, or that the database package does not
/// provide, are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Row {
    /// First address of the range.
    pub ip_from: IpAddr,
    /// First address after the range.
    pub ip_to: IpAddr,
    pub proxy_type: Option<BString>,
    pub country_short: Option<BString>,
    pub country_long: Option<BString>,
    pub region: Option<BString>,
    pub city: Option<BString>,
    pub isp: Option<BString>,
    pub domain: Option<BString>,
    pub usage_type: Option<BString>,
    pub asn: Option<BString>,
    pub as_name: Option<BString>,
    pub last_seen: Option<BString>,
    pub is_proxy: Option<IsProxy>,
    #[cfg_attr(feature = "serde", serde(skip))]
    _priv: (),
}

impl Row {
    pub(crate) fn new(ip_from: IpAddr, ip_to: IpAddr) -> Row {
        Row {
            ip_from,
            ip_to,
            proxy_type: None,
            country_short: None,
            country_long: None,
            region: None,
            city: None,
            isp: None,
            domain: None,
            usage_type: None,
            asn: None,
            as_name: None,
            last_seen: None,
            is_proxy: None,
            _priv: (),
        }
    }
}
