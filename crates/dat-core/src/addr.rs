//! Hardware (link-layer) addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of a hardware address in bytes.
pub const HW_ADDR_LEN: usize = 6;

/// A 6-byte hardware address.
///
/// Ordering is byte-wise, which is the same as comparing the address as a
/// big-endian 48-bit integer. Candidate tie-breaks rely on this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HwAddr(pub [u8; HW_ADDR_LEN]);

impl HwAddr {
    pub const ZERO: HwAddr = HwAddr([0u8; HW_ADDR_LEN]);

    pub const fn new(bytes: [u8; HW_ADDR_LEN]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; HW_ADDR_LEN] {
        self.0
    }

    /// Pack into the low 48 bits of a u64, for atomic storage.
    pub fn to_u64(self) -> u64 {
        let mut buf = [0u8; 8];
        buf[2..].copy_from_slice(&self.0);
        u64::from_be_bytes(buf)
    }

    /// Inverse of [`HwAddr::to_u64`]. The upper 16 bits are ignored.
    pub fn from_u64(v: u64) -> Self {
        let buf = v.to_be_bytes();
        let mut out = [0u8; HW_ADDR_LEN];
        out.copy_from_slice(&buf[2..]);
        Self(out)
    }
}

impl From<[u8; HW_ADDR_LEN]> for HwAddr {
    fn from(bytes: [u8; HW_ADDR_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HwAddrParseError {
    #[error("invalid hex in hardware address: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("expected 6 bytes, got {0}")]
    BadLength(usize),
}

impl FromStr for HwAddr {
    type Err = HwAddrParseError;

    /// Accepts `02:00:5e:10:00:01`, `02-00-5e-10-00-01` or `02005e100001`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .trim()
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();
        let bytes = hex::decode(&compact)?;
        if bytes.len() != HW_ADDR_LEN {
            return Err(HwAddrParseError::BadLength(bytes.len()));
        }
        let mut out = [0u8; HW_ADDR_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for HwAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HwAddr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
