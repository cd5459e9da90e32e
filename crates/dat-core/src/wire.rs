//! DAT wire format.
//!
//! Every frame a node sends to a DHT candidate is a [`UnicastHeader`]
//! followed by an opaque payload. For the three DAT subtypes the payload
//! starts with an [`ArpRecord`].
//!
//! All types are #[repr(C, packed)] byte arrays with zerocopy derives, so
//! layout is deterministic and there is no endianness to get wrong.

use std::net::Ipv4Addr;

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::addr::HwAddr;

// ── Unicast Header ───────────────────────────────────────────────────────────

/// Addressing prepended to every copy of a disseminated payload.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct UnicastHeader {
    /// Frame format version. Currently 0x01.
    pub version: u8,

    /// One of [`PacketSubtype`].
    pub subtype: u8,

    /// Reserved, must be zero.
    pub reserved: [u8; 2],

    /// Hardware address of the candidate this copy is meant for.
    /// Relays forward on this, not on the link-layer destination.
    pub dest: [u8; 6],

    /// Hardware address of the originating node.
    pub src: [u8; 6],
}

assert_eq_size!(UnicastHeader, [u8; 16]);

impl UnicastHeader {
    pub fn new(subtype: PacketSubtype, dest: HwAddr, src: HwAddr) -> Self {
        Self {
            version: FRAME_VERSION,
            subtype: subtype.into(),
            reserved: [0u8; 2],
            dest: dest.0,
            src: src.0,
        }
    }

    pub fn dest(&self) -> HwAddr {
        HwAddr(self.dest)
    }

    pub fn src(&self) -> HwAddr {
        HwAddr(self.src)
    }
}

// ── ARP Record ────────────────────────────────────────────────────────────────

/// One IPv4 → hardware mapping as carried in DAT payloads.
///
/// For DHT_GET the hardware address is the requester's own address.
///
/// Wire size: 10 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ArpRecord {
    /// IPv4 address, network byte order.
    pub ip: [u8; 4],
    pub hw_addr: [u8; 6],
}

assert_eq_size!(ArpRecord, [u8; 10]);

impl ArpRecord {
    pub fn new(ip: Ipv4Addr, hw_addr: HwAddr) -> Self {
        Self {
            ip: ip.octets(),
            hw_addr: hw_addr.0,
        }
    }

    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip)
    }

    pub fn hw_addr(&self) -> HwAddr {
        HwAddr(self.hw_addr)
    }
}

// ── Subtypes ──────────────────────────────────────────────────────────────────

/// What the receiving candidate should do with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketSubtype {
    /// Ask the candidate for the mapping of the record's IP.
    DhtGet = 0x01,
    /// Store the record at the candidate.
    DhtPut = 0x02,
    /// Answer to a DhtGet, served from a candidate's cache.
    CacheReply = 0x03,
}

impl TryFrom<u8> for PacketSubtype {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(PacketSubtype::DhtGet),
            0x02 => Ok(PacketSubtype::DhtPut),
            0x03 => Ok(PacketSubtype::CacheReply),
            other => Err(WireError::UnknownSubtype(other)),
        }
    }
}

impl From<PacketSubtype> for u8 {
    fn from(s: PacketSubtype) -> u8 {
        s as u8
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Current frame format version.
pub const FRAME_VERSION: u8 = 0x01;

/// Size of [`UnicastHeader`] on the wire.
pub const HEADER_LEN: usize = 16;

/// Largest frame (header + payload) a node will emit or accept.
/// Sized to fit a single UDP datagram on a standard 1500-byte MTU.
pub const MAX_FRAME_LEN: usize = 1472;

/// Largest payload that fits behind a header.
pub const MAX_PAYLOAD: usize = MAX_FRAME_LEN - HEADER_LEN;

// ── Framing ───────────────────────────────────────────────────────────────────

/// Serialize a header and payload into a single frame.
pub fn encode_frame(header: &UnicastHeader, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(WireError::PayloadTooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Split a frame into its validated header and payload.
pub fn decode_frame(frame: &[u8]) -> Result<(UnicastHeader, &[u8]), WireError> {
    if frame.len() > MAX_FRAME_LEN {
        return Err(WireError::PayloadTooLarge(frame.len() - HEADER_LEN));
    }
    let header = UnicastHeader::read_from_prefix(frame).ok_or(WireError::Truncated(frame.len()))?;
    if header.version != FRAME_VERSION {
        return Err(WireError::UnknownVersion(header.version));
    }
    if header.reserved != [0u8; 2] {
        return Err(WireError::ReservedSet);
    }
    PacketSubtype::try_from(header.subtype)?;
    Ok((header, &frame[HEADER_LEN..]))
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown packet subtype: 0x{0:02x}")]
    UnknownSubtype(u8),

    #[error("unknown frame version: 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("payload length {0} exceeds maximum {}", MAX_PAYLOAD)]
    PayloadTooLarge(usize),

    #[error("frame of {0} bytes is shorter than its header")]
    Truncated(usize),

    #[error("reserved header bytes are non-zero")]
    ReservedSet,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
