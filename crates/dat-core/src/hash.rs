//! Hashing and ring arithmetic for the distributed address table.
//!
//! One function feeds both the local cache bucket index and the position of
//! a key on the DHT ring: Jenkins one-at-a-time, applied to the raw bytes.
//! Node ring positions are derived the same way from hardware addresses.

use std::net::Ipv4Addr;

use crate::addr::HwAddr;

/// Number of distinct positions on the ring (the full u32 space).
pub const RING_SIZE: u64 = 1 << 32;

/// Jenkins one-at-a-time hash, including the final avalanche.
pub fn jenkins_oaat(key: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &byte in key {
        hash = hash.wrapping_add(u32::from(byte));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

/// Bucket index for an IPv4 address in a table of `size` buckets.
///
/// The address is hashed in network byte order.
pub fn bucket_index(ip: Ipv4Addr, size: usize) -> usize {
    debug_assert!(size > 0);
    jenkins_oaat(&ip.octets()) as usize % size
}

/// Position of a lookup key on the ring.
///
/// The ring spans the whole u32 space, so the modulo is the identity.
pub fn ring_key(ip: Ipv4Addr) -> u32 {
    jenkins_oaat(&ip.octets())
}

/// Ring position of a node, derived from its hardware address.
pub fn node_ring_addr(hw: &HwAddr) -> u32 {
    jenkins_oaat(&hw.0)
}

/// Clockwise walk from `position` to `key`:
/// `(RING_SIZE - position + key) mod RING_SIZE`.
pub fn ring_distance(position: u32, key: u32) -> u64 {
    (RING_SIZE - u64::from(position) + u64::from(key)) % RING_SIZE
}
