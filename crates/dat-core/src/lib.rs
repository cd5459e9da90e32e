//! Shared types for the distributed ARP table: addresses, hashing, wire format and configuration.
//! All other meshdat crates depend on this one.

pub mod addr;
pub mod config;
pub mod hash;
pub mod wire;

pub use addr::{HwAddr, HwAddrParseError};
pub use config::{ConfigError, DatConfig};
pub use wire::{ArpRecord, PacketSubtype, UnicastHeader, WireError};
