//! The distributed ARP table: local cache, expiry, and DHT dissemination.
//!
//! [`Dat`] is the entry point. It owns an [`EntryStore`] and the
//! [`PurgeScheduler`] that expires it, and sends DHT_GET / DHT_PUT frames to
//! the candidates a [`CandidateSelector`] picks from a [`NodeRegistry`].

pub mod candidate;
pub mod dat;
pub mod disseminate;
pub mod dump;
pub mod entry;
pub mod error;
pub mod inbound;
pub mod node;
pub mod purge;
pub mod store;
pub mod transport;

pub use candidate::{Candidate, CandidateSelector};
pub use dat::{Dat, Resolution};
pub use disseminate::Disseminator;
pub use dump::{Dump, DumpRow};
pub use entry::{DatEntry, EntryRef, EntrySnapshot};
pub use error::DatError;
pub use inbound::Inbound;
pub use node::{NextHop, Node, NodeRegistry, StaticRegistry};
pub use purge::PurgeScheduler;
pub use store::{EntryStore, Upsert};
pub use transport::{Transport, TransportError};
