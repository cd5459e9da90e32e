//! Handling of DAT frames received from the mesh.
//!
//! DHT_PUT and CACHE_REPLY both carry a mapping to store. A DHT_GET is
//! answered from the local cache with a CACHE_REPLY addressed to the
//! requester; a miss is silently ignored, the requester relies on other
//! candidates.

use bytes::Bytes;
use dat_core::wire::{decode_frame, encode_frame, ArpRecord, PacketSubtype, UnicastHeader};
use dat_core::{HwAddr, WireError};
use zerocopy::{AsBytes, FromBytes};

use crate::dat::Dat;

/// What [`Dat::handle_frame`] did with a frame.
#[derive(Debug)]
pub enum Inbound {
    /// The carried mapping was stored in the local cache.
    Stored,
    /// A DHT_GET hit the cache. The flag says whether the reply was accepted
    /// by the transport.
    Answered(bool),
    /// A DHT_GET for an address we hold nothing for.
    Miss,
    /// Addressed to another node.
    NotForUs(HwAddr),
    /// Malformed frame or payload.
    Dropped(WireError),
}

impl Dat {
    /// Process one received frame.
    pub fn handle_frame(&self, frame: &[u8]) -> Inbound {
        let (header, payload) = match decode_frame(frame) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::debug!(error = %e, len = frame.len(), "dropping malformed frame");
                return Inbound::Dropped(e);
            }
        };

        if header.dest() != self.local_hw_addr() {
            tracing::trace!(dest = %header.dest(), "frame not addressed to us");
            return Inbound::NotForUs(header.dest());
        }

        let Some(record) = ArpRecord::read_from_prefix(payload) else {
            tracing::debug!(len = payload.len(), src = %header.src(), "short DAT payload");
            return Inbound::Dropped(WireError::Truncated(payload.len()));
        };

        // decode_frame only lets known subtypes through.
        let subtype = match PacketSubtype::try_from(header.subtype) {
            Ok(subtype) => subtype,
            Err(e) => return Inbound::Dropped(e),
        };

        match subtype {
            PacketSubtype::DhtPut | PacketSubtype::CacheReply => {
                tracing::debug!(
                    ?subtype,
                    ip = %record.ip(),
                    hw = %record.hw_addr(),
                    src = %header.src(),
                    "storing mapping"
                );
                self.observe(record.ip(), record.hw_addr());
                Inbound::Stored
            }
            PacketSubtype::DhtGet => self.answer_get(&header, &record),
        }
    }

    fn answer_get(&self, request: &UnicastHeader, record: &ArpRecord) -> Inbound {
        let ip = record.ip();
        let Some(entry) = self.lookup(ip) else {
            tracing::trace!(ip = %ip, src = %request.src(), "DHT_GET miss");
            return Inbound::Miss;
        };

        let requester = request.src();
        let reply = ArpRecord::new(ip, entry.hw_addr);
        let header = UnicastHeader::new(PacketSubtype::CacheReply, requester, self.local_hw_addr());
        let frame = match encode_frame(&header, reply.as_bytes()) {
            Ok(frame) => Bytes::from(frame),
            Err(e) => return Inbound::Dropped(e),
        };

        let hop = self
            .registry
            .node(&requester)
            .and_then(|node| self.registry.next_hop(&node));
        let Some(hop) = hop else {
            tracing::debug!(ip = %ip, requester = %requester, "no route back to requester");
            return Inbound::Answered(false);
        };

        match self.transport.send(frame, &hop) {
            Ok(()) => {
                tracing::debug!(ip = %ip, hw = %entry.hw_addr, requester = %requester, "DHT_GET answered");
                Inbound::Answered(true)
            }
            Err(e) => {
                tracing::debug!(ip = %ip, requester = %requester, error = %e, "reply not sent");
                Inbound::Answered(false)
            }
        }
    }
}
