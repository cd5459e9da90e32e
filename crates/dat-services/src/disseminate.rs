//! Delivery of a DAT payload to the candidates responsible for its key.

use std::net::Ipv4Addr;
use std::sync::Arc;

use bytes::Bytes;
use dat_core::wire::{encode_frame, PacketSubtype, UnicastHeader};
use dat_core::HwAddr;

use crate::candidate::{Candidate, CandidateSelector};
use crate::node::NodeRegistry;
use crate::transport::Transport;

/// Sends one copy of a payload to each candidate for a key.
///
/// Best-effort: each candidate is tried once, and a failure on one never
/// stops the others.
pub struct Disseminator {
    selector: CandidateSelector,
    registry: Arc<dyn NodeRegistry>,
    transport: Arc<dyn Transport>,
    local: HwAddr,
}

impl Disseminator {
    pub fn new(
        selector: CandidateSelector,
        registry: Arc<dyn NodeRegistry>,
        transport: Arc<dyn Transport>,
        local: HwAddr,
    ) -> Self {
        Self {
            selector,
            registry,
            transport,
            local,
        }
    }

    /// Send `payload` to the candidates for `ip`.
    ///
    /// Returns true if the transport accepted at least one copy.
    pub fn send(&self, payload: &[u8], ip: Ipv4Addr, subtype: PacketSubtype) -> bool {
        let candidates = {
            let nodes = self.registry.nodes();
            if nodes.is_empty() {
                tracing::trace!(ip = %ip, "no nodes known, nothing to send");
                return false;
            }
            self.selector.select(&nodes, ip)
        };
        if !candidates.iter().any(Candidate::is_found) {
            tracing::trace!(ip = %ip, "no candidate selected");
            return false;
        }

        tracing::debug!(ip = %ip, ?subtype, "DHT send");

        let mut sent = false;
        for (slot, candidate) in candidates.into_iter().enumerate() {
            let Candidate::Found { node, .. } = candidate else {
                continue;
            };

            let Some(hop) = self.registry.next_hop(&node) else {
                tracing::debug!(slot, node = %node.hw_addr(), "no route to candidate");
                continue;
            };

            let header = UnicastHeader::new(subtype, node.hw_addr(), self.local);
            let frame = match encode_frame(&header, payload) {
                Ok(frame) => Bytes::from(frame),
                Err(e) => {
                    tracing::warn!(slot, node = %node.hw_addr(), error = %e, "frame not prepared");
                    continue;
                }
            };

            match self.transport.send(frame, &hop) {
                Ok(()) => {
                    tracing::trace!(slot, node = %node.hw_addr(), via = %hop.neighbor, "sent to candidate");
                    sent = true;
                }
                Err(e) => {
                    tracing::debug!(slot, node = %node.hw_addr(), error = %e, "send to candidate failed");
                }
            }
        }
        sent
    }
}
