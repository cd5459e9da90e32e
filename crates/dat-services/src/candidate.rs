//! DHT candidate selection.
//!
//! Keys and nodes share one ring covering the u32 space. A node's distance
//! to a key is the clockwise walk from the node's ring position to the key.
//! Selection runs `count` rounds; each round takes the unselected node with
//! the greatest distance that does not exceed the previous round's pick, so
//! the picked distances never increase. Equal distances go to the lower
//! hardware address, which makes the result independent of registry order.

use std::net::Ipv4Addr;
use std::sync::Arc;

use dat_core::hash::{ring_distance, ring_key, RING_SIZE};

use crate::node::Node;

/// One slot of a selection result.
#[derive(Debug, Clone)]
pub enum Candidate {
    Found { node: Arc<Node>, distance: u64 },
    NotFound,
}

impl Candidate {
    pub fn node(&self) -> Option<&Arc<Node>> {
        match self {
            Candidate::Found { node, .. } => Some(node),
            Candidate::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Candidate::Found { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateSelector {
    count: usize,
}

impl CandidateSelector {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Candidates responsible for `ip`.
    pub fn select(&self, nodes: &[Arc<Node>], ip: Ipv4Addr) -> Vec<Candidate> {
        let key = ring_key(ip);
        tracing::trace!(ip = %ip, ring_key = key, "selecting candidates");
        self.select_for_key(nodes, key)
    }

    /// Candidates responsible for a raw ring position.
    pub fn select_for_key(&self, nodes: &[Arc<Node>], key: u32) -> Vec<Candidate> {
        let mut picked: Vec<Candidate> = Vec::with_capacity(self.count);
        let mut last_max = RING_SIZE;

        for round in 0..self.count {
            let mut best: Option<(u64, &Arc<Node>)> = None;

            for node in nodes {
                let already = picked
                    .iter()
                    .any(|c| c.node().is_some_and(|p| p.hw_addr() == node.hw_addr()));
                if already {
                    continue;
                }
                let distance = ring_distance(node.ring_addr(), key);
                if distance > last_max {
                    continue;
                }
                if let Some((max, holder)) = best {
                    if distance < max {
                        continue;
                    }
                    if distance == max && node.hw_addr() >= holder.hw_addr() {
                        continue;
                    }
                }
                best = Some((distance, node));
            }

            match best {
                Some((distance, node)) => {
                    tracing::trace!(
                        round,
                        node = %node.hw_addr(),
                        ring_addr = node.ring_addr(),
                        distance,
                        "candidate selected"
                    );
                    last_max = distance;
                    picked.push(Candidate::Found {
                        node: Arc::clone(node),
                        distance,
                    });
                }
                None => picked.push(Candidate::NotFound),
            }
        }
        picked
    }
}
