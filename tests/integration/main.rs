//! DAT integration test harness.
//!
//! Tests here run several `Dat` instances in one process and connect them
//! through an in-memory link. Frames a node sends are queued on the link and
//! only handed to their next hop when a test calls [`Mesh::deliver`], so
//! every exchange is explicit and deterministic.
//!
//!   cargo test --test integration

use std::collections::{BTreeMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use dat_core::{DatConfig, HwAddr};
use dat_services::{
    Dat, Inbound, NextHop, Node, StaticRegistry, Transport, TransportError,
};

mod concurrency;
mod mesh;

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn hw(n: u8) -> HwAddr {
    HwAddr([0x02, 0, 0, 0, 0x10, n])
}

pub fn host(n: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 20, 0, n)
}

/// Frames in flight, tagged with the neighbour they were handed to.
#[derive(Default)]
pub struct Link {
    queue: Mutex<VecDeque<(HwAddr, Bytes)>>,
    down: Mutex<Vec<HwAddr>>,
}

impl Link {
    /// Refuse frames for `neighbor` from now on.
    pub fn cut(&self, neighbor: HwAddr) {
        self.down.lock().unwrap().push(neighbor);
    }

    pub fn in_flight(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    fn pop(&self) -> Option<(HwAddr, Bytes)> {
        self.queue.lock().unwrap().pop_front()
    }
}

impl Transport for Link {
    fn send(&self, frame: Bytes, next_hop: &NextHop) -> Result<(), TransportError> {
        if self.down.lock().unwrap().contains(&next_hop.neighbor) {
            return Err(TransportError::Unreachable(next_hop.neighbor));
        }
        self.queue
            .lock()
            .unwrap()
            .push_back((next_hop.neighbor, frame));
        Ok(())
    }
}

/// A fully connected mesh: every node has a direct route to every other.
pub struct Mesh {
    pub nodes: BTreeMap<HwAddr, Arc<Dat>>,
    pub link: Arc<Link>,
}

impl Mesh {
    /// Build and start `count` nodes with the given cache timeout.
    pub fn start(count: u8, entry_timeout_secs: u64) -> Self {
        let link = Arc::new(Link::default());
        let mut nodes = BTreeMap::new();

        for me in 1..=count {
            let registry = StaticRegistry::new();
            for other in (1..=count).filter(|&o| o != me) {
                registry.insert(
                    Node::new(hw(other)),
                    Some(NextHop {
                        neighbor: hw(other),
                        endpoint: SocketAddr::from(([127, 0, 0, 1], 7000 + u16::from(other))),
                    }),
                );
            }

            let mut config = DatConfig::default();
            config.node.hw_addr = hw(me);
            config.cache.entry_timeout_secs = entry_timeout_secs;

            let dat = Arc::new(Dat::new(config, Arc::new(registry), link.clone()));
            dat.init().expect("DAT starts inside the test runtime");
            nodes.insert(hw(me), dat);
        }

        Self { nodes, link }
    }

    pub fn node(&self, n: u8) -> &Arc<Dat> {
        &self.nodes[&hw(n)]
    }

    /// Hand every queued frame, including replies generated on the way, to
    /// its next hop. Returns what each receiver did with them.
    pub fn deliver(&self) -> Vec<(HwAddr, Inbound)> {
        let mut outcomes = Vec::new();
        while let Some((neighbor, frame)) = self.link.pop() {
            if let Some(dat) = self.nodes.get(&neighbor) {
                outcomes.push((neighbor, dat.handle_frame(&frame)));
            }
        }
        outcomes
    }

    /// Nodes whose local cache holds `ip`.
    pub fn holders(&self, ip: Ipv4Addr) -> Vec<HwAddr> {
        self.nodes
            .iter()
            .filter(|(_, dat)| dat.lookup(ip).is_some())
            .map(|(hw, _)| *hw)
            .collect()
    }

    pub async fn shutdown(self) {
        for dat in self.nodes.values() {
            dat.teardown().await;
        }
    }
}
