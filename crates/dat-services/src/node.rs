//! Mesh participants as seen by the DAT, and the registry seam that
//! supplies them.
//!
//! Discovering nodes and computing routes belongs to the mesh routing
//! protocol. The DAT only reads a snapshot of the node set and asks for the
//! next hop towards a chosen candidate.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use dat_core::config::PeerConfig;
use dat_core::hash::node_ring_addr;
use dat_core::HwAddr;

/// A mesh participant with a position on the DHT ring.
#[derive(Debug, PartialEq, Eq)]
pub struct Node {
    hw_addr: HwAddr,
    ring_addr: u32,
}

impl Node {
    /// Ring position derived from the hardware address.
    pub fn new(hw_addr: HwAddr) -> Self {
        Self {
            hw_addr,
            ring_addr: node_ring_addr(&hw_addr),
        }
    }

    pub fn with_ring_addr(hw_addr: HwAddr, ring_addr: u32) -> Self {
        Self { hw_addr, ring_addr }
    }

    pub fn hw_addr(&self) -> HwAddr {
        self.hw_addr
    }

    pub fn ring_addr(&self) -> u32 {
        self.ring_addr
    }
}

/// The neighbour a frame for some node is handed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    /// Hardware address of the directly reachable neighbour.
    pub neighbor: HwAddr,
    /// Where the transport delivers frames for that neighbour.
    pub endpoint: SocketAddr,
}

/// Read-only view of the mesh the DAT selects candidates from.
pub trait NodeRegistry: Send + Sync {
    /// Every node currently known. Handles are released by dropping them.
    fn nodes(&self) -> Vec<Arc<Node>>;

    /// Best next hop towards `node`, or None if it is unreachable right now.
    fn next_hop(&self, node: &Node) -> Option<Arc<NextHop>>;

    /// The node with hardware address `hw_addr`, if known.
    fn node(&self, hw_addr: &HwAddr) -> Option<Arc<Node>> {
        self.nodes().into_iter().find(|n| n.hw_addr() == *hw_addr)
    }
}

/// Registry with an explicitly managed node set.
///
/// Used by the daemon (fed from config) and in tests. Cloning shares the
/// underlying maps.
#[derive(Clone, Default)]
pub struct StaticRegistry {
    nodes: Arc<DashMap<HwAddr, Arc<Node>>>,
    routes: Arc<DashMap<HwAddr, Arc<NextHop>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One directly reachable node per configured peer.
    pub fn from_peers(peers: &[PeerConfig]) -> Self {
        let registry = Self::new();
        for peer in peers {
            let node = match peer.ring_addr {
                Some(ring) => Node::with_ring_addr(peer.hw_addr, ring),
                None => Node::new(peer.hw_addr),
            };
            registry.insert(
                node,
                Some(NextHop {
                    neighbor: peer.hw_addr,
                    endpoint: peer.addr,
                }),
            );
        }
        registry
    }

    /// Add or replace a node, with its route if it has one.
    pub fn insert(&self, node: Node, route: Option<NextHop>) {
        let hw = node.hw_addr();
        tracing::debug!(node = %hw, ring_addr = node.ring_addr(), "node registered");
        self.nodes.insert(hw, Arc::new(node));
        self.set_route(hw, route);
    }

    pub fn set_route(&self, hw_addr: HwAddr, route: Option<NextHop>) {
        match route {
            Some(hop) => {
                self.routes.insert(hw_addr, Arc::new(hop));
            }
            None => {
                self.routes.remove(&hw_addr);
            }
        }
    }

    pub fn remove(&self, hw_addr: &HwAddr) -> Option<Arc<Node>> {
        self.routes.remove(hw_addr);
        self.nodes.remove(hw_addr).map(|(_, node)| node)
    }

    pub fn get(&self, hw_addr: &HwAddr) -> Option<Arc<Node>> {
        self.nodes.get(hw_addr).map(|n| Arc::clone(n.value()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeRegistry for StaticRegistry {
    fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn next_hop(&self, node: &Node) -> Option<Arc<NextHop>> {
        self.routes
            .get(&node.hw_addr())
            .map(|hop| Arc::clone(hop.value()))
    }

    fn node(&self, hw_addr: &HwAddr) -> Option<Arc<Node>> {
        self.get(hw_addr)
    }
}
