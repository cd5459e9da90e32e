//! Link-level send seam.

use bytes::Bytes;

use crate::node::NextHop;

/// Hands a prepared frame to the link for unicast delivery.
///
/// `send` must not block on delivery: acceptance is all the DAT waits for.
pub trait Transport: Send + Sync {
    fn send(&self, frame: Bytes, next_hop: &NextHop) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transmit queue full")]
    QueueFull,

    #[error("no link to {0}")]
    Unreachable(dat_core::HwAddr),

    #[error("short send: {sent} of {len} bytes")]
    ShortSend { sent: usize, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
