//! UDP link for DAT frames.
//!
//! Each configured peer is reachable at a UDP endpoint. One socket is used
//! for both directions: the transport sends with a non-blocking
//! `try_send_to`, and the receive loop hands every datagram to the DAT.

use std::io;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use dat_core::wire::MAX_FRAME_LEN;
use dat_services::{Dat, Inbound, NextHop, Transport, TransportError};

pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }
}

impl Transport for UdpTransport {
    fn send(&self, frame: Bytes, next_hop: &NextHop) -> Result<(), TransportError> {
        match self.socket.try_send_to(&frame, next_hop.endpoint) {
            Ok(sent) if sent == frame.len() => Ok(()),
            Ok(sent) => Err(TransportError::ShortSend {
                sent,
                len: frame.len(),
            }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(TransportError::QueueFull),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

/// Feed received datagrams to `dat` until shutdown.
pub async fn recv_loop(
    socket: Arc<UdpSocket>,
    dat: Arc<Dat>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    // One spare byte so oversized datagrams are seen as such, not truncated.
    let mut buf = vec![0u8; MAX_FRAME_LEN + 1];

    tracing::info!(addr = %socket.local_addr()?, "DAT receiver starting");

    loop {
        let (len, from) = tokio::select! {
            _ = shutdown.recv() => break,
            r = socket.recv_from(&mut buf) => match r {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "recv_from failed");
                    continue;
                }
            },
        };

        match dat.handle_frame(&buf[..len]) {
            Inbound::Dropped(e) => tracing::debug!(%from, error = %e, "bad datagram"),
            Inbound::NotForUs(dest) => tracing::trace!(%from, %dest, "datagram for another node"),
            outcome => tracing::trace!(%from, ?outcome, "datagram handled"),
        }
    }

    tracing::debug!("DAT receiver stopped");
    Ok(())
}
