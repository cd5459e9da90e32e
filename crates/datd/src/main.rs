//! datd: distributed ARP table daemon.
//!
//! Usage: `datd [IP=HW ...]`. Every mapping given on the command line is
//! treated as a local host and announced to its DHT candidates, then
//! re-announced well inside the entry timeout so it never lapses remotely.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;

use dat_core::{DatConfig, HwAddr};
use dat_services::{Dat, StaticRegistry};

mod table;
mod udp;

const TABLE_PRINT_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = DatConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = DatConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        DatConfig::default()
    });

    let local_hosts = std::env::args()
        .skip(1)
        .map(|arg| parse_mapping(&arg))
        .collect::<Result<Vec<_>>>()?;

    if config.node.hw_addr == HwAddr::ZERO {
        tracing::warn!("node.hw_addr is unset; frames will carry 00:00:00:00:00:00 as source");
    }
    tracing::info!(
        hw_addr = %config.node.hw_addr,
        listen = %config.node.listen,
        peers = config.peers.len(),
        "datd starting"
    );

    let socket = Arc::new(
        UdpSocket::bind(config.node.listen)
            .await
            .with_context(|| format!("failed to bind {}", config.node.listen))?,
    );

    let registry = StaticRegistry::from_peers(&config.peers);
    let transport = udp::UdpTransport::new(socket.clone());
    let announce_every = (config.cache.entry_timeout() / 2).max(Duration::from_secs(1));

    let dat = Arc::new(Dat::new(config, Arc::new(registry), Arc::new(transport)));
    dat.init().context("failed to start DAT")?;

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let recv_task = tokio::spawn(udp::recv_loop(
        socket,
        dat.clone(),
        shutdown_tx.subscribe(),
    ));

    let table_printer = tokio::spawn(table::printer_loop(dat.clone(), TABLE_PRINT_INTERVAL));

    let announcer = {
        let dat = dat.clone();
        tokio::spawn(async move {
            if local_hosts.is_empty() {
                std::future::pending::<()>().await;
            }
            let mut interval = tokio::time::interval(announce_every);
            loop {
                interval.tick().await;
                for &(ip, hw) in &local_hosts {
                    let sent = dat.announce(ip, hw);
                    tracing::debug!(ip = %ip, hw = %hw, sent, "announced local host");
                }
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = recv_task          => tracing::error!("receiver exited: {:?}", r),
        r = table_printer      => tracing::error!("table printer exited: {:?}", r),
        r = announcer          => tracing::error!("announcer exited: {:?}", r),
    }

    dat.teardown().await;
    Ok(())
}

/// Parse `IP=HW`, e.g. `10.0.0.1=02:00:00:00:00:01`.
fn parse_mapping(arg: &str) -> Result<(Ipv4Addr, HwAddr)> {
    let (ip, hw) = arg
        .split_once('=')
        .with_context(|| format!("expected IP=HW, got {arg:?}"))?;
    let ip: Ipv4Addr = ip
        .parse()
        .with_context(|| format!("bad IPv4 address {ip:?}"))?;
    let hw: HwAddr = hw
        .parse()
        .with_context(|| format!("bad hardware address {hw:?}"))?;
    Ok((ip, hw))
}
