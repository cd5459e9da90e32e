//! The per-interface DAT context.
//!
//! Ties the local cache, its purge task and the DHT send path together.
//! One `Dat` exists per mesh interface; nothing here is global.

use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock};

use dat_core::wire::{ArpRecord, PacketSubtype};
use dat_core::{DatConfig, HwAddr};
use zerocopy::AsBytes;

use crate::candidate::CandidateSelector;
use crate::disseminate::Disseminator;
use crate::dump::Dump;
use crate::entry::EntrySnapshot;
use crate::error::DatError;
use crate::node::NodeRegistry;
use crate::purge::PurgeScheduler;
use crate::store::EntryStore;
use crate::transport::Transport;

/// Result of [`Dat::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Answered from the local cache; nothing was sent.
    Cached(HwAddr),
    /// Not cached. A DHT_GET went out; the flag says whether any candidate
    /// accepted it.
    Queried(bool),
}

/// The cache and the task expiring it. Installed and removed together.
struct Running {
    store: Arc<EntryStore>,
    scheduler: PurgeScheduler,
}

pub struct Dat {
    config: DatConfig,
    local: HwAddr,
    pub(crate) registry: Arc<dyn NodeRegistry>,
    pub(crate) transport: Arc<dyn Transport>,
    disseminator: Disseminator,
    running: RwLock<Option<Running>>,
}

impl Dat {
    /// Build an idle context. Call [`Dat::init`] before use.
    pub fn new(
        config: DatConfig,
        registry: Arc<dyn NodeRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let local = config.node.hw_addr;
        let disseminator = Disseminator::new(
            CandidateSelector::new(config.dht.candidates),
            Arc::clone(&registry),
            Arc::clone(&transport),
            local,
        );
        Self {
            config,
            local,
            registry,
            transport,
            disseminator,
            running: RwLock::new(None),
        }
    }

    pub fn local_hw_addr(&self) -> HwAddr {
        self.local
    }

    pub fn config(&self) -> &DatConfig {
        &self.config
    }

    /// Allocate the cache and start expiring it. Calling it again while
    /// running does nothing.
    pub fn init(&self) -> Result<(), DatError> {
        let mut running = self.running.write().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let store = Arc::new(EntryStore::new(self.config.cache.buckets));
        let scheduler = PurgeScheduler::start(
            Arc::clone(&store),
            self.config.cache.purge_interval(),
            self.config.cache.entry_timeout(),
        )?;
        *running = Some(Running { store, scheduler });

        tracing::info!(
            buckets = self.config.cache.buckets,
            candidates = self.config.dht.candidates,
            entry_timeout_secs = self.config.cache.entry_timeout_secs,
            "DAT initialised"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Stop the purge task, waiting for a sweep in progress, then empty
    /// and release the cache.
    ///
    /// The context reads as stopped as soon as this is called, so an
    /// `init` issued while it is still waiting starts a fresh cache that
    /// this teardown leaves alone.
    pub async fn teardown(&self) {
        let running = self
            .running
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(Running { store, scheduler }) = running else {
            return;
        };

        scheduler.cancel().await;
        let removed = store.clear();
        tracing::info!(removed, "DAT torn down");
    }

    pub(crate) fn store(&self) -> Option<Arc<EntryStore>> {
        self.running
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|r| Arc::clone(&r.store))
    }

    /// Record that `ip` was seen at `hw_addr`. Ignored while not running.
    pub fn observe(&self, ip: Ipv4Addr, hw_addr: HwAddr) {
        match self.store() {
            Some(store) => {
                store.upsert(ip, hw_addr);
            }
            None => tracing::trace!(ip = %ip, "DAT not running, observation ignored"),
        }
    }

    /// Local cache read.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<EntrySnapshot> {
        self.store()?.lookup(ip)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.store().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send `payload` to the DHT candidates for `ip`.
    pub fn resolve_and_send(&self, ip: Ipv4Addr, payload: &[u8], subtype: PacketSubtype) -> bool {
        self.disseminator.send(payload, ip, subtype)
    }

    /// Answer from the cache if possible, otherwise ask the DHT.
    pub fn resolve(&self, ip: Ipv4Addr) -> Resolution {
        if let Some(entry) = self.lookup(ip) {
            tracing::debug!(ip = %ip, hw = %entry.hw_addr, "resolved from local cache");
            return Resolution::Cached(entry.hw_addr);
        }
        let request = ArpRecord::new(ip, self.local);
        Resolution::Queried(self.resolve_and_send(ip, request.as_bytes(), PacketSubtype::DhtGet))
    }

    /// Cache a mapping locally and store it at its DHT candidates.
    pub fn announce(&self, ip: Ipv4Addr, hw_addr: HwAddr) -> bool {
        self.observe(ip, hw_addr);
        let record = ArpRecord::new(ip, hw_addr);
        self.resolve_and_send(ip, record.as_bytes(), PacketSubtype::DhtPut)
    }

    /// Lazy walk over the cached entries, or None while not running.
    pub fn dump(&self) -> Option<Dump> {
        self.store().map(|s| s.dump())
    }
}
