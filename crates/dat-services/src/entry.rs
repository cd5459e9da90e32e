//! Cached IPv4 → hardware address mappings and their counted handles.
//!
//! Each entry carries a logical reference count next to its `Arc`. The
//! store owns one reference while the entry is linked into a bucket; every
//! [`EntryRef`] owns another. Handles are only handed out through
//! [`DatEntry::try_acquire`], which refuses once the count has reached zero,
//! so a lookup that races the final release reports a miss instead of
//! resurrecting a dead entry. Memory goes away when the last `Arc` does.

use std::net::Ipv4Addr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dat_core::HwAddr;
use tokio::time::Instant;

/// One cached mapping.
///
/// The hardware address and the refresh time live in atomics so in-place
/// updates are never observed half-written.
#[derive(Debug)]
pub struct DatEntry {
    ip: Ipv4Addr,
    hw_addr: AtomicU64,
    /// Creation time; `last_update` is stored as an offset from it.
    created: Instant,
    last_update_ns: AtomicU64,
    refcount: AtomicUsize,
    /// Set while the entry sits in a bucket chain. Only changed under the
    /// bucket's write lock.
    linked: AtomicBool,
}

impl DatEntry {
    /// A fresh entry holding one reference, owned by whoever links it.
    pub(crate) fn new(ip: Ipv4Addr, hw_addr: HwAddr) -> Self {
        Self {
            ip,
            hw_addr: AtomicU64::new(hw_addr.to_u64()),
            created: Instant::now(),
            last_update_ns: AtomicU64::new(0),
            refcount: AtomicUsize::new(1),
            linked: AtomicBool::new(false),
        }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn hw_addr(&self) -> HwAddr {
        HwAddr::from_u64(self.hw_addr.load(Ordering::Acquire))
    }

    pub fn last_update(&self) -> Instant {
        self.created + Duration::from_nanos(self.last_update_ns.load(Ordering::Acquire))
    }

    /// Time since the mapping was last observed.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_update())
    }

    /// True while the store or at least one handle still references the entry.
    pub fn is_live(&self) -> bool {
        self.refcount.load(Ordering::Acquire) > 0
    }

    /// True while the entry is reachable from the store. Only meaningful
    /// when read under the bucket lock.
    pub(crate) fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    pub(crate) fn set_linked(&self, linked: bool) {
        self.linked.store(linked, Ordering::Release);
    }

    /// Record a fresh observation. The address is only written if it changed.
    pub(crate) fn refresh(&self, hw_addr: HwAddr) {
        let packed = hw_addr.to_u64();
        if self.hw_addr.load(Ordering::Acquire) != packed {
            self.hw_addr.store(packed, Ordering::Release);
        }
        let offset = Instant::now().saturating_duration_since(self.created);
        self.last_update_ns
            .store(offset.as_nanos() as u64, Ordering::Release);
    }

    /// Take a counted handle, unless the count has already dropped to zero.
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Option<EntryRef> {
        let mut current = self.refcount.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }
            match self.refcount.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(EntryRef {
                        entry: Arc::clone(self),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Drop one logical reference.
    pub(crate) fn release(&self) {
        let prev = self.refcount.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "released an entry with no references");
        if prev == 1 {
            tracing::trace!(ip = %self.ip, "entry released");
        }
    }

    #[cfg(test)]
    pub(crate) fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }
}

/// A live handle on a cached entry.
///
/// While a handle exists the entry stays readable, even if a purge unlinks
/// it from the store in the meantime.
#[derive(Debug)]
pub struct EntryRef {
    entry: Arc<DatEntry>,
}

impl EntryRef {
    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            ip: self.entry.ip(),
            hw_addr: self.entry.hw_addr(),
            last_update: self.entry.last_update(),
        }
    }
}

impl Deref for EntryRef {
    type Target = DatEntry;

    fn deref(&self) -> &DatEntry {
        &self.entry
    }
}

impl Clone for EntryRef {
    fn clone(&self) -> Self {
        // We hold a reference, so the count cannot be zero here.
        self.entry.refcount.fetch_add(1, Ordering::AcqRel);
        Self {
            entry: Arc::clone(&self.entry),
        }
    }
}

impl Drop for EntryRef {
    fn drop(&mut self) {
        self.entry.release();
    }
}

/// Point-in-time copy of an entry, detached from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub ip: Ipv4Addr,
    pub hw_addr: HwAddr,
    pub last_update: Instant,
}

impl EntrySnapshot {
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_update)
    }
}
