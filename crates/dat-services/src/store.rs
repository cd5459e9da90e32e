//! Local DAT cache: a fixed-size bucketed table of [`DatEntry`].
//!
//! Each bucket publishes an immutable snapshot of its chain. Readers clone
//! the snapshot under a momentary read lock and scan it lock-free, so they
//! never wait on each other or on a sweep that is busy in another bucket.
//! Writers build a replacement chain and swap it in under the bucket's
//! write lock; buckets never contend with one another.
//!
//! The table is never resized. Bucket index is the Jenkins hash of the
//! address bytes modulo the bucket count.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use dat_core::hash::bucket_index;
use dat_core::HwAddr;

use crate::dump::Dump;
use crate::entry::{DatEntry, EntryRef, EntrySnapshot};

pub(crate) type Chain = Arc<Vec<Arc<DatEntry>>>;

struct Bucket {
    chain: RwLock<Chain>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            chain: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Current chain. Entries in it may be unlinked by the time they are read.
    fn snapshot(&self) -> Chain {
        Arc::clone(&self.read())
    }

    // A panic while holding a bucket lock can only come from a caller's purge
    // predicate; the chain itself is swapped atomically, so it stays valid.
    fn read(&self) -> RwLockReadGuard<'_, Chain> {
        self.chain.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Chain> {
        self.chain.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Outcome of [`EntryStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// An existing entry was refreshed in place.
    Updated,
    /// A new entry was linked.
    Inserted,
    /// Nothing changed: allocation failed, or a concurrent insert of the
    /// same address won the race.
    Dropped,
}

/// The local entry cache.
pub struct EntryStore {
    buckets: Box<[Bucket]>,
    len: AtomicUsize,
}

impl EntryStore {
    pub fn new(buckets: usize) -> Self {
        let buckets = buckets.max(1);
        Self {
            buckets: (0..buckets).map(|_| Bucket::new()).collect(),
            len: AtomicUsize::new(0),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of linked entries.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket(&self, ip: Ipv4Addr) -> &Bucket {
        &self.buckets[bucket_index(ip, self.buckets.len())]
    }

    /// Counted handle on the entry for `ip`, if one is live.
    pub fn get(&self, ip: Ipv4Addr) -> Option<EntryRef> {
        let chain = self.bucket(ip).snapshot();
        chain
            .iter()
            .filter(|e| e.ip() == ip)
            .find_map(|e| e.try_acquire())
    }

    /// Copy of the entry for `ip`, if one is live.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<EntrySnapshot> {
        self.get(ip).map(|e| e.snapshot())
    }

    /// Record an observation of `ip` at `hw_addr`.
    pub fn upsert(&self, ip: Ipv4Addr, hw_addr: HwAddr) -> Upsert {
        if let Some(entry) = self.get(ip) {
            if self.refresh_linked(&entry, hw_addr) {
                tracing::debug!(ip = %ip, hw = %entry.hw_addr(), "entry updated");
                return Upsert::Updated;
            }
            tracing::trace!(ip = %ip, "entry purged while refreshing, re-inserting");
        }

        let fresh = Arc::new(DatEntry::new(ip, hw_addr));
        let mut chain = self.bucket(ip).write();

        if chain.iter().any(|e| e.ip() == ip) {
            // Someone linked this address after our lookup. Theirs stands.
            tracing::trace!(ip = %ip, "lost insert race, discarding entry");
            return Upsert::Dropped;
        }

        let mut next = Vec::new();
        if next.try_reserve_exact(chain.len() + 1).is_err() {
            tracing::warn!(ip = %ip, "out of memory, entry not cached");
            return Upsert::Dropped;
        }
        next.extend(chain.iter().cloned());
        fresh.set_linked(true);
        next.push(fresh);
        *chain = Arc::new(next);
        self.len.fetch_add(1, Ordering::AcqRel);
        drop(chain);

        tracing::debug!(ip = %ip, hw = %hw_addr, "new entry added");
        Upsert::Inserted
    }

    /// Refresh `entry` and report whether it is still in the store.
    ///
    /// The check runs under the bucket lock: either a purge unlinked the
    /// entry first and this returns false, or the purge runs afterwards and
    /// sees the fresh timestamp.
    pub(crate) fn refresh_linked(&self, entry: &EntryRef, hw_addr: HwAddr) -> bool {
        entry.refresh(hw_addr);
        let _chain = self.bucket(entry.ip()).read();
        entry.is_linked()
    }

    /// Unlink every entry matching `to_purge`, then drop the store's
    /// reference on each. Returns how many were removed.
    pub fn purge<F>(&self, mut to_purge: F) -> usize
    where
        F: FnMut(&DatEntry) -> bool,
    {
        let mut removed_total = 0;
        for bucket in self.buckets.iter() {
            let removed = {
                let mut chain = bucket.write();
                let (removed, kept): (Vec<_>, Vec<_>) = chain
                    .iter()
                    .cloned()
                    .partition(|e| to_purge(e.as_ref()));
                if removed.is_empty() {
                    continue;
                }
                for entry in &removed {
                    entry.set_linked(false);
                }
                *chain = Arc::new(kept);
                removed
            };
            self.len.fetch_sub(removed.len(), Ordering::AcqRel);
            removed_total += removed.len();
            // Unlinked first; new lookups can no longer reach these.
            for entry in removed {
                entry.release();
            }
        }
        removed_total
    }

    /// Remove entries not refreshed within `timeout`.
    pub fn purge_stale(&self, timeout: Duration) -> usize {
        self.purge(|e| e.age() > timeout)
    }

    /// Remove everything.
    pub fn clear(&self) -> usize {
        self.purge(|_| true)
    }

    /// Lazy walk over all live entries, one bucket snapshot at a time.
    /// Each call starts a fresh walk.
    pub fn dump(self: &Arc<Self>) -> Dump {
        Dump::new(Arc::clone(self))
    }

    pub(crate) fn bucket_snapshot(&self, index: usize) -> Option<Chain> {
        self.buckets.get(index).map(Bucket::snapshot)
    }
}

impl Drop for EntryStore {
    fn drop(&mut self) {
        let removed = self.clear();
        if removed > 0 {
            tracing::trace!(removed, "entry store dropped");
        }
    }
}
