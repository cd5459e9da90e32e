//! Diagnostic walk over the local cache.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use dat_core::HwAddr;

use crate::store::{Chain, EntryStore};

/// One line of the cache table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpRow {
    pub ip: Ipv4Addr,
    pub hw_addr: HwAddr,
    /// Time since the mapping was last observed.
    pub age: Duration,
}

impl fmt::Display for DumpRow {
    /// ` * 10.0.0.1        02:00:00:00:00:01      4:07`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.age.as_secs();
        write!(
            f,
            " * {:>15} {:>17} {:>6}:{:02}",
            self.ip.to_string(),
            self.hw_addr.to_string(),
            secs / 60,
            secs % 60
        )
    }
}

/// Iterator returned by [`EntryStore::dump`].
///
/// Buckets are snapshotted one at a time as the walk reaches them, so the
/// walk never blocks writers and reflects each bucket as it was when read.
/// The walk keeps the store alive until it is dropped.
pub struct Dump {
    store: Arc<EntryStore>,
    next_bucket: usize,
    chain: Option<Chain>,
    pos: usize,
}

impl Dump {
    pub(crate) fn new(store: Arc<EntryStore>) -> Self {
        Self {
            store,
            next_bucket: 0,
            chain: None,
            pos: 0,
        }
    }
}

impl Iterator for Dump {
    type Item = DumpRow;

    fn next(&mut self) -> Option<DumpRow> {
        loop {
            if let Some(chain) = &self.chain {
                while let Some(entry) = chain.get(self.pos) {
                    self.pos += 1;
                    if entry.is_live() {
                        return Some(DumpRow {
                            ip: entry.ip(),
                            hw_addr: entry.hw_addr(),
                            age: entry.age(),
                        });
                    }
                }
            }
            self.chain = Some(self.store.bucket_snapshot(self.next_bucket)?);
            self.next_bucket += 1;
            self.pos = 0;
        }
    }
}
