//! Periodic rendering of the local DAT cache.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use dat_services::{Dat, DumpRow};

const HEADER: &str = "Distributed ARP Table (DAT):\n          IPv4             MAC        last-seen";

/// Render a table of rows under a fixed header.
pub fn render(local: &str, rows: impl IntoIterator<Item = DumpRow>) -> String {
    let mut out = format!("[{local}] {HEADER}\n");
    let mut count = 0usize;
    for row in rows {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{row}");
        count += 1;
    }
    if count == 0 {
        out.push_str(" (empty)\n");
    }
    out
}

/// Log the cache every `every` until the task is dropped.
pub async fn printer_loop(dat: Arc<Dat>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    let local = dat.local_hw_addr().to_string();
    loop {
        interval.tick().await;
        let Some(dump) = dat.dump() else {
            continue;
        };
        tracing::debug!(entries = dat.len(), "DAT snapshot\n{}", render(&local, dump));
    }
}
