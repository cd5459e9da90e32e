use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dat_core::HwAddr;
use dat_services::EntryStore;

use crate::*;

/// Addresses whose six bytes are all equal, so a mix of two writes would
/// show up as a mixed address.
fn uniform(b: u8) -> HwAddr {
    HwAddr([b; 6])
}

fn is_uniform(hw: HwAddr) -> bool {
    hw.0.iter().all(|&b| b == hw.0[0])
}

#[test]
fn readers_never_see_torn_addresses() {
    let store = Arc::new(EntryStore::new(16));
    let stop = Arc::new(AtomicBool::new(false));
    let ips: Vec<Ipv4Addr> = (1..=32).map(host).collect();

    let writers: Vec<_> = (0..4u8)
        .map(|w| {
            let store = store.clone();
            let stop = stop.clone();
            let ips = ips.clone();
            thread::spawn(move || {
                let mut round = 0u8;
                while !stop.load(Ordering::Relaxed) {
                    for ip in &ips {
                        store.upsert(*ip, uniform(w.wrapping_mul(50).wrapping_add(round)));
                    }
                    round = round.wrapping_add(1);
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let stop = stop.clone();
            let ips = ips.clone();
            thread::spawn(move || {
                let mut seen = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    for ip in &ips {
                        if let Some(entry) = store.get(*ip) {
                            assert!(is_uniform(entry.hw_addr()), "torn read {}", entry.hw_addr());
                            assert_eq!(entry.ip(), *ip);
                            seen += 1;
                        }
                    }
                }
                seen
            })
        })
        .collect();

    let purger = {
        let store = store.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut sweeps = 0usize;
            while !stop.load(Ordering::Relaxed) {
                store.purge(|e| e.hw_addr().0[0] % 3 == 0);
                sweeps += 1;
                thread::yield_now();
            }
            sweeps
        })
    };

    thread::sleep(Duration::from_millis(300));
    stop.store(true, Ordering::Relaxed);

    for w in writers {
        w.join().expect("writer panicked");
    }
    let seen: usize = readers
        .into_iter()
        .map(|r| r.join().expect("reader panicked"))
        .sum();
    assert!(seen > 0);
    assert!(purger.join().expect("purger panicked") > 0);

    // The count matches what a walk finds, and nothing is listed twice.
    let mut listed: Vec<Ipv4Addr> = store.dump().map(|row| row.ip).collect();
    assert_eq!(listed.len(), store.len());
    listed.sort();
    listed.dedup();
    assert_eq!(listed.len(), store.len());
}

#[test]
fn handles_survive_concurrent_purges() {
    let store = Arc::new(EntryStore::new(4));
    for n in 1..=64 {
        store.upsert(host(n), uniform(n));
    }
    let held: Vec<_> = (1..=64).filter_map(|n| store.get(host(n))).collect();
    assert_eq!(held.len(), 64);

    let purgers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || store.clear())
        })
        .collect();
    let removed: usize = purgers
        .into_iter()
        .map(|p| p.join().expect("purger panicked"))
        .sum();

    // Every entry is unlinked exactly once.
    assert_eq!(removed, 64);
    assert!(store.is_empty());
    for (i, handle) in held.iter().enumerate() {
        assert!(handle.is_live());
        assert_eq!(handle.hw_addr(), uniform(i as u8 + 1));
    }

    drop(held);
    for n in 1..=64 {
        assert!(store.lookup(host(n)).is_none());
    }
}

#[test]
fn observation_survives_a_racing_purge() {
    const OLD: u8 = 0x01;
    const NEW: u8 = 0x02;

    let store = Arc::new(EntryStore::new(1));
    let stop = Arc::new(AtomicBool::new(false));

    // Sweeps only ever target the old address, so whatever was just
    // observed at NEW must stay cached.
    let purger = {
        let store = store.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                store.purge(|e| e.hw_addr() == uniform(OLD));
            }
        })
    };

    for round in 0..20_000u32 {
        let ip = host((round % 8) as u8 + 1);
        store.upsert(ip, uniform(OLD));
        store.upsert(ip, uniform(NEW));
        let cached = store.lookup(ip).map(|e| e.hw_addr);
        assert_eq!(cached, Some(uniform(NEW)), "round {round}: observation lost");
    }

    stop.store(true, Ordering::Relaxed);
    purger.join().expect("purger panicked");
}

#[test]
fn racing_inserts_link_one_entry_per_address() {
    let store = Arc::new(EntryStore::new(1024));
    let threads: Vec<_> = (0..8u8)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for n in 1..=100 {
                    store.upsert(host(n), uniform(t));
                }
            })
        })
        .collect();
    for t in threads {
        t.join().expect("inserter panicked");
    }

    assert_eq!(store.len(), 100);
    assert_eq!(store.dump().count(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn teardown_under_load_completes() {
    let mesh = Mesh::start(4, 300);
    let dat = mesh.node(1).clone();

    let stop = Arc::new(AtomicBool::new(false));
    let workers: Vec<_> = (0..4u8)
        .map(|w| {
            let dat = dat.clone();
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || {
                let mut n = 0u8;
                while !stop.load(Ordering::Relaxed) {
                    dat.observe(host(n), uniform(w));
                    let _ = dat.lookup(host(n.wrapping_sub(1)));
                    n = n.wrapping_add(1);
                }
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    dat.teardown().await;
    assert!(!dat.is_running());

    // Late observations on a stopped context are ignored.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dat.is_empty());

    stop.store(true, Ordering::Relaxed);
    for w in workers {
        w.await.expect("worker panicked");
    }
    mesh.shutdown().await;
}
