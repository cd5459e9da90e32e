use std::net::Ipv4Addr;
use std::time::Duration;

use dat_core::HwAddr;
use dat_services::{CandidateSelector, Inbound, Node, NodeRegistry, Resolution, StaticRegistry};

use crate::*;

/// The nodes `announcer` would pick as candidates for `ip`.
fn expected_candidates(announcer: HwAddr, count: u8, ip: Ipv4Addr) -> Vec<HwAddr> {
    let registry = StaticRegistry::new();
    for n in (1..=count).filter(|&n| hw(n) != announcer) {
        registry.insert(Node::new(hw(n)), None);
    }
    CandidateSelector::new(3)
        .select(&registry.nodes(), ip)
        .iter()
        .filter_map(|c| c.node().map(|n| n.hw_addr()))
        .collect()
}

#[tokio::test]
async fn put_lands_on_selected_candidates() {
    let mesh = Mesh::start(8, 300);
    let ip = host(1);

    assert!(mesh.node(1).announce(ip, hw(0x99)));
    let outcomes = mesh.deliver();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|(_, o)| matches!(o, Inbound::Stored)));

    let mut expected = expected_candidates(hw(1), 8, ip);
    expected.push(hw(1));
    expected.sort();
    assert_eq!(mesh.holders(ip), expected);

    mesh.shutdown().await;
}

#[tokio::test]
async fn get_from_non_candidate_is_answered_by_candidates() {
    let mesh = Mesh::start(8, 300);
    let ip = host(2);

    mesh.node(1).announce(ip, hw(0x42));
    mesh.deliver();

    let holders = mesh.holders(ip);
    let asker = (1..=8)
        .find(|&n| !holders.contains(&hw(n)))
        .expect("8 nodes, at most 4 hold the entry");

    assert_eq!(mesh.node(asker).resolve(ip), Resolution::Queried(true));
    let outcomes = mesh.deliver();

    // Three GETs, some of which hit, plus one reply per hit.
    let hits = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, Inbound::Answered(true)))
        .count();
    assert!(hits >= 1, "at least one candidate holds the entry: {outcomes:?}");
    let replies_stored = outcomes
        .iter()
        .filter(|(to, o)| *to == hw(asker) && matches!(o, Inbound::Stored))
        .count();
    assert_eq!(replies_stored, hits);

    assert_eq!(mesh.node(asker).lookup(ip).unwrap().hw_addr, hw(0x42));
    // The next resolve is served locally.
    assert_eq!(mesh.node(asker).resolve(ip), Resolution::Cached(hw(0x42)));
    assert_eq!(mesh.link.in_flight(), 0);

    mesh.shutdown().await;
}

#[tokio::test]
async fn get_for_unknown_address_goes_unanswered() {
    let mesh = Mesh::start(5, 300);
    let ip = host(3);

    assert_eq!(mesh.node(2).resolve(ip), Resolution::Queried(true));
    let outcomes = mesh.deliver();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|(_, o)| matches!(o, Inbound::Miss)));
    assert!(mesh.holders(ip).is_empty());

    mesh.shutdown().await;
}

#[tokio::test]
async fn unreachable_candidate_does_not_block_the_rest() {
    let mesh = Mesh::start(6, 300);
    let ip = host(4);
    let candidates = expected_candidates(hw(1), 6, ip);
    mesh.link.cut(candidates[0]);

    assert!(mesh.node(1).announce(ip, hw(0x44)));
    mesh.deliver();

    let holders = mesh.holders(ip);
    assert!(!holders.contains(&candidates[0]));
    assert!(holders.contains(&candidates[1]));
    assert!(holders.contains(&candidates[2]));

    mesh.shutdown().await;
}

#[tokio::test]
async fn all_candidates_unreachable_reports_failure() {
    let mesh = Mesh::start(3, 300);
    mesh.link.cut(hw(2));
    mesh.link.cut(hw(3));

    assert!(!mesh.node(1).announce(host(5), hw(0x55)));
    assert_eq!(mesh.link.in_flight(), 0);
    // The local observation is kept regardless.
    assert!(mesh.node(1).lookup(host(5)).is_some());

    mesh.shutdown().await;
}

#[tokio::test]
async fn torn_down_nodes_stop_answering() {
    let mesh = Mesh::start(6, 300);
    let ip = host(6);
    mesh.node(1).announce(ip, hw(0x66));
    mesh.deliver();

    let holders = mesh.holders(ip);
    for n in &holders {
        mesh.nodes[n].teardown().await;
    }
    assert!(mesh.holders(ip).is_empty());

    let asker = (2..=6).find(|&n| mesh.node(n).is_running()).unwrap();
    assert_eq!(mesh.node(asker).resolve(ip), Resolution::Queried(true));
    let outcomes = mesh.deliver();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|(_, o)| matches!(o, Inbound::Miss)));
    assert!(mesh.node(asker).lookup(ip).is_none());

    mesh.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn remote_copies_expire_without_refresh() {
    let mesh = Mesh::start(5, 60);
    let ip = host(7);
    mesh.node(1).announce(ip, hw(0x77));
    mesh.deliver();
    assert_eq!(mesh.holders(ip).len(), 4);

    // Past the timeout plus one sweep period.
    tokio::time::sleep(Duration::from_secs(75)).await;
    assert!(mesh.holders(ip).is_empty());

    mesh.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn periodic_announce_keeps_copies_alive() {
    let mesh = Mesh::start(5, 60);
    let ip = host(8);

    for _ in 0..6 {
        mesh.node(1).announce(ip, hw(0x88));
        mesh.deliver();
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    assert_eq!(mesh.holders(ip).len(), 4);

    mesh.shutdown().await;
}
