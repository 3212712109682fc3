//! End-to-end trust computation, exercised through
//! [`liun::Node::recompute_trust`] and [`liun::Node::resolve_dispute`] rather
//! than calling `personalized_pagerank` directly.

use liun::field::FieldElement;
use liun::trust::trust_weighted_accept;
use liun::{Node, NodeConfig};

fn n(v: u64) -> liun::NodeId {
    FieldElement::new(v)
}

#[test]
fn scenario_s5_a_sybil_cluster_stays_below_half_of_total_trust_mass() {
    let mut node = Node::new(n(0), NodeConfig::default());

    // Node 0 bootstraps directly to 9 honest leaves; three of those leaves
    // each gossip one attack edge into a 50-node Sybil cluster that is
    // itself densely interconnected (the worst case for the trust bound).
    for leaf in 1..=9u64 {
        node.overlay_bootstrap_edge_for_test(n(leaf));
    }
    let sybil_base = 1000u64;
    node.overlay_gossip_edge_for_test(n(1), n(sybil_base));
    node.overlay_gossip_edge_for_test(n(2), n(sybil_base + 1));
    node.overlay_gossip_edge_for_test(n(3), n(sybil_base + 2));
    for i in 0..50u64 {
        node.overlay_gossip_edge_for_test(n(sybil_base + i), n(sybil_base + i + 1));
    }

    let trust = node.recompute_trust();
    let sybil_trust: f64 = trust.iter().filter(|(&id, _)| id.value() >= sybil_base).map(|(_, &t)| t).sum();
    assert!(sybil_trust < 0.5, "sybil trust mass was {sybil_trust}");
}

#[test]
fn scenario_s5_dispute_resolution_rejects_a_minority_forgery_claim() {
    let mut node = Node::new(n(0), NodeConfig::default());
    for leaf in 1..=5u64 {
        node.overlay_bootstrap_edge_for_test(n(leaf));
    }
    let _ = node.recompute_trust();

    // A single dissenting low-trust peer claiming forgery shouldn't overturn
    // the honest majority's acceptance.
    let reports: Vec<(liun::NodeId, bool)> = (1..=5u64).map(|i| (n(i), i != 5)).collect();
    let verdict = node.resolve_dispute(&reports);
    assert_eq!(verdict, liun::uss::DisputeVerdict::Valid);
}

#[test]
fn trust_weighted_accept_matches_the_two_thirds_rule_used_by_dispute_resolution() {
    let mut node = Node::new(n(0), NodeConfig::default());
    for leaf in 1..=3u64 {
        node.overlay_bootstrap_edge_for_test(n(leaf));
    }
    let trust = node.recompute_trust();
    // Every leaf should individually hold less than 2/3 of total trust in a
    // symmetric 3-leaf star, so no single attester can force acceptance.
    for leaf in 1..=3u64 {
        assert!(!trust_weighted_accept(&[n(leaf)], trust));
    }
}
