//! Multi-node simulations over the in-memory network.

use std::sync::Arc;

use trust_gossip::audit::{AuditLog, AuditWriter};
use trust_gossip::config::NodeConfig;
use trust_gossip::engine::{Disposition, GossipEngine};
use trust_gossip::net::traits::GossipTransport;
use trust_gossip::net::{MockNetwork, MockTransport};
use trust_gossip::runtime::mock_runtime::MockRuntime;
use trust_gossip::{Amount, GossipMessage, PeerIdentity};

type Node = Arc<GossipEngine<MockTransport, MockRuntime>>;

// 2024-05-01 12:00:00 UTC
const NOON: u64 = 1_714_564_800_000;

fn identity(i: usize) -> PeerIdentity {
    PeerIdentity::new("127.0.0.1", 8000 + i as u16)
}

fn node_config(i: usize, n: usize, traitor: bool) -> NodeConfig {
    NodeConfig::builder()
        .node_id(i as u32)
        .listen_addr(format!("127.0.0.1:{}", 8000 + i).parse().unwrap())
        .peers((0..n).map(identity))
        .traitor(traitor)
        .build()
}

/// Every node lists every node, itself included.
fn mesh(n: usize, traitors: &[usize]) -> (MockNetwork, Vec<Node>) {
    let network = MockNetwork::new();
    let nodes: Vec<Node> = (0..n)
        .map(|i| {
            let engine = GossipEngine::new(
                &node_config(i, n, traitors.contains(&i)),
                network.transport(),
                MockRuntime::new(NOON),
            )
            .unwrap();
            Arc::new(engine)
        })
        .collect();
    for (i, node) in nodes.iter().enumerate() {
        network.register(identity(i), node.clone());
    }
    (network, nodes)
}

#[tokio::test]
async fn honest_mesh_keeps_full_trust() {
    let (network, nodes) = mesh(5, &[]);

    let sent = nodes[0].originate(Amount::from(100)).await;
    assert_eq!(sent.broadcast.peers_sent, 5);
    assert_eq!(sent.broadcast.failed, 0);
    network.settle().await;

    // Forwards skip the immediate sender, so the origin only logs itself.
    assert_eq!(nodes[0].round_log_len(), 1);
    assert_eq!(nodes[0].stats().rounds_completed, 0);

    for node in &nodes[1..] {
        assert_eq!(node.stats().rounds_completed, 1);
        assert_eq!(node.round_log_len(), 0);
    }
    for node in &nodes {
        for (_, score) in node.trust_snapshot().scores {
            assert_eq!(score, 1.0);
        }
    }
}

#[tokio::test]
async fn every_copy_of_a_flood_shares_the_message_id() {
    let (network, nodes) = mesh(4, &[]);

    let sent = nodes[1].originate(Amount::from(7)).await;
    network.settle().await;

    let delivered = network.delivered();
    assert!(!delivered.is_empty());
    for (_, message) in delivered {
        assert_eq!(message.message_id, sent.message_id);
        assert_eq!(message.origin_id, 1);
    }
}

#[tokio::test]
async fn traitor_loses_trust_at_honest_nodes() {
    let (network, nodes) = mesh(5, &[2]);

    nodes[0].originate(Amount::from(100)).await;
    network.settle().await;

    for i in [1, 3, 4] {
        let node = &nodes[i];
        assert_eq!(node.stats().rounds_completed, 1);
        assert_eq!(node.trust_score(&identity(2)), Some(0.8), "node {i}");
        for honest in [0, 1, 3, 4] {
            assert_eq!(node.trust_score(&identity(honest)), Some(1.0));
        }
    }
}

#[tokio::test]
async fn traitor_forwards_only_plus_or_minus_fifty() {
    let (network, nodes) = mesh(3, &[1]);
    let target = identity(2);

    for round in 0..200 {
        let msg = GossipMessage::originate(0, &identity(0), Amount::from(100), format!("m{round}"));
        nodes[1].on_message_received(msg).await;
    }
    network.settle().await;

    let mut low = 0;
    let mut high = 0;
    for message in network.delivered_to(&target) {
        if message.sender_id != 1 {
            continue;
        }
        match message.amount.value() as i64 {
            50 => low += 1,
            150 => high += 1,
            other => panic!("traitor forwarded {other}"),
        }
    }
    assert_eq!(low + high, 200);
    assert!(low > 60 && high > 60, "low={low} high={high}");
}

#[tokio::test]
async fn offline_peer_does_not_fail_originate() {
    let (network, nodes) = mesh(5, &[]);
    network.set_offline(&identity(4), true);

    let sent = nodes[0].originate(Amount::from(100)).await;
    assert_eq!(sent.broadcast.peers_sent, 5);
    assert_eq!(sent.broadcast.delivered, 4);
    assert_eq!(sent.broadcast.failed, 1);
    network.settle().await;

    for i in 0..4 {
        assert!(!network.delivered_to(&identity(i)).is_empty());
    }
    assert!(network.delivered_to(&identity(4)).is_empty());
    assert!(nodes[0].stats().delivery_failures >= 1);
    // Only four senders reach each online node, so no round closes.
    assert_eq!(nodes[1].round_log_len(), 4);
    assert_eq!(nodes[1].stats().rounds_completed, 0);
}

#[tokio::test]
async fn redelivery_neither_refloods_nor_relogs() {
    let (network, nodes) = mesh(3, &[]);
    let msg = GossipMessage::originate(0, &identity(0), Amount::from(100), "dup");

    let transport = network.transport();
    transport.send_to(&identity(1), &msg).await.unwrap();
    network.settle().await;
    let after_first = network.delivered().len();
    let log_len = nodes[1].round_log_len();

    let before = nodes[1].stats();

    assert_eq!(
        nodes[1].on_message_received(msg).await,
        Disposition::Duplicate
    );
    network.settle().await;

    let after = nodes[1].stats();
    assert_eq!(network.delivered().len(), after_first);
    assert_eq!(nodes[1].round_log_len(), log_len);
    assert_eq!(after.forwarded, 1);
    assert_eq!(after.duplicates_dropped, before.duplicates_dropped + 1);
}

#[tokio::test]
async fn consecutive_floods_close_consecutive_rounds() {
    let (network, nodes) = mesh(5, &[]);

    nodes[0].originate(Amount::from(100)).await;
    network.settle().await;
    nodes[0].originate(Amount::from(200)).await;
    network.settle().await;

    for node in &nodes[1..] {
        assert_eq!(node.stats().rounds_completed, 2);
        assert!(node.trust_snapshot().scores.iter().all(|(_, s)| *s == 1.0));
    }
    assert_eq!(nodes[0].round_log_amount(&identity(0)), Some(Amount::from(200)));
}

#[tokio::test]
async fn completed_rounds_are_audited() {
    let dir = tempfile::tempdir().unwrap();
    let network = MockNetwork::new();
    let n = 3;

    let nodes: Vec<Node> = (0..n)
        .map(|i| {
            let runtime = MockRuntime::new(NOON);
            let writer = AuditWriter::spawn(
                AuditLog::new(dir.path().join(format!("trust_scores_node_{i}.log"))),
                8,
                &runtime,
            );
            let engine = GossipEngine::new(&node_config(i, n, i == 2), network.transport(), runtime)
                .unwrap()
                .with_audit(writer);
            Arc::new(engine)
        })
        .collect();
    for (i, node) in nodes.iter().enumerate() {
        network.register(identity(i), node.clone());
    }

    nodes[0].originate(Amount::from(100)).await;
    network.settle().await;
    for node in &nodes {
        node.flush_audit().await;
    }

    assert!(!dir.path().join("trust_scores_node_0.log").exists());
    let text = std::fs::read_to_string(dir.path().join("trust_scores_node_1.log")).unwrap();
    assert_eq!(
        text,
        "Trust Scores at 2024-05-01 12:00:00:\n\
         127.0.0.1:8000: 1.0\n\
         127.0.0.1:8001: 1.0\n\
         127.0.0.1:8002: 0.8\n\n"
    );

    for node in &nodes {
        node.close_audit().await;
    }
}
