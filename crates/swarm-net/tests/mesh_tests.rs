use std::sync::Arc;
use std::time::Duration;

use swarm_net::discovery::memory::InMemoryDiscovery;
use swarm_net::{NetEvent, NetNode, PeerAddr, TransportConfig};

fn config(node_id: &str, port: u16, discovery: Arc<InMemoryDiscovery>) -> TransportConfig {
    let mut cfg = TransportConfig::new(
        format!("127.0.0.1:{port}").parse().unwrap(),
        node_id.to_string(),
        discovery,
    );
    cfg.lan_discovery = false;
    cfg
}

#[tokio::test]
async fn three_node_mesh_converges_via_discovery_poll() {
    let shared = Arc::new(InMemoryDiscovery::seeded([
        PeerAddr { node_id: "n1".into(), addr: "127.0.0.1:19401".into() },
        PeerAddr { node_id: "n2".into(), addr: "127.0.0.1:19402".into() },
        PeerAddr { node_id: "n3".into(), addr: "127.0.0.1:19403".into() },
    ]));

    let mut n1_cfg = config("n1", 19401, shared.clone());
    n1_cfg.discovery_poll_interval = Duration::from_millis(50);
    let mut n2_cfg = config("n2", 19402, shared.clone());
    n2_cfg.discovery_poll_interval = Duration::from_millis(50);
    let mut n3_cfg = config("n3", 19403, shared.clone());
    n3_cfg.discovery_poll_interval = Duration::from_millis(50);

    let n1 = NetNode::spawn(n1_cfg).await.unwrap();
    let n2 = NetNode::spawn(n2_cfg).await.unwrap();
    let n3 = NetNode::spawn(n3_cfg).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut peers1 = n1.connected_peers().await.unwrap();
    peers1.sort();
    assert_eq!(peers1, vec!["n2".to_string(), "n3".to_string()]);

    let mut peers3 = n3.connected_peers().await.unwrap();
    peers3.sort();
    assert_eq!(peers3, vec!["n1".to_string(), "n2".to_string()]);
}

#[tokio::test]
async fn broadcast_reaches_every_connected_peer_except_excluded() {
    let d = Arc::new(InMemoryDiscovery::new());
    let a = NetNode::spawn(config("a", 19501, d.clone())).await.unwrap();
    let b = NetNode::spawn(config("b", 19502, d.clone())).await.unwrap();
    let c = NetNode::spawn(config("c", 19503, d.clone())).await.unwrap();

    let mut b_events = b.subscribe();
    let mut c_events = c.subscribe();

    a.dial("127.0.0.1:19502".parse().unwrap()).await.unwrap();
    a.dial("127.0.0.1:19503".parse().unwrap()).await.unwrap();

    assert!(tokio::time::timeout(Duration::from_secs(2), b_events.recv()).await.is_ok());
    assert!(tokio::time::timeout(Duration::from_secs(2), c_events.recv()).await.is_ok());

    a.broadcast(0x10, serde_json::json!({"n": 1}), Some("c".to_string())).await.unwrap();

    let got_b = tokio::time::timeout(Duration::from_secs(2), b_events.recv()).await.unwrap().unwrap();
    assert!(matches!(got_b, NetEvent::Message { msg_type: 0x10, .. }));

    // c was excluded: its next event (if any within the window) must not be
    // the broadcast message.
    let got_c = tokio::time::timeout(Duration::from_millis(300), c_events.recv()).await;
    if let Ok(Ok(event)) = got_c {
        assert!(!matches!(event, NetEvent::Message { msg_type: 0x10, .. }));
    }
}
