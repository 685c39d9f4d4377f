// tests/line_topology.rs
//! Three routers in a line, A - B - C, over the in-memory network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ndn_dv::mem::{MemoryControl, MemoryNetwork};
use ndn_dv::{DvConfig, DvNode, Name, NodeHandle, NodeSnapshot};

fn n(s: &str) -> Name {
    s.parse().unwrap()
}

struct Router {
    handle: NodeHandle,
    control: Arc<MemoryControl>,
}

impl Router {
    async fn snapshot(&self) -> NodeSnapshot {
        self.handle.snapshot().await.unwrap()
    }
}

async fn start(net: &MemoryNetwork, config: DvConfig) -> Router {
    let control = Arc::new(MemoryControl::new());
    let endpoint = Arc::new(net.endpoint(config.name.clone()));
    let handle = DvNode::start(config, endpoint.clone(), endpoint, control.clone())
        .await
        .unwrap();
    Router { handle, control }
}

async fn line(net: &MemoryNetwork) -> (Router, Router, Router) {
    let a = start(
        net,
        DvConfig::new(n("/a"))
            .with_link(n("/b"), "10.0.0.2")
            .with_prefix(n("/app/a")),
    )
    .await;
    let b = start(
        net,
        DvConfig::new(n("/b"))
            .with_link(n("/a"), "10.0.0.1")
            .with_link(n("/c"), "10.0.0.3"),
    )
    .await;
    let c = start(
        net,
        DvConfig::new(n("/c"))
            .with_link(n("/b"), "10.0.0.2")
            .with_prefix(n("/app/c")),
    )
    .await;
    (a, b, c)
}

fn face_to(snap: &NodeSnapshot, neighbor: &str) -> u64 {
    snap.links
        .iter()
        .find(|l| l.neighbor == n(neighbor))
        .and_then(|l| l.face_id)
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn line_converges_to_hop_counts() {
    let net = MemoryNetwork::new();
    let (a, b, c) = line(&net).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let sa = a.snapshot().await;
    let ab = face_to(&sa, "/b");
    assert_eq!(sa.rib.get(&n("/b")).unwrap().best(), Some((ab, 1)));
    assert_eq!(sa.rib.get(&n("/c")).unwrap().best(), Some((ab, 2)));

    let sc = c.snapshot().await;
    let cb = face_to(&sc, "/b");
    assert_eq!(sc.rib.get(&n("/a")).unwrap().best(), Some((cb, 2)));

    // B learns A only from A; C's reflected route is poisoned
    let sb = b.snapshot().await;
    let ba = face_to(&sb, "/a");
    let to_a = sb.rib.get(&n("/a")).unwrap();
    assert_eq!(to_a.costs(), &BTreeMap::from([(ba, 1)]));
}

#[tokio::test(start_paused = true)]
async fn prefixes_are_routed_towards_their_owner() {
    let net = MemoryNetwork::new();
    let (a, b, c) = line(&net).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let sa = a.snapshot().await;
    let ab = face_to(&sa, "/b");
    assert_eq!(sa.fib.get(&n("/app/c")), Some(&BTreeMap::from([(ab, 2)])));
    assert_eq!(a.control.route(&n("/app/c"), ab), Some(2));
    assert!(sa.fib.get(&n("/app/a")).is_none());

    let sb = b.snapshot().await;
    assert_eq!(sb.fib.len(), 2);
    assert_eq!(
        b.control.route(&n("/app/a"), face_to(&sb, "/a")),
        Some(1)
    );
    assert_eq!(
        b.control.route(&n("/app/c"), face_to(&sb, "/c")),
        Some(1)
    );

    let sc = c.snapshot().await;
    assert_eq!(
        sc.fib.get(&n("/app/a")),
        Some(&BTreeMap::from([(face_to(&sc, "/b"), 2)]))
    );

    // every router agrees on ownership
    for snap in [&sa, &sb, &sc] {
        assert!(snap.prefixes.is_owned_by(&n("/app/a"), &n("/a")));
        assert!(snap.prefixes.is_owned_by(&n("/app/c"), &n("/c")));
    }
}

#[tokio::test(start_paused = true)]
async fn broken_link_withdraws_routes_and_prefixes() {
    let net = MemoryNetwork::new();
    let (a, b, c) = line(&net).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    net.set_link_up(&n("/a"), &n("/b"), false);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let sb = b.snapshot().await;
    assert!(sb.rib.get(&n("/a")).is_none());
    assert!(sb.fib.get(&n("/app/a")).is_none());
    assert!(b.control.routes().keys().all(|(p, _)| p != &n("/app/a")));
    assert!(sb.fib.get(&n("/app/c")).is_some());

    // C hears about it through B
    let sc = c.snapshot().await;
    assert!(sc.rib.get(&n("/a")).is_none());
    assert!(c.control.routes().is_empty());

    let sa = a.snapshot().await;
    assert_eq!(sa.rib.len(), 1);
    assert!(a.control.routes().is_empty());

    // and everything comes back with the link
    net.set_link_up(&n("/a"), &n("/b"), true);
    tokio::time::sleep(Duration::from_secs(60)).await;
    let sc = c.snapshot().await;
    assert_eq!(sc.rib.get(&n("/a")).unwrap().best().map(|(_, cost)| cost), Some(2));
    assert_eq!(c.control.routes().len(), 1);
}
