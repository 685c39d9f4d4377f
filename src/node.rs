// src/node.rs
//! The routing node.
//!
//! A [`DvNode`] owns the link table, RIB, prefix table and FIB, and is driven
//! by a single event loop. The loop reacts to:
//! - sync notifications (a neighbor's advertisement or a router's prefix log
//!   advanced),
//! - results of fetch tasks it spawned,
//! - a jittered heartbeat.
//!
//! Fetches run as separate tasks and report back through [`Event`]s, so the
//! tables are only ever touched from the loop. A RIB recomputation and the
//! FIB changes it causes therefore never interleave with prefix replay.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{ConfigError, DvConfig};
use crate::control::ForwardingControl;
use crate::event::Event;
use crate::fib::Fib;
use crate::link::{Link, LinkTable};
use crate::message::{Advertisement, PrefixOpList};
use crate::name::Name;
use crate::prefix::PrefixTable;
use crate::rib::Rib;
use crate::sync::{
    AdvertSyncState, FailureOutcome, PrefixSyncState, advert_group, advert_name, prefix_ops_name,
};
use crate::transport::{FetchError, SyncGroup, SyncUpdate, Transport, fetch_with_timeout};

/// Log target for states that should be impossible.
const DEFECT: &str = "ndn_dv::defect";

/// State of one link as seen from outside the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub neighbor: Name,
    pub address: String,
    pub face_id: Option<u64>,
    pub failures: u32,
    pub has_advert: bool,
    /// Newest advertisement number announced by the neighbor.
    pub advert_seq: Option<u64>,
}

/// Copy of a node's tables at one point in time.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub router: Name,
    pub advert_seq: u64,
    pub prefix_seq: u64,
    pub rib: Rib,
    pub fib: BTreeMap<Name, BTreeMap<u64, u64>>,
    pub prefixes: PrefixTable,
    pub links: Vec<LinkStatus>,
}

/// Handle to a running node.
pub struct NodeHandle {
    router: Name,
    events: mpsc::UnboundedSender<Event>,
    task: JoinHandle<()>,
}

impl NodeHandle {
    pub fn router(&self) -> &Name {
        &self.router
    }

    /// Current tables, or `None` if the node has stopped.
    pub async fn snapshot(&self) -> Option<NodeSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.events.send(Event::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    /// Stop the event loop and wait for it to exit. Routes already in the
    /// forwarder are left in place.
    pub async fn shutdown(self) {
        let _ = self.events.send(Event::Shutdown);
        if let Err(e) = self.task.await {
            error!(router = %self.router, error = %e, "node task failed");
        }
    }
}

pub struct DvNode {
    config: DvConfig,
    transport: Arc<dyn Transport>,
    sync: Arc<dyn SyncGroup>,
    control: Arc<dyn ForwardingControl>,
    events: mpsc::UnboundedSender<Event>,

    links: LinkTable,
    adverts: BTreeMap<Name, AdvertSyncState>,
    rib: Rib,
    advert: Advertisement,
    advert_seq: u64,

    prefixes: PrefixTable,
    prefix_logs: BTreeMap<Name, PrefixSyncState>,
    prefix_seq: u64,

    fib: Fib,
}

impl DvNode {
    /// Validate `config`, bring the node up and spawn its event loop.
    ///
    /// Start-up creates faces for links without one, joins the advertisement
    /// group of every neighbor and the prefix sync group, publishes the own
    /// prefix log and the first advertisement.
    pub async fn start(
        config: DvConfig,
        transport: Arc<dyn Transport>,
        sync: Arc<dyn SyncGroup>,
        control: Arc<dyn ForwardingControl>,
    ) -> Result<NodeHandle, ConfigError> {
        config.validate()?;

        let span = info_span!("node", router = %config.name);
        let router = config.name.clone();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let mut links = LinkTable::new();
        for lc in &config.links {
            let mut link = Link::new(lc.other_name.clone(), lc.other_ip.clone());
            if let Some(face) = lc.faceid {
                link.assign_face(face);
            }
            sync.join(&advert_group(&lc.other_name), updates_tx.clone());
            links.insert(link);
        }
        sync.join(&config.sync, updates_tx);

        let mut node = DvNode {
            fib: Fib::new(control.clone()),
            config,
            transport,
            sync,
            control,
            events: events_tx.clone(),
            links,
            adverts: BTreeMap::new(),
            rib: Rib::new(),
            advert: Advertisement::new(),
            advert_seq: 0,
            prefixes: PrefixTable::new(),
            prefix_logs: BTreeMap::new(),
            prefix_seq: 0,
        };

        async {
            node.create_faces().await;
            node.publish_own_prefixes().await;
            node.recompute().await;
            info!(links = node.links.len(), "node started");
        }
        .instrument(span.clone())
        .await;

        let task = tokio::spawn(node.run(updates_rx, events_rx).instrument(span));
        Ok(NodeHandle {
            router,
            events: events_tx,
            task,
        })
    }

    async fn run(
        mut self,
        mut updates: mpsc::UnboundedReceiver<SyncUpdate>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        let heartbeat = tokio::time::sleep(self.next_heartbeat());
        tokio::pin!(heartbeat);

        loop {
            tokio::select! {
                Some(update) = updates.recv() => self.on_sync_update(update),
                event = events.recv() => match event {
                    Some(Event::Shutdown) | None => break,
                    Some(event) => self.on_event(event).await,
                },
                () = &mut heartbeat => {
                    self.on_heartbeat().await;
                    let next = Instant::now() + self.next_heartbeat();
                    heartbeat.as_mut().reset(next);
                }
            }
        }
        info!("node stopped");
    }

    /// Heartbeat period with +/-10% jitter, so neighbors drift apart.
    fn next_heartbeat(&self) -> Duration {
        let factor: f64 = rand::rng().random_range(0.9..=1.1);
        self.config.heartbeat_interval().mul_f64(factor)
    }

    fn own(&self) -> &Name {
        &self.config.name
    }

    async fn on_event(&mut self, event: Event) {
        match event {
            Event::AdvertFetched {
                neighbor,
                seq,
                result,
            } => self.on_advert_fetched(neighbor, seq, result).await,
            Event::PrefixFetched {
                router,
                seq,
                result,
            } => self.on_prefix_fetched(router, seq, result).await,
            Event::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Event::Shutdown => {}
        }
    }

    fn on_sync_update(&mut self, update: SyncUpdate) {
        let SyncUpdate { group, router, seq } = update;
        if &router == self.own() {
            return;
        }

        if group == self.config.sync {
            self.on_prefix_update(router, seq);
        } else if group == advert_group(&router) && self.links.contains(&router) {
            self.on_advert_update(router, seq);
        } else {
            debug!(%group, %router, seq, "ignoring update from unrelated group");
        }
    }

    // ---- advertisements ----

    fn on_advert_update(&mut self, neighbor: Name, seq: u64) {
        let state = self.adverts.entry(neighbor.clone()).or_default();
        if let Some(seq) = state.notify(seq) {
            self.spawn_advert_fetch(neighbor, seq);
        }
    }

    fn spawn_advert_fetch(&self, neighbor: Name, seq: u64) {
        let transport = self.transport.clone();
        let events = self.events.clone();
        let name = advert_name(&neighbor, seq);
        let timeout = self.config.fetch_timeout();

        tokio::spawn(
            async move {
                let result = fetch_with_timeout(transport.as_ref(), &name, timeout)
                    .await
                    .and_then(|bytes| Advertisement::from_bytes(&bytes).map_err(FetchError::from));
                let _ = events.send(Event::AdvertFetched {
                    neighbor,
                    seq,
                    result,
                });
            }
            .in_current_span(),
        );
    }

    async fn on_advert_fetched(
        &mut self,
        neighbor: Name,
        seq: u64,
        result: Result<Advertisement, FetchError>,
    ) {
        let threshold = self.config.failure_threshold;
        let Some(link) = self.links.get_mut(&neighbor) else {
            error!(target: DEFECT, %neighbor, seq, "advertisement for unknown neighbor");
            return;
        };
        let state = self.adverts.entry(neighbor.clone()).or_default();

        let (changed, next) = match result {
            Ok(advert) => {
                link.note_success();
                let changed = link.set_advert(advert);
                debug!(%neighbor, seq, changed, "fetched advertisement");
                (changed, state.finish(seq))
            }
            Err(e) => {
                let failures = link.note_failure();
                match FailureOutcome::classify(failures, threshold) {
                    FailureOutcome::Retry => {
                        warn!(%neighbor, seq, failures, error = %e, "advertisement fetch failed");
                        (false, Some(state.retry(seq)))
                    }
                    FailureOutcome::GiveUp => {
                        error!(%neighbor, seq, failures, error = %e, "neighbor unreachable, giving up");
                        (link.clear_advert(), state.finish(seq))
                    }
                    FailureOutcome::Suppressed => {
                        debug!(%neighbor, seq, failures, error = %e, "advertisement fetch failed");
                        (false, state.finish(seq))
                    }
                }
            }
        };

        if changed {
            self.recompute().await;
        }
        if let Some(next) = next {
            self.spawn_advert_fetch(neighbor, next);
        }
    }

    /// Rebuild the RIB, republish the advertisement if it changed and push
    /// every changed RIB entry into the FIB.
    async fn recompute(&mut self) {
        let own = self.config.name.clone();
        let rib = Rib::compute(&own, [&own], &self.links);
        let advert = rib.advertisement(&self.links);
        let changes = self.rib.diff(&rib);
        self.rib = rib;

        // The advert also carries the face -> neighbor map, which changes
        // without the RIB changing when a face is assigned.
        if advert != self.advert {
            self.advert = advert;
            self.publish_advert().await;
        }

        for (router, entry) in changes {
            debug!(%router, reachable = entry.is_some(), "rib entry changed");
            self.fib
                .update_router(&self.prefixes, &router, entry.as_ref())
                .await;
        }
    }

    async fn publish_advert(&mut self) {
        self.advert_seq += 1;
        let own = self.config.name.clone();
        self.transport
            .produce(
                advert_name(&own, self.advert_seq),
                self.advert.to_bytes(),
                self.config.freshness(),
            )
            .await;
        self.sync.publish(&advert_group(&own), &own, self.advert_seq);
        info!(seq = self.advert_seq, entries = self.advert.entries.len(), "published advertisement");
    }

    // ---- prefix logs ----

    /// The own log is a single entry: a reset followed by an add for every
    /// configured prefix. Sequence numbers start at 1 on every start, so
    /// peers that already replayed entry 1 of an earlier run do not see it.
    async fn publish_own_prefixes(&mut self) {
        let own = self.config.name.clone();
        let list = PrefixOpList::snapshot(own.clone(), self.config.prefixes.iter());
        self.prefixes.apply(&list);

        self.prefix_seq = 1;
        self.transport
            .produce(
                prefix_ops_name(&own, self.prefix_seq),
                list.to_bytes(),
                self.config.freshness(),
            )
            .await;
        self.sync.publish(&self.config.sync, &own, self.prefix_seq);
        info!(prefixes = self.config.prefixes.len(), "published prefix log");
    }

    fn on_prefix_update(&mut self, router: Name, seq: u64) {
        let state = self.prefix_logs.entry(router.clone()).or_default();
        if state.notify(seq) {
            debug!(%router, seq, "prefix log advanced");
        }
        self.pump_prefix_log(&router);
    }

    /// Start fetching the next entry of `router`'s log if replay is behind.
    fn pump_prefix_log(&mut self, router: &Name) {
        let next = self
            .prefix_logs
            .get_mut(router)
            .and_then(PrefixSyncState::next_fetch);
        if let Some(seq) = next {
            self.spawn_prefix_fetch(router.clone(), seq);
        }
    }

    fn spawn_prefix_fetch(&self, router: Name, seq: u64) {
        let transport = self.transport.clone();
        let events = self.events.clone();
        let name = prefix_ops_name(&router, seq);
        let timeout = self.config.fetch_timeout();

        tokio::spawn(
            async move {
                let result = fetch_with_timeout(transport.as_ref(), &name, timeout)
                    .await
                    .and_then(|bytes| PrefixOpList::from_bytes(&bytes).map_err(FetchError::from))
                    .and_then(|list| {
                        if list.exit_router == router {
                            Ok(list)
                        } else {
                            Err(FetchError::WrongProducer {
                                expected: router.clone(),
                                found: list.exit_router,
                            })
                        }
                    });
                let _ = events.send(Event::PrefixFetched {
                    router,
                    seq,
                    result,
                });
            }
            .in_current_span(),
        );
    }

    async fn on_prefix_fetched(
        &mut self,
        router: Name,
        seq: u64,
        result: Result<PrefixOpList, FetchError>,
    ) {
        let threshold = self.config.failure_threshold;
        let Some(state) = self.prefix_logs.get_mut(&router) else {
            error!(target: DEFECT, %router, seq, "prefix log entry for unknown router");
            return;
        };

        match result {
            Ok(list) => {
                if !state.applied(seq) {
                    error!(
                        target: DEFECT,
                        %router,
                        seq,
                        processed = state.processed(),
                        "prefix log entry out of order"
                    );
                    return;
                }
                let changes = self.prefixes.apply(&list);
                debug!(%router, seq, changes = changes.len(), "replayed prefix log entry");
                for op in &changes {
                    self.fib.update_prefix(&self.rib, op, &router).await;
                }
                self.pump_prefix_log(&router);
            }
            Err(e) => match state.failed(threshold) {
                FailureOutcome::Retry => {
                    warn!(%router, seq, errors = state.errors(), error = %e, "prefix log fetch failed");
                    self.spawn_prefix_fetch(router, seq);
                }
                FailureOutcome::GiveUp => {
                    error!(%router, seq, error = %e, "prefix log fetch abandoned");
                }
                FailureOutcome::Suppressed => {
                    debug!(%router, seq, error = %e, "prefix log fetch failed");
                }
            },
        }
    }

    // ---- heartbeat ----

    async fn on_heartbeat(&mut self) {
        if self.create_faces().await {
            self.recompute().await;
        }

        let neighbors: Vec<Name> = self.links.all().map(|l| l.neighbor.clone()).collect();
        for neighbor in neighbors {
            let state = self.adverts.entry(neighbor.clone()).or_default();
            if let Some(seq) = state.heartbeat() {
                self.spawn_advert_fetch(neighbor, seq);
            }
        }

        let routers: Vec<Name> = self.prefix_logs.keys().cloned().collect();
        for router in &routers {
            self.pump_prefix_log(router);
        }

        self.fib.reconcile_all().await;

        let own = self.config.name.clone();
        self.sync.publish(&advert_group(&own), &own, self.advert_seq);
        self.sync.publish(&self.config.sync, &own, self.prefix_seq);
    }

    /// Create faces for links that have none yet. Returns true if any face
    /// was assigned.
    async fn create_faces(&mut self) -> bool {
        let mut assigned = false;
        for link in self.links.all_mut() {
            if link.face_id().is_some() {
                continue;
            }
            match self.control.create_link(&link.address).await {
                Ok(face) => {
                    if link.assign_face(face) {
                        info!(neighbor = %link.neighbor, face, "created face");
                        assigned = true;
                    }
                }
                Err(e) => {
                    warn!(neighbor = %link.neighbor, address = %link.address, error = %e, "cannot create face")
                }
            }
        }
        assigned
    }

    fn snapshot(&self) -> NodeSnapshot {
        let links = self
            .links
            .all()
            .map(|l| LinkStatus {
                neighbor: l.neighbor.clone(),
                address: l.address.clone(),
                face_id: l.face_id(),
                failures: l.failures(),
                has_advert: l.advert().is_some(),
                advert_seq: self.adverts.get(&l.neighbor).and_then(AdvertSyncState::last_seq),
            })
            .collect();

        NodeSnapshot {
            router: self.config.name.clone(),
            advert_seq: self.advert_seq,
            prefix_seq: self.prefix_seq,
            rib: self.rib.clone(),
            fib: self.fib.entries().clone(),
            prefixes: self.prefixes.clone(),
            links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{MemoryControl, MemoryNetwork};
    use crate::message::{AdvEntry, PrefixOp};
    use crate::rib::LOCAL_FACE;
    use tracing_test::traced_test;

    fn n(s: &str) -> Name {
        s.parse().unwrap()
    }

    async fn start(net: &MemoryNetwork, config: DvConfig) -> (NodeHandle, Arc<MemoryControl>) {
        let ctl = Arc::new(MemoryControl::new());
        let ep = Arc::new(net.endpoint(config.name.clone()));
        let handle = DvNode::start(config, ep.clone(), ep, ctl.clone())
            .await
            .unwrap();
        (handle, ctl)
    }

    fn face_to(snap: &NodeSnapshot, neighbor: &str) -> u64 {
        snap.links
            .iter()
            .find(|l| l.neighbor == n(neighbor))
            .and_then(|l| l.face_id)
            .unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn lone_router_knows_itself() {
        let net = MemoryNetwork::new();
        let cfg = DvConfig::new(n("/a")).with_prefix(n("/app/a"));
        let (a, ctl) = start(&net, cfg).await;
        settle().await;

        let snap = a.snapshot().await.unwrap();
        assert_eq!(snap.advert_seq, 1);
        assert_eq!(snap.prefix_seq, 1);
        assert_eq!(snap.rib.len(), 1);
        assert_eq!(snap.rib.get(&n("/a")).unwrap().best(), Some((LOCAL_FACE, 0)));
        assert!(snap.prefixes.is_owned_by(&n("/app/a"), &n("/a")));
        // own prefixes are served locally, not routed
        assert!(snap.fib.is_empty());
        assert_eq!(ctl.calls(), 0);

        a.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn two_routers_exchange_routes_and_prefixes() {
        let net = MemoryNetwork::new();
        let (a, ctl_a) = start(&net, DvConfig::new(n("/a")).with_link(n("/b"), "10.0.0.2")).await;
        let (b, _ctl_b) = start(
            &net,
            DvConfig::new(n("/b"))
                .with_link(n("/a"), "10.0.0.1")
                .with_prefix(n("/app/b")),
        )
        .await;
        settle().await;

        let snap = a.snapshot().await.unwrap();
        let face = face_to(&snap, "/b");
        assert_eq!(snap.rib.get(&n("/b")).unwrap().best(), Some((face, 1)));
        assert!(snap.prefixes.is_owned_by(&n("/app/b"), &n("/b")));
        assert_eq!(snap.fib.get(&n("/app/b")), Some(&BTreeMap::from([(face, 1)])));
        assert_eq!(ctl_a.route(&n("/app/b"), face), Some(1));

        let snap_b = b.snapshot().await.unwrap();
        assert!(snap_b.rib.get(&n("/a")).is_some());
        assert!(snap_b.fib.is_empty());

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn configured_face_is_used_as_is() {
        let net = MemoryNetwork::new();
        let (a, ctl) = start(&net, DvConfig::new(n("/a")).with_face(n("/b"), "10.0.0.2", 900)).await;
        let (_b, _) = start(&net, DvConfig::new(n("/b")).with_link(n("/a"), "10.0.0.1")).await;
        settle().await;

        let snap = a.snapshot().await.unwrap();
        assert_eq!(face_to(&snap, "/b"), 900);
        assert_eq!(snap.rib.get(&n("/b")).unwrap().best(), Some((900, 1)));
        assert_eq!(ctl.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn face_creation_is_retried_on_heartbeat() {
        let net = MemoryNetwork::new();
        let ctl = Arc::new(MemoryControl::new());
        ctl.set_unreachable("10.0.0.2", true);
        let ep = Arc::new(net.endpoint(n("/a")));
        let a = DvNode::start(
            DvConfig::new(n("/a")).with_link(n("/b"), "10.0.0.2"),
            ep.clone(),
            ep,
            ctl.clone(),
        )
        .await
        .unwrap();

        let snap = a.snapshot().await.unwrap();
        assert_eq!(snap.links[0].face_id, None);

        ctl.set_unreachable("10.0.0.2", false);
        settle().await;
        let snap = a.snapshot().await.unwrap();
        assert!(snap.links[0].face_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn unreachable_neighbor_is_dropped_and_logged_once() {
        let net = MemoryNetwork::new();
        let (a, ctl_a) = start(&net, DvConfig::new(n("/a")).with_link(n("/b"), "10.0.0.2")).await;
        let (_b, _) = start(
            &net,
            DvConfig::new(n("/b"))
                .with_link(n("/a"), "10.0.0.1")
                .with_prefix(n("/app/b")),
        )
        .await;
        settle().await;
        assert!(!ctl_a.routes().is_empty());

        net.set_link_up(&n("/a"), &n("/b"), false);
        // several heartbeats past the threshold
        tokio::time::sleep(Duration::from_secs(60)).await;

        let snap = a.snapshot().await.unwrap();
        assert!(snap.rib.get(&n("/b")).is_none());
        assert!(snap.fib.is_empty());
        assert!(ctl_a.routes().is_empty());
        assert!(!snap.links[0].has_advert);
        // ownership is independent of reachability
        assert!(snap.prefixes.is_owned_by(&n("/app/b"), &n("/b")));

        // one give-up per side, later failures stay quiet
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("giving up")).count() {
                2 => Ok(()),
                c => Err(format!("expected 2 give-up lines, got {c}")),
            }
        });

        net.set_link_up(&n("/a"), &n("/b"), true);
        settle().await;
        let snap = a.snapshot().await.unwrap();
        let face = face_to(&snap, "/b");
        assert_eq!(ctl_a.route(&n("/app/b"), face), Some(1));
        assert_eq!(snap.links[0].failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_is_refused() {
        let net = MemoryNetwork::new();
        let ctl = Arc::new(MemoryControl::new());
        let ep = Arc::new(net.endpoint(n("/a")));
        let res = DvNode::start(
            DvConfig::new(n("/a")).with_link(n("/a"), "10.0.0.1"),
            ep.clone(),
            ep,
            ctl,
        )
        .await;
        assert!(matches!(res, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn missing_prefix_log_entry_is_abandoned_once() {
        let net = MemoryNetwork::new();
        let (a, _ctl) = start(&net, DvConfig::new(n("/a"))).await;

        // /x announces an entry it has not produced yet
        let x = net.endpoint(n("/x"));
        x.publish(&n("/dv/sync"), &n("/x"), 1);
        tokio::time::sleep(Duration::from_secs(60)).await;

        let snap = a.snapshot().await.unwrap();
        assert_eq!(snap.prefixes.prefixes_of(&n("/x")).count(), 0);
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|l| l.contains("prefix log fetch abandoned"))
                .count()
            {
                1 => Ok(()),
                c => Err(format!("expected 1 abandon line, got {c}")),
            }
        });

        // the entry shows up and the next heartbeat replays it
        let list = PrefixOpList::snapshot(n("/x"), [&n("/app/x")]);
        x.produce(prefix_ops_name(&n("/x"), 1), list.to_bytes(), Duration::from_secs(1))
            .await;
        settle().await;
        let snap = a.snapshot().await.unwrap();
        assert!(snap.prefixes.is_owned_by(&n("/app/x"), &n("/x")));
    }

    type Replayed = (
        PrefixTable,
        BTreeMap<Name, BTreeMap<u64, u64>>,
        BTreeMap<(Name, u64), u64>,
    );

    /// `/a` with one neighbor `/b` that reaches `/x` in one hop. `/x` has a
    /// three-entry prefix log whose notifications arrive in `order`.
    async fn replay_prefix_log(order: &[u64]) -> Replayed {
        let net = MemoryNetwork::new();
        let (a, ctl) = start(&net, DvConfig::new(n("/a")).with_link(n("/b"), "10.0.0.2")).await;

        let b = net.endpoint(n("/b"));
        let mut adv = Advertisement::new();
        let own = AdvEntry {
            nexthop: 0,
            cost: 0,
            other: None,
        };
        adv.entries.insert(n("/b"), own);
        adv.entries.insert(
            n("/x"),
            AdvEntry {
                nexthop: 7,
                cost: 1,
                other: None,
            },
        );
        b.produce(advert_name(&n("/b"), 1), adv.to_bytes(), Duration::from_secs(1))
            .await;
        b.publish(&advert_group(&n("/b")), &n("/b"), 1);
        settle().await;

        let x = net.endpoint(n("/x"));
        let log = [
            vec![PrefixOp::Add(n("/p")), PrefixOp::Add(n("/q"))],
            vec![PrefixOp::Remove(n("/p"))],
            vec![PrefixOp::Add(n("/r")), PrefixOp::Remove(n("/q"))],
        ];
        for (seq, ops) in (1u64..).zip(log) {
            let list = PrefixOpList {
                exit_router: n("/x"),
                reset: false,
                ops,
            };
            x.produce(prefix_ops_name(&n("/x"), seq), list.to_bytes(), Duration::from_secs(1))
                .await;
        }
        for seq in order {
            x.publish(&n("/dv/sync"), &n("/x"), *seq);
            tokio::task::yield_now().await;
        }
        settle().await;

        let snap = a.snapshot().await.unwrap();
        (snap.prefixes, snap.fib, ctl.routes())
    }

    #[tokio::test(start_paused = true)]
    async fn prefix_log_replay_ignores_arrival_order() {
        let (prefixes, fib, routes) = replay_prefix_log(&[1, 2, 3]).await;

        let x = n("/x");
        assert!(prefixes.is_owned_by(&n("/r"), &x));
        assert!(!prefixes.is_owned_by(&n("/p"), &x));
        assert!(!prefixes.is_owned_by(&n("/q"), &x));
        assert_eq!(fib, BTreeMap::from([(n("/r"), BTreeMap::from([(256, 2)]))]));
        assert_eq!(routes, BTreeMap::from([((n("/r"), 256), 2)]));

        let shuffled = replay_prefix_log(&[3, 1, 2]).await;
        assert_eq!(shuffled, (prefixes, fib, routes));
    }
}
