// src/mem.rs
//! In-process implementations of the network boundaries.
//!
//! [`MemoryNetwork`] is a shared content store plus sync groups. Every router
//! gets a [`MemoryEndpoint`] from it. Any two routers can exchange data
//! unless the pair has been marked down with [`MemoryNetwork::set_link_up`].
//! All published versions stay in the store.
//!
//! [`MemoryControl`] stands in for the forwarder: it hands out face ids and
//! records the routes it was told to install.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::control::{ControlError, ForwardingControl};
use crate::name::Name;
use crate::transport::{FetchError, SyncGroup, SyncUpdate, Transport};

#[derive(Debug, Default)]
struct NetState {
    /// name -> (producer, content)
    store: HashMap<Name, (Name, Vec<u8>)>,
    groups: HashMap<Name, Vec<(Name, mpsc::UnboundedSender<SyncUpdate>)>>,
    down: HashSet<(Name, Name)>,
}

impl NetState {
    fn is_down(&self, a: &Name, b: &Name) -> bool {
        self.down.contains(&pair(a, b))
    }
}

fn pair(a: &Name, b: &Name) -> (Name, Name) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// The view of the network from `router`.
    pub fn endpoint(&self, router: Name) -> MemoryEndpoint {
        MemoryEndpoint {
            router,
            net: self.clone(),
        }
    }

    /// Break or repair connectivity between `a` and `b`.
    pub fn set_link_up(&self, a: &Name, b: &Name, up: bool) {
        let mut st = self.lock();
        if up {
            st.down.remove(&pair(a, b));
        } else {
            st.down.insert(pair(a, b));
        }
    }

    fn lock(&self) -> MutexGuard<'_, NetState> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One router's attachment to a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryEndpoint {
    router: Name,
    net: MemoryNetwork,
}

#[async_trait]
impl Transport for MemoryEndpoint {
    async fn fetch(&self, name: &Name) -> Result<Vec<u8>, FetchError> {
        tokio::task::yield_now().await;
        let st = self.net.lock();
        let (producer, content) = st
            .store
            .get(name)
            .ok_or_else(|| FetchError::NotFound(name.clone()))?;
        if st.is_down(&self.router, producer) {
            return Err(FetchError::Unreachable(name.clone()));
        }
        Ok(content.clone())
    }

    async fn produce(&self, name: Name, content: Vec<u8>, _freshness: Duration) {
        trace!(router = %self.router, %name, len = content.len(), "produce");
        self.net
            .lock()
            .store
            .insert(name, (self.router.clone(), content));
    }
}

impl SyncGroup for MemoryEndpoint {
    fn join(&self, group: &Name, updates: mpsc::UnboundedSender<SyncUpdate>) {
        self.net
            .lock()
            .groups
            .entry(group.clone())
            .or_default()
            .push((self.router.clone(), updates));
    }

    fn publish(&self, group: &Name, router: &Name, seq: u64) {
        let st = self.net.lock();
        let Some(members) = st.groups.get(group) else {
            return;
        };
        for (member, tx) in members {
            if member == &self.router || st.is_down(&self.router, member) {
                continue;
            }
            // A stopped member has dropped its receiver.
            let _ = tx.send(SyncUpdate {
                group: group.clone(),
                router: router.clone(),
                seq,
            });
        }
    }
}

/// Recording forwarder.
#[derive(Debug)]
pub struct MemoryControl {
    next_face: AtomicU64,
    calls: AtomicU32,
    failures: AtomicU32,
    routes: Mutex<BTreeMap<(Name, u64), u64>>,
    unreachable: Mutex<HashSet<String>>,
}

impl Default for MemoryControl {
    fn default() -> Self {
        MemoryControl {
            next_face: AtomicU64::new(256),
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            routes: Mutex::new(BTreeMap::new()),
            unreachable: Mutex::new(HashSet::new()),
        }
    }
}

impl MemoryControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls fail.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Make `create_link` fail for `address`.
    pub fn set_unreachable(&self, address: &str, unreachable: bool) {
        let mut set = self.unreachable.lock().unwrap_or_else(|e| e.into_inner());
        if unreachable {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    /// Number of calls received, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn route(&self, prefix: &Name, face: u64) -> Option<u64> {
        self.routes().get(&(prefix.clone(), face)).copied()
    }

    pub fn routes(&self) -> BTreeMap<(Name, u64), u64> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn begin_call(&self) -> Result<(), ControlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(ControlError::CommandFailed {
                command: "memory".into(),
                stderr: "injected failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ForwardingControl for MemoryControl {
    async fn create_link(&self, address: &str) -> Result<u64, ControlError> {
        self.begin_call()?;
        let unreachable = self
            .unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(address);
        if unreachable {
            return Err(ControlError::Unreachable(address.to_string()));
        }
        Ok(self.next_face.fetch_add(1, Ordering::SeqCst))
    }

    async fn install_route(&self, prefix: &Name, face: u64, cost: u64) -> Result<(), ControlError> {
        self.begin_call()?;
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((prefix.clone(), face), cost);
        Ok(())
    }

    async fn withdraw_route(&self, prefix: &Name, face: u64) -> Result<(), ControlError> {
        self.begin_call()?;
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(prefix.clone(), face));
        Ok(())
    }
}
