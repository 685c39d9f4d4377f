// src/fib.rs
//! Forwarding table mirror and reconciliation.
//!
//! The FIB is the join of the RIB (router -> faces) and the prefix table
//! (prefix -> routers). For every prefix this module keeps what each owning
//! router contributes, derives the wanted `face -> cost` set (lowest cost per
//! face over all owners), and diffs it against what it believes is installed
//! in the forwarder. Only the difference is sent to the control plane.
//!
//! The mirror is updated per call and only on success. A failed install or
//! withdraw leaves a difference behind, which the next reconciliation of
//! that prefix (or [`Fib::reconcile_all`]) tries again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{error, info};

use crate::control::ForwardingControl;
use crate::message::PrefixOp;
use crate::name::Name;
use crate::prefix::PrefixTable;
use crate::rib::{INFINITY, LOCAL_FACE, Rib, RibEntry};

type Hops = BTreeMap<u64, u64>;

pub struct Fib {
    control: Arc<dyn ForwardingControl>,
    /// prefix -> face -> cost, as installed in the forwarder.
    installed: BTreeMap<Name, Hops>,
    /// prefix -> owning router -> face -> cost.
    wanted: BTreeMap<Name, BTreeMap<Name, Hops>>,
}

impl Fib {
    pub fn new(control: Arc<dyn ForwardingControl>) -> Self {
        Fib {
            control,
            installed: BTreeMap::new(),
            wanted: BTreeMap::new(),
        }
    }

    /// The mirror of the forwarder's table.
    pub fn entries(&self) -> &BTreeMap<Name, Hops> {
        &self.installed
    }

    pub fn get(&self, prefix: &Name) -> Option<&Hops> {
        self.installed.get(prefix)
    }

    /// The RIB entry of `router` changed; `None` means the router is no
    /// longer reachable. Every prefix the router owns is reconciled.
    pub async fn update_router(
        &mut self,
        prefixes: &PrefixTable,
        router: &Name,
        entry: Option<&RibEntry>,
    ) {
        let owned: Vec<Name> = prefixes.prefixes_of(router).cloned().collect();
        for prefix in owned {
            self.set_contribution(&prefix, router, entry);
            self.reconcile(&prefix).await;
        }
    }

    /// `router` gained or lost ownership of a prefix.
    pub async fn update_prefix(&mut self, rib: &Rib, op: &PrefixOp, router: &Name) {
        let prefix = op.prefix();
        match op {
            PrefixOp::Add(_) => self.set_contribution(prefix, router, rib.get(router)),
            PrefixOp::Remove(_) => self.set_contribution(prefix, router, None),
        }
        self.reconcile(prefix).await;
    }

    /// Reconcile every prefix whose mirror differs from what is wanted.
    pub async fn reconcile_all(&mut self) {
        let prefixes: BTreeSet<Name> = self
            .installed
            .keys()
            .chain(self.wanted.keys())
            .filter(|p| self.installed.get(*p) != self.desired(p).as_ref())
            .cloned()
            .collect();
        for prefix in prefixes {
            self.reconcile(&prefix).await;
        }
    }

    fn set_contribution(&mut self, prefix: &Name, router: &Name, entry: Option<&RibEntry>) {
        let hops: Hops = entry
            .map(|e| {
                e.costs()
                    .iter()
                    .filter(|(face, cost)| **face != LOCAL_FACE && **cost < INFINITY)
                    .map(|(f, c)| (*f, *c))
                    .collect()
            })
            .unwrap_or_default();

        if hops.is_empty() {
            if let Some(owners) = self.wanted.get_mut(prefix) {
                owners.remove(router);
                if owners.is_empty() {
                    self.wanted.remove(prefix);
                }
            }
        } else {
            self.wanted
                .entry(prefix.clone())
                .or_default()
                .insert(router.clone(), hops);
        }
    }

    /// Lowest cost per face over all owners, `None` when nothing is wanted.
    fn desired(&self, prefix: &Name) -> Option<Hops> {
        let owners = self.wanted.get(prefix)?;
        let mut hops = Hops::new();
        for (face, cost) in owners.values().flatten() {
            hops.entry(*face)
                .and_modify(|c| *c = (*c).min(*cost))
                .or_insert(*cost);
        }
        Some(hops)
    }

    async fn reconcile(&mut self, prefix: &Name) {
        let desired = self.desired(prefix).unwrap_or_default();
        let current = self.installed.get(prefix).cloned().unwrap_or_default();

        for face in current.keys().filter(|f| !desired.contains_key(*f)) {
            match self.control.withdraw_route(prefix, *face).await {
                Ok(()) => {
                    info!(%prefix, face, "withdrew route");
                    if let Some(hops) = self.installed.get_mut(prefix) {
                        hops.remove(face);
                    }
                }
                Err(e) => error!(%prefix, face, error = %e, "failed to withdraw route"),
            }
        }

        for (face, cost) in &desired {
            if current.get(face) == Some(cost) {
                continue;
            }
            match self.control.install_route(prefix, *face, *cost).await {
                Ok(()) => {
                    info!(%prefix, face, cost, "installed route");
                    self.installed
                        .entry(prefix.clone())
                        .or_default()
                        .insert(*face, *cost);
                }
                Err(e) => error!(%prefix, face, cost, error = %e, "failed to install route"),
            }
        }

        if self.installed.get(prefix).is_some_and(BTreeMap::is_empty) {
            self.installed.remove(prefix);
        }
    }
}
