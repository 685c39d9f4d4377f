// src/prefix.rs
//! Prefix ownership table.
//!
//! Maps each name prefix to the set of routers that currently claim it.
//! The table only changes by replaying [`PrefixOpList`]s in log order; see
//! [`crate::sync::PrefixSyncState`] for the ordering bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use crate::message::{PrefixOp, PrefixOpList};
use crate::name::Name;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixTable {
    owners: BTreeMap<Name, BTreeSet<Name>>,
}

impl PrefixTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owners(&self, prefix: &Name) -> Option<&BTreeSet<Name>> {
        self.owners.get(prefix)
    }

    pub fn is_owned_by(&self, prefix: &Name, router: &Name) -> bool {
        self.owners.get(prefix).is_some_and(|o| o.contains(router))
    }

    /// All prefixes currently claimed by `router`.
    pub fn prefixes_of<'a>(&'a self, router: &'a Name) -> impl Iterator<Item = &'a Name> + 'a {
        self.owners
            .iter()
            .filter(move |(_, o)| o.contains(router))
            .map(|(p, _)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &BTreeSet<Name>)> {
        self.owners.iter()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Replay one log entry attributed to `list.exit_router`.
    ///
    /// Returns the membership changes that actually took effect, in order.
    /// A reset is reported as a `Remove` for every prefix the router held.
    pub fn apply(&mut self, list: &PrefixOpList) -> Vec<PrefixOp> {
        let router = &list.exit_router;
        let mut changes = Vec::new();

        if list.reset {
            changes.extend(self.reset(router).into_iter().map(PrefixOp::Remove));
        }

        for op in &list.ops {
            let changed = match op {
                PrefixOp::Add(p) => self.add(p, router),
                PrefixOp::Remove(p) => self.remove(p, router),
            };
            if changed {
                changes.push(op.clone());
            }
        }
        changes
    }

    /// Drop `router` from every owner set. Prefix keys are kept, even when
    /// their owner set becomes empty.
    pub fn reset(&mut self, router: &Name) -> Vec<Name> {
        let mut removed = Vec::new();
        for (prefix, owners) in self.owners.iter_mut() {
            if owners.remove(router) {
                removed.push(prefix.clone());
            }
        }
        removed
    }

    pub fn add(&mut self, prefix: &Name, router: &Name) -> bool {
        self.owners
            .entry(prefix.clone())
            .or_default()
            .insert(router.clone())
    }

    /// Removing an unknown prefix or a non-owner is a no-op.
    pub fn remove(&mut self, prefix: &Name, router: &Name) -> bool {
        self.owners
            .get_mut(prefix)
            .is_some_and(|o| o.remove(router))
    }
}
