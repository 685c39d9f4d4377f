// src/rib.rs
//! Routing information base and the distance-vector computation.
//!
//! The RIB maps a destination router to the cost of reaching it through
//! each local face. Face 0 stands for the router itself. The RIB is rebuilt
//! from scratch on every recomputation:
//! - own destinations are seeded at cost 0 on face 0
//! - every neighbor advertisement contributes `cost + 1` on that link's face
//! - routes the neighbor reaches through us are poisoned, unless the
//!   neighbor also reports a second-best cost, which is used instead
//! - anything at or beyond [`INFINITY`] is dropped

use std::collections::{BTreeMap, BTreeSet};

use crate::link::LinkTable;
use crate::message::{AdvEntry, Advertisement};
use crate::name::Name;

/// Cost at which a destination is considered unreachable.
pub const INFINITY: u64 = 16;

/// Face id used for routes that terminate at this router.
pub const LOCAL_FACE: u64 = 0;

/// Per-face costs towards one destination. All costs are below [`INFINITY`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RibEntry {
    costs: BTreeMap<u64, u64>,
}

impl RibEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `cost` on `face`, keeping the lower cost if the face is
    /// already present. Costs at or beyond infinity are ignored.
    pub fn offer(&mut self, face: u64, cost: u64) {
        if cost >= INFINITY {
            return;
        }
        self.costs
            .entry(face)
            .and_modify(|c| *c = (*c).min(cost))
            .or_insert(cost);
    }

    pub fn costs(&self) -> &BTreeMap<u64, u64> {
        &self.costs
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    pub fn is_local(&self) -> bool {
        self.costs.contains_key(&LOCAL_FACE)
    }

    /// Lowest-cost `(face, cost)`. Ties go to the lower face id.
    pub fn best(&self) -> Option<(u64, u64)> {
        self.costs
            .iter()
            .min_by_key(|(face, cost)| (**cost, **face))
            .map(|(f, c)| (*f, *c))
    }

    /// Lowest cost through any face other than the best one.
    pub fn second_best(&self) -> Option<u64> {
        let (best_face, _) = self.best()?;
        self.costs
            .iter()
            .filter(|(f, _)| **f != best_face)
            .map(|(_, c)| *c)
            .min()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rib {
    entries: BTreeMap<Name, RibEntry>,
}

impl Rib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute a fresh RIB from this router's own destinations and the
    /// advertisements currently stored in `links`.
    pub fn compute<'a, I>(own_router: &Name, own: I, links: &LinkTable) -> Rib
    where
        I: IntoIterator<Item = &'a Name>,
    {
        let mut rib = Rib::new();
        for dest in own {
            rib.entries
                .entry(dest.clone())
                .or_default()
                .offer(LOCAL_FACE, 0);
        }

        for link in links.all() {
            let (Some(face), Some(advert)) = (link.face_id(), link.advert()) else {
                continue;
            };

            for (dest, entry) in &advert.entries {
                // Own destinations are reached locally.
                if rib.entries.get(dest).is_some_and(RibEntry::is_local) {
                    continue;
                }

                let cost = if advert.routes_via(dest, own_router) {
                    // Poison reverse: the neighbor's best path is through us.
                    match entry.other {
                        Some(other) => other.saturating_add(1),
                        None => continue,
                    }
                } else {
                    entry.cost.saturating_add(1)
                };

                if cost >= INFINITY {
                    continue;
                }
                rib.entries.entry(dest.clone()).or_default().offer(face, cost);
            }
        }

        rib
    }

    pub fn get(&self, dest: &Name) -> Option<&RibEntry> {
        self.entries.get(dest)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &RibEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the advertisement this router publishes for its neighbors.
    pub fn advertisement(&self, links: &LinkTable) -> Advertisement {
        let mut adv = Advertisement::new();
        adv.nexthops = links.nexthops();
        for (dest, entry) in &self.entries {
            if let Some((nexthop, cost)) = entry.best() {
                adv.entries.insert(
                    dest.clone(),
                    AdvEntry {
                        nexthop,
                        cost,
                        other: entry.second_best(),
                    },
                );
            }
        }
        adv
    }

    /// Destinations whose entry differs between `self` (old) and `new`,
    /// paired with the new entry (`None` when the destination vanished).
    pub fn diff(&self, new: &Rib) -> Vec<(Name, Option<RibEntry>)> {
        let dests: BTreeSet<&Name> = self.entries.keys().chain(new.entries.keys()).collect();
        dests
            .into_iter()
            .filter(|d| self.entries.get(*d) != new.entries.get(*d))
            .map(|d| (d.clone(), new.entries.get(d).cloned()))
            .collect()
    }
}
