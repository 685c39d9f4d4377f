// src/link.rs
//! Per-neighbor link state.
//!
//! One [`Link`] exists per configured neighbor for the lifetime of the
//! process. It records:
//! - the neighbor's address and the local face id created towards it
//! - the last advertisement successfully fetched from the neighbor
//! - a consecutive fetch failure counter
//!
//! The table is only mutated by the node's event loop.

use std::collections::BTreeMap;

use crate::message::Advertisement;
use crate::name::Name;

#[derive(Debug, Clone)]
pub struct Link {
    pub neighbor: Name,
    /// Transport address of the neighbor (e.g. an IPv4 address).
    pub address: String,
    face_id: Option<u64>,
    advert: Option<Advertisement>,
    failures: u32,
}

impl Link {
    pub fn new(neighbor: Name, address: impl Into<String>) -> Self {
        Link {
            neighbor,
            address: address.into(),
            face_id: None,
            advert: None,
            failures: 0,
        }
    }

    pub fn face_id(&self) -> Option<u64> {
        self.face_id
    }

    /// Assign the local face id. Once set it never changes; a second
    /// assignment is refused and returns false.
    pub fn assign_face(&mut self, face_id: u64) -> bool {
        match self.face_id {
            None => {
                self.face_id = Some(face_id);
                true
            }
            Some(existing) => existing == face_id,
        }
    }

    pub fn advert(&self) -> Option<&Advertisement> {
        self.advert.as_ref()
    }

    /// Store a freshly fetched advertisement. Returns true if its content
    /// differs from the stored one.
    pub fn set_advert(&mut self, advert: Advertisement) -> bool {
        if self.advert.as_ref() == Some(&advert) {
            return false;
        }
        self.advert = Some(advert);
        true
    }

    /// Forget the stored advertisement. Returns true if there was one.
    pub fn clear_advert(&mut self) -> bool {
        self.advert.take().is_some()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn note_success(&mut self) {
        self.failures = 0;
    }

    /// Count a failed fetch and return the new consecutive failure count.
    pub fn note_failure(&mut self) -> u32 {
        self.failures = self.failures.saturating_add(1);
        self.failures
    }
}

/// Table of all configured links, keyed by neighbor name.
#[derive(Debug, Default, Clone)]
pub struct LinkTable {
    links: BTreeMap<Name, Link>,
}

impl LinkTable {
    pub fn new() -> Self {
        LinkTable {
            links: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, link: Link) {
        self.links.insert(link.neighbor.clone(), link);
    }

    pub fn all(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Link> {
        self.links.values_mut()
    }

    pub fn get(&self, neighbor: &Name) -> Option<&Link> {
        self.links.get(neighbor)
    }

    pub fn get_mut(&mut self, neighbor: &Name) -> Option<&mut Link> {
        self.links.get_mut(neighbor)
    }

    pub fn contains(&self, neighbor: &Name) -> bool {
        self.links.contains_key(neighbor)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Face id -> neighbor, for every link that has a face.
    pub fn nexthops(&self) -> BTreeMap<u64, Name> {
        self.links
            .values()
            .filter_map(|l| l.face_id.map(|f| (f, l.neighbor.clone())))
            .collect()
    }
}
