// src/message.rs
//! The two DV messages exchanged between routers.
//!
//! - [`Advertisement`]: a router's own links and its best cost per destination.
//! - [`PrefixOpList`]: one numbered entry of a router's prefix ownership log.
//!
//! Both are plain TLV trees (see [`crate::tlv`]). Maps are `BTreeMap`s so the
//! encoding of a given value is always byte-identical.

use std::collections::BTreeMap;

use crate::name::Name;
use crate::tlv::{self, DecodeError, Tlv};

/// Routing entry for one destination inside an [`Advertisement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvEntry {
    /// Face id of the advertising router's best next hop (0 = itself).
    pub nexthop: u64,
    /// Best cost.
    pub cost: u64,
    /// Best cost through any other face, if one exists.
    pub other: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Advertisement {
    /// The advertising router's links: face id -> neighbor router.
    pub nexthops: BTreeMap<u64, Name>,
    /// Destination router -> best route.
    pub entries: BTreeMap<Name, AdvEntry>,
}

impl Advertisement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the advertiser's best route to `dest` goes through `router`.
    pub fn routes_via(&self, dest: &Name, router: &Name) -> bool {
        self.entries
            .get(dest)
            .and_then(|e| self.nexthops.get(&e.nexthop))
            .is_some_and(|n| n == router)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut children = Vec::with_capacity(self.nexthops.len() + self.entries.len());
        for (face, neighbor) in &self.nexthops {
            children.push(Tlv::nested(
                tlv::ADV_LINK,
                &[
                    Tlv::nonneg(tlv::INTERFACE_ID, *face),
                    Tlv::wrapped_name(tlv::NEIGHBOR, neighbor),
                ],
            ));
        }
        for (dest, e) in &self.entries {
            let mut fields = vec![
                Tlv::wrapped_name(tlv::DESTINATION, dest),
                Tlv::nonneg(tlv::NEXT_HOP, e.nexthop),
                Tlv::nonneg(tlv::COST, e.cost),
            ];
            if let Some(other) = e.other {
                fields.push(Tlv::nonneg(tlv::OTHER_COST, other));
            }
            children.push(Tlv::nested(tlv::ADV_ENTRY, &fields));
        }
        Tlv::nested(tlv::ADVERTISEMENT, &children).to_bytes()
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        let outer = Tlv::parse_exact(buf, tlv::ADVERTISEMENT)?;
        let mut adv = Advertisement::new();

        for child in outer.children()? {
            match child.tlv_type {
                tlv::ADV_LINK => {
                    let (face, neighbor) = parse_link(&child)?;
                    if adv.nexthops.insert(face, neighbor).is_some() {
                        return Err(DecodeError::DuplicateField("interface id"));
                    }
                }
                tlv::ADV_ENTRY => {
                    let (dest, entry) = parse_entry(&child)?;
                    if adv.entries.insert(dest, entry).is_some() {
                        return Err(DecodeError::DuplicateField("destination"));
                    }
                }
                other => return Err(DecodeError::UnknownType(other)),
            }
        }
        Ok(adv)
    }
}

fn parse_link(link: &Tlv) -> Result<(u64, Name), DecodeError> {
    let mut face = None;
    let mut neighbor = None;
    for f in link.children()? {
        match f.tlv_type {
            tlv::INTERFACE_ID => set_once(&mut face, f.as_nonneg()?, "interface id")?,
            tlv::NEIGHBOR => set_once(&mut neighbor, f.as_wrapped_name()?, "neighbor")?,
            other => return Err(DecodeError::UnknownType(other)),
        }
    }
    Ok((
        face.ok_or(DecodeError::MissingField("interface id"))?,
        neighbor.ok_or(DecodeError::MissingField("neighbor"))?,
    ))
}

fn parse_entry(entry: &Tlv) -> Result<(Name, AdvEntry), DecodeError> {
    let mut dest = None;
    let mut nexthop = None;
    let mut cost = None;
    let mut other = None;
    for f in entry.children()? {
        match f.tlv_type {
            tlv::DESTINATION => set_once(&mut dest, f.as_wrapped_name()?, "destination")?,
            tlv::NEXT_HOP => set_once(&mut nexthop, f.as_nonneg()?, "next hop")?,
            tlv::COST => set_once(&mut cost, f.as_nonneg()?, "cost")?,
            tlv::OTHER_COST => set_once(&mut other, f.as_nonneg()?, "other cost")?,
            t => return Err(DecodeError::UnknownType(t)),
        }
    }
    let entry = AdvEntry {
        nexthop: nexthop.ok_or(DecodeError::MissingField("next hop"))?,
        cost: cost.ok_or(DecodeError::MissingField("cost"))?,
        other,
    };
    Ok((dest.ok_or(DecodeError::MissingField("destination"))?, entry))
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), DecodeError> {
    if slot.replace(value).is_some() {
        return Err(DecodeError::DuplicateField(field));
    }
    Ok(())
}

/// A single ownership change carried in a [`PrefixOpList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixOp {
    Add(Name),
    Remove(Name),
}

impl PrefixOp {
    pub fn prefix(&self) -> &Name {
        match self {
            PrefixOp::Add(p) | PrefixOp::Remove(p) => p,
        }
    }
}

/// One entry of a router's prefix ownership log.
///
/// When `reset` is set it is applied before `ops`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixOpList {
    pub exit_router: Name,
    pub reset: bool,
    pub ops: Vec<PrefixOp>,
}

impl PrefixOpList {
    pub fn new(exit_router: Name) -> Self {
        PrefixOpList {
            exit_router,
            reset: false,
            ops: Vec::new(),
        }
    }

    /// A reset followed by an add for every prefix in `prefixes`; a router
    /// publishes this as the first entry of its log.
    pub fn snapshot<'a, I>(exit_router: Name, prefixes: I) -> Self
    where
        I: IntoIterator<Item = &'a Name>,
    {
        PrefixOpList {
            exit_router,
            reset: true,
            ops: prefixes.into_iter().cloned().map(PrefixOp::Add).collect(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut children = vec![Tlv::wrapped_name(tlv::EXIT_ROUTER, &self.exit_router)];
        if self.reset {
            children.push(Tlv::empty(tlv::PREFIX_OP_RESET));
        }
        for op in &self.ops {
            children.push(match op {
                PrefixOp::Add(p) => Tlv::wrapped_name(tlv::PREFIX_OP_ADD, p),
                PrefixOp::Remove(p) => Tlv::wrapped_name(tlv::PREFIX_OP_REMOVE, p),
            });
        }
        Tlv::nested(tlv::PREFIX_OP_LIST, &children).to_bytes()
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        let outer = Tlv::parse_exact(buf, tlv::PREFIX_OP_LIST)?;
        let mut exit_router = None;
        let mut reset = false;
        let mut ops = Vec::new();

        for child in outer.children()? {
            match child.tlv_type {
                tlv::EXIT_ROUTER => {
                    set_once(&mut exit_router, child.as_wrapped_name()?, "exit router")?
                }
                tlv::PREFIX_OP_RESET => {
                    if reset {
                        return Err(DecodeError::DuplicateField("reset"));
                    }
                    reset = true;
                }
                tlv::PREFIX_OP_ADD => ops.push(PrefixOp::Add(child.as_wrapped_name()?)),
                tlv::PREFIX_OP_REMOVE => ops.push(PrefixOp::Remove(child.as_wrapped_name()?)),
                other => return Err(DecodeError::UnknownType(other)),
            }
        }

        Ok(PrefixOpList {
            exit_router: exit_router.ok_or(DecodeError::MissingField("exit router"))?,
            reset,
            ops,
        })
    }
}
