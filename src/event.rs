// src/event.rs
//! Messages delivered to the node's event loop.
//!
//! Fetch tasks run outside the loop and report back through these, so all
//! table mutation stays on the loop.

use tokio::sync::oneshot;

use crate::message::{Advertisement, PrefixOpList};
use crate::name::Name;
use crate::node::NodeSnapshot;
use crate::transport::FetchError;

#[derive(Debug)]
pub enum Event {
    /// A fetch of `neighbor`'s advertisement number `seq` finished.
    AdvertFetched {
        neighbor: Name,
        seq: u64,
        result: Result<Advertisement, FetchError>,
    },

    /// A fetch of entry `seq` of `router`'s prefix log finished.
    PrefixFetched {
        router: Name,
        seq: u64,
        result: Result<PrefixOpList, FetchError>,
    },

    /// Reply with a copy of the node's tables.
    Snapshot(oneshot::Sender<NodeSnapshot>),

    Shutdown,
}
