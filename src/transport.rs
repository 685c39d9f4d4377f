// src/transport.rs
//! Boundaries to the named request/response network and to the sync
//! (sequence-vector) protocol.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::name::Name;
use crate::tlv::DecodeError;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {0} timed out")]
    Timeout(Name),

    #[error("{0} is unreachable")]
    Unreachable(Name),

    #[error("no data under {0}")]
    NotFound(Name),

    #[error("malformed content: {0}")]
    Decode(#[from] DecodeError),

    #[error("expected data from {expected}, got {found}")]
    WrongProducer { expected: Name, found: Name },
}

/// Named request/response transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request for `name` and wait for the content.
    async fn fetch(&self, name: &Name) -> Result<Vec<u8>, FetchError>;

    /// Make `content` available under `name`. Responses carry `freshness`
    /// so caches do not hand out stale versions.
    async fn produce(&self, name: Name, content: Vec<u8>, freshness: Duration);
}

/// `router` reached sequence number `seq` in sync group `group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncUpdate {
    pub group: Name,
    pub router: Name,
    pub seq: u64,
}

/// Sequence-vector sync groups.
pub trait SyncGroup: Send + Sync {
    /// Subscribe to `group`. Every sequence number advance of another member
    /// is delivered on `updates`.
    fn join(&self, group: &Name, updates: mpsc::UnboundedSender<SyncUpdate>);

    /// Announce that `router` is now at `seq` in `group`.
    fn publish(&self, group: &Name, router: &Name, seq: u64);
}

/// Fetch `name` with a per-attempt deadline.
pub async fn fetch_with_timeout(
    transport: &dyn Transport,
    name: &Name,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, transport.fetch(name))
        .await
        .map_err(|_| FetchError::Timeout(name.clone()))?
}
