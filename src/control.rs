// src/control.rs
//! Boundary to the forwarder's control plane.
//!
//! The routing core only ever needs three things from the forwarder: a face
//! towards a neighbor, and adding or removing a route on a face.
//! [`Retrying`] wraps any implementation so every call is retried with a
//! fixed backoff before the error reaches the caller.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::name::Name;
use crate::retry::{RetryPolicy, retry};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0} is unreachable")]
    Unreachable(String),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("cannot parse face id from {0:?}")]
    Parse(String),

    #[error("control plane i/o: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ForwardingControl: Send + Sync {
    /// Create (or look up) a face towards `address` and return its id.
    async fn create_link(&self, address: &str) -> Result<u64, ControlError>;

    /// Add or update the route `prefix -> face` with `cost`.
    async fn install_route(&self, prefix: &Name, face: u64, cost: u64) -> Result<(), ControlError>;

    /// Remove the route `prefix -> face`.
    async fn withdraw_route(&self, prefix: &Name, face: u64) -> Result<(), ControlError>;
}

/// A [`ForwardingControl`] that retries every call of the wrapped one.
pub struct Retrying<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> Retrying<C> {
    pub fn new(inner: C) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: C, policy: RetryPolicy) -> Self {
        Retrying { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: ForwardingControl> ForwardingControl for Retrying<C> {
    async fn create_link(&self, address: &str) -> Result<u64, ControlError> {
        retry(self.policy, "create link", || self.inner.create_link(address))
            .await
            .inspect_err(|e| warn!(address, error = %e, "create link failed after retries"))
    }

    async fn install_route(&self, prefix: &Name, face: u64, cost: u64) -> Result<(), ControlError> {
        retry(self.policy, "install route", || {
            self.inner.install_route(prefix, face, cost)
        })
        .await
    }

    async fn withdraw_route(&self, prefix: &Name, face: u64) -> Result<(), ControlError> {
        retry(self.policy, "withdraw route", || {
            self.inner.withdraw_route(prefix, face)
        })
        .await
    }
}
