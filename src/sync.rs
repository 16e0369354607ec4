//! Contract with the owner-supplied synchronizer, the component that fetches
//! authoritative flag and segment definitions from the control plane.

use async_trait::async_trait;
use std::fmt;

/// A synchronizer failure.  Workers log these and keep draining their queue;
/// the next update (or the owner's polling loop) reconciles.
#[derive(Debug)]
pub struct SyncErr(pub String);

impl std::error::Error for SyncErr {}

impl fmt::Display for SyncErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "synchronization failed: {}", self.0)
    }
}

#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// Fetch split definitions, at least up to change number `till`.
    async fn synchronize_splits(&self, till: Option<i64>) -> Result<(), SyncErr>;

    /// Fetch one segment's definition, at least up to change number `till`.
    async fn synchronize_segment(&self, name: &str, till: Option<i64>) -> Result<(), SyncErr>;
}
