/// Contract with the local split cache.  Only the mutation the kill path
/// needs; reading and full reconciliation belong to the synchronizer.
pub trait SplitStorage: Send + Sync {
    /// Mark a feature flag killed in the local cache.  Idempotent; the next
    /// synchronizer run reconciles the authoritative definition.
    fn kill_locally(&self, split_name: &str, default_treatment: &str, change_number: i64);
}
