//! Read/write path selection.
//!
//! Every repository method asks [`resolve`] which path to take instead of
//! branching on connectivity inline.

/// Kind of repository operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Reads: no durability requirement, may degrade to the cache
    Read,
    /// Writes: must be durable, may degrade to queue + optimistic update
    Write,
    /// Operations that are meaningless without the remote (export, subscribe)
    ConnectedOnly,
}

/// Path an operation takes for the current connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPath {
    /// Call the remote gateway; fall back per operation kind on transport failure
    RemoteFirst,
    /// Serve from the local cache only
    CacheOnly,
    /// Apply optimistically to the cache and append a queue item
    QueueOptimistic,
    /// Fail fast with a no-connectivity error
    Unavailable,
}

/// Choose the access path for `operation` given the connectivity state.
pub const fn resolve(operation: Operation, connected: bool) -> AccessPath {
    match (operation, connected) {
        (_, true) => AccessPath::RemoteFirst,
        (Operation::Read, false) => AccessPath::CacheOnly,
        (Operation::Write, false) => AccessPath::QueueOptimistic,
        (Operation::ConnectedOnly, false) => AccessPath::Unavailable,
    }
}

/// Path to take after a remote-first call failed with a transport error.
///
/// Service errors never reach this: they are surfaced for writes and fall back
/// to the cache for reads at the call site.
pub const fn after_transport_failure(operation: Operation) -> AccessPath {
    resolve(operation, false)
}
