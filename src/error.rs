// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error type shared by the reader and writer history caches.

/// Result alias used throughout the cache core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the cache core's public operations.
///
/// Variants are grouped by the return-code families a DDS implementation
/// surfaces to its caller: a caller-contract violation never mutates the
/// cache; resource exhaustion is reported alongside a status callback by
/// the caller of `store`/`insert`.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Caller contract
    // ========================================================================
    /// An argument combination the caller must not produce (e.g. a sample-
    /// state mask with no bits set, a handle from a different cache).
    BadParameter(String),
    /// The operation's precondition was not met (e.g. `return_sample` on a
    /// handle that was never borrowed, `insert` with a non-monotonic seq).
    PreconditionNotMet(String),
    /// The requested combination of QoS/operation is not supported.
    Unsupported(String),

    // ========================================================================
    // Resource exhaustion
    // ========================================================================
    /// A resource limit (`max_samples`, `max_instances`,
    /// `max_samples_per_instance`, quota bytes) was reached.
    OutOfResources(String),

    // ========================================================================
    // Internal
    // ========================================================================
    /// A branch believed unreachable was reached; in debug builds this is
    /// also asserted. Release builds treat it as a rejection rather than
    /// corrupting cache state.
    Internal(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadParameter(msg) => write!(f, "bad parameter: {msg}"),
            Error::PreconditionNotMet(msg) => write!(f, "precondition not met: {msg}"),
            Error::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Error::OutOfResources(msg) => write!(f, "out of resources: {msg}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Outcome of a single `Rhc::store` call, distinguishing the three ways a
/// sample can fail to become a readable sample from the plain "it worked".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The sample (or state change) is now visible to readers.
    Stored,
    /// A content or key filter rejected the sample; no resource was consumed.
    Filtered,
    /// A resource limit or the acceptance predicate rejected the sample.
    Rejected,
}
