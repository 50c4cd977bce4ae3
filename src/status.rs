// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Status-callback payloads the cache core surfaces to its caller.
//!
//! The core never calls a listener directly; it hands a `StatusCbData` to
//! whatever `StatusSink` the entity layer wired up (`Rhc::new`/`Whc::new`
//! take one). This mirrors the external "Status-callback" interface: a
//! function of `(entity, StatusCbData)`.

/// Cumulative/delta status payload handed to a [`StatusSink`].
#[derive(Debug, Clone)]
pub struct StatusCbData {
    pub raw_status_id: StatusId,
    /// Meaning depends on `raw_status_id`: missed-deadline count since the
    /// last callback for `*_DEADLINE_MISSED`, unused otherwise.
    pub extra: u32,
    /// Instance handle the status pertains to, when applicable.
    pub handle: Option<u64>,
    /// `true` for an add/raise, `false` for a clear. Only used by statuses
    /// that are level-triggered rather than purely cumulative.
    pub add: bool,
}

/// Identifies which cumulative counter a [`StatusCbData`] updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusId {
    SampleLost,
    SampleRejected(SampleRejectedReason),
    RequestedDeadlineMissed,
    OfferedDeadlineMissed,
}

/// Why `store` rejected a sample, mirrors §7's `SAMPLE_REJECTED` subcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRejectedReason {
    ByInstancesLimit,
    BySamplesLimit,
    BySamplesPerInstanceLimit,
}

/// Cumulative counters an entity layer typically keeps per reader/writer;
/// the cache core only ever produces `StatusCbData` deltas and does not
/// own these structs, but they are the natural fold target for a
/// `StatusSink` implementation and are provided for that convenience.
#[derive(Debug, Clone, Default)]
pub struct SampleLostStatus {
    pub total_count: u32,
    pub total_count_change: i32,
}

#[derive(Debug, Clone)]
pub struct SampleRejectedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_reason: Option<SampleRejectedReason>,
    pub last_instance_handle: Option<u64>,
}

impl Default for SampleRejectedStatus {
    fn default() -> Self {
        Self {
            total_count: 0,
            total_count_change: 0,
            last_reason: None,
            last_instance_handle: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestedDeadlineMissedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_instance_handle: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct OfferedDeadlineMissedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_instance_handle: Option<u64>,
}

/// Sink the cache core reports status-callback events to. The RHC/WHC hold
/// `Arc<dyn StatusSink>` and call it under their own lock, matching the
/// "Waitset signalling happens under the cache lock" rule for the
/// equivalent status path.
pub trait StatusSink: Send + Sync {
    fn notify(&self, data: StatusCbData);
}

/// A `StatusSink` that drops every event; used where no listener was wired.
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn notify(&self, _data: StatusCbData) {}
}
