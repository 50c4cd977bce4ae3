// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS policies consulted by the reader/writer history cache core.
//!
//! Only the policies the cache itself enforces are carried here — access
//! scope, partitioning, and transport hints are entity/discovery-layer
//! concerns outside this crate's scope.

/// Deadline QoS policy - expected data update period.
pub mod deadline;
/// Destination order QoS policy - reception vs source timestamp ordering.
pub mod destination_order;
/// Durability service QoS policy - history depth for late joiners.
pub mod durability_service;
/// Lifespan QoS policy - data expiration time.
pub mod lifespan;
/// Ownership QoS policy - exclusive vs shared writers.
pub mod ownership;
/// Reader data lifecycle QoS policy - instance disposal.
pub mod reader_data_lifecycle;
/// Time-based filter QoS policy - minimum sample separation.
pub mod time_based_filter;
/// Writer data lifecycle QoS policy - autodispose instances.
pub mod writer_data_lifecycle;

/// Collection of QoS policies that govern one RHC's (reader-side)
/// acceptance and storage behavior.
///
/// # Supported Policies
///
/// - **Reliability**: `BestEffort` | `Reliable`
/// - **History**: `KeepLast(n)` bounded per-instance queue, or `KeepAll`
///   within `ResourceLimits`
/// - **Durability**: `Volatile`, `TransientLocal`, `Persistent`
/// - **ResourceLimits**: `max_samples`, `max_instances`,
///   `max_samples_per_instance`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QosProfile {
    pub reliability: Reliability,
    pub history: History,
    pub durability: Durability,
    /// Writer-side history-cache depth for TRANSIENT_LOCAL/PERSISTENT
    /// durability; ignored under `Durability::Volatile`. Drives the WHC's
    /// `tldepth` (§3.8).
    pub durability_service: durability_service::DurabilityService,
    pub resource_limits: ResourceLimits,
    pub ownership: ownership::Ownership,
    pub destination_order: destination_order::DestinationOrder,
    pub time_based_filter: time_based_filter::TimeBasedFilter,
    pub reader_data_lifecycle: reader_data_lifecycle::ReaderDataLifecycle,
    pub writer_data_lifecycle: writer_data_lifecycle::WriterDataLifecycle,
    /// Reader-side deadline: maximum expected period between samples of
    /// one instance. Drives the RHC deadline heap (§4.2.7).
    pub deadline: deadline::Deadline,
}

impl Default for QosProfile {
    fn default() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            history: History::KeepLast(10),
            durability: Durability::Volatile,
            durability_service: durability_service::DurabilityService::default(),
            resource_limits: ResourceLimits::default(),
            ownership: ownership::Ownership::default(),
            destination_order: destination_order::DestinationOrder::default(),
            time_based_filter: time_based_filter::TimeBasedFilter::default(),
            reader_data_lifecycle: reader_data_lifecycle::ReaderDataLifecycle::default(),
            writer_data_lifecycle: writer_data_lifecycle::WriterDataLifecycle::default(),
            deadline: deadline::Deadline::default(),
        }
    }
}

impl QosProfile {
    /// Validate QoS configuration, rejecting combinations the cache cannot
    /// enforce.
    ///
    /// - `History::KeepLast(n)` requires `n > 0`.
    /// - `History::KeepAll` requires `resource_limits.max_samples > 0`.
    /// - `max_samples >= max_samples_per_instance * max_instances`.
    pub fn validate(&self) -> Result<(), String> {
        match self.history {
            History::KeepLast(0) => {
                return Err("History::KeepLast(n) requires n > 0".to_string());
            }
            History::KeepAll => {
                if self.resource_limits.max_samples == 0 {
                    return Err(
                        "History::KeepAll requires ResourceLimits.max_samples > 0".to_string()
                    );
                }
            }
            History::KeepLast(_) => {}
        }

        let rl = &self.resource_limits;
        if rl.max_samples < rl.max_samples_per_instance.saturating_mul(rl.max_instances) {
            return Err(format!(
                "max_samples ({}) must be >= max_samples_per_instance ({}) * max_instances ({})",
                rl.max_samples, rl.max_samples_per_instance, rl.max_instances
            ));
        }

        Ok(())
    }

    /// Returns the effective per-instance depth the RHC should enforce:
    /// `KeepLast(n)` clamps to `n`, `KeepAll` clamps to
    /// `max_samples_per_instance` (or unbounded when that is
    /// [`crate::config::LENGTH_UNLIMITED`]).
    #[must_use]
    pub fn effective_history_depth(&self) -> usize {
        match self.history {
            History::KeepLast(n) => n as usize,
            History::KeepAll => self.resource_limits.max_samples_per_instance,
        }
    }
}

/// Reliability policy - delivery guarantee for samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Reliability {
    /// Fire-and-forget: no ACKs, no retransmission.
    #[default]
    BestEffort,
    /// NACK-driven retransmission; the writer retains samples in its WHC
    /// until acknowledged.
    Reliable,
}

/// History policy - how many samples per instance to retain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum History {
    /// Keep the last N samples per instance (0 is rejected by `validate`).
    KeepLast(u32),
    /// Keep all samples within `ResourceLimits`.
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        Self::KeepLast(10)
    }
}

/// Durability policy - sample persistence for late-joining readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Durability {
    /// No persistence; the writer's WHC does not retain acked samples.
    #[default]
    Volatile,
    /// The writer's WHC retains up to `durability_service`'s depth for
    /// late-joining readers, for the writer's lifetime only.
    TransientLocal,
    /// As `TransientLocal`, but persisted across writer restarts (the
    /// persistence mechanism itself is outside this crate's scope).
    Persistent,
}

/// Resource limits controlling queue sizes, instance limits, and memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum total samples across all instances.
    pub max_samples: usize,
    /// Maximum instances.
    pub max_instances: usize,
    /// Maximum samples per instance.
    pub max_samples_per_instance: usize,
    /// Maximum total payload bytes (reliable QoS WHC quota).
    pub max_quota_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_samples: 100_000,
            max_instances: crate::config::LENGTH_UNLIMITED,
            max_samples_per_instance: 100_000,
            max_quota_bytes: 100_000_000,
        }
    }
}
