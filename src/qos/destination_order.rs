// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DESTINATION_ORDER QoS policy (DDS v1.4 Sec.2.2.3.8)
//!
//! Controls the order in which samples are presented to the DataReader.
//! Determines whether samples should be ordered by reception time or source timestamp.
//! `config.by_source_ordering` drives the `accepts_ordering` check in
//! `rhc::store`, which reads `DestinationOrderKind::BySourceTimestamp`.
//!
//! # Use Cases
//!
//! - **BY_RECEPTION_TIMESTAMP** (default):
//!   - Real-time sensor data (process in arrival order)
//!   - Live streaming (minimize latency)
//!   - Network monitoring (detect reordering)
//!
//! - **BY_SOURCE_TIMESTAMP**:
//!   - Log replay (preserve original temporal order)
//!   - Distributed system event correlation
//!   - Time-series data analysis
//!   - Causal consistency (event A happened before B)
//!
//! # Examples
//!
//! ```no_run
//! use ddshc::qos::destination_order::{DestinationOrder, DestinationOrderKind};
//!
//! // Default: Order by reception (arrival order)
//! let reception_order = DestinationOrder::by_reception_timestamp();
//! assert_eq!(reception_order.kind, DestinationOrderKind::ByReceptionTimestamp);
//!
//! // Order by source timestamp (temporal order)
//! let source_order = DestinationOrder::by_source_timestamp();
//! assert_eq!(source_order.kind, DestinationOrderKind::BySourceTimestamp);
//! ```

/// DESTINATION_ORDER kind
///
/// Determines the ordering criterion for samples at the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DestinationOrderKind {
    /// Order samples by reception timestamp (default)
    ///
    /// Samples are delivered in the order they arrive at the reader.
    /// Fastest delivery, no reordering overhead.
    ByReceptionTimestamp = 0,

    /// Order samples by source timestamp
    ///
    /// Samples are delivered in the order they were written at the source.
    /// Requires timestamp propagation and reordering buffer.
    /// Useful for log replay and temporal consistency.
    BySourceTimestamp = 1,
}

impl Default for DestinationOrderKind {
    /// Default: BY_RECEPTION_TIMESTAMP (fastest, no reordering)
    fn default() -> Self {
        Self::ByReceptionTimestamp
    }
}

/// DESTINATION_ORDER QoS policy
///
/// Specifies the order in which samples are presented to the reader.
/// Default: BY_RECEPTION_TIMESTAMP (arrival order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationOrder {
    /// Ordering criterion
    pub kind: DestinationOrderKind,
}

impl Default for DestinationOrder {
    /// Default: BY_RECEPTION_TIMESTAMP (arrival order)
    fn default() -> Self {
        Self::by_reception_timestamp()
    }
}

impl DestinationOrder {
    /// Create BY_RECEPTION_TIMESTAMP policy (default)
    ///
    /// Samples are delivered in arrival order (fastest, no reordering).
    ///
    /// # Examples
    ///
    /// ```
    /// use ddshc::qos::destination_order::{DestinationOrder, DestinationOrderKind};
    ///
    /// let policy = DestinationOrder::by_reception_timestamp();
    /// assert_eq!(policy.kind, DestinationOrderKind::ByReceptionTimestamp);
    /// ```
    pub fn by_reception_timestamp() -> Self {
        Self {
            kind: DestinationOrderKind::ByReceptionTimestamp,
        }
    }

    /// Create BY_SOURCE_TIMESTAMP policy
    ///
    /// Samples are delivered in source timestamp order (temporal consistency).
    ///
    /// # Examples
    ///
    /// ```
    /// use ddshc::qos::destination_order::{DestinationOrder, DestinationOrderKind};
    ///
    /// let policy = DestinationOrder::by_source_timestamp();
    /// assert_eq!(policy.kind, DestinationOrderKind::BySourceTimestamp);
    /// ```
    pub fn by_source_timestamp() -> Self {
        Self {
            kind: DestinationOrderKind::BySourceTimestamp,
        }
    }

    /// Check if policy uses source timestamps (requires timestamp propagation)
    pub fn uses_source_timestamp(&self) -> bool {
        self.kind == DestinationOrderKind::BySourceTimestamp
    }

    /// Check if policy uses reception timestamps (default, fastest)
    pub fn uses_reception_timestamp(&self) -> bool {
        self.kind == DestinationOrderKind::ByReceptionTimestamp
    }
}
