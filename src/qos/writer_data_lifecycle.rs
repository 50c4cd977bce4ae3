// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WRITER_DATA_LIFECYCLE QoS policy (DDS v1.4 Sec.2.2.3.7)
//!
//! Controls the behavior of the DataWriter with regards to the lifecycle
//! of the data instances it manages.
//!
//! # QoS Compatibility (Request vs Offered)
//!
//! **Rule:** WRITER_DATA_LIFECYCLE is not part of RxO compatibility checking
//!
//! This policy controls writer-side instance management and does not affect
//! compatibility between readers and writers.
//!
//! # Policy Semantics
//!
//! - **autodispose_unregistered_instances = true** (default): When a DataWriter
//!   unregisters an instance (or is deleted), the instance is automatically
//!   disposed. Readers will receive a NOT_ALIVE_DISPOSED notification.
//! - **autodispose_unregistered_instances = false**: Unregistered instances remain
//!   in the NOT_ALIVE_NO_WRITERS state. Applications must explicitly dispose
//!   instances via `writer.dispose()`.
//!
//! # Use Cases
//!
//! - **Auto-dispose (default)**: Simplifies lifecycle management - instances are
//!   automatically cleaned up when no longer needed
//! - **Manual dispose**: Provides fine-grained control over instance lifecycle,
//!   useful for:
//!   - Coordinating disposal across multiple writers
//!   - Delaying disposal until specific conditions are met
//!   - Custom cleanup logic
//!
//! # Examples
//!
//! ```no_run
//! use ddshc::qos::writer_data_lifecycle::WriterDataLifecycle;
//!
//! // Default: auto-dispose unregistered instances
//! let lifecycle = WriterDataLifecycle::auto_dispose();
//! assert!(lifecycle.autodispose_unregistered_instances);
//!
//! // Manual dispose: keep instances alive after unregister
//! let lifecycle = WriterDataLifecycle::manual_dispose();
//! assert!(!lifecycle.autodispose_unregistered_instances);
//! ```

/// WRITER_DATA_LIFECYCLE QoS policy (DDS v1.4 Sec.2.2.3.7)
///
/// Controls automatic disposal of unregistered instances.
///
/// Default: auto-dispose (true).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterDataLifecycle {
    /// Whether to automatically dispose unregistered instances
    pub autodispose_unregistered_instances: bool,
}

impl Default for WriterDataLifecycle {
    /// Default: auto-dispose unregistered instances
    fn default() -> Self {
        Self::auto_dispose()
    }
}

impl WriterDataLifecycle {
    /// Create WRITER_DATA_LIFECYCLE with custom auto-dispose setting
    ///
    /// # Arguments
    ///
    /// * `autodispose` - Whether to automatically dispose unregistered instances
    ///
    /// # Examples
    ///
    /// ```
    /// use ddshc::qos::writer_data_lifecycle::WriterDataLifecycle;
    ///
    /// let lifecycle = WriterDataLifecycle::new(true);
    /// assert!(lifecycle.autodispose_unregistered_instances);
    /// ```
    pub fn new(autodispose: bool) -> Self {
        Self {
            autodispose_unregistered_instances: autodispose,
        }
    }

    /// Create WRITER_DATA_LIFECYCLE with auto-dispose (default)
    ///
    /// Unregistered instances are automatically disposed.
    ///
    /// # Examples
    ///
    /// ```
    /// use ddshc::qos::writer_data_lifecycle::WriterDataLifecycle;
    ///
    /// let lifecycle = WriterDataLifecycle::auto_dispose();
    /// assert!(lifecycle.autodispose_unregistered_instances);
    /// ```
    pub fn auto_dispose() -> Self {
        Self {
            autodispose_unregistered_instances: true,
        }
    }

    /// Create WRITER_DATA_LIFECYCLE with manual dispose
    ///
    /// Unregistered instances remain alive until explicitly disposed.
    ///
    /// # Examples
    ///
    /// ```
    /// use ddshc::qos::writer_data_lifecycle::WriterDataLifecycle;
    ///
    /// let lifecycle = WriterDataLifecycle::manual_dispose();
    /// assert!(!lifecycle.autodispose_unregistered_instances);
    /// ```
    pub fn manual_dispose() -> Self {
        Self {
            autodispose_unregistered_instances: false,
        }
    }

    /// Check if auto-dispose is enabled
    pub fn is_auto_dispose(&self) -> bool {
        self.autodispose_unregistered_instances
    }

    /// Check if manual dispose is required
    pub fn is_manual_dispose(&self) -> bool {
        !self.autodispose_unregistered_instances
    }
}
