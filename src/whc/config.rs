// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer-info (§3.8): non-QoS-policy-derived configuration snapshotted at
//! writer-creation time, mirroring `RhcConfig` on the reader side.

use crate::qos::QosProfile;

#[derive(Clone, Copy, Debug)]
pub struct WhcConfig {
    /// `0` means KEEP_ALL.
    pub hdepth: u32,
    /// Transient-local retention depth; `0` with `is_transient_local` means
    /// retain forever (KEEP_ALL transient-local).
    pub tldepth: u32,
    pub idxdepth: u32,
    pub is_transient_local: bool,
    pub has_deadline: bool,
    pub max_quota_bytes: usize,
}

impl WhcConfig {
    pub fn from_qos(qos: &QosProfile) -> Self {
        let hdepth = match qos.history {
            crate::qos::History::KeepLast(n) => n,
            crate::qos::History::KeepAll => 0,
        };
        let is_transient_local = !matches!(qos.durability, crate::qos::Durability::Volatile);
        let tldepth = if is_transient_local {
            qos.durability_service.history_depth
        } else {
            0
        };
        let idxdepth = hdepth.max(tldepth);
        Self {
            hdepth,
            tldepth,
            idxdepth,
            is_transient_local,
            has_deadline: !qos.deadline.is_infinite(),
            max_quota_bytes: qos.resource_limits.max_quota_bytes,
        }
    }

    pub fn history_is_keep_last(&self) -> bool {
        self.hdepth != 0
    }
}
