// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One stored sample within an [`RhcInstance`](super::instance::RhcInstance)'s
//! history.

use crate::scheduler::MonotonicTime;
use crate::serdata::Serdata;

/// A single sample retained by the RHC, per §3.3 of the cache's sample
/// model. Samples live oldest-to-newest in the owning instance's deque;
/// `sample_id` (not array position) is the stable identity lifespan
/// scheduling keys off, since a sample's position shifts as older entries
/// are dropped.
pub struct RhcSample {
    pub serdata: Serdata,
    pub source_timestamp: i64,
    pub writer_iid: u64,
    /// `true` once returned by a `read` (NOT `take`, which removes it).
    pub isread: bool,
    /// Snapshot of the owning instance's `disposed_gen` at insertion time,
    /// used to compute `absolute_generation_rank` on later reads.
    pub disposed_gen: u64,
    /// Snapshot of the owning instance's `no_writers_gen` at insertion time.
    pub no_writers_gen: u64,
    /// One bit per registered query condition: whether that condition's
    /// filter matched this sample at insertion (or at attach-time, for
    /// conditions registered afterward).
    pub qmask: u64,
    /// Absolute expiry time, copied verbatim from the writer-info's
    /// `lifespan_exp` at insertion; `None` for an infinite lifespan.
    pub lifespan_expiry: Option<MonotonicTime>,
    /// Stable identity for the lifespan heap, monotonically assigned by the
    /// owning instance; distinct from the sample's position in its deque.
    pub sample_id: u64,
}

impl RhcSample {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        serdata: Serdata,
        source_timestamp: i64,
        writer_iid: u64,
        disposed_gen: u64,
        no_writers_gen: u64,
        qmask: u64,
        lifespan_expiry: Option<MonotonicTime>,
        sample_id: u64,
    ) -> Self {
        Self {
            serdata,
            source_timestamp,
            writer_iid,
            isread: false,
            disposed_gen,
            no_writers_gen,
            qmask,
            lifespan_expiry,
            sample_id,
        }
    }
}
