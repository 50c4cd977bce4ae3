// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builtin-topic RHC variant (§4.2.8): same external operation set as
//! [`Rhc`](super::Rhc), but `store` is a no-op and `read`/`take` synthesize
//! their sample sequence on demand by enumerating entities from an external
//! [`EntityIndexSource`] rather than from a stored instance table. Used for
//! the participant/reader/writer/topic discovery topics, where the cache's
//! job is to present a read/take view over state the entity layer already
//! owns, not to retain samples of its own.

use crate::error::Result;
use crate::qos::QosProfile;
use crate::read_condition::{
    InstanceStateMask, SampleStateMask, ViewStateMask,
};
use crate::serdata::Serdata;
use super::SampleInfo;
use std::sync::{Arc, Mutex};

/// Which builtin topic a [`BuiltinRhc`] serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Participant,
    Reader,
    Writer,
    Topic,
}

/// Supplied by the entity layer: enumerates the live entities of one
/// [`EntityKind`] as `(instance_iid, serdata)` pairs, synthesized fresh on
/// every call. No discovery-protocol behavior lives behind this trait — it
/// is a read-only view over entity state the caller already maintains.
pub trait EntityIndexSource: Send + Sync {
    fn enumerate(&self, kind: EntityKind) -> Vec<(u64, Serdata)>;
}

/// A builtin-topic cache. Every sample is synthesized fresh from
/// `source.enumerate(kind)` on each `read`/`take`; nothing is retained
/// between calls, so there is no sample/view state to track across
/// invocations — every synthesized sample reports `NOT_READ` and `NEW`.
pub struct BuiltinRhc {
    kind: EntityKind,
    source: Arc<dyn EntityIndexSource>,
    qos: Mutex<QosProfile>,
}

impl BuiltinRhc {
    pub fn new(kind: EntityKind, source: Arc<dyn EntityIndexSource>, qos: QosProfile) -> Self {
        Self {
            kind,
            source,
            qos: Mutex::new(qos),
        }
    }

    /// No-op: the builtin variant never retains a sample of its own: the
    /// entity layer is the source of truth.
    pub fn store(&self) -> Result<bool> {
        Ok(true)
    }

    /// No-op for the same reason `store` is.
    pub fn unregister_writer(&self) {}

    pub fn set_qos(&self, qos: QosProfile) -> Result<()> {
        qos.validate().map_err(crate::error::Error::BadParameter)?;
        *self.qos.lock().unwrap() = qos;
        Ok(())
    }

    /// No-op: nothing is ever deferred since nothing is ever stored.
    pub fn free_deferred_free_list(&self, list: Vec<Serdata>) {
        drop(list);
    }

    pub fn read(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        handle: Option<u64>,
        max_samples: usize,
    ) -> Result<Vec<(SampleInfo, Option<Serdata>)>> {
        self.enumerate_matching(
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
            handle,
            max_samples,
        )
    }

    /// Identical to `read`: enumeration is idempotent, so "taking" a
    /// synthesized sample has nothing to remove.
    pub fn take(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        handle: Option<u64>,
        max_samples: usize,
    ) -> Result<Vec<(SampleInfo, Option<Serdata>)>> {
        self.read(
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
            handle,
            max_samples,
        )
    }

    fn enumerate_matching(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        handle: Option<u64>,
        max_samples: usize,
    ) -> Result<Vec<(SampleInfo, Option<Serdata>)>> {
        if !sample_state_mask.contains(SampleStateMask::NOT_READ)
            || !view_state_mask.contains(ViewStateMask::NEW)
            || !instance_state_mask.contains(InstanceStateMask::ALIVE)
        {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for (iid, serdata) in self.source.enumerate(self.kind) {
            if let Some(h) = handle {
                if h != iid {
                    continue;
                }
            }
            if out.len() >= max_samples {
                break;
            }
            out.push((
                SampleInfo {
                    sample_state: SampleStateMask::NOT_READ,
                    view_state: ViewStateMask::NEW,
                    instance_state: InstanceStateMask::ALIVE,
                    valid_data: true,
                    instance_handle: iid,
                    source_timestamp: serdata.timestamp(),
                    disposed_generation_count: 0,
                    no_writers_generation_count: 0,
                    sample_rank: 0,
                    generation_rank: 0,
                    absolute_generation_rank: 0,
                },
                Some(serdata),
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serdata::Serdata;
    use std::sync::Arc;

    struct FakeSource(Vec<(u64, Serdata)>);

    impl EntityIndexSource for FakeSource {
        fn enumerate(&self, _kind: EntityKind) -> Vec<(u64, Serdata)> {
            self.0.clone()
        }
    }

    fn sample(seed: u8) -> Serdata {
        Serdata::new_data(Arc::from(vec![seed]), Arc::from(vec![seed]), seed as i64)
    }

    #[test]
    fn read_synthesizes_one_sample_per_enumerated_entity() {
        let source = Arc::new(FakeSource(vec![(1, sample(1)), (2, sample(2))]));
        let rhc = BuiltinRhc::new(EntityKind::Reader, source, QosProfile::default());
        let results = rhc
            .read(
                SampleStateMask::ANY,
                ViewStateMask::ANY,
                InstanceStateMask::ANY,
                None,
                100,
            )
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn read_scoped_to_handle_filters_other_entities() {
        let source = Arc::new(FakeSource(vec![(1, sample(1)), (2, sample(2))]));
        let rhc = BuiltinRhc::new(EntityKind::Topic, source, QosProfile::default());
        let results = rhc
            .read(
                SampleStateMask::ANY,
                ViewStateMask::ANY,
                InstanceStateMask::ANY,
                Some(2),
                100,
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.instance_handle, 2);
    }

    #[test]
    fn take_mirrors_read_since_nothing_is_retained() {
        let source = Arc::new(FakeSource(vec![(1, sample(1))]));
        let rhc = BuiltinRhc::new(EntityKind::Writer, source, QosProfile::default());
        let via_read = rhc
            .read(SampleStateMask::ANY, ViewStateMask::ANY, InstanceStateMask::ANY, None, 10)
            .unwrap();
        let via_take = rhc
            .take(SampleStateMask::ANY, ViewStateMask::ANY, InstanceStateMask::ANY, None, 10)
            .unwrap();
        assert_eq!(via_read.len(), via_take.len());
    }

    #[test]
    fn store_and_unregister_writer_are_no_ops() {
        let source = Arc::new(FakeSource(vec![]));
        let rhc = BuiltinRhc::new(EntityKind::Participant, source, QosProfile::default());
        assert!(rhc.store().unwrap());
        rhc.unregister_writer();
    }
}
