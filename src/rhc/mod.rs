// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader History Cache: the per-reader keyed sample store.
//!
//! Grounded on this crate's cache-core shape (a single mutex guarding a
//! keyed instance table plus a non-empty-instance ring, condition registry,
//! and expiry heaps) generalized from a fixed wire-format cache to the
//! externally-supplied `Serdata`/`Sertype` seam §6 names.

pub mod builtin;
pub mod instance;
pub mod lwregs;
pub mod read_take;
pub mod sample;
pub mod store;

use crate::condition::Condition;
use crate::error::{Error, Result};
use crate::qos::QosProfile;
use crate::read_condition::{
    InstanceStateMask, QueryCondition, ReadCondition, SampleStateMask, ViewStateMask,
};
use crate::scheduler::{now, EventScheduler, MonotonicTime};
use crate::status::StatusSink;
use crate::support::ExpiryHeap;
use crate::tkmap::Tkmap;
use instance::{InstanceState, RhcInstance};
use lwregs::LiveWriterSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Non-QoS-policy derived configuration, snapshotted from a `QosProfile` per
/// §3.8 so the hot store/read path never re-derives it.
#[derive(Clone, Debug)]
pub struct RhcConfig {
    /// `usize::MAX` (`crate::config::LENGTH_UNLIMITED`) means KEEP_ALL.
    pub history_depth: usize,
    /// `true` for `History::KeepAll`: reaching `history_depth` rejects the
    /// next sample (§4.2.3/B2) instead of silently evicting the oldest one
    /// the way `KeepLast` does (B1).
    pub history_is_keep_all: bool,
    pub max_instances: usize,
    pub max_samples: usize,
    pub max_samples_per_instance: usize,
    pub minimum_separation: std::time::Duration,
    pub by_source_ordering: bool,
    pub exclusive_ownership: bool,
    pub reliable: bool,
}

impl RhcConfig {
    pub fn from_qos(qos: &QosProfile) -> Self {
        Self {
            history_depth: qos.effective_history_depth(),
            history_is_keep_all: matches!(qos.history, crate::qos::History::KeepAll),
            max_instances: qos.resource_limits.max_instances,
            max_samples: qos.resource_limits.max_samples,
            max_samples_per_instance: qos.resource_limits.max_samples_per_instance,
            minimum_separation: qos.time_based_filter.minimum_separation,
            by_source_ordering: qos.destination_order.uses_source_timestamp(),
            exclusive_ownership: matches!(
                qos.ownership.kind,
                crate::qos::ownership::OwnershipKind::Exclusive
            ),
            reliable: matches!(qos.reliability, crate::qos::Reliability::Reliable),
        }
    }
}

/// Recount-equal counters, per I1: every field here must equal a fresh
/// iteration of `instances` after any public operation returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct RhcCounters {
    pub n_not_alive_disposed: u64,
    pub n_not_alive_no_writers: u64,
    pub n_new: u64,
    pub n_vsamples: u64,
    pub n_vread: u64,
    pub n_invsamples: u64,
    pub n_invread: u64,
}

/// Per-sample snapshot returned alongside user data/key data by
/// `read`/`take`, per §4.2.6.
#[derive(Debug, Clone)]
pub struct SampleInfo {
    pub sample_state: SampleStateMask,
    pub view_state: ViewStateMask,
    pub instance_state: InstanceStateMask,
    pub valid_data: bool,
    pub instance_handle: u64,
    pub source_timestamp: i64,
    pub disposed_generation_count: u64,
    pub no_writers_generation_count: u64,
    pub sample_rank: u64,
    pub generation_rank: u64,
    pub absolute_generation_rank: i64,
}

pub(crate) struct RhcInner {
    pub(crate) tkmap: Arc<Tkmap>,
    pub(crate) qos: QosProfile,
    pub(crate) config: RhcConfig,
    pub(crate) instances: HashMap<u64, RhcInstance>,
    /// Non-empty-instance ring (§3.4 invariant): `ring[ring_index[iid]] ==
    /// iid` for every non-empty instance, swap-removed for O(1) drop.
    pub(crate) ring: Vec<u64>,
    pub(crate) ring_index: HashMap<u64, usize>,
    pub(crate) live_writers: LiveWriterSet,
    pub(crate) read_conditions: Vec<Arc<ReadCondition>>,
    pub(crate) query_conditions: Vec<Arc<QueryCondition>>,
    /// One bit per query-mask slot; `1` means free. The lowest set bit is
    /// handed to the next `add_readcondition` that attaches a query filter
    /// (§9, deterministic allocation).
    pub(crate) query_mask_free: u64,
    pub(crate) lifespan_heap: ExpiryHeap<(u64, u64)>,
    pub(crate) deadline_heap: ExpiryHeap<u64>,
    pub(crate) counters: RhcCounters,
}

impl RhcInner {
    fn is_in_ring(&self, iid: u64) -> bool {
        self.ring_index.contains_key(&iid)
    }

    pub(crate) fn add_to_ring(&mut self, iid: u64) {
        if self.is_in_ring(iid) {
            return;
        }
        self.ring_index.insert(iid, self.ring.len());
        self.ring.push(iid);
    }

    pub(crate) fn remove_from_ring(&mut self, iid: u64) {
        if let Some(idx) = self.ring_index.remove(&iid) {
            let last = self.ring.len() - 1;
            self.ring.swap_remove(idx);
            if idx != last {
                let moved = self.ring[idx];
                self.ring_index.insert(moved, idx);
            }
        }
    }

    /// Reconcile the ring membership and disposed/no-writers counters for
    /// one instance against its current state. Called after every mutation
    /// of `inst` so I1/I2 hold at every quiescent point.
    pub(crate) fn sync_instance_bookkeeping(&mut self, iid: u64) {
        let Some(inst) = self.instances.get(&iid) else {
            self.remove_from_ring(iid);
            return;
        };
        if inst.is_empty() {
            if inst.wrcount == 0 {
                self.remove_from_ring(iid);
                if let Some(inst) = self.instances.remove(&iid) {
                    self.tkmap.unref(&inst.tk);
                }
                return;
            }
            self.remove_from_ring(iid);
        } else {
            self.add_to_ring(iid);
        }
    }

    /// Full recount of every derived counter, used by `new` and available
    /// for I1 cross-checks.
    pub(crate) fn recount(&mut self) {
        let mut c = RhcCounters::default();
        for inst in self.instances.values() {
            if inst.is_empty() {
                continue;
            }
            match inst.instance_state() {
                InstanceState::NotAliveDisposed => c.n_not_alive_disposed += 1,
                InstanceState::NotAliveNoWriters => c.n_not_alive_no_writers += 1,
                InstanceState::Alive => {}
            }
            if inst.isnew {
                c.n_new += 1;
            }
            c.n_vsamples += inst.nvsamples() as u64;
            c.n_vread += inst.nvread as u64;
            if inst.inv_exists {
                c.n_invsamples += 1;
                if inst.inv_isread {
                    c.n_invread += 1;
                }
            }
        }
        self.counters = c;
    }
}

/// A reader history cache. Cheaply clonable (`Arc`-backed); obtained via
/// [`Rhc::new`], which returns the `Arc` directly since lifespan/deadline
/// callbacks must be able to re-enter the cache from the scheduler thread.
pub struct Rhc {
    pub(crate) tkmap: Arc<Tkmap>,
    pub(crate) scheduler: Arc<dyn EventScheduler>,
    pub(crate) status_sink: Arc<dyn StatusSink>,
    pub(crate) inner: Mutex<RhcInner>,
    self_weak: Mutex<Weak<Rhc>>,
}

impl Rhc {
    pub fn new(
        qos: QosProfile,
        scheduler: Arc<dyn EventScheduler>,
        status_sink: Arc<dyn StatusSink>,
    ) -> Result<Arc<Self>> {
        qos.validate().map_err(Error::BadParameter)?;
        let config = RhcConfig::from_qos(&qos);
        let tkmap = crate::tkmap::acquire();
        let inner = RhcInner {
            tkmap: tkmap.clone(),
            qos,
            config,
            instances: HashMap::new(),
            ring: Vec::new(),
            ring_index: HashMap::new(),
            live_writers: LiveWriterSet::new(),
            read_conditions: Vec::new(),
            query_conditions: Vec::new(),
            query_mask_free: crate::config::query_mask_free_pool(),
            lifespan_heap: ExpiryHeap::new(),
            deadline_heap: ExpiryHeap::new(),
            counters: RhcCounters::default(),
        };
        let rhc = Arc::new(Self {
            tkmap,
            scheduler,
            status_sink,
            inner: Mutex::new(inner),
            self_weak: Mutex::new(Weak::new()),
        });
        *rhc.self_weak.lock().unwrap() = Arc::downgrade(&rhc);
        Ok(rhc)
    }

    fn weak_self(&self) -> Weak<Rhc> {
        self.self_weak.lock().unwrap().clone()
    }

    pub fn counters(&self) -> RhcCounters {
        self.inner.lock().unwrap().counters
    }

    pub fn n_instances(&self) -> usize {
        self.inner.lock().unwrap().instances.len()
    }

    pub fn n_nonempty_instances(&self) -> usize {
        self.inner.lock().unwrap().ring.len()
    }

    pub fn set_qos(&self, qos: QosProfile) -> Result<()> {
        qos.validate().map_err(Error::BadParameter)?;
        let mut inner = self.inner.lock().unwrap();
        inner.config = RhcConfig::from_qos(&qos);
        inner.qos = qos;
        Ok(())
    }

    /// Attach a plain read condition (no content filter). Returns the new
    /// condition's trigger count, which for a fresh attach is the current
    /// number of matching non-empty instances.
    pub fn add_readcondition(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
    ) -> Arc<ReadCondition> {
        let cond = Arc::new(ReadCondition::new(
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
        ));
        let mut inner = self.inner.lock().unwrap();
        let matches = read_take::count_matching_instances(&inner, &cond);
        cond.apply_delta(matches as i64);
        inner.read_conditions.push(cond.clone());
        cond
    }

    /// Attach a query condition, assigning it the lowest free query-mask
    /// bit (§9) and recomputing query masks for every existing sample of
    /// every instance (§4.2.5, "recomputed ... when a new query condition
    /// is attached").
    pub fn add_querycondition(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        query_expression: String,
        query_parameters: Vec<String>,
        matches_sample: impl Fn(&crate::serdata::Serdata) -> bool + Send + Sync + 'static,
    ) -> Result<Arc<QueryCondition>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.query_mask_free == 0 {
            return Err(Error::OutOfResources(
                "query-condition mask capacity exhausted".to_string(),
            ));
        }
        let bit = inner.query_mask_free.trailing_zeros();
        inner.query_mask_free &= !(1u64 << bit);

        let cond = Arc::new(QueryCondition::new(
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
            query_expression,
            query_parameters,
            bit,
            Box::new(matches_sample),
        ));
        let mask = cond.mask();

        let mut matches = 0u64;
        for inst in inner.instances.values_mut() {
            for s in inst.samples.iter_mut() {
                if cond.matches(&s.serdata) {
                    s.qmask |= mask;
                } else {
                    s.qmask &= !mask;
                }
            }
            if inst.inv_exists {
                // Invalid samples carry no payload; a query filter cannot
                // evaluate against them, so they never match a query
                // condition (only a plain, filter-less read/take).
                inst.inv_qmask &= !mask;
            }
            if read_take::instance_matches(inst, sample_state_mask, view_state_mask, instance_state_mask)
                && read_take::instance_has_matching_sample(inst, sample_state_mask, Some(mask))
            {
                matches += 1;
            }
        }
        cond.apply_delta(matches as i64);
        inner.query_conditions.push(cond.clone());
        Ok(cond)
    }

    pub fn remove_readcondition(&self, condition_id: u64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pos) = inner
            .read_conditions
            .iter()
            .position(|c| c.condition_id() == condition_id)
        {
            inner.read_conditions.remove(pos);
            return Ok(());
        }
        if let Some(pos) = inner
            .query_conditions
            .iter()
            .position(|c| c.condition_id() == condition_id)
        {
            let cond = inner.query_conditions.remove(pos);
            inner.query_mask_free |= 1u64 << cond.mask_bit();
            // Clear the freed bit from every sample's mask (L4: detaching
            // must leave the remaining masks exactly as they were before
            // this condition was attached).
            let mask = cond.mask();
            for inst in inner.instances.values_mut() {
                for s in inst.samples.iter_mut() {
                    s.qmask &= !mask;
                }
                inst.inv_qmask &= !mask;
            }
            return Ok(());
        }
        Err(Error::BadParameter(format!(
            "no read/query condition with id {condition_id}"
        )))
    }

    /// Relinquish exclusive ownership for a writer: clears the cached
    /// fast-path writer from every instance it currently owns so a lower-
    /// strength writer can take over on its next sample.
    pub fn relinquish_ownership(&self, wr_iid: u64) {
        let mut inner = self.inner.lock().unwrap();
        for inst in inner.instances.values_mut() {
            if inst.wr_iid == wr_iid && inst.wr_iid_islive {
                inst.strength = i32::MIN;
            }
        }
    }

    fn arm_deadline(self: &Arc<Self>, iid: u64, at: MonotonicTime) {
        let mut inner = self.inner.lock().unwrap();
        inner.deadline_heap.schedule(iid, at);
        drop(inner);
        let weak = self.weak_self();
        self.scheduler.schedule_at(
            at,
            Arc::new(move |fire_time| {
                let rhc = weak.upgrade()?;
                rhc.on_deadline_fire(fire_time)
            }),
        );
    }

    fn on_deadline_fire(self: Arc<Self>, fire_time: MonotonicTime) -> Option<MonotonicTime> {
        let mut inner = self.inner.lock().unwrap();
        let period_ns = {
            let p = inner.qos.deadline.period;
            if p == std::time::Duration::from_secs(u64::MAX) || p.is_zero() {
                return None;
            }
            p.as_nanos() as i64
        };
        let due = inner.deadline_heap.pop_expired(fire_time);
        for iid in due {
            let missed = {
                let Some(inst) = inner.instances.get(&iid) else { continue };
                if inst.instance_state() != InstanceState::Alive {
                    continue;
                }
                // Both operands are scheduler-monotonic: `deadline_due` is
                // exactly the fire time this instance was last armed for, so
                // this never mixes in the source-timestamp domain of `tstamp`.
                let elapsed = (fire_time - inst.deadline_due).max(0);
                1 + (elapsed / period_ns) as u32
            };
            drop(inner);
            self.status_sink.notify(crate::status::StatusCbData {
                raw_status_id: crate::status::StatusId::RequestedDeadlineMissed,
                extra: missed,
                handle: Some(iid),
                add: true,
            });
            inner = self.inner.lock().unwrap();
            let next = fire_time + period_ns;
            if let Some(inst) = inner.instances.get_mut(&iid) {
                inst.deadline_due = next;
            }
            inner.deadline_heap.schedule(iid, next);
        }
        inner.deadline_heap.peek_due()
    }

    fn arm_lifespan(self: &Arc<Self>, at: MonotonicTime) {
        let weak = self.weak_self();
        self.scheduler.schedule_at(
            at,
            Arc::new(move |fire_time| {
                let rhc = weak.upgrade()?;
                rhc.on_lifespan_fire(fire_time)
            }),
        );
    }

    fn on_lifespan_fire(self: Arc<Self>, fire_time: MonotonicTime) -> Option<MonotonicTime> {
        let mut inner = self.inner.lock().unwrap();
        let due = inner.lifespan_heap.pop_expired(fire_time);
        for (iid, sample_id) in due {
            store::expire_sample(&mut inner, iid, sample_id);
        }
        inner.lifespan_heap.peek_due()
    }
}

impl Drop for Rhc {
    fn drop(&mut self) {
        crate::tkmap::release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ThreadedScheduler;
    use crate::status::NullStatusSink;

    pub(crate) fn test_rhc(qos: QosProfile) -> Arc<Rhc> {
        Rhc::new(
            qos,
            Arc::new(ThreadedScheduler::new()),
            Arc::new(NullStatusSink),
        )
        .unwrap()
    }

    #[test]
    fn fresh_cache_has_no_instances() {
        let rhc = test_rhc(QosProfile::default());
        assert_eq!(rhc.n_instances(), 0);
        assert_eq!(rhc.n_nonempty_instances(), 0);
    }

    #[test]
    fn add_readcondition_starts_with_zero_trigger_on_empty_cache() {
        let rhc = test_rhc(QosProfile::default());
        let cond = rhc.add_readcondition(
            SampleStateMask::ANY,
            ViewStateMask::ANY,
            InstanceStateMask::ANY,
        );
        assert!(!cond.get_trigger_value());
    }

    struct RecordingSink(Mutex<Vec<crate::status::StatusCbData>>);

    impl crate::status::StatusSink for RecordingSink {
        fn notify(&self, data: crate::status::StatusCbData) {
            self.0.lock().unwrap().push(data);
        }
    }

    /// E6: a deadline miss fires `REQUESTED_DEADLINE_MISSED` with the
    /// elapsed-periods count, and re-arms for the next period.
    #[test]
    fn e6_deadline_missed_fires_and_rearms() {
        let qos = QosProfile {
            deadline: crate::qos::deadline::Deadline::new(std::time::Duration::from_millis(100)),
            ..Default::default()
        };
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let rhc = Rhc::new(qos, Arc::new(ThreadedScheduler::new()), sink.clone()).unwrap();
        let tkmap = crate::tkmap::acquire();
        let w = crate::writer_info::WriterInfo {
            iid: 1,
            guid: [1u8; 16],
            ownership_strength: 0,
            auto_dispose: false,
            lifespan_exp: None,
        };

        let tk = tkmap.find(b"K", true).unwrap();
        let sd = crate::serdata::Serdata::new_data(Arc::from(&b"A"[..]), Arc::from(&b"K"[..]), 0);
        rhc.store(&w, sd, tk, None).unwrap();

        let next = rhc.clone().on_deadline_fire(110_000_000);
        {
            let events = sink.0.lock().unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(
                events[0].raw_status_id,
                crate::status::StatusId::RequestedDeadlineMissed
            );
            assert_eq!(events[0].extra, 1);
            assert_eq!(events[0].handle, Some(1));
        }
        assert_eq!(next, Some(210_000_000));

        let tk = tkmap.find(b"K", true).unwrap();
        let sd =
            crate::serdata::Serdata::new_data(Arc::from(&b"B"[..]), Arc::from(&b"K"[..]), 150_000_000);
        rhc.store(&w, sd, tk, None).unwrap();

        let next = rhc.clone().on_deadline_fire(250_000_000);
        assert!(next.unwrap() >= 250_000_000);
    }
}
