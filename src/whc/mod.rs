// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer History Cache: the per-writer, sequence-number-ordered sample
//! store that backs retransmission and transient-local replay.
//!
//! Grounded on this crate's writer-side retransmission ring
//! (`reliability/history_cache.rs`'s `HistoryCache`/`CacheEntry`: FIFO
//! eviction under a `History`/`ResourceLimits` quota, `remove_acknowledged`,
//! `snapshot_payloads_limited`) generalized from a raw slab-backed byte
//! buffer to the `Serdata` seam the RHC already stores, and extended with
//! the per-instance transient-local retention and borrow/return handshake
//! that a pure retransmission ring does not need.

pub mod config;
pub mod idxnode;
pub mod sample;

use crate::error::{Error, Result};
use crate::qos::QosProfile;
use crate::scheduler::{now, EventScheduler, MonotonicTime};
use crate::serdata::{SampleKind, Serdata, StatusInfo};
use crate::status::{StatusCbData, StatusId, StatusSink};
use crate::support::ExpiryHeap;
use crate::tkmap::{TkMapInstance, Tkmap};
use config::WhcConfig;
use idxnode::WhcIdxNode;
use sample::WhcSample;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Weak};

/// Snapshot returned by [`Whc::get_state`] (§4.3's `get_state`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WhcState {
    pub min_seq: Option<u64>,
    pub max_seq: Option<u64>,
    pub unacked_bytes: usize,
}

/// A sample handle returned by `borrow_sample`/`borrow_sample_key`, exclusive
/// until passed back to [`Whc::return_sample`]. Dropping it without
/// returning leaves the sample's `borrowed` bit set, matching the "until
/// returned no other thread may re-borrow it" contract — callers are
/// expected to always pair borrow with return, including on error paths.
pub struct BorrowedSample {
    pub seq: u64,
    pub serdata: Serdata,
}

/// Opaque cursor for `sample_iter_init`/`sample_iter_borrow_next`.
pub struct WhcSampleIter {
    after_seq: u64,
}

pub(crate) struct WhcInner {
    pub(crate) tkmap: Arc<Tkmap>,
    pub(crate) qos: QosProfile,
    pub(crate) config: WhcConfig,
    /// Canonical seq-order structure (§3.7): the per-writer tree of
    /// contiguous-seq intervals collapses, in a single-mutex-protected Rust
    /// store, to an ordered map keyed by seq — `BTreeMap::range` gives the
    /// "always an open interval at the high end" and "global hash from seq
    /// to node" properties for free, without hand-rolled interval splitting.
    pub(crate) by_seq: BTreeMap<u64, WhcSample>,
    pub(crate) instances: HashMap<u64, WhcIdxNode>,
    pub(crate) unacked_bytes: usize,
    pub(crate) lifespan_heap: ExpiryHeap<u64>,
    pub(crate) deadline_heap: ExpiryHeap<u64>,
}

impl WhcInner {
    fn state(&self) -> WhcState {
        WhcState {
            min_seq: self.by_seq.keys().next().copied(),
            max_seq: self.by_seq.keys().next_back().copied(),
            unacked_bytes: self.unacked_bytes,
        }
    }

    /// Remove `seq` from both the seq-order map and its owning instance's
    /// circular history, adjusting `unacked_bytes`. Returns the removed
    /// sample's serdata, if it was still present.
    fn remove_sample(&mut self, seq: u64) -> Option<Serdata> {
        let sample = self.by_seq.remove(&seq)?;
        if sample.unacked {
            self.unacked_bytes = self.unacked_bytes.saturating_sub(sample.size());
        }
        if let Some(node) = self.instances.get_mut(&sample.instance_iid) {
            node.remove(seq);
        }
        self.lifespan_heap.cancel(seq);
        Some(sample.serdata)
    }
}

/// A writer history cache. Cheaply clonable (`Arc`-backed); obtained via
/// [`Whc::new`], mirroring [`crate::rhc::Rhc::new`]'s shape for the same
/// re-entrant-scheduler-callback reason.
pub struct Whc {
    pub(crate) tkmap: Arc<Tkmap>,
    pub(crate) scheduler: Arc<dyn EventScheduler>,
    pub(crate) status_sink: Arc<dyn StatusSink>,
    pub(crate) inner: Mutex<WhcInner>,
    self_weak: Mutex<Weak<Whc>>,
}

impl Whc {
    pub fn new(
        qos: QosProfile,
        scheduler: Arc<dyn EventScheduler>,
        status_sink: Arc<dyn StatusSink>,
    ) -> Result<Arc<Self>> {
        qos.validate().map_err(Error::BadParameter)?;
        let config = WhcConfig::from_qos(&qos);
        let tkmap = crate::tkmap::acquire();
        let inner = WhcInner {
            tkmap: tkmap.clone(),
            qos,
            config,
            by_seq: BTreeMap::new(),
            instances: HashMap::new(),
            unacked_bytes: 0,
            lifespan_heap: ExpiryHeap::new(),
            deadline_heap: ExpiryHeap::new(),
        };
        let whc = Arc::new(Self {
            tkmap,
            scheduler,
            status_sink,
            inner: Mutex::new(inner),
            self_weak: Mutex::new(Weak::new()),
        });
        *whc.self_weak.lock().unwrap() = Arc::downgrade(&whc);
        Ok(whc)
    }

    fn weak_self(&self) -> Weak<Whc> {
        self.self_weak.lock().unwrap().clone()
    }

    pub fn n_samples(&self) -> usize {
        self.inner.lock().unwrap().by_seq.len()
    }

    pub fn n_instances(&self) -> usize {
        self.inner.lock().unwrap().instances.len()
    }

    pub fn get_state(&self) -> WhcState {
        self.inner.lock().unwrap().state()
    }

    /// Smallest seq strictly greater than `seq` currently present, if any
    /// (§4.3's `next_seq`; "else ∞" is `None` on the Rust side).
    pub fn next_seq(&self, seq: u64) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        inner
            .by_seq
            .range((std::ops::Bound::Excluded(seq), std::ops::Bound::Unbounded))
            .next()
            .map(|(&s, _)| s)
    }

    /// Insert a sample at `seq`, which must strictly exceed every seq
    /// currently in the cache (§4.3.1). `tk` is consumed the same way
    /// `Rhc::store`'s is: a brand-new instance index node keeps the
    /// reference permanently, an existing one immediately returns it.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        self: &Arc<Self>,
        max_drop_seq: u64,
        seq: u64,
        expiry: Option<MonotonicTime>,
        serdata: Serdata,
        tk: Arc<TkMapInstance>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some((&max, _)) = inner.by_seq.iter().next_back() {
            if seq <= max {
                self.tkmap.unref(&tk);
                return Err(Error::PreconditionNotMet(
                    "insert: seq must strictly exceed any seq currently in the cache".to_string(),
                ));
            }
        }

        let iid = tk.iid();
        if !inner.instances.contains_key(&iid) {
            inner.instances.insert(iid, WhcIdxNode::new(iid, tk));
        } else {
            self.tkmap.unref(&tk);
        }

        let is_pure_unregister =
            serdata.kind() == SampleKind::Key && serdata.statusinfo().contains(StatusInfo::UNREGISTER);
        let size = serdata.size();
        let config = inner.config;

        let evicted = inner
            .instances
            .get_mut(&iid)
            .and_then(|node| node.push(seq, config.idxdepth));
        if let Some(evicted_seq) = evicted {
            let keep_transient_local_forever = config.is_transient_local && config.tldepth == 0;
            let should_drop = !keep_transient_local_forever
                && (config.history_is_keep_last() || evicted_seq <= max_drop_seq);
            if should_drop {
                inner.remove_sample(evicted_seq);
            }
        }

        let cumulative = inner
            .by_seq
            .values()
            .next_back()
            .map(|s| s.cumulative_bytes + size)
            .unwrap_or(size);
        let unacked = seq > max_drop_seq;
        let whc_sample = WhcSample {
            serdata,
            writer_iid: iid,
            seq,
            cumulative_bytes: cumulative,
            unacked,
            borrowed: false,
            retransmit_count: 0,
            last_retransmit: None,
            instance_iid: iid,
            lifespan_expiry: expiry,
        };
        inner.by_seq.insert(seq, whc_sample);
        if unacked {
            inner.unacked_bytes += size;
        }
        if let Some(at) = expiry {
            inner.lifespan_heap.schedule(seq, at);
        }

        if is_pure_unregister {
            if let Some(node) = inner.instances.remove(&iid) {
                inner.tkmap.unref(&node.tk);
            }
            inner.deadline_heap.cancel(iid);
            if seq <= max_drop_seq {
                inner.remove_sample(seq);
            }
        } else if config.has_deadline {
            let period = inner.qos.deadline.period.as_nanos() as i64;
            inner.deadline_heap.schedule(iid, now() + period);
        }

        let lifespan_due = expiry;
        let deadline_due = if !is_pure_unregister && config.has_deadline {
            inner.deadline_heap.peek_due()
        } else {
            None
        };
        drop(inner);

        if let Some(at) = lifespan_due {
            self.arm_lifespan(at);
        }
        if let Some(at) = deadline_due {
            self.arm_deadline(at);
        }
        Ok(())
    }

    /// Walk the seq order up to `max_drop_seq`, dropping every sample not
    /// protected by its instance's transient-local window (§4.3.2). Returns
    /// the removed count, the resulting state, and the deferred free list
    /// the caller must drain (by dropping it) once it has released any lock
    /// of its own and drained in-flight network submissions.
    pub fn remove_acked_messages(&self, max_drop_seq: u64) -> (usize, WhcState, Vec<Serdata>) {
        let mut inner = self.inner.lock().unwrap();
        let candidates: Vec<u64> = inner
            .by_seq
            .range(..=max_drop_seq)
            .map(|(&s, _)| s)
            .collect();

        let mut freed = Vec::with_capacity(candidates.len());
        for seq in candidates {
            let Some(sample) = inner.by_seq.get(&seq) else {
                continue;
            };
            let iid = sample.instance_iid;
            let protected = if inner.config.is_transient_local && inner.config.tldepth == 0 {
                true
            } else if inner.config.tldepth > 0 {
                inner
                    .instances
                    .get(&iid)
                    .and_then(|node| node.rank_from_newest(seq))
                    .map(|rank| rank < inner.config.tldepth as usize)
                    .unwrap_or(false)
            } else {
                false
            };

            if protected {
                if let Some(s) = inner.by_seq.get_mut(&seq) {
                    if s.unacked {
                        inner.unacked_bytes = inner.unacked_bytes.saturating_sub(s.size());
                        s.unacked = false;
                    }
                }
                continue;
            }

            if let Some(sd) = inner.remove_sample(seq) {
                freed.push(sd);
            }
        }

        for node in inner.instances.values_mut() {
            node.prune_seq = node.prune_seq.max(max_drop_seq);
        }

        let count = freed.len();
        let state = inner.state();
        log::trace!("[whc] remove_acked_messages({max_drop_seq}) dropped {count} sample(s)");
        (count, state, freed)
    }

    /// Drop every serdata reference in a deferred free list returned by
    /// `remove_acked_messages`. Exists as an explicit call (rather than
    /// leaving it to the caller's own scope) so the "exactly once per
    /// returned list" contract has a named place to be honored.
    pub fn free_deferred_free_list(&self, list: Vec<Serdata>) {
        drop(list);
    }

    /// Exclusive-borrow the sample at `seq`. Returns `None` if absent or
    /// already borrowed.
    pub fn borrow_sample(&self, seq: u64) -> Option<BorrowedSample> {
        let mut inner = self.inner.lock().unwrap();
        let sample = inner.by_seq.get_mut(&seq)?;
        if sample.borrowed {
            return None;
        }
        sample.borrowed = true;
        Some(BorrowedSample {
            seq,
            serdata: sample.serdata.clone(),
        })
    }

    /// Exclusive-borrow the newest sample of the instance identified by
    /// `key_bytes`, if any.
    pub fn borrow_sample_key(&self, key_bytes: &[u8]) -> Option<BorrowedSample> {
        let mut inner = self.inner.lock().unwrap();
        let iid = inner.tkmap.lookup(key_bytes)?;
        let seq = inner.instances.get(&iid)?.order.back().copied()?;
        let sample = inner.by_seq.get_mut(&seq)?;
        if sample.borrowed {
            return None;
        }
        sample.borrowed = true;
        Some(BorrowedSample {
            seq,
            serdata: sample.serdata.clone(),
        })
    }

    /// Return a handle obtained from `borrow_sample`/`borrow_sample_key`.
    /// Returning a handle whose sample was since removed silently unrefs the
    /// serdata (dropping `handle` does that); `update_retransmit_info` bumps
    /// the sample's retransmit counter and timestamp when it is still
    /// present.
    pub fn return_sample(&self, handle: BorrowedSample, update_retransmit_info: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sample) = inner.by_seq.get_mut(&handle.seq) {
            if !sample.borrowed {
                return Err(Error::PreconditionNotMet(
                    "return_sample: handle was not borrowed".to_string(),
                ));
            }
            sample.borrowed = false;
            if update_retransmit_info {
                sample.retransmit_count += 1;
                sample.last_retransmit = Some(now());
            }
        }
        Ok(())
    }

    pub fn sample_iter_init(&self) -> WhcSampleIter {
        WhcSampleIter { after_seq: 0 }
    }

    /// Borrow the next not-currently-borrowed sample in seq order, advancing
    /// the cursor past it regardless of whether it was returned (a borrowed-
    /// over sample is skipped, not retried).
    pub fn sample_iter_borrow_next(&self, iter: &mut WhcSampleIter) -> Option<BorrowedSample> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            let next = inner
                .by_seq
                .range((std::ops::Bound::Excluded(iter.after_seq), std::ops::Bound::Unbounded))
                .next()
                .map(|(&s, _)| s)?;
            iter.after_seq = next;
            let sample = inner.by_seq.get_mut(&next).unwrap();
            if sample.borrowed {
                continue;
            }
            sample.borrowed = true;
            return Some(BorrowedSample {
                seq: next,
                serdata: sample.serdata.clone(),
            });
        }
    }

    fn arm_lifespan(self: &Arc<Self>, at: MonotonicTime) {
        let weak = self.weak_self();
        self.scheduler.schedule_at(
            at,
            Arc::new(move |fire_time| {
                let whc = weak.upgrade()?;
                whc.on_lifespan_fire(fire_time)
            }),
        );
    }

    fn on_lifespan_fire(self: Arc<Self>, fire_time: MonotonicTime) -> Option<MonotonicTime> {
        let mut inner = self.inner.lock().unwrap();
        let due = inner.lifespan_heap.pop_expired(fire_time);
        let mut freed = Vec::with_capacity(due.len());
        for seq in due {
            if let Some(sd) = inner.remove_sample(seq) {
                freed.push(sd);
            }
        }
        let next = inner.lifespan_heap.peek_due();
        drop(inner);
        drop(freed);
        next
    }

    fn arm_deadline(self: &Arc<Self>, at: MonotonicTime) {
        let weak = self.weak_self();
        self.scheduler.schedule_at(
            at,
            Arc::new(move |fire_time| {
                let whc = weak.upgrade()?;
                whc.on_deadline_fire(fire_time)
            }),
        );
    }

    fn on_deadline_fire(self: Arc<Self>, fire_time: MonotonicTime) -> Option<MonotonicTime> {
        let mut inner = self.inner.lock().unwrap();
        let period_ns = {
            let p = inner.qos.deadline.period;
            if p.is_zero() || p == std::time::Duration::from_secs(u64::MAX) {
                return None;
            }
            p.as_nanos() as i64
        };
        let due = inner.deadline_heap.pop_expired(fire_time);
        for iid in due {
            if !inner.instances.contains_key(&iid) {
                continue;
            }
            drop(inner);
            self.status_sink.notify(StatusCbData {
                raw_status_id: StatusId::OfferedDeadlineMissed,
                extra: 1,
                handle: Some(iid),
                add: true,
            });
            inner = self.inner.lock().unwrap();
            let next = fire_time + period_ns;
            inner.deadline_heap.schedule(iid, next);
        }
        inner.deadline_heap.peek_due()
    }
}

impl Drop for Whc {
    fn drop(&mut self) {
        crate::tkmap::release();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scheduler::ThreadedScheduler;
    use crate::status::NullStatusSink;
    use std::sync::Arc as StdArc;

    pub(crate) fn test_whc(qos: QosProfile) -> Arc<Whc> {
        Whc::new(qos, StdArc::new(ThreadedScheduler::new()), StdArc::new(NullStatusSink)).unwrap()
    }

    fn key_sample(key: &[u8], payload: &[u8], ts: i64) -> Serdata {
        Serdata::new_data(Arc::from(payload.to_vec()), Arc::from(key.to_vec()), ts)
    }

    #[test]
    fn fresh_whc_has_no_samples() {
        let whc = test_whc(QosProfile::default());
        assert_eq!(whc.n_samples(), 0);
        let state = whc.get_state();
        assert_eq!(state.min_seq, None);
        assert_eq!(state.max_seq, None);
    }

    #[test]
    fn insert_rejects_non_monotonic_seq() {
        let whc = test_whc(QosProfile::default());
        let tkmap = crate::tkmap::acquire();
        let tk = tkmap.find(b"K", true).unwrap();
        whc.insert(0, 1, None, key_sample(b"K", b"A", 100), tk).unwrap();

        let tk = tkmap.find(b"K", true).unwrap();
        let err = whc.insert(0, 1, None, key_sample(b"K", b"B", 200), tk);
        assert!(err.is_err());
    }

    /// I5: unacked_bytes equals the sum of unacked samples with seq beyond
    /// max_drop_seq.
    #[test]
    fn unacked_bytes_matches_unacked_samples_past_max_drop_seq() {
        let whc = test_whc(QosProfile::default());
        let tkmap = crate::tkmap::acquire();
        for (seq, payload) in [(1u64, b"A" as &[u8]), (2, b"BB"), (3, b"CCC")] {
            let tk = tkmap.find(b"K", true).unwrap();
            whc.insert(0, seq, None, key_sample(b"K", payload, seq as i64), tk)
                .unwrap();
        }
        let state = whc.get_state();
        assert_eq!(state.unacked_bytes, 1 + 2 + 3);
    }

    /// E5: ACK-driven prune with transient-local depth 2 leaves only the two
    /// newest samples of the key, returning the older three for freeing.
    #[test]
    fn e5_ack_driven_prune_keeps_transient_local_window() {
        let qos = QosProfile {
            history: crate::qos::History::KeepLast(5),
            durability: crate::qos::Durability::TransientLocal,
            durability_service: crate::qos::durability_service::DurabilityService {
                history_depth: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let whc = test_whc(qos);
        let tkmap = crate::tkmap::acquire();
        for seq in 1u64..=5 {
            let tk = tkmap.find(b"K", true).unwrap();
            whc.insert(0, seq, None, key_sample(b"K", b"x", seq as i64), tk)
                .unwrap();
        }

        let (count, state, freed) = whc.remove_acked_messages(5);
        assert_eq!(count, 3);
        assert_eq!(freed.len(), 3);
        assert_eq!(state.min_seq, Some(4));
        assert_eq!(state.max_seq, Some(5));
        assert_eq!(whc.n_samples(), 2);
    }

    /// L2: repeating remove_acked_messages with the same N is a no-op.
    #[test]
    fn l2_repeated_remove_acked_messages_is_idempotent() {
        let whc = test_whc(QosProfile::default());
        let tkmap = crate::tkmap::acquire();
        for seq in 1u64..=3 {
            let tk = tkmap.find(b"K", true).unwrap();
            whc.insert(0, seq, None, key_sample(b"K", b"x", seq as i64), tk)
                .unwrap();
        }
        let (first_count, _, _) = whc.remove_acked_messages(3);
        assert_eq!(first_count, 3);
        let (second_count, _, second_freed) = whc.remove_acked_messages(3);
        assert_eq!(second_count, 0);
        assert!(second_freed.is_empty());
    }

    #[test]
    fn borrow_then_return_clears_borrowed_bit_and_bumps_retransmit() {
        let whc = test_whc(QosProfile::default());
        let tkmap = crate::tkmap::acquire();
        let tk = tkmap.find(b"K", true).unwrap();
        whc.insert(0, 1, None, key_sample(b"K", b"A", 100), tk).unwrap();

        let handle = whc.borrow_sample(1).expect("sample should be borrowable");
        assert!(whc.borrow_sample(1).is_none(), "already-borrowed sample must not re-borrow");
        whc.return_sample(handle, true).unwrap();
        assert!(whc.borrow_sample(1).is_some());
    }

    #[test]
    fn next_seq_yields_strictly_ascending_values() {
        let whc = test_whc(QosProfile::default());
        let tkmap = crate::tkmap::acquire();
        for seq in [1u64, 2, 5] {
            let tk = tkmap.find(b"K", true).unwrap();
            whc.insert(0, seq, None, key_sample(b"K", b"x", seq as i64), tk)
                .unwrap();
        }
        assert_eq!(whc.next_seq(0), Some(1));
        assert_eq!(whc.next_seq(1), Some(2));
        assert_eq!(whc.next_seq(2), Some(5));
        assert_eq!(whc.next_seq(5), None);
    }

    #[test]
    fn sample_iter_walks_in_seq_order_and_skips_borrowed() {
        let whc = test_whc(QosProfile::default());
        let tkmap = crate::tkmap::acquire();
        for seq in 1u64..=3 {
            let tk = tkmap.find(b"K", true).unwrap();
            whc.insert(0, seq, None, key_sample(b"K", b"x", seq as i64), tk)
                .unwrap();
        }
        let held = whc.borrow_sample(2).unwrap();
        let mut iter = whc.sample_iter_init();
        let first = whc.sample_iter_borrow_next(&mut iter).unwrap();
        assert_eq!(first.seq, 1);
        let second = whc.sample_iter_borrow_next(&mut iter).unwrap();
        assert_eq!(second.seq, 3);
        assert!(whc.sample_iter_borrow_next(&mut iter).is_none());
        whc.return_sample(held, false).unwrap();
    }

    /// I5 under randomized traffic: after any interleaving of inserts and
    /// ACK sweeps, `unacked_bytes` always equals the sum of sizes of
    /// samples still marked unacked.
    #[test]
    fn i5_unacked_bytes_holds_under_random_insert_and_ack_sequences() {
        let whc = test_whc(QosProfile {
            history: crate::qos::History::KeepAll,
            resource_limits: crate::qos::ResourceLimits {
                max_samples: 10_000,
                max_instances: crate::config::LENGTH_UNLIMITED,
                max_samples_per_instance: 10_000,
                max_quota_bytes: 100_000_000,
            },
            ..Default::default()
        });
        let tkmap = crate::tkmap::acquire();
        let mut seq = 0u64;
        let mut max_drop_seq = 0u64;
        for _ in 0..200 {
            seq += 1;
            let key = format!("key-{}", fastrand::usize(..8));
            let tk = tkmap.find(key.as_bytes(), true).unwrap();
            let payload = vec![0u8; 1 + fastrand::usize(..32)];
            whc.insert(
                max_drop_seq,
                seq,
                None,
                key_sample(key.as_bytes(), &payload, seq as i64),
                tk,
            )
            .unwrap();

            if fastrand::bool() {
                max_drop_seq = max_drop_seq.max(seq.saturating_sub(fastrand::u64(..5)));
                whc.remove_acked_messages(max_drop_seq);
            }

            let inner = whc.inner.lock().unwrap();
            let expected: usize = inner
                .by_seq
                .values()
                .filter(|s| s.unacked)
                .map(|s| s.size())
                .sum();
            assert_eq!(inner.unacked_bytes, expected);
        }
    }

    /// KEEP_ALL transient-local (tldepth == 0) never drops samples on ACK,
    /// only clears the unacked bit.
    #[test]
    fn keep_all_transient_local_never_drops_on_ack() {
        let qos = QosProfile {
            history: crate::qos::History::KeepAll,
            durability: crate::qos::Durability::TransientLocal,
            durability_service: crate::qos::durability_service::DurabilityService {
                history_depth: 0,
                ..Default::default()
            },
            resource_limits: crate::qos::ResourceLimits {
                max_samples: 100,
                max_instances: 10,
                max_samples_per_instance: 100,
                max_quota_bytes: 1_000_000,
            },
            ..Default::default()
        };
        let whc = test_whc(qos);
        // tldepth == 0 with is_transient_local is the "retain forever"
        // sentinel (§4.3.2): every acked sample stays protected regardless
        // of the index node's idxdepth-bounded `order` ring.
        let tkmap = crate::tkmap::acquire();
        for seq in 1u64..=3 {
            let tk = tkmap.find(b"K", true).unwrap();
            whc.insert(0, seq, None, key_sample(b"K", b"x", seq as i64), tk)
                .unwrap();
        }
        let (count, _, freed) = whc.remove_acked_messages(3);
        assert_eq!(count, 0);
        assert!(freed.is_empty());
    }
}
