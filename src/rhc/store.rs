// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `store`/`unregister_writer` (§4.2.1-§4.2.4) and the lifespan-expiry
//! callback `on_lifespan_fire` in `mod.rs` drives.

use super::instance::{InstanceState, RhcInstance};
use super::lwregs::LiveWriterSet;
use super::read_take::with_trigger_deltas;
use super::sample::RhcSample;
use super::{Rhc, RhcConfig, RhcInner};
use crate::error::{Result, StoreOutcome};
use crate::scheduler::MonotonicTime;
use crate::serdata::{SampleKind, Serdata, StatusInfo};
use crate::status::{SampleRejectedReason, StatusCbData, StatusId, StatusSink};
use crate::tkmap::TkMapInstance;
use crate::writer_info::{Guid, WriterInfo};
use std::sync::Arc;

impl Rhc {
    /// Store one sample from `wrinfo`, per §4.2. `tk` is the TKMap instance
    /// the caller resolved for this sample's key and carries exactly one
    /// reference this call consumes: a brand-new instance keeps it
    /// permanently, an existing one immediately returns it (the instance's
    /// own `tk` already holds the permanent reference).
    ///
    /// Returns whether the sample was delivered: `true` unless the cache is
    /// `Reliable` and the sample was rejected outright (resource limits or
    /// the acceptance predicate) — a best-effort reader never blocks its
    /// writer on a rejection, per §4.2.3.
    pub fn store(
        self: &Arc<Self>,
        wrinfo: &WriterInfo,
        serdata: Serdata,
        tk: Arc<TkMapInstance>,
        content_filter: Option<&dyn Fn(&Serdata) -> bool>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let iid = tk.iid();
        let reliable = inner.config.reliable;
        let content_ok = content_filter.map(|f| f(&serdata)).unwrap_or(true);

        if !inner.instances.contains_key(&iid) {
            if inner.instances.len() >= inner.config.max_instances {
                drop(inner);
                self.tkmap.unref(&tk);
                self.status_sink.notify(StatusCbData {
                    raw_status_id: StatusId::SampleRejected(SampleRejectedReason::ByInstancesLimit),
                    extra: 0,
                    handle: Some(iid),
                    add: true,
                });
                log::debug!("[rhc] store: rejected new instance {iid}, max_instances reached");
                return Ok(!reliable);
            }
            // §4.2 step 2: a content/key filter rejecting a brand-new key
            // must not create an instance for it at all.
            if !content_ok {
                drop(inner);
                self.tkmap.unref(&tk);
                log::trace!("[rhc] store: filtered new-key sample for instance {iid}, no instance created");
                return Ok(true);
            }
            inner.instances.insert(iid, RhcInstance::new(iid, tk));
        } else {
            // The instance already holds its own permanent reference; this
            // call's `tk` is a redundant extra one the caller's `find` took.
            self.tkmap.unref(&tk);
        }

        let outcome = with_trigger_deltas(&mut inner, iid, |inner| {
            store_into_instance(inner, iid, wrinfo, serdata.clone(), content_ok, self.status_sink.as_ref())
        });

        let deadline_due = schedule_deadline(&mut inner, iid, &serdata);
        let lifespan_due = inner
            .instances
            .get(&iid)
            .and_then(|inst| inst.samples.back())
            .and_then(|s| s.lifespan_expiry)
            .filter(|_| matches!(outcome, StoreOutcome::Stored) && serdata.kind() == SampleKind::Data);

        inner.sync_instance_bookkeeping(iid);
        inner.recount();
        drop(inner);

        if let Some(at) = deadline_due {
            self.arm_deadline(iid, at);
        }
        if let Some(at) = lifespan_due {
            self.arm_lifespan(at);
        }

        match outcome {
            StoreOutcome::Stored | StoreOutcome::Filtered => Ok(true),
            StoreOutcome::Rejected => Ok(!reliable),
        }
    }

    /// Unregister one writer from the instance identified by `tk`, per
    /// §4.2.2. `tk` is consumed the same way `store`'s is.
    pub fn unregister_writer(
        self: &Arc<Self>,
        wrinfo: &WriterInfo,
        tk: Arc<TkMapInstance>,
        timestamp: MonotonicTime,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let iid = tk.iid();
        let existed = inner.instances.contains_key(&iid);
        self.tkmap.unref(&tk);
        if !existed {
            return Ok(());
        }

        with_trigger_deltas(&mut inner, iid, |inner| {
            unregister_writer_locked(inner, iid, wrinfo, timestamp);
        });
        inner.sync_instance_bookkeeping(iid);
        inner.recount();
        Ok(())
    }
}

/// Expire one lifespan-bearing sample (or the instance's invalid slot is
/// never lifespan-scheduled, so only real samples reach here), treating the
/// removal as a take for trigger-count/generation bookkeeping purposes, per
/// §4.2.7.
pub(crate) fn expire_sample(inner: &mut RhcInner, iid: u64, sample_id: u64) {
    with_trigger_deltas(inner, iid, |inner| {
        let Some(inst) = inner.instances.get_mut(&iid) else {
            return;
        };
        if let Some(pos) = inst.samples.iter().position(|s| s.sample_id == sample_id) {
            let removed = inst.samples.remove(pos).unwrap();
            inst.nvread = inst.nvread.saturating_sub(removed.isread as usize);
        }
    });
    inner.sync_instance_bookkeeping(iid);
    inner.recount();
}

/// Resolve the writer registration, acceptance predicate, view/disposed
/// state, and sample append/dispose/unregister handling for one incoming
/// `serdata` against the instance already present at `iid`. Trigger-count
/// bookkeeping is the caller's responsibility (`with_trigger_deltas`).
fn store_into_instance(
    inner: &mut RhcInner,
    iid: u64,
    wrinfo: &WriterInfo,
    serdata: Serdata,
    content_ok: bool,
    status_sink: &dyn StatusSink,
) -> StoreOutcome {
    let kind = serdata.kind();
    let statusinfo = serdata.statusinfo();
    let config = inner.config.clone();

    if kind == SampleKind::Data {
        let accepted = content_ok && {
            let inst = inner.instances.get(&iid).unwrap();
            accepts_ordering(inst, wrinfo, &serdata, &config)
        };
        if !accepted {
            let inst = inner.instances.get_mut(&iid).unwrap();
            let was_not_alive = inst.instance_state() != InstanceState::Alive;
            register_writer(inst, &mut inner.live_writers, wrinfo);
            if was_not_alive {
                // Preserved verbatim from the original acceptance predicate
                // (§9 open question): a rejected sample still flips a
                // not-alive instance's view state to NEW.
                inst.isnew = true;
            }
            if latest_sample_is_read_or_absent(inst) {
                install_invalid_slot(inst);
            }
            if !content_ok {
                return StoreOutcome::Filtered;
            }
            status_sink.notify(StatusCbData {
                raw_status_id: StatusId::SampleLost,
                extra: 0,
                handle: Some(iid),
                add: true,
            });
            return StoreOutcome::Rejected;
        }
    } else if !content_ok {
        let inst = inner.instances.get_mut(&iid).unwrap();
        register_writer(inst, &mut inner.live_writers, wrinfo);
        return StoreOutcome::Filtered;
    }

    let inst = inner.instances.get_mut(&iid).unwrap();
    let was_not_alive = inst.instance_state() != InstanceState::Alive;
    register_writer(inst, &mut inner.live_writers, wrinfo);
    if kind == SampleKind::Data {
        promote_accepted_writer(inst, &mut inner.live_writers, wrinfo);
    }
    if was_not_alive {
        inst.isnew = true;
    }
    if inst.disposed && kind == SampleKind::Data {
        inst.disposed = false;
        inst.disposed_gen += 1;
    }
    inst.tstamp = serdata.timestamp();

    let outcome = if kind == SampleKind::Data {
        append_data_sample(inner, iid, wrinfo, serdata, &config, status_sink)
    } else {
        if statusinfo.contains(StatusInfo::DISPOSE) {
            let inst = inner.instances.get_mut(&iid).unwrap();
            inst.disposed = true;
            if latest_sample_is_read_or_absent(inst) {
                install_invalid_slot(inst);
            }
        }
        StoreOutcome::Stored
    };

    if statusinfo.contains(StatusInfo::UNREGISTER) {
        unregister_writer_locked(inner, iid, wrinfo, serdata.timestamp());
    }

    outcome
}

/// Append a data-bearing sample to an instance whose writer has already been
/// registered and whose view/disposed state has already been updated for
/// this call, enforcing `history_depth`/`max_samples`/`max_samples_per_instance`
/// (§4.2.3) and computing the new sample's query mask against every
/// currently-attached `QueryCondition` (§4.2.5).
fn append_data_sample(
    inner: &mut RhcInner,
    iid: u64,
    wrinfo: &WriterInfo,
    serdata: Serdata,
    config: &RhcConfig,
    status_sink: &dyn StatusSink,
) -> StoreOutcome {
    let total_vsamples = inner.counters.n_vsamples as usize;
    let mut qmask = 0u64;
    for qc in inner.query_conditions.iter() {
        if qc.matches(&serdata) {
            qmask |= qc.mask();
        }
    }

    let at_instance_cap = inner
        .instances
        .get(&iid)
        .map(|inst| inst.nvsamples() >= config.history_depth)
        .unwrap_or(false);

    if config.history_is_keep_all && at_instance_cap {
        status_sink.notify(StatusCbData {
            raw_status_id: StatusId::SampleRejected(SampleRejectedReason::BySamplesPerInstanceLimit),
            extra: 0,
            handle: Some(iid),
            add: true,
        });
        return StoreOutcome::Rejected;
    }
    if total_vsamples >= config.max_samples {
        status_sink.notify(StatusCbData {
            raw_status_id: StatusId::SampleRejected(SampleRejectedReason::BySamplesLimit),
            extra: 0,
            handle: Some(iid),
            add: true,
        });
        return StoreOutcome::Rejected;
    }

    let inst = inner.instances.get_mut(&iid).unwrap();
    let sample_id = inst.next_sample_id();
    inst.inv_exists = false;
    inst.inv_isread = false;
    inst.inv_qmask = 0;

    let source_timestamp = inst.tstamp;
    let sample = RhcSample::new(
        serdata,
        source_timestamp,
        wrinfo.iid,
        inst.disposed_gen,
        inst.no_writers_gen,
        qmask,
        wrinfo.lifespan_exp,
        sample_id,
    );

    if !config.history_is_keep_all
        && config.history_depth != crate::config::LENGTH_UNLIMITED
        && inst.nvsamples() >= config.history_depth
    {
        if let Some(evicted) = inst.samples.pop_front() {
            if evicted.isread {
                inst.nvread = inst.nvread.saturating_sub(1);
            }
            inner.lifespan_heap.cancel((iid, evicted.sample_id));
        }
    }

    let inst = inner.instances.get_mut(&iid).unwrap();
    inst.samples.push_back(sample);
    StoreOutcome::Stored
}

/// Reschedule the instance's deadline timer against this sample's
/// timestamp, returning the new fire time for the caller to arm once the
/// cache lock is released. Only data samples reset the deadline clock.
///
/// The computed fire time is also cached in `inst.deadline_due`:
/// `on_deadline_fire` measures a missed-period count against that cached
/// value rather than re-reading `inst.tstamp`, since `tstamp` can keep
/// advancing between deadline fires (e.g. a dispose bumps it without going
/// through this function) while `deadline_due` always reflects exactly what
/// is currently armed in `deadline_heap`.
fn schedule_deadline(inner: &mut RhcInner, iid: u64, serdata: &Serdata) -> Option<MonotonicTime> {
    if serdata.kind() != SampleKind::Data {
        return None;
    }
    let period = inner.qos.deadline.period;
    if period.is_zero() || period == std::time::Duration::from_secs(u64::MAX) {
        return None;
    }
    let Some(inst) = inner.instances.get_mut(&iid) else {
        return None;
    };
    let due = inst.tstamp + period.as_nanos() as i64;
    inst.deadline_due = due;
    inner.deadline_heap.schedule(iid, due);
    Some(due)
}

/// Whether the instance's latest real sample has already been read (or none
/// exists), the condition under which a dispose/unregister/rejection must
/// synthesize the one-bit invalid slot instead of relying on an unread real
/// sample to carry the state change (§4.2.4).
fn latest_sample_is_read_or_absent(inst: &RhcInstance) -> bool {
    inst.samples.back().map(|s| s.isread).unwrap_or(true)
}

fn install_invalid_slot(inst: &mut RhcInstance) {
    inst.inv_exists = true;
    inst.inv_isread = false;
    inst.inv_qmask = 0;
}

/// Source-ordering (`DestinationOrder::BySourceTimestamp`), time-based
/// filter, and exclusive-ownership acceptance checks (§4.2.1). Content/key
/// filtering is handled by the caller before this is reached.
fn accepts_ordering(inst: &RhcInstance, wr: &WriterInfo, serdata: &Serdata, config: &RhcConfig) -> bool {
    let ts = serdata.timestamp();
    let has_prior = inst.tstamp != i64::MIN;

    if config.by_source_ordering && has_prior {
        if ts < inst.tstamp {
            return false;
        }
        if ts == inst.tstamp && !guid_less(&wr.guid, &inst.wr_guid) {
            return false;
        }
    }

    if !config.minimum_separation.is_zero() && has_prior {
        let min_sep_ns = config.minimum_separation.as_nanos() as i64;
        if ts < inst.tstamp + min_sep_ns {
            return false;
        }
    }

    if config.exclusive_ownership && inst.wr_iid_islive && inst.wr_iid != wr.iid {
        if wr.ownership_strength < inst.strength {
            return false;
        }
        if wr.ownership_strength == inst.strength && !guid_less(&wr.guid, &inst.wr_guid) {
            return false;
        }
    }

    true
}

fn guid_less(a: &Guid, b: &Guid) -> bool {
    a < b
}

/// Register `wr` against `inst`, per §4.2.2/§9's single-writer fast path:
/// the first (or sole) writer lives in `inst.wr_*` directly, a second and
/// later writer spill into the overflow `LiveWriterSet`. Bumps
/// `no_writers_gen` only when a writer reappears after a genuine
/// no-writers gap (`never_registered` guards the instance's very first
/// registration from being miscounted as such a gap).
fn register_writer(inst: &mut RhcInstance, live_writers: &mut LiveWriterSet, wr: &WriterInfo) {
    if inst.wr_iid_islive && inst.wr_iid == wr.iid {
        inst.wr_guid = wr.guid;
        inst.strength = wr.ownership_strength;
        inst.autodispose = wr.auto_dispose;
        return;
    }
    if live_writers.contains(inst.iid, wr.iid) {
        return;
    }

    if inst.wrcount == 0 {
        if !inst.never_registered {
            inst.no_writers_gen += 1;
        }
        inst.never_registered = false;
        inst.wrcount = 1;
        inst.wr_iid = wr.iid;
        inst.wr_guid = wr.guid;
        inst.wr_iid_islive = true;
        inst.strength = wr.ownership_strength;
        inst.autodispose = wr.auto_dispose;
        return;
    }

    if inst.wrcount == 1 && !inst.wr_iid_islive {
        // Post-unregister transient (§4.2.2): the one remaining writer's
        // identity was demoted out of the cache but its count was kept.
        inst.wr_iid = wr.iid;
        inst.wr_guid = wr.guid;
        inst.wr_iid_islive = true;
        inst.strength = wr.ownership_strength;
        inst.autodispose = wr.auto_dispose;
        return;
    }

    live_writers.add(inst.iid, wr.iid);
    inst.wrcount += 1;
    if wr.auto_dispose {
        inst.autodispose = true;
    }
}

/// Re-point the instance's fast-path cached writer (`wr_iid`/`wr_guid`/
/// `strength`) at `wr` on every accepted data sample, not just the first or
/// lone-overflow-promoted writer. `register_writer` only ever establishes
/// *membership*; the exclusive-ownership and source-ordering tie-break
/// checks in `accepts_ordering` compare against whichever writer is
/// currently cached, so that cache must track the most recently accepted
/// writer the way the original's `update_inst_have_wr_iid`/
/// `update_inst_common` do on every accept, or a second registered writer
/// that wins ownership is never actually recognized as the new owner.
fn promote_accepted_writer(inst: &mut RhcInstance, live_writers: &mut LiveWriterSet, wr: &WriterInfo) {
    if inst.wr_iid_islive && inst.wr_iid == wr.iid {
        inst.wr_guid = wr.guid;
        inst.strength = wr.ownership_strength;
        return;
    }
    if inst.wr_iid_islive {
        // The writer being displaced from the cache is still registered;
        // keep it a member via the overflow set instead of losing it.
        live_writers.add(inst.iid, inst.wr_iid);
    }
    live_writers.delete(inst.iid, wr.iid);
    inst.wr_iid = wr.iid;
    inst.wr_guid = wr.guid;
    inst.wr_iid_islive = true;
    inst.strength = wr.ownership_strength;
}

/// Unregister `wr` from `inst`, per §4.2.2. Drops the invalid-slot-carrying
/// no-writers transition onto the instance when it becomes writerless, and
/// auto-disposes it first if any registered writer requested it.
fn unregister_writer_locked(inner: &mut RhcInner, iid: u64, wr: &WriterInfo, timestamp: MonotonicTime) {
    let Some(inst) = inner.instances.get_mut(&iid) else {
        return;
    };

    let is_cached = inst.wr_iid_islive && inst.wr_iid == wr.iid;
    let is_in_set = inner.live_writers.contains(iid, wr.iid);
    if !is_cached && !is_in_set {
        return;
    }

    if is_cached {
        inst.wr_iid_islive = false;
        if inst.wrcount > 1 {
            inst.wrcount -= 1;
            // Promote a remaining overflow-set writer into the fast-path
            // cache so the instance always has one cached writer whenever
            // it has any live writer at all. Its guid/strength/autodispose
            // stay at their previous (stale) values until that writer's
            // own next `store`/`unregister_writer` call refreshes them —
            // tolerable since those fields are only consulted for
            // ordering/ownership tie-breaks against a *different* writer.
            if let Some(next) = inner.live_writers.any_writer_for(iid) {
                inner.live_writers.delete(iid, next);
                let inst = inner.instances.get_mut(&iid).unwrap();
                inst.wr_iid = next;
                inst.wr_iid_islive = true;
            }
        } else {
            inst.wrcount = 0;
        }
    } else {
        inner.live_writers.delete(iid, wr.iid);
        inst.wrcount = inst.wrcount.saturating_sub(1);
    }

    let inst = inner.instances.get_mut(&iid).unwrap();
    inst.tstamp = inst.tstamp.max(timestamp);
    if inst.wrcount == 0 {
        let autodispose = inst.autodispose || wr.auto_dispose;
        if autodispose && !inst.disposed {
            inst.disposed = true;
        }
        if latest_sample_is_read_or_absent(inst) {
            install_invalid_slot(inst);
        }
    }
}
