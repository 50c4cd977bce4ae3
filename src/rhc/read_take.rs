// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `read`/`take` (§4.2.6) and the trigger-count bookkeeping (§4.2.5) shared
//! between the store path and the read/take path.

use super::instance::{InstanceState, RhcInstance};
use super::sample::RhcSample;
use super::{Rhc, RhcInner, SampleInfo};
use crate::error::{Error, Result};
use crate::read_condition::{
    InstanceStateMask, QueryCondition, ReadCondition, SampleStateMask, ViewStateMask,
};
use crate::serdata::Serdata;
use std::sync::Arc;

pub(crate) fn instance_state_bit(state: InstanceState) -> InstanceStateMask {
    match state {
        InstanceState::Alive => InstanceStateMask::ALIVE,
        InstanceState::NotAliveDisposed => InstanceStateMask::NOT_ALIVE_DISPOSED,
        InstanceState::NotAliveNoWriters => InstanceStateMask::NOT_ALIVE_NO_WRITERS,
    }
}

pub(crate) fn view_state_bit(isnew: bool) -> ViewStateMask {
    if isnew {
        ViewStateMask::NEW
    } else {
        ViewStateMask::NOT_NEW
    }
}

pub(crate) fn sample_state_bit(isread: bool) -> SampleStateMask {
    if isread {
        SampleStateMask::READ
    } else {
        SampleStateMask::NOT_READ
    }
}

fn sample_state_matches(isread: bool, mask: SampleStateMask) -> bool {
    mask.contains(sample_state_bit(isread))
}

/// Does `inst`'s own (view, instance) state fall within the given masks?
/// Empty instances never match (§3.4: they never appear in the ring).
pub(crate) fn instance_matches(
    inst: &RhcInstance,
    _sample_state_mask: SampleStateMask,
    view_state_mask: ViewStateMask,
    instance_state_mask: InstanceStateMask,
) -> bool {
    if inst.is_empty() {
        return false;
    }
    instance_state_mask.contains(instance_state_bit(inst.instance_state()))
        && view_state_mask.contains(view_state_bit(inst.isnew))
}

/// Does `inst` contain at least one sample (real or invalid) whose sample
/// state is in `sample_state_mask` and, if `qmask` is given, whose query
/// mask overlaps it? `qmask = None` means "no content filter" — every
/// sample/invalid-slot in the right sample state matches regardless of its
/// query-mask bits (those bits only have meaning relative to a specific
/// attached [`QueryCondition`]).
pub(crate) fn instance_has_matching_sample(
    inst: &RhcInstance,
    sample_state_mask: SampleStateMask,
    qmask: Option<u64>,
) -> bool {
    let bit_ok = |bits: u64| qmask.map(|m| (bits & m) != 0).unwrap_or(true);
    let real = inst
        .samples
        .iter()
        .any(|s| sample_state_matches(s.isread, sample_state_mask) && bit_ok(s.qmask));
    if real {
        return true;
    }
    inst.inv_exists && sample_state_matches(inst.inv_isread, sample_state_mask) && bit_ok(inst.inv_qmask)
}

/// Whether `inst` currently contributes to a plain read condition's trigger
/// count (0 or 1 per instance, per §4.2.5).
pub(crate) fn instance_contributes_to_read_condition(
    inst: &RhcInstance,
    cond: &ReadCondition,
) -> bool {
    instance_matches(
        inst,
        cond.get_sample_state_mask(),
        cond.get_view_state_mask(),
        cond.get_instance_state_mask(),
    ) && instance_has_matching_sample(inst, cond.get_sample_state_mask(), None)
}

/// Number of samples in `inst` that currently match a query condition
/// (the query condition's own trigger counts matching *samples*, not
/// instances, per §4.2.5). The invalid slot never matches a query
/// condition (it carries no payload to filter against).
pub(crate) fn instance_query_match_count(inst: &RhcInstance, cond: &QueryCondition) -> u64 {
    let rc = cond.read_condition();
    if !instance_matches(
        inst,
        rc.get_sample_state_mask(),
        rc.get_view_state_mask(),
        rc.get_instance_state_mask(),
    ) {
        return 0;
    }
    let mask = cond.mask();
    inst.samples
        .iter()
        .filter(|s| sample_state_matches(s.isread, rc.get_sample_state_mask()) && (s.qmask & mask) != 0)
        .count() as u64
}

/// Number of non-empty instances currently matching `cond` (used only to
/// seed a freshly-attached read condition's trigger count).
pub(crate) fn count_matching_instances(inner: &RhcInner, cond: &ReadCondition) -> usize {
    inner
        .ring
        .iter()
        .filter(|iid| {
            inner
                .instances
                .get(iid)
                .map(instance_contributes_to_read_condition_with(cond))
                .unwrap_or(false)
        })
        .count()
}

fn instance_contributes_to_read_condition_with(
    cond: &ReadCondition,
) -> impl Fn(&RhcInstance) -> bool + '_ {
    move |inst| instance_contributes_to_read_condition(inst, cond)
}

/// Run `f` (a mutation of the instance identified by `iid`, or its removal)
/// and apply the resulting trigger-count delta to every registered read and
/// query condition, per §4.2.5's "update counts incrementally using pre/post
/// snapshots, not by rescanning" rule — rescanning is limited to the one
/// instance touched, never the whole cache.
pub(crate) fn with_trigger_deltas<F, R>(inner: &mut RhcInner, iid: u64, f: F) -> R
where
    F: FnOnce(&mut RhcInner) -> R,
{
    let n_read = inner.read_conditions.len();
    let n_query = inner.query_conditions.len();

    let mut pre_read = vec![false; n_read];
    for i in 0..n_read {
        let cond = inner.read_conditions[i].clone();
        pre_read[i] = inner
            .instances
            .get(&iid)
            .map(|inst| instance_contributes_to_read_condition(inst, &cond))
            .unwrap_or(false);
    }
    let mut pre_query = vec![0u64; n_query];
    for i in 0..n_query {
        let cond = inner.query_conditions[i].clone();
        pre_query[i] = inner
            .instances
            .get(&iid)
            .map(|inst| instance_query_match_count(inst, &cond))
            .unwrap_or(0);
    }

    let result = f(inner);

    for i in 0..n_read {
        let cond = inner.read_conditions[i].clone();
        let post = inner
            .instances
            .get(&iid)
            .map(|inst| instance_contributes_to_read_condition(inst, &cond))
            .unwrap_or(false);
        cond.apply_delta(post as i64 - pre_read[i] as i64);
    }
    for i in 0..n_query {
        let cond = inner.query_conditions[i].clone();
        let post = inner
            .instances
            .get(&iid)
            .map(|inst| instance_query_match_count(inst, &cond))
            .unwrap_or(0);
        cond.apply_delta(post as i64 - pre_query[i] as i64);
    }

    result
}

/// One returned sample, paired with the serdata (or `None` for the invalid
/// slot) and whether this traversal step takes (removes) or just reads it.
struct Taken {
    info: SampleInfo,
    serdata: Option<Serdata>,
}

#[derive(Clone, Copy)]
pub enum Mode {
    Read,
    Take,
}

impl Rhc {
    /// `read`/`take` over the whole cache or, when `handle` is given, scoped
    /// to one instance. Returns `(SampleInfo, Option<Serdata>)` pairs in
    /// insertion order per instance (§4.2.6); `serdata` is `None` for an
    /// invalid (state-change-only) sample.
    pub fn read(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        handle: Option<u64>,
        query: Option<&QueryCondition>,
        max_samples: usize,
    ) -> Result<Vec<(SampleInfo, Option<Serdata>)>> {
        self.read_or_take(
            Mode::Read,
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
            handle,
            query,
            max_samples,
        )
    }

    pub fn take(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        handle: Option<u64>,
        query: Option<&QueryCondition>,
        max_samples: usize,
    ) -> Result<Vec<(SampleInfo, Option<Serdata>)>> {
        self.read_or_take(
            Mode::Take,
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
            handle,
            query,
            max_samples,
        )
    }

    /// Serdata-only variants (`readcdr`/`takecdr`): same traversal, but
    /// callers that only need the wire bytes skip deserializing — since this
    /// crate never deserializes on the cache's behalf anyway, these are
    /// identical to `read`/`take` and exist only to match the external
    /// "borrow refs, do not deserialize" naming from §4.2.
    pub fn readcdr(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        handle: Option<u64>,
        query: Option<&QueryCondition>,
        max_samples: usize,
    ) -> Result<Vec<(SampleInfo, Option<Serdata>)>> {
        self.read(
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
            handle,
            query,
            max_samples,
        )
    }

    pub fn takecdr(
        &self,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        handle: Option<u64>,
        query: Option<&QueryCondition>,
        max_samples: usize,
    ) -> Result<Vec<(SampleInfo, Option<Serdata>)>> {
        self.take(
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
            handle,
            query,
            max_samples,
        )
    }

    fn read_or_take(
        &self,
        mode: Mode,
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        handle: Option<u64>,
        query: Option<&QueryCondition>,
        max_samples: usize,
    ) -> Result<Vec<(SampleInfo, Option<Serdata>)>> {
        if sample_state_mask.bits() == 0 || view_state_mask.bits() == 0 || instance_state_mask.bits() == 0
        {
            return Err(Error::BadParameter(
                "sample/view/instance state mask must have at least one bit set".to_string(),
            ));
        }
        let mut inner = self.inner.lock().unwrap();

        let iids: Vec<u64> = match handle {
            Some(h) => {
                if inner.instances.contains_key(&h) {
                    vec![h]
                } else {
                    return Err(Error::BadParameter(format!("no instance with handle {h}")));
                }
            }
            None => inner.ring.clone(),
        };

        let mut out: Vec<(SampleInfo, Option<Serdata>)> = Vec::new();
        let mut per_instance_counts: Vec<usize> = Vec::new();

        for iid in iids {
            if out.len() >= max_samples {
                break;
            }
            let budget = max_samples - out.len();
            let qmask = query.map(|q| q.mask());
            let taken = with_trigger_deltas(&mut inner, iid, |inner| {
                drain_instance(
                    inner,
                    iid,
                    mode,
                    sample_state_mask,
                    view_state_mask,
                    instance_state_mask,
                    qmask,
                    budget,
                )
            });
            if taken.is_empty() {
                continue;
            }
            per_instance_counts.push(taken.len());
            for t in taken {
                out.push((t.info, t.serdata));
            }
            inner.sync_instance_bookkeeping(iid);
        }

        inner.recount();
        patch_ranks(&mut out, &per_instance_counts);
        Ok(out)
    }
}

/// Traverse one instance oldest-to-newest, per §4.2.6, collecting up to
/// `budget` matching samples (then the invalid slot, if present and
/// matching). `Mode::Take` removes matched entries; `Mode::Read` marks them
/// read in place. Reading/taking any sample clears `isnew`.
#[allow(clippy::too_many_arguments)]
fn drain_instance(
    inner: &mut RhcInner,
    iid: u64,
    mode: Mode,
    sample_state_mask: SampleStateMask,
    view_state_mask: ViewStateMask,
    instance_state_mask: InstanceStateMask,
    qmask: Option<u64>,
    budget: usize,
) -> Vec<Taken> {
    let Some(inst) = inner.instances.get_mut(&iid) else {
        return Vec::new();
    };
    if !instance_matches(inst, sample_state_mask, view_state_mask, instance_state_mask) {
        return Vec::new();
    }
    let bit_ok = |bits: u64| qmask.map(|m| (bits & m) != 0).unwrap_or(true);

    let mut out = Vec::new();
    let mut keep = std::collections::VecDeque::new();
    let disposed_gen = inst.disposed_gen;
    let no_writers_gen = inst.no_writers_gen;
    let ref_gen = disposed_gen + no_writers_gen;
    let instance_state = instance_state_bit(inst.instance_state());
    let handle = inst.iid;

    while let Some(s) = inst.samples.pop_front() {
        if out.len() >= budget {
            keep.push_back(s);
            continue;
        }
        if !sample_state_matches(s.isread, sample_state_mask) || !bit_ok(s.qmask) {
            keep.push_back(s);
            continue;
        }
        let view_state = view_state_bit(inst.isnew);
        inst.isnew = false;
        let abs_gen_rank = (disposed_gen + no_writers_gen) as i64
            - (s.disposed_gen + s.no_writers_gen) as i64;
        let info = SampleInfo {
            sample_state: sample_state_bit(s.isread),
            view_state,
            instance_state,
            valid_data: true,
            instance_handle: handle,
            source_timestamp: s.source_timestamp,
            disposed_generation_count: s.disposed_gen,
            no_writers_generation_count: s.no_writers_gen,
            sample_rank: 0,
            generation_rank: 0,
            absolute_generation_rank: abs_gen_rank,
        };
        match mode {
            Mode::Take => {
                inst.nvread = inst.nvread.saturating_sub(s.isread as usize);
                out.push(Taken {
                    info,
                    serdata: Some(s.serdata),
                });
            }
            Mode::Read => {
                let mut s = s;
                if !s.isread {
                    s.isread = true;
                    inst.nvread += 1;
                }
                out.push(Taken {
                    info,
                    serdata: Some(s.serdata.clone()),
                });
                keep.push_back(s);
            }
        }
    }
    inst.samples = keep;

    if out.len() < budget
        && inst.inv_exists
        && sample_state_matches(inst.inv_isread, sample_state_mask)
        && bit_ok(inst.inv_qmask)
    {
        let view_state = view_state_bit(inst.isnew);
        inst.isnew = false;
        let info = SampleInfo {
            sample_state: sample_state_bit(inst.inv_isread),
            view_state,
            instance_state,
            valid_data: false,
            instance_handle: handle,
            source_timestamp: inst.tstamp,
            disposed_generation_count: disposed_gen,
            no_writers_generation_count: no_writers_gen,
            sample_rank: 0,
            generation_rank: 0,
            absolute_generation_rank: ref_gen as i64 - (disposed_gen + no_writers_gen) as i64,
        };
        match mode {
            Mode::Take => {
                inst.inv_exists = false;
                inst.inv_isread = false;
                inst.inv_qmask = 0;
            }
            Mode::Read => {
                inst.inv_isread = true;
            }
        }
        out.push(Taken { info, serdata: None });
    }

    out
}

/// Patch `sample_rank`/`generation_rank` so that, within each instance's
/// contiguous run inside `out`, the last entry reads `0, 0` and earlier
/// entries count back from it, per §4.2.6.
fn patch_ranks(out: &mut [(SampleInfo, Option<Serdata>)], per_instance_counts: &[usize]) {
    let mut pos = 0;
    for &count in per_instance_counts {
        if count == 0 {
            continue;
        }
        let last = count - 1;
        let ref_gen = out[pos + last].0.disposed_generation_count
            + out[pos + last].0.no_writers_generation_count;
        for i in 0..count {
            let (info, _) = &mut out[pos + i];
            info.sample_rank = (last - i) as u64;
            let own_gen = info.disposed_generation_count + info.no_writers_generation_count;
            info.generation_rank = ref_gen.saturating_sub(own_gen);
        }
        pos += count;
    }
}
