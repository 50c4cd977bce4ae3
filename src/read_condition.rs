// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `ReadCondition` and `QueryCondition` — sample/view/instance-state
//! predicates with an atomic trigger *count*, attachable to one [`Rhc`](crate::rhc::Rhc).
//!
//! Unlike [`crate::condition::StatusCondition`] (boolean), a read condition's
//! trigger value is the number of matching instances (or, for a query
//! condition, matching samples). The count is maintained incrementally by
//! the owning cache from pre/post snapshots around each mutation, never by
//! rescanning; `get_trigger_value()` is simply `trigger_count() > 0`.

use crate::condition::Condition;
use crate::serdata::Serdata;
use crate::waitset::WaitsetSignal;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleStateMask(u32);

impl SampleStateMask {
    pub const READ: SampleStateMask = SampleStateMask(1 << 0);
    pub const NOT_READ: SampleStateMask = SampleStateMask(1 << 1);
    pub const ANY: SampleStateMask = SampleStateMask(Self::READ.0 | Self::NOT_READ.0);

    pub const fn from_bits(bits: u32) -> Self {
        SampleStateMask(bits)
    }
    pub const fn bits(&self) -> u32 {
        self.0
    }
    pub const fn contains(&self, other: SampleStateMask) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for SampleStateMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        SampleStateMask(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewStateMask(u32);

impl ViewStateMask {
    pub const NEW: ViewStateMask = ViewStateMask(1 << 0);
    pub const NOT_NEW: ViewStateMask = ViewStateMask(1 << 1);
    pub const ANY: ViewStateMask = ViewStateMask(Self::NEW.0 | Self::NOT_NEW.0);

    pub const fn from_bits(bits: u32) -> Self {
        ViewStateMask(bits)
    }
    pub const fn bits(&self) -> u32 {
        self.0
    }
    pub const fn contains(&self, other: ViewStateMask) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ViewStateMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        ViewStateMask(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceStateMask(u32);

impl InstanceStateMask {
    pub const ALIVE: InstanceStateMask = InstanceStateMask(1 << 0);
    pub const NOT_ALIVE_DISPOSED: InstanceStateMask = InstanceStateMask(1 << 1);
    pub const NOT_ALIVE_NO_WRITERS: InstanceStateMask = InstanceStateMask(1 << 2);
    pub const ANY: InstanceStateMask = InstanceStateMask(
        Self::ALIVE.0 | Self::NOT_ALIVE_DISPOSED.0 | Self::NOT_ALIVE_NO_WRITERS.0,
    );

    pub const fn from_bits(bits: u32) -> Self {
        InstanceStateMask(bits)
    }
    pub const fn bits(&self) -> u32 {
        self.0
    }
    pub const fn contains(&self, other: InstanceStateMask) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for InstanceStateMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        InstanceStateMask(self.0 | rhs.0)
    }
}

struct ReadConditionHook {
    id: u64,
    signal: Weak<dyn WaitsetSignal>,
}

/// `(sample_state_mask, view_state_mask, instance_state_mask)` predicate
/// with an atomic match count maintained by the owning cache.
pub struct ReadCondition {
    id: u64,
    sample_state_mask: SampleStateMask,
    view_state_mask: ViewStateMask,
    instance_state_mask: InstanceStateMask,
    trigger_count: AtomicU64,
    waitset_signals: Mutex<Vec<ReadConditionHook>>,
}

impl ReadCondition {
    pub fn new(
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
    ) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(2_000_000);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            sample_state_mask,
            view_state_mask,
            instance_state_mask,
            trigger_count: AtomicU64::new(0),
            waitset_signals: Mutex::new(Vec::new()),
        }
    }

    pub fn get_sample_state_mask(&self) -> SampleStateMask {
        self.sample_state_mask
    }

    pub fn get_view_state_mask(&self) -> ViewStateMask {
        self.view_state_mask
    }

    pub fn get_instance_state_mask(&self) -> InstanceStateMask {
        self.instance_state_mask
    }

    /// Current trigger count: number of matching instances (plain read
    /// condition) or matching samples (query condition).
    pub fn trigger_count(&self) -> u64 {
        self.trigger_count.load(Ordering::Acquire)
    }

    /// Apply a signed delta to the trigger count. Called by the owning
    /// cache under its lock with the pre/post match delta for one mutation;
    /// never used to rescan. Signals the waitset on a 0→positive transition.
    pub(crate) fn apply_delta(&self, delta: i64) {
        if delta == 0 {
            return;
        }
        let before = if delta > 0 {
            self.trigger_count.fetch_add(delta as u64, Ordering::AcqRel)
        } else {
            self.trigger_count
                .fetch_sub((-delta) as u64, Ordering::AcqRel)
        };
        let after = before as i64 + delta;
        if before == 0 && after > 0 {
            self.notify_waitsets();
        }
    }

    fn notify_waitsets(&self) {
        let mut hooks = match self.waitset_signals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::debug!("[read_condition] waitset_signals poisoned, recovering");
                poisoned.into_inner()
            }
        };

        hooks.retain(|hook| {
            if let Some(signal) = hook.signal.upgrade() {
                signal.signal();
                true
            } else {
                false
            }
        });
    }
}

impl Condition for ReadCondition {
    fn get_trigger_value(&self) -> bool {
        self.trigger_count() > 0
    }

    fn condition_id(&self) -> u64 {
        self.id
    }

    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        let mut hooks = match self.waitset_signals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::debug!("[read_condition] waitset_signals poisoned, recovering");
                poisoned.into_inner()
            }
        };

        hooks.retain(|hook| hook.signal.upgrade().is_some());
        hooks.push(ReadConditionHook {
            id: signal.id(),
            signal: Arc::downgrade(&signal),
        });
        drop(hooks);

        if self.get_trigger_value() {
            signal.signal();
        }
    }

    fn remove_waitset_signal(&self, signal_id: u64) {
        if let Ok(mut hooks) = self.waitset_signals.lock() {
            hooks.retain(|hook| hook.id != signal_id);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A [`ReadCondition`] plus a content filter, assigned one bit of the
/// cache's query-mask bitset (see `crate::config::QUERY_MASK_BITS`).
pub struct QueryCondition {
    base: ReadCondition,
    query_expression: String,
    query_parameters: Mutex<Vec<String>>,
    /// Bit index into the per-sample query-mask bitset, assigned by the
    /// owning `Rhc` when the condition is attached.
    mask_bit: u32,
    /// The filter predicate itself, retained (not just applied once at
    /// attach time) so the owning cache can compute a newly-stored sample's
    /// query mask against every live condition at insertion, per §4.2.5.
    filter: Box<dyn Fn(&Serdata) -> bool + Send + Sync>,
}

impl QueryCondition {
    pub fn new(
        sample_state_mask: SampleStateMask,
        view_state_mask: ViewStateMask,
        instance_state_mask: InstanceStateMask,
        query_expression: String,
        query_parameters: Vec<String>,
        mask_bit: u32,
        filter: Box<dyn Fn(&Serdata) -> bool + Send + Sync>,
    ) -> Self {
        Self {
            base: ReadCondition::new(sample_state_mask, view_state_mask, instance_state_mask),
            query_expression,
            query_parameters: Mutex::new(query_parameters),
            mask_bit,
            filter,
        }
    }

    /// Evaluate this condition's filter predicate against a sample.
    pub fn matches(&self, sample: &Serdata) -> bool {
        (self.filter)(sample)
    }

    pub fn get_query_expression(&self) -> &str {
        &self.query_expression
    }

    pub fn get_query_parameters(&self) -> Vec<String> {
        self.query_parameters.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn set_query_parameters(&self, parameters: Vec<String>) {
        if let Ok(mut params) = self.query_parameters.lock() {
            *params = parameters;
        }
    }

    /// Bit index assigned to this condition within the per-sample query mask.
    pub fn mask_bit(&self) -> u32 {
        self.mask_bit
    }

    pub fn mask(&self) -> u64 {
        1u64 << self.mask_bit
    }

    pub(crate) fn apply_delta(&self, delta: i64) {
        self.base.apply_delta(delta);
    }

    pub fn read_condition(&self) -> &ReadCondition {
        &self.base
    }
}

impl Condition for QueryCondition {
    fn get_trigger_value(&self) -> bool {
        self.base.get_trigger_value()
    }

    fn condition_id(&self) -> u64 {
        self.base.condition_id()
    }

    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        self.base.add_waitset_signal(signal);
    }

    fn remove_waitset_signal(&self, signal_id: u64) {
        self.base.remove_waitset_signal(signal_id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waitset::test_support::CountingSignal;

    #[test]
    fn trigger_count_transition_signals_once() {
        let cond = ReadCondition::new(
            SampleStateMask::ANY,
            ViewStateMask::ANY,
            InstanceStateMask::ANY,
        );
        let signal = Arc::new(CountingSignal::new());
        cond.add_waitset_signal(signal.clone());
        assert!(!cond.get_trigger_value());

        cond.apply_delta(1);
        assert!(cond.get_trigger_value());
        assert_eq!(signal.count(), 1);

        cond.apply_delta(1);
        assert_eq!(signal.count(), 1, "no signal on positive->positive");

        cond.apply_delta(-2);
        assert!(!cond.get_trigger_value());
    }

    #[test]
    fn query_condition_mask_bit_roundtrip() {
        let q = QueryCondition::new(
            SampleStateMask::NOT_READ,
            ViewStateMask::ANY,
            InstanceStateMask::ALIVE,
            "temperature > %0".to_string(),
            vec!["25.0".to_string()],
            3,
            Box::new(|_| true),
        );
        assert_eq!(q.mask_bit(), 3);
        assert_eq!(q.mask(), 0b1000);
    }
}
