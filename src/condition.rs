// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Status-based conditions — predicates attachable to a waitset.
//!
//! `StatusCondition` and `GuardCondition` are boolean-valued; read/query
//! conditions (which carry a trigger *count*, not just a bit) live in
//! [`crate::read_condition`].

use crate::waitset::WaitsetSignal;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Base interface for all conditions attachable to a waitset.
pub trait Condition: Send + Sync {
    /// `true` if the condition is currently satisfied.
    fn get_trigger_value(&self) -> bool;

    /// Stable identifier, used for equality/removal.
    fn condition_id(&self) -> u64;

    /// Register a waitset signal so this condition can wake blocked waiters.
    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>);

    /// Remove a previously registered waitset signal.
    fn remove_waitset_signal(&self, signal_id: u64);

    /// Downcast support for callers holding `Arc<dyn Condition>`.
    fn as_any(&self) -> &dyn Any;
}

/// Communication-status bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMask(u32);

impl StatusMask {
    pub const NONE: StatusMask = StatusMask(0);
    pub const ALL: StatusMask = StatusMask(0xFFFF_FFFF);
    pub const DATA_AVAILABLE: StatusMask = StatusMask(1 << 0);
    pub const SAMPLE_LOST: StatusMask = StatusMask(1 << 1);
    pub const SAMPLE_REJECTED: StatusMask = StatusMask(1 << 2);
    pub const LIVELINESS_CHANGED: StatusMask = StatusMask(1 << 3);
    pub const REQUESTED_DEADLINE_MISSED: StatusMask = StatusMask(1 << 4);
    pub const REQUESTED_INCOMPATIBLE_QOS: StatusMask = StatusMask(1 << 5);
    pub const SUBSCRIPTION_MATCHED: StatusMask = StatusMask(1 << 6);
    pub const LIVELINESS_LOST: StatusMask = StatusMask(1 << 7);
    pub const OFFERED_DEADLINE_MISSED: StatusMask = StatusMask(1 << 8);
    pub const OFFERED_INCOMPATIBLE_QOS: StatusMask = StatusMask(1 << 9);
    pub const PUBLICATION_MATCHED: StatusMask = StatusMask(1 << 10);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        StatusMask(bits)
    }

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(&self, other: StatusMask) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub const fn or(self, other: StatusMask) -> Self {
        StatusMask(self.0 | other.0)
    }

    #[must_use]
    pub const fn and(self, other: StatusMask) -> Self {
        StatusMask(self.0 & other.0)
    }
}

impl std::ops::BitOr for StatusMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

impl std::ops::BitAnd for StatusMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

struct WaitsetHook {
    id: u64,
    signal: Weak<dyn WaitsetSignal>,
}

fn notify_waitsets(hooks: &Mutex<Vec<WaitsetHook>>) {
    let mut hooks = match hooks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::debug!("[condition] waitset_signals poisoned, recovering");
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

fn attach_waitset(hooks: &Mutex<Vec<WaitsetHook>>, signal: Arc<dyn WaitsetSignal>, fire_now: bool) {
    let mut hooks_guard = match hooks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::debug!("[condition] waitset_signals poisoned, recovering");
            poisoned.into_inner()
        }
    };

    hooks_guard.retain(|hook| hook.signal.upgrade().is_some());
    hooks_guard.push(WaitsetHook {
        id: signal.id(),
        signal: Arc::downgrade(&signal),
    });
    drop(hooks_guard);

    if fire_now {
        signal.signal();
    }
}

fn detach_waitset(hooks: &Mutex<Vec<WaitsetHook>>, signal_id: u64) {
    if let Ok(mut hooks) = hooks.lock() {
        hooks.retain(|hook| hook.id != signal_id);
    }
}

/// Condition tied to an entity's communication status (`SAMPLE_LOST`,
/// `REQUESTED_DEADLINE_MISSED`, ...).
pub struct StatusCondition {
    id: u64,
    enabled_statuses: Mutex<StatusMask>,
    active_statuses: Mutex<StatusMask>,
    waitset_signals: Mutex<Vec<WaitsetHook>>,
}

impl StatusCondition {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            enabled_statuses: Mutex::new(StatusMask::NONE),
            active_statuses: Mutex::new(StatusMask::NONE),
            waitset_signals: Mutex::new(Vec::new()),
        }
    }

    pub fn set_enabled_statuses(&self, mask: StatusMask) {
        if let Ok(mut enabled) = self.enabled_statuses.lock() {
            *enabled = mask;
        }
        if self.get_trigger_value() {
            notify_waitsets(&self.waitset_signals);
        }
    }

    pub fn get_enabled_statuses(&self) -> StatusMask {
        self.enabled_statuses
            .lock()
            .map(|m| *m)
            .unwrap_or(StatusMask::NONE)
    }

    /// Raise `mask` as the active status set. Called by the cache when a
    /// status callback (`SAMPLE_LOST`, `REQUESTED_DEADLINE_MISSED`, ...)
    /// fires for the entity owning this condition.
    pub fn set_active_statuses(&self, mask: StatusMask) {
        let enabled = self.get_enabled_statuses();
        if let Ok(mut active) = self.active_statuses.lock() {
            *active = mask;
        }
        if enabled.and(mask).bits() != 0 {
            notify_waitsets(&self.waitset_signals);
        }
    }

    pub fn get_active_statuses(&self) -> StatusMask {
        self.active_statuses
            .lock()
            .map(|m| *m)
            .unwrap_or(StatusMask::NONE)
    }

    pub fn clear_active_statuses(&self) {
        if let Ok(mut active) = self.active_statuses.lock() {
            *active = StatusMask::NONE;
        }
    }
}

impl Condition for StatusCondition {
    fn get_trigger_value(&self) -> bool {
        self.get_enabled_statuses().and(self.get_active_statuses()).bits() != 0
    }

    fn condition_id(&self) -> u64 {
        self.id
    }

    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        let fire_now = self.get_trigger_value();
        attach_waitset(&self.waitset_signals, signal, fire_now);
    }

    fn remove_waitset_signal(&self, signal_id: u64) {
        detach_waitset(&self.waitset_signals, signal_id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Default for StatusCondition {
    fn default() -> Self {
        Self::new()
    }
}

/// Condition whose trigger value is toggled directly by the application.
pub struct GuardCondition {
    id: u64,
    trigger_value: AtomicBool,
    waitset_signals: Mutex<Vec<WaitsetHook>>,
}

impl GuardCondition {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1_000_000);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            trigger_value: AtomicBool::new(false),
            waitset_signals: Mutex::new(Vec::new()),
        }
    }

    pub fn set_trigger_value(&self, value: bool) {
        self.trigger_value.store(value, Ordering::Release);
        if value {
            notify_waitsets(&self.waitset_signals);
        }
    }
}

impl Condition for GuardCondition {
    fn get_trigger_value(&self) -> bool {
        self.trigger_value.load(Ordering::Acquire)
    }

    fn condition_id(&self) -> u64 {
        self.id
    }

    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        let fire_now = self.get_trigger_value();
        attach_waitset(&self.waitset_signals, signal, fire_now);
    }

    fn remove_waitset_signal(&self, signal_id: u64) {
        detach_waitset(&self.waitset_signals, signal_id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Default for GuardCondition {
    fn default() -> Self {
        Self::new()
    }
}

/// Implemented by entities (readers, writers) that expose a `StatusCondition`.
pub trait HasStatusCondition {
    fn get_status_condition(&self) -> Arc<StatusCondition>;
}
