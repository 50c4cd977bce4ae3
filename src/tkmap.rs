// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TKMap — process-global fingerprint→instance map shared by every RHC/WHC
//! that holds samples of a given key.
//!
//! One process-wide table, lazily initialized on first use and shared
//! thereafter, mirroring this crate's `GLOBAL_SLAB_POOL: OnceLock<Arc<..>>`
//! pattern (`core/rt/mod.rs` in the teacher). Unlike that pool, instances
//! here are refcounted individually (one ref per RHC/WHC instance holding a
//! sample of that key) rather than the table itself being refcounted;
//! `acquire`/`release` below track live-cache count only to decide whether
//! diagnostics should warn about a non-empty table at last release.

use dashmap::DashMap;
use md5::{Digest, Md5};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// A key fingerprint: an MD5 digest of the key-only serialized bytes.
/// Collisions are possible and are broken by exact key-byte comparison in
/// [`Tkmap::find`]/[`Tkmap::lookup`], never trusted by hash alone.
pub type Fingerprint = [u8; 16];

fn fingerprint(key_bytes: &[u8]) -> Fingerprint {
    let mut hasher = Md5::new();
    hasher.update(key_bytes);
    hasher.finalize().into()
}

/// A keyed instance shared by every RHC/WHC that has seen this key.
pub struct TkMapInstance {
    iid: u64,
    key_payload: Arc<[u8]>,
    refcount: AtomicU64,
}

impl TkMapInstance {
    /// Instance IDentifier: a 64-bit, process-unique, monotonically
    /// assigned handle, also used as the externally visible instance
    /// handle.
    pub fn iid(&self) -> u64 {
        self.iid
    }

    /// Key-only serialized bytes, used to synthesize invalid samples that
    /// carry only the key (dispose/unregister with no payload).
    pub fn key_payload(&self) -> &Arc<[u8]> {
        &self.key_payload
    }

    fn refcount(&self) -> u64 {
        self.refcount.load(Ordering::Acquire)
    }
}

/// Process-global mapping from key fingerprint to [`TkMapInstance`].
pub struct Tkmap {
    by_fingerprint: DashMap<Fingerprint, Vec<Arc<TkMapInstance>>>,
    by_iid: DashMap<u64, Arc<TkMapInstance>>,
    next_iid: AtomicU64,
}

impl Tkmap {
    fn new() -> Self {
        Self {
            by_fingerprint: DashMap::new(),
            by_iid: DashMap::new(),
            next_iid: AtomicU64::new(1),
        }
    }

    /// `find(sd, create)` — resolve `key_bytes` to an instance, taking an
    /// initial reference when `create` allocates a new one. Returns `None`
    /// only when `create` is `false` and no instance exists yet.
    pub fn find(&self, key_bytes: &[u8], create: bool) -> Option<Arc<TkMapInstance>> {
        let fp = fingerprint(key_bytes);

        if let Some(existing) = self.find_exact(&fp, key_bytes) {
            existing.refcount.fetch_add(1, Ordering::AcqRel);
            return Some(existing);
        }

        if !create {
            return None;
        }

        let iid = self.next_iid.fetch_add(1, Ordering::Relaxed);
        let inst = Arc::new(TkMapInstance {
            iid,
            key_payload: Arc::from(key_bytes.to_vec()),
            refcount: AtomicU64::new(1),
        });

        self.by_fingerprint.entry(fp).or_default().push(inst.clone());
        self.by_iid.insert(iid, inst.clone());
        Some(inst)
    }

    /// `find_by_id(iid)` — O(1) lookup by instance handle.
    pub fn find_by_id(&self, iid: u64) -> Option<Arc<TkMapInstance>> {
        self.by_iid.get(&iid).map(|e| e.clone())
    }

    /// `lookup(sd)` — resolve to an IID without creating or taking a
    /// reference.
    pub fn lookup(&self, key_bytes: &[u8]) -> Option<u64> {
        let fp = fingerprint(key_bytes);
        self.find_exact(&fp, key_bytes).map(|inst| inst.iid)
    }

    fn find_exact(&self, fp: &Fingerprint, key_bytes: &[u8]) -> Option<Arc<TkMapInstance>> {
        self.by_fingerprint
            .get(fp)
            .and_then(|bucket| bucket.iter().find(|inst| &**inst.key_payload == key_bytes).cloned())
    }

    /// Take an additional reference on an instance already held by the
    /// caller (e.g. a second RHC storing a sample of the same key).
    pub fn reference(&self, inst: &Arc<TkMapInstance>) {
        inst.refcount.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop a reference; purges the instance from both indices when the
    /// refcount reaches zero.
    pub fn unref(&self, inst: &Arc<TkMapInstance>) {
        let prev = inst.refcount.fetch_sub(1, Ordering::AcqRel);
        if prev != 1 {
            return;
        }

        // Refcount observed zero: this thread is responsible for purging,
        // but another `find` may have raced a fresh reference in first —
        // recheck under the bucket before removing.
        if inst.refcount() != 0 {
            return;
        }

        let fp = fingerprint(&inst.key_payload);
        if let Some(mut bucket) = self.by_fingerprint.get_mut(&fp) {
            bucket.retain(|candidate| candidate.refcount() != 0 || !Arc::ptr_eq(candidate, inst));
            if bucket.is_empty() {
                drop(bucket);
                self.by_fingerprint.remove(&fp);
            }
        }
        self.by_iid.remove(&inst.iid);
    }
}

static GLOBAL_TKMAP: OnceLock<Arc<Tkmap>> = OnceLock::new();
static LIVE_CACHES: AtomicU64 = AtomicU64::new(0);

/// Initialize (or return the already-initialized) process-global TKMap and
/// bump the live-cache refcount. Called by `Rhc::new`/`Whc::new`.
pub fn acquire() -> Arc<Tkmap> {
    LIVE_CACHES.fetch_add(1, Ordering::AcqRel);
    GLOBAL_TKMAP.get_or_init(|| Arc::new(Tkmap::new())).clone()
}

/// Drop the live-cache refcount taken by [`acquire`]. The table itself is
/// never torn down (a `OnceLock` cannot be reset); this only tracks whether
/// the last cache has gone away, for diagnostics.
pub fn release() {
    let prev = LIVE_CACHES.fetch_sub(1, Ordering::AcqRel);
    if prev == 1 {
        if let Some(map) = GLOBAL_TKMAP.get() {
            if !map.by_iid.is_empty() {
                log::debug!(
                    "[tkmap] last cache released with {} instance(s) still referenced",
                    map.by_iid.len()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_create_allocates_monotonic_iid() {
        let map = Tkmap::new();
        let a = map.find(b"key-a", true).unwrap();
        let b = map.find(b"key-b", true).unwrap();
        assert_ne!(a.iid(), b.iid());
    }

    #[test]
    fn find_without_create_misses_on_new_key() {
        let map = Tkmap::new();
        assert!(map.find(b"key-a", false).is_none());
    }

    #[test]
    fn repeated_find_returns_same_instance_and_bumps_refcount() {
        let map = Tkmap::new();
        let a = map.find(b"key-a", true).unwrap();
        let a2 = map.find(b"key-a", true).unwrap();
        assert_eq!(a.iid(), a2.iid());
        assert_eq!(a.refcount(), 2);
    }

    #[test]
    fn unref_to_zero_purges_from_both_indices() {
        let map = Tkmap::new();
        let a = map.find(b"key-a", true).unwrap();
        let iid = a.iid();
        map.unref(&a);
        assert!(map.find_by_id(iid).is_none());
        assert!(map.lookup(b"key-a").is_none());
    }

    #[test]
    fn ref_unref_round_trip_is_a_no_op() {
        let map = Tkmap::new();
        let a = map.find(b"key-a", true).unwrap();
        let iid = a.iid();
        map.reference(&a);
        map.unref(&a);
        assert!(map.find_by_id(iid).is_some());
        map.unref(&a);
        assert!(map.find_by_id(iid).is_none());
    }

    #[test]
    fn lookup_does_not_create_or_ref() {
        let map = Tkmap::new();
        assert!(map.lookup(b"key-a").is_none());
        let a = map.find(b"key-a", true).unwrap();
        assert_eq!(a.refcount(), 1);
        assert_eq!(map.lookup(b"key-a"), Some(a.iid()));
        assert_eq!(a.refcount(), 1, "lookup must not take a reference");
    }
}
