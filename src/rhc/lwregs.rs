// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lightweight writer-registration set (§4.4): the overflow registry for
//! instances with more than one active writer. Kept empty in the common
//! single-writer case, where the sole writer is cached directly on the
//! instance instead (§9, "Writer registration optimization").

use std::collections::HashSet;

#[derive(Default)]
pub struct LiveWriterSet(HashSet<(u64, u64)>);

impl LiveWriterSet {
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    pub fn contains(&self, iid: u64, wr_iid: u64) -> bool {
        self.0.contains(&(iid, wr_iid))
    }

    /// Returns `true` if the pair was not already present.
    pub fn add(&mut self, iid: u64, wr_iid: u64) -> bool {
        self.0.insert((iid, wr_iid))
    }

    /// Returns `true` if the pair was present and is now removed.
    pub fn delete(&mut self, iid: u64, wr_iid: u64) -> bool {
        self.0.remove(&(iid, wr_iid))
    }

    /// Drop every entry for a retired instance.
    pub fn remove_instance(&mut self, iid: u64) {
        self.0.retain(|&(i, _)| i != iid);
    }

    /// An arbitrary writer still registered against `iid`, used to refill
    /// the instance's fast-path cache when the cached writer unregisters
    /// while others remain (§4.2.2).
    pub fn any_writer_for(&self, iid: u64) -> Option<u64> {
        self.0.iter().find(|&&(i, _)| i == iid).map(|&(_, w)| w)
    }
}
