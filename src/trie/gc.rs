// Copyright 2023 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! The copying garbage collector.
//!
//! Collection runs in two phases. *Compact* walks the trie from the
//! root and, for each branch, copies its twig-vector into a stack
//! buffer, recurses into the branch children in that copy, and then
//! decides whether to evacuate: the vector moves to a fresh page when
//! its current page is sparse or dirty, or when a child's own
//! evacuation rewrote part of the copy. Working on the stack copy is
//! the trick that lets children relocate without disturbing their
//! siblings' identity before the parent has made its decision; the
//! parent then publishes all the new child positions in one step by
//! writing the copy to its new home. *Reclaim* walks the page table
//! and releases every page whose live count reached zero.
//!
//! Evacuation never writes into a source page, which is what makes a
//! concurrent reader of a copy-on-write snapshot safe during the
//! writer's collections.
//!
//! Each collection records its wall-clock duration and the number of
//! pages it released into running mean/variance accumulators.

use std::time::Instant;

use log::debug;

use super::alloc::{PageTable, MIN_USAGE};
use super::node::{Node, MAX_TWIGS};
use super::QpTrie;

////////////////////////////////////////////////////////////////////////
// COLLECTION                                                         //
////////////////////////////////////////////////////////////////////////

impl<V> QpTrie<V> {
    /// Compacts the trie and reclaims empty pages.
    ///
    /// The mutating operations call this of their own accord once
    /// enough garbage accumulates, so calling it by hand is rarely
    /// necessary; it is useful after bulk deletions, when memory
    /// should be handed back promptly.
    pub fn compact(&mut self) {
        self.assert_writable();
        let start = Instant::now();
        self.mem.allocation_reset();
        let evacuated = if self.root.is_branch() {
            let mut root = self.root;
            let evacuated = self.compact_branch(&mut root);
            self.root = root;
            evacuated
        } else {
            0
        };
        let released = self.mem.reclaim();
        let elapsed = start.elapsed();
        self.mem.gc_time.record(elapsed.as_secs_f64());
        self.mem.gc_space.record(released as f64);
        debug!(
            "qp-trie GC: evacuated {} twig-vectors, released {} pages in {:.3} ms",
            evacuated,
            released,
            elapsed.as_secs_f64() * 1e3,
        );
    }

    /// Compacts the subtrie under the branch `*n`, rewriting `*n` if
    /// its twig-vector is evacuated. `*n` itself lives on the caller's
    /// stack, never in a page. Recursion depth is bounded by the
    /// maximum key length.
    fn compact_branch(&mut self, n: &mut Node) -> usize {
        debug_assert!(n.is_branch());
        let max = n.twig_max() as usize;
        let twigs = n.twig_ref();
        let mut copy = [Node::EMPTY; MAX_TWIGS];
        let copy = &mut copy[..max];
        self.mem.read_twigs(twigs, copy);

        let mut evacuated = 0;
        for child in copy.iter_mut() {
            if child.is_branch() {
                evacuated += self.compact_branch(child);
            }
        }

        // Read the page counters only now: the recursion may have
        // landfilled siblings' vectors in the same page.
        let usage = self.mem.usage(PageTable::page_of(twigs));
        let moved = (0..max).any(|pos| copy[pos] != self.mem.node(twigs + pos as u32));
        if usage.live() < MIN_USAGE || usage.free > 0 || moved {
            let relocated = self.mem.alloc(max as u32);
            self.mem.write_twigs(relocated, copy);
            self.mem.landfill(twigs, max as u32);
            *n = n.with_twig_ref(relocated);
            evacuated += 1;
        }
        evacuated
    }
}

////////////////////////////////////////////////////////////////////////
// RECLAIM                                                            //
////////////////////////////////////////////////////////////////////////

impl PageTable {
    /// Releases every installed page, other than the current bump
    /// page, whose live count is zero. Returns the number of pages
    /// released (whether freed or deferred).
    pub(super) fn reclaim(&mut self) -> usize {
        let mut released = 0;
        for page in 0..self.pages() {
            if page != self.bump_page()
                && self.page_installed(page)
                && self.usage(page).live() == 0
            {
                self.release_page(page);
                released += 1;
            }
        }
        released
    }
}

////////////////////////////////////////////////////////////////////////
// STATISTICS                                                         //
////////////////////////////////////////////////////////////////////////

/// A running mean/variance accumulator (Welford's online algorithm).
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct GcStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl GcStats {
    pub(super) fn record(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (sample - self.mean);
    }

    pub(super) fn count(&self) -> u64 {
        self.count
    }

    pub(super) fn mean(&self) -> f64 {
        self.mean
    }

    pub(super) fn stddev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gc_stats_compute_mean_and_stddev() {
        let mut stats = GcStats::default();
        for sample in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.record(sample);
        }
        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-12);
        assert!((stats.stddev() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn gc_stats_handle_the_empty_case() {
        let stats = GcStats::default();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.stddev(), 0.0);
    }

    #[test]
    fn reclaim_skips_the_bump_page() {
        let mut table = PageTable::new();
        let twigs = table.alloc(16);
        table.landfill(twigs, 16);
        table.allocation_reset();
        // Page 0 is empty but page 1 (bump, also empty) must survive.
        assert_eq!(table.reclaim(), 1);
        assert!(!table.page_installed(0));
        assert!(table.page_installed(table.bump_page()));
        assert_eq!(table.garbage(), 0);
    }
}
