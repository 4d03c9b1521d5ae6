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

//! The qp-trie itself.
//!
//! A qp-trie is a radix trie in the crit-bit family: every branch
//! records the offset of the key position that distinguishes its
//! children, offsets strictly increase along any root-to-leaf path, and
//! leaves hold the (externally owned) values. Where a crit-bit tree
//! branches on single bits, a qp-trie branch carries a bitmap of which
//! children exist and stores the children in a packed vector indexed by
//! popcount, so it is as shallow as a byte-at-a-time trie over
//! hostname-alphabet names while spending no memory on absent children.
//! Because the key codec (the `key` module) preserves canonical name
//! order, the trie's leaves are always in sorted order, which is what
//! makes predecessor queries and ordered traversal cheap.
//!
//! The modules underneath divide the work:
//!
//! * `key` turns a [`Name`] into the shift sequence a descent consumes;
//! * `node` packs a branch or leaf into twelve octets;
//! * `alloc` owns the pages that twig-vectors are bump-allocated from;
//! * `gc` compacts live vectors and returns empty pages.
//!
//! This module layers the operations on top: [`QpTrie::get`],
//! [`QpTrie::find_le`], [`QpTrie::add`], [`QpTrie::del`],
//! [`QpTrie::foreach`], and the copy-on-write transaction pair
//! [`QpTrie::cow_start`] / [`QpTrie::cow_finish`].

use std::io::{self, Write};
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;

use crate::name::Name;

mod alloc;
mod gc;
mod key;
mod node;

use alloc::{PageTable, MAX_GARBAGE, PAGE_SIZE};
use key::LookupKey;
use node::Node;

////////////////////////////////////////////////////////////////////////
// STRUCTURE                                                          //
////////////////////////////////////////////////////////////////////////

/// An ordered map from domain names to values of type `V`.
///
/// The trie does not own its keys or values. The embedder keeps every
/// value alive (at a stable address) for as long as it is in the trie,
/// and each value embeds a `*const Name` slot pointing to the name
/// that keys it; see [`QpTrie::add`] for the exact contract. In
/// exchange, a leaf costs twelve octets, lookups never allocate, and
/// the embedder is free to thread its own structures (say, a
/// doubly-linked list in canonical order) through the values using the
/// neighbors that `add` reports.
///
/// # Copy-on-write transactions
///
/// [`QpTrie::cow_start`] forks a *writer* that shares the snapshot's
/// pages; the snapshot remains readable (and only readable) while the
/// writer accumulates changes, and [`QpTrie::cow_finish`] consumes
/// both and yields the published result. Because `cow_finish` takes
/// the snapshot by value, the borrow checker itself enforces the
/// hand-off contract: no outstanding reader borrow of the old version
/// can survive publication. Cross-thread publication (an atomic
/// pointer swap or lock) is the embedder's affair; this type only
/// promises that the writer never mutates memory the snapshot can
/// see.
///
/// # Thread safety
///
/// `QpTrie` hands out nothing but shared references to `V`, so it is
/// `Send` and `Sync` when `V: Sync` (with `Sync` additionally useful
/// only if the embedder provides the locking described above for
/// mutation).
pub struct QpTrie<V> {
    root: Node,
    leaves: usize,
    mem: PageTable,

    /// Present on a snapshot while a writer forked from it exists
    /// (cleared by `cow_finish`) and on an uncommitted writer. The
    /// flag itself records whether the writer is still alive, which
    /// the snapshot's destructor consults: while the writer lives, the
    /// shared pages must not be freed out from under it.
    cow: Option<Arc<AtomicBool>>,

    /// Whether this trie is the writer side of an open transaction.
    writer: bool,

    _values: PhantomData<*const V>,
}

/// The in-order neighbors of a newly added value, as reported by
/// [`QpTrie::add`]: the rightmost value before the new name and the
/// leftmost value after it.
#[derive(Clone, Copy, Debug)]
pub struct PrevNext<V> {
    pub prev: Option<NonNull<V>>,
    pub next: Option<NonNull<V>>,
}

// SAFETY: the trie stores raw pointers to V but only ever produces
// shared references to it, so sharing or moving the trie across
// threads is sound whenever shared access to V is. The page memory
// behind the raw node pointers is owned by the trie (or, under
// copy-on-write, shared with a writer that is guaranteed never to
// write it).
unsafe impl<V: Sync> Send for QpTrie<V> {}
unsafe impl<V: Sync> Sync for QpTrie<V> {}

impl<V> QpTrie<V> {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self {
            root: Node::EMPTY,
            leaves: 0,
            mem: PageTable::new(),
            cow: None,
            writer: false,
            _values: PhantomData,
        }
    }

    /// The number of names in the trie.
    pub fn len(&self) -> usize {
        self.leaves
    }

    pub fn is_empty(&self) -> bool {
        self.leaves == 0
    }

    /// Mutation is forbidden on the snapshot side of an open
    /// transaction: the writer shares our pages and relies on them not
    /// changing (nor being freed by our garbage collector).
    fn assert_writable(&self) {
        assert!(
            self.cow.is_none() || self.writer,
            "the snapshot side of an open copy-on-write transaction is read-only",
        );
    }

    /// Reads the value stored in a leaf.
    ///
    /// # Safety
    ///
    /// The leaf must belong to this trie and hold a non-null value
    /// pointer; the reference is valid because the contract of
    /// [`QpTrie::add`] keeps every stored value alive and unaliased by
    /// mutable references while it is in the trie.
    unsafe fn leaf_value(&self, leaf: Node) -> &V {
        &*(leaf.leaf_val() as *const V)
    }

    fn leaf_pointer(&self, leaf: Node) -> NonNull<V> {
        // NOTE: the unwrap() is okay: leaf value pointers are non-null
        // by construction (the empty trie's null root is never
        // reported as a neighbor).
        NonNull::new(leaf.leaf_val() as *mut V).unwrap()
    }

    /// The leftmost leaf of the subtrie rooted at `n`.
    fn first_leaf(&self, mut n: Node) -> Node {
        while n.is_branch() {
            n = self.mem.twig(n, 0);
        }
        n
    }

    /// The rightmost leaf of the subtrie rooted at `n`.
    fn last_leaf(&self, mut n: Node) -> Node {
        while n.is_branch() {
            n = self.mem.twig(n, n.twig_max() - 1);
        }
        n
    }
}

impl<V> Default for QpTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// LOOKUP                                                             //
////////////////////////////////////////////////////////////////////////

impl<V> QpTrie<V> {
    /// Looks up `name`, returning its value if it is present.
    pub fn get(&self, name: &Name) -> Option<&V> {
        let lookup = LookupKey::from_name(name);
        let mut n = self.root;
        while n.is_branch() {
            let bit = n.twig_bit(&lookup);
            if !n.has_twig(bit) {
                return None;
            }
            n = self.mem.twig(n, n.twig_pos(bit));
        }
        if n.leaf_val().is_null() {
            // The empty trie's root.
            return None;
        }
        // The descent only tested the key positions branches happened
        // to discriminate on, so confirm the leaf really carries this
        // name. SAFETY: see leaf_value.
        unsafe {
            if n.leaf_name() == name {
                Some(self.leaf_value(n))
            } else {
                None
            }
        }
    }

    /// Looks up `name` or its nearest predecessor. Returns `(true,
    /// Some(value))` on an exact match; otherwise `(false,
    /// Some(value))` for the largest name strictly less than `name`,
    /// or `(false, None)` if the trie holds nothing before `name`.
    pub fn find_le(&self, name: &Name) -> (bool, Option<&V>) {
        let lookup = LookupKey::from_name(name);
        let mut n = self.root;
        loop {
            if !n.is_branch() {
                if n.leaf_val().is_null() {
                    return (false, None);
                }
                // SAFETY: see leaf_value.
                unsafe {
                    if n.leaf_name() == name {
                        return (true, Some(self.leaf_value(n)));
                    }
                }
                break;
            }
            let bit = n.twig_bit(&lookup);
            if !n.has_twig(bit) {
                break;
            }
            n = self.mem.twig(n, n.twig_pos(bit));
        }

        // Inexact. Find where the search key diverges from the keys in
        // the subtrie where the descent stopped; any leaf of that
        // subtrie is representative up to the divergence point.
        let probe = self.first_leaf(n);
        // SAFETY: see leaf_value; the trie is non-empty here.
        let found = LookupKey::from_name(unsafe { probe.leaf_name() });
        let off = match lookup.divergence(&found) {
            Some(off) => off,
            None => unreachable!("an inexact descent implies the keys differ"),
        };

        // Walk down again, stopping where a branch for the divergence
        // point belongs and remembering the twig immediately to the
        // left of the search path.
        let mut left: Option<Node> = None;
        let mut n = self.root;
        let subtree_decides = loop {
            if !n.is_branch() || off < n.key_offset() {
                break true;
            }
            let bit = n.twig_bit(&lookup);
            let pos = n.twig_pos(bit);
            if pos > 0 {
                left = Some(self.mem.twig(n, pos - 1));
            }
            if off == n.key_offset() {
                break false;
            }
            debug_assert!(n.has_twig(bit));
            n = self.mem.twig(n, pos);
        };

        if subtree_decides && lookup.shift(off) > found.shift(off) {
            // Everything under `n` is before the search key.
            let leaf = self.last_leaf(n);
            // SAFETY: see leaf_value.
            return (false, Some(unsafe { self.leaf_value(leaf) }));
        }
        match left {
            Some(subtrie) => {
                let leaf = self.last_leaf(subtrie);
                // SAFETY: see leaf_value.
                (false, Some(unsafe { self.leaf_value(leaf) }))
            }
            None => (false, None),
        }
    }

    /// Visits every value in the trie, in ascending canonical order of
    /// their names. Recursion depth is bounded by the maximum key
    /// length.
    pub fn foreach<F: FnMut(&V)>(&self, mut visit: F) {
        self.foreach_node(self.root, &mut visit);
    }

    fn foreach_node<F: FnMut(&V)>(&self, n: Node, visit: &mut F) {
        if n.is_branch() {
            for pos in 0..n.twig_max() {
                self.foreach_node(self.mem.twig(n, pos), visit);
            }
        } else if !n.leaf_val().is_null() {
            // SAFETY: see leaf_value.
            visit(unsafe { self.leaf_value(n) });
        }
    }
}

////////////////////////////////////////////////////////////////////////
// MUTATION                                                           //
////////////////////////////////////////////////////////////////////////

impl<V> QpTrie<V> {
    /// If the twig-vector of the branch `*n` lives in a page kept by a
    /// copy-on-write snapshot, moves it to a writable page first. The
    /// mutating descents call this at every level before stepping
    /// down, which establishes (by induction from the root node, which
    /// lives outside the pages) that any node they later write through
    /// sits in a page this trie owns outright.
    ///
    /// # Safety
    ///
    /// `*n` must be a branch of this trie, writable by the caller.
    unsafe fn evacuate_if_kept(&mut self, n: *mut Node) {
        let node = ptr::read(n);
        let twigs = node.twig_ref();
        if self.mem.usage(PageTable::page_of(twigs)).keep == 0 {
            return;
        }
        let max = node.twig_max() as u32;
        let relocated = self.mem.alloc(max);
        self.mem.copy_twigs(twigs, relocated, max as usize);
        self.mem.landfill(twigs, max);
        ptr::write(n, node.with_twig_ref(relocated));
    }

    /// Adds a value to the trie and reports its in-order neighbors:
    /// the rightmost existing value whose name precedes the new one,
    /// and the leftmost whose name follows it. The embedder can use
    /// the pair to maintain an ordered list through its values without
    /// a second traversal.
    ///
    /// The name is not passed directly: it is read through `slot`,
    /// which must point at a `*const Name` field *inside* `*val`. The
    /// trie records the offset of that slot and uses it to recover the
    /// key from the value ever after, which is how a leaf makes do
    /// with a single pointer.
    ///
    /// # Panics
    ///
    /// Panics if the name is already present. Entries are never
    /// updated in place; `del` the old value first.
    ///
    /// # Safety
    ///
    /// The caller must guarantee all of the following until the name
    /// is removed by [`QpTrie::del`] (or the trie and every
    /// copy-on-write descendant of it is dropped):
    ///
    /// * `slot` points into `*val`, and `*slot` points to the domain
    ///   name that keys this value;
    /// * the value and the name stay alive at their current addresses,
    ///   and neither the slot nor the name is modified; and
    /// * no mutable reference to the value exists while the trie is in
    ///   use (the trie hands out `&V`).
    pub unsafe fn add(&mut self, val: NonNull<V>, slot: NonNull<*const Name>) -> PrevNext<V> {
        self.assert_writable();
        let offset = slot.as_ptr() as usize - val.as_ptr() as usize;
        debug_assert!(offset + mem::size_of::<*const Name>() <= mem::size_of::<V>());
        let name: &Name = &*(*slot.as_ptr());
        let leaf = Node::new_leaf(val.as_ptr() as *const u8, offset as u32);
        let lookup = LookupKey::from_name(name);

        // The first leaf in an empty trie lives in the root node.
        if self.leaves == 0 {
            self.root = leaf;
            self.leaves = 1;
            return PrevNext {
                prev: None,
                next: None,
            };
        }

        // First descent: find the leaf nearest to the new key. We keep
        // descending even where our key's bit is missing from a
        // branch; every key below the branch agrees with ours up to
        // the branch's offset, so any twig will do (the leftmost is
        // always in bounds).
        let mut n = self.root;
        while n.is_branch() {
            let bit = n.twig_bit(&lookup);
            let pos = if n.has_twig(bit) { n.twig_pos(bit) } else { 0 };
            n = self.mem.twig(n, pos);
        }
        let nearest = LookupKey::from_name(n.leaf_name());
        let off = match lookup.divergence(&nearest) {
            Some(off) => off,
            None => panic!("qp-trie: the name being added is already present"),
        };
        let new_bit = lookup.shift(off);
        let old_bit = nearest.shift(off);

        // Second descent: find where the divergence belongs, tracking
        // the neighboring twigs on the way down. The root is worked on
        // as a local copy so that every pointer we write through is
        // either that local or a node inside a (writable) page.
        let mut root = self.root;
        let mut prev: Option<Node> = None;
        let mut next: Option<Node> = None;
        let mut n: *mut Node = &mut root;
        let grow = loop {
            let node = ptr::read(n);
            if !node.is_branch() || off < node.key_offset() {
                break false; // a new branch replaces this node
            }
            if off == node.key_offset() {
                break true; // this branch gains a twig
            }
            self.evacuate_if_kept(n);
            let node = ptr::read(n);
            let bit = node.twig_bit(&lookup);
            debug_assert!(node.has_twig(bit));
            let pos = node.twig_pos(bit);
            let max = node.twig_max();
            if pos > 0 {
                prev = Some(self.mem.twig(node, pos - 1));
            }
            if pos + 1 < max {
                next = Some(self.mem.twig(node, pos + 1));
            }
            n = self.mem.node_ptr(node.twig_ref() + pos as u32);
        };

        if grow {
            let node = ptr::read(n);
            debug_assert!(!node.has_twig(new_bit));
            let pos = node.twig_pos(new_bit);
            let max = node.twig_max();
            let old = node.twig_ref();
            let new = self.mem.alloc(max as u32 + 1);
            self.mem.copy_twigs(old, new, pos as usize);
            self.mem.write_node(new + pos as u32, leaf);
            self.mem
                .copy_twigs(old + pos as u32, new + pos as u32 + 1, (max - pos) as usize);
            ptr::write(n, node.grown(new_bit, new));
            self.mem.landfill(old, max as u32);
            if pos > 0 {
                prev = Some(self.mem.node(new + pos as u32 - 1));
            }
            if pos < max {
                next = Some(self.mem.node(new + pos as u32 + 1));
            }
        } else {
            // Push the displaced node (leaf or whole subtrie) down
            // into a fresh two-twig vector alongside the new leaf.
            let node = ptr::read(n);
            let new = self.mem.alloc(2);
            let bitmap = (1u64 << new_bit) | (1 << old_bit);
            if new_bit < old_bit {
                self.mem.write_node(new, leaf);
                self.mem.write_node(new + 1, node);
                next = Some(node);
            } else {
                self.mem.write_node(new, node);
                self.mem.write_node(new + 1, leaf);
                prev = Some(node);
            }
            ptr::write(n, Node::new_branch(off, bitmap, new));
        }
        self.root = root;
        self.leaves += 1;

        // Resolve the neighbor subtries down to their boundary leaves
        // before any collection can move the vectors they sit in.
        let pn = PrevNext {
            prev: prev.map(|subtrie| self.leaf_pointer(self.last_leaf(subtrie))),
            next: next.map(|subtrie| self.leaf_pointer(self.first_leaf(subtrie))),
        };
        if self.mem.garbage() > MAX_GARBAGE {
            self.compact();
        }
        pn
    }

    /// Removes `name` from the trie. Removing an absent name is a
    /// no-op. The embedder regains full ownership of the value and the
    /// name once this returns.
    pub fn del(&mut self, name: &Name) {
        self.assert_writable();
        let lookup = LookupKey::from_name(name);
        let mut root = self.root;
        let deleted = self.del_inner(&mut root, &lookup, name);
        self.root = root;
        if deleted {
            self.leaves -= 1;
            if self.mem.garbage() > MAX_GARBAGE {
                self.compact();
            }
        }
    }

    /// The structural part of deletion, operating on a local copy of
    /// the root so that the caller can store it back on every path
    /// (copy-on-write evacuation may rewrite nodes even when the name
    /// turns out to be absent).
    fn del_inner(&mut self, root: &mut Node, lookup: &LookupKey, name: &Name) -> bool {
        // SAFETY: the pointers n and p only ever designate the local
        // root or nodes inside this trie's pages; evacuate_if_kept
        // guarantees before each step down that the vector holding the
        // next node is writable, and nothing invalidates page memory
        // while we hold pointers into it (allocation never moves
        // installed pages).
        unsafe {
            let mut n: *mut Node = root;
            let mut p: *mut Node = ptr::null_mut();
            let mut bit = 0;
            while (*n).is_branch() {
                self.evacuate_if_kept(n);
                bit = (*n).twig_bit(lookup);
                if !(*n).has_twig(bit) {
                    return false;
                }
                p = n;
                n = self
                    .mem
                    .node_ptr((*n).twig_ref() + (*n).twig_pos(bit) as u32);
            }
            let leaf = ptr::read(n);
            if leaf.leaf_val().is_null() || leaf.leaf_name() != name {
                return false;
            }
            if p.is_null() {
                // The sole leaf: the trie becomes empty.
                *root = Node::EMPTY;
                return true;
            }
            let parent = ptr::read(p);
            let pos = parent.twig_pos(bit);
            let max = parent.twig_max();
            let old = parent.twig_ref();
            if max == 2 {
                // Lift the surviving twig into the parent's place.
                ptr::write(p, self.mem.node(old + (pos ^ 1) as u32));
                self.mem.landfill(old, 2);
            } else {
                let new = self.mem.alloc(max as u32 - 1);
                self.mem.copy_twigs(old, new, pos as usize);
                self.mem.copy_twigs(
                    old + pos as u32 + 1,
                    new + pos as u32,
                    (max - pos - 1) as usize,
                );
                ptr::write(p, parent.shrunk(bit, new));
                self.mem.landfill(old, max as u32);
            }
            true
        }
    }
}

////////////////////////////////////////////////////////////////////////
// COPY-ON-WRITE TRANSACTIONS                                         //
////////////////////////////////////////////////////////////////////////

impl<V> QpTrie<V> {
    /// Begins a copy-on-write transaction, returning the writer.
    ///
    /// The writer starts as a logical copy of this trie, sharing its
    /// pages. From now until [`QpTrie::cow_finish`], this trie (the
    /// snapshot) answers reads exactly as before (concurrently with
    /// the writer, if the embedder arranges it) and refuses mutation.
    /// The
    /// writer's own mutations move any shared twig-vector they touch
    /// into fresh pages first, so the snapshot never observes them.
    ///
    /// Dropping the writer instead of committing aborts the
    /// transaction: the snapshot remains intact and readable, but
    /// stays closed to future transactions. Dropping the snapshot
    /// while the writer is alive leaks the shared pages (they are
    /// still in use; there is no one left to give them back to).
    ///
    /// # Panics
    ///
    /// Panics if a transaction is already open on this trie, or if
    /// this trie is itself an uncommitted writer.
    pub fn cow_start(&mut self) -> QpTrie<V> {
        assert!(
            self.cow.is_none(),
            "a copy-on-write transaction is already open on this trie",
        );
        assert!(
            !self.writer,
            "cannot start a transaction from an uncommitted writer",
        );
        let live = Arc::new(AtomicBool::new(true));
        self.cow = Some(live.clone());
        trace!("qp-trie COW: transaction open, {} leaves shared", self.leaves);
        QpTrie {
            root: self.root,
            leaves: self.leaves,
            mem: self.mem.cow_snapshot(),
            cow: Some(live),
            writer: true,
            _values: PhantomData,
        }
    }

    /// Commits a copy-on-write transaction, consuming the snapshot
    /// (`self`) and the `writer` it spawned, and returning the
    /// published trie.
    ///
    /// Taking the snapshot by value is the linearization point: it is
    /// only possible once no reader borrows the old version any
    /// longer. An embedder publishing across threads performs its
    /// atomic pointer swap (release on the store, acquire on the
    /// readers' load) around this call. Afterward the shared pages
    /// belong to the published trie alone, and everything that became
    /// garbage during the transaction is collected.
    ///
    /// # Panics
    ///
    /// Panics if `writer` did not come from a `cow_start` on `self`.
    pub fn cow_finish(mut self, mut writer: QpTrie<V>) -> QpTrie<V> {
        assert!(writer.writer, "cow_finish requires the writer returned by cow_start");
        match (&self.cow, &writer.cow) {
            (Some(snapshot), Some(forked)) if Arc::ptr_eq(snapshot, forked) => {}
            _ => panic!("cow_finish called with a mismatched snapshot/writer pair"),
        }

        // Dismantle the snapshot: its pages pass to the writer.
        self.cow = None;
        self.mem.forget_pages();
        drop(self);

        // The writer now owns every page it references outright, so
        // the keep marking ends and a collection can recycle all the
        // garbage the transaction produced, including pages captured
        // on the deferred list while the snapshot could still be read.
        writer.mem.clear_keeps();
        writer.compact();
        writer.mem.free_deferred();
        writer.writer = false;
        writer.cow = None;
        trace!("qp-trie COW: transaction committed, {} leaves", writer.leaves);
        writer
    }
}

impl<V> Drop for QpTrie<V> {
    fn drop(&mut self) {
        if self.writer {
            // Aborting an uncommitted transaction. Announce our death
            // so the snapshot may free the shared pages again; our own
            // page table frees only what we allocated ourselves (it
            // skips kept pages and the deferred list, both of which
            // the snapshot still references).
            if let Some(live) = &self.cow {
                live.store(false, Ordering::Release);
            }
        } else if let Some(live) = &self.cow {
            if live.load(Ordering::Acquire) {
                // A writer forked from us is still alive and shares
                // our pages; leak them rather than pull them out from
                // under it.
                self.mem.forget_pages();
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// MEMORY STATISTICS                                                  //
////////////////////////////////////////////////////////////////////////

/// A point-in-time summary of a trie's memory, from
/// [`QpTrie::mem_stats`].
#[derive(Clone, Copy, Debug)]
pub struct MemStats {
    /// Names in the trie.
    pub leaves: usize,
    /// Installed pages.
    pub pages: usize,
    /// Node slots across the installed pages.
    pub nodes: usize,
    /// Nodes currently in use by the structure.
    pub live: usize,
    /// Landfilled nodes awaiting collection.
    pub garbage: usize,
    /// Total heap bytes held (pages, page table, and the trie record).
    pub bytes: usize,
}

impl<V> QpTrie<V> {
    /// Summarizes the trie's memory usage.
    pub fn mem_stats(&self) -> MemStats {
        let (pages, totals) = self.mem.totals();
        MemStats {
            leaves: self.leaves,
            pages,
            nodes: pages * PAGE_SIZE,
            live: totals.live() as usize,
            garbage: totals.free as usize,
            bytes: self.mem.bytes() + mem::size_of::<Self>(),
        }
    }

    /// Writes a human-readable memory report to `out` and returns the
    /// total number of heap bytes in use.
    pub fn print_memstats(&self, out: &mut dyn Write) -> io::Result<usize> {
        let stats = self.mem_stats();
        writeln!(
            out,
            "qp-trie: {} leaves, {} live nodes in {} pages ({} node slots)",
            stats.leaves, stats.live, stats.pages, stats.nodes,
        )?;
        writeln!(
            out,
            "qp-trie: {} nodes of garbage awaiting collection",
            stats.garbage,
        )?;
        let time = &self.mem.gc_time;
        if time.count() > 0 {
            writeln!(
                out,
                "qp-trie: {} collections, mean {:.6} s (sd {:.6}), mean {:.1} pages released",
                time.count(),
                time.mean(),
                time.stddev(),
                self.mem.gc_space.mean(),
            )?;
        }
        writeln!(out, "qp-trie: {} bytes total", stats.bytes)?;
        Ok(stats.bytes)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
