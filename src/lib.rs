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

//! An ordered, DNS-specific qp-trie.
//!
//! This crate provides the [`QpTrie`], an ordered associative container
//! keyed by domain names. It is intended to serve as the name-lookup
//! core of an authoritative DNS server: the server stores one value per
//! domain name (typically the bundle of RRsets owned by that name), and
//! the trie answers exact lookups, predecessor lookups, and ordered
//! traversals over the whole name set.
//!
//! Ordered access is the point. An in-memory zone structure built on
//! hash maps answers exact-match queries nicely, but DNSSEC processing
//! (NSEC chains, closest-encloser computations) needs to ask "what is
//! the largest name less than or equal to this one?", and for that, the
//! name set must be kept in canonical order. A qp-trie keeps its keys
//! in precisely the canonical ordering of [RFC 4034 § 6.1] while
//! staying as compact as a crit-bit tree, because its branch nodes use
//! a popcount-indexed sparse vector of children rather than a full
//! 256-way fan-out.
//!
//! ## What is in the box
//!
//! * The [`name`] module provides owned domain-name values ([`Name`])
//!   with case-insensitive equality and canonical ordering. These are
//!   the keys of the trie.
//! * The [`trie`] module provides the container itself, together with
//!   the machinery that makes it interesting: a 12-byte bit-packed
//!   node encoding, a page-based bump allocator that keeps each
//!   branch's child vector contiguous in memory, a copying garbage
//!   collector that compacts live nodes and returns empty pages, and a
//!   copy-on-write transaction mode that lets readers traverse a
//!   published trie while a writer builds the next version.
//!
//! ## What is deliberately not in the box
//!
//! No DNS message parsing, no sockets, no zone files. The embedding
//! server owns the values and the names; the trie merely indexes them.
//! Likewise the trie provides no locking of its own: the copy-on-write
//! hand-off contract is documented on [`QpTrie::cow_start`] and
//! [`QpTrie::cow_finish`], and the embedder supplies whatever lock or
//! atomic pointer swap its threading model requires.
//!
//! [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
//! [`Name`]: name::Name

pub mod name;
pub mod trie;

pub use trie::QpTrie;
