#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

//! A learned secondary index over a sorted, read-only integer key set.
//!
//! [`MultiMap`] is the entry point: build it once from sorted `(key,
//! payload)` pairs, query it with [`MultiMap::lower_bound`] and
//! [`MultiMap::sum_for_key`], and optionally persist it to a directory via
//! [`MultiMap::build`]'s `root_path` argument and reopen it later with
//! [`MultiMap::open`].
//!
//! Internally, a [`TrieSpline`] narrows a query key to a short run of
//! breakpoints using a [`cht::Cht`] (a radix histogram trie), then
//! interpolates a position estimate from a piecewise-linear spline built by
//! [`SplineBuilder`]. The bulk arrays (payload records, spline breakpoints)
//! are persisted as memory-mapped files via [`MappedArray`].

mod binary_search;
mod cht;
mod coding;
mod config;
mod error;
mod key;
mod mapped_array;
mod multi_map;
mod pod;
mod spline;
mod trie_spline;

pub use cht::{Cht, ChtBuilder};
pub use config::BuildOptions;
pub use error::{Error, Result};
pub use key::Key;
pub use mapped_array::MappedArray;
pub use multi_map::{MultiMap, Record};
pub use pod::Pod;
pub use spline::{Coord, SplineBuilder};
pub use trie_spline::TrieSpline;
