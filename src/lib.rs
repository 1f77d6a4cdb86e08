#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod trace;

/// Pluggable memory sources for table buffers.
///
/// Tables draw every buffer from an [`Allocator`](allocator::Allocator).
/// [`Global`](allocator::Global) forwards to the process heap, and
/// [`TrackingAllocator`](allocator::TrackingAllocator) counts what passes
/// through it.
pub mod allocator;

/// A flat hash map with tombstone deletion.
///
/// This module provides a `FlatHashMap` that wraps the `FlatTable` and
/// provides a standard key-value map interface with configurable hashers.
pub mod flat_map;

pub mod flat_table;

pub mod group;

pub use allocator::Allocator;
pub use allocator::Global;
pub use flat_map::Entry;
pub use flat_map::FlatHashMap;
pub use flat_table::FlatTable;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Default hasher for [`FlatHashMap`].
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Default hasher for [`FlatHashMap`].
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder when no default hasher is available; maps must be
        /// built with an explicit hasher.
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHashBuilder {}
    }
}
