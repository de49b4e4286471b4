//! Spatial Index Seam
//!
//! The stream reader never walks an index itself. It asks a [`SpatialIndex`]
//! two things:
//!
//! 1. **calc_size**: how many bytes the index block occupies for a given
//!    feature count and node size, so a full scan can skip it
//! 2. **stream_search**: which records intersect a rectangle, as byte ranges
//!    relative to the start of the data section
//!
//! [`PackedIndex`] answers both with the packed Hilbert R-tree in
//! [`packed_rtree`].

use std::io::{Read, Seek};

use geostream_core::{Rect, Result};

pub mod packed_rtree;

pub use packed_rtree::{hilbert_sort, NodeItem, PackedRTree, NODE_ITEM_LEN};

/// Default fan-out of the packed R-tree
pub const DEFAULT_NODE_SIZE: u16 = 16;

/// Location of one matching record inside the data section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRange {
    /// Byte offset from the start of the data section (points at the length prefix)
    pub offset: u64,

    /// Record size including its length prefix, when the index can tell
    pub size: Option<u64>,

    /// Position of the feature in storage order
    pub index: u64,
}

pub trait SpatialIndex {
    /// Size in bytes of the index block
    fn calc_size(&self, features_count: u64, node_size: u16) -> Result<u64>;

    /// Ranges of records whose bounds intersect `rect`, in traversal order
    fn stream_search<R: Read + Seek>(
        &self,
        reader: &mut R,
        index_start: u64,
        features_count: u64,
        node_size: u16,
        rect: &Rect,
    ) -> Result<Vec<FeatureRange>>;
}

/// [`SpatialIndex`] backed by a packed Hilbert R-tree
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedIndex;

impl SpatialIndex for PackedIndex {
    fn calc_size(&self, features_count: u64, node_size: u16) -> Result<u64> {
        PackedRTree::calc_size(features_count, node_size)
    }

    fn stream_search<R: Read + Seek>(
        &self,
        reader: &mut R,
        index_start: u64,
        features_count: u64,
        node_size: u16,
        rect: &Rect,
    ) -> Result<Vec<FeatureRange>> {
        PackedRTree::stream_search(reader, index_start, features_count, node_size, rect)
    }
}
