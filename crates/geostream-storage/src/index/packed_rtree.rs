//! Packed Hilbert R-tree
//!
//! A static R-tree built once over all features of a stream and stored right
//! after the header.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────┬─────────────────────┬─────────────────────────────┐
//! │ root (1 node)│ inner levels ...    │ leaves (one per feature)    │
//! └──────────────┴─────────────────────┴─────────────────────────────┘
//!
//! NodeItem (40 bytes, LE):
//!   min_x f64 | min_y f64 | max_x f64 | max_y f64 | offset u64
//! ```
//!
//! - Inner node `offset`: node index of its first child
//! - Leaf `offset`: byte offset of the feature record in the data section
//!
//! Every node has up to `node_size` children; only the last node of a level
//! may be partial. Leaves are sorted along a Hilbert curve so neighbours on
//! disk are neighbours in space.
//!
//! ## Searching Without Loading
//! [`PackedRTree::stream_search`] reads one node batch at a time from a
//! seekable stream, so a query touches only the branches that intersect it.

use std::collections::VecDeque;
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;

use bytes::{Buf, BufMut, BytesMut};
use geostream_core::{Error, Rect, Result};

use super::FeatureRange;

/// Encoded size of one node
pub const NODE_ITEM_LEN: u64 = 40;

const HILBERT_MAX: f64 = 65535.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeItem {
    pub rect: Rect,
    pub offset: u64,
}

impl NodeItem {
    pub fn new(rect: Rect, offset: u64) -> Self {
        Self { rect, offset }
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_f64_le(self.rect.min_x);
        buf.put_f64_le(self.rect.min_y);
        buf.put_f64_le(self.rect.max_x);
        buf.put_f64_le(self.rect.max_y);
        buf.put_u64_le(self.offset);
    }

    fn read(mut data: &[u8]) -> Self {
        let rect = Rect::new(
            data.get_f64_le(),
            data.get_f64_le(),
            data.get_f64_le(),
            data.get_f64_le(),
        );
        Self::new(rect, data.get_u64_le())
    }
}

/// Node index ranges per level, leaves first, root last.
fn level_bounds(num_items: u64, node_size: u16) -> Result<Vec<Range<u64>>> {
    if node_size < 2 {
        return Err(Error::Index(format!(
            "node size must be at least 2, got {}",
            node_size
        )));
    }
    if num_items == 0 {
        return Ok(Vec::new());
    }

    let node_size = node_size as u64;
    let mut n = num_items;
    let mut num_nodes = n;
    let mut level_num_nodes = vec![n];
    loop {
        n = n.div_ceil(node_size);
        num_nodes = num_nodes
            .checked_add(n)
            .ok_or_else(|| Error::Index(format!("feature count {} too large", num_items)))?;
        level_num_nodes.push(n);
        if n == 1 {
            break;
        }
    }

    let mut bounds = Vec::with_capacity(level_num_nodes.len());
    let mut end = num_nodes;
    for count in level_num_nodes {
        bounds.push(end - count..end);
        end -= count;
    }
    Ok(bounds)
}

/// Check one batch of sibling nodes against the query
fn visit_batch(
    batch: &[NodeItem],
    first: u64,
    level: usize,
    leaves: &Range<u64>,
    rect: &Rect,
    queue: &mut VecDeque<(u64, usize)>,
    results: &mut Vec<FeatureRange>,
) {
    for (i, node) in batch.iter().enumerate() {
        if !rect.intersects(&node.rect) {
            continue;
        }
        if level == 0 {
            let size = batch
                .get(i + 1)
                .and_then(|next| next.offset.checked_sub(node.offset));
            results.push(FeatureRange {
                offset: node.offset,
                size,
                index: first + i as u64 - leaves.start,
            });
        } else {
            queue.push_back((node.offset, level - 1));
        }
    }
}

fn check_child(level_bounds: &[Range<u64>], node_index: u64, level: usize) -> Result<()> {
    let bounds = &level_bounds[level];
    if !bounds.contains(&node_index) {
        return Err(Error::Index(format!(
            "node {} outside level {} ({}..{})",
            node_index, level, bounds.start, bounds.end
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PackedRTree {
    node_size: u16,
    num_items: u64,
    extent: Rect,
    nodes: Vec<NodeItem>,
    level_bounds: Vec<Range<u64>>,
}

impl PackedRTree {
    /// Size in bytes of a tree over `num_items` leaves. Zero items → zero bytes.
    pub fn calc_size(num_items: u64, node_size: u16) -> Result<u64> {
        let bounds = level_bounds(num_items, node_size)?;
        let num_nodes = bounds.first().map(|r| r.end).unwrap_or(0);
        num_nodes
            .checked_mul(NODE_ITEM_LEN)
            .ok_or_else(|| Error::Index(format!("index for {} features too large", num_items)))
    }

    /// Build from leaves already in storage (Hilbert) order.
    pub fn build(items: &[NodeItem], extent: Rect, node_size: u16) -> Result<Self> {
        let num_items = items.len() as u64;
        let level_bounds = level_bounds(num_items, node_size)?;
        let num_nodes = level_bounds.first().map(|r| r.end as usize).unwrap_or(0);

        let mut nodes = vec![NodeItem::new(Rect::empty(), 0); num_nodes];
        if let Some(leaves) = level_bounds.first() {
            nodes[leaves.start as usize..leaves.end as usize].copy_from_slice(items);
        }

        let step = node_size as usize;
        for level in 0..level_bounds.len().saturating_sub(1) {
            let children = level_bounds[level].start as usize..level_bounds[level].end as usize;
            let mut parent = level_bounds[level + 1].start as usize;
            let mut pos = children.start;
            while pos < children.end {
                let end = (pos + step).min(children.end);
                let mut rect = Rect::empty();
                for child in &nodes[pos..end] {
                    rect.expand(&child.rect);
                }
                nodes[parent] = NodeItem::new(rect, pos as u64);
                parent += 1;
                pos = end;
            }
        }

        Ok(Self {
            node_size,
            num_items,
            extent,
            nodes,
            level_bounds,
        })
    }

    pub fn num_items(&self) -> u64 {
        self.num_items
    }

    pub fn node_size(&self) -> u16 {
        self.node_size
    }

    pub fn extent(&self) -> Rect {
        self.extent
    }

    /// Encoded size of this tree
    pub fn size(&self) -> u64 {
        self.nodes.len() as u64 * NODE_ITEM_LEN
    }

    /// Search the in-memory tree
    pub fn search(&self, rect: &Rect) -> Result<Vec<FeatureRange>> {
        let mut results = Vec::new();
        let Some(leaves) = self.level_bounds.first() else {
            return Ok(results);
        };

        let mut queue = VecDeque::from([(0u64, self.level_bounds.len() - 1)]);
        while let Some((node_index, level)) = queue.pop_front() {
            check_child(&self.level_bounds, node_index, level)?;
            let end = (node_index + self.node_size as u64).min(self.level_bounds[level].end);
            let batch = &self.nodes[node_index as usize..end as usize];
            visit_batch(batch, node_index, level, leaves, rect, &mut queue, &mut results);
        }
        Ok(results)
    }

    /// Search a serialized tree starting at `index_start`, reading one node batch at a time.
    pub fn stream_search<R: Read + Seek>(
        reader: &mut R,
        index_start: u64,
        num_items: u64,
        node_size: u16,
        rect: &Rect,
    ) -> Result<Vec<FeatureRange>> {
        let level_bounds = level_bounds(num_items, node_size)?;
        let mut results = Vec::new();
        let Some(leaves) = level_bounds.first().cloned() else {
            return Ok(results);
        };

        let mut queue = VecDeque::from([(0u64, level_bounds.len() - 1)]);
        let mut buf = Vec::new();
        while let Some((node_index, level)) = queue.pop_front() {
            check_child(&level_bounds, node_index, level)?;
            let end = (node_index + node_size as u64).min(level_bounds[level].end);

            reader.seek(SeekFrom::Start(index_start + node_index * NODE_ITEM_LEN))?;
            buf.resize(((end - node_index) * NODE_ITEM_LEN) as usize, 0);
            reader.read_exact(&mut buf).map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    Error::Index(format!("truncated index block at node {}", node_index))
                }
                _ => Error::Io(e),
            })?;

            let batch: Vec<NodeItem> = buf
                .chunks_exact(NODE_ITEM_LEN as usize)
                .map(NodeItem::read)
                .collect();
            visit_batch(&batch, node_index, level, &leaves, rect, &mut queue, &mut results);
        }

        tracing::trace!(
            features_count = num_items,
            matches = results.len(),
            "Index search complete"
        );
        Ok(results)
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut buf = BytesMut::with_capacity(self.size() as usize);
        for node in &self.nodes {
            node.write(&mut buf);
        }
        out.write_all(&buf)?;
        Ok(())
    }
}

/// Sort items along a Hilbert curve over `extent`, keyed by each item's bounds center.
pub fn hilbert_sort<T>(items: &mut [T], extent: &Rect, bounds: impl Fn(&T) -> Rect) {
    items.sort_by_cached_key(|item| hilbert_value(&bounds(item), extent));
}

fn hilbert_value(rect: &Rect, extent: &Rect) -> u32 {
    let x = scale((rect.min_x + rect.max_x) / 2.0, extent.min_x, extent.width());
    let y = scale((rect.min_y + rect.max_y) / 2.0, extent.min_y, extent.height());
    hilbert(x, y)
}

fn scale(value: f64, min: f64, span: f64) -> u32 {
    if span > 0.0 {
        (HILBERT_MAX * (value - min) / span).clamp(0.0, HILBERT_MAX) as u32
    } else {
        0
    }
}

// Fast Hilbert curve index for 16-bit coordinates
// (http://threadlocalmutex.com/, public domain).
fn hilbert(x: u32, y: u32) -> u32 {
    let mut a = x ^ y;
    let mut b = 0xFFFF ^ a;
    let mut c = 0xFFFF ^ (x | y);
    let mut d = x & (y ^ 0xFFFF);

    let mut aa = a | (b >> 1);
    let mut bb = (a >> 1) ^ a;
    let mut cc = ((c >> 1) ^ (b & (d >> 1))) ^ c;
    let mut dd = ((a & (c >> 1)) ^ (d >> 1)) ^ d;

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    aa = (a & (a >> 2)) ^ (b & (b >> 2));
    bb = (a & (b >> 2)) ^ (b & ((a ^ b) >> 2));
    cc ^= (a & (c >> 2)) ^ (b & (d >> 2));
    dd ^= (b & (c >> 2)) ^ ((a ^ b) & (d >> 2));

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    aa = (a & (a >> 4)) ^ (b & (b >> 4));
    bb = (a & (b >> 4)) ^ (b & ((a ^ b) >> 4));
    cc ^= (a & (c >> 4)) ^ (b & (d >> 4));
    dd ^= (b & (c >> 4)) ^ ((a ^ b) & (d >> 4));

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    cc ^= (a & (c >> 8)) ^ (b & (d >> 8));
    dd ^= (b & (c >> 8)) ^ ((a ^ b) & (d >> 8));

    a = cc ^ (cc >> 1);
    b = dd ^ (dd >> 1);

    let mut i0 = x ^ y;
    let mut i1 = b | (0xFFFF ^ (i0 | a));

    i0 = (i0 | (i0 << 8)) & 0x00FF00FF;
    i0 = (i0 | (i0 << 4)) & 0x0F0F0F0F;
    i0 = (i0 | (i0 << 2)) & 0x33333333;
    i0 = (i0 | (i0 << 1)) & 0x55555555;

    i1 = (i1 | (i1 << 8)) & 0x00FF00FF;
    i1 = (i1 | (i1 << 4)) & 0x0F0F0F0F;
    i1 = (i1 | (i1 << 2)) & 0x33333333;
    i1 = (i1 | (i1 << 1)) & 0x55555555;

    (i1 << 1) | i0
}
