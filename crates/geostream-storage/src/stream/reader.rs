//! Stream Reader - Pulling Features Out of a GeoStream
//!
//! `FeatureReader` owns a seekable stream for one read session. Opening it
//! reads the header; a `select_*` call then turns it into a lazy [`Features`]
//! iterator.
//!
//! ## Session States
//!
//! ```text
//! open() ──> header read ──┬── select_all()  ──> full scan  ──┬──> end of stream
//!                          └── select_bbox() ──> index scan ──┴──> first error (fused)
//! ```
//!
//! ### Full Scan
//! 1. Skip the index block (its size comes from the spatial index)
//! 2. Read a `u32` length, then that many bytes
//! 3. Decode the record and yield it
//! 4. Stop when the position reaches the end of the stream
//!
//! ### Index Scan
//! 1. Ask the spatial index which records intersect the rectangle
//! 2. For each range, seek to `data start + offset` and read the record
//! 3. When the index knows the record size, the length prefix must agree
//!
//! Index scan yields in index traversal order. A stream written without an
//! index falls back to a full scan and the rectangle is ignored.
//!
//! ## Errors
//! Features yielded before an error stay valid. After the first error the
//! iterator returns `None`.

use std::io::{Cursor, Read, Seek, SeekFrom};

use geostream_core::{Error, Feature, GeoTypesCodec, GeometryCodec, Header, Rect, Result};
use tracing::{debug, trace, warn};

use super::header::read_header;
use super::record::decode_feature;
use super::{eof_as_format, SIZE_PREFIX_LEN};
use crate::config::ReadConfig;
use crate::index::{FeatureRange, PackedIndex, SpatialIndex};

/// Open read session over one stream
pub struct FeatureReader<R, C = GeoTypesCodec, I = PackedIndex> {
    reader: R,
    codec: C,
    index: I,
    config: ReadConfig,
    header: Header,

    /// Stream position of the magic bytes
    base: u64,

    /// Magic bytes + length prefix + header block
    header_len: u64,

    stream_len: u64,
}

impl<R: Read + Seek> FeatureReader<R> {
    /// Open with the geo-types codec, the packed R-tree and default limits.
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with(reader, GeoTypesCodec, PackedIndex, ReadConfig::default())
    }
}

impl<R, C, I> FeatureReader<R, C, I>
where
    R: Read + Seek,
    C: GeometryCodec,
    I: SpatialIndex,
{
    pub fn open_with(mut reader: R, codec: C, index: I, config: ReadConfig) -> Result<Self> {
        let base = reader.stream_position()?;
        let (header, header_len) = read_header(&mut reader, &config)?;
        let stream_len = reader.seek(SeekFrom::End(0))?;

        Ok(Self {
            reader,
            codec,
            index,
            config,
            header,
            base,
            header_len,
            stream_len,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    fn index_start(&self) -> u64 {
        self.base + self.header_len
    }

    fn data_start(&self) -> Result<u64> {
        let index_len = if self.header.has_index() {
            self.index
                .calc_size(self.header.features_count, self.header.index_node_size)?
        } else {
            0
        };
        let start = self
            .index_start()
            .checked_add(index_len)
            .ok_or_else(|| Error::Index(format!("index size {} overflows", index_len)))?;
        if start > self.stream_len {
            return Err(Error::truncated("spatial index block"));
        }
        Ok(start)
    }

    /// Iterate every record in storage order.
    pub fn select_all(mut self) -> Result<Features<R, C>> {
        let data_start = self.data_start()?;
        self.reader.seek(SeekFrom::Start(data_start))?;

        debug!(
            data_start,
            stream_len = self.stream_len,
            features_count = self.header.features_count,
            "Starting full scan"
        );

        let end = self.stream_len;
        Ok(self.into_features(Scan::Full {
            position: data_start,
            end,
        }))
    }

    /// Iterate records whose bounds intersect `rect`.
    pub fn select_bbox(mut self, rect: Rect) -> Result<Features<R, C>> {
        if !self.header.has_index() {
            debug!(?rect, "Stream has no spatial index, using full scan");
            return self.select_all();
        }

        let data_start = self.data_start()?;
        let index_start = self.index_start();
        let ranges = self.index.stream_search(
            &mut self.reader,
            index_start,
            self.header.features_count,
            self.header.index_node_size,
            &rect,
        )?;

        debug!(
            ?rect,
            matches = ranges.len(),
            features_count = self.header.features_count,
            "Starting index scan"
        );

        Ok(self.into_features(Scan::Index {
            data_start,
            ranges: ranges.into_iter(),
        }))
    }

    /// Index scan with a rectangle, full scan without.
    pub fn select(self, rect: Option<Rect>) -> Result<Features<R, C>> {
        match rect {
            Some(rect) => self.select_bbox(rect),
            None => self.select_all(),
        }
    }

    fn into_features(self, scan: Scan) -> Features<R, C> {
        Features {
            reader: self.reader,
            codec: self.codec,
            header: self.header,
            max_record_size: self.config.max_record_size,
            scan,
            yielded: 0,
            done: false,
            buf: Vec::new(),
        }
    }
}

enum Scan {
    Full {
        position: u64,
        end: u64,
    },
    Index {
        data_start: u64,
        ranges: std::vec::IntoIter<FeatureRange>,
    },
}

/// Lazy, forward-only feature iterator. Consumes the reader.
pub struct Features<R, C: GeometryCodec = GeoTypesCodec> {
    reader: R,
    codec: C,
    header: Header,
    max_record_size: usize,
    scan: Scan,
    yielded: u64,
    done: bool,
    buf: Vec<u8>,
}

impl<R: Read + Seek, C: GeometryCodec> Features<R, C> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    fn next_feature(&mut self) -> Result<Option<Feature<C::Geometry>>> {
        // (stream position, bytes left in the stream, size reported by the index)
        let (position, remaining, expected_size) = match &mut self.scan {
            Scan::Full { position, end } => {
                if *position >= *end {
                    return Ok(None);
                }
                (*position, Some(*end - *position), None)
            }
            Scan::Index { data_start, ranges } => match ranges.next() {
                Some(range) => {
                    let position = data_start.checked_add(range.offset).ok_or_else(|| {
                        Error::Index(format!("record offset {} overflows", range.offset))
                    })?;
                    self.reader.seek(SeekFrom::Start(position))?;
                    (position, None, range.size)
                }
                None => return Ok(None),
            },
        };

        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(eof_as_format("record length"))?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let record_size = SIZE_PREFIX_LEN + len as u64;

        if len > self.max_record_size {
            return Err(Error::Format(format!(
                "record of {} bytes at {} exceeds limit of {}",
                len, position, self.max_record_size
            )));
        }
        if let Some(size) = expected_size {
            if size != record_size {
                return Err(Error::Format(format!(
                    "record at {} is {} bytes but the index expects {}",
                    position, record_size, size
                )));
            }
        }
        if let Some(remaining) = remaining {
            if record_size > remaining {
                return Err(Error::truncated("record"));
            }
        }

        self.buf.resize(len, 0);
        self.reader
            .read_exact(&mut self.buf)
            .map_err(eof_as_format("record"))?;

        if let Scan::Full { position, .. } = &mut self.scan {
            *position += record_size;
        }

        trace!(position, len, "Decoding record");
        decode_feature(&self.buf, &self.header, &self.codec).map(Some)
    }
}

impl<R: Read + Seek, C: GeometryCodec> Iterator for Features<R, C> {
    type Item = Result<Feature<C::Geometry>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_feature() {
            Ok(Some(feature)) => {
                self.yielded += 1;
                Some(Ok(feature))
            }
            Ok(None) => {
                self.done = true;
                let full_scan = matches!(self.scan, Scan::Full { .. });
                let declared = self.header.features_count;
                if full_scan && declared > 0 && declared != self.yielded {
                    warn!(
                        declared,
                        read = self.yielded,
                        "Feature count in header does not match records in stream"
                    );
                }
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Open a stream and select features, by rectangle when one is given.
pub fn deserialize<R: Read + Seek>(reader: R, rect: Option<Rect>) -> Result<Features<R>> {
    FeatureReader::open(reader)?.select(rect)
}

/// Decode every feature of an in-memory stream.
pub fn deserialize_bytes(bytes: &[u8]) -> Result<Vec<Feature>> {
    FeatureReader::open(Cursor::new(bytes))?.select_all()?.collect()
}
