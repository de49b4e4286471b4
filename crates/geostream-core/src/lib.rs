//! GeoStream Core Types
//!
//! Shared vocabulary of the GeoStream feature codec:
//!
//! - [`schema`]: column list, geometry type, dimensions and the stream [`Header`]
//! - [`value`]: the closed [`Value`] union and the [`Properties`] table
//! - [`feature`]: [`Feature`], one geometry plus its properties
//! - [`geometry`]: the [`GeometryCodec`] seam and the geo-types implementation
//! - [`error`]: the error taxonomy used by every layer
//!
//! The byte-level codec and the stream reader live in `geostream-storage`.

pub mod error;
pub mod feature;
pub mod geometry;
pub mod schema;
pub mod value;

pub use error::{Error, GeometryError, Result};
pub use feature::Feature;
pub use geometry::{EncodedGeometry, GeoTypesCodec, GeometryCodec, Rect};
pub use schema::{infer_columns, ColumnMeta, ColumnType, Dimensions, GeometryType, Header};
pub use value::{Properties, Value};
