//! Feature Data Structure
//!
//! This module defines `Feature` - the unit of encode and decode in GeoStream.
//!
//! ## What is a Feature?
//! One geometry plus its attribute values:
//! - **geometry**: optional; `None` when the feature has no shape or when its
//!   shape could not be decoded
//! - **properties**: sparse, ordered map from column name to [`Value`]
//!
//! Features are transient. The writer never retains them and the reader builds
//! a fresh one per record.
//!
//! ## Example
//! ```ignore
//! let feature = Feature::new(Some(Geometry::Point(point!(x: 1.0, y: 2.0))))
//!     .with_property("id", 5i32)
//!     .with_property("name", "a");
//! ```

use serde::Serialize;

use crate::value::{Properties, Value};

/// A single geometry with its attribute values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature<G = geo_types::Geometry<f64>> {
    pub geometry: Option<G>,

    pub properties: Properties,
}

impl<G> Feature<G> {
    pub fn new(geometry: Option<G>) -> Self {
        Self {
            geometry,
            properties: Properties::new(),
        }
    }

    pub fn with_properties(geometry: Option<G>, properties: Properties) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    /// Builder-style property insert
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// True if any property would be written (non-null)
    pub fn has_properties(&self) -> bool {
        self.properties.values().any(|v| !v.is_null())
    }
}
