//! Codec Configuration
//!
//! ## ReadConfig
//!
//! Guards the reader against absurd length prefixes in damaged or hostile
//! streams:
//!
//! - **max_record_size**: largest accepted feature record (default: 64MB)
//! - **max_header_size**: largest accepted header block (default: 16MB)
//!
//! ## WriteConfig
//!
//! Controls the indexed [`FeatureWriter`](crate::FeatureWriter):
//!
//! - **index_node_size**: fan-out of the packed R-tree (default: 16, 0 disables the index)
//! - **layer_name**: optional name stored in the header
//!
//! ## Usage
//!
//! ```ignore
//! use geostream_storage::WriteConfig;
//!
//! let config = WriteConfig {
//!     layer_name: Some("parcels".to_string()),
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::index::DEFAULT_NODE_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Maximum feature record size in bytes (default: 64MB)
    #[serde(default = "default_max_record_size")]
    pub max_record_size: usize,

    /// Maximum header block size in bytes (default: 16MB)
    #[serde(default = "default_max_header_size")]
    pub max_header_size: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            max_record_size: default_max_record_size(),
            max_header_size: default_max_header_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Packed R-tree node size, 0 = write without an index (default: 16)
    #[serde(default = "default_index_node_size")]
    pub index_node_size: u16,

    /// Layer name stored in the header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            index_node_size: default_index_node_size(),
            layer_name: None,
        }
    }
}

fn default_max_record_size() -> usize {
    64 * 1024 * 1024 // 64MB
}

fn default_max_header_size() -> usize {
    16 * 1024 * 1024 // 16MB
}

fn default_index_node_size() -> u16 {
    DEFAULT_NODE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let read: ReadConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(read.max_record_size, 64 * 1024 * 1024);
        assert_eq!(read.max_header_size, 16 * 1024 * 1024);

        let write: WriteConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(write.index_node_size, 16);
        assert!(write.layer_name.is_none());
    }

    #[test]
    fn test_override_index_node_size() {
        let write: WriteConfig =
            serde_json::from_str(r#"{"index_node_size": 0, "layer_name": "roads"}"#).unwrap();
        assert_eq!(write.index_node_size, 0);
        assert_eq!(write.layer_name.as_deref(), Some("roads"));
    }
}
