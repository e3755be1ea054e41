//! Tracktable decodes genome track tables for visualization pipelines in
//! [Rust](https://www.rust-lang.org/). A track table is a wide tab-separated
//! dataset keyed by scaffold id, whose column headers carry a small grammar
//! naming each track, its type, its display features and the track it is
//! attached to. Tracktable parses that grammar into a typed metadata table
//! and a per-track feature dictionary over a [Polars](https://pola.rs/) data
//! frame, converts every value column according to its resolved type, and can
//! split the result into independent per-track or per-scaffold tables. While
//! we believe Tracktable can be useful and helpful today, we are open to
//! feedback, suggestions and ideas for improvement.

pub mod error;
pub mod options;
pub mod reader;
pub mod tracktable_info;
pub mod tracktable_utils;

pub use error::TrackTableError;
pub use tracktable_info::{
    ColumnMeta, FeatureGroup, FeatureMap, TrackFeatures, TrackMetadata, TrackTable,
};
