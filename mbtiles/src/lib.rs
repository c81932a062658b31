#![doc = include_str!("../README.md")]

mod errors;
pub use errors::{MbtError, MbtResult};

mod mbtiles;
pub use mbtiles::Mbtiles;

mod metadata;
pub use metadata::Metadata;

mod queries;
pub use queries::{compute_min_max_zoom, create_flat_tables, create_metadata_table};

pub use sqlx;
