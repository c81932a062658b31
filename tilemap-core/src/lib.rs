#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

/// Source configuration and service properties
pub mod config;

/// Tile sources and their registry
pub mod tiles;

/// OGC capabilities documents and exception reports
pub mod ogc;
