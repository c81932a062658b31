#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod logging;
pub mod srv;

mod error;
pub use error::{TilemapError, TilemapResult};
