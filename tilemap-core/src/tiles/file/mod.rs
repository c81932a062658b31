mod source;
pub use source::{FileError, FileSource, PathTemplate};
