mod error;
pub use error::MbtilesError;

mod source;
pub use source::MbtSource;
