mod error;
pub use error::{PostgisError, PostgisResult};

mod query;
pub use query::TableQuery;

mod source;
pub use source::PostgisSource;
