pub mod compiler;
pub mod error;
pub mod pagination;
pub mod params;
pub mod scope;
pub mod sql;
pub mod types;

pub use compiler::FilterCompiler;
pub use error::FilterError;
pub use params::{normalize, ParamValue, QueryParams};
pub use scope::{Join, OwnerPredicate, ScopedQuery};
pub use types::*;
