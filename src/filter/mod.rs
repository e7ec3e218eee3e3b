pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod error;
pub mod params;
pub mod validate;

pub use types::*;
pub use filter::Filter;
pub use filter_order::FilterOrder;
pub use params::QueryParams;
pub use validate::{validate_query, ValidatedQuery};
