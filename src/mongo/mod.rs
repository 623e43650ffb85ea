//! MongoDB adapter: BSON marshaling, a filter-AST-to-query translator,
//! and sort/pagination/projection mapping. Gated behind the `mongo`
//! feature so consumers supplying their own `PersistenceProvider` aren't
//! forced to pull in the Mongo driver.

pub mod filter;
pub mod marshal;
pub mod meta;
pub mod sort;

pub use filter::translate;
pub use marshal::{marshal, unmarshal};
pub use meta::MetadataHub;
pub use sort::{pagination, projection_document, sort_document, Sort, SortOrder};
