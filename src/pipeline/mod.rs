//! The filter pipeline: the ordered set of mutations (id assignment,
//! read-only clearing/restoration, password hashing, meta bookkeeping,
//! validation) a resource passes through on create, replace, and patch.

pub mod context;
pub mod stages;

pub use context::FilterContext;
pub use stages::{filter, filter_ref};
