//! The property tree: polymorphic value nodes, their mutation events,
//! annotation-driven subscribers, and a traversal cursor over them.

pub mod event;
pub mod navigator;
pub mod property;
pub mod subscriber;

pub use event::{Event, EventKind};
pub use navigator::Navigator;
pub use property::{PropertyRef, ScalarValue};
