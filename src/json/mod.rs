//! JSON codec: a deserializer that walks a property tree in lock-step
//! with parsed JSON, and a serializer honoring `returned` plus the
//! caller's attributes/excludedAttributes projection.

pub mod de;
pub mod ser;

pub use de::{assign_value, deserialize};
pub use ser::{serialize, Projection};
