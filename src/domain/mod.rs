//! Domain model: catalog products, line items and collection events
pub mod aggregates;
pub mod events;
pub mod value_objects;
