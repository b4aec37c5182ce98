//! Cache module

mod item;
mod reaper;
mod store;
mod ttl;

pub use item::Item;
pub use store::Cache;
pub use ttl::{ParseTtlError, Ttl};
