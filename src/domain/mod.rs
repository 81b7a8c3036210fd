//! Domain layer: resource kinds and the upstream resources they address.

pub mod resources;

pub use resources::{Resource, ResourceKind, TtlClass};
