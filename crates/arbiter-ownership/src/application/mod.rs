//! Application services: the ownership tracker, the conflict resolver and
//! the resource manager façade that combines them.

pub mod conflict_resolver;
pub mod resource_manager;
pub mod tracker;
