//! Domain types for resource ownership.

pub mod events;
pub mod invariant;
pub mod owner;
pub mod priority;
pub mod queue;
pub mod verdict;
