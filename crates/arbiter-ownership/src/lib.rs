//! Arbiter Ownership — exclusive resource ownership for symphonies.
//!
//! Concurrent symphony executions compete for named resources. This crate
//! tracks who holds each resource, classifies conflicting requests, and
//! resolves them by rejecting, queuing, or preempting the current holder.

pub mod application;
pub mod domain;
