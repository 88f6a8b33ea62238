//! Arbiter Core — shared abstractions.
//!
//! This crate defines the clock, randomness, configuration, error and event
//! publication seams that the ownership engine and its hosts depend on. It
//! contains no arbitration logic.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod rng;
pub mod sink;
