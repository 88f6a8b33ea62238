//! Shared test doubles and utilities for the symphony resource arbiter.

mod clock;
mod rng;
mod sink;

pub use clock::{FixedClock, SteppingClock, fixed_time};
pub use rng::{MockRng, SequenceRng};
pub use sink::RecordingEventSink;
