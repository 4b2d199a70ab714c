//! Fuzzing support for vmbus-ring.
//!
//! Each model drives the real ring alongside a simple reference and checks
//! that the two never disagree.

pub mod hostile_peer;
pub mod ring_model;
