//! Packet sources.

pub mod replay;

pub use replay::{Pacing, ReplayProvider};
