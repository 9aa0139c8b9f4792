//! Connections that monitor VRT streams.

pub mod replay;


pub use replay::ReplayConnection;
