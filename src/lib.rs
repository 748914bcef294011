//! Optical bypass planning for wide-area backbones: discover multi-hop
//! shortcuts, decide how many wavelengths to light on each, and check the
//! plan against link failures and probabilistic failure scenarios.

pub mod error;
pub mod models;
pub mod parse;
pub mod report;
pub mod shortcuts;
pub mod solver;
pub mod topology;

pub use error::{Error, Result};
