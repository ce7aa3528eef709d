//! Shared types for the rollstats campaign roll log.

mod dice;
mod field;
mod roll;
mod stats;

pub use dice::*;
pub use field::*;
pub use roll::*;
pub use stats::*;
