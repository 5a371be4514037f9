pub mod crossover;
pub mod indicators;
pub mod recipe;
pub mod settings;

#[cfg(test)]
mod indicators_tests;

pub use crossover::*;
pub use indicators::*;
pub use recipe::*;
pub use settings::*;
