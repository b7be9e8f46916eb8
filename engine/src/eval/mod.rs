//! Evaluation: the recursive reducer, the application cache and the reactive state protocol.

pub mod cache;
pub mod evaluator;
pub mod state;

pub use evaluator::{apply, evaluate};
pub use state::{Dependencies, State};
