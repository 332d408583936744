//! Arena comparison
//!
//! `Arena::compare_models` runs one conversation against several models at
//! once and returns every outcome; `Arena::race_models` returns the best
//! available one. `ArenaController` tracks comparison runs as tasks that can
//! be paused, resumed and cancelled.

mod compare;
pub mod controller;
pub mod types;

pub use compare::Arena;
pub use controller::{ArenaController, ComparisonTask, TaskStatus};
pub use types::{
    CompareOptions, ComparisonStatus, ModelComparisonResult, ModelSpec, ProgressCallback,
};
