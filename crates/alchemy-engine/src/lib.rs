//! The generation pipeline: ranking, judging, meta-prompt optimization,
//! phase orchestration, and the offline learning job that retunes the
//! ranker from real usage.

pub mod error;
pub mod judge;
pub mod learning;
pub mod optimizer;
pub mod phase_engine;
pub mod ranker;

pub use error::{Error, Result};
pub use judge::{Judge, JudgeCriteria, JudgedScore};
pub use learning::{run_once as learn_once, run_once_and_persist as learn_once_and_persist, LearningReport, MIN_TRAINING_PAIRS};
pub use optimizer::{CriteriaWeights, OptimizationIteration, OptimizationRequest, OptimizationResult, Optimizer};
pub use phase_engine::PhaseEngine;
