// src/error.rs
//! Planner error kinds.
//!
//! None of these ever escape `TrajectoryPlanner::calculate_trajectory`. The
//! planner is a best-effort anytime search: a failed sample is discarded, a
//! failed tick degrades to a stand-still trajectory.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    /// The two-parameter trajectory iteration did not converge for a sample.
    #[error("trajectory sample did not converge onto the target")]
    SampleInfeasible,

    /// A candidate trajectory intersects an obstacle or leaves the field.
    #[error("candidate trajectory intersects an obstacle")]
    TrajectoryInObstacle,

    /// Every sampler failed for this tick.
    #[error("no feasible trajectory found")]
    NoFeasibleTrajectory,

    /// The standard sampler's seed table is absent or unreadable. The sampler
    /// falls back to live-only sampling.
    #[error("precomputation data unavailable: {0}")]
    PrecomputationMissing(String),

    /// Non-finite positions or non-positive limits were passed in.
    #[error("invalid planner input: {0}")]
    InvalidInput(&'static str),
}
