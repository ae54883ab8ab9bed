// src/samplers/mod.rs
//! Randomised search strategies that propose trajectories and score them
//! against the obstacle model.
//!
//! The orchestrator composes three of them: the standard sampler tries to
//! reach the target, the end-in-obstacle sampler finds the closest reachable
//! substitute endpoint, and the escape sampler drives out of an obstacle the
//! robot is already inside of.

pub mod end_in_obstacle;
pub mod escape;
pub mod standard;

pub use end_in_obstacle::EndInObstacleSampler;
pub use escape::{EscapeObstacleSampler, MultiEscapeSampler};
pub use standard::{StandardSample, StandardSampler};

use crate::TrajectoryInput;
use crate::profile::Trajectory;
use crate::rng::PlannerRng;
use crate::world::WorldInformation;

/// Shared read-only world view plus the planner's generator, valid for the
/// duration of one `compute` call.
pub struct SamplerContext<'a> {
    pub world: &'a WorldInformation,
    pub rng: &'a mut PlannerRng,
}

/// A sampler keeps its own cross-tick state (the previous best parameters)
/// and produces one or more trajectory parts on success.
pub trait TrajectorySampler {
    /// Returns true if a valid candidate was produced.
    fn compute(&mut self, ctx: &mut SamplerContext<'_>, input: &TrajectoryInput) -> bool;

    fn result(&self) -> &[Trajectory];

    /// Drops all cross-tick state, used when the planner is reassigned to a
    /// different robot.
    fn reset(&mut self) {}
}
