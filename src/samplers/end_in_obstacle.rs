// src/samplers/end_in_obstacle.rs
//! Fallback sampler for targets that sit inside an obstacle: find the
//! reachable endpoint closest to the original target and drive there.

use super::{SamplerContext, TrajectorySampler};
use crate::alpha_time;
use crate::error::PlannerError;
use crate::geometry::Vector;
use crate::profile::Trajectory;
use crate::{EndSpeed, RobotState, TrajectoryInput, TrajectoryPoint};

/// Candidate endpoints keep at least this much clearance to static
/// obstacles.
const STATIC_CLEARANCE: f32 = 0.03;
/// Search radius around the target and around the previous best endpoint.
const SEARCH_RADIUS: f32 = 0.3;
/// Search radius around the immediate braking position.
const STOP_SEARCH_RADIUS: f32 = 0.5;

pub struct EndInObstacleSampler {
    iterations: u32,
    best_end_point: Vector,
    best_end_point_distance: f32,
    valid: bool,
    result: Vec<Trajectory>,
}

impl EndInObstacleSampler {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations,
            best_end_point: Vector::ZERO,
            best_end_point_distance: f32::MAX,
            valid: false,
            result: Vec::new(),
        }
    }

    fn plan_to_end_point(
        ctx: &mut SamplerContext<'_>,
        input: &TrajectoryInput,
        end_point: Vector,
    ) -> Result<Trajectory, PlannerError> {
        let probe = TrajectoryPoint::new(RobotState::new(end_point, Vector::ZERO), 0.0);
        if ctx
            .world
            .min_obstacle_distance_point(&probe, true, false, STATIC_CLEARANCE)
            < STATIC_CLEARANCE
        {
            return Err(PlannerError::TrajectoryInObstacle);
        }

        // no slow-down here, this is not where the robot wants to end up
        let target = RobotState::new(end_point, Vector::ZERO);
        let direct = alpha_time::find_trajectory(
            &input.start,
            &target,
            input.acceleration,
            input.max_speed,
            0.0,
            false,
            EndSpeed::Exact,
        )
        .ok_or(PlannerError::SampleInfeasible)?;

        if ctx.world.is_trajectory_in_obstacle(&direct, input.t0) {
            return Err(PlannerError::TrajectoryInObstacle);
        }
        Ok(direct)
    }

    fn test_end_point(
        &mut self,
        ctx: &mut SamplerContext<'_>,
        input: &TrajectoryInput,
        end_point: Vector,
    ) -> bool {
        let target_distance = end_point.distance(input.target.pos);
        if target_distance > self.best_end_point_distance - 0.01 {
            return false;
        }
        match Self::plan_to_end_point(ctx, input, end_point) {
            Ok(direct) => {
                self.best_end_point_distance = target_distance;
                self.best_end_point = end_point;
                self.valid = true;
                self.result.clear();
                self.result.push(direct);
                true
            }
            // infeasible or colliding candidates are simply discarded
            Err(_) => false,
        }
    }

    fn random_point_in_field(ctx: &mut SamplerContext<'_>, input: &TrajectoryInput) -> Vector {
        match ctx.world.boundary() {
            Some(bound) => ctx.rng.uniform_vector_in(bound.bottom_left, bound.top_right),
            None => input.target.pos,
        }
    }
}

impl TrajectorySampler for EndInObstacleSampler {
    fn compute(&mut self, ctx: &mut SamplerContext<'_>, input: &TrajectoryInput) -> bool {
        // the previous tick's endpoint seeds the search; when it fails its
        // distance only acts as an inflated cap
        let prev_best_distance = self.best_end_point_distance;
        self.best_end_point_distance = f32::MAX;
        self.valid = false;
        if !self.test_end_point(ctx, input, self.best_end_point) {
            self.best_end_point_distance = prev_best_distance * 1.3;
        }

        // where the robot would come to rest when braking right now
        let stop = alpha_time::calculate_trajectory(
            &RobotState::new(Vector::ZERO, input.start.speed),
            Vector::ZERO,
            0.0,
            0.0,
            input.acceleration,
            input.max_speed,
            0.0,
            EndSpeed::Exact,
        );
        let stop_point = input.start.pos + stop.end_position() * 1.01;

        for i in 0..self.iterations {
            if i == self.iterations / 3 && !self.valid {
                self.best_end_point_distance = f32::MAX;
                self.test_end_point(ctx, input, stop_point);
            }
            let rand_val = ctx.rng.uniform_int() % 1024;
            let test_point = if rand_val < 300 {
                let radius = self.best_end_point_distance.min(SEARCH_RADIUS);
                input.target.pos
                    + ctx.rng.uniform_vector_in(
                        Vector::new(-radius, -radius),
                        Vector::new(radius, radius),
                    )
            } else if rand_val < 700 || self.best_end_point_distance < SEARCH_RADIUS {
                let radius = self.best_end_point_distance.min(SEARCH_RADIUS);
                self.best_end_point
                    + ctx.rng.uniform_vector_in(
                        Vector::new(-radius, -radius),
                        Vector::new(radius, radius),
                    )
            } else if rand_val < 900 {
                let radius = self.best_end_point_distance.min(STOP_SEARCH_RADIUS);
                stop_point
                    + ctx.rng.uniform_vector_in(
                        Vector::new(-radius, -radius),
                        Vector::new(radius, radius),
                    )
            } else {
                Self::random_point_in_field(ctx, input)
            };
            self.test_end_point(ctx, input, test_point);
        }
        self.valid
    }

    fn result(&self) -> &[Trajectory] {
        &self.result
    }

    fn reset(&mut self) {
        self.best_end_point = Vector::ZERO;
        self.best_end_point_distance = f32::MAX;
        self.valid = false;
        self.result.clear();
    }
}
