// src/planner.rs
//! The per-tick planning entry point.
//!
//! One planner per robot. Each tick the strategy layer rebuilds the obstacle
//! set, then calls [`TrajectoryPlanner::calculate_trajectory`]. The planner
//! first tries the direct alpha-time trajectory; when that is blocked or the
//! request itself is infeasible it delegates to the samplers in a fixed
//! order. The result is resampled into equispaced points and kept around so
//! peer planners can treat it as a moving obstacle in the next tick.

use crate::alpha_time;
use crate::capture::InputCapture;
use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::geometry::Vector;
use crate::obstacles::ObstacleShape;
use crate::profile::{SLOW_DOWN_TIME, Trajectory};
use crate::rng::PlannerRng;
use crate::samplers::standard::OBSTACLE_AVOIDANCE_RADIUS;
use crate::samplers::{
    EndInObstacleSampler, MultiEscapeSampler, SamplerContext, StandardSampler, TrajectorySampler,
};
use crate::world::WorldInformation;
use crate::{EndSpeed, RobotState, TrajectoryInput, TrajectoryPoint};
use std::sync::Arc;

/// Samples per trajectory part in the controller-facing output.
const SAMPLES_PER_TRAJECTORY: usize = 40;
/// A part longer than this means the search produced garbage.
const MAX_PART_TIME: f32 = 20.0;

pub struct TrajectoryPlanner {
    world: WorldInformation,
    rng: PlannerRng,
    standard_sampler: StandardSampler,
    end_in_obstacle_sampler: EndInObstacleSampler,
    escape_sampler: MultiEscapeSampler,

    /// The last tick's resampled result, referenced by peer planners.
    current_trajectory: Arc<Vec<TrajectoryPoint>>,
    max_intersecting_obstacle_prio: i32,
    capture: Option<InputCapture>,
    last_robot_id: Option<u32>,
}

impl TrajectoryPlanner {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, &PlannerConfig::default())
    }

    pub fn with_config(seed: u64, config: &PlannerConfig) -> Self {
        Self {
            world: WorldInformation::new(),
            rng: PlannerRng::new(seed),
            standard_sampler: StandardSampler::new(
                config.standard_samples,
                config.precomputation_file.as_deref(),
            ),
            end_in_obstacle_sampler: EndInObstacleSampler::new(config.end_in_obstacle_samples),
            escape_sampler: MultiEscapeSampler::new(config.escape_samples),
            current_trajectory: Arc::new(Vec::new()),
            max_intersecting_obstacle_prio: -1,
            capture: config
                .capture_file
                .clone()
                .map(InputCapture::new),
            last_robot_id: None,
        }
    }

    pub fn world(&self) -> &WorldInformation {
        &self.world
    }

    /// The obstacle set is rebuilt through this handle between ticks; it must
    /// not change while a `calculate_trajectory` call runs.
    pub fn world_mut(&mut self) -> &mut WorldInformation {
        &mut self.world
    }

    /// Guaranteed to hold at least two points, equispaced in time, once a
    /// tick has run.
    pub fn current_trajectory(&self) -> &Arc<Vec<TrajectoryPoint>> {
        &self.current_trajectory
    }

    /// Highest obstacle priority the last tick's escape could not avoid, -1
    /// when nothing was breached.
    pub fn max_intersecting_obstacle_prio(&self) -> i32 {
        self.max_intersecting_obstacle_prio
    }

    /// Plans one tick. Always returns a drivable trajectory of at least two
    /// points, the first exactly at time zero; when no path was found the
    /// robot is commanded to stand still.
    pub fn calculate_trajectory(
        &mut self,
        start_pos: Vector,
        start_speed: Vector,
        target_pos: Vector,
        target_speed: Vector,
        max_speed: f32,
        acceleration: f32,
    ) -> Vec<TrajectoryPoint> {
        if let Err(error) = validate_input(
            start_pos,
            start_speed,
            target_pos,
            target_speed,
            max_speed,
            acceleration,
        ) {
            tracing::warn!(%error, "rejecting planner input");
            let points = stand_still_points(start_pos, start_speed);
            self.current_trajectory = Arc::new(points.clone());
            return points;
        }

        let input = TrajectoryInput {
            start: RobotState::new(start_pos, start_speed),
            target: RobotState::new(target_pos, target_speed),
            t0: 0.0,
            exponential_slow_down: target_speed == Vector::ZERO,
            max_speed,
            max_speed_squared: max_speed * max_speed,
            acceleration,
        };

        if let Some(capture) = &mut self.capture {
            if let Err(error) = capture.append(&self.world, &input) {
                tracing::warn!(%error, "disabling pathfinding input capture");
                self.capture = None;
            }
        }

        let parts = self.find_path(input.clone());
        let points = self.resample(&parts, &input);
        self.current_trajectory = Arc::new(points.clone());
        points
    }

    /// The tick sequence: escape when stuck, substitute the target when it is
    /// unreachable, otherwise direct trajectory first and the standard
    /// sampler after it.
    fn find_path(&mut self, mut input: TrajectoryInput) -> Vec<Trajectory> {
        self.max_intersecting_obstacle_prio = -1;

        // sampler memory belongs to one robot
        if self.last_robot_id != Some(self.world.robot_id()) {
            self.standard_sampler.reset();
            self.end_in_obstacle_sampler.reset();
            self.escape_sampler.reset();
            self.last_robot_id = Some(self.world.robot_id());
        }

        let radius = self.world.radius().max(0.0);
        self.world.inflate_static_obstacles(radius);
        self.world.collect_obstacles();

        let start_point = TrajectoryPoint::new(input.start, input.t0);
        if self.world.is_in_static_obstacle(input.start.pos)
            || self.world.is_in_moving_obstacle(&start_point)
        {
            let mut ctx = SamplerContext {
                world: &self.world,
                rng: &mut self.rng,
            };
            let valid = self.escape_sampler.compute(&mut ctx, &input);
            self.max_intersecting_obstacle_prio =
                self.escape_sampler.max_intersecting_obstacle_prio();
            if valid {
                return self.escape_sampler.result().to_vec();
            }
            tracing::debug!(error = %PlannerError::NoFeasibleTrajectory, "no way out of the obstacle");
            return Vec::new();
        }

        if self.world.is_in_static_obstacle(input.target.pos) {
            for obstacle in self.world.static_obstacles() {
                let probe =
                    TrajectoryPoint::new(RobotState::new(input.target.pos, Vector::ZERO), 0.0);
                if obstacle.zoned_distance(&probe, 0.0).is_inside() {
                    input.target.pos = obstacle.project_out(input.target.pos, 0.03);
                }
            }
            // projecting may have pushed the target into another obstacle
            if self.world.is_in_static_obstacle(input.target.pos) {
                return self.sample_end_in_obstacle(&input);
            }
        }

        let direct_slow_down_time = if input.exponential_slow_down {
            SLOW_DOWN_TIME
        } else {
            0.0
        };
        let distance = input.target.pos - input.start.pos;
        let high_precision = distance.length() < 0.1
            && input.target.speed == Vector::ZERO
            && input.start.speed.length() < 0.2;
        if let Some(direct) = alpha_time::find_trajectory(
            &input.start,
            &input.target,
            input.acceleration,
            input.max_speed,
            direct_slow_down_time,
            high_precision,
            EndSpeed::Fast,
        ) {
            let distances =
                self.world
                    .min_obstacle_distance(&direct, input.t0, OBSTACLE_AVOIDANCE_RADIUS);
            // a tight endpoint is fine, a detour could not improve on it
            if distances.0 > OBSTACLE_AVOIDANCE_RADIUS
                || (distances.1 > 0.0 && distances.1 < OBSTACLE_AVOIDANCE_RADIUS)
            {
                return vec![direct];
            }
        }

        let mut ctx = SamplerContext {
            world: &self.world,
            rng: &mut self.rng,
        };
        if self.standard_sampler.compute(&mut ctx, &input) {
            return self.standard_sampler.result().to_vec();
        }
        self.sample_end_in_obstacle(&input)
    }

    fn sample_end_in_obstacle(&mut self, input: &TrajectoryInput) -> Vec<Trajectory> {
        let mut ctx = SamplerContext {
            world: &self.world,
            rng: &mut self.rng,
        };
        if self.end_in_obstacle_sampler.compute(&mut ctx, input) {
            return self.end_in_obstacle_sampler.result().to_vec();
        }
        let valid = self.escape_sampler.compute(&mut ctx, input);
        self.max_intersecting_obstacle_prio =
            self.escape_sampler.max_intersecting_obstacle_prio();
        if valid {
            return self.escape_sampler.result().to_vec();
        }
        tracing::debug!(error = %PlannerError::NoFeasibleTrajectory, "all samplers failed");
        Vec::new()
    }

    /// Resamples the trajectory parts into equispaced points for the
    /// controller and the peer planners.
    fn resample(&self, parts: &[Trajectory], input: &TrajectoryInput) -> Vec<TrajectoryPoint> {
        if parts.is_empty() {
            return stand_still_points(input.start.pos, input.start.speed);
        }

        let mut to_end_time = 0.0f32;
        for part in parts {
            let part_time = part.end_time();
            if !part_time.is_finite() || !(0.0..=MAX_PART_TIME).contains(&part_time) {
                tracing::warn!(part_time, "discarding degenerate trajectory");
                return stand_still_points(input.start.pos, input.start.speed);
            }
            to_end_time += part_time;
        }

        let sampling_interval = to_end_time / (SAMPLES_PER_TRAJECTORY * parts.len()) as f32;
        if !sampling_interval.is_finite() || sampling_interval <= 0.0 {
            return stand_still_points(input.start.pos, input.start.speed);
        }

        let mut result = Vec::with_capacity(SAMPLES_PER_TRAJECTORY * parts.len() + 1);
        let mut current_time = 0.0f32;
        let mut current_total_time = 0.0f32;
        for (i, part) in parts.iter().enumerate() {
            let part_time = part.end_time();
            let mut was_at_end_point = false;
            loop {
                if current_time > part_time {
                    if i < parts.len() - 1 {
                        current_time -= part_time;
                        break;
                    }
                    if was_at_end_point {
                        break;
                    }
                    was_at_end_point = true;
                }
                result.push(TrajectoryPoint::new(
                    part.state_at(current_time),
                    current_total_time,
                ));
                current_time += sampling_interval;
                current_total_time += sampling_interval;
            }
        }
        result
    }
}

fn validate_input(
    start_pos: Vector,
    start_speed: Vector,
    target_pos: Vector,
    target_speed: Vector,
    max_speed: f32,
    acceleration: f32,
) -> Result<(), PlannerError> {
    if !start_pos.is_finite()
        || !start_speed.is_finite()
        || !target_pos.is_finite()
        || !target_speed.is_finite()
    {
        return Err(PlannerError::InvalidInput("non-finite state"));
    }
    if !(max_speed > 0.0) {
        return Err(PlannerError::InvalidInput("max speed must be positive"));
    }
    if !(acceleration > 0.0) {
        return Err(PlannerError::InvalidInput("acceleration must be positive"));
    }
    Ok(())
}

/// The safe fallback: stay where we are.
fn stand_still_points(start_pos: Vector, start_speed: Vector) -> Vec<TrajectoryPoint> {
    vec![
        TrajectoryPoint::new(RobotState::new(start_pos, start_speed), 0.0),
        TrajectoryPoint::new(RobotState::new(start_pos, Vector::ZERO), f32::MAX),
    ]
}
