// src/samplers/escape.rs
//! Escape sampler: the robot is already inside an obstacle, find the way out
//! that breaches the least important obstacles for the shortest time.
//!
//! Candidates are `(time, angle)` alpha-time trajectories to zero velocity,
//! rated lexicographically by the highest obstacle priority they intersect
//! and the time spent inside obstacles of that priority. The winning
//! trajectory is truncated to the moment it is safely outside.

use super::{SamplerContext, TrajectorySampler};
use crate::alpha_time;
use crate::geometry::Vector;
use crate::obstacles::ObstacleShape;
use crate::profile::Trajectory;
use crate::{EndSpeed, TrajectoryInput, TrajectoryPoint};
use std::f32::consts::PI;

/// The trajectory must stay this long outside all obstacles to count as
/// escaped.
const OUT_OF_OBSTACLE_TIME: f32 = 0.1;
/// Stricter requirement while the trajectory has not yet entered anything.
const LONG_OUT_OF_OBSTACLE_TIME: f32 = 1.5;
/// Collision sampling step along a candidate.
const SAMPLING_INTERVAL: f32 = 0.03;

pub struct EscapeObstacleSampler {
    iterations: u32,
    best_escaping_time: f32,
    best_escaping_angle: f32,
    max_intersecting_obstacle_prio: i32,
    result: Vec<Trajectory>,
}

impl EscapeObstacleSampler {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations,
            best_escaping_time: 2.0,
            best_escaping_angle: 0.5,
            max_intersecting_obstacle_prio: -1,
            result: Vec::new(),
        }
    }

    /// Highest priority the last escape could not avoid. Higher layers may
    /// decide the breach is acceptable, for example for defence-area rules.
    pub fn max_intersecting_obstacle_prio(&self) -> i32 {
        self.max_intersecting_obstacle_prio
    }

    /// Adopts the other sampler's learned escape parameters.
    pub fn update_from(&mut self, other: &EscapeObstacleSampler) {
        self.best_escaping_time = other.best_escaping_time;
        self.best_escaping_angle = other.best_escaping_angle;
    }

    /// Rates an escape candidate. Returns `(max priority intersected, time
    /// spent at that priority, exit time)`; an exit time below zero means the
    /// trajectory never gets safely clear. For a candidate that intersects
    /// nothing, the middle value is the minimum static obstacle distance
    /// instead.
    fn trajectory_obstacle_score(
        ctx: &SamplerContext<'_>,
        input: &TrajectoryInput,
        trajectory: &Trajectory,
    ) -> (i32, f32, f32) {
        let total_time = trajectory.end_time();
        let samples = (total_time / SAMPLING_INTERVAL) as usize + 1;

        let mut current_best_prio = -1;
        let mut current_best_obstacle_time = 0.0f32;
        let mut min_static_obstacle_distance = f32::MAX;

        let mut good_samples = 0usize;
        let mut fine_time = 0.0f32;
        let mut last_obstacle_prio = -1;
        let mut found_point_in_obstacle = false;
        for i in 0..samples {
            let time = if i < samples - 1 {
                i as f32 * SAMPLING_INTERVAL
            } else {
                total_time
            };

            let state = trajectory.state_at(time);
            let mut obstacle_prio = -1;
            if !ctx.world.point_in_playfield(state.pos, ctx.world.radius()) {
                obstacle_prio = ctx.world.out_of_field_priority();
            }
            let static_probe = TrajectoryPoint::new(state, time);
            for obstacle in ctx.world.static_obstacles() {
                if obstacle.priority() > obstacle_prio {
                    let distance = obstacle.distance(&static_probe);
                    min_static_obstacle_distance = min_static_obstacle_distance.min(distance);
                    if distance < 0.0 {
                        obstacle_prio = obstacle.priority();
                    }
                }
            }
            let moving_probe = TrajectoryPoint::new(state, time + input.t0);
            for obstacle in ctx.world.moving_obstacles() {
                if obstacle.priority() > obstacle_prio && obstacle.intersects(&moving_probe) {
                    obstacle_prio = obstacle.priority();
                }
            }

            if obstacle_prio == -1 {
                good_samples += 1;
                let boundary_time = if found_point_in_obstacle {
                    OUT_OF_OBSTACLE_TIME
                } else {
                    LONG_OUT_OF_OBSTACLE_TIME
                };
                if good_samples as f32 > boundary_time * (1.0 / SAMPLING_INTERVAL)
                    && fine_time == 0.0
                {
                    fine_time = time;
                }
                if good_samples as f32 > LONG_OUT_OF_OBSTACLE_TIME * (1.0 / SAMPLING_INTERVAL) {
                    break;
                }
            } else {
                found_point_in_obstacle = true;
                good_samples = 0;
            }
            if obstacle_prio > current_best_prio {
                current_best_prio = obstacle_prio;
                current_best_obstacle_time = 0.0;
            }
            if obstacle_prio == current_best_prio {
                if i == samples - 1 {
                    // stopping inside an obstacle is far worse than crossing one
                    current_best_obstacle_time += 10.0;
                } else {
                    current_best_obstacle_time += SAMPLING_INTERVAL;
                }
            }
            last_obstacle_prio = obstacle_prio;
        }
        if fine_time == 0.0 {
            fine_time = total_time;
        }
        if current_best_prio == -1 {
            (-1, min_static_obstacle_distance, fine_time)
        } else {
            (
                current_best_prio,
                current_best_obstacle_time,
                if last_obstacle_prio == -1 {
                    fine_time
                } else {
                    -1.0
                },
            )
        }
    }
}

impl TrajectorySampler for EscapeObstacleSampler {
    // Only the escaping stage is searched here. A second stage that plans the
    // stop after the exit would chain onto the truncated result below; the
    // exit state (position and speed at the truncation time) is exactly its
    // start state.
    fn compute(&mut self, ctx: &mut SamplerContext<'_>, input: &TrajectoryInput) -> bool {
        // replay the previous tick's parameters first
        let mut p = alpha_time::calculate_trajectory(
            &input.start,
            Vector::ZERO,
            self.best_escaping_time,
            self.best_escaping_angle,
            input.acceleration,
            input.max_speed,
            0.0,
            EndSpeed::Exact,
        );
        let mut best_profile = p;
        let (mut best_prio, mut best_obstacle_time, end_time) =
            Self::trajectory_obstacle_score(ctx, input, &p);
        let mut found_valid = end_time > 0.0;
        if !found_valid {
            best_prio = 10000;
            best_obstacle_time = 10000.0;
        }
        let mut best_end_time = end_time;

        for _ in 0..self.iterations {
            let (time, angle) = if ctx.rng.uniform_int() % 2 == 0 {
                let time = if !found_valid {
                    ctx.rng.uniform_float(0.001, 6.0)
                } else {
                    ctx.rng.uniform_float(0.001, 2.0)
                };
                (time, ctx.rng.uniform_float(0.0, 2.0 * PI))
            } else {
                (
                    (self.best_escaping_time + ctx.rng.uniform_float(-0.1, 0.1)).max(0.001),
                    self.best_escaping_angle + ctx.rng.uniform_float(-0.1, 0.1),
                )
            };

            p = alpha_time::calculate_trajectory(
                &input.start,
                Vector::ZERO,
                time,
                angle,
                input.acceleration,
                input.max_speed,
                0.0,
                EndSpeed::Exact,
            );
            let (prio, obstacle_time, end_time) = Self::trajectory_obstacle_score(ctx, input, &p);
            // lexicographic rating, ties broken by the earliest exit
            let better = prio < best_prio
                || (prio == best_prio && obstacle_time < best_obstacle_time)
                || (prio == best_prio
                    && obstacle_time == best_obstacle_time
                    && end_time < best_end_time);
            if better && end_time >= 0.0 {
                best_prio = prio;
                best_profile = p;
                best_obstacle_time = obstacle_time;
                self.best_escaping_time = time;
                self.best_escaping_angle = angle;
                best_end_time = end_time;
                found_valid = true;
            }
        }
        self.max_intersecting_obstacle_prio = best_prio;

        self.result.clear();
        if !found_valid {
            return false;
        }
        best_profile.limit_to_time(best_end_time);
        self.result.push(best_profile);
        true
    }

    fn result(&self) -> &[Trajectory] {
        &self.result
    }

    fn reset(&mut self) {
        self.best_escaping_time = 2.0;
        self.best_escaping_angle = 0.5;
        self.max_intersecting_obstacle_prio = -1;
        self.result.clear();
    }
}

/// Escaping straight through an obstacle is sometimes the fastest way out but
/// the worst choice, for example when the obstacle is attached to the ball
/// the robot is driving towards. This wrapper first rates an escape that
/// pretends the robot already stands still; when that escape's direction does
/// not oppose the real velocity, braking first is the safer plan.
pub struct MultiEscapeSampler {
    zero_v0_sampler: EscapeObstacleSampler,
    regular_sampler: EscapeObstacleSampler,
    result_is_zero_v0: bool,
}

impl MultiEscapeSampler {
    pub fn new(iterations: u32) -> Self {
        Self {
            zero_v0_sampler: EscapeObstacleSampler::new(iterations),
            regular_sampler: EscapeObstacleSampler::new(iterations),
            result_is_zero_v0: false,
        }
    }

    pub fn max_intersecting_obstacle_prio(&self) -> i32 {
        if self.result_is_zero_v0 {
            self.zero_v0_sampler.max_intersecting_obstacle_prio()
        } else {
            self.regular_sampler.max_intersecting_obstacle_prio()
        }
    }
}

impl TrajectorySampler for MultiEscapeSampler {
    fn compute(&mut self, ctx: &mut SamplerContext<'_>, input: &TrajectoryInput) -> bool {
        let mut zero_v0_input = input.clone();
        zero_v0_input.start.speed = Vector::ZERO;
        let zero_valid = self.zero_v0_sampler.compute(ctx, &zero_v0_input);
        if zero_valid {
            let initial_acc = self.zero_v0_sampler.result()[0].initial_acceleration();
            let acc_in_v0 = initial_acc.dot(input.start.speed);
            self.result_is_zero_v0 = acc_in_v0 <= 0.0;
        } else {
            self.result_is_zero_v0 = false;
        }
        if !self.result_is_zero_v0 {
            return self.regular_sampler.compute(ctx, input);
        }
        self.regular_sampler.update_from(&self.zero_v0_sampler);
        zero_valid
    }

    fn result(&self) -> &[Trajectory] {
        if self.result_is_zero_v0 {
            self.zero_v0_sampler.result()
        } else {
            self.regular_sampler.result()
        }
    }

    fn reset(&mut self) {
        self.zero_v0_sampler.reset();
        self.regular_sampler.reset();
        self.result_is_zero_v0 = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RobotState;
    use crate::rng::PlannerRng;
    use crate::world::WorldInformation;

    fn test_world() -> WorldInformation {
        let mut world = WorldInformation::new();
        world.set_radius(0.08);
        world.set_boundary(-10.0, -10.0, 10.0, 10.0);
        world.set_out_of_field_priority(50);
        world
    }

    fn basic_input(s0: Vector, s1: Vector) -> TrajectoryInput {
        TrajectoryInput {
            start: RobotState::new(s0, Vector::ZERO),
            target: RobotState::new(s1, Vector::ZERO),
            t0: 0.0,
            exponential_slow_down: true,
            max_speed: 3.0,
            max_speed_squared: 9.0,
            acceleration: 3.5,
        }
    }

    fn optimize_escape<F: Fn(&mut WorldInformation)>(
        add_obstacles: F,
        input: &TrajectoryInput,
    ) -> Vector {
        let mut world = test_world();
        add_obstacles(&mut world);
        world.inflate_static_obstacles(world.radius());
        world.collect_obstacles();

        let mut rng = PlannerRng::new(1);
        let mut sampler = EscapeObstacleSampler::new(25);

        for _ in 0..200 {
            let mut ctx = SamplerContext {
                world: &world,
                rng: &mut rng,
            };
            sampler.compute(&mut ctx, input);
        }

        let result = sampler.result();
        if result.is_empty() {
            return Vector::ZERO;
        }
        result[0].end_position() - input.start.pos
    }

    #[test]
    fn takes_the_fastest_way_out_of_a_large_obstacle() {
        // with no start speed every candidate is a straight line, checking
        // the endpoint direction is enough
        let input = basic_input(Vector::ZERO, Vector::new(-9.0, 5.0));
        let direction = optimize_escape(
            |world| world.add_rect(-8.0, -20.0, 20.0, 20.0, 0.0, 50),
            &input,
        );
        assert!(direction.x <= -8.0, "left out of the obstacle: {direction:?}");
        assert!(direction.y.abs() <= direction.x.abs() / 10.0, "mostly straight: {direction:?}");
    }

    #[test]
    fn crosses_lower_priority_obstacles_to_escape() {
        let input = basic_input(Vector::new(0.0, 1.0), Vector::new(-9.0, 1.0));
        let direction = optimize_escape(
            |world| {
                world.add_rect(-2.0, -20.0, 4.0, 20.0, 0.0, 50);
                world.add_rect(-2.0, -20.0, -1.0, 20.0, 0.0, 10);
            },
            &input,
        );
        assert!(direction.x <= -2.0, "left through the low-prio rect: {direction:?}");
        assert!(direction.y.abs() <= direction.x.abs() / 10.0, "mostly straight: {direction:?}");
    }

    #[test]
    fn brake_first_when_moving_deeper_into_the_obstacle() {
        let mut world = test_world();
        // the obstacle extends to the right, escape is to the left
        world.add_rect(-0.5, -20.0, 20.0, 20.0, 0.0, 50);
        world.inflate_static_obstacles(world.radius());
        world.collect_obstacles();

        // the robot is currently moving right, deeper in
        let mut input = basic_input(Vector::ZERO, Vector::new(-5.0, 0.0));
        input.start.speed = Vector::new(2.0, 0.0);

        let mut rng = PlannerRng::new(7);
        let mut sampler = MultiEscapeSampler::new(25);
        let mut valid = false;
        for _ in 0..50 {
            let mut ctx = SamplerContext {
                world: &world,
                rng: &mut rng,
            };
            valid = sampler.compute(&mut ctx, &input);
        }
        assert!(valid);
        assert!(sampler.max_intersecting_obstacle_prio() >= 50);
    }
}
