// src/samplers/standard.rs
//! The standard sampler: a randomised search over two-part trajectories that
//! actually reach the target.
//!
//! A candidate is described by `(time, angle, mid_speed)`: the second part
//! runs from an intermediate speed to the target with the given alpha-time
//! parameters, the first part is searched so that it hands over exactly at
//! the second part's start. Candidates are scored by total time with a
//! penalty for passing close to obstacles.

use super::{SamplerContext, TrajectorySampler};
use crate::alpha_time;
use crate::geometry::Vector;
use crate::precomputation::Precomputation;
use crate::profile::{SLOW_DOWN_TIME, Trajectory};
use crate::rng::PlannerRng;
use crate::{EndSpeed, RobotState, TrajectoryInput};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

/// Distance below which a trajectory is considered uncomfortably close to an
/// obstacle.
pub const OBSTACLE_AVOIDANCE_RADIUS: f32 = 0.1;
/// Maximum relative score penalty for shaving an obstacle.
pub const OBSTACLE_AVOIDANCE_BONUS: f32 = 0.2;

/// One candidate of the search. Persisted samples are normalised to the
/// start-to-target axis and rotated onto the real geometry at load time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardSample {
    pub time: f32,
    pub angle: f32,
    pub mid_speed: Vector,
}

impl StandardSample {
    /// Rotates a normalised sample onto the actual start-to-target axis.
    pub fn denormalize(&self, input: &TrajectoryInput) -> StandardSample {
        let to_target = (input.target.pos - input.start.pos).normalized();
        let side_ways = to_target.perpendicular();
        let mut angle = self.angle + to_target.angle();
        while angle > 2.0 * PI {
            angle -= 2.0 * PI;
        }
        while angle < 0.0 {
            angle += 2.0 * PI;
        }
        StandardSample {
            time: self.time,
            angle,
            mid_speed: to_target * self.mid_speed.x - side_ways * self.mid_speed.y,
        }
    }

}

#[derive(Debug, Clone, Copy, Default)]
struct BestSampleInfo {
    score: f32,
    valid: bool,
    sample: StandardSample,
}

fn random_speed(rng: &mut PlannerRng, max_speed: f32) -> Vector {
    loop {
        let speed = Vector::new(
            rng.uniform_float(-max_speed, max_speed),
            rng.uniform_float(-max_speed, max_speed),
        );
        if speed.length_squared() <= max_speed * max_speed {
            return speed;
        }
    }
}

pub struct StandardSampler {
    iterations: u32,
    best: BestSampleInfo,
    result: Vec<Trajectory>,
    precomputation: Option<Precomputation>,
}

impl StandardSampler {
    pub fn new(iterations: u32, precomputation_file: Option<&Path>) -> Self {
        let precomputation = precomputation_file.and_then(|path| match Precomputation::load(path) {
            Ok(precomputation) => Some(precomputation),
            Err(error) => {
                tracing::warn!(%error, "standard sampler falls back to live-only sampling");
                None
            }
        });
        Self {
            iterations,
            best: BestSampleInfo::default(),
            result: Vec::new(),
            precomputation,
        }
    }

    /// Score of a candidate: travel time, stretched when the path shaves an
    /// obstacle. A clean endpoint cancels the penalty, the robot will leave
    /// the tight spot anyway.
    fn trajectory_score(time: f32, obstacle_distance: f32, endpoint_distance: f32) -> f32 {
        let mut factor = 1.0;
        if obstacle_distance < OBSTACLE_AVOIDANCE_RADIUS
            && endpoint_distance <= OBSTACLE_AVOIDANCE_RADIUS
        {
            factor = 1.0
                + ((OBSTACLE_AVOIDANCE_RADIUS - obstacle_distance) / OBSTACLE_AVOIDANCE_RADIUS)
                    * OBSTACLE_AVOIDANCE_BONUS;
        }
        time * factor
    }

    /// Builds and scores one candidate; updates the best result when it wins.
    fn check_sample(
        &mut self,
        ctx: &mut SamplerContext<'_>,
        input: &TrajectoryInput,
        sample: StandardSample,
    ) {
        if sample.time < 0.0 {
            return;
        }
        let best_score = self.best.score;
        // do not chase marginal improvements on long paths
        let minimum_improvement =
            if (input.target.pos - input.start.pos).length_squared() > 1.0 {
                0.05
            } else {
                0.0
            };

        let slow_down_time = if input.exponential_slow_down {
            SLOW_DOWN_TIME
        } else {
            0.0
        };
        let second_start = RobotState::new(Vector::ZERO, sample.mid_speed);
        let mut second_part = alpha_time::calculate_trajectory(
            &second_start,
            input.target.speed,
            sample.time,
            sample.angle,
            input.acceleration,
            input.max_speed,
            slow_down_time,
            EndSpeed::Fast,
        );
        let second_part_time = second_part.end_time();
        // built from the origin, the end position is the covered offset
        let second_part_offset = second_part.end_position();
        second_part.set_start_pos(input.target.pos - second_part_offset);
        if second_part_time > best_score - minimum_improvement {
            return;
        }

        let first_part_slow_down = if input.exponential_slow_down {
            (SLOW_DOWN_TIME - second_part_time).max(0.0)
        } else {
            0.0
        };
        let first_part_target =
            RobotState::new(input.target.pos - second_part_offset, sample.mid_speed);
        let Some(first_part) = alpha_time::find_trajectory(
            &input.start,
            &first_part_target,
            input.acceleration,
            input.max_speed,
            first_part_slow_down,
            false,
            EndSpeed::Exact,
        ) else {
            return;
        };

        let first_part_time = first_part.end_time();
        if first_part_time + second_part_time > best_score - minimum_improvement {
            return;
        }
        let first_part_distance = ctx
            .world
            .min_obstacle_distance(&first_part, input.t0, OBSTACLE_AVOIDANCE_RADIUS)
            .0;
        if first_part_distance < 0.0 {
            return;
        }
        let second_part_distances = ctx.world.min_obstacle_distance(
            &second_part,
            input.t0 + first_part_time,
            OBSTACLE_AVOIDANCE_RADIUS,
        );
        if second_part_distances.0 < 0.0 {
            return;
        }
        let obstacle_distance = first_part_distance.min(second_part_distances.0);
        let score = Self::trajectory_score(
            first_part_time + second_part_time,
            obstacle_distance,
            second_part_distances.1,
        );
        if score > best_score - minimum_improvement {
            return;
        }

        self.best = BestSampleInfo {
            score,
            valid: true,
            sample,
        };
        self.result.clear();
        self.result.push(first_part);
        self.result.push(second_part);
    }

    fn compute_live(
        &mut self,
        ctx: &mut SamplerContext<'_>,
        input: &TrajectoryInput,
        last_frame: &BestSampleInfo,
    ) {
        #[derive(Clone, Copy, PartialEq)]
        enum SamplingMode {
            TotalRandom,
            CurrentBest,
            LastBest,
        }

        let target_distance = input.target.pos - input.start.pos;
        let target_length = target_distance.length();
        let mut default_speed = if target_length > 0.0 {
            target_distance * ((target_length / 2.0).max(2.5) / target_length)
        } else {
            Vector::ZERO
        };
        if default_speed.length_squared() > input.max_speed_squared {
            default_speed = default_speed / default_speed.length();
        }

        for i in 0..self.iterations {
            let mode = if !self.best.valid {
                if i < 20 || ctx.rng.uniform_int() % 2 == 0 {
                    SamplingMode::LastBest
                } else {
                    SamplingMode::TotalRandom
                }
            } else if ctx.rng.uniform_int() % 1024 < 150 {
                SamplingMode::TotalRandom
            } else if self.best.score < last_frame.score + 0.05 {
                SamplingMode::CurrentBest
            } else if ctx.rng.uniform_int() % 2 == 0 {
                SamplingMode::CurrentBest
            } else {
                SamplingMode::LastBest
            };

            let sample = if mode == SamplingMode::TotalRandom {
                let speed = if ctx.rng.uniform_int() % 2 == 0 {
                    default_speed
                } else {
                    random_speed(ctx.rng, input.max_speed)
                };
                let max_time = if self.best.valid {
                    (self.best.score - 0.1).max(0.01)
                } else {
                    5.0
                };
                StandardSample {
                    time: ctx.rng.uniform_float(0.0, max_time),
                    angle: ctx.rng.uniform_float(0.0, 2.0 * PI),
                    mid_speed: speed,
                }
            } else {
                let info = if mode == SamplingMode::CurrentBest {
                    &self.best
                } else {
                    last_frame
                };
                Self::perturbed_sample(ctx.rng, &info.sample, input)
            };
            self.check_sample(ctx, input, sample);
        }
    }

    /// Gaussian-ish jitter around a known good sample.
    fn perturbed_sample(
        rng: &mut PlannerRng,
        seed: &StandardSample,
        input: &TrajectoryInput,
    ) -> StandardSample {
        const RADIUS: f32 = 0.2;
        let mut chosen_mid_speed = seed.mid_speed;
        while chosen_mid_speed.length_squared() > input.max_speed_squared {
            chosen_mid_speed = chosen_mid_speed * 0.9;
        }
        let mid_speed = loop {
            let speed = chosen_mid_speed
                + rng.uniform_vector_in(Vector::new(-RADIUS, -RADIUS), Vector::new(RADIUS, RADIUS));
            if speed.length_squared() < input.max_speed_squared {
                break speed;
            }
        };
        StandardSample {
            time: (seed.time + rng.uniform_float(-0.1, 0.1)).max(0.0001),
            angle: seed.angle + rng.uniform_float(-0.1, 0.1),
            mid_speed,
        }
    }

    fn compute_precomputed(&mut self, ctx: &mut SamplerContext<'_>, input: &TrajectoryInput) {
        // improve around the last known good seed first
        for _ in 0..20 {
            let seed = self.best.sample;
            let sample = Self::perturbed_sample(ctx.rng, &seed, input);
            self.check_sample(ctx, input, sample);
        }

        // then replay the stored samples of the matching distance bucket
        let target_distance = (input.target.pos - input.start.pos).length();
        let samples: Vec<StandardSample> = match self
            .precomputation
            .as_ref()
            .and_then(|p| p.segment_for(target_distance))
        {
            Some(segment) => segment.samples.clone(),
            None => return,
        };
        for sample in samples {
            let mut denormalized = sample.denormalize(input);
            if denormalized.mid_speed.length_squared() >= input.max_speed_squared {
                denormalized.mid_speed = denormalized.mid_speed.normalized() * input.max_speed;
            }
            self.check_sample(ctx, input, denormalized);
        }
    }
}

impl TrajectorySampler for StandardSampler {
    fn compute(&mut self, ctx: &mut SamplerContext<'_>, input: &TrajectoryInput) -> bool {
        let mut last_frame = self.best;
        if last_frame.sample.mid_speed.length_squared() > input.max_speed_squared {
            last_frame.valid = false;
        }

        self.best.score = f32::INFINITY;
        self.best.valid = false;

        // the previous tick's winner is usually still close to optimal
        if last_frame.valid {
            self.check_sample(ctx, input, last_frame.sample);
        }

        if self.precomputation.is_some() {
            self.compute_precomputed(ctx, input);
        } else {
            self.compute_live(ctx, input, &last_frame);
        }
        self.best.valid
    }

    fn result(&self) -> &[Trajectory] {
        &self.result
    }

    fn reset(&mut self) {
        self.best = BestSampleInfo::default();
        self.result.clear();
    }
}
