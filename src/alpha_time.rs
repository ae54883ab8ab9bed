// src/alpha_time.rs
//! The alpha-time trajectory family.
//!
//! A trajectory is parameterised by a scalar time `T` and an angle `alpha`
//! that splits the acceleration budget between the axes as
//! `(a * sin(alpha), a * cos(alpha))`. Each axis is then an independent 1-D
//! speed profile. The inverse problem, finding `(T, alpha)` for a desired end
//! position, is solved by an adaptive two-parameter iteration. It is
//! deliberately not Newton's method: the end-position function has
//! discontinuities near the cardinal-direction gaps, and callers tolerate an
//! occasional failure.

use crate::geometry::Vector;
use crate::profile::{SpeedProfile1d, Trajectory};
use crate::{EndSpeed, RobotState};
use std::f32::consts::PI;

/// Iteration cap for the regular search.
pub const MAX_SEARCH_ITERATIONS: usize = 30;
/// Iteration cap for the high-precision search.
pub const HIGH_PRECISION_ITERATIONS: usize = 50;
/// Convergence threshold of the regular search, in meters.
pub const REGULAR_TARGET_PRECISION: f32 = 0.08;
/// Convergence threshold of the high-precision search, in meters.
pub const HIGH_QUALITY_TARGET_PRECISION: f32 = 0.008;

/// Result of the position-only evaluation: the relative end position and the
/// speed at which extra time is spent, used to scale the time step.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryPosInfo2d {
    pub end_pos: Vector,
    pub increase_at_speed: Vector,
}

#[inline]
fn sign(x: f32) -> f32 {
    if x < 0.0 { -1.0 } else { 1.0 }
}

fn normalize_angle_positive(mut angle: f32) -> f32 {
    while angle < 0.0 {
        angle += 2.0 * PI;
    }
    while angle >= 2.0 * PI {
        angle -= 2.0 * PI;
    }
    angle
}

/// Normalised difference `a1 - a2` in `[-pi, pi)`.
fn angle_diff(a1: f32, a2: f32) -> f32 {
    let mut angle = a1 - a2;
    while angle < -PI {
        angle += 2.0 * PI;
    }
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    angle
}

/// Remaps `angle` to skip the gap regions around the cardinal directions
/// where one axis would be left without enough acceleration for its speed
/// change. The remap is monotone over `[0, 2*pi)` and well-defined whenever
/// `|dv_i| <= time * acc`.
fn adjust_angle(start_speed: Vector, end_speed: Vector, time: f32, angle: f32, acc: f32) -> f32 {
    let diff = end_speed - start_speed;
    let abs_diff = Vector::new(diff.x.abs(), diff.y.abs());
    if abs_diff.x > time * acc || abs_diff.y > time * acc {
        // not solvable, the caller's iteration will move away from here
        return angle;
    }
    // keeps values directly on a gap border out of the invalid range
    const FLOATING_POINT_OFFSET: f32 = 0.001;
    let gap_size_half_x = (abs_diff.x / (time * acc)).asin() + FLOATING_POINT_OFFSET;
    let gap_size_half_y = (abs_diff.y / (time * acc)).asin() + FLOATING_POINT_OFFSET;

    let circle_circumference = 2.0 * PI - gap_size_half_x * 4.0 - gap_size_half_y * 4.0;
    let circumference_factor = circle_circumference / (2.0 * PI);
    let mut angle = normalize_angle_positive(angle) * circumference_factor;

    angle += gap_size_half_x;
    if angle > PI / 2.0 - gap_size_half_y {
        angle += gap_size_half_y * 2.0;
    }
    if angle > PI - gap_size_half_x {
        angle += gap_size_half_x * 2.0;
    }
    if angle > PI * 1.5 - gap_size_half_y {
        angle += gap_size_half_y * 2.0;
    }
    angle
}

/// Per-axis end speed in fast mode: the closest point to `v0` on the
/// axis-aligned rectangle spanned by `v1` and the origin.
// The clamp below is the upstream rule for v1 components outside that box:
// clamp(v0_i, min(0, v1_i), max(0, v1_i)). Its semantics for such inputs are
// undocumented upstream and are kept bit-for-bit.
fn fast_end_speed(v0: Vector, v1: Vector) -> Vector {
    Vector::new(
        v0.x.max(v1.x.min(0.0)).min(v1.x.max(0.0)),
        v0.y.max(v1.y.min(0.0)).min(v1.y.max(0.0)),
    )
}

fn adjust_angle_fast_end_speed(
    start_speed: Vector,
    end_speed: Vector,
    time: f32,
    angle: f32,
    acc: f32,
) -> f32 {
    adjust_angle(
        start_speed,
        fast_end_speed(start_speed, end_speed),
        time,
        angle,
        acc,
    )
}

/// Shortest possible duration of an exact-end-speed transition.
pub fn min_time_exact_end_speed(v0: Vector, v1: Vector, acc: f32) -> f32 {
    (v1 - v0).length() / acc
}

/// Shortest possible duration when any compatible lower end speed is fine.
pub fn min_time_fast_end_speed(v0: Vector, v1: Vector, acc: f32) -> f32 {
    min_time_exact_end_speed(v0, fast_end_speed(v0, v1), acc)
}

/// Cheap position-only evaluation. `time` is the extra time beyond the
/// minimal transition, matching `calculate_trajectory`. The two functions
/// must stay numerically consistent, the inverse search relies on it.
pub fn calculate_position(
    v0: Vector,
    v1: Vector,
    time: f32,
    angle: f32,
    acc: f32,
    v_max: f32,
    mode: EndSpeed,
) -> TrajectoryPosInfo2d {
    match mode {
        EndSpeed::Exact => {
            let total = time + min_time_exact_end_speed(v0, v1, acc);
            calculate_position_exact_total(v0, v1, total, angle, acc, v_max)
        }
        EndSpeed::Fast => {
            let total = time + min_time_fast_end_speed(v0, v1, acc);
            calculate_position_fast_total(v0, v1, total, angle, acc, v_max)
        }
    }
}

fn calculate_position_exact_total(
    v0: Vector,
    v1: Vector,
    time: f32,
    angle: f32,
    acc: f32,
    v_max: f32,
) -> TrajectoryPosInfo2d {
    let angle = adjust_angle(v0, v1, time, angle, acc);
    let alpha_x = angle.sin();
    let alpha_y = angle.cos();

    let diff = v1 - v0;
    let rest_time_x = time - diff.x.abs() / (acc * alpha_x.abs());
    let rest_time_y = time - diff.y.abs() / (acc * alpha_y.abs());

    let x_info = SpeedProfile1d::calculate_end_pos_1d(
        v0.x,
        v1.x,
        sign(alpha_x) * rest_time_x,
        acc * alpha_x.abs(),
        v_max * alpha_x.abs(),
    );
    let y_info = SpeedProfile1d::calculate_end_pos_1d(
        v0.y,
        v1.y,
        sign(alpha_y) * rest_time_y,
        acc * alpha_y.abs(),
        v_max * alpha_y.abs(),
    );
    TrajectoryPosInfo2d {
        end_pos: Vector::new(x_info.end_pos, y_info.end_pos),
        increase_at_speed: Vector::new(x_info.increase_at_speed, y_info.increase_at_speed),
    }
}

fn calculate_position_fast_total(
    v0: Vector,
    v1: Vector,
    time: f32,
    angle: f32,
    acc: f32,
    v_max: f32,
) -> TrajectoryPosInfo2d {
    let angle = adjust_angle_fast_end_speed(v0, v1, time, angle, acc);
    let alpha_x = angle.sin();
    let alpha_y = angle.cos();

    let x_info = SpeedProfile1d::calculate_end_pos_1d_fast_speed(
        v0.x,
        v1.x,
        time,
        alpha_x > 0.0,
        acc * alpha_x.abs(),
        v_max * alpha_x.abs(),
    );
    let y_info = SpeedProfile1d::calculate_end_pos_1d_fast_speed(
        v0.y,
        v1.y,
        time,
        alpha_y > 0.0,
        acc * alpha_y.abs(),
        v_max * alpha_y.abs(),
    );
    TrajectoryPosInfo2d {
        end_pos: Vector::new(x_info.end_pos, y_info.end_pos),
        increase_at_speed: Vector::new(x_info.increase_at_speed, y_info.increase_at_speed),
    }
}

/// Builds the trajectory for the given parameters. `time` is the extra time
/// beyond the minimal transition; the total duration is derived internally,
/// so every parameter combination is solvable.
pub fn calculate_trajectory(
    start: &RobotState,
    v1: Vector,
    time: f32,
    angle: f32,
    acc: f32,
    v_max: f32,
    slow_down_time: f32,
    mode: EndSpeed,
) -> Trajectory {
    let v0 = start.speed;
    match mode {
        EndSpeed::Exact => {
            let total = time + min_time_exact_end_speed(v0, v1, acc);
            let angle = adjust_angle(v0, v1, total, angle, acc);
            let alpha_x = angle.sin();
            let alpha_y = angle.cos();

            let diff = v1 - v0;
            let rest_time_x = total - diff.x.abs() / (acc * alpha_x.abs());
            let rest_time_y = total - diff.y.abs() / (acc * alpha_y.abs());

            let mut x = SpeedProfile1d::calculate_1d_trajectory(
                v0.x,
                v1.x,
                if alpha_x > 0.0 {
                    rest_time_x
                } else {
                    -rest_time_x
                },
                acc * alpha_x.abs(),
                v_max * alpha_x.abs(),
            );
            let mut y = SpeedProfile1d::calculate_1d_trajectory(
                v0.y,
                v1.y,
                if alpha_y > 0.0 {
                    rest_time_y
                } else {
                    -rest_time_y
                },
                acc * alpha_y.abs(),
                v_max * alpha_y.abs(),
            );
            x.integrate_time();
            y.integrate_time();
            Trajectory::new(x, y, start.pos, slow_down_time)
        }
        EndSpeed::Fast => {
            let total = time + min_time_fast_end_speed(v0, v1, acc);
            let angle = adjust_angle_fast_end_speed(v0, v1, total, angle, acc);
            let alpha_x = angle.sin();
            let alpha_y = angle.cos();

            let mut x = SpeedProfile1d::calculate_1d_trajectory_fast_end_speed(
                v0.x,
                v1.x,
                total,
                alpha_x > 0.0,
                acc * alpha_x.abs(),
                v_max * alpha_x.abs(),
            );
            let mut y = SpeedProfile1d::calculate_1d_trajectory_fast_end_speed(
                v0.y,
                v1.y,
                total,
                alpha_y > 0.0,
                acc * alpha_y.abs(),
                v_max * alpha_y.abs(),
            );
            x.integrate_time();
            y.integrate_time();
            Trajectory::new(x, y, start.pos, slow_down_time)
        }
    }
}

/// Relative end position of a minimal-time transition; the anchor around
/// which the search estimates its initial parameters.
fn min_time_pos(start_speed: Vector, end_speed: Vector) -> Vector {
    const EPSILON: f32 = 0.00001;

    let diff = end_speed - start_speed;
    let abs_diff = Vector::new(diff.x.abs(), diff.y.abs());
    if abs_diff.x == 0.0 && abs_diff.y == 0.0 {
        return Vector::ZERO;
    }
    let alpha = abs_diff.x / (abs_diff.x * abs_diff.x + abs_diff.y * abs_diff.y).sqrt();
    // alpha == 1 exactly would divide by zero in the distance below
    let alpha = alpha.clamp(EPSILON, 1.0 - EPSILON);

    Vector::new(
        {
            let time = (start_speed.x - end_speed.x).abs() / alpha;
            0.5 * (start_speed.x + end_speed.x) * time
        },
        {
            let beta = (1.0 - alpha * alpha).sqrt();
            let time = (start_speed.y - end_speed.y).abs() / beta;
            0.5 * (start_speed.y + end_speed.y) * time
        },
    )
}

fn center_time_pos(start_speed: Vector, end_speed: Vector, time: f32) -> Vector {
    (start_speed + end_speed) * (0.5 * time)
}

fn fast_end_speed_center_time_pos(start_speed: Vector, end_speed: Vector, time: f32) -> Vector {
    (start_speed + fast_end_speed(start_speed, end_speed)) * (0.5 * time)
}

/// Acceleration that brings `v0` to rest after exactly `distance`, per axis.
fn necessary_acceleration(v0: Vector, distance: Vector) -> Vector {
    Vector::new(
        v0.x * v0.x.abs() * 0.5 / distance.x,
        v0.y * v0.y.abs() * 0.5 / distance.y,
    )
}

/// Searches for a trajectory from `start` to `target`. Returns `None` when
/// the iteration does not converge within its budget; callers treat that as
/// an infeasible sample and move on.
pub fn find_trajectory(
    start: &RobotState,
    target: &RobotState,
    acc: f32,
    v_max: f32,
    slow_down_time: f32,
    high_precision: bool,
    mode: EndSpeed,
) -> Option<Trajectory> {
    match mode {
        // with a zero end speed the two modes are identical, and the exact
        // search has the cheap braking special case
        EndSpeed::Fast if target.speed != Vector::ZERO => {
            find_trajectory_impl(start, target, acc, v_max, slow_down_time, high_precision, EndSpeed::Fast)
        }
        _ => find_trajectory_impl(start, target, acc, v_max, slow_down_time, high_precision, EndSpeed::Exact),
    }
}

fn find_trajectory_impl(
    start: &RobotState,
    target: &RobotState,
    acc: f32,
    v_max: f32,
    slow_down_time: f32,
    high_precision: bool,
    mode: EndSpeed,
) -> Option<Trajectory> {
    let v0 = start.speed;
    let v1 = target.speed;
    let position = target.pos - start.pos;

    if mode == EndSpeed::Exact && v1 == Vector::ZERO {
        if let Some(result) = braking_special_case(start, position, acc) {
            return Some(result);
        }
    }

    let min_time_distance = position.distance(min_time_pos(v0, v1));
    let mut estimated_time = min_time_distance / acc;

    let estimate_center_pos = match mode {
        EndSpeed::Exact => center_time_pos(v0, v1, estimated_time),
        EndSpeed::Fast => fast_end_speed_center_time_pos(v0, v1, estimated_time),
    };
    let mut estimated_angle = normalize_angle_positive((position - estimate_center_pos).angle());
    estimated_time = estimated_time.max(match mode {
        EndSpeed::Exact => 0.01,
        EndSpeed::Fast => 0.001,
    });

    if estimated_time.is_nan() {
        estimated_time = 3.0;
    }
    if estimated_angle.is_nan() {
        // zero is floating point unstable, do not use that
        estimated_angle = 0.05;
    }

    let mut current_time = estimated_time;
    let mut current_angle = estimated_angle;

    let mut distance_factor = 0.8f32;
    let mut last_center_distance_diff = 0.0f32;

    let mut angle_factor = 0.8f32;
    let mut last_angle_diff = 0.0f32;

    let zero_start = RobotState {
        pos: Vector::ZERO,
        speed: v0,
    };
    let minimum_time = match mode {
        EndSpeed::Exact => min_time_exact_end_speed(v0, v1, acc),
        EndSpeed::Fast => min_time_fast_end_speed(v0, v1, acc),
    };

    let iterations = if high_precision {
        HIGH_PRECISION_ITERATIONS
    } else {
        MAX_SEARCH_ITERATIONS
    };
    let precision = if high_precision {
        HIGH_QUALITY_TARGET_PRECISION
    } else {
        REGULAR_TARGET_PRECISION
    };

    for i in 0..iterations {
        current_time = current_time.max(0.0);

        let (end_pos, assumed_speed, trajectory) = if slow_down_time > 0.0 {
            let result = calculate_trajectory(
                &zero_start,
                v1,
                current_time,
                current_angle,
                acc,
                v_max,
                slow_down_time,
                mode,
            );
            let continuation = result.continuation_speed();
            (
                result.slow_down_end_position(),
                continuation.x.abs().max(continuation.y.abs()),
                Some(result),
            )
        } else {
            let info = calculate_position(v0, v1, current_time, current_angle, acc, v_max, mode);
            (
                info.end_pos,
                info.increase_at_speed.x.abs().max(info.increase_at_speed.y.abs()),
                None,
            )
        };

        if position.distance(end_pos) < precision {
            let mut result = trajectory.unwrap_or_else(|| {
                calculate_trajectory(
                    &zero_start,
                    v1,
                    current_time,
                    current_angle,
                    acc,
                    v_max,
                    slow_down_time,
                    mode,
                )
            });
            result.set_start_pos(start.pos);
            let drift = target.pos - result.end_position();
            result.set_correction_offset(drift);
            return Some(result);
        }

        let current_center_time_pos = match mode {
            EndSpeed::Exact => center_time_pos(v0, v1, current_time + minimum_time),
            EndSpeed::Fast => fast_end_speed_center_time_pos(v0, v1, current_time + minimum_time),
        };
        let new_distance = end_pos.distance(current_center_time_pos);
        let target_center_distance = current_center_time_pos.distance(position);
        let current_center_distance_diff = target_center_distance - new_distance;
        if (last_center_distance_diff < 0.0) != (current_center_distance_diff < 0.0) {
            distance_factor *= match mode {
                EndSpeed::Exact => 0.85,
                EndSpeed::Fast => 0.9,
            };
        } else {
            distance_factor *= 1.05;
        }
        last_center_distance_diff = current_center_distance_diff;
        current_time += current_center_distance_diff * distance_factor / assumed_speed.max(0.5);

        let new_angle = (end_pos - current_center_time_pos).angle();
        let target_center_angle = (position - current_center_time_pos).angle();
        let current_angle_diff = angle_diff(target_center_angle, new_angle);
        if i >= 4 && (current_angle_diff < 0.0) != (last_angle_diff < 0.0) {
            angle_factor *= 0.5;
        }
        last_angle_diff = current_angle_diff;
        current_angle += current_angle_diff * angle_factor;
    }
    None
}

/// A plain two-axis braking ramp reaches the target without any search when
/// the necessary deceleration is only slightly above the limit and both axes
/// stop at almost the same time.
fn braking_special_case(start: &RobotState, position: Vector, acc: f32) -> Option<Trajectory> {
    const MAX_ACCELERATION_FACTOR: f32 = 1.2;

    let v0 = start.speed;
    let necessary_acc = necessary_acceleration(v0, position);
    let acc_length = necessary_acc.length();
    let time_diff = (v0.x.abs() / necessary_acc.x - v0.y.abs() / necessary_acc.y).abs();
    if acc_length > acc && acc_length < acc * MAX_ACCELERATION_FACTOR && time_diff < 0.1 {
        use crate::profile::SpeedRecord;
        let mut x = SpeedProfile1d::from_records(
            &[
                SpeedRecord { v: v0.x, t: 0.0 },
                SpeedRecord {
                    v: 0.0,
                    t: (v0.x / necessary_acc.x).abs(),
                },
            ],
            necessary_acc.x.abs(),
        );
        let mut y = SpeedProfile1d::from_records(
            &[
                SpeedRecord { v: v0.y, t: 0.0 },
                SpeedRecord {
                    v: 0.0,
                    t: (v0.y / necessary_acc.y).abs(),
                },
            ],
            necessary_acc.y.abs(),
        );
        // records already carry durations from zero, integration keeps them
        x.integrate_time();
        y.integrate_time();
        let mut result = Trajectory::new(x, y, start.pos, 0.0);
        let drift = start.pos + position - result.end_position();
        result.set_correction_offset(drift);
        return Some(result);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::PlannerRng;
    use crate::profile::SLOW_DOWN_TIME;

    fn make_pos(rng: &mut PlannerRng, field_size_half: f32) -> Vector {
        rng.uniform_vector_in(
            Vector::new(-field_size_half, -field_size_half),
            Vector::new(field_size_half, field_size_half),
        )
    }

    fn make_speed(rng: &mut PlannerRng, max_speed: f32) -> Vector {
        loop {
            let v = Vector::new(
                rng.uniform_float(-max_speed, max_speed),
                rng.uniform_float(-max_speed, max_speed),
            );
            if v.length() < max_speed {
                return v;
            }
        }
    }

    fn check_trajectory(
        trajectory: &Trajectory,
        v0: Vector,
        v1: Vector,
        max_speed: f32,
        acc: f32,
        mode: EndSpeed,
    ) {
        // start speed is preserved
        assert!(trajectory.speed_at(0.0).distance(v0) < 1e-3);

        // end speed obeys the mode
        match mode {
            EndSpeed::Exact => {
                assert!(
                    trajectory.end_speed().distance(v1) < 1e-3,
                    "end speed {:?} vs {:?}",
                    trajectory.end_speed(),
                    v1
                );
            }
            EndSpeed::Fast => {
                assert!(trajectory.end_speed().length() <= v1.length() + 1e-3);
            }
        }

        let end_time = trajectory.end_time();
        let segments = 100;
        let time_diff = end_time / (segments - 1) as f32;
        let bulk = trajectory.trajectory_positions(segments, time_diff);
        let mut last_speed = trajectory.speed_at(0.0);
        for i in 0..segments {
            let time = i as f32 * time_diff;
            let speed = trajectory.speed_at(time);

            // bulk sampling and single-state queries agree
            assert!(bulk[i].state.pos.distance(trajectory.position_at(time)) < 0.01);
            assert!(bulk[i].state.speed.distance(speed) < 0.01);
            assert!((bulk[i].time - time).abs() < 1e-4);

            // axis-split speeds may exceed the limit by at most sqrt(2)
            assert!(speed.length() <= max_speed * std::f32::consts::SQRT_2 + 1e-3);

            // acceleration limit between samples
            let diff = speed.distance(last_speed) / time_diff;
            assert!(diff <= acc * 1.02, "acc {diff} over limit {acc}");
            last_speed = speed;
        }
    }

    #[test]
    fn calculate_trajectory_respects_limits() {
        let mut rng = PlannerRng::new(1);
        for _ in 0..2000 {
            let max_speed = rng.uniform_float(0.3, 5.0);
            let v0 = make_speed(&mut rng, max_speed);
            let v1 = if rng.uniform_float(0.0, 1.0) > 0.9 {
                Vector::ZERO
            } else {
                make_speed(&mut rng, max_speed)
            };
            let time = rng.uniform_float(0.005, 5.0);
            let angle = rng.uniform_float(0.0, 2.0 * PI);
            let acc = rng.uniform_float(0.5, 4.0);
            let slow_down = if rng.uniform_float(0.0, 1.0) > 0.5 {
                rng.uniform_float(0.0, SLOW_DOWN_TIME)
            } else {
                0.0
            };
            let mode = if rng.uniform_float(0.0, 1.0) > 0.5 {
                EndSpeed::Exact
            } else {
                EndSpeed::Fast
            };

            let start = RobotState {
                pos: Vector::new(1.0, 2.0),
                speed: v0,
            };
            let trajectory =
                calculate_trajectory(&start, v1, time, angle, acc, max_speed, slow_down, mode);
            check_trajectory(&trajectory, v0, v1, max_speed, acc, mode);
        }
    }

    #[test]
    fn more_time_gives_more_distance() {
        let mut rng = PlannerRng::new(3);
        for _ in 0..500 {
            let max_speed = rng.uniform_float(0.5, 4.0);
            let v0 = make_speed(&mut rng, max_speed);
            let time = rng.uniform_float(0.01, 4.0);
            let angle = rng.uniform_float(0.0, 2.0 * PI);
            let acc = rng.uniform_float(0.5, 4.0);
            let start = RobotState {
                pos: Vector::ZERO,
                speed: v0,
            };

            let p1 = calculate_trajectory(&start, Vector::ZERO, time, angle, acc, max_speed, 0.0, EndSpeed::Exact);
            let p2 = calculate_trajectory(&start, Vector::ZERO, time + 0.1, angle, acc, max_speed, 0.0, EndSpeed::Exact);
            let p3 = calculate_trajectory(&start, Vector::ZERO, time + 0.2, angle, acc, max_speed, 0.0, EndSpeed::Exact);

            let d12 = (p2.end_position() - p1.end_position()).length();
            let d13 = (p3.end_position() - p1.end_position()).length();
            assert!(d12 < d13);
        }
    }

    #[test]
    fn calculate_position_matches_calculate_trajectory() {
        let mut rng = PlannerRng::new(17);
        for _ in 0..2000 {
            let max_speed = rng.uniform_float(0.3, 5.0);
            let v0 = make_speed(&mut rng, max_speed);
            let v1 = if rng.uniform_float(0.0, 1.0) > 0.9 {
                Vector::ZERO
            } else {
                make_speed(&mut rng, max_speed)
            };
            let time = rng.uniform_float(0.005, 5.0);
            let angle = rng.uniform_float(0.0, 2.0 * PI);
            let acc = rng.uniform_float(0.5, 4.0);
            let use_slow_down = rng.uniform_float(0.0, 1.0) > 0.5;
            let slow_down = if use_slow_down {
                rng.uniform_float(0.0, SLOW_DOWN_TIME)
            } else {
                0.0
            };
            let mode = if rng.uniform_float(0.0, 1.0) > 0.5 {
                EndSpeed::Exact
            } else {
                EndSpeed::Fast
            };

            let start = RobotState {
                pos: make_pos(&mut rng, 2.0),
                speed: v0,
            };
            let trajectory =
                calculate_trajectory(&start, v1, time, angle, acc, max_speed, slow_down, mode);
            let info = calculate_position(v0, v1, time, angle, acc, max_speed, mode);

            let trajectory_end = trajectory.end_position();
            let info_end = start.pos + info.end_pos;

            // calculate_position knows nothing about the slow-down tail, the
            // tolerance is accordingly loose there
            let tolerance = if use_slow_down { 0.35 } else { 1e-3 };
            assert!(
                trajectory_end.distance(info_end) < tolerance + trajectory_end.length() * 1e-4,
                "{trajectory_end:?} vs {info_end:?} (slow down {slow_down})"
            );
        }
    }

    #[test]
    fn find_trajectory_converges_on_reachable_targets() {
        const RUNS: usize = 2000;
        let mut fails = 0;
        for i in 0..RUNS {
            let mut rng = PlannerRng::new(i as u64 + 1);
            let max_speed = rng.uniform_float(0.3, 5.0);

            let s0 = make_pos(&mut rng, 2.0);
            let v0 = make_speed(&mut rng, max_speed);
            let s1 = if rng.uniform_float(0.0, 1.0) > 0.9 {
                make_pos(&mut rng, 5.0)
            } else {
                s0 + make_pos(&mut rng, 0.1)
            };
            let v1 = if rng.uniform_float(0.0, 1.0) > 0.9 {
                Vector::ZERO
            } else {
                make_speed(&mut rng, max_speed)
            };
            let acc = rng.uniform_float(0.5, 4.0);
            let slow_down = if rng.uniform_float(0.0, 1.0) > 0.5 {
                rng.uniform_float(0.0, SLOW_DOWN_TIME)
            } else {
                0.0
            };
            let mode = if rng.uniform_float(0.0, 1.0) > 0.5 {
                EndSpeed::Fast
            } else {
                EndSpeed::Exact
            };

            let start = RobotState { pos: s0, speed: v0 };
            let target = RobotState { pos: s1, speed: v1 };
            let Some(result) =
                find_trajectory(&start, &target, acc, max_speed, slow_down, false, mode)
            else {
                fails += 1;
                continue;
            };

            // correction offset makes the endpoint exact
            assert!(
                result.end_position().distance(s1) < 1e-3,
                "endpoint {:?} vs {:?}",
                result.end_position(),
                s1
            );
            assert!(result.speed_at(0.0).distance(v0) < 1e-3);
        }
        assert!(
            (fails as f32) / (RUNS as f32) < 0.01,
            "{fails} of {RUNS} searches failed"
        );
    }

    #[test]
    fn high_precision_tightens_the_endpoint() {
        let start = RobotState {
            pos: Vector::ZERO,
            speed: Vector::new(0.1, 0.0),
        };
        let target = RobotState {
            pos: Vector::new(0.05, 0.02),
            speed: Vector::ZERO,
        };
        let result = find_trajectory(&start, &target, 3.0, 2.0, 0.0, true, EndSpeed::Fast)
            .expect("short-range search must converge");
        assert!(result.end_position().distance(target.pos) < 1e-3);
    }
}
