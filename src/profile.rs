// src/profile.rs
//! One-dimensional speed profiles and the 2-D trajectory built from a pair of
//! them.
//!
//! A profile is a short piecewise-linear speed-over-time schedule, at most six
//! records. Between records the speed changes linearly, so positions are exact
//! trapezoid integrals. The optional exponential slow-down replaces the tail
//! of the schedule with a window of linearly decaying acceleration, which
//! still integrates in closed form.

use crate::RobotState;
use crate::TrajectoryPoint;
use crate::geometry::{BoundingBox, Vector};

/// Acceleration factor reached at the very end of the slow-down window.
pub const MIN_ACC_FACTOR: f32 = 0.3;
/// Length of the full slow-down window in seconds.
pub const SLOW_DOWN_TIME: f32 = 0.2;

const MAX_RECORDS: usize = 6;

#[inline]
fn sign(x: f32) -> f32 {
    if x < 0.0 { -1.0 } else { 1.0 }
}

/// Distance covered by a linear speed change from `v0` to `v1` at `acc`.
#[inline]
fn dist(v0: f32, v1: f32, acc: f32) -> f32 {
    let time = (v0 - v1).abs() / acc;
    0.5 * (v0 + v1) * time
}

#[inline]
fn constant_distance(v: f32, time: f32) -> f32 {
    v * time
}

/// One knot of the speed schedule. Before `integrate_time` the `t` field is
/// the duration of the segment leading to this record, afterwards it is
/// cumulative time from the profile start.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedRecord {
    pub v: f32,
    pub t: f32,
}

/// Position-only result of the cheap end-position computation. Must stay
/// consistent with the profile constructors, the search relies on it.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryPosInfo1d {
    pub end_pos: f32,
    pub increase_at_speed: f32,
}

/// Piecewise-linear speed schedule for one axis.
#[derive(Debug, Clone, Copy)]
pub struct SpeedProfile1d {
    records: [SpeedRecord; MAX_RECORDS],
    len: usize,
    /// Acceleration magnitude the profile was built with, used by the
    /// slow-down integrals.
    acc: f32,
}

impl SpeedProfile1d {
    fn empty(acc: f32) -> Self {
        Self {
            records: [SpeedRecord::default(); MAX_RECORDS],
            len: 0,
            acc,
        }
    }

    /// Builds a profile directly from records. Times follow the same
    /// convention as the other constructors: per-segment durations until
    /// `integrate_time` is called.
    pub fn from_records(records: &[SpeedRecord], acc: f32) -> Self {
        debug_assert!(records.len() >= 2 && records.len() <= MAX_RECORDS);
        let mut profile = Self::empty(acc);
        profile.records[..records.len()].copy_from_slice(records);
        profile.len = records.len();
        profile
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn record(&self, index: usize) -> SpeedRecord {
        self.records[index]
    }

    /// Total duration without slow-down.
    #[inline]
    pub fn end_time(&self) -> f32 {
        self.records[self.len - 1].t
    }

    #[inline]
    pub fn end_speed(&self) -> f32 {
        self.records[self.len - 1].v
    }

    pub fn initial_acceleration(&self) -> f32 {
        (self.records[1].v - self.records[0].v) / (self.records[1].t - self.records[0].t)
    }

    /// Converts per-segment durations into cumulative times.
    pub fn integrate_time(&mut self) {
        let mut total = 0.0;
        for record in self.records[..self.len].iter_mut() {
            total += record.t;
            record.t = total;
        }
    }

    /// Position offset from the profile start after `time` seconds.
    pub fn position_at(&self, time: f32) -> f32 {
        let mut offset = 0.0;
        for i in 0..self.len - 1 {
            let (a, b) = (self.records[i], self.records[i + 1]);
            if b.t >= time {
                let diff = if b.t == a.t {
                    1.0
                } else {
                    (time - a.t) / (b.t - a.t)
                };
                let speed = a.v + diff * (b.v - a.v);
                return offset + (a.v + speed) * 0.5 * (time - a.t);
            }
            offset += (a.v + b.v) * 0.5 * (b.t - a.t);
        }
        offset
    }

    /// Speed after `time` seconds; the final speed for queries past the end.
    pub fn speed_at(&self, time: f32) -> f32 {
        for i in 0..self.len - 1 {
            let (a, b) = (self.records[i], self.records[i + 1]);
            if b.t >= time {
                let diff = if b.t == a.t {
                    1.0
                } else {
                    (time - a.t) / (b.t - a.t)
                };
                return a.v + diff * (b.v - a.v);
            }
        }
        self.records[self.len - 1].v
    }

    /// Truncates the profile at `time`, interpolating a new final record.
    pub fn limit_to_time(&mut self, time: f32) {
        for i in 0..self.len - 1 {
            let (a, b) = (self.records[i], self.records[i + 1]);
            if b.t >= time {
                let diff = if b.t == a.t {
                    1.0
                } else {
                    (time - a.t) / (b.t - a.t)
                };
                let speed = a.v + diff * (b.v - a.v);
                self.records[i + 1] = SpeedRecord { v: speed, t: time };
                self.len = i + 2;
                return;
            }
        }
    }

    /// End position with the slow-down tail applied.
    pub fn slow_down_end_position(&self, slow_down_time: f32) -> f32 {
        let last = self.len - 1;
        let mut pos = 0.0;
        let slow_down_start = self.records[last].t - slow_down_time;
        let end_time = self.records[last].t + SLOW_DOWN_TIME - slow_down_time;
        for i in 0..last {
            let (a, b) = (self.records[i], self.records[i + 1]);
            if b.t < slow_down_start || a.v == b.v {
                pos += (a.v + b.v) * 0.5 * (b.t - a.t);
            } else {
                let (v0, t0) = if a.t < slow_down_start {
                    let diff = if b.t == a.t {
                        1.0
                    } else {
                        (slow_down_start - a.t) / (b.t - a.t)
                    };
                    let v0 = a.v + diff * (b.v - a.v);
                    pos += (a.v + v0) * 0.5 * (slow_down_start - a.t);
                    (v0, slow_down_start)
                } else {
                    (a.v, a.t)
                };
                let (a0, a1) = self.slow_down_acc_pair(end_time, t0, b.t);
                let average_acc = (a0 + a1) * 0.5;
                let v1 = b.v;
                let t = (v0 - v1).abs() / average_acc;

                pos += t * v0
                    + 0.5 * t * t * sign(v1 - v0) * a0
                    + (1.0 / 6.0) * t * t * sign(v1 - v0) * (a1 - a0);
            }
        }
        pos
    }

    /// Effective duration once the slow-down tail is applied.
    pub fn time_with_slow_down(&self, slow_down_time: f32) -> f32 {
        let last = self.len - 1;
        let mut time = 0.0;
        let slow_down_start = self.records[last].t - slow_down_time;
        let end_time = self.records[last].t + SLOW_DOWN_TIME - slow_down_time;
        for i in 0..last {
            let (a, b) = (self.records[i], self.records[i + 1]);
            if b.t < slow_down_start || a.v == b.v {
                time += b.t - a.t;
            } else {
                let (v0, t0) = if a.t < slow_down_start {
                    let diff = if b.t == a.t {
                        1.0
                    } else {
                        (slow_down_start - a.t) / (b.t - a.t)
                    };
                    time += slow_down_start - a.t;
                    (a.v + diff * (b.v - a.v), slow_down_start)
                } else {
                    (a.v, a.t)
                };
                let (a0, a1) = self.slow_down_acc_pair(end_time, t0, b.t);
                let average_acc = (a0 + a1) * 0.5;
                time += (v0 - b.v).abs() / average_acc.abs();
            }
        }
        time
    }

    /// Speed at `time` with the slow-down tail applied.
    pub fn speed_at_with_slow_down(&self, time: f32, slow_down_time: f32) -> f32 {
        let last = self.len - 1;
        let slow_down_start = self.records[last].t - slow_down_time;
        let mut i = 0;
        let mut v0 = self.records[last].v;
        while i < last {
            let (a, b) = (self.records[i], self.records[i + 1]);
            if b.t >= time || b.t >= slow_down_start {
                let td = time.min(slow_down_start);
                let diff = if b.t == a.t {
                    1.0
                } else {
                    (td - a.t) / (b.t - a.t)
                };
                let speed = a.v + diff * (b.v - a.v);
                if time < slow_down_start {
                    return speed;
                }
                v0 = speed;
                break;
            }
            i += 1;
        }

        let end_time = self.records[last].t + SLOW_DOWN_TIME - slow_down_time;
        let mut t0 = slow_down_start;
        let mut total_time = t0;
        while i < last {
            let b = self.records[i + 1];
            let (a0, a1) = self.slow_down_acc_pair(end_time, t0, b.t);
            let average_acc = (a0 + a1) * 0.5;
            let v1 = b.v;
            let t = (v0 - v1).abs() / average_acc;

            if total_time + t < time {
                v0 = b.v;
                t0 = b.t;
                total_time += t;
                i += 1;
            } else {
                let tm = time - total_time;
                return v0
                    + tm * sign(v1 - v0) * a0
                    + 0.5 * tm * tm * sign(v1 - v0) * (a1 - a0) / t;
            }
        }
        self.records[last].v
    }

    /// Position at `time` with the slow-down tail applied.
    pub fn position_at_with_slow_down(&self, time: f32, slow_down_time: f32) -> f32 {
        if slow_down_time <= 0.0 {
            return self.position_at(time);
        }
        let last = self.len - 1;
        let mut pos = 0.0;
        let slow_down_start = self.records[last].t - slow_down_time;
        let mut i = 0;
        let mut v0 = self.records[last].v;
        while i < last {
            let (a, b) = (self.records[i], self.records[i + 1]);
            if b.t >= time || b.t >= slow_down_start {
                let td = time.min(slow_down_start);
                let diff = if b.t == a.t {
                    1.0
                } else {
                    (td - a.t) / (b.t - a.t)
                };
                let speed = a.v + diff * (b.v - a.v);
                let part_dist = (a.v + speed) * 0.5 * (td - a.t);
                if time < slow_down_start {
                    return pos + part_dist;
                }
                pos += part_dist;
                v0 = speed;
                break;
            }
            pos += (a.v + b.v) * 0.5 * (b.t - a.t);
            i += 1;
        }

        let end_time = self.records[last].t + SLOW_DOWN_TIME - slow_down_time;
        let mut t0 = slow_down_start;
        let mut total_time = t0;
        while i < last {
            let b = self.records[i + 1];
            let (a0, a1) = self.slow_down_acc_pair(end_time, t0, b.t);
            let average_acc = (a0 + a1) * 0.5;
            let v1 = b.v;
            let t = (v0 - v1).abs() / average_acc;

            if total_time + t < time {
                pos += t * v0
                    + 0.5 * t * t * sign(v1 - v0) * a0
                    + (1.0 / 6.0) * t * t * sign(v1 - v0) * (a1 - a0);
                v0 = b.v;
                t0 = b.t;
                total_time += t;
                i += 1;
            } else {
                let tm = time - total_time;
                pos += tm * v0
                    + 0.5 * tm * tm * sign(v1 - v0) * a0
                    + (1.0 / 6.0) * tm * tm * tm * sign(v1 - v0) * (a1 - a0) / t;
                break;
            }
        }
        pos
    }

    /// Tight lower and upper bound on the position over the whole profile,
    /// including the slow-down tail.
    pub fn bounding_interval(&self, slow_down_time: f32) -> (f32, f32) {
        let last = self.len - 1;
        let mut min_pos = 0.0f32;
        let mut max_pos = 0.0f32;
        let mut pos = 0.0f32;
        let slow_down_start = self.records[last].t - slow_down_time;
        let mut i = 0;
        let mut v0 = self.records[last].v;
        while i < last {
            let (a, b) = (self.records[i], self.records[i + 1]);
            if b.t >= slow_down_start {
                let td = slow_down_start;
                let diff = if b.t == a.t {
                    1.0
                } else {
                    (td - a.t) / (b.t - a.t)
                };
                let speed = a.v + diff * (b.v - a.v);
                // a sign change before the cut still has its own extremum
                if (a.v > 0.0) != (speed > 0.0) && td > a.t {
                    let proportion = a.v.abs() / (a.v.abs() + speed.abs());
                    let t = (td - a.t) * proportion;
                    let zero_pos = pos + a.v * 0.5 * t;
                    min_pos = min_pos.min(zero_pos);
                    max_pos = max_pos.max(zero_pos);
                }
                pos += (a.v + speed) * 0.5 * (td - a.t);
                min_pos = min_pos.min(pos);
                max_pos = max_pos.max(pos);
                v0 = speed;
                break;
            }
            if (a.v > 0.0) != (b.v > 0.0) {
                let proportion = a.v.abs() / (a.v.abs() + b.v.abs());
                let t = (b.t - a.t) * proportion;
                let zero_pos = pos + a.v * 0.5 * t;
                min_pos = min_pos.min(zero_pos);
                max_pos = max_pos.max(zero_pos);
            }
            pos += (a.v + b.v) * 0.5 * (b.t - a.t);
            min_pos = min_pos.min(pos);
            max_pos = max_pos.max(pos);
            i += 1;
        }

        let end_time = self.records[last].t + SLOW_DOWN_TIME - slow_down_time;
        let mut t0 = slow_down_start;
        while i < last {
            let b = self.records[i + 1];
            let (a0, a1) = self.slow_down_acc_pair(end_time, t0, b.t);
            let average_acc = (a0 + a1) * 0.5;
            let v1 = b.v;
            let t = (v0 - v1).abs() / average_acc;

            if (v0 > 0.0) != (v1 > 0.0) && v0 != v1 {
                let proportion = v0.abs() / (v0.abs() + v1.abs());
                let zero_pos = pos + v0 * 0.5 * t * proportion;
                min_pos = min_pos.min(zero_pos);
                max_pos = max_pos.max(zero_pos);
            }
            pos += t * v0
                + 0.5 * t * t * sign(v1 - v0) * a0
                + (1.0 / 6.0) * t * t * sign(v1 - v0) * (a1 - a0);
            min_pos = min_pos.min(pos);
            max_pos = max_pos.max(pos);

            v0 = b.v;
            t0 = b.t;
            i += 1;
        }

        (min_pos, max_pos)
    }

    /// Endpoint accelerations of a slow-down segment spanning `[t0, t1]`.
    #[inline]
    fn slow_down_acc_pair(&self, end_time: f32, t0: f32, t1: f32) -> (f32, f32) {
        let to_end0 = end_time - t0;
        let to_end1 = end_time - t1;
        let a0 = self.acc * (MIN_ACC_FACTOR + (1.0 - MIN_ACC_FACTOR) * to_end0 / SLOW_DOWN_TIME);
        let a1 = self.acc * (MIN_ACC_FACTOR + (1.0 - MIN_ACC_FACTOR) * to_end1 / SLOW_DOWN_TIME);
        (a0, a1)
    }

    // construction

    /// Distance gained by accelerating from `v` toward the speed envelope for
    /// `time` seconds and back. Returns the distance and the top speed.
    fn free_extra_time_distance(v: f32, time: f32, acc: f32, v_max: f32) -> (f32, f32) {
        let v_max = v_max * sign(time);
        let time = time.abs();
        let to_max_time = 2.0 * (v_max - v).abs() / acc;
        if to_max_time < time {
            (
                2.0 * dist(v, v_max, acc) + constant_distance(v_max, time - to_max_time),
                v_max,
            )
        } else {
            let v1 = if v > v_max { -1.0 } else { 1.0 } * acc * time / 2.0 + v;
            (2.0 * dist(v, v1, acc), v1)
        }
    }

    /// End position of the extra-time profile without constructing it. Must
    /// return exactly the position that `calculate_1d_trajectory` reaches for
    /// the same inputs.
    pub fn calculate_end_pos_1d(
        v0: f32,
        v1: f32,
        hint_dist: f32,
        acc: f32,
        v_max: f32,
    ) -> TrajectoryPosInfo1d {
        if hint_dist == 0.0 {
            TrajectoryPosInfo1d {
                end_pos: dist(v0, v1, acc),
                increase_at_speed: v0.max(v1),
            }
        } else if hint_dist < 0.0 && v0 <= v1 {
            if v0 >= -v_max {
                let (extra, top) = Self::free_extra_time_distance(v0, hint_dist, acc, v_max);
                TrajectoryPosInfo1d {
                    end_pos: extra + dist(v0, v1, acc),
                    increase_at_speed: top,
                }
            } else if v0 < -v_max && v1 >= -v_max {
                TrajectoryPosInfo1d {
                    end_pos: dist(v0, v1, acc) + constant_distance(-v_max, -hint_dist),
                    increase_at_speed: -v_max,
                }
            } else {
                let (extra, top) = Self::free_extra_time_distance(v1, hint_dist, acc, v_max);
                TrajectoryPosInfo1d {
                    end_pos: dist(v0, v1, acc) + extra,
                    increase_at_speed: top,
                }
            }
        } else if hint_dist < 0.0 && v0 > v1 {
            if v1 >= -v_max {
                let (extra, top) = Self::free_extra_time_distance(v1, hint_dist, acc, v_max);
                TrajectoryPosInfo1d {
                    end_pos: dist(v0, v1, acc) + extra,
                    increase_at_speed: top,
                }
            } else if v1 < -v_max && v0 >= -v_max {
                TrajectoryPosInfo1d {
                    end_pos: dist(v0, v1, acc) + constant_distance(-v_max, -hint_dist),
                    increase_at_speed: -v_max,
                }
            } else {
                let (extra, top) = Self::free_extra_time_distance(v0, hint_dist, acc, v_max);
                TrajectoryPosInfo1d {
                    end_pos: extra + dist(v0, v1, acc),
                    increase_at_speed: top,
                }
            }
        } else if hint_dist > 0.0 && v0 <= v1 {
            if v1 <= v_max {
                let (extra, top) = Self::free_extra_time_distance(v1, hint_dist, acc, v_max);
                TrajectoryPosInfo1d {
                    end_pos: dist(v0, v1, acc) + extra,
                    increase_at_speed: top,
                }
            } else if v1 > v_max && v0 <= v_max {
                TrajectoryPosInfo1d {
                    end_pos: dist(v0, v1, acc) + constant_distance(v_max, hint_dist),
                    increase_at_speed: v_max,
                }
            } else {
                let (extra, top) = Self::free_extra_time_distance(v0, hint_dist, acc, v_max);
                TrajectoryPosInfo1d {
                    end_pos: extra + dist(v0, v1, acc),
                    increase_at_speed: top,
                }
            }
        } else {
            // hint_dist > 0, v0 > v1
            if v0 <= v_max {
                let (extra, top) = Self::free_extra_time_distance(v0, hint_dist, acc, v_max);
                TrajectoryPosInfo1d {
                    end_pos: extra + dist(v0, v1, acc),
                    increase_at_speed: top,
                }
            } else if v0 > v_max && v1 <= v_max {
                TrajectoryPosInfo1d {
                    end_pos: dist(v0, v1, acc) + constant_distance(v_max, hint_dist),
                    increase_at_speed: v_max,
                }
            } else {
                let (extra, top) = Self::free_extra_time_distance(v1, hint_dist, acc, v_max);
                TrajectoryPosInfo1d {
                    end_pos: dist(v0, v1, acc) + extra,
                    increase_at_speed: top,
                }
            }
        }
    }

    /// Inserts the peak segment of an extra-time profile. `records[0]` must
    /// already be set; times are still per-segment durations.
    fn create_free_extra_time_segment(
        &mut self,
        before_speed: f32,
        v: f32,
        next_speed: f32,
        time: f32,
        acc: f32,
        v_max: f32,
    ) {
        let v_max = v_max * sign(time);
        let time = time.abs();
        let to_max_time = 2.0 * (v_max - v).abs() / acc;
        if to_max_time < time {
            self.records[1] = SpeedRecord {
                v: v_max,
                t: (v_max - before_speed).abs() / acc,
            };
            self.records[2] = SpeedRecord {
                v: v_max,
                t: time - to_max_time,
            };
            self.records[3] = SpeedRecord {
                v: next_speed,
                t: (v_max - next_speed).abs() / acc,
            };
            self.len = 4;
        } else {
            let v1 = if v > v_max { -1.0 } else { 1.0 } * acc * time / 2.0 + v;
            self.records[1] = SpeedRecord {
                v: v1,
                t: (before_speed - v1).abs() / acc,
            };
            self.records[2] = SpeedRecord {
                v: next_speed,
                t: (next_speed - v1).abs() / acc,
            };
            self.len = 3;
        }
    }

    /// Builds the extra-time profile: the minimal `v0` to `v1` transition plus
    /// a peak that spends the signed extra distance hint. Times are still
    /// per-segment durations, call `integrate_time` afterwards.
    pub fn calculate_1d_trajectory(
        v0: f32,
        v1: f32,
        hint_dist: f32,
        acc: f32,
        v_max: f32,
    ) -> SpeedProfile1d {
        let mut p = Self::empty(acc);
        p.records[0] = SpeedRecord { v: v0, t: 0.0 };

        if hint_dist == 0.0 {
            p.records[1] = SpeedRecord {
                v: v1,
                t: (v0 - v1).abs() / acc,
            };
            p.len = 2;
        } else if hint_dist < 0.0 && v0 <= v1 {
            if v0 >= -v_max {
                p.create_free_extra_time_segment(v0, v0, v1, hint_dist, acc, v_max);
            } else if v0 < -v_max && v1 >= -v_max {
                p.insert_capped_peak(v0, v1, -v_max, -hint_dist, acc);
            } else {
                p.create_free_extra_time_segment(v0, v1, v1, hint_dist, acc, v_max);
            }
        } else if hint_dist < 0.0 && v0 > v1 {
            if v1 >= -v_max {
                p.create_free_extra_time_segment(v0, v1, v1, hint_dist, acc, v_max);
            } else if v1 < -v_max && v0 >= -v_max {
                p.insert_capped_peak(v0, v1, -v_max, -hint_dist, acc);
            } else {
                p.create_free_extra_time_segment(v0, v0, v1, hint_dist, acc, v_max);
            }
        } else if hint_dist > 0.0 && v0 <= v1 {
            if v1 <= v_max {
                p.create_free_extra_time_segment(v0, v1, v1, hint_dist, acc, v_max);
            } else if v1 > v_max && v0 <= v_max {
                p.insert_capped_peak(v0, v1, v_max, hint_dist, acc);
            } else {
                p.create_free_extra_time_segment(v0, v0, v1, hint_dist, acc, v_max);
            }
        } else {
            // hint_dist > 0, v0 > v1
            if v0 <= v_max {
                p.create_free_extra_time_segment(v0, v0, v1, hint_dist, acc, v_max);
            } else if v0 > v_max && v1 <= v_max {
                p.insert_capped_peak(v0, v1, v_max, hint_dist, acc);
            } else {
                p.create_free_extra_time_segment(v0, v1, v1, hint_dist, acc, v_max);
            }
        }
        p
    }

    /// Rest segment pinned at the speed envelope.
    fn insert_capped_peak(&mut self, v0: f32, v1: f32, cap: f32, rest_time: f32, acc: f32) {
        self.records[1] = SpeedRecord {
            v: cap,
            t: (v0 - cap).abs() / acc,
        };
        self.records[2] = SpeedRecord {
            v: cap,
            t: rest_time,
        };
        self.records[3] = SpeedRecord {
            v: v1,
            t: (v1 - cap).abs() / acc,
        };
        self.len = 4;
    }

    /// Chooses the reachable end speed that minimises the profile length when
    /// any end speed between zero and `v1` along the driving direction is
    /// acceptable. Returns `(extra_time, real_v1)`.
    fn adjust_end_speed(
        v0: f32,
        v1: f32,
        time: f32,
        direction_positive: bool,
        acc: f32,
    ) -> (f32, f32) {
        let mut extra_time = 0.0;
        let mut real_v1 = v1;

        if direction_positive {
            if v0 < 0.0 && v1 < 0.0 {
                let to_zero_time = v0.abs() / acc;
                if to_zero_time < time {
                    real_v1 = 0.0;
                    extra_time = time - to_zero_time;
                } else {
                    real_v1 = v0 + time * acc;
                }
            } else if v0 < 0.0 && v1 >= 0.0 {
                let to_v1_time = (v1 - v0) / acc;
                if to_v1_time < time {
                    extra_time = time - to_v1_time;
                } else {
                    real_v1 = v0 + time * acc;
                }
            } else if v0 >= 0.0 && v1 < 0.0 {
                real_v1 = 0.0;
                extra_time = time - v0.abs() / acc;
            } else {
                let direct_time = (v0 - v1).abs() / acc;
                if direct_time < time {
                    extra_time = time - direct_time;
                } else {
                    real_v1 = v0 + time * acc;
                }
            }
        } else {
            if v0 < 0.0 && v1 < 0.0 {
                let direct_time = (v0 - v1).abs() / acc;
                if direct_time < time {
                    extra_time = time - direct_time;
                } else {
                    real_v1 = v0 - time * acc;
                }
            } else if v0 < 0.0 && v1 >= 0.0 {
                real_v1 = 0.0;
                extra_time = time - v0.abs() / acc;
            } else if v0 >= 0.0 && v1 < 0.0 {
                let to_v1_time = (v0 - v1) / acc;
                if to_v1_time < time {
                    extra_time = time - to_v1_time;
                } else {
                    real_v1 = v0 - time * acc;
                }
            } else {
                let to_zero_time = v0.abs() / acc;
                if to_zero_time < time {
                    real_v1 = 0.0;
                    extra_time = time - to_zero_time;
                } else {
                    real_v1 = v0 - time * acc;
                }
            }
        }
        (extra_time, real_v1)
    }

    /// End position of the fast-end-speed profile without constructing it.
    pub fn calculate_end_pos_1d_fast_speed(
        v0: f32,
        v1: f32,
        time: f32,
        direction_positive: bool,
        acc: f32,
        v_max: f32,
    ) -> TrajectoryPosInfo1d {
        let (extra_time, real_v1) = Self::adjust_end_speed(v0, v1, time, direction_positive, acc);
        if extra_time == 0.0 {
            TrajectoryPosInfo1d {
                end_pos: (v0 + real_v1) * 0.5 * time,
                increase_at_speed: if direction_positive {
                    v0.max(v1)
                } else {
                    v0.min(v1)
                },
            }
        } else {
            Self::calculate_end_pos_1d(
                v0,
                real_v1,
                if direction_positive {
                    extra_time
                } else {
                    -extra_time
                },
                acc,
                v_max,
            )
        }
    }

    /// Builds the fast-end-speed profile. Times are still per-segment
    /// durations, call `integrate_time` afterwards.
    pub fn calculate_1d_trajectory_fast_end_speed(
        v0: f32,
        v1: f32,
        time: f32,
        direction_positive: bool,
        acc: f32,
        v_max: f32,
    ) -> SpeedProfile1d {
        let (extra_time, real_v1) = Self::adjust_end_speed(v0, v1, time, direction_positive, acc);
        if extra_time == 0.0 {
            let mut p = Self::empty(acc);
            p.records[0] = SpeedRecord { v: v0, t: 0.0 };
            p.records[1] = SpeedRecord {
                v: real_v1,
                t: (real_v1 - v0).abs() / acc,
            };
            p.len = 2;
            p
        } else {
            Self::calculate_1d_trajectory(
                v0,
                real_v1,
                if direction_positive {
                    extra_time
                } else {
                    -extra_time
                },
                acc,
                v_max,
            )
        }
    }
}

/// Two-dimensional trajectory: one speed profile per axis, a start position,
/// a correction offset that scales out the residual numerical drift of the
/// search, and the slow-down window length.
#[derive(Debug, Clone, Copy)]
pub struct Trajectory {
    x: SpeedProfile1d,
    y: SpeedProfile1d,
    start_pos: Vector,
    correction_offset_per_second: Vector,
    slow_down_time: f32,
}

impl Trajectory {
    pub fn new(x: SpeedProfile1d, y: SpeedProfile1d, start_pos: Vector, slow_down_time: f32) -> Self {
        Self {
            x,
            y,
            start_pos,
            correction_offset_per_second: Vector::ZERO,
            slow_down_time,
        }
    }

    #[inline]
    pub fn slow_down_time(&self) -> f32 {
        self.slow_down_time
    }

    #[inline]
    pub fn start_pos(&self) -> Vector {
        self.start_pos
    }

    pub fn set_start_pos(&mut self, pos: Vector) {
        self.start_pos = pos;
    }

    /// Distributes `offset` linearly over the duration so the endpoint lands
    /// exactly on the requested target.
    pub fn set_correction_offset(&mut self, offset: Vector) {
        let time = self.end_time();
        if time > 0.0 {
            self.correction_offset_per_second = offset / time;
        }
    }

    /// Total duration, including the slow-down stretch.
    pub fn end_time(&self) -> f32 {
        if self.slow_down_time > 0.0 {
            self.x
                .time_with_slow_down(self.slow_down_time)
                .max(self.y.time_with_slow_down(self.slow_down_time))
        } else {
            self.x.end_time().max(self.y.end_time())
        }
    }

    pub fn position_at(&self, time: f32) -> Vector {
        let offset = if self.slow_down_time > 0.0 {
            Vector::new(
                self.x.position_at_with_slow_down(time, self.slow_down_time),
                self.y.position_at_with_slow_down(time, self.slow_down_time),
            )
        } else {
            Vector::new(self.x.position_at(time), self.y.position_at(time))
        };
        let correction_time = time.clamp(0.0, self.end_time());
        self.start_pos + offset + self.correction_offset_per_second * correction_time
    }

    pub fn speed_at(&self, time: f32) -> Vector {
        if self.slow_down_time > 0.0 {
            Vector::new(
                self.x.speed_at_with_slow_down(time, self.slow_down_time),
                self.y.speed_at_with_slow_down(time, self.slow_down_time),
            )
        } else {
            Vector::new(self.x.speed_at(time), self.y.speed_at(time))
        }
    }

    pub fn state_at(&self, time: f32) -> RobotState {
        RobotState {
            pos: self.position_at(time),
            speed: self.speed_at(time),
        }
    }

    pub fn end_position(&self) -> Vector {
        self.position_at(self.end_time())
    }

    /// End position via the dedicated slow-down integral; a single pass in
    /// contrast to the generic time query. The two agree to well below the
    /// search precision.
    pub fn slow_down_end_position(&self) -> Vector {
        let offset = Vector::new(
            self.x.slow_down_end_position(self.slow_down_time),
            self.y.slow_down_end_position(self.slow_down_time),
        );
        self.start_pos + offset + self.correction_offset_per_second * self.end_time()
    }

    pub fn end_speed(&self) -> Vector {
        Vector::new(self.x.end_speed(), self.y.end_speed())
    }

    /// Speed around the middle of the schedule, a cheap stand-in for the
    /// typical travel speed during the search.
    pub fn continuation_speed(&self) -> Vector {
        Vector::new(
            self.x.record(self.x.len() / 2).v,
            self.y.record(self.y.len() / 2).v,
        )
    }

    pub fn initial_acceleration(&self) -> Vector {
        Vector::new(self.x.initial_acceleration(), self.y.initial_acceleration())
    }

    /// Truncates both profiles. Not meaningful for trajectories with a
    /// slow-down tail.
    pub fn limit_to_time(&mut self, time: f32) {
        self.x.limit_to_time(time);
        self.y.limit_to_time(time);
    }

    pub fn calculate_bounding_box(&self) -> BoundingBox {
        let x_range = self.x.bounding_interval(self.slow_down_time);
        let y_range = self.y.bounding_interval(self.slow_down_time);
        let mut bound = BoundingBox::new(
            self.start_pos + Vector::new(x_range.0, y_range.0),
            self.start_pos + Vector::new(x_range.1, y_range.1),
        );
        bound.merge_point(self.end_position());
        bound
    }

    /// Samples `count` states spaced `time_interval` apart, starting at the
    /// trajectory start. Queries past the end repeat the final state.
    pub fn trajectory_positions(&self, count: usize, time_interval: f32) -> Vec<TrajectoryPoint> {
        (0..count)
            .map(|i| {
                let time = i as f32 * time_interval;
                TrajectoryPoint {
                    state: self.state_at(time),
                    time,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::PlannerRng;

    #[test]
    fn direct_profile_queries() {
        // linear ramp 0 -> 2 m/s at 2 m/s^2, then implicit hold
        let mut p = SpeedProfile1d::calculate_1d_trajectory(0.0, 2.0, 0.0, 2.0, 3.0);
        p.integrate_time();
        assert_eq!(p.len(), 2);
        assert!((p.end_time() - 1.0).abs() < 1e-6);
        assert!((p.speed_at(0.5) - 1.0).abs() < 1e-6);
        assert!((p.position_at(1.0) - 1.0).abs() < 1e-6);
        assert!((p.position_at(0.5) - 0.25).abs() < 1e-6);
        assert!((p.speed_at(5.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn limit_to_time_interpolates() {
        let mut p = SpeedProfile1d::calculate_1d_trajectory(0.0, 2.0, 0.0, 2.0, 3.0);
        p.integrate_time();
        p.limit_to_time(0.5);
        assert!((p.end_time() - 0.5).abs() < 1e-6);
        assert!((p.end_speed() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn end_pos_matches_constructed_profile() {
        let mut rng = PlannerRng::new(11);
        for _ in 0..5000 {
            let v_max = rng.uniform_float(0.3, 5.0);
            let v0 = rng.uniform_float(-v_max, v_max);
            let v1 = rng.uniform_float(-v_max, v_max);
            let hint = rng.uniform_float(-3.0, 3.0);
            let acc = rng.uniform_float(0.5, 4.0);

            let info = SpeedProfile1d::calculate_end_pos_1d(v0, v1, hint, acc, v_max);
            let mut profile = SpeedProfile1d::calculate_1d_trajectory(v0, v1, hint, acc, v_max);
            profile.integrate_time();
            let end = profile.position_at(profile.end_time());
            assert!(
                (info.end_pos - end).abs() < 1e-3 + info.end_pos.abs() * 1e-4,
                "v0={v0} v1={v1} hint={hint} acc={acc} vmax={v_max}: {} vs {end}",
                info.end_pos
            );
        }
    }

    #[test]
    fn fast_end_speed_never_overshoots_requested_speed() {
        let mut rng = PlannerRng::new(5);
        for _ in 0..2000 {
            let v_max = rng.uniform_float(0.5, 4.0);
            let v0 = rng.uniform_float(-v_max, v_max);
            let v1 = rng.uniform_float(-v_max, v_max);
            let acc = rng.uniform_float(0.5, 4.0);
            let positive = rng.uniform_int() % 2 == 0;

            // the time budget must at least allow reaching the compatible end
            // speed, shorter budgets are filtered out before this layer
            let reachable = v0.max(v1.min(0.0)).min(v1.max(0.0));
            let min_time = (v0 - reachable).abs() / acc;
            let time = min_time + rng.uniform_float(0.0, 2.0);

            let mut p = SpeedProfile1d::calculate_1d_trajectory_fast_end_speed(
                v0, v1, time, positive, acc, v_max,
            );
            p.integrate_time();
            assert!(
                p.end_speed().abs() <= v1.abs() + 1e-4,
                "v0={v0} v1={v1} time={time} end={}",
                p.end_speed()
            );
        }
    }

    #[test]
    fn slow_down_position_is_integral_of_slow_down_speed() {
        let mut rng = PlannerRng::new(23);
        for _ in 0..200 {
            let v_max = rng.uniform_float(0.5, 4.0);
            let v0 = rng.uniform_float(-v_max, v_max);
            let v1 = rng.uniform_float(-v_max, v_max);
            let hint = rng.uniform_float(-2.0, 2.0);
            let acc = rng.uniform_float(0.5, 4.0);
            let slow_down = rng.uniform_float(0.01, SLOW_DOWN_TIME);

            let mut p = SpeedProfile1d::calculate_1d_trajectory(v0, v1, hint, acc, v_max);
            p.integrate_time();
            let total = p.time_with_slow_down(slow_down);

            // numeric integral of the closed-form speed should match the
            // closed-form position
            let steps = 2000;
            let dt = total / steps as f32;
            let mut pos = 0.0f32;
            for i in 0..steps {
                let t0 = i as f32 * dt;
                let t1 = t0 + dt;
                pos += (p.speed_at_with_slow_down(t0, slow_down)
                    + p.speed_at_with_slow_down(t1, slow_down))
                    * 0.5
                    * dt;
                let closed = p.position_at_with_slow_down(t1, slow_down);
                assert!(
                    (pos - closed).abs() < 5e-3,
                    "drift at t={t1}: {pos} vs {closed}"
                );
            }
        }
    }

    #[test]
    fn slow_down_end_position_matches_position_query() {
        let mut rng = PlannerRng::new(31);
        for _ in 0..1000 {
            let v_max = rng.uniform_float(0.5, 4.0);
            let v0 = rng.uniform_float(-v_max, v_max);
            let hint = rng.uniform_float(-2.0, 2.0);
            let acc = rng.uniform_float(0.5, 4.0);
            let slow_down = rng.uniform_float(0.01, SLOW_DOWN_TIME);

            let mut p = SpeedProfile1d::calculate_1d_trajectory(v0, 0.0, hint, acc, v_max);
            p.integrate_time();
            let end = p.slow_down_end_position(slow_down);
            let queried = p.position_at_with_slow_down(p.time_with_slow_down(slow_down), slow_down);
            assert!((end - queried).abs() < 1e-3, "{end} vs {queried}");
        }
    }

    #[test]
    fn bounding_interval_covers_sampled_positions() {
        let mut rng = PlannerRng::new(47);
        for _ in 0..500 {
            let v_max = rng.uniform_float(0.5, 4.0);
            let v0 = rng.uniform_float(-v_max, v_max);
            let v1 = rng.uniform_float(-v_max, v_max);
            let hint = rng.uniform_float(-2.0, 2.0);
            let acc = rng.uniform_float(0.5, 4.0);
            let slow_down = if rng.uniform_int() % 2 == 0 {
                rng.uniform_float(0.01, SLOW_DOWN_TIME)
            } else {
                0.0
            };

            let mut p = SpeedProfile1d::calculate_1d_trajectory(v0, v1, hint, acc, v_max);
            p.integrate_time();
            let (min, max) = p.bounding_interval(slow_down);
            let total = if slow_down > 0.0 {
                p.time_with_slow_down(slow_down)
            } else {
                p.end_time()
            };
            for i in 0..200 {
                let t = total * i as f32 / 199.0;
                let pos = if slow_down > 0.0 {
                    p.position_at_with_slow_down(t, slow_down)
                } else {
                    p.position_at(t)
                };
                assert!(pos >= min - 1e-2 && pos <= max + 1e-2);
            }
        }
    }
}
