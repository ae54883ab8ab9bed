// src/obstacles.rs
//! The obstacle model.
//!
//! Obstacles answer point-in-time distance queries through a single zoned
//! interface: the exact distance when the point is within `near_radius` of
//! the boundary, a cheap far answer otherwise. Static shapes ignore the time,
//! moving shapes report far outside their active interval.

use crate::TrajectoryPoint;
use crate::geometry::{BoundingBox, LineSegment, Vector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Avoid dividing by a near-zero distance when projecting out of a shape.
const PROJECT_EPSILON: f32 = 0.0001;

/// Result of a zoned distance query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZonedDistance {
    /// The point is inside the obstacle; the exact (non-positive) distance.
    Inside(f32),
    /// The exact distance, usually within the near radius. Shapes without a
    /// cheap far-field answer report it beyond the near radius as well.
    Near(f32),
    /// Farther away than the near radius, exact value not computed.
    Far,
}

impl ZonedDistance {
    /// Numeric distance; far maps to `f32::MAX`.
    #[inline]
    pub fn value(self) -> f32 {
        match self {
            ZonedDistance::Inside(d) | ZonedDistance::Near(d) => d,
            ZonedDistance::Far => f32::MAX,
        }
    }

    #[inline]
    pub fn is_inside(self) -> bool {
        matches!(self, ZonedDistance::Inside(_))
    }
}

#[inline]
fn zoned_from_dist_sq(dist_sq: f32, radius: f32, near_radius: f32) -> ZonedDistance {
    if dist_sq <= (radius + near_radius) * (radius + near_radius) {
        zoned_from_exact(dist_sq.sqrt() - radius, near_radius)
    } else {
        ZonedDistance::Far
    }
}

#[inline]
fn zoned_from_exact(distance: f32, near_radius: f32) -> ZonedDistance {
    if distance <= 0.0 {
        ZonedDistance::Inside(distance)
    } else if distance <= near_radius {
        ZonedDistance::Near(distance)
    } else {
        ZonedDistance::Far
    }
}

/// The handle every obstacle exposes to the planner. Test fixtures may
/// implement this to inject custom shapes.
pub trait ObstacleShape {
    fn priority(&self) -> i32;

    /// Conservative box enclosing the obstacle over its entire time range.
    fn bounding_box(&self) -> BoundingBox;

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance;

    /// Moves a point just outside the surface the obstacle has at rest.
    /// Shapes without a meaningful projection return the point unchanged.
    fn project_out(&self, pos: Vector, _extra_distance: f32) -> Vector {
        pos
    }

    fn intersects(&self, point: &TrajectoryPoint) -> bool {
        self.zoned_distance(point, 0.0).is_inside()
    }

    /// Exact distance; `f32::MAX` when the obstacle is not present at the
    /// queried time.
    fn distance(&self, point: &TrajectoryPoint) -> f32 {
        self.zoned_distance(point, f32::INFINITY).value()
    }
}

/// Circle inflated by its radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub prio: i32,
    pub radius: f32,
    pub center: Vector,
}

impl Circle {
    pub fn point_distance(&self, v: Vector) -> f32 {
        v.distance(self.center) - self.radius
    }
}

impl ObstacleShape for Circle {
    fn priority(&self) -> i32 {
        self.prio
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.center - Vector::new(self.radius, self.radius),
            self.center + Vector::new(self.radius, self.radius),
        )
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance {
        zoned_from_dist_sq(
            point.state.pos.distance_squared(self.center),
            self.radius,
            near_radius,
        )
    }

    fn project_out(&self, pos: Vector, extra_distance: f32) -> Vector {
        let dist = pos.distance(self.center);
        if dist >= self.radius {
            return pos;
        }
        let total_project_radius = self.radius + extra_distance;
        if dist < PROJECT_EPSILON {
            // project towards the field center if possible
            if self.center.distance_squared(Vector::ZERO) < self.radius {
                return self.center + Vector::new(total_project_radius, 0.0);
            }
            return self.center - self.center.normalized() * total_project_radius;
        }
        self.center + (pos - self.center) * (total_project_radius / dist)
    }
}

/// Axis-aligned rectangle inflated by `radius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub prio: i32,
    pub radius: f32,
    pub bottom_left: Vector,
    pub top_right: Vector,
}

impl Rect {
    pub fn new(prio: i32, radius: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            prio,
            radius,
            bottom_left: Vector::new(x1.min(x2), y1.min(y2)),
            top_right: Vector::new(x1.max(x2), y1.max(y2)),
        }
    }

    pub fn point_distance(&self, v: Vector) -> f32 {
        let dist_x = (self.bottom_left.x - v.x).max(v.x - self.top_right.x);
        let dist_y = (self.bottom_left.y - v.y).max(v.y - self.top_right.y);

        if dist_x >= 0.0 && dist_y >= 0.0 {
            (dist_x * dist_x + dist_y * dist_y).sqrt() - self.radius
        } else if dist_x < 0.0 && dist_y < 0.0 {
            dist_x.max(dist_y) - self.radius
        } else if dist_x < 0.0 {
            dist_y - self.radius
        } else {
            dist_x - self.radius
        }
    }
}

impl ObstacleShape for Rect {
    fn priority(&self) -> i32 {
        self.prio
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.bottom_left - Vector::new(self.radius, self.radius),
            self.top_right + Vector::new(self.radius, self.radius),
        )
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance {
        let v = point.state.pos;
        let dist_x = (self.bottom_left.x - v.x).max(v.x - self.top_right.x);
        let dist_y = (self.bottom_left.y - v.y).max(v.y - self.top_right.y);

        if dist_x >= 0.0 && dist_y >= 0.0 {
            // distance to a corner
            zoned_from_dist_sq(dist_x * dist_x + dist_y * dist_y, self.radius, near_radius)
        } else if dist_x < 0.0 && dist_y < 0.0 {
            // inside the core rectangle
            ZonedDistance::Inside(dist_x.max(dist_y) - self.radius)
        } else {
            // next to a side the exact distance is already on hand, report
            // it even beyond the near radius
            let distance = if dist_x < 0.0 { dist_y } else { dist_x } - self.radius;
            if distance <= 0.0 {
                ZonedDistance::Inside(distance)
            } else {
                ZonedDistance::Near(distance)
            }
        }
    }

    fn project_out(&self, pos: Vector, extra_distance: f32) -> Vector {
        if self.point_distance(pos) > 0.0 {
            return pos;
        }

        let inside_x = pos.x > self.bottom_left.x && pos.x < self.top_right.x;
        let inside_y = pos.y > self.bottom_left.y && pos.y < self.top_right.y;
        if inside_x || inside_y {
            // project toward the closest side
            let bottom_right = Vector::new(self.top_right.x, self.bottom_left.y);
            let top_left = Vector::new(self.bottom_left.x, self.top_right.y);
            let right_dist = LineSegment::new(self.top_right, bottom_right).distance(pos);
            let bottom_dist = LineSegment::new(bottom_right, self.bottom_left).distance(pos);
            let left_dist = LineSegment::new(self.bottom_left, top_left).distance(pos);
            let top_dist = LineSegment::new(top_left, self.top_right).distance(pos);

            if right_dist < bottom_dist.min(left_dist).min(top_dist) {
                Vector::new(self.top_right.x + self.radius + extra_distance, pos.y)
            } else if bottom_dist < left_dist.min(top_dist) {
                Vector::new(pos.x, self.bottom_left.y - self.radius - extra_distance)
            } else if left_dist < top_dist {
                Vector::new(self.bottom_left.x - self.radius - extra_distance, pos.y)
            } else {
                Vector::new(pos.x, self.top_right.y + self.radius + extra_distance)
            }
        } else {
            // the point sits in a corner region of the inflation
            let corner = Vector::new(
                if pos.x < self.bottom_left.x {
                    self.bottom_left.x
                } else {
                    self.top_right.x
                },
                if pos.y < self.bottom_left.y {
                    self.bottom_left.y
                } else {
                    self.top_right.y
                },
            );
            Circle {
                prio: self.prio,
                radius: self.radius,
                center: corner,
            }
            .project_out(pos, extra_distance)
        }
    }
}

/// Triangle inflated by `radius`, stored counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub prio: i32,
    pub radius: f32,
    pub p1: Vector,
    pub p2: Vector,
    pub p3: Vector,
}

impl Triangle {
    /// The corners may be given in any order.
    pub fn new(prio: i32, radius: f32, a: Vector, b: Vector, c: Vector) -> Self {
        let det = Vector::det(a, b, c);
        let (p1, p2, p3) = if det > 0.0 { (a, b, c) } else { (a, c, b) };
        Self {
            prio,
            radius,
            p1,
            p2,
            p3,
        }
    }

    pub fn point_distance(&self, v: Vector) -> f32 {
        // positive determinant means the point is left of the edge
        let det1 = Vector::det(self.p2, self.p3, v) / self.p2.distance(self.p3);
        let det2 = Vector::det(self.p3, self.p1, v) / self.p3.distance(self.p1);
        let det3 = Vector::det(self.p1, self.p2, v) / self.p1.distance(self.p2);

        let distance = if det1 >= 0.0 && det2 >= 0.0 && det3 >= 0.0 {
            -det1.min(det2).min(det3)
        } else {
            // brute force over corners and sides, flat triangles are hard to
            // handle case by case
            let d1 = LineSegment::new(self.p1, self.p2).distance(v);
            let d2 = LineSegment::new(self.p2, self.p3).distance(v);
            let d3 = LineSegment::new(self.p1, self.p3).distance(v);
            d1.min(d2).min(d3)
        };
        distance - self.radius
    }
}

impl ObstacleShape for Triangle {
    fn priority(&self) -> i32 {
        self.prio
    }

    fn bounding_box(&self) -> BoundingBox {
        let r = Vector::new(self.radius, self.radius);
        let mut b = BoundingBox::new(self.p1 - r, self.p1 + r);
        b.merge_point(self.p2 - r);
        b.merge_point(self.p2 + r);
        b.merge_point(self.p3 - r);
        b.merge_point(self.p3 + r);
        b
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, _near_radius: f32) -> ZonedDistance {
        // a triangle has no cheaper far-field answer, the exact distance is
        // always reported regardless of the near radius
        let distance = self.point_distance(point.state.pos);
        if distance <= 0.0 {
            ZonedDistance::Inside(distance)
        } else {
            ZonedDistance::Near(distance)
        }
    }
}

/// Thickened line segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub prio: i32,
    pub radius: f32,
    pub segment: LineSegment,
}

impl Line {
    pub fn point_distance(&self, v: Vector) -> f32 {
        self.segment.distance(v) - self.radius
    }
}

impl ObstacleShape for Line {
    fn priority(&self) -> i32 {
        self.prio
    }

    fn bounding_box(&self) -> BoundingBox {
        let r = Vector::new(self.radius, self.radius);
        let mut b = BoundingBox::new(self.segment.start() - r, self.segment.start() + r);
        b.merge_point(self.segment.end() - r);
        b.merge_point(self.segment.end() + r);
        b
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance {
        zoned_from_dist_sq(
            self.segment.distance_squared(point.state.pos),
            self.radius,
            near_radius,
        )
    }

    fn project_out(&self, pos: Vector, extra_distance: f32) -> Vector {
        let dist = self.segment.distance(pos);
        if dist >= self.radius {
            return pos;
        }
        let total_project_radius = self.radius + extra_distance;
        let closest = self.segment.closest_point(pos);
        if pos.distance_squared(closest) < PROJECT_EPSILON {
            return closest + self.segment.normal() * total_project_radius;
        }
        closest + (pos - closest) * (total_project_radius / dist)
    }
}

/// 1-D extent of a constant-acceleration motion over a time interval. A sign
/// change of the speed inside the interval adds a third extremum candidate.
fn range_1d(p0: f32, speed: f32, acc: f32, start_time: f32, end_time: f32) -> (f32, f32) {
    let time_diff = end_time - start_time;
    let end_pos = p0 + speed * time_diff + acc * (0.5 * time_diff * time_diff);

    if acc == 0.0 {
        return (p0.min(end_pos), p0.max(end_pos));
    }
    let zero_speed_time = (speed / acc).abs();
    if (speed < 0.0) != (acc < 0.0) && zero_speed_time <= time_diff {
        let zero_speed_pos =
            p0 + speed * zero_speed_time + acc * (0.5 * zero_speed_time * zero_speed_time);
        return (
            p0.min(end_pos).min(zero_speed_pos),
            p0.max(end_pos).max(zero_speed_pos),
        );
    }
    (p0.min(end_pos), p0.max(end_pos))
}

/// Circle moving with constant acceleration, active over a time interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingCircle {
    pub prio: i32,
    pub radius: f32,
    pub start_pos: Vector,
    pub speed: Vector,
    pub acc: Vector,
    pub start_time: f32,
    pub end_time: f32,
}

impl ObstacleShape for MovingCircle {
    fn priority(&self) -> i32 {
        self.prio
    }

    fn bounding_box(&self) -> BoundingBox {
        let x_range = range_1d(
            self.start_pos.x,
            self.speed.x,
            self.acc.x,
            self.start_time,
            self.end_time,
        );
        let y_range = range_1d(
            self.start_pos.y,
            self.speed.y,
            self.acc.y,
            self.start_time,
            self.end_time,
        );
        let mut result = BoundingBox::new(
            Vector::new(x_range.0, y_range.0),
            Vector::new(x_range.1, y_range.1),
        );
        result.add_extra_radius(self.radius);
        result
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance {
        if point.time < self.start_time || point.time > self.end_time {
            return ZonedDistance::Far;
        }
        let t = point.time - self.start_time;
        let center = self.start_pos + self.speed * t + self.acc * (0.5 * t * t);
        zoned_from_dist_sq(
            center.distance_squared(point.state.pos),
            self.radius,
            near_radius,
        )
    }
}

/// Segment whose endpoints move independently with constant acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingLine {
    pub prio: i32,
    pub radius: f32,
    pub start_pos1: Vector,
    pub speed1: Vector,
    pub acc1: Vector,
    pub start_pos2: Vector,
    pub speed2: Vector,
    pub acc2: Vector,
    pub start_time: f32,
    pub end_time: f32,
}

impl ObstacleShape for MovingLine {
    fn priority(&self) -> i32 {
        self.prio
    }

    fn bounding_box(&self) -> BoundingBox {
        let x1 = range_1d(
            self.start_pos1.x,
            self.speed1.x,
            self.acc1.x,
            self.start_time,
            self.end_time,
        );
        let y1 = range_1d(
            self.start_pos1.y,
            self.speed1.y,
            self.acc1.y,
            self.start_time,
            self.end_time,
        );
        let mut result = BoundingBox::new(Vector::new(x1.0, y1.0), Vector::new(x1.1, y1.1));
        let x2 = range_1d(
            self.start_pos2.x,
            self.speed2.x,
            self.acc2.x,
            self.start_time,
            self.end_time,
        );
        let y2 = range_1d(
            self.start_pos2.y,
            self.speed2.y,
            self.acc2.y,
            self.start_time,
            self.end_time,
        );
        result.merge_point(Vector::new(x2.0, y2.0));
        result.merge_point(Vector::new(x2.1, y2.1));
        result.add_extra_radius(self.radius);
        result
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance {
        if point.time < self.start_time || point.time > self.end_time {
            return ZonedDistance::Far;
        }
        let t = point.time - self.start_time;
        let p1 = self.start_pos1 + self.speed1 * t + self.acc1 * (0.5 * t * t);
        let p2 = self.start_pos2 + self.speed2 * t + self.acc2 * (0.5 * t * t);
        if p1 == p2 {
            // happens for example at time zero
            return zoned_from_dist_sq(
                p1.distance_squared(point.state.pos),
                self.radius,
                near_radius,
            );
        }
        zoned_from_dist_sq(
            LineSegment::new(p1, p2).distance_squared(point.state.pos),
            self.radius,
            near_radius,
        )
    }
}

/// Assumed radius of an opponent robot.
pub const OPPONENT_ROBOT_RADIUS: f32 = 0.09;
/// Opponent movement is only predictable for a short horizon.
const OPPONENT_MAX_TIME: f32 = 0.8;

/// Speed-dependent extra clearance around an opponent. Fast relative motion
/// buys up to 10 cm, slow crawling almost nothing.
fn opponent_safety_distance(own_speed: Vector, opp_speed: Vector) -> f32 {
    const SLOW_ROBOT: f32 = 0.3;

    let mut safety_distance =
        ((own_speed.distance(opp_speed) * (1.0 / 1.25)).min(1.0) * 0.15 - 0.05).max(0.0);
    if own_speed.length_squared() < 0.5 * 0.5 {
        safety_distance = safety_distance.min(0.02);
    }
    if own_speed.length_squared() < SLOW_ROBOT * SLOW_ROBOT
        && opp_speed.length_squared() < SLOW_ROBOT * SLOW_ROBOT
    {
        safety_distance -= 0.02;
    }
    safety_distance
}

/// Opponent robot extrapolated linearly, active until `t = 0.8 s`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpponentRobot {
    pub prio: i32,
    /// Own radius plus the opponent radius.
    pub radius: f32,
    pub start_pos: Vector,
    pub speed: Vector,
}

impl OpponentRobot {
    pub fn new(prio: i32, base_radius: f32, start_pos: Vector, speed: Vector) -> Self {
        Self {
            prio,
            radius: base_radius + OPPONENT_ROBOT_RADIUS,
            start_pos,
            speed,
        }
    }
}

impl ObstacleShape for OpponentRobot {
    fn priority(&self) -> i32 {
        self.prio
    }

    fn bounding_box(&self) -> BoundingBox {
        let max_safety = opponent_safety_distance(Vector::new(-5.0, 0.0), Vector::new(5.0, 0.0));
        let x_range = range_1d(self.start_pos.x, self.speed.x, 0.0, 0.0, OPPONENT_MAX_TIME);
        let y_range = range_1d(self.start_pos.y, self.speed.y, 0.0, 0.0, OPPONENT_MAX_TIME);
        let mut result = BoundingBox::new(
            Vector::new(x_range.0, y_range.0),
            Vector::new(x_range.1, y_range.1),
        );
        result.add_extra_radius(self.radius + max_safety);
        result
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance {
        if point.time > OPPONENT_MAX_TIME {
            return ZonedDistance::Far;
        }
        let total_radius = self.radius + opponent_safety_distance(point.state.speed, self.speed);
        let center = self.start_pos + self.speed * point.time;
        zoned_from_dist_sq(
            center.distance_squared(point.state.pos),
            total_radius,
            near_radius,
        )
    }
}

/// Another friendly robot following its previously planned trajectory. The
/// sample buffer is shared with the owning planner; it must hold at least two
/// points, equidistant in time, the first at time zero.
#[derive(Debug, Clone)]
pub struct FriendlyRobot {
    pub prio: i32,
    pub radius: f32,
    trajectory: Arc<Vec<TrajectoryPoint>>,
    time_interval: f32,
    bound: BoundingBox,
}

impl FriendlyRobot {
    pub fn new(trajectory: Arc<Vec<TrajectoryPoint>>, radius: f32, prio: i32) -> Self {
        debug_assert!(trajectory.len() >= 2);
        let time_interval = trajectory[1].time - trajectory[0].time;
        let mut bound = BoundingBox::new(trajectory[0].state.pos, trajectory[1].state.pos);
        for point in trajectory.iter().skip(2) {
            bound.merge_point(point.state.pos);
        }
        bound.add_extra_radius(radius);
        Self {
            prio,
            radius,
            trajectory,
            time_interval,
            bound,
        }
    }

    pub fn trajectory(&self) -> &[TrajectoryPoint] {
        &self.trajectory
    }

    fn sample_at(&self, time: f32) -> &TrajectoryPoint {
        let index = ((time / self.time_interval) as usize).min(self.trajectory.len() - 1);
        &self.trajectory[index]
    }
}

impl PartialEq for FriendlyRobot {
    fn eq(&self, other: &Self) -> bool {
        self.prio == other.prio
            && self.radius == other.radius
            && *self.trajectory == *other.trajectory
    }
}

impl ObstacleShape for FriendlyRobot {
    fn priority(&self) -> i32 {
        self.prio
    }

    fn bounding_box(&self) -> BoundingBox {
        self.bound
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance {
        let sample = self.sample_at(point.time);
        zoned_from_dist_sq(
            sample.state.pos.distance_squared(point.state.pos),
            self.radius,
            near_radius,
        )
    }

    fn project_out(&self, pos: Vector, extra_distance: f32) -> Vector {
        let last = &self.trajectory[self.trajectory.len() - 1];
        // only a peer that ends standing still has a stable surface
        if last.state.speed.length_squared() > 0.05 {
            return pos;
        }
        let stop_pos = last.state.pos;
        let dist = pos.distance(stop_pos);
        if dist < 0.01 {
            return stop_pos + Vector::new(self.radius + extra_distance, 0.0);
        }
        if dist >= self.radius {
            return pos;
        }
        stop_pos + (pos - stop_pos) * ((self.radius + extra_distance) / dist)
    }
}

/// All obstacle kinds behind one tag, so the query loops dispatch once.
#[derive(Debug, Clone)]
pub enum Obstacle {
    Circle(Circle),
    Rect(Rect),
    Triangle(Triangle),
    Line(Line),
    MovingCircle(MovingCircle),
    MovingLine(MovingLine),
    OpponentRobot(OpponentRobot),
    FriendlyRobot(FriendlyRobot),
}

impl Obstacle {
    fn shape(&self) -> &dyn ObstacleShape {
        match self {
            Obstacle::Circle(o) => o,
            Obstacle::Rect(o) => o,
            Obstacle::Triangle(o) => o,
            Obstacle::Line(o) => o,
            Obstacle::MovingCircle(o) => o,
            Obstacle::MovingLine(o) => o,
            Obstacle::OpponentRobot(o) => o,
            Obstacle::FriendlyRobot(o) => o,
        }
    }

    /// Inflation applied to static shapes once per tick; moving shapes have
    /// the robot radius folded in at insertion.
    pub fn add_radius(&mut self, extra: f32) {
        match self {
            Obstacle::Circle(o) => o.radius += extra,
            Obstacle::Rect(o) => o.radius += extra,
            Obstacle::Triangle(o) => o.radius += extra,
            Obstacle::Line(o) => o.radius += extra,
            Obstacle::MovingCircle(o) => o.radius += extra,
            Obstacle::MovingLine(o) => o.radius += extra,
            Obstacle::OpponentRobot(o) => o.radius += extra,
            Obstacle::FriendlyRobot(o) => o.radius += extra,
        }
    }
}

impl ObstacleShape for Obstacle {
    fn priority(&self) -> i32 {
        self.shape().priority()
    }

    fn bounding_box(&self) -> BoundingBox {
        self.shape().bounding_box()
    }

    fn zoned_distance(&self, point: &TrajectoryPoint, near_radius: f32) -> ZonedDistance {
        self.shape().zoned_distance(point, near_radius)
    }

    fn project_out(&self, pos: Vector, extra_distance: f32) -> Vector {
        self.shape().project_out(pos, extra_distance)
    }
}

/// Owned serialisable mirror of an obstacle, used by the capture files. A
/// reconstructed friendly-robot obstacle owns its copy of the sample buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObstacleState {
    Circle(Circle),
    Rect(Rect),
    Triangle(Triangle),
    Line {
        prio: i32,
        radius: f32,
        start: Vector,
        end: Vector,
    },
    MovingCircle(MovingCircle),
    MovingLine(MovingLine),
    OpponentRobot(OpponentRobot),
    FriendlyRobot {
        prio: i32,
        radius: f32,
        trajectory: Vec<TrajectoryPoint>,
    },
}

impl Obstacle {
    pub fn to_state(&self) -> ObstacleState {
        match self {
            Obstacle::Circle(o) => ObstacleState::Circle(*o),
            Obstacle::Rect(o) => ObstacleState::Rect(*o),
            Obstacle::Triangle(o) => ObstacleState::Triangle(*o),
            Obstacle::Line(o) => ObstacleState::Line {
                prio: o.prio,
                radius: o.radius,
                start: o.segment.start(),
                end: o.segment.end(),
            },
            Obstacle::MovingCircle(o) => ObstacleState::MovingCircle(*o),
            Obstacle::MovingLine(o) => ObstacleState::MovingLine(*o),
            Obstacle::OpponentRobot(o) => ObstacleState::OpponentRobot(*o),
            Obstacle::FriendlyRobot(o) => ObstacleState::FriendlyRobot {
                prio: o.prio,
                radius: o.radius,
                trajectory: o.trajectory().to_vec(),
            },
        }
    }

    pub fn from_state(state: ObstacleState) -> Obstacle {
        match state {
            ObstacleState::Circle(o) => Obstacle::Circle(o),
            ObstacleState::Rect(o) => Obstacle::Rect(o),
            ObstacleState::Triangle(o) => Obstacle::Triangle(o),
            ObstacleState::Line {
                prio,
                radius,
                start,
                end,
            } => Obstacle::Line(Line {
                prio,
                radius,
                segment: LineSegment::new(start, end),
            }),
            ObstacleState::MovingCircle(o) => Obstacle::MovingCircle(o),
            ObstacleState::MovingLine(o) => Obstacle::MovingLine(o),
            ObstacleState::OpponentRobot(o) => Obstacle::OpponentRobot(o),
            ObstacleState::FriendlyRobot {
                prio,
                radius,
                trajectory,
            } => Obstacle::FriendlyRobot(FriendlyRobot::new(Arc::new(trajectory), radius, prio)),
        }
    }
}
