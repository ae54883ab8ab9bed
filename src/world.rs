// src/world.rs
//! Per-planner view of the world: the field boundary, the robot's own radius
//! and the obstacle set, rebuilt by the strategy layer every tick.

use crate::geometry::{BoundingBox, LineSegment, Vector};
use crate::obstacles::{
    Circle, FriendlyRobot, Line, MovingCircle, MovingLine, Obstacle, ObstacleShape, ObstacleState,
    OpponentRobot, Rect, Triangle,
};
use crate::profile::Trajectory;
use crate::{RobotState, TrajectoryPoint};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Moving obstacles farther in the future than this are ignored; predictions
/// that far out are not trustworthy.
pub const IGNORE_MOVING_OBSTACLE_THRESHOLD: f32 = 5.0;

/// Number of equispaced samples checked along a candidate trajectory.
const TRAJECTORY_SAMPLES: usize = 40;

#[derive(Debug, Clone, Default)]
pub struct WorldInformation {
    static_obstacles: Vec<Obstacle>,
    moving_obstacles: Vec<Obstacle>,
    // filled by collect_obstacles, aligned with the obstacle vectors
    static_bounds: Vec<BoundingBox>,
    moving_bounds: Vec<BoundingBox>,

    boundary: Option<Rect>,
    radius: f32,
    robot_id: u32,
    out_of_field_priority: i32,
}

impl WorldInformation {
    pub fn new() -> Self {
        Self {
            radius: -1.0,
            out_of_field_priority: 1,
            ..Default::default()
        }
    }

    // basic world parameters

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn is_radius_valid(&self) -> bool {
        self.radius >= 0.0
    }

    pub fn set_boundary(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.boundary = Some(Rect::new(0, 0.0, x1, y1, x2, y2));
    }

    pub fn boundary(&self) -> Option<&Rect> {
        self.boundary.as_ref()
    }

    pub fn set_robot_id(&mut self, id: u32) {
        self.robot_id = id;
    }

    pub fn robot_id(&self) -> u32 {
        self.robot_id
    }

    pub fn set_out_of_field_priority(&mut self, priority: i32) {
        self.out_of_field_priority = priority;
    }

    pub fn out_of_field_priority(&self) -> i32 {
        self.out_of_field_priority
    }

    // obstacle construction

    pub fn clear_obstacles(&mut self) {
        self.static_obstacles.clear();
        self.moving_obstacles.clear();
        self.static_bounds.clear();
        self.moving_bounds.clear();
    }

    pub fn add_circle(&mut self, x: f32, y: f32, radius: f32, prio: i32) {
        self.static_obstacles.push(Obstacle::Circle(Circle {
            prio,
            radius,
            center: Vector::new(x, y),
        }));
    }

    pub fn add_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, prio: i32) {
        self.static_obstacles.push(Obstacle::Line(Line {
            prio,
            radius: width,
            segment: LineSegment::new(Vector::new(x1, y1), Vector::new(x2, y2)),
        }));
    }

    pub fn add_rect(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32, prio: i32) {
        self.static_obstacles
            .push(Obstacle::Rect(Rect::new(prio, radius, x1, y1, x2, y2)));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_triangle(
        &mut self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        x3: f32,
        y3: f32,
        line_width: f32,
        prio: i32,
    ) {
        self.static_obstacles.push(Obstacle::Triangle(Triangle::new(
            prio,
            line_width,
            Vector::new(x1, y1),
            Vector::new(x2, y2),
            Vector::new(x3, y3),
        )));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_moving_circle(
        &mut self,
        start_pos: Vector,
        speed: Vector,
        acc: Vector,
        start_time: f32,
        end_time: f32,
        radius: f32,
        prio: i32,
    ) {
        self.moving_obstacles.push(Obstacle::MovingCircle(MovingCircle {
            prio,
            radius: radius + self.radius,
            start_pos,
            speed,
            acc,
            start_time,
            end_time,
        }));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_moving_line(
        &mut self,
        start_pos1: Vector,
        speed1: Vector,
        acc1: Vector,
        start_pos2: Vector,
        speed2: Vector,
        acc2: Vector,
        start_time: f32,
        end_time: f32,
        width: f32,
        prio: i32,
    ) {
        self.moving_obstacles.push(Obstacle::MovingLine(MovingLine {
            prio,
            radius: width + self.radius,
            start_pos1,
            speed1,
            acc1,
            start_pos2,
            speed2,
            acc2,
            start_time,
            end_time,
        }));
    }

    pub fn add_opponent_robot(&mut self, start_pos: Vector, speed: Vector, prio: i32) {
        self.moving_obstacles.push(Obstacle::OpponentRobot(OpponentRobot::new(
            prio,
            self.radius,
            start_pos,
            speed,
        )));
    }

    /// Registers a peer robot's planned trajectory as an obstacle. The buffer
    /// is shared, not copied. A peer that barely moves collapses to a circle.
    pub fn add_friendly_robot_trajectory(
        &mut self,
        trajectory: &Arc<Vec<TrajectoryPoint>>,
        prio: i32,
        radius: f32,
    ) {
        // the other robot's planner may have failed to find anything
        if trajectory.is_empty() {
            return;
        }
        let first = trajectory[0].state.pos;
        let max_dist_sq = trajectory
            .iter()
            .map(|p| p.state.pos.distance_squared(first))
            .fold(0.0f32, f32::max);
        if max_dist_sq < 0.03 * 0.03 {
            self.add_circle(first.x, first.y, radius + max_dist_sq.sqrt(), prio);
            return;
        }
        self.moving_obstacles.push(Obstacle::FriendlyRobot(FriendlyRobot::new(
            Arc::clone(trajectory),
            radius + self.radius,
            prio,
        )));
    }

    /// Inflates every static obstacle, called once per tick with the robot
    /// radius before the obstacle set is queried.
    pub fn inflate_static_obstacles(&mut self, extra_radius: f32) {
        for obstacle in &mut self.static_obstacles {
            obstacle.add_radius(extra_radius);
        }
    }

    /// Caches the bounding box of every obstacle for the prefilter.
    pub fn collect_obstacles(&mut self) {
        self.static_bounds = self.static_obstacles.iter().map(|o| o.bounding_box()).collect();
        self.moving_bounds = self.moving_obstacles.iter().map(|o| o.bounding_box()).collect();
    }

    pub fn static_obstacles(&self) -> &[Obstacle] {
        &self.static_obstacles
    }

    pub fn moving_obstacles(&self) -> &[Obstacle] {
        &self.moving_obstacles
    }

    // queries

    pub fn point_in_playfield(&self, point: Vector, radius: f32) -> bool {
        let Some(boundary) = &self.boundary else {
            return true;
        };
        !(point.x - radius < boundary.bottom_left.x
            || point.x + radius > boundary.top_right.x
            || point.y - radius < boundary.bottom_left.y
            || point.y + radius > boundary.top_right.y)
    }

    /// Out-of-field counts as an obstacle.
    pub fn is_in_static_obstacle(&self, point: Vector) -> bool {
        if !self.point_in_playfield(point, self.radius) {
            return true;
        }
        let probe = TrajectoryPoint::new(RobotState::new(point, Vector::ZERO), 0.0);
        self.static_obstacles
            .iter()
            .any(|o| o.zoned_distance(&probe, 0.0).is_inside())
    }

    pub fn is_in_moving_obstacle(&self, point: &TrajectoryPoint) -> bool {
        if point.time >= IGNORE_MOVING_OBSTACLE_THRESHOLD {
            return false;
        }
        self.moving_obstacles.iter().any(|o| o.intersects(point))
    }

    /// Samples the trajectory and rejects it if any sample leaves the field
    /// or enters an obstacle. Obstacles whose bounding box does not touch the
    /// trajectory's are skipped.
    pub fn is_trajectory_in_obstacle(&self, trajectory: &Trajectory, t0: f32) -> bool {
        let trajectory_bound = trajectory.calculate_bounding_box();
        let statics: Vec<&Obstacle> = self
            .static_obstacles
            .iter()
            .zip(&self.static_bounds)
            .filter(|(_, bound)| bound.intersects(&trajectory_bound))
            .map(|(o, _)| o)
            .collect();
        let movings: Vec<&Obstacle> = self
            .moving_obstacles
            .iter()
            .zip(&self.moving_bounds)
            .filter(|(_, bound)| bound.intersects(&trajectory_bound))
            .map(|(o, _)| o)
            .collect();

        let total_time = trajectory.end_time();
        for i in 0..TRAJECTORY_SAMPLES {
            let time = total_time * i as f32 / (TRAJECTORY_SAMPLES - 1) as f32;
            let state = trajectory.state_at(time);
            if !self.point_in_playfield(state.pos, self.radius) {
                return true;
            }
            let point = TrajectoryPoint::new(state, time);
            if statics.iter().any(|o| o.intersects(&point)) {
                return true;
            }
            if time + t0 < IGNORE_MOVING_OBSTACLE_THRESHOLD {
                let point = TrajectoryPoint::new(state, time + t0);
                if movings.iter().any(|o| o.intersects(&point)) {
                    return true;
                }
            }
        }
        false
    }

    /// Minimum obstacle distance of a single point in time. Returns early on
    /// the first negative distance.
    pub fn min_obstacle_distance_point(
        &self,
        point: &TrajectoryPoint,
        check_static: bool,
        check_moving: bool,
        near_radius: f32,
    ) -> f32 {
        let mut min_distance = f32::MAX;
        if check_static {
            for obstacle in &self.static_obstacles {
                let d = obstacle.zoned_distance(point, near_radius).value();
                if d <= 0.0 {
                    return d;
                }
                min_distance = min_distance.min(d);
            }
        }
        if check_moving && point.time < IGNORE_MOVING_OBSTACLE_THRESHOLD {
            for obstacle in &self.moving_obstacles {
                let d = obstacle.zoned_distance(point, near_radius).value();
                if d <= 0.0 {
                    return d;
                }
                min_distance = min_distance.min(d);
            }
        }
        min_distance
    }

    /// Minimum obstacle distance along the trajectory and at its endpoint.
    /// Negative values mean a collision (or leaving the field). A trajectory
    /// that ends standing still is additionally checked against moving
    /// obstacles for half a second of standing at the endpoint.
    pub fn min_obstacle_distance(
        &self,
        trajectory: &Trajectory,
        t0: f32,
        near_radius: f32,
    ) -> (f32, f32) {
        let total_time = trajectory.end_time();
        let mut total_min_distance = f32::MAX;
        let mut last_point_distance = 0.0;
        let mut last_state = RobotState::default();

        for i in 0..TRAJECTORY_SAMPLES {
            let time = total_time * i as f32 / TRAJECTORY_SAMPLES as f32;
            let state = trajectory.state_at(time);
            if !self.point_in_playfield(state.pos, self.radius) {
                return (-1.0, -1.0);
            }
            let point = TrajectoryPoint::new(state, time + t0);
            let min_distance = self.min_obstacle_distance_point(&point, true, true, near_radius);
            if min_distance < 0.0 {
                return (min_distance, min_distance);
            }
            if i == TRAJECTORY_SAMPLES - 1 {
                last_point_distance = min_distance;
                last_state = state;
            }
            total_min_distance = total_min_distance.min(min_distance);
        }

        // avoid moving obstacles that pass through the endpoint after arrival
        if trajectory.speed_at(total_time * 2.0) == Vector::ZERO {
            const AFTER_STOP_AVOIDANCE_TIME: f32 = 0.5;
            const AFTER_STOP_INTERVAL: f32 = 0.03;
            if total_time < AFTER_STOP_AVOIDANCE_TIME {
                let steps =
                    ((AFTER_STOP_AVOIDANCE_TIME - total_time) * (1.0 / AFTER_STOP_INTERVAL)) as usize;
                for i in 0..steps {
                    let t = t0 + total_time + i as f32 * AFTER_STOP_INTERVAL;
                    let point = TrajectoryPoint::new(last_state, t);
                    let min_distance =
                        self.min_obstacle_distance_point(&point, false, true, near_radius);
                    if min_distance < 0.0 {
                        return (min_distance, min_distance);
                    }
                    total_min_distance = total_min_distance.min(min_distance);
                }
            }
        }
        (total_min_distance, last_point_distance)
    }

    // persisted snapshots

    pub fn to_state(&self) -> WorldState {
        WorldState {
            obstacles: self
                .static_obstacles
                .iter()
                .chain(&self.moving_obstacles)
                .map(|o| o.to_state())
                .collect(),
            boundary: self
                .boundary
                .as_ref()
                .map(|b| (b.bottom_left.x, b.bottom_left.y, b.top_right.x, b.top_right.y)),
            radius: self.radius,
            robot_id: self.robot_id,
            out_of_field_priority: self.out_of_field_priority,
        }
    }

    /// Rebuilds the obstacle set from a snapshot. Radii are restored as
    /// captured, no robot-radius is re-applied.
    pub fn from_state(state: WorldState) -> Self {
        let mut world = WorldInformation::new();
        world.radius = state.radius;
        world.robot_id = state.robot_id;
        world.out_of_field_priority = state.out_of_field_priority;
        if let Some((x1, y1, x2, y2)) = state.boundary {
            world.set_boundary(x1, y1, x2, y2);
        }
        for obstacle_state in state.obstacles {
            let obstacle = Obstacle::from_state(obstacle_state);
            match obstacle {
                Obstacle::Circle(_)
                | Obstacle::Rect(_)
                | Obstacle::Triangle(_)
                | Obstacle::Line(_) => world.static_obstacles.push(obstacle),
                _ => world.moving_obstacles.push(obstacle),
            }
        }
        world
    }
}

/// Owned serialisable snapshot of a [`WorldInformation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub obstacles: Vec<ObstacleState>,
    pub boundary: Option<(f32, f32, f32, f32)>,
    pub radius: f32,
    pub robot_id: u32,
    pub out_of_field_priority: i32,
}
