// tests/planner_scenarios.rs
// End-to-end behaviour of the planner across the situations the control
// stack actually encounters: free paths, detours, unreachable targets,
// escapes and opponent avoidance.

use playmaker::geometry::Vector;
use playmaker::{TrajectoryPlanner, TrajectoryPoint};

const ROBOT_RADIUS: f32 = 0.09;
const OPPONENT_RADIUS: f32 = 0.09;

fn planner_with_field(seed: u64, half_size: f32) -> TrajectoryPlanner {
    let mut planner = TrajectoryPlanner::new(seed);
    planner
        .world_mut()
        .set_boundary(-half_size, -half_size, half_size, half_size);
    planner.world_mut().set_robot_id(1);
    planner.world_mut().set_radius(ROBOT_RADIUS);
    planner.world_mut().set_out_of_field_priority(50);
    planner
}

fn peak_speed(points: &[TrajectoryPoint]) -> (f32, f32) {
    let mut peak = 0.0f32;
    let mut peak_time = 0.0f32;
    for point in points {
        let speed = point.state.speed.length();
        if speed > peak {
            peak = speed;
            peak_time = point.time;
        }
    }
    (peak, peak_time)
}

#[test]
fn straight_line_free() {
    let mut planner = planner_with_field(1, 10.0);
    let points = planner.calculate_trajectory(
        Vector::ZERO,
        Vector::ZERO,
        Vector::new(1.0, 0.0),
        Vector::ZERO,
        2.0,
        3.0,
    );

    assert!(points.len() >= 40);
    assert_eq!(points[0].time, 0.0);

    let end = points.last().unwrap();
    assert!(end.state.pos.distance(Vector::new(1.0, 0.0)) < 0.01, "endpoint {:?}", end.state.pos);

    // time-optimal duration for 1 m with a = 3 is 2 * sqrt(1/3) = 1.155 s,
    // the slow-down tail stretches it a little
    let duration = end.time;
    assert!(duration > 1.0 && duration < 1.45, "duration {duration}");

    // peak speed of the triangular profile is about 1.73 m/s at the midpoint
    let (peak, peak_time) = peak_speed(&points);
    assert!(peak > 1.4 && peak <= 2.0 * std::f32::consts::SQRT_2, "peak {peak}");
    assert!(
        (peak_time - duration / 2.0).abs() < duration * 0.25,
        "peak at {peak_time}, duration {duration}"
    );
}

#[test]
fn wall_detour() {
    let mut planner = planner_with_field(7, 10.0);

    let mut points = Vec::new();
    let mut found = false;
    // the control loop keeps rebuilding the obstacles and replanning; the
    // sampler's cross-tick memory sharpens the result
    for _ in 0..30 {
        planner.world_mut().clear_obstacles();
        planner.world_mut().add_line(0.5, -2.0, 0.5, 0.05, 0.1, 50);
        points = planner.calculate_trajectory(
            Vector::ZERO,
            Vector::ZERO,
            Vector::new(1.0, 0.0),
            Vector::ZERO,
            2.0,
            3.0,
        );
        let end = points.last().unwrap().state.pos;
        if end.distance(Vector::new(1.0, 0.0)) < 0.05 {
            found = true;
            break;
        }
    }
    assert!(found, "no trajectory to the target was found");

    // every sample keeps clear of the inflated wall
    let wall = playmaker::obstacles::Line {
        prio: 50,
        radius: 0.1 + ROBOT_RADIUS,
        segment: playmaker::LineSegment::new(Vector::new(0.5, -2.0), Vector::new(0.5, 0.05)),
    };
    // output samples interleave with the collision-checked ones, allow a
    // hair of sagitta between them
    for point in &points {
        assert!(
            wall.point_distance(point.state.pos) >= -0.005,
            "sample at {:?} is inside the wall",
            point.state.pos
        );
    }
    // the path goes around the upper end of the wall
    let max_y = points.iter().map(|p| p.state.pos.y).fold(f32::MIN, f32::max);
    assert!(max_y > 0.05, "path did not detour, max y {max_y}");
}

#[test]
fn target_inside_circle_is_projected_out() {
    let mut planner = planner_with_field(3, 10.0);
    planner.world_mut().add_circle(2.0, 2.0, 1.0, 50);

    let points = planner.calculate_trajectory(
        Vector::ZERO,
        Vector::ZERO,
        Vector::new(2.0, 2.0),
        Vector::ZERO,
        3.0,
        3.0,
    );

    let center = Vector::new(2.0, 2.0);
    let end = points.last().unwrap().state.pos;
    let end_distance = end.distance(center);
    assert!(
        end_distance >= 1.0 + ROBOT_RADIUS - 0.01 && end_distance <= 1.0 + ROBOT_RADIUS + 0.1,
        "endpoint distance to circle center: {end_distance}"
    );
    // the endpoint sits on the near side of the circle, towards the start
    let to_end = (end - center).normalized();
    let to_start = (Vector::ZERO - center).normalized();
    assert!(to_end.dot(to_start) > 0.9, "endpoint direction {to_end:?}");
}

#[test]
fn stuck_inside_obstacle_escapes_sideways() {
    let mut planner = planner_with_field(11, 10.0);

    let mut points = Vec::new();
    for _ in 0..150 {
        planner.world_mut().clear_obstacles();
        planner.world_mut().add_rect(-8.0, -20.0, 20.0, 20.0, 0.0, 50);
        points = planner.calculate_trajectory(
            Vector::ZERO,
            Vector::ZERO,
            Vector::new(-9.0, 5.0),
            Vector::ZERO,
            3.0,
            3.5,
        );
    }
    // the planner reports which priority it had to breach
    assert!(planner.max_intersecting_obstacle_prio() >= 50);

    let direction = points.last().unwrap().state.pos - Vector::ZERO;
    assert!(direction.x <= -8.0, "escape direction {direction:?}");
    assert!(
        direction.y.abs() <= direction.x.abs() / 10.0,
        "escape is not straight: {direction:?}"
    );
}

#[test]
fn opponent_interception_keeps_clearance() {
    let mut planner = planner_with_field(5, 10.0);

    let opponent_pos = Vector::new(2.0, 0.0);
    let opponent_speed = Vector::new(-1.0, 0.0);

    let mut points = Vec::new();
    for _ in 0..20 {
        planner.world_mut().clear_obstacles();
        planner
            .world_mut()
            .add_opponent_robot(opponent_pos, opponent_speed, 40);
        points = planner.calculate_trajectory(
            Vector::ZERO,
            Vector::ZERO,
            Vector::new(5.0, 0.0),
            Vector::ZERO,
            3.0,
            3.0,
        );
    }

    // within the opponent's prediction horizon every sample keeps at least
    // the combined radii clear of the extrapolated opponent
    for point in &points {
        if point.time > 0.8 {
            break;
        }
        let opponent_at = opponent_pos + opponent_speed * point.time;
        let clearance = point.state.pos.distance(opponent_at);
        assert!(
            clearance >= ROBOT_RADIUS + OPPONENT_RADIUS,
            "clearance {clearance} at t = {}",
            point.time
        );
    }
    // the target is still reached
    let end = points.last().unwrap().state.pos;
    assert!(end.distance(Vector::new(5.0, 0.0)) < 0.1, "endpoint {end:?}");
}

#[test]
fn determinism_same_seed_same_result() {
    let build = || {
        let mut planner = planner_with_field(42, 10.0);
        planner.world_mut().add_circle(1.0, 0.2, 0.4, 42);
        planner.world_mut().add_opponent_robot(
            Vector::new(2.5, -0.5),
            Vector::new(0.0, 0.5),
            30,
        );
        planner
    };
    let mut a = build();
    let mut b = build();

    for _ in 0..5 {
        let pa = a.calculate_trajectory(
            Vector::ZERO,
            Vector::new(0.5, 0.0),
            Vector::new(3.0, 0.5),
            Vector::ZERO,
            3.0,
            3.0,
        );
        let pb = b.calculate_trajectory(
            Vector::ZERO,
            Vector::new(0.5, 0.0),
            Vector::new(3.0, 0.5),
            Vector::ZERO,
            3.0,
            3.0,
        );
        assert_eq!(pa, pb);
    }
}

#[test]
fn planner_uses_a_seed_table_when_available() {
    use playmaker::config::PlannerConfig;
    use playmaker::precomputation::{Precomputation, PrecomputationSegment};
    use playmaker::samplers::StandardSample;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("standardsampler.prec");
    Precomputation::new(vec![PrecomputationSegment {
        min_distance: 0.0,
        max_distance: f32::INFINITY,
        samples: (0..32)
            .map(|i| StandardSample {
                time: 0.2 + (i % 8) as f32 * 0.2,
                angle: i as f32 * 0.2,
                mid_speed: Vector::new(1.5, (i as f32 - 16.0) * 0.1),
            })
            .collect(),
    }])
    .save(&path)
    .unwrap();

    let config = PlannerConfig {
        precomputation_file: Some(path),
        ..PlannerConfig::default()
    };
    let mut planner = TrajectoryPlanner::with_config(13, &config);
    planner.world_mut().set_boundary(-10.0, -10.0, 10.0, 10.0);
    planner.world_mut().set_robot_id(1);
    planner.world_mut().set_radius(ROBOT_RADIUS);
    planner.world_mut().set_out_of_field_priority(50);

    let mut reached = false;
    for _ in 0..50 {
        planner.world_mut().clear_obstacles();
        planner.world_mut().add_line(0.5, -2.0, 0.5, 0.05, 0.1, 50);
        let points = planner.calculate_trajectory(
            Vector::ZERO,
            Vector::ZERO,
            Vector::new(1.0, 0.0),
            Vector::ZERO,
            2.0,
            3.0,
        );
        if points.last().unwrap().state.pos.distance(Vector::new(1.0, 0.0)) < 0.05 {
            reached = true;
            break;
        }
    }
    assert!(reached, "seeded sampler should still solve the detour");
}

#[test]
fn missing_seed_table_degrades_to_live_sampling() {
    use playmaker::config::PlannerConfig;

    // the degradation is logged, not raised
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let config = PlannerConfig {
        precomputation_file: Some("/nonexistent/standardsampler.prec".into()),
        ..PlannerConfig::default()
    };
    let mut planner = TrajectoryPlanner::with_config(9, &config);
    planner.world_mut().set_boundary(-10.0, -10.0, 10.0, 10.0);
    planner.world_mut().set_robot_id(1);
    planner.world_mut().set_radius(ROBOT_RADIUS);
    planner.world_mut().set_out_of_field_priority(50);

    let points = planner.calculate_trajectory(
        Vector::ZERO,
        Vector::ZERO,
        Vector::new(1.0, 1.0),
        Vector::ZERO,
        2.0,
        3.0,
    );
    assert!(points.len() >= 2);
    assert!(
        points.last().unwrap().state.pos.distance(Vector::new(1.0, 1.0)) < 0.01,
        "free path must still be planned"
    );
}

#[test]
fn friendly_trajectory_from_peer_is_avoided() {
    // robot 1 parks right on robot 2's straight line to the target
    let mut first = planner_with_field(21, 10.0);
    let first_points = first.calculate_trajectory(
        Vector::new(1.0, 0.0),
        Vector::ZERO,
        Vector::new(1.0, 0.0),
        Vector::ZERO,
        2.0,
        3.0,
    );
    assert!(first_points.len() >= 2);

    let mut second = planner_with_field(22, 10.0);
    second.world_mut().set_robot_id(2);

    let mut points = Vec::new();
    let mut reached = false;
    for _ in 0..30 {
        second.world_mut().clear_obstacles();
        second
            .world_mut()
            .add_friendly_robot_trajectory(first.current_trajectory(), 40, ROBOT_RADIUS);
        points = second.calculate_trajectory(
            Vector::new(0.0, 0.0),
            Vector::ZERO,
            Vector::new(2.0, 0.0),
            Vector::ZERO,
            2.0,
            3.0,
        );
        if points.last().unwrap().state.pos.distance(Vector::new(2.0, 0.0)) < 0.05 {
            reached = true;
            break;
        }
    }
    assert!(reached, "no path around the parked teammate");

    // the second robot must keep clear of the first one's predicted position
    let buffer = first.current_trajectory();
    let interval = (buffer[1].time - buffer[0].time).max(1e-3);
    for point in &points {
        let index = ((point.time / interval) as usize).min(buffer.len() - 1);
        let peer_pos = buffer[index].state.pos;
        let clearance = point.state.pos.distance(peer_pos);
        assert!(
            clearance >= 2.0 * ROBOT_RADIUS - 0.01,
            "clearance {clearance} at t = {}",
            point.time
        );
    }
}
