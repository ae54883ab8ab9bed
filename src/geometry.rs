// src/geometry.rs
//! Kinematic primitives shared by the whole planner: 2-D vectors,
//! line segments and axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// A 2-D vector of 32-bit floats. Used for positions, velocities and
/// accelerations alike.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn distance(self, other: Vector) -> f32 {
        (self - other).length()
    }

    #[inline]
    pub fn distance_squared(self, other: Vector) -> f32 {
        (self - other).length_squared()
    }

    #[inline]
    pub fn dot(self, other: Vector) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Rotated by 90 degrees clockwise.
    #[inline]
    pub fn perpendicular(self) -> Vector {
        Vector::new(self.y, -self.x)
    }

    /// Returns a vector of length one pointing in the same direction, or the
    /// zero vector if this vector has length zero.
    pub fn normalized(self) -> Vector {
        let len = self.length();
        if len > 0.0 { self / len } else { Vector::ZERO }
    }

    /// Angle of the vector, measured from the positive y axis. This matches
    /// the convention of the alpha angle that splits acceleration between the
    /// axes: alpha 0 accelerates along +y only.
    #[inline]
    pub fn angle(self) -> f32 {
        self.x.atan2(self.y)
    }

    /// Twice the signed area of the triangle `(a, b, c)`. Positive when the
    /// corners are ordered counter-clockwise.
    #[inline]
    pub fn det(a: Vector, b: Vector, c: Vector) -> f32 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector {
    type Output = Vector;
    #[inline]
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;
    #[inline]
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector {
    type Output = Vector;
    #[inline]
    fn mul(self, rhs: f32) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vector {
    type Output = Vector;
    #[inline]
    fn div(self, rhs: f32) -> Vector {
        Vector::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;
    #[inline]
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

impl AddAssign for Vector {
    #[inline]
    fn add_assign(&mut self, rhs: Vector) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vector {
    #[inline]
    fn sub_assign(&mut self, rhs: Vector) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

/// A two-dimensional line segment with precomputed direction and normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    start: Vector,
    end: Vector,
    dir: Vector,
    normal: Vector,
}

impl LineSegment {
    /// The segment must not be degenerate, `start != end`.
    pub fn new(start: Vector, end: Vector) -> Self {
        debug_assert!(start != end);
        let dir = (end - start).normalized();
        let normal = dir.perpendicular() * -1.0;
        Self {
            start,
            end,
            dir,
            normal,
        }
    }

    #[inline]
    pub fn start(&self) -> Vector {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Vector {
        self.end
    }

    /// Distance of `pos` to the segment.
    pub fn distance(&self, pos: Vector) -> f32 {
        let d = pos - self.start;
        if d.dot(self.dir) < 0.0 {
            return d.length();
        }
        let d = pos - self.end;
        if d.dot(self.dir) > 0.0 {
            return d.length();
        }
        d.dot(self.normal).abs()
    }

    pub fn distance_squared(&self, pos: Vector) -> f32 {
        let d = pos - self.start;
        if d.dot(self.dir) < 0.0 {
            return d.length_squared();
        }
        let d = pos - self.end;
        if d.dot(self.dir) > 0.0 {
            return d.length_squared();
        }
        let n = d.dot(self.normal);
        n * n
    }

    /// Distance between two segments, zero if they intersect.
    pub fn segment_distance(&self, other: &LineSegment) -> f32 {
        let mut d = f32::INFINITY;
        d = d.min(self.distance(other.start));
        d = d.min(self.distance(other.end));
        d = d.min(other.distance(self.start));
        d = d.min(other.distance(self.end));

        let diff = other.start - self.start;
        let t1 = other.normal.dot(diff) / other.normal.dot(self.dir);
        let t2 = -self.normal.dot(diff) / self.normal.dot(other.dir);
        if t1 >= 0.0
            && t1 <= self.end.distance(self.start)
            && t2 >= 0.0
            && t2 <= other.end.distance(other.start)
        {
            return 0.0;
        }
        d
    }

    /// The point on the segment closest to `v`.
    pub fn closest_point(&self, v: Vector) -> Vector {
        let dir = self.end - self.start;
        if (v - self.start).dot(dir) <= 0.0 {
            return self.start;
        }
        if (v - self.end).dot(dir) >= 0.0 {
            return self.end;
        }
        self.start + dir * ((v - self.start).dot(dir) / dir.length_squared())
    }

    #[inline]
    pub fn normal(&self) -> Vector {
        self.normal
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// y maximum
    pub top: f32,
    /// y minimum
    pub bottom: f32,
    /// x minimum
    pub left: f32,
    /// x maximum
    pub right: f32,
}

impl BoundingBox {
    /// The two corners may be given in any order.
    pub fn new(a: Vector, b: Vector) -> Self {
        Self {
            top: a.y.max(b.y),
            bottom: a.y.min(b.y),
            left: a.x.min(b.x),
            right: a.x.max(b.x),
        }
    }

    pub fn is_inside(&self, p: Vector) -> bool {
        p.y <= self.top && p.y >= self.bottom && p.x >= self.left && p.x <= self.right
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        let x_dist = (self.left + self.right - other.left - other.right).abs() * 0.5;
        if x_dist > (other.right - other.left + self.right - self.left) * 0.5 {
            return false;
        }
        let y_dist = (self.top + self.bottom - other.top - other.bottom).abs() * 0.5;
        if y_dist > (other.top - other.bottom + self.top - self.bottom) * 0.5 {
            return false;
        }
        true
    }

    pub fn merge_point(&mut self, p: Vector) {
        self.left = self.left.min(p.x);
        self.right = self.right.max(p.x);
        self.bottom = self.bottom.min(p.y);
        self.top = self.top.max(p.y);
    }

    pub fn add_extra_radius(&mut self, radius: f32) {
        self.left -= radius;
        self.right += radius;
        self.bottom -= radius;
        self.top += radius;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_basics() {
        let v = Vector::new(3.0, 4.0);
        assert_eq!(v.length(), 5.0);
        assert_eq!(v.length_squared(), 25.0);
        assert_eq!(v.dot(Vector::new(1.0, 1.0)), 7.0);
        assert_eq!(v.perpendicular().dot(v), 0.0);
        let n = v.normalized();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn vector_angle_is_measured_from_y_axis() {
        assert!((Vector::new(0.0, 1.0).angle()).abs() < 1e-6);
        assert!((Vector::new(1.0, 0.0).angle() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn det_sign_matches_orientation() {
        let a = Vector::new(0.0, 0.0);
        let b = Vector::new(1.0, 0.0);
        let c = Vector::new(0.0, 1.0);
        assert!(Vector::det(a, b, c) > 0.0);
        assert!(Vector::det(a, c, b) < 0.0);
    }

    #[test]
    fn segment_point_distance() {
        let seg = LineSegment::new(Vector::new(0.0, 0.0), Vector::new(2.0, 0.0));
        assert!((seg.distance(Vector::new(1.0, 1.0)) - 1.0).abs() < 1e-6);
        assert!((seg.distance(Vector::new(-1.0, 0.0)) - 1.0).abs() < 1e-6);
        assert!((seg.distance(Vector::new(3.0, 0.0)) - 1.0).abs() < 1e-6);
        assert_eq!(seg.closest_point(Vector::new(1.0, 3.0)), Vector::new(1.0, 0.0));
        assert_eq!(seg.closest_point(Vector::new(-5.0, 0.0)), Vector::new(0.0, 0.0));
    }

    #[test]
    fn segment_segment_distance() {
        let a = LineSegment::new(Vector::new(0.0, 0.0), Vector::new(2.0, 0.0));
        let b = LineSegment::new(Vector::new(1.0, -1.0), Vector::new(1.0, 1.0));
        assert_eq!(a.segment_distance(&b), 0.0);
        let c = LineSegment::new(Vector::new(0.0, 2.0), Vector::new(2.0, 2.0));
        assert!((a.segment_distance(&c) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn bounding_box_intersection_is_symmetric() {
        let a = BoundingBox::new(Vector::new(0.0, 0.0), Vector::new(2.0, 2.0));
        let b = BoundingBox::new(Vector::new(1.0, 1.0), Vector::new(3.0, 3.0));
        let c = BoundingBox::new(Vector::new(5.0, 5.0), Vector::new(6.0, 6.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(!c.intersects(&a));
    }

    #[test]
    fn bounding_box_merge_and_inflate() {
        let mut b = BoundingBox::new(Vector::new(0.0, 0.0), Vector::new(1.0, 1.0));
        b.merge_point(Vector::new(-1.0, 2.0));
        assert_eq!(b.left, -1.0);
        assert_eq!(b.top, 2.0);
        b.add_extra_radius(0.5);
        assert_eq!(b.right, 1.5);
        assert_eq!(b.bottom, -0.5);
        assert!(b.is_inside(Vector::new(1.4, 2.4)));
        assert!(!b.is_inside(Vector::new(1.6, 0.0)));
    }
}
