// src/rng.rs
//! Deterministic random number generation for the samplers.
//!
//! Every planner owns one generator, seeded once at construction. Given the
//! same seed and the same inputs the whole search is reproducible, which the
//! replay tooling depends on.

use crate::geometry::Vector;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

/// Small, fast, seedable generator with the narrow interface the samplers
/// actually use.
#[derive(Debug, Clone)]
pub struct PlannerRng {
    inner: SmallRng,
}

impl PlannerRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: SmallRng::seed_from_u64(seed),
        }
    }

    /// Uniformly distributed float in `[min, max)`.
    pub fn uniform_float(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        self.inner.random_range(min..max)
    }

    /// Uniformly distributed unsigned integer over the full 32-bit range.
    pub fn uniform_int(&mut self) -> u32 {
        self.inner.next_u32()
    }

    /// Uniformly distributed vector in the rectangle spanned by `min`/`max`.
    pub fn uniform_vector_in(&mut self, min: Vector, max: Vector) -> Vector {
        Vector::new(
            self.uniform_float(min.x, max.x),
            self.uniform_float(min.y, max.y),
        )
    }
}
