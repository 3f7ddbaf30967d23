//! Point masses.

use nalgebra::{Point3, Vector3};

/// A point mass with its dynamic state.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Current position.
    pub position: Point3<f64>,
    /// Current velocity.
    pub velocity: Vector3<f64>,
    /// Force accumulator, cleared at the start of every force evaluation.
    pub force: Vector3<f64>,
    /// Mass (strictly positive).
    pub mass: f64,
    /// Linear damping coefficient (non-negative).
    pub damping: f64,
    /// Fixed points are never moved by an integrator.
    pub fixed: bool,
}

impl Point {
    /// Create a free point at rest.
    pub fn new(position: Point3<f64>, mass: f64, damping: f64) -> Self {
        debug_assert!(mass > 0.0, "point mass must be positive, got {}", mass);
        Self {
            position,
            velocity: Vector3::zeros(),
            force: Vector3::zeros(),
            mass,
            damping,
            fixed: false,
        }
    }

    /// Acceleration from the accumulated force and the current velocity.
    #[inline]
    pub fn acceleration(&self) -> Vector3<f64> {
        (self.force - self.damping * self.velocity) / self.mass
    }

    /// Add to the force accumulator.
    #[inline]
    pub fn add_force(&mut self, force: &Vector3<f64>) {
        self.force += force;
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(Point3::origin(), 1.0, 0.0)
    }
}
