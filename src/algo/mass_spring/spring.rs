//! Linear springs between point masses.

use nalgebra::{Point3, Vector3};

/// Below this length a spring has no direction and exerts no force.
const MIN_SPRING_LENGTH: f64 = 1e-12;

/// A Hookean spring joining two points.
///
/// The rest length is the distance between the endpoints when the spring is
/// created and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    endpoints: (usize, usize),
    rest_length: f64,
    stiffness: f64,
}

impl Spring {
    /// Create a spring between points `i` and `j` at their current positions.
    ///
    /// # Panics
    ///
    /// Panics if `i == j`.
    pub fn new(i: usize, j: usize, p_i: &Point3<f64>, p_j: &Point3<f64>, stiffness: f64) -> Self {
        assert_ne!(i, j, "a spring needs two distinct endpoints");
        Self {
            endpoints: (i, j),
            rest_length: (p_i - p_j).norm(),
            stiffness,
        }
    }

    /// The two point ids.
    #[inline]
    pub fn endpoints(&self) -> (usize, usize) {
        self.endpoints
    }

    /// Length at which the spring exerts no force.
    #[inline]
    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    /// Stiffness factor.
    #[inline]
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Change the stiffness factor.
    pub fn set_stiffness(&mut self, stiffness: f64) {
        self.stiffness = stiffness;
    }

    /// Force exerted on the first endpoint; the second receives the negation.
    ///
    /// A stretched spring pulls `p_i` toward `p_j`.
    pub fn force(&self, p_i: &Point3<f64>, p_j: &Point3<f64>) -> Vector3<f64> {
        let d = p_j - p_i;
        let length = d.norm();
        if length < MIN_SPRING_LENGTH {
            return Vector3::zeros();
        }
        d * (self.stiffness * (length - self.rest_length) / length)
    }
}
