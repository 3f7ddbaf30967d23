//! Position constraints.

use std::collections::HashSet;

use nalgebra::Point3;

use crate::error::{DeformError, Result};

/// A vertex pulled toward a target position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    /// The constrained vertex.
    pub vertex: usize,
    /// Where the vertex should end up.
    pub target: Point3<f64>,
}

impl Constraint {
    /// Create a constraint on `vertex` toward `target`.
    pub fn new(vertex: usize, target: Point3<f64>) -> Self {
        Self { vertex, target }
    }
}

/// Fixed vertices plus moving (dragged) constraints.
///
/// Fixed vertices are held at their rest position. Moving constraints carry
/// a target that solvers approach over successive frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    /// Vertices held in place.
    pub fixed: Vec<usize>,
    /// Vertices dragged toward a target.
    pub moving: Vec<Constraint>,
}

impl ConstraintSet {
    /// Create a constraint set.
    pub fn new(fixed: Vec<usize>, moving: Vec<Constraint>) -> Self {
        Self { fixed, moving }
    }

    /// Whether the set has neither fixed nor moving constraints.
    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.moving.is_empty()
    }

    /// Total number of constrained vertices.
    pub fn len(&self) -> usize {
        self.fixed.len() + self.moving.len()
    }

    /// Check that every id is below `num_vertices` and that no vertex appears
    /// twice, whether as fixed or moving.
    pub fn validate(&self, num_vertices: usize) -> Result<()> {
        let ids = self
            .fixed
            .iter()
            .copied()
            .chain(self.moving.iter().map(|c| c.vertex));

        let mut seen = HashSet::with_capacity(self.len());
        for vertex in ids {
            if vertex >= num_vertices {
                return Err(DeformError::VertexOutOfRange {
                    vertex,
                    count: num_vertices,
                });
            }
            if !seen.insert(vertex) {
                return Err(DeformError::DuplicateAnchor { vertex });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ok() {
        let set = ConstraintSet::new(
            vec![0, 3],
            vec![Constraint::new(1, Point3::new(0.0, 0.0, 1.0))],
        );
        assert!(set.validate(4).is_ok());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_validate_out_of_range() {
        let set = ConstraintSet::new(vec![0, 7], Vec::new());
        assert_eq!(
            set.validate(4),
            Err(DeformError::VertexOutOfRange { vertex: 7, count: 4 })
        );
    }

    #[test]
    fn test_validate_fixed_and_moving_overlap() {
        let set = ConstraintSet::new(vec![2], vec![Constraint::new(2, Point3::origin())]);
        assert_eq!(set.validate(4), Err(DeformError::DuplicateAnchor { vertex: 2 }));
    }
}
