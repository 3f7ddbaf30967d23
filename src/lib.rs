//! # Flexure
//!
//! Deformation solvers for triangle meshes under fixed and dragged vertex
//! constraints.
//!
//! Flexure bundles three interchangeable solvers behind a common mesh
//! snapshot, designed for interactive editing where a handle vertex is
//! dragged a little further every frame.
//!
//! ## Features
//!
//! - **Mass-spring system**: one spring per edge, seven time integration
//!   schemes (forward, symplectic and backward Euler, leapfrog, midpoint,
//!   Verlet, RK4)
//! - **ARAP**: as-rigid-as-possible deformation with a Laplacian factored once
//!   and reused by every local/global iteration
//! - **FEM**: planar linear elasticity with Dirichlet elimination and a
//!   conjugate gradient solve
//!
//! ## Quick Start
//!
//! ```
//! use flexure::prelude::*;
//! use nalgebra::Point3;
//!
//! // A 5x5 grid with its corners pinned and the center dragged upward
//! let mut mesh = DeformableMesh::grid(2.0, 5).unwrap();
//! let corners = mesh.corner_ids().to_vec();
//! let handle = Constraint::new(12, Point3::new(0.0, 0.0, 0.5));
//! mesh.set_constraints(ConstraintSet::new(corners, vec![handle])).unwrap();
//!
//! let mut arap = mesh.build_arap(&ArapOptions::default()).unwrap();
//! for _ in 0..5 {
//!     arap.solve(1e-6).unwrap();
//! }
//! mesh.read_arap(&arap).unwrap();
//! assert!(mesh.vertices()[12].z > 0.0);
//! ```
//!
//! ## Choosing a Solver
//!
//! ```
//! use flexure::prelude::*;
//!
//! # let mut mesh = DeformableMesh::grid(1.0, 3).unwrap();
//! # let corners = mesh.corner_ids().to_vec();
//! # mesh.set_constraints(ConstraintSet::new(corners, Vec::new())).unwrap();
//! // Dynamic simulation, advanced by a timestep
//! let options = MassSpringOptions::default().with_scheme(IntegrationScheme::Verlet);
//! let mut springs = mesh.build_mass_spring(&options).unwrap();
//! springs.iterate(0.01).unwrap();
//!
//! // Static elasticity, advanced one editing frame at a time
//! let mut fem = mesh.build_fem(&FemOptions::default()).unwrap();
//! fem.step().unwrap();
//! mesh.read_fem(&fem).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types:
///
/// ```
/// use flexure::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::arap::{ArapOptions, ArapReport, ArapSolver, ArapState};
    pub use crate::algo::fem::{FemOptions, FemReport, FemSolver};
    pub use crate::algo::mass_spring::{
        IntegrationScheme, MassSpringOptions, MassSpringSystem, Point, Spring,
    };
    pub use crate::error::{DeformError, Result};
    pub use crate::mesh::{Adjacency, Constraint, ConstraintSet, DeformableMesh};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_every_solver_leaves_pinned_corners() {
        let mut mesh = DeformableMesh::grid(2.0, 4).unwrap();
        let corners = mesh.corner_ids().to_vec();
        let handle = Constraint::new(5, Point3::new(-0.3, -0.3, 0.4));
        mesh.set_constraints(ConstraintSet::new(corners.clone(), vec![handle]))
            .unwrap();
        let rest = mesh.vertices().to_vec();

        let mut springs = mesh.build_mass_spring(&MassSpringOptions::default()).unwrap();
        let mut arap = mesh.build_arap(&ArapOptions::default()).unwrap();
        let mut fem = mesh.build_fem(&FemOptions::default()).unwrap();
        for _ in 0..10 {
            springs.iterate(0.01).unwrap();
            arap.solve(1e-8).unwrap();
            fem.step().unwrap();
        }

        let mut out = mesh.clone();
        out.read_mass_spring(&springs).unwrap();
        for &c in &corners {
            assert_eq!(out.vertices()[c], rest[c]);
        }

        out.read_fem(&fem).unwrap();
        for &c in &corners {
            assert_eq!(out.vertices()[c], rest[c]);
        }

        // ARAP pins by penalty, so corners only stay close.
        out.read_arap(&arap).unwrap();
        for &c in &corners {
            assert!((out.vertices()[c] - rest[c]).norm() < 1e-2);
        }
    }
}
