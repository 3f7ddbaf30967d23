//! Deformation solvers.
//!
//! - **Mass-spring**: point masses and springs with seven integration schemes
//! - **ARAP**: as-rigid-as-possible surface deformation (local/global)
//! - **FEM**: planar linear elasticity with constant-strain triangles
//!
//! All three consume a snapshot of mesh positions and constraints and hand
//! back new positions; see [`crate::mesh::DeformableMesh`] for the glue.

pub mod arap;
pub mod fem;
pub mod mass_spring;
pub mod sparse;
