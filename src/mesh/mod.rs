//! Mesh-side data shared by the solvers.
//!
//! - [`Adjacency`]: symmetric edge relation over vertex ids
//! - [`Constraint`] / [`ConstraintSet`]: fixed vertices and dragged targets
//! - [`DeformableMesh`]: vertices, triangles, adjacency and constraints in one
//!   place, with builders for every solver
//!
//! # Example
//!
//! ```
//! use flexure::mesh::DeformableMesh;
//!
//! let mesh = DeformableMesh::grid(1.0, 4).unwrap();
//! assert_eq!(mesh.num_vertices(), 16);
//! assert_eq!(mesh.num_triangles(), 18);
//! assert_eq!(mesh.adjacency().num_edges(), 33);
//! ```

mod adjacency;
mod constraint;
mod deformable;

pub use adjacency::Adjacency;
pub use constraint::{Constraint, ConstraintSet};
pub use deformable::DeformableMesh;
