//! A triangle mesh prepared for deformation.

use nalgebra::Point3;

use crate::algo::arap::{ArapOptions, ArapSolver};
use crate::algo::fem::{FemOptions, FemSolver};
use crate::algo::mass_spring::{MassSpringOptions, MassSpringSystem};
use crate::error::{DeformError, Result};

use super::adjacency::Adjacency;
use super::constraint::{Constraint, ConstraintSet};

/// Vertices, triangles, their edge adjacency and the active constraints.
///
/// The mesh is the hand-off point to the solvers: each `build_*` method takes
/// a snapshot of the current positions and constraints, and the matching
/// `read_*` method copies a solver's result back.
///
/// # Example
///
/// ```
/// use flexure::algo::mass_spring::MassSpringOptions;
/// use flexure::mesh::{Constraint, ConstraintSet, DeformableMesh};
/// use nalgebra::Point3;
///
/// let mut mesh = DeformableMesh::grid(2.0, 5).unwrap();
/// let corners = mesh.corner_ids().to_vec();
/// let handle = Constraint::new(12, Point3::new(0.0, 0.0, 1.0));
/// mesh.set_constraints(ConstraintSet::new(corners, vec![handle])).unwrap();
///
/// let mut system = mesh.build_mass_spring(&MassSpringOptions::default()).unwrap();
/// for _ in 0..10 {
///     system.iterate(0.01).unwrap();
/// }
/// mesh.read_mass_spring(&system).unwrap();
/// assert!(mesh.vertices()[12].z > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct DeformableMesh {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
    adjacency: Adjacency,
    constraints: ConstraintSet,
    corners: Vec<usize>,
}

impl DeformableMesh {
    /// Create a mesh from a vertex list and a triangle list.
    ///
    /// # Errors
    ///
    /// - [`DeformError::EmptyMesh`] if either list is empty
    /// - [`DeformError::InvalidVertexIndex`] if a triangle references a missing vertex
    /// - [`DeformError::DegenerateFace`] if a triangle repeats a vertex
    pub fn from_triangles(vertices: Vec<Point3<f64>>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        if vertices.is_empty() || triangles.is_empty() {
            return Err(DeformError::EmptyMesh);
        }
        let adjacency = Adjacency::from_triangles(vertices.len(), &triangles)?;

        Ok(Self {
            vertices,
            triangles,
            adjacency,
            constraints: ConstraintSet::default(),
            corners: Vec::new(),
        })
    }

    /// Square grid of `vertices_per_side²` vertices in the `z = 0` plane,
    /// centered on the origin.
    ///
    /// Vertex `r * vertices_per_side + c` sits in row `r`, column `c`. Each
    /// cell is split along its `v00`-`v11` diagonal into `(v00, v10, v11)` and
    /// `(v11, v01, v00)`.
    pub fn grid(side_length: f64, vertices_per_side: usize) -> Result<Self> {
        if !(side_length > 0.0 && side_length.is_finite()) {
            return Err(DeformError::invalid_param("side_length", side_length, "must be positive"));
        }
        if vertices_per_side < 2 {
            return Err(DeformError::invalid_param(
                "vertices_per_side",
                vertices_per_side,
                "must be at least 2",
            ));
        }

        let n = vertices_per_side;
        let spacing = side_length / (n - 1) as f64;
        let half = 0.5 * side_length;

        let vertices = (0..n)
            .flat_map(|r| (0..n).map(move |c| Point3::new(c as f64 * spacing - half, r as f64 * spacing - half, 0.0)))
            .collect();

        let mut triangles = Vec::with_capacity(2 * (n - 1) * (n - 1));
        for r in 0..n - 1 {
            for c in 0..n - 1 {
                let v00 = r * n + c;
                let v10 = v00 + 1;
                let v01 = v00 + n;
                let v11 = v01 + 1;
                triangles.push([v00, v10, v11]);
                triangles.push([v11, v01, v00]);
            }
        }

        let mut mesh = Self::from_triangles(vertices, triangles)?;
        mesh.corners = vec![0, n - 1, n * (n - 1), n * n - 1];
        log::debug!(
            "grid {}x{}: {} vertices, {} triangles",
            n,
            n,
            mesh.num_vertices(),
            mesh.num_triangles()
        );
        Ok(mesh)
    }

    /// Vertex positions.
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Triangles as vertex id triples.
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Edge adjacency.
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Active constraints.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// The four corner ids of a grid mesh; empty for other meshes.
    pub fn corner_ids(&self) -> &[usize] {
        &self.corners
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Number of edges incident to `vertex`.
    pub fn vertex_degree(&self, vertex: usize) -> usize {
        self.adjacency.degree(vertex)
    }

    /// Whether the mesh has no edges.
    pub fn is_adjacency_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Replace the constraint set after validating it against this mesh.
    pub fn set_constraints(&mut self, constraints: ConstraintSet) -> Result<()> {
        constraints.validate(self.vertices.len())?;
        self.constraints = constraints;
        Ok(())
    }

    /// One point per vertex, one spring per edge, constraints carried over.
    pub fn build_mass_spring(&self, options: &MassSpringOptions) -> Result<MassSpringSystem> {
        let mut system = MassSpringSystem::with_options(options.clone())?;
        for p in &self.vertices {
            system.add_point(*p, options.point_mass, options.point_damping);
        }
        for (i, j) in self.adjacency.edges() {
            system.add_spring(i, j, options.spring_stiffness);
        }
        system.add_constraints(&self.constraints.fixed, &self.constraints.moving)?;

        log::info!(
            "mass-spring system: {} points, {} springs, scheme {}",
            system.num_points(),
            system.num_springs(),
            system.integration_scheme()
        );
        Ok(system)
    }

    /// Copy the point positions of `system` into the mesh.
    pub fn read_mass_spring(&mut self, system: &MassSpringSystem) -> Result<()> {
        if system.num_points() != self.vertices.len() {
            return Err(DeformError::SizeMismatch {
                expected: self.vertices.len(),
                actual: system.num_points(),
            });
        }
        system.copy_positions(&mut self.vertices)
    }

    /// ARAP solver with fixed vertices anchored at their current position.
    pub fn build_arap(&self, options: &ArapOptions) -> Result<ArapSolver> {
        let fixed: Vec<Constraint> = self
            .constraints
            .fixed
            .iter()
            .map(|&v| Constraint::new(v, self.vertices[v]))
            .collect();

        let mut solver = ArapSolver::new(options.clone());
        solver.initialize(&self.vertices, &self.adjacency, &fixed, &self.constraints.moving)?;
        Ok(solver)
    }

    /// Copy the ARAP solution into the mesh.
    pub fn read_arap(&mut self, solver: &ArapSolver) -> Result<()> {
        let mut result = Vec::with_capacity(self.vertices.len());
        solver.get_result(&mut result)?;
        self.replace_vertices(result)
    }

    /// FEM solver over the triangles with the mesh constraints applied.
    pub fn build_fem(&self, options: &FemOptions) -> Result<FemSolver> {
        let mut solver = FemSolver::new(options.clone());
        solver.initialize(&self.vertices, &self.triangles)?;
        solver.add_constraints(&self.constraints.fixed, &self.constraints.moving)?;
        Ok(solver)
    }

    /// Copy the FEM solution into the mesh.
    pub fn read_fem(&mut self, solver: &FemSolver) -> Result<()> {
        let mut result = Vec::with_capacity(self.vertices.len());
        solver.get_result(&mut result)?;
        self.replace_vertices(result)
    }

    fn replace_vertices(&mut self, positions: Vec<Point3<f64>>) -> Result<()> {
        if positions.len() != self.vertices.len() {
            return Err(DeformError::SizeMismatch {
                expected: self.vertices.len(),
                actual: positions.len(),
            });
        }
        self.vertices = positions;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dragged_grid(n: usize) -> DeformableMesh {
        let mut mesh = DeformableMesh::grid(2.0, n).unwrap();
        let center = n * n / 2;
        let corners = mesh.corner_ids().to_vec();
        mesh.set_constraints(ConstraintSet::new(
            corners,
            vec![Constraint::new(center, Point3::new(0.0, 0.0, 1.0))],
        ))
        .unwrap();
        mesh
    }

    #[test]
    fn test_grid_layout() {
        let mesh = DeformableMesh::grid(2.0, 3).unwrap();
        assert_eq!(mesh.num_vertices(), 9);
        assert_eq!(mesh.num_triangles(), 8);
        assert_eq!(mesh.adjacency().num_edges(), 16);
        assert_eq!(mesh.corner_ids(), &[0, 2, 6, 8]);

        assert_relative_eq!(mesh.vertices()[0], Point3::new(-1.0, -1.0, 0.0));
        assert_relative_eq!(mesh.vertices()[4], Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(mesh.vertices()[5], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.triangles()[0], [0, 1, 4]);
        assert_eq!(mesh.triangles()[1], [4, 3, 0]);

        assert_eq!(mesh.vertex_degree(4), 6);
        assert_eq!(mesh.vertex_degree(0), 3);
        assert_eq!(mesh.vertex_degree(2), 2);
        assert!(!mesh.is_adjacency_empty());
    }

    #[test]
    fn test_grid_rejects_bad_parameters() {
        assert!(DeformableMesh::grid(2.0, 1).is_err());
        assert!(DeformableMesh::grid(0.0, 3).is_err());
    }

    #[test]
    fn test_from_triangles_validation() {
        let v = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        assert_eq!(
            DeformableMesh::from_triangles(v.clone(), vec![[0, 1, 3]]).unwrap_err(),
            DeformError::InvalidVertexIndex { face: 0, vertex: 3 }
        );
        assert_eq!(
            DeformableMesh::from_triangles(v.clone(), vec![[0, 1, 1]]).unwrap_err(),
            DeformError::DegenerateFace { face: 0 }
        );
        assert_eq!(
            DeformableMesh::from_triangles(v, Vec::new()).unwrap_err(),
            DeformError::EmptyMesh
        );
    }

    #[test]
    fn test_set_constraints_validates() {
        let mut mesh = DeformableMesh::grid(1.0, 2).unwrap();
        assert!(mesh.set_constraints(ConstraintSet::new(vec![4], Vec::new())).is_err());
        assert!(mesh.constraints().is_empty());
    }

    #[test]
    fn test_build_mass_spring() {
        let mesh = dragged_grid(3);
        let system = mesh.build_mass_spring(&MassSpringOptions::default()).unwrap();

        assert_eq!(system.num_points(), 9);
        assert_eq!(system.num_springs(), 16);
        for &c in mesh.corner_ids() {
            assert!(system.point(c).fixed);
        }
        assert_eq!(system.constraints().moving.len(), 1);
    }

    #[test]
    fn test_mass_spring_round_trip() {
        let mut mesh = dragged_grid(5);
        let before = mesh.vertices().to_vec();
        let mut system = mesh.build_mass_spring(&MassSpringOptions::default()).unwrap();
        for _ in 0..20 {
            system.iterate(0.05).unwrap();
        }
        mesh.read_mass_spring(&system).unwrap();

        assert!(mesh.vertices()[12].z > 0.0);
        for &c in mesh.corner_ids() {
            assert_eq!(mesh.vertices()[c], before[c]);
        }
    }

    #[test]
    fn test_read_rejects_foreign_solvers() {
        let small = dragged_grid(3);
        let large = dragged_grid(5);
        let mut target = small.clone();

        let system = large.build_mass_spring(&MassSpringOptions::default()).unwrap();
        assert_eq!(
            target.read_mass_spring(&system),
            Err(DeformError::SizeMismatch { expected: 9, actual: 25 })
        );

        let arap = large.build_arap(&ArapOptions::default()).unwrap();
        assert_eq!(
            target.read_arap(&arap),
            Err(DeformError::SizeMismatch { expected: 9, actual: 25 })
        );

        let fem = large.build_fem(&FemOptions::default()).unwrap();
        assert_eq!(
            target.read_fem(&fem),
            Err(DeformError::SizeMismatch { expected: 9, actual: 25 })
        );

        assert_eq!(target.vertices(), small.vertices());
    }

    #[test]
    fn test_arap_and_fem_round_trip_at_rest() {
        let mut mesh = dragged_grid(3);
        let rest = mesh.vertices().to_vec();

        let arap = mesh.build_arap(&ArapOptions::default()).unwrap();
        mesh.read_arap(&arap).unwrap();
        for (a, b) in mesh.vertices().iter().zip(&rest) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }

        let fem = mesh.build_fem(&FemOptions::default()).unwrap();
        mesh.read_fem(&fem).unwrap();
        for (a, b) in mesh.vertices().iter().zip(&rest) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_build_arap_without_anchors_fails() {
        let mesh = DeformableMesh::grid(2.0, 3).unwrap();
        assert_eq!(
            mesh.build_arap(&ArapOptions::default()).unwrap_err(),
            DeformError::MissingAnchors
        );
    }
}
