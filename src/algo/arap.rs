//! As-rigid-as-possible (ARAP) surface deformation.
//!
//! The solver minimizes the rigidity energy
//!
//! ```text
//! E = Σ_i Σ_{j ∈ N(i)} w ‖(x_i − x_j) − R_i (p_i − p_j)‖²
//! ```
//!
//! over deformed positions `x` and per-vertex rotations `R`, with a penalty
//! pulling anchored vertices toward their targets. It alternates a local step
//! (closed-form best-fit rotation per vertex) with a global step (one sparse
//! linear solve against a Laplacian factored once at initialization).
//!
//! # Example
//!
//! ```
//! use flexure::algo::arap::{ArapOptions, ArapSolver};
//! use flexure::mesh::{Constraint, DeformableMesh};
//!
//! let mesh = DeformableMesh::grid(2.0, 3).unwrap();
//! let corners: Vec<Constraint> = [0, 2, 6, 8]
//!     .iter()
//!     .map(|&v| Constraint::new(v, mesh.vertices()[v]))
//!     .collect();
//!
//! let mut solver = ArapSolver::new(ArapOptions::default());
//! solver.initialize(mesh.vertices(), mesh.adjacency(), &corners, &[]).unwrap();
//! let report = solver.solve(1e-9).unwrap();
//! assert!(report.energy < 1e-12);
//! ```
//!
//! # References
//!
//! - Sorkine, O., & Alexa, M. (2007). "As-Rigid-As-Possible Surface Modeling."
//!   Symposium on Geometry Processing.

use std::fmt;

use nalgebra::{DMatrix, Matrix3, Point3, Vector3};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::error::{DeformError, Result};
use crate::mesh::{Adjacency, Constraint, ConstraintSet};

/// Options for the ARAP solver.
#[derive(Debug, Clone, PartialEq)]
pub struct ArapOptions {
    /// Uniform weight of every mesh edge.
    pub edge_weight: f64,

    /// Penalty weight pulling anchored vertices to their targets.
    pub anchor_weight: f64,

    /// Largest distance a moving anchor travels toward its goal per solve.
    pub max_anchor_step: f64,

    /// Cap on local/global iterations per solve.
    pub max_iterations: usize,
}

impl Default for ArapOptions {
    fn default() -> Self {
        Self {
            edge_weight: 1.0,
            anchor_weight: 100.0,
            max_anchor_step: 0.01,
            max_iterations: 100,
        }
    }
}

impl ArapOptions {
    /// Set the edge weight.
    pub fn with_edge_weight(mut self, weight: f64) -> Self {
        self.edge_weight = weight;
        self
    }

    /// Set the anchor penalty weight.
    pub fn with_anchor_weight(mut self, weight: f64) -> Self {
        self.anchor_weight = weight;
        self
    }

    /// Set the per-solve anchor step.
    pub fn with_max_anchor_step(mut self, step: f64) -> Self {
        self.max_anchor_step = step;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Reject values that cannot produce a positive definite system.
    pub fn validate(&self) -> Result<()> {
        if !(self.edge_weight > 0.0) {
            return Err(DeformError::invalid_param("edge_weight", self.edge_weight, "must be positive"));
        }
        if !(self.anchor_weight > 0.0) {
            return Err(DeformError::invalid_param(
                "anchor_weight",
                self.anchor_weight,
                "must be positive",
            ));
        }
        if !(self.max_anchor_step >= 0.0) {
            return Err(DeformError::invalid_param(
                "max_anchor_step",
                self.max_anchor_step,
                "must be non-negative",
            ));
        }
        if self.max_iterations == 0 {
            return Err(DeformError::invalid_param("max_iterations", 0, "must be at least 1"));
        }
        Ok(())
    }
}

/// Lifecycle of an [`ArapSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArapState {
    /// No valid factorization; every solve call is rejected.
    Uninitialized,
    /// The Laplacian is factored but no solution has been computed.
    Factored,
    /// A solution is available.
    Solved,
}

/// Summary of one [`ArapSolver::solve`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArapReport {
    /// Local/global iterations performed.
    pub iterations: usize,
    /// Rigidity energy after the last iteration.
    pub energy: f64,
    /// Whether the energy change dropped below the tolerance.
    pub converged: bool,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    vertex: usize,
    /// Where the penalty currently pulls.
    position: Point3<f64>,
    /// Where `position` is heading.
    goal: Point3<f64>,
    /// Fixed anchors hold their target; only moving anchors accept new goals.
    fixed: bool,
}

/// ARAP deformation solver.
///
/// Build with [`ArapSolver::new`], then [`ArapSolver::initialize`] with a
/// mesh snapshot. The factorization is reused by every subsequent solve; a
/// topology or anchor-set change requires a new `initialize`.
pub struct ArapSolver {
    options: ArapOptions,
    state: ArapState,
    rest: Vec<Point3<f64>>,
    adjacency: Adjacency,
    anchors: Vec<Anchor>,
    factor: Option<CscCholesky<f64>>,
    rotations: Vec<Matrix3<f64>>,
    /// Current solution, one row per vertex.
    x: DMatrix<f64>,
}

impl fmt::Debug for ArapSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArapSolver")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("num_vertices", &self.rest.len())
            .field("num_anchors", &self.anchors.len())
            .finish_non_exhaustive()
    }
}

impl Default for ArapSolver {
    fn default() -> Self {
        Self::new(ArapOptions::default())
    }
}

impl ArapSolver {
    /// Create an uninitialized solver.
    pub fn new(options: ArapOptions) -> Self {
        Self {
            options,
            state: ArapState::Uninitialized,
            rest: Vec::new(),
            adjacency: Adjacency::default(),
            anchors: Vec::new(),
            factor: None,
            rotations: Vec::new(),
            x: DMatrix::zeros(0, 3),
        }
    }

    /// The solver options.
    pub fn options(&self) -> &ArapOptions {
        &self.options
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> ArapState {
        self.state
    }

    /// Whether solve calls will be accepted.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.state != ArapState::Uninitialized
    }

    /// Number of vertices in the snapshot.
    pub fn num_vertices(&self) -> usize {
        self.rest.len()
    }

    /// Per-vertex rotation estimates.
    pub fn rotations(&self) -> &[Matrix3<f64>] {
        &self.rotations
    }

    /// Current anchor targets (moving anchors report their intermediate position).
    pub fn anchors(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.anchors.iter().map(|a| Constraint::new(a.vertex, a.position))
    }

    /// Take a snapshot of the mesh, factor the Laplacian and compute the
    /// initial guess.
    ///
    /// Fixed anchors pull toward their given target from the first solve.
    /// Moving anchors (`constraints`) start at the rest position of their
    /// vertex and advance toward the target by at most
    /// [`ArapOptions::max_anchor_step`] per [`ArapSolver::solve`].
    ///
    /// On error the solver is left [`ArapState::Uninitialized`].
    pub fn initialize(
        &mut self,
        vertices: &[Point3<f64>],
        adjacency: &Adjacency,
        fixed_anchors: &[Constraint],
        constraints: &[Constraint],
    ) -> Result<()> {
        self.state = ArapState::Uninitialized;
        self.factor = None;

        self.options.validate()?;
        if vertices.is_empty() {
            return Err(DeformError::EmptyMesh);
        }
        if adjacency.num_vertices() != vertices.len() {
            return Err(DeformError::SizeMismatch {
                expected: vertices.len(),
                actual: adjacency.num_vertices(),
            });
        }

        let all: Vec<Constraint> = fixed_anchors.iter().chain(constraints).copied().collect();
        ConstraintSet::new(Vec::new(), all).validate(vertices.len())?;

        let n = vertices.len();
        self.rest = vertices.to_vec();
        self.adjacency = adjacency.clone();
        self.anchors = fixed_anchors
            .iter()
            .map(|c| Anchor {
                vertex: c.vertex,
                position: c.target,
                goal: c.target,
                fixed: true,
            })
            .chain(constraints.iter().map(|c| Anchor {
                vertex: c.vertex,
                position: vertices[c.vertex],
                goal: c.target,
                fixed: false,
            }))
            .collect();
        self.rotations = vec![Matrix3::identity(); n];
        self.x = DMatrix::zeros(n, 3);

        self.build_laplacian()?;
        self.initial_guess()?;

        log::info!(
            "ARAP initialized: {} vertices, {} edges, {} anchors",
            n,
            self.adjacency.num_edges(),
            self.anchors.len()
        );
        Ok(())
    }

    /// Assemble and factor `L`: `-w` per neighbor, `w * deg(i)` plus the
    /// anchor weight on the diagonal.
    pub fn build_laplacian(&mut self) -> Result<()> {
        self.state = ArapState::Uninitialized;
        self.factor = None;

        if self.anchors.is_empty() {
            return Err(DeformError::MissingAnchors);
        }

        let n = self.rest.len();
        let w = self.options.edge_weight;
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            let neighbors = self.adjacency.neighbors(i);
            for &j in neighbors {
                coo.push(i, j, -w);
            }
            coo.push(i, i, w * neighbors.len() as f64);
        }
        for anchor in &self.anchors {
            coo.push(anchor.vertex, anchor.vertex, self.options.anchor_weight);
        }

        let laplacian = CscMatrix::from(&coo);
        let factor = CscCholesky::factor(&laplacian).map_err(|err| {
            log::warn!("ARAP Laplacian factorization failed: {err:?}");
            DeformError::FactorizationFailed { dimension: n }
        })?;

        log::debug!("ARAP Laplacian factored: {}x{}, {} nonzeros", n, n, laplacian.nnz());
        self.factor = Some(factor);
        self.state = ArapState::Factored;
        Ok(())
    }

    /// Solve `L X = B₀` where `B₀` holds the umbrella vectors of the rest
    /// shape plus the anchor pulls.
    pub fn initial_guess(&mut self) -> Result<()> {
        self.ensure_factored()?;

        let w = self.options.edge_weight;
        let mut b = DMatrix::zeros(self.rest.len(), 3);
        for (i, p_i) in self.rest.iter().enumerate() {
            let umbrella = self
                .adjacency
                .neighbors(i)
                .iter()
                .fold(Vector3::zeros(), |acc, &j| acc + w * (p_i - self.rest[j]));
            add_to_row(&mut b, i, &umbrella);
        }
        self.add_anchor_terms(&mut b);

        self.x = self.solve_system(&b)?;
        self.state = ArapState::Solved;
        Ok(())
    }

    /// Fit the best rotation between each vertex's rest and current
    /// neighborhood.
    pub fn local_step(&mut self) -> Result<()> {
        self.ensure_factored()?;

        let w = self.options.edge_weight;
        for i in 0..self.rest.len() {
            let x_i = row(&self.x, i);
            let mut j_mat = Matrix3::zeros();
            for &j in self.adjacency.neighbors(i) {
                let e_rest = self.rest[i] - self.rest[j];
                let e_cur = x_i - row(&self.x, j);
                j_mat += w * e_rest * e_cur.transpose();
            }
            if let Some(r) = extract_rotation(&j_mat) {
                self.rotations[i] = r;
            }
        }
        Ok(())
    }

    /// Solve for positions given the current rotations, reusing the
    /// factorization.
    pub fn global_step(&mut self) -> Result<()> {
        self.ensure_factored()?;

        let w = self.options.edge_weight;
        let mut b = DMatrix::zeros(self.rest.len(), 3);
        for i in 0..self.rest.len() {
            let r_i = &self.rotations[i];
            let rhs = self.adjacency.neighbors(i).iter().fold(Vector3::zeros(), |acc, &j| {
                acc + 0.5 * w * (r_i + self.rotations[j]) * (self.rest[i] - self.rest[j])
            });
            add_to_row(&mut b, i, &rhs);
        }
        self.add_anchor_terms(&mut b);

        self.x = self.solve_system(&b)?;
        self.state = ArapState::Solved;
        Ok(())
    }

    /// Rigidity energy of the current solution under the current rotations.
    pub fn energy(&self) -> f64 {
        let w = self.options.edge_weight;
        (0..self.rest.len())
            .map(|i| {
                let x_i = row(&self.x, i);
                self.adjacency
                    .neighbors(i)
                    .iter()
                    .map(|&j| {
                        let deviation =
                            (x_i - row(&self.x, j)) - self.rotations[i] * (self.rest[i] - self.rest[j]);
                        w * deviation.norm_squared()
                    })
                    .sum::<f64>()
            })
            .sum()
    }

    /// Move every anchor toward its goal by at most `max_anchor_step`.
    pub fn update_anchors(&mut self) {
        let max_step = self.options.max_anchor_step;
        for anchor in &mut self.anchors {
            let delta = anchor.goal - anchor.position;
            let distance = delta.norm();
            if distance > 0.0 {
                anchor.position += delta * (max_step.min(distance) / distance);
            }
        }
    }

    /// Redirect the moving anchor on `vertex` toward a new goal.
    ///
    /// The factorization is unaffected; the anchor travels from wherever it
    /// currently is. Fixed anchors keep their target and are rejected like
    /// vertices that carry no anchor at all.
    pub fn set_anchor_goal(&mut self, vertex: usize, goal: Point3<f64>) -> Result<()> {
        let count = self.rest.len();
        if vertex >= count {
            return Err(DeformError::VertexOutOfRange { vertex, count });
        }
        let anchor = self
            .anchors
            .iter_mut()
            .find(|a| a.vertex == vertex && !a.fixed)
            .ok_or_else(|| DeformError::invalid_param("vertex", vertex, "is not a moving anchor"))?;
        anchor.goal = goal;
        Ok(())
    }

    /// Advance the anchors one step, then alternate local and global steps
    /// until the energy changes by less than `eps`.
    pub fn solve(&mut self, eps: f64) -> Result<ArapReport> {
        self.ensure_factored()?;

        self.update_anchors();

        let mut energy = self.energy();
        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.options.max_iterations {
            self.local_step()?;
            self.global_step()?;
            iterations += 1;

            let next = self.energy();
            let change = (next - energy).abs();
            energy = next;
            if change < eps {
                converged = true;
                break;
            }
        }

        if !converged {
            log::warn!(
                "ARAP did not converge in {} iterations (energy {:.3e})",
                iterations,
                energy
            );
        }
        log::debug!("ARAP solve: {} iterations, energy {:.3e}", iterations, energy);

        Ok(ArapReport {
            iterations,
            energy,
            converged,
        })
    }

    /// Overwrite `out` with the current solution.
    pub fn get_result(&self, out: &mut Vec<Point3<f64>>) -> Result<()> {
        if self.state != ArapState::Solved {
            return Err(DeformError::NotInitialized);
        }
        out.clear();
        out.extend((0..self.x.nrows()).map(|i| Point3::from(row(&self.x, i))));
        Ok(())
    }

    fn ensure_factored(&self) -> Result<()> {
        if self.factor.is_none() || self.state == ArapState::Uninitialized {
            return Err(DeformError::NotInitialized);
        }
        Ok(())
    }

    fn add_anchor_terms(&self, b: &mut DMatrix<f64>) {
        for anchor in &self.anchors {
            add_to_row(b, anchor.vertex, &(self.options.anchor_weight * anchor.position.coords));
        }
    }

    fn solve_system(&self, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let factor = self.factor.as_ref().ok_or(DeformError::NotInitialized)?;
        Ok(factor.solve(b))
    }
}

/// Closest proper rotation to `j` in the Kabsch sense.
///
/// With `J = U Σ Vᵀ` the result is `R = V Uᵀ`. If that is a reflection, the
/// column of `V` belonging to the smallest singular value is negated, so
/// `det R = +1` always.
pub fn extract_rotation(j: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = j.svd(true, true);
    let u = svd.u?;
    let mut v = svd.v_t?.transpose();

    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        let k = svd.singular_values.imin();
        for row in 0..3 {
            v[(row, k)] = -v[(row, k)];
        }
        r = v * u.transpose();
    }
    Some(r)
}

#[inline]
fn row(x: &DMatrix<f64>, i: usize) -> Vector3<f64> {
    Vector3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)])
}

#[inline]
fn add_to_row(b: &mut DMatrix<f64>, i: usize, v: &Vector3<f64>) {
    for c in 0..3 {
        b[(i, c)] += v[c];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::DeformableMesh;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn tetrahedron() -> (Vec<Point3<f64>>, Adjacency) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let triangles = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        let adjacency = Adjacency::from_triangles(4, &triangles).unwrap();
        (vertices, adjacency)
    }

    fn pinned_corners(mesh: &DeformableMesh) -> Vec<Constraint> {
        let n = 3;
        [0, n - 1, n * (n - 1), n * n - 1]
            .iter()
            .map(|&v| Constraint::new(v, mesh.vertices()[v]))
            .collect()
    }

    #[test]
    fn test_initial_guess_reproduces_rest_shape() {
        let mesh = DeformableMesh::grid(2.0, 3).unwrap();
        let mut solver = ArapSolver::default();
        solver
            .initialize(mesh.vertices(), mesh.adjacency(), &pinned_corners(&mesh), &[])
            .unwrap();

        assert_eq!(solver.state(), ArapState::Solved);
        let mut out = Vec::new();
        solver.get_result(&mut out).unwrap();
        assert_eq!(out.len(), mesh.num_vertices());
        for (a, b) in out.iter().zip(mesh.vertices()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_rigid_motion_is_recovered() {
        let (vertices, adjacency) = tetrahedron();
        let q = Rotation3::from_euler_angles(0.3, -0.2, 0.5);
        let t = Vector3::new(0.5, -1.0, 2.0);
        let anchors: Vec<Constraint> = vertices
            .iter()
            .enumerate()
            .map(|(i, p)| Constraint::new(i, q * p + t))
            .collect();

        let mut solver = ArapSolver::default();
        solver.initialize(&vertices, &adjacency, &anchors, &[]).unwrap();
        let report = solver.solve(1e-14).unwrap();

        assert!(report.converged);
        assert!(report.energy < 1e-10, "energy = {}", report.energy);
        for r in solver.rotations() {
            assert_relative_eq!(*r, *q.matrix(), epsilon = 1e-6);
        }

        let mut out = Vec::new();
        solver.get_result(&mut out).unwrap();
        for (x, p) in out.iter().zip(&vertices) {
            assert_relative_eq!(*x, q * p + t, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rigid_motion_of_planar_grid() {
        let mesh = DeformableMesh::grid(2.0, 3).unwrap();
        let q = Rotation3::from_axis_angle(&Vector3::x_axis(), 0.7);
        let anchors: Vec<Constraint> = mesh
            .vertices()
            .iter()
            .enumerate()
            .map(|(i, p)| Constraint::new(i, q * p))
            .collect();

        let mut solver = ArapSolver::default();
        solver
            .initialize(mesh.vertices(), mesh.adjacency(), &anchors, &[])
            .unwrap();
        let report = solver.solve(1e-14).unwrap();

        assert!(report.energy < 1e-10);
        for r in solver.rotations() {
            assert_relative_eq!(*r, *q.matrix(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_extract_rotation_is_proper() {
        let inputs = [
            Matrix3::new(1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, -3.0),
            Matrix3::new(0.2, 1.5, -0.3, 0.7, -0.1, 0.4, -1.2, 0.3, 0.9),
            -Matrix3::identity(),
            Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0),
        ];
        for j in &inputs {
            let r = extract_rotation(j).unwrap();
            assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-10);
            assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_extract_rotation_recovers_rotation() {
        let q = Rotation3::from_euler_angles(-0.4, 0.9, 0.1);
        // J = Σ p (Q p)ᵀ for the unit axes is Qᵀ.
        let j = q.matrix().transpose();
        let r = extract_rotation(&j).unwrap();
        assert_relative_eq!(r, *q.matrix(), epsilon = 1e-10);
    }

    #[test]
    fn test_moving_anchor_advances_by_capped_step() {
        let mesh = DeformableMesh::grid(2.0, 3).unwrap();
        let center = 4;
        let goal = Point3::new(0.0, 0.0, 1.0);
        let mut solver = ArapSolver::new(ArapOptions::default().with_max_anchor_step(0.01));
        solver
            .initialize(
                mesh.vertices(),
                mesh.adjacency(),
                &pinned_corners(&mesh),
                &[Constraint::new(center, goal)],
            )
            .unwrap();

        solver.solve(1e-9).unwrap();
        let anchor = solver.anchors().find(|c| c.vertex == center).unwrap();
        assert_relative_eq!(anchor.target.z, 0.01, epsilon = 1e-12);

        let mut out = Vec::new();
        solver.get_result(&mut out).unwrap();
        assert!(out[center].z > 0.0 && out[center].z <= 0.01 + 1e-9);
    }

    #[test]
    fn test_dragging_reaches_goal() {
        let mesh = DeformableMesh::grid(2.0, 3).unwrap();
        let center = 4;
        let options = ArapOptions::default().with_max_anchor_step(0.05);
        let mut solver = ArapSolver::new(options);
        solver
            .initialize(
                mesh.vertices(),
                mesh.adjacency(),
                &pinned_corners(&mesh),
                &[Constraint::new(center, Point3::new(0.0, 0.0, 1.0))],
            )
            .unwrap();

        for _ in 0..40 {
            solver.solve(1e-9).unwrap();
        }

        let mut out = Vec::new();
        solver.get_result(&mut out).unwrap();
        assert!(out[center].z > 0.8, "center z = {}", out[center].z);
        for v in [0, 2, 6, 8] {
            assert!((out[v] - mesh.vertices()[v]).norm() < 0.05);
        }
    }

    #[test]
    fn test_missing_anchors() {
        let (vertices, adjacency) = tetrahedron();
        let mut solver = ArapSolver::default();
        let err = solver.initialize(&vertices, &adjacency, &[], &[]);

        assert_eq!(err, Err(DeformError::MissingAnchors));
        assert_eq!(solver.state(), ArapState::Uninitialized);
        assert_eq!(solver.solve(1e-6), Err(DeformError::NotInitialized));
    }

    #[test]
    fn test_uninitialized_solver_rejects_calls() {
        let mut solver = ArapSolver::default();
        assert!(!solver.is_valid());
        assert_eq!(solver.solve(1e-6), Err(DeformError::NotInitialized));
        assert_eq!(solver.local_step(), Err(DeformError::NotInitialized));
        assert_eq!(solver.global_step(), Err(DeformError::NotInitialized));

        let mut out = vec![Point3::origin()];
        assert_eq!(solver.get_result(&mut out), Err(DeformError::NotInitialized));
        assert_eq!(out, vec![Point3::origin()]);
    }

    #[test]
    fn test_initialize_validates_input() {
        let (vertices, adjacency) = tetrahedron();
        let mut solver = ArapSolver::default();

        let short = Adjacency::new(3);
        assert_eq!(
            solver.initialize(&vertices, &short, &[Constraint::new(0, vertices[0])], &[]),
            Err(DeformError::SizeMismatch { expected: 4, actual: 3 })
        );

        let twice = [Constraint::new(1, vertices[1])];
        assert_eq!(
            solver.initialize(&vertices, &adjacency, &twice, &twice),
            Err(DeformError::DuplicateAnchor { vertex: 1 })
        );

        assert_eq!(
            solver.initialize(&[], &Adjacency::new(0), &[], &[]),
            Err(DeformError::EmptyMesh)
        );
    }

    #[test]
    fn test_set_anchor_goal_only_redirects_moving_anchors() {
        let (vertices, adjacency) = tetrahedron();
        let mut solver = ArapSolver::default();
        solver
            .initialize(
                &vertices,
                &adjacency,
                &[Constraint::new(0, vertices[0])],
                &[Constraint::new(1, vertices[1])],
            )
            .unwrap();

        assert_eq!(
            solver.set_anchor_goal(9, Point3::origin()),
            Err(DeformError::VertexOutOfRange { vertex: 9, count: 4 })
        );
        assert_eq!(
            solver.set_anchor_goal(3, Point3::origin()),
            Err(DeformError::invalid_param("vertex", 3, "is not a moving anchor"))
        );
        assert_eq!(
            solver.set_anchor_goal(0, Point3::new(5.0, 5.0, 5.0)),
            Err(DeformError::invalid_param("vertex", 0, "is not a moving anchor"))
        );

        let goal = Point3::new(1.0, 0.0, 0.5);
        solver.set_anchor_goal(1, goal).unwrap();
        solver.solve(1e-9).unwrap();

        let fixed = solver.anchors().find(|c| c.vertex == 0).unwrap();
        assert_eq!(fixed.target, vertices[0]);
        let moving = solver.anchors().find(|c| c.vertex == 1).unwrap();
        let expected = vertices[1] + (goal - vertices[1]).normalize() * 0.01;
        assert_relative_eq!(moving.target, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_laplacian_fails_to_factor() {
        let (mut vertices, tetrahedron_adjacency) = tetrahedron();
        let mut solver = ArapSolver::default();
        let anchors = [Constraint::new(0, vertices[0])];
        solver
            .initialize(&vertices, &tetrahedron_adjacency, &anchors, &[])
            .unwrap();
        assert_eq!(solver.state(), ArapState::Solved);

        // A free-floating edge next to the anchored tetrahedron has nothing
        // tying it down, so its block of the Laplacian is singular.
        vertices.push(Point3::new(3.0, 0.0, 0.0));
        vertices.push(Point3::new(4.0, 0.0, 0.0));
        let triangles = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        let mut adjacency = Adjacency::from_triangles(6, &triangles).unwrap();
        adjacency.connect(4, 5);

        assert_eq!(
            solver.initialize(&vertices, &adjacency, &anchors, &[]),
            Err(DeformError::FactorizationFailed { dimension: 6 })
        );
        assert_eq!(solver.state(), ArapState::Uninitialized);
        assert!(!solver.is_valid());
        assert_eq!(solver.solve(1e-6), Err(DeformError::NotInitialized));

        let mut out = Vec::new();
        assert_eq!(solver.get_result(&mut out), Err(DeformError::NotInitialized));
        assert!(out.is_empty());
    }
}
