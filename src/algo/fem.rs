//! Linear-elasticity finite elements on a planar triangle mesh.
//!
//! Each triangle is a constant-strain element with two displacement degrees
//! of freedom per node (`u_x`, `u_y`). The global stiffness matrix `K`
//! (`2n x 2n`) is assembled once per mesh; fixed vertices are removed by
//! Dirichlet elimination and the reduced system `K U = F` is solved with
//! conjugate gradient.
//!
//! Only the `x` and `y` coordinates take part in the computation; `z` is
//! carried through unchanged.
//!
//! # Continuous editing
//!
//! Displacements are incremental. [`FemSolver::update_boundary_conditions`]
//! folds the last displacement into the reference positions before building
//! the next load, so repeated [`FemSolver::step`] calls walk moving
//! constraints toward their targets.
//!
//! # Example
//!
//! ```
//! use flexure::algo::fem::{FemOptions, FemSolver};
//! use nalgebra::{Point3, Vector2};
//!
//! let vertices = [
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mut fem = FemSolver::new(FemOptions::default());
//! fem.initialize(&vertices, &[[0, 1, 2]]).unwrap();
//! fem.add_constraints(&[0, 1], &[]).unwrap();
//! fem.apply_force(2, Vector2::new(0.0, 1.0)).unwrap();
//! fem.solve().unwrap();
//!
//! let mut out = Vec::new();
//! fem.get_result(&mut out).unwrap();
//! assert!(out[2].y > 1.0);
//! ```

use nalgebra::{DVector, Matrix3, Point3, SMatrix, Vector2};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{DeformError, Result};
use crate::mesh::{Constraint, ConstraintSet};

use super::sparse::{conjugate_gradient, select};

/// Strain-displacement matrix of one element.
pub type StrainDisplacement = SMatrix<f64, 3, 6>;

/// Stiffness matrix of one element.
pub type ElementStiffness = SMatrix<f64, 6, 6>;

/// Triangles whose doubled area falls below this are rejected.
const DEGENERATE_DET: f64 = 1e-12;

/// Options for the FEM solver.
#[derive(Debug, Clone, PartialEq)]
pub struct FemOptions {
    /// Lamé's second parameter (shear modulus).
    pub mu: f64,

    /// Lamé's first parameter.
    pub lambda: f64,

    /// Iteration cap for conjugate gradient.
    pub max_cg_iterations: usize,

    /// Relative residual at which conjugate gradient stops.
    pub cg_tolerance: f64,

    /// Scale of the pseudo-force `k * (target - reference)` of moving constraints.
    pub constraint_stiffness: f64,

    /// Upper bound on the magnitude of a constraint pseudo-force.
    pub max_constraint_force: f64,
}

impl Default for FemOptions {
    fn default() -> Self {
        Self {
            mu: 10.5,
            lambda: 0.5,
            max_cg_iterations: 1000,
            cg_tolerance: 1e-8,
            constraint_stiffness: 1.0,
            max_constraint_force: f64::INFINITY,
        }
    }
}

impl FemOptions {
    /// Set the Lamé parameters.
    pub fn with_lame(mut self, mu: f64, lambda: f64) -> Self {
        self.mu = mu;
        self.lambda = lambda;
        self
    }

    /// Set the conjugate gradient iteration cap.
    pub fn with_max_cg_iterations(mut self, iterations: usize) -> Self {
        self.max_cg_iterations = iterations;
        self
    }

    /// Set the conjugate gradient tolerance.
    pub fn with_cg_tolerance(mut self, tolerance: f64) -> Self {
        self.cg_tolerance = tolerance;
        self
    }

    /// Set the moving-constraint stiffness.
    pub fn with_constraint_stiffness(mut self, stiffness: f64) -> Self {
        self.constraint_stiffness = stiffness;
        self
    }

    /// Cap the moving-constraint pseudo-force.
    pub fn with_max_constraint_force(mut self, max_force: f64) -> Self {
        self.max_constraint_force = max_force;
        self
    }

    /// Reject materials and solver settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if !(self.mu > 0.0) {
            return Err(DeformError::invalid_param("mu", self.mu, "must be positive"));
        }
        if !(self.lambda + self.mu > 0.0) {
            return Err(DeformError::invalid_param("lambda", self.lambda, "lambda + mu must be positive"));
        }
        if self.max_cg_iterations == 0 {
            return Err(DeformError::invalid_param("max_cg_iterations", 0, "must be at least 1"));
        }
        if !(self.cg_tolerance > 0.0) {
            return Err(DeformError::invalid_param("cg_tolerance", self.cg_tolerance, "must be positive"));
        }
        if !(self.constraint_stiffness >= 0.0) {
            return Err(DeformError::invalid_param(
                "constraint_stiffness",
                self.constraint_stiffness,
                "must be non-negative",
            ));
        }
        if !(self.max_constraint_force >= 0.0) {
            return Err(DeformError::invalid_param(
                "max_constraint_force",
                self.max_constraint_force,
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Summary of one [`FemSolver::solve`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FemReport {
    /// Conjugate gradient iterations.
    pub iterations: usize,
    /// Final relative residual.
    pub relative_residual: f64,
    /// Size of the reduced system.
    pub dimension: usize,
}

/// Isotropic plane elasticity matrix for engineering strain
/// `(ε_xx, ε_yy, γ_xy)`.
pub fn elasticity_matrix(mu: f64, lambda: f64) -> Matrix3<f64> {
    let d = 2.0 * mu + lambda;
    Matrix3::new(
        d, lambda, 0.0, //
        lambda, d, 0.0, //
        0.0, 0.0, mu,
    )
}

/// Inverse of the barycentric matrix `P_e` (rows `[1, x_k, y_k]`) together
/// with `det P_e`, or `None` for a degenerate triangle.
///
/// Column `k` of the inverse holds the coefficients `(a, b, c)` of the
/// shape function `N_k = a + b x + c y`.
pub fn barycentric_inverse(triangle: [&Point3<f64>; 3]) -> Option<(Matrix3<f64>, f64)> {
    let [p1, p2, p3] = triangle;
    let pe = Matrix3::new(
        1.0, p1.x, p1.y, //
        1.0, p2.x, p2.y, //
        1.0, p3.x, p3.y,
    );
    let det = pe.determinant();
    if det.abs() < DEGENERATE_DET {
        return None;
    }
    pe.try_inverse().map(|inv| (inv, det))
}

/// Strain-displacement matrix `B_e` from the inverse barycentric matrix.
///
/// Columns are ordered `(u1x, u1y, u2x, u2y, u3x, u3y)`.
pub fn strain_displacement(pe_inv: &Matrix3<f64>) -> StrainDisplacement {
    let mut b = StrainDisplacement::zeros();
    for k in 0..3 {
        let dn_dx = pe_inv[(1, k)];
        let dn_dy = pe_inv[(2, k)];
        b[(0, 2 * k)] = dn_dx;
        b[(1, 2 * k + 1)] = dn_dy;
        b[(2, 2 * k)] = dn_dy;
        b[(2, 2 * k + 1)] = dn_dx;
    }
    b
}

/// Element stiffness `B_eᵀ E B_e · area`, or `None` for a degenerate triangle.
pub fn element_stiffness(triangle: [&Point3<f64>; 3], elasticity: &Matrix3<f64>) -> Option<ElementStiffness> {
    let (pe_inv, det) = barycentric_inverse(triangle)?;
    let b = strain_displacement(&pe_inv);
    let area = 0.5 * det.abs();
    Some(b.transpose() * elasticity * b * area)
}

/// Planar linear-elasticity solver.
#[derive(Debug, Clone)]
pub struct FemSolver {
    options: FemOptions,
    initialized: bool,
    /// Positions displacements are measured from; advanced by
    /// `update_boundary_conditions`.
    reference: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
    stiffness: CsrMatrix<f64>,
    reduced: CsrMatrix<f64>,
    constraints: ConstraintSet,
    /// Reduced vertex slot -> vertex id.
    free: Vec<usize>,
    /// Vertex id -> reduced vertex slot.
    slot: Vec<Option<usize>>,
    /// Literal loads per vertex.
    loads: Vec<Vector2<f64>>,
    u: DVector<f64>,
    f: DVector<f64>,
}

impl Default for FemSolver {
    fn default() -> Self {
        Self::new(FemOptions::default())
    }
}

impl FemSolver {
    /// Create an uninitialized solver.
    pub fn new(options: FemOptions) -> Self {
        Self {
            options,
            initialized: false,
            reference: Vec::new(),
            triangles: Vec::new(),
            stiffness: CsrMatrix::zeros(0, 0),
            reduced: CsrMatrix::zeros(0, 0),
            constraints: ConstraintSet::default(),
            free: Vec::new(),
            slot: Vec::new(),
            loads: Vec::new(),
            u: DVector::zeros(0),
            f: DVector::zeros(0),
        }
    }

    /// The solver options.
    pub fn options(&self) -> &FemOptions {
        &self.options
    }

    /// Whether [`FemSolver::initialize`] has succeeded.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of vertices in the snapshot.
    pub fn num_vertices(&self) -> usize {
        self.reference.len()
    }

    /// Number of unknowns after eliminating fixed vertices.
    pub fn reduced_dimension(&self) -> usize {
        2 * self.free.len()
    }

    /// Vertex ids of the reduced system, in slot order.
    pub fn free_vertices(&self) -> &[usize] {
        &self.free
    }

    /// The global `2n x 2n` stiffness matrix.
    pub fn stiffness_matrix(&self) -> &CsrMatrix<f64> {
        &self.stiffness
    }

    /// The stiffness matrix after Dirichlet elimination.
    pub fn reduced_stiffness(&self) -> &CsrMatrix<f64> {
        &self.reduced
    }

    /// The active constraints.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Current displacement of `vertex` (zero for fixed vertices).
    pub fn displacement(&self, vertex: usize) -> Vector2<f64> {
        match self.slot.get(vertex).copied().flatten() {
            Some(s) => Vector2::new(self.u[2 * s], self.u[2 * s + 1]),
            None => Vector2::zeros(),
        }
    }

    /// Take a snapshot of the mesh and assemble the global stiffness matrix.
    ///
    /// Any previous constraints and loads are dropped.
    pub fn initialize(&mut self, vertices: &[Point3<f64>], triangles: &[[usize; 3]]) -> Result<()> {
        self.initialized = false;
        self.options.validate()?;

        if vertices.is_empty() || triangles.is_empty() {
            return Err(DeformError::EmptyMesh);
        }
        let n = vertices.len();
        for (face, tri) in triangles.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v >= n) {
                return Err(DeformError::InvalidVertexIndex { face, vertex });
            }
        }

        self.stiffness = assemble_stiffness(vertices, triangles, &self.options)?;
        self.reference = vertices.to_vec();
        self.triangles = triangles.to_vec();
        self.constraints = ConstraintSet::default();
        self.free.clear();
        self.u = DVector::zeros(0);
        self.loads = vec![Vector2::zeros(); n];
        self.initialized = true;
        self.apply_boundary_conditions();

        log::info!(
            "FEM initialized: {} vertices, {} triangles, K {}x{} with {} nonzeros",
            n,
            triangles.len(),
            2 * n,
            2 * n,
            self.stiffness.nnz()
        );
        Ok(())
    }

    /// Add fixed vertices and moving constraints, then re-apply the boundary
    /// conditions. Nothing changes if the combined set is invalid.
    pub fn add_constraints(&mut self, fixed: &[usize], moving: &[Constraint]) -> Result<()> {
        self.ensure_initialized()?;

        let mut combined = self.constraints.clone();
        combined.fixed.extend_from_slice(fixed);
        combined.moving.extend_from_slice(moving);
        combined.validate(self.reference.len())?;

        self.constraints = combined;
        self.apply_boundary_conditions();
        Ok(())
    }

    /// Eliminate both DOFs of every fixed vertex from `K`.
    ///
    /// The current displacement is folded into the reference positions
    /// first, so a constraint change never moves the mesh.
    pub fn apply_boundary_conditions(&mut self) {
        self.bake_displacement();

        let n = self.reference.len();
        let mut is_fixed = vec![false; n];
        for &v in &self.constraints.fixed {
            is_fixed[v] = true;
        }

        self.free = (0..n).filter(|&v| !is_fixed[v]).collect();
        self.slot = vec![None; n];
        for (s, &v) in self.free.iter().enumerate() {
            self.slot[v] = Some(s);
        }

        let keep: Vec<usize> = self.free.iter().flat_map(|&v| [2 * v, 2 * v + 1]).collect();
        self.reduced = select(&self.stiffness, &keep);
        self.u = DVector::zeros(keep.len());
        self.rebuild_forces();

        log::debug!(
            "FEM boundary conditions: {} fixed vertices, reduced dimension {}",
            n - self.free.len(),
            keep.len()
        );
    }

    /// Add a literal load at `vertex`. Loads on fixed vertices are ignored.
    pub fn apply_force(&mut self, vertex: usize, force: Vector2<f64>) -> Result<()> {
        self.ensure_initialized()?;
        let count = self.reference.len();
        if vertex >= count {
            return Err(DeformError::VertexOutOfRange { vertex, count });
        }
        if self.slot[vertex].is_none() {
            log::warn!("ignoring load on fixed vertex {vertex}");
            return Ok(());
        }
        self.loads[vertex] += force;
        self.rebuild_forces();
        Ok(())
    }

    /// Drop every literal load.
    pub fn clear_forces(&mut self) {
        for load in &mut self.loads {
            *load = Vector2::zeros();
        }
        self.rebuild_forces();
    }

    /// Fold the last displacement into the reference positions and rebuild
    /// `F` from the loads and the moving constraints.
    pub fn update_boundary_conditions(&mut self) {
        self.bake_displacement();
        self.rebuild_forces();
    }

    /// Solve the reduced system `K U = F`.
    ///
    /// On failure `U` keeps its previous value.
    pub fn solve(&mut self) -> Result<FemReport> {
        self.ensure_initialized()?;

        let dimension = self.f.len();
        let solution = conjugate_gradient(
            &self.reduced,
            &self.f,
            None,
            self.options.max_cg_iterations,
            self.options.cg_tolerance,
        )
        .map_err(|err| {
            log::warn!("FEM solve of dimension {dimension} failed: {err}");
            err
        })?;

        log::debug!(
            "FEM solve: dimension {}, {} CG iterations, residual {:.3e}",
            dimension,
            solution.iterations,
            solution.relative_residual
        );

        self.u = solution.x;
        Ok(FemReport {
            iterations: solution.iterations,
            relative_residual: solution.relative_residual,
            dimension,
        })
    }

    /// One editing frame: [`FemSolver::update_boundary_conditions`] then
    /// [`FemSolver::solve`].
    pub fn step(&mut self) -> Result<FemReport> {
        self.ensure_initialized()?;
        self.update_boundary_conditions();
        self.solve()
    }

    /// Overwrite `out` with `reference + displacement` for every vertex.
    pub fn get_result(&self, out: &mut Vec<Point3<f64>>) -> Result<()> {
        self.ensure_initialized()?;
        out.clear();
        out.extend(self.reference.iter().enumerate().map(|(v, p)| {
            let d = self.displacement(v);
            Point3::new(p.x + d.x, p.y + d.y, p.z)
        }));
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(DeformError::NotInitialized)
        }
    }

    fn bake_displacement(&mut self) {
        for (s, &v) in self.free.iter().enumerate() {
            self.reference[v].x += self.u[2 * s];
            self.reference[v].y += self.u[2 * s + 1];
        }
        self.u.fill(0.0);
    }

    fn rebuild_forces(&mut self) {
        let mut f = DVector::zeros(2 * self.free.len());
        for (s, &v) in self.free.iter().enumerate() {
            f[2 * s] += self.loads[v].x;
            f[2 * s + 1] += self.loads[v].y;
        }

        for c in &self.constraints.moving {
            let Some(s) = self.slot[c.vertex] else {
                continue;
            };
            let offset = c.target - self.reference[c.vertex];
            let mut pull = self.options.constraint_stiffness * Vector2::new(offset.x, offset.y);
            let magnitude = pull.norm();
            if magnitude > self.options.max_constraint_force {
                pull *= self.options.max_constraint_force / magnitude;
            }
            f[2 * s] += pull.x;
            f[2 * s + 1] += pull.y;
        }

        self.f = f;
    }
}

/// Scatter-add every element matrix into the global `2n x 2n` matrix.
fn assemble_stiffness(
    vertices: &[Point3<f64>],
    triangles: &[[usize; 3]],
    options: &FemOptions,
) -> Result<CsrMatrix<f64>> {
    let elasticity = elasticity_matrix(options.mu, options.lambda);
    let dim = 2 * vertices.len();
    let mut coo = CooMatrix::new(dim, dim);

    for (face, tri) in triangles.iter().enumerate() {
        let corners = [&vertices[tri[0]], &vertices[tri[1]], &vertices[tri[2]]];
        let ke = element_stiffness(corners, &elasticity).ok_or(DeformError::DegenerateFace { face })?;

        for a in 0..6 {
            let row = 2 * tri[a / 2] + a % 2;
            for b in 0..6 {
                let col = 2 * tri[b / 2] + b % 2;
                coo.push(row, col, ke[(a, b)]);
            }
        }
    }

    // Duplicate entries from shared vertices are summed on conversion.
    Ok(CsrMatrix::from(&coo))
}
