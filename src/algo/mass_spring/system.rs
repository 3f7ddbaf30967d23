//! Mass-spring system: point masses joined by springs, pulled by constraints.

use nalgebra::Point3;

use crate::error::{DeformError, Result};
use crate::mesh::{Constraint, ConstraintSet};

use super::integrator::{IntegrationScheme, Integrator};
use super::point::Point;
use super::spring::Spring;

/// Options for building and running a [`MassSpringSystem`].
#[derive(Debug, Clone, PartialEq)]
pub struct MassSpringOptions {
    /// Time integration scheme.
    pub scheme: IntegrationScheme,

    /// Mass given to every mesh vertex.
    pub point_mass: f64,

    /// Linear damping coefficient given to every mesh vertex.
    pub point_damping: f64,

    /// Stiffness of every edge spring.
    pub spring_stiffness: f64,

    /// Scale of the pull `factor * (target - p)` applied to moving constraints.
    pub external_force_factor: f64,

    /// Upper bound on the magnitude of a constraint pull per step.
    pub max_external_force: f64,
}

impl Default for MassSpringOptions {
    fn default() -> Self {
        Self {
            scheme: IntegrationScheme::Rk4,
            point_mass: 1.0,
            point_damping: 0.1,
            spring_stiffness: 0.25,
            external_force_factor: 1.0,
            max_external_force: 0.25,
        }
    }
}

impl MassSpringOptions {
    /// Set the integration scheme.
    pub fn with_scheme(mut self, scheme: IntegrationScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the per-vertex mass.
    pub fn with_point_mass(mut self, mass: f64) -> Self {
        self.point_mass = mass;
        self
    }

    /// Set the per-vertex damping.
    pub fn with_point_damping(mut self, damping: f64) -> Self {
        self.point_damping = damping;
        self
    }

    /// Set the edge spring stiffness.
    pub fn with_spring_stiffness(mut self, stiffness: f64) -> Self {
        self.spring_stiffness = stiffness;
        self
    }

    /// Set the constraint pull factor.
    pub fn with_external_force_factor(mut self, factor: f64) -> Self {
        self.external_force_factor = factor;
        self
    }

    /// Set the cap on the constraint pull.
    pub fn with_max_external_force(mut self, max_force: f64) -> Self {
        self.max_external_force = max_force;
        self
    }

    /// Reject values no system could run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.point_mass > 0.0) {
            return Err(DeformError::invalid_param("point_mass", self.point_mass, "must be positive"));
        }
        if !(self.point_damping >= 0.0) {
            return Err(DeformError::invalid_param(
                "point_damping",
                self.point_damping,
                "must be non-negative",
            ));
        }
        if !self.spring_stiffness.is_finite() {
            return Err(DeformError::invalid_param(
                "spring_stiffness",
                self.spring_stiffness,
                "must be finite",
            ));
        }
        if !(self.external_force_factor >= 0.0) {
            return Err(DeformError::invalid_param(
                "external_force_factor",
                self.external_force_factor,
                "must be non-negative",
            ));
        }
        if !(self.max_external_force >= 0.0) {
            return Err(DeformError::invalid_param(
                "max_external_force",
                self.max_external_force,
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Point masses connected by Hookean springs.
///
/// Each call to [`MassSpringSystem::iterate`] clears the force accumulators,
/// applies the constraint pulls, accumulates spring forces and hands the
/// points to the integrator. Schemes with intermediate stages repeat the
/// force evaluation at every stage.
///
/// # Example
///
/// ```
/// use flexure::algo::mass_spring::MassSpringSystem;
/// use nalgebra::Point3;
///
/// let mut system = MassSpringSystem::new();
/// let a = system.add_point(Point3::new(0.0, 0.0, 0.0), 1.0, 0.5);
/// let b = system.add_point(Point3::new(1.0, 0.0, 0.0), 1.0, 0.5);
/// system.add_spring(a, b, 1.0);
/// system.add_constraints(&[a], &[]).unwrap();
///
/// for _ in 0..10 {
///     system.iterate(0.01).unwrap();
/// }
/// assert_eq!(system.point(a).position, Point3::origin());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MassSpringSystem {
    options: MassSpringOptions,
    points: Vec<Point>,
    springs: Vec<Spring>,
    constraints: ConstraintSet,
    integrator: Integrator,
}

impl MassSpringSystem {
    /// Create an empty system with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty system with the given options.
    pub fn with_options(options: MassSpringOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            integrator: Integrator::new(options.scheme),
            options,
            ..Default::default()
        })
    }

    /// The options the system runs with.
    pub fn options(&self) -> &MassSpringOptions {
        &self.options
    }

    /// Add a free point at rest and return its id.
    ///
    /// # Panics
    ///
    /// Panics if `mass` is not positive or `damping` is negative.
    pub fn add_point(&mut self, position: Point3<f64>, mass: f64, damping: f64) -> usize {
        assert!(mass > 0.0, "point mass must be positive, got {mass}");
        assert!(damping >= 0.0, "point damping must be non-negative, got {damping}");

        self.points.push(Point::new(position, mass, damping));
        self.points.len() - 1
    }

    /// Join points `i` and `j` with a spring at rest in their current
    /// configuration.
    ///
    /// # Panics
    ///
    /// Panics if `i == j` or either id is out of range.
    pub fn add_spring(&mut self, i: usize, j: usize, stiffness: f64) {
        let n = self.points.len();
        assert!(i < n && j < n, "spring ({i}, {j}) references a missing point (have {n})");

        let spring = Spring::new(i, j, &self.points[i].position, &self.points[j].position, stiffness);
        self.springs.push(spring);
    }

    /// Add fixed points and moving constraints to the current set.
    ///
    /// Fixed points are pinned where they are now. Moving constraints pull
    /// their point toward the target on every iteration. Nothing changes if
    /// the combined set is invalid.
    pub fn add_constraints(&mut self, fixed: &[usize], moving: &[Constraint]) -> Result<()> {
        let mut combined = self.constraints.clone();
        combined.fixed.extend_from_slice(fixed);
        combined.moving.extend_from_slice(moving);
        combined.validate(self.points.len())?;

        for &id in fixed {
            let point = &mut self.points[id];
            point.fixed = true;
            point.velocity = nalgebra::Vector3::zeros();
        }
        self.constraints = combined;

        log::debug!(
            "mass-spring constraints: {} fixed, {} moving",
            self.constraints.fixed.len(),
            self.constraints.moving.len()
        );
        Ok(())
    }

    /// Release every fixed point and drop every moving constraint.
    pub fn clear_constraints(&mut self) {
        for &id in &self.constraints.fixed {
            self.points[id].fixed = false;
        }
        self.constraints = ConstraintSet::default();
    }

    /// Remove all points, springs and constraints.
    pub fn clear(&mut self) {
        self.points.clear();
        self.springs.clear();
        self.constraints = ConstraintSet::default();
        self.integrator.reset();
    }

    /// Select the integration scheme. Scheme history is discarded.
    pub fn set_integration_scheme(&mut self, scheme: IntegrationScheme) {
        self.options.scheme = scheme;
        self.integrator.set_scheme(scheme);
    }

    /// The active integration scheme.
    pub fn integration_scheme(&self) -> IntegrationScheme {
        self.integrator.scheme()
    }

    /// Advance the system by one timestep `dt`.
    pub fn iterate(&mut self, dt: f64) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(DeformError::invalid_param("dt", dt, "must be finite and positive"));
        }

        let Self {
            options,
            points,
            springs,
            constraints,
            integrator,
        } = self;

        let pull = ExternalPull {
            factor: options.external_force_factor,
            max_force: options.max_external_force,
        };
        integrator.step(points, dt, |pts: &mut [Point]| {
            accumulate_forces(pts, springs, &constraints.moving, pull);
        });

        Ok(())
    }

    /// All points.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// All springs.
    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    /// Point `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn point(&self, id: usize) -> &Point {
        &self.points[id]
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of springs.
    pub fn num_springs(&self) -> usize {
        self.springs.len()
    }

    /// The active constraints.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Overwrite `out` with the current point positions.
    ///
    /// Returns [`DeformError::SizeMismatch`] without touching `out` when its
    /// length differs from the number of points.
    pub fn copy_positions(&self, out: &mut [Point3<f64>]) -> Result<()> {
        if out.len() != self.points.len() {
            return Err(DeformError::SizeMismatch {
                expected: self.points.len(),
                actual: out.len(),
            });
        }
        for (dst, p) in out.iter_mut().zip(&self.points) {
            *dst = p.position;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct ExternalPull {
    factor: f64,
    max_force: f64,
}

/// Recompute every force accumulator from the current state.
fn accumulate_forces(points: &mut [Point], springs: &[Spring], moving: &[Constraint], pull: ExternalPull) {
    for p in points.iter_mut() {
        p.force = nalgebra::Vector3::zeros();
    }

    for c in moving {
        let p = &mut points[c.vertex];
        if p.fixed {
            continue;
        }
        let mut f = pull.factor * (c.target - p.position);
        let magnitude = f.norm();
        if magnitude > pull.max_force {
            f *= pull.max_force / magnitude;
        }
        p.add_force(&f);
    }

    for spring in springs {
        let (i, j) = spring.endpoints();
        let f = spring.force(&points[i].position, &points[j].position);
        if !points[i].fixed {
            points[i].add_force(&f);
        }
        if !points[j].fixed {
            points[j].add_force(&-f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Point 0 fixed at the origin, point 1 on a unit spring stretched to x = 2.
    fn stretched_spring(scheme: IntegrationScheme, damping: f64) -> MassSpringSystem {
        let options = MassSpringOptions::default().with_scheme(scheme);
        let mut system = MassSpringSystem::with_options(options).unwrap();
        let a = system.add_point(Point3::origin(), 1.0, damping);
        let b = system.add_point(Point3::new(1.0, 0.0, 0.0), 1.0, damping);
        system.add_spring(a, b, 1.0);
        system.add_constraints(&[a], &[]).unwrap();
        system.points[b].position = Point3::new(2.0, 0.0, 0.0);
        system
    }

    #[test]
    fn test_damped_spring_settles_at_rest_length() {
        for scheme in [IntegrationScheme::Verlet, IntegrationScheme::Rk4] {
            let mut system = stretched_spring(scheme, 0.5);

            let mut early_peak: f64 = 0.0;
            let mut late_peak: f64 = 0.0;
            for step in 0..2000 {
                system.iterate(0.1).unwrap();
                let excursion = (system.point(1).position.x - 1.0).abs();
                if step < 100 {
                    early_peak = early_peak.max(excursion);
                } else if step < 200 {
                    late_peak = late_peak.max(excursion);
                }
            }

            assert!(late_peak < early_peak, "{scheme}: oscillation did not decay");
            assert_relative_eq!(system.point(1).position.x, 1.0, epsilon = 1e-6);
            assert_eq!(system.point(0).position, Point3::origin());
        }
    }

    #[test]
    fn test_undamped_free_points_move_linearly() {
        let mut system = MassSpringSystem::new();
        system.set_integration_scheme(IntegrationScheme::ForwardEuler);
        let id = system.add_point(Point3::origin(), 2.0, 0.0);
        system.points[id].velocity = nalgebra::Vector3::new(1.0, 0.0, 0.0);

        for _ in 0..5 {
            system.iterate(0.1).unwrap();
        }
        assert_relative_eq!(system.point(id).position.x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_external_pull_is_capped() {
        let options = MassSpringOptions::default()
            .with_scheme(IntegrationScheme::ForwardEuler)
            .with_max_external_force(0.25);
        let mut system = MassSpringSystem::with_options(options).unwrap();
        let id = system.add_point(Point3::origin(), 1.0, 0.0);
        system
            .add_constraints(&[], &[Constraint::new(id, Point3::new(0.0, 0.0, 10.0))])
            .unwrap();

        system.iterate(1.0).unwrap();
        // Forward Euler: position moves with the old (zero) velocity, velocity gains f/m.
        assert_eq!(system.point(id).position, Point3::origin());
        assert_relative_eq!(system.point(id).velocity.z, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_constraint_pulls_toward_target() {
        let mut system = MassSpringSystem::new();
        let id = system.add_point(Point3::origin(), 1.0, 1.0);
        let target = Point3::new(0.0, 0.0, 1.0);
        system.add_constraints(&[], &[Constraint::new(id, target)]).unwrap();

        for _ in 0..200 {
            system.iterate(0.05).unwrap();
        }
        assert!((system.point(id).position - target).norm() < 0.05);
    }

    #[test]
    fn test_fixed_points_ignore_pull() {
        let mut system = MassSpringSystem::new();
        let id = system.add_point(Point3::origin(), 1.0, 0.0);
        system.add_constraints(&[id], &[]).unwrap();
        let err = system.add_constraints(&[], &[Constraint::new(id, Point3::new(1.0, 0.0, 0.0))]);
        assert_eq!(err, Err(DeformError::DuplicateAnchor { vertex: id }));

        system.iterate(0.1).unwrap();
        assert_eq!(system.point(id).position, Point3::origin());
    }

    #[test]
    fn test_add_constraints_rejects_out_of_range() {
        let mut system = MassSpringSystem::new();
        system.add_point(Point3::origin(), 1.0, 0.0);
        assert_eq!(
            system.add_constraints(&[3], &[]),
            Err(DeformError::VertexOutOfRange { vertex: 3, count: 1 })
        );
        assert!(system.constraints().is_empty());
        assert!(!system.point(0).fixed);
    }

    #[test]
    fn test_iterate_rejects_bad_timestep() {
        let mut system = MassSpringSystem::new();
        assert!(system.iterate(0.0).is_err());
        assert!(system.iterate(f64::NAN).is_err());
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut system = stretched_spring(IntegrationScheme::Rk4, 0.1);
        system.clear();
        assert_eq!(system.num_points(), 0);
        assert_eq!(system.num_springs(), 0);
        assert!(system.constraints().is_empty());
    }

    #[test]
    fn test_clear_constraints_releases_points() {
        let mut system = stretched_spring(IntegrationScheme::Rk4, 0.1);
        system.clear_constraints();
        assert!(!system.point(0).fixed);
        assert!(system.constraints().is_empty());
    }

    #[test]
    fn test_copy_positions_checks_size() {
        let system = stretched_spring(IntegrationScheme::Rk4, 0.1);
        let mut out = vec![Point3::new(9.0, 9.0, 9.0); 3];
        assert_eq!(
            system.copy_positions(&mut out),
            Err(DeformError::SizeMismatch { expected: 2, actual: 3 })
        );
        assert_eq!(out[0], Point3::new(9.0, 9.0, 9.0));

        let mut out = vec![Point3::origin(); 2];
        system.copy_positions(&mut out).unwrap();
        assert_eq!(out[1], Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    #[should_panic]
    fn test_spring_to_self_panics() {
        let mut system = MassSpringSystem::new();
        let id = system.add_point(Point3::origin(), 1.0, 0.0);
        system.add_spring(id, id, 1.0);
    }

    #[test]
    fn test_options_validation() {
        assert!(MassSpringOptions::default().validate().is_ok());
        assert!(MassSpringSystem::with_options(MassSpringOptions::default().with_point_mass(0.0)).is_err());
        assert!(MassSpringOptions::default().with_point_damping(-1.0).validate().is_err());
    }
}
