//! Numerical time integration of point masses.
//!
//! The building blocks ([`update_positions`], [`update_velocities`],
//! [`correct_positions`], [`correct_velocities`]) are stateless operators on a
//! slice of [`Point`]s. [`Integrator`] chains them into the supported schemes
//! and keeps the little history some schemes need between calls.
//!
//! Every operator skips fixed points: their position is left untouched and
//! their velocity is forced to zero.

use std::fmt;

use nalgebra::{Point3, Vector3};

use super::point::Point;

/// Supported time integration schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntegrationScheme {
    /// Explicit Euler: positions advance with the old velocity.
    ForwardEuler,
    /// Semi-implicit Euler: velocities first, positions with the new velocity.
    SymplecticEuler,
    /// Implicit Euler, approximated by a symplectic predictor and one corrector.
    BackwardEuler,
    /// Alternates position-only and velocity-only updates on successive calls.
    Leapfrog,
    /// Second-order midpoint rule.
    Midpoint,
    /// Störmer-Verlet on positions, velocity reconstructed by finite difference.
    Verlet,
    /// Classic fourth-order Runge-Kutta.
    #[default]
    Rk4,
}

impl IntegrationScheme {
    /// Every scheme, in declaration order.
    pub const ALL: [IntegrationScheme; 7] = [
        IntegrationScheme::ForwardEuler,
        IntegrationScheme::SymplecticEuler,
        IntegrationScheme::BackwardEuler,
        IntegrationScheme::Leapfrog,
        IntegrationScheme::Midpoint,
        IntegrationScheme::Verlet,
        IntegrationScheme::Rk4,
    ];

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            IntegrationScheme::ForwardEuler => "forward-euler",
            IntegrationScheme::SymplecticEuler => "symplectic-euler",
            IntegrationScheme::BackwardEuler => "backward-euler",
            IntegrationScheme::Leapfrog => "leapfrog",
            IntegrationScheme::Midpoint => "midpoint",
            IntegrationScheme::Verlet => "verlet",
            IntegrationScheme::Rk4 => "rk4",
        }
    }
}

impl fmt::Display for IntegrationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `p += h * v` for every free point.
pub fn update_positions(points: &mut [Point], h: f64) {
    for p in points.iter_mut().filter(|p| !p.fixed) {
        p.position += h * p.velocity;
    }
}

/// `v += h * (f - d*v) / m` for every free point; fixed points stop.
pub fn update_velocities(points: &mut [Point], h: f64) {
    for p in points.iter_mut() {
        if p.fixed {
            p.velocity = Vector3::zeros();
        } else {
            let a = p.acceleration();
            p.velocity += h * a;
        }
    }
}

/// `v = v0 + h * a` where `v0` comes from `initial` and `a` is evaluated at the
/// state currently stored in `points`.
pub fn correct_velocities(initial: &[Point], points: &mut [Point], h: f64) {
    debug_assert_eq!(initial.len(), points.len());
    for (p, p0) in points.iter_mut().zip(initial) {
        if p.fixed {
            p.velocity = Vector3::zeros();
        } else {
            let a = p.acceleration();
            p.velocity = p0.velocity + h * a;
        }
    }
}

/// `p = p0 + h * v` where `p0` comes from `initial` and `v` is the velocity
/// currently stored in `points`.
pub fn correct_positions(initial: &[Point], points: &mut [Point], h: f64) {
    debug_assert_eq!(initial.len(), points.len());
    for (p, p0) in points.iter_mut().zip(initial) {
        if p.fixed {
            p.position = p0.position;
        } else {
            p.position = p0.position + h * p.velocity;
        }
    }
}

fn copy_points(src: &[Point], dst: &mut Vec<Point>) {
    dst.clear();
    dst.extend_from_slice(src);
}

/// Time derivative of one point's state.
#[derive(Debug, Clone, Copy)]
struct Derivative {
    dp: Vector3<f64>,
    dv: Vector3<f64>,
}

impl Derivative {
    fn of(p: &Point) -> Self {
        Self {
            dp: p.velocity,
            dv: p.acceleration(),
        }
    }
}

/// Advances a point array by one timestep with the selected scheme.
///
/// Schemes that evaluate forces at intermediate states call back into the
/// `forces` closure passed to [`Integrator::step`]. The closure must reset the
/// force accumulators and recompute every force from the state it is given.
///
/// # Example
///
/// ```
/// use flexure::algo::mass_spring::{IntegrationScheme, Integrator, Point};
/// use nalgebra::{Point3, Vector3};
///
/// let mut points = vec![Point::new(Point3::origin(), 1.0, 0.0)];
/// points[0].velocity = Vector3::new(1.0, 0.0, 0.0);
///
/// let mut integrator = Integrator::new(IntegrationScheme::SymplecticEuler);
/// integrator.step(&mut points, 0.1, |pts: &mut [Point]| {
///     for p in pts.iter_mut() {
///         p.force = Vector3::zeros();
///     }
/// });
///
/// assert!((points[0].position.x - 0.1).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Integrator {
    scheme: IntegrationScheme,
    /// Calls since the last reset; leapfrog uses its parity.
    steps: u64,
    /// State at the start of the current step.
    initial: Vec<Point>,
    /// Positions one step back, for Verlet.
    previous: Vec<Point3<f64>>,
    /// RK4 stage derivatives k1..k4.
    stages: [Vec<Derivative>; 4],
}

impl Integrator {
    /// Create an integrator for `scheme`.
    pub fn new(scheme: IntegrationScheme) -> Self {
        Self {
            scheme,
            ..Default::default()
        }
    }

    /// The active scheme.
    #[inline]
    pub fn scheme(&self) -> IntegrationScheme {
        self.scheme
    }

    /// Switch schemes. History from the previous scheme is discarded.
    pub fn set_scheme(&mut self, scheme: IntegrationScheme) {
        self.scheme = scheme;
        self.reset();
    }

    /// Forget the step counter and any stored history.
    pub fn reset(&mut self) {
        self.steps = 0;
        self.initial.clear();
        self.previous.clear();
        for stage in &mut self.stages {
            stage.clear();
        }
    }

    /// Number of calls to [`Integrator::step`] since the last reset.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advance `points` by `h`.
    pub fn step<F>(&mut self, points: &mut [Point], h: f64, mut forces: F)
    where
        F: FnMut(&mut [Point]),
    {
        match self.scheme {
            IntegrationScheme::ForwardEuler => {
                forces(points);
                update_positions(points, h);
                update_velocities(points, h);
            }
            IntegrationScheme::SymplecticEuler => {
                forces(points);
                update_velocities(points, h);
                update_positions(points, h);
            }
            IntegrationScheme::BackwardEuler => self.backward_euler(points, h, &mut forces),
            IntegrationScheme::Leapfrog => {
                if self.steps % 2 == 0 {
                    update_positions(points, h);
                } else {
                    forces(points);
                    update_velocities(points, h);
                }
            }
            IntegrationScheme::Midpoint => self.midpoint(points, h, &mut forces),
            IntegrationScheme::Verlet => self.verlet(points, h, &mut forces),
            IntegrationScheme::Rk4 => self.rk4(points, h, &mut forces),
        }

        self.steps = self.steps.wrapping_add(1);
    }

    fn backward_euler<F>(&mut self, points: &mut [Point], h: f64, forces: &mut F)
    where
        F: FnMut(&mut [Point]),
    {
        forces(points);
        copy_points(points, &mut self.initial);

        // Predict (p, v) at t + h.
        update_velocities(points, h);
        update_positions(points, h);

        // Re-evaluate at the prediction and step again from t.
        forces(points);
        correct_velocities(&self.initial, points, h);
        correct_positions(&self.initial, points, h);
    }

    fn midpoint<F>(&mut self, points: &mut [Point], h: f64, forces: &mut F)
    where
        F: FnMut(&mut [Point]),
    {
        forces(points);
        copy_points(points, &mut self.initial);

        update_positions(points, 0.5 * h);
        update_velocities(points, 0.5 * h);

        forces(points);
        // Positions first: they need the half-step velocity still in `points`.
        correct_positions(&self.initial, points, h);
        correct_velocities(&self.initial, points, h);
    }

    fn verlet<F>(&mut self, points: &mut [Point], h: f64, forces: &mut F)
    where
        F: FnMut(&mut [Point]),
    {
        forces(points);

        if self.previous.len() != points.len() {
            // No history yet: bootstrap with one symplectic Euler step.
            self.previous = points.iter().map(|p| p.position).collect();
            update_velocities(points, h);
            update_positions(points, h);
            return;
        }

        let h2 = h * h;
        for (p, prev) in points.iter_mut().zip(self.previous.iter_mut()) {
            let current = p.position;
            if p.fixed {
                p.velocity = Vector3::zeros();
            } else {
                let next = current + (current - *prev) + h2 * p.acceleration();
                p.velocity = (next - current) / h;
                p.position = next;
            }
            *prev = current;
        }
    }

    fn rk4<F>(&mut self, points: &mut [Point], h: f64, forces: &mut F)
    where
        F: FnMut(&mut [Point]),
    {
        copy_points(points, &mut self.initial);

        let offsets = [0.0, 0.5 * h, 0.5 * h, h];
        for (s, &offset) in offsets.iter().enumerate() {
            if s > 0 {
                let k = &self.stages[s - 1];
                for ((p, p0), k) in points.iter_mut().zip(&self.initial).zip(k) {
                    if !p.fixed {
                        p.position = p0.position + offset * k.dp;
                        p.velocity = p0.velocity + offset * k.dv;
                    }
                }
            }

            forces(points);

            let stage = &mut self.stages[s];
            stage.clear();
            stage.extend(points.iter().map(Derivative::of));
        }

        let [k1, k2, k3, k4] = &self.stages;
        let w = h / 6.0;
        for (i, (p, p0)) in points.iter_mut().zip(&self.initial).enumerate() {
            if p.fixed {
                p.position = p0.position;
                p.velocity = Vector3::zeros();
                continue;
            }
            let dp = k1[i].dp + 2.0 * k2[i].dp + 2.0 * k3[i].dp + k4[i].dp;
            let dv = k1[i].dv + 2.0 * k2[i].dv + 2.0 * k3[i].dv + k4[i].dv;
            p.position = p0.position + w * dp;
            p.velocity = p0.velocity + w * dv;
        }
    }
}
