//! Mass-spring simulation.
//!
//! Point masses connected by linear springs, advanced in time with one of
//! several explicit and semi-implicit integration schemes.
//!
//! # Example
//!
//! ```
//! use flexure::algo::mass_spring::{IntegrationScheme, MassSpringOptions, MassSpringSystem};
//! use nalgebra::Point3;
//!
//! let options = MassSpringOptions::default().with_scheme(IntegrationScheme::Verlet);
//! let mut system = MassSpringSystem::with_options(options).unwrap();
//! let a = system.add_point(Point3::new(0.0, 0.0, 0.0), 1.0, 0.1);
//! let b = system.add_point(Point3::new(0.0, 1.0, 0.0), 1.0, 0.1);
//! system.add_spring(a, b, 0.5);
//! system.iterate(0.01).unwrap();
//! ```

mod integrator;
mod point;
mod spring;
mod system;

pub use integrator::{
    correct_positions, correct_velocities, update_positions, update_velocities, IntegrationScheme,
    Integrator,
};
pub use point::Point;
pub use spring::Spring;
pub use system::{MassSpringOptions, MassSpringSystem};
