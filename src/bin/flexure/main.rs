//! Flexure CLI - drag a grid vertex with one of the deformation solvers.
//!
//! Usage: flexure <COMMAND> [OPTIONS]
//!
//! Builds a square grid, pins its four corners, pulls the handle vertex
//! toward the target for a number of frames and prints a summary.
//! Set `RUST_LOG=debug` for per-frame solver output.

use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::Point3;

use flexure::algo::arap::ArapOptions;
use flexure::algo::fem::FemOptions;
use flexure::algo::mass_spring::{IntegrationScheme, MassSpringOptions};
use flexure::mesh::{Constraint, ConstraintSet, DeformableMesh};

#[derive(Parser)]
#[command(name = "flexure")]
#[command(author, version, about = "Mesh deformation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Vertices per grid side
    #[arg(long, global = true, default_value = "5")]
    grid: usize,

    /// Grid side length
    #[arg(long, global = true, default_value = "2.0")]
    side: f64,

    /// Number of frames to run
    #[arg(short, long, global = true, default_value = "100")]
    frames: usize,

    /// Dragged vertex (default: the grid center)
    #[arg(long, global = true)]
    handle: Option<usize>,

    /// Where the handle is dragged to
    #[arg(
        long,
        global = true,
        num_args = 3,
        value_names = ["X", "Y", "Z"],
        allow_negative_numbers = true,
        default_values_t = [0.0, 0.0, 1.0]
    )]
    target: Vec<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the grid as a mass-spring system
    MassSpring {
        /// Integration scheme
        #[arg(short, long, value_enum, default_value = "rk4")]
        scheme: Scheme,

        /// Timestep per frame
        #[arg(long, default_value = "0.01")]
        dt: f64,

        /// Mass of every vertex
        #[arg(long, default_value = "1.0")]
        mass: f64,

        /// Damping of every vertex
        #[arg(long, default_value = "0.1")]
        damping: f64,

        /// Stiffness of every edge spring
        #[arg(long, default_value = "0.25")]
        stiffness: f64,

        /// Cap on the handle pull per frame
        #[arg(long, default_value = "0.25")]
        max_force: f64,
    },

    /// Deform the grid as rigidly as possible
    Arap {
        /// Energy change at which a frame's iterations stop
        #[arg(long, default_value = "1e-6")]
        eps: f64,

        /// Penalty weight of anchored vertices
        #[arg(long, default_value = "100.0")]
        anchor_weight: f64,

        /// Distance the handle target moves per frame
        #[arg(long, default_value = "0.01")]
        step: f64,

        /// Iteration cap per frame
        #[arg(long, default_value = "100")]
        max_iterations: usize,
    },

    /// Deform the grid as a planar linear-elastic sheet
    Fem {
        /// Lamé shear modulus
        #[arg(long, default_value = "10.5")]
        mu: f64,

        /// Lamé first parameter
        #[arg(long, default_value = "0.5")]
        lambda: f64,

        /// Scale of the handle pseudo-force
        #[arg(long, default_value = "1.0")]
        constraint_stiffness: f64,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Scheme {
    /// Explicit Euler
    ForwardEuler,
    /// Semi-implicit Euler
    SymplecticEuler,
    /// Predictor-corrector implicit Euler
    BackwardEuler,
    /// Alternating position/velocity updates
    Leapfrog,
    /// Second-order midpoint
    Midpoint,
    /// Störmer-Verlet
    Verlet,
    /// Fourth-order Runge-Kutta
    Rk4,
}

impl From<Scheme> for IntegrationScheme {
    fn from(scheme: Scheme) -> Self {
        match scheme {
            Scheme::ForwardEuler => IntegrationScheme::ForwardEuler,
            Scheme::SymplecticEuler => IntegrationScheme::SymplecticEuler,
            Scheme::BackwardEuler => IntegrationScheme::BackwardEuler,
            Scheme::Leapfrog => IntegrationScheme::Leapfrog,
            Scheme::Midpoint => IntegrationScheme::Midpoint,
            Scheme::Verlet => IntegrationScheme::Verlet,
            Scheme::Rk4 => IntegrationScheme::Rk4,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut mesh = DeformableMesh::grid(cli.side, cli.grid)?;
    let handle = cli.handle.unwrap_or(mesh.num_vertices() / 2);
    let [x, y, z] = <[f64; 3]>::try_from(cli.target.as_slice())?;
    let target = Point3::new(x, y, z);

    let corners = mesh.corner_ids().to_vec();
    mesh.set_constraints(ConstraintSet::new(corners, vec![Constraint::new(handle, target)]))?;
    let rest = mesh.vertices().to_vec();

    println!(
        "Grid: {} vertices, {} triangles, {} edges",
        mesh.num_vertices(),
        mesh.num_triangles(),
        mesh.adjacency().num_edges()
    );
    println!(
        "Dragging vertex {} to ({:.3}, {:.3}, {:.3}) over {} frames",
        handle, x, y, z, cli.frames
    );

    let start = Instant::now();
    match cli.command {
        Commands::MassSpring {
            scheme,
            dt,
            mass,
            damping,
            stiffness,
            max_force,
        } => {
            let options = MassSpringOptions::default()
                .with_scheme(scheme.into())
                .with_point_mass(mass)
                .with_point_damping(damping)
                .with_spring_stiffness(stiffness)
                .with_max_external_force(max_force);
            cmd_mass_spring(&mut mesh, cli.frames, &options, dt)?;
        }

        Commands::Arap {
            eps,
            anchor_weight,
            step,
            max_iterations,
        } => {
            let options = ArapOptions::default()
                .with_anchor_weight(anchor_weight)
                .with_max_anchor_step(step)
                .with_max_iterations(max_iterations);
            cmd_arap(&mut mesh, cli.frames, &options, eps)?;
        }

        Commands::Fem {
            mu,
            lambda,
            constraint_stiffness,
        } => {
            let options = FemOptions::default()
                .with_lame(mu, lambda)
                .with_constraint_stiffness(constraint_stiffness);
            cmd_fem(&mut mesh, cli.frames, &options)?;
        }
    }
    let elapsed = start.elapsed();

    let p = mesh.vertices()[handle];
    let max_displacement = mesh
        .vertices()
        .iter()
        .zip(&rest)
        .map(|(a, b)| (a - b).norm())
        .fold(0.0_f64, f64::max);

    println!("Handle: ({:.4}, {:.4}, {:.4}), {:.4} from target", p.x, p.y, p.z, (target - p).norm());
    println!("Max displacement: {:.4}", max_displacement);
    println!("Elapsed: {:.2?}", elapsed);

    Ok(())
}

fn cmd_mass_spring(
    mesh: &mut DeformableMesh,
    frames: usize,
    options: &MassSpringOptions,
    dt: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut system = mesh.build_mass_spring(options)?;
    println!(
        "Mass-spring: {} points, {} springs, {} integration, dt={}",
        system.num_points(),
        system.num_springs(),
        system.integration_scheme(),
        dt
    );

    for _ in 0..frames {
        system.iterate(dt)?;
    }
    mesh.read_mass_spring(&system)?;

    let kinetic: f64 = system
        .points()
        .iter()
        .map(|p| 0.5 * p.mass * p.velocity.norm_squared())
        .sum();
    println!("Kinetic energy: {:.6e}", kinetic);

    Ok(())
}

fn cmd_arap(
    mesh: &mut DeformableMesh,
    frames: usize,
    options: &ArapOptions,
    eps: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut solver = mesh.build_arap(options)?;
    println!(
        "ARAP: anchor weight {}, anchor step {}, eps {}",
        options.anchor_weight, options.max_anchor_step, eps
    );

    let mut iterations = 0;
    let mut capped = 0;
    let mut energy = 0.0;
    for _ in 0..frames {
        let report = solver.solve(eps)?;
        iterations += report.iterations;
        energy = report.energy;
        if !report.converged {
            capped += 1;
        }
    }
    mesh.read_arap(&solver)?;

    println!("Iterations: {} total, {} frames hit the cap", iterations, capped);
    println!("Final energy: {:.6e}", energy);

    Ok(())
}

fn cmd_fem(
    mesh: &mut DeformableMesh,
    frames: usize,
    options: &FemOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut solver = mesh.build_fem(options)?;
    println!(
        "FEM: mu={}, lambda={}, reduced system {}x{}",
        options.mu,
        options.lambda,
        solver.reduced_dimension(),
        solver.reduced_dimension()
    );

    let mut cg_iterations = 0;
    let mut residual = 0.0;
    for _ in 0..frames {
        let report = solver.step()?;
        cg_iterations += report.iterations;
        residual = report.relative_residual;
    }
    mesh.read_fem(&solver)?;

    println!("CG iterations: {} total, last residual {:.3e}", cg_iterations, residual);

    Ok(())
}
