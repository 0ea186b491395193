//! Electron rays through an axial field: focal length and trajectories.

mod beam;
mod equation;
mod focal;
mod integrator;
mod trajectory;

pub use beam::{BeamPotential, BeamSample};
pub use equation::{EnergyConserving, Paraxial, RayEquation, RayModel};
pub use focal::{FocalAnalysis, FocalLength, FocalLengthSolver};
pub use integrator::{rk4_step, DivergenceGuard, RayState};
pub use trajectory::{Release, Trajectory, TrajectoryIntegrator};
