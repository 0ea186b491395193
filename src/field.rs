//! The on-axis electrostatic potential of an electrode stack.

mod gap;
mod potential;

pub use gap::{GapProfile, TUBE_GAP_OMEGA};
pub use potential::PotentialField;

/// The axial potential and its first two derivatives at a point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FieldSample {
    /// V(z) [V].
    pub v: f64,
    /// V'(z) [V / m].
    pub dv: f64,
    /// V''(z) [V / m²].
    pub d2v: f64,
}
