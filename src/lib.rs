//! A framework for simulating electrostatic Einzel lenses.
//!
//! A lens is a stack of coaxial cylindrical electrodes held at independent
//! voltages. The crate builds the on-axis potential of such a stack, finds its
//! focal length from the paraxial ray equation and traces individual electrons
//! through it. To get started, refer to the `demos` directory in the main
//! repository.

mod simulation;

pub mod aperture;
pub mod constants;
pub mod field;
pub mod lens;
pub mod prelude;
pub mod ray;

pub use simulation::{
    focal_length, trace, LensRequest, Simulation, SimulationDescriptor, TraceRequest,
};

/// Represents an error in the simulation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{array_name} array does not have expected length \
        ( {array_name} array length: {input_length}, \
        expected length: {expected_length} )")]
    BadLength {
        array_name: String,
        input_length: usize,
        expected_length: usize,
    },
    #[error("{array_name} array is empty")]
    Empty { array_name: String },
    #[error("Invalid {quantity}: {value} ({reason})")]
    InvalidValue {
        quantity: String,
        value: f64,
        reason: &'static str,
    },
    #[error("Position z = {z:e} m lies outside the lens [0, {z_max:e}] m")]
    OutOfDomain { z: f64, z_max: f64 },
    #[error("Integration diverged at z = {z:e} m: {reason}; check the voltage configuration")]
    NumericalInstability { z: f64, reason: String },
    #[error("Electrode layout is too dense to pin the electrode voltages \
        (amplitude correction: {condition:e} times the voltage swing); check the geometry")]
    IllConditioned { condition: f64 },
}

/// Coarse classification of an [`Error`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or inconsistent input.
    Validation,
    /// A query outside the axial extent of the lens.
    Domain,
    /// The integration diverged or the field model broke down.
    NumericalInstability,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadLength { .. } | Error::Empty { .. } | Error::InvalidValue { .. } => {
                ErrorKind::Validation
            }
            Error::OutOfDomain { .. } => ErrorKind::Domain,
            Error::NumericalInstability { .. } | Error::IllConditioned { .. } => {
                ErrorKind::NumericalInstability
            }
        }
    }

    pub(crate) fn invalid(quantity: &str, value: f64, reason: &'static str) -> Self {
        Error::InvalidValue {
            quantity: quantity.to_string(),
            value,
            reason,
        }
    }

    pub(crate) fn unstable(z: f64, reason: impl Into<String>) -> Self {
        Error::NumericalInstability {
            z,
            reason: reason.into(),
        }
    }
}

/// The on-axis potential of a rotationally symmetric lens.
pub trait AxialField {
    /// The axial length of the field, in metres. The field is defined on `[0, extent]`.
    fn extent(&self) -> f64;

    /// The potential and its first two derivatives at `z`.
    fn potential_at(&self, z: f64) -> Result<field::FieldSample, Error>;

    /// The third derivative of the potential at `z`.
    fn third_derivative_at(&self, z: f64) -> Result<f64, Error>;

    /// The shortest length over which the field changes appreciably.
    fn smallest_feature(&self) -> f64;

    fn integration_parameters(&self, settings: &SolverSettings) -> IntegrationParameters {
        let extent = self.extent();
        let feature_step = self.smallest_feature() / (settings.steps_per_feature as f64);
        let coarse_step = extent / (settings.min_steps as f64);
        let wanted = (extent / feature_step.min(coarse_step)).ceil() as usize;
        let nsteps = wanted.clamp(settings.min_steps, settings.max_steps);

        IntegrationParameters {
            delta_z: extent / (nsteps as f64),
            nsteps,
        }
    }
}

/// Step size and count used to integrate a ray across a field.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegrationParameters {
    /// The axial length of each integration step.
    pub delta_z: f64,
    /// The number of steps spanning the whole field.
    pub nsteps: usize,
}

/// Numerical settings shared by the focal length solver and the trajectory integrator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolverSettings {
    /// Integration steps placed across the smallest field feature.
    pub steps_per_feature: usize,
    /// Lower bound on the number of steps across the lens.
    pub min_steps: usize,
    /// Upper bound on the number of steps across the lens.
    pub max_steps: usize,
    /// A ray leaving with `|r'| * length <= parallel_tolerance * |r|` is treated as parallel.
    pub parallel_tolerance: f64,
    /// Ray height (relative to the launch scale) or slope beyond which integration is
    /// considered divergent.
    pub divergence_bound: f64,
    /// Largest shift of a solved electrode amplitude away from its declared voltage,
    /// relative to the voltage swing of the stack, before the layout is rejected.
    pub max_amplitude_correction: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            steps_per_feature: 64,
            min_steps: 2_000,
            max_steps: 4_000_000,
            parallel_tolerance: 1e-9,
            divergence_bound: 1e8,
            max_amplitude_correction: 1.0,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.steps_per_feature == 0 {
            return Err(Error::invalid("steps per feature", 0.0, "must be at least 1"));
        }
        if self.min_steps == 0 {
            return Err(Error::invalid("minimum step count", 0.0, "must be at least 1"));
        }
        if self.max_steps < self.min_steps {
            return Err(Error::invalid(
                "maximum step count",
                self.max_steps as f64,
                "must not be below the minimum step count",
            ));
        }
        if !(self.parallel_tolerance.is_finite() && self.parallel_tolerance > 0.0) {
            return Err(Error::invalid(
                "parallel tolerance",
                self.parallel_tolerance,
                "must be finite and positive",
            ));
        }
        if !(self.divergence_bound.is_finite() && self.divergence_bound > 1.0) {
            return Err(Error::invalid(
                "divergence bound",
                self.divergence_bound,
                "must be finite and greater than one",
            ));
        }
        if !(self.max_amplitude_correction.is_finite() && self.max_amplitude_correction > 0.0) {
            return Err(Error::invalid(
                "amplitude correction limit",
                self.max_amplitude_correction,
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}
