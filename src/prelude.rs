//! Includes commonly used library components.

pub use crate::{
    AxialField,
    Error,
    ErrorKind,
    IntegrationParameters,
    LensRequest,
    Simulation,
    SimulationDescriptor,
    SolverSettings,
    TraceRequest,
};
pub use crate::field::{FieldSample, PotentialField};
pub use crate::lens::{LensStack, VoltageProfile};
pub use crate::ray::{FocalAnalysis, FocalLength, RayModel, Release, Trajectory};
