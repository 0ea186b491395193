use crate::ray::{BeamPotential, RayState};
use crate::{AxialField, Error};

/// Which equation of motion a traced ray follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RayModel {
    /// The full equation of motion in `z`, conserving kinetic plus potential energy.
    #[default]
    EnergyConserving,
    /// The linearized paraxial ray equation.
    Paraxial,
}

/// Defines the curvature `r''(z)` of a ray in a rotationally symmetric field.
pub trait RayEquation {
    fn curvature(&self, z: f64, state: &RayState) -> Result<f64, Error>;

    /// Kinetic energy [eV] of an electron on this ray.
    fn kinetic_energy(&self, z: f64, state: &RayState) -> Result<f64, Error>;

    fn extent(&self) -> f64;
}

/// `r'' = -Φ'/(2Φ) r' - Φ''/(4Φ) r`
pub struct Paraxial<'a, F: AxialField> {
    beam: BeamPotential<'a, F>,
}

impl<'a, F: AxialField> Paraxial<'a, F> {
    #[inline]
    pub fn new(beam: BeamPotential<'a, F>) -> Self {
        Self { beam }
    }
}

impl<'a, F: AxialField> RayEquation for Paraxial<'a, F> {
    #[inline]
    fn curvature(&self, z: f64, state: &RayState) -> Result<f64, Error> {
        let s = self.beam.sample(z)?;
        if s.dphi == 0.0 && s.d2phi == 0.0 {
            // field-free drift
            return Ok(0.0);
        }
        check_potential(z, s.phi)?;

        Ok(-(s.dphi * state.slope) / (2.0 * s.phi) - (s.d2phi * state.r) / (4.0 * s.phi))
    }

    fn kinetic_energy(&self, z: f64, _state: &RayState) -> Result<f64, Error> {
        Ok(self.beam.sample(z)?.phi)
    }

    #[inline]
    fn extent(&self) -> f64 {
        self.beam.extent()
    }
}

/// The energy-conserving equation of motion, parametrized by `z`:
///
/// `r'' = (1 + r'²) / (2Φ(r, z)) · (∂Φ/∂r - r' ∂Φ/∂z)`
///
/// with the off-axis potential expanded to second order in `r`,
/// `Φ(r, z) = Φ(z) - r²Φ''(z)/4`.
pub struct EnergyConserving<'a, F: AxialField> {
    beam: BeamPotential<'a, F>,
}

impl<'a, F: AxialField> EnergyConserving<'a, F> {
    #[inline]
    pub fn new(beam: BeamPotential<'a, F>) -> Self {
        Self { beam }
    }

    fn off_axis_potential(&self, z: f64, r: f64) -> Result<(f64, f64, f64), Error> {
        let s = self.beam.sample(z)?;
        let r2 = r * r;
        let phi = s.phi - 0.25 * r2 * s.d2phi;
        let dphi_dr = -0.5 * r * s.d2phi;
        let dphi_dz = if r2 == 0.0 {
            s.dphi
        } else {
            s.dphi - 0.25 * r2 * self.beam.third_derivative(z)?
        };

        Ok((phi, dphi_dr, dphi_dz))
    }
}

impl<'a, F: AxialField> RayEquation for EnergyConserving<'a, F> {
    fn curvature(&self, z: f64, state: &RayState) -> Result<f64, Error> {
        let (phi, dphi_dr, dphi_dz) = self.off_axis_potential(z, state.r)?;
        if dphi_dr == 0.0 && dphi_dz == 0.0 {
            return Ok(0.0);
        }
        check_potential(z, phi)?;

        let slope = state.slope;
        Ok((1.0 + slope * slope) / (2.0 * phi) * (dphi_dr - slope * dphi_dz))
    }

    fn kinetic_energy(&self, z: f64, state: &RayState) -> Result<f64, Error> {
        Ok(self.off_axis_potential(z, state.r)?.0)
    }

    #[inline]
    fn extent(&self) -> f64 {
        self.beam.extent()
    }
}

fn check_potential(z: f64, phi: f64) -> Result<(), Error> {
    if phi > 0.0 && phi.is_finite() {
        Ok(())
    } else {
        Err(Error::unstable(
            z,
            format!("beam potential {:.3e} V is not positive, the electron is stopped", phi),
        ))
    }
}
