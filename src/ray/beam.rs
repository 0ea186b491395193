use crate::lens::Polarity;
use crate::{AxialField, Error};

/// The beam potential and its axial derivatives at a point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BeamSample {
    /// Φ(z) [V]: the kinetic energy of an on-axis electron, in eV.
    pub phi: f64,
    pub dphi: f64,
    pub d2phi: f64,
}

/// The potential that sets an electron's kinetic energy along the axis.
///
/// `Φ(z) = σ·V(z) + shift`, where σ is the stack polarity. Measuring the
/// potential in the stack's polarity makes a stack and its sign-reversed copy
/// describe the same optics.
pub struct BeamPotential<'a, F: AxialField> {
    field: &'a F,
    sign: f64,
    shift: f64,
}

impl<'a, F: AxialField> BeamPotential<'a, F> {
    /// Voltages are measured from the cathode: an electron's kinetic energy in
    /// eV equals `σ·V(z)`.
    pub fn from_cathode(field: &'a F, polarity: Polarity) -> Self {
        Self {
            field,
            sign: polarity.sign(),
            shift: 0.0,
        }
    }

    /// An electron released at `z = 0` with `energy` eV of kinetic energy.
    pub fn from_release(field: &'a F, polarity: Polarity, energy: f64) -> Result<Self, Error> {
        let sign = polarity.sign();
        let entrance = field.potential_at(0.0)?;

        Ok(Self {
            field,
            sign,
            shift: energy - sign * entrance.v,
        })
    }

    #[inline]
    pub fn field(&self) -> &'a F {
        self.field
    }

    #[inline]
    pub fn extent(&self) -> f64 {
        self.field.extent()
    }

    pub fn sample(&self, z: f64) -> Result<BeamSample, Error> {
        let s = self.field.potential_at(z)?;

        Ok(BeamSample {
            phi: self.sign * s.v + self.shift,
            dphi: self.sign * s.dv,
            d2phi: self.sign * s.d2v,
        })
    }

    #[inline]
    pub fn third_derivative(&self, z: f64) -> Result<f64, Error> {
        Ok(self.sign * self.field.third_derivative_at(z)?)
    }
}
