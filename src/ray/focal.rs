use std::fmt;

use crate::lens::Polarity;
use crate::ray::integrator::integrate;
use crate::ray::{BeamPotential, DivergenceGuard, Paraxial, RayState};
use crate::{AxialField, Error, SolverSettings};

/// A focal length, or the absence of one when the lens does not bend a parallel ray.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FocalLength {
    /// Distance in metres from the lens exit plane to the axis crossing of the
    /// emergent ray. Negative when the crossing lies before that plane, which is
    /// the case both for a diverging lens and for one focusing inside itself.
    Finite(f64),
    /// The emergent ray is parallel to the axis.
    Undefined,
}

impl FocalLength {
    #[inline]
    pub fn value(&self) -> Option<f64> {
        match *self {
            FocalLength::Finite(f) => Some(f),
            FocalLength::Undefined => None,
        }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, FocalLength::Undefined)
    }
}

impl fmt::Display for FocalLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocalLength::Finite(value) => write!(f, "{}", value),
            FocalLength::Undefined => write!(f, "undefined"),
        }
    }
}

/// The paraxial imaging properties of a lens, found by tracing a unit ray
/// launched parallel to the axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FocalAnalysis {
    /// Distance from the lens exit plane to where the emergent ray crosses the axis.
    pub focal_length: FocalLength,
    /// Focal length measured from the image-side principal plane, `-r(0) / r'(exit)`.
    pub effective_focal_length: FocalLength,
    /// Axial position of the lens exit plane [m].
    pub lens_exit: f64,
    /// The unit ray as it leaves the lens.
    pub exit_ray: RayState,
}

impl FocalAnalysis {
    /// Axial position of the image-side focal point [m].
    pub fn focal_point(&self) -> Option<f64> {
        self.focal_length.value().map(|f| self.lens_exit + f)
    }

    /// Axial position of the image-side principal plane [m].
    pub fn principal_plane(&self) -> Option<f64> {
        match (self.focal_point(), self.effective_focal_length.value()) {
            (Some(focus), Some(efl)) => Some(focus - efl),
            _ => None,
        }
    }
}

/// Integrates the paraxial ray equation to find the focal length of a lens.
#[derive(Copy, Clone, Debug, Default)]
pub struct FocalLengthSolver {
    settings: SolverSettings,
}

impl FocalLengthSolver {
    #[inline]
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Focal length of `field`, with voltages measured from the cathode.
    pub fn focal_length<F: AxialField>(
        &self,
        field: &F,
        polarity: Polarity,
    ) -> Result<FocalLength, Error> {
        Ok(self.analyze(field, polarity, &None)?.focal_length)
    }

    pub fn analyze<F: AxialField>(
        &self,
        field: &F,
        polarity: Polarity,
        bar: &Option<indicatif::ProgressBar>,
    ) -> Result<FocalAnalysis, Error> {
        let params = field.integration_parameters(&self.settings);
        let extent = field.extent();
        let equation = Paraxial::new(BeamPotential::from_cathode(field, polarity));
        let guard = DivergenceGuard {
            max_height: self.settings.divergence_bound,
            max_slope: self.settings.divergence_bound / extent,
        };

        // advance the progress bar in ~100 increments
        let tick = (params.nsteps / 100).max(1);
        let mut taken = 0usize;
        let start = RayState { r: 1.0, slope: 0.0 };
        let exit_ray = integrate(&equation, &guard, 0.0, extent, params.nsteps, start, |_, _, _, _| {
            taken += 1;
            if taken % tick == 0 {
                if let Some(ref bar) = bar {
                    bar.inc(tick as u64);
                }
            }
            Ok(())
        })?;
        if let Some(ref bar) = bar {
            bar.finish();
        }

        let parallel =
            exit_ray.slope.abs() * extent <= self.settings.parallel_tolerance * exit_ray.r.abs();
        let (focal_length, effective_focal_length) = if parallel {
            (FocalLength::Undefined, FocalLength::Undefined)
        } else {
            (
                FocalLength::Finite(-exit_ray.r / exit_ray.slope),
                FocalLength::Finite(-start.r / exit_ray.slope),
            )
        };

        Ok(FocalAnalysis {
            focal_length,
            effective_focal_length,
            lens_exit: extent,
            exit_ray,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::PotentialField;
    use crate::lens;
    use crate::ErrorKind;

    fn solve(spacings: &[f64], thicknesses: &[f64], diameter: f64, voltages: &[f64]) -> Result<FocalLength, Error> {
        let (stack, volts) = lens::build(spacings, thicknesses, diameter, voltages)?;
        let field = PotentialField::new(&stack, &volts)?;
        FocalLengthSolver::default().focal_length(&field, volts.polarity())
    }

    #[test]
    fn uniform_lens_has_no_focus() {
        let f = solve(&[1e-3; 3], &[1e-3; 3], 2e-3, &[500.0; 3]).unwrap();
        assert!(f.is_undefined());
        let f = solve(&[1e-3; 3], &[1e-3; 3], 2e-3, &[0.0; 3]).unwrap();
        assert!(f.is_undefined());
        assert_eq!(f.to_string(), "undefined");
    }

    #[test]
    fn einzel_lens_converges() {
        for &center in &[700.0, 1500.0] {
            let f = solve(&[1e-3, 1e-3, 1e-3], &[6e-3, 2e-3, 6e-3], 2e-3, &[1000.0, center, 1000.0])
                .unwrap();
            let f = f.value().unwrap();
            assert!(f > 0.0 && f.is_finite(), "center {} V gave f = {}", center, f);
        }
    }

    #[test]
    fn strong_einzel_lens_converges() {
        // the focus may fall inside the lens, so look at the principal-plane focal length
        let (stack, volts) =
            lens::build(&[1e-3, 1e-3, 1e-3], &[6e-3, 2e-3, 6e-3], 2e-3, &[1000.0, 400.0, 1000.0])
                .unwrap();
        let field = PotentialField::new(&stack, &volts).unwrap();
        let analysis = FocalLengthSolver::default()
            .analyze(&field, volts.polarity(), &None)
            .unwrap();
        assert!(analysis.effective_focal_length.value().unwrap() > 0.0);
        assert!(analysis.exit_ray.slope < 0.0);
    }

    #[test]
    fn refining_steps_converges() {
        let (stack, volts) =
            lens::build(&[1e-3, 1e-3, 1e-3], &[6e-3, 2e-3, 6e-3], 2e-3, &[1000.0, 700.0, 1000.0])
                .unwrap();
        let field = PotentialField::new(&stack, &volts).unwrap();
        let coarse = FocalLengthSolver::new(SolverSettings { steps_per_feature: 32, ..Default::default() })
            .focal_length(&field, volts.polarity())
            .unwrap()
            .value()
            .unwrap();
        let fine = FocalLengthSolver::new(SolverSettings { steps_per_feature: 128, ..Default::default() })
            .focal_length(&field, volts.polarity())
            .unwrap()
            .value()
            .unwrap();
        assert!((coarse - fine).abs() / fine < 1e-6);
    }

    #[test]
    fn sign_changing_potential_is_unstable() {
        let err = solve(&[1e-3; 3], &[2e-3, 1e-3, 2e-3], 2e-3, &[1000.0, -1000.0, 1000.0])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericalInstability);
    }

    #[test]
    fn principal_plane_lies_behind_focus() {
        let (stack, volts) =
            lens::build(&[1e-3, 1e-3, 1e-3], &[6e-3, 2e-3, 6e-3], 2e-3, &[1000.0, 700.0, 1000.0])
                .unwrap();
        let field = PotentialField::new(&stack, &volts).unwrap();
        let analysis = FocalLengthSolver::default()
            .analyze(&field, volts.polarity(), &None)
            .unwrap();
        let focus = analysis.focal_point().unwrap();
        let plane = analysis.principal_plane().unwrap();
        assert!(focus > analysis.lens_exit);
        assert!(plane < focus);
        assert!(analysis.exit_ray.r < 1.0);
    }
}
