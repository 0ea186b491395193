use crate::constants::electron_speed;
use crate::lens::Polarity;
use crate::ray::integrator::integrate;
use crate::ray::{BeamPotential, DivergenceGuard, EnergyConserving, Paraxial, RayEquation, RayModel, RayState};
use crate::{AxialField, Error, SolverSettings};

/// Initial conditions of an electron entering the lens at `z = 0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Release {
    /// Angle to the axis [rad].
    pub angle: f64,
    /// Radial offset from the axis [m].
    pub offset: f64,
    /// Kinetic energy [eV].
    pub energy: f64,
}

impl Release {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.angle.is_finite() && self.angle.abs() < std::f64::consts::FRAC_PI_2) {
            return Err(Error::invalid("release angle", self.angle, "must lie strictly between -π/2 and π/2"));
        }
        if !self.offset.is_finite() {
            return Err(Error::invalid("release offset", self.offset, "must be finite"));
        }
        if !(self.energy.is_finite() && self.energy > 0.0) {
            return Err(Error::invalid("release energy", self.energy, "must be finite and positive"));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn initial_state(&self) -> RayState {
        RayState {
            r: self.offset,
            slope: self.angle.tan(),
        }
    }
}

/// A sampled electron path.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    pub(crate) z: ndarray::Array1<f64>,
    pub(crate) r: ndarray::Array1<f64>,
    pub(crate) slope: ndarray::Array1<f64>,
    pub(crate) time: ndarray::Array1<f64>,
    pub(crate) exit_energy: f64,
    pub(crate) max_slope: f64,
}

impl Trajectory {
    #[inline]
    pub fn len(&self) -> usize {
        self.z.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    /// Axial sample positions [m], evenly spaced from the lens entrance to its exit.
    #[inline]
    pub fn z(&self) -> ndarray::ArrayView1<f64> {
        self.z.view()
    }

    /// Radial offsets [m].
    #[inline]
    pub fn r(&self) -> ndarray::ArrayView1<f64> {
        self.r.view()
    }

    /// dr/dz at each sample.
    #[inline]
    pub fn slope(&self) -> ndarray::ArrayView1<f64> {
        self.slope.view()
    }

    /// Time of flight from the release point to each sample [s].
    #[inline]
    pub fn time(&self) -> ndarray::ArrayView1<f64> {
        self.time.view()
    }

    /// The `(z, r)` samples in order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.z.iter().copied().zip(self.r.iter().copied())
    }

    pub fn to_points(&self) -> Vec<(f64, f64)> {
        self.points().collect()
    }

    /// Kinetic energy at the lens exit [eV].
    #[inline]
    pub fn exit_energy(&self) -> f64 {
        self.exit_energy
    }

    #[inline]
    pub fn time_of_flight(&self) -> f64 {
        self.time[self.time.len() - 1]
    }

    /// The largest `|dr/dz|` met anywhere along the path, including between samples.
    #[inline]
    pub fn max_slope(&self) -> f64 {
        self.max_slope
    }

    /// Whether the ray left the small-angle regime somewhere in the lens.
    #[inline]
    pub fn paraxial_violation(&self) -> bool {
        self.max_slope > 1.0
    }
}

/// Traces single electrons through an axial field.
#[derive(Copy, Clone, Debug, Default)]
pub struct TrajectoryIntegrator {
    settings: SolverSettings,
    model: RayModel,
}

impl TrajectoryIntegrator {
    #[inline]
    pub fn new(settings: SolverSettings, model: RayModel) -> Self {
        Self { settings, model }
    }

    /// Traces `release` across `field`, returning `npoints` samples evenly spaced
    /// from `z = 0` to the lens exit.
    pub fn trace<F: AxialField>(
        &self,
        field: &F,
        polarity: Polarity,
        release: &Release,
        npoints: usize,
        bar: &Option<indicatif::ProgressBar>,
    ) -> Result<Trajectory, Error> {
        if npoints < 2 {
            return Err(Error::invalid("datapoint count", npoints as f64, "must be at least 2"));
        }
        release.validate()?;

        let beam = BeamPotential::from_release(field, polarity, release.energy)?;
        match self.model {
            RayModel::EnergyConserving => {
                self.run(&EnergyConserving::new(beam), field, release, npoints, bar)
            }
            RayModel::Paraxial => self.run(&Paraxial::new(beam), field, release, npoints, bar),
        }
    }

    fn run<E: RayEquation, F: AxialField>(
        &self,
        eq: &E,
        field: &F,
        release: &Release,
        npoints: usize,
        bar: &Option<indicatif::ProgressBar>,
    ) -> Result<Trajectory, Error> {
        let extent = eq.extent();
        let params = field.integration_parameters(&self.settings);
        let sample_dz = extent / ((npoints - 1) as f64);
        let substeps = ((sample_dz / params.delta_z).ceil() as usize).max(1);

        let start = release.initial_state();
        let height_scale = (start.r.abs() + start.slope.abs() * extent).max(extent);
        let guard = DivergenceGuard {
            max_height: self.settings.divergence_bound * height_scale,
            max_slope: self.settings.divergence_bound * (height_scale / extent).max(1.0),
        };

        let mut z = ndarray::Array1::<f64>::zeros(npoints);
        let mut r = ndarray::Array1::<f64>::zeros(npoints);
        let mut slope = ndarray::Array1::<f64>::zeros(npoints);
        let mut time = ndarray::Array1::<f64>::zeros(npoints);
        r[0] = start.r;
        slope[0] = start.slope;

        let mut state = start;
        let mut speed = electron_speed(eq.kinetic_energy(0.0, &start)?);
        let mut elapsed = 0.0;
        let mut max_slope = start.slope.abs();

        for i in 1..npoints {
            let z0 = z[i - 1];
            let z1 = if i == npoints - 1 { extent } else { (i as f64) * sample_dz };
            state = integrate(eq, &guard, z0, z1, substeps, state, |a, b, before, after| {
                let next_speed = electron_speed(eq.kinetic_energy(b, after)?);
                if next_speed <= 0.0 {
                    return Err(Error::unstable(b, "electron came to rest"));
                }
                let stretch_a = (1.0 + before.slope * before.slope).sqrt();
                let stretch_b = (1.0 + after.slope * after.slope).sqrt();
                elapsed += 0.5 * (b - a) * (stretch_a / speed + stretch_b / next_speed);
                speed = next_speed;
                max_slope = max_slope.max(after.slope.abs());
                Ok(())
            })?;

            z[i] = z1;
            r[i] = state.r;
            slope[i] = state.slope;
            time[i] = elapsed;

            if let Some(ref bar) = bar {
                bar.inc(1);
            }
        }
        if let Some(ref bar) = bar {
            bar.finish();
        }

        let exit_energy = eq.kinetic_energy(extent, &state)?;

        Ok(Trajectory {
            z,
            r,
            slope,
            time,
            exit_energy,
            max_slope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::PotentialField;
    use crate::lens;
    use crate::ErrorKind;

    fn field(voltages: &[f64]) -> (PotentialField, Polarity) {
        let (stack, volts) =
            lens::build(&[1e-3, 1e-3, 1e-3], &[3e-3, 2e-3, 3e-3], 2e-3, voltages).unwrap();
        (PotentialField::new(&stack, &volts).unwrap(), volts.polarity())
    }

    const RELEASE: Release = Release {
        angle: 1e-3,
        offset: 5e-5,
        energy: 500.0,
    };

    #[test]
    fn samples_span_lens() {
        let (f, p) = field(&[1000.0, 700.0, 1000.0]);
        let t = TrajectoryIntegrator::default().trace(&f, p, &RELEASE, 57, &None).unwrap();
        assert_eq!(t.len(), 57);
        assert_eq!(t.z()[0], 0.0);
        assert_eq!(t.z()[56], f.extent());
        assert!(t.z().windows(2).into_iter().all(|w| w[1] > w[0]));
        assert_eq!(t.r()[0], RELEASE.offset);
    }

    #[test]
    fn field_free_ray_is_straight() {
        let (f, p) = field(&[300.0; 3]);
        let t = TrajectoryIntegrator::default().trace(&f, p, &RELEASE, 11, &None).unwrap();
        let slope = RELEASE.angle.tan();
        for (z, r) in t.points() {
            assert!((r - (RELEASE.offset + slope * z)).abs() < 1e-15);
        }
        assert!((t.exit_energy() - RELEASE.energy).abs() < 1e-9);
        let path = f.extent() * (1.0 + slope * slope).sqrt();
        let expected = path / electron_speed(RELEASE.energy);
        assert!((t.time_of_flight() - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn energy_is_conserved_on_axis() {
        let (f, p) = field(&[1000.0, 700.0, 1000.0]);
        let release = Release { angle: 0.0, offset: 0.0, energy: 400.0 };
        let t = TrajectoryIntegrator::default().trace(&f, p, &release, 5, &None).unwrap();
        let entrance = f.potential_at(0.0).unwrap().v;
        let exit = f.potential_at(f.extent()).unwrap().v;
        assert!((t.exit_energy() - (400.0 + exit - entrance)).abs() < 1e-9);
        assert!(t.r().iter().all(|&r| r == 0.0));
    }

    #[test]
    fn models_agree_for_small_rays() {
        let (f, p) = field(&[1000.0, 700.0, 1000.0]);
        let release = Release { angle: 1e-5, offset: 1e-6, energy: 1000.0 };
        let full = TrajectoryIntegrator::new(SolverSettings::default(), RayModel::EnergyConserving)
            .trace(&f, p, &release, 21, &None)
            .unwrap();
        let para = TrajectoryIntegrator::new(SolverSettings::default(), RayModel::Paraxial)
            .trace(&f, p, &release, 21, &None)
            .unwrap();
        for (a, b) in full.r().iter().zip(para.r().iter()) {
            assert!((a - b).abs() < 1e-6 * b.abs().max(1e-6));
        }
    }

    #[test]
    fn rejects_bad_requests() {
        let (f, p) = field(&[1000.0, 700.0, 1000.0]);
        let integrator = TrajectoryIntegrator::default();
        let err = integrator.trace(&f, p, &RELEASE, 1, &None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let zero = Release { energy: 0.0, ..RELEASE };
        assert_eq!(integrator.trace(&f, p, &zero, 10, &None).unwrap_err().kind(), ErrorKind::Validation);
        let steep = Release { angle: 2.0, ..RELEASE };
        assert!(integrator.trace(&f, p, &steep, 10, &None).is_err());
    }

    #[test]
    fn reflected_electron_is_unstable() {
        let (f, p) = field(&[1000.0, 500.0, 1000.0]);
        let slow = Release { energy: 100.0, ..RELEASE };
        let err = TrajectoryIntegrator::default().trace(&f, p, &slow, 10, &None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericalInstability);
    }

    #[test]
    fn steep_ray_is_flagged() {
        let (f, p) = field(&[300.0; 3]);
        let steep = Release { angle: 1.0, offset: 0.0, energy: 10.0 };
        let t = TrajectoryIntegrator::default().trace(&f, p, &steep, 3, &None).unwrap();
        assert!(t.paraxial_violation());
        assert!(!TrajectoryIntegrator::default()
            .trace(&f, p, &RELEASE, 3, &None)
            .unwrap()
            .paraxial_violation());
    }
}
