use rayon::prelude::*;

use crate::aperture::{aperture_focal_lengths, combined_focal_length, thin_aperture_trace};
use crate::field::PotentialField;
use crate::lens::{self, LensStack, VoltageProfile};
use crate::ray::{
    FocalAnalysis, FocalLength, FocalLengthSolver, RayModel, Release, Trajectory,
    TrajectoryIntegrator,
};
use crate::{AxialField, Error, SolverSettings};

/// A lens description as supplied by a caller.
#[derive(Clone, Debug, PartialEq)]
pub struct LensRequest {
    /// Gap in front of each electrode [m].
    pub spacings: Vec<f64>,
    /// Axial thickness of each electrode [m].
    pub thicknesses: Vec<f64>,
    /// Bore diameter shared by all electrodes [m].
    pub diameter: f64,
    /// Voltage of each electrode [V].
    pub voltages: Vec<f64>,
}

impl LensRequest {
    fn build(&self) -> Result<(LensStack, VoltageProfile), Error> {
        lens::build(&self.spacings, &self.thicknesses, self.diameter, &self.voltages)
    }
}

/// A request to trace one electron through a lens.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRequest {
    pub lens: LensRequest,
    pub release: Release,
    /// Number of evenly spaced samples to return, including both lens ends.
    pub num_points: usize,
    pub model: RayModel,
}

/// Describes a simulation.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimulationDescriptor {
    /// Numerical settings for every integration.
    pub settings: SolverSettings,
    /// Whether or not to print information to the console.
    pub verbose: bool,
}

/// The main `struct` of the framework.
///
/// Holds no state between calls: every operation builds its lens from the
/// request, so one `Simulation` can serve any number of threads.
#[derive(Copy, Clone, Debug, Default)]
pub struct Simulation {
    settings: SolverSettings,
    verbose: bool,
}

impl Simulation {
    /// Creates a new `Simulation` instance.
    #[inline]
    pub fn new(desc: SimulationDescriptor) -> Result<Self, Error> {
        desc.settings.validate()?;

        Ok(Self {
            settings: desc.settings,
            verbose: desc.verbose,
        })
    }

    #[inline]
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// The focal length of a lens, measured from its exit plane.
    pub fn focal_length(&self, req: &LensRequest) -> Result<FocalLength, Error> {
        Ok(self.focal_analysis(req)?.focal_length)
    }

    /// Full paraxial imaging properties of a lens.
    pub fn focal_analysis(&self, req: &LensRequest) -> Result<FocalAnalysis, Error> {
        let (stack, voltages) = req.build()?;
        let field = PotentialField::with_settings(&stack, &voltages, &self.settings)?;

        let bar = self.report(&stack, &field, field.integration_parameters(&self.settings).nsteps);
        let analysis = FocalLengthSolver::new(self.settings).analyze(&field, voltages.polarity(), &bar)?;

        if self.verbose {
            println!("focal length: {} m\n", analysis.focal_length);
        }
        Ok(analysis)
    }

    /// Thin-aperture estimate of the focal length, combining every electrode as
    /// a thin lens.
    pub fn thin_lens_estimate(&self, req: &LensRequest) -> Result<FocalLength, Error> {
        let (stack, voltages) = req.build()?;
        Ok(combined_focal_length(&aperture_focal_lengths(&stack, &voltages)?))
    }

    /// Traces one electron through the lens.
    pub fn trace(&self, req: &TraceRequest) -> Result<Trajectory, Error> {
        let (stack, voltages) = req.lens.build()?;
        if req.num_points < 2 {
            return Err(Error::invalid("datapoint count", req.num_points as f64, "must be at least 2"));
        }
        req.release.validate()?;
        let field = PotentialField::with_settings(&stack, &voltages, &self.settings)?;

        let bar = self.report(&stack, &field, req.num_points - 1);
        let trajectory = TrajectoryIntegrator::new(self.settings, req.model).trace(
            &field,
            voltages.polarity(),
            &req.release,
            req.num_points,
            &bar,
        )?;

        self.summarize(&trajectory);
        Ok(trajectory)
    }

    /// Traces one electron with every electrode acting as a thin aperture lens.
    ///
    /// No field is built, so this also works for layouts too dense for the
    /// integrated solvers.
    pub fn thin_lens_trace(
        &self,
        lens: &LensRequest,
        release: &Release,
        num_points: usize,
    ) -> Result<Trajectory, Error> {
        let (stack, voltages) = lens.build()?;
        let trajectory = thin_aperture_trace(&stack, &voltages, release, num_points)?;

        self.summarize(&trajectory);
        Ok(trajectory)
    }

    /// Traces independent requests in parallel. Results keep the order of `reqs`.
    pub fn trace_many(&self, reqs: &[TraceRequest]) -> Vec<Result<Trajectory, Error>> {
        let quiet = Self {
            verbose: false,
            ..*self
        };
        reqs.par_iter().map(|req| quiet.trace(req)).collect()
    }

    fn summarize(&self, trajectory: &Trajectory) {
        if !self.verbose {
            return;
        }
        println!(
            "exit energy:    {:<9.3e} eV\n\
            time of flight: {:<9.3e} s\n",
            trajectory.exit_energy(),
            trajectory.time_of_flight(),
        );
        if trajectory.paraxial_violation() {
            println!(
                "warning: ray slope reached {:.3} rad, the paraxial approximation is violated",
                trajectory.max_slope(),
            );
        }
    }

    fn report(
        &self,
        stack: &LensStack,
        field: &PotentialField,
        nsteps: usize,
    ) -> Option<indicatif::ProgressBar> {
        if !self.verbose {
            return None;
        }
        let params = field.integration_parameters(&self.settings);
        println!(
            "\n-- General Lens Info --\n\
            # of electrodes: {}\n\
            length:          {:<9.2e} m\n\
            bore diameter:   {:<9.2e} m\n\
            Δz:              {:<9.2e} m\n\
            # of steps:      {}\n",
            stack.len(),
            stack.length(),
            stack.aperture_diameter(),
            params.delta_z,
            params.nsteps,
        );
        Some(indicatif::ProgressBar::new(nsteps as u64))
    }
}

/// Focal length of a lens with default settings.
///
/// Lengths in metres, voltages in volts.
pub fn focal_length(
    spacings: &[f64],
    thicknesses: &[f64],
    diameter: f64,
    voltages: &[f64],
) -> Result<FocalLength, Error> {
    Simulation::default().focal_length(&LensRequest {
        spacings: spacings.to_vec(),
        thicknesses: thicknesses.to_vec(),
        diameter,
        voltages: voltages.to_vec(),
    })
}

/// Traces an electron released at `z = 0` with default settings and the
/// energy-conserving ray model.
///
/// `angle` in radians, `offset` in metres, `energy` in eV.
#[allow(clippy::too_many_arguments)]
pub fn trace(
    spacings: &[f64],
    thicknesses: &[f64],
    diameter: f64,
    voltages: &[f64],
    angle: f64,
    offset: f64,
    energy: f64,
    num_points: usize,
) -> Result<Trajectory, Error> {
    Simulation::default().trace(&TraceRequest {
        lens: LensRequest {
            spacings: spacings.to_vec(),
            thicknesses: thicknesses.to_vec(),
            diameter,
            voltages: voltages.to_vec(),
        },
        release: Release {
            angle,
            offset,
            energy,
        },
        num_points,
        model: RayModel::EnergyConserving,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn lens_request(voltages: &[f64]) -> LensRequest {
        LensRequest {
            spacings: vec![1e-3; voltages.len()],
            thicknesses: vec![2e-3; voltages.len()],
            diameter: 2e-3,
            voltages: voltages.to_vec(),
        }
    }

    #[test]
    fn rejects_invalid_settings() {
        let desc = SimulationDescriptor {
            settings: SolverSettings {
                min_steps: 0,
                ..Default::default()
            },
            verbose: false,
        };
        assert_eq!(Simulation::new(desc).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn validation_precedes_field_construction() {
        let sim = Simulation::default();
        let mut req = TraceRequest {
            lens: lens_request(&[1000.0, 700.0, 1000.0]),
            release: Release { angle: 0.0, offset: 0.0, energy: 10.0 },
            num_points: 1,
            model: RayModel::EnergyConserving,
        };
        assert_eq!(sim.trace(&req).unwrap_err().kind(), ErrorKind::Validation);
        req.num_points = 10;
        req.lens.voltages.pop();
        assert!(matches!(sim.trace(&req).unwrap_err(), Error::BadLength { .. }));
    }

    #[test]
    fn batch_preserves_order() {
        let sim = Simulation::default();
        let reqs = [1e-5, -2e-5, 3e-5]
            .iter()
            .map(|&offset| TraceRequest {
                lens: lens_request(&[1000.0, 700.0, 1000.0]),
                release: Release { angle: 0.0, offset, energy: 1000.0 },
                num_points: 4,
                model: RayModel::Paraxial,
            })
            .collect::<Vec<_>>();
        let results = sim.trace_many(&reqs);
        assert_eq!(results.len(), 3);
        for (req, result) in reqs.iter().zip(results) {
            let t = result.unwrap();
            assert_eq!(t.r()[0], req.release.offset);
            assert_eq!(t, sim.trace(req).unwrap());
        }
    }

    #[test]
    fn thin_lens_estimate_sums_aperture_powers() {
        let sim = Simulation::default();
        let f = sim.thin_lens_estimate(&lens_request(&[1000.0, 400.0, 1000.0])).unwrap();
        // apertures: 4 * 1000 / 6e5, 4 * 400 / -1.2e6, 4 * 1000 / 6e5
        let power: f64 = 2.0 * 6e5 / 4000.0 - 1.2e6 / 1600.0;
        assert!((f.value().unwrap() - power.recip()).abs() < 1e-9);
        assert!(sim.thin_lens_estimate(&lens_request(&[500.0; 3])).unwrap().is_undefined());
    }

    #[test]
    fn dense_layout_fails_integrated_but_not_thin_trace() {
        let sim = Simulation::default();
        let lens = LensRequest {
            spacings: vec![1e-3, 1e-4, 1e-4],
            thicknesses: vec![1e-6; 3],
            diameter: 2e-3,
            voltages: vec![1000.0, 700.0, 1000.0],
        };
        let err = sim.focal_length(&lens).unwrap_err();
        assert!(matches!(err, Error::IllConditioned { .. }));
        assert_eq!(err.kind(), ErrorKind::NumericalInstability);

        let release = Release { angle: 1e-3, offset: 1e-5, energy: 1000.0 };
        let req = TraceRequest {
            lens: lens.clone(),
            release,
            num_points: 10,
            model: RayModel::EnergyConserving,
        };
        assert!(matches!(sim.trace(&req).unwrap_err(), Error::IllConditioned { .. }));

        let t = sim.thin_lens_trace(&lens, &release, 10).unwrap();
        assert_eq!(t.len(), 10);
        assert_eq!(t.exit_energy(), 1000.0);
    }
}
