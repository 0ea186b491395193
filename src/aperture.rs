//! Thin-aperture model of a lens.
//!
//! Every electrode is treated as a thin aperture lens between the uniform
//! fields of its neighbouring gaps (Davisson-Calbick), `f = 4Φ / (E_in - E_out)`
//! with `E` the potential gradient on each side. The apertures are combined as
//! thin lenses in contact for a closed-form focal length, or applied one after
//! another to trace a ray. This is a quick cross-check of the integrated
//! solvers, good when the gaps are long compared to the bore.

use crate::constants::electron_speed;
use crate::lens::{LensStack, VoltageProfile};
use crate::ray::{FocalLength, RayState, Release, Trajectory};
use crate::Error;

/// The focal length of each electrode treated as a thin aperture.
///
/// The space in front of the first electrode and behind the last one is taken
/// as field-free, and so is a zero-length gap.
pub fn aperture_focal_lengths(
    stack: &LensStack,
    voltages: &VoltageProfile,
) -> Result<Vec<FocalLength>, Error> {
    check_lengths(stack, voltages)?;
    let sign = voltages.polarity().sign();
    let phi = voltages.as_slice().iter().map(|v| sign * v).collect::<Vec<_>>();
    thin_lenses(stack, &phi)
}

/// Combines thin lenses in contact: `1/F = Σ 1/f_i`.
pub fn combined_focal_length(focal_lengths: &[FocalLength]) -> FocalLength {
    let power = focal_lengths
        .iter()
        .filter_map(FocalLength::value)
        .map(f64::recip)
        .sum::<f64>();

    if power == 0.0 || !power.is_finite() {
        FocalLength::Undefined
    } else {
        FocalLength::Finite(power.recip())
    }
}

/// Traces `release` through the stack with every electrode acting as a thin
/// aperture at its center.
///
/// Inside an electrode the ray is straight. Across a gap the field is uniform,
/// so `sqrt(Φ) r'` is conserved and the slope shrinks as `sqrt(Φ_in / Φ_out)`.
/// At each electrode center the slope takes a kick of `-r / f`. The electron
/// has its release energy at `z = 0`, as in the integrated trace.
pub fn thin_aperture_trace(
    stack: &LensStack,
    voltages: &VoltageProfile,
    release: &Release,
    npoints: usize,
) -> Result<Trajectory, Error> {
    if npoints < 2 {
        return Err(Error::invalid("datapoint count", npoints as f64, "must be at least 2"));
    }
    release.validate()?;
    check_lengths(stack, voltages)?;

    let sign = voltages.polarity().sign();
    let entrance = voltages.as_slice()[0];
    let phi = voltages
        .as_slice()
        .iter()
        .map(|v| release.energy + sign * (v - entrance))
        .collect::<Vec<_>>();
    let lenses = thin_lenses(stack, &phi)?;

    let electrodes = stack.electrodes();
    let mut segments = Vec::with_capacity(3 * electrodes.len());
    let mut ray = release.initial_state();
    let mut max_slope = ray.slope.abs();
    for (electrode, lens) in electrodes.iter().zip(lenses.iter()) {
        let i = electrode.index;
        let center = electrode.center();
        if i == 0 {
            ray = advance(&mut segments, ray, 0.0, center, phi[0], phi[0]);
        } else {
            ray = advance(&mut segments, ray, electrodes[i - 1].end, electrode.start, phi[i - 1], phi[i]);
            max_slope = max_slope.max(ray.slope.abs());
            ray = advance(&mut segments, ray, electrode.start, center, phi[i], phi[i]);
        }
        if let FocalLength::Finite(f) = *lens {
            ray.slope -= ray.r / f;
        }
        max_slope = max_slope.max(ray.slope.abs());
        ray = advance(&mut segments, ray, center, electrode.end, phi[i], phi[i]);
    }

    let extent = stack.length();
    let delta_z = extent / ((npoints - 1) as f64);
    let mut z = ndarray::Array1::<f64>::zeros(npoints);
    let mut r = ndarray::Array1::<f64>::zeros(npoints);
    let mut slope = ndarray::Array1::<f64>::zeros(npoints);
    let mut time = ndarray::Array1::<f64>::zeros(npoints);

    let mut current = 0;
    let mut previous: Option<(f64, f64)> = None;
    for i in 0..npoints {
        let zi = if i == npoints - 1 { extent } else { (i as f64) * delta_z };
        while current + 1 < segments.len() && zi > segments[current].end {
            current += 1;
        }
        let segment = &segments[current];
        let state = segment.ray_at(zi);
        // path length per unit z over speed
        let pace = (1.0 + state.slope * state.slope).sqrt() / electron_speed(segment.potential(zi));

        z[i] = zi;
        r[i] = state.r;
        slope[i] = state.slope;
        if let Some((z_prev, pace_prev)) = previous {
            time[i] = time[i - 1] + 0.5 * (zi - z_prev) * (pace_prev + pace);
        }
        previous = Some((zi, pace));
    }

    Ok(Trajectory {
        z,
        r,
        slope,
        time,
        exit_energy: phi[phi.len() - 1],
        max_slope,
    })
}

fn check_lengths(stack: &LensStack, voltages: &VoltageProfile) -> Result<(), Error> {
    if voltages.len() != stack.len() {
        return Err(Error::BadLength {
            array_name: "Voltage".to_string(),
            input_length: voltages.len(),
            expected_length: stack.len(),
        });
    }
    Ok(())
}

/// Davisson-Calbick focal lengths for the beam potential `phi` at each electrode.
fn thin_lenses(stack: &LensStack, phi: &[f64]) -> Result<Vec<FocalLength>, Error> {
    let gap_lengths = stack.gaps().map(|gap| gap.length).collect::<Vec<_>>();

    let gradient = |gap: usize| -> f64 {
        // gap `k` sits between electrodes `k` and `k + 1`
        match gap_lengths.get(gap) {
            Some(&length) if length > 0.0 => (phi[gap + 1] - phi[gap]) / length,
            _ => 0.0,
        }
    };

    stack
        .electrodes()
        .iter()
        .map(|electrode| {
            let i = electrode.index;
            if phi[i] <= 0.0 {
                return Err(Error::unstable(
                    electrode.center(),
                    format!("electrode {} sits at {:.3e} V, the electron is stopped", i, phi[i]),
                ));
            }
            let entry = if i == 0 { 0.0 } else { gradient(i - 1) };
            let exit = gradient(i);
            let jump = entry - exit;

            Ok(if jump == 0.0 {
                FocalLength::Undefined
            } else {
                FocalLength::Finite(4.0 * phi[i] / jump)
            })
        })
        .collect()
}

/// A stretch of the thin-aperture path with a linear potential and no lens action.
#[derive(Copy, Clone, Debug)]
struct Segment {
    start: f64,
    end: f64,
    phi_start: f64,
    phi_end: f64,
    ray: RayState,
}

impl Segment {
    fn potential(&self, z: f64) -> f64 {
        let length = self.end - self.start;
        if length > 0.0 {
            self.phi_start + (self.phi_end - self.phi_start) * (z - self.start) / length
        } else {
            self.phi_end
        }
    }

    fn ray_at(&self, z: f64) -> RayState {
        let root_start = self.phi_start.sqrt();
        let root = self.potential(z).sqrt();
        RayState {
            r: self.ray.r + self.ray.slope * 2.0 * (z - self.start) * root_start / (root + root_start),
            slope: self.ray.slope * root_start / root,
        }
    }
}

fn advance(
    segments: &mut Vec<Segment>,
    ray: RayState,
    start: f64,
    end: f64,
    phi_start: f64,
    phi_end: f64,
) -> RayState {
    let segment = Segment {
        start,
        end,
        phi_start,
        phi_end,
        ray,
    };
    segments.push(segment);
    segment.ray_at(end)
}
