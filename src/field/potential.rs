use crate::field::{FieldSample, GapProfile, TUBE_GAP_OMEGA};
use crate::lens::{LensStack, VoltageProfile};
use crate::{AxialField, Error, SolverSettings};

// electrode amplitudes are considered unresolvable below this pivot
const MIN_PIVOT: f64 = 1e-9;

/// A potential step centered on one gap of the stack.
#[derive(Copy, Clone, Debug)]
struct GapStep {
    center: f64,
    profile: GapProfile,
    jump: f64,
}

/// The on-axis potential of a [`LensStack`] held at a [`VoltageProfile`].
///
/// Each gap contributes a smooth step whose shape depends only on the gap length
/// and the bore radius. The step heights are chosen so that the potential at the
/// center of every electrode equals that electrode's voltage.
#[derive(Clone, Debug)]
pub struct PotentialField {
    base: f64,
    steps: Vec<GapStep>,
    amplitudes: Vec<f64>,
    extent: f64,
    feature: f64,
}

impl PotentialField {
    /// Builds the field with the default amplitude correction limit.
    #[inline]
    pub fn new(stack: &LensStack, voltages: &VoltageProfile) -> Result<Self, Error> {
        Self::with_settings(stack, voltages, &SolverSettings::default())
    }

    /// Builds the field, rejecting a layout whose solved amplitudes stray further
    /// from the declared voltages than `settings.max_amplitude_correction` allows.
    pub fn with_settings(
        stack: &LensStack,
        voltages: &VoltageProfile,
        settings: &SolverSettings,
    ) -> Result<Self, Error> {
        if voltages.len() != stack.len() {
            return Err(Error::BadLength {
                array_name: "Voltage".to_string(),
                input_length: voltages.len(),
                expected_length: stack.len(),
            });
        }
        let radius = stack.bore_radius();
        let gaps = stack
            .gaps()
            .map(|gap| Ok((gap.center, GapProfile::new(gap.length, radius)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        let amplitudes = if voltages.is_uniform() || stack.len() == 1 {
            voltages.as_slice().to_vec()
        } else {
            let centers = stack.electrodes().iter().map(|e| e.center()).collect::<Vec<_>>();
            let amplitudes = solve_amplitudes(&centers, &gaps, voltages.as_slice())?;
            let condition = amplitude_correction(&amplitudes, voltages.as_slice());
            if condition > settings.max_amplitude_correction {
                return Err(Error::IllConditioned { condition });
            }
            amplitudes
        };

        let steps = gaps
            .iter()
            .zip(amplitudes.windows(2))
            .map(|(&(center, profile), pair)| GapStep {
                center,
                profile,
                jump: pair[1] - pair[0],
            })
            .collect::<Vec<_>>();

        Ok(Self {
            base: amplitudes[0],
            steps,
            amplitudes,
            extent: stack.length(),
            feature: radius / TUBE_GAP_OMEGA,
        })
    }

    /// The effective electrode potentials that pin each electrode center to its
    /// declared voltage.
    #[inline]
    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    /// Samples `npoints` evenly spaced positions across the lens.
    ///
    /// Returns one row per point holding `[z, V, V', V'']`.
    pub fn sample(&self, npoints: usize) -> Result<ndarray::Array2<f64>, Error> {
        if npoints < 2 {
            return Err(Error::invalid("sample count", npoints as f64, "must be at least 2"));
        }
        let mut out = ndarray::Array2::<f64>::zeros((npoints, 4));
        let delta_z = self.extent / ((npoints - 1) as f64);
        for (i, mut row) in out.rows_mut().into_iter().enumerate() {
            let z = if i == npoints - 1 { self.extent } else { (i as f64) * delta_z };
            let s = self.potential_at(z)?;
            row.assign(&ndarray::arr1(&[z, s.v, s.dv, s.d2v]));
        }
        Ok(out)
    }

    fn check_domain(&self, z: f64) -> Result<(), Error> {
        if (0.0..=self.extent).contains(&z) {
            Ok(())
        } else {
            Err(Error::OutOfDomain {
                z,
                z_max: self.extent,
            })
        }
    }

    fn eval(&self, z: f64) -> [f64; 4] {
        self.steps.iter().fold([self.base, 0.0, 0.0, 0.0], |mut acc, step| {
            let s = step.profile.eval(z - step.center);
            for (a, s) in acc.iter_mut().zip(s.iter()) {
                *a += step.jump * s;
            }
            acc
        })
    }
}

impl AxialField for PotentialField {
    #[inline]
    fn extent(&self) -> f64 {
        self.extent
    }

    fn potential_at(&self, z: f64) -> Result<FieldSample, Error> {
        self.check_domain(z)?;
        let [v, dv, d2v, _] = self.eval(z);
        Ok(FieldSample { v, dv, d2v })
    }

    fn third_derivative_at(&self, z: f64) -> Result<f64, Error> {
        self.check_domain(z)?;
        Ok(self.eval(z)[3])
    }

    #[inline]
    fn smallest_feature(&self) -> f64 {
        self.feature
    }
}

/// Solves for electrode amplitudes `U` such that the superposed field hits each
/// declared voltage at its electrode center.
///
/// Row `i` holds the weights `S_k(c_i) - S_{k+1}(c_i)` with `S_0 = 1` and
/// `S_n = 0`, so every row sums to one.
fn solve_amplitudes(
    centers: &[f64],
    gaps: &[(f64, GapProfile)],
    voltages: &[f64],
) -> Result<Vec<f64>, Error> {
    let n = centers.len();
    let mut a = ndarray::Array2::<f64>::zeros((n, n));
    let mut b = ndarray::Array1::from(voltages.to_vec());

    for (i, &c) in centers.iter().enumerate() {
        let step = |k: usize| -> f64 {
            match k {
                0 => 1.0,
                k if k == n => 0.0,
                k => {
                    let (center, profile) = gaps[k - 1];
                    profile.eval(c - center)[0]
                }
            }
        };
        for k in 0..n {
            a[[i, k]] = step(k) - step(k + 1);
        }
    }

    // gaussian elimination with partial pivoting
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&p, &q| a[[p, col]].abs().total_cmp(&a[[q, col]].abs()))
            .unwrap_or(col);
        let pivot = a[[pivot_row, col]];
        if pivot.abs() < MIN_PIVOT {
            return Err(Error::IllConditioned {
                condition: f64::INFINITY,
            });
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap([col, k], [pivot_row, k]);
            }
            b.swap(col, pivot_row);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut u = vec![0.0; n];
    for row in (0..n).rev() {
        let tail = ((row + 1)..n).map(|k| a[[row, k]] * u[k]).sum::<f64>();
        u[row] = (b[row] - tail) / a[[row, row]];
    }

    if u.iter().any(|x| !x.is_finite()) {
        return Err(Error::IllConditioned {
            condition: f64::INFINITY,
        });
    }
    Ok(u)
}

/// The largest `|U_i - V_i|` in units of the voltage swing `max V - min V`.
///
/// Rows of the amplitude system sum to one, so a dense layout keeps healthy
/// pivots while its amplitudes run off to many times the applied voltages.
fn amplitude_correction(amplitudes: &[f64], voltages: &[f64]) -> f64 {
    let (lo, hi) = voltages
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let shift = amplitudes
        .iter()
        .zip(voltages.iter())
        .map(|(u, v)| (u - v).abs())
        .fold(0.0, f64::max);
    shift / (hi - lo)
}
