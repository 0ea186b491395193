use crate::ray::RayEquation;
use crate::Error;

/// Height and slope of a ray at some axial position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayState {
    /// Radial offset from the axis [m].
    pub r: f64,
    /// dr/dz.
    pub slope: f64,
}

impl RayState {
    #[inline]
    fn advance(&self, h: f64, k: (f64, f64)) -> Self {
        Self {
            r: self.r + h * k.0,
            slope: self.slope + h * k.1,
        }
    }
}

/// Advances `state` from `z0` to `z1` with one classical Runge-Kutta step.
#[inline]
pub fn rk4_step<E: RayEquation>(
    eq: &E,
    z0: f64,
    z1: f64,
    state: RayState,
) -> Result<RayState, Error> {
    let h = z1 - z0;
    let z_mid = z0 + 0.5 * h;

    let k1 = (state.slope, eq.curvature(z0, &state)?);
    let s2 = state.advance(0.5 * h, k1);
    let k2 = (s2.slope, eq.curvature(z_mid, &s2)?);
    let s3 = state.advance(0.5 * h, k2);
    let k3 = (s3.slope, eq.curvature(z_mid, &s3)?);
    let s4 = state.advance(h, k3);
    let k4 = (s4.slope, eq.curvature(z1, &s4)?);

    Ok(RayState {
        r: state.r + h / 6.0 * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0),
        slope: state.slope + h / 6.0 * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1),
    })
}

/// Stops an integration whose ray runs away.
#[derive(Copy, Clone, Debug)]
pub struct DivergenceGuard {
    pub max_height: f64,
    pub max_slope: f64,
}

impl DivergenceGuard {
    pub fn check(&self, z: f64, state: &RayState) -> Result<(), Error> {
        if !(state.r.is_finite() && state.slope.is_finite()) {
            return Err(Error::unstable(z, "ray became non-finite"));
        }
        if state.r.abs() > self.max_height {
            return Err(Error::unstable(
                z,
                format!("ray height {:.3e} m exceeds {:.3e} m", state.r, self.max_height),
            ));
        }
        if state.slope.abs() > self.max_slope {
            return Err(Error::unstable(
                z,
                format!("ray slope {:.3e} exceeds {:.3e}", state.slope, self.max_slope),
            ));
        }
        Ok(())
    }
}

/// Integrates from `z0` to `z1` in `nsteps` equal steps, landing exactly on `z1`.
///
/// `on_step` is called after every step with the step's end points and states.
pub(crate) fn integrate<E, Fs>(
    eq: &E,
    guard: &DivergenceGuard,
    z0: f64,
    z1: f64,
    nsteps: usize,
    mut state: RayState,
    mut on_step: Fs,
) -> Result<RayState, Error>
where
    E: RayEquation,
    Fs: FnMut(f64, f64, &RayState, &RayState) -> Result<(), Error>,
{
    let nsteps = nsteps.max(1);
    let h = (z1 - z0) / (nsteps as f64);
    let mut z = z0;
    for i in 0..nsteps {
        let z_next = if i + 1 == nsteps { z1 } else { z0 + ((i + 1) as f64) * h };
        let next = rk4_step(eq, z, z_next, state)?;
        guard.check(z_next, &next)?;
        on_step(z, z_next, &state, &next)?;
        state = next;
        z = z_next;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// r'' = -k² r: harmonic motion with a known solution.
    struct Harmonic {
        k: f64,
    }

    impl RayEquation for Harmonic {
        fn curvature(&self, _z: f64, state: &RayState) -> Result<f64, Error> {
            Ok(-self.k * self.k * state.r)
        }
        fn kinetic_energy(&self, _z: f64, _state: &RayState) -> Result<f64, Error> {
            Ok(1.0)
        }
        fn extent(&self) -> f64 {
            1.0
        }
    }

    const GUARD: DivergenceGuard = DivergenceGuard {
        max_height: 1e6,
        max_slope: 1e6,
    };

    #[test]
    fn rk4_tracks_harmonic_solution() {
        let eq = Harmonic { k: 3.0 };
        let start = RayState { r: 1.0, slope: 0.0 };
        let end = integrate(&eq, &GUARD, 0.0, 1.0, 1000, start, |_, _, _, _| Ok(())).unwrap();
        assert!((end.r - f64::cos(3.0)).abs() < 1e-10);
        assert!((end.slope + 3.0 * f64::sin(3.0)).abs() < 1e-10);
    }

    #[test]
    fn rk4_is_fourth_order() {
        let eq = Harmonic { k: 5.0 };
        let start = RayState { r: 1.0, slope: 0.0 };
        let err = |n| {
            let end = integrate(&eq, &GUARD, 0.0, 1.0, n, start, |_, _, _, _| Ok(())).unwrap();
            (end.r - f64::cos(5.0)).abs()
        };
        let ratio = err(50) / err(100);
        assert!(ratio > 12.0 && ratio < 20.0, "ratio {}", ratio);
    }

    #[test]
    fn visits_every_step_and_lands_on_end() {
        let eq = Harmonic { k: 1.0 };
        let mut last = 0.0;
        let mut count = 0;
        integrate(&eq, &GUARD, 0.0, 0.3, 7, RayState { r: 0.0, slope: 1.0 }, |z0, z1, _, _| {
            assert_eq!(z0, last);
            last = z1;
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 7);
        assert_eq!(last, 0.3);
    }

    #[test]
    fn guard_stops_runaway_ray() {
        struct Runaway;
        impl RayEquation for Runaway {
            fn curvature(&self, _z: f64, state: &RayState) -> Result<f64, Error> {
                Ok(1e4 * state.r)
            }
            fn kinetic_energy(&self, _z: f64, _state: &RayState) -> Result<f64, Error> {
                Ok(1.0)
            }
            fn extent(&self) -> f64 {
                1.0
            }
        }
        let guard = DivergenceGuard {
            max_height: 1e3,
            max_slope: 1e9,
        };
        let err = integrate(&Runaway, &guard, 0.0, 1.0, 1000, RayState { r: 1.0, slope: 0.0 }, |_, _, _, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::NumericalInstability { .. }));
    }
}
