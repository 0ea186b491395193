//! Physical constants used by the electron model (CODATA 2018).

/// Elementary charge [C].
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Electron rest mass [kg].
pub const ELECTRON_MASS: f64 = 9.109_383_701_5e-31;

/// Magnitude of the electron charge-to-mass ratio [C / kg].
pub const ELECTRON_CHARGE_TO_MASS: f64 = ELEMENTARY_CHARGE / ELECTRON_MASS;

/// Speed of a non-relativistic electron carrying `kinetic_ev` electron-volts of kinetic energy.
#[inline]
pub fn electron_speed(kinetic_ev: f64) -> f64 {
    f64::sqrt(2.0 * ELECTRON_CHARGE_TO_MASS * kinetic_ev.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_kev_electron_speed() {
        // ~1.875e7 m/s for 1 keV
        let v = electron_speed(1000.0);
        assert!((v - 1.8755e7).abs() / 1.8755e7 < 1e-3);
    }

    #[test]
    fn negative_energy_has_no_speed() {
        assert_eq!(electron_speed(-5.0), 0.0);
    }
}
