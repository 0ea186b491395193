use crate::Error;

/// Decay constant of the potential between two coaxial tubes, in units of the
/// bore radius.
pub const TUBE_GAP_OMEGA: f64 = 1.318;

// below this gap/radius ratio the closed form loses precision to cancellation
const THIN_GAP_RATIO: f64 = 1e-6;

/// The normalized potential step across a gap between two coaxial tubes.
///
/// Goes from 0 far before the gap to 1 far behind it and only depends on the gap
/// length and the bore radius, so the same profile is reused wherever a gap of
/// that size sits on the axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GapProfile {
    length: f64,
    radius: f64,
}

impl GapProfile {
    pub fn new(length: f64, radius: f64) -> Result<Self, Error> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::invalid("bore radius", radius, "must be finite and positive"));
        }
        if !(length.is_finite() && length >= 0.0) {
            return Err(Error::invalid("gap length", length, "must be finite and non-negative"));
        }
        Ok(Self { length, radius })
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The step and its first three derivatives at `u`, measured from the gap center.
    pub fn eval(&self, u: f64) -> [f64; 4] {
        let k = TUBE_GAP_OMEGA / self.radius;
        let g = self.length;

        if g < THIN_GAP_RATIO * self.radius {
            let t = f64::tanh(k * u);
            let s2 = 1.0 - t * t;
            return [
                0.5 * (1.0 + t),
                0.5 * k * s2,
                -k * k * s2 * t,
                -k * k * k * (s2 * s2 - 2.0 * s2 * t * t),
            ];
        }

        let a = k * (u + 0.5 * g);
        let b = k * (u - 0.5 * g);
        let (ta, tb) = (a.tanh(), b.tanh());
        let (sa, sb) = (1.0 - ta * ta, 1.0 - tb * tb);

        [
            0.5 + (ln_cosh(a) - ln_cosh(b)) / (2.0 * k * g),
            (ta - tb) / (2.0 * g),
            k * (sa - sb) / (2.0 * g),
            -k * k * (sa * ta - sb * tb) / g,
        ]
    }
}

/// `ln(cosh(x))` without overflow for large `|x|`.
#[inline]
fn ln_cosh(x: f64) -> f64 {
    let x = x.abs();
    x + (-2.0 * x).exp().ln_1p() - std::f64::consts::LN_2
}
