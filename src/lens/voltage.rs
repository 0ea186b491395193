use crate::lens::LensStack;
use crate::Error;

/// The sign of the potential that accelerates the beam through the stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }
}

/// One voltage per electrode, in stack order.
#[derive(Clone, Debug, PartialEq)]
pub struct VoltageProfile {
    voltages: Vec<f64>,
}

impl VoltageProfile {
    pub fn new(stack: &LensStack, voltages: &[f64]) -> Result<Self, Error> {
        if voltages.len() != stack.len() {
            return Err(Error::BadLength {
                array_name: "Voltage".to_string(),
                input_length: voltages.len(),
                expected_length: stack.len(),
            });
        }
        if let Some(&bad) = voltages.iter().find(|v| !v.is_finite()) {
            return Err(Error::invalid("voltage", bad, "must be finite"));
        }

        Ok(Self {
            voltages: voltages.to_vec(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.voltages
    }

    /// Whether every electrode sits at the same voltage.
    pub fn is_uniform(&self) -> bool {
        self.voltages.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// The sign of the voltage with the largest magnitude. Ties go to the first
    /// electrode; an all-zero stack counts as positive.
    pub fn polarity(&self) -> Polarity {
        let dominant = self
            .voltages
            .iter()
            .fold(0.0_f64, |best, &v| if v.abs() > best.abs() { v } else { best });
        if dominant < 0.0 {
            Polarity::Negative
        } else {
            Polarity::Positive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(n: usize) -> LensStack {
        LensStack::new(&vec![1e-3; n], &vec![1e-3; n], 1e-3).unwrap()
    }

    #[test]
    fn polarity_follows_dominant_voltage() {
        let p = VoltageProfile::new(&stack(3), &[100.0, -300.0, 200.0]).unwrap();
        assert_eq!(p.polarity(), Polarity::Negative);
        let p = VoltageProfile::new(&stack(3), &[-100.0, 300.0, 200.0]).unwrap();
        assert_eq!(p.polarity(), Polarity::Positive);
        let p = VoltageProfile::new(&stack(2), &[0.0, 0.0]).unwrap();
        assert_eq!(p.polarity(), Polarity::Positive);
    }

    #[test]
    fn polarity_flips_with_voltages() {
        let p = VoltageProfile::new(&stack(3), &[1000.0, -1000.0, 500.0]).unwrap();
        let q = VoltageProfile::new(&stack(3), &[-1000.0, 1000.0, -500.0]).unwrap();
        assert_eq!(p.polarity().sign(), -q.polarity().sign());
    }

    #[test]
    fn uniform_detection() {
        assert!(VoltageProfile::new(&stack(3), &[5.0; 3]).unwrap().is_uniform());
        assert!(!VoltageProfile::new(&stack(2), &[5.0, 6.0]).unwrap().is_uniform());
    }

    #[test]
    fn rejects_non_finite_voltage() {
        assert!(VoltageProfile::new(&stack(2), &[5.0, f64::INFINITY]).is_err());
    }
}
