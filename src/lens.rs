//! Electrode stack geometry and the voltages applied to it.

mod geometry;
mod voltage;

pub use geometry::{Electrode, ElectrodeSegment, Gap, LensStack};
pub use voltage::{Polarity, VoltageProfile};

use crate::Error;

/// Validates a lens description and binds its voltages.
///
/// All lengths are in metres and voltages in volts. Every sequence must be
/// non-empty and of the same length; spacings must be non-negative and
/// thicknesses and the diameter positive.
pub fn build(
    spacings: &[f64],
    thicknesses: &[f64],
    diameter: f64,
    voltages: &[f64],
) -> Result<(LensStack, VoltageProfile), Error> {
    if voltages.is_empty() {
        return Err(Error::Empty {
            array_name: "Voltage".to_string(),
        });
    }
    if voltages.len() != spacings.len() {
        return Err(Error::BadLength {
            array_name: "Voltage".to_string(),
            input_length: voltages.len(),
            expected_length: spacings.len(),
        });
    }
    let stack = LensStack::new(spacings, thicknesses, diameter)?;
    let profile = VoltageProfile::new(&stack, voltages)?;

    Ok((stack, profile))
}
