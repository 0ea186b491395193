use crate::Error;

/// One electrode of the stack, with the gap in front of it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ElectrodeSegment {
    /// The gap before this electrode [m].
    pub spacing: f64,
    /// The axial thickness of the electrode [m].
    pub thickness: f64,
}

/// An electrode placed on the axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Electrode {
    pub index: usize,
    /// Entrance plane [m].
    pub start: f64,
    /// Exit plane [m].
    pub end: f64,
}

impl Electrode {
    #[inline]
    pub fn center(&self) -> f64 {
        0.5 * (self.start + self.end)
    }
}

/// The gap between electrode `index - 1` and electrode `index`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Gap {
    pub index: usize,
    pub center: f64,
    pub length: f64,
}

/// An ordered stack of coaxial electrodes sharing one bore diameter.
#[derive(Clone, Debug, PartialEq)]
pub struct LensStack {
    segments: Vec<ElectrodeSegment>,
    electrodes: Vec<Electrode>,
    aperture_diameter: f64,
    length: f64,
}

impl LensStack {
    pub fn new(spacings: &[f64], thicknesses: &[f64], diameter: f64) -> Result<Self, Error> {
        if spacings.is_empty() {
            return Err(Error::Empty {
                array_name: "Spacing".to_string(),
            });
        }
        if thicknesses.len() != spacings.len() {
            return Err(Error::BadLength {
                array_name: "Thickness".to_string(),
                input_length: thicknesses.len(),
                expected_length: spacings.len(),
            });
        }
        if !(diameter.is_finite() && diameter > 0.0) {
            return Err(Error::invalid("aperture diameter", diameter, "must be finite and positive"));
        }
        for &spacing in spacings {
            if !(spacing.is_finite() && spacing >= 0.0) {
                return Err(Error::invalid("spacing", spacing, "must be finite and non-negative"));
            }
        }
        for &thickness in thicknesses {
            if !(thickness.is_finite() && thickness > 0.0) {
                return Err(Error::invalid("thickness", thickness, "must be finite and positive"));
            }
        }

        let segments = spacings
            .iter()
            .zip(thicknesses.iter())
            .map(|(&spacing, &thickness)| ElectrodeSegment { spacing, thickness })
            .collect::<Vec<_>>();

        let mut position = 0.0;
        let electrodes = segments
            .iter()
            .enumerate()
            .map(|(index, seg)| {
                let start = position + seg.spacing;
                let end = start + seg.thickness;
                position = end;
                Electrode { index, start, end }
            })
            .collect::<Vec<_>>();

        Ok(Self {
            segments,
            electrodes,
            aperture_diameter: diameter,
            length: position,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn segments(&self) -> &[ElectrodeSegment] {
        &self.segments
    }

    #[inline]
    pub fn electrodes(&self) -> &[Electrode] {
        &self.electrodes
    }

    /// The gaps between neighbouring electrodes. The entrance spacing in front of
    /// the first electrode is a field-free drift and is not listed.
    pub fn gaps(&self) -> impl Iterator<Item = Gap> + '_ {
        self.electrodes.windows(2).map(|pair| Gap {
            index: pair[1].index,
            center: 0.5 * (pair[0].end + pair[1].start),
            length: pair[1].start - pair[0].end,
        })
    }

    #[inline]
    pub fn aperture_diameter(&self) -> f64 {
        self.aperture_diameter
    }

    #[inline]
    pub fn bore_radius(&self) -> f64 {
        0.5 * self.aperture_diameter
    }

    /// Total axial extent: the sum of all spacings and thicknesses.
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }
}
