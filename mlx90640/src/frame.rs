// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Temperature images and the conditions they were measured in.
use crate::common::{HEIGHT, NUM_PIXELS, WIDTH};
use crate::expose_member;
use crate::register::{AccessPattern, Subpage};

/// A full thermal image.
///
/// Each measurement only updates half of the pixels (one subpage), so a frame that is reused
/// between measurements holds the latest data for both subpages. Pixels that have never been
/// measured are `NaN`.
#[derive(Clone, Debug)]
pub struct Frame {
    temperatures: [f64; NUM_PIXELS],

    subpage: Option<Subpage>,

    access_pattern: AccessPattern,

    supply_voltage: f64,

    ambient_temperature: f64,

    reflected_temperature: f64,

    emissivity: f64,

    sequence: u64,
}

impl Frame {
    /// An empty frame, with every pixel set to `NaN`.
    pub fn new() -> Self {
        Self {
            temperatures: [f64::NAN; NUM_PIXELS],
            subpage: None,
            access_pattern: AccessPattern::Chess,
            supply_voltage: f64::NAN,
            ambient_temperature: f64::NAN,
            reflected_temperature: f64::NAN,
            emissivity: 1.0,
            sequence: 0,
        }
    }

    expose_member!(
        /// Pixel temperatures in degrees Celsius, in row-major order.
        pub &temperatures,
        [f64; NUM_PIXELS]
    );

    pub(crate) fn temperatures_mut(&mut self) -> &mut [f64; NUM_PIXELS] {
        &mut self.temperatures
    }

    /// The temperature of a single pixel, or `None` if the coordinates are out of range.
    pub fn temperature(&self, row: usize, column: usize) -> Option<f64> {
        if row < HEIGHT && column < WIDTH {
            Some(self.temperatures[row * WIDTH + column])
        } else {
            None
        }
    }

    /// Iterate over the rows of the image.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.temperatures.chunks_exact(WIDTH)
    }

    expose_member!(
        /// The subpage most recently written into this frame, `None` if nothing has been yet.
        pub subpage,
        Option<Subpage>
    );

    expose_member!(pub access_pattern, AccessPattern);

    expose_member!(
        /// V<sub>DD</sub> at the time of the latest measurement, in volts.
        pub supply_voltage,
        f64
    );

    expose_member!(
        /// The sensor's own temperature (T<sub>a</sub>) in degrees Celsius.
        pub ambient_temperature,
        f64
    );

    expose_member!(
        /// The reflected temperature (T<sub>r</sub>) used for the latest measurement.
        pub reflected_temperature,
        f64
    );

    expose_member!(pub emissivity, f64);

    expose_member!(
        /// Incremented each time the frame is published by the acquisition loop.
        pub sequence,
        u64
    );

    pub(crate) fn set_context(
        &mut self,
        subpage: Subpage,
        access_pattern: AccessPattern,
        supply_voltage: f64,
        ambient_temperature: f64,
        reflected_temperature: f64,
        emissivity: f64,
    ) {
        self.subpage = Some(subpage);
        self.access_pattern = access_pattern;
        self.supply_voltage = supply_voltage;
        self.ambient_temperature = ambient_temperature;
        self.reflected_temperature = reflected_temperature;
        self.emissivity = emissivity;
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// The lowest and highest measured temperatures, ignoring pixels that are `NaN`.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.temperatures
            .iter()
            .copied()
            .filter(|t| !t.is_nan())
            .fold(None, |acc, t| match acc {
                None => Some((t, t)),
                Some((min, max)) => Some((min.min(t), max.max(t))),
            })
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
