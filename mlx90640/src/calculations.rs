// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Turning raw camera data into temperatures.
//!
//! The functions in this module follow the order of the calculations in the datasheet. Most users
//! only need [`FrameDecoder`].
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

use crate::calibration::Calibration;
use crate::common::{pixel_subpage, subpage_pixels, NUM_PIXELS};
use crate::config::{DecoderConfig, ReflectedTemperature};
use crate::error::LibraryError;
use crate::frame::Frame;
use crate::ram::RamSnapshot;
use crate::register::{AccessPattern, Resolution, Subpage};
use crate::repair::repair_subpage;

/// Constant needed a few times for the final pixel temperature calculations.
const KELVINS_TO_CELSIUS: f64 = 273.15;

/// The supply voltage the calibration values are relative to (V<sub>DD<sub>0</sub></sub>).
const V_DD_0: f64 = 3.3;

/// The ambient temperature the calibration values are relative to (T<sub>a<sub>0</sub></sub>).
const T_A_0: f64 = 25.0;

/// Correct for the ADC resolution being different from the one used during calibration.
pub fn resolution_correction(calibrated_resolution: u8, current_resolution: Resolution) -> f64 {
    let calibrated = f64::from(1u32 << calibrated_resolution);
    let current = f64::from(1u32 << current_resolution.as_raw());
    calibrated / current
}

fn delta_v(calibration: &Calibration, v_dd_pixel: i16, resolution_correction: f64) -> f64 {
    (resolution_correction * f64::from(v_dd_pixel) - f64::from(calibration.v_dd_25()))
        / f64::from(calibration.k_v_dd())
}

fn v_ptat_art(calibration: &Calibration, t_a_ptat: i16, t_a_v_be: i16) -> f64 {
    let t_a_ptat = f64::from(t_a_ptat);
    t_a_ptat * 18f64.exp2() / (t_a_ptat * calibration.alpha_ptat() + f64::from(t_a_v_be))
}

fn ambient_temperature(calibration: &Calibration, v_ptat_art: f64, delta_v: f64) -> f64 {
    let numerator =
        v_ptat_art / (1f64 + calibration.k_v_ptat() * delta_v) - calibration.v_ptat_25();
    numerator / calibration.k_t_ptat() + T_A_0
}

/// Values that're common to all pixels in a measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommonIrData {
    /// The gain correction factor (K<sub>gain</sub>).
    pub gain: f64,

    /// Supply voltage (V<sub>DD</sub>) in volts.
    pub v_dd: f64,

    /// Ambient temperature (T<sub>a</sub>) in degrees Celsius.
    pub t_a: f64,
}

impl CommonIrData {
    pub fn new(calibration: &Calibration, ram: &RamSnapshot) -> Self {
        let resolution_correction =
            resolution_correction(calibration.resolution(), ram.resolution());
        let delta_v = delta_v(calibration, ram.v_dd_pixel(), resolution_correction);
        // Labelled V_PTAT in the formulas, but T_a_PTAT in the memory map.
        let v_ptat_art = v_ptat_art(calibration, ram.t_a_ptat(), ram.t_a_v_be());
        let t_a = ambient_temperature(calibration, v_ptat_art, delta_v);
        let gain = calibration.gain() / f64::from(ram.gain());
        Self {
            gain,
            v_dd: delta_v + V_DD_0,
            t_a,
        }
    }

    /// The scaling applied to an offset reference for the current conditions.
    fn offset_factor(&self, k_ta: f64, k_v: f64) -> f64 {
        (1f64 + k_ta * (self.t_a - T_A_0)) * (1f64 + k_v * (self.v_dd - V_DD_0))
    }
}

/// The gain and offset compensated value of the compensation pixel for a subpage.
fn compensation_pixel_offset(
    calibration: &Calibration,
    common: &CommonIrData,
    ram: &RamSnapshot,
    subpage: Subpage,
) -> f64 {
    // Single sample, no moving average.
    let index: usize = subpage.into();
    let mut offset_reference = f64::from(calibration.offset_reference_cp()[index]);
    if subpage == Subpage::One && ram.access_pattern() == AccessPattern::Interleave {
        offset_reference += calibration.interleave_compensation()[0];
    }
    f64::from(ram.compensation_pixel(subpage)) * common.gain
        - offset_reference * common.offset_factor(calibration.k_ta_cp(), calibration.k_v_cp())
}

/// The correction for the interleaved pattern, for a pixel in the given subpage.
fn interleave_correction(calibration: &Calibration, pixel_index: usize, subpage: Subpage) -> f64 {
    let pattern = if subpage == Subpage::One { 1i64 } else { 0i64 };
    let n = pixel_index as i64;
    let conversion_pattern =
        (((n + 2) >> 2) - ((n + 3) >> 2) + ((n + 1) >> 2) - (n >> 2)) * (1 - 2 * pattern);
    let il_chess = calibration.interleave_compensation();
    il_chess[2] * (2 * pattern - 1) as f64 - il_chess[1] * conversion_pattern as f64
}

/// The per-pixel calculations to get a raw measurement of infrared radiation.
///
/// This is gain, offset, and emissivity compensated, but not compensated for the compensation
/// pixel.
fn per_pixel_v_ir(
    calibration: &Calibration,
    common: &CommonIrData,
    ram: &RamSnapshot,
    pixel_index: usize,
    emissivity: f64,
) -> f64 {
    let pixel_gain = f64::from(ram.pixel(pixel_index)) * common.gain;
    let offset_reference = f64::from(calibration.offset_reference_pixels()[pixel_index]);
    let mut pixel_offset = pixel_gain
        - offset_reference
            * common.offset_factor(
                calibration.k_ta_pixels()[pixel_index],
                calibration.k_v_pixel(pixel_index),
            );
    if ram.access_pattern() == AccessPattern::Interleave {
        pixel_offset += interleave_correction(calibration, pixel_index, ram.subpage());
    }
    pixel_offset / emissivity
}

fn t_ar(t_a: f64, t_r: f64, emissivity: f64) -> f64 {
    let t_a_k4 = (t_a + KELVINS_TO_CELSIUS).powi(4);
    let t_r_k4 = (t_r + KELVINS_TO_CELSIUS).powi(4);
    t_r_k4 - ((t_r_k4 - t_a_k4) / emissivity)
}

/// The per-pixel calculations to go from a raw measurement to a temperature, using the basic
/// temperature range.
fn per_pixel_temperature(v_ir: f64, alpha: f64, t_ar: f64, k_s_to: f64) -> f64 {
    // This function is a mess of raising floats to the third and fourth powers, doing some
    // operations, then taking the fourth root of everything.
    let s_x = k_s_to * (alpha.powi(3) * v_ir + alpha.powi(4) * t_ar).powf(0.25);
    let t_o_root = (v_ir / (alpha * (1f64 - k_s_to * KELVINS_TO_CELSIUS) + s_x) + t_ar).powf(0.25);
    t_o_root - KELVINS_TO_CELSIUS
}

/// Recalculate a temperature using the constants for the temperature range it falls in.
fn extended_range_temperature(
    calibration: &Calibration,
    basic_temperature: f64,
    v_ir: f64,
    alpha: f64,
    t_ar: f64,
) -> f64 {
    let corner_temperatures = calibration.corner_temperatures();
    let t_o = basic_temperature.max(f64::from(corner_temperatures[0]));
    let range = corner_temperatures
        .iter()
        .rposition(|corner| f64::from(*corner) <= t_o)
        .unwrap_or(0);
    let corner = f64::from(corner_temperatures[range]);
    let denominator = alpha
        * calibration.alpha_correction()[range]
        * (1f64 + calibration.k_s_to()[range] * (t_o - corner));
    (v_ir / denominator + t_ar).powf(0.25) - KELVINS_TO_CELSIUS
}

/// Converts RAM snapshots into temperatures.
///
/// The compensation pixel offset for each subpage is kept between measurements, with only the
/// value for the measured subpage recalculated each time.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDecoder {
    emissivity: f64,

    reflected_temperature: ReflectedTemperature,

    repair_bad_pixels: bool,

    compensation_pixel_offsets: [f64; 2],
}

impl FrameDecoder {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            emissivity: config.emissivity,
            reflected_temperature: config.reflected_temperature,
            repair_bad_pixels: config.repair_bad_pixels,
            compensation_pixel_offsets: [0f64; 2],
        }
    }

    crate::expose_member!(pub emissivity, f64);

    /// Change the emissivity used for future measurements.
    pub fn set_emissivity(&mut self, emissivity: f64) {
        self.emissivity = emissivity;
    }

    crate::expose_member!(pub reflected_temperature, ReflectedTemperature);

    pub fn set_reflected_temperature(&mut self, reflected_temperature: ReflectedTemperature) {
        self.reflected_temperature = reflected_temperature;
    }

    crate::expose_member!(
        /// The most recent compensation pixel offsets, indexed by subpage.
        pub compensation_pixel_offsets,
        [f64; 2]
    );

    fn update_compensation_pixel(
        &mut self,
        calibration: &Calibration,
        common: &CommonIrData,
        ram: &RamSnapshot,
    ) -> f64 {
        let subpage = ram.subpage();
        let offset = compensation_pixel_offset(calibration, common, ram, subpage);
        let index: usize = subpage.into();
        self.compensation_pixel_offsets[index] = offset;
        offset
    }

    /// Calculate the temperatures for the pixels in the measured subpage.
    ///
    /// Only the pixels for the subpage in `ram` are written to `frame`, the others keep their
    /// previous values. If the snapshot fails validation, `frame` is left untouched.
    pub fn decode(
        &mut self,
        calibration: &Calibration,
        ram: &RamSnapshot,
        frame: &mut Frame,
    ) -> Result<(), LibraryError> {
        ram.validate()?;
        let common = CommonIrData::new(calibration, ram);
        let subpage = ram.subpage();
        let access_pattern = ram.access_pattern();
        let tgc = calibration.temperature_gradient_coefficient();
        let compensation_pixel_offset =
            tgc * self.update_compensation_pixel(calibration, &common, ram);
        let subpage_index: usize = subpage.into();
        let alpha_compensation_pixel = tgc * calibration.alpha_cp()[subpage_index];
        let alpha_coefficient = 1f64 + calibration.k_s_ta() * (common.t_a - T_A_0);
        let k_s_to_basic = calibration.k_s_to()[calibration.basic_range()];
        let t_r = self.reflected_temperature.resolve(common.t_a);
        let t_ar = t_ar(common.t_a, t_r, self.emissivity);

        let temperatures = frame.temperatures_mut();
        for pixel_index in subpage_pixels(access_pattern, subpage) {
            let v_ir = per_pixel_v_ir(calibration, &common, ram, pixel_index, self.emissivity)
                - compensation_pixel_offset;
            let alpha = (calibration.alpha_pixels()[pixel_index] - alpha_compensation_pixel)
                * alpha_coefficient;
            let basic = per_pixel_temperature(v_ir, alpha, t_ar, k_s_to_basic);
            temperatures[pixel_index] =
                extended_range_temperature(calibration, basic, v_ir, alpha, t_ar);
        }
        if self.repair_bad_pixels {
            repair_subpage(calibration, access_pattern, subpage, temperatures);
        }
        frame.set_context(
            subpage,
            access_pattern,
            common.v_dd,
            common.t_a,
            t_r,
            self.emissivity,
        );
        Ok(())
    }

    /// Generate a "raw" thermal image for the measured subpage.
    ///
    /// The values are the compensated infrared measurements, without sensitivity correction or
    /// the temperature calculations. This is useful for applications where just an "image" is
    /// needed, but the actual temperatures are not. Only pixels in the measured subpage are
    /// written. The ambient temperature is returned.
    pub fn decode_ir(
        &mut self,
        calibration: &Calibration,
        ram: &RamSnapshot,
        destination: &mut [f64; NUM_PIXELS],
    ) -> Result<f64, LibraryError> {
        ram.validate()?;
        let common = CommonIrData::new(calibration, ram);
        let compensation_pixel_offset = calibration.temperature_gradient_coefficient()
            * self.update_compensation_pixel(calibration, &common, ram);
        let access_pattern = ram.access_pattern();
        let subpage = ram.subpage();
        destination
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| pixel_subpage(access_pattern, *index) == subpage)
            .for_each(|(index, output)| {
                *output = per_pixel_v_ir(calibration, &common, ram, index, self.emissivity)
                    - compensation_pixel_offset;
            });
        Ok(common.t_a)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(&DecoderConfig::default())
    }
}
