// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Factory calibration data stored in the camera's EEPROM.
use bitvec::array::BitArray;
use bitvec::slice::BitSlice;

use crate::address::EepromAddress;
use crate::common::{EEPROM_WORDS, HEIGHT, NUM_PIXELS, WIDTH};
use crate::error::LibraryError;
use crate::expose_member;
use crate::util::{is_bit_set, signed_bits, signed_nibbles, unsigned_bits};

/// The number of corner temperatures (and so temperature ranges) an MLX90640 has.
pub const NUM_CORNER_TEMPERATURES: usize = 4;

/// The index of the temperature range that doesn't need correcting.
///
/// This is the range between the first and second corner temperatures (-40℃ and 0℃).
const BASIC_RANGE: usize = 1;

pub type FlagSlice = BitSlice<usize>;
type FlagArray = BitArray<[usize; NUM_PIXELS / usize::BITS as usize]>;

/// Calibration constants for a single camera.
///
/// Every field is derived from a dump of the EEPROM by [`Calibration::from_words`] and is never
/// changed afterwards. The naming scheme for the accessors is taken from the names of the
/// variables used in the formulas in the datasheet. Per-pixel values are in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    k_v_dd: i16,

    v_dd_25: i16,

    resolution: u8,

    k_v_ptat: f64,

    k_t_ptat: f64,

    v_ptat_25: f64,

    alpha_ptat: f64,

    gain: f64,

    k_s_ta: f64,

    corner_temperatures: [i16; NUM_CORNER_TEMPERATURES],

    k_s_to: [f64; NUM_CORNER_TEMPERATURES],

    alpha_correction: [f64; NUM_CORNER_TEMPERATURES],

    alpha_pixels: [f64; NUM_PIXELS],

    alpha_cp: [f64; 2],

    offset_reference_pixels: [i16; NUM_PIXELS],

    offset_reference_cp: [i16; 2],

    /// K<sub>V</sub> only depends on if the row and column are even or odd.
    k_v_pattern: [f64; 4],

    k_v_cp: f64,

    k_ta_pixels: [f64; NUM_PIXELS],

    k_ta_cp: f64,

    temperature_gradient_coefficient: f64,

    interleave_compensation: [f64; 3],

    failed_pixels: FlagArray,

    outlier_pixels: FlagArray,
}

/// 2<sup>exponent</sup> as a float.
fn pow2(exponent: u16) -> f64 {
    (1u64 << exponent) as f64
}

/// Calculate pixel calibration values from the shared average and the row and column corrections.
///
/// This is used for both the offset and sensitivity (alpha) arrays. `scales` is the word with the
/// row, column, and remainder scaling factors. The remainder (which is stored in each pixel's
/// word) is added by the caller.
fn row_column_calibration(
    words: &[u16],
    average: i32,
    scales: u16,
    row_start: EepromAddress,
    column_start: EepromAddress,
) -> [i32; NUM_PIXELS] {
    let row_scale = unsigned_bits(scales, 8, 4);
    let column_scale = unsigned_bits(scales, 4, 4);
    // Four nibbles per word
    let rows = &words[row_start.word_index()..][..HEIGHT / 4];
    let columns = &words[column_start.word_index()..][..WIDTH / 4];
    let mut pixels = [average; NUM_PIXELS];
    for (row_index, row) in pixels.chunks_exact_mut(WIDTH).enumerate() {
        let row_coefficient = i32::from(signed_nibbles(rows[row_index / 4])[row_index % 4]);
        let row_coefficient = row_coefficient << row_scale;
        for (column_index, pixel) in row.iter_mut().enumerate() {
            let column_coefficient =
                i32::from(signed_nibbles(columns[column_index / 4])[column_index % 4]);
            *pixel += row_coefficient + (column_coefficient << column_scale);
        }
    }
    pixels
}

/// Which of the four row/column parity combinations a pixel falls in.
///
/// The order is even row even column, even row odd column, odd row even column, odd row odd
/// column. Note the datasheet is 1-indexed, so its "odd" is this crate's "even".
fn parity_index(pixel_index: usize) -> usize {
    let row = pixel_index / WIDTH;
    let column = pixel_index % WIDTH;
    2 * (row % 2) + (column % 2)
}

/// The actual calculations for the sensitivity correction coefficients as a recursive function.
/// Memoizing would be nice, but these calculations are only performed once, at start up.
fn alpha_corr_n(n: usize, basic_range: usize, ct: &[i16], k_s_to: &[f64]) -> f64 {
    match n.cmp(&basic_range) {
        core::cmp::Ordering::Equal => 1f64,
        core::cmp::Ordering::Less => {
            (1f64 + k_s_to[n] * f64::from(ct[n + 1] - ct[n])).recip()
                * alpha_corr_n(n + 1, basic_range, ct, k_s_to)
        }
        core::cmp::Ordering::Greater => {
            (1f64 + k_s_to[n - 1] * f64::from(ct[n] - ct[n - 1]))
                * alpha_corr_n(n - 1, basic_range, ct, k_s_to)
        }
    }
}

impl Calibration {
    /// Generate the constants needed for temperature calculations from a dump of the EEPROM.
    ///
    /// `words` must be the entire EEPROM, starting from 0x2400.
    pub fn from_words(words: &[u16]) -> Result<Self, LibraryError> {
        if words.len() != EEPROM_WORDS {
            return Err(LibraryError::Decode(
                "the EEPROM dump must be exactly 832 words",
            ));
        }
        let word = |address: EepromAddress| words[address.word_index()];

        let vdd_word = word(EepromAddress::VddConstants);
        let k_v_dd = signed_bits(vdd_word, 8, 8) << 5;
        let v_dd_25 = ((unsigned_bits(vdd_word, 0, 8) as i16 - 256) << 5) - (1 << 13);

        let ptat_word = word(EepromAddress::PtatConstants);
        let k_v_ptat = f64::from(signed_bits(ptat_word, 10, 6)) / pow2(12);
        let k_t_ptat = f64::from(signed_bits(ptat_word, 0, 10)) / pow2(3);
        let v_ptat_25 = f64::from(word(EepromAddress::Ptat25) as i16);

        let offset_scales = word(EepromAddress::OffsetCompensation);
        let alpha_ptat = f64::from(unsigned_bits(offset_scales, 12, 4)) / 4f64 + 8f64;
        let gain = f64::from(word(EepromAddress::Gain) as i16);

        // Values shared by each of the per-pixel calculations
        let offset_average = i32::from(word(EepromAddress::PixelOffsetAverage) as i16);
        let offset_base = row_column_calibration(
            words,
            offset_average,
            offset_scales,
            EepromAddress::OffsetCompensationRowStart,
            EepromAddress::OffsetCompensationColumnStart,
        );
        let offset_remainder_scale = unsigned_bits(offset_scales, 0, 4);

        let alpha_scales = word(EepromAddress::SensitivityScale);
        let alpha_average = i32::from(word(EepromAddress::PixelSensitivityAverage));
        let alpha_base = row_column_calibration(
            words,
            alpha_average,
            alpha_scales,
            EepromAddress::PixelSensitivityCompensationRowStart,
            EepromAddress::PixelSensitivityCompensationColumnStart,
        );
        let alpha_remainder_scale = unsigned_bits(alpha_scales, 0, 4);
        let alpha_scale = pow2(unsigned_bits(alpha_scales, 12, 4) + 30);

        let scales = word(EepromAddress::VAndTaScale);
        let resolution = unsigned_bits(scales, 12, 2) as u8;
        let k_v_scale = pow2(unsigned_bits(scales, 8, 4));
        let k_ta_scale1 = pow2(unsigned_bits(scales, 4, 4) + 8);
        let k_ta_scale2 = unsigned_bits(scales, 0, 4);

        let k_v_word = word(EepromAddress::AverageVoltageConstants);
        let mut k_v_pattern = [0f64; 4];
        // Stored as odd-odd, even-odd, odd-even, even-even (in this crate's indexing), from the
        // most significant nibble.
        for (k_v, offset) in k_v_pattern.iter_mut().zip([12, 4, 8, 0]) {
            *k_v = f64::from(signed_bits(k_v_word, offset, 4)) / k_v_scale;
        }

        let k_ta_even_columns = word(EepromAddress::AmbientTemperatureAverageConstantsEvenColumns);
        let k_ta_odd_columns = word(EepromAddress::AmbientTemperatureAverageConstantsOddColumns);
        let k_ta_averages = [
            signed_bits(k_ta_even_columns, 8, 8),
            signed_bits(k_ta_odd_columns, 8, 8),
            signed_bits(k_ta_even_columns, 0, 8),
            signed_bits(k_ta_odd_columns, 0, 8),
        ];

        let mut offset_reference_pixels = [0i16; NUM_PIXELS];
        let mut alpha_pixels = [0f64; NUM_PIXELS];
        let mut k_ta_pixels = [0f64; NUM_PIXELS];
        let mut failed_pixels = FlagArray::default();
        let mut outlier_pixels = FlagArray::default();
        let pixel_words = &words[EepromAddress::PixelCalibrationStart.word_index()..];
        for (index, pixel_word) in pixel_words.iter().copied().enumerate() {
            let offset_remainder = i32::from(signed_bits(pixel_word, 10, 6));
            // Truncating to 16 bits, the same as the camera's own arithmetic.
            offset_reference_pixels[index] =
                (offset_base[index] + (offset_remainder << offset_remainder_scale)) as i16;
            let alpha_remainder = i32::from(signed_bits(pixel_word, 4, 6));
            alpha_pixels[index] =
                f64::from(alpha_base[index] + (alpha_remainder << alpha_remainder_scale))
                    / alpha_scale;
            let k_ta_remainder = i32::from(signed_bits(pixel_word, 1, 3));
            let k_ta_average = i32::from(k_ta_averages[parity_index(index)]);
            k_ta_pixels[index] =
                f64::from(k_ta_average + (k_ta_remainder << k_ta_scale2)) / k_ta_scale1;
            if pixel_word == 0 {
                failed_pixels.set(index, true);
            }
            if is_bit_set(pixel_word, 0) {
                outlier_pixels.set(index, true);
            }
        }

        let interleave_word = word(EepromAddress::InterlacedModeCompensation);
        let interleave_compensation = [
            f64::from(signed_bits(interleave_word, 0, 6)) / 16f64,
            f64::from(signed_bits(interleave_word, 6, 5)) / 2f64,
            f64::from(signed_bits(interleave_word, 11, 5)) / 8f64,
        ];

        let cp_sensitivity = word(EepromAddress::CompensationPixelSensitivity);
        let alpha_cp_0 = f64::from(unsigned_bits(cp_sensitivity, 0, 10))
            / pow2(unsigned_bits(alpha_scales, 12, 4) + 27);
        let alpha_cp_ratio = f64::from(signed_bits(cp_sensitivity, 10, 6)) / pow2(7);
        let alpha_cp = [alpha_cp_0, alpha_cp_0 * (1f64 + alpha_cp_ratio)];

        let cp_offset = word(EepromAddress::CompensationPixelOffset);
        let offset_cp_0 = signed_bits(cp_offset, 0, 10);
        let offset_reference_cp = [offset_cp_0, offset_cp_0 + signed_bits(cp_offset, 10, 6)];

        let cp_constants = word(EepromAddress::CompensationPixelConstants);
        let k_v_cp = f64::from(signed_bits(cp_constants, 8, 8)) / k_v_scale;
        let k_ta_cp = f64::from(signed_bits(cp_constants, 0, 8)) / k_ta_scale1;

        let sensitivity_word = word(EepromAddress::AmbientTemperatureSensitivityConstant);
        let k_s_ta = f64::from(signed_bits(sensitivity_word, 8, 8)) / pow2(13);
        let temperature_gradient_coefficient =
            f64::from(signed_bits(sensitivity_word, 0, 8)) / pow2(5);

        let corner_word = word(EepromAddress::CornerTemperatures);
        let step = unsigned_bits(corner_word, 12, 2) as i16 * 10;
        let ct2 = unsigned_bits(corner_word, 4, 4) as i16 * step;
        let ct3 = unsigned_bits(corner_word, 8, 4) as i16 * step + ct2;
        let corner_temperatures = [-40, 0, ct2, ct3];

        let k_s_to_scale = pow2(unsigned_bits(corner_word, 0, 4) + 8);
        let k_s_to_low = word(EepromAddress::ObjectTemperatureSensitivityRangeConstants1);
        let k_s_to_high = word(EepromAddress::ObjectTemperatureSensitivityRangeConstants2);
        let k_s_to = [
            f64::from(signed_bits(k_s_to_low, 0, 8)) / k_s_to_scale,
            f64::from(signed_bits(k_s_to_low, 8, 8)) / k_s_to_scale,
            f64::from(signed_bits(k_s_to_high, 0, 8)) / k_s_to_scale,
            f64::from(signed_bits(k_s_to_high, 8, 8)) / k_s_to_scale,
        ];

        let mut alpha_correction = [1f64; NUM_CORNER_TEMPERATURES];
        for (n, correction) in alpha_correction.iter_mut().enumerate() {
            *correction = alpha_corr_n(n, BASIC_RANGE, &corner_temperatures, &k_s_to);
        }

        Ok(Self {
            k_v_dd,
            v_dd_25,
            resolution,
            k_v_ptat,
            k_t_ptat,
            v_ptat_25,
            alpha_ptat,
            gain,
            k_s_ta,
            corner_temperatures,
            k_s_to,
            alpha_correction,
            alpha_pixels,
            alpha_cp,
            offset_reference_pixels,
            offset_reference_cp,
            k_v_pattern,
            k_v_cp,
            k_ta_pixels,
            k_ta_cp,
            temperature_gradient_coefficient,
            interleave_compensation,
            failed_pixels,
            outlier_pixels,
        })
    }

    expose_member!(
        /// Pixel supply voltage constant (K<sub>V<sub>DD</sub></sub>).
        pub k_v_dd,
        i16
    );

    expose_member!(
        /// Pixel supply voltage at 25℃ (V<sub>DD<sub>25</sub></sub>).
        pub v_dd_25,
        i16
    );

    expose_member!(
        /// ADC resolution this camera was calibrated at, as the raw two bit value.
        pub resolution,
        u8
    );

    expose_member!(
        /// K<sub>V<sub>PTAT</sub></sub>
        pub k_v_ptat,
        f64
    );

    expose_member!(
        /// K<sub>T<sub>PTAT</sub></sub>
        pub k_t_ptat,
        f64
    );

    expose_member!(
        /// V<sub>PTAT<sub>25</sub></sub>
        pub v_ptat_25,
        f64
    );

    expose_member!(
        /// α<sub>PTAT</sub>
        pub alpha_ptat,
        f64
    );

    expose_member!(
        /// The gain constant. Usually written as <var>GAIN</var> in the datasheet.
        pub gain,
        f64
    );

    expose_member!(
        /// K<sub>S<sub>T<sub>a</sub></sub></sub>
        pub k_s_ta,
        f64
    );

    expose_member!(
        /// The corner temperatures delimiting the temperature ranges.
        ///
        /// The datasheet indexes these from 1, this crate from 0.
        pub &corner_temperatures,
        [i16; NUM_CORNER_TEMPERATURES]
    );

    expose_member!(
        /// K<sub>S<sub>T<sub>o</sub></sub></sub> for each temperature range.
        pub &k_s_to,
        [f64; NUM_CORNER_TEMPERATURES]
    );

    expose_member!(
        /// Sensitivity correction (α<sub>corr</sub>) for each temperature range.
        pub &alpha_correction,
        [f64; NUM_CORNER_TEMPERATURES]
    );

    expose_member!(
        /// Per-pixel sensitivity (α<sub>pixel</sub>).
        pub &alpha_pixels,
        [f64; NUM_PIXELS]
    );

    expose_member!(
        /// Compensation pixel sensitivity, indexed by subpage.
        pub alpha_cp,
        [f64; 2]
    );

    expose_member!(
        /// Per-pixel offset reference (Offset<sub>reference</sub>).
        pub &offset_reference_pixels,
        [i16; NUM_PIXELS]
    );

    expose_member!(
        /// Compensation pixel offset reference, indexed by subpage.
        pub offset_reference_cp,
        [i16; 2]
    );

    expose_member!(
        /// K<sub>V</sub> for the compensation pixels.
        pub k_v_cp,
        f64
    );

    expose_member!(
        /// Per-pixel K<sub>T<sub>a</sub></sub>.
        pub &k_ta_pixels,
        [f64; NUM_PIXELS]
    );

    expose_member!(
        /// K<sub>T<sub>a</sub></sub> for the compensation pixels.
        pub k_ta_cp,
        f64
    );

    expose_member!(
        /// Temperature gradient coefficient (TGC).
        pub temperature_gradient_coefficient,
        f64
    );

    expose_member!(
        /// The interleaved mode correction constants (IL<sub>CHESS</sub>C1 through C3).
        pub interleave_compensation,
        [f64; 3]
    );

    /// Per-pixel K<sub>V</sub>.
    pub fn k_v_pixel(&self, pixel_index: usize) -> f64 {
        self.k_v_pattern[parity_index(pixel_index)]
    }

    /// The index of the basic temperature range.
    ///
    /// Temperature ranges outside of the basic range are "extended temperature ranges" and need
    /// the sensitivity correction applied.
    pub fn basic_range(&self) -> usize {
        BASIC_RANGE
    }

    /// Pixels that have failed (all calibration data is zero).
    pub fn failed_pixels(&self) -> &FlagSlice {
        &self.failed_pixels[..NUM_PIXELS]
    }

    /// Pixels marked by the factory as outliers.
    pub fn outlier_pixels(&self) -> &FlagSlice {
        &self.outlier_pixels[..NUM_PIXELS]
    }

    /// Whether a pixel should be replaced with values from its neighbours.
    pub fn is_bad_pixel(&self, pixel_index: usize) -> bool {
        self.failed_pixels[pixel_index] || self.outlier_pixels[pixel_index]
    }
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use mlx90640_test_data::mlx90640_datasheet_eeprom;

    use super::*;

    fn datasheet_calibration() -> Calibration {
        let eeprom = mlx90640_datasheet_eeprom();
        Calibration::from_words(&eeprom[..])
            .expect("Calibration should be able to be created from the datasheet data")
    }

    /// Pixel (12, 16) in the datasheet is (11, 15) here.
    const TEST_PIXEL: usize = 11 * WIDTH + 15;

    #[test]
    fn wrong_length() {
        let eeprom = mlx90640_datasheet_eeprom();
        assert!(matches!(
            Calibration::from_words(&eeprom[..EEPROM_WORDS - 1]),
            Err(LibraryError::Decode(_))
        ));
        assert!(Calibration::from_words(&[]).is_err());
    }

    #[test]
    fn resolution() {
        assert_eq!(datasheet_calibration().resolution(), 2);
    }

    #[test]
    fn k_v_dd() {
        assert_eq!(datasheet_calibration().k_v_dd(), -3168);
    }

    #[test]
    fn v_dd_25() {
        assert_eq!(datasheet_calibration().v_dd_25(), -13056);
    }

    #[test]
    fn ptat_constants() {
        let clb = datasheet_calibration();
        assert_eq!(clb.k_v_ptat(), 0.00537109375);
        assert_eq!(clb.k_t_ptat(), 42.25);
        assert_eq!(clb.v_ptat_25(), 12273.0);
        assert_eq!(clb.alpha_ptat(), 9.0);
    }

    #[test]
    fn gain() {
        assert_eq!(datasheet_calibration().gain(), 6383.0);
    }

    #[test]
    fn k_s_ta() {
        assert_eq!(datasheet_calibration().k_s_ta(), -0.001953125);
    }

    #[test]
    fn corner_temperatures() {
        assert_eq!(
            datasheet_calibration().corner_temperatures(),
            &[-40, 0, 160, 320]
        );
    }

    #[test]
    fn k_s_to() {
        let clb = datasheet_calibration();
        for k_s_to in clb.k_s_to() {
            assert_eq!(*k_s_to, -0.00080108642578125);
        }
    }

    #[test]
    fn alpha_correction() {
        let clb = datasheet_calibration();
        let expected = [1.0331042310360048, 1.0, 0.871826171875, 0.760080873966217];
        for (actual, expected) in clb.alpha_correction().iter().zip(expected) {
            assert_approx_eq!(f64, *actual, expected, ulps = 2);
        }
        assert_eq!(clb.alpha_correction()[clb.basic_range()], 1.0);
    }

    #[test]
    fn offset_reference() {
        let clb = datasheet_calibration();
        assert_eq!(clb.offset_reference_pixels()[TEST_PIXEL], -75);
        assert_eq!(clb.offset_reference_pixels()[0], -61);
        assert_eq!(clb.offset_reference_pixels()[NUM_PIXELS - 1], -91);
    }

    #[test]
    fn alpha() {
        let clb = datasheet_calibration();
        assert_approx_eq!(
            f64,
            clb.alpha_pixels()[TEST_PIXEL],
            1.2622331269085407e-7,
            ulps = 2
        );
        assert_approx_eq!(f64, clb.alpha_pixels()[0], 5.171750672161579e-8, ulps = 2);
        assert_approx_eq!(
            f64,
            clb.alpha_pixels()[NUM_PIXELS - 1],
            2.9365764930844307e-8,
            ulps = 2
        );
    }

    #[test]
    fn k_v() {
        let clb = datasheet_calibration();
        assert_eq!(clb.k_v_pixel(TEST_PIXEL), 0.5);
        assert_eq!(clb.k_v_pixel(0), 0.625);
    }

    #[test]
    fn k_ta() {
        let clb = datasheet_calibration();
        assert_eq!(clb.k_ta_pixels()[TEST_PIXEL], 0.005126953125);
        assert_eq!(clb.k_ta_pixels()[0], 0.00640869140625);
    }

    #[test]
    fn compensation_pixels() {
        let clb = datasheet_calibration();
        assert_eq!(clb.offset_reference_cp(), [-75, -77]);
        assert_eq!(clb.k_v_cp(), 0.5);
        assert_eq!(clb.k_ta_cp(), 0.00457763671875);
        let alpha_cp = clb.alpha_cp();
        assert_approx_eq!(f64, alpha_cp[0], 4.0745362639427185e-9, ulps = 2);
        assert_approx_eq!(f64, alpha_cp[1], 3.851710062008351e-9, ulps = 2);
    }

    #[test]
    fn temperature_gradient_coefficient() {
        assert_eq!(
            datasheet_calibration().temperature_gradient_coefficient(),
            1.0
        );
    }

    #[test]
    fn interleave_compensation() {
        assert_eq!(
            datasheet_calibration().interleave_compensation(),
            [1.25, 3.0, 0.125]
        );
    }

    #[test]
    fn no_flagged_pixels() {
        let clb = datasheet_calibration();
        assert!(!clb.failed_pixels().any());
        assert!(!clb.outlier_pixels().any());
    }

    #[test]
    fn flagged_pixels() {
        const FAILED: usize = 100;
        const OUTLIER: usize = 200;
        let mut eeprom = mlx90640_datasheet_eeprom();
        let pixel_start = EepromAddress::PixelCalibrationStart.word_index();
        eeprom[pixel_start + FAILED] = 0x0000;
        eeprom[pixel_start + OUTLIER] |= 0x0001;
        let clb = Calibration::from_words(&eeprom[..]).expect("EEPROM data should be parsed.");
        let mut failed = clb.failed_pixels().iter_ones();
        assert_eq!(failed.next(), Some(FAILED));
        assert_eq!(failed.next(), None);
        let mut outliers = clb.outlier_pixels().iter_ones();
        assert_eq!(outliers.next(), Some(OUTLIER));
        assert_eq!(outliers.next(), None);
        assert!(clb.is_bad_pixel(FAILED));
        assert!(clb.is_bad_pixel(OUTLIER));
        assert!(!clb.is_bad_pixel(TEST_PIXEL));
        // The outlier bit doesn't change the rest of the pixel's calibration
        assert_eq!(
            clb.offset_reference_pixels()[OUTLIER],
            datasheet_calibration().offset_reference_pixels()[OUTLIER]
        );
    }
}
