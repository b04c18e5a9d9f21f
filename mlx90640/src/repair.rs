// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Replacing the values of failed and outlier pixels with values from their neighbours.
use arrayvec::ArrayVec;
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

use crate::calibration::Calibration;
use crate::common::{pixel_subpage, HEIGHT, NUM_PIXELS, WIDTH};
use crate::register::{AccessPattern, Subpage};

/// Replace the bad pixels of the given subpage.
///
/// Only neighbours from the same subpage are used, so this can be run as soon as a subpage has
/// been calculated.
pub fn repair_subpage(
    calibration: &Calibration,
    access_pattern: AccessPattern,
    subpage: Subpage,
    pixels: &mut [f64; NUM_PIXELS],
) {
    let bad_pixels = (0..NUM_PIXELS).filter(|index| {
        calibration.is_bad_pixel(*index) && pixel_subpage(access_pattern, *index) == subpage
    });
    for index in bad_pixels {
        pixels[index] = match access_pattern {
            AccessPattern::Chess => chess_replacement(pixels, index),
            AccessPattern::Interleave => interleave_replacement(calibration, pixels, index),
        };
    }
}

/// In the chess pattern the diagonal neighbours are measured with the same subpage.
///
/// Corners have one diagonal neighbour, edges two and interior pixels four. The median of the
/// available neighbours is used.
fn chess_replacement(pixels: &[f64; NUM_PIXELS], index: usize) -> f64 {
    let row = index / WIDTH;
    let column = index % WIDTH;
    let mut neighbours: ArrayVec<f64, 4> = ArrayVec::new();
    for (row_delta, column_delta) in [(-1, -1), (-1, 1), (1, -1), (1, 1)] {
        let neighbour_row = row as isize + row_delta;
        let neighbour_column = column as isize + column_delta;
        if (0..HEIGHT as isize).contains(&neighbour_row)
            && (0..WIDTH as isize).contains(&neighbour_column)
        {
            neighbours.push(pixels[neighbour_row as usize * WIDTH + neighbour_column as usize]);
        }
    }
    neighbours.sort_unstable_by(|a, b| a.total_cmp(b));
    let middle = neighbours.len() / 2;
    if neighbours.len() % 2 == 0 {
        (neighbours[middle - 1] + neighbours[middle]) / 2f64
    } else {
        neighbours[middle]
    }
}

/// In the interleaved pattern, the pixels to either side are measured with the same subpage.
fn interleave_replacement(
    calibration: &Calibration,
    pixels: &[f64; NUM_PIXELS],
    index: usize,
) -> f64 {
    let column = index % WIDTH;
    match column {
        0 => pixels[index + 1],
        1 | 30 => (pixels[index - 1] + pixels[index + 1]) / 2f64,
        31 => pixels[index - 1],
        _ => {
            if calibration.is_bad_pixel(index - 2) || calibration.is_bad_pixel(index + 2) {
                (pixels[index - 1] + pixels[index + 1]) / 2f64
            } else {
                // Extrapolate from whichever side is flatter.
                let right_gradient = pixels[index + 1] - pixels[index + 2];
                let left_gradient = pixels[index - 1] - pixels[index - 2];
                if right_gradient.abs() > left_gradient.abs() {
                    pixels[index - 1] + left_gradient
                } else {
                    pixels[index + 1] + right_gradient
                }
            }
        }
    }
}
