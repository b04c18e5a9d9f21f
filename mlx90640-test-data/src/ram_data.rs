// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The number of 16-bit words in RAM that hold frame data (0x0400 through 0x073F).
pub const RAM_WORDS: usize = 0x0740 - 0x0400;

/// Control register 1 for the worked example: sub-pages on, 2Hz, 18-bit, chess pattern.
pub const DATASHEET_CONTROL_REGISTER: u16 = 0x1901;

/// Status register for the worked example: new data is available.
pub const DATASHEET_STATUS_REGISTER: u16 = 0x0008;

/// The raw reading used for every pixel in the worked example.
const PIXEL_READING: u16 = 0x0261;

/// Auxiliary words given in the worked example, as (RAM address, value).
const AUX_READINGS: [(u16, u16); 6] = [
    // V_BE
    (0x0700, 0x4bf2),
    // Compensation pixel, sub-page 0
    (0x0708, 0xffca),
    // Gain
    (0x070a, 0x1881),
    // V_PTAT
    (0x0720, 0x06af),
    // Compensation pixel, sub-page 1
    (0x0728, 0xffc8),
    // V_DD pixel
    (0x072a, 0xccc5),
];

/// Create a RAM image from the worked example.
///
/// Every pixel has the same reading and the reserved auxiliary words are zero.
pub fn mlx90640_datasheet_ram() -> [u16; RAM_WORDS] {
    let mut ram = [0u16; RAM_WORDS];
    ram[..768].fill(PIXEL_READING);
    for (address, value) in AUX_READINGS {
        ram[usize::from(address - 0x0400)] = value;
    }
    ram
}
