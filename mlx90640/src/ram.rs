// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! A copy of the camera's RAM for a single subpage measurement.
use core::ops::Range;

use crate::address::RamAddress;
use crate::common::{Address, INVALID_WORD, NUM_PIXELS, RAM_WORDS, WIDTH};
use crate::error::LibraryError;
use crate::register::{AccessPattern, ControlRegister, Resolution, StatusRegister, Subpage};

/// Auxiliary words (relative to 0x0700) that are checked for the invalid read marker.
///
/// The gaps are words that are reserved by Melexis and can legitimately read as 0x7FFF.
const VALIDATED_AUX_WORDS: [Range<usize>; 7] =
    [0..1, 8..19, 20..23, 24..33, 40..51, 52..55, 56..64];

/// The raw contents of RAM along with the settings it was measured with.
#[derive(Clone, Debug, PartialEq)]
pub struct RamSnapshot {
    words: [u16; RAM_WORDS],

    subpage: Subpage,

    access_pattern: AccessPattern,

    resolution: Resolution,
}

impl RamSnapshot {
    pub fn new(
        words: [u16; RAM_WORDS],
        subpage: Subpage,
        access_pattern: AccessPattern,
        resolution: Resolution,
    ) -> Self {
        Self {
            words,
            subpage,
            access_pattern,
            resolution,
        }
    }

    /// Create a snapshot using the subpage from the status register, and the access pattern and
    /// resolution from the control register.
    pub fn from_registers(
        words: [u16; RAM_WORDS],
        status: StatusRegister,
        control: ControlRegister,
    ) -> Self {
        Self::new(
            words,
            status.last_updated_subpage(),
            control.access_pattern(),
            control.resolution(),
        )
    }

    crate::expose_member!(
        /// The subpage that was just measured.
        pub subpage,
        Subpage
    );

    crate::expose_member!(pub access_pattern, AccessPattern);

    crate::expose_member!(
        /// The ADC resolution the camera was set to when this subpage was measured.
        pub resolution,
        Resolution
    );

    crate::expose_member!(pub &words, [u16; RAM_WORDS]);

    /// The raw value of a pixel, by row-major index.
    pub fn pixel(&self, index: usize) -> i16 {
        self.words[index] as i16
    }

    fn value(&self, address: RamAddress) -> i16 {
        self.words[address.word_index()] as i16
    }

    /// V<sub>BE</sub>
    pub fn t_a_v_be(&self) -> i16 {
        self.value(RamAddress::AmbientTemperatureVoltageBe)
    }

    /// V<sub>PTAT</sub>
    pub fn t_a_ptat(&self) -> i16 {
        self.value(RamAddress::AmbientTemperatureVoltage)
    }

    /// V<sub>DD<sub>pix</sub></sub>
    pub fn v_dd_pixel(&self) -> i16 {
        self.value(RamAddress::PixelSupplyVoltage)
    }

    /// The current gain value (as opposed to the factory calibrated one).
    pub fn gain(&self) -> i16 {
        self.value(RamAddress::Gain)
    }

    /// The raw value of the compensation pixel for a subpage.
    pub fn compensation_pixel(&self, subpage: Subpage) -> i16 {
        match subpage {
            Subpage::Zero => self.value(RamAddress::CompensationPixelZero),
            Subpage::One => self.value(RamAddress::CompensationPixelOne),
        }
    }

    /// Check for words the camera has marked as invalid reads.
    ///
    /// The first pixel of every row in the current subpage is checked (using row parity, even in
    /// chess mode), along with most of the auxiliary data. The address of the first invalid word
    /// is returned in the error.
    ///
    /// The auxiliary checks start at the first auxiliary word (0x0700), not at pixel 0. Pixel 0
    /// is only checked as the start of row 0, so it is skipped when validating subpage 1.
    pub fn validate(&self) -> Result<(), LibraryError> {
        let subpage_index: usize = self.subpage.into();
        let row_starts = (0..NUM_PIXELS)
            .step_by(WIDTH)
            .enumerate()
            .filter(|(row, _)| row % 2 == subpage_index)
            .map(|(_, index)| index);
        let aux_start = RamAddress::AmbientTemperatureVoltageBe.word_index();
        let aux_words = VALIDATED_AUX_WORDS
            .iter()
            .cloned()
            .flatten()
            .map(|offset| aux_start + offset);
        match row_starts
            .chain(aux_words)
            .find(|index| self.words[*index] == INVALID_WORD)
        {
            Some(index) => Err(LibraryError::BadData(
                Address::from(RamAddress::Base).offset(index),
            )),
            None => Ok(()),
        }
    }
}
