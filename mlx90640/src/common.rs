// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Constants and small helpers shared by the rest of the crate.
//!
//! At first glance, the datasheet for this module can be pretty intimidating, with nearly half
//! the document taken up by pages of formulas. After reading through them though, it becomes
//! pretty clear that the formulas are primarily performing manual conversion to signed integers
//! and other bit twiddling that can be written much more clearly. Here's a bit of a decoder ring
//! for some of the patterns:
//!
//! * If you see a line similar to
//!   >  If K<sub>Foo</sub> &gt; *(2<sup>n</sup> - 1)* → K<sub>Foo</sub> = K<sub>Foo</sub> - *2<sup>n + 1</sup>*
//!
//!   It is converting an unsigned integer to a signed one. The *italicized* portions in the quote
//!   are typically expanded, so instead of *2<sup>7</sup>&nbsp;-&nbsp;1* and *2<sup>8</sup* you'll
//!   see 127 and 256.
//! * Masking a value off with a logical AND, followed by a division by a power of 2. The division
//!   can be easier to read as a right-shift by whatever power of two.
//! * The datasheet uses 1-indexed rows and columns, this crate uses 0-indexing everywhere.
//!
//! # Glossary
//! <dl>
//! <dt>
//! α, alpha
//! </dt><dd>
//! Sensitivity coefficient
//! </dd>
//! <dt>
//! CP
//! </dt><dd>
//! Compensation pixel, an on-chip reference pixel used to cancel ambient drift. There is one per
//! subpage.
//! </dd>
//! <dt>
//! ε, emissivity
//! </dt><dd>
//! How much IR radiation a surface emits relative to a black body at the same temperature.
//! </dd>
//! <dt>
//! K
//! </dt><dd>
//! Prefix for constants.
//! </dd>
//! <dt>
//! PTAT
//! </dt><dd>
//! Proportional to absolute temperature, the sensor used to derive the ambient temperature.
//! </dd>
//! <dt>
//! T<sub>a</sub>
//! </dt><dd>
//! Ambient temperature
//! </dd>
//! <dt>
//! T<sub>o</sub>
//! </dt><dd>
//! Object temperature, meaning the temperature an individual pixel has detected for an object.
//! </dd>
//! <dt>
//! T<sub>r</sub>
//! </dt><dd>
//! Reflected temperature, the temperature of the surroundings reflected off of the object.
//! </dd>
//! <dt>
//! TGC
//! </dt><dd>
//! Thermal gradient compensation coefficient.
//! </dd>
//! <dt>
//! V<sub>DD</sub>
//! </dt><dd>
//! Pixel supply voltage
//! </dd>
//! </dl>
use core::fmt;

use crate::register::{AccessPattern, Subpage};

/// The height of the image captured by sensor in pixels.
pub const HEIGHT: usize = 24;

/// The width of the image captured by the sensor in pixels.
pub const WIDTH: usize = 32;

/// The total number of pixels an MLX90640 has.
pub const NUM_PIXELS: usize = HEIGHT * WIDTH;

/// The number of 16-bit words in the EEPROM (0x2400 through 0x273F).
pub const EEPROM_WORDS: usize = 0x0340;

/// The number of 16-bit words of RAM holding frame data (0x0400 through 0x073F).
pub const RAM_WORDS: usize = 0x0340;

/// The value the camera reports for a word that could not be measured.
pub(crate) const INVALID_WORD: u16 = 0x7FFF;

/// Marker newtype for addresses accessible over I<sup>2</sup>C.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct Address(u16);

impl Address {
    /// Wrap the given address in an `Address`.
    ///
    /// This function is intended to be used in const contexts, in other cases the
    /// [`From`][core::convert::From] implementation is probably easier to use.
    pub const fn new(address: u16) -> Self {
        Self(address)
    }

    pub(crate) fn as_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// The address `words` words after this one.
    pub(crate) fn offset(&self, words: usize) -> Self {
        Self(self.0.wrapping_add(words as u16))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#X})", self.0)
    }
}

impl From<u16> for Address {
    fn from(raw_address: u16) -> Self {
        Self::new(raw_address)
    }
}

impl From<Address> for u16 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self {
        address.0 as usize
    }
}

/// The subpage a pixel (by row-major index) is measured in.
///
/// In the chess pattern the subpage alternates with both the row and the column, in the
/// interleaved pattern whole rows belong to the same subpage.
pub fn pixel_subpage(access_pattern: AccessPattern, index: usize) -> Subpage {
    let row_parity = (index / WIDTH) & 1;
    let parity = match access_pattern {
        AccessPattern::Chess => row_parity ^ (index & 1),
        AccessPattern::Interleave => row_parity,
    };
    if parity == 0 {
        Subpage::Zero
    } else {
        Subpage::One
    }
}

/// An iterator of the indices of all pixels measured in the given subpage.
pub fn subpage_pixels(
    access_pattern: AccessPattern,
    subpage: Subpage,
) -> impl Iterator<Item = usize> + Clone {
    (0..NUM_PIXELS).filter(move |index| pixel_subpage(access_pattern, *index) == subpage)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn address_debug() {
        extern crate std;
        use std::format;
        assert_eq!(format!("{:?}", Address::new(0x800D)), "Address(0x800D)");
    }

    #[test]
    fn subpages_partition_pixels() {
        for pattern in [AccessPattern::Chess, AccessPattern::Interleave] {
            let mut seen = [0u8; NUM_PIXELS];
            for subpage in [Subpage::Zero, Subpage::One] {
                let count = subpage_pixels(pattern, subpage)
                    .inspect(|index| seen[*index] += 1)
                    .count();
                assert_eq!(count, NUM_PIXELS / 2, "{:?} {:?}", pattern, subpage);
            }
            assert!(seen.iter().all(|count| *count == 1), "{:?}", pattern);
        }
    }

    #[test]
    fn chess_parity() {
        // Row 0 starts on subpage 0, row 1 starts on subpage 1
        assert_eq!(pixel_subpage(AccessPattern::Chess, 0), Subpage::Zero);
        assert_eq!(pixel_subpage(AccessPattern::Chess, 1), Subpage::One);
        assert_eq!(pixel_subpage(AccessPattern::Chess, 32), Subpage::One);
        assert_eq!(pixel_subpage(AccessPattern::Chess, 33), Subpage::Zero);
        // Pixel (11, 15)
        assert_eq!(pixel_subpage(AccessPattern::Chess, 367), Subpage::Zero);
    }

    #[test]
    fn interleave_parity() {
        assert_eq!(pixel_subpage(AccessPattern::Interleave, 0), Subpage::Zero);
        assert_eq!(pixel_subpage(AccessPattern::Interleave, 31), Subpage::Zero);
        assert_eq!(pixel_subpage(AccessPattern::Interleave, 32), Subpage::One);
        assert_eq!(pixel_subpage(AccessPattern::Interleave, 767), Subpage::One);
    }
}
