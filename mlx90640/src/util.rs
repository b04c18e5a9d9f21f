// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The word size of the camera in terms of 8-bit bytes.
pub(crate) const WORD_SIZE: usize = (u16::BITS / u8::BITS) as usize;

/// Define addition and subtraction for address enumerations.
#[doc(hidden)]
#[macro_export]
macro_rules! address_enum_ops {
    ($typ:ident) => {
        impl ::core::ops::Add<$typ> for $typ {
            type Output = u16;
            fn add(self, other: $typ) -> Self::Output {
                self as u16 + other as u16
            }
        }
        impl ::core::ops::Sub<$typ> for $typ {
            type Output = u16;
            fn sub(self, other: $typ) -> Self::Output {
                self as u16 - other as u16
            }
        }
        impl ::core::ops::Sub<&$typ> for &$typ {
            type Output = u16;
            fn sub(self, other: &$typ) -> Self::Output {
                *self as u16 - *other as u16
            }
        }
    };
}

/// Generate a getter for a `Copy` (or by reference) struct member.
#[doc(hidden)]
#[macro_export]
macro_rules! expose_member {
    ($(#[$meta:meta])* $vis:vis $name:ident, $typ:ty) => {
        $(#[$meta])*
        $vis fn $name(&self) -> $typ {
            self.$name
        }
    };
    ($(#[$meta:meta])* $vis:vis &$name:ident, $typ:ty) => {
        $(#[$meta])*
        $vis fn $name(&self) -> &$typ {
            &self.$name
        }
    };
}

/// Check if the n-th bit is set.
///
/// Bits are 0-indexed, from the LSB.
pub(crate) fn is_bit_set<B>(value: B, index: usize) -> bool
where
    B: num_traits::PrimInt + num_traits::Unsigned,
{
    (value & (B::one() << index)) > B::zero()
}

/// Extract `width` bits starting at bit `offset` (from the LSB) as an unsigned value.
pub(crate) fn unsigned_bits(word: u16, offset: u32, width: u32) -> u16 {
    debug_assert!(offset + width <= u16::BITS);
    let shifted = word >> offset;
    if width >= u16::BITS {
        shifted
    } else {
        shifted & ((1u16 << width) - 1)
    }
}

/// Extract `width` bits starting at bit `offset` as a two's complement signed value.
pub(crate) fn signed_bits(word: u16, offset: u32, width: u32) -> i16 {
    let raw = unsigned_bits(word, offset, width);
    let shift = u16::BITS - width;
    // Move the field's sign bit to the top, then arithmetic shift back down.
    ((raw << shift) as i16) >> shift
}

/// Split a word into its four signed nibbles, lowest nibble first.
pub(crate) fn signed_nibbles(word: u16) -> [i16; 4] {
    [
        signed_bits(word, 0, 4),
        signed_bits(word, 4, 4),
        signed_bits(word, 8, 4),
        signed_bits(word, 12, 4),
    ]
}
