// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Typed views of the camera's configuration registers.
use core::convert::TryFrom;
use core::time::Duration;

use num_enum::{IntoPrimitive, TryFromPrimitive};
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;
use paste::paste;

use crate::address::{EepromAddress, RegisterAddress};
use crate::common::Address;
use crate::error::LibraryError;
use crate::util::is_bit_set;

/// Generate a getter and a setter for each listed register field.
macro_rules! register_fields {
    ($( $(#[$meta:meta])* $field:ident: $typ:ty ),* $(,)?) => {
        paste! {
            $(
                $(#[$meta])*
                pub fn $field(&self) -> $typ {
                    self.$field
                }

                #[doc = "Change the `" $field "` field. Nothing is written to the camera."]
                pub fn [< set_ $field >](&mut self, new_value: $typ) {
                    self.$field = new_value;
                }
            )*
        }
    };
}

/// Trait for common register functionality.
pub trait Register: Copy + Into<u16> + From<u16> {
    /// A bit mask of which bits can be modified by the controller.
    ///
    /// When changing register values on the camera, the current value should be read, then
    /// bitwise-ANDed with the complement of this mask, then bitwise-ORd with the new value. This
    /// preserves the values of any reserved bits in the registers.
    fn write_mask() -> u16;

    /// The address of this register in the camera's memory map.
    fn address() -> Address;
}

/// Registers that have a copy in EEPROM that is loaded when the camera powers on.
pub trait PersistentRegister: Register {
    /// The address of the EEPROM copy of this register.
    fn eeprom_address() -> Address;
}

/// Represents the possible states of the status register (0x8000).
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct StatusRegister {
    /// The subpage which was last updated by the camera. Read-only.
    last_updated_subpage: Subpage,

    /// Set when there is new data available in RAM. Read-write.
    ///
    /// This flag is set to true by the camera, and can only be reset by the controller.
    new_data: bool,

    /// Whether data in RAM can be overwritten.
    overwrite_enabled: bool,

    /// Start a measurement. Set by the controller, cleared by the camera.
    start_measurement: bool,
}

impl StatusRegister {
    /// The subpage which was last updated by the camera.
    pub fn last_updated_subpage(&self) -> Subpage {
        self.last_updated_subpage
    }

    /// Whether there is new data in RAM.
    pub fn new_data(&self) -> bool {
        self.new_data
    }

    /// Clear the new data flag, signalling the camera that the data has been read.
    pub fn reset_new_data(&mut self) {
        self.new_data = false;
    }

    register_fields! {
        /// Whether data in RAM can be overwritten when data hold is enabled.
        overwrite_enabled: bool,
        /// Whether a measurement has been requested and not started yet.
        start_measurement: bool,
    }
}

impl Register for StatusRegister {
    fn write_mask() -> u16 {
        // The three least significant bits are read-only.
        0x0038
    }

    fn address() -> Address {
        RegisterAddress::Status.into()
    }
}

impl From<u16> for StatusRegister {
    fn from(raw: u16) -> Self {
        // Only the first bit is used, the other two bits for this value are Melexis reserved
        let last_updated_subpage = if is_bit_set(raw, 0) {
            Subpage::One
        } else {
            Subpage::Zero
        };
        Self {
            last_updated_subpage,
            new_data: is_bit_set(raw, 3),
            overwrite_enabled: is_bit_set(raw, 4),
            start_measurement: is_bit_set(raw, 5),
        }
    }
}

impl From<StatusRegister> for u16 {
    fn from(status: StatusRegister) -> Self {
        let mut raw = 0u16;
        let subpage_int: usize = status.last_updated_subpage.into();
        raw |= subpage_int as u16;
        raw |= (status.new_data as u16) << 3;
        raw |= (status.overwrite_enabled as u16) << 4;
        raw |= (status.start_measurement as u16) << 5;
        raw
    }
}

/// Represents the possible states of the control register (0x800D).
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
// skip formatting in here as rustfmt will remove the extra blank lines around the "extra" bit
// comments.
#[rustfmt::skip]
pub struct ControlRegister {
    // The fields in this struct are laid out in least to most significant bits they occupy in the
    // control register.

    /// Whether or not to use subpages.
    use_subpages: bool,

    // Bit 1 is reserved.

    /// Only copy data into RAM when the status register allows overwriting.
    data_hold: bool,

    /// Only measure the subpage in `subpage` instead of alternating.
    subpage_repeat: bool,

    /// Which subpage to use when repeating.
    subpage: Subpage,

    // `subpage` takes up three bits, only the first is used.

    frame_rate: FrameRate,

    // `frame_rate` takes up three bits

    resolution: Resolution,

    // `resolution` takes up two bits.

    access_pattern: AccessPattern,

    // Bits 13 and 14 are reserved.

    /// Set to start a measurement, the camera clears it once the measurement has begun.
    start_measurement: bool,
}

impl ControlRegister {
    register_fields! {
        /// Whether or not to use subpages.
        ///
        /// If subpages are disabled, only one page will be updated. The default is enabled.
        use_subpages: bool,
        /// Whether data hold is enabled.
        ///
        /// By default data is transferred into RAM for each frame, but if this flag is enabled,
        /// data will only be written into RAM when the status register's overwrite flag is set.
        data_hold: bool,
        /// Whether subpage repeat mode is enabled.
        ///
        /// In subpage repeat mode, only the subpage in [`subpage`][ControlRegister::subpage] is
        /// measured. When disabled (the default) the camera alternates between subpages.
        ///
        /// This follows the datasheet's polarity: `true` is bit 3 set, and a set bit means
        /// repeat. Some descriptions of the camera document this bit as inverted, so don't flip
        /// the value when porting code written against them.
        subpage_repeat: bool,
        /// The subpage measured when subpage repeat is enabled.
        subpage: Subpage,
        /// The refresh rate of the camera. The default is [2Hz][FrameRate::Two].
        frame_rate: FrameRate,
        /// The resolution of the internal ADC. The default is [18 bits][Resolution::Eighteen].
        resolution: Resolution,
        /// The pixel access pattern. The default is the [chess pattern][AccessPattern::Chess].
        access_pattern: AccessPattern,
        /// The start measurement flag.
        start_measurement: bool,
    }
}

impl Default for ControlRegister {
    /// The power-on defaults documented in the datasheet (`0x1901`).
    fn default() -> Self {
        Self {
            use_subpages: true,
            data_hold: false,
            subpage_repeat: false,
            subpage: Subpage::Zero,
            frame_rate: FrameRate::default(),
            resolution: Resolution::default(),
            access_pattern: AccessPattern::Chess,
            start_measurement: false,
        }
    }
}

impl Register for ControlRegister {
    fn write_mask() -> u16 {
        // Bit 1 and bits 13 and 14 are reserved.
        0x9FFD
    }

    fn address() -> Address {
        RegisterAddress::Control.into()
    }
}

impl PersistentRegister for ControlRegister {
    fn eeprom_address() -> Address {
        EepromAddress::ControlRegister.into()
    }
}

impl From<u16> for ControlRegister {
    fn from(raw: u16) -> Self {
        let subpage = if is_bit_set(raw, 4) {
            Subpage::One
        } else {
            Subpage::Zero
        };
        let access_pattern = if is_bit_set(raw, 12) {
            AccessPattern::Chess
        } else {
            AccessPattern::Interleave
        };
        Self {
            use_subpages: is_bit_set(raw, 0),
            data_hold: is_bit_set(raw, 2),
            subpage_repeat: is_bit_set(raw, 3),
            subpage,
            frame_rate: FrameRate::from_raw_bits((raw >> 7) & 0x7),
            resolution: Resolution::from_raw_bits((raw >> 10) & 0x3),
            access_pattern,
            start_measurement: is_bit_set(raw, 15),
        }
    }
}

impl From<ControlRegister> for u16 {
    fn from(register: ControlRegister) -> Self {
        let mut raw = 0u16;
        raw |= register.use_subpages as u16;
        raw |= (register.data_hold as u16) << 2;
        raw |= (register.subpage_repeat as u16) << 3;
        let subpage_int: usize = register.subpage.into();
        raw |= (subpage_int as u16) << 4;
        raw |= register.frame_rate.as_raw() << 7;
        raw |= register.resolution.as_raw() << 10;
        if register.access_pattern == AccessPattern::Chess {
            raw |= 1u16 << 12;
        }
        raw |= (register.start_measurement as u16) << 15;
        raw
    }
}

/// Represents the possible states of the I²C configuration register (0x800F).
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct I2cRegister {
    /// Is Fast Mode+ (FM+) enabled?
    fast_mode_plus: bool,

    /// Halve the I²C threshold level?
    i2c_threshold_halved: bool,

    /// Whether or not to enable the SDA current limit.
    sda_current_limiter: bool,
}

impl I2cRegister {
    register_fields! {
        /// Whether Fast Mode+ is enabled. Defaults to enabled.
        fast_mode_plus: bool,
        /// Whether the I²C threshold level is halved. Defaults to disabled.
        i2c_threshold_halved: bool,
        /// Whether the SDA current limiter is enabled. Defaults to enabled.
        sda_current_limiter: bool,
    }
}

impl Default for I2cRegister {
    fn default() -> Self {
        Self {
            fast_mode_plus: true,
            i2c_threshold_halved: false,
            sda_current_limiter: true,
        }
    }
}

impl Register for I2cRegister {
    fn write_mask() -> u16 {
        // the fourth bit is documented, but it is "reserved" at 0. It *isn't* documented to always
        // be 0 though, so it's not in the mask.
        0x0007
    }

    fn address() -> Address {
        RegisterAddress::I2cConfig.into()
    }
}

impl PersistentRegister for I2cRegister {
    fn eeprom_address() -> Address {
        EepromAddress::I2cConfigRegister.into()
    }
}

impl From<u16> for I2cRegister {
    fn from(raw: u16) -> Self {
        // The camera stores "disabled" flags. In this crate 0 is always "disabled", so two of the
        // flags are inverted.
        Self {
            fast_mode_plus: !is_bit_set(raw, 0),
            i2c_threshold_halved: is_bit_set(raw, 1),
            sda_current_limiter: !is_bit_set(raw, 2),
        }
    }
}

impl From<I2cRegister> for u16 {
    fn from(register: I2cRegister) -> Self {
        let mut raw = 0u16;
        if !register.fast_mode_plus {
            raw |= 0x0001;
        }
        if register.i2c_threshold_halved {
            raw |= 0x0002;
        }
        if !register.sda_current_limiter {
            raw |= 0x0004;
        }
        raw
    }
}

/// The I²C address register (0x8010).
///
/// Only the lower byte is used; the upper byte is reserved by Melexis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct I2cAddressRegister {
    i2c_address: u8,
}

impl I2cAddressRegister {
    /// The default I²C address of the camera.
    pub const DEFAULT_ADDRESS: u8 = 0x33;

    /// The I²C address the camera responds to.
    pub fn i2c_address(&self) -> u8 {
        self.i2c_address
    }

    /// Change the I²C address.
    ///
    /// Addresses are 7 bits, and 0x00 is the general call address, so both of those are rejected.
    pub fn set_i2c_address(&mut self, new_address: u8) -> Result<(), LibraryError> {
        if new_address == 0 || new_address > 0x7F {
            Err(LibraryError::InvalidData(
                "I²C addresses must be within 0x01..=0x7F",
            ))
        } else {
            self.i2c_address = new_address;
            Ok(())
        }
    }
}

impl Default for I2cAddressRegister {
    fn default() -> Self {
        Self {
            i2c_address: Self::DEFAULT_ADDRESS,
        }
    }
}

impl Register for I2cAddressRegister {
    fn write_mask() -> u16 {
        0x00FF
    }

    fn address() -> Address {
        RegisterAddress::I2cAddress.into()
    }
}

impl PersistentRegister for I2cAddressRegister {
    fn eeprom_address() -> Address {
        EepromAddress::I2cAddress.into()
    }
}

impl From<u16> for I2cAddressRegister {
    fn from(raw: u16) -> Self {
        Self {
            i2c_address: (raw & 0x00FF) as u8,
        }
    }
}

impl From<I2cAddressRegister> for u16 {
    fn from(register: I2cAddressRegister) -> Self {
        u16::from(register.i2c_address)
    }
}

/// Identify which subpage to access.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum Subpage {
    Zero = 0,
    One = 1,
}

impl Subpage {
    /// The subpage measured after this one when the camera is alternating.
    pub fn other(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }
}

/// The possible refresh rates supported by the camera. Before using the higher refresh rates,
/// ensure your I²C bus is fast enough. A quick rundown of the the maximum frame rate some common
/// I²C bus speeds can support:
///
/// * 100kHz: [4Hz][FrameRate::Four]
/// * 400kHz: [16Hz][FrameRate::Sixteen]
/// * 1MHz: [64Hz][FrameRate::SixtyFour] (barely, [32Hz][FrameRate::ThirtyTwo] is safer)
///
/// On top of this requirement, your hardware has to be fast enough to be able to process each
/// frame of data before the next frame is ready. Each "frame" here is a single subpage.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum FrameRate {
    /// 0.5 Hz, one frame every two seconds.
    Half,

    /// 1Hz.
    One,

    /// 2Hz, which is also the default.
    Two,

    // 4Hz.
    Four,

    // 8Hz.
    Eight,

    // 16 Hz.
    Sixteen,

    // 32Hz.
    ThirtyTwo,

    // 64Hz.
    SixtyFour,
}

impl FrameRate {
    /// Attempt to create a `FrameRate` from a raw value from the camera.
    pub fn from_raw(raw_value: u16) -> Result<Self, LibraryError> {
        if raw_value > 7 {
            Err(LibraryError::InvalidData("Invalid frame rate given"))
        } else {
            Ok(Self::from_raw_bits(raw_value))
        }
    }

    /// Infallible conversion for an already masked three bit value.
    fn from_raw_bits(raw_value: u16) -> Self {
        match raw_value & 0x7 {
            0 => Self::Half,
            1 => Self::One,
            2 => Self::Two,
            3 => Self::Four,
            4 => Self::Eight,
            5 => Self::Sixteen,
            6 => Self::ThirtyTwo,
            _ => Self::SixtyFour,
        }
    }

    /// Map a frame rate variant into the representation used by the camera.
    pub fn as_raw(&self) -> u16 {
        match self {
            Self::Half => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 3,
            Self::Eight => 4,
            Self::Sixteen => 5,
            Self::ThirtyTwo => 6,
            Self::SixtyFour => 7,
        }
    }

    /// The time between two subpage measurements at this rate.
    pub fn period(&self) -> Duration {
        // 2 seconds at 0.5Hz, halving with every step
        Duration::from_micros(2_000_000 >> self.as_raw())
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::Two
    }
}

impl TryFrom<f32> for FrameRate {
    type Error = LibraryError;

    /// Attempt to create a `FrameRate` from a number.
    ///
    /// This will only work if the source number *exactly* matches one of the values named as a
    /// variant.
    /// ```
    /// # use core::convert::TryFrom;
    /// # use mlx90640::FrameRate;
    /// assert_eq!(FrameRate::try_from(0.5), Ok(FrameRate::Half));
    /// let almost_half = 0.50001;
    /// assert!(FrameRate::try_from(almost_half).is_err());
    /// ```
    #[allow(clippy::float_cmp)]
    fn try_from(value: f32) -> Result<Self, Self::Error> {
        if value == 0.5 {
            Ok(Self::Half)
        } else if value.fract() == 0.0 && (1.0..=64.0).contains(&value) {
            Self::try_from(value as u8)
        } else {
            Err(LibraryError::InvalidData(
                "The given number does not match a valid frame rate",
            ))
        }
    }
}

impl TryFrom<u8> for FrameRate {
    type Error = LibraryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        // No way to say 0.5, so skipping it
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            32 => Ok(Self::ThirtyTwo),
            64 => Ok(Self::SixtyFour),
            _ => Err(LibraryError::InvalidData(
                "The given number does not match a valid frame rate",
            )),
        }
    }
}

impl From<FrameRate> for f32 {
    fn from(frame_rate: FrameRate) -> Self {
        match frame_rate {
            FrameRate::Half => 0.5,
            FrameRate::One => 1f32,
            FrameRate::Two => 2f32,
            FrameRate::Four => 4f32,
            FrameRate::Eight => 8f32,
            FrameRate::Sixteen => 16f32,
            FrameRate::ThirtyTwo => 32f32,
            FrameRate::SixtyFour => 64f32,
        }
    }
}

/// The resolution of the internal [ADC][adc].
///
/// [adc]: https://en.wikipedia.org/wiki/Analog-to-digital_converter
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Resolution {
    /// 16-bit.
    Sixteen,

    /// 17-bit.
    Seventeen,

    /// 18-bit, which is also the default.
    Eighteen,

    /// 19-bit.
    Nineteen,
}

impl Resolution {
    /// Attempt to create a `Resolution` from a raw value from the camera.
    pub fn from_raw(raw_value: u16) -> Result<Self, LibraryError> {
        if raw_value > 3 {
            Err(LibraryError::InvalidData(
                "Invalid raw resolution value given",
            ))
        } else {
            Ok(Self::from_raw_bits(raw_value))
        }
    }

    fn from_raw_bits(raw_value: u16) -> Self {
        match raw_value & 0x3 {
            0 => Self::Sixteen,
            1 => Self::Seventeen,
            2 => Self::Eighteen,
            _ => Self::Nineteen,
        }
    }

    /// Map a resolution variant into the representation used by the camera.
    pub fn as_raw(&self) -> u16 {
        match self {
            Self::Sixteen => 0,
            Self::Seventeen => 1,
            Self::Eighteen => 2,
            Self::Nineteen => 3,
        }
    }
}

impl TryFrom<u8> for Resolution {
    type Error = LibraryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            16 => Ok(Self::Sixteen),
            17 => Ok(Self::Seventeen),
            18 => Ok(Self::Eighteen),
            19 => Ok(Self::Nineteen),
            _ => Err(LibraryError::InvalidData(
                "The given value did not match a valid ADC resolution",
            )),
        }
    }
}

impl From<Resolution> for u8 {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Sixteen => 16,
            Resolution::Seventeen => 17,
            Resolution::Eighteen => 18,
            Resolution::Nineteen => 19,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Eighteen
    }
}

/// The pixel access pattern used by the camera.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AccessPattern {
    /// Pixels alternate between subpages, resulting in a chess or checker board pattern.
    ///
    /// This is the default (and strongly recommended value) for the MLX90640.
    Chess = 1,

    /// Each row of pixels is in the same subpage, with the rows alternating between subpages.
    Interleave = 0,
}
