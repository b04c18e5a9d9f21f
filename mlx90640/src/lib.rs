// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! A pure-Rust driver for the Melexis MLX90640 thermal camera.
//!
//! The camera has a large amount of calibration data that must be decoded before use, and the
//! output data requires a somewhat complex process to turn it into temperatures. This crate has
//! two levels of API: a background [acquisition loop][acquisition] that hands out finished
//! [frames][Frame], and the pieces it is built from if you need to go beyond what the loop can
//! do for you.
//!
//! Any bus with an [`embedded-hal`][embedded-hal] I²C implementation can be used through
//! [`I2cTransport`], and anything else that can read and write 16-bit words can implement
//! [`Transport`]. Without the `std` feature the library is `no_std` compatible (there is a large
//! memory requirement though), in which case the `libm` feature provides the floating point math.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/*/embedded_hal/blocking/i2c/index.html
//!
//! # Acquisition
//! ```no_run
//! use std::time::Duration;
//! use linux_embedded_hal::I2cdev;
//! use mlx90640::{acquisition, AcquisitionConfig, FrameDecoder, FrameRate, I2cTransport};
//! use mlx90640::{ProtocolConfig, RegisterProtocol, StdClock};
//!
//! let i2c_bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! // Default address for these cameras is 0x33
//! let transport = I2cTransport::new(i2c_bus, 0x33);
//! let mut protocol = RegisterProtocol::new(transport, StdClock::new(), ProtocolConfig::default());
//! let calibration = protocol.load_calibration()?;
//! let handle = acquisition::spawn(
//!     protocol,
//!     calibration,
//!     FrameDecoder::default(),
//!     AcquisitionConfig::default().with_frame_rate(FrameRate::Four),
//! );
//! // Each frame only updates one subpage, so wait for two of them.
//! if let Some(frame) = handle.wait_for_frame(1, Duration::from_secs(2)) {
//!     println!("Hottest pixel: {:?}", frame.min_max().map(|(_, max)| max));
//! }
//! handle.stop()?;
//! # Ok::<(), mlx90640::Error<linux_embedded_hal::i2cdev::linux::LinuxI2CError>>(())
//! ```
//! This snippet uses the camera on I²C bus #1 (`/dev/i2c-1`) at the default I²C address
//! (`0x33`). The calibration data is loaded from the camera before the acquisition thread takes
//! over the bus.
//!
//! # Lower Level Access
//! [`RegisterProtocol`] covers the camera's registers and the handshakes for EEPROM writes and
//! reading out measurements. [`Calibration`] decodes an EEPROM dump, and [`FrameDecoder`] turns a
//! [`RamSnapshot`] into temperatures. None of these need `std`.
//!
//! # Subpages and Access Patterns
//! A significant difference between these Melexis cameras and other common thermal cameras is how
//! they update their image data. Each measurement, one [subpage][Subpage] of data is updated,
//! covering half of the pixels. The [access pattern][AccessPattern] determines how the pixels are
//! divided between the subpages.

#![no_std]
#![allow(clippy::float_cmp)]

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Either the 'std' or 'libm' feature must be enabled.");

#[cfg(feature = "std")]
pub mod acquisition;
pub mod address;
pub mod calculations;
pub mod calibration;
pub mod clock;
pub mod common;
pub mod config;
#[doc(hidden)]
pub mod error;
pub mod frame;
pub mod protocol;
pub mod ram;
pub mod register;
pub mod repair;
pub mod transport;
mod util;

#[cfg(test)]
mod test;

#[cfg(feature = "std")]
#[doc(inline)]
pub use acquisition::AcquisitionHandle;
pub use calculations::FrameDecoder;
pub use calibration::Calibration;
pub use clock::Clock;
#[cfg(feature = "std")]
pub use clock::StdClock;
pub use common::{Address, HEIGHT, NUM_PIXELS, WIDTH};
pub use config::{AcquisitionConfig, Config, DecoderConfig, ProtocolConfig, ReflectedTemperature};
#[doc(inline)]
pub use error::{Error, LibraryError};
pub use frame::Frame;
pub use protocol::RegisterProtocol;
pub use ram::RamSnapshot;
pub use register::*;
pub use transport::{I2cTransport, Transport};
