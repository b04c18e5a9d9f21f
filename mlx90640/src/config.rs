// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Tunable settings for talking to the camera and processing its data.
use core::time::Duration;

use crate::register::FrameRate;

/// How the reflected temperature (T<sub>r</sub>) is determined for each measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReflectedTemperature {
    /// Use the ambient temperature plus an offset (in degrees Celsius).
    AmbientOffset(f64),

    /// Use a fixed temperature (in degrees Celsius).
    Fixed(f64),
}

impl ReflectedTemperature {
    /// Resolve the reflected temperature for the given ambient temperature.
    pub fn resolve(&self, ambient_temperature: f64) -> f64 {
        match self {
            Self::AmbientOffset(offset) => ambient_temperature + offset,
            Self::Fixed(temperature) => *temperature,
        }
    }
}

impl Default for ReflectedTemperature {
    /// The sensor runs about 8℃ above its surroundings.
    fn default() -> Self {
        Self::AmbientOffset(-8.0)
    }
}

/// Timing and retry settings for register access.
#[derive(Clone, Debug, PartialEq)]
pub struct ProtocolConfig {
    /// Time between reads of the status register while waiting for new data.
    pub poll_interval: Duration,

    /// The maximum number of times the status register is read while waiting for new data.
    pub max_polls: usize,

    /// The time for the camera to erase an EEPROM word.
    pub eeprom_erase_delay: Duration,

    /// The time for the camera to write an EEPROM word.
    pub eeprom_write_delay: Duration,

    /// How many times to try writing an EEPROM word before giving up. 0 is treated as 1.
    pub eeprom_write_attempts: usize,

    /// The pause after writing a RAM register.
    pub register_settle_delay: Duration,

    /// The pause after a software reset before the control register is checked.
    pub reset_delay: Duration,
}

impl ProtocolConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: usize) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn with_eeprom_delays(mut self, erase: Duration, write: Duration) -> Self {
        self.eeprom_erase_delay = erase;
        self.eeprom_write_delay = write;
        self
    }

    pub fn with_eeprom_write_attempts(mut self, attempts: usize) -> Self {
        self.eeprom_write_attempts = attempts;
        self
    }

    pub fn with_register_settle_delay(mut self, delay: Duration) -> Self {
        self.register_settle_delay = delay;
        self
    }

    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(500),
            max_polls: 10_000,
            eeprom_erase_delay: Duration::from_millis(10),
            eeprom_write_delay: Duration::from_millis(10),
            eeprom_write_attempts: 3,
            register_settle_delay: Duration::from_micros(100),
            reset_delay: Duration::from_millis(1),
        }
    }
}

/// Settings for converting raw data into temperatures.
#[derive(Clone, Debug, PartialEq)]
pub struct DecoderConfig {
    /// The emissivity of the objects being measured, between 0 (exclusive) and 1.
    pub emissivity: f64,

    pub reflected_temperature: ReflectedTemperature,

    /// Replace failed and outlier pixels with values interpolated from their neighbours.
    pub repair_bad_pixels: bool,
}

impl DecoderConfig {
    pub fn with_emissivity(mut self, emissivity: f64) -> Self {
        self.emissivity = emissivity;
        self
    }

    pub fn with_reflected_temperature(mut self, reflected: ReflectedTemperature) -> Self {
        self.reflected_temperature = reflected;
        self
    }

    pub fn with_bad_pixel_repair(mut self, enabled: bool) -> Self {
        self.repair_bad_pixels = enabled;
        self
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            emissivity: 1.0,
            reflected_temperature: ReflectedTemperature::default(),
            repair_bad_pixels: true,
        }
    }
}

/// Settings for the background acquisition loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AcquisitionConfig {
    /// Write this refresh rate to the camera before starting. When `None` the rate the camera is
    /// already set to is used.
    pub frame_rate: Option<FrameRate>,
}

impl AcquisitionConfig {
    pub fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }
}

/// All of the settings in one place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    pub protocol: ProtocolConfig,

    pub decoder: DecoderConfig,

    pub acquisition: AcquisitionConfig,
}

impl Config {
    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_acquisition(mut self, acquisition: AcquisitionConfig) -> Self {
        self.acquisition = acquisition;
        self
    }
}
