// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register level access to the camera.
//!
//! [`RegisterProtocol`] wraps a [`Transport`] and a [`Clock`], and implements the sequences the
//! camera expects for writing EEPROM, starting measurements and reading out new data.
use log::{debug, trace, warn};
use paste::paste;

use crate::address::{EepromAddress, RamAddress};
use crate::calibration::Calibration;
use crate::clock::Clock;
use crate::common::{Address, EEPROM_WORDS, RAM_WORDS};
use crate::config::ProtocolConfig;
use crate::error::{Error, LibraryError};
use crate::register::*;
use crate::transport::Transport;

/// DRY macro for the methods in `RegisterProtocol` that change a single register field.
///
/// The current register value is read first, and the register is only written if the field is
/// changing.
macro_rules! set_register_field {
    { $register:ty, $field:ident as $name:ident, $typ:ty, $doc:literal } => {
        paste! {
            #[doc = $doc]
            pub fn [< set_ $name >](&mut self, new_value: $typ) -> Result<(), Error<T::Error>> {
                let mut current: $register = self.read_register()?;
                if current.$field() != new_value {
                    current.[< set_ $field >](new_value);
                    self.write_register(current)
                } else {
                    Ok(())
                }
            }
        }
    };
    { $register:ty, $field:ident, $typ:ty, $doc:literal } => {
        set_register_field! { $register, $field as $field, $typ, $doc }
    };
}

/// The number of words in the device ID.
const DEVICE_ID_WORDS: usize = 3;

/// Register and memory access for a single camera.
#[derive(Clone, Debug)]
pub struct RegisterProtocol<T, C> {
    transport: T,

    clock: C,

    config: ProtocolConfig,
}

impl<T, C> RegisterProtocol<T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn new(transport: T, clock: C, config: ProtocolConfig) -> Self {
        Self {
            transport,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Give back the transport and clock.
    pub fn release(self) -> (T, C) {
        (self.transport, self.clock)
    }

    fn read_word(&mut self, address: Address) -> Result<u16, Error<T::Error>> {
        self.transport.read16(address).map_err(Error::Transport)
    }

    fn write_word(&mut self, address: Address, value: u16) -> Result<(), Error<T::Error>> {
        self.transport
            .write16(address, value)
            .map_err(Error::Transport)
    }

    /// Read a register from the camera.
    pub fn read_register<R: Register>(&mut self) -> Result<R, Error<T::Error>> {
        let raw = self.read_word(R::address())?;
        Ok(R::from(raw))
    }

    /// Write a register, then give the camera a moment to act on it.
    pub fn write_register<R: Register>(&mut self, register: R) -> Result<(), Error<T::Error>> {
        self.write_word(R::address(), register.into())?;
        self.clock.sleep(self.config.register_settle_delay);
        Ok(())
    }

    /// Write a word to EEPROM, verifying the write by reading the word back.
    ///
    /// EEPROM words have to be erased (written as 0) before a new value can be written. Each
    /// attempt is an erase, a write and a verification read, and at most
    /// [`eeprom_write_attempts`][ProtocolConfig::eeprom_write_attempts] attempts are made. At
    /// least one attempt is always made, even if that setting is 0.
    pub fn write_eeprom(&mut self, address: Address, value: u16) -> Result<(), Error<T::Error>> {
        let attempts = self.config.eeprom_write_attempts.max(1);
        let mut actual = 0;
        for attempt in 1..=attempts {
            self.write_word(address, 0)?;
            self.clock.sleep(self.config.eeprom_erase_delay);
            self.write_word(address, value)?;
            self.clock.sleep(self.config.eeprom_write_delay);
            actual = self.read_word(address)?;
            if actual == value {
                debug!("Wrote {:#06X} to EEPROM at {:?}", value, address);
                return Ok(());
            }
            warn!(
                "EEPROM write to {:?} did not verify (attempt {} of {}): wrote {:#06X}, read {:#06X}",
                address, attempt, attempts, value, actual
            );
        }
        Err(LibraryError::WriteVerification {
            address,
            expected: value,
            actual,
            attempts,
        }
        .into())
    }

    /// Write a register's value to its EEPROM copy, so it is used the next time the camera
    /// powers on.
    ///
    /// The register itself is not changed.
    pub fn persist_register<R: PersistentRegister>(
        &mut self,
        register: R,
    ) -> Result<(), Error<T::Error>> {
        self.write_eeprom(R::eeprom_address(), register.into())
    }

    /// Start a measurement.
    ///
    /// The start bit in the control register is set, and then the camera is reset. The camera
    /// clears the start bit once the measurement has begun.
    pub fn trigger_measurement(&mut self) -> Result<(), Error<T::Error>> {
        let mut control: ControlRegister = self.read_register()?;
        control.set_start_measurement(true);
        self.write_register(control)?;
        self.transport.reset().map_err(Error::Transport)?;
        self.clock.sleep(self.config.reset_delay);
        let control: ControlRegister = self.read_register()?;
        if control.start_measurement() {
            Err(LibraryError::Startup.into())
        } else {
            debug!("Measurement triggered");
            Ok(())
        }
    }

    /// Poll the status register until new data is available.
    ///
    /// When `subpage` is given, data for the other subpage is ignored. The status register is read
    /// at most [`max_polls`][ProtocolConfig::max_polls] times.
    pub fn wait_for_data(
        &mut self,
        subpage: Option<Subpage>,
    ) -> Result<StatusRegister, Error<T::Error>> {
        let max_polls = self.config.max_polls;
        for poll in 1..=max_polls {
            let status: StatusRegister = self.read_register()?;
            let subpage_matches =
                subpage.map_or(true, |subpage| status.last_updated_subpage() == subpage);
            trace!(
                "Status poll {}: new data {}, subpage {:?}",
                poll,
                status.new_data(),
                status.last_updated_subpage()
            );
            if status.new_data() && subpage_matches {
                return Ok(status);
            }
            if poll < max_polls {
                self.clock.sleep(self.config.poll_interval);
            }
        }
        Err(LibraryError::Timeout {
            attempts: max_polls,
        }
        .into())
    }

    /// Copy the camera's RAM into `words`, then clear the new data flag.
    ///
    /// `status` should be the status register value that reported the new data.
    pub fn read_frame(
        &mut self,
        status: StatusRegister,
        words: &mut [u16; RAM_WORDS],
    ) -> Result<(), Error<T::Error>> {
        self.transport
            .read_block(RamAddress::Base.into(), &mut words[..])
            .map_err(Error::Transport)?;
        let mut status = status;
        status.reset_new_data();
        self.write_register(status)
    }

    /// Read the calibration data out of EEPROM.
    pub fn load_calibration(&mut self) -> Result<Calibration, Error<T::Error>> {
        let mut words = [0u16; EEPROM_WORDS];
        self.transport
            .read_block(EepromAddress::Base.into(), &mut words)
            .map_err(Error::Transport)?;
        let calibration = Calibration::from_words(&words)?;
        debug!("Loaded calibration data ({} words)", EEPROM_WORDS);
        Ok(calibration)
    }

    /// The three word unique device ID.
    pub fn device_id(&mut self) -> Result<[u16; DEVICE_ID_WORDS], Error<T::Error>> {
        let mut id = [0u16; DEVICE_ID_WORDS];
        self.transport
            .read_block(EepromAddress::DeviceId.into(), &mut id)
            .map_err(Error::Transport)?;
        Ok(id)
    }

    /// Check if there is new data available, and if so, which subpage.
    pub fn data_available(&mut self) -> Result<Option<Subpage>, Error<T::Error>> {
        let status: StatusRegister = self.read_register()?;
        Ok(if status.new_data() {
            Some(status.last_updated_subpage())
        } else {
            None
        })
    }

    /// Clear the data available flag, signaling to the camera that the controller is ready for
    /// more data.
    ///
    /// This flag can only be reset by the controller.
    pub fn reset_data_available(&mut self) -> Result<(), Error<T::Error>> {
        let mut status: StatusRegister = self.read_register()?;
        status.reset_new_data();
        self.write_register(status)
    }

    /// Check if the overwrite enabled flag is set.
    ///
    /// This flag is only effective when data hold is enabled.
    pub fn overwrite_enabled(&mut self) -> Result<bool, Error<T::Error>> {
        Ok(self.read_register::<StatusRegister>()?.overwrite_enabled())
    }

    set_register_field! {
        StatusRegister,
        overwrite_enabled,
        bool,
        "Enable (or disable) overwriting of data in RAM with new data."
    }

    /// Check if the camera is using subpages.
    ///
    /// When disabled, only one page will be measured. The default is to use subpages.
    pub fn subpages_enabled(&mut self) -> Result<bool, Error<T::Error>> {
        Ok(self.read_register::<ControlRegister>()?.use_subpages())
    }

    set_register_field! {
        ControlRegister,
        use_subpages as subpages_enabled,
        bool,
        "Enable (or disable) the use of subpages."
    }

    /// Check if the "Enable data hold" flag is set.
    ///
    /// When this flag (bit 2 on 0x800D) is set, data is not copied to RAM unless the overwrite
    /// flag is set. The default is for this mode to be disabled.
    pub fn data_hold(&mut self) -> Result<bool, Error<T::Error>> {
        Ok(self.read_register::<ControlRegister>()?.data_hold())
    }

    set_register_field! {
        ControlRegister,
        data_hold,
        bool,
        "Enable (or disable) data holding."
    }

    /// Check if the camera is in subpage repeat mode.
    ///
    /// In subpage repeat mode only the [selected subpage][RegisterProtocol::selected_subpage] is
    /// measured. When disabled, the measured subpage alternates between the two.
    pub fn subpage_repeat(&mut self) -> Result<bool, Error<T::Error>> {
        Ok(self.read_register::<ControlRegister>()?.subpage_repeat())
    }

    set_register_field! {
        ControlRegister,
        subpage_repeat,
        bool,
        "Enable (or disable) subpage repeat mode."
    }

    /// The subpage measured when subpage repeat is enabled.
    pub fn selected_subpage(&mut self) -> Result<Subpage, Error<T::Error>> {
        Ok(self.read_register::<ControlRegister>()?.subpage())
    }

    set_register_field! {
        ControlRegister,
        subpage as selected_subpage,
        Subpage,
        "Set the subpage measured when subpage repeat is enabled."
    }

    /// Read the frame rate from the camera.
    ///
    /// The default frame rate is [2 FPS][FrameRate::Two].
    pub fn frame_rate(&mut self) -> Result<FrameRate, Error<T::Error>> {
        Ok(self.read_register::<ControlRegister>()?.frame_rate())
    }

    set_register_field! {
        ControlRegister,
        frame_rate,
        FrameRate,
        "Set the camera's frame rate."
    }

    /// Get the current resolution of the ADC in the camera.
    ///
    /// The default resolution is [18 bits][Resolution::Eighteen].
    pub fn resolution(&mut self) -> Result<Resolution, Error<T::Error>> {
        Ok(self.read_register::<ControlRegister>()?.resolution())
    }

    set_register_field! {
        ControlRegister,
        resolution,
        Resolution,
        "Set the ADC resolution within the camera."
    }

    /// Get the current access pattern used by the camera when updating subpages.
    pub fn access_pattern(&mut self) -> Result<AccessPattern, Error<T::Error>> {
        Ok(self.read_register::<ControlRegister>()?.access_pattern())
    }

    set_register_field! {
        ControlRegister,
        access_pattern,
        AccessPattern,
        "Set the access pattern used by the camera."
    }
}
