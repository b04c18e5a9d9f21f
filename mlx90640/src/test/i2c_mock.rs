// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
extern crate std;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

use core::ops::RangeInclusive;

use embedded_hal::blocking::i2c;
use mlx90640_test_data::{
    mlx90640_datasheet_eeprom, mlx90640_datasheet_ram, DATASHEET_CONTROL_REGISTER,
    DATASHEET_STATUS_REGISTER,
};

use crate::common::{Address, EEPROM_WORDS, RAM_WORDS};

const RAM_RANGE: RangeInclusive<u16> = 0x0400..=0x073F;

const EEPROM_RANGE: RangeInclusive<u16> = 0x2400..=0x273F;

const STATUS_REGISTER_ADDRESS: u16 = 0x8000;

// Only the new data, overwrite and start bits can be changed.
const STATUS_REGISTER_WRITE_MASK: u16 = 0x0038;

const CONTROL_REGISTER_ADDRESS: u16 = 0x800D;

// Bit 1 and bits 13 and 14 are reserved.
const CONTROL_REGISTER_WRITE_MASK: u16 = 0x9FFD;

const I2C_CONFIG_REGISTER_ADDRESS: u16 = 0x800F;

// Only the last four bits of the I2C config register are documented.
const I2C_CONFIG_REGISTER_WRITE_MASK: u16 = 0x000F;

const I2C_ADDRESS_REGISTER_ADDRESS: u16 = 0x8010;

const I2C_ADDRESS_REGISTER_WRITE_MASK: u16 = 0x00FF;

/// The EEPROM words that hold register defaults. These are the only safe EEPROM locations to
/// write.
const WRITABLE_EEPROM: [u16; 3] = [0x240C, 0x240E, 0x240F];

const START_MEASUREMENT_BIT: u16 = 1 << 15;

const NEW_DATA_BIT: u16 = 1 << 3;

const RECENT_OPERATIONS_QUEUE_LENGTH: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum MockError {
    /// The given address should not be read.
    IllegalAccess(Address),

    /// The given address should not be written to.
    IllegalWriteAddress(Address),

    /// The given value is illegal for the given location.
    IllegalWriteValue(Address, u16),

    /// An unknown I2C address was given.
    UnknownI2cAddress(u8),

    /// The requested operation is not allowed.
    ///
    /// This covers situations such as a write-read where more than an address is written, and
    /// reads that aren't a whole number of words.
    IllegalOperation,
}

/// Operations as seen by the camera. Lengths are in words.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BusOperation {
    Read { address: Address, length: usize },
    Write { address: Address, value: u16 },
    Reset,
}

#[derive(Debug)]
struct CameraState {
    i2c_address: u8,
    eeprom: [u16; EEPROM_WORDS],
    ram: [u16; RAM_WORDS],
    status_register: u16,
    control_register: u16,
    i2c_config_register: u16,
    i2c_address_register: u16,
    /// When set, a reset does not clear the start measurement bit.
    sticky_start: bool,
    /// When set, clearing the new data flag completes the next subpage measurement.
    auto_advance: bool,
    /// Replacement RAM contents, used (in order) by each automatic measurement.
    queued_frames: VecDeque<[u16; RAM_WORDS]>,
    /// The number of upcoming EEPROM writes of non-zero values that are dropped.
    failing_eeprom_writes: usize,
    status_reads: usize,
    recent_operations: VecDeque<BusOperation>,
}

/// A fake MLX90640 on an I²C bus.
///
/// Clones share the same camera, so one copy can be handed to the code under test and another
/// kept to inspect and change the camera's state.
#[derive(Clone, Debug)]
pub(crate) struct MockCameraBus {
    state: Arc<Mutex<CameraState>>,
}

fn check_new_against_mask(existing: u16, mask: u16, new: u16) -> bool {
    (new & !mask) == (existing & !mask)
}

impl MockCameraBus {
    pub(crate) fn new(
        i2c_address: u8,
        eeprom: [u16; EEPROM_WORDS],
        ram: [u16; RAM_WORDS],
        control_register: u16,
        status_register: u16,
    ) -> Self {
        let state = CameraState {
            i2c_address,
            eeprom,
            ram,
            status_register,
            control_register,
            i2c_config_register: 0x0000,
            i2c_address_register: u16::from(i2c_address),
            sticky_start: false,
            auto_advance: false,
            queued_frames: VecDeque::new(),
            failing_eeprom_writes: 0,
            status_reads: 0,
            recent_operations: VecDeque::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, CameraState> {
        // A panicking test thread shouldn't hide the original failure behind a poison error.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn i2c_address(&self) -> u8 {
        self.state().i2c_address
    }

    /// Peek at a word without recording an operation.
    pub(crate) fn word(&self, address: Address) -> u16 {
        let state = self.state();
        state
            .read(u16::from(address))
            .expect("the address should be readable")
    }

    /// Change a word directly, bypassing the write checks.
    pub(crate) fn set_word(&self, address: Address, value: u16) {
        let raw_address = u16::from(address);
        let mut state = self.state();
        if RAM_RANGE.contains(&raw_address) {
            state.ram[usize::from(raw_address - RAM_RANGE.start())] = value;
        } else if EEPROM_RANGE.contains(&raw_address) {
            state.eeprom[usize::from(raw_address - EEPROM_RANGE.start())] = value;
        } else {
            match raw_address {
                STATUS_REGISTER_ADDRESS => state.status_register = value,
                CONTROL_REGISTER_ADDRESS => state.control_register = value,
                I2C_CONFIG_REGISTER_ADDRESS => state.i2c_config_register = value,
                I2C_ADDRESS_REGISTER_ADDRESS => state.i2c_address_register = value,
                _ => panic!("{:?} is not a known address", address),
            }
        }
    }

    pub(crate) fn set_sticky_start(&self, sticky: bool) {
        self.state().sticky_start = sticky;
    }

    pub(crate) fn set_auto_advance(&self, auto_advance: bool) {
        self.state().auto_advance = auto_advance;
    }

    /// Use `ram` as the result of a future automatic measurement.
    pub(crate) fn queue_frame(&self, ram: [u16; RAM_WORDS]) {
        self.state().queued_frames.push_back(ram);
    }

    pub(crate) fn fail_eeprom_writes(&self, count: usize) {
        self.state().failing_eeprom_writes = count;
    }

    /// Set the "new data available" flag in the status register to a new value
    pub(crate) fn set_data_available(&self, available: bool) {
        let mut state = self.state();
        if available {
            state.status_register |= NEW_DATA_BIT;
        } else {
            state.status_register &= !NEW_DATA_BIT;
        }
    }

    /// The number of times the status register has been read over the bus.
    pub(crate) fn status_reads(&self) -> usize {
        self.state().status_reads
    }

    /// Operations performed on the bus, most recent first.
    pub(crate) fn recent_operations(&self) -> Vec<BusOperation> {
        self.state().recent_operations.iter().copied().collect()
    }

    pub(crate) fn clear_recent_operations(&self) {
        self.state().recent_operations.clear()
    }
}

impl CameraState {
    fn add_operation(&mut self, operation: BusOperation) {
        self.recent_operations.push_front(operation);
        self.recent_operations
            .truncate(RECENT_OPERATIONS_QUEUE_LENGTH);
    }

    fn read(&self, address: u16) -> Result<u16, MockError> {
        if RAM_RANGE.contains(&address) {
            Ok(self.ram[usize::from(address - RAM_RANGE.start())])
        } else if EEPROM_RANGE.contains(&address) {
            Ok(self.eeprom[usize::from(address - EEPROM_RANGE.start())])
        } else {
            match address {
                STATUS_REGISTER_ADDRESS => Ok(self.status_register),
                CONTROL_REGISTER_ADDRESS => Ok(self.control_register),
                I2C_CONFIG_REGISTER_ADDRESS => Ok(self.i2c_config_register),
                I2C_ADDRESS_REGISTER_ADDRESS => Ok(self.i2c_address_register),
                _ => Err(MockError::IllegalAccess(address.into())),
            }
        }
    }

    fn read_block(&mut self, start: u16, out: &mut [u8]) -> Result<(), MockError> {
        if out.is_empty() || out.len() % 2 != 0 {
            return Err(MockError::IllegalOperation);
        }
        let length = out.len() / 2;
        let end = start
            .checked_add(length as u16 - 1)
            .ok_or(MockError::IllegalOperation)?;
        let contiguous = (RAM_RANGE.contains(&start) && RAM_RANGE.contains(&end))
            || (EEPROM_RANGE.contains(&start) && EEPROM_RANGE.contains(&end))
            || length == 1;
        if !contiguous {
            // The registers are non-contiguous, so only one can be read at a time.
            return Err(MockError::IllegalAccess(end.into()));
        }
        for (offset, bytes) in out.chunks_exact_mut(2).enumerate() {
            let word = self.read(start + offset as u16)?;
            bytes.copy_from_slice(&word.to_be_bytes());
        }
        if start == STATUS_REGISTER_ADDRESS {
            self.status_reads += 1;
        }
        self.add_operation(BusOperation::Read {
            address: start.into(),
            length,
        });
        Ok(())
    }

    fn write(&mut self, address: u16, value: u16) -> Result<(), MockError> {
        if EEPROM_RANGE.contains(&address) {
            if !WRITABLE_EEPROM.contains(&address) {
                return Err(MockError::IllegalWriteAddress(address.into()));
            }
            self.add_operation(BusOperation::Write {
                address: address.into(),
                value,
            });
            let index = usize::from(address - EEPROM_RANGE.start());
            // Words need to be erased (written as 0) before being written
            if value == 0 {
                self.eeprom[index] = 0;
            } else if self.failing_eeprom_writes > 0 {
                self.failing_eeprom_writes -= 1;
            } else if self.eeprom[index] != 0 {
                return Err(MockError::IllegalWriteValue(address.into(), value));
            } else {
                self.eeprom[index] = value;
            }
            return Ok(());
        }
        let (mask, existing) = match address {
            STATUS_REGISTER_ADDRESS => (STATUS_REGISTER_WRITE_MASK, self.status_register),
            CONTROL_REGISTER_ADDRESS => (CONTROL_REGISTER_WRITE_MASK, self.control_register),
            I2C_CONFIG_REGISTER_ADDRESS => {
                (I2C_CONFIG_REGISTER_WRITE_MASK, self.i2c_config_register)
            }
            I2C_ADDRESS_REGISTER_ADDRESS => {
                (I2C_ADDRESS_REGISTER_WRITE_MASK, self.i2c_address_register)
            }
            // RAM is only written by the camera.
            _ => return Err(MockError::IllegalWriteAddress(address.into())),
        };
        if !check_new_against_mask(existing, mask, value) {
            return Err(MockError::IllegalWriteValue(address.into(), value));
        }
        self.add_operation(BusOperation::Write {
            address: address.into(),
            value,
        });
        match address {
            STATUS_REGISTER_ADDRESS => {
                self.status_register = value;
                if self.auto_advance && value & NEW_DATA_BIT == 0 {
                    self.measure_next_subpage();
                }
            }
            CONTROL_REGISTER_ADDRESS => self.control_register = value,
            I2C_CONFIG_REGISTER_ADDRESS => self.i2c_config_register = value,
            _ => self.i2c_address_register = value,
        }
        Ok(())
    }

    /// Pretend the camera has finished measuring the other subpage.
    fn measure_next_subpage(&mut self) {
        if let Some(frame) = self.queued_frames.pop_front() {
            self.ram = frame;
        }
        self.status_register ^= 0x0001;
        self.status_register |= NEW_DATA_BIT;
    }

    fn reset(&mut self) {
        self.add_operation(BusOperation::Reset);
        if !self.sticky_start {
            self.control_register &= !START_MEASUREMENT_BIT;
        }
    }
}

impl i2c::Write for MockCameraBus {
    type Error = MockError;

    fn write(&mut self, i2c_address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.state();
        if i2c_address == 0x00 {
            // General call
            return if *bytes == [0x06] {
                state.reset();
                Ok(())
            } else {
                Err(MockError::IllegalOperation)
            };
        }
        if i2c_address != state.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        // Only single word writes are supported by the camera.
        if bytes.len() != 4 {
            return Err(MockError::IllegalOperation);
        }
        let address = u16::from_be_bytes([bytes[0], bytes[1]]);
        let value = u16::from_be_bytes([bytes[2], bytes[3]]);
        state.write(address, value)
    }
}

impl i2c::WriteRead for MockCameraBus {
    type Error = MockError;

    fn write_read(
        &mut self,
        i2c_address: u8,
        write_buffer: &[u8],
        out_buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        if i2c_address != state.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        // Write-reads should only be writing the address, so write_buffer should only be two bytes
        if write_buffer.len() != 2 {
            return Err(MockError::IllegalOperation);
        }
        let address = u16::from_be_bytes([write_buffer[0], write_buffer[1]]);
        state.read_block(address, out_buffer)
    }
}

/// The camera from the datasheet's worked example.
///
/// A non-default I²C address is used to make sure nothing assumes the default.
pub(crate) fn datasheet_camera() -> MockCameraBus {
    MockCameraBus::new(
        0x30,
        mlx90640_datasheet_eeprom(),
        mlx90640_datasheet_ram(),
        DATASHEET_CONTROL_REGISTER,
        DATASHEET_STATUS_REGISTER,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_write_mask() {
        let mut bus = datasheet_camera();
        let address = bus.i2c_address();
        // Changing the last updated subpage isn't allowed
        let write = [0x80, 0x00, 0x00, 0x09];
        assert_eq!(
            i2c::Write::write(&mut bus, address, &write),
            Err(MockError::IllegalWriteValue(Address::new(0x8000), 0x0009))
        );
        let write = [0x80, 0x00, 0x00, 0x00];
        assert_eq!(i2c::Write::write(&mut bus, address, &write), Ok(()));
        assert_eq!(bus.word(Address::new(0x8000)), 0x0000);
    }

    #[test]
    fn auto_advance() {
        let mut bus = datasheet_camera();
        let address = bus.i2c_address();
        bus.set_auto_advance(true);
        let mut next = mlx90640_datasheet_ram();
        next[0] = 0x1234;
        bus.queue_frame(next);
        i2c::Write::write(&mut bus, address, &[0x80, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(bus.word(Address::new(0x8000)), 0x0009);
        assert_eq!(bus.word(Address::new(0x0400)), 0x1234);
    }

    #[test]
    fn eeprom_requires_erase() {
        let mut bus = datasheet_camera();
        let address = bus.i2c_address();
        bus.set_word(Address::new(0x240C), 0x1901);
        assert!(i2c::Write::write(&mut bus, address, &[0x24, 0x0C, 0x19, 0x81]).is_err());
        i2c::Write::write(&mut bus, address, &[0x24, 0x0C, 0x00, 0x00]).unwrap();
        i2c::Write::write(&mut bus, address, &[0x24, 0x0C, 0x19, 0x81]).unwrap();
        assert_eq!(bus.word(Address::new(0x240C)), 0x1981);
        // Calibration data is off limits
        assert!(i2c::Write::write(&mut bus, address, &[0x24, 0x33, 0x00, 0x00]).is_err());
    }
}
