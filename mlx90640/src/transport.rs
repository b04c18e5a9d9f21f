// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! 16-bit word access to the camera's address space.
use embedded_hal::blocking::i2c;

use crate::common::Address;
use crate::util::WORD_SIZE;

/// The number of words read in a single I²C transaction.
///
/// This is one row of pixels, which keeps each transaction well under the buffer limits of most
/// I²C controllers.
const BLOCK_WORDS: usize = 32;

/// The I²C general call address, used for the software reset.
const GENERAL_CALL_ADDRESS: u8 = 0x00;

/// The general call command the camera treats as a reset.
const RESET_COMMAND: u8 = 0x06;

/// Reading and writing 16-bit words at 16-bit addresses.
///
/// All words are big-endian on the wire.
pub trait Transport {
    type Error;

    fn read16(&mut self, address: Address) -> Result<u16, Self::Error>;

    fn write16(&mut self, address: Address, value: u16) -> Result<(), Self::Error>;

    /// Fill `words` with consecutive words starting at `start`.
    fn read_block(&mut self, start: Address, words: &mut [u16]) -> Result<(), Self::Error>;

    /// Issue a software reset.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn read16(&mut self, address: Address) -> Result<u16, Self::Error> {
        (**self).read16(address)
    }

    fn write16(&mut self, address: Address, value: u16) -> Result<(), Self::Error> {
        (**self).write16(address, value)
    }

    fn read_block(&mut self, start: Address, words: &mut [u16]) -> Result<(), Self::Error> {
        (**self).read_block(start, words)
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        (**self).reset()
    }
}

/// A [`Transport`] for a camera on an `embedded-hal` I²C bus.
#[derive(Clone, Debug)]
pub struct I2cTransport<I2C> {
    bus: I2C,

    /// The I²C address this camera is accessible at.
    address: u8,
}

impl<I2C> I2cTransport<I2C>
where
    I2C: i2c::WriteRead + i2c::Write<Error = <I2C as i2c::WriteRead>::Error>,
{
    /// Access the camera at the given I²C address.
    ///
    /// MLX90640s can be configured to use any I²C address (except 0x00), but the default address
    /// is 0x33.
    pub fn new(bus: I2C, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn i2c_address(&self) -> u8 {
        self.address
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.bus
    }
}

impl<I2C> Transport for I2cTransport<I2C>
where
    I2C: i2c::WriteRead + i2c::Write<Error = <I2C as i2c::WriteRead>::Error>,
{
    type Error = <I2C as i2c::WriteRead>::Error;

    fn read16(&mut self, address: Address) -> Result<u16, Self::Error> {
        let mut bytes = [0u8; WORD_SIZE];
        self.bus
            .write_read(self.address, &address.as_bytes(), &mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    fn write16(&mut self, address: Address, value: u16) -> Result<(), Self::Error> {
        let address_bytes = address.as_bytes();
        let value_bytes = value.to_be_bytes();
        let combined = [
            address_bytes[0],
            address_bytes[1],
            value_bytes[0],
            value_bytes[1],
        ];
        self.bus.write(self.address, &combined)
    }

    fn read_block(&mut self, start: Address, words: &mut [u16]) -> Result<(), Self::Error> {
        let mut scratch = [0u8; BLOCK_WORDS * WORD_SIZE];
        for (chunk_index, chunk) in words.chunks_mut(BLOCK_WORDS).enumerate() {
            let chunk_address = start.offset(chunk_index * BLOCK_WORDS);
            let bytes = &mut scratch[..chunk.len() * WORD_SIZE];
            self.bus
                .write_read(self.address, &chunk_address.as_bytes(), bytes)?;
            for (word, word_bytes) in chunk.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
                *word = u16::from_be_bytes([word_bytes[0], word_bytes[1]]);
            }
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.bus.write(GENERAL_CALL_ADDRESS, &[RESET_COMMAND])
    }
}

#[cfg(test)]
mod test {
    use mlx90640_test_data::{mlx90640_datasheet_eeprom, mlx90640_datasheet_ram};

    use super::*;
    use crate::common::{EEPROM_WORDS, RAM_WORDS};
    use crate::test::{datasheet_camera, BusOperation};

    #[test]
    fn read_word() {
        let mock = datasheet_camera();
        let mut transport = I2cTransport::new(mock.clone(), mock.i2c_address());
        assert_eq!(transport.read16(Address::new(0x800D)).unwrap(), 0x1901);
        assert_eq!(transport.read16(Address::new(0x2433)).unwrap(), 0x9d68);
    }

    #[test]
    fn write_word() {
        let mock = datasheet_camera();
        let mut transport = I2cTransport::new(mock.clone(), mock.i2c_address());
        mock.clear_recent_operations();
        transport.write16(Address::new(0x800D), 0x1981).unwrap();
        assert_eq!(mock.word(Address::new(0x800D)), 0x1981);
        assert_eq!(
            mock.recent_operations()[0],
            BusOperation::Write {
                address: Address::new(0x800D),
                value: 0x1981
            }
        );
    }

    #[test]
    fn read_block_chunks() {
        let mock = datasheet_camera();
        let mut transport = I2cTransport::new(mock.clone(), mock.i2c_address());
        mock.clear_recent_operations();
        let mut ram = [0u16; RAM_WORDS];
        transport
            .read_block(Address::new(0x0400), &mut ram)
            .unwrap();
        assert_eq!(ram, mlx90640_datasheet_ram());
        assert_eq!(mock.recent_operations().len(), RAM_WORDS / BLOCK_WORDS);
        let mut eeprom = [0u16; EEPROM_WORDS];
        transport
            .read_block(Address::new(0x2400), &mut eeprom)
            .unwrap();
        assert_eq!(eeprom, mlx90640_datasheet_eeprom());
    }

    #[test]
    fn read_partial_block() {
        let mock = datasheet_camera();
        let mut transport = I2cTransport::new(mock.clone(), mock.i2c_address());
        let mut device_id = [0u16; 3];
        transport
            .read_block(Address::new(0x2407), &mut device_id)
            .unwrap();
        assert_eq!(device_id, mlx90640_datasheet_eeprom()[7..10]);
    }

    #[test]
    fn reset_general_call() {
        let mock = datasheet_camera();
        let mut transport = I2cTransport::new(mock.clone(), mock.i2c_address());
        mock.clear_recent_operations();
        transport.reset().unwrap();
        assert_eq!(mock.recent_operations()[0], BusOperation::Reset);
    }

    #[test]
    fn wrong_address() {
        let mock = datasheet_camera();
        let mut transport = I2cTransport::new(mock.clone(), 0x12);
        assert!(transport.read16(Address::new(0x800D)).is_err());
    }
}
