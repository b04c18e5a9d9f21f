// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

use crate::common::Address;

/// Errors that don't involve the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum LibraryError {
    /// The calibration data could not be decoded (usually the wrong number of words).
    Decode(&'static str),

    /// The camera reported an invalid read (`0x7FFF`) in a word that is validated.
    BadData(Address),

    /// The status register never reported new data.
    Timeout {
        /// How many times the status register was read.
        attempts: usize,
    },

    /// A value written to EEPROM did not read back the same.
    WriteVerification {
        address: Address,
        expected: u16,
        actual: u16,
        /// How many write-verify rounds were attempted.
        attempts: usize,
    },

    /// The start measurement bit was still set after a reset.
    Startup,

    /// When a value from the camera or the caller is out of range.
    InvalidData(&'static str),
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::Decode(msg) => write!(f, "Unable to decode calibration data: {}", msg),
            LibraryError::BadData(address) => {
                write!(f, "Camera reported invalid data at {:?}", address)
            }
            LibraryError::Timeout { attempts } => write!(
                f,
                "No new data after polling the status register {} times",
                attempts
            ),
            LibraryError::WriteVerification {
                address,
                expected,
                actual,
                attempts,
            } => write!(
                f,
                "EEPROM write to {:?} failed after {} attempts: expected {:#06X}, read {:#06X}",
                address, attempts, expected, actual
            ),
            LibraryError::Startup => write!(f, "Measurement did not start"),
            LibraryError::InvalidData(msg) => write!(f, "{}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LibraryError {}

#[derive(Clone, PartialEq)]
pub enum Error<E> {
    /// Errors originating from the transport (usually an I²C bus).
    Transport(E),

    /// Errors originating from within this library.
    Library(LibraryError),
}

impl<E> Error<E> {
    /// The library error, if this isn't a transport error.
    pub fn library_error(&self) -> Option<&LibraryError> {
        match self {
            Error::Library(err) => Some(err),
            Error::Transport(_) => None,
        }
    }
}

// Written out so that the transport error is the only thing that needs to be Debug.
impl<E: fmt::Debug> fmt::Debug for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(err) => f.debug_tuple("Error::Transport").field(err).finish(),
            Error::Library(err) => f.debug_tuple("Error::Library").field(err).finish(),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(err) => write!(f, "Transport Error: {:?}", err),
            Error::Library(err) => write!(f, "Library Error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for Error<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            Error::Library(err) => Some(err),
        }
    }
}

impl<E> From<LibraryError> for Error<E> {
    fn from(lib_err: LibraryError) -> Self {
        Self::Library(lib_err)
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use std::format;

    use super::*;

    #[test]
    fn write_verification_display() {
        let err = LibraryError::WriteVerification {
            address: Address::new(0x240C),
            expected: 0x1901,
            actual: 0x0000,
            attempts: 3,
        };
        assert_eq!(
            format!("{}", err),
            "EEPROM write to Address(0x240C) failed after 3 attempts: expected 0x1901, read 0x0000"
        );
    }

    #[test]
    fn library_error_converts() {
        let err: Error<()> = LibraryError::Startup.into();
        assert_eq!(err.library_error(), Some(&LibraryError::Startup));
        let transport: Error<()> = Error::Transport(());
        assert_eq!(transport.library_error(), None);
    }
}
