// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Fixtures from the worked example in the MLX90640 datasheet.
#![no_std]

mod eeprom_data;
mod ram_data;

pub use eeprom_data::{mlx90640_datasheet_eeprom, EEPROM_WORDS};
pub use ram_data::{
    mlx90640_datasheet_ram, DATASHEET_CONTROL_REGISTER, DATASHEET_STATUS_REGISTER, RAM_WORDS,
};
