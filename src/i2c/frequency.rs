// Licensed under the Apache-2.0 license

//! Static divider tables for the supported board bus clocks.

use crate::i2c::common::I2cSpeed;
use crate::i2c::traits::{BusClock, BusTiming};
use fugit::HertzU32;

const fn timing(divider: u8, filter: u8) -> BusTiming {
    BusTiming { divider, filter }
}

/// Divider settings for the three speed classes of one bus clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DividerTable {
    standard: BusTiming,
    fast: BusTiming,
    fast_plus: BusTiming,
}

// (bus clock MHz, standard, fast, fast-plus dividers, filter)
//
// Divider values are the F register encodings (MULT = 1, ICR) of the SCL
// clock divider, e.g. 0x34 divides by 1152.
const TABLES: [(u32, u8, u8, u8, u8); 18] = [
    (120, 0x34, 0x24, 0x17, 4), // /1152 104 kHz, /288 416 kHz, /128 938 kHz
    (108, 0x33, 0x23, 0x1a, 4), // /1024 105 kHz, /256 422 kHz, /112 964 kHz
    (96, 0x2f, 0x1f, 0x19, 4),  // /960 100 kHz, /240 400 kHz, /96 1 MHz
    (90, 0x32, 0x22, 0x15, 4),  // /896 100 kHz, /224 402 kHz, /88 1.02 MHz
    (80, 0x2e, 0x1e, 0x14, 4),  // /768 104 kHz, /192 416 kHz, /80 1 MHz
    (72, 0x2d, 0x1e, 0x13, 4),  // /640 112 kHz, /192 375 kHz, /72 1 MHz
    (64, 0x2d, 0x1d, 0x12, 4),  // /640 100 kHz, /160 400 kHz, /64 1 MHz
    (60, 0x2c, 0x1c, 0x12, 4), // 104 kHz, 416 kHz, 938 kHz
    (56, 0x2b, 0x1c, 0x0e, 4), // 109 kHz, 389 kHz, 1 MHz
    (54, 0x2b, 0x17, 0x0e, 4), // /512 105 kHz, /128 422 kHz, /56 964 kHz
    (48, 0x27, 0x1a, 0x0d, 4), // 100 kHz, 400 kHz, 1 MHz
    (40, 0x29, 0x19, 0x0b, 3), // 104 kHz, 416 kHz, 1 MHz
    (36, 0x28, 0x19, 0x0a, 3), // 113 kHz, 375 kHz, 1 MHz
    (24, 0x1f, 0x12, 0x02, 2), // 100 kHz, 375 kHz, 1 MHz
    (16, 0x20, 0x07, 0x00, 1), // 100 kHz, 400 kHz, 800 kHz
    (8, 0x14, 0x00, 0x00, 1),  // 100 kHz, 400 kHz
    (4, 0x07, 0x00, 0x00, 1),  // 100 kHz, 200 kHz
    (2, 0x00, 0x00, 0x00, 1),  // 100 kHz
];

impl DividerTable {
    /// Table for a board bus clock, if it is one of the supported rates.
    #[must_use]
    pub fn for_bus_clock(bus_clock: HertzU32) -> Option<Self> {
        TABLES
            .iter()
            .find(|(mhz, ..)| HertzU32::MHz(*mhz) == bus_clock)
            .map(|&(_, standard, fast, fast_plus, filter)| Self {
                standard: timing(standard, filter),
                fast: timing(fast, filter),
                fast_plus: timing(fast_plus, filter),
            })
    }
}

impl BusClock for DividerTable {
    fn timing(&self, target: HertzU32) -> BusTiming {
        match I2cSpeed::from_frequency(target) {
            I2cSpeed::Standard => self.standard,
            I2cSpeed::Fast => self.fast,
            I2cSpeed::FastPlus => self.fast_plus,
        }
    }
}
