// Licensed under the Apache-2.0 license

//! Common types and constants for the I2C master driver.
//!
//! This module provides the bus speed classes and the controller
//! configuration shared by the engine and the blocking controller.

use fugit::{HertzU32, MillisDurationU32};

/// Default time budget for one START/address cycle and the bytes that follow it.
pub const DEFAULT_STEP_TIMEOUT_MS: u32 = 20;

/// Default number of status polls while waiting for the bus to become idle.
pub const DEFAULT_BUS_IDLE_SPINS: u32 = 10_000;

/// Default delay between two polls of the completion slot.
pub const DEFAULT_POLL_INTERVAL_US: u32 = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    /// Speed class the divider tables use for a requested bus frequency.
    #[must_use]
    pub fn from_frequency(frequency: HertzU32) -> Self {
        match frequency.raw() {
            f if f < 400_000 => I2cSpeed::Standard,
            f if f < 1_000_000 => I2cSpeed::Fast,
            _ => I2cSpeed::FastPlus,
        }
    }

    #[must_use]
    pub const fn frequency(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    /// Bus speed used for embedded-hal operations.
    pub speed: I2cSpeed,
    /// Watchdog budget for each step of a transfer.
    pub step_timeout: MillisDurationU32,
    /// Upper bound on bus-busy polling before giving up on a START.
    pub bus_idle_spins: u32,
    /// Delay between completion polls while a step is in flight.
    pub poll_interval_us: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    step_timeout: MillisDurationU32,
    bus_idle_spins: u32,
    poll_interval_us: u32,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Fast,
            step_timeout: MillisDurationU32::millis(DEFAULT_STEP_TIMEOUT_MS),
            bus_idle_spins: DEFAULT_BUS_IDLE_SPINS,
            poll_interval_us: DEFAULT_POLL_INTERVAL_US,
        }
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn step_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.step_timeout = timeout;
        self
    }
    #[must_use]
    pub fn bus_idle_spins(mut self, spins: u32) -> Self {
        self.bus_idle_spins = spins;
        self
    }
    #[must_use]
    pub fn poll_interval_us(mut self, interval: u32) -> Self {
        self.poll_interval_us = interval;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            step_timeout: self.step_timeout,
            // A zero limit would fail every START without looking at the bus.
            bus_idle_spins: self.bus_idle_spins.max(1),
            poll_interval_us: self.poll_interval_us,
        }
    }
}
