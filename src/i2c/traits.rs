// Licensed under the Apache-2.0 license

//! # I2C Master Abstraction Traits
//!
//! The transfer engine is written against three narrow collaborator seams
//! and exposes one master-side trait to clients.
//!
//! ## Trait Map
//!
//! ```text
//! RegisterInterface  (byte-wide register access, consumed by the engine)
//! BusClock           (frequency to divider/filter mapping, consumed by the engine)
//! Watchdog           (one-shot step timer, consumed by the engine)
//! I2cMaster          (blocking transfers, implemented by I2cController)
//! ```
//!
//! Register access and the watchdog are always invoked with the engine's
//! critical section held, from either thread or interrupt context.
//! Implementations must not block.

use crate::i2c::error::Error;
use crate::i2c::message::Message;
use crate::i2c::registers::Register;
use fugit::{HertzU32, MillisDurationU32};

/// Byte-wide access to the controller registers.
pub trait RegisterInterface {
    fn read8(&mut self, register: Register) -> u8;
    fn write8(&mut self, register: Register, value: u8);
}

/// Divider and glitch-filter settings for one bus speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusTiming {
    pub divider: u8,
    pub filter: u8,
}

/// Maps a requested bus frequency onto the controller's clock settings.
///
/// The mapping depends on the board's bus clock and is usually a static
/// table; see [`DividerTable`](crate::i2c::frequency::DividerTable).
pub trait BusClock {
    fn timing(&self, target: HertzU32) -> BusTiming;
}

/// Identifies one step of a transfer.
///
/// Handed to [`Watchdog::arm`] and passed back to
/// [`I2cEngine::on_watchdog_expired`](crate::i2c::engine::I2cEngine::on_watchdog_expired)
/// on expiry, so that an expiry belonging to an earlier step is recognised
/// and ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StepToken(pub(crate) u32);

/// One-shot timer guarding each transfer step.
///
/// On expiry the timer's interrupt handler must call
/// [`I2cEngine::on_watchdog_expired`](crate::i2c::engine::I2cEngine::on_watchdog_expired)
/// with the token given to the most recent `arm`.
pub trait Watchdog {
    /// Start (or restart) the timer.
    fn arm(&mut self, timeout: MillisDurationU32, token: StepToken);

    /// Stop the timer if it is running.
    fn cancel(&mut self);
}

/// Blocking I2C master operations
///
/// # Examples
///
/// ```rust,no_run
/// use i2c_master_ddk::i2c::{I2cMaster, Message};
///
/// fn read_register<T: I2cMaster>(i2c: &mut T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.transfer(&mut [
///         Message::write(0x48, &[0x00]),
///         Message::read(0x48, &mut data),
///     ])?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster {
    type Error: embedded_hal::i2c::Error + core::fmt::Debug + From<Error>;

    /// Run `messages` as one bus transaction, blocking until it ends.
    ///
    /// # Errors
    ///
    /// Returns an error if any message is not acknowledged, arbitration is
    /// lost, a step times out, or the bus never becomes idle. The
    /// transaction is abandoned at the first failure; partial read buffers
    /// hold whatever arrived before it.
    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<(), Self::Error>;

    /// Attempt to recover a stuck bus.
    ///
    /// # Errors
    ///
    /// Implementations that cannot recover the bus may return an error.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Write `bytes` to the target at `address`.
    ///
    /// # Errors
    ///
    /// See [`I2cMaster::transfer`].
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.transfer(&mut [Message::write(address, bytes)])
    }

    /// Fill `buffer` from the target at `address`.
    ///
    /// # Errors
    ///
    /// See [`I2cMaster::transfer`].
    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.transfer(&mut [Message::read(address, buffer)])
    }

    /// Write `bytes` then read into `buffer` after a repeated START.
    ///
    /// # Errors
    ///
    /// See [`I2cMaster::transfer`].
    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.transfer(&mut [
            Message::write(address, bytes),
            Message::read(address, buffer),
        ])
    }
}
