// Licensed under the Apache-2.0 license

//! Messages making up a transfer.
//!
//! A message is a direction-homogeneous run of bytes exchanged with one
//! target. The buffer is borrowed from the caller for the duration of the
//! transfer; read buffers are filled in place.

use crate::i2c::common::I2cSpeed;
use fugit::HertzU32;

/// Highest valid 7-bit target address.
pub const MAX_ADDRESS: u8 = 0x7f;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

#[derive(Debug)]
enum Payload<'a> {
    Write(&'a [u8]),
    Read(&'a mut [u8]),
}

#[derive(Debug)]
pub struct Message<'a> {
    address: u8,
    frequency: HertzU32,
    no_restart: bool,
    payload: Payload<'a>,
}

impl<'a> Message<'a> {
    #[must_use]
    pub fn write(address: u8, bytes: &'a [u8]) -> Self {
        Self {
            address,
            frequency: I2cSpeed::Fast.frequency(),
            no_restart: false,
            payload: Payload::Write(bytes),
        }
    }

    #[must_use]
    pub fn read(address: u8, buffer: &'a mut [u8]) -> Self {
        Self {
            address,
            frequency: I2cSpeed::Fast.frequency(),
            no_restart: false,
            payload: Payload::Read(buffer),
        }
    }

    #[must_use]
    pub fn with_frequency(mut self, frequency: HertzU32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Continue the previous message without a repeated START.
    ///
    /// When the previous message cannot be continued (different target,
    /// speed or direction) a repeated START is issued as usual. On the first
    /// message of a transfer the flag suppresses the START altogether, which
    /// is only correct when the caller already owns the bus.
    #[must_use]
    pub fn no_restart(mut self) -> Self {
        self.no_restart = true;
        self
    }

    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[must_use]
    pub fn frequency(&self) -> HertzU32 {
        self.frequency
    }

    #[must_use]
    pub fn is_no_restart(&self) -> bool {
        self.no_restart
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        match self.payload {
            Payload::Write(_) => Direction::Write,
            Payload::Read(_) => Direction::Read,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Write(bytes) => bytes.len(),
            Payload::Read(buffer) => buffer.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address byte sent on the wire: target address and R/W bit.
    #[must_use]
    pub fn address_byte(&self) -> u8 {
        match self.direction() {
            Direction::Write => self.address << 1,
            Direction::Read => (self.address << 1) | 1,
        }
    }

    /// Whether `next` can follow this message on the bus without a
    /// repeated START and address cycle.
    #[must_use]
    pub fn continues_into(&self, next: &Message<'_>) -> bool {
        next.no_restart
            && next.address == self.address
            && next.frequency == self.frequency
            && next.direction() == self.direction()
            && !self.is_empty()
            && !next.is_empty()
    }

    pub(crate) fn byte(&self, offset: usize) -> Option<u8> {
        match &self.payload {
            Payload::Write(bytes) => bytes.get(offset).copied(),
            Payload::Read(_) => None,
        }
    }

    pub(crate) fn store(&mut self, offset: usize, byte: u8) {
        if let Payload::Read(buffer) = &mut self.payload {
            if let Some(slot) = buffer.get_mut(offset) {
                *slot = byte;
            }
        }
    }
}

/// Whether a START/address cycle is needed once `current` completes.
///
/// The last message of a transfer always counts as needing one: it ends
/// with a STOP, and its final byte must not be acknowledged.
#[must_use]
pub fn requires_restart(current: &Message<'_>, next: Option<&Message<'_>>) -> bool {
    next.map_or(true, |next| !current.continues_into(next))
}
