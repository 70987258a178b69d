// Licensed under the Apache-2.0 license

//! Controller register map and bit definitions.

use crate::i2c::traits::RegisterInterface;
use bitflags::bitflags;
use core::ptr::{read_volatile, write_volatile};

/// Registers the engine touches, by byte offset from the block base.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Divider = 0x01,
    Control = 0x02,
    Status = 0x03,
    Data = 0x04,
    Filter = 0x06,
}

impl Register {
    #[must_use]
    pub const fn offset(self) -> usize {
        self as usize
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Control: u8 {
        const ENABLE = 1 << 7;
        const INTERRUPT_ENABLE = 1 << 6;
        /// Set to generate START, cleared to generate STOP.
        const MASTER = 1 << 5;
        const TRANSMIT = 1 << 4;
        /// Do not acknowledge the next received byte.
        const NO_ACK = 1 << 3;
        /// Write-only: generate a repeated START.
        const REPEAT_START = 1 << 2;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Status: u8 {
        const TRANSFER_COMPLETE = 1 << 7;
        const ADDRESSED_AS_SLAVE = 1 << 6;
        const BUSY = 1 << 5;
        /// Write 1 to clear.
        const ARBITRATION_LOST = 1 << 4;
        const RANGE_ADDRESS_MATCH = 1 << 3;
        const SLAVE_READ = 1 << 2;
        /// Write 1 to clear.
        const INTERRUPT = 1 << 1;
        /// Set when the last transmitted byte was not acknowledged.
        const RECEIVE_NAK = 1 << 0;
    }
}

impl Control {
    /// Module enabled, interrupts off, not master.
    pub const IDLE: Control = Control::ENABLE;
    /// Module enabled with interrupts on, not master (issues STOP when
    /// written while master).
    pub const STOPPED: Control = Control::ENABLE.union(Control::INTERRUPT_ENABLE);
    /// Master transmitter with interrupts on.
    pub const MASTER_TRANSMIT: Control = Control::STOPPED
        .union(Control::MASTER)
        .union(Control::TRANSMIT);
    /// Master receiver acknowledging each byte.
    pub const MASTER_RECEIVE: Control = Control::STOPPED.union(Control::MASTER);
    /// Master receiver that will not acknowledge the next byte.
    pub const MASTER_RECEIVE_NO_ACK: Control = Control::MASTER_RECEIVE.union(Control::NO_ACK);
}

/// Memory-mapped register block.
pub struct MmioRegisters {
    base: usize,
}

impl MmioRegisters {
    /// # Safety
    ///
    /// `base` must be the address of the controller register block, valid
    /// for byte-wide volatile access for as long as this value is used, and
    /// no other code may drive the same controller.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn address(&self, register: Register) -> *mut u8 {
        (self.base + register.offset()) as *mut u8
    }
}

impl RegisterInterface for MmioRegisters {
    fn read8(&mut self, register: Register) -> u8 {
        // SAFETY: the register block is valid per `MmioRegisters::new`
        unsafe { read_volatile(self.address(register)) }
    }

    fn write8(&mut self, register: Register, value: u8) {
        // SAFETY: the register block is valid per `MmioRegisters::new`
        unsafe { write_volatile(self.address(register), value) }
    }
}
