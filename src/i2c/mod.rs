// Licensed under the Apache-2.0 license

//! Interrupt-driven I2C bus-master driver.
//!
//! The driver is split between an [`I2cEngine`], which owns the controller
//! and is advanced by the interrupt handler and the step watchdog, and an
//! [`I2cController`], which borrows the engine and blocks the calling thread
//! for the duration of a transfer. Hardware, clock tables and the watchdog
//! are reached through the traits in [`traits`], so the engine runs the same
//! against memory-mapped registers and a simulated bus.

pub(crate) mod bus;
pub mod common;
pub mod engine;
pub mod error;
pub mod frequency;
pub mod i2c_controller;
pub mod machine;
pub mod message;
pub mod registers;
pub mod state;
pub mod traits;

#[cfg(test)]
pub(crate) mod sim;

pub use common::{I2cConfig, I2cConfigBuilder, I2cSpeed};
pub use engine::I2cEngine;
pub use error::Error;
pub use frequency::DividerTable;
pub use i2c_controller::{I2cController, MAX_TRANSACTION_MESSAGES};
pub use message::{requires_restart, Direction, Message, MAX_ADDRESS};
pub use registers::{Control, MmioRegisters, Register, Status};
pub use state::{TransferState, TransferStatus};
pub use traits::{BusClock, BusTiming, I2cMaster, RegisterInterface, StepToken, Watchdog};
