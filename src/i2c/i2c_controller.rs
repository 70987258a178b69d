// Licensed under the Apache-2.0 license

//! Blocking I2C controller.
//!
//! This module provides the thread-side entry point to the transfer engine:
//! it serializes callers, sequences the steps of a transfer and waits for
//! the interrupt handler or the watchdog to finish each one. It implements
//! embedded-hal's `I2c` on top of the same path.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::I2cConfig;
use crate::i2c::engine::I2cEngine;
use crate::i2c::error::Error;
use crate::i2c::message::{Message, MAX_ADDRESS};
use crate::i2c::state::TransferStatus;
use crate::i2c::traits::{BusClock, I2cMaster, RegisterInterface, Watchdog};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::HertzU32;

/// Most operations accepted in one embedded-hal transaction.
pub const MAX_TRANSACTION_MESSAGES: usize = 16;

pub struct I2cController<'a, R, C, W, D, L: Logger = NoOpLogger> {
    pub engine: &'a I2cEngine<R, C, W>,
    pub delay: D,
    pub config: I2cConfig,
    pub logger: L,
}

/// Holds the transaction lock; closes the record and releases the lock on
/// every exit path.
struct Session<'e, R, C, W>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
{
    engine: &'e I2cEngine<R, C, W>,
}

impl<R, C, W> Session<'_, R, C, W>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
{
    fn finish(self) -> TransferStatus {
        self.engine.close()
    }
}

impl<R, C, W> Drop for Session<'_, R, C, W>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
{
    fn drop(&mut self) {
        self.engine.close();
        self.engine.unlock();
    }
}

impl<'a, R, C, W, D> I2cController<'a, R, C, W, D, NoOpLogger>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
    D: DelayNs,
{
    pub fn new(engine: &'a I2cEngine<R, C, W>, delay: D, config: I2cConfig) -> Self {
        Self::with_logger(engine, delay, config, NoOpLogger)
    }
}

impl<'a, R, C, W, D, L> I2cController<'a, R, C, W, D, L>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
    D: DelayNs,
    L: Logger,
{
    pub fn with_logger(engine: &'a I2cEngine<R, C, W>, delay: D, config: I2cConfig, logger: L) -> Self {
        Self {
            engine,
            delay,
            config,
            logger,
        }
    }

    fn lock(&mut self) -> Session<'a, R, C, W> {
        while !self.engine.try_lock() {
            self.delay.delay_us(self.config.poll_interval_us);
        }
        Session {
            engine: self.engine,
        }
    }

    fn run(&mut self, messages: &mut [Message<'_>]) -> TransferStatus {
        let session = self.lock();
        // SAFETY: `session` closes the record before this function returns,
        // on unwind included, so the engine never outlives the borrow.
        unsafe { self.engine.open(messages) };

        let interval = self.config.poll_interval_us;
        while let Some(token) = self
            .engine
            .launch_step(&self.config, || self.delay.delay_us(interval))
        {
            while !self.engine.step_complete(token) {
                self.delay.delay_us(interval);
            }
            self.engine.end_step();
        }

        session.finish()
    }
}

impl<R, C, W, D, L> I2cMaster for I2cController<'_, R, C, W, D, L>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
    D: DelayNs,
    L: Logger,
{
    type Error = Error;

    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<(), Error> {
        if messages.iter().any(|message| message.address() > MAX_ADDRESS) {
            return Err(Error::InvalidMessage);
        }
        if messages.is_empty() {
            return Ok(());
        }

        self.logger
            .debug(format_args!("i2c: transfer of {} messages", messages.len()));
        match self.run(messages) {
            TransferStatus::Ok => Ok(()),
            status => {
                self.logger
                    .error(format_args!("i2c: transfer aborted: {status:?}"));
                Err(Error::Io)
            }
        }
    }

    /// Bus recovery is not implemented; always succeeds.
    fn reset(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl<R, C, W, D, L> embedded_hal::i2c::ErrorType for I2cController<'_, R, C, W, D, L>
where
    L: Logger,
{
    type Error = Error;
}

impl<R, C, W, D, L> embedded_hal::i2c::I2c for I2cController<'_, R, C, W, D, L>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
    D: DelayNs,
    L: Logger,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let frequency = self.config.speed.frequency();
        let mut messages = to_messages(address, frequency, operations)?;
        I2cMaster::transfer(self, &mut messages)
    }
}

/// Operations of one kind that follow each other in a transaction.
struct Run<'o> {
    is_read: bool,
    /// A message of the run is already queued.
    sent: bool,
    /// Empty operation held back until the run turns out to carry no data.
    placeholder: Option<Message<'o>>,
}

/// Turn embedded-hal operations into messages.
///
/// Adjacent operations of the same kind run without a repeated START. Empty
/// operations are dropped from a run that carries data, since an empty
/// message cannot be merged; a run of only empty operations becomes one
/// address-only message.
fn to_messages<'o>(
    address: SevenBitAddress,
    frequency: HertzU32,
    operations: &'o mut [Operation<'_>],
) -> Result<heapless::Vec<Message<'o>, MAX_TRANSACTION_MESSAGES>, Error> {
    let mut messages = heapless::Vec::new();
    let mut run: Option<Run<'o>> = None;

    for operation in operations.iter_mut() {
        let (message, is_read) = match operation {
            Operation::Read(buffer) => (Message::read(address, buffer), true),
            Operation::Write(bytes) => (Message::write(address, *bytes), false),
        };
        let message = message.with_frequency(frequency);

        if run.as_ref().map(|run| run.is_read) != Some(is_read) {
            if let Some(placeholder) = run.take().and_then(|run| run.placeholder) {
                messages
                    .push(placeholder)
                    .map_err(|_| Error::InvalidMessage)?;
            }
        }
        let run = run.get_or_insert(Run {
            is_read,
            sent: false,
            placeholder: None,
        });

        if message.is_empty() {
            if !run.sent && run.placeholder.is_none() {
                run.placeholder = Some(message);
            }
            continue;
        }
        let message = if run.sent {
            message.no_restart()
        } else {
            message
        };
        run.placeholder = None;
        run.sent = true;
        messages.push(message).map_err(|_| Error::InvalidMessage)?;
    }

    if let Some(placeholder) = run.and_then(|run| run.placeholder) {
        messages
            .push(placeholder)
            .map_err(|_| Error::InvalidMessage)?;
    }
    Ok(messages)
}
