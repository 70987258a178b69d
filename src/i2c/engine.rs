// Licensed under the Apache-2.0 license

//! Interrupt-driven side of the transfer engine.
//!
//! [`I2cEngine`] owns the controller registers, the watchdog and the
//! transfer record. The blocking side lives in
//! [`I2cController`](crate::i2c::i2c_controller::I2cController), which
//! borrows an engine; the interrupt vector calls [`I2cEngine::on_interrupt`]
//! and the watchdog's expiry handler calls [`I2cEngine::on_watchdog_expired`].
//!
//! All state sits behind one critical section. The interrupt handler and
//! the watchdog never wait on anything, and the coordinator never holds the
//! critical section while it waits for a step to finish.
//!
//! ```rust,ignore
//! static I2C0: I2cEngine<MmioRegisters, DividerTable, Pit0> =
//!     I2cEngine::new(unsafe { MmioRegisters::new(0x4006_6000) }, TABLE_48MHZ, Pit0::new());
//!
//! #[interrupt]
//! fn I2C0() {
//!     I2C0.on_interrupt();
//! }
//! ```

use crate::i2c::bus;
use crate::i2c::common::{I2cConfig, DEFAULT_STEP_TIMEOUT_MS};
use crate::i2c::machine::{Action, Event};
use crate::i2c::message::Message;
use crate::i2c::registers::{Control, Register, Status};
use crate::i2c::state::{TransferState, TransferStatus};
use crate::i2c::traits::{BusClock, RegisterInterface, StepToken, Watchdog};
use core::cell::{Cell, RefCell};
use critical_section::Mutex;
use fugit::MillisDurationU32;

struct Shared<R, C, W> {
    regs: R,
    clock: C,
    watchdog: W,
    state: TransferState,
    /// Generation of the step in flight.
    generation: u32,
    /// Generation of the last step that signalled completion.
    completed: Option<u32>,
    /// Budget of the step in flight, reused when a merged message rearms.
    step_timeout: MillisDurationU32,
}

pub struct I2cEngine<R, C, W> {
    shared: Mutex<RefCell<Shared<R, C, W>>>,
    locked: Mutex<Cell<bool>>,
}

impl<R, C, W> I2cEngine<R, C, W>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
{
    pub const fn new(regs: R, clock: C, watchdog: W) -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                regs,
                clock,
                watchdog,
                state: TransferState::new(),
                generation: 0,
                completed: None,
                step_timeout: MillisDurationU32::millis(DEFAULT_STEP_TIMEOUT_MS),
            })),
            locked: Mutex::new(Cell::new(false)),
        }
    }

    /// Enable the module with interrupts off and clear stale flags.
    pub fn enable(&self) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.regs.write8(Register::Control, Control::IDLE.bits());
            clear_flags(&mut shared.regs);
        });
    }

    /// Status of the current or most recent transfer.
    pub fn status(&self) -> TransferStatus {
        critical_section::with(|cs| self.shared.borrow_ref(cs).state.status())
    }

    /// Interrupt entry point. Entries with no flag raised are ignored.
    pub fn on_interrupt(&self) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let shared = &mut *shared;

            let status = Status::from_bits_retain(shared.regs.read8(Register::Status));
            if !status.intersects(Status::INTERRUPT | Status::ARBITRATION_LOST) {
                return;
            }
            let event = if status.contains(Status::ARBITRATION_LOST) {
                clear_flags(&mut shared.regs);
                Event::ArbitrationLost
            } else {
                shared
                    .regs
                    .write8(Register::Status, Status::INTERRUPT.bits());
                let control = Control::from_bits_retain(shared.regs.read8(Register::Control));
                if !control.contains(Control::TRANSMIT) {
                    Event::ByteReceived
                } else if status.contains(Status::RECEIVE_NAK) {
                    Event::ByteNaked
                } else {
                    Event::ByteAcked
                }
            };

            shared.dispatch(event);
        });
    }

    /// Watchdog expiry entry point.
    ///
    /// Expiries for a step that already completed, or for an earlier step,
    /// are ignored.
    pub fn on_watchdog_expired(&self, token: StepToken) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if token.0 != shared.generation || shared.completed == Some(token.0) {
                return;
            }
            shared.dispatch(Event::WatchdogExpired);
        });
    }

    pub(crate) fn try_lock(&self) -> bool {
        critical_section::with(|cs| {
            let locked = self.locked.borrow(cs);
            !locked.replace(true)
        })
    }

    pub(crate) fn unlock(&self) {
        critical_section::with(|cs| self.locked.borrow(cs).set(false));
    }

    /// Reset the record for a new transfer and program the bus speed.
    ///
    /// The frequency comes from the first message only; later messages'
    /// frequencies only matter for merge decisions.
    ///
    /// # Safety
    ///
    /// [`I2cEngine::close`] must be called before the borrow of `messages`
    /// ends.
    pub(crate) unsafe fn open(&self, messages: &mut [Message<'_>]) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let shared = &mut *shared;
            if let Some(first) = messages.first() {
                shared.set_frequency(first.frequency());
            }
            shared.state.open(messages);
            clear_flags(&mut shared.regs);
        });
    }

    /// Start the next step: decide on merging, take the bus and arm the
    /// watchdog.
    ///
    /// A `no_restart` flag on the first message skips the START, for callers
    /// that already own the bus. Later messages only get here when they could
    /// not be merged, and then always take a repeated START.
    ///
    /// Waiting for the bus runs outside the critical section, one register
    /// access at a time, calling `pause` between polls. The step is tagged
    /// before the address goes out, so a completion raised by the address
    /// interrupt is never lost.
    ///
    /// Returns `None` once the transfer has nothing left to do.
    pub(crate) fn launch_step(
        &self,
        config: &I2cConfig,
        pause: impl FnMut(),
    ) -> Option<StepToken> {
        let (token, address_byte) = critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let shared = &mut *shared;
            if !shared.state.has_pending_step() {
                return None;
            }
            shared.state.prepare_step();

            let message = shared.state.current()?;
            let skip_start = shared.state.cursor == 0 && message.is_no_restart();
            let address_byte = (!skip_start).then(|| message.address_byte());

            shared.generation = shared.generation.wrapping_add(1);
            shared.completed = None;
            shared.step_timeout = config.step_timeout;
            Some((StepToken(shared.generation), address_byte))
        })?;

        let acquired = match address_byte {
            Some(address_byte) => bus::acquire(
                &mut SectionedRegisters {
                    shared: &self.shared,
                },
                address_byte,
                config.bus_idle_spins,
                pause,
            ),
            None => Ok(()),
        };

        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            match acquired {
                Ok(()) => {
                    shared.watchdog.arm(config.step_timeout, token);
                    Some(token)
                }
                Err(status) => {
                    shared.state.status = status;
                    None
                }
            }
        })
    }

    pub(crate) fn step_complete(&self, token: StepToken) -> bool {
        critical_section::with(|cs| self.shared.borrow_ref(cs).completed == Some(token.0))
    }

    pub(crate) fn end_step(&self) {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).watchdog.cancel());
    }

    /// Quiesce the controller and release the caller's messages.
    ///
    /// Dropping mastership here also generates the STOP for transfers that
    /// ended without one (timeout, busy bus). Safe to call more than once.
    pub(crate) fn close(&self) -> TransferStatus {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let shared = &mut *shared;
            if shared.state.is_open() {
                shared.watchdog.cancel();
                shared.regs.write8(Register::Control, Control::IDLE.bits());
                shared.state.close();
            }
            shared.state.status()
        })
    }
}

impl<R, C, W> Shared<R, C, W>
where
    R: RegisterInterface,
    C: BusClock,
    W: Watchdog,
{
    fn set_frequency(&mut self, frequency: fugit::HertzU32) {
        if self.state.frequency == Some(frequency) {
            return;
        }
        let timing = self.clock.timing(frequency);
        self.regs.write8(Register::Divider, timing.divider);
        self.regs.write8(Register::Filter, timing.filter);
        self.state.frequency = Some(frequency);
    }

    fn dispatch(&mut self, event: Event) {
        for action in self.state.on_event(event) {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::SendByte(byte) => self.regs.write8(Register::Data, byte),
            Action::ReceiveInto { message, offset } => {
                let byte = self.regs.read8(Register::Data);
                self.state.store(message, offset, byte);
            }
            Action::DummyRead => {
                let _ = self.regs.read8(Register::Data);
            }
            Action::EnterReceive { ack: true } => self.set_control(Control::MASTER_RECEIVE),
            Action::EnterReceive { ack: false } | Action::SuppressAck => {
                self.set_control(Control::MASTER_RECEIVE_NO_ACK);
            }
            Action::EnterTransmit => self.set_control(Control::MASTER_TRANSMIT),
            Action::RearmWatchdog => {
                self.watchdog
                    .arm(self.step_timeout, StepToken(self.generation));
            }
            Action::IssueStop => self.set_control(Control::STOPPED),
            Action::SignalCompletion => self.completed = Some(self.generation),
        }
    }

    fn set_control(&mut self, control: Control) {
        self.regs.write8(Register::Control, control.bits());
    }
}

/// Register access taking a short critical section per access, so that
/// polling loops leave interrupts enabled between polls.
struct SectionedRegisters<'e, R, C, W> {
    shared: &'e Mutex<RefCell<Shared<R, C, W>>>,
}

impl<R: RegisterInterface, C, W> RegisterInterface for SectionedRegisters<'_, R, C, W> {
    fn read8(&mut self, register: Register) -> u8 {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).regs.read8(register))
    }

    fn write8(&mut self, register: Register, value: u8) {
        critical_section::with(|cs| {
            self.shared.borrow_ref_mut(cs).regs.write8(register, value);
        });
    }
}

fn clear_flags<R: RegisterInterface>(regs: &mut R) {
    regs.write8(
        Register::Status,
        (Status::INTERRUPT | Status::ARBITRATION_LOST).bits(),
    );
}
