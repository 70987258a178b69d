// Licensed under the Apache-2.0 license

//! Simulated controller, bus and watchdog for driver tests.
//!
//! `SimRegisters` reacts to register accesses the way the controller does:
//! setting MASTER generates START, clearing it generates STOP, a data write
//! in transmit mode sends an address or data byte, and a data read in
//! receive mode fetches the next byte from the addressed device, ACKed
//! unless NO_ACK is set at that moment. Every bus condition is recorded as
//! a [`Wire`] entry.

use crate::i2c::engine::I2cEngine;
use crate::i2c::frequency::DividerTable;
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::registers::{Control, Register, Status};
use crate::i2c::traits::{RegisterInterface, StepToken, Watchdog};
use embedded_hal::delay::DelayNs;
use fugit::{MillisDurationU32, RateExtU32};
use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

pub type SimEngine = I2cEngine<SimRegisters, DividerTable, SimWatchdog>;
pub type SimController<'e> =
    I2cController<'e, SimRegisters, DividerTable, SimWatchdog, SimDelay<'e>>;

/// What happened on the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wire {
    Start,
    RepeatedStart,
    Address(u8),
    Write(u8),
    Read { byte: u8, acked: bool },
    Stop,
}

struct Device {
    address: u8,
    /// Returned from the start on every read addressing.
    data: Vec<u8>,
    cursor: usize,
    received: Vec<u8>,
    /// NAK the data byte that brings `received` to this length.
    nak_after: Option<usize>,
}

#[derive(Default)]
struct BusModel {
    control: u8,
    interrupt: bool,
    arbitration_lost: bool,
    nak: bool,
    master: bool,
    external_busy: bool,
    expect_address: bool,
    /// Addressed device and whether it was addressed for reading.
    target: Option<(usize, bool)>,
    latch: u8,
    fetched: usize,
    devices: Vec<Device>,
    wire: Vec<Wire>,
    divider: u8,
    divider_writes: Vec<(u8, u8)>,
    dummy_reads: usize,
    hung: bool,
    /// Bytes (address included) still to complete before the bus hangs.
    hang_after: Option<usize>,
    lose_arbitration: bool,
}

impl BusModel {
    fn control(&self) -> Control {
        Control::from_bits_retain(self.control)
    }

    fn status(&self) -> u8 {
        let mut status = Status::empty();
        status.set(Status::BUSY, self.master || self.external_busy);
        status.set(Status::ARBITRATION_LOST, self.arbitration_lost);
        status.set(Status::INTERRUPT, self.interrupt);
        status.set(Status::RECEIVE_NAK, self.nak);
        status.bits()
    }

    fn complete_byte(&mut self) {
        match self.hang_after {
            Some(0) => {
                self.hung = true;
                self.hang_after = None;
            }
            Some(count) => self.hang_after = Some(count - 1),
            None => {}
        }
        if !self.hung {
            self.interrupt = true;
        }
    }

    fn write_control(&mut self, value: u8) {
        let old = self.control();
        let new = Control::from_bits_retain(value);
        self.control = new.difference(Control::REPEAT_START).bits();

        match (old.contains(Control::MASTER), new.contains(Control::MASTER)) {
            (false, true) => {
                self.master = true;
                self.expect_address = true;
                self.wire.push(Wire::Start);
            }
            (true, false) => {
                self.master = false;
                self.target = None;
                self.wire.push(Wire::Stop);
            }
            (true, true) if new.contains(Control::REPEAT_START) => {
                self.expect_address = true;
                self.wire.push(Wire::RepeatedStart);
            }
            _ => {}
        }
    }

    fn write_data(&mut self, value: u8) {
        if !self.master || !self.control().contains(Control::TRANSMIT) {
            return;
        }

        if self.expect_address {
            self.expect_address = false;
            self.fetched = 0;
            self.wire.push(Wire::Address(value));
            if self.lose_arbitration {
                self.lose_arbitration = false;
                self.arbitration_lost = true;
                self.master = false;
                self.control &= !Control::MASTER.bits();
                self.interrupt = true;
                return;
            }
            let index = self.devices.iter().position(|d| d.address == value >> 1);
            if let Some(index) = index {
                self.devices[index].cursor = 0;
            }
            self.target = index.map(|index| (index, value & 1 == 1));
            self.nak = index.is_none();
        } else {
            self.wire.push(Wire::Write(value));
            self.nak = match self.target {
                Some((index, false)) => {
                    let device = &mut self.devices[index];
                    device.received.push(value);
                    device
                        .nak_after
                        .is_some_and(|count| device.received.len() >= count)
                }
                _ => true,
            };
        }
        self.complete_byte();
    }

    fn read_data(&mut self) -> u8 {
        let latched = self.latch;
        let control = self.control();
        if !self.master || control.contains(Control::TRANSMIT) {
            return latched;
        }

        if self.fetched == 0 {
            self.dummy_reads += 1;
        }
        let byte = match self.target {
            Some((index, true)) => {
                let device = &mut self.devices[index];
                let byte = device.data.get(device.cursor).copied().unwrap_or(0xff);
                device.cursor += 1;
                byte
            }
            _ => 0xff,
        };
        let acked = !control.contains(Control::NO_ACK);
        self.wire.push(Wire::Read { byte, acked });
        self.latch = byte;
        self.fetched += 1;
        self.complete_byte();
        latched
    }
}

/// Handle on the simulated bus, shared by the registers and the test.
#[derive(Clone, Default)]
pub struct SimBus {
    model: Rc<RefCell<BusModel>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registers(&self) -> SimRegisters {
        SimRegisters {
            model: Rc::clone(&self.model),
        }
    }

    /// Divider table of a 48 MHz bus clock.
    pub fn clock(&self) -> DividerTable {
        DividerTable::for_bus_clock(48.MHz()).unwrap()
    }

    pub fn add_device(&self, address: u8, data: &[u8]) {
        self.model.borrow_mut().devices.push(Device {
            address,
            data: data.to_vec(),
            cursor: 0,
            received: Vec::new(),
            nak_after: None,
        });
    }

    pub fn nak_after(&self, address: u8, count: usize) {
        let mut model = self.model.borrow_mut();
        if let Some(device) = model.devices.iter_mut().find(|d| d.address == address) {
            device.nak_after = Some(count);
        }
    }

    /// Lose arbitration during the next address byte.
    pub fn lose_arbitration(&self) {
        self.model.borrow_mut().lose_arbitration = true;
    }

    /// Another master holds the bus.
    pub fn set_external_busy(&self, busy: bool) {
        self.model.borrow_mut().external_busy = busy;
    }

    /// Bytes go out but never complete.
    pub fn set_hung(&self, hung: bool) {
        self.model.borrow_mut().hung = hung;
    }

    /// Let `bytes` more bytes complete, then hang.
    pub fn hang_after(&self, bytes: usize) {
        self.model.borrow_mut().hang_after = Some(bytes);
    }

    pub fn raise_interrupt(&self) {
        self.model.borrow_mut().interrupt = true;
    }

    pub fn irq_pending(&self) -> bool {
        let model = self.model.borrow();
        model.interrupt && model.control().contains(Control::INTERRUPT_ENABLE)
    }

    pub fn wire(&self) -> Vec<Wire> {
        self.model.borrow().wire.clone()
    }

    pub fn clear_wire(&self) {
        self.model.borrow_mut().wire.clear();
    }

    pub fn count(&self, entry: &Wire) -> usize {
        self.model.borrow().wire.iter().filter(|w| *w == entry).count()
    }

    pub fn read_acks(&self) -> Vec<bool> {
        self.model
            .borrow()
            .wire
            .iter()
            .filter_map(|w| match w {
                Wire::Read { acked, .. } => Some(*acked),
                _ => None,
            })
            .collect()
    }

    pub fn device_received(&self, address: u8) -> Vec<u8> {
        self.model
            .borrow()
            .devices
            .iter()
            .find(|d| d.address == address)
            .map(|d| d.received.clone())
            .unwrap_or_default()
    }

    pub fn dummy_reads(&self) -> usize {
        self.model.borrow().dummy_reads
    }

    /// (divider, filter) pairs in the order they were programmed.
    pub fn divider_writes(&self) -> Vec<(u8, u8)> {
        self.model.borrow().divider_writes.clone()
    }
}

pub struct SimRegisters {
    model: Rc<RefCell<BusModel>>,
}

impl RegisterInterface for SimRegisters {
    fn read8(&mut self, register: Register) -> u8 {
        let mut model = self.model.borrow_mut();
        match register {
            Register::Divider => model.divider,
            Register::Control => model.control,
            Register::Status => model.status(),
            Register::Data => model.read_data(),
            Register::Filter => 0,
        }
    }

    fn write8(&mut self, register: Register, value: u8) {
        let mut model = self.model.borrow_mut();
        match register {
            Register::Divider => model.divider = value,
            Register::Filter => {
                let divider = model.divider;
                model.divider_writes.push((divider, value));
            }
            Register::Control => model.write_control(value),
            Register::Status => {
                let clear = Status::from_bits_retain(value);
                if clear.contains(Status::INTERRUPT) {
                    model.interrupt = false;
                }
                if clear.contains(Status::ARBITRATION_LOST) {
                    model.arbitration_lost = false;
                }
            }
            Register::Data => model.write_data(value),
        }
    }
}

#[derive(Default)]
struct Timer {
    now_ns: u64,
    deadline: Option<(u64, StepToken)>,
    last_token: Option<StepToken>,
}

/// Watchdog running on a fake clock advanced by [`SimDelay`].
#[derive(Clone, Default)]
pub struct SimWatchdog {
    timer: Rc<RefCell<Timer>>,
}

impl SimWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_us(&self) -> u64 {
        self.timer.borrow().now_ns / 1_000
    }

    /// Token passed to the most recent `arm`.
    pub fn last_token(&self) -> Option<StepToken> {
        self.timer.borrow().last_token
    }

    /// Move the clock forward, returning the token of an expired timer.
    fn advance(&self, ns: u64) -> Option<StepToken> {
        let mut timer = self.timer.borrow_mut();
        timer.now_ns += ns;
        match timer.deadline {
            Some((deadline, token)) if timer.now_ns >= deadline => {
                timer.deadline = None;
                Some(token)
            }
            _ => None,
        }
    }
}

impl Watchdog for SimWatchdog {
    fn arm(&mut self, timeout: MillisDurationU32, token: StepToken) {
        let mut timer = self.timer.borrow_mut();
        let deadline = timer.now_ns + u64::from(timeout.to_micros()) * 1_000;
        timer.deadline = Some((deadline, token));
        timer.last_token = Some(token);
    }

    fn cancel(&mut self) {
        self.timer.borrow_mut().deadline = None;
    }
}

/// Delay that stands in for the interrupt controller and the timer: while
/// the coordinator waits it delivers pending controller interrupts and
/// fires the watchdog once its deadline passes.
pub struct SimDelay<'e> {
    engine: &'e SimEngine,
    bus: SimBus,
    watchdog: SimWatchdog,
}

impl<'e> SimDelay<'e> {
    pub fn new(engine: &'e SimEngine, bus: SimBus, watchdog: SimWatchdog) -> Self {
        Self {
            engine,
            bus,
            watchdog,
        }
    }
}

impl DelayNs for SimDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        if self.bus.irq_pending() {
            self.engine.on_interrupt();
        }
        if let Some(token) = self.watchdog.advance(u64::from(ns)) {
            self.engine.on_watchdog_expired(token);
        }
    }
}
