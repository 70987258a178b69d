// Licensed under the Apache-2.0 license

//! Protocol state machine.
//!
//! One call to [`TransferState::on_event`] handles one interrupt (or the
//! watchdog expiry) and returns the hardware commands to run, in order.
//! The function never touches hardware itself, which keeps every ACK
//! decision checkable without a controller.
//!
//! Receive-side ACK control is staged one byte ahead: the controller
//! acknowledges a byte according to the NO_ACK bit at the moment that byte's
//! reception is triggered, and reception of byte `n + 1` is triggered by
//! reading byte `n` out of the data register. So the decision for the final
//! byte is taken while reading the second-to-last one, and the final read is
//! preceded by a switch to transmit mode so that it triggers nothing.

use crate::i2c::message::Direction;
use crate::i2c::state::{push, TransferState, TransferStatus};

/// What the interrupt handler (or the watchdog) observed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Transmit mode: the address or data byte was acknowledged.
    ByteAcked,
    /// Transmit mode: the address or data byte was not acknowledged.
    ByteNaked,
    /// Receive mode: a byte is waiting in the data register.
    ByteReceived,
    /// Another master won the bus while this one was transmitting.
    ArbitrationLost,
    /// The step watchdog ran out before the hardware finished.
    WatchdogExpired,
}

/// Hardware command produced by the state machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Push a byte into the data register.
    SendByte(u8),
    /// Pop the data register into `offset` of message `message`.
    ReceiveInto { message: usize, offset: usize },
    /// Read the data register and discard it, starting reception.
    DummyRead,
    /// Switch to master receive, acknowledging the next byte or not.
    EnterReceive { ack: bool },
    /// Switch to master transmit so the next data read triggers nothing.
    EnterTransmit,
    /// Do not acknowledge the byte triggered by the next data read.
    SuppressAck,
    /// Give the message the bus just ran on into a fresh timeout budget.
    RearmWatchdog,
    /// Drop mastership, generating STOP.
    IssueStop,
    /// Wake the coordinator.
    SignalCompletion,
}

/// Longest sequence a single event produces: the last byte of a read that
/// ends the transfer (EnterTransmit, ReceiveInto, IssueStop, SignalCompletion).
pub const MAX_ACTIONS: usize = 4;

pub type Actions = heapless::Vec<Action, MAX_ACTIONS>;

impl TransferState {
    /// Advance the transfer by one event.
    ///
    /// Events arriving on a closed record, or after the transfer already
    /// failed, produce no actions.
    pub fn on_event(&mut self, event: Event) -> Actions {
        let mut actions = Actions::new();
        if !self.is_open() || !self.status.is_ok() {
            return actions;
        }

        match event {
            Event::ArbitrationLost => self.abort(TransferStatus::ArbitrationLost, &mut actions),
            Event::ByteNaked => self.abort(TransferStatus::Nak, &mut actions),
            Event::WatchdogExpired => {
                self.status = TransferStatus::Timeout;
                push(&mut actions, Action::SignalCompletion);
            }
            Event::ByteAcked => self.transmitted(&mut actions),
            Event::ByteReceived => self.received(&mut actions),
        }
        actions
    }

    fn transmitted(&mut self, actions: &mut Actions) {
        let Some(message) = self.current() else {
            return;
        };
        let direction = message.direction();
        let len = message.len();

        match direction {
            Direction::Write => {
                if self.written < len {
                    if let Some(byte) = message.byte(self.written) {
                        push(actions, Action::SendByte(byte));
                    }
                    self.written += 1;
                    return;
                }
                if self.advance(actions) {
                    // Same target, same direction: keep feeding bytes with
                    // no address cycle in between.
                    if let Some(byte) = self.current().and_then(|next| next.byte(0)) {
                        push(actions, Action::SendByte(byte));
                    }
                    self.written = 1;
                }
            }
            // The address of a read was just acknowledged.
            Direction::Read => {
                if len == 0 {
                    self.advance(actions);
                    return;
                }
                let ack = !(len == 1 && self.restart);
                push(actions, Action::EnterReceive { ack });
                push(actions, Action::DummyRead);
            }
        }
    }

    fn received(&mut self, actions: &mut Actions) {
        let Some(message) = self.current() else {
            return;
        };
        let len = message.len();
        let index = self.cursor;
        let offset = self.read;
        if offset >= len {
            return;
        }

        if offset + 1 == len {
            if self.restart {
                push(actions, Action::EnterTransmit);
            } else if self.next_is_final_single_byte() {
                push(actions, Action::SuppressAck);
            }
            push(actions, Action::ReceiveInto { message: index, offset });
            self.read += 1;
            self.advance(actions);
        } else {
            if offset + 2 == len && self.restart {
                push(actions, Action::SuppressAck);
            }
            push(actions, Action::ReceiveInto { message: index, offset });
            self.read += 1;
        }
    }

    /// The merged message after the current one is a single byte ending the
    /// receive run, so the byte about to be triggered must not be
    /// acknowledged.
    fn next_is_final_single_byte(&self) -> bool {
        let next = self.cursor + 1;
        self.message(next).is_some_and(|message| message.len() == 1) && self.restart_after(next)
    }
}
