// Licensed under the Apache-2.0 license

//! Working record of the transfer in flight.
//!
//! The record is opened by the coordinator at the start of a transfer and
//! closed before the coordinator returns. In between it is advanced by the
//! interrupt handler and the watchdog, one event at a time, always under the
//! engine's critical section.

use crate::i2c::machine::{Action, Actions};
use crate::i2c::message::{requires_restart, Message};
use core::ptr::NonNull;
use fugit::HertzU32;

/// Outcome of a transfer as seen by the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Ok,
    /// Another master won the bus.
    ArbitrationLost,
    /// A step did not finish before its watchdog expired.
    Timeout,
    /// The target did not acknowledge its address or a written byte.
    Nak,
    /// The bus never became idle, or the START never took hold.
    BusBusy,
}

impl TransferStatus {
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == TransferStatus::Ok
    }
}

/// The caller's message slice, lent to the engine for one transfer.
struct Batch {
    base: NonNull<Message<'static>>,
    len: usize,
}

// SAFETY: a batch is only dereferenced inside the engine's critical section,
// while the thread that lent the slice is parked in the coordinator.
unsafe impl Send for Batch {}

impl Batch {
    /// # Safety
    ///
    /// The batch must be dropped before the borrow of `messages` ends.
    unsafe fn new(messages: &mut [Message<'_>]) -> Self {
        let len = messages.len();
        Self {
            base: NonNull::from(messages).cast(),
            len,
        }
    }

    fn get(&self, index: usize) -> Option<&Message<'static>> {
        // SAFETY: in bounds, and the slice is alive per `Batch::new`
        (index < self.len).then(|| unsafe { &*self.base.as_ptr().add(index) })
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Message<'static>> {
        // SAFETY: in bounds, and the slice is alive and exclusively lent per
        // `Batch::new`
        (index < self.len).then(|| unsafe { &mut *self.base.as_ptr().add(index) })
    }
}

pub struct TransferState {
    batch: Option<Batch>,
    /// Index of the message in progress.
    pub(crate) cursor: usize,
    /// Messages not yet completed, the current one included.
    pub(crate) remaining: usize,
    /// Bytes of the current message pushed to the data register.
    pub(crate) written: usize,
    /// Bytes of the current message pulled from the data register.
    pub(crate) read: usize,
    /// A START/address cycle (or STOP) follows the current message.
    pub(crate) restart: bool,
    pub(crate) status: TransferStatus,
    /// Bus frequency currently programmed; survives across transfers.
    pub(crate) frequency: Option<HertzU32>,
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batch: None,
            cursor: 0,
            remaining: 0,
            written: 0,
            read: 0,
            restart: true,
            status: TransferStatus::Ok,
            frequency: None,
        }
    }

    /// Open the record over `messages`.
    ///
    /// # Safety
    ///
    /// [`TransferState::close`] must be called before the borrow of
    /// `messages` ends.
    pub(crate) unsafe fn open(&mut self, messages: &mut [Message<'_>]) {
        self.remaining = messages.len();
        self.batch = Some(Batch::new(messages));
        self.cursor = 0;
        self.written = 0;
        self.read = 0;
        self.restart = true;
        self.status = TransferStatus::Ok;
    }

    /// Release the message slice. The status stays readable.
    pub(crate) fn close(&mut self) {
        self.batch = None;
        self.remaining = 0;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.batch.is_some()
    }

    #[must_use]
    pub fn status(&self) -> TransferStatus {
        self.status
    }

    /// Whether the coordinator has another step to run.
    pub(crate) fn has_pending_step(&self) -> bool {
        self.is_open() && self.remaining > 0 && self.status.is_ok()
    }

    pub(crate) fn message(&self, index: usize) -> Option<&Message<'static>> {
        self.batch.as_ref().and_then(|batch| batch.get(index))
    }

    pub(crate) fn current(&self) -> Option<&Message<'static>> {
        self.message(self.cursor)
    }

    /// Whether the message at `index` is followed by a START/address cycle
    /// (or is the last one).
    pub(crate) fn restart_after(&self, index: usize) -> bool {
        let Some(message) = self.message(index) else {
            return true;
        };
        requires_restart(message, self.message(index + 1))
    }

    /// Decide, at the start of a coordinator step, whether the current
    /// message can run on into the next one.
    pub(crate) fn prepare_step(&mut self) {
        self.restart = self.restart_after(self.cursor);
    }

    pub(crate) fn store(&mut self, message: usize, offset: usize, byte: u8) {
        if let Some(message) = self.batch.as_mut().and_then(|batch| batch.get_mut(message)) {
            message.store(offset, byte);
        }
    }

    /// Record a failure and end the transaction.
    pub(crate) fn abort(&mut self, status: TransferStatus, actions: &mut Actions) {
        self.status = status;
        push(actions, Action::IssueStop);
        push(actions, Action::SignalCompletion);
    }

    /// Finish the current message and move along the chain.
    ///
    /// Returns `true` when the next message continues on the bus without a
    /// START/address cycle, in which case the caller keeps driving it from
    /// interrupt context and the watchdog is rearmed for it. Otherwise the
    /// coordinator has been signalled, either to run the next step or
    /// because the chain is done and STOP has been issued.
    pub(crate) fn advance(&mut self, actions: &mut Actions) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            push(actions, Action::IssueStop);
            push(actions, Action::SignalCompletion);
            return false;
        }

        self.cursor += 1;
        self.written = 0;
        self.read = 0;
        if self.restart {
            push(actions, Action::SignalCompletion);
            return false;
        }
        self.restart = self.restart_after(self.cursor);
        push(actions, Action::RearmWatchdog);
        true
    }
}

pub(crate) fn push(actions: &mut Actions, action: Action) {
    let pushed = actions.push(action);
    debug_assert!(pushed.is_ok(), "more than MAX_ACTIONS actions for one event");
}
