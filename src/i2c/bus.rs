// Licensed under the Apache-2.0 license

//! START / repeated START and the address phase.

use crate::i2c::registers::{Control, Register, Status};
use crate::i2c::state::TransferStatus;
use crate::i2c::traits::RegisterInterface;

/// Take the bus for the next message and send its address byte.
///
/// If the controller is already master this is a repeated START, which
/// keeps the bus claimed between the messages of one transfer. Otherwise
/// waits for the bus to go idle and generates a START.
///
/// Success only means the address byte was queued; NAK and arbitration loss
/// surface through the interrupt that follows. `pause` runs after every poll
/// that finds the bus not yet in the wanted state.
///
/// # Errors
///
/// Returns [`TransferStatus::BusBusy`] if the bus stays busy for more than
/// `spin_limit` polls, or a read's START does not take hold in as many.
pub(crate) fn acquire<R: RegisterInterface>(
    regs: &mut R,
    address_byte: u8,
    spin_limit: u32,
    mut pause: impl FnMut(),
) -> Result<(), TransferStatus> {
    let control = Control::from_bits_retain(regs.read8(Register::Control));
    if control.contains(Control::MASTER) {
        regs.write8(
            Register::Control,
            (Control::MASTER_TRANSMIT | Control::REPEAT_START).bits(),
        );
    } else {
        wait_for(regs, spin_limit, &mut pause, |status| {
            !status.contains(Status::BUSY)
        })?;
        regs.write8(Register::Control, Control::MASTER_TRANSMIT.bits());
    }

    if address_byte & 1 == 1 {
        wait_for(regs, spin_limit, &mut pause, |status| {
            status.contains(Status::BUSY)
        })?;
    }

    regs.write8(Register::Data, address_byte);
    Ok(())
}

fn wait_for<R: RegisterInterface>(
    regs: &mut R,
    spin_limit: u32,
    pause: &mut impl FnMut(),
    done: impl Fn(Status) -> bool,
) -> Result<(), TransferStatus> {
    for _ in 0..spin_limit {
        if done(Status::from_bits_retain(regs.read8(Register::Status))) {
            return Ok(());
        }
        pause();
    }
    Err(TransferStatus::BusBusy)
}
