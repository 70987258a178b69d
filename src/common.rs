// Licensed under the Apache-2.0 license

//! Crate-wide helpers shared by the driver modules.

use core::fmt;

/// Sink for driver diagnostics.
///
/// Drivers are generic over a logger so that firmware without a logging
/// backend pays nothing for it. Implementations must not block; they are
/// only called from thread context, never from an interrupt handler.
pub trait Logger {
    fn debug(&mut self, args: fmt::Arguments<'_>);
    fn error(&mut self, args: fmt::Arguments<'_>);
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _args: fmt::Arguments<'_>) {}
    fn error(&mut self, _args: fmt::Arguments<'_>) {}
}

/// Logger forwarding to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFacade;

impl Logger for LogFacade {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        log::debug!("{args}");
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        log::error!("{args}");
    }
}
