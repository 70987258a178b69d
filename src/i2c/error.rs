// Licensed under the Apache-2.0 license

use core::fmt;
use embedded_hal::i2c::ErrorKind;

/// Errors returned by a transfer.
///
/// Protocol failures (NAK, arbitration loss, timeout, busy bus) are all
/// reported as [`Error::Io`]; the engine keeps the precise cause in
/// [`TransferStatus`](crate::i2c::state::TransferStatus) for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The transaction was aborted on the bus.
    Io,
    /// A message was rejected before the bus was touched.
    InvalidMessage,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io => f.write_str("i2c transfer failed"),
            Error::InvalidMessage => f.write_str("invalid i2c message"),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}
