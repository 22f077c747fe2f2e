pub mod channel;
pub mod regs;

use std::sync::atomic::AtomicBool;

use thiserror::Error;

use crate::error::LinkError;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PhyError {
    #[error("symbol port not ready within the configured timeout")]
    Timeout,

    #[error("link is shutting down")]
    Stopped,

    #[error("symbol channel disconnected")]
    Disconnected,
}

impl From<PhyError> for LinkError {
    fn from(err: PhyError) -> Self {
        match err {
            PhyError::Timeout => LinkError::HardwareTimeout,
            PhyError::Stopped => LinkError::Stopped,
            PhyError::Disconnected => LinkError::Disconnected,
        }
    }
}

/// Receive side of one optical direction. `recv` waits for the next
/// symbol, checking `stop` while it polls.
pub trait SymbolRx {
    type Symbol;

    fn recv(&self, stop: &AtomicBool) -> Result<Self::Symbol, PhyError>;
}

/// Transmit side of one optical direction. `send` returns once the
/// hardware has accepted the symbol.
pub trait SymbolTx {
    type Symbol;

    fn send(&self, symbol: Self::Symbol, stop: &AtomicBool) -> Result<(), PhyError>;
}
