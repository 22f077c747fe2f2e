use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::{PhyError, SymbolRx, SymbolTx};

const POLL_SLICE: Duration = Duration::from_millis(10);

/// A loopback symbol channel standing in for one optical direction:
/// symbols written to the `ChannelTx` end come out of the `ChannelRx`
/// end in order. Serves tests and bench runs without hardware.
pub fn symbol_channel<S>() -> (ChannelTx<S>, ChannelRx<S>) {
    let (sender, receiver) = unbounded();
    (ChannelTx { sender }, ChannelRx { receiver })
}

pub struct ChannelTx<S> {
    sender: Sender<S>,
}

impl<S> SymbolTx for ChannelTx<S> {
    type Symbol = S;

    fn send(&self, symbol: S, stop: &AtomicBool) -> Result<(), PhyError> {
        if stop.load(Ordering::Relaxed) {
            return Err(PhyError::Stopped);
        }
        self.sender.send(symbol).map_err(|_| PhyError::Disconnected)
    }
}

pub struct ChannelRx<S> {
    receiver: Receiver<S>,
}

impl<S> SymbolRx for ChannelRx<S> {
    type Symbol = S;

    fn recv(&self, stop: &AtomicBool) -> Result<S, PhyError> {
        loop {
            if stop.load(Ordering::Relaxed) {
                return Err(PhyError::Stopped);
            }
            match self.receiver.recv_timeout(POLL_SLICE) {
                Ok(symbol) => return Ok(symbol),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(PhyError::Disconnected),
            }
        }
    }
}
