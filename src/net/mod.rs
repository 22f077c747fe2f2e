pub mod lockdown;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod packet_socket;
        pub use packet_socket::PacketSocket;
    }
}

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::error::{LinkError, Result};
use crate::frame::EthernetFrame;

/// Whole-frame access to the wired/wireless side of a node.
pub trait FrameSocket {
    /// Waits up to `timeout` for the next frame; `Ok(None)` on expiry
    /// so callers can observe shutdown between reads.
    fn recv_frame(&self, timeout: Duration) -> Result<Option<EthernetFrame>>;

    fn send_frame(&self, frame: &EthernetFrame) -> Result<()>;
}

/// In-memory socket pair: frames sent on one end are received on the
/// other. The far end plays the wired client or the WiFi router.
pub struct MockSocket {
    sender: Sender<EthernetFrame>,
    receiver: Receiver<EthernetFrame>,
}

impl MockSocket {
    pub fn pair() -> (MockSocket, MockSocket) {
        let (near_sender, far_receiver) = bounded(64);
        let (far_sender, near_receiver) = bounded(64);

        (
            MockSocket {
                sender: near_sender,
                receiver: near_receiver,
            },
            MockSocket {
                sender: far_sender,
                receiver: far_receiver,
            },
        )
    }
}

impl FrameSocket for MockSocket {
    fn recv_frame(&self, timeout: Duration) -> Result<Option<EthernetFrame>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    fn send_frame(&self, frame: &EthernetFrame) -> Result<()> {
        self.sender
            .send(frame.clone())
            .map_err(|_| LinkError::Disconnected)
    }
}
