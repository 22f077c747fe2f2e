use thiserror::Error;

use crate::frame::FRAME_SIZE;

pub type Result<T> = std::result::Result<T, LinkError>;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("frame of {0} bytes exceeds the {FRAME_SIZE} byte limit")]
    FrameTooLarge(usize),

    #[error("optical channel not ready within the configured timeout")]
    HardwareTimeout,

    #[error("link is shutting down")]
    Stopped,

    #[error("peer endpoint disconnected")]
    Disconnected,

    #[error("setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
