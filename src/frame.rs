use crate::error::LinkError;

pub const FRAME_SIZE: usize = 1518;

/// One Ethernet frame, header included. Lives for exactly one pipeline
/// traversal; equality and printing consider only the valid prefix.
#[derive(Clone)]
pub struct EthernetFrame {
    data: [u8; FRAME_SIZE],
    bytes: u16,
}

impl EthernetFrame {
    pub fn empty() -> Self {
        Self {
            data: [0; FRAME_SIZE],
            bytes: 0,
        }
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, LinkError> {
        if data.len() > FRAME_SIZE {
            return Err(LinkError::FrameTooLarge(data.len()));
        }

        let mut frame = Self::empty();
        frame.data[..data.len()].copy_from_slice(data);
        frame.bytes = data.len() as u16;
        Ok(frame)
    }

    pub fn len(&self) -> usize {
        self.bytes as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.bytes as usize]
    }
}

impl PartialEq for EthernetFrame {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for EthernetFrame {}

impl std::fmt::Debug for EthernetFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthernetFrame")
            .field("bytes", &self.bytes)
            .field("data", &self.as_bytes())
            .finish()
    }
}
