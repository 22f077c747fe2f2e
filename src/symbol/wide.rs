use super::{Deframer, Framer, LinkEvent, WIDE_PAYLOAD_BITS, WIDE_PAYLOAD_BYTES};
use crate::frame::{EthernetFrame, FRAME_SIZE};

const HEADER_WORD0: u32 = 0x1680_8880;
const HEADER_WORD1_BASE: u32 = 0x1680_0000;
const ACK_MARKER: u32 = 0x0000_FFFF;

/// One transmission unit of the wide encoding: four 32-bit words
/// holding up to 15 payload bytes, packed most-significant byte first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WideSymbol {
    pub words: [u32; 4],
    pub bytes: u16,
}

impl WideSymbol {
    fn packed(payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= WIDE_PAYLOAD_BYTES);

        let mut words = [0u32; 4];
        for (index, &byte) in payload.iter().enumerate() {
            words[index / 4] |= u32::from(byte) << (24 - (index % 4) * 8);
        }

        Self {
            words,
            bytes: payload.len() as u16,
        }
    }

    fn unpack_into(&self, count: usize, out: &mut [u8]) {
        for (index, slot) in out.iter_mut().take(count).enumerate() {
            *slot = (self.words[index / 4] >> (24 - (index % 4) * 8)) as u8;
        }
    }
}

pub struct WideFramer;

impl Framer for WideFramer {
    type Symbol = WideSymbol;

    fn encode(&self, frame: &EthernetFrame) -> Vec<WideSymbol> {
        let bits = frame.len() * 8;
        let num_symbols = bits / WIDE_PAYLOAD_BITS;
        let remainder_bits = bits % WIDE_PAYLOAD_BITS;

        let mut symbols = Vec::with_capacity(num_symbols + 2);
        symbols.push(WideSymbol {
            words: [
                HEADER_WORD0,
                HEADER_WORD1_BASE,
                ((num_symbols as u32) << 16) | remainder_bits as u32,
                0,
            ],
            bytes: WIDE_PAYLOAD_BYTES as u16,
        });

        for chunk in frame.as_bytes().chunks(WIDE_PAYLOAD_BYTES) {
            symbols.push(WideSymbol::packed(chunk));
        }

        symbols
    }

    fn ack(&self) -> Vec<WideSymbol> {
        vec![WideSymbol {
            words: [HEADER_WORD0, HEADER_WORD1_BASE | ACK_MARKER, 0, 0],
            bytes: WIDE_PAYLOAD_BYTES as u16,
        }]
    }
}

enum State {
    Idle,
    Payload { full_left: u16, remainder_bytes: u16 },
}

pub struct WideDeframer {
    state: State,
    buffer: [u8; FRAME_SIZE],
    filled: usize,
}

impl WideDeframer {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            buffer: [0; FRAME_SIZE],
            filled: 0,
        }
    }

    fn finish(&mut self) -> LinkEvent {
        let frame = EthernetFrame::from_slice(&self.buffer[..self.filled])
            .expect("collected payload is bounded by the frame size");
        self.state = State::Idle;
        self.filled = 0;
        LinkEvent::Frame(frame)
    }
}

impl Default for WideDeframer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deframer for WideDeframer {
    type Symbol = WideSymbol;

    fn update(&mut self, symbol: WideSymbol) -> Option<LinkEvent> {
        match self.state {
            State::Idle => {
                if symbol.words[0] != HEADER_WORD0
                    || symbol.words[1] & 0xFFFF_0000 != HEADER_WORD1_BASE
                {
                    return Some(LinkEvent::HeaderMismatch);
                }
                if symbol.words[1] & 0x0000_FFFF == ACK_MARKER {
                    return Some(LinkEvent::Ack);
                }

                let num_symbols = (symbol.words[2] >> 16) as u16;
                let remainder_bits = (symbol.words[2] & 0x0000_FFFF) as u16;
                // Sub-byte remainders truncate, as the hardware framing
                // always did; encode never produces them.
                let remainder_bytes = remainder_bits / 8;

                let declared =
                    num_symbols as usize * WIDE_PAYLOAD_BYTES + remainder_bytes as usize;
                if declared > FRAME_SIZE {
                    return Some(LinkEvent::TooLarge { declared });
                }

                if num_symbols == 0 && remainder_bytes == 0 {
                    return Some(self.finish());
                }

                self.state = State::Payload {
                    full_left: num_symbols,
                    remainder_bytes,
                };
                None
            }
            State::Payload {
                ref mut full_left,
                ref mut remainder_bytes,
            } => {
                let count = if *full_left > 0 {
                    *full_left -= 1;
                    WIDE_PAYLOAD_BYTES
                } else {
                    std::mem::replace(remainder_bytes, 0) as usize
                };
                let done = *full_left == 0 && *remainder_bytes == 0;

                symbol.unpack_into(count, &mut self.buffer[self.filled..]);
                self.filled += count;

                if done {
                    return Some(self.finish());
                }
                None
            }
        }
    }
}
