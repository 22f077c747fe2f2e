use super::{Deframer, Framer, LinkEvent, PREAMBLE};
use crate::frame::{EthernetFrame, FRAME_SIZE};

const HEADER_BYTES: usize = 7;
const FLAG_DATA: u8 = 0x00;
const FLAG_ACK: u8 = 0xFF;

/// The narrow encoding ships one byte per transmission unit: a 7-byte
/// header (preamble, flag, big-endian length) followed by the payload,
/// one symbol per byte.
pub struct NarrowFramer;

impl Framer for NarrowFramer {
    type Symbol = u8;

    fn encode(&self, frame: &EthernetFrame) -> Vec<u8> {
        let length = frame.len() as u16;

        let mut symbols = Vec::with_capacity(HEADER_BYTES + frame.len());
        symbols.extend_from_slice(&PREAMBLE);
        symbols.push(FLAG_DATA);
        symbols.extend_from_slice(&length.to_be_bytes());
        symbols.extend_from_slice(frame.as_bytes());
        symbols
    }

    fn ack(&self) -> Vec<u8> {
        let mut symbols = Vec::with_capacity(HEADER_BYTES);
        symbols.extend_from_slice(&PREAMBLE);
        symbols.push(FLAG_ACK);
        symbols.extend_from_slice(&[0, 0]);
        symbols
    }
}

enum State {
    Header,
    Payload { expected: usize },
}

pub struct NarrowDeframer {
    state: State,
    header: [u8; HEADER_BYTES],
    header_filled: usize,
    buffer: [u8; FRAME_SIZE],
    filled: usize,
}

impl NarrowDeframer {
    pub fn new() -> Self {
        Self {
            state: State::Header,
            header: [0; HEADER_BYTES],
            header_filled: 0,
            buffer: [0; FRAME_SIZE],
            filled: 0,
        }
    }

    /// Judges a complete 7-byte header. A preamble mismatch discards
    /// all of it; resynchronization relies on the symbol boundary.
    fn judge_header(&mut self) -> Option<LinkEvent> {
        self.header_filled = 0;

        if self.header[..PREAMBLE.len()] != PREAMBLE {
            return Some(LinkEvent::HeaderMismatch);
        }
        if self.header[4] == FLAG_ACK {
            return Some(LinkEvent::Ack);
        }

        let declared = u16::from_be_bytes([self.header[5], self.header[6]]) as usize;
        if declared > FRAME_SIZE {
            return Some(LinkEvent::TooLarge { declared });
        }
        if declared == 0 {
            return Some(LinkEvent::Frame(EthernetFrame::empty()));
        }

        self.state = State::Payload { expected: declared };
        None
    }
}

impl Default for NarrowDeframer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deframer for NarrowDeframer {
    type Symbol = u8;

    fn update(&mut self, symbol: u8) -> Option<LinkEvent> {
        match self.state {
            State::Header => {
                self.header[self.header_filled] = symbol;
                self.header_filled += 1;

                if self.header_filled < HEADER_BYTES {
                    return None;
                }
                self.judge_header()
            }
            State::Payload { expected } => {
                self.buffer[self.filled] = symbol;
                self.filled += 1;

                if self.filled < expected {
                    return None;
                }

                let frame = EthernetFrame::from_slice(&self.buffer[..expected])
                    .expect("declared length was checked against the frame size");
                self.state = State::Header;
                self.filled = 0;
                Some(LinkEvent::Frame(frame))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(payload: &[u8]) {
        let frame = EthernetFrame::from_slice(payload).unwrap();
        let symbols = NarrowFramer.encode(&frame);

        let mut deframer = NarrowDeframer::new();
        let mut events = symbols
            .into_iter()
            .filter_map(|symbol| deframer.update(symbol));

        assert_eq!(events.next(), Some(LinkEvent::Frame(frame)));
        assert_eq!(events.next(), None);
    }

    #[test]
    fn test_roundtrip_lengths() {
        roundtrip(&[0x42]);
        roundtrip(&(0..=255).collect::<Vec<u8>>());
        roundtrip(&[0x5A; FRAME_SIZE]);
    }

    #[test]
    fn test_roundtrip_random() {
        for _ in 0..50 {
            let length = 1 + rand::random::<usize>() % FRAME_SIZE;
            let payload = (0..length).map(|_| rand::random::<u8>()).collect::<Vec<_>>();
            roundtrip(&payload);
        }
    }

    #[test]
    fn test_header_layout() {
        let frame = EthernetFrame::from_slice(&[0xAB; 300]).unwrap();
        let symbols = NarrowFramer.encode(&frame);
        assert_eq!(&symbols[..4], &PREAMBLE);
        assert_eq!(symbols[4], FLAG_DATA);
        assert_eq!(
            u16::from_be_bytes([symbols[5], symbols[6]]) as usize,
            frame.len()
        );
    }

    #[test]
    fn test_corrupted_preamble_discards_whole_header() {
        let frame = EthernetFrame::from_slice(&[1, 2, 3]).unwrap();
        let mut symbols = NarrowFramer.encode(&frame);
        symbols[2] = 0x00;

        let mut deframer = NarrowDeframer::new();
        let mut mismatches = 0;
        for symbol in symbols.iter().take(HEADER_BYTES) {
            if let Some(event) = deframer.update(*symbol) {
                assert_eq!(event, LinkEvent::HeaderMismatch);
                mismatches += 1;
            }
        }
        assert_eq!(mismatches, 1);

        // Next well-formed sequence decodes from a clean state.
        let events = NarrowFramer
            .encode(&frame)
            .into_iter()
            .filter_map(|symbol| deframer.update(symbol))
            .collect::<Vec<_>>();
        assert_eq!(events, vec![LinkEvent::Frame(frame)]);
    }

    #[test]
    fn test_ack_sequence_detected() {
        let mut deframer = NarrowDeframer::new();
        let mut events = NarrowFramer
            .ack()
            .into_iter()
            .filter_map(|symbol| deframer.update(symbol));
        assert_eq!(events.next(), Some(LinkEvent::Ack));
    }

    #[test]
    fn test_oversize_length_rejected() {
        let mut deframer = NarrowDeframer::new();
        let mut header = PREAMBLE.to_vec();
        header.push(FLAG_DATA);
        header.extend_from_slice(&2000u16.to_be_bytes());

        let mut events = header.into_iter().filter_map(|symbol| deframer.update(symbol));
        assert_eq!(events.next(), Some(LinkEvent::TooLarge { declared: 2000 }));
    }
}
