use crate::frame::EthernetFrame;

mod narrow;
pub use narrow::{NarrowDeframer, NarrowFramer};

mod wide;
pub use wide::{WideDeframer, WideFramer, WideSymbol};

/// Start-of-header pattern shared by both symbol encodings.
pub const PREAMBLE: [u8; 4] = [0x16, 0x80, 0x88, 0x80];

pub const WIDE_PAYLOAD_BYTES: usize = 15;
pub const WIDE_PAYLOAD_BITS: usize = 120;

/// Outcome of feeding one received symbol to a deframer.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete frame was reassembled.
    Frame(EthernetFrame),
    /// The header carried the ACK marker; no frame follows.
    Ack,
    /// The preamble did not match; resynchronize on the next symbol.
    HeaderMismatch,
    /// The header declared more bytes than a frame can hold.
    TooLarge { declared: usize },
}

/// Splits one Ethernet frame into the symbol sequence of a link
/// direction, header symbol(s) first.
pub trait Framer {
    type Symbol;

    fn encode(&self, frame: &EthernetFrame) -> Vec<Self::Symbol>;

    /// The fixed acknowledgment sequence of this encoding.
    fn ack(&self) -> Vec<Self::Symbol>;
}

/// Push-style reassembly automaton: feed symbols as they arrive off
/// the hardware, collect an event whenever one completes a unit.
pub trait Deframer {
    type Symbol;

    fn update(&mut self, symbol: Self::Symbol) -> Option<LinkEvent>;
}
