/// Internet checksum: one's-complement sum of big-endian 16-bit words
/// with end-around carry, complemented. An odd trailing byte is padded
/// with zero on the right.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Checksum of a list of buffers treated as one contiguous run of
/// 16-bit words. Every buffer except the last must be of even length.
pub fn checksum_parts(parts: &[&[u8]]) -> u16 {
    let mut sum: u32 = 0;

    for part in parts {
        sum += u32::from(!checksum(part));
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}
