use std::net::Ipv4Addr;

use thiserror::Error;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const TCP_HEADER_LEN: usize = 20;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HeaderError {
    #[error("buffer of {0} bytes is too short for the header")]
    Truncated(usize),

    #[error("IPv4 header length field {0} is below the minimum of 5")]
    BadIhl(u8),

    #[error("declared total length {declared} does not fit the {available} received bytes")]
    BadLength { declared: usize, available: usize },
}

/// Headers are parsed by value and written back explicitly; the frame
/// buffer is never reinterpreted in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dest: [u8; 6],
    pub source: [u8; 6],
    pub ethertype: u16,
}

impl EthernetHeader {
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < ETHERNET_HEADER_LEN {
            return Err(HeaderError::Truncated(data.len()));
        }

        Ok(Self {
            dest: data[0..6].try_into().unwrap(),
            source: data[6..12].try_into().unwrap(),
            ethertype: u16::from_be_bytes([data[12], data[13]]),
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.dest);
        out.extend_from_slice(&self.source);
        out.extend_from_slice(&self.ethertype.to_be_bytes());
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags_frag: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub dest: Ipv4Addr,
    pub options: Vec<u8>,
}

impl Ipv4Header {
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return Err(HeaderError::Truncated(data.len()));
        }

        let version_ihl = data[0];
        let ihl = version_ihl & 0x0F;
        if ihl < 5 {
            return Err(HeaderError::BadIhl(ihl));
        }

        let header_len = usize::from(ihl) * 4;
        let total_len = u16::from_be_bytes([data[2], data[3]]);
        if usize::from(total_len) < header_len || usize::from(total_len) > data.len() {
            return Err(HeaderError::BadLength {
                declared: total_len.into(),
                available: data.len(),
            });
        }
        if data.len() < header_len {
            return Err(HeaderError::Truncated(data.len()));
        }

        Ok(Self {
            version_ihl,
            tos: data[1],
            total_len,
            id: u16::from_be_bytes([data[4], data[5]]),
            flags_frag: u16::from_be_bytes([data[6], data[7]]),
            ttl: data[8],
            protocol: data[9],
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            dest: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            options: data[IPV4_MIN_HEADER_LEN..header_len].to_vec(),
        })
    }

    pub fn header_len(&self) -> usize {
        usize::from(self.version_ihl & 0x0F) * 4
    }

    /// Payload length declared by the header, options excluded.
    pub fn segment_len(&self) -> usize {
        usize::from(self.total_len) - self.header_len()
    }

    /// Serializes with the given checksum value in place.
    pub fn write_to(&self, checksum: u16, out: &mut Vec<u8>) {
        out.push(self.version_ihl);
        out.push(self.tos);
        out.extend_from_slice(&self.total_len.to_be_bytes());
        out.extend_from_slice(&self.id.to_be_bytes());
        out.extend_from_slice(&self.flags_frag.to_be_bytes());
        out.push(self.ttl);
        out.push(self.protocol);
        out.extend_from_slice(&checksum.to_be_bytes());
        out.extend_from_slice(&self.source.octets());
        out.extend_from_slice(&self.dest.octets());
        out.extend_from_slice(&self.options);
    }

    /// Header bytes with a zeroed checksum field, ready for summing.
    pub fn to_bytes_for_checksum(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.header_len());
        self.write_to(0, &mut bytes);
        bytes
    }

    /// The TCP pseudo-header over the current addresses.
    pub fn pseudo_header(&self) -> [u8; 12] {
        let mut pseudo = [0u8; 12];
        pseudo[0..4].copy_from_slice(&self.source.octets());
        pseudo[4..8].copy_from_slice(&self.dest.octets());
        pseudo[9] = self.protocol;
        pseudo[10..12].copy_from_slice(&(self.segment_len() as u16).to_be_bytes());
        pseudo
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub dest_port: u16,
    pub sequence: u32,
    pub ack_number: u32,
    pub offset_flags: u16,
    pub window: u16,
    pub urgent: u16,
}

impl TcpHeader {
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < TCP_HEADER_LEN {
            return Err(HeaderError::Truncated(data.len()));
        }

        Ok(Self {
            source_port: u16::from_be_bytes([data[0], data[1]]),
            dest_port: u16::from_be_bytes([data[2], data[3]]),
            sequence: u32::from_be_bytes(data[4..8].try_into().unwrap()),
            ack_number: u32::from_be_bytes(data[8..12].try_into().unwrap()),
            offset_flags: u16::from_be_bytes([data[12], data[13]]),
            window: u16::from_be_bytes([data[14], data[15]]),
            urgent: u16::from_be_bytes([data[18], data[19]]),
        })
    }

    pub fn write_to(&self, checksum: u16, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.source_port.to_be_bytes());
        out.extend_from_slice(&self.dest_port.to_be_bytes());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.ack_number.to_be_bytes());
        out.extend_from_slice(&self.offset_flags.to_be_bytes());
        out.extend_from_slice(&self.window.to_be_bytes());
        out.extend_from_slice(&checksum.to_be_bytes());
        out.extend_from_slice(&self.urgent.to_be_bytes());
    }

    pub fn to_bytes_for_checksum(&self) -> [u8; TCP_HEADER_LEN] {
        let mut bytes = Vec::with_capacity(TCP_HEADER_LEN);
        self.write_to(0, &mut bytes);
        bytes.try_into().unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ethernet_parse() {
        let mut data = vec![0u8; 14];
        data[0..6].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        data[6..12].copy_from_slice(&[7, 8, 9, 10, 11, 12]);
        data[12..14].copy_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        let header = EthernetHeader::parse(&data).unwrap();
        assert_eq!(header.dest, [1, 2, 3, 4, 5, 6]);
        assert_eq!(header.ethertype, ETHERTYPE_IPV4);

        assert_eq!(
            EthernetHeader::parse(&data[..10]),
            Err(HeaderError::Truncated(10))
        );
    }

    #[test]
    fn test_ipv4_parse_validates_lengths() {
        let mut data = vec![0u8; 40];
        data[0] = 0x45;
        data[2..4].copy_from_slice(&40u16.to_be_bytes());
        data[9] = IPPROTO_TCP;
        assert!(Ipv4Header::parse(&data).is_ok());

        // Declared length past the received bytes.
        data[2..4].copy_from_slice(&60u16.to_be_bytes());
        assert_eq!(
            Ipv4Header::parse(&data),
            Err(HeaderError::BadLength {
                declared: 60,
                available: 40
            })
        );

        // Header length below minimum.
        data[0] = 0x44;
        data[2..4].copy_from_slice(&40u16.to_be_bytes());
        assert_eq!(Ipv4Header::parse(&data), Err(HeaderError::BadIhl(4)));
    }

    #[test]
    fn test_ipv4_roundtrip_with_options() {
        let mut data = vec![0u8; 64];
        data[0] = 0x46; // ihl = 6, one options word
        data[1] = 0x10;
        data[2..4].copy_from_slice(&64u16.to_be_bytes());
        data[8] = 63;
        data[9] = IPPROTO_ICMP;
        data[12..16].copy_from_slice(&[10, 0, 0, 1]);
        data[16..20].copy_from_slice(&[10, 0, 0, 2]);
        data[20..24].copy_from_slice(&[0x94, 0x04, 0, 0]);

        let header = Ipv4Header::parse(&data).unwrap();
        assert_eq!(header.header_len(), 24);
        assert_eq!(header.options, vec![0x94, 0x04, 0, 0]);
        assert_eq!(header.segment_len(), 40);

        let mut out = Vec::new();
        header.write_to(0, &mut out);
        assert_eq!(out, data[..24].to_vec());
    }

    #[test]
    fn test_tcp_roundtrip() {
        let mut data = vec![0u8; 20];
        data[0..2].copy_from_slice(&443u16.to_be_bytes());
        data[2..4].copy_from_slice(&51000u16.to_be_bytes());
        data[4..8].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        data[12] = 0x50;
        data[13] = 0x18; // PSH|ACK
        data[14..16].copy_from_slice(&8192u16.to_be_bytes());
        data[16..18].copy_from_slice(&0x1234u16.to_be_bytes());

        let header = TcpHeader::parse(&data).unwrap();
        assert_eq!(header.source_port, 443);
        assert_eq!(header.offset_flags, 0x5018);

        // Serialized form carries a zeroed checksum field.
        let bytes = header.to_bytes_for_checksum();
        assert_eq!(bytes[..16], data[..16]);
        assert_eq!(bytes[16..18], [0, 0]);
        assert_eq!(bytes[18..20], data[18..20]);
    }
}
