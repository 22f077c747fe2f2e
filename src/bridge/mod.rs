pub mod checksum;
pub mod headers;

use std::net::Ipv4Addr;

use checksum::{checksum, checksum_parts};
use headers::{
    EthernetHeader, HeaderError, Ipv4Header, TcpHeader, ETHERNET_HEADER_LEN, ETHERTYPE_IPV4,
    IPPROTO_ICMP, IPPROTO_TCP, TCP_HEADER_LEN,
};

use crate::config::{NodeConfig, Substitution};
use crate::frame::EthernetFrame;

const ICMP_HEADER_LEN: usize = 8;

/// Rewrites a frame crossing from the optical side to the network
/// side: Ethernet addresses become own/peer, one IP address is
/// substituted per role, and every touched checksum is recomputed.
/// Only ICMP and TCP cross the bridge; the allow-list is deliberate.
pub struct BridgeRewriter {
    own_mac: [u8; 6],
    peer_mac: [u8; 6],
    substitution: Substitution,
    substitute_ip: Ipv4Addr,
}

impl BridgeRewriter {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            own_mac: config.own_mac,
            peer_mac: config.peer_mac,
            substitution: config.substitution(),
            substitute_ip: config.substitute_ip(),
        }
    }

    /// Returns the forwardable rewrite of `frame`, or `None` when the
    /// frame is not eligible to cross (not an error condition).
    pub fn rewrite(&self, frame: &EthernetFrame) -> Option<EthernetFrame> {
        let bytes = frame.as_bytes();

        let eth = EthernetHeader::parse(bytes).ok()?;
        if eth.ethertype != ETHERTYPE_IPV4 {
            return None;
        }

        let mut ip = match Ipv4Header::parse(&bytes[ETHERNET_HEADER_LEN..]) {
            Ok(ip) => ip,
            Err(err) => {
                warn!("Dropping malformed IP frame: {err}");
                return None;
            }
        };

        match self.substitution {
            Substitution::Source => ip.source = self.substitute_ip,
            Substitution::Destination => ip.dest = self.substitute_ip,
        }

        // The declared total length is authoritative; anything past it
        // is link padding and is stripped here.
        let l4_start = ETHERNET_HEADER_LEN + ip.header_len();
        let l4 = &bytes[l4_start..ETHERNET_HEADER_LEN + usize::from(ip.total_len)];

        let l4_out = match ip.protocol {
            IPPROTO_ICMP => self.rewrite_icmp(l4)?,
            IPPROTO_TCP => self.rewrite_tcp(&ip, l4)?,
            _ => return None,
        };

        let mut out = Vec::with_capacity(ETHERNET_HEADER_LEN + usize::from(ip.total_len));
        EthernetHeader {
            dest: self.peer_mac,
            source: self.own_mac,
            ethertype: ETHERTYPE_IPV4,
        }
        .write_to(&mut out);

        let ip_checksum = checksum(&ip.to_bytes_for_checksum());
        ip.write_to(ip_checksum, &mut out);
        out.extend_from_slice(&l4_out);

        EthernetFrame::from_slice(&out).ok()
    }

    /// ICMP crosses untouched apart from a fresh checksum.
    fn rewrite_icmp(&self, l4: &[u8]) -> Option<Vec<u8>> {
        if l4.len() < ICMP_HEADER_LEN {
            warn!("Dropping truncated ICMP message of {} bytes", l4.len());
            return None;
        }

        let mut out = l4.to_vec();
        out[2] = 0;
        out[3] = 0;
        let value = checksum(&out);
        out[2..4].copy_from_slice(&value.to_be_bytes());
        Some(out)
    }

    /// TCP checksums cover the pseudo-header, so the substituted
    /// address forces a recomputation over header plus payload.
    fn rewrite_tcp(&self, ip: &Ipv4Header, l4: &[u8]) -> Option<Vec<u8>> {
        let tcp = match TcpHeader::parse(l4) {
            Ok(tcp) => tcp,
            Err(HeaderError::Truncated(bytes)) => {
                warn!("Dropping truncated TCP segment of {bytes} bytes");
                return None;
            }
            Err(err) => {
                warn!("Dropping unparsable TCP segment: {err}");
                return None;
            }
        };
        let rest = &l4[TCP_HEADER_LEN..];

        let value = checksum_parts(&[&ip.pseudo_header(), &tcp.to_bytes_for_checksum(), rest]);

        let mut out = Vec::with_capacity(l4.len());
        tcp.write_to(value, &mut out);
        out.extend_from_slice(rest);
        Some(out)
    }
}
