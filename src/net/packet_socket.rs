use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;
use std::time::Duration;

use super::FrameSocket;
use crate::error::{LinkError, Result};
use crate::frame::{EthernetFrame, FRAME_SIZE};

const ETH_P_ALL: u16 = 0x0003;

/// AF_PACKET/SOCK_RAW socket bound to one interface, exchanging whole
/// Ethernet frames for all EtherTypes. Interface index, MAC and IPv4
/// address are discovered at open time.
pub struct PacketSocket {
    fd: RawFd,
    ifindex: i32,
    mac: [u8; 6],
    ip: Option<Ipv4Addr>,
}

fn ifreq_for(iface: &str) -> libc::ifreq {
    let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
    for (slot, byte) in req.ifr_name.iter_mut().zip(iface.as_bytes()) {
        *slot = *byte as libc::c_char;
    }
    req
}

impl PacketSocket {
    pub fn open(iface: &str) -> Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                i32::from(ETH_P_ALL.to_be()),
            )
        };
        if fd < 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        match Self::configure(fd, iface) {
            Ok(socket) => Ok(socket),
            Err(err) => {
                unsafe { libc::close(fd) };
                Err(err)
            }
        }
    }

    fn configure(fd: RawFd, iface: &str) -> Result<Self> {
        let mut req = ifreq_for(iface);
        if unsafe { libc::ioctl(fd, libc::SIOCGIFINDEX, &mut req) } < 0 {
            return Err(LinkError::Setup(format!(
                "no interface index for {iface}: {}",
                std::io::Error::last_os_error()
            )));
        }
        let ifindex = unsafe { req.ifr_ifru.ifru_ifindex };

        let mut req = ifreq_for(iface);
        if unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut req) } < 0 {
            return Err(LinkError::Setup(format!(
                "no hardware address for {iface}: {}",
                std::io::Error::last_os_error()
            )));
        }
        let mut mac = [0u8; 6];
        let hwaddr = unsafe { req.ifr_ifru.ifru_hwaddr };
        for (slot, byte) in mac.iter_mut().zip(hwaddr.sa_data.iter()) {
            *slot = *byte as u8;
        }

        // A missing IPv4 address is tolerated; the compiled-in profile
        // address stays in effect.
        let mut req = ifreq_for(iface);
        let ip = if unsafe { libc::ioctl(fd, libc::SIOCGIFADDR, &mut req) } < 0 {
            None
        } else {
            let addr = unsafe {
                *(std::ptr::addr_of!(req.ifr_ifru) as *const libc::sockaddr_in)
            };
            Some(Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr)))
        };

        let mut bind_addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        bind_addr.sll_family = libc::AF_PACKET as u16;
        bind_addr.sll_protocol = ETH_P_ALL.to_be();
        bind_addr.sll_ifindex = ifindex;
        let bound = unsafe {
            libc::bind(
                fd,
                std::ptr::addr_of!(bind_addr) as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if bound < 0 {
            return Err(LinkError::Setup(format!(
                "binding to {iface} failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        Ok(Self {
            fd,
            ifindex,
            mac,
            ip,
        })
    }

    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.ip
    }
}

impl FrameSocket for PacketSocket {
    fn recv_frame(&self, timeout: Duration) -> Result<Option<EthernetFrame>> {
        let time = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        let set = unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                std::ptr::addr_of!(time) as *const libc::c_void,
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if set < 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        let mut buffer = [0u8; FRAME_SIZE];
        let received = unsafe {
            libc::recv(
                self.fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0,
            )
        };
        if received < 0 {
            let err = std::io::Error::last_os_error();
            return match err.kind() {
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Ok(None),
                _ => Err(err.into()),
            };
        }

        Ok(Some(EthernetFrame::from_slice(&buffer[..received as usize])?))
    }

    fn send_frame(&self, frame: &EthernetFrame) -> Result<()> {
        let mut dest: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        dest.sll_family = libc::AF_PACKET as u16;
        dest.sll_ifindex = self.ifindex;
        dest.sll_halen = 6;
        dest.sll_addr[..6].copy_from_slice(&frame.as_bytes()[..6]);

        let sent = unsafe {
            libc::sendto(
                self.fd,
                frame.as_bytes().as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                std::ptr::addr_of!(dest) as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if sent < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }
}

impl Drop for PacketSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
