use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::queue::DEFAULT_CAPACITY;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Station,
    AccessPoint,
}

impl Role {
    pub fn profile(self) -> NodeConfig {
        match self {
            Role::Station => STATION_PROFILE.clone(),
            Role::AccessPoint => ACCESS_POINT_PROFILE.clone(),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "station" => Ok(Role::Station),
            "access-point" | "ap" => Ok(Role::AccessPoint),
            other => Err(format!("unknown role `{other}`, expected `station` or `access-point`")),
        }
    }
}

/// Which IP address field the bridge substitutes when a frame crosses
/// toward the network side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Substitution {
    /// Access point: the source becomes the egress interface address.
    Source,
    /// Station: the destination becomes the wired client address.
    Destination,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PollConfig {
    /// Delay between two status-register reads; zero spins.
    pub interval: Duration,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            timeout: None,
        }
    }
}

/// Compiled-in per-role identity and wiring. Discovered interface
/// addresses override `own_mac`/`own_ip` at startup when available.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub role: Role,
    pub iface: String,
    pub own_mac: [u8; 6],
    pub own_ip: Ipv4Addr,
    pub peer_mac: [u8; 6],
    pub peer_ip: Ipv4Addr,
    pub optical_rx_base: usize,
    pub optical_tx_base: usize,
    pub queue_capacity: usize,
    pub poll: PollConfig,
}

impl NodeConfig {
    pub fn substitution(&self) -> Substitution {
        match self.role {
            Role::Station => Substitution::Destination,
            Role::AccessPoint => Substitution::Source,
        }
    }

    /// The address written into the substituted IP field.
    pub fn substitute_ip(&self) -> Ipv4Addr {
        match self.role {
            Role::Station => self.peer_ip,
            Role::AccessPoint => self.own_ip,
        }
    }
}

static STATION_PROFILE: Lazy<NodeConfig> = Lazy::new(|| NodeConfig {
    role: Role::Station,
    iface: "eth0".to_string(),
    own_mac: [0x00, 0x26, 0x32, 0xF0, 0x56, 0x70],
    own_ip: Ipv4Addr::new(192, 168, 3, 105),
    peer_mac: [0x00, 0x30, 0x67, 0x0B, 0xE0, 0xFD],
    peer_ip: Ipv4Addr::new(192, 168, 3, 1),
    optical_rx_base: crate::phy::regs::STATION_WIDE_RX_BASE,
    optical_tx_base: crate::phy::regs::STATION_NARROW_TX_BASE,
    queue_capacity: DEFAULT_CAPACITY,
    poll: PollConfig {
        interval: Duration::ZERO,
        timeout: None,
    },
});

static ACCESS_POINT_PROFILE: Lazy<NodeConfig> = Lazy::new(|| NodeConfig {
    role: Role::AccessPoint,
    iface: "wlan0".to_string(),
    own_mac: [0x74, 0xDA, 0x38, 0xA8, 0x87, 0x10],
    own_ip: Ipv4Addr::new(192, 168, 1, 105),
    peer_mac: [0x7C, 0x8B, 0xCA, 0x42, 0x9F, 0xE2],
    peer_ip: Ipv4Addr::new(192, 168, 1, 1),
    optical_rx_base: crate::phy::regs::AP_NARROW_RX_BASE,
    optical_tx_base: crate::phy::regs::AP_WIDE_TX_BASE,
    queue_capacity: DEFAULT_CAPACITY,
    poll: PollConfig {
        interval: Duration::ZERO,
        timeout: None,
    },
});

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("station".parse::<Role>().unwrap(), Role::Station);
        assert_eq!("ap".parse::<Role>().unwrap(), Role::AccessPoint);
        assert!("router".parse::<Role>().is_err());
    }

    #[test]
    fn test_substitution_per_role() {
        let station = Role::Station.profile();
        assert_eq!(station.substitution(), Substitution::Destination);
        assert_eq!(station.substitute_ip(), station.peer_ip);

        let ap = Role::AccessPoint.profile();
        assert_eq!(ap.substitution(), Substitution::Source);
        assert_eq!(ap.substitute_ip(), ap.own_ip);
    }
}
